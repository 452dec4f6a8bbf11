// CLI subcommands over the core wiki service.
//
// Parse arguments, call the service, print results. Nothing here renders
// markdown or interprets page content.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use vellum_common::types::{Author, CommitMeta};
use vellum_core::config::GlobalConfig;
use vellum_core::{SaveOutcome, Wiki};

#[derive(Subcommand)]
pub enum Command {
    /// Print a page's content (optionally at a historical revision).
    Get {
        path: String,
        #[arg(long, default_value = "")]
        revision: String,
    },
    /// Save page content from a file or stdin.
    Save {
        path: String,
        /// Read content from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(short, long, default_value = "")]
        message: String,
        /// Revision the edit is based on; empty when creating a page.
        #[arg(long, default_value = "")]
        base_revision: String,
    },
    /// Delete a page.
    Rm {
        path: String,
        #[arg(short, long, default_value = "")]
        message: String,
        /// Also delete the page's attachment directory.
        #[arg(long)]
        recursive: bool,
    },
    /// Rename a page.
    Mv {
        path: String,
        new_path: String,
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Show a page's commit history.
    Log {
        path: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show the repository-wide changelog.
    Changelog {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Diff two revisions.
    Diff { rev_a: String, rev_b: String },
    /// Show one commit with its full diff.
    Show { revision: String },
    /// Per-line attribution for a page.
    Blame { path: String },
    /// Apply the inverse of a commit as a new commit.
    Revert {
        revision: String,
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Full-text search across pages.
    Search { query: String },
    /// List pages linking to a page.
    Backlinks { path: String },
    /// List every page.
    Pages,
    /// List a page's attachments.
    Attachments {
        path: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Rebuild the search/backlink index from repository content.
    Reindex,
}

/// Author precedence: CLI flags, then `~/.vellum/config.toml`, then the
/// anonymous placeholder.
pub fn resolve_author(name: Option<String>, email: Option<String>) -> Author {
    match (name, email) {
        (Some(name), Some(email)) => Author::new(name, email),
        _ => GlobalConfig::load().author(),
    }
}

pub async fn run(repo: PathBuf, author: Author, command: Command) -> Result<()> {
    let wiki = Wiki::open(repo).context("failed to open wiki repository")?;

    match command {
        Command::Get { path, revision } => {
            let page = wiki.page(&path, &revision).await?;
            if !page.exists {
                anyhow::bail!("page `{path}` does not exist");
            }
            print!("{}", page.content);
        }
        Command::Save { path, file, message, base_revision } => {
            let content = read_content(file)?;
            match wiki.save(&path, &content, &message, &author, &base_revision).await? {
                SaveOutcome::Saved { revision } => println!("saved {path} at {revision}"),
                SaveOutcome::Conflict { current_revision, .. } => {
                    eprintln!(
                        "conflict: page moved to {current_revision} since base revision \
                         `{base_revision}`; re-fetch and retry"
                    );
                    std::process::exit(1);
                }
            }
        }
        Command::Rm { path, message, recursive } => {
            let revision = wiki.delete(&path, &message, &author, recursive).await?;
            println!("deleted {path} at {revision}");
        }
        Command::Mv { path, new_path, message } => {
            let revision = wiki.rename(&path, &new_path, &message, &author).await?;
            println!("renamed {path} -> {new_path} at {revision}");
        }
        Command::Log { path, limit } => {
            print_commits(&wiki.history(&path, limit).await?);
        }
        Command::Changelog { limit } => {
            print_commits(&wiki.changelog(limit).await?);
        }
        Command::Diff { rev_a, rev_b } => {
            print!("{}", wiki.diff(&rev_a, &rev_b).await?);
        }
        Command::Show { revision } => {
            let (meta, diff) = wiki.show_commit(&revision).await?;
            print_commits(std::slice::from_ref(&meta));
            print!("{diff}");
        }
        Command::Blame { path } => {
            for line in wiki.blame(&path).await? {
                println!("{} {:<20} {:>4}| {}", line.revision, line.author, line.line_no, line.content);
            }
        }
        Command::Revert { revision, message } => {
            let new_revision = wiki.revert(&revision, &message, &author).await?;
            println!("reverted {revision}; new revision {new_revision}");
        }
        Command::Search { query } => {
            for hit in wiki.search(&query).await? {
                println!("{:>4}  {}  {}", hit.match_count, hit.path, hit.snippet);
            }
        }
        Command::Backlinks { path } => {
            for source in wiki.backlinks(&path).await? {
                println!("{source}");
            }
        }
        Command::Pages => {
            for page in wiki.page_index().await? {
                println!("{}  ({})", page.path, page.name);
            }
        }
        Command::Attachments { path, limit } => {
            let suffix = wiki.config().content_suffix.clone();
            for attachment in wiki.attachments(&path, limit, Some(&suffix)).await? {
                println!("{}  {}", attachment.full_path, attachment.mime_type);
            }
        }
        Command::Reindex => {
            let count = wiki.rebuild_index().await?;
            println!("indexed {count} page(s)");
        }
    }

    Ok(())
}

fn read_content(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{}`", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read page content from stdin")?;
            Ok(content)
        }
    }
}

fn print_commits(commits: &[CommitMeta]) {
    for commit in commits {
        let first_line = commit.message.lines().next().unwrap_or_default();
        println!(
            "{}  {}  {}  {}",
            commit.id,
            commit.timestamp.format("%Y-%m-%d %H:%M"),
            commit.author_name,
            first_line
        );
    }
}

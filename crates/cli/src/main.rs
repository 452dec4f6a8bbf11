// vellum CLI entry point.

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "vellum", about = "Git-backed wiki document store")]
struct Cli {
    /// Wiki repository root.
    #[arg(long, global = true, default_value = ".")]
    repo: std::path::PathBuf,

    /// Override the commit author name for this invocation.
    #[arg(long, global = true)]
    author_name: Option<String>,

    /// Override the commit author email for this invocation.
    #[arg(long, global = true)]
    author_email: Option<String>,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let author = commands::resolve_author(cli.author_name, cli.author_email);
    commands::run(cli.repo, author, cli.command).await
}

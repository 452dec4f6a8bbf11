// Query service: the process-wide wiki handle.
//
// Owns the repository backend, the derived index, and the single write
// mutex. Writes serialize on the mutex and evaluate the conflict check
// under it, immediately before committing; reads take no lock. Git and
// SQLite work runs on blocking tasks, so a commit that has started is
// never undone just because the caller went away.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use vellum_common::types::{Attachment, Author, BlameLine, CommitMeta, PageSummary};

use crate::config::WikiConfig;
use crate::error::{Result, WikiError};
use crate::index::{IndexDb, IndexSynchronizer, SearchHit};
use crate::page::guard::{check_base_revision, SaveCheck};
use crate::page::{display_name, Page, Pages};
use crate::repo::GitBackend;

/// Result of a page save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The save committed; the page is now at this revision.
    Saved { revision: String },
    /// The save lost an optimistic-concurrency race. The submitted content
    /// is handed back so the caller's edit is not lost.
    Conflict { current_revision: String, submitted_content: String },
}

impl SaveOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn revision(&self) -> Option<&str> {
        match self {
            Self::Saved { revision } => Some(revision),
            Self::Conflict { .. } => None,
        }
    }
}

struct WikiInner {
    pages: Pages,
    config: WikiConfig,
    // Locked with blocking_lock: index calls only happen on blocking tasks.
    index: AsyncMutex<IndexSynchronizer>,
    write_lock: AsyncMutex<()>,
    index_failures: AtomicU64,
}

/// Process-wide handle to one wiki. Cheap to clone; created once at
/// startup and passed to everything that needs it.
#[derive(Clone)]
pub struct Wiki {
    inner: Arc<WikiInner>,
}

impl Wiki {
    /// Open (or initialize) the wiki at `repo_root`, loading its config
    /// from `.vellum/wiki.toml` and its index from `.vellum/index.db`.
    pub fn open(repo_root: impl Into<PathBuf>) -> Result<Self> {
        let root = repo_root.into();
        let config = WikiConfig::load(&root);
        Self::open_with_config(root, config)
    }

    pub fn open_with_config(repo_root: impl Into<PathBuf>, config: WikiConfig) -> Result<Self> {
        let root = repo_root.into();

        let backend = GitBackend::new(&root);
        backend.init_if_needed()?;

        let db = IndexDb::open(root.join(".vellum").join("index.db"))
            .map_err(|error| WikiError::Index(format!("{error:#}")))?;
        let index = IndexSynchronizer::new(db, config.fold_case);

        info!(root = %root.display(), "wiki opened");
        Ok(Self {
            inner: Arc::new(WikiInner {
                pages: Pages::new(backend, config.clone()),
                config,
                index: AsyncMutex::new(index),
                write_lock: AsyncMutex::new(()),
                index_failures: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &WikiConfig {
        &self.inner.config
    }

    /// Number of best-effort index updates that failed since startup.
    pub fn index_failures(&self) -> u64 {
        self.inner.index_failures.load(Ordering::Relaxed)
    }

    // ── Page reads ──────────────────────────────────────────────────

    /// Load a page at the current snapshot, or at `revision` when
    /// non-empty.
    pub async fn page(&self, path: &str, revision: &str) -> Result<Page> {
        let inner = self.inner.clone();
        let (path, revision) = (path.to_string(), revision.to_string());
        run_blocking(move || inner.pages.load(&path, &revision)).await
    }

    pub async fn history(&self, path: &str, limit: usize) -> Result<Vec<CommitMeta>> {
        let inner = self.inner.clone();
        let path = path.to_string();
        run_blocking(move || inner.pages.history(&path, limit)).await
    }

    pub async fn blame(&self, path: &str) -> Result<Vec<BlameLine>> {
        let inner = self.inner.clone();
        let path = path.to_string();
        run_blocking(move || inner.pages.blame(&path)).await
    }

    pub async fn mtime(&self, path: &str) -> Result<DateTime<Utc>> {
        let inner = self.inner.clone();
        let path = path.to_string();
        run_blocking(move || {
            let page_path = inner.pages.canonical(&path)?;
            let file = inner.pages.file_path(&page_path);
            Ok(inner.pages.backend().mtime(&file)?)
        })
        .await
    }

    // ── Page writes ─────────────────────────────────────────────────

    /// Save a page under optimistic concurrency control.
    ///
    /// `base_revision` is the revision the editor started from; empty for
    /// new pages. The check runs under the write lock immediately before
    /// the commit, so two racing writers serialize and the loser gets a
    /// conflict carrying both the winning revision and their own content.
    pub async fn save(
        &self,
        path: &str,
        content: &str,
        message: &str,
        author: &Author,
        base_revision: &str,
    ) -> Result<SaveOutcome> {
        // Validation is pure and happens before any lock or I/O.
        let page_path = self.inner.pages.canonical(path)?;

        let inner = self.inner.clone();
        let (content, message, author, base_revision) = (
            content.to_string(),
            message.to_string(),
            author.clone(),
            base_revision.to_string(),
        );

        let _write = self.inner.write_lock.lock().await;
        run_blocking(move || {
            let current = inner.pages.current_revision(&page_path)?;
            if let SaveCheck::Conflict { current_revision } =
                check_base_revision(&base_revision, current.as_deref())
            {
                return Ok(SaveOutcome::Conflict {
                    current_revision,
                    submitted_content: content,
                });
            }

            let revision = inner.pages.save(&page_path, &content, &message, &author)?;
            inner.note_index_result("save", || {
                inner.index.blocking_lock().page_saved(&page_path, &content)
            });
            Ok(SaveOutcome::Saved { revision })
        })
        .await
    }

    /// Delete a page; with `recursive`, its attachment directory goes in
    /// the same commit.
    pub async fn delete(
        &self,
        path: &str,
        message: &str,
        author: &Author,
        recursive: bool,
    ) -> Result<String> {
        let inner = self.inner.clone();
        let (path, message, author) = (path.to_string(), message.to_string(), author.clone());

        let _write = self.inner.write_lock.lock().await;
        run_blocking(move || {
            let page_path = inner.pages.canonical(&path)?;
            let revision = inner.pages.delete(&page_path, &message, &author, recursive)?;
            inner.note_index_result("delete", || {
                inner.index.blocking_lock().page_deleted(&page_path)
            });
            Ok(revision)
        })
        .await
    }

    /// Rename a page. Exposed as one atomic-looking operation; the
    /// two-phase mechanics and compensation live in the page layer.
    pub async fn rename(
        &self,
        path: &str,
        new_path: &str,
        message: &str,
        author: &Author,
    ) -> Result<String> {
        let inner = self.inner.clone();
        let (path, new_path, message, author) =
            (path.to_string(), new_path.to_string(), message.to_string(), author.clone());

        let _write = self.inner.write_lock.lock().await;
        run_blocking(move || {
            let old_page = inner.pages.canonical(&path)?;
            let new_page = inner.pages.canonical(&new_path)?;
            let revision = inner.pages.rename(&old_page, &new_page, &message, &author)?;

            inner.note_index_result("rename", || {
                let content = inner.pages.backend().load(&inner.pages.file_path(&new_page), "")?;
                inner.index.blocking_lock().page_renamed(&old_page, &new_page, &content)
            });
            Ok(revision)
        })
        .await
    }

    /// Apply the inverse of a commit as a new commit, then refresh the
    /// index entries of every page it touched.
    pub async fn revert(&self, revision: &str, message: &str, author: &Author) -> Result<String> {
        let inner = self.inner.clone();
        let (revision, author) = (revision.to_string(), author.clone());
        let message = if message.trim().is_empty() {
            format!("revert {revision}")
        } else {
            message.to_string()
        };

        let _write = self.inner.write_lock.lock().await;
        run_blocking(move || {
            let new_revision = inner.pages.backend().revert(&revision, &message, &author)?;

            inner.note_index_result("revert", || {
                let meta = inner
                    .pages
                    .backend()
                    .metadata("", &new_revision)?
                    .ok_or_else(|| anyhow::anyhow!("revert commit `{new_revision}` not found"))?;
                let index = inner.index.blocking_lock();
                for file in &meta.files {
                    let Some(page_path) = file.strip_suffix(&inner.config.content_suffix) else {
                        continue;
                    };
                    if inner.pages.backend().exists(file) {
                        let content = inner.pages.backend().load(file, "")?;
                        index.page_saved(page_path, &content)?;
                    } else {
                        index.page_deleted(page_path)?;
                    }
                }
                Ok(())
            });
            Ok(new_revision)
        })
        .await
    }

    // ── History / diff ──────────────────────────────────────────────

    /// Repository-wide changelog, most recent first.
    pub async fn changelog(&self, limit: usize) -> Result<Vec<CommitMeta>> {
        let inner = self.inner.clone();
        run_blocking(move || Ok(inner.pages.backend().log("", limit)?)).await
    }

    pub async fn diff(&self, rev_a: &str, rev_b: &str) -> Result<String> {
        let inner = self.inner.clone();
        let (rev_a, rev_b) = (rev_a.to_string(), rev_b.to_string());
        run_blocking(move || Ok(inner.pages.backend().diff(&rev_a, &rev_b)?)).await
    }

    pub async fn show_commit(&self, revision: &str) -> Result<(CommitMeta, String)> {
        let inner = self.inner.clone();
        let revision = revision.to_string();
        run_blocking(move || Ok(inner.pages.backend().show_commit(&revision)?)).await
    }

    // ── Index queries ───────────────────────────────────────────────

    /// Ranked full-text search. Blank queries return no hits.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let inner = self.inner.clone();
        let query = query.to_string();
        run_blocking(move || {
            let limit = inner.config.search_limit;
            inner
                .index
                .blocking_lock()
                .search(&query, limit)
                .map_err(|error| WikiError::Index(format!("{error:#}")))
        })
        .await
    }

    /// Pages whose content links to `path`.
    pub async fn backlinks(&self, path: &str) -> Result<Vec<String>> {
        let target = self.inner.pages.canonical(path)?;
        let inner = self.inner.clone();
        run_blocking(move || {
            inner
                .index
                .blocking_lock()
                .backlinks(&target)
                .map_err(|error| WikiError::Index(format!("{error:#}")))
        })
        .await
    }

    /// Every page in the wiki, sorted by path.
    pub async fn page_index(&self) -> Result<Vec<PageSummary>> {
        let inner = self.inner.clone();
        run_blocking(move || {
            let suffix = inner.config.content_suffix.clone();
            let mut summaries: Vec<PageSummary> = inner
                .pages
                .backend()
                .list("")?
                .into_iter()
                .filter_map(|file| file.strip_suffix(&suffix).map(str::to_string))
                .map(|path| {
                    let segment = path.rsplit('/').next().unwrap_or(&path);
                    PageSummary {
                        name: display_name(segment, inner.config.title_case_names),
                        path: path.clone(),
                    }
                })
                .collect();
            summaries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(summaries)
        })
        .await
    }

    /// Rebuild the whole derived index from repository content. The
    /// recovery path when the index has diverged.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let inner = self.inner.clone();

        let _write = self.inner.write_lock.lock().await;
        run_blocking(move || {
            let suffix = inner.config.content_suffix.clone();
            let mut pages = Vec::new();
            for file in inner.pages.backend().list("")? {
                let Some(page_path) = file.strip_suffix(&suffix) else {
                    continue;
                };
                let content = inner.pages.backend().load(&file, "")?;
                pages.push((page_path.to_string(), content));
            }

            inner
                .index
                .blocking_lock()
                .rebuild(&pages)
                .map_err(|error| WikiError::Index(format!("{error:#}")))
        })
        .await
    }

    // ── Attachments ─────────────────────────────────────────────────

    pub async fn attachments(
        &self,
        path: &str,
        limit: usize,
        exclude_suffix: Option<&str>,
    ) -> Result<Vec<Attachment>> {
        let inner = self.inner.clone();
        let path = path.to_string();
        let exclude = exclude_suffix.map(str::to_string);
        run_blocking(move || inner.pages.attachments(&path, limit, exclude.as_deref())).await
    }

    /// Directory scoping a page's uploaded files.
    pub fn attachment_dir(&self, path: &str) -> Result<String> {
        let page_path = self.inner.pages.canonical(path)?;
        Ok(self.inner.pages.attachment_dir(&page_path))
    }
}

impl WikiInner {
    /// Run a best-effort index update: failures are logged and counted,
    /// never propagated. The repository write already succeeded and the
    /// index can be rebuilt.
    fn note_index_result<F>(&self, operation: &str, update: F)
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        if let Err(error) = update() {
            self.index_failures.fetch_add(1, Ordering::Relaxed);
            warn!(operation, error = %format!("{error:#}"), "index update failed; search may be stale");
        }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|error| WikiError::Backend(format!("blocking task failed: {error}")))?
}

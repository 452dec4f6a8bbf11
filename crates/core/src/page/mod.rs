// Page abstraction: maps page paths onto repository files and composes
// backend operations into page-level ones.
//
// A `Page` is a per-request value built from current (or historical)
// repository state; `Pages` is the long-lived component that builds them
// and runs save/delete/rename.

pub mod guard;

use tracing::warn;
use vellum_common::path::normalize_page_path;
use vellum_common::types::{Attachment, Author, BlameLine, CommitMeta};

use crate::config::WikiConfig;
use crate::error::{Result, WikiError};
use crate::repo::{CommandExecutor, GitBackend, GitError, ProcessCommandExecutor};

/// One wiki page as observed at a single point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Canonical page path (validated, no content suffix).
    pub path: String,
    pub exists: bool,
    /// Page content; empty when the page does not exist.
    pub content: String,
    /// Short revision id of the commit that last touched the page.
    /// Empty for pages never committed and for historical views, so a
    /// form rendered from an old revision cannot silently overwrite the
    /// current one.
    pub revision: String,
    /// Metadata of the commit backing the displayed content.
    pub meta: Option<CommitMeta>,
}

impl Page {
    /// Display name: last path segment, optionally title-cased with
    /// separators turned into spaces.
    pub fn name(&self, title_case: bool) -> String {
        display_name(last_segment(&self.path), title_case)
    }

    /// Path segments leading to this page, for breadcrumb rendering.
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.path.split('/').map(str::to_string).collect()
    }

    /// Directory scoping this page's uploaded files.
    pub fn attachment_dir(&self) -> &str {
        &self.path
    }
}

/// Page-level operations over the repository backend.
pub struct Pages<E = ProcessCommandExecutor> {
    backend: GitBackend<E>,
    config: WikiConfig,
}

impl<E: CommandExecutor> Pages<E> {
    pub fn new(backend: GitBackend<E>, config: WikiConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &GitBackend<E> {
        &self.backend
    }

    pub fn config(&self) -> &WikiConfig {
        &self.config
    }

    /// Validate and canonicalize a raw page path.
    pub fn canonical(&self, raw: &str) -> Result<String> {
        Ok(normalize_page_path(raw, self.config.fold_case)?)
    }

    /// Backend file path for a canonical page path.
    pub fn file_path(&self, page_path: &str) -> String {
        format!("{page_path}{}", self.config.content_suffix)
    }

    /// Attachment directory for a canonical page path (the page path with
    /// the content suffix stripped, used as a directory).
    pub fn attachment_dir(&self, page_path: &str) -> String {
        page_path.to_string()
    }

    /// Build a page from the current working snapshot, or from a specific
    /// historical revision when `revision` is non-empty.
    pub fn load(&self, raw_path: &str, revision: &str) -> Result<Page> {
        let path = self.canonical(raw_path)?;
        let file = self.file_path(&path);

        if revision.is_empty() {
            if !self.backend.exists(&file) {
                return Ok(Page {
                    path,
                    exists: false,
                    content: String::new(),
                    revision: String::new(),
                    meta: None,
                });
            }

            let content = self.backend.load(&file, "")?;
            let meta = self.backend.metadata(&file, "")?;
            let revision = meta.as_ref().map(|m| m.id.clone()).unwrap_or_default();
            return Ok(Page { path, exists: true, content, revision, meta });
        }

        match self.backend.load(&file, revision) {
            Ok(content) => {
                let meta = self.backend.metadata(&file, revision)?;
                // Historical views carry no revision: a save based on one
                // must go through the conflict path.
                Ok(Page { path, exists: true, content, revision: String::new(), meta })
            }
            Err(GitError::PathMissing { .. }) => Ok(Page {
                path,
                exists: false,
                content: String::new(),
                revision: String::new(),
                meta: None,
            }),
            Err(error) => Err(error.into()),
        }
    }

    /// Current committed revision of a page, if it has one. Used by the
    /// service for the conflict check under the write lock.
    ///
    /// A deleted page has no current revision even though `git log` still
    /// knows the deletion commit; there is nothing left to conflict with.
    pub fn current_revision(&self, page_path: &str) -> Result<Option<String>> {
        let file = self.file_path(page_path);
        if !self.backend.exists(&file) {
            return Ok(None);
        }
        Ok(self.backend.current_revision(&file)?)
    }

    /// Store page content as one commit. The concurrency check is the
    /// caller's responsibility and must already have passed.
    pub fn save(
        &self,
        page_path: &str,
        content: &str,
        message: &str,
        author: &Author,
    ) -> Result<String> {
        let file = self.file_path(page_path);
        let message = default_message(message, "update", page_path);
        Ok(self.backend.store(&file, content, &message, author)?)
    }

    /// Delete the page file; with `recursive`, its attachment directory
    /// goes in the same commit.
    pub fn delete(
        &self,
        raw_path: &str,
        message: &str,
        author: &Author,
        recursive: bool,
    ) -> Result<String> {
        let path = self.canonical(raw_path)?;
        let file = self.file_path(&path);

        if !self.backend.exists(&file) {
            return Err(WikiError::NotFound(path));
        }

        let mut targets = vec![file];
        if recursive {
            let dir = self.attachment_dir(&path);
            if self.backend.root().join(&dir).is_dir() {
                targets.push(dir);
            }
        }

        let message = default_message(message, "delete", &path);
        Ok(self.backend.remove(&targets, &message, author)?)
    }

    /// Rename a page: store at the new path, then delete the old path.
    ///
    /// The two halves are separate commits. If the delete fails, the
    /// just-created file is removed again (compensation); if compensation
    /// fails too, the error names the both-paths-exist degraded state
    /// instead of hiding it.
    pub fn rename(
        &self,
        raw_old: &str,
        raw_new: &str,
        message: &str,
        author: &Author,
    ) -> Result<String> {
        let old_path = self.canonical(raw_old)?;
        let new_path = self.canonical(raw_new)?;

        if old_path == new_path {
            return Err(WikiError::Backend(format!(
                "rename source and target are the same page: `{old_path}`"
            )));
        }

        let old_file = self.file_path(&old_path);
        let new_file = self.file_path(&new_path);

        if !self.backend.exists(&old_file) {
            return Err(WikiError::NotFound(old_path));
        }
        if self.backend.exists(&new_file) {
            let current = self.backend.current_revision(&new_file)?.unwrap_or_default();
            return Err(WikiError::Conflict { current_revision: current });
        }

        let content = self.backend.load(&old_file, "")?;
        let message = default_message(message, "rename", &old_path);

        self.backend.store(&new_file, &content, &message, author)?;

        if let Err(delete_error) = self.backend.remove(&[old_file], &message, author) {
            warn!(
                old = %old_path,
                new = %new_path,
                error = %delete_error,
                "rename second half failed, compensating"
            );
            let compensation = format!("roll back rename of {old_path}");
            if let Err(comp_error) = self.backend.remove(
                &[new_file],
                &compensation,
                author,
            ) {
                return Err(WikiError::Backend(format!(
                    "rename of `{old_path}` to `{new_path}` failed ({delete_error}) and \
                     compensation failed ({comp_error}); both paths currently exist"
                )));
            }
            return Err(delete_error.into());
        }

        self.backend
            .current_revision(&self.file_path(&new_path))?
            .ok_or_else(|| WikiError::Backend("rename left no revision for new path".into()))
    }

    /// History for one page, most recent first.
    pub fn history(&self, raw_path: &str, limit: usize) -> Result<Vec<CommitMeta>> {
        let path = self.canonical(raw_path)?;
        Ok(self.backend.log(&self.file_path(&path), limit)?)
    }

    /// Per-line attribution for the page's current content.
    pub fn blame(&self, raw_path: &str) -> Result<Vec<BlameLine>> {
        let path = self.canonical(raw_path)?;
        Ok(self.backend.blame(&self.file_path(&path))?)
    }

    /// Files uploaded under the page's attachment directory. Files ending
    /// in `exclude_suffix` (normally the content suffix, i.e. sub-pages)
    /// are filtered out.
    pub fn attachments(
        &self,
        raw_path: &str,
        limit: usize,
        exclude_suffix: Option<&str>,
    ) -> Result<Vec<Attachment>> {
        let path = self.canonical(raw_path)?;
        let dir = format!("{}/", self.attachment_dir(&path));

        let files = self.backend.list(&dir)?;
        Ok(files
            .into_iter()
            .filter(|f| exclude_suffix.map_or(true, |suffix| !f.ends_with(suffix)))
            .take(limit)
            .map(|full_path| {
                let file_name = last_segment(&full_path).to_string();
                let mime_type = infer_mime(&file_name).to_string();
                Attachment { file_name, full_path, mime_type }
            })
            .collect())
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn default_message(message: &str, verb: &str, page_path: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        format!("{verb} {page_path}")
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn display_name(segment: &str, title_case: bool) -> String {
    if !title_case {
        return segment.to_string();
    }

    segment
        .split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Best-effort mime type from a file extension. Unknown extensions fall
/// back to the generic byte stream type.
fn infer_mime(file_name: &str) -> &'static str {
    let extension = file_name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "md" | "markdown" => "text/markdown",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

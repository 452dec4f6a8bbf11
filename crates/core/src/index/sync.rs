// Incremental index updates on page save / delete / rename, plus the
// wholesale rebuild used to recover from divergence.
//
// Callers treat every method here as best-effort: the repository write is
// authoritative and has already succeeded by the time these run.

use anyhow::{Context, Result};
use rusqlite::params;
use sha2::{Digest, Sha256};
use tracing::debug;
use vellum_common::wikilink::parse_links;

use super::db::IndexDb;
use super::fts::{Fts5Index, IndexEntry, SearchHit, SearchIndex};
use super::links::{resolve_link_targets, LinkStore};

/// Keeps the derived index in step with repository content.
pub struct IndexSynchronizer {
    db: IndexDb,
    fold_case: bool,
}

impl IndexSynchronizer {
    pub fn new(db: IndexDb, fold_case: bool) -> Self {
        Self { db, fold_case }
    }

    /// Index a page after a successful save. Skips the rewrite when the
    /// content hash matches what is already indexed.
    pub fn page_saved(&self, path: &str, content: &str) -> Result<()> {
        let hash = content_hash(content);
        if self.stored_hash(path)?.as_deref() == Some(hash.as_str()) {
            debug!(%path, "index already current, skipping");
            return Ok(());
        }

        let existing = self.page_paths()?;
        let tx = self
            .db
            .connection()
            .unchecked_transaction()
            .context("failed to start index update transaction")?;

        self.write_page_entry(path, content, &hash, &existing)?;

        tx.commit().context("failed to commit index update")?;
        debug!(%path, "search index updated");
        Ok(())
    }

    /// Drop a page's entries after it was deleted. Links *to* the page
    /// from other pages stay: they still exist in those pages' content.
    pub fn page_deleted(&self, path: &str) -> Result<()> {
        let tx = self
            .db
            .connection()
            .unchecked_transaction()
            .context("failed to start index delete transaction")?;

        self.drop_page_entry(path)?;

        tx.commit().context("failed to commit index delete")?;
        debug!(%path, "search index entry removed");
        Ok(())
    }

    /// Relocate a page's entries after a rename.
    pub fn page_renamed(&self, old_path: &str, new_path: &str, content: &str) -> Result<()> {
        let existing = self.page_paths()?;
        let tx = self
            .db
            .connection()
            .unchecked_transaction()
            .context("failed to start index rename transaction")?;

        self.drop_page_entry(old_path)?;
        self.write_page_entry(new_path, content, &content_hash(content), &existing)?;

        tx.commit().context("failed to commit index rename")?;
        debug!(old = %old_path, new = %new_path, "search index rename handled");
        Ok(())
    }

    /// Throw the whole index away and repopulate it from `(path, content)`
    /// pairs scanned out of the repository. Returns the number of pages
    /// indexed.
    pub fn rebuild(&self, pages: &[(String, String)]) -> Result<usize> {
        let all_paths: Vec<String> = pages.iter().map(|(path, _)| path.clone()).collect();

        let tx = self
            .db
            .connection()
            .unchecked_transaction()
            .context("failed to start index rebuild transaction")?;

        let conn = self.db.connection();
        Fts5Index::new(conn).rebuild(&[])?;
        LinkStore::new(conn).clear()?;
        conn.execute("DELETE FROM pages", [])
            .context("failed to clear pages table for rebuild")?;

        for (path, content) in pages {
            self.write_page_entry(path, content, &content_hash(content), &all_paths)?;
        }

        tx.commit().context("failed to commit index rebuild")?;
        debug!(count = pages.len(), "search index rebuilt");
        Ok(pages.len())
    }

    /// All indexed page paths, sorted.
    pub fn page_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT path FROM pages ORDER BY path")
            .context("failed to prepare page list query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query indexed pages")?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to collect indexed pages")
    }

    /// Ranked full-text search over indexed pages.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Fts5Index::new(self.db.connection()).search(query, limit)
    }

    /// Pages whose content links to `target_path`, sorted and deduplicated.
    pub fn backlinks(&self, target_path: &str) -> Result<Vec<String>> {
        let mut sources: Vec<String> = LinkStore::new(self.db.connection())
            .incoming_for_target(target_path)?
            .into_iter()
            .map(|link| link.source_path)
            .collect();
        sources.dedup();
        Ok(sources)
    }

    fn write_page_entry(
        &self,
        path: &str,
        content: &str,
        hash: &str,
        existing_pages: &[String],
    ) -> Result<()> {
        let conn = self.db.connection();
        let title = extract_title(content, path);

        Fts5Index::new(conn).upsert(&IndexEntry {
            path: path.to_string(),
            title: title.clone(),
            content: content.to_string(),
        })?;

        let resolved =
            resolve_link_targets(path, &parse_links(content), existing_pages, self.fold_case);
        LinkStore::new(conn).replace_for_source(path, &resolved)?;

        conn.execute(
            "INSERT INTO pages (path, title, content_hash, indexed_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(path) DO UPDATE SET
                 title = excluded.title,
                 content_hash = excluded.content_hash,
                 indexed_at = excluded.indexed_at",
            params![path, title, hash],
        )
        .context("failed to upsert page index row")?;

        Ok(())
    }

    fn drop_page_entry(&self, path: &str) -> Result<()> {
        let conn = self.db.connection();
        Fts5Index::new(conn).remove(path)?;
        LinkStore::new(conn).remove_source(path)?;
        conn.execute("DELETE FROM pages WHERE path = ?1", params![path])
            .context("failed to delete page index row")?;
        Ok(())
    }

    fn stored_hash(&self, path: &str) -> Result<Option<String>> {
        self.db
            .connection()
            .query_row("SELECT content_hash FROM pages WHERE path = ?1", params![path], |row| {
                row.get(0)
            })
            .map(Some)
            .or_else(|error| match error {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("failed to read stored content hash")
    }
}

/// Extract a page title from its content.
///
/// Uses the first `# Heading` found; falls back to the last path segment.
pub fn extract_title(content: &str, path: &str) -> String {
    for line in content.lines() {
        if let Some(heading) = line.trim().strip_prefix("# ") {
            let title = heading.trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexDb;

    fn synchronizer() -> IndexSynchronizer {
        IndexSynchronizer::new(IndexDb::open_in_memory().unwrap(), false)
    }

    // ── extract_title ─────────────────────────────────────────────────

    #[test]
    fn title_from_first_h1() {
        assert_eq!(extract_title("# Storage Layout\n\nBody.\n", "docs/storage"), "Storage Layout");
    }

    #[test]
    fn title_ignores_deeper_headings() {
        assert_eq!(extract_title("## Not a title\n", "docs/storage"), "storage");
    }

    #[test]
    fn title_falls_back_to_last_segment() {
        assert_eq!(extract_title("plain text only", "guides/setup"), "setup");
        assert_eq!(extract_title("", "home"), "home");
    }

    // ── save / delete / rename ────────────────────────────────────────

    #[test]
    fn saved_page_is_searchable_and_linked() {
        let sync = synchronizer();

        sync.page_saved("docs/auth", "# Auth\n\nSee [[docs/tokens]].").unwrap();

        let hits = sync.search("Auth", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "docs/auth");

        assert_eq!(sync.backlinks("docs/tokens").unwrap(), vec!["docs/auth".to_string()]);
        assert_eq!(sync.page_paths().unwrap(), vec!["docs/auth".to_string()]);
    }

    #[test]
    fn unchanged_content_skips_the_rewrite() {
        let sync = synchronizer();
        sync.page_saved("home", "# Home\n\nStable content.").unwrap();

        // Sabotage the FTS row behind the synchronizer's back; a skipped
        // update must leave the sabotage visible.
        sync.db.connection().execute("DELETE FROM page_search WHERE path = 'home'", []).unwrap();

        sync.page_saved("home", "# Home\n\nStable content.").unwrap();
        assert!(sync.search("Stable", 10).unwrap().is_empty(), "update should have been skipped");

        // A real change reindexes.
        sync.page_saved("home", "# Home\n\nChanged content.").unwrap();
        assert_eq!(sync.search("Changed", 10).unwrap().len(), 1);
    }

    #[test]
    fn deleted_page_disappears_from_search_and_links() {
        let sync = synchronizer();
        sync.page_saved("a", "links to [[b]]").unwrap();
        sync.page_saved("b", "# B\n\ntarget page").unwrap();

        sync.page_deleted("a").unwrap();

        assert!(sync.search("links", 10).unwrap().is_empty());
        assert!(sync.backlinks("b").unwrap().is_empty());
        assert_eq!(sync.page_paths().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn links_to_a_deleted_page_survive() {
        let sync = synchronizer();
        sync.page_saved("a", "see [[b]]").unwrap();
        sync.page_saved("b", "# B").unwrap();

        sync.page_deleted("b").unwrap();

        // Page a still references b in its content, so the backlink stays
        // until a itself is re-indexed.
        assert_eq!(sync.backlinks("b").unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn rename_relocates_entries() {
        let sync = synchronizer();
        sync.page_saved("drafts/plan", "# Plan\n\nSee [[home]].").unwrap();

        sync.page_renamed("drafts/plan", "docs/plan", "# Plan\n\nSee [[home]].").unwrap();

        let hits = sync.search("Plan", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "docs/plan");

        assert_eq!(sync.backlinks("home").unwrap(), vec!["docs/plan".to_string()]);
        assert_eq!(sync.page_paths().unwrap(), vec!["docs/plan".to_string()]);
    }

    // ── rebuild ───────────────────────────────────────────────────────

    #[test]
    fn rebuild_replaces_everything() {
        let sync = synchronizer();
        sync.page_saved("stale", "old world").unwrap();

        let count = sync
            .rebuild(&[
                ("docs/a".to_string(), "# A\n\nlinks [[docs/b]]".to_string()),
                ("docs/b".to_string(), "# B\n\nfresh world".to_string()),
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert!(sync.search("old", 10).unwrap().is_empty());
        assert_eq!(sync.search("fresh", 10).unwrap().len(), 1);
        assert_eq!(sync.backlinks("docs/b").unwrap(), vec!["docs/a".to_string()]);
        assert_eq!(
            sync.page_paths().unwrap(),
            vec!["docs/a".to_string(), "docs/b".to_string()]
        );
    }

    #[test]
    fn rebuild_with_no_pages_empties_the_index() {
        let sync = synchronizer();
        sync.page_saved("a", "content").unwrap();

        assert_eq!(sync.rebuild(&[]).unwrap(), 0);
        assert!(sync.search("content", 10).unwrap().is_empty());
        assert!(sync.page_paths().unwrap().is_empty());
    }

    // ── backlink resolution through saves ─────────────────────────────

    #[test]
    fn backlinks_reflect_segment_resolution() {
        let sync = synchronizer();
        sync.page_saved("docs/tokens", "# Tokens").unwrap();
        sync.page_saved("home", "start with [[Tokens]]").unwrap();

        assert_eq!(sync.backlinks("docs/tokens").unwrap(), vec!["home".to_string()]);
    }

    #[test]
    fn backlinks_to_future_pages_appear_once_linked() {
        let sync = synchronizer();
        sync.page_saved("home", "see [[drafts/roadmap]]").unwrap();

        // Target does not exist yet; the canonical form still inverts.
        assert_eq!(sync.backlinks("drafts/roadmap").unwrap(), vec!["home".to_string()]);
    }
}

// Wiki-link target resolution + SQLite persistence of the link graph.
//
// Resolution order (first match wins):
// 1) Exact canonical page path
// 2) Last path segment (case-insensitive) of an existing page
// 3) The canonical target itself: the page may not exist yet, and the
//    backlink appears as soon as it is created.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use vellum_common::path::normalize_page_path;
use vellum_common::wikilink::WikiLink;

/// A resolved outbound link edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub source_path: String,
    pub target_path: String,
    /// Raw wiki link text (inner `[[...]]` content).
    pub link_text: String,
}

/// Resolve parsed wiki links from `source_path` to canonical page paths.
///
/// `existing_pages` is the set of currently indexed page paths; targets
/// that validate but match nothing are kept under their canonical form so
/// links to not-yet-written pages invert correctly later.
pub fn resolve_link_targets(
    source_path: &str,
    links: &[WikiLink],
    existing_pages: &[String],
    fold_case: bool,
) -> Vec<ResolvedLink> {
    links
        .iter()
        .filter_map(|link| {
            let target_path = resolve_target(&link.target, existing_pages, fold_case)?;
            Some(ResolvedLink {
                source_path: source_path.to_string(),
                target_path,
                link_text: link.raw.clone(),
            })
        })
        .collect()
}

fn resolve_target(target: &str, existing_pages: &[String], fold_case: bool) -> Option<String> {
    let canonical = normalize_page_path(target, fold_case).ok()?;

    // 1) exact path
    if existing_pages.iter().any(|page| *page == canonical) {
        return Some(canonical);
    }

    // 2) last segment, case-insensitive
    let segment_key = last_segment(&canonical).to_lowercase();
    if let Some(page) =
        existing_pages.iter().find(|page| last_segment(page).to_lowercase() == segment_key)
    {
        return Some(page.clone());
    }

    // 3) future page
    Some(canonical)
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// SQLite-backed link-graph persistence.
///
/// Statements run without their own transaction; the synchronizer wraps a
/// whole logical update in one.
pub struct LinkStore<'a> {
    conn: &'a Connection,
}

impl<'a> LinkStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Replace all outbound links recorded for a source page.
    pub fn replace_for_source(&self, source_path: &str, links: &[ResolvedLink]) -> Result<()> {
        self.remove_source(source_path)?;

        for link in links {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO page_links (source_path, target_path, link_text)
                     VALUES (?1, ?2, ?3)",
                    params![link.source_path, link.target_path, link.link_text],
                )
                .context("failed to insert resolved link")?;
        }

        Ok(())
    }

    /// Drop all outbound links recorded for a source page.
    pub fn remove_source(&self, source_path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM page_links WHERE source_path = ?1", params![source_path])
            .context("failed to clear links for source page")?;
        Ok(())
    }

    /// Pages whose outbound set contains `target_path`, i.e. the backlinks
    /// of that page.
    pub fn incoming_for_target(&self, target_path: &str) -> Result<Vec<ResolvedLink>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT source_path, target_path, link_text
                 FROM page_links
                 WHERE target_path = ?1
                 ORDER BY source_path, link_text",
            )
            .context("failed to prepare backlink query")?;

        let rows = stmt
            .query_map(params![target_path], |row| {
                Ok(ResolvedLink {
                    source_path: row.get(0)?,
                    target_path: row.get(1)?,
                    link_text: row.get(2)?,
                })
            })
            .context("failed to query backlinks")?;

        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to collect backlinks")
    }

    /// Drop the whole link graph (rebuild support).
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM page_links", [])
            .context("failed to clear page_links for rebuild")?;
        Ok(())
    }
}

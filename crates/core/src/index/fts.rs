// FTS5-based full-text page search.
// Behind the SearchIndex trait so the storage can be swapped later.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// A single search hit returned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub snippet: String,
    /// Total occurrences of the query terms in the page content.
    pub match_count: usize,
    /// Relevance score, larger is better (negated bm25).
    pub rank: f64,
}

/// Page to be indexed.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub path: String,
    pub title: String,
    pub content: String,
}

/// Abstraction over full-text page search.
pub trait SearchIndex {
    /// Index or update a page.
    fn upsert(&self, entry: &IndexEntry) -> Result<()>;

    /// Remove a page from the index.
    fn remove(&self, path: &str) -> Result<()>;

    /// Search the index. Empty or blank queries return no hits.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Drop all indexed data and repopulate from `entries`.
    fn rebuild(&self, entries: &[IndexEntry]) -> Result<()>;
}

/// SQLite FTS5-backed search index.
///
/// Lives in the same connection as the rest of the derived index; the
/// schema is owned by `IndexDb` migrations. Statements here run without
/// their own transaction so the synchronizer can wrap a whole logical
/// update in one.
pub struct Fts5Index<'a> {
    conn: &'a Connection,
}

impl<'a> Fts5Index<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SearchIndex for Fts5Index<'_> {
    fn upsert(&self, entry: &IndexEntry) -> Result<()> {
        // FTS5 has no ON CONFLICT, so delete-then-insert.
        self.conn
            .execute("DELETE FROM page_search WHERE path = ?1", params![entry.path])
            .context("failed to delete old search entry")?;

        self.conn
            .execute(
                "INSERT INTO page_search (path, title, content) VALUES (?1, ?2, ?3)",
                params![entry.path, entry.title, entry.content],
            )
            .context("failed to insert search entry")?;

        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM page_search WHERE path = ?1", params![path])
            .context("failed to remove search entry")?;
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(match_expr) = fts_match_expression(query) else {
            return Ok(vec![]);
        };

        let mut stmt = self
            .conn
            .prepare(
                "SELECT path, title,
                        snippet(page_search, 2, '<b>', '</b>', '…', 24),
                        content,
                        -rank
                 FROM page_search
                 WHERE page_search MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )
            .context("failed to prepare search query")?;

        let terms = query_terms(query);
        let hits = stmt
            .query_map(params![match_expr, limit as i64], |row| {
                let content: String = row.get(3)?;
                Ok(SearchHit {
                    path: row.get(0)?,
                    title: row.get(1)?,
                    snippet: row.get(2)?,
                    match_count: count_term_matches(&content, &terms),
                    rank: row.get(4)?,
                })
            })
            .context("failed to execute search query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to collect search results")?;

        Ok(hits)
    }

    fn rebuild(&self, entries: &[IndexEntry]) -> Result<()> {
        self.conn
            .execute("DELETE FROM page_search", [])
            .context("failed to clear page_search for rebuild")?;

        for entry in entries {
            self.conn
                .execute(
                    "INSERT INTO page_search (path, title, content) VALUES (?1, ?2, ?3)",
                    params![entry.path, entry.title, entry.content],
                )
                .context("failed to insert entry during rebuild")?;
        }

        Ok(())
    }
}

/// Build the FTS5 MATCH expression for a user query.
///
/// Each whitespace-separated term is quoted so user input can never be
/// interpreted as FTS5 operator syntax. Returns `None` for blank queries:
/// an empty query means zero results, not all pages.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return None;
    }
    Some(terms.iter().map(|t| format!("\"{t}\"")).collect::<Vec<_>>().join(" "))
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        // A term with no word characters tokenizes to an empty phrase,
        // which FTS5 rejects.
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .collect()
}

/// Case-insensitive occurrence count of every term in the content.
fn count_term_matches(content: &str, terms: &[String]) -> usize {
    let haystack = content.to_lowercase();
    terms
        .iter()
        .map(|term| haystack.matches(&term.to_lowercase()).count())
        .sum()
}

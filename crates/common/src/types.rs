// Core domain types shared across all Vellum crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author identity attached to every commit.
///
/// Supplied by the embedding host (auth layer); falls back to the
/// anonymous placeholder when no identity is available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }

    /// Placeholder identity for unauthenticated writes.
    pub fn anonymous() -> Self {
        Self { name: "Anonymous".into(), email: "anonymous@localhost".into() }
    }

    /// `Name <email>` form as git expects it on the command line.
    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

impl Default for Author {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// One unit of repository history. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitMeta {
    /// Abbreviated revision id, e.g. `4c2a91f`.
    pub id: String,
    /// Full unabbreviated revision id.
    pub full_id: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    /// Free-text commit message.
    pub message: String,
    /// File paths touched by this commit.
    pub files: Vec<String>,
}

/// A page listed in the global page index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSummary {
    /// Display name derived from the last path segment.
    pub name: String,
    /// Canonical page path.
    pub path: String,
}

/// An uploaded file scoped to a page's attachment directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    /// Repository-relative path of the attachment file.
    pub full_path: String,
    pub mime_type: String,
}

/// Per-line attribution produced by blame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlameLine {
    /// 1-based line number in the current file.
    pub line_no: usize,
    pub content: String,
    /// Abbreviated revision that last changed this line.
    pub revision: String,
    pub author: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_author_is_the_default() {
        assert_eq!(Author::default(), Author::anonymous());
        assert_eq!(Author::anonymous().name, "Anonymous");
    }

    #[test]
    fn signature_formats_like_git() {
        let author = Author::new("Ada Lovelace", "ada@example.com");
        assert_eq!(author.signature(), "Ada Lovelace <ada@example.com>");
    }

    #[test]
    fn commit_meta_serializes_with_snake_case_fields() {
        let meta = CommitMeta {
            id: "4c2a91f".into(),
            full_id: "4c2a91f8d3b0a7e6c5d4f3a2b1c0d9e8f7a6b5c4".into(),
            author_name: "Ada".into(),
            author_email: "ada@example.com".into(),
            timestamp: Utc::now(),
            message: "edit docs/intro".into(),
            files: vec!["docs/intro.md".into()],
        };

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["full_id"], meta.full_id);
        assert_eq!(value["author_email"], "ada@example.com");
        assert_eq!(value["files"][0], "docs/intro.md");
    }
}

// Parsers for machine-formatted git output.
//
// `git log` is driven with an ASCII unit/record separator format so commit
// messages may contain anything printable without breaking field splits.
// Blame uses the porcelain format, which only prints the full header block
// the first time a commit appears.

use chrono::{DateTime, Utc};
use thiserror::Error;
use vellum_common::types::{BlameLine, CommitMeta};

/// Log format handed to `git log --format=`.
///
/// Layout per record (0x1e = record separator, 0x1f = unit separator):
/// `\x1e<short>\x1f<full>\x1f<author>\x1f<email>\x1f<iso date>\x1f<body>\x1f`
///
/// The trailing separator isolates the body from the `--name-only` file
/// list that git appends after each record.
pub const LOG_FORMAT: &str = "%x1e%h%x1f%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1f";

const RECORD_SEP: char = '\u{1e}';
const UNIT_SEP: char = '\u{1f}';

/// Abbreviated revision length used when deriving short ids ourselves
/// (blame porcelain only carries full ids).
const SHORT_ID_LEN: usize = 7;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed log record: {0}")]
    MalformedRecord(String),

    #[error("unparseable commit timestamp: {0}")]
    BadTimestamp(String),

    #[error("malformed blame output near: {0}")]
    MalformedBlame(String),
}

/// Parse the output of `git log --format=LOG_FORMAT --name-only`.
///
/// Records arrive most-recent-first and are returned in that order.
pub fn parse_log_records(output: &str) -> Result<Vec<CommitMeta>, ParseError> {
    let mut commits = Vec::new();

    for record in output.split(RECORD_SEP) {
        if record.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = record.split(UNIT_SEP).collect();
        if fields.len() < 7 {
            return Err(ParseError::MalformedRecord(truncate_for_error(record)));
        }

        let timestamp = DateTime::parse_from_rfc3339(fields[4])
            .map_err(|_| ParseError::BadTimestamp(fields[4].to_string()))?
            .with_timezone(&Utc);

        // Everything after the final unit separator is the --name-only
        // file list (one path per line, surrounded by blank lines).
        let files = fields[6]
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        commits.push(CommitMeta {
            id: fields[0].to_string(),
            full_id: fields[1].to_string(),
            author_name: fields[2].to_string(),
            author_email: fields[3].to_string(),
            timestamp,
            message: fields[5].trim().to_string(),
            files,
        });
    }

    Ok(commits)
}

/// Parse `git blame --porcelain` output into per-line attribution.
///
/// Porcelain emits a header line `<full sha> <orig> <final> [count]` for
/// every content line, but the `author` tag only on a commit's first
/// appearance, so attribution is cached per sha.
pub fn parse_blame_porcelain(output: &str) -> Result<Vec<BlameLine>, ParseError> {
    let mut authors: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    let mut lines = Vec::new();

    let mut current_sha: Option<String> = None;
    let mut current_line_no: usize = 0;

    for raw in output.lines() {
        if let Some(content) = raw.strip_prefix('\t') {
            let sha = current_sha
                .as_deref()
                .ok_or_else(|| ParseError::MalformedBlame(truncate_for_error(raw)))?;
            let author = authors.get(sha).cloned().unwrap_or_default();
            lines.push(BlameLine {
                line_no: current_line_no,
                content: content.to_string(),
                revision: sha.chars().take(SHORT_ID_LEN).collect(),
                author,
            });
            continue;
        }

        if let Some(rest) = raw.strip_prefix("author ") {
            if let Some(sha) = current_sha.as_deref() {
                authors.insert(sha.to_string(), rest.to_string());
            }
            continue;
        }

        if is_header_line(raw) {
            let mut parts = raw.split_whitespace();
            let sha = parts.next().unwrap_or_default().to_string();
            let final_line = parts
                .nth(1)
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ParseError::MalformedBlame(truncate_for_error(raw)))?;
            current_sha = Some(sha);
            current_line_no = final_line;
        }
        // Other porcelain tags (author-mail, committer, summary, filename,
        // boundary, previous) carry nothing we surface.
    }

    Ok(lines)
}

fn is_header_line(line: &str) -> bool {
    let Some(first) = line.split_whitespace().next() else {
        return false;
    };
    first.len() == 40 && first.chars().all(|c| c.is_ascii_hexdigit())
}

fn truncate_for_error(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(MAX).collect();
        format!("{prefix}…")
    }
}

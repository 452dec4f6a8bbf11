// Wiki-style page link parsing (`[[target]]` syntax).
//
// Supported forms:
// - [[target]]
// - [[target|label]]
// - [[target#section]]
// - [[target#section|label]]
//
// Targets name other pages; the index layer resolves them to canonical
// page paths.

/// A parsed page link from page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// Target page text before any `#section` fragment.
    pub target: String,
    /// Optional section fragment after `#`.
    pub fragment: Option<String>,
    /// Optional display label after `|`.
    pub label: Option<String>,
    /// Raw inner text between `[[` and `]]`.
    pub raw: String,
}

/// Parse `[[...]]` page links out of raw page content.
///
/// The parser works on plain text and does not interpret surrounding
/// markdown, which is what an extract-on-save indexing pipeline wants:
/// links inside code fences still count as references.
pub fn parse_links(content: &str) -> Vec<WikiLink> {
    let mut links = Vec::new();
    let mut rest = content;

    while let Some(open) = rest.find("[[") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("]]") else {
            break;
        };

        if let Some(link) = parse_inner(&after_open[..close]) {
            links.push(link);
        }
        rest = &after_open[close + 2..];
    }

    links
}

fn parse_inner(inner: &str) -> Option<WikiLink> {
    let raw = inner.trim();
    if raw.is_empty() {
        return None;
    }

    let (target_part, label_part) = match raw.split_once('|') {
        Some((left, right)) => (left.trim(), Some(right.trim())),
        None => (raw, None),
    };

    let (target, fragment_part) = match target_part.split_once('#') {
        Some((left, right)) => (left.trim(), Some(right.trim())),
        None => (target_part, None),
    };

    if target.is_empty() {
        return None;
    }

    Some(WikiLink {
        target: target.to_string(),
        fragment: fragment_part.filter(|f| !f.is_empty()).map(str::to_string),
        label: label_part.filter(|l| !l.is_empty()).map(str::to_string),
        raw: raw.to_string(),
    })
}

// Page path canonicalization: NFKC normalization, traversal rejection,
// hidden-component rejection, 256 char max.
//
// Every path entering the repository backend passes through here first;
// a path that fails validation must never reach the filesystem.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum allowed page path length in characters.
const MAX_PATH_CHARS: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("page path is empty")]
    Empty,

    #[error("page path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("page path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("page path contains null byte")]
    NullByte,

    #[error("page path contains hidden component: {0}")]
    Hidden(String),

    #[error("page path contains invalid component: {0}")]
    InvalidComponent(String),
}

/// Normalize a page path for safe storage and uniqueness checking.
///
/// Rules:
/// - Apply Unicode NFKC normalization
/// - Convert all separators to `/`
/// - Collapse consecutive `/` into one
/// - Strip leading and trailing `/`
/// - Reject `.` and `..` path components (traversal)
/// - Reject components starting with `.` (keeps `.git` and other dotted
///   directories unreachable through the page namespace)
/// - Reject null bytes and whitespace-only components
/// - Lowercase the whole path when `fold_case` is set
/// - Enforce a 256 character limit (after normalization)
pub fn normalize_page_path(input: &str, fold_case: bool) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let normalized: String = input.nfkc().collect();
    let unified = normalized.replace('\\', "/");

    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();
    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        match *component {
            "." | ".." => return Err(PathError::Traversal(component.to_string())),
            c if c.starts_with('.') => return Err(PathError::Hidden(c.to_string())),
            c if c.trim().is_empty() => {
                return Err(PathError::InvalidComponent(
                    "(whitespace-only component)".to_string(),
                ))
            }
            _ => {}
        }
    }

    let joined = components.join("/");
    let result = if fold_case { joined.to_lowercase() } else { joined };

    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Valid paths
    #[test]
    fn simple_path_passes_through() {
        assert_eq!(normalize_page_path("docs/intro", false).unwrap(), "docs/intro");
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(
            normalize_page_path("docs\\guides\\setup", false).unwrap(),
            "docs/guides/setup"
        );
    }

    #[test]
    fn leading_and_trailing_slashes_are_stripped() {
        assert_eq!(normalize_page_path("/docs/intro/", false).unwrap(), "docs/intro");
    }

    #[test]
    fn consecutive_slashes_collapse() {
        assert_eq!(
            normalize_page_path("docs///nested//page", false).unwrap(),
            "docs/nested/page"
        );
    }

    #[test]
    fn single_segment_page() {
        assert_eq!(normalize_page_path("home", false).unwrap(), "home");
    }

    #[test]
    fn nfkc_collapses_compatibility_forms() {
        // U+FB01 is the "fi" ligature; NFKC expands it to plain "fi".
        assert_eq!(normalize_page_path("docs/\u{FB01}le", false).unwrap(), "docs/file");
    }

    #[test]
    fn nfkc_unifies_combining_sequences() {
        let decomposed = normalize_page_path("docs/caf\u{0065}\u{0301}", false).unwrap();
        let composed = normalize_page_path("docs/café", false).unwrap();
        assert_eq!(decomposed, composed);
    }

    // Case folding
    #[test]
    fn case_folding_lowercases_every_segment() {
        assert_eq!(
            normalize_page_path("Docs/Getting-Started", true).unwrap(),
            "docs/getting-started"
        );
    }

    #[test]
    fn case_folding_disabled_preserves_case() {
        assert_eq!(
            normalize_page_path("Docs/Getting-Started", false).unwrap(),
            "Docs/Getting-Started"
        );
    }

    // Traversal attacks
    #[test]
    fn rejects_dotdot_components() {
        assert_eq!(
            normalize_page_path("docs/../etc/passwd", false),
            Err(PathError::Traversal("..".to_string()))
        );
    }

    #[test]
    fn rejects_leading_dotdot() {
        assert_eq!(
            normalize_page_path("../../../etc/passwd", false),
            Err(PathError::Traversal("..".to_string()))
        );
    }

    #[test]
    fn rejects_single_dot_component() {
        assert_eq!(
            normalize_page_path("docs/./intro", false),
            Err(PathError::Traversal(".".to_string()))
        );
    }

    #[test]
    fn rejects_backslash_traversal() {
        assert_eq!(
            normalize_page_path("docs\\..\\evil", false),
            Err(PathError::Traversal("..".to_string()))
        );
    }

    // Hidden components
    #[test]
    fn rejects_git_directory() {
        assert_eq!(
            normalize_page_path(".git/config", false),
            Err(PathError::Hidden(".git".to_string()))
        );
    }

    #[test]
    fn rejects_nested_hidden_component() {
        assert_eq!(
            normalize_page_path("docs/.secrets/keys", false),
            Err(PathError::Hidden(".secrets".to_string()))
        );
    }

    #[test]
    fn rejects_triple_dot_component_as_hidden() {
        assert_eq!(
            normalize_page_path("docs/...", false),
            Err(PathError::Hidden("...".to_string()))
        );
    }

    // Edge cases
    #[test]
    fn rejects_empty_input() {
        assert_eq!(normalize_page_path("", false), Err(PathError::Empty));
    }

    #[test]
    fn rejects_only_slashes() {
        assert_eq!(normalize_page_path("///", false), Err(PathError::Empty));
    }

    #[test]
    fn rejects_null_byte() {
        assert_eq!(normalize_page_path("docs/intro\0", false), Err(PathError::NullByte));
    }

    #[test]
    fn rejects_over_max_length() {
        let long = "a/".repeat(200);
        assert_eq!(normalize_page_path(&long, false), Err(PathError::TooLong));
    }

    #[test]
    fn max_length_boundary() {
        let path = "a".repeat(256);
        assert!(normalize_page_path(&path, false).is_ok());
        let path = "a".repeat(257);
        assert_eq!(normalize_page_path(&path, false), Err(PathError::TooLong));
    }

    // Names that look odd but are valid
    #[test]
    fn dots_inside_segment_are_allowed() {
        assert_eq!(
            normalize_page_path("release.notes.2024", false).unwrap(),
            "release.notes.2024"
        );
    }
}

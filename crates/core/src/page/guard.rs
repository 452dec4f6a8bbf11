// Optimistic concurrency check for page saves.
//
// A pure function of (base revision, current revision) with no I/O, so the
// two-state machine is testable without a repository. The service evaluates
// it after acquiring the write lock and immediately before committing.

/// Outcome of comparing the editor's base revision with the page's
/// current revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveCheck {
    /// Base matches current (or the page is new): commit may proceed.
    Proceed,
    /// The page moved on since the editor loaded it. Carries the revision
    /// the page is at now so the caller can retry knowingly.
    Conflict { current_revision: String },
}

impl SaveCheck {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Compare the caller-supplied base revision against the page's current
/// revision.
///
/// - Page has no committed revision: any save proceeds. An empty base is
///   the normal new-page creation; a non-empty base means the page was
///   deleted since the editor loaded it, and re-creating it loses nothing.
/// - Page has a revision and the base is empty: a racing creator already
///   committed, so creation conflicts (conflict-on-create policy).
/// - Otherwise revisions are compared as opaque trimmed strings.
pub fn check_base_revision(base_revision: &str, current_revision: Option<&str>) -> SaveCheck {
    let Some(current) = current_revision else {
        return SaveCheck::Proceed;
    };

    let base = base_revision.trim();
    if base == current.trim() {
        SaveCheck::Proceed
    } else {
        SaveCheck::Conflict { current_revision: current.trim().to_string() }
    }
}

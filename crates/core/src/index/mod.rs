// Derived index: full-text search and the inter-page link graph.
//
// Everything here mirrors repository content and can be rebuilt from it;
// the repository is authoritative and index failures never fail a write.

pub mod db;
pub mod fts;
pub mod links;
pub mod sync;

pub use db::IndexDb;
pub use fts::{Fts5Index, IndexEntry, SearchHit, SearchIndex};
pub use links::{resolve_link_targets, LinkStore, ResolvedLink};
pub use sync::{extract_title, IndexSynchronizer};

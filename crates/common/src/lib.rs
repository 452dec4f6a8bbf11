// vellum-common: shared types and utilities for the Vellum workspace

pub mod path;
pub mod types;
pub mod wikilink;

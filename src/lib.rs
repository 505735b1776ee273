//! Taxon tree merge engine with a content-addressed data store.
//!
//! Lineages fetched from a taxonomy source are spliced into a single rooted
//! [`domain::TaxonTree`]; data files are pinned to its nodes.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

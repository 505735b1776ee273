//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, TaxonomyLookup)
//! but are themselves concrete structs, not traits.

mod datastore;
mod lineage;
mod store;

pub use datastore::DataStore;
pub use lineage::LineageService;
pub use store::{TreeStore, FORMAT_VERSION};

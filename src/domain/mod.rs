//! Domain layer: taxonomy model and the tree merge engine
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod entities;
pub mod error;
pub mod lineage;
pub mod merge;
pub mod taxon;

pub use arena::{LineageKey, PrintTree, TaxonNode, TaxonTree, TreeIterator};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use lineage::{Lineage, LineageRecord};
pub use merge::{LineageConflict, MergeReport};
pub use taxon::{Taxon, TaxonId};

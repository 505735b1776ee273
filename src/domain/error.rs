//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::taxon::TaxonId;

/// Domain errors represent violations of the taxonomy model.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed taxon id: '{0}' (taxon ids must be non-negative integers)")]
    MalformedIdentifier(String),

    #[error("cannot compare Taxon to {0}")]
    TypeMismatch(String),

    #[error("taxon not found in tree: {0}")]
    UnknownTaxon(TaxonId),

    #[error("broken parent chain at taxon {0}")]
    BrokenParentChain(TaxonId),

    #[error("lineage path is empty")]
    EmptyLineage,

    #[error("malformed lineage: {0}")]
    MalformedLineage(String),

    #[error("invalid tag '{0}': expected <tag>=<value>")]
    InvalidTag(String),

    #[error("unknown link method '{0}' (expected s, l, c or m)")]
    InvalidLinkMethod(String),

    #[error("invalid tree structure: {0}")]
    InvalidTree(String),

    #[error("lineage conflict: {0}")]
    LineageConflict(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

//! Linear root-to-leaf ancestor paths.

use itertools::Itertools;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::taxon::{Taxon, TaxonId};

/// Ordered ancestry chain, root-ancestor first, leaf last.
///
/// Always non-empty and free of duplicate ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    path: Vec<Taxon>,
}

impl Lineage {
    pub fn new(path: Vec<Taxon>) -> DomainResult<Self> {
        if path.is_empty() {
            return Err(DomainError::EmptyLineage);
        }
        if let Some(dup) = path.iter().map(|t| t.id).duplicates().next() {
            return Err(DomainError::MalformedLineage(format!(
                "taxon {} appears more than once",
                dup
            )));
        }
        Ok(Self { path })
    }

    /// Build from `(id, scientific name)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(id, name)| Taxon::new(id, name))
                .collect(),
        )
    }

    pub fn leaf(&self) -> &Taxon {
        // non-empty by construction
        &self.path[self.path.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Taxon> {
        self.path.iter()
    }

    pub fn ids(&self) -> Vec<TaxonId> {
        self.path.iter().map(|t| t.id).collect()
    }

    pub fn as_slice(&self) -> &[Taxon] {
        &self.path
    }
}

impl<'a> IntoIterator for &'a Lineage {
    type Item = &'a Taxon;
    type IntoIter = std::slice::Iter<'a, Taxon>;

    fn into_iter(self) -> Self::IntoIter {
        self.path.iter()
    }
}

/// Raw answer of a taxonomy lookup for one queried id.
///
/// Upstream services disagree on whether the ancestor chain includes the
/// queried taxon itself; [`LineageRecord::into_lineage`] normalizes that.
#[derive(Debug, Clone)]
pub struct LineageRecord {
    pub query: Taxon,
    /// Root-first ancestors, possibly without the queried taxon
    pub ancestors: Vec<Taxon>,
}

impl LineageRecord {
    pub fn into_lineage(self) -> DomainResult<Lineage> {
        let mut path = self.ancestors;
        if path.last().map(|t| t.id) != Some(self.query.id) {
            path.push(self.query);
        }
        Lineage::new(path)
    }
}

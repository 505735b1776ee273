//! Fetching lineages from a taxonomy source and merging them into the tree

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::ApplicationResult;
use crate::domain::{Lineage, MergeReport, TaxonId, TaxonTree};
use crate::infrastructure::traits::TaxonomyLookup;

/// Lineage lookup and insertion service.
pub struct LineageService {
    lookup: Arc<dyn TaxonomyLookup>,
}

impl LineageService {
    pub fn new(lookup: Arc<dyn TaxonomyLookup>) -> Self {
        Self { lookup }
    }

    /// Fetch complete root-to-leaf lineages for `ids`, in order.
    pub fn fetch(&self, ids: &[TaxonId]) -> ApplicationResult<Vec<Lineage>> {
        ids.iter()
            .map(|&id| -> ApplicationResult<Lineage> {
                let record = self.lookup.lineage(id)?;
                let lineage = record.into_lineage()?;
                debug!("fetch: id={} depth={}", id, lineage.len());
                Ok(lineage)
            })
            .collect()
    }

    pub fn resolve_name(&self, name: &str) -> ApplicationResult<TaxonId> {
        let id = self.lookup.resolve_name(name)?;
        debug!("resolve_name: '{}' -> {}", name, id);
        Ok(id)
    }

    /// Fetch lineages for `ids` and merge them into `tree`.
    ///
    /// All lookups happen before the first insertion, so a failed lookup leaves
    /// the tree untouched.
    pub fn insert(&self, tree: &mut TaxonTree, ids: &[TaxonId]) -> ApplicationResult<MergeReport> {
        let lineages = self.fetch(ids)?;

        let mut report = MergeReport::default();
        for lineage in &lineages {
            report.absorb(tree.insert_lineage(lineage));
        }

        info!(
            "insert: {} lineages, {} taxa added, {} conflicts",
            lineages.len(),
            report.added.len(),
            report.conflicts.len()
        );
        Ok(report)
    }
}

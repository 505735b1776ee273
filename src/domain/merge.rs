//! Splicing lineage paths into a [`TaxonTree`].
//!
//! The merge walks the incoming path from the leaf end toward its root and
//! stops at the deepest taxon the tree already knows (the divergence point).
//! Everything below that point is new and is grafted under the existing node.
//! Everything above it is checked against the ancestry already recorded in
//! the tree; existing ancestry always wins and disagreements are reported as
//! [`LineageConflict`]s.

use std::fmt;

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::TaxonTree;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::lineage::Lineage;
use crate::domain::taxon::{Taxon, TaxonId};

/// An incoming path placed a known taxon under a different parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageConflict {
    pub taxon: TaxonId,
    /// Parent recorded in the tree (kept)
    pub existing_parent: Option<TaxonId>,
    /// Parent claimed by the incoming path (ignored)
    pub incoming_parent: TaxonId,
}

impl fmt::Display for LineageConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let existing = self
            .existing_parent
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "taxon {} keeps parent {}, incoming parent {} ignored",
            self.taxon, existing, self.incoming_parent
        )
    }
}

/// Outcome of merging one or more lineages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Newly created taxa, in creation order
    pub added: Vec<TaxonId>,
    pub conflicts: Vec<LineageConflict>,
}

impl MergeReport {
    /// True when the merge left the tree untouched.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn absorb(&mut self, other: MergeReport) {
        self.added.extend(other.added);
        self.conflicts.extend(other.conflicts);
    }

    /// Fail with [`DomainError::LineageConflict`] when any conflict was seen.
    pub fn ensure_no_conflicts(&self) -> DomainResult<()> {
        if self.conflicts.is_empty() {
            return Ok(());
        }
        Err(DomainError::LineageConflict(format!(
            "{} conflict(s), first: {}",
            self.conflicts.len(),
            self.conflicts[0]
        )))
    }
}

impl TaxonTree {
    /// Merge one root-to-leaf path into the tree.
    ///
    /// Afterwards every id of the path is present. Taxa already in the tree
    /// keep their parent and payload; new taxa are created with the payload of
    /// the path entry. Inserting the same path again is a no-op.
    #[instrument(level = "debug", skip(self, lineage), fields(leaf = %lineage.leaf().id))]
    pub fn insert_lineage(&mut self, lineage: &Lineage) -> MergeReport {
        let path = lineage.as_slice();
        let mut report = MergeReport::default();

        let divergence = path.iter().rposition(|t| self.contains(t.id));
        let (anchor, tail) = match divergence {
            Some(k) => {
                self.reconcile_ancestry(&path[..=k], &mut report);
                let anchor = self
                    .index_of(path[k].id)
                    .unwrap_or_else(|| self.root_index());
                (anchor, &path[k + 1..])
            }
            // no shared ancestor: new top-level branch
            None => (self.root_index(), path),
        };
        debug!(
            divergence = ?divergence.map(|k| path[k].id),
            new = tail.len(),
            "splicing lineage"
        );

        self.graft(anchor, tail, &mut report);
        report
    }

    /// Merge every root-to-leaf lineage of `other` into this tree.
    #[instrument(level = "debug", skip_all)]
    pub fn merge_tree(&mut self, other: &TaxonTree) -> DomainResult<MergeReport> {
        let mut report = MergeReport::default();
        for leaf in other.leaves() {
            let path: Vec<Taxon> = other.ancestors(leaf)?.into_iter().cloned().collect();
            let lineage = Lineage::new(path)?;
            report.absorb(self.insert_lineage(&lineage));
        }
        Ok(report)
    }

    /// Walk the path top-down up to the divergence point (inclusive).
    ///
    /// Known taxa are checked against the path's claimed parent; unknown taxa
    /// are created under their path parent, or under the root for the first entry.
    fn reconcile_ancestry(&mut self, prefix: &[Taxon], report: &mut MergeReport) {
        let mut claimed_parent: Option<TaxonId> = None;

        for taxon in prefix {
            match self.index_of(taxon.id) {
                Some(idx) => {
                    if let Some(incoming) = claimed_parent {
                        let existing = self
                            .node(idx)
                            .and_then(|n| n.parent)
                            .and_then(|p| self.node(p))
                            .map(|p| p.taxon.id);
                        if existing != Some(incoming) {
                            let conflict = LineageConflict {
                                taxon: taxon.id,
                                existing_parent: existing,
                                incoming_parent: incoming,
                            };
                            warn!("lineage conflict: {}", conflict);
                            report.conflicts.push(conflict);
                        }
                    }
                }
                None => {
                    let parent = claimed_parent
                        .and_then(|p| self.index_of(p))
                        .unwrap_or_else(|| self.root_index());
                    self.attach(taxon.clone(), parent);
                    report.added.push(taxon.id);
                }
            }
            claimed_parent = Some(taxon.id);
        }
    }

    /// Adopt a chain of unknown taxa below `anchor`.
    fn graft(&mut self, anchor: Index, chain: &[Taxon], report: &mut MergeReport) {
        let mut parent = anchor;
        for taxon in chain {
            parent = self.attach(taxon.clone(), parent);
            report.added.push(taxon.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::arena::LineageKey;

    fn lineage(pairs: &[(u64, &str)]) -> Lineage {
        Lineage::from_pairs(pairs.iter().map(|&(id, name)| (id, name))).unwrap()
    }

    fn id(v: u64) -> TaxonId {
        TaxonId::new(v)
    }

    #[test]
    fn given_conflicting_path_when_ensure_no_conflicts_then_error() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (20, "Species")]));

        let report = tree.insert_lineage(&lineage(&[(0, "root"), (15, "Other"), (20, "Species")]));

        assert!(matches!(
            report.ensure_no_conflicts(),
            Err(DomainError::LineageConflict(ref msg)) if msg.starts_with("1 conflict(s)")
        ));
        assert_eq!(tree.parent_of(id(20)).unwrap().map(|p| p.id), Some(id(10)));
    }

    #[test]
    fn given_clean_report_when_ensure_no_conflicts_then_ok() {
        assert!(MergeReport::default().ensure_no_conflicts().is_ok());
    }

    #[test]
    fn given_empty_tree_when_inserting_then_all_nodes_added() {
        let mut tree = TaxonTree::new();
        let report = tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (20, "Species")]));

        assert_eq!(report.added, vec![id(10), id(20)]);
        assert!(report.conflicts.is_empty());
        assert_eq!(tree.len(), 3);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn given_same_lineage_twice_when_inserting_then_second_is_noop() {
        let mut tree = TaxonTree::new();
        let path = lineage(&[(0, "root"), (10, "Genus"), (20, "Species")]);
        tree.insert_lineage(&path);
        let snapshot = tree.clone();

        let report = tree.insert_lineage(&path);

        assert!(report.is_noop());
        assert!(!report.has_conflicts());
        assert_eq!(tree, snapshot);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn given_shared_prefix_when_inserting_then_branches_from_same_node() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (20, "A")]));
        let genus_idx = tree.index_of(id(10)).unwrap();

        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (30, "B")]));

        let children: Vec<_> = tree.children_of(id(10)).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(children, vec![id(20), id(30)]);
        assert_eq!(tree.index_of(id(10)), Some(genus_idx));
        assert_eq!(tree.len(), 4);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn given_path_without_sentinel_when_inserting_then_new_top_level_branch() {
        let mut tree = TaxonTree::new();
        let report = tree.insert_lineage(&lineage(&[(1, "root"), (2, "Bacteria"), (561, "Escherichia")]));

        assert_eq!(report.added, vec![id(1), id(2), id(561)]);
        assert_eq!(tree.parent_of(id(1)).unwrap().map(|p| p.id), Some(TaxonId::ROOT));
    }

    #[test]
    fn given_path_starting_mid_tree_when_inserting_then_hangs_from_known_node() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(1, "root"), (2, "Bacteria")]));

        let report = tree.insert_lineage(&lineage(&[(2, "Bacteria"), (1224, "Proteobacteria")]));

        assert_eq!(report.added, vec![id(1224)]);
        assert_eq!(
            tree.lineage(id(1224), LineageKey::Id).unwrap(),
            vec!["0", "1", "2", "1224"]
        );
    }

    #[test]
    fn given_known_taxon_under_other_parent_when_inserting_then_existing_parent_kept() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (20, "Species")]));

        let report = tree.insert_lineage(&lineage(&[(0, "root"), (15, "Other"), (20, "Species")]));

        assert_eq!(tree.parent_of(id(20)).unwrap().map(|p| p.id), Some(id(10)));
        assert_eq!(
            report.conflicts,
            vec![LineageConflict {
                taxon: id(20),
                existing_parent: Some(id(10)),
                incoming_parent: id(15),
            }]
        );
        // the unknown ancestor is still recorded
        assert_eq!(report.added, vec![id(15)]);
        assert!(tree.children_of(id(15)).unwrap().is_empty());
        tree.check_invariants().unwrap();
    }

    #[test]
    fn given_conflict_above_new_leaf_when_inserting_then_leaf_follows_existing_ancestry() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (20, "Species")]));

        let report = tree.insert_lineage(&lineage(&[(0, "root"), (15, "Other"), (20, "Species"), (21, "Strain")]));

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(
            tree.lineage(id(21), LineageKey::Id).unwrap(),
            vec!["0", "10", "20", "21"]
        );
    }

    #[test]
    fn given_existing_node_when_inserting_then_payload_not_overwritten() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Genus")]));
        tree.set_tag(id(10), "curated", "yes").unwrap();

        tree.insert_lineage(&lineage(&[(0, "root"), (10, "Renamed genus"), (20, "Species")]));

        let genus = tree.get(id(10)).unwrap();
        assert_eq!(genus.scientific_name, "Genus");
        assert_eq!(genus.tags["curated"], "yes");
    }

    #[test]
    fn given_many_insertions_then_single_root_reaches_every_node() {
        let mut tree = TaxonTree::new();
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "a"), (20, "b")]));
        tree.insert_lineage(&lineage(&[(1, "r"), (2, "c")]));
        tree.insert_lineage(&lineage(&[(0, "root"), (10, "a"), (30, "d"), (40, "e")]));
        tree.insert_lineage(&lineage(&[(5, "x"), (30, "d")]));

        tree.check_invariants().unwrap();
        let roots: Vec<_> = tree
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(_, node)| node.taxon.id)
            .collect();
        assert_eq!(roots, vec![TaxonId::ROOT]);
        for (_, node) in tree.iter() {
            assert_eq!(tree.ancestors(node.taxon.id).unwrap()[0].id, TaxonId::ROOT);
        }
    }

    #[test]
    fn given_other_tree_when_merging_then_union_of_lineages() {
        let mut left = TaxonTree::new();
        left.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (20, "A")]));
        let mut right = TaxonTree::new();
        right.insert_lineage(&lineage(&[(0, "root"), (10, "Genus"), (30, "B")]));
        right.insert_lineage(&lineage(&[(0, "root"), (11, "Genus 2")]));

        let report = left.merge_tree(&right).unwrap();

        assert_eq!(report.added, vec![id(30), id(11)]);
        assert_eq!(left.len(), 5);
        left.check_invariants().unwrap();
    }
}

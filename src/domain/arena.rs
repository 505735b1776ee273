use std::collections::{BTreeMap, HashMap};

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::PinnedData;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::taxon::{Taxon, TaxonId};

/// Tree node in the arena-based taxonomy.
#[derive(Debug, Clone)]
pub struct TaxonNode {
    pub taxon: Taxon,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Child indices keyed by taxon id
    pub children: BTreeMap<TaxonId, Index>,
}

/// Which label [`TaxonTree::lineage`] collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineageKey {
    Id,
    #[default]
    Name,
}

/// Arena-based taxonomy tree.
///
/// Parent links are arena indices, never ownership. A global id index keeps
/// taxon ids unique across the whole tree, not just among siblings.
/// There is always exactly one root: the synthetic taxon with id 0.
#[derive(Debug, Clone)]
pub struct TaxonTree {
    arena: Arena<TaxonNode>,
    root: Index,
    index: HashMap<TaxonId, Index>,
}

impl Default for TaxonTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for TaxonTree {
    /// Structural equality: same ids under the same parents.
    fn eq(&self, other: &Self) -> bool {
        self.structure() == other.structure()
    }
}

impl TaxonTree {
    pub fn new() -> Self {
        Self::with_root(Taxon::root())
    }

    fn with_root(root: Taxon) -> Self {
        let mut arena = Arena::new();
        let mut index = HashMap::new();
        let id = root.id;
        let root = arena.insert(TaxonNode {
            taxon: root,
            parent: None,
            children: BTreeMap::new(),
        });
        index.insert(id, root);
        Self { arena, root, index }
    }

    /// Rebuild a tree from `(taxon, parent id)` records in pre-order.
    ///
    /// The first record must be the root; every later record's parent must
    /// already have been defined.
    pub fn from_records<I>(records: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (Taxon, Option<TaxonId>)>,
    {
        let mut records = records.into_iter();
        let (root, root_parent) = records
            .next()
            .ok_or_else(|| DomainError::InvalidTree("no root record".to_string()))?;
        if !root.id.is_root() || root_parent.is_some() {
            return Err(DomainError::InvalidTree(format!(
                "first record must be the root (id {}), found {}",
                TaxonId::ROOT,
                root.id
            )));
        }

        let mut tree = Self::with_root(root);
        for (taxon, parent) in records {
            let parent = parent.ok_or_else(|| {
                DomainError::InvalidTree(format!("second root found: taxon {}", taxon.id))
            })?;
            if tree.contains(taxon.id) {
                return Err(DomainError::InvalidTree(format!(
                    "duplicate taxon {}",
                    taxon.id
                )));
            }
            let parent_idx = tree.index_of(parent).ok_or_else(|| {
                DomainError::InvalidTree(format!(
                    "parent {} of taxon {} is not defined before it",
                    parent, taxon.id
                ))
            })?;
            tree.attach(taxon, parent_idx);
        }
        Ok(tree)
    }

    /// `(taxon, parent id)` records in pre-order, the inverse of [`Self::from_records`].
    pub fn records(&self) -> Vec<(&Taxon, Option<TaxonId>)> {
        self.iter()
            .map(|(_, node)| {
                let parent = node
                    .parent
                    .and_then(|p| self.arena.get(p))
                    .map(|p| p.taxon.id);
                (&node.taxon, parent)
            })
            .collect()
    }

    /// Insert a new node below `parent`. Callers guarantee the id is absent.
    pub(crate) fn attach(&mut self, taxon: Taxon, parent: Index) -> Index {
        let id = taxon.id;
        let node_idx = self.arena.insert(TaxonNode {
            taxon,
            parent: Some(parent),
            children: BTreeMap::new(),
        });
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.children.insert(id, node_idx);
        }
        self.index.insert(id, node_idx);
        node_idx
    }

    pub fn root_index(&self) -> Index {
        self.root
    }

    pub fn root(&self) -> &Taxon {
        // the root is inserted on construction and never removed
        &self.arena[self.root].taxon
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// A tree is empty when its root has no children.
    pub fn is_empty(&self) -> bool {
        self.arena
            .get(self.root)
            .map_or(true, |root| root.children.is_empty())
    }

    pub fn contains(&self, id: TaxonId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn index_of(&self, id: TaxonId) -> Option<Index> {
        self.index.get(&id).copied()
    }

    pub fn node(&self, idx: Index) -> Option<&TaxonNode> {
        self.arena.get(idx)
    }

    pub fn get(&self, id: TaxonId) -> Option<&Taxon> {
        self.index_of(id)
            .and_then(|idx| self.arena.get(idx))
            .map(|node| &node.taxon)
    }

    fn node_by_id(&self, id: TaxonId) -> DomainResult<&TaxonNode> {
        self.index_of(id)
            .and_then(|idx| self.arena.get(idx))
            .ok_or(DomainError::UnknownTaxon(id))
    }

    fn node_by_id_mut(&mut self, id: TaxonId) -> DomainResult<&mut TaxonNode> {
        let idx = self.index_of(id).ok_or(DomainError::UnknownTaxon(id))?;
        self.arena.get_mut(idx).ok_or(DomainError::UnknownTaxon(id))
    }

    pub fn parent_of(&self, id: TaxonId) -> DomainResult<Option<&Taxon>> {
        let node = self.node_by_id(id)?;
        Ok(node
            .parent
            .and_then(|p| self.arena.get(p))
            .map(|p| &p.taxon))
    }

    /// Children ordered by id.
    pub fn children_of(&self, id: TaxonId) -> DomainResult<Vec<&Taxon>> {
        let node = self.node_by_id(id)?;
        Ok(node
            .children
            .values()
            .filter_map(|&c| self.arena.get(c))
            .map(|c| &c.taxon)
            .collect())
    }

    /// Taxa from the root down to `id`, inclusive, root first.
    #[instrument(level = "trace", skip(self))]
    pub fn ancestors(&self, id: TaxonId) -> DomainResult<Vec<&Taxon>> {
        let mut node = self.node_by_id(id)?;
        let mut chain = vec![&node.taxon];

        while let Some(parent_idx) = node.parent {
            // a chain longer than the tree can only come from a cycle
            if chain.len() > self.arena.len() {
                return Err(DomainError::BrokenParentChain(id));
            }
            node = self
                .arena
                .get(parent_idx)
                .ok_or(DomainError::BrokenParentChain(node.taxon.id))?;
            chain.push(&node.taxon);
        }

        if !node.taxon.id.is_root() {
            return Err(DomainError::BrokenParentChain(node.taxon.id));
        }
        chain.reverse();
        Ok(chain)
    }

    /// Lineage labels from the root down to `id`, root first.
    #[instrument(level = "debug", skip(self))]
    pub fn lineage(&self, id: TaxonId, by: LineageKey) -> DomainResult<Vec<String>> {
        Ok(self
            .ancestors(id)?
            .into_iter()
            .map(|t| match by {
                LineageKey::Id => t.id.to_string(),
                LineageKey::Name => t.scientific_name.clone(),
            })
            .collect())
    }

    pub fn set_tag(
        &mut self,
        id: TaxonId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> DomainResult<()> {
        let node = self.node_by_id_mut(id)?;
        node.taxon.tags.insert(key.into(), value.into());
        Ok(())
    }

    /// Record pinned data on a taxon. Returns false if the digest was already pinned there.
    pub fn pin(&mut self, id: TaxonId, data: PinnedData) -> DomainResult<bool> {
        let node = self.node_by_id_mut(id)?;
        if node.taxon.data.contains_key(&data.digest) {
            return Ok(false);
        }
        node.taxon.data.insert(data.digest.clone(), data);
        Ok(true)
    }

    /// Pre-order traversal over all nodes, children in id order.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Lazy pre-order `(depth, scientific name)` pairs; root has depth 0.
    ///
    /// Each call starts a fresh traversal.
    pub fn print_tree(&self) -> PrintTree<'_> {
        PrintTree::new(self)
    }

    /// Number of levels, root included.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.print_tree().map(|(d, _)| d + 1).max().unwrap_or(0)
    }

    /// Ids of all nodes without children, in pre-order.
    pub fn leaves(&self) -> Vec<TaxonId> {
        self.iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(_, node)| node.taxon.id)
            .collect()
    }

    /// Map of every id to its parent id.
    pub fn structure(&self) -> BTreeMap<TaxonId, Option<TaxonId>> {
        self.records()
            .into_iter()
            .map(|(taxon, parent)| (taxon.id, parent))
            .collect()
    }

    /// Verify root uniqueness, back-pointers, index consistency and reachability.
    #[instrument(level = "debug", skip(self))]
    pub fn check_invariants(&self) -> DomainResult<()> {
        let invalid = |msg: String| Err(DomainError::InvalidTree(msg));

        let root = match self.arena.get(self.root) {
            Some(root) => root,
            None => return invalid("root node missing".to_string()),
        };
        if root.parent.is_some() || !root.taxon.id.is_root() {
            return invalid(format!("root must be taxon {} without parent", TaxonId::ROOT));
        }
        if self.index.len() != self.arena.len() {
            return invalid(format!(
                "index has {} entries for {} nodes",
                self.index.len(),
                self.arena.len()
            ));
        }

        for (idx, node) in self.arena.iter() {
            if self.index.get(&node.taxon.id) != Some(&idx) {
                return invalid(format!("taxon {} not indexed", node.taxon.id));
            }
            if idx != self.root {
                let parent = node.parent.and_then(|p| self.arena.get(p));
                match parent {
                    Some(p) if p.children.get(&node.taxon.id) == Some(&idx) => {}
                    _ => return invalid(format!("taxon {} has no parent link", node.taxon.id)),
                }
            }
            for (&child_id, &child_idx) in &node.children {
                match self.arena.get(child_idx) {
                    Some(child) if child.taxon.id == child_id && child.parent == Some(idx) => {}
                    _ => {
                        return invalid(format!(
                            "child {} of taxon {} does not point back",
                            child_id, node.taxon.id
                        ))
                    }
                }
            }
        }

        let reachable = self.iter().count();
        if reachable != self.arena.len() {
            return invalid(format!(
                "{} of {} nodes reachable from root",
                reachable,
                self.arena.len()
            ));
        }
        Ok(())
    }

    /// Render for display, e.g. `Escherichia coli [562]`.
    pub fn to_termtree(&self) -> Tree<String> {
        fn label(node: &TaxonNode) -> String {
            match node.taxon.data.len() {
                0 => format!("{} [{}]", node.taxon.scientific_name, node.taxon.id),
                n => format!(
                    "{} [{}] ({} file{})",
                    node.taxon.scientific_name,
                    node.taxon.id,
                    n,
                    if n == 1 { "" } else { "s" }
                ),
            }
        }

        fn build_tree(arena: &Arena<TaxonNode>, node_idx: Index, parent_tree: &mut Tree<String>) {
            if let Some(node) = arena.get(node_idx) {
                for &child_idx in node.children.values() {
                    if let Some(child) = arena.get(child_idx) {
                        let mut child_tree = Tree::new(label(child));
                        build_tree(arena, child_idx, &mut child_tree);
                        parent_tree.push(child_tree);
                    }
                }
            }
        }

        match self.arena.get(self.root) {
            Some(root) => {
                let mut tree = Tree::new(label(root));
                build_tree(&self.arena, self.root, &mut tree);
                tree
            }
            None => Tree::new("Empty tree".to_string()),
        }
    }
}

pub struct TreeIterator<'a> {
    tree: &'a TaxonTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a TaxonTree) -> Self {
        Self {
            tree,
            stack: vec![tree.root],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TaxonNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current_idx) {
                // Push children in reverse order for ascending-id traversal
                self.stack.extend(node.children.values().rev());
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PrintTree<'a> {
    tree: &'a TaxonTree,
    stack: Vec<(Index, usize)>,
}

impl<'a> PrintTree<'a> {
    fn new(tree: &'a TaxonTree) -> Self {
        Self {
            tree,
            stack: vec![(tree.root, 0)],
        }
    }
}

impl<'a> Iterator for PrintTree<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, depth)) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(current_idx) {
                for &child in node.children.values().rev() {
                    self.stack.push((child, depth + 1));
                }
                return Some((depth, node.taxon.scientific_name.as_str()));
            }
        }
        None
    }
}

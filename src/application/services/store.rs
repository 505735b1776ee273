//! Persistence of the taxon tree
//!
//! The tree is stored as TOML: a format version and a `[[taxa]]` array in
//! pre-order, each record naming its parent. Saves replace the file atomically.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::hash::is_digest;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{LinkMethod, PinnedData, Taxon, TaxonId, TaxonTree};
use crate::infrastructure::traits::FileSystem;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTree {
    version: u32,
    #[serde(default)]
    taxa: Vec<PersistedTaxon>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTaxon {
    id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<u64>,
    scientific_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    common_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    synonyms: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    data: Vec<PersistedData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedData {
    digest: String,
    file_name: String,
    method: String,
    pinned_at: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<String, String>,
}

impl From<(&Taxon, Option<TaxonId>)> for PersistedTaxon {
    fn from((taxon, parent): (&Taxon, Option<TaxonId>)) -> Self {
        Self {
            id: taxon.id.value(),
            parent: parent.map(TaxonId::value),
            scientific_name: taxon.scientific_name.clone(),
            common_name: taxon.common_name.clone(),
            synonyms: taxon.synonyms.clone(),
            tags: taxon.tags.clone(),
            data: taxon
                .data
                .values()
                .map(|d| PersistedData {
                    digest: d.digest.clone(),
                    file_name: d.file_name.clone(),
                    method: d.method.code().to_string(),
                    pinned_at: d.pinned_at.clone(),
                    tags: d.tags.clone(),
                })
                .collect(),
        }
    }
}

impl PersistedTaxon {
    fn into_record(self) -> Result<(Taxon, Option<TaxonId>), String> {
        let mut taxon = Taxon::new(self.id, self.scientific_name);
        taxon.common_name = self.common_name;
        taxon.synonyms = self.synonyms;
        taxon.tags = self.tags;
        for d in self.data {
            if !is_digest(&d.digest) {
                return Err(format!("taxon {}: invalid digest '{}'", taxon.id, d.digest));
            }
            let method = d
                .method
                .parse::<LinkMethod>()
                .map_err(|e| format!("taxon {}: {}", taxon.id, e))?;
            taxon.data.insert(
                d.digest.clone(),
                PinnedData {
                    digest: d.digest,
                    file_name: d.file_name,
                    method,
                    pinned_at: d.pinned_at,
                    tags: d.tags,
                },
            );
        }
        Ok((taxon, self.parent.map(TaxonId::new)))
    }
}

/// Loads and saves the taxon tree at a fixed path.
pub struct TreeStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl TreeStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Self { fs, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tree; a missing file yields a fresh tree.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> ApplicationResult<TaxonTree> {
        if !self.fs.exists(&self.path) {
            debug!("load: no persisted tree, starting fresh");
            return Ok(TaxonTree::new());
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| self.corrupt(e.to_string()))?;
        let tree = self.decode(&content)?;
        debug!("load: {} taxa", tree.len());
        Ok(tree)
    }

    /// Save the tree. An empty tree is not written; returns whether a write happened.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, tree: &TaxonTree) -> ApplicationResult<bool> {
        if tree.is_empty() {
            debug!("save: empty tree, skipping");
            return Ok(false);
        }
        let content = Self::encode(tree)?;
        self.fs
            .ensure_parent(&self.path)
            .with_path_context("create data directory", &self.path)?;
        self.fs
            .write_atomic(&self.path, &content)
            .with_path_context("write tree", &self.path)?;
        debug!("save: wrote {} taxa", tree.len());
        Ok(true)
    }

    /// Serialize a tree to the on-disk TOML format.
    pub fn encode(tree: &TaxonTree) -> ApplicationResult<String> {
        let persisted = PersistedTree {
            version: FORMAT_VERSION,
            taxa: tree.records().into_iter().map(PersistedTaxon::from).collect(),
        };
        toml::to_string(&persisted).with_context("serialize tree")
    }

    fn decode(&self, content: &str) -> ApplicationResult<TaxonTree> {
        let persisted: PersistedTree =
            toml::from_str(content).map_err(|e| self.corrupt(e.to_string()))?;
        if persisted.version != FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format version {}",
                persisted.version
            )));
        }

        let records = persisted
            .taxa
            .into_iter()
            .map(PersistedTaxon::into_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|m| self.corrupt(m))?;
        let tree = TaxonTree::from_records(records).map_err(|e| self.corrupt(e.to_string()))?;
        tree.check_invariants()
            .map_err(|e| self.corrupt(e.to_string()))?;
        Ok(tree)
    }

    fn corrupt(&self, message: impl Into<String>) -> ApplicationError {
        ApplicationError::PersistedStateCorrupt {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

//! Content-addressed data store
//!
//! Files are linked into `<home>/.data/files/<sha256>` and recorded on a taxon
//! as [`PinnedData`]. Identical content is stored once.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::application::hash::{file_digest, is_digest, short_digest};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{DomainError, LinkMethod, PinnedData, TaxonId, TaxonTree};
use crate::infrastructure::traits::FileSystem;

/// Data store service.
pub struct DataStore {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl DataStore {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.settings.objects_dir()
    }

    pub fn object_path(&self, digest: &str) -> PathBuf {
        self.objects_dir().join(digest)
    }

    /// Link `file` into the store and pin it to taxon `id`.
    ///
    /// The taxon must already be in the tree. When a readable object with the
    /// same digest exists it is reused; with [`LinkMethod::Move`] the source is
    /// still consumed. A dangling symlink left by an earlier symlink pin is
    /// replaced.
    #[instrument(level = "debug", skip(self, tree, tags), fields(file = %file.display()))]
    pub fn pin(
        &self,
        tree: &mut TaxonTree,
        id: TaxonId,
        file: &Path,
        method: LinkMethod,
        tags: BTreeMap<String, String>,
    ) -> ApplicationResult<PinnedData> {
        if !tree.contains(id) {
            return Err(DomainError::UnknownTaxon(id).into());
        }
        if !self.fs.is_file(file) {
            return Err(ApplicationError::OperationFailed {
                context: format!("pin: not a file: {}", file.display()),
                source: Box::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
            });
        }

        let digest = file_digest(self.fs.as_ref(), file)?;
        let object = self.object_path(&digest);
        let objects_dir = self.objects_dir();
        self.fs
            .create_dir_all(&objects_dir)
            .with_path_context("create object store", &objects_dir)?;

        // is_file follows symlinks; a link whose target is gone is not a stored object
        if self.fs.is_file(&object) {
            debug!("pin: object {} already stored", short_digest(&digest));
            if method == LinkMethod::Move {
                self.fs
                    .remove_file(file)
                    .with_path_context("remove moved file", file)?;
            }
        } else {
            if self.fs.is_symlink(&object) {
                warn!(
                    "pin: object {} links to a missing file, relinking",
                    short_digest(&digest)
                );
                self.fs
                    .remove_file(&object)
                    .with_path_context("remove dangling object link", &object)?;
            }
            self.link(file, &object, method)?;
            debug!(
                "pin: stored {} as {} ({})",
                file.display(),
                short_digest(&digest),
                method
            );
        }

        let pinned = PinnedData {
            digest: digest.clone(),
            file_name: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| digest.clone()),
            method,
            pinned_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tags,
        };
        if !tree.pin(id, pinned.clone())? {
            debug!("pin: taxon {} already has {}", id, short_digest(&digest));
        }
        Ok(pinned)
    }

    fn link(&self, file: &Path, object: &Path, method: LinkMethod) -> ApplicationResult<()> {
        match method {
            LinkMethod::Symlink => {
                let target = self
                    .fs
                    .canonicalize(file)
                    .with_path_context("resolve file", file)?;
                self.fs
                    .symlink(&target, object)
                    .with_path_context("symlink into store", object)
            }
            LinkMethod::Hardlink => self
                .fs
                .hard_link(file, object)
                .with_path_context("hardlink into store", object),
            LinkMethod::Copy => self
                .fs
                .copy(file, object)
                .map(|_| ())
                .with_path_context("copy into store", object),
            LinkMethod::Move => self
                .fs
                .move_path(file, object)
                .with_path_context("move into store", object),
        }
    }

    /// Digests of all stored objects, sorted.
    pub fn objects(&self) -> ApplicationResult<Vec<String>> {
        let dir = self.objects_dir();
        if !self.fs.exists(&dir) {
            return Ok(Vec::new());
        }
        let mut digests = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.with_path_context("list objects", &dir)?;
            if entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if is_digest(&name) {
                digests.push(name.into_owned());
            }
        }
        digests.sort();
        Ok(digests)
    }

    /// Stored digests that no taxon in `tree` pins.
    pub fn orphans(&self, tree: &TaxonTree) -> ApplicationResult<Vec<String>> {
        let pinned: HashSet<&str> = tree
            .iter()
            .flat_map(|(_, node)| node.taxon.data.keys().map(String::as_str))
            .collect();
        Ok(self
            .objects()?
            .into_iter()
            .filter(|d| !pinned.contains(d.as_str()))
            .collect())
    }
}

//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{DataStore, LineageService, TreeStore};
use crate::application::ApplicationError;
use crate::config::Settings;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::taxdump::TaxdumpLookup;
use crate::infrastructure::traits::{FileSystem, RealFileSystem, TaxonomyLookup};

/// Container holding the application services.
///
/// The taxonomy source is only opened when a command needs it.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    lookup: Option<Arc<dyn TaxonomyLookup>>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem), None)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        lookup: Option<Arc<dyn TaxonomyLookup>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            lookup,
        }
    }

    pub fn tree_store(&self) -> TreeStore {
        TreeStore::new(self.fs.clone(), self.settings.tree_path())
    }

    pub fn data_store(&self) -> DataStore {
        DataStore::new(self.fs.clone(), self.settings.clone())
    }

    /// Lineage service over the injected lookup, or the configured taxdump.
    pub fn lineage_service(&self) -> InfraResult<LineageService> {
        let lookup = match &self.lookup {
            Some(lookup) => lookup.clone(),
            None => {
                let dir = self.settings.taxdump_dir.as_ref().ok_or_else(|| {
                    ApplicationError::Config {
                        message: "taxdump_dir is not configured (set TAXLINK_TAXDUMP_DIR)"
                            .to_string(),
                    }
                })?;
                Arc::new(TaxdumpLookup::open(dir)?) as Arc<dyn TaxonomyLookup>
            }
        };
        Ok(LineageService::new(lookup))
    }
}

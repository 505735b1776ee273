//! Seams between the services and the outside world
//!
//! `FileSystem` covers everything the tree store and the data store touch on
//! disk; `TaxonomyLookup` is the source lineages are fetched from. Tests swap
//! in fakes for either.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;

use crate::domain::{LineageRecord, TaxonId};

/// Filesystem operations used by [`TreeStore`](crate::application::services::TreeStore)
/// and [`DataStore`](crate::application::services::DataStore).
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Open a file for streaming reads (hashing large data files).
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Replace `path` so readers see either the old or the new content.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Regular file (symlinks followed).
    fn is_file(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Link `link` to `original`; stored objects point at absolute targets.
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()>;

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// True for a symlink even if it dangles.
    fn is_symlink(&self, path: &Path) -> bool;

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Create the parent directory of `path` if missing.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;

    /// Rename, or copy and delete when source and target are on different devices.
    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Failure reported by a taxonomy source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown taxon id: {0}")]
    UnknownId(TaxonId),

    #[error("no taxon named '{0}'")]
    UnknownName(String),

    #[error("name '{name}' is ambiguous: {}", .candidates.iter().join(", "))]
    AmbiguousName {
        name: String,
        candidates: Vec<TaxonId>,
    },

    #[error("taxonomy source inconsistent: {0}")]
    Inconsistent(String),
}

/// Source of lineage information for taxon ids and names.
pub trait TaxonomyLookup: Send + Sync {
    /// Fetch the lineage of a taxon id.
    fn lineage(&self, id: TaxonId) -> Result<LineageRecord, LookupError>;

    /// Resolve a scientific name (or synonym) to a taxon id.
    fn resolve_name(&self, name: &str) -> Result<TaxonId, LookupError>;
}

// ============================================================
// std::fs
// ============================================================

#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(original, link)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(original, link)
        }
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        std::fs::hard_link(original, link)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.symlink_metadata()
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        std::fs::copy(from, to)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        match std::fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) => {
                // EXDEV = 18 on Unix (cross-device link not permitted)
                #[cfg(unix)]
                const EXDEV: i32 = 18;
                #[cfg(windows)]
                const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE

                if e.raw_os_error() == Some(EXDEV) {
                    self.copy(from, to)?;
                    self.remove_file(from)?;
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }
}

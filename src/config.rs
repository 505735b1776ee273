//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/taxlink/taxlink.toml`
//! 3. Environment variables: `TAXLINK_*` prefix
//! 4. Command line (`--home`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, LinkMethod};

pub const ENV_PREFIX: &str = "TAXLINK";
const DATA_DIR: &str = ".data";
const TREE_FILE: &str = "taxlink.toml";
const OBJECTS_DIR: &str = "files";

/// Unified configuration for taxlink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Home directory; state lives in `<home>/.data` (default: ~/taxlink)
    pub home: PathBuf,
    /// Directory holding `nodes.dmp` and `names.dmp`
    pub taxdump_dir: Option<PathBuf>,
    /// Default link method for `add` (s, l, c, m or the long names)
    pub link_method: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: default_home(),
            taxdump_dir: None,
            link_method: LinkMethod::default().code().to_string(),
        }
    }
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub home: Option<PathBuf>,
    pub taxdump_dir: Option<PathBuf>,
    pub link_method: Option<String>,
}

fn default_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("taxlink"))
        .unwrap_or_else(|| PathBuf::from("~/taxlink"))
}

/// Get the XDG config directory for taxlink.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "taxlink").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("taxlink.toml"))
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// `<home>/.data`
    pub fn data_dir(&self) -> PathBuf {
        self.home.join(DATA_DIR)
    }

    /// Persisted taxon tree.
    pub fn tree_path(&self) -> PathBuf {
        self.data_dir().join(TREE_FILE)
    }

    /// Content-addressed object store.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir().join(OBJECTS_DIR)
    }

    /// Parsed default link method.
    pub fn default_link_method(&self) -> Result<LinkMethod, ApplicationError> {
        self.link_method
            .parse()
            .map_err(|e: crate::domain::DomainError| ApplicationError::Config {
                message: format!("link_method: {e}"),
            })
    }

    /// Replace the home directory (command line override).
    pub fn with_home(mut self, home: &Path) -> Self {
        self.home = home.to_path_buf();
        self.expand_paths();
        self
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.home = PathBuf::from(expand_env_vars(self.home.to_string_lossy().as_ref()));
        self.taxdump_dir = self
            .taxdump_dir
            .as_ref()
            .map(|d| PathBuf::from(expand_env_vars(d.to_string_lossy().as_ref())));
    }

    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            home: global.home.clone().unwrap_or_else(|| self.home.clone()),
            taxdump_dir: global
                .taxdump_dir
                .clone()
                .or_else(|| self.taxdump_dir.clone()),
            link_method: global
                .link_method
                .clone()
                .unwrap_or_else(|| self.link_method.clone()),
        }
    }

    /// Load settings from the XDG config file and the process environment.
    pub fn load() -> Result<Self, ApplicationError> {
        Self::load_from(global_config_path().as_deref(), None)
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `global_path` - global config file, skipped when absent
    /// * `env` - environment variables to use instead of the process environment
    pub fn load_from(
        global_path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(path) = global_path {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.apply_global(&raw);
            }
        }

        current = Self::apply_env_overrides(current, env)?;
        current.expand_paths();

        // fail early on a bad link method rather than at the first `add`
        current.default_link_method()?;

        Ok(current)
    }

    /// Apply TAXLINK_* environment variables as explicit overrides.
    fn apply_env_overrides(
        mut settings: Self,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ApplicationError> {
        let source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(env);
        let config = Config::builder()
            .add_source(source)
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("home") {
            settings.home = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("taxdump_dir") {
            settings.taxdump_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("link_method") {
            settings.link_method = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# taxlink configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/taxlink/taxlink.toml
#   Env:    TAXLINK_* environment variables (TAXLINK_HOME, TAXLINK_TAXDUMP_DIR, TAXLINK_LINK_METHOD)
#   CLI:    --home

# Home directory; the tree and the file store live in <home>/.data
# home = "~/taxlink"

# NCBI taxdump directory containing nodes.dmp and names.dmp
# taxdump_dir = "~/data/taxdump"

# Default link method for `add`: s(ymlink), l (hardlink), c(opy), m(ove)
# link_method = "l"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

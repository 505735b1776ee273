//! Domain entities: data pinned to taxa

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::error::DomainError;

/// How a data file is placed into the content-addressed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMethod {
    Symlink,
    #[default]
    Hardlink,
    Copy,
    Move,
}

impl LinkMethod {
    /// Single-letter code used on the command line and in persisted state.
    pub fn code(self) -> &'static str {
        match self {
            LinkMethod::Symlink => "s",
            LinkMethod::Hardlink => "l",
            LinkMethod::Copy => "c",
            LinkMethod::Move => "m",
        }
    }
}

impl FromStr for LinkMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "symlink" => Ok(LinkMethod::Symlink),
            "l" | "hardlink" | "link" => Ok(LinkMethod::Hardlink),
            "c" | "copy" => Ok(LinkMethod::Copy),
            "m" | "move" => Ok(LinkMethod::Move),
            _ => Err(DomainError::InvalidLinkMethod(s.to_string())),
        }
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkMethod::Symlink => "symlink",
            LinkMethod::Hardlink => "hardlink",
            LinkMethod::Copy => "copy",
            LinkMethod::Move => "move",
        };
        f.write_str(name)
    }
}

/// A data file pinned to a taxon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedData {
    /// Hex SHA-256 of the file content, also the object name in the store
    pub digest: String,
    /// File name as it was when pinned
    pub file_name: String,
    pub method: LinkMethod,
    /// RFC 3339 timestamp
    pub pinned_at: String,
    pub tags: BTreeMap<String, String>,
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^\s*([A-Za-z0-9_.-]+)\s*=(.*)$").unwrap())
}

/// Parse a `<tag>=<value>` pair. Surrounding quotes on the value are stripped.
pub fn parse_tag(spec: &str) -> Result<(String, String), DomainError> {
    let caps = tag_regex()
        .captures(spec)
        .ok_or_else(|| DomainError::InvalidTag(spec.to_string()))?;
    Ok((caps[1].to_string(), strip_quotes(&caps[2])))
}

/// Strip surrounding quotes (single or double) from a value.
fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return s[1..s.len() - 1].to_string();
    }
    s.to_string()
}

/// Expand environment variables in a path string.
///
/// Supports `$VAR`, `${VAR}` and `~`.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

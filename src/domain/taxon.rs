//! Taxon identity and payload.
//!
//! A [`Taxon`] is identified solely by its [`TaxonId`]: equality, hashing and
//! ordering ignore the scientific name, metadata and position in the tree.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::domain::entities::PinnedData;
use crate::domain::error::{DomainError, DomainResult};

/// Numeric taxonomic identifier (e.g. an NCBI taxid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxonId(u64);

impl TaxonId {
    /// Reserved id of the synthetic tree root.
    pub const ROOT: TaxonId = TaxonId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl FromStr for TaxonId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TaxonId)
            .map_err(|_| DomainError::MalformedIdentifier(s.to_string()))
    }
}

impl From<u64> for TaxonId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node payload of the taxonomy tree.
#[derive(Debug, Clone)]
pub struct Taxon {
    pub id: TaxonId,
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub synonyms: BTreeSet<String>,
    /// Free-form tag metadata
    pub tags: BTreeMap<String, String>,
    /// Data files pinned to this taxon, keyed by content digest
    pub data: BTreeMap<String, PinnedData>,
}

impl Taxon {
    pub fn new(id: impl Into<TaxonId>, scientific_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scientific_name: scientific_name.into(),
            common_name: None,
            synonyms: BTreeSet::new(),
            tags: BTreeMap::new(),
            data: BTreeMap::new(),
        }
    }

    /// The synthetic root every tree starts from.
    pub fn root() -> Self {
        Self::new(TaxonId::ROOT, "root")
    }

    pub fn with_common_name(mut self, common_name: impl Into<String>) -> Self {
        self.common_name = Some(common_name.into());
        self
    }

    pub fn with_synonym(mut self, synonym: impl Into<String>) -> Self {
        self.synonyms.insert(synonym.into());
        self
    }

    /// Path-safe directory name, e.g. `562_Escherichia_coli`.
    pub fn dir_name(&self) -> String {
        let name: String = self
            .scientific_name
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if name.is_empty() {
            self.id.to_string()
        } else {
            format!("{}_{}", self.id, name)
        }
    }

    /// Compare against a value of arbitrary type.
    ///
    /// Only another `Taxon` is comparable; anything else is a
    /// [`DomainError::TypeMismatch`] rather than a silent `false`.
    pub fn try_eq<T: Any>(&self, other: &T) -> DomainResult<bool> {
        match (other as &dyn Any).downcast_ref::<Taxon>() {
            Some(taxon) => Ok(self == taxon),
            None => Err(DomainError::TypeMismatch(
                std::any::type_name::<T>().to_string(),
            )),
        }
    }
}

impl PartialEq for Taxon {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Taxon {}

impl Hash for Taxon {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Taxon {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Taxon {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Taxon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.scientific_name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn given_numeric_text_when_parsing_id_then_succeeds() {
        assert_eq!(" 562 ".parse::<TaxonId>().unwrap(), TaxonId::new(562));
        assert!("0".parse::<TaxonId>().unwrap().is_root());
    }

    #[test]
    fn given_non_numeric_text_when_parsing_id_then_malformed_identifier() {
        let err = "E.coli".parse::<TaxonId>().unwrap_err();
        assert_eq!(err, DomainError::MalformedIdentifier("E.coli".to_string()));
        assert!("-3".parse::<TaxonId>().is_err());
        assert!("".parse::<TaxonId>().is_err());
    }

    #[test]
    fn given_same_id_different_names_when_comparing_then_equal() {
        let a = Taxon::new(10u64, "Escherichia");
        let b = Taxon::new(10u64, "Escherichia (old name)").with_common_name("E");
        assert_eq!(a, b);

        let set: HashSet<Taxon> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn given_non_taxon_when_try_eq_then_type_mismatch() {
        let taxon = Taxon::new(10u64, "Escherichia");
        let err = taxon.try_eq(&10u64).unwrap_err();
        assert!(matches!(err, DomainError::TypeMismatch(ref t) if t == "u64"));

        assert!(taxon.try_eq(&Taxon::new(10u64, "x")).unwrap());
        assert!(!taxon.try_eq(&Taxon::new(11u64, "x")).unwrap());
    }

    #[test]
    fn given_name_with_spaces_when_dir_name_then_path_safe() {
        let taxon = Taxon::new(562u64, "Escherichia coli K-12");
        assert_eq!(taxon.dir_name(), "562_Escherichia_coli_K_12");
        assert_eq!(Taxon::new(7u64, "  ").dir_name(), "7");
    }
}

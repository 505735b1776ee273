//! Taxonomy lookup backed by an NCBI taxdump directory
//!
//! Reads `nodes.dmp` and `names.dmp` once into memory. Both files are
//! `\t|\t`-separated with a trailing `\t|`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::domain::{LineageRecord, Taxon, TaxonId};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::{LookupError, TaxonomyLookup};

pub const NODES_FILE: &str = "nodes.dmp";
pub const NAMES_FILE: &str = "names.dmp";

const SCIENTIFIC_NAME: &str = "scientific name";
const COMMON_NAMES: [&str; 2] = ["genbank common name", "common name"];
const SYNONYM: &str = "synonym";

#[derive(Debug, Clone)]
struct Node {
    parent: TaxonId,
    rank: String,
}

#[derive(Debug, Clone, Default)]
struct Names {
    scientific: Option<String>,
    common: Option<String>,
    synonyms: BTreeSet<String>,
}

/// In-memory view of a taxdump.
#[derive(Debug, Default)]
pub struct TaxdumpLookup {
    nodes: HashMap<TaxonId, Node>,
    names: HashMap<TaxonId, Names>,
    /// Lowercased scientific names and synonyms
    by_name: HashMap<String, BTreeSet<TaxonId>>,
}

impl TaxdumpLookup {
    /// Load `nodes.dmp` and `names.dmp` from `dir`.
    #[instrument(level = "debug")]
    pub fn open(dir: &Path) -> InfraResult<Self> {
        let nodes_path = dir.join(NODES_FILE);
        let names_path = dir.join(NAMES_FILE);
        let nodes = File::open(&nodes_path)
            .map_err(|e| InfraError::io(format!("open {}", nodes_path.display()), e))?;
        let names = File::open(&names_path)
            .map_err(|e| InfraError::io(format!("open {}", names_path.display()), e))?;

        let lookup = Self::from_readers(
            BufReader::new(nodes),
            &nodes_path,
            BufReader::new(names),
            &names_path,
        )?;
        debug!("open: loaded {} nodes", lookup.nodes.len());
        Ok(lookup)
    }

    /// Parse dump content from arbitrary readers; paths are used for error messages.
    pub fn from_readers(
        nodes: impl BufRead,
        nodes_path: &Path,
        names: impl BufRead,
        names_path: &Path,
    ) -> InfraResult<Self> {
        let mut lookup = Self::default();

        for (lineno, line) in nodes.lines().enumerate() {
            let line = line.map_err(|e| InfraError::io(format!("read {}", nodes_path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_row(&line);
            if fields.len() < 3 {
                return Err(malformed(nodes_path, lineno, "expected at least 3 fields"));
            }
            let id = parse_id(fields[0], nodes_path, lineno)?;
            let parent = parse_id(fields[1], nodes_path, lineno)?;
            lookup.nodes.insert(
                id,
                Node {
                    parent,
                    rank: fields[2].to_string(),
                },
            );
        }

        for (lineno, line) in names.lines().enumerate() {
            let line = line.map_err(|e| InfraError::io(format!("read {}", names_path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_row(&line);
            if fields.len() < 4 {
                return Err(malformed(names_path, lineno, "expected 4 fields"));
            }
            let id = parse_id(fields[0], names_path, lineno)?;
            let name = fields[1].to_string();
            let class = fields[3];

            let entry = lookup.names.entry(id).or_default();
            match class {
                SCIENTIFIC_NAME => entry.scientific = Some(name.clone()),
                SYNONYM => {
                    entry.synonyms.insert(name.clone());
                }
                c if COMMON_NAMES.contains(&c) => {
                    // genbank common name is listed first and preferred
                    if entry.common.is_none() {
                        entry.common = Some(name);
                    }
                    continue;
                }
                _ => continue,
            }
            lookup
                .by_name
                .entry(name.to_lowercase())
                .or_default()
                .insert(id);
        }

        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn taxon(&self, id: TaxonId) -> Result<Taxon, LookupError> {
        let node = self.nodes.get(&id).ok_or(LookupError::UnknownId(id))?;
        let names = self.names.get(&id).cloned().unwrap_or_default();
        let scientific = names
            .scientific
            .ok_or_else(|| LookupError::Inconsistent(format!("taxon {} has no scientific name", id)))?;

        let mut taxon = Taxon::new(id, scientific);
        taxon.common_name = names.common;
        taxon.synonyms = names.synonyms;
        if node.rank != "no rank" {
            taxon.tags.insert("rank".to_string(), node.rank.clone());
        }
        Ok(taxon)
    }
}

impl TaxonomyLookup for TaxdumpLookup {
    fn lineage(&self, id: TaxonId) -> Result<LineageRecord, LookupError> {
        let query = self.taxon(id)?;

        // walk to the self-parented dump root
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = id;
        loop {
            let node = self.nodes.get(&current).ok_or(LookupError::UnknownId(current))?;
            if node.parent == current {
                break;
            }
            if !visited.insert(node.parent) {
                return Err(LookupError::Inconsistent(format!(
                    "cycle through taxon {}",
                    node.parent
                )));
            }
            if !self.nodes.contains_key(&node.parent) {
                return Err(LookupError::Inconsistent(format!(
                    "taxon {} has unknown parent {}",
                    current, node.parent
                )));
            }
            chain.push(node.parent);
            current = node.parent;
        }

        let ancestors = chain
            .into_iter()
            .rev()
            .map(|a| self.taxon(a))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("lineage: id={} depth={}", id, ancestors.len());
        Ok(LineageRecord { query, ancestors })
    }

    fn resolve_name(&self, name: &str) -> Result<TaxonId, LookupError> {
        let key = name.trim().to_lowercase();
        let candidates = self
            .by_name
            .get(&key)
            .ok_or_else(|| LookupError::UnknownName(name.to_string()))?;

        // an exact scientific name beats synonyms
        let scientific: Vec<TaxonId> = candidates
            .iter()
            .copied()
            .filter(|id| {
                self.names
                    .get(id)
                    .and_then(|n| n.scientific.as_deref())
                    .is_some_and(|s| s.to_lowercase() == key)
            })
            .collect();
        let pool: Vec<TaxonId> = if scientific.is_empty() {
            candidates.iter().copied().collect()
        } else {
            scientific
        };

        match pool.as_slice() {
            [single] => Ok(*single),
            _ => Err(LookupError::AmbiguousName {
                name: name.to_string(),
                candidates: pool,
            }),
        }
    }
}

/// Split one dump row into trimmed fields.
fn split_row(line: &str) -> Vec<&str> {
    let line = line.trim_end_matches(['\n', '\r']);
    let line = line.strip_suffix("\t|").unwrap_or(line);
    line.split("\t|\t").map(str::trim).collect()
}

fn parse_id(field: &str, path: &Path, lineno: usize) -> InfraResult<TaxonId> {
    field
        .parse::<TaxonId>()
        .map_err(|e| malformed(path, lineno, &e.to_string()))
}

fn malformed(path: &Path, lineno: usize, message: &str) -> InfraError {
    InfraError::Taxdump {
        path: PathBuf::from(path),
        line: lineno + 1,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const NODES: &str = "\
1\t|\t1\t|\tno rank\t|\t\t|
2\t|\t131567\t|\tsuperkingdom\t|\t\t|
131567\t|\t1\t|\tno rank\t|\t\t|
561\t|\t2\t|\tgenus\t|\t\t|
562\t|\t561\t|\tspecies\t|\t\t|
";

    const NAMES: &str = "\
1\t|\troot\t|\t\t|\tscientific name\t|
2\t|\tBacteria\t|\tBacteria <bacteria>\t|\tscientific name\t|
2\t|\teubacteria\t|\t\t|\tgenbank common name\t|
131567\t|\tcellular organisms\t|\t\t|\tscientific name\t|
561\t|\tEscherichia\t|\t\t|\tscientific name\t|
562\t|\tEscherichia coli\t|\t\t|\tscientific name\t|
562\t|\tBacillus coli\t|\t\t|\tsynonym\t|
";

    fn lookup() -> TaxdumpLookup {
        TaxdumpLookup::from_readers(
            Cursor::new(NODES),
            Path::new(NODES_FILE),
            Cursor::new(NAMES),
            Path::new(NAMES_FILE),
        )
        .unwrap()
    }

    #[test]
    fn test_split_row() {
        assert_eq!(
            split_row("562\t|\tEscherichia coli\t|\t\t|\tscientific name\t|"),
            vec!["562", "Escherichia coli", "", "scientific name"]
        );
    }

    #[test]
    fn test_lineage_root_first_without_query() {
        let record = lookup().lineage(TaxonId::new(562)).unwrap();
        assert_eq!(record.query.scientific_name, "Escherichia coli");
        let ids: Vec<u64> = record.ancestors.iter().map(|t| t.id.value()).collect();
        assert_eq!(ids, vec![1, 131567, 2, 561]);
    }

    #[test]
    fn test_lineage_carries_names_and_rank() {
        let record = lookup().lineage(TaxonId::new(562)).unwrap();
        assert!(record.query.synonyms.contains("Bacillus coli"));
        assert_eq!(record.query.tags["rank"], "species");
        let bacteria = &record.ancestors[2];
        assert_eq!(bacteria.common_name.as_deref(), Some("eubacteria"));
    }

    #[test]
    fn test_lineage_of_dump_root_is_just_root() {
        let record = lookup().lineage(TaxonId::new(1)).unwrap();
        assert!(record.ancestors.is_empty());
        assert!(!record.query.tags.contains_key("rank"));
    }

    #[test]
    fn test_lineage_unknown_id() {
        assert_eq!(
            lookup().lineage(TaxonId::new(999)).unwrap_err(),
            LookupError::UnknownId(TaxonId::new(999))
        );
    }

    #[test]
    fn test_resolve_name_case_insensitive() {
        assert_eq!(lookup().resolve_name("escherichia COLI").unwrap(), TaxonId::new(562));
        assert_eq!(lookup().resolve_name("Bacillus coli").unwrap(), TaxonId::new(562));
    }

    #[test]
    fn test_resolve_name_unknown() {
        assert!(matches!(
            lookup().resolve_name("Homo sapiens"),
            Err(LookupError::UnknownName(_))
        ));
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let err = TaxdumpLookup::from_readers(
            Cursor::new("1\t|\t1\t|\tno rank\t|\nabc\t|\t1\t|\tgenus\t|\n"),
            Path::new(NODES_FILE),
            Cursor::new(""),
            Path::new(NAMES_FILE),
        )
        .unwrap_err();
        match err {
            InfraError::Taxdump { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_detected() {
        let lookup = TaxdumpLookup::from_readers(
            Cursor::new("5\t|\t6\t|\tgenus\t|\n6\t|\t5\t|\tgenus\t|\n"),
            Path::new(NODES_FILE),
            Cursor::new("5\t|\ta\t|\t\t|\tscientific name\t|\n6\t|\tb\t|\t\t|\tscientific name\t|\n"),
            Path::new(NAMES_FILE),
        )
        .unwrap();
        assert!(matches!(
            lookup.lineage(TaxonId::new(5)),
            Err(LookupError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_cycle_above_query_detected() {
        // 7 -> 5 -> 6 -> 5
        let lookup = TaxdumpLookup::from_readers(
            Cursor::new("5\t|\t6\t|\tgenus\t|\n6\t|\t5\t|\tgenus\t|\n7\t|\t5\t|\tspecies\t|\n"),
            Path::new(NODES_FILE),
            Cursor::new("7\t|\tc\t|\t\t|\tscientific name\t|\n"),
            Path::new(NAMES_FILE),
        )
        .unwrap();
        assert!(matches!(
            lookup.lineage(TaxonId::new(7)),
            Err(LookupError::Inconsistent(ref msg)) if msg.contains("cycle")
        ));
    }

    #[test]
    fn test_deep_chain_lineage() {
        let depth = 20_000u64;
        let mut nodes = String::new();
        let mut names = String::new();
        for id in 1..=depth {
            let parent = if id == 1 { 1 } else { id - 1 };
            nodes.push_str(&format!("{}\t|\t{}\t|\tno rank\t|\n", id, parent));
            names.push_str(&format!("{}\t|\tclade {}\t|\t\t|\tscientific name\t|\n", id, id));
        }
        let lookup = TaxdumpLookup::from_readers(
            Cursor::new(nodes),
            Path::new(NODES_FILE),
            Cursor::new(names),
            Path::new(NAMES_FILE),
        )
        .unwrap();

        let record = lookup.lineage(TaxonId::new(depth)).unwrap();

        assert_eq!(record.ancestors.len() as u64, depth - 1);
        assert_eq!(record.ancestors[0].id, TaxonId::new(1));
        assert_eq!(record.ancestors[record.ancestors.len() - 1].id, TaxonId::new(depth - 1));
    }
}

//! Tests for TreeStore

use std::collections::BTreeMap;
use std::sync::Arc;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use taxlink::application::hash::content_digest;
use taxlink::application::services::TreeStore;
use taxlink::application::ApplicationError;
use taxlink::domain::{Lineage, LinkMethod, PinnedData, Taxon, TaxonId, TaxonTree};
use taxlink::infrastructure::traits::RealFileSystem;
use taxlink::util::testing;

struct Fixture {
    _temp: TempDir,
    store: TreeStore,
}

#[fixture]
fn fixture() -> Fixture {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".data").join("taxlink.toml");
    let store = TreeStore::new(Arc::new(RealFileSystem), path);
    Fixture { _temp: temp, store }
}

fn populated_tree() -> TaxonTree {
    let mut tree = TaxonTree::new();
    let lineage = Lineage::new(vec![
        Taxon::root(),
        Taxon::new(2u64, "Bacteria").with_common_name("eubacteria"),
        Taxon::new(561u64, "Escherichia"),
        Taxon::new(562u64, "Escherichia coli").with_synonym("Bacillus coli"),
    ])
    .unwrap();
    tree.insert_lineage(&lineage);
    tree.insert_lineage(&Lineage::from_pairs([(2u64, "Bacteria"), (1239, "Firmicutes")]).unwrap());
    tree.set_tag(TaxonId::new(562), "rank", "species").unwrap();
    tree.pin(
        TaxonId::new(562),
        PinnedData {
            digest: content_digest(b">seq\nACGT\n"),
            file_name: "ecoli.fa".to_string(),
            method: LinkMethod::Copy,
            pinned_at: "2024-05-01T10:00:00Z".to_string(),
            tags: BTreeMap::from([("source".to_string(), "RefSeq".to_string())]),
        },
    )
    .unwrap();
    tree
}

// ============================================================
// load()
// ============================================================

#[rstest]
fn given_missing_file_when_load_then_fresh_tree(fixture: Fixture) {
    // Act
    let tree = fixture.store.load().unwrap();

    // Assert
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root().id, TaxonId::ROOT);
}

#[rstest]
#[case::not_toml("this is not = = toml")]
#[case::wrong_version("version = 7\n")]
#[case::orphan_parent(
    "version = 1\n[[taxa]]\nid = 0\nscientific_name = \"root\"\n[[taxa]]\nid = 5\nparent = 9\nscientific_name = \"orphan\"\n"
)]
#[case::no_root("version = 1\n[[taxa]]\nid = 5\nscientific_name = \"x\"\n")]
#[case::bad_digest(
    "version = 1\n[[taxa]]\nid = 0\nscientific_name = \"root\"\n[[taxa.data]]\ndigest = \"abc\"\nfile_name = \"f\"\nmethod = \"c\"\npinned_at = \"t\"\n"
)]
fn given_malformed_file_when_load_then_persisted_state_corrupt(
    fixture: Fixture,
    #[case] content: &str,
) {
    // Arrange
    std::fs::create_dir_all(fixture.store.path().parent().unwrap()).unwrap();
    std::fs::write(fixture.store.path(), content).unwrap();

    // Act
    let err = fixture.store.load().unwrap_err();

    // Assert
    match err {
        ApplicationError::PersistedStateCorrupt { path, .. } => {
            assert_eq!(path, fixture.store.path())
        }
        other => panic!("expected PersistedStateCorrupt, got {other:?}"),
    }
}

// ============================================================
// save()
// ============================================================

#[rstest]
fn given_populated_tree_when_save_and_load_then_round_trips(fixture: Fixture) {
    // Arrange
    let tree = populated_tree();

    // Act
    let written = fixture.store.save(&tree).unwrap();
    let loaded = fixture.store.load().unwrap();

    // Assert
    assert!(written);
    assert_eq!(loaded, tree);
    assert_eq!(loaded.structure(), tree.structure());
    let ecoli = loaded.get(TaxonId::new(562)).unwrap();
    assert!(ecoli.synonyms.contains("Bacillus coli"));
    assert_eq!(ecoli.tags["rank"], "species");
    assert_eq!(ecoli.data.len(), 1);
    let pinned = ecoli.data.values().next().unwrap();
    assert_eq!(pinned.method, LinkMethod::Copy);
    assert_eq!(pinned.tags["source"], "RefSeq");
    assert_eq!(
        loaded.get(TaxonId::new(2)).unwrap().common_name.as_deref(),
        Some("eubacteria")
    );
}

#[rstest]
fn given_empty_tree_when_save_then_no_file_written(fixture: Fixture) {
    // Act
    let written = fixture.store.save(&TaxonTree::new()).unwrap();

    // Assert
    assert!(!written);
    assert!(!fixture.store.path().exists());
}

#[rstest]
fn given_existing_file_when_saving_empty_tree_then_prior_state_kept(fixture: Fixture) {
    // Arrange
    fixture.store.save(&populated_tree()).unwrap();
    let before = std::fs::read_to_string(fixture.store.path()).unwrap();

    // Act
    let written = fixture.store.save(&TaxonTree::new()).unwrap();

    // Assert
    assert!(!written);
    assert_eq!(std::fs::read_to_string(fixture.store.path()).unwrap(), before);
}

#[rstest]
fn given_saved_tree_when_saving_again_then_file_replaced(fixture: Fixture) {
    // Arrange
    let mut tree = populated_tree();
    fixture.store.save(&tree).unwrap();

    // Act
    tree.insert_lineage(&Lineage::from_pairs([(2157u64, "Archaea")]).unwrap());
    fixture.store.save(&tree).unwrap();

    // Assert
    let loaded = fixture.store.load().unwrap();
    assert!(loaded.contains(TaxonId::new(2157)));
    let leftovers: Vec<_> = std::fs::read_dir(fixture.store.path().parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path() != fixture.store.path())
        .collect();
    assert!(leftovers.is_empty(), "temporary files left behind");
}

#[rstest]
fn given_tree_when_encode_then_parents_precede_children() {
    // Act
    let text = TreeStore::encode(&populated_tree()).unwrap();

    // Assert
    assert!(text.starts_with("version = 1"));
    let root = text.find("scientific_name = \"root\"").unwrap();
    let genus = text.find("scientific_name = \"Escherichia\"").unwrap();
    let species = text.find("scientific_name = \"Escherichia coli\"").unwrap();
    assert!(root < genus && genus < species);
}

//! Storage integration tests
//!
//! End-to-end checks of the heap, both indexes and the external sorter
//! working against the same files:
//! - Identifier assignment and tombstones
//! - Index maintenance across heap relocations
//! - B+Tree and hash directory invariants under mixed workloads
//! - Sorting by a field while preserving the record count

use bytes::BufMut;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use shelf_common::record::{get_i32, get_str, put_str};
use shelf_common::{
    FieldValue, FixedString, Record, Result, ShelfError, SortStrategy, StoreConfig,
    UNASSIGNED_ID,
};
use shelf_storage::{
    by_field, BPlusTree, ExtensibleHash, ExternalSorter, RecordHeap, UpdateOutcome,
};

type Title = FixedString<24>;
type Genre = FixedString<12>;

#[derive(Debug, Clone, PartialEq)]
struct Show {
    id: i32,
    title: String,
    genre: String,
    release_year: i32,
}

impl Show {
    fn new(title: &str, genre: &str, release_year: i32) -> Self {
        Self {
            id: UNASSIGNED_ID,
            title: title.to_string(),
            genre: genre.to_string(),
            release_year,
        }
    }
}

impl Record for Show {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.put_i32(self.id);
        put_str(&mut buf, &self.title)?;
        put_str(&mut buf, &self.genre)?;
        buf.put_i32(self.release_year);
        Ok(buf)
    }

    fn decode(mut bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            id: get_i32(&mut bytes)?,
            title: get_str(&mut bytes)?,
            genre: get_str(&mut bytes)?,
            release_year: get_i32(&mut bytes)?,
        })
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.into()),
            "title" => Some(self.title.as_str().into()),
            "genre" => Some(self.genre.as_str().into()),
            "releaseYear" => Some(self.release_year.into()),
            _ => None,
        }
    }
}

const CATALOG: [(&str, &str, i32); 8] = [
    ("Lost", "drama", 2004),
    ("Dark", "scifi", 2017),
    ("Fargo", "crime", 2014),
    ("Ozark", "crime", 2017),
    ("House", "drama", 2004),
    ("Severance", "scifi", 2022),
    ("Mindhunter", "crime", 2017),
    ("Succession", "drama", 2018),
];

fn create_test_config(dir: &std::path::Path) -> StoreConfig {
    StoreConfig::from_toml_str(&format!(
        r#"
        data_dir = "{}"
        btree_order = 3
        hash_bucket_capacity = 2
        sort_branches = 3
        sort_block_size = 2
        "#,
        dir.display()
    ))
    .unwrap()
}

fn load_catalog(heap: &mut RecordHeap<Show>) -> Vec<u64> {
    CATALOG
        .iter()
        .map(|&(title, genre, year)| heap.create(&mut Show::new(title, genre, year)).unwrap())
        .collect()
}

// =============================================================================
// Record heap
// =============================================================================

#[test]
fn test_ids_are_strictly_increasing() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut heap = RecordHeap::<Show>::with_config(&config, "shows").unwrap();
    load_catalog(&mut heap);

    let ids: Vec<i32> = heap.scan().unwrap().map(|s| s.unwrap().record.id).collect();
    assert_eq!(ids, (1..=CATALOG.len() as i32).collect::<Vec<_>>());
    assert_eq!(heap.last_id().unwrap(), CATALOG.len() as i32);

    let mut stale = Show::new("Reused", "drama", 2000);
    stale.id = 3;
    assert!(matches!(
        heap.create(&mut stale),
        Err(ShelfError::DuplicateIdentifier { id: 3, .. })
    ));
    assert_eq!(heap.count().unwrap(), CATALOG.len());
}

#[test]
fn test_deleted_record_only_visible_in_raw_scan() {
    let dir = tempdir().unwrap();
    let mut heap = RecordHeap::<Show>::open(dir.path().join("shows.db")).unwrap();
    load_catalog(&mut heap);

    assert!(heap.delete(4).unwrap());
    assert!(!heap.delete(4).unwrap());
    assert_eq!(heap.find("id", &FieldValue::Int(4)).unwrap(), None);
    assert_eq!(heap.count().unwrap(), CATALOG.len() - 1);

    let dead: Vec<_> = heap
        .scan_slots()
        .unwrap()
        .map(|s| s.unwrap())
        .filter(|s| !s.live)
        .collect();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].record.title, "Ozark");
    assert_eq!(heap.read_at(dead[0].address).unwrap(), None);
}

#[test]
fn test_find_all_by_field() {
    let dir = tempdir().unwrap();
    let mut heap = RecordHeap::<Show>::open(dir.path().join("shows.db")).unwrap();
    load_catalog(&mut heap);

    let crime = heap.find_all("genre", &"crime".into()).unwrap();
    let titles: Vec<_> = crime.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Fargo", "Ozark", "Mindhunter"]);
    assert!(heap.find_all("genre", &"comedy".into()).unwrap().is_empty());
}

// =============================================================================
// Indexes over the heap
// =============================================================================

#[test]
fn test_indexes_follow_relocated_record() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut heap = RecordHeap::<Show>::with_config(&config, "shows").unwrap();
    let mut by_id = BPlusTree::<i32>::with_config(&config, "shows_id").unwrap();
    let mut by_title = ExtensibleHash::<Title>::with_config(&config, "shows_title", false).unwrap();

    load_catalog(&mut heap);
    assert_eq!(by_id.rebuild_from(&heap, |s| s.id).unwrap(), CATALOG.len());
    assert_eq!(
        by_title.rebuild_from(&heap, |s| s.title.as_str().into()).unwrap(),
        CATALOG.len()
    );

    let old = by_id.search(&2).unwrap().unwrap();
    let outcome = heap
        .update_with(2, |s| s.title = "Dark (Complete Series)".to_string())
        .unwrap();
    let UpdateOutcome::Relocated { from, to } = outcome else {
        panic!("expected relocation, got {outcome}");
    };
    assert_eq!(from, old);

    assert!(by_id.update(&2, to).unwrap());
    assert!(by_title.delete(&"Dark".into()).unwrap());
    by_title.insert("Dark (Complete Series)".into(), to).unwrap();

    let address = by_id.search(&2).unwrap().unwrap();
    assert_eq!(
        heap.read_at(address).unwrap().unwrap().title,
        "Dark (Complete Series)"
    );
    assert_eq!(by_title.get(&"Dark (Complete Series)".into()).unwrap(), Some(to));
    assert_eq!(heap.read_at(from).unwrap(), None);

    let in_place = heap.update_with(3, |s| s.release_year = 2015).unwrap();
    assert_eq!(in_place.address(), by_id.search(&3).unwrap());
    by_id.verify().unwrap();
    by_title.verify().unwrap();
}

#[test]
fn test_btree_order_three_delete_example() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut tree = BPlusTree::<i32>::with_config(&config, "keys").unwrap();
    for key in [10, 20, 5, 6, 12, 30, 7, 17] {
        tree.insert(key, key as u64).unwrap();
    }
    assert!(tree.delete(&6).unwrap());
    tree.verify().unwrap();

    let keys: Vec<i32> = tree.iter().unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(keys, vec![5, 7, 10, 12, 17, 20, 30]);
}

#[test]
fn test_btree_mixed_workload_keeps_invariants() {
    let dir = tempdir().unwrap();
    let mut tree = BPlusTree::<u64>::open(dir.path().join("mixed.btree.db"), 5).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut live = std::collections::BTreeMap::new();

    for round in 0..2000 {
        let key = rng.gen_range(0..400u64);
        if rng.gen_bool(0.6) {
            let inserted = tree.insert(key, round).is_ok();
            assert_eq!(inserted, !live.contains_key(&key));
            live.entry(key).or_insert(round);
        } else {
            assert_eq!(tree.delete(&key).unwrap(), live.remove(&key).is_some());
        }
        if round % 250 == 0 {
            tree.verify().unwrap();
        }
    }
    tree.verify().unwrap();

    let got: Vec<(u64, u64)> = tree.iter().unwrap().map(|e| e.unwrap()).collect();
    let expected: Vec<(u64, u64)> = live.into_iter().collect();
    assert_eq!(got, expected);
}

#[test]
fn test_hash_capacity_two_grows_directory() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut index = ExtensibleHash::<i32>::with_config(&config, "ids", false).unwrap();
    assert_eq!(index.global_depth().unwrap(), 1);

    for key in [11, 22, 33, 44, 55] {
        index.insert(key, key as u64).unwrap();
    }
    assert!(index.global_depth().unwrap() >= 2);
    index.verify().unwrap();
}

#[test]
fn test_hash_inverted_index_by_genre() {
    let dir = tempdir().unwrap();
    let mut heap = RecordHeap::<Show>::open(dir.path().join("shows.db")).unwrap();
    let addresses = load_catalog(&mut heap);
    let mut genres = ExtensibleHash::<Genre>::new(
        dir.path().join("genre.hash_dir.db"),
        dir.path().join("genre.hash_buckets.db"),
        4,
        true,
    )
    .unwrap();
    genres.rebuild_from(&heap, |s| s.genre.as_str().into()).unwrap();
    genres.verify().unwrap();

    let crime = genres.get_all(&"crime".into()).unwrap();
    assert_eq!(crime, vec![addresses[2], addresses[3], addresses[6]]);
    let titles: Vec<String> = crime
        .iter()
        .map(|&a| heap.read_at(a).unwrap().unwrap().title)
        .collect();
    assert_eq!(titles, vec!["Fargo", "Ozark", "Mindhunter"]);

    assert!(genres.delete_value(&"crime".into(), addresses[3]).unwrap());
    assert_eq!(genres.get_all(&"crime".into()).unwrap().len(), 2);
    assert_eq!(genres.len().unwrap(), CATALOG.len() - 1);
}

#[test]
fn test_hash_random_inserts_keep_directory_invariant() {
    let dir = tempdir().unwrap();
    let mut index = ExtensibleHash::<u64>::new(
        dir.path().join("r.hash_dir.db"),
        dir.path().join("r.hash_buckets.db"),
        4,
        false,
    )
    .unwrap();
    let mut keys: Vec<u64> = (0..1000).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(99));

    for (i, &key) in keys.iter().enumerate() {
        index.insert(key, key * 3).unwrap();
        if i % 200 == 0 {
            index.verify().unwrap();
        }
    }
    index.verify().unwrap();
    assert_eq!(index.len().unwrap(), keys.len());
    assert!(keys.iter().all(|k| index.get(k).unwrap() == Some(k * 3)));
}

// =============================================================================
// External sort
// =============================================================================

#[test]
fn test_sort_by_release_year_example() {
    for strategy in [SortStrategy::FixedBlock, SortStrategy::ReplacementSelection] {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            sort_strategy: strategy,
            ..create_test_config(dir.path())
        };
        let mut heap = RecordHeap::<Show>::with_config(&config, "shows").unwrap();
        for year in [2001, 1999, 2020, 1999, 2015] {
            heap.create(&mut Show::new("show", "drama", year)).unwrap();
        }

        let sorter = ExternalSorter::with_config(&config).unwrap();
        let summary = sorter.sort(&mut heap, by_field("releaseYear")).unwrap();
        assert_eq!(summary.records, 5);

        let mut years = Vec::new();
        while let Some(show) = heap.read_sequential().unwrap() {
            years.push(show.release_year);
        }
        assert_eq!(years, vec![1999, 1999, 2001, 2015, 2020]);
    }
}

#[test]
fn test_sort_then_rebuild_index() {
    let dir = tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut heap = RecordHeap::<Show>::with_config(&config, "shows").unwrap();
    load_catalog(&mut heap);
    heap.delete(1).unwrap();

    let sorter = ExternalSorter::with_config(&config).unwrap();
    let summary = sorter.sort(&mut heap, by_field("title")).unwrap();
    assert_eq!(summary.records, CATALOG.len() - 1);
    assert!(summary.merge_passes >= 1);

    let titles: Vec<String> = heap.scan().unwrap().map(|s| s.unwrap().record.title).collect();
    let mut expected = titles.clone();
    expected.sort();
    assert_eq!(titles, expected);
    assert!(!titles.contains(&"Lost".to_string()));

    let mut by_id = BPlusTree::<i32>::with_config(&config, "shows_id").unwrap();
    by_id.rebuild_from(&heap, |s| s.id).unwrap();
    for id in 2..=CATALOG.len() as i32 {
        let address = by_id.search(&id).unwrap().unwrap();
        assert_eq!(heap.read_at(address).unwrap().unwrap().id, id);
    }
    assert_eq!(by_id.search(&1).unwrap(), None);

    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().contains(".sort"))
        .count();
    assert_eq!(leftovers, 0);
}

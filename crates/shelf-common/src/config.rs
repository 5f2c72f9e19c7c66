//! Configuration structures for ShelfDB.

use crate::error::{Result, ShelfError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run generation strategy used by the external sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// Sort fixed-size blocks in memory and deal them round-robin to branches.
    FixedBlock,
    /// Replacement selection through a bounded min-heap (longer runs).
    #[default]
    ReplacementSelection,
}

/// Storage configuration shared by the heap, the indexes and the sorter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding every data, index and scratch file.
    pub data_dir: PathBuf,
    /// File extension appended to every named file (without the dot).
    pub extension: String,
    /// B+Tree order (maximum number of children per page).
    pub btree_order: usize,
    /// Number of entries per extensible hash bucket.
    pub hash_bucket_capacity: usize,
    /// Number of scratch branches used per sort pass.
    pub sort_branches: usize,
    /// Records held in memory while generating runs.
    pub sort_block_size: usize,
    /// Run generation strategy.
    pub sort_strategy: SortStrategy,
    /// Call fsync after structural writes.
    pub fsync_enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            extension: "db".to_string(),
            btree_order: 8,
            hash_bucket_capacity: 16,
            sort_branches: 4,
            sort_block_size: 1024,
            sort_strategy: SortStrategy::ReplacementSelection,
            fsync_enabled: false,
        }
    }
}

impl StoreConfig {
    /// Creates a default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys fall back to the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(source)
            .map_err(|e| ShelfError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Rejects values the storage components cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.extension.is_empty() {
            return Err(ShelfError::InvalidConfiguration(
                "file extension must not be empty".to_string(),
            ));
        }
        if self.btree_order < 3 {
            return Err(ShelfError::InvalidConfiguration(format!(
                "btree order {} < 3",
                self.btree_order
            )));
        }
        if self.hash_bucket_capacity < 1 {
            return Err(ShelfError::InvalidConfiguration(
                "hash bucket capacity must be at least 1".to_string(),
            ));
        }
        if self.sort_branches <= 1 {
            return Err(ShelfError::InvalidConfiguration(format!(
                "sort branches {} <= 1",
                self.sort_branches
            )));
        }
        if self.sort_block_size <= 1 {
            return Err(ShelfError::InvalidConfiguration(format!(
                "sort block size {} <= 1",
                self.sort_block_size
            )));
        }
        Ok(())
    }

    /// Path of the record heap called `name`.
    pub fn heap_path(&self, name: &str) -> PathBuf {
        self.named(name)
    }

    /// Path of the B+Tree index called `name`.
    pub fn btree_path(&self, name: &str) -> PathBuf {
        self.named(&format!("{name}.btree"))
    }

    /// Directory and bucket paths of the extensible hash index called `name`.
    pub fn hash_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        (
            self.named(&format!("{name}.hash_dir")),
            self.named(&format!("{name}.hash_buckets")),
        )
    }

    /// Path of scratch branch `n` used while sorting `name`.
    pub fn scratch_path(&self, name: &str, n: usize) -> PathBuf {
        scratch_path_in(&self.data_dir, name, n, &self.extension)
    }

    fn named(&self, stem: &str) -> PathBuf {
        self.data_dir.join(format!("{stem}.{}", self.extension))
    }
}

/// Path of scratch branch `n` for the file named `name` in `dir`.
pub fn scratch_path_in(dir: &Path, name: &str, n: usize, extension: &str) -> PathBuf {
    dir.join(format!("{name}.sort{n}.{extension}"))
}

/// Fails with `InvalidConfiguration` when `path` has no file extension.
pub fn require_extension(path: &Path) -> Result<()> {
    match path.extension() {
        Some(ext) if !ext.is_empty() => Ok(()),
        _ => Err(ShelfError::InvalidConfiguration(format!(
            "path {} has no file extension",
            path.display()
        ))),
    }
}

//! Table construction parameters.
//!
//! A [`TableConfig`] names the table kind and its hashing parameters and can
//! be loaded from YAML or JSON:
//!
//! ```yaml
//! kind: hash2
//! children:
//!   - polynomial: 0x1EDC6F41
//!     n_buckets: 65536
//!   - polynomial: 0x741B8CD7
//!     n_buckets: 65536
//! ```
//!
//! or, for a single table:
//!
//! ```yaml
//! kind: hash
//! polynomial: 0x1EDC6F41
//! n_buckets: 4096
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::digest::{DEFAULT_POLYNOMIAL_0, DEFAULT_POLYNOMIAL_1};
use crate::error::{TableError, TableResult};
use crate::hash::HashTable;
use crate::hash2::DoubleHashTable;
use crate::table::{FlowEntry, SwTable};

/// Default bucket count of each hash table.
pub const DEFAULT_BUCKETS: usize = 0x10000;

/// Hashing parameters of one [`HashTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    /// CRC-32 polynomial.
    #[serde(default = "default_polynomial")]
    pub polynomial: u32,
    /// Bucket count; must be a non-zero power of two.
    #[serde(default = "default_buckets")]
    pub n_buckets: usize,
}

fn default_polynomial() -> u32 {
    DEFAULT_POLYNOMIAL_0
}

fn default_buckets() -> usize {
    DEFAULT_BUCKETS
}

impl HashParams {
    pub fn new(polynomial: u32, n_buckets: usize) -> Self {
        Self {
            polynomial,
            n_buckets,
        }
    }

    fn validate(&self, field: &str) -> TableResult<()> {
        if !self.n_buckets.is_power_of_two() {
            return Err(TableError::invalid_config(
                field,
                format!("{} is not a non-zero power of two", self.n_buckets),
            ));
        }
        Ok(())
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self::new(DEFAULT_POLYNOMIAL_0, DEFAULT_BUCKETS)
    }
}

/// Which table to build, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TableConfig {
    /// A single exact-match [`HashTable`].
    Hash(HashParams),
    /// A [`DoubleHashTable`] with two children.
    Hash2 { children: [HashParams; 2] },
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig::Hash2 {
            children: [
                HashParams::new(DEFAULT_POLYNOMIAL_0, DEFAULT_BUCKETS),
                HashParams::new(DEFAULT_POLYNOMIAL_1, DEFAULT_BUCKETS),
            ],
        }
    }
}

impl TableConfig {
    /// Parses and validates a YAML (or JSON, which is valid YAML) document.
    pub fn from_yaml_str(text: &str) -> TableResult<Self> {
        let config: TableConfig =
            serde_yaml::from_str(text).map_err(|e| TableError::parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(text: &str) -> TableResult<Self> {
        let config: TableConfig =
            serde_json::from_str(text).map_err(|e| TableError::parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file. Files ending in `.json` are read as
    /// JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> TableResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Checks every bucket count.
    pub fn validate(&self) -> TableResult<()> {
        match self {
            TableConfig::Hash(params) => params.validate("n_buckets"),
            TableConfig::Hash2 { children } => {
                children[0].validate("children[0].n_buckets")?;
                children[1].validate("children[1].n_buckets")?;
                if children[0].n_buckets.checked_add(children[1].n_buckets).is_none() {
                    return Err(TableError::invalid_config(
                        "children",
                        "total bucket count overflows usize",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Table kind name as reported in [`TableStats`](crate::TableStats).
    pub fn kind(&self) -> &'static str {
        match self {
            TableConfig::Hash(_) => "hash",
            TableConfig::Hash2 { .. } => "hash2",
        }
    }

    /// Total number of buckets the table will have.
    pub fn capacity(&self) -> usize {
        match self {
            TableConfig::Hash(params) => params.n_buckets,
            TableConfig::Hash2 { children } => {
                children[0].n_buckets.saturating_add(children[1].n_buckets)
            }
        }
    }

    /// Validates the configuration and builds the table behind the uniform
    /// interface.
    pub fn build<F: FlowEntry + 'static>(&self) -> TableResult<Box<dyn SwTable<F>>> {
        self.validate()?;
        info!(kind = self.kind(), capacity = self.capacity(), "building flow table");

        let table: Box<dyn SwTable<F>> = match self {
            TableConfig::Hash(p) => Box::new(HashTable::new(p.polynomial, p.n_buckets)?),
            TableConfig::Hash2 { children: [p0, p1] } => Box::new(DoubleHashTable::new(
                p0.polynomial,
                p0.n_buckets,
                p1.polynomial,
                p1.n_buckets,
            )?),
        };
        Ok(table)
    }
}

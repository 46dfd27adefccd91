//! Exact-match hash flow tables for the software OpenFlow switch.
//!
//! This crate provides the hash-based table kinds of the switch's flow
//! table abstraction:
//!
//! - [`SwTable`]: Uniform interface the table dispatcher drives
//! - [`HashTable`]: One flow per bucket, no chaining, no probing
//! - [`DoubleHashTable`]: Two independently hashed tables, two candidate
//!   buckets per key
//! - [`Crc32`]: Configurable-polynomial CRC used to pick buckets
//! - [`TableConfig`]: Serde-loadable construction parameters
//!
//! # Ownership model
//!
//! A flow handed to [`SwTable::insert`] is either stored (the table owns it
//! from then on) or returned to the caller inside [`Rejected`]. A stored
//! flow is released, by dropping it, exactly once: when it is replaced by a
//! flow with the same key, deleted, expired by a timeout sweep, or when the
//! table is destroyed. Timeout sweeps notify the [`Datapath`] before the
//! release.
//!
//! # Example
//!
//! ```
//! use ofswitch_table::{SwTable, TableConfig};
//! use ofswitch_types::{Flow, FlowKey, Wildcards};
//!
//! let mut table = TableConfig::default().build::<Flow>().unwrap();
//!
//! let key = FlowKey::exact().with_in_port(1).with_dl_type(0x0800);
//! table.insert(Flow::new(key)).unwrap();
//! assert!(table.lookup(&key).is_some());
//!
//! // Wildcarded flows belong in another table kind.
//! let wild = Flow::new(key.with_wildcards(Wildcards::IN_PORT));
//! assert!(table.insert(wild).is_err());
//!
//! assert_eq!(table.cursor().count(), 1);
//! table.destroy();
//! ```

pub mod config;
mod digest;
mod error;
mod hash;
mod hash2;
mod table;

pub use config::{HashParams, TableConfig, DEFAULT_BUCKETS};
pub use digest::{Crc32, KeyDigest, DEFAULT_POLYNOMIAL_0, DEFAULT_POLYNOMIAL_1};
pub use error::{TableError, TableResult};
pub use hash::{HashCursor, HashTable};
pub use hash2::{CursorPhase, DoubleCursor, DoubleHashTable};
pub use table::{
    Datapath, FlowCursor, FlowEntry, InsertOutcome, InsertResult, RejectReason, Rejected,
    SwTable, TableStats,
};

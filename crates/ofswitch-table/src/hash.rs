//! Exact-match hash table with one flow per bucket.
//!
//! Each key maps to exactly one bucket, `digest(key bytes) & (n_buckets - 1)`.
//! There is no chaining and no probing: a bucket holds at most one flow.
//!
//! # Insert policy
//!
//! - empty bucket: the flow is stored
//! - bucket holds the same key: the old flow is released, the new one stored
//! - bucket holds a different key: the insert is rejected and the flow is
//!   handed back; the stored flow is never evicted
//!
//! This is not a cache. Callers that want a second chance for colliding keys
//! use [`DoubleHashTable`](crate::DoubleHashTable).

use ofswitch_types::FlowKey;
use tracing::{debug, error, trace};

use crate::digest::{Crc32, KeyDigest};
use crate::error::{TableError, TableResult};
use crate::table::{
    Datapath, FlowCursor, FlowEntry, InsertOutcome, InsertResult, RejectReason, Rejected,
    SwTable, TableStats,
};

/// Single exact-match hash table.
///
/// # Example
///
/// ```
/// use ofswitch_table::{HashTable, InsertOutcome, SwTable};
/// use ofswitch_types::{Flow, FlowKey};
///
/// let mut table: HashTable<Flow> = HashTable::new(0x1EDC6F41, 1024).unwrap();
/// let key = FlowKey::exact().with_in_port(1).with_tp_dst(80);
///
/// assert_eq!(table.insert(Flow::new(key)).unwrap(), InsertOutcome::Added);
/// assert!(table.lookup(&key).is_some());
/// assert_eq!(table.stats().max_flows, 1024);
/// ```
#[derive(Debug)]
pub struct HashTable<F, D = Crc32> {
    digest: D,
    buckets: Vec<Option<F>>,
    bucket_mask: usize,
    n_flows: usize,
}

impl<F: FlowEntry> HashTable<F, Crc32> {
    /// Creates a table with `n_buckets` buckets hashed by CRC-32 over
    /// `polynomial`.
    ///
    /// # Panics
    ///
    /// Panics if `n_buckets` is not a power of two.
    pub fn new(polynomial: u32, n_buckets: usize) -> TableResult<Self> {
        Self::with_digest(Crc32::new(polynomial), n_buckets)
    }
}

impl<F: FlowEntry, D: KeyDigest> HashTable<F, D> {
    /// Creates a table with `n_buckets` buckets hashed by `digest`.
    ///
    /// Returns [`TableError::Unavailable`] if the bucket array cannot be
    /// allocated.
    ///
    /// # Panics
    ///
    /// Panics if `n_buckets` is not a power of two. Bucket counts coming from
    /// configuration are checked by
    /// [`TableConfig::validate`](crate::TableConfig::validate) first.
    pub fn with_digest(digest: D, n_buckets: usize) -> TableResult<Self> {
        assert!(
            n_buckets.is_power_of_two(),
            "hash table bucket count {n_buckets} is not a power of two"
        );

        let mut buckets = Vec::new();
        if buckets.try_reserve_exact(n_buckets).is_err() {
            error!(n_buckets, "failed to allocate hash buckets");
            return Err(TableError::unavailable("hash buckets", n_buckets));
        }
        buckets.resize_with(n_buckets, || None);

        debug!(n_buckets, "created hash table");
        Ok(Self {
            digest,
            buckets,
            bucket_mask: n_buckets - 1,
            n_flows: 0,
        })
    }

    pub fn n_buckets(&self) -> usize {
        self.bucket_mask + 1
    }

    pub fn digest(&self) -> &D {
        &self.digest
    }

    /// Index of the bucket `key` hashes to.
    pub fn bucket_of(&self, key: &FlowKey) -> usize {
        self.digest.digest(&key.to_bytes()) as usize & self.bucket_mask
    }

    /// Returns true if the bucket `key` hashes to holds a flow with exactly
    /// this key.
    pub fn contains_key(&self, key: &FlowKey) -> bool {
        self.lookup(key).is_some()
    }

    pub fn lookup(&self, key: &FlowKey) -> Option<&F> {
        self.buckets[self.bucket_of(key)]
            .as_ref()
            .filter(|flow| flow.key() == key)
    }

    pub fn insert(&mut self, flow: F) -> InsertResult<F> {
        if !flow.key().is_exact() {
            trace!(key = %flow.key(), "rejecting wildcarded flow");
            return Err(Rejected::new(RejectReason::Wildcarded, flow));
        }

        let index = self.bucket_of(flow.key());
        let slot = &mut self.buckets[index];
        match slot.as_ref().map(|old| old.key() == flow.key()) {
            None => {
                *slot = Some(flow);
                self.n_flows += 1;
                Ok(InsertOutcome::Added)
            }
            Some(true) => {
                // Release the predecessor; the count is unchanged.
                drop(slot.replace(flow));
                trace!(bucket = index, "replaced flow");
                Ok(InsertOutcome::Replaced)
            }
            Some(false) => {
                trace!(bucket = index, key = %flow.key(), "bucket occupied, rejecting flow");
                Err(Rejected::new(RejectReason::BucketOccupied, flow))
            }
        }
    }

    pub fn delete(&mut self, key: &FlowKey, strict: bool) -> usize {
        let count = if key.is_exact() {
            let index = self.bucket_of(key);
            let slot = &mut self.buckets[index];
            if slot.as_ref().is_some_and(|flow| flow.key() == key) {
                *slot = None;
                1
            } else {
                0
            }
        } else {
            let mut count = 0;
            for slot in self.buckets.iter_mut() {
                if slot
                    .as_ref()
                    .is_some_and(|flow| flow.key().del_matches(key, strict))
                {
                    *slot = None;
                    count += 1;
                }
            }
            count
        };
        self.n_flows -= count;
        count
    }

    pub fn timeout(&mut self, dp: &mut dyn Datapath<F>) -> usize {
        let mut count = 0;
        for slot in self.buckets.iter_mut() {
            let Some(reason) = slot.as_ref().and_then(|flow| flow.expired()) else {
                continue;
            };
            if let Some(flow) = slot.take() {
                dp.send_flow_expired(&flow, reason);
                drop(flow);
                count += 1;
            }
        }
        self.n_flows -= count;
        if count > 0 {
            debug!(expired = count, remaining = self.n_flows, "hash table sweep");
        }
        count
    }

    /// Releases every stored flow and the bucket array.
    pub fn destroy(self) {
        debug!(n_flows = self.n_flows, n_buckets = self.n_buckets(), "destroying hash table");
    }

    /// Opens a cursor over the stored flows in ascending bucket order.
    pub fn cursor(&self) -> HashCursor<'_, F> {
        HashCursor::open(&self.buckets)
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            name: "hash",
            n_flows: self.n_flows,
            max_flows: self.n_buckets(),
        }
    }
}

impl<F: FlowEntry, D: KeyDigest> SwTable<F> for HashTable<F, D> {
    fn lookup(&self, key: &FlowKey) -> Option<&F> {
        HashTable::lookup(self, key)
    }

    fn insert(&mut self, flow: F) -> InsertResult<F> {
        HashTable::insert(self, flow)
    }

    fn delete(&mut self, key: &FlowKey, strict: bool) -> usize {
        HashTable::delete(self, key, strict)
    }

    fn timeout(&mut self, dp: &mut dyn Datapath<F>) -> usize {
        HashTable::timeout(self, dp)
    }

    fn destroy(self: Box<Self>) {
        HashTable::destroy(*self)
    }

    fn cursor(&self) -> Box<dyn FlowCursor<'_, F> + '_> {
        Box::new(HashTable::cursor(self))
    }

    fn stats(&self) -> TableStats {
        HashTable::stats(self)
    }
}

/// Cursor over a [`HashTable`], ascending by bucket index.
#[derive(Debug)]
pub struct HashCursor<'a, F> {
    buckets: &'a [Option<F>],
    bucket_i: usize,
    flow: Option<&'a F>,
}

impl<'a, F> HashCursor<'a, F> {
    fn open(buckets: &'a [Option<F>]) -> Self {
        let mut cursor = Self {
            buckets,
            bucket_i: 0,
            flow: None,
        };
        cursor.flow = cursor.next_occupied();
        cursor
    }

    /// Bucket index of the current flow, or the bucket count once exhausted.
    pub fn position(&self) -> usize {
        self.bucket_i
    }

    fn next_occupied(&mut self) -> Option<&'a F> {
        let buckets = self.buckets;
        while self.bucket_i < buckets.len() {
            if let Some(flow) = &buckets[self.bucket_i] {
                return Some(flow);
            }
            self.bucket_i += 1;
        }
        None
    }
}

impl<'a, F> FlowCursor<'a, F> for HashCursor<'a, F> {
    fn flow(&self) -> Option<&'a F> {
        self.flow
    }

    fn advance(&mut self) {
        if self.flow.is_none() {
            return;
        }
        self.bucket_i += 1;
        self.flow = self.next_occupied();
    }
}

impl<'a, F> Iterator for HashCursor<'a, F> {
    type Item = &'a F;

    fn next(&mut self) -> Option<&'a F> {
        let flow = self.flow?;
        self.advance();
        Some(flow)
    }
}

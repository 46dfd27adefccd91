//! Double hashing: two independently hashed tables give every key two
//! candidate buckets.
//!
//! The composite owns both child tables by value and stores no flows of its
//! own. Lookups check child 0 then child 1; inserts prefer child 0 and fall
//! back to child 1 when child 0's bucket holds a different key.

use ofswitch_types::FlowKey;
use tracing::{debug, trace};

use crate::digest::{Crc32, KeyDigest};
use crate::error::TableResult;
use crate::hash::{HashCursor, HashTable};
use crate::table::{
    Datapath, FlowCursor, FlowEntry, InsertResult, RejectReason, Rejected, SwTable, TableStats,
};

/// Two [`HashTable`]s combined into one table.
///
/// # Example
///
/// ```
/// use ofswitch_table::{DoubleHashTable, SwTable};
/// use ofswitch_types::{Flow, FlowKey};
///
/// let mut table: DoubleHashTable<Flow> =
///     DoubleHashTable::new(0x1EDC6F41, 256, 0x741B8CD7, 256).unwrap();
/// table.insert(Flow::new(FlowKey::exact().with_tp_dst(53))).unwrap();
///
/// let stats = table.stats();
/// assert_eq!(stats.name, "hash2");
/// assert_eq!(stats.max_flows, 512);
/// ```
#[derive(Debug)]
pub struct DoubleHashTable<F, D = Crc32> {
    children: [HashTable<F, D>; 2],
}

impl<F: FlowEntry> DoubleHashTable<F, Crc32> {
    /// Creates both children with CRC-32 digests.
    ///
    /// If the second child cannot be allocated the first one is released
    /// before the error is returned.
    ///
    /// # Panics
    ///
    /// Panics if either bucket count is not a power of two.
    pub fn new(poly0: u32, buckets0: usize, poly1: u32, buckets1: usize) -> TableResult<Self> {
        let first = HashTable::new(poly0, buckets0)?;
        let second = HashTable::new(poly1, buckets1)?;
        Ok(Self::from_tables([first, second]))
    }
}

impl<F: FlowEntry, D: KeyDigest> DoubleHashTable<F, D> {
    /// Combines two existing tables. Flows they already hold stay where
    /// they are.
    pub fn from_tables(children: [HashTable<F, D>; 2]) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &[HashTable<F, D>; 2] {
        &self.children
    }

    pub fn lookup(&self, key: &FlowKey) -> Option<&F> {
        self.children.iter().find_map(|child| child.lookup(key))
    }

    pub fn insert(&mut self, flow: F) -> InsertResult<F> {
        if !flow.key().is_exact() {
            return Err(Rejected::new(RejectReason::Wildcarded, flow));
        }

        let [first, second] = &mut self.children;

        // A key that already lives in child 1 is replaced there, so one key
        // never ends up stored in both children.
        if !first.contains_key(flow.key()) && second.contains_key(flow.key()) {
            return second.insert(flow);
        }

        match first.insert(flow) {
            Err(rejected) if rejected.reason == RejectReason::BucketOccupied => {
                trace!("first table bucket occupied, trying second table");
                second.insert(rejected.into_flow())
            }
            result => result,
        }
    }

    pub fn delete(&mut self, key: &FlowKey, strict: bool) -> usize {
        self.children
            .iter_mut()
            .map(|child| child.delete(key, strict))
            .sum()
    }

    pub fn timeout(&mut self, dp: &mut dyn Datapath<F>) -> usize {
        let mut count = 0;
        for child in self.children.iter_mut() {
            count += child.timeout(&mut *dp);
        }
        count
    }

    /// Destroys both children, then the composite.
    pub fn destroy(self) {
        debug!(n_flows = self.stats().n_flows, "destroying double hash table");
        let [first, second] = self.children;
        first.destroy();
        second.destroy();
    }

    /// Opens a cursor over child 0's flows followed by child 1's.
    pub fn cursor(&self) -> DoubleCursor<'_, F, D> {
        DoubleCursor::open(self)
    }

    pub fn stats(&self) -> TableStats {
        let [first, second] = self.children.each_ref().map(|child| child.stats());
        TableStats {
            name: "hash2",
            n_flows: first.n_flows + second.n_flows,
            max_flows: first.max_flows + second.max_flows,
        }
    }
}

impl<F: FlowEntry, D: KeyDigest> SwTable<F> for DoubleHashTable<F, D> {
    fn lookup(&self, key: &FlowKey) -> Option<&F> {
        DoubleHashTable::lookup(self, key)
    }

    fn insert(&mut self, flow: F) -> InsertResult<F> {
        DoubleHashTable::insert(self, flow)
    }

    fn delete(&mut self, key: &FlowKey, strict: bool) -> usize {
        DoubleHashTable::delete(self, key, strict)
    }

    fn timeout(&mut self, dp: &mut dyn Datapath<F>) -> usize {
        DoubleHashTable::timeout(self, dp)
    }

    fn destroy(self: Box<Self>) {
        DoubleHashTable::destroy(*self)
    }

    fn cursor(&self) -> Box<dyn FlowCursor<'_, F> + '_> {
        Box::new(DoubleHashTable::cursor(self))
    }

    fn stats(&self) -> TableStats {
        DoubleHashTable::stats(self)
    }
}

/// Which child a [`DoubleCursor`] is walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPhase {
    /// Walking child 0.
    Phase0Active,
    /// Child 0 is exhausted; walking child 1.
    Phase1Active,
    /// Both children are exhausted. Terminal.
    Exhausted,
}

// The open child cursor lives inside the phase, so dropping or replacing the
// phase closes exactly the cursor that is open.
#[derive(Debug)]
enum Phase<'a, F> {
    First(HashCursor<'a, F>),
    Second(HashCursor<'a, F>),
    Exhausted,
}

/// Cursor over a [`DoubleHashTable`]: every flow of child 0 in ascending
/// bucket order, then every flow of child 1.
#[derive(Debug)]
pub struct DoubleCursor<'a, F, D = Crc32> {
    second: &'a HashTable<F, D>,
    phase: Phase<'a, F>,
}

impl<'a, F: FlowEntry, D: KeyDigest> DoubleCursor<'a, F, D> {
    fn open(table: &'a DoubleHashTable<F, D>) -> Self {
        let [first, second] = &table.children;
        let mut cursor = Self {
            second,
            phase: Phase::First(first.cursor()),
        };
        cursor.settle();
        cursor
    }

    pub fn phase(&self) -> CursorPhase {
        match self.phase {
            Phase::First(_) => CursorPhase::Phase0Active,
            Phase::Second(_) => CursorPhase::Phase1Active,
            Phase::Exhausted => CursorPhase::Exhausted,
        }
    }

    // Moves past exhausted children until a flow is current or both are done.
    fn settle(&mut self) {
        loop {
            let current_done = match &self.phase {
                Phase::First(child) | Phase::Second(child) => child.flow().is_none(),
                Phase::Exhausted => return,
            };
            if !current_done {
                return;
            }
            self.phase = match self.phase {
                Phase::First(_) => Phase::Second(self.second.cursor()),
                _ => Phase::Exhausted,
            };
        }
    }
}

impl<'a, F: FlowEntry, D: KeyDigest> FlowCursor<'a, F> for DoubleCursor<'a, F, D> {
    fn flow(&self) -> Option<&'a F> {
        match &self.phase {
            Phase::First(child) | Phase::Second(child) => child.flow(),
            Phase::Exhausted => None,
        }
    }

    fn advance(&mut self) {
        match &mut self.phase {
            Phase::First(child) | Phase::Second(child) => child.advance(),
            Phase::Exhausted => return,
        }
        self.settle();
    }
}

impl<'a, F: FlowEntry, D: KeyDigest> Iterator for DoubleCursor<'a, F, D> {
    type Item = &'a F;

    fn next(&mut self) -> Option<&'a F> {
        let flow = self.flow()?;
        self.advance();
        Some(flow)
    }
}

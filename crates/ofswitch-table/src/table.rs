//! The uniform flow table interface and the collaborators it talks to.

use ofswitch_types::{ExpiryReason, Flow, FlowKey};
use serde::Serialize;
use std::fmt;

/// What a table needs to know about the flows it stores.
///
/// Releasing a flow is dropping it. Tables only ever drop a flow they own,
/// and ownership guarantees that happens exactly once.
pub trait FlowEntry {
    /// The flow's match key.
    fn key(&self) -> &FlowKey;

    /// Expiration predicate consulted by timeout sweeps.
    ///
    /// Returns why the flow should be evicted, or `None` to keep it.
    fn expired(&self) -> Option<ExpiryReason>;
}

impl FlowEntry for Flow {
    fn key(&self) -> &FlowKey {
        &self.key
    }

    fn expired(&self) -> Option<ExpiryReason> {
        self.expiry()
    }
}

/// Receiver of flow expiry notifications.
///
/// A timeout sweep calls [`Datapath::send_flow_expired`] while the expired
/// flow is still alive; the table releases the flow only after the call
/// returns, so the datapath observes the flow's final counters.
pub trait Datapath<F> {
    fn send_flow_expired(&mut self, flow: &F, reason: ExpiryReason);
}

/// How an accepted insert was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertOutcome {
    /// The flow went into an empty slot.
    Added,
    /// The flow replaced a stored flow with the same key, which was released.
    Replaced,
}

/// Why an insert was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The flow's key has wildcards; hash tables hold exact matches only.
    Wildcarded,
    /// Every candidate slot holds a flow with a different key.
    BucketOccupied,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Wildcarded => f.write_str("key has wildcards"),
            RejectReason::BucketOccupied => f.write_str("bucket occupied by another key"),
        }
    }
}

/// A refused insert. The table never took ownership; the flow is handed
/// back untouched and the caller decides whether to retry, merge or drop it.
#[derive(Debug)]
pub struct Rejected<F> {
    pub reason: RejectReason,
    pub flow: F,
}

impl<F> Rejected<F> {
    pub fn new(reason: RejectReason, flow: F) -> Self {
        Self { reason, flow }
    }

    /// Takes the flow back.
    pub fn into_flow(self) -> F {
        self.flow
    }
}

/// Result of [`SwTable::insert`].
pub type InsertResult<F> = Result<InsertOutcome, Rejected<F>>;

/// Occupancy snapshot of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Table kind: `"hash"` or `"hash2"`.
    pub name: &'static str,
    /// Flows currently stored.
    pub n_flows: usize,
    /// Maximum number of flows, i.e. the total bucket count.
    pub max_flows: usize,
}

/// Forward-only cursor over the flows of a table.
///
/// A cursor is positioned on its first flow as soon as it is opened.
/// [`flow`](FlowCursor::flow) returns the current flow and
/// [`advance`](FlowCursor::advance) moves to the next one; once the
/// sequence is exhausted `flow` returns `None` forever and `advance` is a
/// no-op. Dropping the cursor closes it and never touches stored flows.
///
/// The cursor borrows its table, so the table cannot be mutated while a
/// cursor is open.
pub trait FlowCursor<'a, F: 'a> {
    fn flow(&self) -> Option<&'a F>;

    fn advance(&mut self);
}

impl<'a, F: 'a> Iterator for dyn FlowCursor<'a, F> + 'a {
    type Item = &'a F;

    fn next(&mut self) -> Option<&'a F> {
        let flow = self.flow()?;
        self.advance();
        Some(flow)
    }
}

/// Interface shared by every flow table kind.
///
/// The switch's table dispatcher holds tables as `Box<dyn SwTable<F>>` and
/// drives them only through these operations. Every table has a single
/// owner; mutation takes `&mut self` and no operation locks internally.
pub trait SwTable<F: FlowEntry> {
    /// Returns the stored flow whose key equals `key`.
    fn lookup(&self, key: &FlowKey) -> Option<&F>;

    /// Offers `flow` to the table.
    ///
    /// On rejection the flow is returned inside [`Rejected`].
    fn insert(&mut self, flow: F) -> InsertResult<F>;

    /// Removes flows matching `key` and returns how many were removed.
    ///
    /// An exact `key` removes at most the one flow stored under it. A
    /// wildcarded `key` scans the whole table with
    /// [`FlowKey::del_matches`].
    fn delete(&mut self, key: &FlowKey, strict: bool) -> usize;

    /// Evicts every expired flow, notifying `dp` before each release.
    ///
    /// Returns the number of flows evicted.
    fn timeout(&mut self, dp: &mut dyn Datapath<F>) -> usize;

    /// Releases every stored flow and the table itself.
    fn destroy(self: Box<Self>);

    /// Opens a cursor positioned on the table's first flow.
    fn cursor(&self) -> Box<dyn FlowCursor<'_, F> + '_>;

    fn stats(&self) -> TableStats;

    /// Number of flows currently stored.
    fn n_flows(&self) -> usize {
        self.stats().n_flows
    }
}

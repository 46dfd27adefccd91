//! Behavioural tests for both table kinds through the uniform interface.
//!
//! Flows here count their own releases, so the tests can check that every
//! removal path drops a flow exactly once and that expiry notifications
//! arrive while the flow is still alive.

use std::cell::Cell;
use std::rc::Rc;

use ofswitch_table::{
    CursorPhase, Datapath, DoubleHashTable, FlowCursor, FlowEntry, HashParams, HashTable,
    InsertOutcome, RejectReason, SwTable, TableConfig,
};
use ofswitch_types::{ExpiryReason, Flow, FlowKey, MacAddress, Wildcards};
use pretty_assertions::assert_eq;

type Digest = fn(&[u8]) -> u32;

/// Shared release counter handed to every flow of a test.
#[derive(Debug, Clone, Default)]
struct Releases(Rc<Cell<usize>>);

impl Releases {
    fn count(&self) -> usize {
        self.0.get()
    }
}

#[derive(Debug)]
struct CountedFlow {
    key: FlowKey,
    tag: u32,
    expire: Option<ExpiryReason>,
    releases: Releases,
}

impl CountedFlow {
    fn new(key: FlowKey, tag: u32, releases: &Releases) -> Self {
        Self {
            key,
            tag,
            expire: None,
            releases: releases.clone(),
        }
    }

    fn expiring(mut self, reason: ExpiryReason) -> Self {
        self.expire = Some(reason);
        self
    }
}

impl FlowEntry for CountedFlow {
    fn key(&self) -> &FlowKey {
        &self.key
    }

    fn expired(&self) -> Option<ExpiryReason> {
        self.expire
    }
}

impl Drop for CountedFlow {
    fn drop(&mut self) {
        self.releases.0.set(self.releases.0.get() + 1);
    }
}

/// Records expiries and the release count observed at notification time.
struct RecordingDatapath {
    releases: Releases,
    expired: Vec<(u32, ExpiryReason, usize)>,
}

impl RecordingDatapath {
    fn new(releases: &Releases) -> Self {
        Self {
            releases: releases.clone(),
            expired: Vec::new(),
        }
    }
}

impl Datapath<CountedFlow> for RecordingDatapath {
    fn send_flow_expired(&mut self, flow: &CountedFlow, reason: ExpiryReason) {
        self.expired.push((flow.tag, reason, self.releases.count()));
    }
}

fn port_key(in_port: u16) -> FlowKey {
    FlowKey::exact().with_in_port(in_port)
}

fn by_in_port(bytes: &[u8]) -> u32 {
    u32::from(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn by_tp_dst(bytes: &[u8]) -> u32 {
    u32::from(u16::from_be_bytes([bytes[30], bytes[31]]))
}

fn single(n_buckets: usize) -> Box<dyn SwTable<CountedFlow>> {
    Box::new(HashTable::with_digest(by_in_port as Digest, n_buckets).unwrap())
}

fn double(n_buckets: usize) -> Box<dyn SwTable<CountedFlow>> {
    Box::new(DoubleHashTable::from_tables([
        HashTable::with_digest(by_in_port as Digest, n_buckets).unwrap(),
        HashTable::with_digest(by_tp_dst as Digest, n_buckets).unwrap(),
    ]))
}

fn both_kinds(n_buckets: usize) -> [Box<dyn SwTable<CountedFlow>>; 2] {
    [single(n_buckets), double(n_buckets)]
}

#[test]
fn test_inserted_flow_is_found_until_removed() {
    for mut table in both_kinds(16) {
        let releases = Releases::default();
        let key = port_key(7).with_dl_src(MacAddress::new([2, 0, 0, 0, 0, 1]));

        table.insert(CountedFlow::new(key, 1, &releases)).unwrap();
        assert_eq!(table.lookup(&key).map(|f| f.tag), Some(1));
        assert_eq!(table.lookup(&key).unwrap().key.to_bytes(), key.to_bytes());

        assert_eq!(table.delete(&key, true), 1);
        assert!(table.lookup(&key).is_none());
        assert_eq!(releases.count(), 1);
    }
}

#[test]
fn test_wildcarded_insert_always_fails() {
    for mut table in both_kinds(16) {
        let releases = Releases::default();
        table.insert(CountedFlow::new(port_key(1), 0, &releases)).unwrap();

        let wild = port_key(2).with_wildcards(Wildcards::DL_VLAN);
        let rejected = table.insert(CountedFlow::new(wild, 1, &releases)).unwrap_err();
        assert_eq!(rejected.reason, RejectReason::Wildcarded);
        assert_eq!(table.n_flows(), 1);

        // The caller got the flow back; nothing was released by the table.
        assert_eq!(releases.count(), 0);
        drop(rejected);
        assert_eq!(releases.count(), 1);
    }
}

#[test]
fn test_distinct_buckets_all_admitted() {
    let releases = Releases::default();
    let mut table = single(32);
    for port in 0..32 {
        table.insert(CountedFlow::new(port_key(port), port.into(), &releases)).unwrap();
    }
    assert_eq!(table.n_flows(), 32);
    for port in 0..32 {
        assert_eq!(table.lookup(&port_key(port)).unwrap().tag, u32::from(port));
    }
}

#[test]
fn test_single_table_collision_rejects_second_key() {
    let releases = Releases::default();
    let mut table = single(8);

    table.insert(CountedFlow::new(port_key(3), 0, &releases)).unwrap();
    let rejected = table
        .insert(CountedFlow::new(port_key(11), 1, &releases))
        .unwrap_err();

    assert_eq!(rejected.reason, RejectReason::BucketOccupied);
    assert_eq!(rejected.flow.tag, 1);
    assert_eq!(table.n_flows(), 1);
    assert!(table.lookup(&port_key(11)).is_none());
    assert_eq!(table.lookup(&port_key(3)).unwrap().tag, 0);
}

#[test]
fn test_double_table_absorbs_first_table_collision() {
    let releases = Releases::default();
    let mut table = double(8);

    let a = port_key(3).with_tp_dst(1);
    let b = port_key(11).with_tp_dst(2);
    assert_eq!(
        table.insert(CountedFlow::new(a, 0, &releases)).unwrap(),
        InsertOutcome::Added
    );
    assert_eq!(
        table.insert(CountedFlow::new(b, 1, &releases)).unwrap(),
        InsertOutcome::Added
    );

    assert_eq!(table.n_flows(), 2);
    assert_eq!(table.lookup(&a).unwrap().tag, 0);
    assert_eq!(table.lookup(&b).unwrap().tag, 1);
}

#[test]
fn test_replace_releases_predecessor_once() {
    for mut table in both_kinds(8) {
        let releases = Releases::default();
        table.insert(CountedFlow::new(port_key(5), 0, &releases)).unwrap();

        let outcome = table.insert(CountedFlow::new(port_key(5), 1, &releases)).unwrap();
        assert_eq!(outcome, InsertOutcome::Replaced);
        assert_eq!(releases.count(), 1);
        assert_eq!(table.n_flows(), 1);
        assert_eq!(table.lookup(&port_key(5)).unwrap().tag, 1);
    }
}

#[test]
fn test_exact_delete_removes_at_most_one() {
    for mut table in both_kinds(8) {
        let releases = Releases::default();
        table.insert(CountedFlow::new(port_key(1), 0, &releases)).unwrap();
        table.insert(CountedFlow::new(port_key(2), 1, &releases)).unwrap();

        assert_eq!(table.delete(&port_key(1), true), 1);
        assert_eq!(table.delete(&port_key(1), true), 0);
        assert_eq!(table.delete(&port_key(9), false), 0);
        assert_eq!(table.n_flows(), 1);
        assert_eq!(releases.count(), 1);
    }
}

#[test]
fn test_wildcard_delete_matches_across_children() {
    let releases = Releases::default();
    let mut table = double(8);
    let src = MacAddress::new([2, 0, 0, 0, 0, 0xaa]);

    // Ports 1 and 9 collide in the first child; 9 goes to the second.
    for (tag, port) in [1u16, 9, 2].into_iter().enumerate() {
        let key = port_key(port).with_dl_src(src).with_tp_dst(port);
        table.insert(CountedFlow::new(key, tag as u32, &releases)).unwrap();
    }
    table.insert(CountedFlow::new(port_key(4), 3, &releases)).unwrap();

    let by_src = FlowKey::exact()
        .with_dl_src(src)
        .with_wildcards(Wildcards::ALL.without(Wildcards::DL_SRC));
    assert_eq!(table.delete(&by_src, false), 3);
    assert_eq!(table.n_flows(), 1);
    assert_eq!(releases.count(), 3);
}

#[test]
fn test_timeout_notifies_before_release() {
    for mut table in both_kinds(16) {
        let releases = Releases::default();
        for port in 0..10u16 {
            let mut flow = CountedFlow::new(port_key(port), port.into(), &releases);
            if port % 2 == 1 {
                flow = flow.expiring(ExpiryReason::IdleTimeout);
            }
            if port == 4 {
                flow = flow.expiring(ExpiryReason::HardTimeout);
            }
            table.insert(flow).unwrap();
        }

        let mut dp = RecordingDatapath::new(&releases);
        assert_eq!(table.timeout(&mut dp), 6);
        assert_eq!(table.n_flows(), 4);
        assert_eq!(releases.count(), 6);

        // The i-th notification saw exactly i earlier releases.
        for (i, (_, _, released_before)) in dp.expired.iter().enumerate() {
            assert_eq!(*released_before, i);
        }
        let mut tags: Vec<u32> = dp.expired.iter().map(|(tag, _, _)| *tag).collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![1, 3, 4, 5, 7, 9]);
        assert!(dp
            .expired
            .iter()
            .any(|&(tag, reason, _)| tag == 4 && reason == ExpiryReason::HardTimeout));
    }
}

#[test]
fn test_cursor_yields_each_flow_once_in_bucket_order() {
    let releases = Releases::default();
    let mut table = single(64);
    let ports = [40u16, 3, 17, 63, 0, 22];
    for port in ports {
        table.insert(CountedFlow::new(port_key(port), port.into(), &releases)).unwrap();
    }

    let seen: Vec<u32> = table.cursor().map(|f| f.tag).collect();
    let mut expected: Vec<u32> = ports.iter().map(|&p| u32::from(p)).collect();
    expected.sort_unstable();
    assert_eq!(seen, expected);

    // Closing part-way through leaves the table alone.
    let mut cursor = table.cursor();
    cursor.advance();
    drop(cursor);
    assert_eq!(releases.count(), 0);
    assert_eq!(table.n_flows(), ports.len());
}

#[test]
fn test_cursor_on_empty_and_full_tables() {
    let releases = Releases::default();
    let mut table = single(4);
    assert!(table.cursor().flow().is_none());

    for port in 0..4 {
        table.insert(CountedFlow::new(port_key(port), port.into(), &releases)).unwrap();
    }
    assert_eq!(table.cursor().count(), 4);

    let mut cursor = table.cursor();
    for _ in 0..10 {
        cursor.advance();
    }
    assert!(cursor.flow().is_none());
}

#[test]
fn test_double_cursor_visits_first_child_then_second() {
    let releases = Releases::default();
    let mut table = double(8);

    // (in_port, tp_dst): ports 6 and 1 occupy the first child; 14 and 9
    // collide there and land in the second child by tp_dst.
    for (tag, (port, tp_dst)) in [(6u16, 0u16), (14, 5), (1, 1), (9, 2)].into_iter().enumerate() {
        let key = port_key(port).with_tp_dst(tp_dst);
        table.insert(CountedFlow::new(key, tag as u32, &releases)).unwrap();
    }

    let order: Vec<u16> = table.cursor().map(|f| f.key.in_port).collect();
    assert_eq!(order, vec![1, 6, 9, 14]);
}

#[test]
fn test_closing_double_cursor_in_second_child_leaves_table_alone() {
    let releases = Releases::default();
    let mut table = DoubleHashTable::from_tables([
        HashTable::with_digest(by_in_port as Digest, 8).unwrap(),
        HashTable::with_digest(by_tp_dst as Digest, 8).unwrap(),
    ]);
    // Port 14 collides with port 6 in the first child and lands in the second.
    table.insert(CountedFlow::new(port_key(6), 0, &releases)).unwrap();
    table
        .insert(CountedFlow::new(port_key(14).with_tp_dst(5), 1, &releases))
        .unwrap();
    table
        .insert(CountedFlow::new(port_key(22).with_tp_dst(6), 2, &releases))
        .unwrap();

    let mut cursor = table.cursor();
    assert_eq!(cursor.phase(), CursorPhase::Phase0Active);
    cursor.advance();
    assert_eq!(cursor.phase(), CursorPhase::Phase1Active);
    assert_eq!(cursor.flow().map(|f| f.tag), Some(1));
    drop(cursor);

    assert_eq!(releases.count(), 0);
    assert_eq!(table.stats().n_flows, 3);
    assert_eq!(table.cursor().count(), 3);
}

#[test]
fn test_destroy_releases_every_flow_once() {
    for mut table in both_kinds(16) {
        let releases = Releases::default();
        for port in 0..12 {
            table.insert(CountedFlow::new(port_key(port), 0, &releases)).unwrap();
        }
        table.destroy();
        assert_eq!(releases.count(), 12);
    }
}

#[test]
fn test_capacity_is_bucket_count_regardless_of_occupancy() {
    let releases = Releases::default();
    let mut table = single(16);
    assert_eq!(table.stats().max_flows, 16);
    for port in 0..16 {
        table.insert(CountedFlow::new(port_key(port), 0, &releases)).unwrap();
    }
    assert_eq!(table.stats().max_flows, 16);
    assert_eq!(table.stats().n_flows, 16);

    let config = TableConfig::Hash2 {
        children: [HashParams::new(1, 32), HashParams::new(2, 64)],
    };
    let table = config.build::<CountedFlow>().unwrap();
    assert_eq!(table.stats().name, "hash2");
    assert_eq!(table.stats().max_flows, 96);
}

#[test]
fn test_real_flows_through_default_config() {
    let mut table = TableConfig::Hash2 {
        children: [HashParams::new(0x1EDC_6F41, 1024), HashParams::new(0x741B_8CD7, 1024)],
    }
    .build::<Flow>()
    .unwrap();

    let mut added = 0;
    for port in 0..256u16 {
        let key = port_key(port).with_dl_type(0x0800).with_tp_dst(443);
        if table.insert(Flow::new(key).with_idle_timeout(60)).is_ok() {
            added += 1;
        }
    }
    assert!(added > 0);
    assert_eq!(table.n_flows(), added);
    assert_eq!(table.cursor().count(), added);

    struct Nothing;
    impl Datapath<Flow> for Nothing {
        fn send_flow_expired(&mut self, _flow: &Flow, _reason: ExpiryReason) {}
    }
    assert_eq!(table.timeout(&mut Nothing), 0);
}

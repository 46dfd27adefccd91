//! Flow match key.

use crate::{MacAddress, Wildcards};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// The match pattern of a flow.
///
/// Equality is field-by-field over the whole key, wildcards included, which
/// is the same relation as comparing the byte patterns produced by
/// [`FlowKey::to_bytes`].
///
/// # Example
///
/// ```
/// use ofswitch_types::{FlowKey, Wildcards};
///
/// let exact = FlowKey::exact().with_in_port(3).with_tp_dst(80);
/// assert!(exact.is_exact());
///
/// let any_port = exact.with_wildcards(Wildcards::IN_PORT);
/// assert!(!any_port.is_exact());
/// assert!(exact.del_matches(&any_port, false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub in_port: u16,
    pub dl_vlan: u16,
    pub dl_src: MacAddress,
    pub dl_dst: MacAddress,
    pub dl_type: u16,
    pub nw_src: Ipv4Addr,
    pub nw_dst: Ipv4Addr,
    pub nw_proto: u8,
    pub tp_src: u16,
    pub tp_dst: u16,
    pub wildcards: Wildcards,
}

impl FlowKey {
    /// Length of the byte pattern returned by [`FlowKey::to_bytes`].
    pub const LEN: usize = 36;

    /// An exact-match key with every field zeroed.
    pub const fn exact() -> Self {
        FlowKey {
            in_port: 0,
            dl_vlan: 0,
            dl_src: MacAddress::ZERO,
            dl_dst: MacAddress::ZERO,
            dl_type: 0,
            nw_src: Ipv4Addr::UNSPECIFIED,
            nw_dst: Ipv4Addr::UNSPECIFIED,
            nw_proto: 0,
            tp_src: 0,
            tp_dst: 0,
            wildcards: Wildcards::EXACT,
        }
    }

    pub fn with_in_port(mut self, in_port: u16) -> Self {
        self.in_port = in_port;
        self
    }

    pub fn with_dl_vlan(mut self, dl_vlan: u16) -> Self {
        self.dl_vlan = dl_vlan;
        self
    }

    pub fn with_dl_src(mut self, dl_src: MacAddress) -> Self {
        self.dl_src = dl_src;
        self
    }

    pub fn with_dl_dst(mut self, dl_dst: MacAddress) -> Self {
        self.dl_dst = dl_dst;
        self
    }

    pub fn with_dl_type(mut self, dl_type: u16) -> Self {
        self.dl_type = dl_type;
        self
    }

    pub fn with_nw_src(mut self, nw_src: Ipv4Addr) -> Self {
        self.nw_src = nw_src;
        self
    }

    pub fn with_nw_dst(mut self, nw_dst: Ipv4Addr) -> Self {
        self.nw_dst = nw_dst;
        self
    }

    pub fn with_nw_proto(mut self, nw_proto: u8) -> Self {
        self.nw_proto = nw_proto;
        self
    }

    pub fn with_tp_src(mut self, tp_src: u16) -> Self {
        self.tp_src = tp_src;
        self
    }

    pub fn with_tp_dst(mut self, tp_dst: u16) -> Self {
        self.tp_dst = tp_dst;
        self
    }

    pub fn with_wildcards(mut self, wildcards: Wildcards) -> Self {
        self.wildcards = wildcards;
        self
    }

    /// Returns true if no field is wildcarded.
    pub fn is_exact(&self) -> bool {
        self.wildcards.is_exact()
    }

    /// Serializes the key into its fixed-width byte pattern.
    ///
    /// Fields are laid out in declaration order, big-endian, with one zero
    /// pad byte after `nw_proto` and the wildcard mask last. Hash tables
    /// digest exactly these bytes.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..2].copy_from_slice(&self.in_port.to_be_bytes());
        buf[2..4].copy_from_slice(&self.dl_vlan.to_be_bytes());
        buf[4..10].copy_from_slice(self.dl_src.as_bytes());
        buf[10..16].copy_from_slice(self.dl_dst.as_bytes());
        buf[16..18].copy_from_slice(&self.dl_type.to_be_bytes());
        buf[18..22].copy_from_slice(&self.nw_src.octets());
        buf[22..26].copy_from_slice(&self.nw_dst.octets());
        buf[26] = self.nw_proto;
        buf[28..30].copy_from_slice(&self.tp_src.to_be_bytes());
        buf[30..32].copy_from_slice(&self.tp_dst.to_be_bytes());
        buf[32..36].copy_from_slice(&self.wildcards.bits().to_be_bytes());
        buf
    }

    /// Returns true if the two keys agree on every field that neither of
    /// them wildcards.
    pub fn matches(&self, other: &FlowKey) -> bool {
        self.fields_match(other, self.wildcards | other.wildcards)
    }

    /// Deletion predicate: does this stored key fall under `query`?
    ///
    /// Only `query`'s wildcards are honoured; the stored key's own wildcards
    /// are ignored unless `strict` is set, in which case both masks must be
    /// identical as well.
    pub fn del_matches(&self, query: &FlowKey, strict: bool) -> bool {
        if strict && self.wildcards != query.wildcards {
            return false;
        }
        self.fields_match(query, query.wildcards)
    }

    fn fields_match(&self, other: &FlowKey, w: Wildcards) -> bool {
        (w.contains(Wildcards::IN_PORT) || self.in_port == other.in_port)
            && (w.contains(Wildcards::DL_VLAN) || self.dl_vlan == other.dl_vlan)
            && (w.contains(Wildcards::DL_SRC) || self.dl_src == other.dl_src)
            && (w.contains(Wildcards::DL_DST) || self.dl_dst == other.dl_dst)
            && (w.contains(Wildcards::DL_TYPE) || self.dl_type == other.dl_type)
            && (w.contains(Wildcards::NW_SRC) || self.nw_src == other.nw_src)
            && (w.contains(Wildcards::NW_DST) || self.nw_dst == other.nw_dst)
            && (w.contains(Wildcards::NW_PROTO) || self.nw_proto == other.nw_proto)
            && (w.contains(Wildcards::TP_SRC) || self.tp_src == other.tp_src)
            && (w.contains(Wildcards::TP_DST) || self.tp_dst == other.tp_dst)
    }
}

impl Default for FlowKey {
    fn default() -> Self {
        FlowKey::exact()
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in_port={},dl_vlan={:#06x},dl_src={},dl_dst={},dl_type={:#06x},\
             nw_src={},nw_dst={},nw_proto={},tp_src={},tp_dst={},wildcards={}",
            self.in_port,
            self.dl_vlan,
            self.dl_src,
            self.dl_dst,
            self.dl_type,
            self.nw_src,
            self.nw_dst,
            self.nw_proto,
            self.tp_src,
            self.tp_dst,
            self.wildcards
        )
    }
}

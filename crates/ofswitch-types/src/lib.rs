//! Flow match types for the software OpenFlow switch.
//!
//! This crate provides the value types that flow tables store and match on:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Wildcards`]: bitmask of match fields a key leaves unspecified
//! - [`FlowKey`]: the fixed-width match pattern of a flow
//! - [`Flow`]: a stored forwarding rule with its idle/hard timers and counters
//! - [`ExpiryReason`]: why a flow left its table

mod flow;
mod key;
mod mac;
mod wildcards;

pub use flow::{ExpiryReason, Flow, FLOW_PERMANENT};
pub use key::FlowKey;
pub use mac::MacAddress;
pub use wildcards::Wildcards;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid wildcard mask: {0:#x} (unknown bits set)")]
    InvalidWildcards(u32),
}

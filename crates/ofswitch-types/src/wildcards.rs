//! Wildcard bitmask of a flow key.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Set of match fields a [`FlowKey`](crate::FlowKey) leaves unspecified.
///
/// A key with no bits set is an exact-match key; only exact-match keys may
/// be stored in hash tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Wildcards(u32);

impl Wildcards {
    /// Every field is matched exactly.
    pub const EXACT: Wildcards = Wildcards(0);
    /// Switch input port.
    pub const IN_PORT: Wildcards = Wildcards(1 << 0);
    /// VLAN id.
    pub const DL_VLAN: Wildcards = Wildcards(1 << 1);
    /// Ethernet source address.
    pub const DL_SRC: Wildcards = Wildcards(1 << 2);
    /// Ethernet destination address.
    pub const DL_DST: Wildcards = Wildcards(1 << 3);
    /// Ethernet frame type.
    pub const DL_TYPE: Wildcards = Wildcards(1 << 4);
    /// IPv4 source address.
    pub const NW_SRC: Wildcards = Wildcards(1 << 5);
    /// IPv4 destination address.
    pub const NW_DST: Wildcards = Wildcards(1 << 6);
    /// IP protocol.
    pub const NW_PROTO: Wildcards = Wildcards(1 << 7);
    /// TCP/UDP source port.
    pub const TP_SRC: Wildcards = Wildcards(1 << 8);
    /// TCP/UDP destination port.
    pub const TP_DST: Wildcards = Wildcards(1 << 9);
    /// All fields wildcarded.
    pub const ALL: Wildcards = Wildcards((1 << 10) - 1);

    /// Creates a mask from raw bits, rejecting bits outside [`Wildcards::ALL`].
    pub const fn from_bits(bits: u32) -> Result<Self, ParseError> {
        if bits & !Self::ALL.0 != 0 {
            Err(ParseError::InvalidWildcards(bits))
        } else {
            Ok(Wildcards(bits))
        }
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no field is wildcarded.
    pub const fn is_exact(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every field in `other` is also wildcarded here.
    pub const fn contains(self, other: Wildcards) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns this mask with the fields in `other` cleared.
    pub const fn without(self, other: Wildcards) -> Wildcards {
        Wildcards(self.0 & !other.0)
    }
}

impl BitOr for Wildcards {
    type Output = Wildcards;

    fn bitor(self, rhs: Wildcards) -> Wildcards {
        Wildcards(self.0 | rhs.0)
    }
}

impl TryFrom<u32> for Wildcards {
    type Error = ParseError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Wildcards::from_bits(bits)
    }
}

impl From<Wildcards> for u32 {
    fn from(w: Wildcards) -> u32 {
        w.0
    }
}

impl fmt::Display for Wildcards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_contains() {
        assert!(Wildcards::EXACT.is_exact());
        assert!(!Wildcards::IN_PORT.is_exact());

        let w = Wildcards::IN_PORT | Wildcards::TP_DST;
        assert!(w.contains(Wildcards::IN_PORT));
        assert!(w.contains(Wildcards::TP_DST));
        assert!(!w.contains(Wildcards::DL_SRC));
        assert!(Wildcards::ALL.contains(w));
        assert!(!Wildcards::ALL.without(Wildcards::IN_PORT).contains(Wildcards::IN_PORT));
    }

    #[test]
    fn test_from_bits_rejects_unknown() {
        assert_eq!(Wildcards::from_bits(0x3ff), Ok(Wildcards::ALL));
        assert_eq!(
            Wildcards::from_bits(0x400),
            Err(ParseError::InvalidWildcards(0x400))
        );
    }
}

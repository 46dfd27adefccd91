//! Key digests used to pick a hash bucket.

/// Default polynomial of the first (or only) hash table.
pub const DEFAULT_POLYNOMIAL_0: u32 = 0x1EDC_6F41;

/// Default polynomial of the second table of a double hash table.
pub const DEFAULT_POLYNOMIAL_1: u32 = 0x741B_8CD7;

/// Maps the byte pattern of a flow key to a 32-bit digest.
///
/// Implementations must be deterministic and pure: the same bytes always
/// produce the same digest.
pub trait KeyDigest {
    fn digest(&self, bytes: &[u8]) -> u32;
}

/// Plain function pointers can be used as digests, which is how tests force
/// specific bucket collisions.
impl KeyDigest for fn(&[u8]) -> u32 {
    fn digest(&self, bytes: &[u8]) -> u32 {
        self(bytes)
    }
}

const CRC32_TABLE_BITS: usize = 8;
const CRC32_TABLE_SIZE: usize = 1 << CRC32_TABLE_BITS;

/// Table-driven, MSB-first CRC-32 with a configurable polynomial.
///
/// The register starts at zero and no final XOR is applied, so the empty
/// input digests to zero.
///
/// # Example
///
/// ```
/// use ofswitch_table::{Crc32, KeyDigest};
///
/// let crc = Crc32::new(0x04C1_1DB7);
/// assert_eq!(crc.calculate(&[]), 0);
/// assert_eq!(crc.calculate(b"flow"), crc.digest(b"flow"));
/// ```
#[derive(Clone)]
pub struct Crc32 {
    polynomial: u32,
    table: [u32; CRC32_TABLE_SIZE],
}

impl Crc32 {
    /// Builds the lookup table for `polynomial`.
    pub fn new(polynomial: u32) -> Self {
        let mut table = [0u32; CRC32_TABLE_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut reg = (i as u32) << 24;
            for _ in 0..CRC32_TABLE_BITS {
                let top_bit = reg & 0x8000_0000 != 0;
                reg <<= 1;
                if top_bit {
                    reg ^= polynomial;
                }
            }
            *entry = reg;
        }
        Self { polynomial, table }
    }

    pub fn polynomial(&self) -> u32 {
        self.polynomial
    }

    pub fn calculate(&self, bytes: &[u8]) -> u32 {
        bytes.iter().fold(0u32, |result, &byte| {
            let top = (result >> 24) ^ u32::from(byte);
            (result << 8) ^ self.table[top as usize]
        })
    }
}

impl KeyDigest for Crc32 {
    fn digest(&self, bytes: &[u8]) -> u32 {
        self.calculate(bytes)
    }
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32")
            .field("polynomial", &format_args!("{:#010x}", self.polynomial))
            .finish()
    }
}

//! # Word Order for 32-bit Register Pairs
//!
//! Float, double-word and double-int items span two 16-bit registers. Devices
//! disagree on which register carries the high word, so each schema item can
//! ask for the pair to be swapped.
//!
//! For the 32-bit value `0x12345678`:
//! - `BigEndian (ABCD)`: registers \[0x1234, 0x5678\]
//! - `BigEndianSwap (CDAB)`: registers \[0x5678, 0x1234\]
//!
//! Only the word order changes; bytes inside each register stay big-endian.

use std::fmt;

/// Order of the two 16-bit words that make up a 32-bit field.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_mux::WordOrder;
///
/// let order = WordOrder::from_str("CDAB").unwrap();
/// assert_eq!(order, WordOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WordOrder {
    /// ABCD: high word first (network order)
    #[default]
    BigEndian,

    /// CDAB: low word first, bytes within each word still big-endian
    BigEndianSwap,
}

impl WordOrder {
    /// Pick the order from a schema item's `swap_words` flag.
    #[inline]
    pub fn from_swap(swap_words: bool) -> Self {
        if swap_words {
            Self::BigEndianSwap
        } else {
            Self::BigEndian
        }
    }

    /// Parse "ABCD"/"BE" or "CDAB" (hyphens and underscores ignored).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" => Some(Self::BigEndian),
            "CDAB" | "BIGENDIANSWAP" | "SWAP" => Some(Self::BigEndianSwap),
            _ => None,
        }
    }

    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::BigEndianSwap => "CDAB (Big-Endian Swap)",
        }
    }

    /// Check if words are swapped.
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap)
    }
}

impl fmt::Display for WordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Turn 4 wire bytes into the big-endian bytes of the value they encode.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_mux::{wire_to_value_bytes, WordOrder};
///
/// let wire = [0x56, 0x78, 0x12, 0x34];
/// assert_eq!(wire_to_value_bytes(&wire, WordOrder::BigEndianSwap), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[inline]
pub fn wire_to_value_bytes(wire: &[u8; 4], order: WordOrder) -> [u8; 4] {
    match order {
        WordOrder::BigEndian => *wire,
        WordOrder::BigEndianSwap => [wire[2], wire[3], wire[0], wire[1]],
    }
}

/// Turn the big-endian bytes of a value into the 4 bytes put on the wire.
///
/// Swapping words is its own inverse, so this mirrors [`wire_to_value_bytes`].
#[inline]
pub fn value_to_wire_bytes(value: &[u8; 4], order: WordOrder) -> [u8; 4] {
    wire_to_value_bytes(value, order)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_valid() {
        assert_eq!(WordOrder::from_str("ABCD"), Some(WordOrder::BigEndian));
        assert_eq!(WordOrder::from_str("ab-cd"), Some(WordOrder::BigEndian));
        assert_eq!(WordOrder::from_str("CDAB"), Some(WordOrder::BigEndianSwap));
        assert_eq!(
            WordOrder::from_str("big_endian_swap"),
            Some(WordOrder::BigEndianSwap)
        );
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!(WordOrder::from_str("DCBA"), None);
        assert_eq!(WordOrder::from_str(""), None);
    }

    #[test]
    fn test_from_swap() {
        assert_eq!(WordOrder::from_swap(false), WordOrder::BigEndian);
        assert_eq!(WordOrder::from_swap(true), WordOrder::BigEndianSwap);
        assert!(!WordOrder::default().has_word_swap());
    }

    #[test]
    fn test_swap_moves_words_not_bytes() {
        let value = 0x12345678u32.to_be_bytes();
        assert_eq!(
            value_to_wire_bytes(&value, WordOrder::BigEndian),
            [0x12, 0x34, 0x56, 0x78]
        );
        assert_eq!(
            value_to_wire_bytes(&value, WordOrder::BigEndianSwap),
            [0x56, 0x78, 0x12, 0x34]
        );
    }

    #[test]
    fn test_f32_roundtrip() {
        let value = 123.456f32;
        for order in [WordOrder::BigEndian, WordOrder::BigEndianSwap] {
            let wire = value_to_wire_bytes(&value.to_be_bytes(), order);
            let decoded = f32::from_be_bytes(wire_to_value_bytes(&wire, order));
            assert_eq!(decoded, value, "Roundtrip failed for {:?}", order);
        }
    }
}

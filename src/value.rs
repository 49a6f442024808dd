//! # Register Values
//!
//! Typed values produced by decoding a read response and consumed when
//! encoding a write request. One variant per non-padding schema item type.

use std::fmt;

use crate::schema::ItemType;

/// A single decoded (or to-be-encoded) schema slot.
///
/// # Register Mapping
///
/// | Variant | Registers | Wire encoding |
/// |---------|-----------|---------------|
/// | Word | 1 | unsigned 16-bit |
/// | Int | 1 | signed 16-bit |
/// | Binary | 1 | 16 flags, index 0 = least significant bit |
/// | Float | 2 | IEEE-754 single |
/// | DoubleWord | 2 | unsigned 32-bit |
/// | DoubleInt | 2 | signed 32-bit |
///
/// # Example
///
/// ```rust
/// use voltage_modbus_mux::RegisterValue;
///
/// let temp = RegisterValue::Float(25.5);
/// assert_eq!(temp.register_count(), 2);
/// assert!((temp.as_f64() - 25.5).abs() < 0.001);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    /// Unsigned 16-bit integer
    Word(u16),
    /// Signed 16-bit integer
    Int(i16),
    /// One register unpacked into 16 flags
    Binary([bool; 16]),
    /// 32-bit floating point
    Float(f32),
    /// Unsigned 32-bit integer
    DoubleWord(u32),
    /// Signed 32-bit integer
    DoubleInt(i32),
}

impl RegisterValue {
    /// Convert the value to f64 for uniform numeric handling.
    ///
    /// Binary values convert to the raw register they were packed from.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            RegisterValue::Word(v) => f64::from(*v),
            RegisterValue::Int(v) => f64::from(*v),
            RegisterValue::Binary(bits) => f64::from(pack_bits(bits)),
            RegisterValue::Float(v) => f64::from(*v),
            RegisterValue::DoubleWord(v) => f64::from(*v),
            RegisterValue::DoubleInt(v) => f64::from(*v),
        }
    }

    /// Number of 16-bit registers this value occupies.
    #[inline]
    pub fn register_count(&self) -> usize {
        self.item_type().register_width()
    }

    /// The schema item type that produces this variant.
    pub fn item_type(&self) -> ItemType {
        match self {
            RegisterValue::Word(_) => ItemType::Word,
            RegisterValue::Int(_) => ItemType::Int,
            RegisterValue::Binary(_) => ItemType::Binary,
            RegisterValue::Float(_) => ItemType::Float,
            RegisterValue::DoubleWord(_) => ItemType::DoubleWord,
            RegisterValue::DoubleInt(_) => ItemType::DoubleInt,
        }
    }

    /// Returns the type name as a string for logging/debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            RegisterValue::Word(_) => "word",
            RegisterValue::Int(_) => "int",
            RegisterValue::Binary(_) => "binary",
            RegisterValue::Float(_) => "float",
            RegisterValue::DoubleWord(_) => "double word",
            RegisterValue::DoubleInt(_) => "double int",
        }
    }
}

/// Pack 16 flags into a register, index 0 = least significant bit.
#[inline]
pub fn pack_bits(bits: &[bool; 16]) -> u16 {
    bits.iter()
        .enumerate()
        .fold(0u16, |acc, (i, &bit)| if bit { acc | (1 << i) } else { acc })
}

/// Unpack a register into 16 flags, index 0 = least significant bit.
#[inline]
pub fn unpack_bits(register: u16) -> [bool; 16] {
    let mut bits = [false; 16];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (register >> i) & 1 == 1;
    }
    bits
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Word(v) => write!(f, "{}", v),
            RegisterValue::Int(v) => write!(f, "{}", v),
            RegisterValue::Binary(bits) => write!(f, "{:#018b}", pack_bits(bits)),
            RegisterValue::Float(v) => write!(f, "{}", v),
            RegisterValue::DoubleWord(v) => write!(f, "{}", v),
            RegisterValue::DoubleInt(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<u16> for RegisterValue {
    fn from(v: u16) -> Self {
        RegisterValue::Word(v)
    }
}

impl From<i16> for RegisterValue {
    fn from(v: i16) -> Self {
        RegisterValue::Int(v)
    }
}

impl From<[bool; 16]> for RegisterValue {
    fn from(v: [bool; 16]) -> Self {
        RegisterValue::Binary(v)
    }
}

impl From<f32> for RegisterValue {
    fn from(v: f32) -> Self {
        RegisterValue::Float(v)
    }
}

impl From<u32> for RegisterValue {
    fn from(v: u32) -> Self {
        RegisterValue::DoubleWord(v)
    }
}

impl From<i32> for RegisterValue {
    fn from(v: i32) -> Self {
        RegisterValue::DoubleInt(v)
    }
}

// ============================================================================
// Tests
// ============================================================================

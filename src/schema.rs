//! # Register Schemas
//!
//! A schema is an ordered list of [`SchemaItem`]s projected over a contiguous
//! run of holding registers. Each item repeats its type `count` times.
//!
//! | Code | Type | Registers per slot |
//! |------|------|--------------------|
//! | E | Empty (padding) | 1 |
//! | W | Word | 1 |
//! | I | Int | 1 |
//! | B | Binary | 1 |
//! | F | Float | 2 |
//! | DW | DoubleWord | 2 |
//! | DI | DoubleInt | 2 |

use std::fmt;
use std::str::FromStr;

use crate::error::{ModbusError, ModbusResult};
use crate::word_order::WordOrder;

/// Register layout of one schema slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// Skipped registers; produce and consume no values
    Empty,
    /// Unsigned 16-bit
    Word,
    /// Signed 16-bit
    Int,
    /// 16 packed flags
    Binary,
    /// IEEE-754 single, two registers
    Float,
    /// Unsigned 32-bit, two registers
    DoubleWord,
    /// Signed 32-bit, two registers
    DoubleInt,
}

impl ItemType {
    /// Registers occupied by one slot of this type.
    #[inline]
    pub fn register_width(&self) -> usize {
        match self {
            Self::Empty | Self::Word | Self::Int | Self::Binary => 1,
            Self::Float | Self::DoubleWord | Self::DoubleInt => 2,
        }
    }

    /// Whether `swap_words` has any effect on this type.
    #[inline]
    pub fn is_32bit(&self) -> bool {
        self.register_width() == 2
    }

    /// Short code used in legacy schema definitions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "E",
            Self::Word => "W",
            Self::Int => "I",
            Self::Binary => "B",
            Self::Float => "F",
            Self::DoubleWord => "DW",
            Self::DoubleInt => "DI",
        }
    }
}

impl FromStr for ItemType {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" => Ok(Self::Empty),
            "W" => Ok(Self::Word),
            "I" => Ok(Self::Int),
            "B" => Ok(Self::Binary),
            "F" => Ok(Self::Float),
            "DW" => Ok(Self::DoubleWord),
            "DI" => Ok(Self::DoubleInt),
            _ => Err(ModbusError::invalid_data(format!(
                "Unknown schema item type: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One entry of a register schema.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_mux::{ItemType, SchemaItem};
///
/// let schema = [
///     SchemaItem::word(2),
///     SchemaItem::empty(1),
///     SchemaItem::float(1).swapped(),
/// ];
/// assert_eq!(voltage_modbus_mux::schema::register_count(&schema), 5);
/// assert_eq!(schema[2].item_type, ItemType::Float);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaItem {
    /// Layout of each slot
    pub item_type: ItemType,
    /// Number of consecutive slots (at least 1)
    pub count: u16,
    /// Swap the two words of 32-bit slots
    pub swap_words: bool,
}

impl SchemaItem {
    /// Create an item without word swapping.
    pub fn new(item_type: ItemType, count: u16) -> Self {
        Self {
            item_type,
            count,
            swap_words: false,
        }
    }

    pub fn empty(count: u16) -> Self {
        Self::new(ItemType::Empty, count)
    }

    pub fn word(count: u16) -> Self {
        Self::new(ItemType::Word, count)
    }

    pub fn int(count: u16) -> Self {
        Self::new(ItemType::Int, count)
    }

    pub fn binary(count: u16) -> Self {
        Self::new(ItemType::Binary, count)
    }

    pub fn float(count: u16) -> Self {
        Self::new(ItemType::Float, count)
    }

    pub fn double_word(count: u16) -> Self {
        Self::new(ItemType::DoubleWord, count)
    }

    pub fn double_int(count: u16) -> Self {
        Self::new(ItemType::DoubleInt, count)
    }

    /// Mark the item as word-swapped (CDAB).
    pub fn swapped(mut self) -> Self {
        self.swap_words = true;
        self
    }

    /// Word order applied to 32-bit slots of this item.
    #[inline]
    pub fn word_order(&self) -> WordOrder {
        WordOrder::from_swap(self.swap_words && self.item_type.is_32bit())
    }

    /// Registers covered by the whole item.
    #[inline]
    pub fn register_count(&self) -> usize {
        self.item_type.register_width() * usize::from(self.count)
    }

    /// Values the item produces on read and consumes on write.
    #[inline]
    pub fn value_count(&self) -> usize {
        match self.item_type {
            ItemType::Empty => 0,
            _ => usize::from(self.count),
        }
    }
}

/// Total registers covered by a schema.
pub fn register_count(schema: &[SchemaItem]) -> usize {
    schema.iter().map(SchemaItem::register_count).sum()
}

/// Total values a schema produces (or consumes).
pub fn value_count(schema: &[SchemaItem]) -> usize {
    schema.iter().map(SchemaItem::value_count).sum()
}

/// Check a schema and return its register count.
///
/// Rejects empty schemas, zero counts and register totals above `max_registers`.
pub fn validate(schema: &[SchemaItem], max_registers: usize) -> ModbusResult<u16> {
    if schema.is_empty() {
        return Err(ModbusError::invalid_data("Schema is empty"));
    }

    if let Some(pos) = schema.iter().position(|item| item.count == 0) {
        return Err(ModbusError::invalid_data(format!(
            "Schema item {} has zero count",
            pos
        )));
    }

    let registers = register_count(schema);
    if registers > max_registers {
        return Err(ModbusError::invalid_data(format!(
            "Schema covers {} registers (max {})",
            registers, max_registers
        )));
    }

    Ok(registers as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_codes() {
        for item_type in [
            ItemType::Empty,
            ItemType::Word,
            ItemType::Int,
            ItemType::Binary,
            ItemType::Float,
            ItemType::DoubleWord,
            ItemType::DoubleInt,
        ] {
            assert_eq!(item_type.code().parse::<ItemType>().unwrap(), item_type);
        }
        assert_eq!("dw".parse::<ItemType>().unwrap(), ItemType::DoubleWord);
        assert!("Q".parse::<ItemType>().is_err());
    }

    #[test]
    fn test_register_count() {
        let schema = [
            SchemaItem::empty(2),
            SchemaItem::word(1),
            SchemaItem::int(1),
            SchemaItem::binary(1),
            SchemaItem::float(2),
            SchemaItem::double_word(1),
            SchemaItem::double_int(1),
        ];
        assert_eq!(register_count(&schema), 2 + 1 + 1 + 1 + 4 + 2 + 2);
        assert_eq!(value_count(&schema), 7);
    }

    #[test]
    fn test_word_order_ignored_for_16bit() {
        assert_eq!(
            SchemaItem::word(1).swapped().word_order(),
            WordOrder::BigEndian
        );
        assert_eq!(
            SchemaItem::double_int(1).swapped().word_order(),
            WordOrder::BigEndianSwap
        );
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(&[SchemaItem::word(2)], 125).unwrap(), 2);
        assert!(validate(&[], 125).is_err());
        assert!(validate(&[SchemaItem::word(0)], 125).is_err());
        assert!(validate(&[SchemaItem::float(63)], 125).is_err());
        assert_eq!(
            validate(&[SchemaItem::float(62), SchemaItem::word(1)], 125).unwrap(),
            125
        );
    }
}

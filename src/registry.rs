//! Transaction id allocation and in-flight correlation.

use std::collections::HashMap;

/// Pending requests keyed by transaction id.
///
/// Ids are 16-bit, advance before each allocation and wrap. Zero and ids
/// still held by an outstanding request are skipped.
#[derive(Debug)]
pub struct TransactionRegistry<T> {
    last_id: u16,
    pending: HashMap<u16, T>,
}

impl<T> Default for TransactionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TransactionRegistry<T> {
    pub fn new() -> Self {
        Self {
            last_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Next free transaction id, or `None` when all 65535 ids are in use.
    pub fn allocate(&mut self) -> Option<u16> {
        for _ in 0..=u16::MAX {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id != 0 && !self.pending.contains_key(&self.last_id) {
                return Some(self.last_id);
            }
        }
        None
    }

    pub fn insert(&mut self, transaction_id: u16, entry: T) {
        self.pending.insert(transaction_id, entry);
    }

    pub fn remove(&mut self, transaction_id: u16) -> Option<T> {
        self.pending.remove(&transaction_id)
    }

    /// Take every pending entry, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<(u16, T)> {
        self.pending.drain().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increment_before_use() {
        let mut registry: TransactionRegistry<()> = TransactionRegistry::new();
        assert_eq!(registry.allocate(), Some(2));
        assert_eq!(registry.allocate(), Some(3));
    }

    #[test]
    fn test_wrap_skips_zero() {
        let mut registry: TransactionRegistry<()> = TransactionRegistry::new();
        registry.last_id = u16::MAX - 1;
        assert_eq!(registry.allocate(), Some(u16::MAX));
        assert_eq!(registry.allocate(), Some(1));
    }

    #[test]
    fn test_skips_outstanding_ids() {
        let mut registry = TransactionRegistry::new();
        registry.insert(3, "first");
        registry.insert(4, "second");
        assert_eq!(registry.allocate(), Some(2));
        assert_eq!(registry.allocate(), Some(5));

        assert_eq!(registry.remove(3), Some("first"));
        assert_eq!(registry.remove(3), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_exhausted() {
        let mut registry = TransactionRegistry::new();
        for id in 1..=u16::MAX {
            registry.insert(id, ());
        }
        assert_eq!(registry.allocate(), None);

        registry.remove(42);
        assert_eq!(registry.allocate(), Some(42));
    }

    #[test]
    fn test_drain_empties() {
        let mut registry = TransactionRegistry::new();
        registry.insert(10, 'a');
        registry.insert(11, 'b');
        let mut drained = registry.drain();
        drained.sort();
        assert_eq!(drained, vec![(10, 'a'), (11, 'b')]);
        assert!(registry.is_empty());
    }
}

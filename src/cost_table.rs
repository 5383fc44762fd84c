//! Per-layer mapping of opaque user type numbers to dense indices (§4.1).
//!
//! Grounded on `original_source/.../navigation/costs/dedaiCostTable.cpp`:
//! an ordered `Vec<i32>` of user type numbers where an index, once handed
//! out, never moves. Space/grid/mesh builders translate authored type
//! numbers through [`CostTable::index_of_or_insert`]; navigators rebuild
//! their cost lookup whenever [`CostTable::changed`] flips, then call
//! [`CostTable::reset_changed`].

#[derive(Default, Debug)]
pub struct CostTable {
    types: Vec<i32>,
    changed: bool,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.types.len()
    }

    pub fn type_at(&self, index: usize) -> i32 {
        self.types[index]
    }

    /// Returns the dense index for `type_number`, or `default` if it has
    /// never been registered. Never inserts.
    pub fn index_of(&self, type_number: i32, default: usize) -> usize {
        self.types
            .iter()
            .position(|&t| t == type_number)
            .unwrap_or(default)
    }

    /// Returns the dense index for `type_number`, registering it (and
    /// setting [`Self::changed`]) if this is the first time it is seen.
    /// Existing indices are never shifted by this call.
    pub fn index_of_or_insert(&mut self, type_number: i32) -> usize {
        if let Some(index) = self.types.iter().position(|&t| t == type_number) {
            return index;
        }
        self.types.push(type_number);
        self.changed = true;
        self.types.len() - 1
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn reset_changed(&mut self) {
        self.changed = false;
    }

    pub fn clear(&mut self) {
        self.types.clear();
        self.changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_never_shift() {
        let mut table = CostTable::new();
        assert_eq!(table.index_of_or_insert(5), 0);
        assert_eq!(table.index_of_or_insert(2), 1);
        assert_eq!(table.index_of_or_insert(5), 0);
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn changed_flag_only_on_insert() {
        let mut table = CostTable::new();
        assert!(!table.changed());
        table.index_of_or_insert(1);
        assert!(table.changed());
        table.reset_changed();
        assert!(!table.changed());
        table.index_of_or_insert(1);
        assert!(!table.changed());
    }

    #[test]
    fn index_of_missing_returns_default() {
        let mut table = CostTable::new();
        table.index_of_or_insert(7);
        assert_eq!(table.index_of(7, 99), 0);
        assert_eq!(table.index_of(8, 99), 99);
    }
}

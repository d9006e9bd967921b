//! Row storage shared by every tab controller.
//!
//! A controller is written once against [`RowStore`]; the processes tab plugs
//! in a [`crate::tree::ProcessTree`], the profile and log tabs a flat
//! [`RowList`].

use std::collections::BTreeSet;

/// Storage for the rows of one tab.
///
/// Rows are rebuilt wholesale: `clear`, a run of `insert`s, then
/// `reselect_rows`. There is no partial update.
pub trait RowStore {
    type Record;

    /// Drop every row. The selection is kept until `reselect_rows`.
    fn clear(&mut self);

    fn insert(&mut self, record: Self::Record);

    /// Set each row's visibility from `predicate` and return how many rows
    /// it accepted.
    fn filter<P>(&mut self, predicate: P) -> usize
    where
        P: FnMut(&Self::Record) -> bool;

    /// Forget selected rows that did not survive the last rebuild.
    fn reselect_rows(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct ListEntry<T> {
    record: T,
    visible: bool,
}

/// Flat list of rows, selected by value.
#[derive(Debug, Clone)]
pub struct RowList<T> {
    entries: Vec<ListEntry<T>>,
    selected: BTreeSet<T>,
}

impl<T: Clone + Ord> RowList<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            selected: BTreeSet::new(),
        }
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(|entry| entry.visible)
            .map(|entry| &entry.record)
    }

    pub fn toggle_selection(&mut self, record: &T) {
        if !self.selected.remove(record) {
            self.selected.insert(record.clone());
        }
    }

    pub fn is_selected(&self, record: &T) -> bool {
        self.selected.contains(record)
    }
}

impl<T: Clone + Ord> Default for RowList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Ord> RowStore for RowList<T> {
    type Record = T;

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, record: T) {
        self.entries.push(ListEntry {
            record,
            visible: true,
        });
    }

    fn filter<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        let mut count = 0;
        for entry in &mut self.entries {
            entry.visible = predicate(&entry.record);
            if entry.visible {
                count += 1;
            }
        }
        count
    }

    fn reselect_rows(&mut self) {
        let present: BTreeSet<&T> = self.entries.iter().map(|entry| &entry.record).collect();
        let before = self.selected.len();
        self.selected.retain(|record| present.contains(record));
        let dropped = before - self.selected.len();
        if dropped > 0 {
            log::debug!("dropped {dropped} stale row(s) from the selection");
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(lines: &[&str]) -> RowList<String> {
        let mut rows = RowList::new();
        for line in lines {
            rows.insert(line.to_string());
        }
        rows
    }

    #[test]
    fn test_filter_counts_and_hides() {
        let mut rows = list(&["alpha", "beta", "gamma"]);
        let count = rows.filter(|line| line.contains('a') && line != "beta");
        assert_eq!(count, 2);
        let visible: Vec<&String> = rows.visible_rows().collect();
        assert_eq!(visible, vec!["alpha", "gamma"]);
        assert_eq!(rows.filter(|_| true), rows.len());
    }

    #[test]
    fn test_selection_survives_rebuild_when_present() {
        let mut rows = list(&["alpha", "beta"]);
        rows.toggle_selection(&"alpha".to_string());
        rows.toggle_selection(&"beta".to_string());

        rows.clear();
        assert!(rows.is_empty());
        rows.insert("alpha".to_string());
        rows.reselect_rows();

        assert!(rows.is_selected(&"alpha".to_string()));
        assert!(!rows.is_selected(&"beta".to_string()));
    }
}

use crate::model::{NormalizedItem, SelectedItem, Snapshot};
use std::collections::{BTreeMap, HashMap};

/// Items the user picked, keyed by name so they outlive the snapshot they
/// were picked in. Row keys are only tracked for the active snapshot.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    items: Vec<SelectedItem>,
    index: HashMap<String, usize>,
    // Highlighted row key -> selected name, active snapshot only.
    active_keys: BTreeMap<usize, String>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[SelectedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether row `key` of the active snapshot is highlighted.
    pub fn is_key_selected(&self, key: usize) -> bool {
        self.active_keys.contains_key(&key)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.active_keys.keys().copied()
    }

    fn insert_if_absent(&mut self, item: SelectedItem) -> bool {
        if self.index.contains_key(&item.name) {
            return false;
        }
        self.index.insert(item.name.clone(), self.items.len());
        self.items.push(item);
        true
    }

    /// Highlights exactly `rows` and adds them to the selection. Entries that
    /// are already selected stay as they are, nothing is dropped.
    pub fn select<'a>(&mut self, rows: impl IntoIterator<Item = &'a NormalizedItem>) {
        self.active_keys.clear();
        for row in rows {
            self.active_keys.insert(row.key, row.name.clone());
            self.insert_if_absent(SelectedItem::from(row));
        }
    }

    /// Adds or removes a single row of the active snapshot.
    pub fn toggle(&mut self, item: &NormalizedItem) {
        if self.contains(&item.name) {
            self.remove(&item.name);
        } else {
            self.active_keys.insert(item.key, item.name.clone());
            self.insert_if_absent(SelectedItem::from(item));
        }
    }

    /// Re-derives the highlighted keys for a newly shown snapshot. Names the
    /// snapshot lacks stay selected without a highlighted row. Entries loaded
    /// from a preset pick up their row details here.
    pub fn reconcile(&mut self, snapshot: &Snapshot) {
        self.active_keys.clear();
        for item in &snapshot.items {
            if let Some(&pos) = self.index.get(&item.name) {
                self.active_keys.insert(item.key, item.name.clone());
                if self.items[pos].detail.is_none() {
                    self.items[pos] = SelectedItem::from(item);
                }
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<SelectedItem> {
        let pos = self.index.get(name).copied()?;
        let removed = self.items.remove(pos);
        self.rebuild_index();
        self.active_keys.retain(|_, selected| selected != name);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
        self.active_keys.clear();
    }

    /// Replaces the whole selection, e.g. with the contents of a preset.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = SelectedItem>, snapshot: Option<&Snapshot>) {
        self.clear();
        for item in items {
            self.insert_if_absent(item);
        }
        if let Some(snapshot) = snapshot {
            self.reconcile(snapshot);
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.name.clone(), pos))
            .collect();
    }

    /// Earliest and latest timestamps among selected rows with details.
    pub fn timestamp_range(&self) -> Option<(&str, &str)> {
        let mut stamps = self
            .items
            .iter()
            .filter_map(|item| item.detail.as_ref())
            .map(|detail| detail.timestamp.as_str())
            .filter(|t| !t.is_empty());
        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }
}

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coco_classes;

/// Detections per class over a whole video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTally(BTreeMap<usize, u64>);

/// One class of a tally, with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub class_id: usize,
    pub class_name: String,
    pub count: u64,
}

impl ClassTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, class_id: usize) {
        *self.0.entry(class_id).or_insert(0) += 1;
    }

    pub fn get(&self, class_id: usize) -> u64 {
        self.0.get(&class_id).copied().unwrap_or(0)
    }

    /// Sum over all classes.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `(class_id, count)` ordered by class id.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Entries sorted by count descending, ties by class id.
    pub fn ranked(&self) -> Vec<TallyEntry> {
        let mut entries: Vec<TallyEntry> = self
            .iter()
            .map(|(class_id, count)| TallyEntry {
                class_id,
                class_name: coco_classes::name(class_id).to_string(),
                count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries
    }
}

impl fmt::Display for ClassTally {
    /// Compact `{1: 12, 3: 4}` form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (class_id, count)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{class_id}: {count}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_additively() {
        let mut tally = ClassTally::new();
        for class_id in [1, 1, 3, 1, 0] {
            tally.add(class_id);
        }
        assert_eq!(tally.get(1), 3);
        assert_eq!(tally.get(3), 1);
        assert_eq!(tally.get(7), 0);
        assert_eq!(tally.total(), 5);
        assert_eq!(tally.to_string(), "{0: 1, 1: 3, 3: 1}");
    }

    #[test]
    fn ranked_orders_by_count() {
        let mut tally = ClassTally::new();
        for class_id in [3, 1, 1, 2] {
            tally.add(class_id);
        }
        let ranked = tally.ranked();
        assert_eq!(ranked[0].class_name, "bicycle");
        assert_eq!(ranked[0].count, 2);
        // equal counts keep class id order
        assert_eq!(ranked[1].class_id, 2);
        assert_eq!(ranked[2].class_id, 3);
    }

    #[test]
    fn serializes_as_map() {
        let mut tally = ClassTally::new();
        tally.add(1);
        tally.add(1);
        let json = serde_json::to_string(&tally).unwrap();
        assert_eq!(json, r#"{"1":2}"#);
    }
}

//! Sparse set of manual overrides.
//!
//! Absence of a key means "use the computed value". An override of 0 is a
//! real override and is kept distinct from a cleared field.

use crate::fields::FieldKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideSet {
    values: BTreeMap<FieldKey, f64>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &FieldKey) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Set an override. Non-finite or negative values clear the field instead,
    /// matching what an emptied form field posts.
    pub fn set(&mut self, field: FieldKey, value: f64) -> Option<f64> {
        if value.is_finite() && value >= 0.0 {
            self.values.insert(field, value)
        } else {
            self.values.remove(&field)
        }
    }

    pub fn clear(&mut self, field: &FieldKey) -> Option<f64> {
        self.values.remove(field)
    }

    pub fn clear_all(&mut self) {
        self.values.clear();
    }

    pub fn contains(&self, field: &FieldKey) -> bool {
        self.values.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, f64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    /// `override[field] ?? computed`.
    pub fn effective(&self, field: &FieldKey, computed: f64) -> f64 {
        self.get(field).unwrap_or(computed)
    }
}

impl FromIterator<(FieldKey, f64)> for OverrideSet {
    fn from_iter<T: IntoIterator<Item = (FieldKey, f64)>>(iter: T) -> Self {
        let mut set = OverrideSet::new();
        for (field, value) in iter {
            set.set(field, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_an_override_and_nan_clears() {
        let mut set = OverrideSet::new();
        set.set(FieldKey::PerVisitTotal, 0.0);
        assert_eq!(set.effective(&FieldKey::PerVisitTotal, 40.0), 0.0);

        set.set(FieldKey::PerVisitTotal, f64::NAN);
        assert!(!set.contains(&FieldKey::PerVisitTotal));
        assert_eq!(set.effective(&FieldKey::PerVisitTotal, 40.0), 40.0);
    }
}

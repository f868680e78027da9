use std::collections::HashMap;

use crate::assignment::ClassAssignment;
use crate::error::{RemapError, Result};
use crate::value::{PixelValue, TargetValue};

/// Original value to new value, built from the assignment table right before a
/// raster is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionTable {
    map: HashMap<PixelValue, PixelValue>,
}

impl SubstitutionTable {
    /// Numeric substitution for every assignment. A label target cannot be
    /// written into a raster and fails the whole build.
    pub fn from_assignments(assignments: &[ClassAssignment]) -> Result<Self> {
        assignments
            .iter()
            .map(|a| match a.new_value() {
                TargetValue::Number(v) => Ok((a.original_value(), *v)),
                TargetValue::Label(label) => Err(RemapError::NonNumericTarget {
                    original: a.original_value(),
                    label: label.clone(),
                }),
            })
            .collect()
    }

    pub fn get(&self, original: PixelValue) -> Option<PixelValue> {
        self.map.get(&original).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All replacement values, in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = PixelValue> + Clone + '_ {
        self.map.values().copied()
    }

    /// Entries whose value actually changes.
    pub fn non_identity(&self) -> usize {
        self.map.iter().filter(|(k, v)| k != v).count()
    }
}

impl FromIterator<(PixelValue, PixelValue)> for SubstitutionTable {
    /// Later pairs overwrite earlier ones with the same key.
    fn from_iter<I: IntoIterator<Item = (PixelValue, PixelValue)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

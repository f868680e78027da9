//! The editable class table: one row per distinct raster value, pairing the
//! value with a display name and the value it will be rewritten to.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Cause, RemapError, Result};
use crate::lookup::LookupTable;
use crate::value::{PixelValue, TargetValue};

/// Default prefix of synthetic class names.
pub const DEFAULT_LABEL_PREFIX: &str = "Class";

/// One class row. The original value is fixed at discovery; only the new value
/// changes afterwards, through [`set_override`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAssignment {
    display_name: String,
    original_value: PixelValue,
    new_value: TargetValue,
}

impl ClassAssignment {
    /// Identity assignment named from `lookup`, or `"{prefix} {value}"` when the
    /// legend has no description for it.
    pub fn discovered(value: PixelValue, lookup: &LookupTable, label_prefix: &str) -> Self {
        let display_name = lookup
            .description_for(value)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{label_prefix} {value}"));
        Self {
            display_name,
            original_value: value,
            new_value: TargetValue::Number(value),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn original_value(&self) -> PixelValue {
        self.original_value
    }

    pub fn new_value(&self) -> &TargetValue {
        &self.new_value
    }

    /// True when the row still maps the value onto itself.
    pub fn is_identity(&self) -> bool {
        self.new_value.as_number() == Some(self.original_value)
    }
}

/// Build identity assignments for `values` in ascending order.
pub fn assignments_for(
    values: impl IntoIterator<Item = PixelValue>,
    lookup: &LookupTable,
    label_prefix: &str,
) -> Vec<ClassAssignment> {
    let mut values: Vec<PixelValue> = values.into_iter().collect();
    values.sort_unstable();
    values.dedup();
    values
        .into_iter()
        .map(|v| ClassAssignment::discovered(v, lookup, label_prefix))
        .collect()
}

/// Replace the new value of the class whose original value is `original`.
///
/// Blank text is rejected and leaves the table untouched. Numeric text is
/// stored as a number; anything else is kept verbatim as a label.
pub fn set_override(
    assignments: &mut [ClassAssignment],
    original: PixelValue,
    text: &str,
) -> Result<()> {
    let target = TargetValue::parse(text).ok_or(RemapError::InvalidOverride { original })?;
    let row = assignments
        .iter_mut()
        .find(|a| a.original_value == original)
        .ok_or(RemapError::UnknownClass(original))?;
    debug!(original = %original, new = %target, "class override set");
    row.new_value = target;
    Ok(())
}

// ── Plans ────────────────────────────────────────────────────────────────────

/// A saved assignment table, so an edited mapping can be reviewed and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemapPlan {
    /// Raster the classes were discovered from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub assignments: Vec<ClassAssignment>,
}

impl RemapPlan {
    pub fn new(source: Option<PathBuf>, assignments: Vec<ClassAssignment>) -> Self {
        Self {
            source,
            assignments,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let plan_err = |source: Cause| RemapError::Plan {
            path: path.to_path_buf(),
            source,
        };
        let text = fs::read_to_string(path).map_err(|e| plan_err(e.into()))?;
        serde_json::from_str(&text).map_err(|e| plan_err(e.into()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let plan_err = |source: Cause| RemapError::Plan {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| plan_err(e.into()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| plan_err(e.into()))?;
        }
        fs::write(path, json).map_err(|e| plan_err(e.into()))
    }
}

//! Fallback backend for environments without raster support.
//!
//! Discovery yields the example classes 1 through 5; reclassification writes
//! a plain-text listing of the intended mapping in place of a raster.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::Path;

use super::{BackendMode, RasterBackend, WriteSummary};
use crate::assignment::ClassAssignment;
use crate::error::{RemapError, Result};
use crate::value::PixelValue;

const EXAMPLE_CLASSES: RangeInclusive<i64> = 1..=5;

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBackend;

fn require_file(source: &Path) -> Result<()> {
    if source.is_file() {
        Ok(())
    } else {
        Err(RemapError::source_unavailable(
            source,
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        ))
    }
}

/// Text written in place of a reclassified raster.
pub fn listing(source: &Path, assignments: &[ClassAssignment]) -> String {
    let mut text = String::from("SIMULATED RECLASSIFICATION\n");
    let _ = writeln!(text, "Input: {}", source.display());
    text.push_str("Mapping:\n");
    for a in assignments {
        let _ = writeln!(text, "{} -> {}", a.original_value(), a.new_value());
    }
    text
}

impl RasterBackend for DryRunBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::DryRun
    }

    fn class_values(&self, source: &Path) -> Result<Vec<PixelValue>> {
        require_file(source)?;
        Ok(EXAMPLE_CLASSES.map(PixelValue::from).collect())
    }

    fn reclassify(
        &self,
        source: &Path,
        output: &Path,
        assignments: &[ClassAssignment],
    ) -> Result<WriteSummary> {
        require_file(source)?;
        fs::write(output, listing(source, assignments))
            .map_err(|e| RemapError::unwritable(output, e))?;
        Ok(WriteSummary {
            format: None,
            changed_pixels: None,
        })
    }
}

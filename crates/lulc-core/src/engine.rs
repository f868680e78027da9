//! Class discovery and reclassification orchestration.
//!
//! The engine owns no mutable state: the lookup table and the assignment list
//! are passed in by the caller on every call, so one engine can be shared
//! across threads behind an `Arc`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::assignment::{assignments_for, ClassAssignment};
use crate::config::EngineConfig;
use crate::error::{RemapError, Result};
use crate::lookup::LookupTable;
use crate::raster::{backend_for, BackendMode, RasterBackend, SampleFormat};
use crate::substitution::SubstitutionTable;

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    /// Classes read from the raster.
    Found(usize),
    /// The raster holds no valid (non-nodata) pixels.
    NoDataFound,
    /// Example classes produced in dry-run mode.
    Simulated(usize),
}

/// Outcome of [`RemapEngine::discover_classes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub assignments: Vec<ClassAssignment>,
    pub status: DiscoveryStatus,
}

impl Discovery {
    pub fn message(&self) -> String {
        match self.status {
            DiscoveryStatus::Found(n) => format!("Found {n} classes."),
            DiscoveryStatus::NoDataFound => "No valid pixel values found in the raster.".into(),
            DiscoveryStatus::Simulated(n) => {
                format!("Raster support unavailable: loaded {n} example classes.")
            }
        }
    }
}

/// Outcome of [`RemapEngine::apply_reclassification`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReclassReport {
    /// Where the output was written, default extension applied.
    pub output: PathBuf,
    /// Sample type of the written raster; `None` for a dry run.
    pub format: Option<SampleFormat>,
    pub changed_pixels: Option<usize>,
    pub simulated: bool,
}

impl ReclassReport {
    pub fn message(&self) -> String {
        if self.simulated {
            format!("Simulation complete. Mapping saved to {}.", self.output.display())
        } else {
            format!("Reclassification complete and saved to {}.", self.output.display())
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct RemapEngine {
    backend: Box<dyn RasterBackend>,
    config: EngineConfig,
}

impl RemapEngine {
    /// Engine with the backend selected by `config.mode`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let backend = backend_for(config.mode)?;
        Ok(Self { backend, config })
    }

    pub fn with_backend(backend: Box<dyn RasterBackend>, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// The backend actually in use; never `Auto`.
    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Distinct values of the raster's first band as identity assignments,
    /// ascending, named from `lookup` where it has a description.
    ///
    /// An empty result is reported through [`DiscoveryStatus::NoDataFound`],
    /// not as an error.
    pub fn discover_classes(&self, raster: &Path, lookup: &LookupTable) -> Result<Discovery> {
        info!(path = %raster.display(), mode = %self.mode(), "discovering classes");
        let values = self.backend.class_values(raster)?;
        let assignments = assignments_for(values, lookup, &self.config.label_prefix);

        let status = match (self.mode(), assignments.len()) {
            (BackendMode::DryRun, n) => DiscoveryStatus::Simulated(n),
            (_, 0) => DiscoveryStatus::NoDataFound,
            (_, n) => DiscoveryStatus::Found(n),
        };
        info!(path = %raster.display(), classes = assignments.len(), "class discovery finished");
        Ok(Discovery {
            assignments,
            status,
        })
    }

    /// Write `raster` with `assignments` applied to `output`.
    ///
    /// Missing destination directories are created. The caller must have
    /// discovered classes first; an empty table is refused. Label targets are
    /// refused before anything touches the disk, except in dry-run mode where
    /// they are listed verbatim.
    pub fn apply_reclassification(
        &self,
        raster: &Path,
        output: &Path,
        assignments: &[ClassAssignment],
    ) -> Result<ReclassReport> {
        if assignments.is_empty() {
            return Err(RemapError::EmptyAssignment);
        }
        if output.as_os_str().is_empty() {
            return Err(RemapError::unwritable(output, "no output path given"));
        }
        if !raster.is_file() {
            return Err(RemapError::source_unavailable(
                raster,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            ));
        }

        if self.mode() != BackendMode::DryRun {
            SubstitutionTable::from_assignments(assignments)?;
        }

        let output = self.resolve_output_path(output);
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| RemapError::unwritable(dir, e))?;
        }

        info!(
            source = %raster.display(),
            output = %output.display(),
            classes = assignments.len(),
            remapped = assignments.iter().filter(|a| !a.is_identity()).count(),
            "reclassifying"
        );
        let summary = self.backend.reclassify(raster, &output, assignments)?;
        let report = ReclassReport {
            output,
            format: summary.format,
            changed_pixels: summary.changed_pixels,
            simulated: self.mode() == BackendMode::DryRun,
        };
        info!(changed = ?report.changed_pixels, "{}", report.message());
        Ok(report)
    }

    /// `output` with the configured default extension when it has none.
    pub fn resolve_output_path(&self, output: &Path) -> PathBuf {
        if output.extension().is_some() || self.config.default_extension.is_empty() {
            output.to_path_buf()
        } else {
            output.with_extension(&self.config.default_extension)
        }
    }
}

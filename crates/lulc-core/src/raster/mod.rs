//! Raster access behind a backend seam.
//!
//! `GeoTiffBackend` does real raster I/O and is compiled with the `geotiff`
//! feature. `DryRunBackend` is the fallback mode: it fabricates a fixed class
//! set and writes a textual description instead of a raster, so the engine
//! stays usable (and testable) without a raster library.

pub mod buffer;
pub mod dry_run;
#[cfg(feature = "geotiff")]
pub mod geotiff;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assignment::ClassAssignment;
use crate::error::Result;
use crate::value::PixelValue;

pub use buffer::{PixelBuffer, Sample, SampleFormat};
pub use dry_run::DryRunBackend;
#[cfg(feature = "geotiff")]
pub use geotiff::GeoTiffBackend;

/// Which backend the engine runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendMode {
    /// GeoTIFF when compiled in, otherwise dry run.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "geotiff")]
    GeoTiff,
    #[serde(rename = "dry-run")]
    DryRun,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::GeoTiff => "geotiff",
            Self::DryRun => "dry-run",
        })
    }
}

/// What a backend reports after writing an output.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    /// Sample type of the written band; `None` for textual output.
    pub format: Option<SampleFormat>,
    /// Pixels whose value changed; `None` when nothing was read.
    pub changed_pixels: Option<usize>,
}

/// Raster I/O used by the engine. Implementations hold no per-operation state;
/// every file handle is opened and closed within one call.
pub trait RasterBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// Distinct values of the first band, ascending, declared nodata excluded.
    fn class_values(&self, source: &Path) -> Result<Vec<PixelValue>>;

    /// Write `source` with `assignments` applied to `output`. The destination
    /// directory already exists when this is called.
    fn reclassify(
        &self,
        source: &Path,
        output: &Path,
        assignments: &[ClassAssignment],
    ) -> Result<WriteSummary>;
}

// ── Raster model ─────────────────────────────────────────────────────────────

/// GeoTIFF georeferencing carried unchanged from input to output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoMetadata {
    /// ModelPixelScaleTag: (sx, sy, sz).
    pub pixel_scale: Option<Vec<f64>>,
    /// ModelTiepointTag: (i, j, k, x, y, z) per tie point.
    pub tiepoints: Option<Vec<f64>>,
    /// ModelTransformationTag: 4×4 row-major matrix.
    pub transformation: Option<Vec<f64>>,
    pub key_directory: Option<Vec<u16>>,
    pub double_params: Option<Vec<f64>>,
    pub ascii_params: Option<String>,
    /// GDAL_NODATA text as stored in the file.
    pub nodata: Option<String>,
}

impl GeoMetadata {
    pub fn nodata_value(&self) -> Option<f64> {
        self.nodata.as_deref()?.trim_matches(char::from(0)).trim().parse().ok()
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata.to_string());
        self
    }

    /// GDAL-order geotransform `[x0, dx, rx, y0, ry, dy]`.
    ///
    /// Taken from the model transformation when present, else from the first
    /// tie point and the pixel scale.
    pub fn geotransform(&self) -> Option<[f64; 6]> {
        if let Some(m) = self.transformation.as_deref().filter(|m| m.len() >= 8) {
            return Some([m[3], m[0], m[1], m[7], m[4], m[5]]);
        }
        let scale = self.pixel_scale.as_deref().filter(|s| s.len() >= 2)?;
        let tie = self.tiepoints.as_deref().filter(|t| t.len() >= 6)?;
        let x0 = tie[3] - tie[0] * scale[0];
        let y0 = tie[4] + tie[1] * scale[1];
        Some([x0, scale[0], 0.0, y0, 0.0, -scale[1]])
    }
}

/// One band with its dimensions and georeferencing.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelBuffer,
    pub geo: GeoMetadata,
}

impl Raster {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Same shape and georeferencing, different samples.
    pub fn with_pixels(&self, pixels: PixelBuffer) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels,
            geo: self.geo.clone(),
        }
    }

    pub fn class_values(&self) -> Result<Vec<PixelValue>> {
        self.pixels.distinct_values(self.geo.nodata_value())
    }
}

/// Backend for `mode`. `Auto` prefers GeoTIFF when it is compiled in.
pub fn backend_for(mode: BackendMode) -> Result<Box<dyn RasterBackend>> {
    match mode {
        BackendMode::DryRun => Ok(Box::new(DryRunBackend)),
        #[cfg(feature = "geotiff")]
        BackendMode::GeoTiff | BackendMode::Auto => Ok(Box::new(GeoTiffBackend)),
        #[cfg(not(feature = "geotiff"))]
        BackendMode::GeoTiff => Err(crate::error::RemapError::BackendUnavailable("geotiff")),
        #[cfg(not(feature = "geotiff"))]
        BackendMode::Auto => {
            tracing::warn!("built without GeoTIFF support: running in dry-run mode");
            Ok(Box::new(DryRunBackend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodata_parses_gdal_text() {
        let geo = GeoMetadata {
            nodata: Some("-9999\0".into()),
            ..Default::default()
        };
        assert_eq!(geo.nodata_value(), Some(-9999.0));
        let nan = GeoMetadata {
            nodata: Some("nan".into()),
            ..Default::default()
        };
        assert!(nan.nodata_value().unwrap().is_nan());
        assert_eq!(GeoMetadata::default().nodata_value(), None);
    }

    #[test]
    fn geotransform_from_tiepoint_and_scale() {
        let geo = GeoMetadata {
            pixel_scale: Some(vec![30.0, 30.0, 0.0]),
            tiepoints: Some(vec![0.0, 0.0, 0.0, 500_000.0, 8_000_000.0, 0.0]),
            ..Default::default()
        };
        assert_eq!(
            geo.geotransform(),
            Some([500_000.0, 30.0, 0.0, 8_000_000.0, 0.0, -30.0])
        );
    }

    #[test]
    fn geotransform_prefers_model_transformation() {
        let geo = GeoMetadata {
            transformation: Some(vec![
                10.0, 1.0, 0.0, 100.0, //
                2.0, -10.0, 0.0, 200.0, //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]),
            pixel_scale: Some(vec![99.0, 99.0, 0.0]),
            ..Default::default()
        };
        assert_eq!(geo.geotransform(), Some([100.0, 10.0, 1.0, 200.0, 2.0, -10.0]));
    }

    #[test]
    fn raster_class_values_use_declared_nodata() {
        let raster = Raster {
            width: 2,
            height: 2,
            pixels: PixelBuffer::U8(vec![0, 2, 1, 0]),
            geo: GeoMetadata::default().with_nodata(0.0),
        };
        assert_eq!(raster.class_values().unwrap(), vec![PixelValue::from(1), PixelValue::from(2)]);
    }

    #[test]
    fn dry_run_backend_is_always_available() {
        assert_eq!(backend_for(BackendMode::DryRun).unwrap().mode(), BackendMode::DryRun);
    }
}

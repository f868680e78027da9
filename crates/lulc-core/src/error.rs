use std::path::PathBuf;

use thiserror::Error;

use crate::value::PixelValue;

/// Boxed underlying cause for raster I/O failures, which come from several
/// libraries (`std::io`, `tiff`).
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure the engine reports. None of them leave the engine unusable;
/// callers surface the message and may retry.
#[derive(Debug, Error)]
pub enum RemapError {
    #[error("cannot read lookup table {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("raster source unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("cannot write {}: {source}", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("no class assignments: discover classes before reclassifying")]
    EmptyAssignment,

    #[error("new value for class {original} must not be blank")]
    InvalidOverride { original: PixelValue },

    #[error("class {0} is not in the assignment table")]
    UnknownClass(PixelValue),

    #[error("class {original} has the non-numeric target {label:?}; rasters need numbers")]
    NonNumericTarget { original: PixelValue, label: String },

    #[error("value {value} cannot be stored as {format}")]
    Unrepresentable {
        value: PixelValue,
        format: &'static str,
    },

    #[error("{format} sample {sample} has no exact floating-point class key")]
    InexactSample {
        sample: String,
        format: &'static str,
    },

    #[error("{0} panicked: {1}")]
    Panicked(&'static str, String),

    #[error("raster backend {0} is not available in this build")]
    BackendUnavailable(&'static str),

    #[error("another discovery or reclassification is still running")]
    Busy,

    #[error("plan file {}: {source}", path.display())]
    Plan {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: Cause,
    },
}

impl RemapError {
    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn unwritable(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        Self::DestinationUnwritable {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemapError>;

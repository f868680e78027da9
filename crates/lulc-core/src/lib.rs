//! Land-use/land-cover raster reclassification.
//!
//! Discover the classes present in a single-band raster, name them from a
//! legend file, edit the value each class maps to, and write a reclassified
//! copy that keeps the source's georeferencing.

pub mod assignment;
pub mod config;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod raster;
pub mod substitution;
pub mod value;
pub mod worker;

pub use assignment::{assignments_for, set_override, ClassAssignment, RemapPlan};
pub use config::EngineConfig;
pub use engine::{Discovery, DiscoveryStatus, ReclassReport, RemapEngine};
pub use error::{RemapError, Result};
pub use lookup::{CategoryRecord, LookupTable};
pub use raster::BackendMode;
pub use substitution::SubstitutionTable;
pub use value::{PixelValue, TargetValue};
pub use worker::{Event, Worker};

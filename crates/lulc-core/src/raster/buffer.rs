//! Typed single-band sample storage and the pixel-wise operations on it.

use std::fmt;

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::error::{RemapError, Result};
use crate::substitution::SubstitutionTable;
use crate::value::PixelValue;

/// Numeric type of a band's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Candidate output types, narrowest first.
const WIDENING_LADDER: [SampleFormat; 9] = [
    SampleFormat::U8,
    SampleFormat::U16,
    SampleFormat::I16,
    SampleFormat::U32,
    SampleFormat::I32,
    SampleFormat::U64,
    SampleFormat::I64,
    SampleFormat::F32,
    SampleFormat::F64,
];

impl SampleFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Inclusive integer range; `None` for floating-point formats.
    fn int_range(self) -> Option<(f64, f64)> {
        Some(match self {
            Self::U8 => (0.0, u8::MAX as f64),
            Self::U16 => (0.0, u16::MAX as f64),
            Self::U32 => (0.0, u32::MAX as f64),
            Self::U64 => (0.0, u64::MAX as f64),
            Self::I8 => (i8::MIN as f64, i8::MAX as f64),
            Self::I16 => (i16::MIN as f64, i16::MAX as f64),
            Self::I32 => (i32::MIN as f64, i32::MAX as f64),
            Self::I64 => (i64::MIN as f64, i64::MAX as f64),
            Self::F32 | Self::F64 => return None,
        })
    }

    /// Whether `v` can be stored in this format without loss.
    pub fn holds(self, v: f64) -> bool {
        match self {
            Self::F64 => true,
            Self::F32 => v.is_nan() || (v as f32) as f64 == v,
            _ => {
                // `MAX as f64` rounds up to 2^64 / 2^63 for the 64-bit types,
                // so the upper bound is exclusive.
                let (lo, hi) = self.int_range().unwrap_or((0.0, 0.0));
                v.fract() == 0.0 && v >= lo && v < hi + 1.0
            }
        }
    }

    /// Whether every sample of `other` can be stored in this format.
    pub fn contains(self, other: SampleFormat) -> bool {
        if self == other || self == Self::F64 {
            return true;
        }
        match (self.int_range(), other.int_range()) {
            (Some((lo, hi)), Some((olo, ohi))) => lo <= olo && ohi <= hi,
            // f32 carries integers exactly up to 24 bits.
            (None, Some(_)) => matches!(other, Self::U8 | Self::U16 | Self::I8 | Self::I16),
            _ => false,
        }
    }

    /// Narrowest format that contains `self` and holds every value in `values`.
    /// Returns `self` whenever it already suffices.
    pub fn widen_to_fit(self, values: impl IntoIterator<Item = f64> + Clone) -> SampleFormat {
        let fits = |format: SampleFormat| values.clone().into_iter().all(|v| format.holds(v));
        if fits(self) {
            return self;
        }
        WIDENING_LADDER
            .into_iter()
            .filter(|f| f.contains(self) && (f.is_float() || !self.is_float()))
            .find(|&f| fits(f))
            .unwrap_or(SampleFormat::F64)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Sample trait ─────────────────────────────────────────────────────────────

/// Primitive sample types a band can hold.
pub trait Sample: Copy + PartialEq + fmt::Display + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    /// Exact conversion; `None` when `v` does not fit.
    fn from_f64(v: f64) -> Option<Self>;

    /// `self` as `f64` when that loses nothing. Fails only for 64-bit integers
    /// beyond 2^53 that fall between representable doubles.
    #[inline]
    fn to_exact_f64(self) -> Option<f64> {
        let v = self.to_f64();
        (v.is_nan() || Self::from_f64(v) == Some(self)).then_some(v)
    }
}

macro_rules! impl_int_sample {
    ($($t:ty),*) => {$(
        impl Sample for $t {
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Option<Self> {
                let lo = <$t>::MIN as f64;
                let hi = <$t>::MAX as f64 + 1.0;
                (v.fract() == 0.0 && v >= lo && v < hi).then(|| v as $t)
            }
        }
    )*};
}

impl_int_sample!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Option<Self> {
        let narrowed = v as f32;
        (v.is_nan() || narrowed as f64 == v).then_some(narrowed)
    }
}

impl Sample for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Option<Self> {
        Some(v)
    }
}

// ── PixelBuffer ──────────────────────────────────────────────────────────────

/// Row-major samples of one band.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Run `$body` with `$v` bound to the inner `Vec` of any variant.
macro_rules! each_variant {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            PixelBuffer::U8($v) => $body,
            PixelBuffer::U16($v) => $body,
            PixelBuffer::U32($v) => $body,
            PixelBuffer::U64($v) => $body,
            PixelBuffer::I8($v) => $body,
            PixelBuffer::I16($v) => $body,
            PixelBuffer::I32($v) => $body,
            PixelBuffer::I64($v) => $body,
            PixelBuffer::F32($v) => $body,
            PixelBuffer::F64($v) => $body,
        }
    };
}

fn samples_as_f64<S: Sample>(data: &[S]) -> Vec<f64> {
    #[cfg(feature = "threading")]
    return data.par_iter().map(|s| s.to_f64()).collect();
    #[cfg(not(feature = "threading"))]
    return data.iter().map(|s| s.to_f64()).collect();
}

fn samples_as_exact_f64<S: Sample>(data: &[S], format: SampleFormat) -> Result<Vec<f64>> {
    let exact = |&s: &S| {
        s.to_exact_f64().ok_or_else(|| RemapError::InexactSample {
            sample: s.to_string(),
            format: format.name(),
        })
    };
    #[cfg(feature = "threading")]
    return data.par_iter().map(exact).collect();
    #[cfg(not(feature = "threading"))]
    return data.iter().map(exact).collect();
}

fn narrow<S: Sample>(values: &[f64], format: SampleFormat) -> Result<Vec<S>> {
    values
        .iter()
        .map(|&v| {
            S::from_f64(v).ok_or_else(|| RemapError::Unrepresentable {
                value: PixelValue::new(v),
                format: format.name(),
            })
        })
        .collect()
}

impl PixelBuffer {
    pub fn format(&self) -> SampleFormat {
        match self {
            Self::U8(_) => SampleFormat::U8,
            Self::U16(_) => SampleFormat::U16,
            Self::U32(_) => SampleFormat::U32,
            Self::U64(_) => SampleFormat::U64,
            Self::I8(_) => SampleFormat::I8,
            Self::I16(_) => SampleFormat::I16,
            Self::I32(_) => SampleFormat::I32,
            Self::I64(_) => SampleFormat::I64,
            Self::F32(_) => SampleFormat::F32,
            Self::F64(_) => SampleFormat::F64,
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_f64(&self) -> Vec<f64> {
        each_variant!(self, v => samples_as_f64(v))
    }

    /// Like [`to_f64`](Self::to_f64), but fails instead of rounding a 64-bit
    /// integer sample that has no exact `f64`.
    pub fn to_exact_f64(&self) -> Result<Vec<f64>> {
        let format = self.format();
        each_variant!(self, v => samples_as_exact_f64(v, format))
    }

    /// Pack `values` into a buffer of `format`, failing if any value does not fit.
    pub fn from_f64(format: SampleFormat, values: &[f64]) -> Result<Self> {
        Ok(match format {
            SampleFormat::U8 => Self::U8(narrow(values, format)?),
            SampleFormat::U16 => Self::U16(narrow(values, format)?),
            SampleFormat::U32 => Self::U32(narrow(values, format)?),
            SampleFormat::U64 => Self::U64(narrow(values, format)?),
            SampleFormat::I8 => Self::I8(narrow(values, format)?),
            SampleFormat::I16 => Self::I16(narrow(values, format)?),
            SampleFormat::I32 => Self::I32(narrow(values, format)?),
            SampleFormat::I64 => Self::I64(narrow(values, format)?),
            SampleFormat::F32 => Self::F32(narrow(values, format)?),
            SampleFormat::F64 => Self::F64(values.to_vec()),
        })
    }

    /// Keep every `stride`-th sample starting at 0: band 0 of interleaved data.
    pub fn first_band(self, stride: usize) -> Self {
        if stride <= 1 {
            return self;
        }
        fn pick<S: Copy>(v: Vec<S>, stride: usize) -> Vec<S> {
            v.into_iter().step_by(stride).collect()
        }
        match self {
            Self::U8(v) => Self::U8(pick(v, stride)),
            Self::U16(v) => Self::U16(pick(v, stride)),
            Self::U32(v) => Self::U32(pick(v, stride)),
            Self::U64(v) => Self::U64(pick(v, stride)),
            Self::I8(v) => Self::I8(pick(v, stride)),
            Self::I16(v) => Self::I16(pick(v, stride)),
            Self::I32(v) => Self::I32(pick(v, stride)),
            Self::I64(v) => Self::I64(pick(v, stride)),
            Self::F32(v) => Self::F32(pick(v, stride)),
            Self::F64(v) => Self::F64(pick(v, stride)),
        }
    }

    /// Keep the first `len` samples: band 0 of plane-separated data.
    pub fn truncate(mut self, len: usize) -> Self {
        each_variant!(&mut self, v => v.truncate(len));
        self
    }

    /// Distinct sample values in ascending order, excluding `nodata` and NaN.
    ///
    /// Fails with [`RemapError::InexactSample`] rather than merging 64-bit
    /// samples that round to the same `f64`.
    pub fn distinct_values(&self, nodata: Option<f64>) -> Result<Vec<PixelValue>> {
        let nodata = nodata.filter(|n| !n.is_nan()).map(PixelValue::new);
        let mut values: Vec<PixelValue> = self
            .to_exact_f64()?
            .into_iter()
            .filter(|v| !v.is_nan())
            .map(PixelValue::new)
            .filter(|v| Some(*v) != nodata)
            .collect();

        #[cfg(feature = "threading")]
        values.par_sort_unstable();
        #[cfg(not(feature = "threading"))]
        values.sort_unstable();

        values.dedup();
        Ok(values)
    }

    /// Apply `table` pixel-wise. Unmatched samples are copied unchanged and the
    /// output format is widened only as far as the mapped values require.
    /// Returns the new buffer and the number of samples whose value changed.
    pub fn remap(&self, table: &SubstitutionTable) -> Result<(PixelBuffer, usize)> {
        let source = self.to_exact_f64()?;
        let substitute = |&v: &f64| -> f64 {
            if v.is_nan() {
                return v;
            }
            table.get(PixelValue::new(v)).map(PixelValue::get).unwrap_or(v)
        };

        #[cfg(feature = "threading")]
        let mapped: Vec<f64> = source.par_iter().map(substitute).collect();
        #[cfg(not(feature = "threading"))]
        let mapped: Vec<f64> = source.iter().map(substitute).collect();

        let changed = source
            .iter()
            .zip(&mapped)
            .filter(|(a, b)| a.to_bits() != b.to_bits() && !(a.is_nan() && b.is_nan()))
            .count();

        let format = self.format().widen_to_fit(table.targets().map(PixelValue::get));
        Ok((PixelBuffer::from_f64(format, &mapped)?, changed))
    }
}

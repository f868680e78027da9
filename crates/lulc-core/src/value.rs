//! Pixel values and user-assigned replacement targets.
//!
//! Raster samples of every supported type are carried as `f64`, which holds
//! all category codes of practical size exactly. `PixelValue` gives that `f64`
//! the total order and hashing needed to use it as a class key.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Largest magnitude printed in integer form; beyond it `f64` stops being exact.
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// A single raster sample value used as a category key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelValue(f64);

impl PixelValue {
    pub fn new(v: f64) -> Self {
        // Fold -0.0 into 0.0 so both hash and compare as one class.
        Self(if v == 0.0 { 0.0 } else { v })
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// The value as an integer category id, if it has no fractional part.
    pub fn as_integer(self) -> Option<i64> {
        let v = self.0;
        if v.is_finite() && v.fract() == 0.0 && v.abs() <= EXACT_INT_LIMIT {
            Some(v as i64)
        } else {
            None
        }
    }

    /// Legend id for this value: the integer part, truncated toward zero, so
    /// `2.5` and `-2.5` resolve to categories `2` and `-2`.
    pub fn category_id(self) -> Option<i64> {
        let v = self.0.trunc();
        (v.is_finite() && v.abs() <= EXACT_INT_LIMIT).then(|| v as i64)
    }
}

impl From<i64> for PixelValue {
    fn from(v: i64) -> Self {
        Self::new(v as f64)
    }
}

impl From<f64> for PixelValue {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}

impl PartialEq for PixelValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PixelValue {}

impl PartialOrd for PixelValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PixelValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for PixelValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for PixelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            Some(i) => write!(f, "{i}"),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Replacement assigned to a class.
///
/// Non-numeric text is kept verbatim so it can be shown back to the user,
/// but only `Number` targets can be written into a raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Number(PixelValue),
    Label(String),
}

impl TargetValue {
    /// Interpret user-entered override text.
    ///
    /// Integers are tried first, then decimals; anything else is a label.
    /// Returns `None` for blank input.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(Self::Number(PixelValue::from(i)));
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(Self::Number(PixelValue::new(v))),
            _ => Some(Self::Label(text.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<PixelValue> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Label(_) => None,
        }
    }
}

impl From<PixelValue> for TargetValue {
    fn from(v: PixelValue) -> Self {
        Self::Number(v)
    }
}

impl fmt::Display for TargetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => v.fmt(f),
            Self::Label(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values_display_without_fraction() {
        assert_eq!(PixelValue::new(3.0).to_string(), "3");
        assert_eq!(PixelValue::new(-12.0).to_string(), "-12");
        assert_eq!(PixelValue::new(2.5).to_string(), "2.5");
    }

    #[test]
    fn negative_zero_is_zero() {
        assert_eq!(PixelValue::new(-0.0), PixelValue::new(0.0));
        assert_eq!(PixelValue::new(-0.0).as_integer(), Some(0));
    }

    #[test]
    fn as_integer_rejects_fractions_and_nan() {
        assert_eq!(PixelValue::new(7.0).as_integer(), Some(7));
        assert_eq!(PixelValue::new(7.25).as_integer(), None);
        assert_eq!(PixelValue::new(f64::NAN).as_integer(), None);
    }

    #[test]
    fn category_id_truncates_toward_zero() {
        assert_eq!(PixelValue::new(2.5).category_id(), Some(2));
        assert_eq!(PixelValue::new(-2.5).category_id(), Some(-2));
        assert_eq!(PixelValue::new(0.9).category_id(), Some(0));
        assert_eq!(PixelValue::new(f64::NAN).category_id(), None);
        assert_eq!(PixelValue::new(f64::INFINITY).category_id(), None);
    }

    #[test]
    fn parse_target_prefers_integers() {
        assert_eq!(TargetValue::parse(" 10 "), Some(TargetValue::Number(PixelValue::from(10))));
        assert_eq!(TargetValue::parse("1.5"), Some(TargetValue::Number(PixelValue::new(1.5))));
        assert_eq!(TargetValue::parse("forest"), Some(TargetValue::Label("forest".into())));
        assert_eq!(TargetValue::parse("   "), None);
        assert_eq!(TargetValue::parse(""), None);
    }

    #[test]
    fn non_finite_text_stays_a_label() {
        assert_eq!(TargetValue::parse("inf"), Some(TargetValue::Label("inf".into())));
    }

    #[test]
    fn target_serializes_untagged() {
        let n = serde_json::to_string(&TargetValue::Number(PixelValue::from(4))).unwrap();
        assert_eq!(n, "4.0");
        let l: TargetValue = serde_json::from_str("\"urban\"").unwrap();
        assert_eq!(l, TargetValue::Label("urban".into()));
        let back: TargetValue = serde_json::from_str("20").unwrap();
        assert_eq!(back.as_number(), Some(PixelValue::from(20)));
    }
}

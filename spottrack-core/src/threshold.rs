//! Threshold specifications.
//!
//! A threshold is either a literal sample value or is derived from the
//! statistics of the detection wavelength at each timepoint:
//!
//! | spec        | threshold                  |
//! |-------------|----------------------------|
//! | `500`       | 500                        |
//! | `mean`      | mean                       |
//! | `mean2.5s`  | mean + 2.5 sigma           |
//! | `gmean`     | geometric mean             |
//! | `gmean3s`   | geometric mean + 3 sigma   |
#![allow(clippy::cast_possible_truncation)]

use crate::stats::WaveStats;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the detection threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThresholdSpec {
    /// Fixed sample value.
    Literal(i32),
    /// Wavelength mean plus `sigmas` standard deviations.
    Mean { sigmas: f64 },
    /// Wavelength geometric mean plus `sigmas` standard deviations.
    GeoMean { sigmas: f64 },
}

/// A threshold resolved for one stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Samples strictly above this value are part of a spot.
    pub value: f64,
    /// Value written into visited voxels. Never exceeds `value`.
    pub marker: i16,
}

impl Threshold {
    /// Builds a threshold, clamping it to the 16-bit sample range.
    #[must_use]
    pub fn new(value: f64) -> Self {
        let value = value.clamp(f64::from(i16::MIN), f64::from(i16::MAX));
        Self {
            value,
            marker: value.floor() as i16,
        }
    }

    /// Returns true if `sample` is strictly above the threshold.
    #[inline]
    #[must_use]
    pub fn exceeds(&self, sample: i16) -> bool {
        f64::from(sample) > self.value
    }
}

impl ThresholdSpec {
    /// Resolves the spec against the detection wavelength statistics.
    #[must_use]
    pub fn resolve(&self, stats: &WaveStats) -> Threshold {
        match *self {
            Self::Literal(value) => Threshold::new(f64::from(value)),
            Self::Mean { sigmas } => Threshold::new(stats.mean + sigmas * stats.sigma),
            Self::GeoMean { sigmas } => Threshold::new(stats.geomean + sigmas * stats.sigma),
        }
    }
}

fn parse_sigmas(rest: &str, spec: &str) -> Result<f64> {
    if rest.is_empty() {
        return Ok(0.0);
    }
    let number = rest
        .strip_suffix('s')
        .ok_or_else(|| Error::config(format!("threshold '{spec}' must end in 's'")))?;
    let sigmas: f64 = number
        .parse()
        .map_err(|_| Error::config(format!("bad sigma count in threshold '{spec}'")))?;
    if !sigmas.is_finite() {
        return Err(Error::config(format!("bad sigma count in threshold '{spec}'")));
    }
    Ok(sigmas)
}

impl FromStr for ThresholdSpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        // "gmean" must be checked first: it also ends with "mean".
        if let Some(rest) = trimmed.strip_prefix("gmean") {
            return Ok(Self::GeoMean {
                sigmas: parse_sigmas(rest, spec)?,
            });
        }
        if let Some(rest) = trimmed.strip_prefix("mean") {
            return Ok(Self::Mean {
                sigmas: parse_sigmas(rest, spec)?,
            });
        }
        let value: i32 = trimmed
            .parse()
            .map_err(|_| Error::config(format!("unrecognized threshold '{spec}'")))?;
        if !(i32::from(i16::MIN)..=i32::from(i16::MAX)).contains(&value) {
            return Err(Error::config(format!(
                "threshold {value} is outside the 16-bit sample range"
            )));
        }
        Ok(Self::Literal(value))
    }
}

impl fmt::Display for ThresholdSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Mean { sigmas } if *sigmas == 0.0 => write!(f, "mean"),
            Self::Mean { sigmas } => write!(f, "mean{sigmas}s"),
            Self::GeoMean { sigmas } if *sigmas == 0.0 => write!(f, "gmean"),
            Self::GeoMean { sigmas } => write!(f, "gmean{sigmas}s"),
        }
    }
}

impl TryFrom<String> for ThresholdSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ThresholdSpec> for String {
    fn from(spec: ThresholdSpec) -> Self {
        spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    fn stats() -> WaveStats {
        WaveStats {
            min: 0,
            max: 1000,
            mean: 100.0,
            geomean: 80.0,
            sigma: 10.0,
            count: 64,
        }
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("50".parse::<ThresholdSpec>().unwrap(), ThresholdSpec::Literal(50));
        assert_eq!(
            "mean".parse::<ThresholdSpec>().unwrap(),
            ThresholdSpec::Mean { sigmas: 0.0 }
        );
        assert_eq!(
            "mean2s".parse::<ThresholdSpec>().unwrap(),
            ThresholdSpec::Mean { sigmas: 2.0 }
        );
        assert_eq!(
            "gmean1.5s".parse::<ThresholdSpec>().unwrap(),
            ThresholdSpec::GeoMean { sigmas: 1.5 }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("median".parse::<ThresholdSpec>().is_err());
        assert!("mean2".parse::<ThresholdSpec>().is_err());
        assert!("meanxs".parse::<ThresholdSpec>().is_err());
        assert!("40000".parse::<ThresholdSpec>().is_err());
    }

    #[test]
    fn test_resolve() {
        let s = stats();
        assert_eq!(ThresholdSpec::Literal(50).resolve(&s).value, 50.0);
        assert_eq!(ThresholdSpec::Mean { sigmas: 2.0 }.resolve(&s).value, 120.0);
        assert_eq!(ThresholdSpec::GeoMean { sigmas: 0.0 }.resolve(&s).value, 80.0);
    }

    #[test]
    fn test_marker_never_exceeds() {
        let threshold = Threshold::new(120.7);
        assert_eq!(threshold.marker, 120);
        assert!(!threshold.exceeds(threshold.marker));
        assert!(threshold.exceeds(121));
        assert!(!threshold.exceeds(120));
    }

    #[test]
    fn test_exactly_at_threshold_excluded() {
        let threshold = Threshold::new(50.0);
        assert!(!threshold.exceeds(50));
        assert!(threshold.exceeds(51));
    }

    #[test]
    fn test_clamped_to_sample_range() {
        let threshold = Threshold::new(1.0e9);
        assert_eq!(threshold.marker, i16::MAX);
        assert!(!threshold.exceeds(i16::MAX));
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["50", "mean", "mean2s", "gmean", "gmean1.5s"] {
            let spec: ThresholdSpec = text.parse().unwrap();
            assert_eq!(spec.to_string(), text);
        }
    }
}

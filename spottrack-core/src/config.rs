//! Tracking configuration.

use crate::stack::ClipBox;
use crate::threshold::ThresholdSpec;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

/// Selects wavelengths by emission wavelength id (nm) or by index.
///
/// A positive value that matches one of the file's wavelength ids selects that
/// wavelength; otherwise it is taken as a zero-based index. Unset id slots
/// (0) never match by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WaveSelector {
    /// Every wavelength in the file.
    All,
    /// One wavelength, by id or index.
    Value(i32),
}

impl Default for WaveSelector {
    fn default() -> Self {
        Self::Value(0)
    }
}

impl WaveSelector {
    /// Resolves to wavelength indices given the file's wavelength ids.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the wavelength is not present.
    pub fn resolve(&self, wave_ids: &[i32]) -> Result<Vec<usize>> {
        match *self {
            Self::All => Ok((0..wave_ids.len()).collect()),
            Self::Value(value) => {
                if let Some(index) = wave_ids.iter().position(|&id| id > 0 && id == value) {
                    return Ok(vec![index]);
                }
                match usize::try_from(value) {
                    Ok(index) if index < wave_ids.len() => Ok(vec![index]),
                    _ => Err(Error::config(format!(
                        "wavelength {value} is not present (file has {wave_ids:?})"
                    ))),
                }
            }
        }
    }

    /// Resolves to exactly one wavelength index.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for `All` or a missing wavelength.
    pub fn resolve_one(&self, wave_ids: &[i32]) -> Result<usize> {
        match self {
            Self::All => Err(Error::config("a single wavelength is required here")),
            Self::Value(_) => Ok(self.resolve(wave_ids)?[0]),
        }
    }
}

impl FromStr for WaveSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse()
            .map(Self::Value)
            .map_err(|_| Error::config(format!("bad wavelength '{s}'")))
    }
}

impl fmt::Display for WaveSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

impl TryFrom<String> for WaveSelector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<WaveSelector> for String {
    fn from(selector: WaveSelector) -> Self {
        selector.to_string()
    }
}

/// Inclusive range of timepoints to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// First timepoint.
    pub start: usize,
    /// Last timepoint (inclusive).
    pub end: usize,
}

impl TimeRange {
    /// Creates an inclusive range.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Clamps the range to a file with `num_times` timepoints.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the range is empty or starts past the end.
    pub fn resolve(&self, num_times: usize) -> Result<RangeInclusive<usize>> {
        if self.start > self.end {
            return Err(Error::config(format!(
                "time range {}-{} is empty",
                self.start, self.end
            )));
        }
        if self.start >= num_times {
            return Err(Error::TimepointOutOfRange {
                timepoint: self.start,
                num_times,
            });
        }
        Ok(self.start..=self.end.min(num_times - 1))
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    /// Parses `"a-b"` or a single timepoint `"a"`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::config(format!("bad time range '{s}'"));
        match s.split_once('-') {
            Some((a, b)) => Ok(Self::new(
                a.trim().parse().map_err(|_| bad())?,
                b.trim().parse().map_err(|_| bad())?,
            )),
            None => {
                let t = s.trim().parse().map_err(|_| bad())?;
                Ok(Self::new(t, t))
            }
        }
    }
}

/// Parameters of a tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Detection wavelength.
    pub wave: WaveSelector,
    /// Detection threshold.
    pub threshold: ThresholdSpec,
    /// Smallest component kept, in voxels.
    pub min_volume: usize,
    /// Largest component kept, in voxels.
    pub max_volume: Option<usize>,
    /// Weight of the mean-intensity difference in the link score.
    pub intensity_weight: f64,
    /// Largest physical distance a link may span.
    pub max_link_distance: Option<f64>,
    /// Timepoints to process (all when unset).
    pub time_range: Option<TimeRange>,
    /// Region to scan (whole stack when unset).
    pub clip: Option<ClipBox>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            wave: WaveSelector::default(),
            threshold: ThresholdSpec::Mean { sigmas: 0.0 },
            min_volume: 1,
            max_volume: None,
            intensity_weight: 0.0,
            max_link_distance: None,
            time_range: None,
            clip: None,
        }
    }
}

impl TrackingConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the detection wavelength.
    #[must_use]
    pub fn with_wave(mut self, wave: WaveSelector) -> Self {
        self.wave = wave;
        self
    }

    /// Sets the threshold spec.
    #[must_use]
    pub fn with_threshold(mut self, threshold: ThresholdSpec) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the minimum spot volume.
    #[must_use]
    pub fn with_min_volume(mut self, volume: usize) -> Self {
        self.min_volume = volume;
        self
    }

    /// Sets the maximum spot volume.
    #[must_use]
    pub fn with_max_volume(mut self, volume: usize) -> Self {
        self.max_volume = Some(volume);
        self
    }

    /// Sets the intensity weight of the link score.
    #[must_use]
    pub fn with_intensity_weight(mut self, weight: f64) -> Self {
        self.intensity_weight = weight;
        self
    }

    /// Sets the largest distance a link may span.
    #[must_use]
    pub fn with_max_link_distance(mut self, distance: f64) -> Self {
        self.max_link_distance = Some(distance);
        self
    }

    /// Restricts processing to a timepoint range.
    #[must_use]
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Restricts scanning to a clip box.
    #[must_use]
    pub fn with_clip(mut self, clip: ClipBox) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Returns true if a component of `volume` voxels is kept.
    #[inline]
    #[must_use]
    pub fn accepts_volume(&self, volume: usize) -> bool {
        volume >= self.min_volume && self.max_volume.is_none_or(|max| volume <= max)
    }

    /// Checks the configuration for degenerate values.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.min_volume == 0 {
            return Err(Error::config("minimum volume must be at least 1"));
        }
        if let Some(max) = self.max_volume {
            if max < self.min_volume {
                return Err(Error::config(format!(
                    "maximum volume {max} is below minimum volume {}",
                    self.min_volume
                )));
            }
        }
        if !self.intensity_weight.is_finite() || self.intensity_weight < 0.0 {
            return Err(Error::config(format!(
                "intensity weight must be a non-negative number, got {}",
                self.intensity_weight
            )));
        }
        if let Some(distance) = self.max_link_distance {
            if distance.is_nan() || distance < 0.0 {
                return Err(Error::config("maximum link distance must be non-negative"));
            }
        }
        if let Some(range) = self.time_range {
            if range.start > range.end {
                return Err(Error::config(format!(
                    "time range {}-{} is empty",
                    range.start, range.end
                )));
            }
        }
        if let Some(clip) = self.clip {
            if (0..3).any(|axis| clip.min[axis] > clip.max[axis]) {
                return Err(Error::config("clip box is inverted"));
            }
        }
        Ok(())
    }

    /// Loads a configuration from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the JSON is malformed or the values are invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid tracking config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::config(format!("cannot open {}: {e}", path.display())))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::config(format!("invalid tracking config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_builder() {
        let config = TrackingConfig::new()
            .with_wave(WaveSelector::Value(528))
            .with_threshold(ThresholdSpec::Literal(50))
            .with_min_volume(3)
            .with_max_volume(100)
            .with_intensity_weight(0.25);
        assert!(config.validate().is_ok());
        assert!(config.accepts_volume(3));
        assert!(config.accepts_volume(100));
        assert!(!config.accepts_volume(2));
        assert!(!config.accepts_volume(101));
    }

    #[test]
    fn test_degenerate_volumes() {
        assert!(TrackingConfig::new().with_min_volume(0).validate().is_err());
        assert!(TrackingConfig::new()
            .with_min_volume(10)
            .with_max_volume(5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(TrackingConfig::new()
            .with_intensity_weight(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_wave_selector_by_id_then_index() {
        let ids = [528, 617];
        assert_eq!(WaveSelector::Value(617).resolve_one(&ids).unwrap(), 1);
        assert_eq!(WaveSelector::Value(0).resolve_one(&ids).unwrap(), 0);
        assert!(WaveSelector::Value(488).resolve_one(&ids).is_err());
        assert_eq!(WaveSelector::All.resolve(&ids).unwrap(), vec![0, 1]);
        assert!(WaveSelector::All.resolve_one(&ids).is_err());
    }

    #[test]
    fn test_unset_wave_id_is_not_matched() {
        let ids = [528, 0];
        assert_eq!(WaveSelector::Value(0).resolve_one(&ids).unwrap(), 0);
        assert_eq!(WaveSelector::Value(1).resolve_one(&ids).unwrap(), 1);
        assert_eq!(WaveSelector::Value(528).resolve_one(&ids).unwrap(), 0);
        assert_eq!(WaveSelector::Value(0).resolve_one(&[0, 0, 0]).unwrap(), 0);
    }

    #[test]
    fn test_time_range() {
        let range: TimeRange = "2-40".parse().unwrap();
        assert_eq!(range.resolve(10).unwrap(), 2..=9);
        assert!(TimeRange::new(12, 14).resolve(10).is_err());
        assert!(TimeRange::new(5, 4).resolve(10).is_err());
        assert_eq!("3".parse::<TimeRange>().unwrap(), TimeRange::new(3, 3));
        assert!("a-b".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_json_partial() {
        let config = TrackingConfig::from_json(
            r#"{ "wave": "528", "threshold": "gmean2s", "min_volume": 4 }"#,
        )
        .unwrap();
        assert_eq!(config.wave, WaveSelector::Value(528));
        assert_eq!(config.threshold, ThresholdSpec::GeoMean { sigmas: 2.0 });
        assert_eq!(config.min_volume, 4);
        assert_eq!(config.intensity_weight, 0.0);
        assert!(config.time_range.is_none());
    }

    #[test]
    fn test_json_empty_uses_defaults() {
        let config = TrackingConfig::from_json("{}").unwrap();
        assert_eq!(config, TrackingConfig::default());
    }

    #[test]
    fn test_json_invalid_values() {
        assert!(TrackingConfig::from_json(r#"{ "min_volume": 0 }"#).is_err());
        assert!(TrackingConfig::from_json(r#"{ "threshold": "median" }"#).is_err());
    }
}

//! Spot collections per timepoint and across a time series.

use crate::spot::Spot;
use crate::stats::WaveStats;
use crate::threshold::Threshold;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// All spots found at one timepoint, in scan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotCollection {
    /// Timepoint index in the source file.
    pub timepoint: usize,
    /// Threshold used for detection at this timepoint.
    pub threshold: Threshold,
    /// Stack statistics per wavelength, captured before any voxel was visited.
    pub stats: Vec<WaveStats>,
    /// Elapsed acquisition time, when the file records it.
    pub elapsed_seconds: Option<f64>,
    /// Spots, indexed `0..len()`.
    pub spots: Vec<Spot>,
}

impl SpotCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(timepoint: usize, threshold: Threshold, stats: Vec<WaveStats>) -> Self {
        Self {
            timepoint,
            threshold,
            stats,
            elapsed_seconds: None,
            spots: Vec::new(),
        }
    }

    /// Number of spots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spots.len()
    }

    /// Returns true when no spot was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Iterates over spots in scan order.
    pub fn iter(&self) -> impl Iterator<Item = &Spot> {
        self.spots.iter()
    }
}

/// Collections for a contiguous run of timepoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotSeries {
    collections: Vec<SpotCollection>,
    next_id: u32,
}

impl SpotSeries {
    /// Creates an empty series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the collection of the next timepoint and numbers its spots.
    ///
    /// Spot ids increase in timepoint order, then scan order, starting at 1.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if the timepoint does not directly follow the last one.
    pub fn push(&mut self, mut collection: SpotCollection) -> Result<()> {
        if let Some(last) = self.collections.last() {
            if collection.timepoint != last.timepoint + 1 {
                return Err(Error::Format(format!(
                    "timepoint {} does not follow timepoint {}",
                    collection.timepoint, last.timepoint
                )));
            }
        }
        for spot in &mut collection.spots {
            self.next_id += 1;
            spot.id = self.next_id;
        }
        self.collections.push(collection);
        Ok(())
    }

    /// Number of timepoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns true when the series holds no timepoint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Collection at series position `index` (not the file timepoint).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SpotCollection> {
        self.collections.get(index)
    }

    /// Spot `spot` of the collection at series position `index`.
    #[must_use]
    pub fn spot(&self, index: usize, spot: usize) -> Option<&Spot> {
        self.collections.get(index)?.spots.get(spot)
    }

    /// All collections in timepoint order.
    #[must_use]
    pub fn collections(&self) -> &[SpotCollection] {
        &self.collections
    }

    /// Iterates over collections in timepoint order.
    pub fn iter(&self) -> impl Iterator<Item = &SpotCollection> {
        self.collections.iter()
    }

    /// Total spots over all timepoints.
    #[must_use]
    pub fn total_spots(&self) -> usize {
        self.collections.iter().map(SpotCollection::len).sum()
    }
}

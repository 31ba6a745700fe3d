//! Nearest-neighbor trajectory linking.
//!
//! Every spot of timepoint `T` is matched to the spot of `T + 1` with the lowest
//! score `physical distance + weight × |Δ mean intensity|`, comparing intensity
//! centroids at the detection wavelength. Candidates are scanned in index order
//! and only a strictly lower score replaces the current best, so ties go to the
//! lowest index. Matching is not exclusive: several spots may pick the same
//! successor, which then keeps the lowest trajectory id.
//!
//! Trajectory ids are handed out to the spots of the first timepoint and are
//! inherited along links. Spots first appearing later never receive one.
#![allow(clippy::cast_precision_loss)]

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use spottrack_core::{sample_sigma, Spot, SpotCollection, SpotSeries, TrackingConfig};

/// Linker configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkerConfig {
    /// Physical size of a voxel along `x, y, z`.
    pub voxel_size: [f64; 3],
    /// Weight of the mean-intensity difference.
    pub intensity_weight: f64,
    /// Candidates farther than this physical distance never qualify.
    pub max_distance: Option<f64>,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            voxel_size: [1.0; 3],
            intensity_weight: 0.0,
            max_distance: None,
        }
    }
}

/// Link from a spot to its match in the next timepoint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotLink {
    /// Index of the matched spot in the next timepoint.
    pub target: usize,
    /// Centroid displacement in voxels.
    pub displacement: [f64; 3],
    /// Physical centroid distance.
    pub distance: f64,
    /// Score that selected the match.
    pub score: f64,
}

/// Step statistics of one trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    /// Trajectory id.
    pub id: u32,
    /// Spots along the chain.
    pub length: usize,
    /// Links along the chain (`length - 1`).
    pub steps: usize,
    /// Mean physical step distance.
    pub mean_step: f64,
    /// Sample standard deviation of the step distances.
    pub sigma_step: f64,
}

/// Links and trajectory ids of a whole series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectories {
    links: Vec<Vec<Option<SpotLink>>>,
    ids: Vec<Vec<Option<u32>>>,
    count: u32,
}

impl Trajectories {
    /// Link of spot `spot` at series position `index`.
    #[must_use]
    pub fn link(&self, index: usize, spot: usize) -> Option<&SpotLink> {
        self.links.get(index)?.get(spot)?.as_ref()
    }

    /// Trajectory id of spot `spot` at series position `index`.
    #[must_use]
    pub fn trajectory_id(&self, index: usize, spot: usize) -> Option<u32> {
        *self.ids.get(index)?.get(spot)?
    }

    /// Number of trajectories (spots in the first timepoint).
    #[must_use]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Returns true when the first timepoint had no spot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Spot indices along trajectory `id`, one per series position, starting at 0.
    ///
    /// The chain ends at the last timepoint or at the first spot without a link.
    #[must_use]
    pub fn chain(&self, id: u32) -> Vec<usize> {
        let mut chain = Vec::new();
        if id == 0 || id > self.count {
            return chain;
        }
        let mut current = Some((id - 1) as usize);
        let mut index = 0;
        while let Some(spot) = current {
            chain.push(spot);
            current = self.link(index, spot).map(|link| link.target);
            index += 1;
        }
        chain
    }

    /// Step statistics of trajectory `id`.
    #[must_use]
    pub fn summary(&self, id: u32) -> Option<TrajectorySummary> {
        let chain = self.chain(id);
        if chain.is_empty() {
            return None;
        }
        let steps: Vec<f64> = chain
            .iter()
            .enumerate()
            .filter_map(|(index, &spot)| self.link(index, spot).map(|link| link.distance))
            .collect();
        let n = steps.len() as f64;
        let sum: f64 = steps.iter().sum();
        let sum_sq: f64 = steps.iter().map(|d| d * d).sum();
        Some(TrajectorySummary {
            id,
            length: chain.len(),
            steps: steps.len(),
            mean_step: if steps.is_empty() { 0.0 } else { sum / n },
            sigma_step: sample_sigma(sum, sum_sq, n),
        })
    }

    /// Summaries of every trajectory, by id.
    #[must_use]
    pub fn summaries(&self) -> Vec<TrajectorySummary> {
        (1..=self.count).filter_map(|id| self.summary(id)).collect()
    }
}

/// Nearest-neighbor linker.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryLinker {
    config: LinkerConfig,
}

impl TrajectoryLinker {
    /// Creates a linker.
    #[must_use]
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    /// Takes weight and distance limit from a tracking run.
    #[must_use]
    pub fn from_tracking(config: &TrackingConfig, voxel_size: [f64; 3]) -> Self {
        Self::new(LinkerConfig {
            voxel_size,
            intensity_weight: config.intensity_weight,
            max_distance: config.max_link_distance,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Physical distance between the detection centroids of two spots.
    #[must_use]
    pub fn distance(&self, from: &Spot, to: &Spot) -> f64 {
        let (a, b) = (from.centroid(), to.centroid());
        (0..3)
            .map(|axis| {
                let d = (b[axis] - a[axis]) * self.config.voxel_size[axis];
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Best match for `spot` among `candidates`.
    #[must_use]
    pub fn best_match(&self, spot: &Spot, candidates: &[Spot]) -> Option<SpotLink> {
        let mut best: Option<SpotLink> = None;
        for (target, candidate) in candidates.iter().enumerate() {
            let distance = self.distance(spot, candidate);
            if self.config.max_distance.is_some_and(|max| distance > max) {
                continue;
            }
            let score = distance
                + self.config.intensity_weight
                    * (spot.mean_intensity() - candidate.mean_intensity()).abs();
            if best.is_none_or(|b| score < b.score) {
                let (a, b) = (spot.centroid(), candidate.centroid());
                best = Some(SpotLink {
                    target,
                    displacement: [b[0] - a[0], b[1] - a[1], b[2] - a[2]],
                    distance,
                    score,
                });
            }
        }
        best
    }

    /// Links every spot of `current` to its best match in `next`.
    #[must_use]
    pub fn link_pair(
        &self,
        current: &SpotCollection,
        next: &SpotCollection,
    ) -> Vec<Option<SpotLink>> {
        current
            .spots
            .iter()
            .map(|spot| self.best_match(spot, &next.spots))
            .collect()
    }

    /// Links a whole series and assigns trajectory ids.
    ///
    /// Consecutive pairs are matched in parallel; ids are then propagated in
    /// timepoint order. A successor reached from several trajectories keeps the
    /// lowest id.
    #[must_use]
    pub fn link(&self, series: &SpotSeries) -> Trajectories {
        let collections = series.collections();
        let mut links: Vec<Vec<Option<SpotLink>>> = collections
            .par_windows(2)
            .map(|pair| self.link_pair(&pair[0], &pair[1]))
            .collect();
        if let Some(last) = collections.last() {
            links.push(vec![None; last.len()]);
        }

        let mut ids: Vec<Vec<Option<u32>>> =
            collections.iter().map(|c| vec![None; c.len()]).collect();
        let mut count = 0u32;
        if let Some(first) = ids.first_mut() {
            for id in first.iter_mut() {
                count += 1;
                *id = Some(count);
            }
        }
        for index in 0..links.len().saturating_sub(1) {
            let (done, rest) = ids.split_at_mut(index + 1);
            let (current, next) = (&done[index], &mut rest[0]);
            for (spot, link) in links[index].iter().enumerate() {
                if let (Some(id), Some(link)) = (current[spot], link) {
                    let slot = &mut next[link.target];
                    *slot = Some(slot.map_or(id, |existing| existing.min(id)));
                }
            }
        }

        log::debug!(
            "linked {} timepoints into {count} trajectories",
            collections.len()
        );
        Trajectories { links, ids, count }
    }
}

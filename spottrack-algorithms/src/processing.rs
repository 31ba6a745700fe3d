//! High-level helpers that combine extraction and linking.

use crate::extract::SpotExtractor;
use crate::linker::{Trajectories, TrajectoryLinker};
use rayon::prelude::*;
use spottrack_core::{Result, SpotCollection, SpotSeries, VolumeStack};

/// Spots of every timepoint plus their trajectories.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingRun {
    /// Spot collections in timepoint order.
    pub series: SpotSeries,
    /// Links and trajectory ids.
    pub trajectories: Trajectories,
}

/// Extracts spots from stacks in parallel, consuming them.
///
/// Each pixel buffer is released as soon as its timepoint is done. Results
/// come back in the order of `stacks`.
///
/// # Errors
/// Returns the first extraction error.
pub fn extract_stacks(
    extractor: &SpotExtractor,
    stacks: Vec<VolumeStack>,
) -> Result<Vec<SpotCollection>> {
    stacks
        .into_par_iter()
        .map(|mut stack| extractor.extract(&mut stack))
        .collect()
}

/// Appends collections to a series, in order.
///
/// # Errors
/// Returns an error if a timepoint does not follow the previous one.
pub fn append_collections<I>(series: &mut SpotSeries, collections: I) -> Result<()>
where
    I: IntoIterator<Item = SpotCollection>,
{
    for collection in collections {
        series.push(collection)?;
    }
    Ok(())
}

/// Extracts and links a complete run from in-memory stacks.
///
/// # Errors
/// Returns the first extraction or ordering error.
pub fn extract_and_link(
    extractor: &SpotExtractor,
    linker: &TrajectoryLinker,
    stacks: Vec<VolumeStack>,
) -> Result<TrackingRun> {
    let mut series = SpotSeries::new();
    append_collections(&mut series, extract_stacks(extractor, stacks)?)?;
    let trajectories = linker.link(&series);
    Ok(TrackingRun {
        series,
        trajectories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorConfig;
    use spottrack_core::{StackDims, ThresholdSpec};

    #[test]
    fn test_extract_and_link_moving_spot() {
        let dims = StackDims::new(8, 8, 2, 1);
        let stacks: Vec<VolumeStack> = (0..4)
            .map(|t| {
                let mut stack = VolumeStack::zeroed(dims, t).unwrap();
                stack.set(1 + t, 2, 1, 0, 200);
                stack
            })
            .collect();
        let extractor = SpotExtractor::new(ExtractorConfig {
            threshold: ThresholdSpec::Literal(100),
            ..ExtractorConfig::default()
        });
        let run = extract_and_link(&extractor, &TrajectoryLinker::default(), stacks).unwrap();
        assert_eq!(run.series.len(), 4);
        assert_eq!(run.trajectories.chain(1), vec![0, 0, 0, 0]);
        for index in 0..3 {
            let link = run.trajectories.link(index, 0).unwrap();
            assert_eq!(link.displacement, [1.0, 0.0, 0.0]);
        }
    }
}

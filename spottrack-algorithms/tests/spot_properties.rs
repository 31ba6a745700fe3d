#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
use approx::assert_relative_eq;
use spottrack_algorithms::{ExtractorConfig, LinkerConfig, SpotExtractor, TrajectoryLinker};
use spottrack_core::{SpotSeries, StackDims, ThresholdSpec, VolumeStack};

fn literal_extractor(threshold: i32, min_volume: usize) -> SpotExtractor {
    SpotExtractor::new(ExtractorConfig {
        threshold: ThresholdSpec::Literal(threshold),
        min_volume,
        ..ExtractorConfig::default()
    })
}

fn fill_block(stack: &mut VolumeStack, min: [usize; 3], max: [usize; 3], value: i16) {
    for z in min[2]..=max[2] {
        for y in min[1]..=max[1] {
            for x in min[0]..=max[0] {
                stack.set(x, y, z, 0, value);
            }
        }
    }
}

#[test]
fn test_single_block_is_one_spot() {
    let mut stack = VolumeStack::zeroed(StackDims::new(20, 16, 8, 1), 0).unwrap();
    // Background exactly at threshold never joins
    fill_block(&mut stack, [0, 0, 0], [19, 15, 7], 50);
    fill_block(&mut stack, [3, 4, 2], [9, 7, 5], 51);

    let collection = literal_extractor(50, 1).extract(&mut stack).unwrap();
    assert_eq!(collection.len(), 1);
    let spot = &collection.spots[0];
    assert_eq!(spot.volume, 7 * 4 * 4);
    assert_eq!(spot.bounds.min, [3, 4, 2]);
    assert_eq!(spot.bounds.max, [9, 7, 5]);
    assert_relative_eq!(spot.center[0], 6.0);
    assert_relative_eq!(spot.center[1], 5.5);
    assert_relative_eq!(spot.center[2], 3.5);
}

#[test]
fn test_two_disjoint_blocks_do_not_merge() {
    let mut stack = VolumeStack::zeroed(StackDims::new(16, 16, 6, 1), 0).unwrap();
    fill_block(&mut stack, [1, 1, 1], [3, 3, 3], 300);
    fill_block(&mut stack, [5, 1, 1], [7, 3, 3], 300);

    let collection = literal_extractor(100, 1).extract(&mut stack).unwrap();
    assert_eq!(collection.len(), 2);
    for spot in &collection.spots {
        assert_eq!(spot.volume, 27);
    }
    assert_eq!(collection.spots[0].bounds.min, [1, 1, 1]);
    assert_eq!(collection.spots[1].bounds.min, [5, 1, 1]);
}

#[test]
fn test_uniform_spot_centroid_equals_center() {
    let mut stack = VolumeStack::zeroed(StackDims::new(10, 10, 4, 1), 0).unwrap();
    fill_block(&mut stack, [2, 3, 0], [6, 4, 2], 77);
    let collection = literal_extractor(10, 1).extract(&mut stack).unwrap();
    let spot = &collection.spots[0];
    for axis in 0..3 {
        assert_relative_eq!(spot.centroid()[axis], spot.center[axis], epsilon = 1e-9);
    }
}

#[test]
fn test_coordinates_stay_in_bounds() {
    let dims = StackDims::new(7, 5, 3, 1);
    let mut stack = VolumeStack::zeroed(dims, 0).unwrap();
    // Irregular pattern touching every face
    for (i, sample) in stack.pixels_mut().iter_mut().enumerate() {
        *sample = if (i * 7919) % 3 == 0 { 90 } else { 0 };
    }
    let collection = literal_extractor(10, 1).extract(&mut stack).unwrap();
    assert!(!collection.is_empty());
    for spot in &collection.spots {
        assert!(spot.bounds.max[0] < dims.cols);
        assert!(spot.bounds.max[1] < dims.rows);
        assert!(spot.bounds.max[2] < dims.num_z);
        assert!(spot.bounds.min[0] <= spot.bounds.max[0]);
    }
    let total: usize = collection.spots.iter().map(|s| s.volume).sum();
    assert_eq!(total, stack.pixels().len().div_ceil(3));
}

#[test]
fn test_minimum_volume_never_reported() {
    let mut stack = VolumeStack::zeroed(StackDims::new(12, 12, 3, 1), 0).unwrap();
    fill_block(&mut stack, [0, 0, 0], [0, 0, 0], 99);
    fill_block(&mut stack, [4, 4, 0], [5, 5, 0], 99);
    fill_block(&mut stack, [8, 8, 0], [10, 10, 2], 99);
    let collection = literal_extractor(10, 5).extract(&mut stack).unwrap();
    assert_eq!(collection.len(), 1);
    assert!(collection.spots.iter().all(|s| s.volume >= 5));
}

#[test]
fn test_four_cube_end_to_end() {
    let mut stack = VolumeStack::zeroed(StackDims::new(4, 4, 4, 1), 0).unwrap();
    stack.set(2, 2, 0, 0, 100);
    let collection = literal_extractor(50, 1).extract(&mut stack).unwrap();
    assert_eq!(collection.len(), 1);
    let spot = &collection.spots[0];
    assert_eq!(spot.volume, 1);
    assert_eq!(spot.bounds.min, [2, 2, 0]);
    assert_eq!(spot.bounds.max, [2, 2, 0]);
    assert_relative_eq!(spot.mean_intensity(), 100.0);
}

#[test]
fn test_million_voxel_component() {
    let dims = StackDims::new(100, 100, 100, 1);
    let mut stack = VolumeStack::zeroed(dims, 0).unwrap();
    stack.pixels_mut().fill(1000);
    let collection = literal_extractor(10, 1).extract(&mut stack).unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.spots[0].volume, 1_000_000);
}

#[test]
fn test_linked_displacement_is_exact() {
    let dims = StackDims::new(16, 16, 4, 1);
    let mut series = SpotSeries::new();
    for (t, origin) in [[2usize, 3, 0], [5, 1, 2]].into_iter().enumerate() {
        let mut stack = VolumeStack::zeroed(dims, t).unwrap();
        let max = [origin[0] + 1, origin[1] + 1, origin[2] + 1];
        fill_block(&mut stack, origin, max, 400);
        series
            .push(literal_extractor(100, 1).extract(&mut stack).unwrap())
            .unwrap();
    }
    let linker = TrajectoryLinker::new(LinkerConfig {
        intensity_weight: 2.0,
        ..LinkerConfig::default()
    });
    let trajectories = linker.link(&series);
    let link = trajectories.link(0, 0).unwrap();
    assert_eq!(link.displacement, [3.0, -2.0, 2.0]);
    assert_relative_eq!(link.score, link.distance);
    assert_eq!(trajectories.trajectory_id(1, 0), Some(1));
}

//! Spot and trajectory reports.
//!
//! Three layouts are supported:
//!
//! - **Time series**: one tab-separated row per timepoint. Timepoint-level
//!   values come first, then one group of cells per trajectory started at the
//!   first timepoint, following the trajectory's chain of spots.
//! - **Database**: one tab-separated row per spot per timepoint, including
//!   spots that belong to no trajectory.
//! - **JSON**: the complete result as a single document.

use crate::pipeline::TrackedFile;
use crate::{Error, Result};
use serde::Serialize;
use spottrack_algorithms::{SpotLink, TrajectorySummary};
use spottrack_core::{Spot, SpotCollection, WaveSelector, WaveStats};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// A report column as selected by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    /// Voxel count.
    Volume,
    /// Intensity-weighted centroid `x, y, z`.
    Centroid(WaveSelector),
    /// Integrated intensity.
    Integral(WaveSelector),
    /// Mean intensity.
    Mean(WaveSelector),
    /// Geometric mean intensity.
    GeoMean(WaveSelector),
    /// Intensity standard deviation.
    Sigma(WaveSelector),
    /// Spot mean in standard deviations above the stack mean.
    MeanSigmas(WaveSelector),
    /// Spot geometric mean in standard deviations above the stack geometric mean.
    GeoMeanSigmas(WaveSelector),
    /// Unweighted center of volume `x, y, z`.
    CenterOfVolume,
    /// Displacement to the next timepoint, in voxels.
    Displacement,
    /// Physical distance to the next timepoint.
    StepDistance,
    /// Mean step distance of the spot's trajectory.
    TrajectoryMean,
    /// Standard deviation of the step distances of the spot's trajectory.
    TrajectorySigma,
    /// Timepoint, plus elapsed seconds when the file records them.
    Time,
    /// Threshold used at the timepoint.
    Threshold,
    /// Spot id.
    SpotId,
    /// Trajectory id.
    TrajectoryId,
}

impl Column {
    /// Columns reported when none are chosen.
    #[must_use]
    pub fn defaults(detection: WaveSelector) -> Vec<Self> {
        vec![
            Self::SpotId,
            Self::TrajectoryId,
            Self::Time,
            Self::Volume,
            Self::Centroid(detection),
            Self::Integral(detection),
        ]
    }

    /// Whether the short column `name` needs a wavelength.
    #[must_use]
    pub fn takes_wave(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "c" | "i" | "m" | "g" | "sd" | "ms" | "gs"
        )
    }
}

impl FromStr for Column {
    type Err = Error;

    /// Parses a short column name, with `=<wave>` for per-wavelength columns:
    /// `v`, `c=528`, `i=all`, `mc`, `tSD`, `tID`, ...
    fn from_str(s: &str) -> Result<Self> {
        let bad = |why: &str| Error::InvalidConfig(format!("bad column '{s}': {why}"));
        let (name, wave) = match s.split_once('=') {
            Some((name, wave)) => (name, Some(wave)),
            None => (s, None),
        };
        let name = name.trim().to_ascii_lowercase();
        if Self::takes_wave(&name) {
            let wave: WaveSelector = wave
                .ok_or_else(|| bad("missing wavelength"))?
                .parse()
                .map_err(|e: spottrack_core::Error| bad(&e.to_string()))?;
            return Ok(match name.as_str() {
                "c" => Self::Centroid(wave),
                "i" => Self::Integral(wave),
                "m" => Self::Mean(wave),
                "g" => Self::GeoMean(wave),
                "sd" => Self::Sigma(wave),
                "ms" => Self::MeanSigmas(wave),
                _ => Self::GeoMeanSigmas(wave),
            });
        }
        if wave.is_some() {
            return Err(bad("column takes no wavelength"));
        }
        match name.as_str() {
            "v" => Ok(Self::Volume),
            "mc" => Ok(Self::CenterOfVolume),
            "tv" => Ok(Self::Displacement),
            "td" => Ok(Self::StepDistance),
            "tm" => Ok(Self::TrajectoryMean),
            "tsd" => Ok(Self::TrajectorySigma),
            "tt" => Ok(Self::Time),
            "th" => Ok(Self::Threshold),
            "id" => Ok(Self::SpotId),
            "tid" => Ok(Self::TrajectoryId),
            _ => Err(bad("unknown column")),
        }
    }
}

/// Report layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// One row per timepoint.
    #[default]
    TimeSeries,
    /// One row per spot per timepoint.
    Database,
    /// A single JSON document.
    Json,
}

const AXES: [&str; 3] = ["x", "y", "z"];

/// One output cell kind, with wavelengths and axes resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Volume,
    Centroid { wave: usize, axis: usize },
    Integral(usize),
    Mean(usize),
    GeoMean(usize),
    Sigma(usize),
    MeanSigmas(usize),
    GeoMeanSigmas(usize),
    Center(usize),
    Displacement(usize),
    StepDistance,
    TrajectoryMean,
    TrajectorySigma,
    Timepoint,
    Elapsed,
    Threshold,
    SpotId,
    TrajectoryId,
}

/// Everything a cell may need about one spot.
struct SpotView<'a> {
    collection: &'a SpotCollection,
    spot: &'a Spot,
    link: Option<&'a SpotLink>,
    trajectory: Option<u32>,
    summary: Option<&'a TrajectorySummary>,
}

fn float(value: f64) -> String {
    format!("{value:.3}")
}

impl Field {
    fn is_timepoint_level(self) -> bool {
        matches!(self, Self::Timepoint | Self::Elapsed | Self::Threshold)
    }

    fn header(self, wave_ids: &[i32]) -> String {
        let wave_name = |wave: usize| match wave_ids.get(wave) {
            Some(&id) if id > 0 => id.to_string(),
            _ => format!("w{wave}"),
        };
        match self {
            Self::Volume => "volume".into(),
            Self::Centroid { wave, axis } => format!("c{}_{}", AXES[axis], wave_name(wave)),
            Self::Integral(wave) => format!("int_{}", wave_name(wave)),
            Self::Mean(wave) => format!("mean_{}", wave_name(wave)),
            Self::GeoMean(wave) => format!("gmean_{}", wave_name(wave)),
            Self::Sigma(wave) => format!("sd_{}", wave_name(wave)),
            Self::MeanSigmas(wave) => format!("ms_{}", wave_name(wave)),
            Self::GeoMeanSigmas(wave) => format!("gs_{}", wave_name(wave)),
            Self::Center(axis) => format!("m{}", AXES[axis]),
            Self::Displacement(axis) => format!("d{}", AXES[axis]),
            Self::StepDistance => "step".into(),
            Self::TrajectoryMean => "traj_mean".into(),
            Self::TrajectorySigma => "traj_sd".into(),
            Self::Timepoint => "t".into(),
            Self::Elapsed => "sec".into(),
            Self::Threshold => "threshold".into(),
            Self::SpotId => "id".into(),
            Self::TrajectoryId => "tid".into(),
        }
    }

    fn timepoint_value(self, collection: &SpotCollection) -> String {
        match self {
            Self::Timepoint => collection.timepoint.to_string(),
            Self::Elapsed => collection.elapsed_seconds.map(float).unwrap_or_default(),
            Self::Threshold => float(collection.threshold.value),
            _ => String::new(),
        }
    }

    fn spot_value(self, view: &SpotView<'_>) -> String {
        let spot = view.spot;
        let stats = &view.collection.stats;
        match self {
            Self::Volume => spot.volume.to_string(),
            Self::Centroid { wave, axis } => float(spot.waves[wave].centroid[axis]),
            Self::Integral(wave) => float(spot.waves[wave].integral),
            Self::Mean(wave) => float(spot.waves[wave].mean),
            Self::GeoMean(wave) => float(spot.waves[wave].geomean),
            Self::Sigma(wave) => float(spot.waves[wave].sigma),
            Self::MeanSigmas(wave) => stats
                .get(wave)
                .map(|s| float(s.sigmas_above_mean(spot.waves[wave].mean)))
                .unwrap_or_default(),
            Self::GeoMeanSigmas(wave) => stats
                .get(wave)
                .map(|s| float(s.sigmas_above_geomean(spot.waves[wave].geomean)))
                .unwrap_or_default(),
            Self::Center(axis) => float(spot.center[axis]),
            Self::Displacement(axis) => view
                .link
                .map(|link| float(link.displacement[axis]))
                .unwrap_or_default(),
            Self::StepDistance => view.link.map(|link| float(link.distance)).unwrap_or_default(),
            Self::TrajectoryMean => view
                .summary
                .map(|s| float(s.mean_step))
                .unwrap_or_default(),
            Self::TrajectorySigma => view
                .summary
                .map(|s| float(s.sigma_step))
                .unwrap_or_default(),
            Self::SpotId => spot.id.to_string(),
            Self::TrajectoryId => view.trajectory.map(|id| id.to_string()).unwrap_or_default(),
            Self::Timepoint | Self::Elapsed | Self::Threshold => {
                self.timepoint_value(view.collection)
            }
        }
    }
}

fn resolve_fields(columns: &[Column], tracked: &TrackedFile) -> Result<Vec<Field>> {
    let waves = |selector: &WaveSelector| -> Result<Vec<usize>> {
        Ok(selector.resolve(&tracked.wave_ids)?)
    };
    let has_elapsed = tracked
        .series()
        .iter()
        .any(|c| c.elapsed_seconds.is_some());

    let mut fields = Vec::new();
    for column in columns {
        match column {
            Column::Volume => fields.push(Field::Volume),
            Column::Centroid(selector) => {
                for wave in waves(selector)? {
                    fields.extend((0..3).map(|axis| Field::Centroid { wave, axis }));
                }
            }
            Column::Integral(selector) => {
                fields.extend(waves(selector)?.into_iter().map(Field::Integral));
            }
            Column::Mean(selector) => {
                fields.extend(waves(selector)?.into_iter().map(Field::Mean));
            }
            Column::GeoMean(selector) => {
                fields.extend(waves(selector)?.into_iter().map(Field::GeoMean));
            }
            Column::Sigma(selector) => {
                fields.extend(waves(selector)?.into_iter().map(Field::Sigma));
            }
            Column::MeanSigmas(selector) => {
                fields.extend(waves(selector)?.into_iter().map(Field::MeanSigmas));
            }
            Column::GeoMeanSigmas(selector) => {
                fields.extend(waves(selector)?.into_iter().map(Field::GeoMeanSigmas));
            }
            Column::CenterOfVolume => fields.extend((0..3).map(Field::Center)),
            Column::Displacement => fields.extend((0..3).map(Field::Displacement)),
            Column::StepDistance => fields.push(Field::StepDistance),
            Column::TrajectoryMean => fields.push(Field::TrajectoryMean),
            Column::TrajectorySigma => fields.push(Field::TrajectorySigma),
            Column::Time => {
                fields.push(Field::Timepoint);
                if has_elapsed {
                    fields.push(Field::Elapsed);
                }
            }
            Column::Threshold => fields.push(Field::Threshold),
            Column::SpotId => fields.push(Field::SpotId),
            Column::TrajectoryId => fields.push(Field::TrajectoryId),
        }
    }
    if fields.is_empty() {
        return Err(Error::InvalidConfig("no report columns selected".into()));
    }
    Ok(fields)
}

fn view<'a>(
    tracked: &'a TrackedFile,
    summaries: &'a [TrajectorySummary],
    index: usize,
    spot_index: usize,
) -> Option<SpotView<'a>> {
    let trajectories = &tracked.run.trajectories;
    let collection = tracked.series().get(index)?;
    let spot = collection.spots.get(spot_index)?;
    let trajectory = trajectories.trajectory_id(index, spot_index);
    Some(SpotView {
        collection,
        spot,
        link: trajectories.link(index, spot_index),
        trajectory,
        summary: trajectory.and_then(|id| summaries.get((id as usize).checked_sub(1)?)),
    })
}

#[derive(Serialize)]
struct JsonLink {
    target_id: u32,
    displacement: [f64; 3],
    distance: f64,
    score: f64,
}

#[derive(Serialize)]
struct JsonSpot<'a> {
    trajectory_id: Option<u32>,
    link: Option<JsonLink>,
    #[serde(flatten)]
    spot: &'a Spot,
}

#[derive(Serialize)]
struct JsonTimepoint<'a> {
    timepoint: usize,
    elapsed_seconds: Option<f64>,
    threshold: f64,
    stats: &'a [WaveStats],
    spots: Vec<JsonSpot<'a>>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    wave_ids: &'a [i32],
    detection_wave: usize,
    voxel_size: [f64; 3],
    trajectories: &'a [TrajectorySummary],
    timepoints: Vec<JsonTimepoint<'a>>,
}

/// Writer for tracking reports.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    columns: Vec<Column>,
}

impl ReportWriter<BufWriter<File>> {
    /// Creates a report file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportWriter<W> {
    /// Wraps a writer. Defaults to the time-series layout with default columns.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            format: ReportFormat::default(),
            columns: Vec::new(),
        }
    }

    /// Sets the layout.
    #[must_use]
    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the columns. An empty list selects the defaults.
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes the report for a tracked file.
    ///
    /// # Errors
    /// Returns an error if a column names a missing wavelength or writing fails.
    pub fn write(&mut self, tracked: &TrackedFile) -> Result<()> {
        let columns = if self.columns.is_empty() {
            let selector = match tracked.wave_ids.get(tracked.wave) {
                Some(&id) if id > 0 => WaveSelector::Value(id),
                _ => WaveSelector::Value(i32::try_from(tracked.wave).unwrap_or_default()),
            };
            Column::defaults(selector)
        } else {
            self.columns.clone()
        };
        let summaries = tracked.run.trajectories.summaries();
        match self.format {
            ReportFormat::TimeSeries => {
                let fields = resolve_fields(&columns, tracked)?;
                self.write_time_series(tracked, &fields, &summaries)?;
            }
            ReportFormat::Database => {
                let fields = resolve_fields(&columns, tracked)?;
                self.write_database(tracked, &fields, &summaries)?;
            }
            ReportFormat::Json => self.write_json(tracked, &summaries)?,
        }
        self.writer.flush()?;
        Ok(())
    }

    fn write_row(&mut self, cells: &[String]) -> Result<()> {
        writeln!(self.writer, "{}", cells.join("\t"))?;
        Ok(())
    }

    fn write_time_series(
        &mut self,
        tracked: &TrackedFile,
        fields: &[Field],
        summaries: &[TrajectorySummary],
    ) -> Result<()> {
        let (timepoint_fields, spot_fields): (Vec<Field>, Vec<Field>) =
            fields.iter().copied().partition(|f| f.is_timepoint_level());
        let trajectories = &tracked.run.trajectories;
        let chains: Vec<Vec<usize>> = summaries.iter().map(|s| trajectories.chain(s.id)).collect();

        let mut header: Vec<String> = timepoint_fields
            .iter()
            .map(|f| f.header(&tracked.wave_ids))
            .collect();
        for summary in summaries {
            header.extend(
                spot_fields
                    .iter()
                    .map(|f| format!("{}.{}", f.header(&tracked.wave_ids), summary.id)),
            );
        }
        self.write_row(&header)?;

        for (index, collection) in tracked.series().iter().enumerate() {
            let mut cells: Vec<String> = timepoint_fields
                .iter()
                .map(|f| f.timepoint_value(collection))
                .collect();
            for chain in &chains {
                match chain.get(index).and_then(|&spot| view(tracked, summaries, index, spot)) {
                    Some(spot) => cells.extend(spot_fields.iter().map(|f| f.spot_value(&spot))),
                    None => cells.resize(cells.len() + spot_fields.len(), String::new()),
                }
            }
            self.write_row(&cells)?;
        }
        Ok(())
    }

    fn write_database(
        &mut self,
        tracked: &TrackedFile,
        fields: &[Field],
        summaries: &[TrajectorySummary],
    ) -> Result<()> {
        let header: Vec<String> = fields.iter().map(|f| f.header(&tracked.wave_ids)).collect();
        self.write_row(&header)?;
        for (index, collection) in tracked.series().iter().enumerate() {
            for spot_index in 0..collection.len() {
                if let Some(spot) = view(tracked, summaries, index, spot_index) {
                    let cells: Vec<String> = fields.iter().map(|f| f.spot_value(&spot)).collect();
                    self.write_row(&cells)?;
                }
            }
        }
        Ok(())
    }

    fn write_json(&mut self, tracked: &TrackedFile, summaries: &[TrajectorySummary]) -> Result<()> {
        let series = tracked.series();
        let trajectories = &tracked.run.trajectories;
        let timepoints = series
            .iter()
            .enumerate()
            .map(|(index, collection)| JsonTimepoint {
                timepoint: collection.timepoint,
                elapsed_seconds: collection.elapsed_seconds,
                threshold: collection.threshold.value,
                stats: &collection.stats,
                spots: collection
                    .spots
                    .iter()
                    .enumerate()
                    .map(|(spot_index, spot)| JsonSpot {
                        trajectory_id: trajectories.trajectory_id(index, spot_index),
                        link: trajectories.link(index, spot_index).and_then(|link| {
                            Some(JsonLink {
                                target_id: series.spot(index + 1, link.target)?.id,
                                displacement: link.displacement,
                                distance: link.distance,
                                score: link.score,
                            })
                        }),
                        spot,
                    })
                    .collect(),
            })
            .collect();
        let report = JsonReport {
            wave_ids: &tracked.wave_ids,
            detection_wave: tracked.wave,
            voxel_size: tracked.voxel_size,
            trajectories: summaries,
            timepoints,
        };
        serde_json::to_writer_pretty(&mut self.writer, &report)?;
        writeln!(self.writer)?;
        Ok(())
    }
}

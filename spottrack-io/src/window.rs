//! How many timepoints are held in memory at once.
//!
//! Timepoints are independent until linking, so a window of them can be loaded
//! and extracted in parallel. A timepoint costs its decoded pixels plus the
//! flood-fill work stack and spot table, so the window is the memory budget
//! divided by that per-timepoint cost. The size only batches work; it never
//! changes the spots found.

use crate::{Error, Result};
use log::warn;
use sysinfo::System;

/// Per-timepoint memory relative to the decoded pixels.
const STACK_FOOTPRINT: f64 = 1.2;

/// Sizing of the timepoint window.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionWindow {
    /// Share of currently available memory the window may use, in `(0, 1]`.
    pub memory_fraction: f64,
    /// Fixed budget in bytes; takes precedence over `memory_fraction`.
    pub memory_budget_bytes: Option<usize>,
    /// Worker threads. Also caps the window size when set.
    pub parallelism: Option<usize>,
}

impl Default for ExtractionWindow {
    fn default() -> Self {
        Self {
            memory_fraction: 0.5,
            memory_budget_bytes: None,
            parallelism: None,
        }
    }
}

/// Bytes one timepoint occupies while it is being extracted.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn timepoint_cost(stack_bytes: usize) -> usize {
    ((stack_bytes as f64 * STACK_FOOTPRINT).ceil() as usize).max(1)
}

impl ExtractionWindow {
    /// Uses `fraction` of available memory.
    #[must_use]
    pub fn with_memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    /// Uses a fixed budget of `bytes`.
    #[must_use]
    pub fn with_memory_budget_bytes(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    /// Runs on `threads` workers (at least one).
    #[must_use]
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads.max(1));
        self
    }

    /// Memory the window may fill, in bytes, or `None` when the system does
    /// not report its available memory.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for a fraction outside `(0, 1]`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn resolve_budget_bytes(&self) -> Result<Option<usize>> {
        if let Some(fixed) = self.memory_budget_bytes {
            return Ok(Some(fixed));
        }
        let fraction = self.memory_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "memory fraction {fraction} is outside (0, 1]"
            )));
        }
        let mut sys = System::new();
        sys.refresh_memory();
        match sys.available_memory() {
            0 => Ok(None),
            free => Ok(Some(
                usize::try_from((free as f64 * fraction) as u64).unwrap_or(usize::MAX),
            )),
        }
    }

    /// Timepoints per window for stacks of `stack_bytes` each. At least 1.
    ///
    /// Without a usable budget the window holds one timepoint per worker.
    ///
    /// # Errors
    /// Returns an error if the memory fraction is invalid.
    pub fn timepoints_per_window(&self, stack_bytes: usize) -> Result<usize> {
        let budget = self.resolve_budget_bytes()?;
        if budget.is_none() {
            warn!("available memory unknown; sizing the window by worker count");
        }
        Ok(self.window_for_budget(budget, stack_bytes))
    }

    fn window_for_budget(&self, budget: Option<usize>, stack_bytes: usize) -> usize {
        let workers = self
            .parallelism
            .unwrap_or_else(rayon::current_num_threads)
            .max(1);
        match budget {
            Some(bytes) => {
                let fits = (bytes / timepoint_cost(stack_bytes)).max(1);
                self.parallelism.map_or(fits, |_| fits.min(workers))
            }
            None => workers,
        }
    }
}

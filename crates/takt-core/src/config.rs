//! Scheduler configuration.
//!
//! One immutable [`SchedulerConfig`] value is plumbed through the whole
//! pipeline; nothing reads ambient state. The CLI can deserialize it from a
//! TOML file, all fields defaulting to the stock shop profile (08:00-16:30
//! shift, 600 s solve budget, gravity on).

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// Weights of the objective terms, highest priority first. The defaults make
/// due-dates dominate by two orders of magnitude, with changeover grouping,
/// makespan, load balance and peak load as successively milder terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub lateness: i64,
    pub changeover: i64,
    pub makespan: i64,
    pub load_range: i64,
    pub max_load: i64,
    /// Pull-left tie-break; only charged when the gravity strategy is enabled
    pub gravity: i64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            lateness: 10_000,
            changeover: 500,
            makespan: 100,
            load_range: 50,
            max_load: 1,
            gravity: 1,
        }
    }
}

/// Immutable configuration for one scheduling run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Hour the default shift starts (also the default shift-start used for
    /// days without an assigned shift)
    pub shift_start_hour: u32,
    pub shift_start_min: u32,
    pub shift_end_hour: u32,
    pub shift_end_min: u32,
    /// Hard wall-clock bound on the solve; the best incumbent is returned on
    /// expiry
    pub solver_time_limit_seconds: u64,
    /// Requested portfolio width. Recorded in the run summary; the bundled
    /// solver searches single-threaded (see DESIGN.md)
    pub num_search_workers: u32,
    /// Pull all start times toward zero as a tie-break
    pub enable_gravity_strategy: bool,
    /// Calendar look-ahead used for horizon selection
    pub planning_days: u32,
    pub objective_weights: ObjectiveWeights,
    /// Pin the recorded worker count to 1 for bit-reproducible runs
    pub deterministic: bool,
    /// Bound on the materialisation day-walk before `CalendarOverflow`
    pub calendar_horizon_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shift_start_hour: 8,
            shift_start_min: 0,
            shift_end_hour: 16,
            shift_end_min: 30,
            solver_time_limit_seconds: 600,
            num_search_workers: 8,
            enable_gravity_strategy: true,
            planning_days: 90,
            objective_weights: ObjectiveWeights::default(),
            deterministic: false,
            calendar_horizon_days: 730,
        }
    }
}

impl SchedulerConfig {
    /// Parse a TOML configuration document. Absent keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ScheduleError> {
        toml::from_str(text).map_err(|e| ScheduleError::InputInconsistent {
            record: "config".into(),
            detail: e.to_string(),
        })
    }

    /// Minutes from midnight at which the default shift starts.
    pub fn shift_start_minutes(&self) -> i64 {
        i64::from(self.shift_start_hour) * 60 + i64::from(self.shift_start_min)
    }

    /// Length of the uniform shift used on the solver time axis.
    pub fn shift_duration_minutes(&self) -> i64 {
        let end = i64::from(self.shift_end_hour) * 60 + i64::from(self.shift_end_min);
        end - self.shift_start_minutes()
    }

    /// Worker count actually recorded for the run.
    pub fn effective_workers(&self) -> u32 {
        if self.deterministic {
            1
        } else {
            self.num_search_workers
        }
    }
}

//! Result types of one scheduling run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{OperationId, ResourceGroupId, ResourceId};

/// Sentinel order number marking setup blocks on the rendered timeline.
pub const CHANGEOVER_ORDER_NO: &str = "CHANGEOVER";

/// How the solve ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Proven optimal under the objective
    Optimal,
    /// Best incumbent when the wall-clock budget expired
    Feasible,
}

/// One scheduled operation, materialised to wall-clock time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledOperation {
    pub operation_id: OperationId,
    pub order_no: String,
    pub op_no: i64,
    pub operation_name: String,
    pub quantity: i64,
    pub resource_id: ResourceId,
    pub resource_group_id: ResourceGroupId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Interval length in days of solver time (1 day = 1440 minutes)
    pub duration_days: f64,
    /// True sequence-dependent setup ahead of this operation, in days;
    /// recomputed from resource adjacency after the solve
    pub setup_time_days: f64,
    pub due_date: Option<NaiveDateTime>,
    pub is_late: bool,
    pub order_start: NaiveDateTime,
    pub order_end: NaiveDateTime,
    pub belongs_to_order_no: Option<String>,
    pub part_no: Option<String>,
    pub product: Option<String>,
    /// Setup ahead of this operation in minutes (same fact as
    /// `setup_time_days`, in sink-friendly units)
    pub changeover_minutes: i64,
    /// Solver-axis interval, kept for validation and tests
    pub solver_start: i64,
    pub solver_end: i64,
}

/// One bar on the rendered timeline. Operations appear once each; a
/// non-zero setup additionally appears as a block with
/// `order_no == CHANGEOVER_ORDER_NO` occupying the gap ahead of its
/// operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub order_no: String,
    pub op_no: i64,
    pub op_name: String,
    pub resource_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_late: bool,
    /// Grouping key for bar colouring (the order number)
    pub color_key: String,
    pub changeover_minutes: i64,
}

/// Load report entry for one machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceLoad {
    pub resource_id: ResourceId,
    pub name: String,
    pub load_minutes: i64,
    /// Share of the makespan this machine spent working
    pub utilisation_pct: f64,
}

/// Headline numbers of one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: SolveStatus,
    pub wall_time_seconds: f64,
    pub total_lateness_minutes: i64,
    pub makespan_minutes: i64,
    pub total_changeover_minutes: i64,
    /// Operations whose materialised span touches a non-working day of
    /// their machine (the uniform-axis approximation leaking through);
    /// flagged, never fatal
    pub calendar_violations: usize,
    pub search_workers: u32,
}

/// Everything one run produces.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolvedSchedule {
    pub operations: Vec<ScheduledOperation>,
    pub timeline: Vec<TimelineRecord>,
    pub loads: Vec<ResourceLoad>,
    pub summary: RunSummary,
    /// Active operations the model could not place on any machine
    /// (capability class without members); the sink flags these
    pub unscheduled: Vec<OperationId>,
}

impl SolvedSchedule {
    /// Operations of one order, as scheduled.
    pub fn order_operations(&self, order_no: &str) -> Vec<&ScheduledOperation> {
        self.operations
            .iter()
            .filter(|op| op.order_no == order_no)
            .collect()
    }

    /// The scheduled operation for an operation id, if it was placed.
    pub fn operation(&self, id: OperationId) -> Option<&ScheduledOperation> {
        self.operations.iter().find(|op| op.operation_id == id)
    }
}

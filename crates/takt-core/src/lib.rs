//! # takt-core
//!
//! Core domain model and traits for the takt production scheduling engine.
//!
//! This crate provides:
//! - Domain types: `Operation`, `BomLink`, `Resource`, `WeekSchedule`, `Shift`,
//!   changeover matrices and the `Dataset` that owns them
//! - Derived indexes: [`index::PlanIndex`]
//! - Working-time arithmetic: [`calendar::WorkingCalendar`]
//! - Configuration: [`config::SchedulerConfig`]
//! - Core traits: `DatasetSource`, `ScheduleSink`, `TimelineRenderer`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use takt_core::{Dataset, Operation, Resource, ResourceGroup, GroupMember};
//!
//! let mut dataset = Dataset::default();
//! dataset.resource_groups.push(ResourceGroup { resource_group_id: 1, name: "Lathes".into() });
//! dataset.resources.push(Resource::new(10, "Lathe-1").in_schedule(None));
//! dataset.group_members.push(GroupMember { resource_group_id: 1, resource_id: 10 });
//! dataset.operations.push(Operation::new(100, "WO-1001", 1, "Turning").process_days(0.5));
//! let index = dataset.index().unwrap();
//! assert_eq!(index.group_to_resources[&1], vec![10]);
//! ```

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub mod calendar;
pub mod config;
pub mod error;
pub mod index;
pub mod schedule;

pub use calendar::{UniformCalendar, WorkingCalendar};
pub use config::{ObjectiveWeights, SchedulerConfig};
pub use error::{RenderError, ScheduleError};
pub use index::PlanIndex;
pub use schedule::{
    ResourceLoad, RunSummary, ScheduledOperation, SolveStatus, SolvedSchedule, TimelineRecord,
    CHANGEOVER_ORDER_NO,
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for an operation record
pub type OperationId = i64;

/// Unique identifier for a resource (machine)
pub type ResourceId = i64;

/// Unique identifier for a resource group (capability class)
pub type ResourceGroupId = i64;

/// Unique identifier for a changeover group
pub type ChangeoverGroupId = i64;

/// Unique identifier for a categorical attribute
pub type AttributeId = i64;

/// Unique identifier for one value in an attribute's domain
pub type ParamId = i64;

/// Unique identifier for a week schedule
pub type ScheduleId = i64;

/// Unique identifier for a shift
pub type ShiftId = i64;

/// Unique identifier for a break
pub type BreakId = i64;

// ============================================================================
// Orders and operations
// ============================================================================

/// One step of one manufacturing order.
///
/// `(order_no, op_no)` is unique across the dataset; operations of the same
/// order are sequenced by ascending `op_no`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: OperationId,
    pub order_no: String,
    /// Ordinal of this step within its order
    #[serde(default)]
    pub op_no: i64,
    pub operation_name: String,
    /// Capability class that can perform this step
    pub resource_group_id: ResourceGroupId,
    #[serde(default)]
    pub quantity: i64,
    /// Net processing time in days (1 day = 1440 working minutes)
    #[serde(default)]
    pub process_time_days: f64,
    /// Standalone setup time in days, reserved (changeovers are
    /// sequence-dependent and derived separately)
    #[serde(default)]
    pub setup_time_days: f64,
    #[serde(default)]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub earliest_start_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub belongs_to_order_no: Option<String>,
    #[serde(default)]
    pub part_no: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

impl Operation {
    /// Create an operation with the given identity and capability group.
    pub fn new(
        operation_id: OperationId,
        order_no: impl Into<String>,
        resource_group_id: ResourceGroupId,
        operation_name: impl Into<String>,
    ) -> Self {
        Self {
            operation_id,
            order_no: order_no.into(),
            op_no: 0,
            operation_name: operation_name.into(),
            resource_group_id,
            quantity: 0,
            process_time_days: 0.0,
            setup_time_days: 0.0,
            due_date: None,
            earliest_start_date: None,
            belongs_to_order_no: None,
            part_no: None,
            product: None,
        }
    }

    pub fn op_no(mut self, op_no: i64) -> Self {
        self.op_no = op_no;
        self
    }

    pub fn resource_group(mut self, group: ResourceGroupId) -> Self {
        self.resource_group_id = group;
        self
    }

    pub fn process_days(mut self, days: f64) -> Self {
        self.process_time_days = days;
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn due(mut self, due: NaiveDateTime) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn earliest_start(mut self, date: NaiveDateTime) -> Self {
        self.earliest_start_date = Some(date);
        self
    }

    pub fn part(mut self, part_no: impl Into<String>) -> Self {
        self.part_no = Some(part_no.into());
        self
    }
}

/// Declares that producing `order_part_no` of `order_no` consumes
/// `required_part_no`. Consumed only to derive inter-order precedences.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BomLink {
    pub bom_id: i64,
    /// Parent order that consumes the required part
    pub order_no: String,
    /// Part produced by the parent order, if it produces one
    #[serde(default)]
    pub order_part_no: Option<String>,
    #[serde(default)]
    pub op_no: Option<i64>,
    #[serde(default)]
    pub required_part_no: Option<String>,
    #[serde(default)]
    pub required_quantity: f64,
}

// ============================================================================
// Resources
// ============================================================================

/// A machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: ResourceId,
    pub name: String,
    /// Setup-cost regime this machine belongs to; absent means changeovers
    /// on this machine are free
    #[serde(default)]
    pub changeover_group_id: Option<ChangeoverGroupId>,
    /// Setups on this machine can run concurrently: the longest contribution
    /// dominates instead of the sum
    #[serde(default)]
    pub accumulative: bool,
    /// Week schedule governing working time; absent means no working time
    #[serde(default)]
    pub schedule_id: Option<ScheduleId>,
}

impl Resource {
    pub fn new(resource_id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            resource_id,
            name: name.into(),
            changeover_group_id: None,
            accumulative: false,
            schedule_id: None,
        }
    }

    pub fn changeover_group(mut self, group: ChangeoverGroupId) -> Self {
        self.changeover_group_id = Some(group);
        self
    }

    pub fn accumulative(mut self) -> Self {
        self.accumulative = true;
        self
    }

    pub fn in_schedule(mut self, schedule_id: Option<ScheduleId>) -> Self {
        self.schedule_id = schedule_id;
        self
    }
}

/// A capability class. Membership is many-to-many via [`GroupMember`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub resource_group_id: ResourceGroupId,
    pub name: String,
}

/// One resource belonging to one resource group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupMember {
    pub resource_group_id: ResourceGroupId,
    pub resource_id: ResourceId,
}

// ============================================================================
// Attributes and changeovers
// ============================================================================

/// A categorical dimension (colour, material, mold, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_id: AttributeId,
    pub name: String,
}

/// One value in an attribute's domain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeParam {
    pub param_id: ParamId,
    pub attribute_id: AttributeId,
    pub value: String,
}

/// The value an operation carries for one attribute.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationAttribute {
    pub operation_id: OperationId,
    pub attribute_id: AttributeId,
    pub param_id: ParamId,
}

/// A family of resources sharing a setup-cost regime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeoverGroup {
    pub changeover_group_id: ChangeoverGroupId,
    pub name: String,
}

/// Setup minutes for switching one attribute from one value to another on a
/// changeover group. Asymmetric: `(from, to)` and `(to, from)` are distinct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeoverMatrixEntry {
    pub changeover_group_id: ChangeoverGroupId,
    pub attribute_id: AttributeId,
    pub from_param_id: ParamId,
    pub to_param_id: ParamId,
    pub setup_minutes: i64,
}

/// Fallback setup minutes for an attribute when a specific value pair is not
/// in the matrix.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeoverStandard {
    pub changeover_group_id: ChangeoverGroupId,
    pub attribute_id: AttributeId,
    pub setup_minutes: i64,
}

// ============================================================================
// Working time
// ============================================================================

/// Weekly working pattern: one optional shift per weekday, Monday first.
/// An absent entry is a non-working day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub schedule_id: ScheduleId,
    pub name: String,
    /// Monday..Sunday
    pub days: [Option<ShiftId>; 7],
}

/// A shift. `end` earlier than `start` means the shift crosses midnight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shift {
    pub shift_id: ShiftId,
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A pause inside a shift. Same midnight-wraparound rule as [`Shift`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftBreak {
    pub break_id: BreakId,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// One break attached to one shift (many-to-many).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BreakAssignment {
    pub shift_id: ShiftId,
    pub break_id: BreakId,
}

// ============================================================================
// Dataset
// ============================================================================

/// The full relational input to one scheduling run. Immutable once loaded;
/// all derived lookups live in [`PlanIndex`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub bom: Vec<BomLink>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroup>,
    #[serde(default)]
    pub group_members: Vec<GroupMember>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub attribute_params: Vec<AttributeParam>,
    #[serde(default)]
    pub operation_attributes: Vec<OperationAttribute>,
    #[serde(default)]
    pub changeover_groups: Vec<ChangeoverGroup>,
    #[serde(default)]
    pub changeover_matrix: Vec<ChangeoverMatrixEntry>,
    #[serde(default)]
    pub changeover_standards: Vec<ChangeoverStandard>,
    #[serde(default)]
    pub schedules: Vec<WeekSchedule>,
    #[serde(default)]
    pub shifts: Vec<Shift>,
    #[serde(default)]
    pub breaks: Vec<ShiftBreak>,
    #[serde(default)]
    pub shift_breaks: Vec<BreakAssignment>,
}

impl Dataset {
    /// Build the derived indexes, validating referential integrity on the way.
    pub fn index(&self) -> Result<PlanIndex, ScheduleError> {
        PlanIndex::build(self)
    }

    /// Look up a resource by id.
    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.resource_id == id)
    }

    /// Look up an operation by id.
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.iter().find(|o| o.operation_id == id)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Supplies the typed record streams for one scheduling run.
pub trait DatasetSource {
    /// Read and validate the dataset. Connection-style failures map to
    /// `ScheduleError::InputUnavailable`, malformed content to
    /// `ScheduleError::InputInconsistent`.
    fn load(&self) -> Result<Dataset, ScheduleError>;
}

/// Receives the solved schedule. Implementations must leave no partial
/// output behind on failure.
pub trait ScheduleSink {
    fn write(&mut self, schedule: &SolvedSchedule) -> Result<(), ScheduleError>;
}

/// Renders the flat timeline (operations plus changeover blocks).
pub trait TimelineRenderer {
    type Output;

    fn render(&self, timeline: &[TimelineRecord]) -> Result<Self::Output, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_builder() {
        let op = Operation::new(7, "WO-1", 3, "Milling")
            .op_no(20)
            .process_days(0.25)
            .quantity(40)
            .part("GEAR-7");

        assert_eq!(op.operation_id, 7);
        assert_eq!(op.order_no, "WO-1");
        assert_eq!(op.op_no, 20);
        assert_eq!(op.resource_group_id, 3);
        assert_eq!(op.process_time_days, 0.25);
        assert_eq!(op.part_no.as_deref(), Some("GEAR-7"));
        assert!(op.due_date.is_none());
    }

    #[test]
    fn resource_builder() {
        let res = Resource::new(4, "Press-2")
            .changeover_group(9)
            .accumulative()
            .in_schedule(Some(2));

        assert_eq!(res.resource_id, 4);
        assert_eq!(res.changeover_group_id, Some(9));
        assert!(res.accumulative);
        assert_eq!(res.schedule_id, Some(2));
    }

    #[test]
    fn dataset_lookups() {
        let mut ds = Dataset::default();
        ds.resources.push(Resource::new(1, "Saw"));
        ds.operations.push(Operation::new(11, "WO-2", 1, "Cutting"));

        assert_eq!(ds.resource(1).map(|r| r.name.as_str()), Some("Saw"));
        assert!(ds.resource(2).is_none());
        assert_eq!(ds.operation(11).map(|o| o.order_no.as_str()), Some("WO-2"));
    }
}

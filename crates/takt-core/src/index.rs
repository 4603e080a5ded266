//! Derived indexes over a [`Dataset`].
//!
//! Built once after input loading and immutable from then on. Ordered maps
//! keep iteration stable across runs so identical inputs produce identical
//! models. Validation happens here: every cross-entity reference must
//! resolve, `(order_no, op_no)` must be unique and process times must be
//! non-negative; the first violation is reported naming the offending
//! record.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ScheduleError;
use crate::{AttributeId, Dataset, OperationId, ParamId, ResourceGroupId, ResourceId};

/// Lookup structures the rest of the pipeline works from.
#[derive(Clone, Debug, Default)]
pub struct PlanIndex {
    /// Capability class to its member machines, member lists sorted
    pub group_to_resources: BTreeMap<ResourceGroupId, Vec<ResourceId>>,
    /// Order number to its operations (positions in `Dataset::operations`),
    /// ascending `op_no`
    pub ops_by_order: BTreeMap<String, Vec<usize>>,
    /// Part number to the orders that produce it
    pub part_producers: BTreeMap<String, Vec<String>>,
    /// Order number to the position of its highest-`op_no` operation
    pub order_last_op: BTreeMap<String, usize>,
    /// Operation to its attribute values
    pub op_to_params: HashMap<OperationId, Vec<(AttributeId, ParamId)>>,
    /// Dense side table: operation id to its position in `Dataset::operations`
    pub op_index: HashMap<OperationId, usize>,
}

impl PlanIndex {
    /// Validate the dataset and build all derived lookups.
    pub fn build(ds: &Dataset) -> Result<Self, ScheduleError> {
        validate(ds)?;

        let mut index = Self::default();

        for (pos, op) in ds.operations.iter().enumerate() {
            index.op_index.insert(op.operation_id, pos);
            index
                .ops_by_order
                .entry(op.order_no.clone())
                .or_default()
                .push(pos);
        }
        for ops in index.ops_by_order.values_mut() {
            ops.sort_by_key(|&pos| (ds.operations[pos].op_no, ds.operations[pos].operation_id));
        }
        for (order_no, ops) in &index.ops_by_order {
            if let Some(&last) = ops.last() {
                index.order_last_op.insert(order_no.clone(), last);
            }
        }

        for member in &ds.group_members {
            index
                .group_to_resources
                .entry(member.resource_group_id)
                .or_default()
                .push(member.resource_id);
        }
        for members in index.group_to_resources.values_mut() {
            members.sort_unstable();
            members.dedup();
        }

        // An order produces a part when its BOM rows name one; the producer
        // is the order as a whole, fulfilled by its last operation.
        for order_no in index.ops_by_order.keys() {
            for link in &ds.bom {
                if link.order_no != *order_no {
                    continue;
                }
                let Some(part) = &link.order_part_no else {
                    continue;
                };
                let producers = index.part_producers.entry(part.clone()).or_default();
                if !producers.contains(order_no) {
                    producers.push(order_no.clone());
                }
            }
        }

        for assignment in &ds.operation_attributes {
            index
                .op_to_params
                .entry(assignment.operation_id)
                .or_default()
                .push((assignment.attribute_id, assignment.param_id));
        }
        for params in index.op_to_params.values_mut() {
            params.sort_unstable();
        }

        Ok(index)
    }

    /// Machines eligible for the given capability class, stable order.
    pub fn resources_of(&self, group: ResourceGroupId) -> &[ResourceId] {
        self.group_to_resources
            .get(&group)
            .map_or(&[], Vec::as_slice)
    }

    /// Attribute values of the given operation, or empty when it has none.
    pub fn params_of(&self, op: OperationId) -> &[(AttributeId, ParamId)] {
        self.op_to_params.get(&op).map_or(&[], Vec::as_slice)
    }
}

fn inconsistent(record: impl Into<String>, detail: impl Into<String>) -> ScheduleError {
    ScheduleError::InputInconsistent {
        record: record.into(),
        detail: detail.into(),
    }
}

fn validate(ds: &Dataset) -> Result<(), ScheduleError> {
    let group_ids: HashSet<_> = ds.resource_groups.iter().map(|g| g.resource_group_id).collect();
    let resource_ids: HashSet<_> = ds.resources.iter().map(|r| r.resource_id).collect();
    let operation_ids: HashSet<_> = ds.operations.iter().map(|o| o.operation_id).collect();
    let attribute_ids: HashSet<_> = ds.attributes.iter().map(|a| a.attribute_id).collect();
    let changeover_ids: HashSet<_> =
        ds.changeover_groups.iter().map(|g| g.changeover_group_id).collect();
    let schedule_ids: HashSet<_> = ds.schedules.iter().map(|s| s.schedule_id).collect();
    let shift_ids: HashSet<_> = ds.shifts.iter().map(|s| s.shift_id).collect();
    let break_ids: HashSet<_> = ds.breaks.iter().map(|b| b.break_id).collect();
    let params: HashMap<ParamId, AttributeId> = ds
        .attribute_params
        .iter()
        .map(|p| (p.param_id, p.attribute_id))
        .collect();

    let mut order_keys = HashSet::new();
    for op in &ds.operations {
        let record = format!("operation {}", op.operation_id);
        if !order_keys.insert((op.order_no.clone(), op.op_no)) {
            return Err(inconsistent(
                record,
                format!("duplicate (order_no, op_no) = ({}, {})", op.order_no, op.op_no),
            ));
        }
        if op.process_time_days < 0.0 {
            return Err(inconsistent(
                record,
                format!("negative process time {} days", op.process_time_days),
            ));
        }
        if !group_ids.contains(&op.resource_group_id) {
            return Err(inconsistent(
                record,
                format!("unknown resource group {}", op.resource_group_id),
            ));
        }
    }

    for res in &ds.resources {
        let record = format!("resource {}", res.resource_id);
        if let Some(group) = res.changeover_group_id {
            if !changeover_ids.contains(&group) {
                return Err(inconsistent(record, format!("unknown changeover group {group}")));
            }
        }
        if let Some(schedule) = res.schedule_id {
            if !schedule_ids.contains(&schedule) {
                return Err(inconsistent(record, format!("unknown schedule {schedule}")));
            }
        }
    }

    for member in &ds.group_members {
        let record = format!(
            "group member ({}, {})",
            member.resource_group_id, member.resource_id
        );
        if !group_ids.contains(&member.resource_group_id) {
            return Err(inconsistent(record, "unknown resource group"));
        }
        if !resource_ids.contains(&member.resource_id) {
            return Err(inconsistent(record, "unknown resource"));
        }
    }

    for param in &ds.attribute_params {
        if !attribute_ids.contains(&param.attribute_id) {
            return Err(inconsistent(
                format!("attribute param {}", param.param_id),
                format!("unknown attribute {}", param.attribute_id),
            ));
        }
    }

    for assignment in &ds.operation_attributes {
        let record = format!(
            "operation attribute ({}, {})",
            assignment.operation_id, assignment.attribute_id
        );
        if !operation_ids.contains(&assignment.operation_id) {
            return Err(inconsistent(record, "unknown operation"));
        }
        match params.get(&assignment.param_id) {
            None => return Err(inconsistent(record, format!("unknown param {}", assignment.param_id))),
            Some(&attr) if attr != assignment.attribute_id => {
                return Err(inconsistent(
                    record,
                    format!(
                        "param {} belongs to attribute {attr}, not {}",
                        assignment.param_id, assignment.attribute_id
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    for entry in &ds.changeover_matrix {
        let record = format!(
            "changeover matrix ({}, {}, {} -> {})",
            entry.changeover_group_id, entry.attribute_id, entry.from_param_id, entry.to_param_id
        );
        if !changeover_ids.contains(&entry.changeover_group_id) {
            return Err(inconsistent(record, "unknown changeover group"));
        }
        if !attribute_ids.contains(&entry.attribute_id) {
            return Err(inconsistent(record, "unknown attribute"));
        }
        if !params.contains_key(&entry.from_param_id) || !params.contains_key(&entry.to_param_id) {
            return Err(inconsistent(record, "unknown param"));
        }
    }

    for standard in &ds.changeover_standards {
        let record = format!(
            "changeover standard ({}, {})",
            standard.changeover_group_id, standard.attribute_id
        );
        if !changeover_ids.contains(&standard.changeover_group_id) {
            return Err(inconsistent(record, "unknown changeover group"));
        }
        if !attribute_ids.contains(&standard.attribute_id) {
            return Err(inconsistent(record, "unknown attribute"));
        }
    }

    for schedule in &ds.schedules {
        for shift in schedule.days.iter().flatten() {
            if !shift_ids.contains(shift) {
                return Err(inconsistent(
                    format!("schedule {}", schedule.schedule_id),
                    format!("unknown shift {shift}"),
                ));
            }
        }
    }

    for shift in &ds.shifts {
        if shift.start == shift.end {
            return Err(inconsistent(
                format!("shift {}", shift.shift_id),
                "zero-length shift (start equals end)",
            ));
        }
    }

    for link in &ds.shift_breaks {
        let record = format!("shift break ({}, {})", link.shift_id, link.break_id);
        if !shift_ids.contains(&link.shift_id) {
            return Err(inconsistent(record, "unknown shift"));
        }
        if !break_ids.contains(&link.break_id) {
            return Err(inconsistent(record, "unknown break"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BomLink, GroupMember, Operation, OperationAttribute, Resource, ResourceGroup,
    };
    use pretty_assertions::assert_eq;

    fn base_dataset() -> Dataset {
        let mut ds = Dataset::default();
        ds.resource_groups.push(ResourceGroup { resource_group_id: 1, name: "Mills".into() });
        ds.resources.push(Resource::new(21, "Mill-B"));
        ds.resources.push(Resource::new(20, "Mill-A"));
        ds.group_members.push(GroupMember { resource_group_id: 1, resource_id: 21 });
        ds.group_members.push(GroupMember { resource_group_id: 1, resource_id: 20 });
        ds.operations.push(Operation::new(100, "WO-1", 1, "Rough").op_no(10));
        ds.operations.push(Operation::new(101, "WO-1", 1, "Finish").op_no(20));
        ds.operations.push(Operation::new(102, "WO-2", 1, "Rough").op_no(10));
        ds
    }

    #[test]
    fn members_are_sorted_for_reproducibility() {
        let index = base_dataset().index().unwrap();
        assert_eq!(index.resources_of(1), &[20, 21]);
    }

    #[test]
    fn ops_ordered_by_op_no() {
        let index = base_dataset().index().unwrap();
        let ops = &index.ops_by_order["WO-1"];
        assert_eq!(ops.len(), 2);
        assert_eq!(index.order_last_op["WO-1"], ops[1]);
    }

    #[test]
    fn part_producers_from_bom_order_part() {
        let mut ds = base_dataset();
        ds.bom.push(BomLink {
            bom_id: 1,
            order_no: "WO-2".into(),
            order_part_no: Some("FRAME".into()),
            op_no: None,
            required_part_no: None,
            required_quantity: 0.0,
        });
        let index = ds.index().unwrap();
        assert_eq!(index.part_producers["FRAME"], vec!["WO-2".to_string()]);
    }

    #[test]
    fn duplicate_order_op_pair_is_rejected() {
        let mut ds = base_dataset();
        ds.operations.push(Operation::new(103, "WO-1", 1, "Rework").op_no(10));
        let err = ds.index().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn dangling_param_is_rejected() {
        let mut ds = base_dataset();
        ds.operation_attributes.push(OperationAttribute {
            operation_id: 100,
            attribute_id: 5,
            param_id: 50,
        });
        let err = ds.index().unwrap_err();
        assert!(matches!(err, ScheduleError::InputInconsistent { .. }));
    }

    #[test]
    fn negative_process_time_is_rejected() {
        let mut ds = base_dataset();
        ds.operations.push(Operation::new(104, "WO-3", 1, "Bad").process_days(-1.0));
        let err = ds.index().unwrap_err();
        assert!(err.to_string().contains("negative process time"));
    }
}

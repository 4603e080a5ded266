//! End-to-end scheduling scenarios over small fixtures.
//!
//! Each test builds a dataset, runs the full pipeline with a fixed
//! simulation start (never wall-clock now) and asserts one property of the
//! solved schedule.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use takt_core::{
    Attribute, AttributeParam, BomLink, ChangeoverGroup, ChangeoverMatrixEntry, Dataset,
    GroupMember, Operation, OperationAttribute, Resource, ResourceGroup, ScheduleError,
    SchedulerConfig, Shift, WeekSchedule,
};
use takt_solver::Planner;

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Monday 2026-01-05 at shift start.
fn sim_start() -> NaiveDateTime {
    date(2026, 1, 5).and_time(time(8, 0))
}

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        solver_time_limit_seconds: 30,
        deterministic: true,
        ..SchedulerConfig::default()
    }
}

/// Empty dataset with a Mon-Fri 08:00-16:30 shift (510 working minutes per
/// day, no breaks) ready for resources to join.
fn weekday_dataset() -> Dataset {
    let mut ds = Dataset::default();
    ds.shifts.push(Shift {
        shift_id: 1,
        name: "Day".into(),
        start: time(8, 0),
        end: time(16, 30),
    });
    ds.schedules.push(WeekSchedule {
        schedule_id: 1,
        name: "Weekdays".into(),
        days: [Some(1), Some(1), Some(1), Some(1), Some(1), None, None],
    });
    ds
}

fn add_machine(ds: &mut Dataset, resource_id: i64, group_id: i64, name: &str) {
    if !ds
        .resource_groups
        .iter()
        .any(|g| g.resource_group_id == group_id)
    {
        ds.resource_groups.push(ResourceGroup {
            resource_group_id: group_id,
            name: format!("Group {group_id}"),
        });
    }
    ds.resources
        .push(Resource::new(resource_id, name).in_schedule(Some(1)));
    ds.group_members.push(GroupMember {
        resource_group_id: group_id,
        resource_id,
    });
}

/// Give the machine a changeover regime over a single `colour` attribute
/// with red (10) and blue (11), switching costs 30 minutes either way.
fn add_colour_changeovers(ds: &mut Dataset, resource_id: i64) {
    ds.changeover_groups.push(ChangeoverGroup {
        changeover_group_id: 1,
        name: "Paint".into(),
    });
    ds.attributes.push(Attribute {
        attribute_id: 1,
        name: "colour".into(),
    });
    ds.attribute_params.push(AttributeParam {
        param_id: 10,
        attribute_id: 1,
        value: "red".into(),
    });
    ds.attribute_params.push(AttributeParam {
        param_id: 11,
        attribute_id: 1,
        value: "blue".into(),
    });
    for (from, to) in [(10, 11), (11, 10)] {
        ds.changeover_matrix.push(ChangeoverMatrixEntry {
            changeover_group_id: 1,
            attribute_id: 1,
            from_param_id: from,
            to_param_id: to,
            setup_minutes: 30,
        });
    }
    let res = ds
        .resources
        .iter_mut()
        .find(|r| r.resource_id == resource_id)
        .unwrap();
    res.changeover_group_id = Some(1);
}

fn paint(ds: &mut Dataset, operation_id: i64, colour_param: i64) {
    ds.operation_attributes.push(OperationAttribute {
        operation_id,
        attribute_id: 1,
        param_id: colour_param,
    });
}

// ============================================================================
// Single operation
// ============================================================================

#[test]
fn single_operation_starts_at_sim_start() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Lathe-1");
    ds.operations
        .push(Operation::new(100, "WO-1", 1, "Turning").op_no(10).process_days(1.0));

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    let op = solved.operation(100).unwrap();
    assert_eq!(op.solver_start, 0);
    assert_eq!(op.solver_end, 1440);
    assert_eq!(op.resource_id, 1);
    assert_eq!(op.start_time, sim_start());
    // 1440 working minutes at 510 per day: two full days plus 420 minutes
    // into Wednesday
    assert_eq!(op.end_time, date(2026, 1, 7).and_time(time(15, 0)));
    assert!(solved.unscheduled.is_empty());
}

// ============================================================================
// Changeovers on a shared machine
// ============================================================================

#[test]
fn matching_colour_runs_back_to_back() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Booth-1");
    add_colour_changeovers(&mut ds, 1);
    ds.operations
        .push(Operation::new(1, "WO-1", 1, "Paint").op_no(10).process_days(60.0 / 1440.0));
    ds.operations
        .push(Operation::new(2, "WO-2", 1, "Paint").op_no(10).process_days(60.0 / 1440.0));
    paint(&mut ds, 1, 10);
    paint(&mut ds, 2, 10); // both red

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    let mut ops = solved.operations.clone();
    ops.sort_by_key(|o| o.solver_start);
    assert_eq!(ops[0].solver_start, 0);
    // gravity packs them tight; same colour costs nothing
    assert_eq!(ops[1].solver_start, ops[0].solver_end);
    assert_eq!(solved.summary.total_changeover_minutes, 0);
}

#[test]
fn colour_change_forces_a_gap() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Booth-1");
    add_colour_changeovers(&mut ds, 1);
    ds.operations
        .push(Operation::new(1, "WO-1", 1, "Paint red").op_no(10).process_days(60.0 / 1440.0));
    ds.operations
        .push(Operation::new(2, "WO-2", 1, "Paint blue").op_no(10).process_days(60.0 / 1440.0));
    paint(&mut ds, 1, 10);
    paint(&mut ds, 2, 11);

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    let mut ops = solved.operations.clone();
    ops.sort_by_key(|o| o.solver_start);
    // whoever runs second waits out the 30 minute changeover
    assert!(ops[1].solver_start >= ops[0].solver_end + 30);
    assert_eq!(ops[1].changeover_minutes, 30);
    assert_eq!(solved.summary.total_changeover_minutes, 30);

    // the setup shows up as a CHANGEOVER block filling the gap
    let blocks: Vec<_> = solved
        .timeline
        .iter()
        .filter(|r| r.order_no == takt_core::CHANGEOVER_ORDER_NO)
        .collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].changeover_minutes, 30);
    assert_eq!(blocks[0].end_time, ops[1].start_time);
}

// ============================================================================
// Precedences
// ============================================================================

#[test]
fn intra_order_operations_stay_in_sequence() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Mill-1");
    add_machine(&mut ds, 2, 2, "Drill-1");
    ds.operations
        .push(Operation::new(1, "WO-1", 1, "Rough").op_no(10).process_days(0.25));
    ds.operations
        .push(Operation::new(2, "WO-1", 2, "Drill").op_no(20).process_days(0.25));

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    let first = solved.operation(1).unwrap();
    let second = solved.operation(2).unwrap();
    assert!(second.solver_start >= first.solver_end);
}

#[test]
fn bom_makes_consumer_wait_for_producer() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Weld-1");
    add_machine(&mut ds, 2, 2, "Assembly-1");
    // Q produces part X in its last operation; P consumes X in its first
    ds.operations
        .push(Operation::new(1, "Q", 1, "Weld frame").op_no(10).process_days(1.0));
    ds.operations
        .push(Operation::new(2, "P", 2, "Assemble").op_no(10).process_days(0.5));
    ds.bom.push(BomLink {
        bom_id: 1,
        order_no: "Q".into(),
        order_part_no: Some("X".into()),
        op_no: None,
        required_part_no: None,
        required_quantity: 0.0,
    });
    ds.bom.push(BomLink {
        bom_id: 2,
        order_no: "P".into(),
        order_part_no: None,
        op_no: None,
        required_part_no: Some("X".into()),
        required_quantity: 1.0,
    });

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    let producer = solved.operation(1).unwrap();
    let consumer = solved.operation(2).unwrap();
    assert!(consumer.solver_start >= producer.solver_end);
}

#[test]
fn self_producing_order_is_infeasible() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Mixer-1");
    ds.operations
        .push(Operation::new(1, "Q", 1, "Mix").op_no(10).process_days(0.5));
    // Q requires the very part it produces
    ds.bom.push(BomLink {
        bom_id: 1,
        order_no: "Q".into(),
        order_part_no: Some("X".into()),
        op_no: None,
        required_part_no: Some("X".into()),
        required_quantity: 1.0,
    });

    let err = Planner::new(test_config()).solve(&ds, sim_start()).unwrap_err();
    assert!(matches!(err, ScheduleError::InfeasibleModel));
}

// ============================================================================
// Due dates and earliest starts
// ============================================================================

#[test]
fn tighter_work_goes_first_under_due_date_pressure() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Press-1");
    let due = date(2026, 1, 9).and_time(time(8, 0)); // four uniform shifts out
    ds.operations.push(
        Operation::new(1, "SHORT", 1, "Stamp")
            .op_no(10)
            .process_days(2.0)
            .due(due),
    );
    ds.operations.push(
        Operation::new(2, "LONG", 1, "Stamp")
            .op_no(10)
            .process_days(4.0)
            .due(due),
    );

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    let short = solved.operation(1).unwrap();
    let long = solved.operation(2).unwrap();
    // scheduling the short order first minimises summed lateness
    assert!(short.solver_start < long.solver_start);

    // lateness against the uniform axis: due sits at 4 * 510 = 2040
    let due_minutes = 2040;
    let expected: i64 = [short, long]
        .iter()
        .map(|op| (op.solver_end - due_minutes).max(0))
        .sum();
    assert_eq!(solved.summary.total_lateness_minutes, expected);
    assert!(short.is_late && long.is_late);
}

#[test]
fn earliest_start_is_respected() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Oven-1");
    ds.operations.push(
        Operation::new(1, "WO-1", 1, "Cure")
            .op_no(10)
            .process_days(0.5)
            .earliest_start(date(2026, 1, 7).and_time(time(8, 0))),
    );

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    // two calendar days out on the uniform axis
    assert!(solved.operation(1).unwrap().solver_start >= 2 * 510);
}

// ============================================================================
// Assignment invariants
// ============================================================================

#[test]
fn every_operation_lands_on_an_eligible_machine() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Mill-1");
    add_machine(&mut ds, 2, 1, "Mill-2");
    add_machine(&mut ds, 3, 2, "Drill-1");
    for i in 0..4 {
        ds.operations.push(
            Operation::new(i, format!("WO-{i}"), 1, "Milling")
                .op_no(10)
                .process_days(0.25),
        );
    }
    ds.operations
        .push(Operation::new(9, "WO-9", 2, "Drilling").op_no(10).process_days(0.25));

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    assert_eq!(solved.operations.len(), 5);
    for op in &solved.operations {
        if op.operation_id == 9 {
            assert_eq!(op.resource_id, 3);
        } else {
            assert!([1, 2].contains(&op.resource_id));
        }
    }

    // per-machine intervals never overlap
    for machine in [1, 2, 3] {
        let mut intervals: Vec<_> = solved
            .operations
            .iter()
            .filter(|o| o.resource_id == machine)
            .map(|o| (o.solver_start, o.solver_end))
            .collect();
        intervals.sort_unstable();
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap on machine {machine}");
        }
    }
}

#[test]
fn capability_class_without_machines_leaves_operation_unscheduled() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Mill-1");
    ds.resource_groups.push(ResourceGroup {
        resource_group_id: 99,
        name: "Ghost".into(),
    });
    ds.operations
        .push(Operation::new(1, "WO-1", 1, "Milling").op_no(10).process_days(0.25));
    ds.operations
        .push(Operation::new(2, "WO-2", 99, "Nowhere").op_no(10).process_days(0.25));

    let solved = Planner::new(test_config()).solve(&ds, sim_start()).unwrap();

    assert_eq!(solved.unscheduled, vec![2]);
    assert_eq!(solved.operations.len(), 1);
}

#[test]
fn identical_runs_produce_identical_schedules() {
    let mut ds = weekday_dataset();
    add_machine(&mut ds, 1, 1, "Mill-1");
    add_machine(&mut ds, 2, 1, "Mill-2");
    for i in 0..5 {
        ds.operations.push(
            Operation::new(i, format!("WO-{i}"), 1, "Milling")
                .op_no(10)
                .process_days(0.5),
        );
    }

    let planner = Planner::new(test_config());
    let first = planner.solve(&ds, sim_start()).unwrap();
    let second = planner.solve(&ds, sim_start()).unwrap();

    let a = serde_json::to_string(&first.operations).unwrap();
    let b = serde_json::to_string(&second.operations).unwrap();
    assert_eq!(a, b);
}

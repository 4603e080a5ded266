//! Solver-axis to wall-clock conversion and report assembly.
//!
//! The solver places intervals on a uniform working-minute axis; this pass
//! converts them to real datetimes honouring each machine's own calendar,
//! recomputes the true sequence-dependent setup from resource adjacency
//! (the model's pairwise view over-counts chains), emits the timeline with
//! CHANGEOVER blocks in the gaps, and runs the calendar-soundness check
//! that counts placements the uniform approximation pushed onto
//! non-working days.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration as StdDuration;

use chrono::{Days, NaiveDateTime, NaiveTime};
use tracing::{debug, info, warn};

use takt_core::{
    Dataset, OperationId, ResourceId, ResourceLoad, RunSummary, ScheduleError,
    ScheduledOperation, SchedulerConfig, SolvedSchedule, TimelineRecord, UniformCalendar,
    WorkingCalendar, CHANGEOVER_ORDER_NO,
};

use crate::changeover::ChangeoverEngine;
use crate::model::SolveResult;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Turn a raw solver assignment into the full schedule report.
pub fn materialise_schedule(
    ds: &Dataset,
    result: &SolveResult,
    changeover: &ChangeoverEngine<'_>,
    calendars: &HashMap<ResourceId, WorkingCalendar>,
    config: &SchedulerConfig,
    sim_start: NaiveDateTime,
    wall_time: StdDuration,
) -> Result<SolvedSchedule, ScheduleError> {
    let uniform = UniformCalendar::new(config);

    // Assignment sequences per machine, by ascending start
    let mut sequence_by_resource: BTreeMap<ResourceId, Vec<usize>> = BTreeMap::new();
    for (pos, chosen) in result.chosen.iter().enumerate() {
        if let Some(res_id) = chosen {
            sequence_by_resource.entry(*res_id).or_default().push(pos);
        }
    }
    for sequence in sequence_by_resource.values_mut() {
        sequence.sort_by_key(|&pos| (result.starts[pos], ds.operations[pos].operation_id));
    }

    // True setup ahead of each operation: zero for the first on a machine,
    // the adjacent changeover thereafter
    let mut setup_minutes = vec![0i64; ds.operations.len()];
    for (&res_id, sequence) in &sequence_by_resource {
        let resource = ds
            .resource(res_id)
            .expect("assignment references a known resource");
        let mut prev: Option<usize> = None;
        for &pos in sequence {
            if let Some(prev_pos) = prev {
                setup_minutes[pos] = changeover.minutes_between(
                    ds.operations[prev_pos].operation_id,
                    ds.operations[pos].operation_id,
                    resource,
                );
            }
            prev = Some(pos);
        }
    }

    // Order-level spans on the solver axis, scheduled operations only.
    // These materialise on the shared uniform reference calendar, not the
    // per-machine ones; spans of multi-machine orders are approximate.
    let mut order_spans: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for (pos, chosen) in result.chosen.iter().enumerate() {
        if chosen.is_none() {
            continue;
        }
        let op = &ds.operations[pos];
        let span = order_spans
            .entry(op.order_no.as_str())
            .or_insert((result.starts[pos], result.ends[pos]));
        span.0 = span.0.min(result.starts[pos]);
        span.1 = span.1.max(result.ends[pos]);
    }
    debug!("order spans use the uniform reference calendar");

    let mut operations = Vec::new();
    let mut timeline = Vec::new();
    let mut unscheduled: Vec<OperationId> = Vec::new();
    let mut calendar_violations = 0usize;
    let mut total_setup = 0i64;

    for (pos, op) in ds.operations.iter().enumerate() {
        let Some(res_id) = result.chosen[pos] else {
            unscheduled.push(op.operation_id);
            continue;
        };
        let calendar = &calendars[&res_id];
        let resource_name = ds
            .resource(res_id)
            .map_or_else(|| res_id.to_string(), |r| r.name.clone());

        let real_start = calendar.materialise(sim_start, result.starts[pos])?;
        let real_end = calendar.materialise(sim_start, result.ends[pos])?;
        let is_late = op.due_date.is_some_and(|due| real_end > due);
        let setup = setup_minutes[pos];
        total_setup += setup;

        if spans_non_working_day(calendar, real_start, real_end) {
            calendar_violations += 1;
            warn!(
                operation = op.operation_id,
                resource = res_id,
                "materialised interval touches a non-working day"
            );
        }

        let (span_start, span_end) = order_spans[op.order_no.as_str()];
        let order_start = uniform.to_real_time(sim_start, span_start);
        let order_end = uniform.to_real_time(sim_start, span_end);

        if setup > 0 {
            let setup_start = calendar.materialise(sim_start, result.starts[pos] - setup)?;
            timeline.push(TimelineRecord {
                order_no: CHANGEOVER_ORDER_NO.into(),
                op_no: op.op_no,
                op_name: "Changeover".into(),
                resource_name: resource_name.clone(),
                start_time: setup_start,
                end_time: real_start,
                is_late: false,
                color_key: CHANGEOVER_ORDER_NO.into(),
                changeover_minutes: setup,
            });
        }
        timeline.push(TimelineRecord {
            order_no: op.order_no.clone(),
            op_no: op.op_no,
            op_name: op.operation_name.clone(),
            resource_name: resource_name.clone(),
            start_time: real_start,
            end_time: real_end,
            is_late,
            color_key: op.order_no.clone(),
            changeover_minutes: setup,
        });

        operations.push(ScheduledOperation {
            operation_id: op.operation_id,
            order_no: op.order_no.clone(),
            op_no: op.op_no,
            operation_name: op.operation_name.clone(),
            quantity: op.quantity,
            resource_id: res_id,
            resource_group_id: op.resource_group_id,
            start_time: real_start,
            end_time: real_end,
            duration_days: (result.ends[pos] - result.starts[pos]) as f64 / MINUTES_PER_DAY,
            setup_time_days: setup as f64 / MINUTES_PER_DAY,
            due_date: op.due_date,
            is_late,
            order_start,
            order_end,
            belongs_to_order_no: op.belongs_to_order_no.clone(),
            part_no: op.part_no.clone(),
            product: op.product.clone(),
            changeover_minutes: setup,
            solver_start: result.starts[pos],
            solver_end: result.ends[pos],
        });
    }

    timeline.sort_by(|a, b| {
        (&a.resource_name, a.start_time, a.end_time)
            .cmp(&(&b.resource_name, b.start_time, b.end_time))
    });

    let loads = result
        .loads
        .iter()
        .map(|&(res_id, load_minutes)| ResourceLoad {
            resource_id: res_id,
            name: ds
                .resource(res_id)
                .map_or_else(|| res_id.to_string(), |r| r.name.clone()),
            load_minutes,
            utilisation_pct: if result.makespan > 0 {
                load_minutes as f64 / result.makespan as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    let summary = RunSummary {
        status: result.status,
        wall_time_seconds: wall_time.as_secs_f64(),
        total_lateness_minutes: result.total_lateness,
        makespan_minutes: result.makespan,
        total_changeover_minutes: total_setup,
        calendar_violations,
        search_workers: config.effective_workers(),
    };
    info!(
        scheduled = operations.len(),
        unscheduled = unscheduled.len(),
        lateness = summary.total_lateness_minutes,
        makespan = summary.makespan_minutes,
        changeover = summary.total_changeover_minutes,
        "schedule materialised"
    );

    Ok(SolvedSchedule {
        operations,
        timeline,
        loads,
        summary,
        unscheduled,
    })
}

/// True when any calendar day intersected by `[start, end)` has no working
/// minutes on the machine and the overlap with that day is non-zero.
fn spans_non_working_day(
    calendar: &WorkingCalendar,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> bool {
    if end <= start {
        return false;
    }
    let mut day = start.date();
    while day <= end.date() {
        if calendar.working_minutes_on(day) == 0 {
            let day_begin = day.and_time(NaiveTime::MIN);
            let day_end = day_begin + chrono::Duration::days(1);
            let overlap_start = start.max(day_begin);
            let overlap_end = end.min(day_end);
            if overlap_end > overlap_start {
                return true;
            }
        }
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    false
}

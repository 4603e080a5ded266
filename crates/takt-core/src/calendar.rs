//! Working-time arithmetic.
//!
//! Two clocks coexist in the engine. [`WorkingCalendar`] is the real one:
//! per-resource week schedules, shifts that may cross midnight, and breaks.
//! [`UniformCalendar`] is the approximation the solver searches in: a single
//! axis of working minutes where every day is one configured shift long.
//! The planner searches uniformly and materialises per-resource; the
//! validation pass in the materialiser surfaces any placement the
//! approximation pushed onto a non-working day.

use std::collections::HashMap;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::{Dataset, ResourceId};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Resolved working window for one weekday.
#[derive(Clone, Copy, Debug)]
struct DayWindow {
    /// Shift start, minutes from midnight
    start_minutes: i64,
    /// Shift length before breaks; includes the wrap for overnight shifts
    gross_minutes: i64,
    /// Total break minutes inside the shift
    break_minutes: i64,
}

/// Per-resource working-time calendar.
#[derive(Clone, Debug)]
pub struct WorkingCalendar {
    resource_id: ResourceId,
    /// Monday..Sunday; `None` is a non-working day
    week: [Option<DayWindow>; 7],
    default_start_minutes: i64,
    horizon_days: u32,
}

fn minutes_of(t: NaiveTime) -> i64 {
    t.signed_duration_since(NaiveTime::MIN).num_minutes()
}

fn span_minutes(start: NaiveTime, end: NaiveTime) -> i64 {
    let mut span = minutes_of(end) - minutes_of(start);
    if span < 0 {
        span += MINUTES_PER_DAY; // crosses midnight
    }
    span
}

impl WorkingCalendar {
    /// Resolve the calendar of one resource from the dataset. A resource
    /// without an assigned schedule has no working time at all.
    pub fn for_resource(
        ds: &Dataset,
        resource_id: ResourceId,
        config: &SchedulerConfig,
    ) -> Self {
        let mut week: [Option<DayWindow>; 7] = [None; 7];

        let schedule = ds
            .resource(resource_id)
            .and_then(|r| r.schedule_id)
            .and_then(|sid| ds.schedules.iter().find(|s| s.schedule_id == sid));

        if let Some(schedule) = schedule {
            for (day, slot) in schedule.days.iter().enumerate() {
                let Some(shift_id) = slot else { continue };
                let Some(shift) = ds.shifts.iter().find(|s| s.shift_id == *shift_id) else {
                    continue;
                };
                let break_minutes: i64 = ds
                    .shift_breaks
                    .iter()
                    .filter(|link| link.shift_id == *shift_id)
                    .filter_map(|link| ds.breaks.iter().find(|b| b.break_id == link.break_id))
                    .map(|b| span_minutes(b.start, b.end))
                    .sum();
                week[day] = Some(DayWindow {
                    start_minutes: minutes_of(shift.start),
                    gross_minutes: span_minutes(shift.start, shift.end),
                    break_minutes,
                });
            }
        }

        Self {
            resource_id,
            week,
            default_start_minutes: config.shift_start_minutes(),
            horizon_days: config.calendar_horizon_days,
        }
    }

    fn window_on(&self, date: NaiveDate) -> Option<&DayWindow> {
        self.week[date.weekday().num_days_from_monday() as usize].as_ref()
    }

    /// Net working minutes of the resource on the given date.
    pub fn working_minutes_on(&self, date: NaiveDate) -> i64 {
        self.window_on(date)
            .map_or(0, |w| (w.gross_minutes - w.break_minutes).max(0))
    }

    /// Minutes from midnight of the day's shift start, or the configured
    /// default when the day has no shift.
    pub fn shift_start_minutes_on(&self, date: NaiveDate) -> i64 {
        self.window_on(date)
            .map_or(self.default_start_minutes, |w| w.start_minutes)
    }

    /// Wall-clock datetime at which `worked_minutes` of working time have
    /// accumulated since `sim_start`, skipping non-working days.
    pub fn materialise(
        &self,
        sim_start: NaiveDateTime,
        worked_minutes: i64,
    ) -> Result<NaiveDateTime, ScheduleError> {
        let overflow = || ScheduleError::CalendarOverflow {
            resource: self.resource_id,
            horizon_days: self.horizon_days,
        };

        let mut cur = sim_start.date();
        let mut rem = worked_minutes.max(0);
        for _ in 0..=self.horizon_days {
            let avail = self.working_minutes_on(cur);
            if avail > 0 {
                if rem <= avail {
                    let offset = self.shift_start_minutes_on(cur) + rem;
                    return Ok(cur.and_time(NaiveTime::MIN) + Duration::minutes(offset));
                }
                rem -= avail;
            }
            cur = cur.succ_opt().ok_or_else(overflow)?;
        }
        Err(overflow())
    }

    /// Total working minutes over `days` calendar days starting at `from`.
    pub fn working_minutes_over(&self, from: NaiveDate, days: u32) -> i64 {
        let mut total = 0;
        let mut cur = from;
        for _ in 0..days {
            total += self.working_minutes_on(cur);
            match cur.succ_opt() {
                Some(next) => cur = next,
                None => break,
            }
        }
        total
    }
}

/// Build the calendar of every resource in the dataset.
pub fn build_calendars(
    ds: &Dataset,
    config: &SchedulerConfig,
) -> HashMap<ResourceId, WorkingCalendar> {
    ds.resources
        .iter()
        .map(|r| {
            (
                r.resource_id,
                WorkingCalendar::for_resource(ds, r.resource_id, config),
            )
        })
        .collect()
}

/// The uniform-shift approximation of the solver time axis: every calendar
/// day contributes exactly one shift of the configured duration.
#[derive(Clone, Copy, Debug)]
pub struct UniformCalendar {
    shift_start_minutes: i64,
    shift_duration_minutes: i64,
}

impl UniformCalendar {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            shift_start_minutes: config.shift_start_minutes(),
            shift_duration_minutes: config.shift_duration_minutes(),
        }
    }

    pub fn shift_duration_minutes(&self) -> i64 {
        self.shift_duration_minutes
    }

    /// Solver-axis offset of a wall-clock date relative to the simulation
    /// start: whole calendar days times the uniform shift duration.
    pub fn offset_minutes(&self, sim_start: NaiveDateTime, target: NaiveDateTime) -> i64 {
        (target - sim_start).num_days() * self.shift_duration_minutes
    }

    /// Wall-clock datetime for a point on the solver axis.
    pub fn to_real_time(&self, sim_start: NaiveDateTime, worked_minutes: i64) -> NaiveDateTime {
        let worked = worked_minutes.max(0);
        let full_shifts = worked / self.shift_duration_minutes;
        let remainder = worked % self.shift_duration_minutes;
        let day = sim_start.date() + Days::new(full_shifts as u64);
        day.and_time(NaiveTime::MIN) + Duration::minutes(self.shift_start_minutes + remainder)
    }
}

//! Constraint model and solver driver.
//!
//! The schedule is encoded over a single integer axis of working minutes
//! `[0, horizon]`. Per operation: a start and an end variable with a fixed
//! duration between them, one 0/1 selection variable per eligible machine
//! (exactly one fires), and a usage variable that carries the duration onto
//! the selected machine for load accounting. Machine exclusivity and
//! sequence-dependent changeovers are encoded pairwise: an orientation
//! variable per `{i, j}` pair sharing a machine decides who goes first, and
//! big-M linear inequalities activate `start_j >= end_i + changeover(i, j)`
//! for the chosen orientation, plus a cost variable that picks up the
//! changeover minutes. Everything is posted through the solver's linear
//! `>=` facility; an equality is a pair of opposing `>=` posts.
//!
//! The pairwise encoding charges every ordered pair sharing a machine, not
//! only adjacent ones, so chains of three or more over-count changeover
//! cost. The solver still minimises it monotonically; the materialiser
//! reports true adjacency costs.
//!
//! The objective is one weighted sum, due-date pressure dominating:
//! lateness, changeover cost, makespan, load range, peak load, and (when
//! the gravity strategy is on) the sum of start times as a pull-left
//! tie-break.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::{DomainId, TransformableVariable};
use pumpkin_solver::Solver;

use takt_core::{
    Dataset, PlanIndex, Resource, ResourceId, ScheduleError, SchedulerConfig, SolveStatus,
    UniformCalendar,
};

use crate::changeover::ChangeoverEngine;
use crate::precedence::PrecedenceEdge;

/// Everything the model builder needs for one run.
pub struct ModelContext<'a> {
    pub ds: &'a Dataset,
    pub index: &'a PlanIndex,
    pub edges: &'a [PrecedenceEdge],
    pub changeover: &'a ChangeoverEngine<'a>,
    pub config: &'a SchedulerConfig,
    /// Upper bound of the solver time axis, working minutes
    pub horizon: i64,
    pub sim_start: NaiveDateTime,
}

/// Raw solver assignment, positions aligned with `Dataset::operations`.
#[derive(Clone, Debug)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub starts: Vec<i64>,
    pub ends: Vec<i64>,
    pub durations: Vec<i64>,
    /// Selected machine per operation; `None` when the capability class has
    /// no members
    pub chosen: Vec<Option<ResourceId>>,
    pub loads: Vec<(ResourceId, i64)>,
    pub total_lateness: i64,
    pub makespan: i64,
    /// Pairwise model cost, not adjacency-true
    pub total_changeover: i64,
}

/// Net duration of an operation on the solver axis. Days convert at 1440
/// minutes per day; every operation occupies at least one minute so the
/// disjunctions stay meaningful.
pub fn duration_minutes(process_time_days: f64) -> i64 {
    let minutes = (process_time_days * 1440.0).round() as i64;
    minutes.max(1)
}

fn bound(v: i64) -> i32 {
    v.clamp(0, i64::from(i32::MAX)) as i32
}

fn coeff(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Post `sum(coeff * var) >= rhs`.
fn post_ge(solver: &mut Solver, terms: &[(DomainId, i32)], rhs: i32) {
    let views: Vec<_> = terms.iter().map(|&(var, c)| var.scaled(c)).collect();
    let tag = solver.new_constraint_tag();
    let _ = solver
        .add_constraint(cp::greater_than_or_equals(views, rhs, tag))
        .post();
}

/// Post `sum(coeff * var) == rhs` as two opposing inequalities.
fn post_eq(solver: &mut Solver, terms: &[(DomainId, i32)], rhs: i32) {
    post_ge(solver, terms, rhs);
    let flipped: Vec<_> = terms.iter().map(|&(var, c)| (var, -c)).collect();
    post_ge(solver, &flipped, -rhs);
}

fn read_values<S: ProblemSolution>(solution: &S, vars: &[DomainId]) -> Vec<i64> {
    vars.iter()
        .map(|&var| i64::from(solution.get_integer_value(var)))
        .collect()
}

/// Build the constraint model and run the bounded search.
pub fn solve_model(ctx: &ModelContext<'_>) -> Result<SolveResult, ScheduleError> {
    let n = ctx.ds.operations.len();
    if n == 0 {
        return Ok(SolveResult {
            status: SolveStatus::Optimal,
            starts: Vec::new(),
            ends: Vec::new(),
            durations: Vec::new(),
            chosen: Vec::new(),
            loads: Vec::new(),
            total_lateness: 0,
            makespan: 0,
            total_changeover: 0,
        });
    }

    let uniform = UniformCalendar::new(ctx.config);
    let horizon = bound(ctx.horizon);
    let weights = ctx.config.objective_weights;

    let durations: Vec<i64> = ctx
        .ds
        .operations
        .iter()
        .map(|op| duration_minutes(op.process_time_days))
        .collect();

    let resources_by_id: HashMap<ResourceId, &Resource> = ctx
        .ds
        .resources
        .iter()
        .map(|r| (r.resource_id, r))
        .collect();

    let mut solver = Solver::default();

    // ========================================================================
    // Task variables: start, end, fixed duration
    // ========================================================================

    let starts: Vec<DomainId> = (0..n)
        .map(|_| solver.new_bounded_integer(0, horizon))
        .collect();
    let ends: Vec<DomainId> = (0..n)
        .map(|_| solver.new_bounded_integer(0, horizon))
        .collect();
    for pos in 0..n {
        // end - start = duration
        post_eq(
            &mut solver,
            &[(ends[pos], 1), (starts[pos], -1)],
            bound(durations[pos]),
        );
    }

    // Earliest-start offsets, on the uniform axis
    for (pos, op) in ctx.ds.operations.iter().enumerate() {
        if let Some(earliest) = op.earliest_start_date {
            let offset = uniform.offset_minutes(ctx.sim_start, earliest);
            if offset > 0 {
                post_ge(&mut solver, &[(starts[pos], 1)], bound(offset));
            }
        }
    }

    // ========================================================================
    // Machine selection: exactly one eligible machine, usage for loads
    // ========================================================================

    let mut selections: Vec<Vec<(ResourceId, DomainId)>> = vec![Vec::new(); n];
    let mut usage_by_resource: BTreeMap<ResourceId, Vec<(DomainId, i64)>> = BTreeMap::new();
    let mut ops_by_resource: BTreeMap<ResourceId, Vec<usize>> = BTreeMap::new();

    for (pos, op) in ctx.ds.operations.iter().enumerate() {
        let eligible = ctx.index.resources_of(op.resource_group_id);
        if eligible.is_empty() {
            continue;
        }
        for &res_id in eligible {
            let selected = solver.new_bounded_integer(0, 1);
            selections[pos].push((res_id, selected));

            // usage = duration * selected
            let usage = solver.new_bounded_integer(0, bound(durations[pos]));
            post_eq(
                &mut solver,
                &[(usage, 1), (selected, -coeff(durations[pos]))],
                0,
            );
            usage_by_resource
                .entry(res_id)
                .or_default()
                .push((usage, durations[pos]));
            ops_by_resource.entry(res_id).or_default().push(pos);
        }
        let exactly_one: Vec<_> = selections[pos].iter().map(|&(_, var)| (var, 1)).collect();
        post_eq(&mut solver, &exactly_one, 1);
    }

    // ========================================================================
    // Precedences (intra-order chains and BOM edges)
    // ========================================================================

    for edge in ctx.edges {
        post_ge(
            &mut solver,
            &[(starts[edge.after], 1), (ends[edge.before], -1)],
            0,
        );
    }

    // ========================================================================
    // Pairwise exclusivity with sequence-dependent changeovers
    // ========================================================================

    let mut changeover_costs: Vec<(DomainId, i64)> = Vec::new();
    let mut pair_count = 0usize;

    for (&res_id, ops) in &ops_by_resource {
        let resource = resources_by_id[&res_id];
        for (a, &i) in ops.iter().enumerate() {
            for &j in &ops[a + 1..] {
                pair_count += 1;
                let from = ctx.ds.operations[i].operation_id;
                let to = ctx.ds.operations[j].operation_id;
                let c_ij = ctx.changeover.minutes_between(from, to, resource);
                let c_ji = ctx.changeover.minutes_between(to, from, resource);
                // Big enough to relax any constraint over the horizon, small
                // enough that 3M stays inside i32
                let slack = (ctx.horizon + c_ij.max(c_ji)).min(i64::from(i32::MAX) / 4);
                let big_m = slack as i32;

                let sel_i = selections[i]
                    .iter()
                    .find(|&&(r, _)| r == res_id)
                    .map(|&(_, var)| var)
                    .expect("pair op is eligible on its resource");
                let sel_j = selections[j]
                    .iter()
                    .find(|&&(r, _)| r == res_id)
                    .map(|&(_, var)| var)
                    .expect("pair op is eligible on its resource");

                // 1 = i runs before j, 0 = j runs before i; meaningful only
                // when both land on this machine
                let i_first = solver.new_bounded_integer(0, 1);

                // i before j: start_j >= end_i + c_ij
                post_ge(
                    &mut solver,
                    &[
                        (starts[j], 1),
                        (ends[i], -1),
                        (i_first, -big_m),
                        (sel_i, -big_m),
                        (sel_j, -big_m),
                    ],
                    coeff(c_ij - 3 * slack),
                );
                // j before i: start_i >= end_j + c_ji
                post_ge(
                    &mut solver,
                    &[
                        (starts[i], 1),
                        (ends[j], -1),
                        (i_first, big_m),
                        (sel_i, -big_m),
                        (sel_j, -big_m),
                    ],
                    coeff(c_ji - 2 * slack),
                );

                // Cost pickup per orientation; minimisation keeps the
                // variable at zero whenever the orientation is inactive
                if c_ij > 0 {
                    let cost = solver.new_bounded_integer(0, bound(c_ij));
                    post_ge(
                        &mut solver,
                        &[
                            (cost, 1),
                            (i_first, -big_m),
                            (sel_i, -big_m),
                            (sel_j, -big_m),
                        ],
                        coeff(c_ij - 3 * slack),
                    );
                    changeover_costs.push((cost, c_ij));
                }
                if c_ji > 0 {
                    let cost = solver.new_bounded_integer(0, bound(c_ji));
                    post_ge(
                        &mut solver,
                        &[
                            (cost, 1),
                            (i_first, big_m),
                            (sel_i, -big_m),
                            (sel_j, -big_m),
                        ],
                        coeff(c_ji - 2 * slack),
                    );
                    changeover_costs.push((cost, c_ji));
                }
            }
        }
    }

    // ========================================================================
    // Objective terms
    // ========================================================================

    // Lateness per due-dated operation, on the uniform axis
    let mut lateness_terms: Vec<(DomainId, i64)> = Vec::new();
    for (pos, op) in ctx.ds.operations.iter().enumerate() {
        if let Some(due) = op.due_date {
            let due_minutes = uniform.offset_minutes(ctx.sim_start, due);
            let cap = (ctx.horizon - due_minutes).max(0);
            let late = solver.new_bounded_integer(0, bound(cap));
            // late >= end - due
            post_ge(
                &mut solver,
                &[(late, 1), (ends[pos], -1)],
                coeff(-due_minutes),
            );
            lateness_terms.push((late, cap));
        }
    }
    let lateness_cap: i64 = lateness_terms.iter().map(|&(_, cap)| cap).sum();
    let total_lateness = solver.new_bounded_integer(0, bound(lateness_cap));
    let mut sum_terms: Vec<(DomainId, i32)> = vec![(total_lateness, 1)];
    sum_terms.extend(lateness_terms.iter().map(|&(var, _)| (var, -1)));
    post_eq(&mut solver, &sum_terms, 0);

    // Makespan: at least every end; the objective presses it down onto the
    // true maximum
    let makespan = solver.new_bounded_integer(0, horizon);
    for pos in 0..n {
        post_ge(&mut solver, &[(makespan, 1), (ends[pos], -1)], 0);
    }

    // Per-machine loads, peak and range
    let mut load_vars: Vec<DomainId> = Vec::new();
    let mut load_cap_all: i64 = 0;
    for usages in usage_by_resource.values() {
        let cap: i64 = usages.iter().map(|&(_, d)| d).sum();
        load_cap_all = load_cap_all.max(cap);
        let load = solver.new_bounded_integer(0, bound(cap));
        let mut terms: Vec<(DomainId, i32)> = vec![(load, 1)];
        terms.extend(usages.iter().map(|&(var, _)| (var, -1)));
        post_eq(&mut solver, &terms, 0);
        load_vars.push(load);
    }
    let max_load = solver.new_bounded_integer(0, bound(load_cap_all));
    let load_range = solver.new_bounded_integer(0, bound(load_cap_all));
    for &load in &load_vars {
        post_ge(&mut solver, &[(max_load, 1), (load, -1)], 0);
    }
    if load_vars.len() > 1 {
        let min_load = solver.new_bounded_integer(0, bound(load_cap_all));
        for &load in &load_vars {
            post_ge(&mut solver, &[(load, 1), (min_load, -1)], 0);
        }
        post_eq(
            &mut solver,
            &[(load_range, 1), (max_load, -1), (min_load, 1)],
            0,
        );
    }

    // Pairwise changeover cost total
    let changeover_cap: i64 = changeover_costs.iter().map(|&(_, cap)| cap).sum();
    let total_changeover = solver.new_bounded_integer(0, bound(changeover_cap));
    let mut terms: Vec<(DomainId, i32)> = vec![(total_changeover, 1)];
    terms.extend(changeover_costs.iter().map(|&(var, _)| (var, -1)));
    post_eq(&mut solver, &terms, 0);

    // Gravity: sum of starts, pulling everything left
    let gravity_cap = ctx.horizon.saturating_mul(n as i64);
    let total_start = solver.new_bounded_integer(0, bound(gravity_cap));
    if ctx.config.enable_gravity_strategy {
        let mut terms: Vec<(DomainId, i32)> = vec![(total_start, 1)];
        terms.extend(starts.iter().map(|&var| (var, -1)));
        post_eq(&mut solver, &terms, 0);
    }

    // Weighted single objective
    let objective_cap = weights.lateness.saturating_mul(lateness_cap)
        + weights.changeover.saturating_mul(changeover_cap)
        + weights.makespan.saturating_mul(ctx.horizon)
        + weights.load_range.saturating_mul(load_cap_all)
        + weights.max_load.saturating_mul(load_cap_all)
        + if ctx.config.enable_gravity_strategy {
            weights.gravity.saturating_mul(gravity_cap)
        } else {
            0
        };
    let objective = solver.new_bounded_integer(0, bound(objective_cap));
    let mut objective_terms: Vec<(DomainId, i32)> = vec![
        (objective, 1),
        (total_lateness, -coeff(weights.lateness)),
        (total_changeover, -coeff(weights.changeover)),
        (makespan, -coeff(weights.makespan)),
        (load_range, -coeff(weights.load_range)),
        (max_load, -coeff(weights.max_load)),
    ];
    if ctx.config.enable_gravity_strategy {
        objective_terms.push((total_start, -coeff(weights.gravity)));
    }
    post_eq(&mut solver, &objective_terms, 0);

    debug!(
        operations = n,
        pairs = pair_count,
        horizon = ctx.horizon,
        gravity = ctx.config.enable_gravity_strategy,
        "constraint model built"
    );

    // ========================================================================
    // Bounded search
    // ========================================================================

    let mut brancher = solver.default_brancher();
    let mut termination = TimeBudget::starting_now(Duration::from_secs(
        ctx.config.solver_time_limit_seconds,
    ));

    fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}
    let outcome = solver.optimise(
        &mut brancher,
        &mut termination,
        LinearSatUnsat::new(OptimisationDirection::Minimise, objective, noop_callback),
    );

    let (status, start_values, selection_values) = match outcome {
        OptimisationResult::Optimal(solution) => {
            let sel: Vec<Vec<i64>> = selections
                .iter()
                .map(|sels| {
                    let vars: Vec<DomainId> = sels.iter().map(|&(_, var)| var).collect();
                    read_values(&solution, &vars)
                })
                .collect();
            (SolveStatus::Optimal, read_values(&solution, &starts), sel)
        }
        OptimisationResult::Satisfiable(solution) => {
            let sel: Vec<Vec<i64>> = selections
                .iter()
                .map(|sels| {
                    let vars: Vec<DomainId> = sels.iter().map(|&(_, var)| var).collect();
                    read_values(&solution, &vars)
                })
                .collect();
            (SolveStatus::Feasible, read_values(&solution, &starts), sel)
        }
        OptimisationResult::Unsatisfiable => return Err(ScheduleError::InfeasibleModel),
        OptimisationResult::Unknown => {
            return Err(ScheduleError::SolveTimeout {
                limit_seconds: ctx.config.solver_time_limit_seconds,
            })
        }
    };

    // ========================================================================
    // Read back the assignment; derived figures are recomputed from it so
    // incumbent slack in auxiliary variables never leaks into reports
    // ========================================================================

    let ends_out: Vec<i64> = start_values
        .iter()
        .zip(&durations)
        .map(|(&s, &d)| s + d)
        .collect();

    let chosen: Vec<Option<ResourceId>> = selections
        .iter()
        .zip(&selection_values)
        .map(|(sels, values)| {
            sels.iter()
                .zip(values)
                .find(|&(_, &v)| v == 1)
                .map(|(&(res_id, _), _)| res_id)
        })
        .collect();

    let makespan_out = ends_out.iter().copied().max().unwrap_or(0);

    let mut total_lateness_out = 0;
    for (pos, op) in ctx.ds.operations.iter().enumerate() {
        if let Some(due) = op.due_date {
            let due_minutes = uniform.offset_minutes(ctx.sim_start, due);
            total_lateness_out += (ends_out[pos] - due_minutes).max(0);
        }
    }

    let mut loads: BTreeMap<ResourceId, i64> = ops_by_resource
        .keys()
        .map(|&res_id| (res_id, 0))
        .collect();
    for (pos, res) in chosen.iter().enumerate() {
        if let Some(res_id) = res {
            *loads.entry(*res_id).or_default() += durations[pos];
        }
    }

    // Model-view changeover total: every ordered selected pair is charged
    let mut total_changeover_out = 0;
    for (&res_id, ops) in &ops_by_resource {
        let resource = resources_by_id[&res_id];
        for (a, &i) in ops.iter().enumerate() {
            for &j in &ops[a + 1..] {
                if chosen[i] != Some(res_id) || chosen[j] != Some(res_id) {
                    continue;
                }
                let (first, second) = if start_values[i] <= start_values[j] {
                    (i, j)
                } else {
                    (j, i)
                };
                total_changeover_out += ctx.changeover.minutes_between(
                    ctx.ds.operations[first].operation_id,
                    ctx.ds.operations[second].operation_id,
                    resource,
                );
            }
        }
    }

    info!(
        status = ?status,
        makespan = makespan_out,
        total_lateness = total_lateness_out,
        "search finished"
    );

    Ok(SolveResult {
        status,
        starts: start_values,
        ends: ends_out,
        durations,
        chosen,
        loads: loads.into_iter().collect(),
        total_lateness: total_lateness_out,
        makespan: makespan_out,
        total_changeover: total_changeover_out,
    })
}

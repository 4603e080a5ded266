//! Error types shared across the pipeline.

use thiserror::Error;

use crate::ResourceId;

/// Scheduling pipeline error. Every failure surfaces with a kind and a
/// human-readable message; nothing is swallowed or auto-retried.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The data source cannot be read at all.
    #[error("input source unavailable: {0}")]
    InputUnavailable(String),

    /// The data source produced records that do not hang together
    /// (dangling ids, duplicate keys, malformed shift times).
    #[error("inconsistent input at {record}: {detail}")]
    InputInconsistent { record: String, detail: String },

    /// A resource has no working day within the bounded look-ahead.
    #[error("resource {resource} has no working day within {horizon_days} days")]
    CalendarOverflow {
        resource: ResourceId,
        horizon_days: u32,
    },

    /// The solver proved the model infeasible. The caller is expected to
    /// relax constraints (extend the horizon, ease due-date pressure) and
    /// retry manually.
    #[error("constraint model proven infeasible")]
    InfeasibleModel,

    /// The wall-clock budget elapsed without a feasible incumbent.
    #[error("no feasible schedule found within {limit_seconds} s")]
    SolveTimeout { limit_seconds: u64 },

    /// The output sink reported a write error; the sink rolled back any
    /// partial progress.
    #[error("output sink failure: {0}")]
    SinkFailure(String),
}

/// Rendering error.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

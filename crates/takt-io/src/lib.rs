//! # takt-io
//!
//! Input adapter and output sink for the takt scheduling engine.
//!
//! [`JsonSource`] reads the whole relational dataset from one JSON document
//! and validates it (referential integrity, duplicate keys, malformed shift
//! times) before anything downstream sees it. [`JsonSink`] persists the
//! solved schedule; it writes to a temporary file next to the target and
//! renames into place, so a failed write leaves no partial output behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use takt_core::{
    Dataset, DatasetSource, OperationId, ResourceLoad, RunSummary, ScheduleError,
    ScheduleSink, ScheduledOperation, SolvedSchedule,
};

/// Loads a [`Dataset`] from a JSON file.
pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSource for JsonSource {
    fn load(&self) -> Result<Dataset, ScheduleError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            ScheduleError::InputUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        let dataset: Dataset =
            serde_json::from_str(&text).map_err(|e| ScheduleError::InputInconsistent {
                record: self.path.display().to_string(),
                detail: e.to_string(),
            })?;
        // index() runs the full referential validation; the index itself is
        // rebuilt by the planner
        dataset.index()?;
        info!(
            path = %self.path.display(),
            operations = dataset.operations.len(),
            resources = dataset.resources.len(),
            "dataset loaded"
        );
        Ok(dataset)
    }
}

/// What the sink persists: the scheduled records, the ids of active
/// operations the model could not place, and the run's headline numbers.
#[derive(Serialize)]
struct SinkDocument<'a> {
    operations: &'a [ScheduledOperation],
    unscheduled: &'a [OperationId],
    loads: &'a [ResourceLoad],
    summary: &'a RunSummary,
}

/// Persists the solved schedule to a JSON file, whole-file or nothing.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScheduleSink for JsonSink {
    fn write(&mut self, schedule: &SolvedSchedule) -> Result<(), ScheduleError> {
        let document = SinkDocument {
            operations: &schedule.operations,
            unscheduled: &schedule.unscheduled,
            loads: &schedule.loads,
            summary: &schedule.summary,
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| ScheduleError::SinkFailure(e.to_string()))?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| ScheduleError::SinkFailure(e.to_string()))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| ScheduleError::SinkFailure(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| ScheduleError::SinkFailure(e.to_string()))?;

        info!(
            path = %self.path.display(),
            scheduled = schedule.operations.len(),
            unscheduled = schedule.unscheduled.len(),
            "schedule written"
        );
        Ok(())
    }
}

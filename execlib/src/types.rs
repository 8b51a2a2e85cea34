use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::events::JobStatus;

pub type JobId = Uuid;
pub type CommandLine = String;
pub type Envs = Vec<(String, String)>;

/// Everything a caller provides when submitting a command.
///
/// `cwd` and `timeout` fall back to the engine defaults when unset; `env`
/// is overlaid on top of the service's own environment.
#[derive(Clone, Debug, Default)]
pub struct JobSpec {
    pub command: CommandLine,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub env: Envs,
}

impl JobSpec {
    pub fn new(command: impl Into<CommandLine>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }
}

/// Answer to a status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusView {
    pub id: JobId,
    pub status: JobStatus,
    pub command: CommandLine,
}

/// Answer to a result query.
///
/// `stdout` stays empty and `returncode`/`error` stay `None` until the job
/// reaches a terminal status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultView {
    pub id: JobId,
    pub status: JobStatus,
    pub stdout: String,
    pub returncode: Option<i32>,
    pub error: Option<String>,
}

/// One row of a job listing, in submission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub command: CommandLine,
    pub created_at: u64,
}

/// Outcome of a cancellation request for a job that exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The cancel signal was delivered (or was already in flight).
    Cancelled,
    /// The job had already reached the given terminal status; nothing done.
    AlreadyTerminal(JobStatus),
}

/// Engine-level counters exposed to health reporting.
#[derive(Clone, Copy, Debug)]
pub struct EngineStats {
    pub jobs_count: usize,
}

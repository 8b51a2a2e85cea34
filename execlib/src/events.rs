use std::fmt;

/// Observable lifecycle state of a job.
///
/// `Running` is the only non-terminal state; every job leaves it exactly
/// once and never returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Finished,
    Error,
    Cancelled,
    Timeout,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// One element of a job's live output feed.
///
/// Subscribers receive every `Line` in the order the child emitted them,
/// followed by exactly one `Done` carrying the terminal status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    Line(String),
    Done(JobStatus),
}

/// Terminal result recorded by a runner, frozen once written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobResult {
    /// Captured output lines joined with trailing newlines.
    pub stdout: String,
    /// Exit code, `-1` when the process died abnormally (timeout kill,
    /// signal death). `None` for cancelled jobs and spawn failures.
    pub returncode: Option<i32>,
    /// Failure description, set only for the `error` status.
    pub error: Option<String>,
}

/// Join captured lines back into the classic newline-terminated form.
pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut joined = String::new();
    for line in lines {
        joined.push_str(line);
        joined.push('\n');
    }
    joined
}

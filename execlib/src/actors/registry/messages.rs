use crate::error;
use crate::events::{JobResult, JobStatus, OutputEvent};
use crate::types::{CancelOutcome, EngineStats, JobId, JobSpec, JobSummary, ResultView, StatusView};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum RegistryMessage {
    Submit {
        spec: JobSpec,
        response: oneshot::Sender<error::Result<JobId>>,
    },
    GetStatus {
        job_id: JobId,
        response: oneshot::Sender<error::Result<StatusView>>,
    },
    GetResult {
        job_id: JobId,
        response: oneshot::Sender<error::Result<ResultView>>,
    },
    Stream {
        job_id: JobId,
        response: oneshot::Sender<error::Result<mpsc::UnboundedReceiver<OutputEvent>>>,
    },
    Cancel {
        job_id: JobId,
        response: oneshot::Sender<error::Result<CancelOutcome>>,
    },
    List {
        response: oneshot::Sender<Vec<JobSummary>>,
    },
    Stats {
        response: oneshot::Sender<EngineStats>,
    },
}

/// The one terminal transition a runner reports for its job.
#[derive(Debug)]
pub struct RunnerUpdate {
    pub job_id: JobId,
    pub status: JobStatus,
    pub result: JobResult,
}

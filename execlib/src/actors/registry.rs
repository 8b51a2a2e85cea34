mod actor;
pub(crate) mod messages;

use self::actor::Registry;
use self::messages::RegistryMessage::{
    self, Cancel, GetResult, GetStatus, List, Stats, Stream, Submit,
};
use crate::config::EngineConfig;
use crate::error;
use crate::events::OutputEvent;
use crate::types::{CancelOutcome, EngineStats, JobId, JobSpec, JobSummary, ResultView, StatusView};
use tokio::sync::{mpsc, oneshot};

/// A `JobRegistry` which provides functionality for submitting commands and
/// querying job state.
///
/// This struct is actually an actor handle, the real work is done in the actor
/// spawned by `JobRegistryHandle::spawn`, but from the user perspective all
/// that matters is that this struct provides methods for managing jobs.
/// The actor-handle abstraction allows this struct to be cloned freely in a
/// multi-thread async context, without requiring an `Arc<Mutex>` or any other
/// means of synchronization.
#[derive(Clone)]
pub struct JobRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
}

impl JobRegistryHandle {
    /// Spawn a new registry configured by `config`.
    ///
    /// The registry's message queue capacity comes from the config; it limits
    /// the build-up of inbound operations.
    pub fn spawn(config: EngineConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.message_capacity);
        Registry::spawn(receiver, config);
        Self { sender }
    }

    /// Submit a command for execution.
    ///
    /// Returns as soon as the job record exists and its runner task has been
    /// launched; process spawn failures surface later through the job's
    /// status, never here. The only submission-time failure is a command gate
    /// rejection, which creates no job.
    pub async fn submit(&self, spec: JobSpec) -> error::Result<JobId> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Submit { spec, response: tx })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }

    pub async fn status(&self, job_id: JobId) -> error::Result<StatusView> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(GetStatus {
                job_id,
                response: tx,
            })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }

    pub async fn result(&self, job_id: JobId) -> error::Result<ResultView> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(GetResult {
                job_id,
                response: tx,
            })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }

    /// Subscribe to a job's live output.
    ///
    /// Every subscriber gets its own cursor: a full replay from the start of
    /// the job, the live tail, then one [`OutputEvent::Done`] carrying the
    /// terminal status. If the job is purged mid-stream the channel simply
    /// closes.
    pub async fn stream(
        &self,
        job_id: JobId,
    ) -> error::Result<mpsc::UnboundedReceiver<OutputEvent>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Stream {
                job_id,
                response: tx,
            })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }

    /// Request cancellation of a running job.
    ///
    /// Cancelling a job that already reached a terminal status is a no-op
    /// that reports that status instead of erroring.
    pub async fn cancel(&self, job_id: JobId) -> error::Result<CancelOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Cancel {
                job_id,
                response: tx,
            })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }

    /// Summaries of all retained jobs, in submission order.
    pub async fn list(&self) -> Vec<JobSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(List { response: tx })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }

    pub async fn stats(&self) -> EngineStats {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Stats { response: tx })
            .await
            .expect("JobRegistry exited");
        rx.await.expect("JobRegistry exited")
    }
}

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};

use super::messages::{RegistryMessage, RunnerUpdate};
use crate::actors::publisher::PublisherHandle;
use crate::actors::runner::RunnerHandle;
use crate::config::EngineConfig;
use crate::error::{self, Error};
use crate::events::{JobResult, JobStatus, OutputEvent};
use crate::types::{
    CancelOutcome, CommandLine, EngineStats, JobId, JobSpec, JobSummary, ResultView, StatusView,
};

/// Mutable record for one job. The registry actor is the only reader and
/// writer; each job's runner reports its single terminal transition through
/// the update channel.
struct JobRecord {
    command: CommandLine,
    created_at: u64,
    status: JobStatus,
    finished_at: Option<Instant>,
    result: Option<JobResult>,
    runner: Option<RunnerHandle>,
    publisher: PublisherHandle,
}

pub struct Registry {
    inbox: mpsc::Receiver<RegistryMessage>,
    updates_tx: mpsc::UnboundedSender<RunnerUpdate>,
    updates_rx: mpsc::UnboundedReceiver<RunnerUpdate>,
    config: EngineConfig,
    jobs: HashMap<JobId, JobRecord>,
    // insertion order of retained jobs, for listings
    order: Vec<JobId>,
}

impl Registry {
    pub fn spawn(inbox: mpsc::Receiver<RegistryMessage>, config: EngineConfig) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let actor = Self {
            inbox,
            updates_tx,
            updates_rx,
            config,
            jobs: HashMap::new(),
            order: Vec::new(),
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_msg = self.inbox.recv() => match maybe_msg {
                    Some(msg) => self.handle_message(msg),
                    // every handle dropped: records (and their runners' kill
                    // senders) drop with us, tearing live children down
                    None => return,
                },
                // never yields None: we hold a sender for runner spawns
                Some(update) = self.updates_rx.recv() => self.apply_update(update),
            }
        }
    }

    fn handle_message(&mut self, msg: RegistryMessage) {
        use self::RegistryMessage::*;
        match msg {
            Submit { spec, response } => self.submit(spec, response),
            GetStatus { job_id, response } => self.get_status(job_id, response),
            GetResult { job_id, response } => self.get_result(job_id, response),
            Stream { job_id, response } => self.stream(job_id, response),
            Cancel { job_id, response } => self.cancel(job_id, response),
            List { response } => self.list(response),
            Stats { response } => {
                let _ = response.send(EngineStats {
                    jobs_count: self.jobs.len(),
                });
            }
        }
    }

    fn submit(&mut self, spec: JobSpec, response: oneshot::Sender<error::Result<JobId>>) {
        self.purge_expired();

        if let Some(reason) = crate::gate::check(&spec.command) {
            let _ = response.send(Err(Error::Rejected(reason)));
            return;
        }

        let job_id = JobId::new_v4();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let publisher = PublisherHandle::spawn(output_rx);

        let cwd = spec
            .cwd
            .unwrap_or_else(|| self.config.base_dir.clone());
        let timeout = spec.timeout.unwrap_or(self.config.default_timeout);
        let runner = RunnerHandle::spawn(
            job_id,
            spec.command.clone(),
            cwd,
            timeout,
            spec.env,
            output_tx,
            self.updates_tx.clone(),
        );

        self.jobs.insert(
            job_id,
            JobRecord {
                command: spec.command,
                created_at: unix_now(),
                status: JobStatus::Running,
                finished_at: None,
                result: None,
                runner: Some(runner),
                publisher,
            },
        );
        self.order.push(job_id);
        tracing::info!(job_id = %job_id, "job submitted");
        let _ = response.send(Ok(job_id));
    }

    fn get_status(&self, job_id: JobId, response: oneshot::Sender<error::Result<StatusView>>) {
        let reply = match self.jobs.get(&job_id) {
            Some(record) => Ok(StatusView {
                id: job_id,
                status: record.status,
                command: record.command.clone(),
            }),
            None => Err(Error::NotFound),
        };
        let _ = response.send(reply);
    }

    fn get_result(&self, job_id: JobId, response: oneshot::Sender<error::Result<ResultView>>) {
        let reply = match self.jobs.get(&job_id) {
            Some(record) => {
                // result fields stay at their defaults until terminal
                let result = record.result.clone().unwrap_or_default();
                Ok(ResultView {
                    id: job_id,
                    status: record.status,
                    stdout: result.stdout,
                    returncode: result.returncode,
                    error: result.error,
                })
            }
            None => Err(Error::NotFound),
        };
        let _ = response.send(reply);
    }

    fn stream(
        &self,
        job_id: JobId,
        response: oneshot::Sender<error::Result<mpsc::UnboundedReceiver<OutputEvent>>>,
    ) {
        let reply = match self.jobs.get(&job_id) {
            Some(record) => {
                let (tx, rx) = mpsc::unbounded_channel();
                record.publisher.subscribe(tx);
                Ok(rx)
            }
            None => Err(Error::NotFound),
        };
        let _ = response.send(reply);
    }

    fn cancel(&mut self, job_id: JobId, response: oneshot::Sender<error::Result<CancelOutcome>>) {
        let reply = match self.jobs.get_mut(&job_id) {
            None => Err(Error::NotFound),
            Some(record) if record.status.is_terminal() => {
                Ok(CancelOutcome::AlreadyTerminal(record.status))
            }
            Some(record) => {
                // at most one signal per job; a second cancel while the
                // runner is still winding down is the same acknowledgement
                if let Some(runner) = record.runner.take() {
                    runner.cancel();
                }
                tracing::info!(job_id = %job_id, "cancel requested");
                Ok(CancelOutcome::Cancelled)
            }
        };
        let _ = response.send(reply);
    }

    fn list(&mut self, response: oneshot::Sender<Vec<JobSummary>>) {
        self.purge_expired();
        let summaries = self
            .order
            .iter()
            .filter_map(|job_id| {
                self.jobs.get(job_id).map(|record| JobSummary {
                    id: *job_id,
                    status: record.status,
                    command: record.command.clone(),
                    created_at: record.created_at,
                })
            })
            .collect();
        let _ = response.send(summaries);
    }

    /// Apply a runner's terminal transition. Transitions are one-way: a
    /// record that is already terminal is never overwritten.
    fn apply_update(&mut self, update: RunnerUpdate) {
        let RunnerUpdate {
            job_id,
            status,
            result,
        } = update;
        if let Some(record) = self.jobs.get_mut(&job_id) {
            if record.status.is_terminal() {
                return;
            }
            record.status = status;
            record.result = Some(result);
            record.finished_at = Some(Instant::now());
            record.runner = None;
            tracing::info!(job_id = %job_id, status = %status, "job reached terminal status");
        }
    }

    /// Lazy retention sweep: evict terminal jobs older than the retention
    /// window. Dropping a record drops its publisher handle, which closes
    /// any remaining subscriber streams.
    fn purge_expired(&mut self) {
        let retention = self.config.retention;
        let jobs = &mut self.jobs;
        self.order.retain(|job_id| {
            let expired = match jobs.get(job_id) {
                Some(record) => {
                    record.status.is_terminal()
                        && record
                            .finished_at
                            .map(|at| at.elapsed() > retention)
                            .unwrap_or(false)
                }
                None => true,
            };
            if expired {
                jobs.remove(job_id);
                tracing::debug!(job_id = %job_id, "purged expired job");
            }
            !expired
        });
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

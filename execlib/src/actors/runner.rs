mod actor;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::actors::registry::messages::RunnerUpdate;
use crate::events::OutputEvent;
use crate::types::{CommandLine, Envs, JobId};

pub use actor::ABNORMAL_EXIT_CODE;

/// Cancellation capability for one running job.
///
/// The runner task exclusively owns the child process; this handle only
/// carries the cancel signal. Dropping the handle without firing it (engine
/// shutdown, registry teardown) also tears the child down.
pub struct RunnerHandle {
    kill_tx: oneshot::Sender<()>,
}

impl RunnerHandle {
    /// Launch the runner task for one job.
    ///
    /// The child process is spawned inside the task, so spawn failures reach
    /// the registry as the job's `error` status rather than surfacing here.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        job_id: JobId,
        command: CommandLine,
        cwd: PathBuf,
        timeout: Duration,
        envs: Envs,
        output_tx: mpsc::UnboundedSender<OutputEvent>,
        updates_tx: mpsc::UnboundedSender<RunnerUpdate>,
    ) -> Self {
        let (kill_tx, kill_rx) = oneshot::channel();
        actor::spawn(job_id, command, cwd, timeout, envs, output_tx, updates_tx, kill_rx);
        Self { kill_tx }
    }

    /// Fire the cancel signal. Consumes the handle; at most one signal is
    /// ever delivered per job.
    pub fn cancel(self) {
        let _ = self.kill_tx.send(());
    }
}

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};

use crate::actors::registry::messages::RunnerUpdate;
use crate::events::{join_lines, JobResult, JobStatus, OutputEvent};
use crate::types::{CommandLine, Envs, JobId};

/// Exit code recorded when the process did not report one of its own:
/// timeout kill or signal death. Real exit codes are non-negative, so the
/// sentinel is unambiguous.
pub const ABNORMAL_EXIT_CODE: i32 = -1;

/// Why the read loop stopped before end-of-stream.
enum Interrupt {
    Cancel,
    Timeout,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn(
    job_id: JobId,
    command: CommandLine,
    cwd: PathBuf,
    timeout: Duration,
    envs: Envs,
    output_tx: mpsc::UnboundedSender<OutputEvent>,
    updates_tx: mpsc::UnboundedSender<RunnerUpdate>,
    kill_rx: oneshot::Receiver<()>,
) {
    tokio::spawn(async move {
        run(
            job_id, command, cwd, timeout, envs, output_tx, updates_tx, kill_rx,
        )
        .await;
    });
}

#[allow(clippy::too_many_arguments)]
async fn run(
    job_id: JobId,
    command: CommandLine,
    cwd: PathBuf,
    timeout: Duration,
    envs: Envs,
    output_tx: mpsc::UnboundedSender<OutputEvent>,
    updates_tx: mpsc::UnboundedSender<RunnerUpdate>,
    mut kill_rx: oneshot::Receiver<()>,
) {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(&command)
        .current_dir(&cwd)
        .envs(envs)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(job_id = %job_id, error = %err, "failed to spawn job process");
            let result = JobResult {
                stdout: String::new(),
                returncode: None,
                error: Some(err.to_string()),
            };
            finish(job_id, JobStatus::Error, result, &output_tx, &updates_tx);
            return;
        }
    };

    // line-oriented reads of the combined stdout/stderr stream; each decoded
    // line is visible to subscribers before the process exits
    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    let stdout_task = pump_lines(child.stdout.take(), line_tx.clone());
    let stderr_task = pump_lines(child.stderr.take(), line_tx);

    // the timeout budget covers the read loop, not submission latency
    let deadline = Instant::now() + timeout;
    let timed_out = time::sleep_until(deadline);
    tokio::pin!(timed_out);

    let mut lines: Vec<String> = Vec::new();
    let mut interrupt = None;
    loop {
        tokio::select! {
            maybe_line = line_rx.recv() => match maybe_line {
                Some(line) => {
                    let _ = output_tx.send(OutputEvent::Line(line.clone()));
                    lines.push(line);
                }
                // both pipes hit end-of-stream: the child closed its output
                None => break,
            },
            _ = &mut kill_rx => {
                interrupt = Some(Interrupt::Cancel);
                break;
            }
            _ = &mut timed_out => {
                interrupt = Some(Interrupt::Timeout);
                break;
            }
        }
    }

    let (status, result) = match interrupt {
        Some(Interrupt::Cancel) => {
            kill_and_reap(&mut child).await;
            (
                JobStatus::Cancelled,
                JobResult {
                    stdout: join_lines(&lines),
                    returncode: None,
                    error: None,
                },
            )
        }
        Some(Interrupt::Timeout) => {
            kill_and_reap(&mut child).await;
            tracing::warn!(job_id = %job_id, timeout_secs = timeout.as_secs(), "job exceeded its timeout");
            (
                JobStatus::Timeout,
                JobResult {
                    stdout: join_lines(&lines),
                    returncode: Some(ABNORMAL_EXIT_CODE),
                    error: None,
                },
            )
        }
        None => {
            let read_failure =
                pump_failure(stdout_task.await).or(pump_failure(stderr_task.await));
            if let Some(reason) = read_failure {
                kill_and_reap(&mut child).await;
                (
                    JobStatus::Error,
                    JobResult {
                        stdout: join_lines(&lines),
                        returncode: None,
                        error: Some(reason),
                    },
                )
            } else {
                // the child may still be between closing its pipes and
                // exiting; a late cancel must still win this race
                tokio::select! {
                    wait_result = child.wait() => match wait_result {
                        Ok(exit) => (
                            JobStatus::Finished,
                            JobResult {
                                stdout: join_lines(&lines),
                                returncode: Some(exit.code().unwrap_or(ABNORMAL_EXIT_CODE)),
                                error: None,
                            },
                        ),
                        Err(err) => (
                            JobStatus::Error,
                            JobResult {
                                stdout: join_lines(&lines),
                                returncode: None,
                                error: Some(err.to_string()),
                            },
                        ),
                    },
                    _ = &mut kill_rx => {
                        kill_and_reap(&mut child).await;
                        (
                            JobStatus::Cancelled,
                            JobResult {
                                stdout: join_lines(&lines),
                                returncode: None,
                                error: None,
                            },
                        )
                    }
                }
            }
        }
    };

    finish(job_id, status, result, &output_tx, &updates_tx);
}

/// Force-terminate and reap. Tolerates a child that already exited on its
/// own just before the signal: "no such process" is success here, and the
/// trailing wait guarantees no zombie is left behind.
async fn kill_and_reap(child: &mut Child) {
    let _ = child.kill().await;
    let _ = child.wait().await;
}

fn finish(
    job_id: JobId,
    status: JobStatus,
    result: JobResult,
    output_tx: &mpsc::UnboundedSender<OutputEvent>,
    updates_tx: &mpsc::UnboundedSender<RunnerUpdate>,
) {
    // done marker first so subscribers observe it with the same status the
    // registry records
    let _ = output_tx.send(OutputEvent::Done(status));
    let _ = updates_tx.send(RunnerUpdate {
        job_id,
        status,
        result,
    });
    tracing::debug!(job_id = %job_id, status = %status, "runner finished");
}

/// Read one pipe line-by-line, forwarding each decoded line as it arrives.
/// Decoding is lossy so binary output cannot wedge the read loop.
fn pump_lines<R>(
    pipe: Option<R>,
    line_tx: mpsc::UnboundedSender<String>,
) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let pipe = match pipe {
            Some(pipe) => pipe,
            None => return Ok(()),
        };
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }
            let mut line = String::from_utf8_lossy(&buf).into_owned();
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            if line_tx.send(line).is_err() {
                // runner stopped listening (timeout or cancel); stop reading
                return Ok(());
            }
        }
    })
}

fn pump_failure(joined: Result<io::Result<()>, JoinError>) -> Option<String> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) => Some(err.to_string()),
    }
}

//! Asynchronous shell-command execution engine.
//!
//! Submit a command and get a job id back immediately; the job runs in its
//! own task while you poll status, tail live output from any number of
//! subscribers, fetch the final result, or cancel it. All job state lives
//! behind one registry actor, created per service instance -- there is no
//! process-wide state.

mod actors;
mod config;
pub mod error;
mod events;
pub mod gate;
pub mod types;

// re-export the registry handle as if it is the registry itself.
pub use actors::registry::JobRegistryHandle as JobRegistry;
pub use actors::runner::ABNORMAL_EXIT_CODE;
pub use config::EngineConfig;
pub use events::{JobResult, JobStatus, OutputEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobSpec;

    #[tokio::test]
    async fn basic() {
        let registry = JobRegistry::spawn(EngineConfig::default());
        let job_id = registry
            .submit(JobSpec::new("echo hello world!"))
            .await
            .expect("job submit err");
        let mut output = registry
            .stream(job_id)
            .await
            .expect("failed to grab output stream for job");
        let mut lines = vec![];
        let mut done = None;
        while let Some(event) = output.recv().await {
            match event {
                OutputEvent::Line(line) => lines.push(line),
                OutputEvent::Done(status) => done = Some(status),
            }
        }
        assert_eq!(lines, vec!["hello world!"]);
        assert_eq!(done, Some(JobStatus::Finished));
    }
}

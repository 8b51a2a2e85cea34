use std::path::PathBuf;
use std::time::Duration;

/// Tunables for a [`JobEngine`](crate::JobEngine) instance.
///
/// Constructed by the embedding service and passed to `JobEngine::spawn`;
/// there is no process-wide state.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Working directory for jobs that do not request one.
    pub base_dir: PathBuf,
    /// Timeout applied when a submission does not carry its own.
    pub default_timeout: Duration,
    /// How long terminal jobs are retained before the sweeper evicts them.
    pub retention: Duration,
    /// Capacity of the registry's message queue. This limits the build-up
    /// of inbound operations.
    pub message_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/"),
            default_timeout: Duration::from_secs(1200),
            retention: Duration::from_secs(3600),
            message_capacity: 64,
        }
    }
}

use std::result;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Job not found")]
    NotFound,
    /// Submission was rejected by the command gate; the reason names the
    /// offending deny-list pattern.
    #[error("{0}")]
    Rejected(String),
}

pub type Result<T> = result::Result<T, Error>;

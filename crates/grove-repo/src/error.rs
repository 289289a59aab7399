//! Error types for grove-repo

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("Invalid git output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

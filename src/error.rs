use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("Rendering {url} failed: {reason}")]
    Render { url: String, reason: String },

    #[error("Unexpected content type for {url}: {found:?} (expected {expected})")]
    ContentTypeMismatch {
        url: String,
        found: String,
        expected: String,
    },
    #[error("Downloaded 0 bytes from {url}, not creating a file")]
    EmptyBody { url: String },

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Couldn't parse the config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// Errors raised by a `DailyProvider`. They never leave `TimeSeriesSource::fetch`,
/// which turns every one of them into an empty series.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response is not valid json: {0}")]
    Json(#[from] json::Error),

    #[error("provider returned an error: {0}")]
    Api(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("problem accessing the config file: {0}")]
    Io(#[from] io::Error),

    #[error("please check your config.toml syntax: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed: {0}")]
    Draw(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("couldn't prepare frame directory {path}: {source}")]
    FrameDir { path: PathBuf, source: io::Error },

    #[error("frame {index} failed: {source}")]
    Frame { index: usize, source: RenderError },

    #[error("couldn't start assembler `{program}`: {source}")]
    AssemblerSpawn { program: String, source: io::Error },

    #[error("assembler `{program}` exited with {status}")]
    AssemblerFailed { program: String, status: ExitStatus },

    #[error("no frames to assemble")]
    NoFrames,
}

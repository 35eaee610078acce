use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    // IO
    #[error("chat log {path} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Import
    #[error("{origin}:{line_no}: line does not start with a MM/DD/YYYY date: {line:?}")]
    MalformedTimestamp {
        origin: String,
        line_no: usize,
        line: String,
    },

    // Settings
    #[error("failed to parse settings in {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no chat log configured: set ChatLogFilePath or pass --log-file")]
    NoLogPath,
}

impl LogError {
    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn malformed_timestamp(origin: impl Into<String>, line_no: usize, line: &str) -> Self {
        Self::MalformedTimestamp {
            origin: origin.into(),
            line_no,
            line: line.to_string(),
        }
    }

    /// Файл просто ещё не появился / недоступен: не фатально для опроса
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

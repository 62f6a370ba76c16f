//! Error types for the bridge

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status for invalid configuration, same as the old scripts used.
pub const EXIT_INVALID_CONFIG: i32 = 2;
/// Exit status when a device, file or model cannot be opened.
pub const EXIT_OPEN_FAILED: i32 = 3;
/// Exit status for any failure after the pipeline started.
pub const EXIT_RUNTIME: i32 = 1;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not open {what} {path:?}: {source}")]
    Open {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("classifier error: {0}")]
    Model(String),
}

impl BridgeError {
    pub fn open<E>(what: &'static str, path: impl Into<PathBuf>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        BridgeError::Open {
            what,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::InvalidConfig(_) | BridgeError::Unsupported(_) => EXIT_INVALID_CONFIG,
            BridgeError::Open { .. } => EXIT_OPEN_FAILED,
            BridgeError::Io(_) | BridgeError::Csv(_) | BridgeError::Model(_) => EXIT_RUNTIME,
        }
    }
}

impl From<ort::Error> for BridgeError {
    fn from(e: ort::Error) -> Self {
        BridgeError::Model(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let config = BridgeError::InvalidConfig("window_size must be > 0".into());
        let open = BridgeError::open("serial port", "COM9", "no such device");
        let io = BridgeError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));

        assert_eq!(config.exit_code(), EXIT_INVALID_CONFIG);
        assert_eq!(open.exit_code(), EXIT_OPEN_FAILED);
        assert_eq!(io.exit_code(), EXIT_RUNTIME);
        assert_ne!(config.exit_code(), open.exit_code());
    }

    #[test]
    fn open_error_names_the_path() {
        let e = BridgeError::open("model", "./models/clap.onnx", "file not found");
        let msg = e.to_string();
        assert!(msg.contains("model"));
        assert!(msg.contains("clap.onnx"));
        assert!(msg.contains("file not found"));
    }
}

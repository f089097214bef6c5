use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

use crate::governor::Mode;
use crate::surface::Register;

/// Failure to access one register of the control surface
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("cannot read {register} from {}: {source}", .path.display())]
    Read {
        register: Register,
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("cannot write {register} to {}: {source}", .path.display())]
    Write {
        register: Register,
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("{register} contains {content:?}, expected an integer")]
    NotInteger { register: Register, content: String },
    #[error("{register} is write-only")]
    WriteOnly { register: Register },
}

/// Errors that stop the daemon before the first governor runs
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("hardware profile unavailable: {0}")]
    Hardware(#[from] SurfaceError),
    #[error("invalid hardware profile: {0}")]
    InvalidProfile(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("cannot start the stock governor: {0}")]
    Governor(#[from] ModeError),
    #[error("cannot install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Rejected mode-change requests. The `Display` text is what the caller sees.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("Invalid mode '{0}'.")]
    Invalid(String),
    #[error("Mode '{0}' is not supported.")]
    Unsupported(Mode),
    #[error("Mode change to '{0}' rejected: a previous transition failed.")]
    Conflict(Mode),
    #[error("Failed to start governor for '{mode}': {source}")]
    Spawn {
        mode: Mode,
        #[source]
        source: IoError,
    },
}

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to open I2C bus {}: {source}", .path.display())]
    BusOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind slave address {address:#04x}: {source}")]
    SlaveBind {
        address: u8,
        #[source]
        source: nix::Error,
    },

    #[error("failed to select register {register:#04x}: {source}")]
    Select {
        register: u8,
        #[source]
        source: io::Error,
    },

    #[error("failed to read register {register:#04x}: {source}")]
    Read {
        register: u8,
        #[source]
        source: io::Error,
    },

    #[error("failed to write register {register:#04x}: {source}")]
    Write {
        register: u8,
        #[source]
        source: io::Error,
    },

    #[error("failed to change scheduling policy: {0}")]
    Scheduler(#[source] io::Error),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("terminal mode change failed: {0}")]
    Terminal(#[source] nix::Error),

    #[error("failed to read key: {0}")]
    KeyRead(#[source] io::Error),

    #[error("key reader stopped without an answer")]
    KeyWaitAborted,
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Builds the error reported when a transfer moved fewer bytes than the frame.
pub(crate) fn short_transfer(kind: io::ErrorKind, done: usize, expected: usize) -> io::Error {
    io::Error::new(kind, format!("transferred {done} of {expected} bytes"))
}

//! The error taxonomy of the engine.

use std::io;

use thiserror::Error;

/// Engine errors.
///
/// Setup failures abort [`Terminal::new`](crate::Terminal::new) and
/// leave the process untouched; runtime I/O failures carry the OS error
/// and are reported to the caller without internal retries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("terminal already initialized in this process")]
    AlreadyInitialized,
    #[error("terminal is not initialized")]
    NotInitialized,
    #[error("failed to open the terminal device")]
    OpenTty(#[source] io::Error),
    #[error("failed to configure terminal attributes")]
    Termios(#[source] io::Error),
    #[error("terminal size query failed")]
    Ioctl(#[source] io::Error),
    #[error("failed to set up input readiness signalling")]
    PollSetup(#[source] io::Error),
    #[error("TERM environment variable is not set")]
    NoTerm,
    #[error("unsupported terminal: {0}")]
    UnsupportedTerm(String),
    #[error("cell ({x}, {y}) is out of bounds")]
    OutOfBounds { x: usize, y: usize },
    #[error("terminal read failed")]
    Read(#[source] io::Error),
    #[error("terminal write failed")]
    Write(#[source] io::Error),
    #[error("event wait failed")]
    Poll(#[source] io::Error),
}

impl From<vtcap::CapError> for Error {
    fn from(err: vtcap::CapError) -> Error {
        match err {
            vtcap::CapError::NoTerm => Error::NoTerm,
            vtcap::CapError::UnsupportedTerm(name) => Error::UnsupportedTerm(name),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

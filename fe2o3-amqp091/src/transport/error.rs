use std::io;

use crate::frames;

/// Transport error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Nothing was received from the peer within the idle timeout
    #[error("Idle timeout")]
    IdleTimeout,

    /// Malformed frame
    #[error(transparent)]
    Frame(frames::Error),
}

impl From<frames::Error> for Error {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(err) => Self::Io(err),
            err => Self::Frame(err),
        }
    }
}

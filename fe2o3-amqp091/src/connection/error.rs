//! Implements errors associated with the connection

use std::io;

use fe2o3_amqp091_types::definitions::CloseReason;
use tokio::task::JoinError;

use crate::{channel, frames, transport};

/// Errors associated with the connection event loop
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// This could occur only when the user attempts to close the connection
    #[error(transparent)]
    JoinError(JoinError),

    /// A frame could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] frames::Error),

    /// The broker sent a frame that is not allowed at this point
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The broker closed the connection with an error
    #[error("Connection closed by broker: {0}")]
    RemoteClosed(CloseReason),

    /// The transport was disconnected
    #[error("Connection lost")]
    ConnectionLost,

    /// Nothing was received within twice the heartbeat interval
    #[error("Idle timeout")]
    IdleTimeout,
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(err) => Self::Io(err),
            transport::Error::IdleTimeout => Self::IdleTimeout,
            transport::Error::Frame(err) => Self::MalformedFrame(err),
        }
    }
}

impl From<fe2o3_amqp091_types::Error> for Error {
    fn from(err: fe2o3_amqp091_types::Error) -> Self {
        Self::MalformedFrame(frames::Error::Payload(err))
    }
}

impl Error {
    /// The error that pending channel calls fail with when the event loop stops with `self`
    pub(crate) fn to_channel_error(&self) -> channel::Error {
        match self {
            Error::Io(_) | Error::ConnectionLost | Error::IdleTimeout | Error::JoinError(_) => {
                channel::Error::ConnectionLost
            }
            Error::MalformedFrame(err) => channel::Error::MalformedFrame(err.to_string()),
            Error::ProtocolViolation(msg) => channel::Error::ProtocolViolation(msg.clone()),
            Error::RemoteClosed(reason) => channel::Error::ConnectionClosed(reason.clone()),
        }
    }
}

/// Error associated with opening a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// IO error
    #[error("IO Error {0:?}")]
    Io(#[from] io::Error),

    /// Error parsing the url
    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    /// Only the `amqp` scheme is supported
    #[error("Invalid scheme {0}")]
    InvalidScheme(String),

    /// Domain is invalid or not found
    #[error("Invalid domain")]
    InvalidDomain,

    /// A url query parameter could not be parsed
    #[error("Invalid value {value:?} for {key}")]
    InvalidQuery {
        /// Query key
        key: String,

        /// Offending value
        value: String,
    },

    /// The broker answered with a protocol header of a different version
    #[error("Broker does not support AMQP 0-9-1, it replied with {0:?}")]
    ProtocolHeaderMismatch([u8; 8]),

    /// The broker requires a protocol version other than 0-9
    #[error("Unsupported protocol version {major}-{minor}")]
    UnsupportedVersion {
        /// Major version offered by the broker
        major: u8,

        /// Minor version offered by the broker
        minor: u8,
    },

    /// None of the broker's mechanisms is supported
    #[error("No supported authentication mechanism in {0:?}")]
    NoCommonMechanism(String),

    /// A frame could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(frames::Error),

    /// The broker sent an unexpected frame during negotiation
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The broker refused the connection, eg. with 403 ACCESS_REFUSED
    #[error("Connection refused by broker: {0}")]
    Refused(CloseReason),

    /// The transport was disconnected during negotiation
    #[error("Connection lost during negotiation")]
    ConnectionLost,

    /// The broker stayed silent during negotiation
    #[error("Idle timeout")]
    IdleTimeout,
}

impl From<frames::Error> for OpenError {
    fn from(err: frames::Error) -> Self {
        match err {
            frames::Error::Io(err) => Self::Io(err),
            frames::Error::UnexpectedProtocolHeader(header) => {
                Self::ProtocolHeaderMismatch(header)
            }
            err => Self::MalformedFrame(err),
        }
    }
}

impl From<transport::Error> for OpenError {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::Io(err) => Self::Io(err),
            transport::Error::IdleTimeout => Self::IdleTimeout,
            transport::Error::Frame(err) => err.into(),
        }
    }
}

impl From<fe2o3_amqp091_types::Error> for OpenError {
    fn from(err: fe2o3_amqp091_types::Error) -> Self {
        Self::MalformedFrame(frames::Error::Payload(err))
    }
}

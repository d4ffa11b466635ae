use fe2o3_amqp091_types::definitions::CloseReason;

/// Errors associated with a [`Channel`](crate::Channel) call.
///
/// The error is cloned when the same failure resolves more than one pending call, for
/// example when the connection is lost.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A second call was issued while one is still outstanding on the channel. No frame
    /// was sent for the second call.
    #[error("Channel {channel} already has an outstanding call")]
    DoubleWait {
        /// The channel
        channel: u16,
    },

    /// The broker closed the channel
    #[error("Channel closed by broker: {0}")]
    ChannelClosed(CloseReason),

    /// The connection was closed, either by the broker or locally
    #[error("Connection closed: {0}")]
    ConnectionClosed(CloseReason),

    /// The transport was disconnected or the broker stopped sending heartbeats
    #[error("Connection lost")]
    ConnectionLost,

    /// The broker sent a frame that is not allowed at this point
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A frame could not be decoded and the connection was torn down
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The channel is not in a state that allows the call
    #[error("Illegal channel state")]
    IllegalState,

    /// All channel ids up to the negotiated channel-max are in use
    #[error("Reached connection channel max")]
    ChannelMaxReached,

    /// The queue or binding the call refers to has been deleted
    #[error("{0} has been deleted")]
    Deleted(String),

    /// The arguments do not fit the method's field layout
    #[error(transparent)]
    InvalidArgument(#[from] fe2o3_amqp091_types::Error),
}

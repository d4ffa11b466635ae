use std::io;

/// Errors associated with encoding and decoding frames.
///
/// Any decoding error leaves the byte stream misaligned and is therefore fatal to the
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The octet after the payload is not `0xCE`
    #[error("Invalid frame end octet {0:#04x}")]
    InvalidFrameEnd(u8),

    /// The frame type octet is not a known frame type
    #[error("Unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The frame is larger than the negotiated frame-max
    #[error("Frame of {size} octets exceeds frame-max {frame_max}")]
    FrameTooLarge {
        /// Size of the frame including header and frame end
        size: usize,

        /// Negotiated frame-max
        frame_max: usize,
    },

    /// The peer answered with a protocol header, which means it does not speak 0-9-1
    #[error("Peer rejected the protocol version and sent header {0:?}")]
    UnexpectedProtocolHeader([u8; 8]),

    /// The frame payload could not be decoded or an outgoing method is invalid
    #[error(transparent)]
    Payload(#[from] fe2o3_amqp091_types::Error),
}

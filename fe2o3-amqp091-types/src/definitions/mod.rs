//! Constants and small definitions from the AMQP 0-9-1 specification

mod reply_code;
pub use reply_code::*;

/// The IANA assigned port number for AMQP
pub const PORT: u16 = 5672;

/// The IANA assigned port number for secure AMQP (amqps)
pub const SECURE_PORT: u16 = 5671;

/// major protocol version
pub const MAJOR: u8 = 0;

/// minor protocol version
pub const MINOR: u8 = 9;

/// protocol revision
pub const REVISION: u8 = 1;

/// Frame type of a method frame
pub const FRAME_METHOD: u8 = 1;

/// Frame type of a content header frame
pub const FRAME_HEADER: u8 = 2;

/// Frame type of a content body frame
pub const FRAME_BODY: u8 = 3;

/// Frame type of a heartbeat frame
pub const FRAME_HEARTBEAT: u8 = 8;

/// Every frame is terminated by this octet
pub const FRAME_END: u8 = 0xCE;

/// Size of `type || channel || size`
pub const FRAME_HEADER_SIZE: usize = 7;

/// Number of octets a frame adds around its payload (header and frame-end)
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// The lower bound for the negotiated frame-max. Peers can always send frames
/// of this size before tuning is complete.
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Class id of the connection class
pub const CLASS_CONNECTION: u16 = 10;

/// Class id of the channel class
pub const CLASS_CHANNEL: u16 = 20;

/// Class id of the exchange class
pub const CLASS_EXCHANGE: u16 = 40;

/// Class id of the queue class
pub const CLASS_QUEUE: u16 = 50;

/// Class id of the basic class
pub const CLASS_BASIC: u16 = 60;

/// Class id of the confirm class (RabbitMQ extension)
pub const CLASS_CONFIRM: u16 = 85;

/// Class id of the tx class
pub const CLASS_TX: u16 = 90;

/// The reason carried by `connection.close` and `channel.close`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Reply code, see [`ReplyCode`]
    pub reply_code: u16,

    /// Localised reply text
    pub reply_text: String,

    /// Class of the method that caused the close, 0 if none
    pub class_id: u16,

    /// Method that caused the close, 0 if none
    pub method_id: u16,
}

impl CloseReason {
    /// Creates a reason without an offending method
    pub fn new(reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            reply_code,
            reply_text: reply_text.into(),
            class_id: 0,
            method_id: 0,
        }
    }

    /// A normal close (`200 OK`)
    pub fn success() -> Self {
        Self::new(ReplyCode::SUCCESS, "OK")
    }

    /// Returns whether the close is a normal close
    pub fn is_success(&self) -> bool {
        self.reply_code == ReplyCode::SUCCESS
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.reply_code, self.reply_text)?;
        if self.class_id != 0 || self.method_id != 0 {
            write!(f, " (caused by {}.{})", self.class_id, self.method_id)?;
        }
        Ok(())
    }
}

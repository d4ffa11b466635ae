/// Reply codes carried by `connection.close` and `channel.close`
#[derive(Debug)]
pub struct ReplyCode;

impl ReplyCode {
    /// Indicates that the method completed successfully
    pub const SUCCESS: u16 = 200;

    /// The client attempted to transfer content larger than the server could accept
    pub const CONTENT_TOO_LARGE: u16 = 311;

    /// A mandatory message could not be routed
    pub const NO_ROUTE: u16 = 312;

    /// An immediate message could not be delivered
    pub const NO_CONSUMERS: u16 = 313;

    /// An operator intervened to close the connection
    pub const CONNECTION_FORCED: u16 = 320;

    /// The client tried to work with an unknown virtual host
    pub const INVALID_PATH: u16 = 402;

    /// The client attempted to work with a server entity to which it has no access
    pub const ACCESS_REFUSED: u16 = 403;

    /// The client attempted to work with a server entity that does not exist
    pub const NOT_FOUND: u16 = 404;

    /// The client attempted to work with a server entity locked by another client
    pub const RESOURCE_LOCKED: u16 = 405;

    /// The client requested a method that was not allowed because some precondition failed
    pub const PRECONDITION_FAILED: u16 = 406;

    /// The sender sent a malformed frame
    pub const FRAME_ERROR: u16 = 501;

    /// The sender sent a frame that contained illegal values for one or more fields
    pub const SYNTAX_ERROR: u16 = 502;

    /// The client sent an invalid sequence of frames
    pub const COMMAND_INVALID: u16 = 503;

    /// The client attempted to work with a channel that had not been correctly opened
    pub const CHANNEL_ERROR: u16 = 504;

    /// The peer sent a frame that was not expected
    pub const UNEXPECTED_FRAME: u16 = 505;

    /// The server could not complete the method because it lacked sufficient resources
    pub const RESOURCE_ERROR: u16 = 506;

    /// The client tried to work with some entity in a manner that is prohibited
    pub const NOT_ALLOWED: u16 = 530;

    /// The client tried to use functionality that is not implemented in the server
    pub const NOT_IMPLEMENTED: u16 = 540;

    /// The server could not complete the method because of an internal error
    pub const INTERNAL_ERROR: u16 = 541;

    /// Returns whether the code is a hard (connection-level) error
    pub fn is_hard_error(code: u16) -> bool {
        matches!(
            code,
            Self::CONNECTION_FORCED
                | Self::INVALID_PATH
                | Self::FRAME_ERROR
                | Self::SYNTAX_ERROR
                | Self::COMMAND_INVALID
                | Self::CHANNEL_ERROR
                | Self::UNEXPECTED_FRAME
                | Self::RESOURCE_ERROR
                | Self::NOT_ALLOWED
                | Self::NOT_IMPLEMENTED
                | Self::INTERNAL_ERROR
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ReplyCode;

    #[test]
    fn soft_and_hard_errors() {
        assert!(!ReplyCode::is_hard_error(ReplyCode::NOT_FOUND));
        assert!(!ReplyCode::is_hard_error(ReplyCode::PRECONDITION_FAILED));
        assert!(ReplyCode::is_hard_error(ReplyCode::UNEXPECTED_FRAME));
        assert!(ReplyCode::is_hard_error(ReplyCode::CONNECTION_FORCED));
    }
}

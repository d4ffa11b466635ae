//! Content header properties of the basic class

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    primitives::{codec, FieldTable},
    Error,
};

/// Delivery mode of a non-persistent message
pub const DELIVERY_MODE_TRANSIENT: u8 = 1;

/// Delivery mode of a persistent message
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// Properties carried by the content header of `basic` content.
///
/// Each property is optional; only the present ones are put on the wire, announced
/// by a bit in the property-flags word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProperties {
    /// MIME content type
    pub content_type: Option<String>,

    /// MIME content encoding
    pub content_encoding: Option<String>,

    /// Message header field table
    pub headers: Option<FieldTable>,

    /// Non-persistent (1) or persistent (2)
    pub delivery_mode: Option<u8>,

    /// Message priority, 0 to 9
    pub priority: Option<u8>,

    /// Application correlation identifier
    pub correlation_id: Option<String>,

    /// Address to reply to
    pub reply_to: Option<String>,

    /// Message expiration specification
    pub expiration: Option<String>,

    /// Application message identifier
    pub message_id: Option<String>,

    /// Message timestamp
    pub timestamp: Option<u64>,

    /// Message type name
    pub kind: Option<String>,

    /// Creating user id
    pub user_id: Option<String>,

    /// Creating application id
    pub app_id: Option<String>,

    /// Reserved, must be empty
    pub cluster_id: Option<String>,
}

const CONTENT_TYPE: u16 = 1 << 15;
const CONTENT_ENCODING: u16 = 1 << 14;
const HEADERS: u16 = 1 << 13;
const DELIVERY_MODE: u16 = 1 << 12;
const PRIORITY: u16 = 1 << 11;
const CORRELATION_ID: u16 = 1 << 10;
const REPLY_TO: u16 = 1 << 9;
const EXPIRATION: u16 = 1 << 8;
const MESSAGE_ID: u16 = 1 << 7;
const TIMESTAMP: u16 = 1 << 6;
const TYPE: u16 = 1 << 5;
const USER_ID: u16 = 1 << 4;
const APP_ID: u16 = 1 << 3;
const CLUSTER_ID: u16 = 1 << 2;
const CONTINUATION: u16 = 1;

impl BasicProperties {
    /// Properties of a persistent message
    pub fn persistent() -> Self {
        Self {
            delivery_mode: Some(DELIVERY_MODE_PERSISTENT),
            ..Default::default()
        }
    }

    /// Property flags word for the present properties
    pub fn flags(&self) -> u16 {
        let mut flags = 0;
        let mut set = |present: bool, bit: u16| {
            if present {
                flags |= bit
            }
        };
        set(self.content_type.is_some(), CONTENT_TYPE);
        set(self.content_encoding.is_some(), CONTENT_ENCODING);
        set(self.headers.is_some(), HEADERS);
        set(self.delivery_mode.is_some(), DELIVERY_MODE);
        set(self.priority.is_some(), PRIORITY);
        set(self.correlation_id.is_some(), CORRELATION_ID);
        set(self.reply_to.is_some(), REPLY_TO);
        set(self.expiration.is_some(), EXPIRATION);
        set(self.message_id.is_some(), MESSAGE_ID);
        set(self.timestamp.is_some(), TIMESTAMP);
        set(self.kind.is_some(), TYPE);
        set(self.user_id.is_some(), USER_ID);
        set(self.app_id.is_some(), APP_ID);
        set(self.cluster_id.is_some(), CLUSTER_ID);
        flags
    }

    /// Writes the property flags followed by the present properties
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), Error> {
        dst.put_u16(self.flags());

        let short = |dst: &mut BytesMut, value: &Option<String>| match value {
            Some(s) => codec::write_short_str(dst, s),
            None => Ok(()),
        };

        short(dst, &self.content_type)?;
        short(dst, &self.content_encoding)?;
        if let Some(headers) = &self.headers {
            codec::write_table(dst, headers)?;
        }
        if let Some(mode) = self.delivery_mode {
            dst.put_u8(mode);
        }
        if let Some(priority) = self.priority {
            dst.put_u8(priority);
        }
        short(dst, &self.correlation_id)?;
        short(dst, &self.reply_to)?;
        short(dst, &self.expiration)?;
        short(dst, &self.message_id)?;
        if let Some(timestamp) = self.timestamp {
            dst.put_u64(timestamp);
        }
        short(dst, &self.kind)?;
        short(dst, &self.user_id)?;
        short(dst, &self.app_id)?;
        short(dst, &self.cluster_id)?;
        Ok(())
    }

    /// Reads the property flags and the properties they announce.
    ///
    /// Additional flag words (continuation bit set) are consumed but carry no
    /// properties known to the basic class.
    pub fn decode(src: &mut impl Buf) -> Result<Self, Error> {
        let flags = codec::read_u16(src)?;
        let mut more = flags & CONTINUATION != 0;
        while more {
            more = codec::read_u16(src)? & CONTINUATION != 0;
        }

        let has = |bit: u16| flags & bit != 0;
        let mut props = Self::default();
        if has(CONTENT_TYPE) {
            props.content_type = Some(codec::read_short_str(src)?);
        }
        if has(CONTENT_ENCODING) {
            props.content_encoding = Some(codec::read_short_str(src)?);
        }
        if has(HEADERS) {
            props.headers = Some(codec::read_table(src)?);
        }
        if has(DELIVERY_MODE) {
            props.delivery_mode = Some(codec::read_u8(src)?);
        }
        if has(PRIORITY) {
            props.priority = Some(codec::read_u8(src)?);
        }
        if has(CORRELATION_ID) {
            props.correlation_id = Some(codec::read_short_str(src)?);
        }
        if has(REPLY_TO) {
            props.reply_to = Some(codec::read_short_str(src)?);
        }
        if has(EXPIRATION) {
            props.expiration = Some(codec::read_short_str(src)?);
        }
        if has(MESSAGE_ID) {
            props.message_id = Some(codec::read_short_str(src)?);
        }
        if has(TIMESTAMP) {
            props.timestamp = Some(codec::read_u64(src)?);
        }
        if has(TYPE) {
            props.kind = Some(codec::read_short_str(src)?);
        }
        if has(USER_ID) {
            props.user_id = Some(codec::read_short_str(src)?);
        }
        if has(APP_ID) {
            props.app_id = Some(codec::read_short_str(src)?);
        }
        if has(CLUSTER_ID) {
            props.cluster_id = Some(codec::read_short_str(src)?);
        }
        Ok(props)
    }
}

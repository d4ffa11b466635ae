//! AMQP 0-9-1 frame type and the corresponding encoder and decoder
//!
//! ```text
//! +------+---------+---------+-------------+-----------+
//! | type | channel |  size   |   payload   | frame-end |
//! +------+---------+---------+-------------+-----------+
//!   u8      u16        u32     size octets    0xCE
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use fe2o3_amqp091_types::{
    definitions::{
        CLASS_BASIC, FRAME_BODY, FRAME_END, FRAME_HEADER, FRAME_HEADER_SIZE, FRAME_HEARTBEAT,
        FRAME_METHOD, FRAME_OVERHEAD,
    },
    method::{Arg, Method, MethodId},
    primitives::codec,
    properties::BasicProperties,
};
use tokio_util::codec::{Decoder, Encoder};

mod error;
pub use error::Error;

/// AMQP 0-9-1 frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Channel the frame belongs to, 0 for the connection itself
    pub channel: u16,

    /// Frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: impl Into<u16>, body: FrameBody) -> Self {
        Self {
            channel: channel.into(),
            body,
        }
    }

    /// Creates a method frame, checking the arguments against the method catalog
    pub fn method(
        channel: u16,
        id: MethodId,
        args: Vec<Arg>,
    ) -> Result<Self, fe2o3_amqp091_types::Error> {
        let method = Method::new(id, args)?;
        Ok(Self::new(channel, FrameBody::Method(method)))
    }

    /// Creates a heartbeat frame
    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Heartbeat,
        }
    }

    /// Get the channel of the frame
    pub fn channel(&self) -> u16 {
        self.channel
    }

    /// Get the body of the frame
    pub fn body(&self) -> &FrameBody {
        &self.body
    }

    /// Consume the frame to get the frame body
    pub fn into_body(self) -> FrameBody {
        self.body
    }

    /// Returns the method id if this is a method frame
    pub fn method_id(&self) -> Option<MethodId> {
        match &self.body {
            FrameBody::Method(method) => Some(method.id()),
            _ => None,
        }
    }
}

/// Frame body
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// Method frame
    Method(Method),

    /// Content header frame
    Header(ContentHeader),

    /// Content body frame
    Body(Bytes),

    /// Heartbeat frame, which has an empty payload
    Heartbeat,
}

impl FrameBody {
    /// Writes the payload to `dst` and returns the frame type octet
    fn encode_payload(&self, dst: &mut BytesMut) -> Result<u8, fe2o3_amqp091_types::Error> {
        match self {
            FrameBody::Method(method) => {
                method.encode(dst)?;
                Ok(FRAME_METHOD)
            }
            FrameBody::Header(header) => {
                header.encode(dst)?;
                Ok(FRAME_HEADER)
            }
            FrameBody::Body(bytes) => {
                dst.extend_from_slice(bytes);
                Ok(FRAME_BODY)
            }
            FrameBody::Heartbeat => Ok(FRAME_HEARTBEAT),
        }
    }

    /// Checks that the body encodes and fits in one frame of at most `frame_max` octets
    pub fn check_size(&self, frame_max: usize) -> Result<(), fe2o3_amqp091_types::Error> {
        let mut payload = BytesMut::new();
        self.encode_payload(&mut payload)?;
        check_frame_max(payload.len(), frame_max)
    }
}

/// Checks that a payload of `payload_len` octets fits in one frame. A `frame_max` of 0
/// means there is no limit.
pub fn check_frame_max(
    payload_len: usize,
    frame_max: usize,
) -> Result<(), fe2o3_amqp091_types::Error> {
    let size = payload_len + FRAME_OVERHEAD;
    if frame_max != 0 && size > frame_max {
        return Err(fe2o3_amqp091_types::Error::FrameTooLarge { size, frame_max });
    }
    Ok(())
}

/// Content header that precedes the body frames of a content-bearing method
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHeader {
    /// Class of the content, must match the class of the preceding method
    pub class_id: u16,

    /// Unused, must be zero
    pub weight: u16,

    /// Total size of the content body
    pub body_size: u64,

    /// Content properties
    pub properties: BasicProperties,
}

impl ContentHeader {
    /// Creates the content header of a `basic` class content
    pub fn basic(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: CLASS_BASIC,
            weight: 0,
            body_size,
            properties,
        }
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), fe2o3_amqp091_types::Error> {
        dst.put_u16(self.class_id);
        dst.put_u16(self.weight);
        dst.put_u64(self.body_size);
        self.properties.encode(dst)
    }

    fn decode(src: &mut impl Buf) -> Result<Self, fe2o3_amqp091_types::Error> {
        let class_id = codec::read_u16(src)?;
        let weight = codec::read_u16(src)?;
        let body_size = codec::read_u64(src)?;
        let properties = BasicProperties::decode(src)?;
        Ok(Self {
            class_id,
            weight,
            body_size,
            properties,
        })
    }
}

/// Splits a content body into payloads that each fit in one body frame.
///
/// A `frame_max` of 0 means no limit, and an empty body produces no body frame.
pub fn split_body(mut body: Bytes, frame_max: usize) -> Vec<Bytes> {
    if frame_max == 0 {
        return match body.is_empty() {
            true => Vec::new(),
            false => vec![body],
        };
    }

    let chunk = frame_max.saturating_sub(FRAME_OVERHEAD).max(1);
    let mut chunks = Vec::with_capacity(body.len() / chunk + 1);
    while !body.is_empty() {
        let at = chunk.min(body.len());
        chunks.push(body.split_to(at));
    }
    chunks
}

/// Encoder and decoder of AMQP 0-9-1 frames
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Largest frame, including header and frame end, that may be sent or received. 0 means
    /// there is no limit
    frame_max: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FrameCodec {
    /// Creates a codec that enforces `frame_max`
    pub fn new(frame_max: usize) -> Self {
        Self { frame_max }
    }

    /// Get the frame-max enforced by the codec
    pub fn frame_max(&self) -> usize {
        self.frame_max
    }

    /// Changes the frame-max, usually after tuning
    pub fn set_frame_max(&mut self, frame_max: usize) {
        self.frame_max = frame_max;
    }

    fn check_size(&self, size: usize) -> Result<(), Error> {
        if self.frame_max != 0 && size > self.frame_max {
            return Err(Error::FrameTooLarge {
                size,
                frame_max: self.frame_max,
            });
        }
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let Frame { channel, body } = item;

        // The payload is built separately so that nothing is written to `dst` on error
        let mut payload = BytesMut::new();
        let frame_type = body.encode_payload(&mut payload)?;
        self.check_size(payload.len() + FRAME_OVERHEAD)?;

        dst.reserve(payload.len() + FRAME_OVERHEAD);
        dst.put_u8(frame_type);
        dst.put_u16(channel);
        dst.put_u32(payload.len() as u32);
        dst.put(payload);
        dst.put_u8(FRAME_END);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A broker that does not support the requested version answers with its own
        // protocol header and closes the socket
        if src.len() >= 4 && &src[..4] == b"AMQP" {
            if src.len() < 8 {
                return Ok(None);
            }
            let mut header = [0u8; 8];
            header.copy_from_slice(&src[..8]);
            return Err(Error::UnexpectedProtocolHeader(header));
        }

        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let frame_type = src[0];
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;
        let total = size + FRAME_OVERHEAD;
        self.check_size(total)?;

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame_end = src[total - 1];
        if frame_end != FRAME_END {
            return Err(Error::InvalidFrameEnd(frame_end));
        }

        src.advance(FRAME_HEADER_SIZE);
        let mut payload = src.split_to(size).freeze();
        src.advance(1);

        let body = match frame_type {
            FRAME_METHOD => FrameBody::Method(Method::decode(&mut payload)?),
            FRAME_HEADER => FrameBody::Header(ContentHeader::decode(&mut payload)?),
            FRAME_BODY => FrameBody::Body(payload),
            FRAME_HEARTBEAT => FrameBody::Heartbeat,
            other => return Err(Error::UnknownFrameType(other)),
        };
        Ok(Some(Frame { channel, body }))
    }
}

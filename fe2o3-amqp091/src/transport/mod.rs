//! Implements low level transport framing
//!
//! The transport wraps any `AsyncRead + AsyncWrite` stream with
//! [`tokio_util::codec::Framed`] and [`FrameCodec`]. Partial frames stay buffered inside
//! `Framed` until the rest of the bytes arrive. The transport also tracks how long the peer
//! has been silent and yields [`Error::IdleTimeout`] once that exceeds the idle timeout.

pub mod protocol_header;

mod error;
pub use error::Error;

use std::{task::Poll, time::Duration};

use futures_util::{Future, Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use crate::{
    frames::{Frame, FrameCodec},
    util::IdleTimeout,
};

use protocol_header::ProtocolHeader;

pin_project! {
    /// Frame level transport
    #[derive(Debug)]
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        #[pin]
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes the protocol header to the stream. This must happen before the stream is bound.
    pub async fn send_proto_header(io: &mut Io, proto_header: ProtocolHeader) -> Result<(), Error> {
        let buf: [u8; 8] = proto_header.into();
        io.write_all(&buf).await?;
        io.flush().await?;
        Ok(())
    }

    /// Binds the stream. A `frame_max` of 0 means no limit and a zero or absent idle timeout
    /// disables the timeout.
    pub fn bind(io: Io, frame_max: usize, idle_timeout: Option<Duration>) -> Self {
        let framed = Framed::new(io, FrameCodec::new(frame_max));
        let idle_timeout = match idle_timeout {
            Some(duration) => match duration.is_zero() {
                true => None,
                false => Some(IdleTimeout::new(duration)),
            },
            None => None,
        };

        Self {
            framed,
            idle_timeout,
        }
    }

    /// Get the frame-max enforced on both directions
    pub fn frame_max(&self) -> usize {
        self.framed.codec().frame_max()
    }

    /// Changes the frame-max enforced on both directions
    pub fn set_frame_max(&mut self, frame_max: usize) -> &mut Self {
        self.framed.codec_mut().set_frame_max(frame_max);
        self
    }

    /// Changes the idle timeout. A zero duration disables the timeout.
    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        let idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };

        self.idle_timeout = idle_timeout;
        self
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.project();
        this.framed.start_send(item).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_close(cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        // First poll codec
        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                if let Some(mut delay) = this.idle_timeout.as_pin_mut() {
                    delay.reset();
                }
                Poll::Ready(next.map(|item| item.map_err(Into::into)))
            }
            Poll::Pending => {
                // check if idle timeout has exceeded
                if let Some(delay) = this.idle_timeout.as_pin_mut() {
                    if let Poll::Ready(()) = delay.poll(cx) {
                        return Poll::Ready(Some(Err(Error::IdleTimeout)));
                    }
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fe2o3_amqp091_types::method::{self, Arg};
    use futures_util::{SinkExt, StreamExt};
    use tokio_test::io::Builder;

    use super::{protocol_header::ProtocolHeader, Error, Transport};
    use crate::frames::{Frame, FrameBody};

    #[tokio::test]
    async fn test_send_proto_header() {
        let mut mock = Builder::new().write(b"AMQP\x00\x00\x09\x01").build();
        Transport::send_proto_header(&mut mock, ProtocolHeader::amqp091())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_frames_over_mock_io() {
        let outgoing = Frame::method(1, method::CHANNEL_OPEN, vec![Arg::short_str("")]).unwrap();
        let mock = Builder::new()
            .write(&[1, 0, 1, 0, 0, 0, 5, 0, 20, 0, 10, 0, 0xCE])
            // The reply arrives in two reads
            .read(&[1, 0, 1, 0, 0, 0, 8, 0, 20])
            .read(&[0, 11, 0, 0, 0, 0, 0xCE])
            .build();

        let mut transport = Transport::bind(mock, 4096, None);
        transport.send(outgoing).await.unwrap();

        let incoming = transport.next().await.unwrap().unwrap();
        assert_eq!(incoming.channel, 1);
        assert_eq!(incoming.method_id(), Some(method::CHANNEL_OPEN_OK));
    }

    #[tokio::test]
    async fn test_heartbeat_frame() {
        let mock = Builder::new()
            .read(&[8, 0, 0, 0, 0, 0, 0, 0xCE])
            .build();
        let mut transport = Transport::bind(mock, 4096, None);
        let frame = transport.next().await.unwrap().unwrap();
        assert_eq!(frame.body, FrameBody::Heartbeat);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let (client, _server) = tokio::io::duplex(64);
        let mut transport = Transport::bind(client, 4096, Some(Duration::from_secs(10)));
        match transport.next().await {
            Some(Err(Error::IdleTimeout)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}

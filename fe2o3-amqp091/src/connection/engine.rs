//! The engine owns the transport and handles incoming frames, controls from the handles
//! and heartbeats one at a time

use std::time::Duration;

use fe2o3_amqp091_types::{
    definitions::{CloseReason, ReplyCode},
    method::{self, Arg, Method, MethodId},
};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::Receiver,
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    channel::{self, ChannelEvent, ChannelState, SharedCloseReason},
    control::{ChannelAlloc, ConnectionControl},
    dispatcher::{Dispatched, Dispatcher, DoubleWait, UnroutableFrame, Waiter},
    frames::{Frame, FrameBody},
    transport::{self, Transport},
    util::Running,
};

use super::{heartbeat::HeartBeat, Connection, ConnectionState, Error, OpenError};

#[derive(Debug, Clone, Copy)]
enum Handshake {
    AwaitStart,
    AwaitTune,
    AwaitOpenOk,
}

#[derive(Debug)]
pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    connection: Connection,
    dispatcher: Dispatcher,
    control: Receiver<ConnectionControl>,
    control_open: bool,
    heartbeat: HeartBeat,
    heartbeat_interval: Duration,
    last_sent: Instant,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Runs the handshake without starting the event loop. The protocol header must
    /// already be written to the transport.
    pub(crate) async fn open(
        transport: Transport<Io>,
        connection: Connection,
        control: Receiver<ConnectionControl>,
    ) -> Result<Self, OpenError> {
        let mut engine = Self {
            transport,
            connection,
            dispatcher: Dispatcher::new(),
            control,
            control_open: true,
            heartbeat: HeartBeat::never(),
            heartbeat_interval: Duration::ZERO,
            last_sent: Instant::now(),
        };
        engine.negotiate().await?;
        Ok(engine)
    }

    pub(crate) fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    async fn negotiate(&mut self) -> Result<(), OpenError> {
        let mut step = Handshake::AwaitStart;
        loop {
            let method = self.recv_handshake().await?;
            match (step, method.id()) {
                (_, method::CONNECTION_CLOSE) => {
                    let reason = close_reason(&method)?;
                    error!(%reason, "connection refused");
                    let _ = self.send(Frame::method(0, method::CONNECTION_CLOSE_OK, Vec::new())?).await;
                    self.connection.set_local_state(ConnectionState::Closed);
                    return Err(OpenError::Refused(reason));
                }
                (Handshake::AwaitStart, method::CONNECTION_START) => {
                    let start_ok = self.connection.on_start(&method)?;
                    self.send(start_ok).await?;
                    step = Handshake::AwaitTune;
                }
                (Handshake::AwaitTune, method::CONNECTION_SECURE) => {
                    let secure_ok = self.connection.on_secure()?;
                    self.send(secure_ok).await?;
                }
                (Handshake::AwaitTune, method::CONNECTION_TUNE) => {
                    let [tune_ok, open] = self.connection.on_tune(&method)?;
                    self.send(tune_ok).await?;
                    self.apply_tuning();
                    self.send(open).await?;
                    step = Handshake::AwaitOpenOk;
                }
                (Handshake::AwaitOpenOk, method::CONNECTION_OPEN_OK) => {
                    self.connection.on_open_ok();
                    return Ok(());
                }
                (step, id) => {
                    return Err(OpenError::ProtocolViolation(format!(
                        "Unexpected {} while in {:?}",
                        id, step
                    )))
                }
            }
        }
    }

    /// Receives the next method on channel 0, skipping heartbeats
    async fn recv_handshake(&mut self) -> Result<Method, OpenError> {
        loop {
            let frame = match self.transport.next().await {
                Some(frame) => frame?,
                None => return Err(OpenError::ConnectionLost),
            };
            trace!(channel = frame.channel, body = ?frame.body, "RECV");
            match frame {
                Frame {
                    channel: 0,
                    body: FrameBody::Method(method),
                } => return Ok(method),
                Frame {
                    channel: 0,
                    body: FrameBody::Heartbeat,
                } => continue,
                Frame { channel, .. } => {
                    return Err(OpenError::ProtocolViolation(format!(
                        "Unexpected frame on channel {} during negotiation",
                        channel
                    )))
                }
            }
        }
    }

    fn apply_tuning(&mut self) {
        let tuning = self.connection.tuning();
        self.transport.set_frame_max(tuning.frame_max as usize);

        let interval = Duration::from_secs(tuning.heartbeat as u64);
        self.transport.set_idle_timeout(interval * 2);
        self.heartbeat = HeartBeat::negotiated(tuning.heartbeat);
        self.heartbeat_interval = interval;
    }
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    #[instrument(name = "SEND", skip_all)]
    async fn send(&mut self, frame: Frame) -> Result<(), transport::Error> {
        trace!(channel = frame.channel, body = ?frame.body);
        self.transport.send(frame).await?;
        self.last_sent = Instant::now();
        Ok(())
    }

    #[instrument(name = "RECV", skip_all)]
    async fn on_incoming(
        &mut self,
        incoming: Result<Frame, transport::Error>,
    ) -> Result<Running, Error> {
        let frame = incoming?;
        trace!(channel = frame.channel, body = ?frame.body);

        if self.connection.local_state() == ConnectionState::Closing {
            return self.on_incoming_while_closing(frame).await;
        }

        if let FrameBody::Heartbeat = frame.body {
            return match frame.channel {
                0 => Ok(Running::Continue),
                channel => Err(Error::ProtocolViolation(format!(
                    "Heartbeat on channel {}",
                    channel
                ))),
            };
        }

        match self.dispatcher.dispatch(frame) {
            Ok(Dispatched::Resolved { channel, method }) => self.on_resolved(channel, method).await,
            Ok(Dispatched::Notification(Frame { channel: 0, body })) => {
                self.on_connection_frame(body).await
            }
            Ok(Dispatched::Notification(Frame { channel, body })) => {
                self.on_channel_frame(channel, body).await
            }
            Err(UnroutableFrame(frame)) => {
                warn!(channel = frame.channel, method = ?frame.method_id(), "Unroutable frame");
                Ok(Running::Continue)
            }
        }
    }

    /// Only `connection.close-ok` and `connection.close` matter once `connection.close` is sent
    async fn on_incoming_while_closing(&mut self, frame: Frame) -> Result<Running, Error> {
        match (frame.channel, frame.method_id()) {
            (0, Some(method::CONNECTION_CLOSE_OK)) => {
                info!("connection closed");
                Ok(Running::Stop)
            }
            (0, Some(method::CONNECTION_CLOSE)) => {
                let _ = self
                    .send(Frame::method(0, method::CONNECTION_CLOSE_OK, Vec::new())?)
                    .await;
                Ok(Running::Stop)
            }
            (channel, id) => {
                trace!(channel, method = ?id, "discarded while closing");
                Ok(Running::Continue)
            }
        }
    }

    async fn on_resolved(&mut self, channel: u16, id: MethodId) -> Result<Running, Error> {
        match id {
            method::CHANNEL_OPEN_OK => {
                let dropped = match self.connection.channel_mut(channel) {
                    Some(record) => {
                        record.state = ChannelState::Open;
                        record.events.is_closed()
                    }
                    None => false,
                };
                debug!(channel, "channel open");
                if dropped {
                    debug!(channel, "channel handle dropped while opening");
                    self.close_channel(channel).await?;
                }
            }
            method::CHANNEL_CLOSE_OK => {
                debug!(channel, "channel closed");
                self.dispatcher.unlisten(channel);
                self.connection.remove_channel(channel);
            }
            _ => {}
        }
        Ok(Running::Continue)
    }

    async fn on_connection_frame(&mut self, body: FrameBody) -> Result<Running, Error> {
        let method = match body {
            FrameBody::Method(method) => method,
            _ => {
                return Err(Error::ProtocolViolation(
                    "Content frame on channel 0".to_string(),
                ))
            }
        };

        match method.id() {
            method::CONNECTION_CLOSE => {
                let reason = close_reason(&method)?;
                self.connection.set_local_state(ConnectionState::Closed);
                self.connection
                    .set_closed(channel::Error::ConnectionClosed(reason.clone()));
                let _ = self
                    .send(Frame::method(0, method::CONNECTION_CLOSE_OK, Vec::new())?)
                    .await;

                match reason.is_success() {
                    true => {
                        info!(%reason, "connection closed by broker");
                        Ok(Running::Stop)
                    }
                    false => Err(Error::RemoteClosed(reason)),
                }
            }
            method::CONNECTION_BLOCKED => {
                let reason = method.short_str("reason")?.to_string();
                warn!(%reason, "connection blocked");
                self.connection.set_blocked(Some(reason));
                Ok(Running::Continue)
            }
            method::CONNECTION_UNBLOCKED => {
                info!("connection unblocked");
                self.connection.set_blocked(None);
                Ok(Running::Continue)
            }
            id => Err(Error::ProtocolViolation(format!(
                "Unexpected {} on channel 0",
                id
            ))),
        }
    }

    async fn on_channel_frame(&mut self, channel: u16, body: FrameBody) -> Result<Running, Error> {
        let method = match body {
            FrameBody::Method(method) => method,
            FrameBody::Header(header) => {
                self.connection.forward(channel, ChannelEvent::Header(header));
                return Ok(Running::Continue);
            }
            FrameBody::Body(payload) => {
                self.connection.forward(channel, ChannelEvent::Body(payload));
                return Ok(Running::Continue);
            }
            FrameBody::Heartbeat => return Ok(Running::Continue),
        };

        match method.id() {
            method::CHANNEL_CLOSE => {
                let reason = close_reason(&method)?;
                warn!(channel, %reason, "channel closed by broker");
                self.dispatcher
                    .fail(channel, channel::Error::ChannelClosed(reason.clone()));
                self.dispatcher.unlisten(channel);

                // The id is free from here on, a live handle keeps failing with the reason
                if let Some(record) = self.connection.remove_channel(channel) {
                    *record.closed.write() = Some(reason.clone());
                    let _ = record.events.send(ChannelEvent::Closed(reason));
                }
                self.send(Frame::method(channel, method::CHANNEL_CLOSE_OK, Vec::new())?)
                    .await?;
            }
            method::CHANNEL_CLOSE_OK => {
                // Reply to a close sent on behalf of a dropped handle
                debug!(channel, "channel closed");
                self.dispatcher.fail(channel, channel::Error::IllegalState);
                self.dispatcher.unlisten(channel);
                self.connection.remove_channel(channel);
            }
            method::CHANNEL_FLOW => {
                let active = method.bit("active")?;
                debug!(channel, active, "channel flow");
                self.send(Frame::method(
                    channel,
                    method::CHANNEL_FLOW_OK,
                    vec![Arg::Bit(active)],
                )?)
                .await?;
                self.connection.forward(channel, ChannelEvent::Method(method));
            }
            _ => self.connection.forward(channel, ChannelEvent::Method(method)),
        }
        Ok(Running::Continue)
    }

    fn check_channel(
        &self,
        channel: u16,
        closed: &SharedCloseReason,
    ) -> Result<(), channel::Error> {
        if self.connection.local_state() != ConnectionState::Open {
            return Err(self.connection.closed_error());
        }
        if let Some(reason) = closed.read().clone() {
            return Err(channel::Error::ChannelClosed(reason));
        }
        match self.connection.channel_of(channel, closed) {
            Some(record) if record.state == ChannelState::Open => Ok(()),
            _ => Err(channel::Error::IllegalState),
        }
    }

    /// A frame the codec refuses to encode only fails the call that produced it
    fn check_outgoing(&self, body: &FrameBody) -> Result<(), channel::Error> {
        body.check_size(self.transport.frame_max())?;
        Ok(())
    }

    /// Sends `channel.close` without a waiter. The reply goes through the notification path.
    async fn close_channel(&mut self, channel: u16) -> Result<(), Error> {
        let frame = Frame::method(channel, method::CHANNEL_CLOSE, close_args(&CloseReason::success()))?;
        self.send(frame).await?;
        if let Some(record) = self.connection.channel_mut(channel) {
            record.state = ChannelState::Closing;
        }
        Ok(())
    }

    async fn on_control(&mut self, control: ConnectionControl) -> Result<Running, Error> {
        match control {
            ConnectionControl::Call {
                channel,
                closed,
                method,
                responder,
            } => {
                if let Err(err) = self.check_channel(channel, &closed) {
                    let _ = responder.send(Err(err));
                    return Ok(Running::Continue);
                }

                let id = method.id();
                let replies = method.spec().replies.to_vec();
                let body = FrameBody::Method(method);
                if let Err(err) = self.check_outgoing(&body) {
                    warn!(channel, method = %id, error = %err, "call rejected");
                    let _ = responder.send(Err(err));
                    return Ok(Running::Continue);
                }

                let waiter = Waiter::new(replies, responder);
                if let Err(DoubleWait { channel, waiter }) = self.dispatcher.register(channel, waiter)
                {
                    warn!(channel, method = %id, "call while another is outstanding");
                    waiter.resolve(Err(channel::Error::DoubleWait { channel }));
                    return Ok(Running::Continue);
                }

                if id == method::CHANNEL_CLOSE {
                    if let Some(record) = self.connection.channel_mut(channel) {
                        record.state = ChannelState::Closing;
                    }
                }
                self.send(Frame::new(channel, body)).await?;
            }
            ConnectionControl::Cast {
                channel,
                closed,
                frames,
                responder,
            } => {
                let checked = self.check_channel(channel, &closed).and_then(|_| {
                    frames
                        .iter()
                        .try_for_each(|frame| self.check_outgoing(&frame.body))
                });
                if let Err(err) = checked {
                    let _ = responder.send(Err(err));
                    return Ok(Running::Continue);
                }
                for frame in frames {
                    self.send(frame).await?;
                }
                let _ = responder.send(Ok(()));
            }
            ConnectionControl::OpenChannel { responder } => {
                let (id, events, closed) = match self.connection.allocate_channel() {
                    Ok(allocated) => allocated,
                    Err(err) => {
                        let _ = responder.send(Err(err));
                        return Ok(Running::Continue);
                    }
                };

                let (waiter, open_ok) = Waiter::channel(vec![method::CHANNEL_OPEN_OK]);
                self.dispatcher.listen(id);
                if let Err(DoubleWait { waiter, .. }) = self.dispatcher.register(id, waiter) {
                    waiter.resolve(Err(channel::Error::IllegalState));
                }
                self.send(Frame::method(id, method::CHANNEL_OPEN, vec![Arg::short_str("")])?)
                    .await?;
                debug!(channel = id, "channel opening");
                let _ = responder.send(Ok(ChannelAlloc {
                    id,
                    events,
                    closed,
                    open_ok,
                }));
            }
            ConnectionControl::DropChannel { channel, closed } => {
                let state = self
                    .connection
                    .channel_of(channel, &closed)
                    .map(|record| record.state);
                // Opening is handled on open-ok, Closing on close-ok. A channel closed by the
                // broker is already forgotten.
                if let Some(ChannelState::Open) = state {
                    self.close_channel(channel).await?;
                }
            }
            ConnectionControl::Close => {
                if self.connection.local_state() == ConnectionState::Open {
                    self.start_close(CloseReason::success()).await?;
                }
            }
        }
        Ok(Running::Continue)
    }

    /// Sends `connection.close` and fails every pending call
    async fn start_close(&mut self, reason: CloseReason) -> Result<(), Error> {
        debug!(%reason, "closing connection");
        let error = channel::Error::ConnectionClosed(reason.clone());
        self.connection.set_closed(error.clone());
        self.dispatcher.drain(|| error.clone());
        self.connection.close_all_channels();

        let frame = Frame::method(0, method::CONNECTION_CLOSE, close_args(&reason))?;
        self.send(frame).await?;
        self.connection.set_local_state(ConnectionState::Closing);
        Ok(())
    }

    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        match self.connection.local_state() {
            ConnectionState::Open | ConnectionState::Closing => {}
            _ => return Ok(Running::Continue),
        }

        if self.last_sent.elapsed() >= self.heartbeat_interval / 2 {
            self.send(Frame::heartbeat()).await?;
        }
        Ok(Running::Continue)
    }

    /// Every handle is gone, which also means nobody can observe the close
    async fn on_handles_dropped(&mut self) -> Result<Running, Error> {
        debug!("all handles dropped");
        self.control_open = false;
        match self.connection.local_state() {
            ConnectionState::Open => {
                self.start_close(CloseReason::success()).await?;
                Ok(Running::Continue)
            }
            ConnectionState::Closing => Ok(Running::Continue),
            _ => Ok(Running::Stop),
        }
    }

    /// Resolves every suspended call and drops the transport
    async fn finish(&mut self, outcome: &Result<(), Error>) {
        match outcome {
            Ok(()) => {
                self.connection
                    .set_closed(channel::Error::ConnectionClosed(CloseReason::success()));
            }
            Err(err) => {
                error!(error = %err, "connection engine stopped");
                self.connection.set_closed(err.to_channel_error());

                let code = match err {
                    Error::MalformedFrame(_) => Some((ReplyCode::FRAME_ERROR, "FRAME_ERROR")),
                    Error::ProtocolViolation(_) => {
                        Some((ReplyCode::UNEXPECTED_FRAME, "UNEXPECTED_FRAME"))
                    }
                    _ => None,
                };
                if let (ConnectionState::Open, Some((code, text))) =
                    (self.connection.local_state(), code)
                {
                    let reason = CloseReason::new(code, text);
                    if let Ok(frame) = Frame::method(0, method::CONNECTION_CLOSE, close_args(&reason)) {
                        let _ = self.send(frame).await;
                    }
                }
            }
        }

        let error = self.connection.closed_error();
        self.dispatcher.drain(|| error.clone());
        self.connection.close_all_channels();
        self.connection.set_local_state(ConnectionState::Closed);
        let _ = self.transport.close().await;
    }

    async fn event_loop(mut self) -> Result<(), Error> {
        let outcome = loop {
            let result = tokio::select! {
                _ = self.heartbeat.next() => self.on_heartbeat().await,
                incoming = self.transport.next() => match incoming {
                    Some(incoming) => self.on_incoming(incoming).await,
                    None => Err(Error::ConnectionLost),
                },
                control = self.control.recv(), if self.control_open => match control {
                    Some(control) => self.on_control(control).await,
                    None => self.on_handles_dropped().await,
                },
            };

            match result {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        self.finish(&outcome).await;
        debug!("connection engine exiting event loop");
        outcome
    }
}

fn close_reason(method: &Method) -> Result<CloseReason, fe2o3_amqp091_types::Error> {
    Ok(CloseReason {
        reply_code: method.short("reply-code")?,
        reply_text: method.short_str("reply-text")?.to_string(),
        class_id: method.short("class-id")?,
        method_id: method.short("method-id")?,
    })
}

fn close_args(reason: &CloseReason) -> Vec<Arg> {
    vec![
        Arg::Short(reason.reply_code),
        Arg::short_str(reason.reply_text.as_str()),
        Arg::Short(reason.class_id),
        Arg::Short(reason.method_id),
    ]
}

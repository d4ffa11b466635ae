//! Implements the AMQP 0-9-1 Channel
//!
//! Every command on a [`Channel`] is sent through the connection engine, which registers
//! the command's expected replies with the dispatcher before writing the method frame.
//! Only one synchronous command can be outstanding per channel.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use fe2o3_amqp091_types::{
    definitions::CloseReason,
    method::{self, Arg, Method, MethodId},
    primitives::FieldTable,
    properties::BasicProperties,
};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::{
    connection::{closed_error, SharedStatus},
    control::ConnectionControl,
    frames::{check_frame_max, split_body, ContentHeader, Frame, FrameBody},
};

mod error;
mod exchange;
mod queue;

pub use error::*;
pub use exchange::*;
pub use queue::*;

/// State of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// `channel.open` is sent
    Opening,

    /// `channel.open-ok` is received
    Open,

    /// `channel.close` is sent
    Closing,

    /// The channel is closed by either side
    Closed,
}

/// Anything the broker sends on a channel that is not the reply of a command
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// An asynchronous method, eg. `basic.deliver`, `basic.return` or `channel.flow`
    Method(Method),

    /// Content header following a content-bearing method
    Header(ContentHeader),

    /// A content body frame
    Body(Bytes),

    /// The broker closed the channel
    Closed(CloseReason),
}

/// Set by the engine when the broker closes the channel. The engine forgets the channel at
/// that point, so this is what later calls on the handle fail with.
pub(crate) type SharedCloseReason = Arc<RwLock<Option<CloseReason>>>;

/// A logical channel on a connection
#[derive(Debug)]
pub struct Channel {
    id: u16,
    state: ChannelState,
    control: mpsc::Sender<ConnectionControl>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    closed: SharedCloseReason,
    status: SharedStatus,
}

impl Channel {
    pub(crate) fn new(
        id: u16,
        control: mpsc::Sender<ConnectionControl>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        closed: SharedCloseReason,
        status: SharedStatus,
    ) -> Self {
        Self {
            id,
            state: ChannelState::Opening,
            control,
            events,
            closed,
            status,
        }
    }

    /// Get the channel id
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Get the local view of the channel state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ChannelState) {
        self.state = state;
    }

    /// Receives the next asynchronous event. Returns `None` once the channel is closed and
    /// every buffered event has been taken.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        let event = self.events.recv().await;
        if let Some(ChannelEvent::Closed(_)) = &event {
            self.state = ChannelState::Closed;
        }
        event
    }

    fn ensure_not_closed_by_broker(&mut self) -> Result<(), Error> {
        let reason = self.closed.read().clone();
        match reason {
            Some(reason) => {
                self.state = ChannelState::Closed;
                Err(Error::ChannelClosed(reason))
            }
            None => Ok(()),
        }
    }

    /// Sends a synchronous method and waits for its reply
    #[instrument(skip_all, fields(channel = self.id, method = %id))]
    async fn call(&mut self, id: MethodId, args: Vec<Arg>) -> Result<Method, Error> {
        self.ensure_not_closed_by_broker()?;
        let method = Method::new(id, args)?;
        // Rejects frames the codec would fail on, which would tear down the connection
        let mut payload = BytesMut::new();
        method.encode(&mut payload)?;
        check_frame_max(payload.len(), self.frame_max())?;

        let (responder, rx) = oneshot::channel();
        self.control
            .send(ConnectionControl::Call {
                channel: self.id,
                closed: self.closed.clone(),
                method,
                responder,
            })
            .await
            .map_err(|_| closed_error(&self.status))?;

        let result = rx.await.map_err(|_| closed_error(&self.status))?;
        if let Err(Error::ChannelClosed(_)) = &result {
            self.state = ChannelState::Closed;
        }
        result
    }

    fn frame_max(&self) -> usize {
        self.status.read().tuning.frame_max as usize
    }

    /// Sends frames that expect no reply
    async fn cast(&mut self, frames: Vec<Frame>) -> Result<(), Error> {
        self.ensure_not_closed_by_broker()?;
        let (responder, rx) = oneshot::channel();
        self.control
            .send(ConnectionControl::Cast {
                channel: self.id,
                closed: self.closed.clone(),
                frames,
                responder,
            })
            .await
            .map_err(|_| closed_error(&self.status))?;
        rx.await.map_err(|_| closed_error(&self.status))?
    }

    async fn cast_method(&mut self, id: MethodId, args: Vec<Arg>) -> Result<(), Error> {
        let frame = Frame::method(self.id, id, args)?;
        self.cast(vec![frame]).await
    }

    /// Declares a queue. An empty name asks the broker to generate one.
    pub async fn declare_queue(
        &mut self,
        name: impl Into<String>,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
    ) -> Result<Queue, Error> {
        let options = QueueOptions {
            durable,
            exclusive,
            auto_delete,
            ..Default::default()
        };
        self.declare_queue_with(name, options).await
    }

    /// Declares a queue with the full set of `queue.declare` options
    pub async fn declare_queue_with(
        &mut self,
        name: impl Into<String>,
        options: QueueOptions,
    ) -> Result<Queue, Error> {
        let QueueOptions {
            passive,
            durable,
            exclusive,
            auto_delete,
            arguments,
        } = options;
        let reply = self
            .call(
                method::QUEUE_DECLARE,
                vec![
                    Arg::Short(0),
                    Arg::short_str(name),
                    Arg::Bit(passive),
                    Arg::Bit(durable),
                    Arg::Bit(exclusive),
                    Arg::Bit(auto_delete),
                    Arg::Bit(false),
                    Arg::Table(arguments),
                ],
            )
            .await?;

        Ok(Queue {
            name: reply.short_str("queue")?.to_string(),
            durable,
            exclusive,
            auto_delete,
            message_count: reply.long("message-count")?,
            consumer_count: reply.long("consumer-count")?,
            deleted: false,
        })
    }

    /// Declares an exchange
    pub async fn declare_exchange(
        &mut self,
        name: impl Into<String>,
        kind: ExchangeKind,
        durable: bool,
        auto_delete: bool,
        internal: bool,
    ) -> Result<Exchange, Error> {
        let options = ExchangeOptions {
            durable,
            auto_delete,
            internal,
            ..Default::default()
        };
        self.declare_exchange_with(name, kind, options).await
    }

    /// Declares an exchange with the full set of `exchange.declare` options
    pub async fn declare_exchange_with(
        &mut self,
        name: impl Into<String>,
        kind: ExchangeKind,
        options: ExchangeOptions,
    ) -> Result<Exchange, Error> {
        let name = name.into();
        let ExchangeOptions {
            passive,
            durable,
            auto_delete,
            internal,
            arguments,
        } = options;
        self.call(
            method::EXCHANGE_DECLARE,
            vec![
                Arg::Short(0),
                Arg::short_str(name.as_str()),
                Arg::short_str(kind.as_str()),
                Arg::Bit(passive),
                Arg::Bit(durable),
                Arg::Bit(auto_delete),
                Arg::Bit(internal),
                Arg::Bit(false),
                Arg::Table(arguments),
            ],
        )
        .await?;

        Ok(Exchange {
            name,
            kind,
            durable,
            auto_delete,
            internal,
        })
    }

    /// Deletes an exchange
    pub async fn delete_exchange(&mut self, name: &str, if_unused: bool) -> Result<(), Error> {
        self.call(
            method::EXCHANGE_DELETE,
            vec![
                Arg::Short(0),
                Arg::short_str(name),
                Arg::Bit(if_unused),
                Arg::Bit(false),
            ],
        )
        .await
        .map(|_| ())
    }

    /// Binds `destination` to `source`
    pub async fn bind_exchange(
        &mut self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        self.call(
            method::EXCHANGE_BIND,
            exchange_binding_args(destination, source, routing_key),
        )
        .await
        .map(|_| ())
    }

    /// Removes a binding between two exchanges
    pub async fn unbind_exchange(
        &mut self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        self.call(
            method::EXCHANGE_UNBIND,
            exchange_binding_args(destination, source, routing_key),
        )
        .await
        .map(|_| ())
    }

    /// Binds a queue to an exchange
    pub async fn bind_queue(
        &mut self,
        queue: &Queue,
        exchange: &str,
        routing_key: &str,
    ) -> Result<QueueBinding, Error> {
        queue.ensure_not_deleted()?;
        self.call(
            method::QUEUE_BIND,
            vec![
                Arg::Short(0),
                Arg::short_str(queue.name.as_str()),
                Arg::short_str(exchange),
                Arg::short_str(routing_key),
                Arg::Bit(false),
                Arg::Table(FieldTable::new()),
            ],
        )
        .await?;

        Ok(QueueBinding {
            queue: queue.name.clone(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            unbound: false,
        })
    }

    /// Removes a binding. Fails with [`Error::Deleted`] if it was already removed.
    pub async fn unbind_queue(&mut self, binding: &mut QueueBinding) -> Result<(), Error> {
        binding.ensure_bound()?;
        self.call(
            method::QUEUE_UNBIND,
            vec![
                Arg::Short(0),
                Arg::short_str(binding.queue.as_str()),
                Arg::short_str(binding.exchange.as_str()),
                Arg::short_str(binding.routing_key.as_str()),
                Arg::Table(FieldTable::new()),
            ],
        )
        .await?;
        binding.unbound = true;
        Ok(())
    }

    /// Removes every message that is not awaiting acknowledgement. Returns the number of
    /// purged messages.
    pub async fn purge_queue(&mut self, queue: &Queue) -> Result<u32, Error> {
        queue.ensure_not_deleted()?;
        let reply = self
            .call(
                method::QUEUE_PURGE,
                vec![
                    Arg::Short(0),
                    Arg::short_str(queue.name.as_str()),
                    Arg::Bit(false),
                ],
            )
            .await?;
        Ok(reply.long("message-count")?)
    }

    /// Deletes a queue. Returns the number of messages deleted with it.
    pub async fn delete_queue(
        &mut self,
        queue: &mut Queue,
        if_unused: bool,
        if_empty: bool,
    ) -> Result<u32, Error> {
        queue.ensure_not_deleted()?;
        let reply = self
            .call(
                method::QUEUE_DELETE,
                vec![
                    Arg::Short(0),
                    Arg::short_str(queue.name.as_str()),
                    Arg::Bit(if_unused),
                    Arg::Bit(if_empty),
                    Arg::Bit(false),
                ],
            )
            .await?;
        queue.deleted = true;
        Ok(reply.long("message-count")?)
    }

    /// Limits the number of unacknowledged deliveries
    pub async fn basic_qos(
        &mut self,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        self.call(
            method::BASIC_QOS,
            vec![
                Arg::Long(prefetch_size),
                Arg::Short(prefetch_count),
                Arg::Bit(global),
            ],
        )
        .await
        .map(|_| ())
    }

    /// Starts a consumer. Deliveries arrive through [`Channel::next_event`] as a
    /// `basic.deliver` method followed by its content header and body frames.
    ///
    /// Returns the consumer tag, generated by the broker if `consumer_tag` is empty.
    pub async fn basic_consume(
        &mut self,
        queue: &Queue,
        consumer_tag: &str,
        no_ack: bool,
        exclusive: bool,
    ) -> Result<String, Error> {
        queue.ensure_not_deleted()?;
        let reply = self
            .call(
                method::BASIC_CONSUME,
                vec![
                    Arg::Short(0),
                    Arg::short_str(queue.name.as_str()),
                    Arg::short_str(consumer_tag),
                    Arg::Bit(false),
                    Arg::Bit(no_ack),
                    Arg::Bit(exclusive),
                    Arg::Bit(false),
                    Arg::Table(FieldTable::new()),
                ],
            )
            .await?;
        Ok(reply.short_str("consumer-tag")?.to_string())
    }

    /// Cancels a consumer
    pub async fn basic_cancel(&mut self, consumer_tag: &str) -> Result<(), Error> {
        self.call(
            method::BASIC_CANCEL,
            vec![Arg::short_str(consumer_tag), Arg::Bit(false)],
        )
        .await
        .map(|_| ())
    }

    /// Fetches one message. Returns the `basic.get-ok` method, whose content header and body
    /// follow through [`Channel::next_event`], or `None` if the queue is empty.
    pub async fn basic_get(&mut self, queue: &Queue, no_ack: bool) -> Result<Option<Method>, Error> {
        queue.ensure_not_deleted()?;
        let reply = self
            .call(
                method::BASIC_GET,
                vec![
                    Arg::Short(0),
                    Arg::short_str(queue.name.as_str()),
                    Arg::Bit(no_ack),
                ],
            )
            .await?;
        match reply.id() {
            method::BASIC_GET_EMPTY => Ok(None),
            _ => Ok(Some(reply)),
        }
    }

    /// Publishes a message. The body is split into as many body frames as the negotiated
    /// frame-max requires. No reply is awaited.
    pub async fn basic_publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        properties: BasicProperties,
        body: impl Into<Bytes>,
    ) -> Result<(), Error> {
        let body = body.into();
        let frame_max = self.frame_max();

        let publish = Frame::method(
            self.id,
            method::BASIC_PUBLISH,
            vec![
                Arg::Short(0),
                Arg::short_str(exchange),
                Arg::short_str(routing_key),
                Arg::Bit(mandatory),
                Arg::Bit(false),
            ],
        )?;
        let header = FrameBody::Header(ContentHeader::basic(body.len() as u64, properties));
        publish.body.check_size(frame_max)?;
        header.check_size(frame_max)?;

        let chunks = split_body(body, frame_max);
        let mut frames = Vec::with_capacity(chunks.len() + 2);
        frames.push(publish);
        frames.push(Frame::new(self.id, header));
        frames.extend(
            chunks
                .into_iter()
                .map(|chunk| Frame::new(self.id, FrameBody::Body(chunk))),
        );
        debug!(channel = self.id, frames = frames.len(), "publish");
        self.cast(frames).await
    }

    /// Acknowledges a delivery
    pub async fn basic_ack(&mut self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        self.cast_method(
            method::BASIC_ACK,
            vec![Arg::LongLong(delivery_tag), Arg::Bit(multiple)],
        )
        .await
    }

    /// Rejects a delivery
    pub async fn basic_reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.cast_method(
            method::BASIC_REJECT,
            vec![Arg::LongLong(delivery_tag), Arg::Bit(requeue)],
        )
        .await
    }

    /// Rejects one or more deliveries
    pub async fn basic_nack(
        &mut self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        self.cast_method(
            method::BASIC_NACK,
            vec![
                Arg::LongLong(delivery_tag),
                Arg::Bit(multiple),
                Arg::Bit(requeue),
            ],
        )
        .await
    }

    /// Asks the broker to pause or resume deliveries. Returns the state confirmed by the
    /// broker.
    pub async fn flow(&mut self, active: bool) -> Result<bool, Error> {
        let reply = self
            .call(method::CHANNEL_FLOW, vec![Arg::Bit(active)])
            .await?;
        Ok(reply.bit("active")?)
    }

    /// Puts the channel in publisher confirm mode. Confirms arrive as `basic.ack` and
    /// `basic.nack` events.
    pub async fn confirm_select(&mut self) -> Result<(), Error> {
        self.call(method::CONFIRM_SELECT, vec![Arg::Bit(false)])
            .await
            .map(|_| ())
    }

    /// Puts the channel in transactional mode
    pub async fn tx_select(&mut self) -> Result<(), Error> {
        self.call(method::TX_SELECT, Vec::new()).await.map(|_| ())
    }

    /// Commits the current transaction
    pub async fn tx_commit(&mut self) -> Result<(), Error> {
        self.call(method::TX_COMMIT, Vec::new()).await.map(|_| ())
    }

    /// Rolls back the current transaction
    pub async fn tx_rollback(&mut self) -> Result<(), Error> {
        self.call(method::TX_ROLLBACK, Vec::new()).await.map(|_| ())
    }

    /// Closes the channel and waits for `channel.close-ok`
    pub async fn close(&mut self) -> Result<(), Error> {
        if self.state == ChannelState::Closed {
            return Ok(());
        }

        let reason = CloseReason::success();
        self.state = ChannelState::Closing;
        self.call(
            method::CHANNEL_CLOSE,
            vec![
                Arg::Short(reason.reply_code),
                Arg::short_str(reason.reply_text),
                Arg::Short(0),
                Arg::Short(0),
            ],
        )
        .await?;
        self.state = ChannelState::Closed;
        Ok(())
    }
}

fn exchange_binding_args(destination: &str, source: &str, routing_key: &str) -> Vec<Arg> {
    vec![
        Arg::Short(0),
        Arg::short_str(destination),
        Arg::short_str(source),
        Arg::short_str(routing_key),
        Arg::Bit(false),
        Arg::Table(FieldTable::new()),
    ]
}

impl Drop for Channel {
    fn drop(&mut self) {
        let _ = self.control.try_send(ConnectionControl::DropChannel {
            channel: self.id,
            closed: self.closed.clone(),
        });
    }
}

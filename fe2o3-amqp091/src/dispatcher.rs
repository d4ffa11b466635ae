//! Routing of incoming frames to the call waiting on a channel
//!
//! AMQP 0-9-1 replies carry no request id. A reply is matched to its request only by the
//! channel it arrives on and by being one of the methods the request can be answered with.
//! The [`Dispatcher`] therefore holds at most one [`Waiter`] per channel. Frames that do not
//! resolve a waiter are handed back to the connection engine as notifications, provided the
//! channel is known.

use std::collections::{BTreeMap, BTreeSet};

use fe2o3_amqp091_types::method::{Method, MethodId};
use tokio::sync::oneshot;
use tracing::trace;

use crate::{
    channel,
    frames::{Frame, FrameBody},
};

/// Result delivered to a waiting call
pub type WaiterResult = Result<Method, channel::Error>;

/// The single call entitled to the next matching reply on a channel
#[derive(Debug)]
pub struct Waiter {
    expected: Vec<MethodId>,
    responder: oneshot::Sender<WaiterResult>,
}

impl Waiter {
    /// Creates a waiter that is resolved by any of the `expected` methods
    pub fn new(expected: Vec<MethodId>, responder: oneshot::Sender<WaiterResult>) -> Self {
        Self {
            expected,
            responder,
        }
    }

    /// Creates a waiter together with the receiving end of its completion
    pub fn channel(expected: Vec<MethodId>) -> (Self, oneshot::Receiver<WaiterResult>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(expected, tx), rx)
    }

    /// Returns whether `id` resolves this waiter
    pub fn expects(&self, id: MethodId) -> bool {
        self.expected.contains(&id)
    }

    /// Resolves the waiter. The caller may have given up waiting, in which case the
    /// result is dropped.
    pub fn resolve(self, result: WaiterResult) {
        let _ = self.responder.send(result);
    }
}

/// A waiter is already registered on the channel
#[derive(Debug, thiserror::Error)]
#[error("Channel {channel} already has a registered waiter")]
pub struct DoubleWait {
    /// The channel
    pub channel: u16,

    /// The rejected waiter, handed back so that it can be failed
    pub waiter: Waiter,
}

/// A frame arrived on a channel with neither a waiter nor a notification path
#[derive(Debug, thiserror::Error)]
#[error("No waiter or listener for frame on channel {}", .0.channel)]
pub struct UnroutableFrame(pub Frame);

/// Outcome of [`Dispatcher::dispatch`]
#[derive(Debug)]
pub enum Dispatched {
    /// The frame resolved the waiter on the channel
    Resolved {
        /// The channel
        channel: u16,

        /// Method that resolved the waiter
        method: MethodId,
    },

    /// The frame must be handled by the notification path of the channel (or of the
    /// connection for channel 0)
    Notification(Frame),
}

/// Per-connection routing table
#[derive(Debug, Default)]
pub struct Dispatcher {
    waiters: BTreeMap<u16, Waiter>,
    listeners: BTreeSet<u16>,
}

impl Dispatcher {
    /// Creates an empty routing table
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the waiter of a call on `channel`
    pub fn register(&mut self, channel: u16, waiter: Waiter) -> Result<(), DoubleWait> {
        if self.waiters.contains_key(&channel) {
            return Err(DoubleWait { channel, waiter });
        }
        self.waiters.insert(channel, waiter);
        Ok(())
    }

    /// Returns whether a call is outstanding on `channel`
    pub fn is_waiting(&self, channel: u16) -> bool {
        self.waiters.contains_key(&channel)
    }

    /// Enables the notification path of `channel`
    pub fn listen(&mut self, channel: u16) {
        self.listeners.insert(channel);
    }

    /// Disables the notification path of `channel`
    pub fn unlisten(&mut self, channel: u16) {
        self.listeners.remove(&channel);
    }

    /// Routes an incoming frame
    pub fn dispatch(&mut self, frame: Frame) -> Result<Dispatched, UnroutableFrame> {
        let Frame { channel, body } = frame;
        match body {
            FrameBody::Method(method)
                if self
                    .waiters
                    .get(&channel)
                    .map_or(false, |waiter| waiter.expects(method.id())) =>
            {
                let id = method.id();
                if let Some(waiter) = self.waiters.remove(&channel) {
                    trace!(channel, method = %id, "resolved");
                    waiter.resolve(Ok(method));
                }
                Ok(Dispatched::Resolved {
                    channel,
                    method: id,
                })
            }
            body => {
                let frame = Frame { channel, body };
                if channel == 0 || self.listeners.contains(&channel) {
                    Ok(Dispatched::Notification(frame))
                } else {
                    Err(UnroutableFrame(frame))
                }
            }
        }
    }

    /// Fails the waiter on `channel`, if any
    pub fn fail(&mut self, channel: u16, error: channel::Error) {
        if let Some(waiter) = self.waiters.remove(&channel) {
            waiter.resolve(Err(error));
        }
    }

    /// Fails every waiter and removes every notification path
    pub fn drain(&mut self, error: impl Fn() -> channel::Error) {
        for (_, waiter) in std::mem::take(&mut self.waiters) {
            waiter.resolve(Err(error()));
        }
        self.listeners.clear();
    }
}

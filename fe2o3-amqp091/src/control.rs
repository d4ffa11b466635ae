//! Controls sent from handles to the connection engine

use fe2o3_amqp091_types::method::Method;
use tokio::sync::{mpsc, oneshot};

use crate::{
    channel::{self, ChannelEvent, SharedCloseReason},
    dispatcher::WaiterResult,
    frames::Frame,
};

/// A channel id reserved by the engine, together with the receiving ends the new
/// [`Channel`](crate::Channel) is built from
#[derive(Debug)]
pub(crate) struct ChannelAlloc {
    pub id: u16,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    pub closed: SharedCloseReason,
    pub open_ok: oneshot::Receiver<WaiterResult>,
}

#[derive(Debug)]
pub(crate) enum ConnectionControl {
    /// Sends a synchronous method and resolves `responder` with its reply
    Call {
        channel: u16,
        closed: SharedCloseReason,
        method: Method,
        responder: oneshot::Sender<WaiterResult>,
    },

    /// Sends frames that expect no reply
    Cast {
        channel: u16,
        closed: SharedCloseReason,
        frames: Vec<Frame>,
        responder: oneshot::Sender<Result<(), channel::Error>>,
    },

    OpenChannel {
        responder: oneshot::Sender<Result<ChannelAlloc, channel::Error>>,
    },

    /// The channel handle is dropped
    DropChannel {
        channel: u16,
        closed: SharedCloseReason,
    },

    Close,
}

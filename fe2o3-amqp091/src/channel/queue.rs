use fe2o3_amqp091_types::primitives::FieldTable;

use super::Error;

/// Options of `queue.declare`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueOptions {
    /// Only check that the queue exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Only usable by this connection and deleted when it closes
    pub exclusive: bool,

    /// Deleted once the last consumer is cancelled
    pub auto_delete: bool,

    /// Broker specific arguments, eg. `x-message-ttl`
    pub arguments: FieldTable,
}

/// A queue declared on the broker
#[derive(Debug, Clone, PartialEq)]
pub struct Queue {
    /// Name of the queue, as assigned by the broker when declared with an empty name
    pub name: String,

    /// Survives a broker restart
    pub durable: bool,

    /// Only usable by the declaring connection
    pub exclusive: bool,

    /// Deleted once the last consumer is cancelled
    pub auto_delete: bool,

    /// Number of messages reported by `queue.declare-ok`
    pub message_count: u32,

    /// Number of consumers reported by `queue.declare-ok`
    pub consumer_count: u32,

    pub(crate) deleted: bool,
}

impl Queue {
    /// Returns whether the queue was deleted through this handle
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(crate) fn ensure_not_deleted(&self) -> Result<(), Error> {
        match self.deleted {
            true => Err(Error::Deleted(format!("Queue {:?}", self.name))),
            false => Ok(()),
        }
    }
}

/// A binding between a queue and an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    /// Bound queue
    pub queue: String,

    /// Source exchange
    pub exchange: String,

    /// Routing key of the binding
    pub routing_key: String,

    pub(crate) unbound: bool,
}

impl QueueBinding {
    /// Returns whether the binding was removed through this handle
    pub fn is_unbound(&self) -> bool {
        self.unbound
    }

    pub(crate) fn ensure_bound(&self) -> Result<(), Error> {
        match self.unbound {
            true => Err(Error::Deleted(format!(
                "Binding of {:?} to {:?}",
                self.queue, self.exchange
            ))),
            false => Ok(()),
        }
    }
}

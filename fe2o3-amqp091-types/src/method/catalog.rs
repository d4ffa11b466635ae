//! Method ids and the field layout of every method in AMQP 0-9-1, including the
//! RabbitMQ extensions (`confirm`, `exchange.bind`, `basic.nack`,
//! `connection.blocked` and `connection.update-secret`).

use super::{field, ArgKind::*, FieldSpec, MethodId, MethodSpec};
use crate::definitions::{
    CLASS_BASIC, CLASS_CHANNEL, CLASS_CONFIRM, CLASS_CONNECTION, CLASS_EXCHANGE, CLASS_QUEUE,
    CLASS_TX,
};

macro_rules! method_ids {
    ($($(#[$meta:meta])* $name:ident = ($class:expr, $method:expr);)*) => {
        $(
            $(#[$meta])*
            pub const $name: MethodId = MethodId::new($class, $method);
        )*
    };
}

method_ids! {
    /// `connection.start`
    CONNECTION_START = (CLASS_CONNECTION, 10);
    /// `connection.start-ok`
    CONNECTION_START_OK = (CLASS_CONNECTION, 11);
    /// `connection.secure`
    CONNECTION_SECURE = (CLASS_CONNECTION, 20);
    /// `connection.secure-ok`
    CONNECTION_SECURE_OK = (CLASS_CONNECTION, 21);
    /// `connection.tune`
    CONNECTION_TUNE = (CLASS_CONNECTION, 30);
    /// `connection.tune-ok`
    CONNECTION_TUNE_OK = (CLASS_CONNECTION, 31);
    /// `connection.open`
    CONNECTION_OPEN = (CLASS_CONNECTION, 40);
    /// `connection.open-ok`
    CONNECTION_OPEN_OK = (CLASS_CONNECTION, 41);
    /// `connection.close`
    CONNECTION_CLOSE = (CLASS_CONNECTION, 50);
    /// `connection.close-ok`
    CONNECTION_CLOSE_OK = (CLASS_CONNECTION, 51);
    /// `connection.blocked`
    CONNECTION_BLOCKED = (CLASS_CONNECTION, 60);
    /// `connection.unblocked`
    CONNECTION_UNBLOCKED = (CLASS_CONNECTION, 61);
    /// `connection.update-secret`
    CONNECTION_UPDATE_SECRET = (CLASS_CONNECTION, 70);
    /// `connection.update-secret-ok`
    CONNECTION_UPDATE_SECRET_OK = (CLASS_CONNECTION, 71);

    /// `channel.open`
    CHANNEL_OPEN = (CLASS_CHANNEL, 10);
    /// `channel.open-ok`
    CHANNEL_OPEN_OK = (CLASS_CHANNEL, 11);
    /// `channel.flow`
    CHANNEL_FLOW = (CLASS_CHANNEL, 20);
    /// `channel.flow-ok`
    CHANNEL_FLOW_OK = (CLASS_CHANNEL, 21);
    /// `channel.close`
    CHANNEL_CLOSE = (CLASS_CHANNEL, 40);
    /// `channel.close-ok`
    CHANNEL_CLOSE_OK = (CLASS_CHANNEL, 41);

    /// `exchange.declare`
    EXCHANGE_DECLARE = (CLASS_EXCHANGE, 10);
    /// `exchange.declare-ok`
    EXCHANGE_DECLARE_OK = (CLASS_EXCHANGE, 11);
    /// `exchange.delete`
    EXCHANGE_DELETE = (CLASS_EXCHANGE, 20);
    /// `exchange.delete-ok`
    EXCHANGE_DELETE_OK = (CLASS_EXCHANGE, 21);
    /// `exchange.bind`
    EXCHANGE_BIND = (CLASS_EXCHANGE, 30);
    /// `exchange.bind-ok`
    EXCHANGE_BIND_OK = (CLASS_EXCHANGE, 31);
    /// `exchange.unbind`
    EXCHANGE_UNBIND = (CLASS_EXCHANGE, 40);
    /// `exchange.unbind-ok`
    EXCHANGE_UNBIND_OK = (CLASS_EXCHANGE, 51);

    /// `queue.declare`
    QUEUE_DECLARE = (CLASS_QUEUE, 10);
    /// `queue.declare-ok`
    QUEUE_DECLARE_OK = (CLASS_QUEUE, 11);
    /// `queue.bind`
    QUEUE_BIND = (CLASS_QUEUE, 20);
    /// `queue.bind-ok`
    QUEUE_BIND_OK = (CLASS_QUEUE, 21);
    /// `queue.purge`
    QUEUE_PURGE = (CLASS_QUEUE, 30);
    /// `queue.purge-ok`
    QUEUE_PURGE_OK = (CLASS_QUEUE, 31);
    /// `queue.delete`
    QUEUE_DELETE = (CLASS_QUEUE, 40);
    /// `queue.delete-ok`
    QUEUE_DELETE_OK = (CLASS_QUEUE, 41);
    /// `queue.unbind`
    QUEUE_UNBIND = (CLASS_QUEUE, 50);
    /// `queue.unbind-ok`
    QUEUE_UNBIND_OK = (CLASS_QUEUE, 51);

    /// `basic.qos`
    BASIC_QOS = (CLASS_BASIC, 10);
    /// `basic.qos-ok`
    BASIC_QOS_OK = (CLASS_BASIC, 11);
    /// `basic.consume`
    BASIC_CONSUME = (CLASS_BASIC, 20);
    /// `basic.consume-ok`
    BASIC_CONSUME_OK = (CLASS_BASIC, 21);
    /// `basic.cancel`
    BASIC_CANCEL = (CLASS_BASIC, 30);
    /// `basic.cancel-ok`
    BASIC_CANCEL_OK = (CLASS_BASIC, 31);
    /// `basic.publish`
    BASIC_PUBLISH = (CLASS_BASIC, 40);
    /// `basic.return`
    BASIC_RETURN = (CLASS_BASIC, 50);
    /// `basic.deliver`
    BASIC_DELIVER = (CLASS_BASIC, 60);
    /// `basic.get`
    BASIC_GET = (CLASS_BASIC, 70);
    /// `basic.get-ok`
    BASIC_GET_OK = (CLASS_BASIC, 71);
    /// `basic.get-empty`
    BASIC_GET_EMPTY = (CLASS_BASIC, 72);
    /// `basic.ack`
    BASIC_ACK = (CLASS_BASIC, 80);
    /// `basic.reject`
    BASIC_REJECT = (CLASS_BASIC, 90);
    /// `basic.recover-async`
    BASIC_RECOVER_ASYNC = (CLASS_BASIC, 100);
    /// `basic.recover`
    BASIC_RECOVER = (CLASS_BASIC, 110);
    /// `basic.recover-ok`
    BASIC_RECOVER_OK = (CLASS_BASIC, 111);
    /// `basic.nack`
    BASIC_NACK = (CLASS_BASIC, 120);

    /// `confirm.select`
    CONFIRM_SELECT = (CLASS_CONFIRM, 10);
    /// `confirm.select-ok`
    CONFIRM_SELECT_OK = (CLASS_CONFIRM, 11);

    /// `tx.select`
    TX_SELECT = (CLASS_TX, 10);
    /// `tx.select-ok`
    TX_SELECT_OK = (CLASS_TX, 11);
    /// `tx.commit`
    TX_COMMIT = (CLASS_TX, 20);
    /// `tx.commit-ok`
    TX_COMMIT_OK = (CLASS_TX, 21);
    /// `tx.rollback`
    TX_ROLLBACK = (CLASS_TX, 30);
    /// `tx.rollback-ok`
    TX_ROLLBACK_OK = (CLASS_TX, 31);
}

const NONE: &[FieldSpec] = &[];

const CLOSE_FIELDS: &[FieldSpec] = &[
    field("reply-code", Short),
    field("reply-text", ShortStr),
    field("class-id", Short),
    field("method-id", Short),
];

const TUNE_FIELDS: &[FieldSpec] = &[
    field("channel-max", Short),
    field("frame-max", Long),
    field("heartbeat", Short),
];

const EXCHANGE_BIND_FIELDS: &[FieldSpec] = &[
    field("reserved-1", Short),
    field("destination", ShortStr),
    field("source", ShortStr),
    field("routing-key", ShortStr),
    field("no-wait", Bit),
    field("arguments", Table),
];

const fn spec(
    id: MethodId,
    name: &'static str,
    fields: &'static [FieldSpec],
    replies: &'static [MethodId],
) -> MethodSpec {
    MethodSpec {
        id,
        name,
        fields,
        replies,
    }
}

/// Methods followed by a content header and body frames never expect a reply
const fn content(id: MethodId, name: &'static str, fields: &'static [FieldSpec]) -> MethodSpec {
    spec(id, name, fields, &[])
}

/// Every known method
pub static CATALOG: &[MethodSpec] = &[
    spec(
        CONNECTION_START,
        "connection.start",
        &[
            field("version-major", Octet),
            field("version-minor", Octet),
            field("server-properties", Table),
            field("mechanisms", LongStr),
            field("locales", LongStr),
        ],
        &[CONNECTION_START_OK],
    ),
    spec(
        CONNECTION_START_OK,
        "connection.start-ok",
        &[
            field("client-properties", Table),
            field("mechanism", ShortStr),
            field("response", LongStr),
            field("locale", ShortStr),
        ],
        &[],
    ),
    spec(
        CONNECTION_SECURE,
        "connection.secure",
        &[field("challenge", LongStr)],
        &[CONNECTION_SECURE_OK],
    ),
    spec(
        CONNECTION_SECURE_OK,
        "connection.secure-ok",
        &[field("response", LongStr)],
        &[],
    ),
    spec(
        CONNECTION_TUNE,
        "connection.tune",
        TUNE_FIELDS,
        &[CONNECTION_TUNE_OK],
    ),
    spec(CONNECTION_TUNE_OK, "connection.tune-ok", TUNE_FIELDS, &[]),
    spec(
        CONNECTION_OPEN,
        "connection.open",
        &[
            field("virtual-host", ShortStr),
            field("reserved-1", ShortStr),
            field("reserved-2", Bit),
        ],
        &[CONNECTION_OPEN_OK],
    ),
    spec(
        CONNECTION_OPEN_OK,
        "connection.open-ok",
        &[field("reserved-1", ShortStr)],
        &[],
    ),
    spec(
        CONNECTION_CLOSE,
        "connection.close",
        CLOSE_FIELDS,
        &[CONNECTION_CLOSE_OK],
    ),
    spec(CONNECTION_CLOSE_OK, "connection.close-ok", NONE, &[]),
    spec(
        CONNECTION_BLOCKED,
        "connection.blocked",
        &[field("reason", ShortStr)],
        &[],
    ),
    spec(CONNECTION_UNBLOCKED, "connection.unblocked", NONE, &[]),
    spec(
        CONNECTION_UPDATE_SECRET,
        "connection.update-secret",
        &[field("new-secret", LongStr), field("reason", ShortStr)],
        &[CONNECTION_UPDATE_SECRET_OK],
    ),
    spec(
        CONNECTION_UPDATE_SECRET_OK,
        "connection.update-secret-ok",
        NONE,
        &[],
    ),
    // channel
    spec(
        CHANNEL_OPEN,
        "channel.open",
        &[field("reserved-1", ShortStr)],
        &[CHANNEL_OPEN_OK],
    ),
    spec(
        CHANNEL_OPEN_OK,
        "channel.open-ok",
        &[field("reserved-1", LongStr)],
        &[],
    ),
    spec(
        CHANNEL_FLOW,
        "channel.flow",
        &[field("active", Bit)],
        &[CHANNEL_FLOW_OK],
    ),
    spec(
        CHANNEL_FLOW_OK,
        "channel.flow-ok",
        &[field("active", Bit)],
        &[],
    ),
    spec(
        CHANNEL_CLOSE,
        "channel.close",
        CLOSE_FIELDS,
        &[CHANNEL_CLOSE_OK],
    ),
    spec(CHANNEL_CLOSE_OK, "channel.close-ok", NONE, &[]),
    // exchange
    spec(
        EXCHANGE_DECLARE,
        "exchange.declare",
        &[
            field("reserved-1", Short),
            field("exchange", ShortStr),
            field("type", ShortStr),
            field("passive", Bit),
            field("durable", Bit),
            field("auto-delete", Bit),
            field("internal", Bit),
            field("no-wait", Bit),
            field("arguments", Table),
        ],
        &[EXCHANGE_DECLARE_OK],
    ),
    spec(EXCHANGE_DECLARE_OK, "exchange.declare-ok", NONE, &[]),
    spec(
        EXCHANGE_DELETE,
        "exchange.delete",
        &[
            field("reserved-1", Short),
            field("exchange", ShortStr),
            field("if-unused", Bit),
            field("no-wait", Bit),
        ],
        &[EXCHANGE_DELETE_OK],
    ),
    spec(EXCHANGE_DELETE_OK, "exchange.delete-ok", NONE, &[]),
    spec(
        EXCHANGE_BIND,
        "exchange.bind",
        EXCHANGE_BIND_FIELDS,
        &[EXCHANGE_BIND_OK],
    ),
    spec(EXCHANGE_BIND_OK, "exchange.bind-ok", NONE, &[]),
    spec(
        EXCHANGE_UNBIND,
        "exchange.unbind",
        EXCHANGE_BIND_FIELDS,
        &[EXCHANGE_UNBIND_OK],
    ),
    spec(EXCHANGE_UNBIND_OK, "exchange.unbind-ok", NONE, &[]),
    // queue
    spec(
        QUEUE_DECLARE,
        "queue.declare",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("passive", Bit),
            field("durable", Bit),
            field("exclusive", Bit),
            field("auto-delete", Bit),
            field("no-wait", Bit),
            field("arguments", Table),
        ],
        &[QUEUE_DECLARE_OK],
    ),
    spec(
        QUEUE_DECLARE_OK,
        "queue.declare-ok",
        &[
            field("queue", ShortStr),
            field("message-count", Long),
            field("consumer-count", Long),
        ],
        &[],
    ),
    spec(
        QUEUE_BIND,
        "queue.bind",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("exchange", ShortStr),
            field("routing-key", ShortStr),
            field("no-wait", Bit),
            field("arguments", Table),
        ],
        &[QUEUE_BIND_OK],
    ),
    spec(QUEUE_BIND_OK, "queue.bind-ok", NONE, &[]),
    spec(
        QUEUE_PURGE,
        "queue.purge",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("no-wait", Bit),
        ],
        &[QUEUE_PURGE_OK],
    ),
    spec(
        QUEUE_PURGE_OK,
        "queue.purge-ok",
        &[field("message-count", Long)],
        &[],
    ),
    spec(
        QUEUE_DELETE,
        "queue.delete",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("if-unused", Bit),
            field("if-empty", Bit),
            field("no-wait", Bit),
        ],
        &[QUEUE_DELETE_OK],
    ),
    spec(
        QUEUE_DELETE_OK,
        "queue.delete-ok",
        &[field("message-count", Long)],
        &[],
    ),
    spec(
        QUEUE_UNBIND,
        "queue.unbind",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("exchange", ShortStr),
            field("routing-key", ShortStr),
            field("arguments", Table),
        ],
        &[QUEUE_UNBIND_OK],
    ),
    spec(QUEUE_UNBIND_OK, "queue.unbind-ok", NONE, &[]),
    // basic
    spec(
        BASIC_QOS,
        "basic.qos",
        &[
            field("prefetch-size", Long),
            field("prefetch-count", Short),
            field("global", Bit),
        ],
        &[BASIC_QOS_OK],
    ),
    spec(BASIC_QOS_OK, "basic.qos-ok", NONE, &[]),
    spec(
        BASIC_CONSUME,
        "basic.consume",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("consumer-tag", ShortStr),
            field("no-local", Bit),
            field("no-ack", Bit),
            field("exclusive", Bit),
            field("no-wait", Bit),
            field("arguments", Table),
        ],
        &[BASIC_CONSUME_OK],
    ),
    spec(
        BASIC_CONSUME_OK,
        "basic.consume-ok",
        &[field("consumer-tag", ShortStr)],
        &[],
    ),
    spec(
        BASIC_CANCEL,
        "basic.cancel",
        &[field("consumer-tag", ShortStr), field("no-wait", Bit)],
        &[BASIC_CANCEL_OK],
    ),
    spec(
        BASIC_CANCEL_OK,
        "basic.cancel-ok",
        &[field("consumer-tag", ShortStr)],
        &[],
    ),
    content(
        BASIC_PUBLISH,
        "basic.publish",
        &[
            field("reserved-1", Short),
            field("exchange", ShortStr),
            field("routing-key", ShortStr),
            field("mandatory", Bit),
            field("immediate", Bit),
        ],
    ),
    content(
        BASIC_RETURN,
        "basic.return",
        &[
            field("reply-code", Short),
            field("reply-text", ShortStr),
            field("exchange", ShortStr),
            field("routing-key", ShortStr),
        ],
    ),
    content(
        BASIC_DELIVER,
        "basic.deliver",
        &[
            field("consumer-tag", ShortStr),
            field("delivery-tag", LongLong),
            field("redelivered", Bit),
            field("exchange", ShortStr),
            field("routing-key", ShortStr),
        ],
    ),
    spec(
        BASIC_GET,
        "basic.get",
        &[
            field("reserved-1", Short),
            field("queue", ShortStr),
            field("no-ack", Bit),
        ],
        &[BASIC_GET_OK, BASIC_GET_EMPTY],
    ),
    content(
        BASIC_GET_OK,
        "basic.get-ok",
        &[
            field("delivery-tag", LongLong),
            field("redelivered", Bit),
            field("exchange", ShortStr),
            field("routing-key", ShortStr),
            field("message-count", Long),
        ],
    ),
    spec(
        BASIC_GET_EMPTY,
        "basic.get-empty",
        &[field("reserved-1", ShortStr)],
        &[],
    ),
    spec(
        BASIC_ACK,
        "basic.ack",
        &[field("delivery-tag", LongLong), field("multiple", Bit)],
        &[],
    ),
    spec(
        BASIC_REJECT,
        "basic.reject",
        &[field("delivery-tag", LongLong), field("requeue", Bit)],
        &[],
    ),
    spec(
        BASIC_RECOVER_ASYNC,
        "basic.recover-async",
        &[field("requeue", Bit)],
        &[],
    ),
    spec(
        BASIC_RECOVER,
        "basic.recover",
        &[field("requeue", Bit)],
        &[BASIC_RECOVER_OK],
    ),
    spec(BASIC_RECOVER_OK, "basic.recover-ok", NONE, &[]),
    spec(
        BASIC_NACK,
        "basic.nack",
        &[
            field("delivery-tag", LongLong),
            field("multiple", Bit),
            field("requeue", Bit),
        ],
        &[],
    ),
    // confirm
    spec(
        CONFIRM_SELECT,
        "confirm.select",
        &[field("nowait", Bit)],
        &[CONFIRM_SELECT_OK],
    ),
    spec(CONFIRM_SELECT_OK, "confirm.select-ok", NONE, &[]),
    // tx
    spec(TX_SELECT, "tx.select", NONE, &[TX_SELECT_OK]),
    spec(TX_SELECT_OK, "tx.select-ok", NONE, &[]),
    spec(TX_COMMIT, "tx.commit", NONE, &[TX_COMMIT_OK]),
    spec(TX_COMMIT_OK, "tx.commit-ok", NONE, &[]),
    spec(TX_ROLLBACK, "tx.rollback", NONE, &[TX_ROLLBACK_OK]),
    spec(TX_ROLLBACK_OK, "tx.rollback-ok", NONE, &[]),
];

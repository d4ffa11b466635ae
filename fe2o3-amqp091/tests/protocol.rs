//! Drives the client against a scripted broker over an in-memory stream

use std::time::Duration;

use fe2o3_amqp091::{
    channel::{self, ChannelEvent, ExchangeKind},
    connection::{self, OpenError, Tuning},
    frames::{ContentHeader, Frame, FrameBody},
    types::{self, method, method::Arg, primitives::FieldTable, properties::BasicProperties},
    Connection,
};
use tokio::{io::AsyncWriteExt, sync::oneshot};

mod common;

use common::{close_args, declare_ok_args, start_args, MockBroker};

#[tokio::test]
async fn handshake_negotiates_tuning() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker
            .send_method(0, method::CONNECTION_START, start_args())
            .await;
        let start_ok = broker.expect(0, method::CONNECTION_START_OK).await;
        assert_eq!(
            &start_ok.long_str("response").unwrap()[..],
            b"\x00guest\x00guest"
        );
        assert_eq!(start_ok.short_str("locale").unwrap(), "en_US");

        broker
            .send_method(
                0,
                method::CONNECTION_TUNE,
                vec![Arg::Short(0), Arg::Long(131072), Arg::Short(600)],
            )
            .await;
        let tune_ok = broker.expect(0, method::CONNECTION_TUNE_OK).await;
        assert_eq!(tune_ok.short("channel-max").unwrap(), 0);
        assert_eq!(tune_ok.long("frame-max").unwrap(), 131072);
        assert_eq!(tune_ok.short("heartbeat").unwrap(), 600);

        let open = broker.expect(0, method::CONNECTION_OPEN).await;
        assert_eq!(open.short_str("virtual-host").unwrap(), "/");
        broker
            .send_method(0, method::CONNECTION_OPEN_OK, vec![Arg::short_str("")])
            .await;

        broker.close().await;
    })
    .await;

    assert_eq!(
        connection.tuning(),
        Tuning {
            channel_max: 0,
            frame_max: 131072,
            heartbeat: 600
        }
    );
    assert!(!connection.is_closed());
    connection.close().await.unwrap();
    assert!(connection.is_closed());
    broker.await.unwrap();
}

#[tokio::test]
async fn handshake_refused_by_broker() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let broker = tokio::spawn(async move {
        let mut broker = MockBroker::accept(server).await;
        broker
            .send_method(0, method::CONNECTION_START, start_args())
            .await;
        broker.expect(0, method::CONNECTION_START_OK).await;
        broker
            .send_method(
                0,
                method::CONNECTION_CLOSE,
                close_args(403, "ACCESS_REFUSED - Login was refused", 10, 11),
            )
            .await;
        broker.expect(0, method::CONNECTION_CLOSE_OK).await;
    });

    let result = Connection::builder()
        .password("wrong")
        .open_with_stream(client)
        .await;
    match result {
        Err(OpenError::Refused(reason)) => {
            assert_eq!(reason.reply_code, 403);
            assert_eq!((reason.class_id, reason.method_id), (10, 11));
        }
        other => panic!("unexpected {:?}", other),
    }
    broker.await.unwrap();
}

#[tokio::test]
async fn unexpected_method_during_handshake() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let _broker = tokio::spawn(async move {
        let mut broker = MockBroker::accept(server).await;
        broker
            .send_method(
                0,
                method::CONNECTION_TUNE,
                vec![Arg::Short(0), Arg::Long(131072), Arg::Short(0)],
            )
            .await;
        broker.recv_eof().await;
    });

    let result = Connection::builder().open_with_stream(client).await;
    assert!(matches!(result, Err(OpenError::ProtocolViolation(_))));
}

#[tokio::test]
async fn declare_queue_and_exchange() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;

        let declare = broker.expect(1, method::QUEUE_DECLARE).await;
        assert_eq!(declare.short_str("queue").unwrap(), "my.nice.queue");
        assert!(!declare.bit("passive").unwrap());
        assert!(declare.bit("durable").unwrap());
        assert!(declare.bit("exclusive").unwrap());
        assert!(declare.bit("auto-delete").unwrap());
        broker
            .send_method(
                1,
                method::QUEUE_DECLARE_OK,
                declare_ok_args("my.nice.queue", 123, 456),
            )
            .await;

        let declare = broker.expect(1, method::EXCHANGE_DECLARE).await;
        assert_eq!(declare.short_str("exchange").unwrap(), "my.nice.exchange");
        assert_eq!(declare.short_str("type").unwrap(), "fanout");
        assert!(declare.bit("durable").unwrap());
        assert!(!declare.bit("auto-delete").unwrap());
        assert!(!declare.bit("internal").unwrap());
        broker
            .send_method(1, method::EXCHANGE_DECLARE_OK, Vec::new())
            .await;

        let close = broker.expect(1, method::CHANNEL_CLOSE).await;
        assert_eq!(close.short("reply-code").unwrap(), 200);
        broker
            .send_method(1, method::CHANNEL_CLOSE_OK, Vec::new())
            .await;

        broker.close().await;
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    assert_eq!(channel.id(), 1);
    assert_eq!(channel.state(), channel::ChannelState::Open);

    let queue = channel
        .declare_queue("my.nice.queue", true, true, true)
        .await
        .unwrap();
    assert_eq!(queue.name, "my.nice.queue");
    assert_eq!(queue.message_count, 123);
    assert_eq!(queue.consumer_count, 456);

    let exchange = channel
        .declare_exchange("my.nice.exchange", ExchangeKind::Fanout, true, false, false)
        .await
        .unwrap();
    assert_eq!(exchange.kind, ExchangeKind::Fanout);

    channel.close().await.unwrap();
    assert_eq!(channel.state(), channel::ChannelState::Closed);
    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn queue_lifecycle_and_deleted_queue() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;

        broker.expect(1, method::QUEUE_DECLARE).await;
        broker
            .send_method(1, method::QUEUE_DECLARE_OK, declare_ok_args("q", 0, 0))
            .await;

        let bind = broker.expect(1, method::QUEUE_BIND).await;
        assert_eq!(bind.short_str("exchange").unwrap(), "amq.topic");
        assert_eq!(bind.short_str("routing-key").unwrap(), "orders.#");
        broker.send_method(1, method::QUEUE_BIND_OK, Vec::new()).await;

        broker.expect(1, method::QUEUE_UNBIND).await;
        broker
            .send_method(1, method::QUEUE_UNBIND_OK, Vec::new())
            .await;

        broker.expect(1, method::QUEUE_PURGE).await;
        broker
            .send_method(1, method::QUEUE_PURGE_OK, vec![Arg::Long(7)])
            .await;

        let delete = broker.expect(1, method::QUEUE_DELETE).await;
        assert!(delete.bit("if-unused").unwrap());
        assert!(!delete.bit("if-empty").unwrap());
        broker
            .send_method(1, method::QUEUE_DELETE_OK, vec![Arg::Long(3)])
            .await;

        broker.close().await;
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    let mut queue = channel.declare_queue("q", false, false, false).await.unwrap();

    let mut binding = channel
        .bind_queue(&queue, "amq.topic", "orders.#")
        .await
        .unwrap();
    channel.unbind_queue(&mut binding).await.unwrap();
    assert!(binding.is_unbound());
    assert!(matches!(
        channel.unbind_queue(&mut binding).await,
        Err(channel::Error::Deleted(_))
    ));

    assert_eq!(channel.purge_queue(&queue).await.unwrap(), 7);
    assert_eq!(
        channel.delete_queue(&mut queue, true, false).await.unwrap(),
        3
    );
    assert!(queue.is_deleted());
    assert!(matches!(
        channel.basic_consume(&queue, "", false, false).await,
        Err(channel::Error::Deleted(_))
    ));

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn channel_close_is_isolated() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;
        broker.open_channel(2).await;

        broker.expect(1, method::QUEUE_DECLARE).await;
        broker
            .send_method(
                1,
                method::CHANNEL_CLOSE,
                close_args(404, "NOT_FOUND - no queue 'missing'", 50, 10),
            )
            .await;
        broker.expect(1, method::CHANNEL_CLOSE_OK).await;

        broker.expect(2, method::QUEUE_DECLARE).await;
        broker
            .send_method(2, method::QUEUE_DECLARE_OK, declare_ok_args("ok", 1, 0))
            .await;

        broker.close().await;
    })
    .await;

    let mut first = connection.open_channel().await.unwrap();
    let mut second = connection.open_channel().await.unwrap();
    assert_eq!((first.id(), second.id()), (1, 2));

    let err = first
        .declare_queue("missing", false, false, false)
        .await
        .unwrap_err();
    match &err {
        channel::Error::ChannelClosed(reason) => {
            assert_eq!(reason.reply_code, 404);
            assert_eq!((reason.class_id, reason.method_id), (50, 10));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(first.state(), channel::ChannelState::Closed);

    // The closed channel fails locally without sending anything
    assert_eq!(
        first.declare_queue("again", false, false, false).await,
        Err(err)
    );

    let queue = second.declare_queue("ok", false, false, false).await.unwrap();
    assert_eq!(queue.message_count, 1);

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn channel_closed_by_broker_frees_its_id() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake_with_tune(1, 131072, 0).await;
        broker.open_channel(1).await;

        broker.expect(1, method::QUEUE_DECLARE).await;
        broker
            .send_method(
                1,
                method::CHANNEL_CLOSE,
                close_args(405, "RESOURCE_LOCKED - exclusive queue", 50, 10),
            )
            .await;
        broker.expect(1, method::CHANNEL_CLOSE_OK).await;

        broker.open_channel(1).await;
        // Dropping the stale handle sends nothing for the new channel 1
        let declare = broker.expect(1, method::QUEUE_DECLARE).await;
        assert_eq!(declare.short_str("queue").unwrap(), "fresh");
        broker
            .send_method(1, method::QUEUE_DECLARE_OK, declare_ok_args("fresh", 0, 0))
            .await;

        broker.close().await;
    })
    .await;

    let mut stale = connection.open_channel().await.unwrap();
    let err = stale
        .declare_queue("locked", false, true, false)
        .await
        .unwrap_err();
    assert!(matches!(&err, channel::Error::ChannelClosed(reason) if reason.reply_code == 405));

    let mut fresh = connection.open_channel().await.unwrap();
    assert_eq!(fresh.id(), 1);

    assert_eq!(stale.basic_qos(0, 1, false).await, Err(err));
    drop(stale);

    let queue = fresh.declare_queue("fresh", false, false, false).await.unwrap();
    assert_eq!(queue.name, "fresh");

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn frame_over_frame_max_fails_only_its_call() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake_with_tune(0, 4096, 0).await;
        broker.open_channel(1).await;
        broker.open_channel(2).await;

        // Nothing is sent for the oversized declare
        let declare = broker.expect(2, method::QUEUE_DECLARE).await;
        assert_eq!(declare.short_str("queue").unwrap(), "small");
        broker
            .send_method(2, method::QUEUE_DECLARE_OK, declare_ok_args("small", 0, 0))
            .await;

        let declare = broker.expect(1, method::QUEUE_DECLARE).await;
        assert_eq!(declare.short_str("queue").unwrap(), "retry");
        broker
            .send_method(1, method::QUEUE_DECLARE_OK, declare_ok_args("retry", 0, 0))
            .await;

        broker.close().await;
    })
    .await;

    let mut first = connection.open_channel().await.unwrap();
    let mut second = connection.open_channel().await.unwrap();

    let mut arguments = FieldTable::new();
    arguments.insert("x-big".into(), "x".repeat(5000).into());
    let options = channel::QueueOptions {
        arguments,
        ..Default::default()
    };
    assert!(matches!(
        first.declare_queue_with("big", options).await,
        Err(channel::Error::InvalidArgument(types::Error::FrameTooLarge { .. }))
    ));
    assert_eq!(first.state(), channel::ChannelState::Open);

    second.declare_queue("small", false, false, false).await.unwrap();
    first.declare_queue("retry", false, false, false).await.unwrap();
    assert!(!connection.is_closed());

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn second_call_while_waiting_is_rejected() {
    let (rejected_tx, rejected_rx) = oneshot::channel::<()>();
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;

        let first = broker.expect(1, method::QUEUE_DECLARE).await;
        assert_eq!(first.short_str("queue").unwrap(), "a");

        // Reply only once the second call has been rejected
        rejected_rx.await.unwrap();
        broker
            .send_method(1, method::QUEUE_DECLARE_OK, declare_ok_args("a", 0, 0))
            .await;
        broker
            .send_method(1, method::CHANNEL_FLOW, vec![Arg::Bit(true)])
            .await;
        let flow_ok = broker.expect(1, method::CHANNEL_FLOW_OK).await;
        assert!(flow_ok.bit("active").unwrap());

        // "b" was never sent
        let third = broker.expect(1, method::QUEUE_DECLARE).await;
        assert_eq!(third.short_str("queue").unwrap(), "c");
        broker
            .send_method(1, method::QUEUE_DECLARE_OK, declare_ok_args("c", 0, 0))
            .await;

        broker.close().await;
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        channel.declare_queue("a", false, false, false),
    )
    .await;
    assert!(abandoned.is_err());

    assert_eq!(
        channel.declare_queue("b", false, false, false).await,
        Err(channel::Error::DoubleWait { channel: 1 })
    );
    rejected_tx.send(()).unwrap();

    // The flow event arrives after the stale reply
    match channel.next_event().await {
        Some(ChannelEvent::Method(flow)) => assert_eq!(flow.id(), method::CHANNEL_FLOW),
        other => panic!("unexpected {:?}", other),
    }

    let queue = channel.declare_queue("c", false, false, false).await.unwrap();
    assert_eq!(queue.name, "c");

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn disconnect_fails_pending_calls() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;
        broker.expect(1, method::QUEUE_DECLARE).await;
        // Dropping the broker drops the stream
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    assert_eq!(
        channel.declare_queue("q", false, false, false).await,
        Err(channel::Error::ConnectionLost)
    );
    broker.await.unwrap();

    assert!(matches!(
        connection.on_close().await,
        Err(connection::Error::ConnectionLost)
    ));
    assert!(connection.is_closed());
    assert_eq!(
        channel.declare_queue("q", false, false, false).await,
        Err(channel::Error::ConnectionLost)
    );
}

#[tokio::test]
async fn heartbeat_sent_while_idle() {
    let (seen_tx, seen_rx) = oneshot::channel::<Duration>();
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake_with_tune(0, 131072, 1).await;
        let start = tokio::time::Instant::now();

        let frame = broker.recv_any().await;
        assert_eq!(frame.channel, 0);
        assert_eq!(frame.body, FrameBody::Heartbeat);
        broker.send(Frame::heartbeat()).await;
        seen_tx.send(start.elapsed()).unwrap();

        broker.close().await;
    })
    .await;
    assert_eq!(connection.tuning().heartbeat, 1);

    // Sent within one interval, well before the broker's idle timeout
    let elapsed = seen_rx.await.unwrap();
    assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn silent_broker_times_out() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake_with_tune(0, 131072, 1).await;
        broker.open_channel(1).await;
        broker.expect(1, method::QUEUE_DECLARE).await;

        // Never answers, but keeps the stream open until the client gives up
        assert!(broker.recv_eof().await.is_none());
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    let start = tokio::time::Instant::now();
    assert_eq!(
        channel.declare_queue("q", false, false, false).await,
        Err(channel::Error::ConnectionLost)
    );
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1500), "{:?}", elapsed);

    assert!(matches!(
        connection.on_close().await,
        Err(connection::Error::IdleTimeout)
    ));
    assert!(connection.is_closed());
    broker.await.unwrap();
}

#[tokio::test]
async fn broker_closes_connection() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;
        broker.expect(1, method::EXCHANGE_DELETE).await;
        broker
            .send_method(
                0,
                method::CONNECTION_CLOSE,
                close_args(320, "CONNECTION_FORCED - shutdown", 0, 0),
            )
            .await;
        broker.expect(0, method::CONNECTION_CLOSE_OK).await;
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    match channel.delete_exchange("my.nice.exchange", false).await {
        Err(channel::Error::ConnectionClosed(reason)) => assert_eq!(reason.reply_code, 320),
        other => panic!("unexpected {:?}", other),
    }
    broker.await.unwrap();

    match connection.on_close().await {
        Err(connection::Error::RemoteClosed(reason)) => assert_eq!(reason.reply_code, 320),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        connection.open_channel().await,
        Err(channel::Error::ConnectionClosed(_))
    ));
}

#[tokio::test]
async fn malformed_frame_closes_connection() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;
        broker.expect(1, method::BASIC_QOS).await;

        // A heartbeat frame with a bad end marker
        broker
            .io_mut()
            .write_all(&[8, 0, 0, 0, 0, 0, 0, 0xAB])
            .await
            .unwrap();
        let close = broker.expect(0, method::CONNECTION_CLOSE).await;
        assert_eq!(close.short("reply-code").unwrap(), 501);
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    assert!(matches!(
        channel.basic_qos(0, 10, false).await,
        Err(channel::Error::MalformedFrame(_))
    ));
    assert!(matches!(
        connection.on_close().await,
        Err(connection::Error::MalformedFrame(_))
    ));
    broker.await.unwrap();
}

#[tokio::test]
async fn publish_splits_body_by_frame_max() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake_with_tune(0, 4096, 0).await;
        broker.open_channel(1).await;

        let publish = broker.expect(1, method::BASIC_PUBLISH).await;
        assert_eq!(publish.short_str("routing-key").unwrap(), "my.nice.queue");

        match broker.recv().await.body {
            FrameBody::Header(header) => {
                assert_eq!(header.body_size, 10_000);
                assert_eq!(header.properties.delivery_mode, Some(2));
            }
            other => panic!("unexpected {:?}", other),
        }
        let mut sizes = Vec::new();
        for _ in 0..3 {
            match broker.recv().await.body {
                FrameBody::Body(chunk) => sizes.push(chunk.len()),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(sizes, vec![4088, 4088, 1824]);

        broker.close().await;
    })
    .await;
    assert_eq!(connection.tuning().frame_max, 4096);

    let mut channel = connection.open_channel().await.unwrap();
    channel
        .basic_publish(
            "",
            "my.nice.queue",
            false,
            BasicProperties::persistent(),
            vec![0u8; 10_000],
        )
        .await
        .unwrap();

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn get_routes_content_to_events() {
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;

        broker.expect(1, method::QUEUE_DECLARE).await;
        broker
            .send_method(1, method::QUEUE_DECLARE_OK, declare_ok_args("q", 1, 0))
            .await;

        broker.expect(1, method::BASIC_GET).await;
        broker
            .send_method(
                1,
                method::BASIC_GET_OK,
                vec![
                    Arg::LongLong(1),
                    Arg::Bit(false),
                    Arg::short_str(""),
                    Arg::short_str("q"),
                    Arg::Long(0),
                ],
            )
            .await;
        broker
            .send_content(1, ContentHeader::basic(5, Default::default()), b"hello")
            .await;

        broker.expect(1, method::BASIC_ACK).await;

        broker.expect(1, method::BASIC_GET).await;
        broker
            .send_method(1, method::BASIC_GET_EMPTY, vec![Arg::short_str("")])
            .await;

        broker.close().await;
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();
    let queue = channel.declare_queue("q", false, false, false).await.unwrap();

    let get_ok = channel.basic_get(&queue, false).await.unwrap().unwrap();
    assert_eq!(get_ok.long_long("delivery-tag").unwrap(), 1);
    match channel.next_event().await {
        Some(ChannelEvent::Header(header)) => assert_eq!(header.body_size, 5),
        other => panic!("unexpected {:?}", other),
    }
    match channel.next_event().await {
        Some(ChannelEvent::Body(body)) => assert_eq!(&body[..], b"hello"),
        other => panic!("unexpected {:?}", other),
    }
    channel.basic_ack(1, false).await.unwrap();

    assert!(channel.basic_get(&queue, false).await.unwrap().is_none());

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn blocked_flag_follows_broker() {
    let (checked_tx, checked_rx) = oneshot::channel::<()>();
    let (mut connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;

        broker
            .send_method(
                0,
                method::CONNECTION_BLOCKED,
                vec![Arg::short_str("low on memory")],
            )
            .await;
        broker
            .send_method(1, method::CHANNEL_FLOW, vec![Arg::Bit(false)])
            .await;
        broker.expect(1, method::CHANNEL_FLOW_OK).await;

        // Unblock only once the client has seen the blocked flag
        checked_rx.await.unwrap();
        broker
            .send_method(0, method::CONNECTION_UNBLOCKED, Vec::new())
            .await;
        broker
            .send_method(1, method::CHANNEL_FLOW, vec![Arg::Bit(true)])
            .await;
        broker.expect(1, method::CHANNEL_FLOW_OK).await;

        broker.close().await;
    })
    .await;

    let mut channel = connection.open_channel().await.unwrap();

    // Frames are handled in order, so the flag is set before the flow event is forwarded
    channel.next_event().await.unwrap();
    assert!(connection.is_blocked());
    assert_eq!(connection.blocked_reason().as_deref(), Some("low on memory"));
    checked_tx.send(()).unwrap();

    channel.next_event().await.unwrap();
    assert!(!connection.is_blocked());

    connection.close().await.unwrap();
    broker.await.unwrap();
}

#[tokio::test]
async fn dropping_handles_closes_channel_and_connection() {
    let (connection, broker) = common::connect(|mut broker: MockBroker| async move {
        broker.handshake().await;
        broker.open_channel(1).await;

        let close = broker.expect(1, method::CHANNEL_CLOSE).await;
        assert_eq!(close.short("reply-code").unwrap(), 200);
        broker
            .send_method(1, method::CHANNEL_CLOSE_OK, Vec::new())
            .await;

        broker.close().await;
        assert!(broker.recv_eof().await.is_none());
    })
    .await;

    let mut connection = connection;
    let channel = connection.open_channel().await.unwrap();
    drop(channel);
    // Lets the engine send channel.close before connection.close
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(connection);

    broker.await.unwrap();
}

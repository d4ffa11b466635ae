#![allow(dead_code)]

use std::time::Duration;

use fe2o3_amqp091::{
    frames::{ContentHeader, Frame, FrameBody, FrameCodec},
    types::method::{self, Arg, Method, MethodId},
    Connection, ConnectionHandle,
};
use futures_util::{SinkExt, StreamExt};
use testcontainers::{
    clients::Cli,
    core::WaitFor,
    GenericImage,
    Container,
};
use tokio::{
    io::{AsyncReadExt, DuplexStream},
    sync::OnceCell,
};
use tokio_util::codec::Framed;

static DOCKER: OnceCell<Cli> = OnceCell::const_new();

pub async fn setup_rabbitmq(
    username: Option<&str>,
    password: Option<&str>,
) -> (Container<'static, GenericImage>, u16) {
    let docker = DOCKER.get_or_init(|| async { Cli::default() }).await;
    let image = GenericImage::new("docker.io/library/rabbitmq", "3")
        .with_exposed_port(5672)
        .with_wait_for(WaitFor::message_on_stdout("Server startup complete"));
    let image = match (username, password) {
        (Some(username), Some(password)) => image
            .with_env_var("RABBITMQ_DEFAULT_USER", username)
            .with_env_var("RABBITMQ_DEFAULT_PASS", password),
        _ => image,
    };
    let node = docker.run(image);
    let port = node.get_host_port_ipv4(5672);
    (node, port)
}

/// The broker side of an in-memory connection
pub struct MockBroker {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl MockBroker {
    /// Reads the protocol header and starts framing
    pub async fn accept(mut io: DuplexStream) -> Self {
        let mut header = [0u8; 8];
        io.read_exact(&mut header).await.unwrap();
        assert_eq!(&header, b"AMQP\x00\x00\x09\x01");
        Self {
            framed: Framed::new(io, FrameCodec::default()),
        }
    }

    pub fn io_mut(&mut self) -> &mut DuplexStream {
        self.framed.get_mut()
    }

    pub async fn send(&mut self, frame: Frame) {
        self.framed.send(frame).await.unwrap();
    }

    pub async fn send_method(&mut self, channel: u16, id: MethodId, args: Vec<Arg>) {
        self.send(Frame::method(channel, id, args).unwrap()).await;
    }

    pub async fn send_content(&mut self, channel: u16, header: ContentHeader, body: &[u8]) {
        self.send(Frame::new(channel, FrameBody::Header(header)))
            .await;
        self.send(Frame::new(
            channel,
            FrameBody::Body(bytes::Bytes::copy_from_slice(body)),
        ))
        .await;
    }

    /// Next frame, heartbeats included
    pub async fn recv_any(&mut self) -> Frame {
        self.framed.next().await.unwrap().unwrap()
    }

    /// Next frame that is not a heartbeat
    pub async fn recv(&mut self) -> Frame {
        loop {
            let frame = self.framed.next().await.unwrap().unwrap();
            if frame.body != FrameBody::Heartbeat {
                return frame;
            }
        }
    }

    /// Returns `None` once the client has closed the stream
    pub async fn recv_eof(&mut self) -> Option<Frame> {
        loop {
            match self.framed.next().await {
                Some(Ok(Frame {
                    body: FrameBody::Heartbeat,
                    ..
                })) => continue,
                Some(Ok(frame)) => return Some(frame),
                _ => return None,
            }
        }
    }

    pub async fn expect(&mut self, channel: u16, id: MethodId) -> Method {
        let frame = self.recv().await;
        assert_eq!(frame.channel, channel, "unexpected frame {:?}", frame);
        match frame.body {
            FrameBody::Method(method) => {
                assert_eq!(method.id(), id, "unexpected method {:?}", method);
                method
            }
            other => panic!("expected {} but got {:?}", id, other),
        }
    }

    pub async fn handshake(&mut self) {
        self.handshake_with_tune(0, 131072, 600).await
    }

    pub async fn handshake_with_tune(&mut self, channel_max: u16, frame_max: u32, heartbeat: u16) {
        self.send_method(0, method::CONNECTION_START, start_args()).await;
        let start_ok = self.expect(0, method::CONNECTION_START_OK).await;
        assert_eq!(start_ok.short_str("mechanism").unwrap(), "PLAIN");

        self.send_method(
            0,
            method::CONNECTION_TUNE,
            vec![
                Arg::Short(channel_max),
                Arg::Long(frame_max),
                Arg::Short(heartbeat),
            ],
        )
        .await;
        self.expect(0, method::CONNECTION_TUNE_OK).await;
        self.expect(0, method::CONNECTION_OPEN).await;
        self.send_method(0, method::CONNECTION_OPEN_OK, vec![Arg::short_str("")])
            .await;
    }

    pub async fn open_channel(&mut self, channel: u16) {
        self.expect(channel, method::CHANNEL_OPEN).await;
        self.send_method(channel, method::CHANNEL_OPEN_OK, vec![Arg::long_str("")])
            .await;
    }

    /// Answers a `connection.close` from the client
    pub async fn close(&mut self) {
        let close = self.expect(0, method::CONNECTION_CLOSE).await;
        assert_eq!(close.short("reply-code").unwrap(), 200);
        self.send_method(0, method::CONNECTION_CLOSE_OK, Vec::new())
            .await;
    }
}

pub fn start_args() -> Vec<Arg> {
    vec![
        Arg::Octet(0),
        Arg::Octet(9),
        Arg::Table(Default::default()),
        Arg::long_str("PLAIN AMQPLAIN"),
        Arg::long_str("en_US"),
    ]
}

pub fn close_args(code: u16, text: &str, class_id: u16, method_id: u16) -> Vec<Arg> {
    vec![
        Arg::Short(code),
        Arg::short_str(text),
        Arg::Short(class_id),
        Arg::Short(method_id),
    ]
}

pub fn declare_ok_args(name: &str, messages: u32, consumers: u32) -> Vec<Arg> {
    vec![
        Arg::short_str(name),
        Arg::Long(messages),
        Arg::Long(consumers),
    ]
}

/// Opens a client over an in-memory stream while `script` plays the broker
pub async fn connect<F, Fut>(script: F) -> (ConnectionHandle, tokio::task::JoinHandle<()>)
where
    F: FnOnce(MockBroker) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let broker = tokio::spawn(async move {
        let broker = MockBroker::accept(server).await;
        script(broker).await
    });
    let connection = tokio::time::timeout(
        Duration::from_secs(5),
        Connection::builder().open_with_stream(client),
    )
    .await
    .expect("handshake timed out")
    .unwrap();
    (connection, broker)
}

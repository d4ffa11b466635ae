//! Builder for [`crate::Connection`]

use std::sync::Arc;

use fe2o3_amqp091_types::{definitions::FRAME_MIN_SIZE, primitives::Value};
use parking_lot::RwLock;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc,
};
use tracing::debug;
use url::Url;

use crate::transport::{protocol_header::ProtocolHeader, Transport};

use super::{
    engine::ConnectionEngine, Connection, ConnectionHandle, ConnectionInfo, ConnectionStatus,
    OpenError,
};

/// Default capacity of the control channel shared by the connection and channel handles
pub const DEFAULT_CONTROL_CHAN_BUF: usize = 128;

/// Connection builder
#[derive(Debug, Clone)]
pub struct Builder {
    /// Credentials and tuning requests
    pub info: ConnectionInfo,

    /// Capacity of the control channel
    pub buffer_size: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a builder with the default [`ConnectionInfo`]
    pub fn new() -> Self {
        Self {
            info: ConnectionInfo::default(),
            buffer_size: DEFAULT_CONTROL_CHAN_BUF,
        }
    }

    /// Replaces the whole [`ConnectionInfo`], eg. one loaded from a config file
    pub fn info(mut self, info: ConnectionInfo) -> Self {
        self.info = info;
        self
    }

    /// Broker host used by [`Builder::connect`]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.info.host = host.into();
        self
    }

    /// Broker port used by [`Builder::connect`]
    pub fn port(mut self, port: u16) -> Self {
        self.info.port = port;
        self
    }

    /// Username
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.info.username = username.into();
        self
    }

    /// Password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.info.password = password.into();
        self
    }

    /// Virtual host
    pub fn virtual_host(mut self, virtual_host: impl Into<String>) -> Self {
        self.info.virtual_host = virtual_host.into();
        self
    }

    /// Requested heartbeat interval in seconds. 0 disables heartbeats unless the broker
    /// asks for them.
    pub fn heartbeat(mut self, seconds: u16) -> Self {
        self.info.heartbeat = Some(seconds);
        self
    }

    /// Requested frame-max. A non-zero value below the protocol minimum of 4096 is raised
    /// to the minimum.
    pub fn frame_max(mut self, frame_max: u32) -> Self {
        let frame_max = match frame_max {
            0 => 0,
            n => n.max(FRAME_MIN_SIZE),
        };
        self.info.frame_max = Some(frame_max);
        self
    }

    /// Requested channel-max
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.info.channel_max = Some(channel_max);
        self
    }

    /// Preferred locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.info.locale = locale.into();
        self
    }

    /// Adds a client property, eg. `connection_name`
    pub fn client_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.client_properties.insert(key.into(), value.into());
        self
    }

    /// Capacity of the control channel
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Opens a connection over an established stream
    pub async fn open_with_stream<Io>(self, mut stream: Io) -> Result<ConnectionHandle, OpenError>
    where
        Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Transport::send_proto_header(&mut stream, ProtocolHeader::amqp091()).await?;
        debug!("protocol header sent");

        // Frames up to the protocol minimum are always allowed before tuning
        let transport = Transport::bind(stream, FRAME_MIN_SIZE as usize, None);

        let (control_tx, control_rx) = mpsc::channel(self.buffer_size.max(1));
        let status = Arc::new(RwLock::new(ConnectionStatus::default()));
        let connection = Connection::new(self.info, status.clone());
        let engine = ConnectionEngine::open(transport, connection, control_rx).await?;
        let handle = engine.spawn();

        Ok(ConnectionHandle {
            control: control_tx,
            handle: Some(handle),
            status,
        })
    }

    /// Dials `host:port` over TCP and opens a connection
    pub async fn connect(self) -> Result<ConnectionHandle, OpenError> {
        let stream = TcpStream::connect((self.info.host.as_str(), self.info.port)).await?;
        stream.set_nodelay(true)?;
        self.open_with_stream(stream).await
    }

    /// Overrides the builder with the parts present in the url and opens a connection over
    /// TCP
    pub async fn open(
        mut self,
        url: impl TryInto<Url, Error = url::ParseError>,
    ) -> Result<ConnectionHandle, OpenError> {
        let url: Url = url.try_into()?;
        self.info.apply_url(&url)?;
        self.connect().await
    }
}

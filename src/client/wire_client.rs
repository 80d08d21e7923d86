//! Client implementation

use crate::codec::CodecContext;
use crate::connection::{Connection, ConnectionConfig, Session, Transport};
use crate::pipeline::{Pipeline, PipelineConfig, ResponseStream};
use crate::protocol::{BackendMessage, FrontendMessage};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// MySQL client over one connection
///
/// Cheap to clone. The connection is closed gracefully (COM_QUIT) by [`Client::close`]
/// or once every clone has been dropped.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    session: Session,
    pipeline: Pipeline,
    codec_context: CodecContext,
}

impl Client {
    /// Connect over TCP or the configured unix socket and authenticate.
    ///
    /// `connect_timeout` bounds the socket connect and the whole handshake.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> mysql_wire::Result<()> {
    /// use mysql_wire::{Client, ConnectionConfig, FrontendMessage};
    ///
    /// let config = ConnectionConfig::builder()
    ///     .host("127.0.0.1")
    ///     .user("app")
    ///     .password("secret")
    ///     .database("orders")
    ///     .build()?;
    /// let client = Client::connect(config).await?;
    /// client.exchange(FrontendMessage::Ping).await?;
    /// client.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let timeout = config.connect_timeout;
        let connect = async move {
            let (transport, hostname) = match &config.unix_socket {
                Some(path) => (Transport::connect_unix(path).await?, "localhost".to_string()),
                None => (
                    Transport::connect_tcp(&config.host, config.port, config.tcp_nodelay).await?,
                    config.host.clone(),
                ),
            };
            Self::handshake(transport, &config, &hostname).await
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| Error::Timeout)?,
            None => connect.await,
        }
    }

    /// Authenticate over an already connected transport.
    ///
    /// `config.host` is used as the TLS server name. Must be called within a tokio runtime.
    pub async fn connect_with_transport(transport: Transport, config: ConnectionConfig) -> Result<Self> {
        let hostname = config.host.clone();
        Self::handshake(transport, &config, &hostname).await
    }

    async fn handshake(transport: Transport, config: &ConnectionConfig, hostname: &str) -> Result<Self> {
        let mut conn = Connection::new(transport);
        let session = match conn.startup(config, hostname).await {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_err) = conn.abort().await {
                    tracing::debug!(error = %close_err, "closing failed handshake");
                }
                return Err(e);
            }
        };

        let (transport, codec, read_buf) = conn.into_parts()?;
        let pipeline = Pipeline::spawn(
            transport,
            codec,
            read_buf,
            PipelineConfig {
                capabilities: session.capabilities,
                queue_depth: config.request_queue_depth,
                response_buffer: config.response_buffer,
                local_infile_path: config.local_infile_path.clone(),
                codec_context: config.codec_context(),
            },
        );

        Ok(Self {
            inner: Arc::new(Inner {
                session,
                pipeline,
                codec_context: config.codec_context(),
            }),
        })
    }

    /// Session established by the handshake
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Time zone and zero-date settings for decoding values of this connection
    pub fn codec_context(&self) -> CodecContext {
        self.inner.codec_context
    }

    /// Queue a command and return the stream of its response messages.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidState` - handshake messages and `Quit`
    /// * `Error::ConnectionClosed` - the connection is closed
    pub async fn submit(&self, message: FrontendMessage) -> Result<ResponseStream> {
        self.inner.pipeline.submit(message).await
    }

    /// Submit a command and wait for its terminal message.
    ///
    /// Intermediate messages (columns, rows) are discarded; use [`Client::submit`] to read them.
    pub async fn exchange(&self, message: FrontendMessage) -> Result<BackendMessage> {
        self.submit(message).await?.terminal().await
    }

    /// Like [`Client::exchange`], giving up after `limit`.
    ///
    /// A timed-out command stays on the wire; its response is read and discarded so later
    /// requests stay in order.
    pub async fn exchange_timeout(&self, message: FrontendMessage, limit: Duration) -> Result<BackendMessage> {
        let stream = self.submit(message).await?;
        tokio::time::timeout(limit, stream.terminal())
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Send COM_QUIT and release the connection.
    ///
    /// Pending requests fail with `Error::ConnectionClosed`. Idempotent; affects every clone.
    pub async fn close(&self) -> Result<()> {
        self.inner.pipeline.close().await
    }

    /// Whether the connection has been closed (by the caller, the server or an error)
    pub fn is_closed(&self) -> bool {
        self.inner.pipeline.is_closed()
    }
}

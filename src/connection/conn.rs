//! Handshake driver

use super::config::ConnectionConfig;
use super::session::{default_collation, negotiate_capabilities, Session};
use super::state::HandshakeState;
use super::tls::TlsConfig;
use super::transport::Transport;
use crate::auth::{plugins, Authenticator};
use crate::protocol::constants::capabilities;
use crate::protocol::{
    decode_message, encode_message, BackendMessage, CompressionAlgorithm, Compressor, FrontendMessage,
    Handshake, HandshakeResponse, HandshakeV10, PacketCodec, Phase, SslRequest,
};
use crate::{Error, Result};
use bytes::BytesMut;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::Instrument;

/// Connection during the handshake.
///
/// Exactly one exchange is in flight at a time; once authenticated, the parts are handed
/// to the pipeline with [`Connection::into_parts`].
pub struct Connection {
    transport: Option<Transport>,
    codec: PacketCodec,
    read_buf: BytesMut,
    state: HandshakeState,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("sequence", &self.codec.sequence())
            .finish()
    }
}

impl Connection {
    /// Create connection from a connected transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Some(transport),
            codec: PacketCodec::new(),
            read_buf: BytesMut::with_capacity(8192),
            state: HandshakeState::AwaitingInitialHandshake,
        }
    }

    /// Get current handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Perform the handshake and authentication.
    ///
    /// `hostname` is used for TLS server name verification.
    ///
    /// # Errors
    ///
    /// * `Error::Server` - the server rejected the connection (code, state and message verbatim)
    /// * `Error::Authentication` - unsupported plugin or insecure transport for the plugin
    /// * `Error::Config` - TLS or compression requested but not offered
    /// * `Error::Protocol` - unsupported greeting or malformed packets
    pub async fn startup(&mut self, config: &ConnectionConfig, hostname: &str) -> Result<Session> {
        let result = self
            .handshake(config, hostname)
            .instrument(tracing::info_span!(
                "handshake",
                user = %config.user,
                database = %config.database_name().unwrap_or("")
            ))
            .await;

        if let Err(e) = &result {
            if !self.state.is_terminal() {
                self.state.transition(HandshakeState::Failed)?;
            }
            tracing::debug!(error = %e, "handshake failed");
        }
        result
    }

    async fn handshake(&mut self, config: &ConnectionConfig, hostname: &str) -> Result<Session> {
        let started = Instant::now();

        let greeting = self.read_greeting().await?;
        let (caps, compression) = negotiate_capabilities(greeting.capabilities, config)?;
        let collation = config
            .collation
            .unwrap_or_else(|| default_collation(&greeting.server_version));
        tracing::debug!(
            server_version = %greeting.server_version,
            connection_id = greeting.connection_id,
            "greeting received"
        );

        if config.ssl_mode.is_enabled() {
            self.state.transition(HandshakeState::AwaitingTlsUpgrade)?;
            self.upgrade_tls(config, hostname, caps, collation).await?;
        }
        self.state.transition(HandshakeState::AwaitingAuthResult)?;

        let secure = self.transport()?.is_secure();
        let password = match &config.password {
            Some(password) => password.resolve().await?,
            None => String::new(),
        };
        let plugin = match &greeting.auth_plugin_name {
            Some(name) if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 && !name.is_empty() => name.as_str(),
            _ => plugins::MYSQL_NATIVE_PASSWORD,
        };
        crate::metrics::counters::handshake_attempted(plugin);

        let result = self
            .authenticate(config, &greeting, caps, collation, compression, plugin, password, secure)
            .await;
        let (auth_plugin, scramble, status_flags) = match result {
            Ok(done) => done,
            Err(e) => {
                crate::metrics::counters::handshake_failed(plugin, e.kind());
                return Err(e);
            }
        };

        if let Some(compressor) = Compressor::for_algorithm(compression, i32::from(config.zstd_compression_level))? {
            self.codec.enable_compression(compressor);
        }

        crate::metrics::counters::handshake_succeeded(&auth_plugin);
        crate::metrics::histograms::handshake_duration(&auth_plugin, started.elapsed().as_millis() as u64);
        tracing::info!(
            server_version = %greeting.server_version,
            connection_id = greeting.connection_id,
            plugin = %auth_plugin,
            compression = %compression,
            "handshake complete"
        );

        Ok(Session {
            server_version: greeting.server_version,
            connection_id: greeting.connection_id,
            capabilities: caps,
            collation,
            status_flags,
            scramble,
            auth_plugin,
            user: config.user.clone(),
            database: config.database_name().map(str::to_string),
            compression,
            tls: self.transport()?.is_tls(),
        })
    }

    async fn read_greeting(&mut self) -> Result<HandshakeV10> {
        match self.receive(&Phase::Greeting, 0).await? {
            BackendMessage::Handshake(Handshake::V10(greeting)) => Ok(greeting),
            BackendMessage::Handshake(Handshake::V9(v9)) => Err(Error::Protocol(format!(
                "unsupported protocol version 9 (server {})",
                v9.server_version
            ))),
            // Too many connections, host blocked, ...
            BackendMessage::Error(err) => Err(Error::Server(err)),
            other => Err(Error::Protocol(format!(
                "expected greeting, got {}",
                other.kind()
            ))),
        }
    }

    async fn upgrade_tls(&mut self, config: &ConnectionConfig, hostname: &str, caps: u32, collation: u8) -> Result<()> {
        let request = FrontendMessage::SslRequest(SslRequest {
            capabilities: caps,
            max_packet_size: config.max_packet_size,
            collation,
        });
        self.send(&request).await?;

        let tls = match &config.tls {
            Some(tls) => tls.clone(),
            None => TlsConfig::builder().build()?,
        };
        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        self.transport = Some(transport.upgrade_to_tls(&tls, hostname, config.ssl_mode).await?);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn authenticate(
        &mut self,
        config: &ConnectionConfig,
        greeting: &HandshakeV10,
        caps: u32,
        collation: u8,
        compression: CompressionAlgorithm,
        plugin: &str,
        password: String,
        secure: bool,
    ) -> Result<(String, bytes::Bytes, u16)> {
        let mut scramble = greeting.auth_plugin_data.clone();
        let mut auth = Authenticator::new(plugin, password, scramble.clone(), secure)?;

        let response = HandshakeResponse {
            capabilities: caps,
            max_packet_size: config.max_packet_size,
            collation,
            username: config.user.clone(),
            auth_response: auth.initial_response()?,
            database: config.database_name().map(str::to_string),
            auth_plugin: auth.plugin().name().to_string(),
            attributes: config.connect_attributes.clone(),
            zstd_level: (compression == CompressionAlgorithm::Zstd).then_some(config.zstd_compression_level),
        };
        self.send(&FrontendMessage::HandshakeResponse(response)).await?;

        loop {
            match self.receive(&Phase::Authentication, caps).await? {
                BackendMessage::Ok(ok) => {
                    self.state.transition(HandshakeState::Authenticated)?;
                    return Ok((auth.plugin().name().to_string(), scramble, ok.status_flags));
                }
                BackendMessage::Error(err) => {
                    self.state.transition(HandshakeState::Failed)?;
                    return Err(Error::Server(err));
                }
                BackendMessage::AuthSwitchRequest(switch) => {
                    self.state.transition(HandshakeState::AwaitingAuthSwitch)?;
                    crate::metrics::counters::auth_switched(&switch.plugin);
                    tracing::debug!(plugin = %switch.plugin, "auth switch requested");
                    scramble = switch.data.clone();
                    let response = auth.switch(&switch.plugin, switch.data)?;
                    self.send(&FrontendMessage::AuthResponse(response)).await?;
                }
                BackendMessage::AuthMoreData(data) => {
                    self.state.transition(HandshakeState::AwaitingAuthMoreData)?;
                    if let Some(response) = auth.more_data(&data)? {
                        self.send(&FrontendMessage::AuthResponse(response)).await?;
                    }
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected {} during authentication",
                        other.kind()
                    )))
                }
            }
        }
    }

    /// Hand the authenticated connection over: transport, codec (sequence and compression
    /// state) and any bytes already read.
    pub fn into_parts(mut self) -> Result<(Transport, PacketCodec, BytesMut)> {
        if self.state != HandshakeState::Authenticated {
            return Err(Error::InvalidState {
                expected: HandshakeState::Authenticated.to_string(),
                actual: self.state.to_string(),
            });
        }
        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        Ok((transport, self.codec, self.read_buf))
    }

    /// Close the connection without a graceful goodbye (handshake failed)
    pub async fn abort(mut self) -> Result<()> {
        self.state.transition(HandshakeState::Closed)?;
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await?;
        }
        Ok(())
    }

    fn transport(&mut self) -> Result<&mut Transport> {
        self.transport.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// Frame and send a frontend message
    async fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        let payload = encode_message(msg)?;
        let mut out = BytesMut::with_capacity(payload.len() + 8);
        self.codec.encode(&payload, &mut out)?;
        tracing::trace!(message = msg.name(), len = payload.len(), "sending");

        let transport = self.transport()?;
        transport.write_all(&out).await?;
        transport.flush().await?;
        Ok(())
    }

    /// Receive and decode one backend message
    async fn receive(&mut self, phase: &Phase, caps: u32) -> Result<BackendMessage> {
        loop {
            if let Some(payload) = self.codec.decode(&mut self.read_buf)? {
                return decode_message(&payload, phase, caps);
            }

            let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
            let n = transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

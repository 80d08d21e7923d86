//! Connection configuration

use super::tls::{SslMode, TlsConfig};
use crate::codec::{CodecContext, ConnectionTimeZone, ZeroDateOption};
use crate::protocol::constants::DEFAULT_MAX_PACKET_SIZE;
use crate::protocol::CompressionAlgorithm;
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Asynchronous credential source, resolved once per handshake
///
/// # Examples
///
/// ```ignore
/// struct Vault;
///
/// impl PasswordProvider for Vault {
///     fn password(&self) -> BoxFuture<'_, Result<String>> {
///         Box::pin(async { fetch_secret("mysql/app").await })
///     }
/// }
/// ```
pub trait PasswordProvider: Send + Sync {
    /// Produce the password for the next handshake
    fn password(&self) -> BoxFuture<'_, Result<String>>;
}

/// Where the password comes from
#[derive(Clone)]
pub enum Password {
    /// Fixed password
    Static(String),
    /// Asynchronous provider
    Provider(Arc<dyn PasswordProvider>),
}

impl Password {
    /// Resolve the password
    pub async fn resolve(&self) -> Result<String> {
        match self {
            Password::Static(p) => Ok(p.clone()),
            Password::Provider(provider) => provider.password().await,
        }
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Password::Static(_) => f.write_str("Password::Static(***)"),
            Password::Provider(_) => f.write_str("Password::Provider(..)"),
        }
    }
}

/// Connection configuration
///
/// Every field has a documented effect on the handshake or on value conversion.
/// Use `ConnectionConfig::builder()` to construct one.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host (default: `localhost`)
    pub host: String,
    /// Server port (default: 3306)
    pub port: u16,
    /// Unix socket path; takes precedence over host/port
    pub unix_socket: Option<PathBuf>,
    /// Username (default: OS user)
    pub user: String,
    /// Password source
    pub password: Option<Password>,
    /// Initial database; `CLIENT_CONNECT_WITH_DB` is cleared when absent
    pub database: Option<String>,
    /// SSL/TLS mode
    pub ssl_mode: SslMode,
    /// TLS roots and client certificate (default roots when `None`)
    pub tls: Option<TlsConfig>,
    /// Compression algorithms in order of preference
    pub compression: Vec<CompressionAlgorithm>,
    /// zstd compression level (default: 3)
    pub zstd_compression_level: u8,
    /// Client collation id (default: chosen from the server version)
    pub collation: Option<u8>,
    /// Time zone for TIMESTAMP conversion
    pub time_zone: ConnectionTimeZone,
    /// All-zero DATE/DATETIME handling
    pub zero_date: ZeroDateOption,
    /// Bound on connect plus handshake
    pub connect_timeout: Option<Duration>,
    /// Set TCP_NODELAY (default: true)
    pub tcp_nodelay: bool,
    /// Directory LOAD DATA LOCAL INFILE may read from; `None` disables local infile
    pub local_infile_path: Option<PathBuf>,
    /// Connection attributes sent in the handshake response
    pub connect_attributes: Vec<(String, String)>,
    /// Largest packet announced to the server (default: 16 MiB)
    pub max_packet_size: u32,
    /// Submitted requests that may wait for the connection (default: 128)
    pub request_queue_depth: usize,
    /// Messages buffered per response stream (default: 64)
    pub response_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            unix_socket: None,
            user: whoami::username(),
            password: None,
            database: None,
            ssl_mode: SslMode::default(),
            tls: None,
            compression: vec![CompressionAlgorithm::Uncompressed],
            zstd_compression_level: 3,
            collation: None,
            time_zone: ConnectionTimeZone::default(),
            zero_date: ZeroDateOption::default(),
            connect_timeout: None,
            tcp_nodelay: true,
            local_infile_path: None,
            connect_attributes: Vec::new(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            request_queue_depth: 128,
            response_buffer: 64,
        }
    }
}

impl ConnectionConfig {
    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder()
    ///     .host("db.internal")
    ///     .user("app")
    ///     .password("secret")
    ///     .database("orders")
    ///     .ssl_mode(SslMode::VerifyIdentity)
    ///     .compression([CompressionAlgorithm::Zstd, CompressionAlgorithm::Uncompressed])
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .build()?;
    /// ```
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: ConnectionConfig::default(),
        }
    }

    /// Database name, if one is set and non-empty
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref().filter(|db| !db.is_empty())
    }

    /// Codec settings derived from this configuration
    pub fn codec_context(&self) -> CodecContext {
        CodecContext {
            time_zone: self.time_zone,
            zero_date: self.zero_date,
        }
    }
}

/// Builder for `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Connect through a Unix domain socket instead of TCP
    pub fn unix_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.unix_socket = Some(path.into());
        self
    }

    /// Set the username
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    /// Set a fixed password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(Password::Static(password.into()));
        self
    }

    /// Resolve the password asynchronously at every handshake
    pub fn password_provider(mut self, provider: Arc<dyn PasswordProvider>) -> Self {
        self.config.password = Some(Password::Provider(provider));
        self
    }

    /// Set the initial database
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    /// Set the SSL mode
    ///
    /// Default: `SslMode::Disabled`
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.config.ssl_mode = mode;
        self
    }

    /// Set TLS roots and client certificate
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Set the compression preference list
    ///
    /// The first algorithm the server supports is used. Without `Uncompressed` in the
    /// list, a server supporting none of the others fails the handshake.
    pub fn compression(mut self, algorithms: impl IntoIterator<Item = CompressionAlgorithm>) -> Self {
        self.config.compression = algorithms.into_iter().collect();
        self
    }

    /// Set the zstd compression level (1-22)
    pub fn zstd_compression_level(mut self, level: u8) -> Self {
        self.config.zstd_compression_level = level;
        self
    }

    /// Set the client collation id
    pub fn collation(mut self, collation: u8) -> Self {
        self.config.collation = Some(collation);
        self
    }

    /// Set the time zone used for TIMESTAMP conversion
    pub fn time_zone(mut self, time_zone: ConnectionTimeZone) -> Self {
        self.config.time_zone = time_zone;
        self
    }

    /// Set zero date handling
    pub fn zero_date(mut self, option: ZeroDateOption) -> Self {
        self.config.zero_date = option;
        self
    }

    /// Set connect + handshake timeout
    ///
    /// Default: None (no timeout)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Set TCP_NODELAY
    pub fn tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.config.tcp_nodelay = nodelay;
        self
    }

    /// Allow LOAD DATA LOCAL INFILE for files under `dir`
    pub fn local_infile_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.local_infile_path = Some(dir.into());
        self
    }

    /// Add a connection attribute
    pub fn connect_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.connect_attributes.push((key.into(), value.into()));
        self
    }

    /// Set the maximum packet size announced to the server
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Set how many submitted requests may queue
    pub fn request_queue_depth(mut self, depth: usize) -> Self {
        self.config.request_queue_depth = depth;
        self
    }

    /// Set how many messages each response stream buffers
    pub fn response_buffer(mut self, messages: usize) -> Self {
        self.config.response_buffer = messages;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty user, zero port, empty compression list,
    /// zstd level outside 1-22, or zero queue/buffer sizes.
    pub fn build(self) -> Result<ConnectionConfig> {
        let config = self.config;

        if config.user.is_empty() {
            return Err(Error::Config("user must not be empty".into()));
        }
        if config.unix_socket.is_none() && config.port == 0 {
            return Err(Error::Config("port must not be 0".into()));
        }
        if config.compression.is_empty() {
            return Err(Error::Config(
                "compression preference list must not be empty".into(),
            ));
        }
        if !(1..=22).contains(&config.zstd_compression_level) {
            return Err(Error::Config(format!(
                "zstd compression level {} out of range 1-22",
                config.zstd_compression_level
            )));
        }
        if config.request_queue_depth == 0 || config.response_buffer == 0 {
            return Err(Error::Config(
                "request queue depth and response buffer must be positive".into(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::builder().user("app").build().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.compression, vec![CompressionAlgorithm::Uncompressed]);
        assert_eq!(config.zstd_compression_level, 3);
        assert_eq!(config.ssl_mode, SslMode::Disabled);
        assert!(config.tcp_nodelay);
        assert_eq!(config.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
        assert!(config.database_name().is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ConnectionConfig::builder()
            .host("db")
            .port(3307)
            .user("app")
            .password("secret")
            .database("orders")
            .ssl_mode(SslMode::Required)
            .compression([CompressionAlgorithm::Zlib])
            .connect_attribute("program_name", "worker")
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.host, "db");
        assert_eq!(config.port, 3307);
        assert_eq!(config.database_name(), Some("orders"));
        assert_eq!(config.compression, vec![CompressionAlgorithm::Zlib]);
        assert_eq!(config.connect_attributes.len(), 1);
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_empty_database_is_absent() {
        let config = ConnectionConfig::builder().user("app").database("").build().unwrap();
        assert!(config.database_name().is_none());
    }

    #[test]
    fn test_validation() {
        assert!(ConnectionConfig::builder().user("").build().is_err());
        assert!(ConnectionConfig::builder()
            .user("app")
            .compression(Vec::new())
            .build()
            .is_err());
        assert!(ConnectionConfig::builder()
            .user("app")
            .zstd_compression_level(0)
            .build()
            .is_err());
        assert!(ConnectionConfig::builder()
            .user("app")
            .request_queue_depth(0)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_password_provider() {
        struct Fixed;
        impl PasswordProvider for Fixed {
            fn password(&self) -> BoxFuture<'_, Result<String>> {
                Box::pin(async { Ok("from-provider".to_string()) })
            }
        }

        let config = ConnectionConfig::builder()
            .user("app")
            .password_provider(Arc::new(Fixed))
            .build()
            .unwrap();
        let resolved = config.password.as_ref().unwrap().resolve().await.unwrap();
        assert_eq!(resolved, "from-provider");
        assert_eq!(
            format!("{:?}", config.password),
            "Some(Password::Provider(..))"
        );
    }

    #[test]
    fn test_static_password_hidden_in_debug() {
        let config = ConnectionConfig::builder().user("app").password("hunter2").build().unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}

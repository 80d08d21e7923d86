//! Authentication plugins
//!
//! The negotiator drives one [`Authenticator`] per handshake. It produces the initial
//! response for the handshake packet, re-scrambles on an auth switch, and answers the
//! plugin-specific AuthMoreData exchanges of the SHA-256 plugins.

pub mod caching_sha2;
pub mod native;

use crate::protocol::constants::auth_more;
use crate::{Error, Result};
use bytes::Bytes;

/// Plugin names
pub mod plugins {
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
    pub const SHA256_PASSWORD: &str = "sha256_password";
    pub const MYSQL_CLEAR_PASSWORD: &str = "mysql_clear_password";
    pub const MYSQL_OLD_PASSWORD: &str = "mysql_old_password";
}

/// Supported authentication plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    NativePassword,
    CachingSha2Password,
    Sha256Password,
    ClearPassword,
}

impl AuthPlugin {
    /// Resolve a plugin by the name the server uses
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            plugins::MYSQL_NATIVE_PASSWORD => Ok(Self::NativePassword),
            plugins::CACHING_SHA2_PASSWORD => Ok(Self::CachingSha2Password),
            plugins::SHA256_PASSWORD => Ok(Self::Sha256Password),
            plugins::MYSQL_CLEAR_PASSWORD => Ok(Self::ClearPassword),
            plugins::MYSQL_OLD_PASSWORD => Err(Error::Authentication(
                "pre-4.1 mysql_old_password authentication is not supported".into(),
            )),
            other => Err(Error::Authentication(format!(
                "unsupported authentication plugin: {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NativePassword => plugins::MYSQL_NATIVE_PASSWORD,
            Self::CachingSha2Password => plugins::CACHING_SHA2_PASSWORD,
            Self::Sha256Password => plugins::SHA256_PASSWORD,
            Self::ClearPassword => plugins::MYSQL_CLEAR_PASSWORD,
        }
    }
}

impl std::fmt::Display for AuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-handshake authentication state
pub struct Authenticator {
    plugin: AuthPlugin,
    password: String,
    scramble: Bytes,
    /// TLS or Unix socket: passwords may travel in clear
    secure: bool,
    /// Public key requested, next AuthMoreData carries the PEM
    awaiting_public_key: bool,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("plugin", &self.plugin)
            .field("secure", &self.secure)
            .field("awaiting_public_key", &self.awaiting_public_key)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Start with the plugin the server greeted with
    pub fn new(plugin: &str, password: String, scramble: Bytes, secure: bool) -> Result<Self> {
        Ok(Self {
            plugin: AuthPlugin::from_name(plugin)?,
            password,
            scramble,
            secure,
            awaiting_public_key: false,
        })
    }

    pub fn plugin(&self) -> AuthPlugin {
        self.plugin
    }

    /// Response for the handshake packet or an auth switch
    pub fn initial_response(&mut self) -> Result<Bytes> {
        self.awaiting_public_key = false;
        let response = match self.plugin {
            AuthPlugin::NativePassword => native::scramble_native(&self.password, &self.scramble),
            AuthPlugin::CachingSha2Password => caching_sha2::scramble_sha256(&self.password, &self.scramble),
            AuthPlugin::Sha256Password => {
                if self.password.is_empty() {
                    vec![0]
                } else if self.secure {
                    caching_sha2::cleartext(&self.password)
                } else {
                    self.awaiting_public_key = true;
                    vec![auth_more::SHA256_REQUEST_PUBLIC_KEY]
                }
            }
            AuthPlugin::ClearPassword => {
                if !self.secure {
                    return Err(Error::Authentication(
                        "mysql_clear_password requires TLS or a Unix socket".into(),
                    ));
                }
                caching_sha2::cleartext(&self.password)
            }
        };
        Ok(Bytes::from(response))
    }

    /// Switch to another plugin with a fresh scramble
    pub fn switch(&mut self, plugin: &str, scramble: Bytes) -> Result<Bytes> {
        self.plugin = AuthPlugin::from_name(plugin)?;
        self.scramble = scramble;
        tracing::debug!(plugin = %self.plugin, "authentication plugin switched");
        self.initial_response()
    }

    /// Handle AuthMoreData; `None` means keep waiting for the server's verdict
    pub fn more_data(&mut self, data: &[u8]) -> Result<Option<Bytes>> {
        if self.awaiting_public_key {
            self.awaiting_public_key = false;
            tracing::debug!("received server public key");
            let encrypted = caching_sha2::encrypt_password(&self.password, &self.scramble, data)?;
            return Ok(Some(Bytes::from(encrypted)));
        }

        match (self.plugin, data.first().copied()) {
            (AuthPlugin::CachingSha2Password, Some(auth_more::FAST_AUTH_SUCCESS)) => {
                tracing::debug!("fast authentication succeeded");
                Ok(None)
            }
            (AuthPlugin::CachingSha2Password, Some(auth_more::PERFORM_FULL_AUTH)) => {
                if self.secure {
                    Ok(Some(Bytes::from(caching_sha2::cleartext(&self.password))))
                } else {
                    tracing::debug!("full authentication over plain transport, requesting public key");
                    self.awaiting_public_key = true;
                    Ok(Some(Bytes::from_static(&[auth_more::REQUEST_PUBLIC_KEY])))
                }
            }
            (plugin, first) => Err(Error::Protocol(format!(
                "unexpected auth more data for {}: {:?}",
                plugin, first
            ))),
        }
    }
}

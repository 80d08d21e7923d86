//! Handshake and authentication against a scripted server

mod common;

use bytes::BytesMut;
use common::*;
use futures::future::BoxFuture;
use mysql_wire::auth::{caching_sha2, native};
use mysql_wire::connection::{PasswordProvider, Transport};
use mysql_wire::protocol::constants::capabilities::*;
use mysql_wire::protocol::{Compressor, PacketCodec};
use mysql_wire::{BackendMessage, Client, CompressionAlgorithm, ConnectionConfig, Error, FrontendMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Auth response of a handshake response packet (lenenc client data)
fn auth_response(packet: &[u8], user: &str) -> Vec<u8> {
    let start = 32 + user.len() + 1;
    let len = packet[start] as usize;
    packet[start + 1..start + 1 + len].to_vec()
}

async fn run_client(io: tokio::io::DuplexStream, config: ConnectionConfig, secure: bool) -> mysql_wire::Result<Client> {
    Client::connect_with_transport(Transport::from_stream(io, secure), config).await
}

#[tokio::test]
async fn test_native_password_scramble() {
    init_tracing();
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let (client, response) = tokio::join!(run_client(client_io, config(), false), server.accept(CLIENT_SUPPORTED));
    let client = client.unwrap();

    assert_eq!(auth_response(&response, "app"), native::scramble_native("secret", &SALT));
    let session = client.session();
    assert_eq!(session.auth_plugin, "mysql_native_password");
    assert_eq!(session.connection_id, 42);
    assert_eq!(session.compression, CompressionAlgorithm::Uncompressed);
    assert!(!session.tls);
}

#[tokio::test]
async fn test_auth_switch_is_one_round_trip() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);
    let new_salt = *b"abcdefghijklmnopqrst";

    let server_task = async {
        server.write_raw(0, &greeting(CLIENT_SUPPORTED, "caching_sha2_password")).await;
        let (_, response) = server.read().await;
        assert_eq!(auth_response(&response, "app"), caching_sha2::scramble_sha256("secret", &SALT));

        let mut switch = vec![0xFE];
        switch.extend_from_slice(b"mysql_native_password\0");
        switch.extend_from_slice(&new_salt);
        switch.push(0);
        server.write(&switch).await;

        let (seq, switched) = server.read().await;
        assert_eq!(seq, 3);
        assert_eq!(switched, native::scramble_native("secret", &new_salt));
        server.write(&ok(0)).await;
    };

    let (client, ()) = tokio::join!(run_client(client_io, config(), false), server_task);
    let client = client.unwrap();
    assert_eq!(client.session().auth_plugin, "mysql_native_password");
    assert_eq!(&client.session().scramble[..], &new_salt);
}

#[tokio::test]
async fn test_caching_sha2_fast_auth() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let server_task = async {
        server.write_raw(0, &greeting(CLIENT_SUPPORTED, "caching_sha2_password")).await;
        let (_, response) = server.read().await;
        assert_eq!(auth_response(&response, "app").len(), 32);
        server.write(&[0x01, 0x03]).await;
        server.write(&ok(0)).await;
    };

    let (client, ()) = tokio::join!(run_client(client_io, config(), false), server_task);
    assert_eq!(client.unwrap().session().auth_plugin, "caching_sha2_password");
}

#[tokio::test]
async fn test_caching_sha2_full_auth_over_secure_transport() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let server_task = async {
        server.write_raw(0, &greeting(CLIENT_SUPPORTED, "caching_sha2_password")).await;
        server.read().await;
        server.write(&[0x01, 0x04]).await;
        let (_, password) = server.read().await;
        assert_eq!(password, b"secret\0");
        server.write(&ok(0)).await;
    };

    let (client, ()) = tokio::join!(run_client(client_io, config(), true), server_task);
    assert!(client.is_ok());
}

#[tokio::test]
async fn test_caching_sha2_full_auth_requests_public_key() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let server_task = async {
        server.write_raw(0, &greeting(CLIENT_SUPPORTED, "caching_sha2_password")).await;
        server.read().await;
        server.write(&[0x01, 0x04]).await;
        let (_, request) = server.read().await;
        assert_eq!(request, vec![0x02]);
        server.write(&err(1045, "28000", "Access denied for user 'app'")).await;
    };

    let (client, ()) = tokio::join!(run_client(client_io, config(), false), server_task);
    assert_eq!(client.unwrap_err().server_code(), Some(1045));
}

#[tokio::test]
async fn test_clear_password_needs_secure_transport() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);
    server.write_raw(0, &greeting(CLIENT_SUPPORTED, "mysql_clear_password")).await;

    let err = run_client(client_io, config(), false).await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_old_password_switch_rejected() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let server_task = async {
        server.write_raw(0, &greeting(CLIENT_SUPPORTED, "mysql_native_password")).await;
        server.read().await;
        server.write(&[0xFE]).await;
    };

    let (client, ()) = tokio::join!(run_client(client_io, config(), false), server_task);
    let err = client.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref m) if m.contains("mysql_old_password")));
}

#[tokio::test]
async fn test_database_and_attributes_are_sent() {
    let config = ConnectionConfig::builder()
        .user("app")
        .password("secret")
        .database("orders")
        .connect_attribute("program_name", "billing")
        .build()
        .unwrap();
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let (client, response) = tokio::join!(run_client(client_io, config, false), server.accept(CLIENT_SUPPORTED));
    let client = client.unwrap();

    let caps = u32::from_le_bytes([response[0], response[1], response[2], response[3]]);
    assert_ne!(caps & CLIENT_CONNECT_WITH_DB, 0);
    assert_ne!(caps & CLIENT_CONNECT_ATTRS, 0);
    assert_eq!(caps & CLIENT_SSL, 0);
    assert!(response.windows(7).any(|w| w == b"orders\0"));
    assert!(response.windows(7).any(|w| w == b"billing"));
    assert_eq!(client.session().database.as_deref(), Some("orders"));
}

#[tokio::test]
async fn test_no_database_clears_connect_with_db() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let (client, response) = tokio::join!(run_client(client_io, config(), false), server.accept(CLIENT_SUPPORTED));
    client.unwrap();
    let caps = u32::from_le_bytes([response[0], response[1], response[2], response[3]]);
    assert_eq!(caps & CLIENT_CONNECT_WITH_DB, 0);
    assert_eq!(caps & CLIENT_COMPRESS, 0);
    assert_ne!(caps & CLIENT_DEPRECATE_EOF, 0);
}

struct VaultPassword;

impl PasswordProvider for VaultPassword {
    fn password(&self) -> BoxFuture<'_, mysql_wire::Result<String>> {
        Box::pin(async { Ok("rotated".to_string()) })
    }
}

#[tokio::test]
async fn test_password_provider_is_resolved() {
    let config = ConnectionConfig::builder()
        .user("app")
        .password_provider(Arc::new(VaultPassword))
        .build()
        .unwrap();
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);

    let (client, response) = tokio::join!(run_client(client_io, config, false), server.accept(CLIENT_SUPPORTED));
    client.unwrap();
    assert_eq!(auth_response(&response, "app"), native::scramble_native("rotated", &SALT));
}

#[tokio::test]
async fn test_zlib_compression_after_auth() {
    let config = ConnectionConfig::builder()
        .user("app")
        .compression([CompressionAlgorithm::Zlib, CompressionAlgorithm::Uncompressed])
        .build()
        .unwrap();
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let mut server = MockServer::new(server_io);

    let (client, response) = tokio::join!(run_client(client_io, config, false), server.accept(CLIENT_SUPPORTED));
    let client = client.unwrap();
    let caps = u32::from_le_bytes([response[0], response[1], response[2], response[3]]);
    assert_ne!(caps & CLIENT_COMPRESS, 0);
    assert_eq!(client.session().compression, CompressionAlgorithm::Zlib);

    let mut io = server.into_inner();
    let server_task = tokio::spawn(async move {
        let mut codec = PacketCodec::new();
        codec.enable_compression(Compressor::Zlib);
        let mut buf = BytesMut::new();
        let command = loop {
            if let Some(payload) = codec.decode(&mut buf).unwrap() {
                break payload;
            }
            assert_ne!(io.read_buf(&mut buf).await.unwrap(), 0);
        };
        assert_eq!(&command[..], &[0x0E]);

        let mut out = BytesMut::new();
        codec.encode(&ok(0), &mut out).unwrap();
        io.write_all(&out).await.unwrap();
        io
    });

    let reply = client.exchange(FrontendMessage::Ping).await.unwrap();
    assert!(matches!(reply, BackendMessage::Ok(_)));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_compression_not_offered_is_config_error() {
    let config = ConnectionConfig::builder()
        .user("app")
        .compression([CompressionAlgorithm::Zlib])
        .build()
        .unwrap();
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);
    server.write_raw(0, &greeting(CLIENT_SUPPORTED & !CLIENT_COMPRESS, "mysql_native_password")).await;

    let err = run_client(client_io, config, false).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_greeting_error_is_verbatim() {
    let (client_io, server_io) = tokio::io::duplex(8192);
    let mut server = MockServer::new(server_io);
    server.write_raw(0, &err(1040, "08004", "Too many connections")).await;

    match run_client(client_io, config(), false).await.unwrap_err() {
        Error::Server(e) => {
            assert_eq!(e.code, 1040);
            assert_eq!(e.message, "Too many connections");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_connect_timeout_covers_handshake() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let hold = tokio::spawn(async move {
        // Accept and never greet
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let config = ConnectionConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .user("app")
        .connect_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let err = Client::connect(config).await.unwrap_err();
    assert!(matches!(err, Error::Timeout), "got {:?}", err);
    hold.abort();
}

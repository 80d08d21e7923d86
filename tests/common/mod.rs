//! Scripted in-memory MySQL server for integration tests

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use mysql_wire::connection::Transport;
use mysql_wire::protocol::constants::capabilities::CLIENT_SUPPORTED;
use mysql_wire::protocol::wire::{put_lenenc_bytes, put_lenenc_int, put_u24, u24_at};
use mysql_wire::{Client, ConnectionConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const SALT: [u8; 20] = [
    0x3a, 0x12, 0x55, 0x7e, 0x01, 0x42, 0x63, 0x19, 0x2c, 0x6f, 0x70, 0x11, 0x5d, 0x24, 0x33, 0x48, 0x0b,
    0x5a, 0x26, 0x79,
];

/// Server side of a duplex connection. Sequence ids follow the last packet read.
pub struct MockServer {
    io: DuplexStream,
    next_seq: u8,
}

impl MockServer {
    pub fn new(io: DuplexStream) -> Self {
        Self { io, next_seq: 0 }
    }

    /// Read one packet; `None` once the client closed its side
    pub async fn try_read(&mut self) -> Option<(u8, Vec<u8>)> {
        let mut header = [0u8; 4];
        self.io.read_exact(&mut header).await.ok()?;
        let len = u24_at(&header);
        let mut body = vec![0; len];
        self.io.read_exact(&mut body).await.ok()?;
        self.next_seq = header[3].wrapping_add(1);
        Some((header[3], body))
    }

    pub async fn read(&mut self) -> (u8, Vec<u8>) {
        self.try_read().await.expect("client closed the connection")
    }

    /// Read a command packet and return its payload
    pub async fn read_command(&mut self) -> Vec<u8> {
        let (seq, body) = self.read().await;
        assert_eq!(seq, 0, "commands start a new sequence");
        body
    }

    pub async fn write(&mut self, payload: &[u8]) {
        let mut buf = BytesMut::with_capacity(payload.len() + 4);
        put_u24(&mut buf, payload.len() as u32);
        buf.put_u8(self.next_seq);
        buf.put_slice(payload);
        self.next_seq = self.next_seq.wrapping_add(1);
        self.io.write_all(&buf).await.unwrap();
    }

    /// Write a packet with an explicit sequence id
    pub async fn write_raw(&mut self, seq: u8, payload: &[u8]) {
        self.next_seq = seq;
        self.write(payload).await;
    }

    pub async fn write_all(&mut self, payloads: &[Vec<u8>]) {
        for payload in payloads {
            self.write(payload).await;
        }
    }

    /// Greeting, handshake response and OK for `mysql_native_password`
    pub async fn accept(&mut self, caps: u32) -> Vec<u8> {
        self.write_raw(0, &greeting(caps, "mysql_native_password")).await;
        let (seq, response) = self.read().await;
        assert_eq!(seq, 1);
        self.write(&ok(0)).await;
        response
    }

    /// Raw stream, for speaking the compressed protocol
    pub fn into_inner(self) -> DuplexStream {
        self.io
    }

    pub async fn close(mut self) {
        let _ = self.io.shutdown().await;
    }
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::builder()
        .user("app")
        .password("secret")
        .build()
        .unwrap()
}

/// Authenticated client plus the server end of its connection
pub async fn connect(config: ConnectionConfig) -> (Client, MockServer) {
    connect_with_caps(config, CLIENT_SUPPORTED).await
}

pub async fn connect_with_caps(config: ConnectionConfig, caps: u32) -> (Client, MockServer) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let mut server = MockServer::new(server_io);
    let (client, _) = tokio::join!(
        Client::connect_with_transport(Transport::from_stream(client_io, false), config),
        server.accept(caps),
    );
    (client.unwrap(), server)
}

pub fn greeting(caps: u32, plugin: &str) -> Vec<u8> {
    let mut p = vec![10];
    p.extend_from_slice(b"8.0.36\0");
    p.extend_from_slice(&42u32.to_le_bytes());
    p.extend_from_slice(&SALT[..8]);
    p.push(0);
    p.extend_from_slice(&(caps as u16).to_le_bytes());
    p.push(255);
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
    p.push(21);
    p.extend_from_slice(&[0; 10]);
    p.extend_from_slice(&SALT[8..]);
    p.push(0);
    p.extend_from_slice(plugin.as_bytes());
    p.push(0);
    p
}

pub fn ok(status: u16) -> Vec<u8> {
    ok_with(0x00, 0, status)
}

pub fn ok_affected(affected: u64) -> Vec<u8> {
    ok_with(0x00, affected, 0)
}

/// OK packet closing a result set when deprecate-EOF is negotiated
pub fn ok_eof(status: u16) -> Vec<u8> {
    ok_with(0xFE, 0, status)
}

fn ok_with(header: u8, affected: u64, status: u16) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(header);
    put_lenenc_int(&mut buf, affected);
    put_lenenc_int(&mut buf, 0);
    buf.put_u16_le(status);
    buf.put_u16_le(0);
    buf.to_vec()
}

pub fn eof(status: u16) -> Vec<u8> {
    let mut p = vec![0xFE, 0, 0];
    p.extend_from_slice(&status.to_le_bytes());
    p
}

pub fn err(code: u16, state: &str, message: &str) -> Vec<u8> {
    let mut p = vec![0xFF];
    p.extend_from_slice(&code.to_le_bytes());
    p.push(b'#');
    p.extend_from_slice(state.as_bytes());
    p.extend_from_slice(message.as_bytes());
    p
}

pub fn column_count(n: u64) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_lenenc_int(&mut buf, n);
    buf.to_vec()
}

/// VARCHAR column definition
pub fn column(name: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_lenenc_bytes(&mut buf, b"def");
    put_lenenc_bytes(&mut buf, b"test");
    put_lenenc_bytes(&mut buf, b"t");
    put_lenenc_bytes(&mut buf, b"t");
    put_lenenc_bytes(&mut buf, name.as_bytes());
    put_lenenc_bytes(&mut buf, name.as_bytes());
    put_lenenc_int(&mut buf, 0x0C);
    buf.put_u16_le(255);
    buf.put_u32_le(1024);
    buf.put_u8(0xFD);
    buf.put_u16_le(0);
    buf.put_u8(0);
    buf.put_u16_le(0);
    buf.to_vec()
}

pub fn text_row(values: &[Option<&str>]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for value in values {
        match value {
            Some(v) => put_lenenc_bytes(&mut buf, v.as_bytes()),
            None => buf.put_u8(0xFB),
        }
    }
    buf.to_vec()
}

/// One-column result set with a row per value (deprecate-EOF framing)
pub fn result_set(name: &str, rows: &[&str]) -> Vec<Vec<u8>> {
    let mut packets = vec![column_count(1), column(name)];
    packets.extend(rows.iter().map(|r| text_row(&[Some(*r)])));
    packets.push(ok_eof(0));
    packets
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

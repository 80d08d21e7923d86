//! Packet framing
//!
//! Every payload travels as one or more packets of `3-byte length + sequence id + body`.
//! Payloads of `MAX_PAYLOAD_LEN` bytes or more are split; the final packet is always
//! shorter than the maximum, so a payload that is an exact multiple of the maximum ends
//! with an empty packet.
//!
//! With compression negotiated, the packet stream is cut into chunks wrapped in a
//! 7-byte envelope: `3-byte compressed length + sequence id + 3-byte uncompressed length`.
//! An uncompressed length of zero marks a chunk stored verbatim.

use super::compression::Compressor;
use super::constants::{COMPRESSED_HEADER_LEN, HEADER_LEN, MAX_PAYLOAD_LEN, MIN_COMPRESS_LENGTH};
use super::wire::{put_u24, u24_at};
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Stateful framer for one connection.
///
/// Owns the sequence counters; the sequencer resets them at the start of every command.
#[derive(Debug)]
pub struct PacketCodec {
    sequence: u8,
    compressed_sequence: u8,
    compression: Option<Compressor>,
    max_payload: usize,
    /// Payload bytes of a split packet still being reassembled
    partial: BytesMut,
    /// Decompressed packet bytes not yet deframed
    inflated: BytesMut,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCodec {
    /// Create a codec for a fresh connection (sequence 0, no compression)
    pub fn new() -> Self {
        Self {
            sequence: 0,
            compressed_sequence: 0,
            compression: None,
            max_payload: MAX_PAYLOAD_LEN,
            partial: BytesMut::new(),
            inflated: BytesMut::new(),
        }
    }

    /// Lower the split threshold. Only meaningful for exercising the split path.
    #[doc(hidden)]
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.clamp(1, MAX_PAYLOAD_LEN);
        self
    }

    /// Next expected / assigned sequence id
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Next compressed envelope sequence id
    pub fn compressed_sequence(&self) -> u8 {
        self.compressed_sequence
    }

    /// Whether packets are wrapped in the compressed envelope
    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }

    /// Start a new exchange: both counters go back to 0
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
        self.compressed_sequence = 0;
    }

    /// Switch to the compressed envelope. Takes effect for the next packet in either direction.
    pub fn enable_compression(&mut self, compressor: Compressor) {
        tracing::debug!(algorithm = compressor.label(), "compressed protocol enabled");
        self.compression = Some(compressor);
    }

    /// Frame `payload` into `dst`, splitting and compressing as needed
    pub fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        match self.compression {
            None => {
                self.write_packets(payload, dst);
                Ok(())
            }
            Some(compressor) => {
                let mut plain = BytesMut::with_capacity(payload.len() + HEADER_LEN);
                self.write_packets(payload, &mut plain);
                self.write_compressed(&compressor, &plain, dst)?;
                // Inner ids follow the envelope ids after a write
                self.sequence = self.compressed_sequence;
                Ok(())
            }
        }
    }

    fn write_packets(&mut self, payload: &[u8], dst: &mut BytesMut) {
        let mut last_len = 0;
        dst.reserve(payload.len() + HEADER_LEN * (payload.len() / self.max_payload + 1));

        for chunk in payload.chunks(self.max_payload) {
            self.put_header(dst, chunk.len());
            dst.put_slice(chunk);
            last_len = chunk.len();
        }

        // Terminating short packet (also covers the empty payload)
        if payload.is_empty() || last_len == self.max_payload {
            self.put_header(dst, 0);
        }
    }

    fn put_header(&mut self, dst: &mut BytesMut, len: usize) {
        put_u24(dst, len as u32);
        dst.put_u8(self.sequence);
        tracing::trace!(len, sequence = self.sequence, "packet framed");
        self.sequence = self.sequence.wrapping_add(1);
    }

    fn write_compressed(&mut self, compressor: &Compressor, plain: &[u8], dst: &mut BytesMut) -> Result<()> {
        for chunk in plain.chunks(self.max_payload) {
            let compressed = if chunk.len() >= MIN_COMPRESS_LENGTH {
                let compressed = compressor.compress(chunk)?;
                (compressed.len() < chunk.len()).then_some(compressed)
            } else {
                None
            };

            match compressed {
                Some(body) => {
                    crate::metrics::counters::bytes_compressed(compressor.label(), chunk.len() as u64);
                    put_u24(dst, body.len() as u32);
                    dst.put_u8(self.compressed_sequence);
                    put_u24(dst, chunk.len() as u32);
                    dst.put_slice(&body);
                }
                None => {
                    put_u24(dst, chunk.len() as u32);
                    dst.put_u8(self.compressed_sequence);
                    put_u24(dst, 0);
                    dst.put_slice(chunk);
                }
            }
            self.compressed_sequence = self.compressed_sequence.wrapping_add(1);
        }
        Ok(())
    }

    /// Take one complete payload out of `src`.
    ///
    /// Returns `Ok(None)` when more bytes are needed; consumed bytes are removed from `src`
    /// and partially reassembled payloads are kept across calls.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some(compressor) = self.compression else {
            return self.deframe_plain(src);
        };

        loop {
            if let Some(payload) = self.deframe_inflated()? {
                return Ok(Some(payload));
            }
            if !self.inflate_one(&compressor, src)? {
                return Ok(None);
            }
        }
    }

    fn deframe_plain(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let len = u24_at(src);
            let sequence = src[3];
            if src.len() < HEADER_LEN + len {
                return Ok(None);
            }

            if sequence != self.sequence {
                return Err(Error::Protocol(format!(
                    "packet sequence mismatch: expected {}, got {}",
                    self.sequence, sequence
                )));
            }
            self.sequence = self.sequence.wrapping_add(1);
            tracing::trace!(len, sequence, "packet received");

            src.advance(HEADER_LEN);
            let body = src.split_to(len);
            if let Some(payload) = self.push_chunk(body) {
                return Ok(Some(payload));
            }
        }
    }

    /// Deframe from the inflated buffer. Inner sequence ids are tracked, not enforced:
    /// the envelope sequence already guards ordering.
    fn deframe_inflated(&mut self) -> Result<Option<Bytes>> {
        loop {
            if self.inflated.len() < HEADER_LEN {
                return Ok(None);
            }
            let len = u24_at(&self.inflated);
            if self.inflated.len() < HEADER_LEN + len {
                return Ok(None);
            }
            let sequence = self.inflated[3];
            if sequence != self.sequence {
                tracing::trace!(expected = self.sequence, got = sequence, "inner sequence resynchronized");
            }
            self.sequence = sequence.wrapping_add(1);

            self.inflated.advance(HEADER_LEN);
            let body = self.inflated.split_to(len);
            if let Some(payload) = self.push_chunk(body) {
                return Ok(Some(payload));
            }
        }
    }

    /// Read one compressed envelope from `src` into the inflated buffer.
    /// Returns false when `src` does not yet hold a whole envelope.
    fn inflate_one(&mut self, compressor: &Compressor, src: &mut BytesMut) -> Result<bool> {
        if src.len() < COMPRESSED_HEADER_LEN {
            return Ok(false);
        }
        let compressed_len = u24_at(src);
        let sequence = src[3];
        let uncompressed_len = u24_at(&src[4..]);
        if src.len() < COMPRESSED_HEADER_LEN + compressed_len {
            return Ok(false);
        }

        if sequence != self.compressed_sequence {
            return Err(Error::Protocol(format!(
                "compressed packet sequence mismatch: expected {}, got {}",
                self.compressed_sequence, sequence
            )));
        }
        self.compressed_sequence = self.compressed_sequence.wrapping_add(1);

        src.advance(COMPRESSED_HEADER_LEN);
        let body = src.split_to(compressed_len);
        if uncompressed_len == 0 {
            self.inflated.extend_from_slice(&body);
        } else {
            let inflated = compressor.decompress(&body, uncompressed_len)?;
            self.inflated.extend_from_slice(&inflated);
        }
        tracing::trace!(compressed_len, uncompressed_len, sequence, "compressed packet received");
        Ok(true)
    }

    fn push_chunk(&mut self, body: BytesMut) -> Option<Bytes> {
        let complete = body.len() < self.max_payload;
        if self.partial.is_empty() && complete {
            return Some(body.freeze());
        }
        self.partial.unsplit(body);
        complete.then(|| self.partial.split().freeze())
    }
}

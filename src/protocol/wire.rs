//! Primitive MySQL wire types: fixed-width little-endian integers,
//! length-encoded integers and strings, NUL-terminated strings.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, what.to_string())
}

/// Cursor over a single packet payload
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Create a reader at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether the cursor reached the end
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Next byte without consuming it
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize, what: &str) -> io::Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(eof(what));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize, what: &str) -> io::Result<()> {
        self.read_bytes(n, what).map(|_| ())
    }

    /// Everything up to the end of the payload
    pub fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        out
    }

    pub fn read_u8(&mut self, what: &str) -> io::Result<u8> {
        Ok(self.read_bytes(1, what)?[0])
    }

    pub fn read_u16(&mut self, what: &str) -> io::Result<u16> {
        let b = self.read_bytes(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self, what: &str) -> io::Result<u32> {
        let b = self.read_bytes(3, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    pub fn read_u32(&mut self, what: &str) -> io::Result<u32> {
        let b = self.read_bytes(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self, what: &str) -> io::Result<u64> {
        let b = self.read_bytes(8, what)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    /// Length-encoded integer; `None` for the NULL marker (0xFB)
    pub fn read_lenenc_int(&mut self, what: &str) -> io::Result<Option<u64>> {
        let first = self.read_u8(what)?;
        let value = match first {
            0xFB => return Ok(None),
            0xFC => u64::from(self.read_u16(what)?),
            0xFD => u64::from(self.read_u24(what)?),
            0xFE => self.read_u64(what)?,
            0xFF => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid length-encoded integer prefix 0xFF in {}", what),
                ))
            }
            n => u64::from(n),
        };
        Ok(Some(value))
    }

    /// Length-encoded integer where NULL is not allowed
    pub fn read_lenenc_u64(&mut self, what: &str) -> io::Result<u64> {
        self.read_lenenc_int(what)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected NULL marker in {}", what),
            )
        })
    }

    /// Length-encoded byte string; `None` for NULL
    pub fn read_lenenc_bytes(&mut self, what: &str) -> io::Result<Option<&'a [u8]>> {
        match self.read_lenenc_int(what)? {
            None => Ok(None),
            Some(len) => {
                let len = usize::try_from(len).map_err(|_| eof(what))?;
                self.read_bytes(len, what).map(Some)
            }
        }
    }

    /// Length-encoded string decoded as UTF-8 (lossy)
    pub fn read_lenenc_string(&mut self, what: &str) -> io::Result<String> {
        let bytes = self.read_lenenc_bytes(what)?.unwrap_or_default();
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// NUL-terminated bytes, terminator consumed
    pub fn read_null_terminated(&mut self, what: &str) -> io::Result<&'a [u8]> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| eof(what))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    /// NUL-terminated string, or the rest of the payload when no terminator exists
    pub fn read_null_terminated_lenient(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos.min(self.data.len())..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.pos += end + 1;
                &rest[..end]
            }
            None => self.read_rest(),
        }
    }
}

/// Write a length-encoded integer
pub fn put_lenenc_int(buf: &mut BytesMut, value: u64) {
    if value < 251 {
        buf.put_u8(value as u8);
    } else if value < (1 << 16) {
        buf.put_u8(0xFC);
        buf.put_u16_le(value as u16);
    } else if value < (1 << 24) {
        buf.put_u8(0xFD);
        put_u24(buf, value as u32);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(value);
    }
}

/// Write a length-encoded byte string
pub fn put_lenenc_bytes(buf: &mut BytesMut, value: &[u8]) {
    put_lenenc_int(buf, value.len() as u64);
    buf.put_slice(value);
}

/// Write a NUL-terminated string
pub fn put_null_terminated(buf: &mut BytesMut, value: &[u8]) {
    buf.put_slice(value);
    buf.put_u8(0);
}

/// Write a 3-byte little-endian integer
pub fn put_u24(buf: &mut BytesMut, value: u32) {
    buf.put_slice(&value.to_le_bytes()[..3]);
}

/// Read a 3-byte little-endian integer from the start of a slice
pub fn u24_at(data: &[u8]) -> usize {
    usize::from(data[0]) | (usize::from(data[1]) << 8) | (usize::from(data[2]) << 16)
}

/// Copy a slice into an owned `Bytes`
pub fn to_bytes(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(data)
}

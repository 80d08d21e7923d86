//! Compression algorithms for the compressed protocol envelope

use crate::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Compression algorithm a client may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    /// Plain protocol
    Uncompressed,
    /// zlib (`CLIENT_COMPRESS`)
    Zlib,
    /// zstd (`CLIENT_ZSTD_COMPRESSION_ALGORITHM`), requires the `zstd` cargo feature
    Zstd,
}

impl CompressionAlgorithm {
    /// Whether this build can speak the algorithm
    pub fn is_available(&self) -> bool {
        match self {
            Self::Uncompressed | Self::Zlib => true,
            Self::Zstd => cfg!(feature = "zstd"),
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uncompressed => write!(f, "uncompressed"),
            Self::Zlib => write!(f, "zlib"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

impl std::str::FromStr for CompressionAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uncompressed" => Ok(Self::Uncompressed),
            "zlib" => Ok(Self::Zlib),
            "zstd" => Ok(Self::Zstd),
            other => Err(Error::Config(format!(
                "invalid compression algorithm '{}': expected uncompressed, zlib, or zstd",
                other
            ))),
        }
    }
}

/// Negotiated compressor used by the envelope codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    /// zlib at the default level
    Zlib,
    /// zstd at the configured level
    #[cfg(feature = "zstd")]
    Zstd {
        /// Compression level sent in the handshake response
        level: i32,
    },
}

impl Compressor {
    /// Compressor for a negotiated algorithm; `None` for the plain protocol
    pub fn for_algorithm(algorithm: CompressionAlgorithm, zstd_level: i32) -> Result<Option<Self>> {
        match algorithm {
            CompressionAlgorithm::Uncompressed => Ok(None),
            CompressionAlgorithm::Zlib => Ok(Some(Compressor::Zlib)),
            #[cfg(feature = "zstd")]
            CompressionAlgorithm::Zstd => Ok(Some(Compressor::Zstd { level: zstd_level })),
            #[cfg(not(feature = "zstd"))]
            CompressionAlgorithm::Zstd => {
                let _ = zstd_level;
                Err(Error::Config("zstd compression requires the `zstd` feature".into()))
            }
        }
    }

    pub(crate) fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compressor::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            #[cfg(feature = "zstd")]
            Compressor::Zstd { level } => Ok(zstd::bulk::compress(data, *level)?),
        }
    }

    /// Inflate `data`, which must expand to exactly `expected_len` bytes
    pub(crate) fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let out = match self {
            Compressor::Zlib => {
                let mut out = Vec::with_capacity(expected_len);
                // One byte past the header length is enough to detect a mismatch
                ZlibDecoder::new(data)
                    .take(expected_len as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::Protocol(format!("zlib decompression failed: {}", e)))?;
                out
            }
            #[cfg(feature = "zstd")]
            Compressor::Zstd { .. } => zstd::bulk::decompress(data, expected_len)
                .map_err(|e| Error::Protocol(format!("zstd decompression failed: {}", e)))?,
        };

        if out.len() != expected_len {
            return Err(Error::Protocol(format!(
                "decompressed length {} does not match header length {}",
                out.len(),
                expected_len
            )));
        }
        Ok(out)
    }

    /// Metric label
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Compressor::Zlib => "zlib",
            #[cfg(feature = "zstd")]
            Compressor::Zstd { .. } => "zstd",
        }
    }
}

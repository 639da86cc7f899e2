use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("gzip") => ContentEncoding::Gzip,
            Some("deflate") => ContentEncoding::Deflate,
            _ => ContentEncoding::Identity,
        }
    }

    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ContentEncoding::Identity => None,
            ContentEncoding::Gzip => Some("gzip"),
            ContentEncoding::Deflate => Some("deflate"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("failed to decompress {0:?} body: {1}")]
    Decode(ContentEncoding, std::io::Error),
    #[error("failed to compress {0:?} body: {1}")]
    Encode(ContentEncoding, std::io::Error),
}

/// Decode a response body according to its `Content-Encoding`, so rewriting
/// always operates on the plain bytes.
pub fn decode(encoding: ContentEncoding, body: &[u8]) -> Result<Vec<u8>, CompressionError> {
    match encoding {
        ContentEncoding::Identity => Ok(body.to_vec()),
        ContentEncoding::Gzip => {
            let mut decoder = GzDecoder::new(body);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CompressionError::Decode(encoding, e))?;
            Ok(out)
        }
        ContentEncoding::Deflate => {
            let mut decoder = DeflateDecoder::new(body);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CompressionError::Decode(encoding, e))?;
            Ok(out)
        }
    }
}

/// Re-encode a rewritten body to match the encoding the upstream originally
/// used, so downstream clients see a consistent `Content-Encoding`.
pub fn encode(encoding: ContentEncoding, body: &[u8]) -> Result<Bytes, CompressionError> {
    match encoding {
        ContentEncoding::Identity => Ok(Bytes::copy_from_slice(body)),
        ContentEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(body)
                .map_err(|e| CompressionError::Encode(encoding, e))?;
            let out = encoder
                .finish()
                .map_err(|e| CompressionError::Encode(encoding, e))?;
            Ok(Bytes::from(out))
        }
        ContentEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(body)
                .map_err(|e| CompressionError::Encode(encoding, e))?;
            let out = encoder
                .finish()
                .map_err(|e| CompressionError::Encode(encoding, e))?;
            Ok(Bytes::from(out))
        }
    }
}

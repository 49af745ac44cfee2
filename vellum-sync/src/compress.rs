//! Transfer payload compression
//!
//! Payloads below the configured minimum travel uncompressed, and a
//! compressed payload that did not get smaller is discarded in favor of the
//! original bytes, so the encoding marker always reflects what is actually
//! on the wire.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use vellum_transport::PayloadEncoding;

use crate::config::{CompressionAlgorithm, CompressionConfig};
use crate::errors::{Result, SyncError};

const ZSTD_LEVEL: i32 = 3;

/// Encode outgoing bytes per configuration. Returns the wire bytes and the
/// encoding actually applied.
pub fn encode(data: &[u8], config: &CompressionConfig) -> Result<(Bytes, PayloadEncoding)> {
    if !config.enabled || data.len() < config.min_size {
        return Ok((Bytes::copy_from_slice(data), PayloadEncoding::Identity));
    }

    let (compressed, encoding) = match config.algorithm {
        CompressionAlgorithm::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .and_then(|_| encoder.finish())
                .map(|out| (out, PayloadEncoding::Gzip))
                .map_err(|e| SyncError::Compression(e.to_string()))?
        }
        CompressionAlgorithm::Zstd => zstd::stream::encode_all(data, ZSTD_LEVEL)
            .map(|out| (out, PayloadEncoding::Zstd))
            .map_err(|e| SyncError::Compression(e.to_string()))?,
    };

    if compressed.len() < data.len() {
        Ok((Bytes::from(compressed), encoding))
    } else {
        Ok((Bytes::copy_from_slice(data), PayloadEncoding::Identity))
    }
}

/// Decode incoming bytes per their wire encoding.
pub fn decode(data: &[u8], encoding: PayloadEncoding) -> Result<Bytes> {
    match encoding {
        PayloadEncoding::Identity => Ok(Bytes::copy_from_slice(data)),
        PayloadEncoding::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| SyncError::Compression(e.to_string()))?;
            Ok(Bytes::from(out))
        }
        PayloadEncoding::Zstd => zstd::stream::decode_all(data)
            .map(Bytes::from)
            .map_err(|e| SyncError::Compression(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(algorithm: CompressionAlgorithm, min_size: usize) -> CompressionConfig {
        CompressionConfig {
            enabled: true,
            algorithm,
            min_size,
        }
    }

    #[test]
    fn small_payloads_stay_identity() {
        let (out, encoding) =
            encode(b"tiny", &config(CompressionAlgorithm::Gzip, 4096)).unwrap();
        assert_eq!(encoding, PayloadEncoding::Identity);
        assert_eq!(&out[..], b"tiny");
    }

    #[test]
    fn compressible_payload_round_trips() {
        let data = "the same line over and over\n".repeat(200);
        for algorithm in [CompressionAlgorithm::Gzip, CompressionAlgorithm::Zstd] {
            let (wire, encoding) = encode(data.as_bytes(), &config(algorithm, 16)).unwrap();
            assert_ne!(encoding, PayloadEncoding::Identity);
            assert!(wire.len() < data.len());
            assert_eq!(&decode(&wire, encoding).unwrap()[..], data.as_bytes());
        }
    }

    #[test]
    fn incompressible_payload_falls_back_to_identity() {
        // Pseudo-random bytes; gzip output would be larger than the input.
        let mut data = Vec::with_capacity(2048);
        let mut state = 0x2545f4914f6cdd1du64;
        for _ in 0..2048 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            data.push(state as u8);
        }

        let (wire, encoding) = encode(&data, &config(CompressionAlgorithm::Gzip, 16)).unwrap();
        assert_eq!(encoding, PayloadEncoding::Identity);
        assert_eq!(&wire[..], &data[..]);
    }

    #[test]
    fn disabled_compression_is_identity() {
        let cfg = CompressionConfig {
            enabled: false,
            ..Default::default()
        };
        let data = "x".repeat(100_000);
        let (_, encoding) = encode(data.as_bytes(), &cfg).unwrap();
        assert_eq!(encoding, PayloadEncoding::Identity);
    }
}

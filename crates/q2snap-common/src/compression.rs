// compression.rs -- raw deflate for demo blocks
//
// Blocks are raw deflate streams (no zlib header). A block is only stored
// compressed when that saves a meaningful amount of space.

use std::io::Read;

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;

use crate::qcommon::MAX_MSGLEN;

/// Blocks smaller than this are never worth compressing.
pub const MIN_COMPRESS_SIZE: usize = 100;

/// Only keep the compressed form if it saves at least this percentage.
pub const COMPRESS_THRESHOLD_PERCENT: usize = 20;

/// Compress a block. Returns `None` when the raw block should be stored.
pub fn compress_block(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < MIN_COMPRESS_SIZE {
        return None;
    }

    let mut encoder = DeflateEncoder::new(data, Compression::default());
    let mut compressed = Vec::with_capacity(data.len());
    encoder.read_to_end(&mut compressed).ok()?;

    let threshold = data.len() * (100 - COMPRESS_THRESHOLD_PERCENT) / 100;
    if compressed.len() < threshold {
        Some(compressed)
    } else {
        None
    }
}

/// Inflate a block. Fails if the stream is corrupt or inflates past
/// `max_size` (capped at one full message).
pub fn decompress_block(data: &[u8], max_size: usize) -> Option<Vec<u8>> {
    let max_size = max_size.min(MAX_MSGLEN);

    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::with_capacity(max_size.min(data.len() * 4));

    let mut buffer = [0u8; 4096];
    loop {
        match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                if decompressed.len() + n > max_size {
                    return None;
                }
                decompressed.extend_from_slice(&buffer[..n]);
            }
            Err(_) => return None,
        }
    }

    Some(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress_roundtrip() {
        let original: Vec<u8> = std::iter::repeat(b"svc_frame ".iter().copied())
            .take(40)
            .flatten()
            .collect();
        let compressed = compress_block(&original).unwrap();
        assert!(compressed.len() < original.len());
        let decompressed = decompress_block(&compressed, MAX_MSGLEN).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    fn test_small_block_not_compressed() {
        assert!(compress_block(b"tiny").is_none());
    }

    #[test]
    fn test_decompress_size_limit() {
        let original = vec![0u8; 10000];
        let compressed = compress_block(&original).unwrap();
        assert!(decompress_block(&compressed, 100).is_none());
        assert!(decompress_block(&compressed, 20000).is_some());
    }

    #[test]
    fn test_corrupt_stream_rejected() {
        assert!(decompress_block(&[0xff, 0xff, 0xff, 0xff], 1024).is_none());
    }
}

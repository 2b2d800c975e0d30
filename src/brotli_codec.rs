//! Thin wrapper around the `brotli` crate, used as a black-box
//! `encode(src) -> dst` / `decode(src) -> dst` primitive by the payload
//! codec. No chunk table or streaming state is kept here; each call is a
//! one-shot, in-memory round trip over a single node's payload block.

use crate::error::{Error, Result};
use std::io::Write;

const DEFAULT_LG_WINDOW_SIZE: u32 = 22;

/// Compresses `src` with the given quality (0-11; higher is slower and
/// smaller).
pub fn encode(src: &[u8], quality: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let params = brotli::enc::BrotliEncoderParams {
            quality: quality.min(11) as i32,
            lgwin: DEFAULT_LG_WINDOW_SIZE as i32,
            ..Default::default()
        };
        let mut writer = brotli::CompressorWriter::with_params(&mut out, 4096, &params);
        writer
            .write_all(src)
            .map_err(|e| Error::CodecFailure(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| Error::CodecFailure(e.to_string()))?;
    }
    Ok(out)
}

/// Decompresses `src`, which must have been produced by [`encode`].
pub fn decode(src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut reader = brotli::Decompressor::new(src, 4096);
    std::io::copy(&mut reader, &mut out).map_err(|e| Error::CodecFailure(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trips() {
        let encoded = encode(&[], 5).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        let src: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let encoded = encode(&src, 9).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn quality_is_clamped_to_eleven() {
        let src = b"abcdefgh".to_vec();
        let encoded = encode(&src, 99).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, src);
    }
}

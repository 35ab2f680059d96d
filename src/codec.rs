//! Codec Module
//!
//! Body compression. The cache compresses a whole body on `put` and decodes it
//! chunk by chunk on `match`, so every codec exposes an incremental decoder.

use std::fmt;
use std::io;

use thiserror::Error;
use zstd::stream::raw::{Decoder as RawDecoder, InBuffer, Operation, OutBuffer};

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 4;

// == Codec Error ==
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    Compress(#[source] io::Error),

    #[error("decompression failed: {0}")]
    Decompress(#[source] io::Error),
}

// == Traits ==
/// Compresses and decompresses body payloads.
pub trait Codec: Send + Sync + fmt::Debug + 'static {
    /// Name recorded alongside stored bodies.
    fn name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Starts an incremental decoder for one payload.
    fn decoder(&self) -> Result<Box<dyn StreamDecoder>, CodecError>;
}

/// Incremental decoder fed with consecutive slices of one compressed payload.
pub trait StreamDecoder: Send {
    /// Decodes `input` and returns whatever output is ready.
    fn feed(&mut self, input: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Ends the payload and returns any remaining output.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, CodecError>;
}

// == Identity ==
/// Stores bodies as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decoder(&self) -> Result<Box<dyn StreamDecoder>, CodecError> {
        Ok(Box::new(IdentityDecoder))
    }
}

struct IdentityDecoder;

impl StreamDecoder for IdentityDecoder {
    fn feed(&mut self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(input.to_vec())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, CodecError> {
        Ok(Vec::new())
    }
}

// == Zstd ==
/// zstd compression at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::stream::encode_all(data, self.level).map_err(CodecError::Compress)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::stream::decode_all(data).map_err(CodecError::Decompress)
    }

    fn decoder(&self) -> Result<Box<dyn StreamDecoder>, CodecError> {
        let inner = RawDecoder::new().map_err(CodecError::Decompress)?;
        Ok(Box::new(ZstdDecoder {
            inner,
            buf: vec![0; DECODE_BUFFER_SIZE],
            frame_done: false,
        }))
    }
}

/// Output buffer drained per decoder call.
const DECODE_BUFFER_SIZE: usize = 64 * 1024;

struct ZstdDecoder {
    inner: RawDecoder<'static>,
    buf: Vec<u8>,
    /// True once the last call ended exactly on a frame boundary
    frame_done: bool,
}

impl StreamDecoder for ZstdDecoder {
    fn feed(&mut self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let mut src = InBuffer::around(input);
        let mut decoded = Vec::new();

        loop {
            let mut dst = OutBuffer::around(self.buf.as_mut_slice());
            let hint = self
                .inner
                .run(&mut src, &mut dst)
                .map_err(CodecError::Decompress)?;
            let written = dst.pos();
            drop(dst);
            decoded.extend_from_slice(&self.buf[..written]);
            self.frame_done = hint == 0;

            if src.pos() == input.len() && written < self.buf.len() {
                return Ok(decoded);
            }
        }
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, CodecError> {
        if !self.frame_done {
            return Err(CodecError::Decompress(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "incomplete zstd frame",
            )));
        }
        Ok(Vec::new())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn decode_in_slices(codec: &dyn Codec, payload: &[u8], slice: usize) -> Vec<u8> {
        let mut decoder = codec.decoder().unwrap();
        let mut out = Vec::new();
        for part in payload.chunks(slice) {
            out.extend(decoder.feed(part).unwrap());
        }
        out.extend(decoder.finish().unwrap());
        out
    }

    #[test]
    fn test_identity_is_passthrough() {
        let data = sample(1000);
        let codec = IdentityCodec;

        assert_eq!(codec.compress(&data).unwrap(), data);
        assert_eq!(codec.decompress(&data).unwrap(), data);
        assert_eq!(decode_in_slices(&codec, &data, 7), data);
        assert_eq!(codec.name(), "identity");
    }

    #[test]
    fn test_zstd_compresses_repetitive_data() {
        let data = vec![b'a'; 100_000];
        let codec = ZstdCodec::default();

        let compressed = codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len() / 10);
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_zstd_incremental_decoder_matches_bulk() {
        let data = sample(300_000);
        let codec = ZstdCodec::new(1);
        let compressed = codec.compress(&data).unwrap();

        assert_eq!(decode_in_slices(&codec, &compressed, 1024), data);
        assert_eq!(decode_in_slices(&codec, &compressed, compressed.len()), data);
    }

    #[test]
    fn test_zstd_incremental_decoder_rejects_truncated_payload() {
        let data = sample(100_000);
        let codec = ZstdCodec::default();
        let compressed = codec.compress(&data).unwrap();
        let half = &compressed[..compressed.len() / 2];

        assert!(matches!(codec.decompress(half), Err(CodecError::Decompress(_))));

        let mut decoder = codec.decoder().unwrap();
        let partial = decoder.feed(half).unwrap();
        assert!(partial.len() < data.len());
        match decoder.finish() {
            Err(CodecError::Decompress(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected truncated frame error, got {:?}", other),
        }
    }

    #[test]
    fn test_zstd_decoder_without_input_is_incomplete() {
        let decoder = ZstdCodec::default().decoder().unwrap();
        assert!(matches!(decoder.finish(), Err(CodecError::Decompress(_))));
    }

    #[test]
    fn test_zstd_rejects_garbage() {
        let codec = ZstdCodec::default();
        let result = codec.decompress(b"definitely not zstd");
        assert!(matches!(result, Err(CodecError::Decompress(_))));
    }

    #[test]
    fn test_zstd_empty_payload() {
        let codec = ZstdCodec::default();
        let compressed = codec.compress(&[]).unwrap();
        assert!(codec.decompress(&compressed).unwrap().is_empty());
    }
}

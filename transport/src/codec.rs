//! Newline-delimited JSON framing for the debugger socket.
//!
//! Each frame is one envelope serialized on a single line. Decoding
//! consumes the line before parsing it, so a malformed frame surfaces
//! as an error for that frame only and the next frame still decodes.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame is not valid utf8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("malformed frame: {0}")]
    Deserializing(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
pub struct EnvelopeCodec;

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let line = src.split_to(newline + 1);
        let text = std::str::from_utf8(&line[..newline])?;
        let envelope = serde_json::from_str(text.trim_end_matches('\r'))?;
        Ok(Some(envelope))
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = serde_json::to_vec(&item)?;
        dst.reserve(encoded.len() + 1);
        dst.put_slice(&encoded);
        dst.put_u8(b'\n');
        Ok(())
    }
}

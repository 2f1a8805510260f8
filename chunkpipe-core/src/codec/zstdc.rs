use super::{CodecId, Compressor};
use crate::error::{PipelineError, Result};
use std::io::{Read, Write};

const MAX_RATIO_HINT: u64 = 64;

pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }

    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>> {
        let mut enc = zstd::stream::Encoder::new(Vec::with_capacity(src.len() / 2), level.max(1))?;
        enc.write_all(src)?;
        Ok(enc.finish()?)
    }

    fn decompress(&self, src: &[u8], u_size: u64) -> Result<Vec<u8>> {
        let dec = zstd::stream::Decoder::new(src)?;
        // u_size comes from the archive itself; don't trust it for allocation
        let hint = u_size.min((src.len() as u64).saturating_mul(MAX_RATIO_HINT));
        let mut out = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
        // read one byte past the expected size so oversized frames are caught
        dec.take(u_size.saturating_add(1)).read_to_end(&mut out)?;
        if out.len() as u64 != u_size {
            return Err(PipelineError::Format(format!(
                "zstd entry decoded to {} bytes, table says {u_size}",
                out.len()
            )));
        }
        Ok(out)
    }
}

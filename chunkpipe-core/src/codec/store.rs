use super::{CodecId, Compressor};
use crate::error::{PipelineError, Result};

/// Entry bytes written as-is.
pub struct Store;

impl Compressor for Store {
    fn id(&self) -> CodecId {
        CodecId::Store
    }

    fn compress(&self, src: &[u8], _level: i32) -> Result<Vec<u8>> {
        Ok(src.to_vec())
    }

    fn decompress(&self, src: &[u8], u_size: u64) -> Result<Vec<u8>> {
        if src.len() as u64 != u_size {
            return Err(PipelineError::Format(format!(
                "stored entry is {} bytes, table says {u_size}",
                src.len()
            )));
        }
        Ok(src.to_vec())
    }
}

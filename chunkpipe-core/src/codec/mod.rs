use serde::Serialize;

use crate::error::{PipelineError, Result};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    Store = 0,
    Zstd = 1,
}

impl CodecId {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(CodecId::Store),
            1 => Ok(CodecId::Zstd),
            other => Err(PipelineError::Format(format!("unknown codec id {other}"))),
        }
    }
}

pub trait Compressor: Send + Sync {
    fn id(&self) -> CodecId;
    fn compress(&self, src: &[u8], level: i32) -> Result<Vec<u8>>;
    /// `u_size` is the expected decompressed length, used as a capacity hint and a check.
    fn decompress(&self, src: &[u8], u_size: u64) -> Result<Vec<u8>>;
}

pub fn codec_for(id: CodecId) -> &'static dyn Compressor {
    match id {
        CodecId::Store => &store::Store,
        CodecId::Zstd => &zstdc::ZstdCompressor,
    }
}

pub mod store;
pub mod zstdc;

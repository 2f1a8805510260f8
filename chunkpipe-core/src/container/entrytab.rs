use crate::error::{PipelineError, Result};
use std::io::Write;

pub const ENTRY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRow {
    pub codec: u8,
    pub u_size: u64,
    pub c_size: u64,
    pub data_off: u64,
}

// Layout: [0]=codec (u8), [1..8]=pad, [8..16]=u_size, [16..24]=c_size, [24..32]=data_off
pub fn write_table(mut w: impl Write, rows: &[EntryRow]) -> Result<()> {
    let mut buf = [0u8; ENTRY_SIZE];
    for e in rows {
        buf[0] = e.codec;
        buf[1..8].fill(0);
        buf[8..16].copy_from_slice(&e.u_size.to_le_bytes());
        buf[16..24].copy_from_slice(&e.c_size.to_le_bytes());
        buf[24..32].copy_from_slice(&e.data_off.to_le_bytes());
        w.write_all(&buf)?;
    }
    Ok(())
}

#[inline]
fn le64(x: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&x[..8]);
    u64::from_le_bytes(b)
}

pub fn read_table(buf: &[u8], count: u64) -> Result<Vec<EntryRow>> {
    let need = count
        .checked_mul(ENTRY_SIZE as u64)
        .ok_or_else(|| PipelineError::Format("entry table size overflow".into()))?;
    if buf.len() as u64 != need {
        return Err(PipelineError::Format(format!(
            "entry table size mismatch: got {} bytes, expected {need}",
            buf.len()
        )));
    }
    Ok(buf
        .chunks_exact(ENTRY_SIZE)
        .map(|e| EntryRow {
            codec: e[0],
            u_size: le64(&e[8..16]),
            c_size: le64(&e[16..24]),
            data_off: le64(&e[24..32]),
        })
        .collect())
}

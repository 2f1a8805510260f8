use crate::codec::{CodecId, codec_for};
use crate::container::entrytab::{ENTRY_SIZE, EntryRow, write_table};
use crate::container::manifest::{EntryMeta, Manifest, Meta};
use crate::container::superblock::{HEADER_LEN, Superblock, VERSION};
use crate::container::tail::TailSummary;
use crate::error::{PipelineError, Result};
use crate::util::hash_forward::HashingForward;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::{Cursor, Seek, SeekFrom, Write};
use time::OffsetDateTime;

const ZSTD_LEVEL: i32 = 3;

#[derive(Clone, Debug)]
pub struct PackOptions {
    /// When true, zero timestamps in the index for deterministic output.
    pub deterministic: bool,
    /// Only accept compression if it saves at least this fraction.
    /// e.g. 0.05 means "compress only if >=5% smaller than STORE".
    pub min_gain: f32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            deterministic: false,
            min_gain: 0.05,
        }
    }
}

/// A named byte stream to be packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl NamedEntry {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

fn should_compress(u: usize, c: usize, min_gain: f32) -> bool {
    // true if (u - c) >= u * min_gain  ⇔  c <= u * (1 - min_gain)
    u > 0 && (u as f64 - c as f64) >= (u as f64 * min_gain as f64)
}

struct Encoded {
    codec: CodecId,
    payload: Vec<u8>,
}

fn encode_entry(e: &NamedEntry, min_gain: f32) -> Result<Encoded> {
    let zstd = codec_for(CodecId::Zstd);
    let trial = zstd.compress(&e.data, ZSTD_LEVEL)?;
    if should_compress(e.data.len(), trial.len(), min_gain) {
        Ok(Encoded {
            codec: zstd.id(),
            payload: trial,
        })
    } else {
        Ok(Encoded {
            codec: CodecId::Store,
            payload: e.data.clone(),
        })
    }
}

/// Packs `entries`, in the given order, into one archive image.
///
/// Layout: superblock | CBOR index | entry table | entry data | tail.
pub fn pack(entries: &[NamedEntry], opts: &PackOptions) -> Result<Vec<u8>> {
    let mut seen = HashSet::with_capacity(entries.len());
    for e in entries {
        if !seen.insert(e.name.as_str()) {
            return Err(PipelineError::Format(format!(
                "duplicate entry name: {}",
                e.name
            )));
        }
    }

    // In parallel, each entry independent
    let encoded: Vec<Encoded> = entries
        .par_iter()
        .map(|e| encode_entry(e, opts.min_gain))
        .collect::<Result<Vec<_>>>()?;

    let created = if opts.deterministic {
        0
    } else {
        OffsetDateTime::now_utc().unix_timestamp()
    };
    let manifest = Manifest {
        entries: entries
            .iter()
            .enumerate()
            .map(|(i, e)| EntryMeta {
                name: e.name.clone(),
                id: i as u64,
                u_size: e.data.len() as u64,
            })
            .collect(),
        meta: Meta {
            created,
            tool: concat!("chunkpipe-core/", env!("CARGO_PKG_VERSION")).to_string(),
        },
    };

    let mut manifest_buf = Vec::new();
    ciborium::ser::into_writer(&manifest, &mut manifest_buf)
        .map_err(|e| PipelineError::Format(format!("index encode: {e}")))?;
    let manifest_len = manifest_buf.len() as u64;

    let entry_table_off = HEADER_LEN + manifest_len;
    let entry_count = encoded.len() as u64;
    let data_off = entry_table_off + entry_count * ENTRY_SIZE as u64;

    let mut cursor = data_off;
    let rows: Vec<EntryRow> = entries
        .iter()
        .zip(&encoded)
        .map(|(e, enc)| {
            let row = EntryRow {
                codec: enc.codec as u8,
                u_size: e.data.len() as u64,
                c_size: enc.payload.len() as u64,
                data_off: cursor,
            };
            cursor += row.c_size;
            row
        })
        .collect();
    let mut table_buf = Vec::with_capacity(rows.len() * ENTRY_SIZE);
    write_table(&mut table_buf, &rows)?;

    let mut out = Cursor::new(Vec::with_capacity(cursor as usize + 256));
    Superblock {
        version: VERSION,
        flags: 0,
        manifest_len: 0,
        entry_table_off: 0,
        entry_count: 0,
        data_off: 0,
    }
    .write_to(&mut out)?;

    out.seek(SeekFrom::Start(HEADER_LEN))?;
    out.write_all(&manifest_buf)?;
    out.write_all(&table_buf)?;

    let mut h_data = blake3::Hasher::new();
    let total_c = {
        let mut hw = HashingForward::new(&mut out, &mut h_data);
        for enc in &encoded {
            hw.write_all(&enc.payload)?;
        }
        hw.counted
    };

    TailSummary {
        manifest_blake3: *blake3::hash(&manifest_buf).as_bytes(),
        table_blake3: *blake3::hash(&table_buf).as_bytes(),
        data_blake3: *h_data.finalize().as_bytes(),
        total_u: rows.iter().map(|r| r.u_size).sum(),
        total_c,
    }
    .write_to(&mut out)?;

    // finalize superblock
    out.seek(SeekFrom::Start(0))?;
    Superblock {
        version: VERSION,
        flags: 0,
        manifest_len,
        entry_table_off,
        entry_count,
        data_off,
    }
    .write_to(&mut out)?;

    Ok(out.into_inner())
}

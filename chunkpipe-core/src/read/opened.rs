use serde::Serialize;

use crate::codec::{CodecId, codec_for};
use crate::container::entrytab::{EntryRow, read_table};
use crate::container::manifest::Manifest;
use crate::container::superblock::{HEADER_LEN, Superblock};
use crate::container::tail::TAIL_LEN;
use crate::error::{PipelineError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub name: String,
    pub codec: CodecId,
    pub u_size: u64,
    pub c_size: u64,
    pub data_off: u64,
}

/// An archive image parsed and bounds-checked, entries decoded on demand.
pub struct OpenedArchive {
    pub(crate) image: Vec<u8>,
    pub sb: Superblock,
    pub manifest: Manifest,
    pub table: Vec<EntryRow>,
}

fn slice<'a>(image: &'a [u8], off: u64, len: u64, what: &str) -> Result<&'a [u8]> {
    let end = off
        .checked_add(len)
        .filter(|&e| e <= image.len() as u64)
        .ok_or_else(|| PipelineError::Format(format!("{what} out of bounds")))?;
    Ok(&image[off as usize..end as usize])
}

impl OpenedArchive {
    pub fn open(image: Vec<u8>) -> Result<Self> {
        let sb = Superblock::read_from(&image[..])
            .map_err(|e| PipelineError::Format(format!("superblock: {e}")))?;

        let man_bytes = slice(&image, HEADER_LEN, sb.manifest_len, "index")?;
        let manifest: Manifest = ciborium::de::from_reader(man_bytes)
            .map_err(|e| PipelineError::Format(format!("index decode: {e}")))?;

        if sb.entry_table_off != HEADER_LEN + sb.manifest_len || sb.data_off < sb.entry_table_off
        {
            return Err(PipelineError::Format("inconsistent superblock offsets".into()));
        }
        let table_bytes = slice(
            &image,
            sb.entry_table_off,
            sb.data_off - sb.entry_table_off,
            "entry table",
        )?;
        let table = read_table(table_bytes, sb.entry_count)?;

        // bounds
        let data_end = (image.len() as u64).saturating_sub(TAIL_LEN);
        for (i, row) in table.iter().enumerate() {
            if row.data_off < sb.data_off || row.data_off.saturating_add(row.c_size) > data_end {
                return Err(PipelineError::Format(format!("entry[{i}] out of bounds")));
            }
        }
        for em in &manifest.entries {
            if em.id >= sb.entry_count {
                return Err(PipelineError::Format(format!(
                    "entry {} points past the table",
                    em.name
                )));
            }
            if table[em.id as usize].u_size != em.u_size {
                return Err(PipelineError::Format(format!(
                    "entry {} size disagrees between index and table",
                    em.name
                )));
            }
        }

        Ok(Self {
            image,
            sb,
            manifest,
            table,
        })
    }

    pub fn len(&self) -> usize {
        self.manifest.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.entries.is_empty()
    }

    /// Entries in archive order.
    pub fn list(&self) -> Result<Vec<EntryView>> {
        self.manifest
            .entries
            .iter()
            .map(|em| {
                let row = &self.table[em.id as usize];
                Ok(EntryView {
                    name: em.name.clone(),
                    codec: CodecId::from_u8(row.codec)?,
                    u_size: row.u_size,
                    c_size: row.c_size,
                    data_off: row.data_off,
                })
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.manifest.entries.iter().map(|e| e.name.as_str())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let em = self
            .manifest
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PipelineError::Format(format!("no such entry: {name}")))?;
        self.read_row(em.id as usize)
    }

    pub(crate) fn read_row(&self, id: usize) -> Result<Vec<u8>> {
        let row = &self.table[id];
        let payload = slice(&self.image, row.data_off, row.c_size, "entry data")?;
        codec_for(CodecId::from_u8(row.codec)?).decompress(payload, row.u_size)
    }
}

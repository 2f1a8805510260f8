use std::io::{Read, Write};

pub const MAGIC: &[u8; 6] = b"CPARCH";
pub const VERSION: u16 = 1;
/// magic + version + flags + four u64 fields
pub const HEADER_LEN: u64 = 6 + 2 + 2 + 8 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub version: u16,
    pub flags: u16,
    /// Byte length of the index (CBOR)
    pub manifest_len: u64,
    pub entry_table_off: u64,
    pub entry_count: u64,
    /// Absolute offset where entry data starts
    pub data_off: u64,
}

impl Superblock {
    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.manifest_len.to_le_bytes())?;
        w.write_all(&self.entry_table_off.to_le_bytes())?;
        w.write_all(&self.entry_count.to_le_bytes())?;
        w.write_all(&self.data_off.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        let mut magic = [0u8; 6];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a chunkpipe archive (bad magic)",
            ));
        }
        let mut b2 = [0u8; 2];
        r.read_exact(&mut b2)?;
        let version = u16::from_le_bytes(b2);
        if version != VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unsupported archive version {version}"),
            ));
        }
        r.read_exact(&mut b2)?;
        let flags = u16::from_le_bytes(b2);
        let mut b8 = [0u8; 8];
        let mut next = || -> std::io::Result<u64> {
            r.read_exact(&mut b8)?;
            Ok(u64::from_le_bytes(b8))
        };
        Ok(Self {
            version,
            flags,
            manifest_len: next()?,
            entry_table_off: next()?,
            entry_count: next()?,
            data_off: next()?,
        })
    }
}

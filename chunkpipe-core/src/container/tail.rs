use serde::{Serialize, Serializer};
use std::io::{Read, Write};

pub const TAIL_MAGIC: [u8; 8] = *b"CPTAIL\0\0";
pub const TAIL_LEN: u64 = 120;

/// Integrity summary appended after the entry data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TailSummary {
    #[serde(serialize_with = "hex_digest")]
    pub manifest_blake3: [u8; 32],
    #[serde(serialize_with = "hex_digest")]
    pub table_blake3: [u8; 32],
    #[serde(serialize_with = "hex_digest")]
    pub data_blake3: [u8; 32],
    pub total_u: u64,
    pub total_c: u64,
}

fn hex_digest<S: Serializer>(digest: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(digest))
}

impl TailSummary {
    pub fn write_to<W: Write>(self, mut w: W) -> std::io::Result<()> {
        w.write_all(&TAIL_MAGIC)?;
        w.write_all(&self.manifest_blake3)?;
        w.write_all(&self.table_blake3)?;
        w.write_all(&self.data_blake3)?;
        w.write_all(&self.total_u.to_le_bytes())?;
        w.write_all(&self.total_c.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> std::io::Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != TAIL_MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad tail magic",
            ));
        }
        let mut t = TailSummary::default();
        r.read_exact(&mut t.manifest_blake3)?;
        r.read_exact(&mut t.table_blake3)?;
        r.read_exact(&mut t.data_blake3)?;
        let mut buf8 = [0u8; 8];
        r.read_exact(&mut buf8)?;
        t.total_u = u64::from_le_bytes(buf8);
        r.read_exact(&mut buf8)?;
        t.total_c = u64::from_le_bytes(buf8);
        Ok(t)
    }
}

/// Tail of an in-memory archive image (its last `TAIL_LEN` bytes).
pub fn read_tail(image: &[u8]) -> std::io::Result<TailSummary> {
    if (image.len() as u64) < TAIL_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "archive too small for tail",
        ));
    }
    TailSummary::read_from(&image[image.len() - TAIL_LEN as usize..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_roundtrip_from_image_end() {
        let t = TailSummary {
            manifest_blake3: [1; 32],
            table_blake3: [2; 32],
            data_blake3: [3; 32],
            total_u: 10,
            total_c: 7,
        };
        let mut image = b"payload".to_vec();
        t.write_to(&mut image).unwrap();
        assert_eq!(image.len() as u64, 7 + TAIL_LEN);
        assert_eq!(read_tail(&image).unwrap(), t);
    }

    #[test]
    fn test_short_image_has_no_tail() {
        assert!(read_tail(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_digests_serialize_as_hex() {
        let t = TailSummary {
            data_blake3: [0xab; 32],
            ..Default::default()
        };
        let v = serde_json::to_value(t).unwrap();
        assert_eq!(v["data_blake3"], "ab".repeat(32));
        assert_eq!(v["total_u"], 0);
    }
}

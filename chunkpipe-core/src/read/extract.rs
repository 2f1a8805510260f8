use super::opened::OpenedArchive;
use crate::container::superblock::HEADER_LEN;
use crate::container::tail::{TailSummary, read_tail};
use crate::error::{PipelineError, Result};

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Writes every entry under `dest`, returning the paths written.
pub fn extract(archive: &OpenedArchive, dest: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)?;
    let mut written = Vec::with_capacity(archive.len());
    for em in &archive.manifest.entries {
        let outp = safe_join(dest, &em.name)?;
        if let Some(parent) = outp.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = archive.read_row(em.id as usize)?;
        if data.len() as u64 != em.u_size {
            return Err(PipelineError::Format(format!(
                "extracted size mismatch for {}",
                em.name
            )));
        }
        fs::write(&outp, &data)?;
        written.push(outp);
    }
    Ok(written)
}

fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    if rel.is_empty() || !p.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(PipelineError::Format(format!("unsafe entry name: {rel}")));
    }
    Ok(root.join(p))
}

/// Recomputes the tail digests and decodes every entry.
pub fn verify(archive: &OpenedArchive) -> Result<TailSummary> {
    let image = &archive.image;
    let sb = &archive.sb;
    let tail =
        read_tail(image).map_err(|e| PipelineError::Format(format!("tail read failed: {e}")))?;

    let got_manifest = blake3::hash(&image[HEADER_LEN as usize..sb.entry_table_off as usize]);
    let got_table = blake3::hash(&image[sb.entry_table_off as usize..sb.data_off as usize]);

    let mut h_data = blake3::Hasher::new();
    let mut total_u = 0u64;
    let mut total_c = 0u64;
    for (id, row) in archive.table.iter().enumerate() {
        let start = row.data_off as usize;
        h_data.update(&image[start..start + row.c_size as usize]);
        total_c = total_c.saturating_add(row.c_size);
        total_u = total_u.saturating_add(archive.read_row(id)?.len() as u64);
    }
    let got_data = h_data.finalize();

    let ok = tail.manifest_blake3 == *got_manifest.as_bytes()
        && tail.table_blake3 == *got_table.as_bytes()
        && tail.data_blake3 == *got_data.as_bytes()
        && tail.total_u == total_u
        && tail.total_c == total_c;
    if !ok {
        return Err(PipelineError::Format("verify mismatch (tail)".into()));
    }
    Ok(tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecId;
    use crate::container::entrytab::ENTRY_SIZE;
    use crate::pack::writer::{NamedEntry, PackOptions, pack};

    fn sample() -> Vec<u8> {
        let entries = vec![
            NamedEntry::new("summary.json", br#"{"total":2}"#.to_vec()),
            NamedEntry::new("chunk_000.json", br#"[{"a":1}]"#.repeat(200)),
            NamedEntry::new("chunk_001.json", Vec::new()),
        ];
        pack(
            &entries,
            &PackOptions {
                deterministic: true,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_open_list_read() {
        let arc = OpenedArchive::open(sample()).unwrap();
        let names: Vec<_> = arc.names().collect();
        assert_eq!(names, vec!["summary.json", "chunk_000.json", "chunk_001.json"]);

        let rows = arc.list().unwrap();
        // repetitive payload compresses, tiny one does not
        assert_eq!(rows[1].codec, CodecId::Zstd);
        assert_eq!(rows[0].codec, CodecId::Store);
        assert_eq!(rows[2].u_size, 0);

        assert_eq!(arc.read("summary.json").unwrap(), br#"{"total":2}"#);
        assert_eq!(arc.read("chunk_000.json").unwrap().len(), 9 * 200);
        assert!(arc.read("missing.json").is_err());
    }

    #[test]
    fn test_corrupt_table_size_is_rejected_on_open() {
        let mut image = sample();
        let table_off = OpenedArchive::open(image.clone()).unwrap().sb.entry_table_off as usize;
        // row 1 is the zstd entry; bytes 8..16 of a row hold u_size
        let row = table_off + ENTRY_SIZE;
        image[row + 8..row + 16].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            OpenedArchive::open(image),
            Err(PipelineError::Format(_))
        ));
    }

    #[test]
    fn test_verify_ok_and_detects_corruption() {
        let image = sample();
        let arc = OpenedArchive::open(image.clone()).unwrap();
        let tail = verify(&arc).unwrap();
        assert_eq!(tail.total_u, 11 + 9 * 200);

        // flip one byte inside the first entry's data
        let off = arc.list().unwrap()[0].data_off as usize;
        let mut bad = image;
        bad[off] ^= 0x20;
        let arc = OpenedArchive::open(bad).unwrap();
        assert!(verify(&arc).is_err());
    }

    #[test]
    fn test_open_rejects_garbage() {
        assert!(OpenedArchive::open(b"not an archive".to_vec()).is_err());
        let mut truncated = sample();
        truncated.truncate(60);
        assert!(OpenedArchive::open(truncated).is_err());
    }

    #[test]
    fn test_extract_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let arc = OpenedArchive::open(sample()).unwrap();
        let written = extract(&arc, dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(
            std::fs::read(dir.path().join("summary.json")).unwrap(),
            br#"{"total":2}"#
        );
    }

    #[test]
    fn test_extract_refuses_unsafe_names() {
        let dir = tempfile::tempdir().unwrap();
        let image = pack(
            &[NamedEntry::new("../evil.json", b"{}".to_vec())],
            &PackOptions::default(),
        )
        .unwrap();
        let arc = OpenedArchive::open(image).unwrap();
        assert!(matches!(
            extract(&arc, dir.path()),
            Err(PipelineError::Format(_))
        ));
    }
}

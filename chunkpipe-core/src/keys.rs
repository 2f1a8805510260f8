//! Object key layout shared with the rest of the processing fleet.
//!
//! Given a source key `uploads/dir/name.json`:
//! - chunk record sets: `processed/data/dir/name_chunk_{n}_data.json`
//! - final archive:     `processed/dir/name_processed.zip` (a `CPARCH` container)

const UPLOADS: &str = "uploads/";
const PROCESSED: &str = "processed/";
const PROCESSED_DATA: &str = "processed/data/";
const SOURCE_EXT: &str = ".json";
const ARCHIVE_EXT: &str = ".zip";

/// Splits `key` into (stem, extension-with-dot). Only the last path segment is
/// considered, and a leading dot does not start an extension.
fn split_ext(key: &str) -> (&str, &str) {
    let seg_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    match key[seg_start..].rfind('.') {
        Some(0) | None => (key, ""),
        Some(i) => key.split_at(seg_start + i),
    }
}

pub fn chunk_data_key(source_key: &str, chunk_number: u32) -> String {
    let moved = source_key.replace(UPLOADS, PROCESSED_DATA);
    let (stem, ext) = split_ext(&moved);
    let ext = if ext.is_empty() { SOURCE_EXT } else { ext };
    format!("{stem}_chunk_{chunk_number}_data{ext}")
}

/// Common prefix of every chunk record-set key derived from `source_key`.
pub fn chunk_data_prefix(source_key: &str) -> String {
    let moved = source_key.replace(UPLOADS, PROCESSED_DATA);
    let (stem, _) = split_ext(&moved);
    format!("{stem}_chunk_")
}

/// Key of the merged archive. The `.zip` suffix is kept for key compatibility;
/// the object is a `CPARCH` container (see `pack::writer`), not a ZIP file, and
/// is read back with `OpenedArchive` or `chunkpipe archive extract`.
pub fn archive_key(source_key: &str) -> String {
    let moved = source_key.replace(UPLOADS, PROCESSED);
    let (stem, _) = split_ext(&moved);
    format!("{stem}_processed{ARCHIVE_EXT}")
}

/// Archive entry name for one chunk's record set.
pub fn chunk_entry_name(chunk_number: u32) -> String {
    format!("chunk_{chunk_number:03}.json")
}

pub const SUMMARY_ENTRY: &str = "summary.json";

/// Last path segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_data_key() {
        assert_eq!(
            chunk_data_key("uploads/recipes.json", 0),
            "processed/data/recipes_chunk_0_data.json"
        );
        assert_eq!(
            chunk_data_key("uploads/2024/big.recipes.json", 12),
            "processed/data/2024/big.recipes_chunk_12_data.json"
        );
    }

    #[test]
    fn test_chunk_data_key_without_extension() {
        assert_eq!(
            chunk_data_key("uploads/dump", 3),
            "processed/data/dump_chunk_3_data.json"
        );
        assert_eq!(
            chunk_data_key("uploads/v1.2/dump", 1),
            "processed/data/v1.2/dump_chunk_1_data.json"
        );
    }

    #[test]
    fn test_archive_key() {
        assert_eq!(
            archive_key("uploads/recipes.json"),
            "processed/recipes_processed.zip"
        );
        assert_eq!(
            archive_key("uploads/a/b/c.json"),
            "processed/a/b/c_processed.zip"
        );
    }

    #[test]
    fn test_chunk_keys_share_prefix() {
        let prefix = chunk_data_prefix("uploads/recipes.json");
        for n in [0, 1, 250] {
            assert!(chunk_data_key("uploads/recipes.json", n).starts_with(&prefix));
        }
    }

    #[test]
    fn test_entry_names_are_zero_padded() {
        assert_eq!(chunk_entry_name(0), "chunk_000.json");
        assert_eq!(chunk_entry_name(7), "chunk_007.json");
        assert_eq!(chunk_entry_name(1234), "chunk_1234.json");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("uploads/x/recipes.json"), "recipes.json");
        assert_eq!(file_name("plain"), "plain");
    }
}

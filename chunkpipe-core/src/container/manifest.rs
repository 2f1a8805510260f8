use serde::{Deserialize, Serialize};

/// One named byte stream in the archive; `id` indexes the entry table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub id: u64,
    pub u_size: u64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Meta {
    pub created: i64,
    pub tool: String,
}

/// Container index, stored CBOR-encoded right after the superblock.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<EntryMeta>,
    pub meta: Meta,
}

// Copyright 2020 Joyent, Inc.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// The identity of a file in the namespace.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialOrd,
    PartialEq,
    Serialize,
)]
pub struct PnfsId(String);

impl PnfsId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PnfsId {
    fn from(s: &str) -> Self {
        PnfsId(s.to_string())
    }
}

/// The attributes of a file that pool selection looks at.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FileAttributes {
    pub pnfs_id: PnfsId,
    /// The size of the file in bytes. For writes this is the expected size.
    pub size: u64,
    pub storage_class: Option<String>,
}

impl FileAttributes {
    pub fn new(pnfs_id: PnfsId, size: u64) -> Self {
        FileAttributes {
            pnfs_id,
            size,
            storage_class: None,
        }
    }
}

/// The access protocol a client wants to use, handed through to the pool.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProtocolInfo {
    pub protocol: String,
    pub major_version: u32,
    pub minor_version: u32,
    /// The client host, if known.
    pub host: Option<String>,
}

impl ProtocolInfo {
    pub fn new(protocol: &str, major_version: u32) -> Self {
        ProtocolInfo {
            protocol: protocol.to_string(),
            major_version,
            minor_version: 0,
            host: None,
        }
    }
}

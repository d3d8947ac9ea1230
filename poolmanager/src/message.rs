// Copyright 2020 Joyent, Inc.

//! The messages exchanged between the client proxy, the pool manager and the
//! pools.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::file::{FileAttributes, PnfsId, ProtocolInfo};
use crate::pool::PoolName;
use crate::selection::{Assumption, SelectedPool};

/// The route of a message: a list of cell addresses, outermost first.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct CellPath(Vec<String>);

impl CellPath {
    pub fn new(address: &str) -> Self {
        CellPath(vec![address.to_string()])
    }

    /// This path extended by one more hop.
    pub fn plus(&self, address: &str) -> Self {
        let mut hops = self.0.clone();
        hops.push(address.to_string());
        CellPath(hops)
    }

    /// The final destination of the path.
    pub fn destination(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn hops(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CellPath {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.0.join(":").fmt(fmt)
    }
}

/// Whether a client reads a file or writes it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum IoDirection {
    Read,
    Write,
}

impl fmt::Display for IoDirection {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IoDirection::Read => String::from("read").fmt(fmt),
            IoDirection::Write => String::from("write").fmt(fmt),
        }
    }
}

/// Ask the pool manager for a pool to read a file from or write it to.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SelectPoolRequest {
    pub direction: IoDirection,
    pub file: FileAttributes,
    pub protocol: ProtocolInfo,
    /// The partition to select with. The default partition if `None`.
    pub partition: Option<String>,
}

/// The pool the pool manager chose.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SelectPoolReply {
    pub pnfs_id: PnfsId,
    pub pool: PoolName,
    /// The address to route pool messages through.
    pub address: String,
    pub assumption: Assumption,
}

impl SelectPoolReply {
    pub fn new(pnfs_id: PnfsId, pool: SelectedPool) -> Self {
        SelectPoolReply {
            pnfs_id,
            pool: pool.name,
            address: pool.address,
            assumption: pool.assumption,
        }
    }
}

/// Ask a pool to start a mover delivering the file to a client (read) or
/// accepting it from one (write).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PoolIoRequest {
    pub direction: IoDirection,
    pub pool: PoolName,
    pub file: FileAttributes,
    pub protocol: ProtocolInfo,
    pub assumption: Assumption,
}

/// A pool's confirmation that a mover was started.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PoolIoReply {
    pub pool: PoolName,
    pub pnfs_id: PnfsId,
    pub mover_id: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Message {
    SelectPool(SelectPoolRequest),
    SelectPoolReply(SelectPoolReply),
    PoolIo(PoolIoRequest),
    PoolIoReply(PoolIoReply),
}

impl Message {
    /// A short name of the message kind for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SelectPool(_) => "select-pool",
            Message::SelectPoolReply(_) => "select-pool-reply",
            Message::PoolIo(_) => "pool-io",
            Message::PoolIoReply(_) => "pool-io-reply",
        }
    }
}

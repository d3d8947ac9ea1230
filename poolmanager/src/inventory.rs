// Copyright 2020 Joyent, Inc.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cost::CostModule;
use crate::error::Error;
use crate::file::FileAttributes;
use crate::pool::PoolInfo;

/// What a set of candidate pools is wanted for.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    /// Pools holding an online replica of the file.
    Read,
    /// Pools accepting new files from clients.
    Write,
    /// Pools able to restore the file from nearline storage.
    Stage,
    /// Pools accepting replicas from other pools.
    P2p,
}

impl fmt::Display for Direction {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Read => String::from("read").fmt(fmt),
            Direction::Write => String::from("write").fmt(fmt),
            Direction::Stage => String::from("stage").fmt(fmt),
            Direction::P2p => String::from("p2p").fmt(fmt),
        }
    }
}

/// The pools an inventory offers for one request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Candidates {
    pub pools: Vec<PoolInfo>,
    /// The partition the matching selection unit asks for, if any.
    pub partition: Option<String>,
}

/// Pool inventory
///
/// The `Inventory` trait is the read-only view of the pool topology and its
/// cost figures that pool selection runs on. Implementations decide which
/// pools may serve a request; selection only ranks what it is given.
/// Every call returns a fresh snapshot, so a selection never observes the
/// inventory changing under it.
pub trait Inventory: Send + Sync {
    /// The candidate pools for `file` in the given direction. An empty list
    /// is a valid answer; for `Direction::Read` it means no online replica
    /// exists.
    fn candidates(
        &self,
        direction: Direction,
        file: &FileAttributes,
    ) -> Result<Candidates, Error>;

    /// The cost figures of every known pool.
    fn cost_module(&self) -> Arc<dyn CostModule>;
}

impl<T: Inventory + ?Sized> Inventory for Arc<T> {
    fn candidates(
        &self,
        direction: Direction,
        file: &FileAttributes,
    ) -> Result<Candidates, Error> {
        (**self).candidates(direction, file)
    }

    fn cost_module(&self) -> Arc<dyn CostModule> {
        (**self).cost_module()
    }
}

// Copyright 2020 Joyent, Inc.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pool::{self, PoolInfo, PoolName};

/// An opaque fingerprint of the state the selector saw a pool in when it
/// chose it. The selector only carries it; callers compare it to detect
/// stale decisions.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
pub struct Assumption(String);

impl Assumption {
    pub fn of(pool: &PoolInfo) -> Self {
        Assumption(pool::cost_fingerprint(pool))
    }

    /// Whether `pool` still reports the state this assumption was made on.
    pub fn holds_for(&self, pool: &PoolInfo) -> bool {
        self.0 == pool::cost_fingerprint(pool)
    }
}

/// The pool chosen by a selection.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SelectedPool {
    pub name: PoolName,
    pub address: String,
    pub host: Option<String>,
    pub assumption: Assumption,
}

impl From<&PoolInfo> for SelectedPool {
    fn from(pool: &PoolInfo) -> Self {
        SelectedPool {
            name: pool.name.clone(),
            address: pool.address.clone(),
            host: pool.host_name().map(String::from),
            assumption: Assumption::of(pool),
        }
    }
}

/// The source and destination of a pool to pool copy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct P2pPair {
    source: SelectedPool,
    destination: SelectedPool,
}

impl P2pPair {
    /// Pair up a source and a destination. Fails if they are the same pool.
    pub fn new(
        source: SelectedPool,
        destination: SelectedPool,
    ) -> Result<Self, Error> {
        if source.name == destination.name {
            return Err(Error::PermissionDenied(format!(
                "P2P denied: source and destination are both {}",
                source.name
            )));
        }
        Ok(P2pPair {
            source,
            destination,
        })
    }

    pub fn source(&self) -> &SelectedPool {
        &self.source
    }

    pub fn destination(&self) -> &SelectedPool {
        &self.destination
    }
}

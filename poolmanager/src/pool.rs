// Copyright 2020 Joyent, Inc.

use std::collections::HashMap;

use base64;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

/// The name of a pool. Pool names are unique within a cluster.
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
pub struct PoolName(String);

impl PoolName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PoolName {
    fn from(s: &str) -> Self {
        PoolName(s.to_string())
    }
}

/// The tag holding the name of the host a pool runs on.
pub const HOSTNAME_TAG: &str = "hostname";

/// Space metrics reported by a pool, in bytes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PoolSpaceInfo {
    pub total: u64,
    pub free: u64,
    pub precious: u64,
    pub removable: u64,
    /// Space the pool keeps in reserve and never fills.
    pub gap: u64,
}

/// Activity of one queue class (movers, stores, restores, p2p) of a pool.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PoolQueueInfo {
    pub name: String,
    pub active: u32,
    pub max: u32,
    pub queued: u32,
}

/// A snapshot of the live cost metrics of one pool.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PoolCostInfo {
    pub space: PoolSpaceInfo,
    pub queues: Vec<PoolQueueInfo>,
}

/// An immutable description of one candidate pool: identity, cost metrics
/// and tags. A fresh `PoolInfo` is built from the inventory for every
/// selection.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PoolInfo {
    pub name: PoolName,
    /// The cell address used to route messages to the pool.
    pub address: String,
    pub cost: PoolCostInfo,
    pub tags: HashMap<String, String>,
}

impl PoolInfo {
    pub fn new(
        name: PoolName,
        address: String,
        cost: PoolCostInfo,
        tags: HashMap<String, String>,
    ) -> Self {
        PoolInfo {
            name,
            address,
            cost,
            tags,
        }
    }

    pub fn host_name(&self) -> Option<&str> {
        self.tags.get(HOSTNAME_TAG).map(String::as_str)
    }

    /// Space available to new files: free plus reclaimable space, minus the
    /// gap. Saturates at zero.
    pub fn available_space(&self) -> u64 {
        let space = &self.cost.space;
        space
            .free
            .saturating_add(space.removable)
            .saturating_sub(space.gap)
    }

    /// A pool can hold a file only if `free + removable - gap > size`.
    pub fn can_hold_file(&self, size: u64) -> bool {
        let space = &self.cost.space;
        (space.free as u128 + space.removable as u128)
            > (space.gap as u128 + size as u128)
    }
}

/// Return a base64 encoded fingerprint of the state a pool reported in its
/// cost info. Two snapshots of a pool fingerprint equal only if the pool
/// reported the same space and queue figures.
pub fn cost_fingerprint(pool: &PoolInfo) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(pool.name.as_str().as_bytes());
    sha1.update(b"||");
    sha1.update(pool.address.as_bytes());
    let space = &pool.cost.space;
    for figure in &[
        space.total,
        space.free,
        space.precious,
        space.removable,
        space.gap,
    ] {
        sha1.update(b"||");
        sha1.update(figure.to_string().as_bytes());
    }
    for queue in &pool.cost.queues {
        sha1.update(b"||");
        sha1.update(queue.name.as_bytes());
        sha1.update(
            format!("{}/{}/{}", queue.active, queue.max, queue.queued)
                .as_bytes(),
        );
    }

    base64::encode(&sha1.digest().bytes())
}

// Copyright 2020 Joyent, Inc.

//! Space accounting of link groups.
//!
//! A link group bundles links, a link reaches pools directly or through pool
//! groups. The same pool is often reachable through more than one link of a
//! group, so every pool is counted once per group.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pool::{PoolName, PoolSpaceInfo};

/// The kinds of files a link group accepts.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct LinkGroupFlags {
    pub online: bool,
    pub nearline: bool,
    pub replica: bool,
    pub output: bool,
    pub custodial: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LinkGroup {
    pub name: String,
    pub links: Vec<String>,
    #[serde(default)]
    pub flags: LinkGroupFlags,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Link {
    #[serde(default)]
    pub pools: Vec<PoolName>,
    #[serde(default)]
    pub pool_groups: Vec<String>,
}

/// The last reported state of a pool.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PoolState {
    pub enabled: bool,
    pub space: PoolSpaceInfo,
}

/// A read-only snapshot of the selection topology.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Topology {
    pub link_groups: Vec<LinkGroup>,
    pub links: HashMap<String, Link>,
    pub pool_groups: HashMap<String, Vec<PoolName>>,
    pub pools: HashMap<PoolName, PoolState>,
}

/// The space of one link group, summed over its distinct enabled pools.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LinkGroupSpace {
    pub name: String,
    /// Free plus removable space, in bytes.
    pub free: u64,
    pub total: u64,
    pub pool_count: usize,
    pub flags: LinkGroupFlags,
    pub updated: DateTime<Utc>,
}

impl LinkGroupSpace {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}

impl Topology {
    // Every pool a link reaches, directly or through its pool groups.
    fn link_pools<'a>(&'a self, link: &'a Link) -> impl Iterator<Item = &'a PoolName> {
        link.pools.iter().chain(
            link.pool_groups
                .iter()
                .filter_map(move |g| self.pool_groups.get(g))
                .flatten(),
        )
    }

    /// One space record per link group. Links, pool groups and pools the
    /// snapshot does not know are skipped, as are disabled pools.
    pub fn aggregate(&self) -> Vec<LinkGroupSpace> {
        let updated = Utc::now();
        let mut spaces = BTreeMap::new();

        for group in &self.link_groups {
            let mut seen: HashSet<&PoolName> = HashSet::new();
            let mut free: u64 = 0;
            let mut total: u64 = 0;

            let links = group.links.iter().filter_map(|l| self.links.get(l));
            for link in links {
                for name in self.link_pools(link) {
                    let pool = match self.pools.get(name) {
                        Some(pool) if pool.enabled => pool,
                        _ => continue,
                    };
                    if !seen.insert(name) {
                        continue;
                    }
                    free = free
                        .saturating_add(pool.space.free)
                        .saturating_add(pool.space.removable);
                    total = total.saturating_add(pool.space.total);
                }
            }

            spaces.insert(
                group.name.clone(),
                LinkGroupSpace {
                    name: group.name.clone(),
                    free,
                    total,
                    pool_count: seen.len(),
                    flags: group.flags,
                    updated,
                },
            );
        }

        spaces.into_iter().map(|(_, space)| space).collect()
    }
}

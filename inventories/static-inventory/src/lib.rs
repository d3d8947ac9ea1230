// Copyright 2020 Joyent, Inc.

//! An inventory over a fixed set of pools.
//!
//! Every pool accepts writes, stages and replicas. Reads are offered the
//! pools a replica of the file was registered on. Pool snapshots can be
//! replaced at any time, for instance to report the space a write used up.

use std::collections::{BTreeSet, HashMap};
use std::sync::{
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use slog::{debug, o, Drain, Logger};

use poolmanager::cost::{CostModule, CostSnapshot};
use poolmanager::error::Error;
use poolmanager::file::{FileAttributes, PnfsId};
use poolmanager::inventory::{Candidates, Direction, Inventory};
use poolmanager::pool::{PoolInfo, PoolName};

#[derive(Debug, Default)]
struct InventoryData {
    pools: Vec<PoolInfo>,
    replicas: HashMap<PnfsId, BTreeSet<PoolName>>,
}

#[derive(Debug)]
pub struct StaticInventory {
    data: RwLock<InventoryData>,
    partition: Option<String>,
    log: Logger,
}

impl StaticInventory {
    pub fn new(pools: Vec<PoolInfo>, log: Option<Logger>) -> Self {
        let log = log.unwrap_or_else(|| {
            Logger::root(slog_stdlog::StdLog.fuse(), o!())
        });

        StaticInventory {
            data: RwLock::new(InventoryData {
                pools,
                replicas: HashMap::new(),
            }),
            partition: None,
            log,
        }
    }

    /// Ask for the named partition in every candidate list.
    pub fn with_partition(mut self, partition: &str) -> Self {
        self.partition = Some(partition.to_string());
        self
    }

    fn read_data(&self) -> RwLockReadGuard<InventoryData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_data(&self) -> RwLockWriteGuard<InventoryData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pools(&self) -> Vec<PoolInfo> {
        self.read_data().pools.clone()
    }

    /// Replace the snapshot of a known pool, or add a new pool.
    pub fn update_pool(&self, pool: PoolInfo) {
        let mut data = self.write_data();
        debug!(self.log, "updating pool {}", pool.name);
        match data.pools.iter_mut().find(|p| p.name == pool.name) {
            Some(existing) => *existing = pool,
            None => data.pools.push(pool),
        }
    }

    /// Drop a pool and every replica registered on it.
    pub fn remove_pool(&self, name: &PoolName) {
        let mut data = self.write_data();
        data.pools.retain(|p| &p.name != name);
        for pools in data.replicas.values_mut() {
            pools.remove(name);
        }
    }

    /// Record that `pool` holds an online replica of the file.
    pub fn add_replica(&self, pnfs_id: &PnfsId, pool: &PoolName) {
        self.write_data()
            .replicas
            .entry(pnfs_id.clone())
            .or_insert_with(BTreeSet::new)
            .insert(pool.clone());
    }

    pub fn remove_replica(&self, pnfs_id: &PnfsId, pool: &PoolName) {
        if let Some(pools) = self.write_data().replicas.get_mut(pnfs_id) {
            pools.remove(pool);
        }
    }
}

impl Inventory for StaticInventory {
    fn candidates(
        &self,
        direction: Direction,
        file: &FileAttributes,
    ) -> Result<Candidates, Error> {
        let data = self.read_data();
        let pools: Vec<PoolInfo> = match direction {
            Direction::Read => match data.replicas.get(&file.pnfs_id) {
                Some(holders) => data
                    .pools
                    .iter()
                    .filter(|p| holders.contains(&p.name))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            },
            Direction::Write | Direction::Stage | Direction::P2p => {
                data.pools.clone()
            }
        };

        debug!(self.log, "{} candidates for {}: {}", direction,
            file.pnfs_id, pools.len());
        Ok(Candidates {
            pools,
            partition: self.partition.clone(),
        })
    }

    fn cost_module(&self) -> Arc<dyn CostModule> {
        Arc::new(CostSnapshot::new(&self.read_data().pools))
    }
}

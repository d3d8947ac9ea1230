// Copyright 2020 Joyent, Inc.

//! Least recently used round robin selection.
//!
//! The strategy keeps no state of its own. The time each pool was last
//! selected lives in an [`AccessTimes`](struct.AccessTimes.html) table that
//! outlives any one partition, so reconfiguring a partition keeps its
//! fairness history. By default all LRU partitions of the process share one
//! table.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lazy_static::lazy_static;
use rand::Rng;
use slog::{o, trace, Drain, Logger};

use crate::cost::CostModule;
use crate::error::Error;
use crate::file::FileAttributes;
use crate::partition::{
    defaults_with, pools_with_room, Partition, PartitionSettings, Properties,
    PropertyMap,
};
use crate::pool::{PoolInfo, PoolName};
use crate::selection::{P2pPair, SelectedPool};

pub const TYPE: &str = "lru";

lazy_static! {
    static ref SHARED: Arc<AccessTimes> = Arc::new(AccessTimes::new(None));
}

/// Logical access times of pools, one table for writes and one for reads.
///
/// Times come from a counter that only moves forward. A pool that was never
/// selected has no entry; scans treat it as a random negative time, older
/// than any real access.
#[derive(Debug)]
pub struct AccessTimes {
    write: DashMap<PoolName, i64>,
    read: DashMap<PoolName, i64>,
    counter: AtomicI64,
    log: Logger,
}

impl AccessTimes {
    pub fn new(log: Option<Logger>) -> Self {
        let log = log.unwrap_or_else(|| {
            Logger::root(slog_stdlog::StdLog.fuse(), o!())
        });
        AccessTimes {
            write: DashMap::new(),
            read: DashMap::new(),
            counter: AtomicI64::new(0),
            log,
        }
    }

    /// The table shared by every LRU partition that was not given its own.
    pub fn shared() -> Arc<AccessTimes> {
        Arc::clone(&SHARED)
    }

    pub fn last_write(&self, pool: &PoolName) -> Option<i64> {
        self.write.get(pool).map(|t| *t)
    }

    pub fn last_read(&self, pool: &PoolName) -> Option<i64> {
        self.read.get(pool).map(|t| *t)
    }

    /// The latest time handed out.
    pub fn now(&self) -> i64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn tick(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    // Pick the least recently used of `pools` and stamp it. Loops until the
    // stamp is not raced by another caller.
    fn select<'a>(
        &self,
        times: &DashMap<PoolName, i64>,
        pools: &[&'a PoolInfo],
    ) -> Result<&'a PoolInfo, Error> {
        if pools.is_empty() {
            return Err(Error::NoCandidates);
        }

        let mut rng = rand::thread_rng();
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;

            let mut best: Option<(&'a PoolInfo, Option<i64>, i64)> = None;
            for pool in pools {
                let seen = times.get(&pool.name).map(|t| *t);
                let time = match seen {
                    Some(time) => time,
                    None => -(rng.gen::<u32>() as i64) - 1,
                };
                let older = match best {
                    Some((_, _, best_time)) => time < best_time,
                    None => true,
                };
                if older {
                    best = Some((pool, seen, time));
                }
            }

            let (pool, seen, _) = best.ok_or(Error::NoCandidates)?;
            if compare_and_set(times, &pool.name, seen, || self.tick()) {
                return Ok(pool);
            }

            trace!(self.log, "access time of {} changed during scan, \
                retrying", pool.name; "attempt" => attempts);
        }
    }
}

// Replace the time of `pool` with `next()`, provided it is still `expected`
// (`None` meaning no entry). A single step under the entry's shard lock.
fn compare_and_set<F>(
    times: &DashMap<PoolName, i64>,
    pool: &PoolName,
    expected: Option<i64>,
    next: F,
) -> bool
where
    F: FnOnce() -> i64,
{
    match times.entry(pool.clone()) {
        Entry::Occupied(mut entry) => {
            if expected == Some(*entry.get()) {
                entry.insert(next());
                true
            } else {
                false
            }
        }
        Entry::Vacant(entry) => {
            if expected.is_none() {
                entry.insert(next());
                true
            } else {
                false
            }
        }
    }
}

/// Partition selecting the least recently used pool in every direction.
#[derive(Clone, Debug)]
pub struct LruPartition {
    properties: Properties,
    settings: PartitionSettings,
    access_times: Arc<AccessTimes>,
}

impl LruPartition {
    /// Build a partition over the process wide access time table.
    pub fn new(
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        LruPartition::with_access_times(AccessTimes::shared(), inherited, defined)
    }

    pub fn with_access_times(
        access_times: Arc<AccessTimes>,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        let properties = Properties::new(defaults_with(&[]), inherited, defined)?;
        let settings = PartitionSettings::from_properties(&properties)?;
        Ok(LruPartition {
            properties,
            settings,
            access_times,
        })
    }

    pub fn access_times(&self) -> &Arc<AccessTimes> {
        &self.access_times
    }
}

impl Partition for LruPartition {
    fn partition_type(&self) -> &'static str {
        TYPE
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn settings(&self) -> &PartitionSettings {
        &self.settings
    }

    fn create(
        &self,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Arc<dyn Partition>, Error> {
        Ok(Arc::new(LruPartition::with_access_times(
            Arc::clone(&self.access_times),
            inherited,
            defined,
        )?))
    }

    fn select_write_pool(
        &self,
        _cm: &dyn CostModule,
        pools: &[PoolInfo],
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        let eligible = pools_with_room(pools, file.size)?;
        let at = &self.access_times;
        at.select(&at.write, &eligible).map(SelectedPool::from)
    }

    fn select_read_pool(
        &self,
        _cm: &dyn CostModule,
        pools: &[PoolInfo],
        _file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        let candidates: Vec<&PoolInfo> = pools.iter().collect();
        let at = &self.access_times;
        at.select(&at.read, &candidates).map(SelectedPool::from)
    }

    fn select_pool2pool(
        &self,
        cm: &dyn CostModule,
        src: &[PoolInfo],
        dst: &[PoolInfo],
        file: &FileAttributes,
        _force: bool,
    ) -> Result<P2pPair, Error> {
        let source = self.select_read_pool(cm, src, file)?;
        let destinations: Vec<PoolInfo> = dst
            .iter()
            .filter(|p| p.name != source.name)
            .cloned()
            .collect();
        let destination = self.select_write_pool(cm, &destinations, file)?;
        P2pPair::new(source, destination)
    }

    fn select_stage_pool(
        &self,
        cm: &dyn CostModule,
        pools: &[PoolInfo],
        _previous_pool: Option<&PoolName>,
        _previous_host: Option<&str>,
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        self.select_write_pool(cm, pools, file)
    }
}

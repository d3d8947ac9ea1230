// Copyright 2020 Joyent, Inc.

use std::collections::HashMap;

use crate::error::Error;
use crate::pool::{PoolCostInfo, PoolInfo, PoolName};

/// The file size used when ranking pools by performance cost for percentile
/// cost cuts.
pub const PERCENTILE_FILE_SIZE: u64 = 104_857_600;

/// Live cost figures for the pools of the cluster, as supplied by the
/// external cost module. Always a slightly stale snapshot.
pub trait CostModule: Send + Sync {
    /// The performance cost at the given percentile over all known pools.
    /// `fraction` must lie strictly between 0 and 1.
    fn pools_percentile_performance_cost(
        &self,
        fraction: f64,
    ) -> Result<f64, Error>;

    /// The latest cost info reported by a pool, if the pool is known.
    fn pool_cost_info(&self, pool: &PoolName) -> Option<&PoolCostInfo>;
}

/// The performance and space cost of placing a file of a given size on a
/// pool.
#[derive(Clone, Debug)]
pub struct PoolCost<'a> {
    pub pool: &'a PoolInfo,
    pub performance_cost: f64,
    pub space_cost: f64,
}

impl<'a> PoolCost<'a> {
    pub fn calculate(pool: &'a PoolInfo, filesize: u64) -> Self {
        PoolCost {
            pool,
            performance_cost: performance_cost(&pool.cost),
            space_cost: space_cost(pool, filesize),
        }
    }

    pub fn host(&self) -> Option<&'a str> {
        self.pool.host_name()
    }
}

/// Mean load over the queue classes of a pool, where the load of one class
/// is `(active + queued) / max`. Classes without slots are ignored.
pub fn performance_cost(info: &PoolCostInfo) -> f64 {
    let loads: Vec<f64> = info
        .queues
        .iter()
        .filter(|q| q.max > 0)
        .map(|q| (q.active as f64 + q.queued as f64) / q.max as f64)
        .collect();

    if loads.is_empty() {
        0.0
    } else {
        loads.iter().sum::<f64>() / loads.len() as f64
    }
}

/// Cost of the space a file would take on a pool. Cheap while the file fits
/// in free space, more expensive once removable files must be reclaimed and
/// infinite when the pool cannot hold the file at all.
pub fn space_cost(pool: &PoolInfo, filesize: u64) -> f64 {
    if !pool.can_hold_file(filesize) {
        return f64::INFINITY;
    }

    let space = &pool.cost.space;
    let free = space.free.saturating_sub(space.gap);
    if filesize < free {
        filesize as f64 / free as f64
    } else {
        // can_hold_file guarantees removable space covers the rest
        1.0 + (filesize - free) as f64 / space.removable.max(1) as f64
    }
}

/// A `CostModule` over a fixed list of pools.
#[derive(Clone, Debug, Default)]
pub struct CostSnapshot {
    costs: HashMap<PoolName, PoolCostInfo>,
    // Performance costs at PERCENTILE_FILE_SIZE, ascending
    ranked: Vec<f64>,
}

impl CostSnapshot {
    pub fn new(pools: &[PoolInfo]) -> Self {
        let mut ranked: Vec<f64> =
            pools.iter().map(|p| performance_cost(&p.cost)).collect();
        ranked.sort_by(|a, b| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });

        CostSnapshot {
            costs: pools
                .iter()
                .map(|p| (p.name.clone(), p.cost.clone()))
                .collect(),
            ranked,
        }
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}

impl CostModule for CostSnapshot {
    fn pools_percentile_performance_cost(
        &self,
        fraction: f64,
    ) -> Result<f64, Error> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(Error::InvalidProperty {
                key: String::from("p2p"),
                reason: format!(
                    "supplied fraction ({}) not between 0 and 1",
                    fraction
                ),
            });
        }

        if self.ranked.is_empty() {
            return Ok(0.0);
        }

        let idx = (fraction * self.ranked.len() as f64).floor() as usize;
        Ok(self.ranked[idx.min(self.ranked.len() - 1)])
    }

    fn pool_cost_info(&self, pool: &PoolName) -> Option<&PoolCostInfo> {
        self.costs.get(pool)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pool::{PoolQueueInfo, PoolSpaceInfo};

    fn pool(name: &str, free: u64, removable: u64, load: u32) -> PoolInfo {
        PoolInfo::new(
            name.into(),
            format!("{}@dcache", name),
            PoolCostInfo {
                space: PoolSpaceInfo {
                    total: 1000,
                    free,
                    precious: 0,
                    removable,
                    gap: 0,
                },
                queues: vec![PoolQueueInfo {
                    name: String::from("regular"),
                    active: load,
                    max: 10,
                    queued: 0,
                }],
            },
            HashMap::new(),
        )
    }

    #[test]
    fn performance_cost_is_mean_queue_load() {
        let mut info = pool("a", 0, 0, 5).cost;
        assert!((performance_cost(&info) - 0.5).abs() < 1e-9);
        info.queues.push(PoolQueueInfo {
            name: String::from("p2p"),
            active: 0,
            max: 0,
            queued: 3,
        });
        // Classes without slots do not count
        assert!((performance_cost(&info) - 0.5).abs() < 1e-9);
        info.queues.clear();
        assert_eq!(performance_cost(&info), 0.0);
    }

    #[test]
    fn space_cost_grows_with_pressure() {
        let roomy = pool("a", 1000, 0, 0);
        let tight = pool("b", 100, 0, 0);
        let reclaim = pool("c", 10, 500, 0);
        let full = pool("d", 10, 0, 0);

        assert!(space_cost(&roomy, 50) < space_cost(&tight, 50));
        assert!(space_cost(&reclaim, 50) > 1.0);
        assert!(space_cost(&full, 50).is_infinite());
    }

    #[test]
    fn percentile_cost() {
        let pools: Vec<PoolInfo> = (0..10)
            .map(|i| pool(&format!("p{}", i), 100, 0, i))
            .collect();
        let snapshot = CostSnapshot::new(&pools);

        let median = snapshot.pools_percentile_performance_cost(0.5).unwrap();
        assert!((median - 0.5).abs() < 1e-9);
        let low = snapshot.pools_percentile_performance_cost(0.05).unwrap();
        assert_eq!(low, 0.0);

        assert!(snapshot.pools_percentile_performance_cost(0.0).is_err());
        assert!(snapshot.pools_percentile_performance_cost(1.0).is_err());
        assert_eq!(
            CostSnapshot::new(&[])
                .pools_percentile_performance_cost(0.5)
                .unwrap(),
            0.0
        );
    }
}

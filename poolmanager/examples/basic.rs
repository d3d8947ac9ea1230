// Copyright 2020 Joyent, Inc.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use slog::{info, o, Drain, Logger};

use poolmanager::cost::{CostModule, CostSnapshot};
use poolmanager::error::Error;
use poolmanager::file::FileAttributes;
use poolmanager::inventory::{Candidates, Direction, Inventory};
use poolmanager::partition::manager::PartitionManager;
use poolmanager::pool::{
    PoolCostInfo, PoolInfo, PoolName, PoolQueueInfo, PoolSpaceInfo,
    HOSTNAME_TAG,
};
use poolmanager::pool_manager::{PoolManager, PoolManagerOptions};

const SETUP: &str = r#"{
    "inherited": { "spacecostfactor": "2.0" },
    "partitions": {
        "default": { "type": "classic" },
        "fair": { "type": "lru" },
        "spread": { "type": "wrandom" }
    }
}"#;

// Six pools on three hosts with growing load and shrinking free space
pub struct FakeInventory {
    pools: Vec<PoolInfo>,
}

impl FakeInventory {
    pub fn new() -> Self {
        let pools = (0..6)
            .map(|i| {
                let name = format!("pool_{}", i);
                let mut tags = HashMap::new();
                tags.insert(HOSTNAME_TAG.to_string(), format!("host_{}", i / 2));
                PoolInfo::new(
                    name.as_str().into(),
                    format!("{}@{}Domain", name, name),
                    PoolCostInfo {
                        space: PoolSpaceInfo {
                            total: 1 << 40,
                            free: (6 - i) << 37,
                            ..Default::default()
                        },
                        queues: vec![PoolQueueInfo {
                            name: String::from("regular"),
                            active: i as u32,
                            max: 10,
                            queued: 0,
                        }],
                    },
                    tags,
                )
            })
            .collect();
        FakeInventory { pools }
    }
}

impl Inventory for FakeInventory {
    fn candidates(
        &self,
        _direction: Direction,
        _file: &FileAttributes,
    ) -> Result<Candidates, Error> {
        Ok(Candidates {
            pools: self.pools.clone(),
            partition: None,
        })
    }

    fn cost_module(&self) -> Arc<dyn CostModule> {
        Arc::new(CostSnapshot::new(&self.pools))
    }
}

fn main() {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let log = Logger::root(
        Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
        o!("build-id" => "0.1.0"),
    );

    let partitions = match PartitionManager::new(Some(log.clone()))
        .and_then(|pm| pm.load_setup(SETUP).map(|_| pm))
    {
        Ok(partitions) => Arc::new(partitions),
        Err(e) => {
            info!(log, "bad partition setup: {}", e);
            return;
        }
    };
    let pool_manager = Arc::new(PoolManager::new(
        PoolManagerOptions {
            log: Some(log.clone()),
        },
        FakeInventory::new(),
        partitions,
    ));

    let thread_count = 4;
    let barrier = Arc::new(Barrier::new(thread_count));
    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let pool_manager = Arc::clone(&pool_manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut chosen: BTreeMap<(String, PoolName), u32> =
                    BTreeMap::new();
                barrier.wait();
                for n in 0..100u64 {
                    let file = FileAttributes::new(
                        format!("{:04X}{:08X}", i, n).as_str().into(),
                        (n + 1) << 20,
                    );
                    for partition in &["default", "fair", "spread"] {
                        let selected =
                            pool_manager.select_write_pool(&file, Some(*partition));
                        if let Ok(pool) = selected {
                            *chosen
                                .entry((partition.to_string(), pool.name))
                                .or_insert(0) += 1;
                        }
                    }
                }
                chosen
            })
        })
        .collect();

    let mut totals: BTreeMap<(String, PoolName), u32> = BTreeMap::new();
    for handle in handles {
        if let Ok(chosen) = handle.join() {
            for (key, count) in chosen {
                *totals.entry(key).or_insert(0) += count;
            }
        }
    }

    for ((partition, pool), count) in totals {
        info!(log, "{} partition wrote to {} {} times", partition, pool, count);
    }
    if let Ok(setup) = pool_manager.partitions().dump_setup() {
        info!(log, "partition setup: {}", setup);
    }
}

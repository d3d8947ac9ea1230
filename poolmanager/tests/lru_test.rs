// Copyright 2020 Joyent, Inc.

mod common;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Barrier};
use std::thread;

use quickcheck::{quickcheck, Arbitrary, Gen};
use slog::{info, Level};

use poolmanager::cost::CostSnapshot;
use poolmanager::file::FileAttributes;
use poolmanager::partition::lru::{AccessTimes, LruPartition};
use poolmanager::partition::{Partition, PropertyMap};
use poolmanager::pool::{PoolInfo, PoolName};

fn partition(access_times: Arc<AccessTimes>) -> LruPartition {
    LruPartition::with_access_times(
        access_times,
        PropertyMap::new(),
        PropertyMap::new(),
    )
    .expect("lru partition")
}

#[test]
fn concurrent_selection_stays_round_robin() {
    const THREADS: usize = 16;
    const SELECTIONS: usize = 50;

    let log = common::log_from_env(Level::Info);
    let access_times = Arc::new(AccessTimes::new(Some(log.clone())));
    let lru = Arc::new(partition(Arc::clone(&access_times)));
    let pools: Arc<Vec<PoolInfo>> = Arc::new(
        (0..4)
            .map(|i| common::pool(&format!("pool_{}", i), "host", 1000, 0))
            .collect(),
    );
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let lru = Arc::clone(&lru);
            let pools = Arc::clone(&pools);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let cm = CostSnapshot::new(&pools);
                let file =
                    FileAttributes::new(format!("{:08X}", i).as_str().into(), 1);
                barrier.wait();
                (0..SELECTIONS)
                    .map(|_| {
                        lru.select_write_pool(&cm, &pools, &file)
                            .expect("write pool")
                            .name
                    })
                    .collect::<Vec<PoolName>>()
            })
        })
        .collect();

    let mut counts: BTreeMap<PoolName, usize> = BTreeMap::new();
    for handle in handles {
        let chosen = handle.join().expect("selection thread");
        assert_eq!(chosen.len(), SELECTIONS);
        for name in chosen {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
    info!(log, "selection counts: {:?}", counts);

    // Every successful selection consumed exactly one stamp
    assert_eq!(access_times.now(), (THREADS * SELECTIONS) as i64);

    // A pool is only chosen again once every other pool was, so the counts
    // never drift apart
    assert_eq!(counts.len(), pools.len());
    for count in counts.values() {
        assert_eq!(*count, THREADS * SELECTIONS / pools.len());
    }

    let stamps: HashSet<i64> = pools
        .iter()
        .filter_map(|p| access_times.last_write(&p.name))
        .collect();
    assert_eq!(stamps.len(), pools.len());
    assert!(stamps.iter().all(|s| *s > 0 && *s <= access_times.now()));
}

#[test]
fn reads_and_writes_are_tracked_apart() {
    let access_times = Arc::new(AccessTimes::new(None));
    let lru = partition(Arc::clone(&access_times));
    let pools = vec![
        common::pool("pool_a", "host_a", 1000, 0),
        common::pool("pool_b", "host_b", 1000, 0),
    ];
    let cm = CostSnapshot::new(&pools);
    let file = FileAttributes::new("0000A1".into(), 10);

    let written = lru
        .select_write_pool(&cm, &pools, &file)
        .expect("write pool");
    assert!(access_times.last_write(&written.name).is_some());
    assert!(access_times.last_read(&written.name).is_none());

    let read = lru.select_read_pool(&cm, &pools, &file).expect("read pool");
    assert!(access_times.last_read(&read.name).is_some());
}

#[derive(Clone, Debug)]
struct PoolSet(Vec<PoolInfo>);

impl Arbitrary for PoolSet {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        let count = 1 + usize::arbitrary(g) % 12;
        PoolSet(
            (0..count)
                .map(|i| {
                    common::pool(
                        &format!("pool_{}", i),
                        &format!("host_{}", u8::arbitrary(g) % 4),
                        100 + u64::arbitrary(g) % 10_000,
                        u32::arbitrary(g) % 10,
                    )
                })
                .collect(),
        )
    }
}

quickcheck! {
    // Costs and hosts play no part: over any two full rounds every pool is
    // chosen exactly once per round.
    fn prop_lru_visits_every_pool_once_per_round(set: PoolSet) -> bool {
        let pools = set.0;
        let lru = partition(Arc::new(AccessTimes::new(None)));
        let cm = CostSnapshot::new(&pools);
        let file = FileAttributes::new("0000B2".into(), 1);

        (0..2).all(|_| {
            let round: HashSet<PoolName> = (0..pools.len())
                .filter_map(|_| lru.select_write_pool(&cm, &pools, &file).ok())
                .map(|selected| selected.name)
                .collect();
            round.len() == pools.len()
        })
    }
}

// Copyright 2020 Joyent, Inc.

//! Classic cost based pool selection.
//!
//! Pools are ranked by a weighted combination of their performance (queue)
//! cost and their space cost. The cost cuts configure when the partition
//! refuses a pool:
//!
//! | Property   | Meaning                                                    |
//! |------------|------------------------------------------------------------|
//! | `idle`     | below this cost reads prefer a stable, per-file pool       |
//! | `p2p`      | reads at or above this cost are refused (absolute, or a    |
//! |            | percentile of all pools' costs when suffixed with `%`)     |
//! | `alert`    | replication sources above this cost are refused            |
//! | `halt`     | reads above this cost are refused outright                 |
//! | `fallback` | reads and stages above this cost are refused               |
//! | `slope`    | destination cost limit relative to the best source         |
//!
//! A cut of 0.0 disables it.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::cost::{CostModule, PoolCost};
use crate::error::Error;
use crate::file::{FileAttributes, PnfsId};
use crate::partition::{
    defaults_with, malformed, pools_with_room, Partition, PartitionSettings,
    Properties, PropertyMap,
};
use crate::pool::{PoolInfo, PoolName};
use crate::selection::{P2pPair, SelectedPool};

pub const TYPE: &str = "classic";

const MAX_WRITE_COST: f64 = 1_000_000.0;

const DEFAULTS: &[(&str, &str)] = &[
    ("max-copies", "3"),
    ("p2p", "0.0"),
    ("alert", "0.0"),
    ("halt", "0.0"),
    ("fallback", "0.0"),
    ("spacecostfactor", "1.0"),
    ("cpucostfactor", "1.0"),
    ("sameHostCopy", "besteffort"),
    ("sameHostRetry", "besteffort"),
    ("slope", "0.0"),
    ("idle", "0.0"),
];

/// Whether source and destination of a copy, or the pools of a stage retry,
/// may share a host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameHost {
    Never,
    BestEffort,
    NotChecked,
}

impl FromStr for SameHost {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never" => Ok(SameHost::Never),
            "besteffort" => Ok(SameHost::BestEffort),
            "notchecked" => Ok(SameHost::NotChecked),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SameHost {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SameHost::Never => String::from("never").fmt(fmt),
            SameHost::BestEffort => String::from("besteffort").fmt(fmt),
            SameHost::NotChecked => String::from("notchecked").fmt(fmt),
        }
    }
}

/// The p2p cost cut: a fixed cost, or a fraction of the pools ranked by
/// performance cost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CostCut {
    Absolute(f64),
    Percentile(f64),
}

impl CostCut {
    /// Parse "1.5" as an absolute cut and "50%" as the 0.5 percentile.
    /// Percentiles must lie strictly between 0% and 100%.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let value = value.trim();
        if let Some(number) = value.strip_suffix('%') {
            let fraction = number
                .trim()
                .parse::<f64>()
                .map_err(|_| malformed("p2p", value, "a number or percentage"))?
                / 100.0;
            if !(fraction > 0.0) {
                return Err(Error::InvalidProperty {
                    key: String::from("p2p"),
                    reason: format!("{} is too small; must be > 0%", value),
                });
            }
            if !(fraction < 1.0) {
                return Err(Error::InvalidProperty {
                    key: String::from("p2p"),
                    reason: format!("{} is too large; must be < 100%", value),
                });
            }
            Ok(CostCut::Percentile(fraction))
        } else {
            match value.parse::<f64>() {
                Ok(d) if d.is_finite() => Ok(CostCut::Absolute(d)),
                _ => Err(malformed("p2p", value, "a number or percentage")),
            }
        }
    }

    pub fn is_percentile(&self) -> bool {
        match self {
            CostCut::Percentile(_) => true,
            CostCut::Absolute(_) => false,
        }
    }

    fn value(&self) -> f64 {
        match self {
            CostCut::Absolute(v) | CostCut::Percentile(v) => *v,
        }
    }

    /// The cost cut in effect for the given cost snapshot.
    pub fn current(&self, cm: &dyn CostModule) -> Result<f64, Error> {
        match self {
            CostCut::Absolute(v) => Ok(*v),
            CostCut::Percentile(f) => cm.pools_percentile_performance_cost(*f),
        }
    }
}

/// Partition with classic cost cut pool selection semantics.
#[derive(Clone, Debug)]
pub struct ClassicPartition {
    properties: Properties,
    settings: PartitionSettings,
    pub same_host_copy: SameHost,
    pub same_host_retry: SameHost,
    pub max_copies: i64,
    pub cost_cut: CostCut,
    pub alert_cost_cut: f64,
    pub panic_cost_cut: f64,
    pub fallback_cost_cut: f64,
    pub space_cost_factor: f64,
    pub performance_cost_factor: f64,
    pub slope: f64,
    pub min_cost_cut: f64,
}

impl ClassicPartition {
    pub fn new(
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        let properties =
            Properties::new(defaults_with(DEFAULTS), inherited, defined)?;
        let settings = PartitionSettings::from_properties(&properties)?;

        let same_host = |key: &str| -> Result<SameHost, Error> {
            let value = properties.get(key)?;
            value
                .parse::<SameHost>()
                .map_err(|_| malformed(key, value, "never, besteffort or notchecked"))
        };

        Ok(ClassicPartition {
            same_host_copy: same_host("sameHostCopy")?,
            same_host_retry: same_host("sameHostRetry")?,
            max_copies: properties.get_integer("max-copies")?,
            cost_cut: CostCut::parse(properties.get("p2p")?)?,
            alert_cost_cut: properties.get_double("alert")?,
            panic_cost_cut: properties.get_double("halt")?,
            fallback_cost_cut: properties.get_double("fallback")?,
            space_cost_factor: properties.get_double("spacecostfactor")?,
            performance_cost_factor: properties.get_double("cpucostfactor")?,
            slope: properties.get_double("slope")?,
            min_cost_cut: properties.get_double("idle")?,
            properties,
            settings,
        })
    }

    fn weighted_full_cost(&self, cost: &PoolCost) -> f64 {
        cost.space_cost.abs() * self.space_cost_factor
            + cost.performance_cost.abs() * self.performance_cost_factor
    }

    fn weighted_performance_cost(&self, cost: &PoolCost) -> f64 {
        cost.performance_cost.abs() * self.performance_cost_factor
    }

    fn by_full_cost(&self, a: &PoolCost, b: &PoolCost) -> Ordering {
        compare(self.weighted_full_cost(a), self.weighted_full_cost(b))
    }

    fn by_performance_cost(&self, a: &PoolCost, b: &PoolCost) -> Ordering {
        compare(
            self.weighted_performance_cost(a),
            self.weighted_performance_cost(b),
        )
    }

    fn is_panic_cost_exceeded(&self, cost: f64) -> bool {
        self.panic_cost_cut > 0.0 && cost > self.panic_cost_cut
    }

    fn is_fallback_cost_exceeded(&self, cost: f64) -> bool {
        self.fallback_cost_cut > 0.0 && cost > self.fallback_cost_cut
    }

    fn is_cost_cut_exceeded(
        &self,
        cm: &dyn CostModule,
        cost: f64,
    ) -> Result<bool, Error> {
        Ok(self.cost_cut.value() > 0.0 && cost >= self.cost_cut.current(cm)?)
    }

    fn is_alert_cost_exceeded(&self, cost: f64) -> bool {
        self.alert_cost_cut > 0.0 && cost > self.alert_cost_cut
    }

    // Randomized so that pools of equal cost share the load.
    fn costs<'a>(pools: &[&'a PoolInfo], filesize: u64) -> Vec<PoolCost<'a>> {
        let mut costs: Vec<PoolCost> = pools
            .iter()
            .map(|p| PoolCost::calculate(p, filesize))
            .collect();
        costs.shuffle(&mut rand::thread_rng());
        costs
    }
}

fn compare(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

// Arbitrary but deterministic position of a pool for a given file.
fn min_cost_cut_position(pnfs_id: &PnfsId, pool: &PoolInfo) -> u64 {
    let mut hasher = DefaultHasher::new();
    pnfs_id.as_str().hash(&mut hasher);
    pool.name.as_str().hash(&mut hasher);
    hasher.finish()
}

// Orders the named pool after every other pool.
fn this_pool_last(name: &PoolName, a: &PoolCost, b: &PoolCost) -> Ordering {
    (&a.pool.name == name).cmp(&(&b.pool.name == name))
}

fn this_host_last(host: &str, a: &PoolCost, b: &PoolCost) -> Ordering {
    (a.host() == Some(host)).cmp(&(b.host() == Some(host)))
}

impl Partition for ClassicPartition {
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
        Ok(Arc::new(ClassicPartition::new(inherited, defined)?))
    }

    fn select_write_pool(
        &self,
        _cm: &dyn CostModule,
        pools: &[PoolInfo],
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        let eligible = pools_with_room(pools, file.size)?;
        let costs = Self::costs(&eligible, file.size);

        let best = costs
            .iter()
            .min_by(|a, b| self.by_full_cost(a, b))
            .ok_or(Error::NoCandidates)?;

        // NaN fails this comparison too
        let cost = self.weighted_full_cost(best);
        if !(cost <= MAX_WRITE_COST) {
            return Err(Error::PermissionDenied(format!(
                "Best pool <{}> too high : {}",
                best.pool.name, cost
            )));
        }

        Ok(SelectedPool::from(best.pool))
    }

    fn select_read_pool(
        &self,
        cm: &dyn CostModule,
        pools: &[PoolInfo],
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        let candidates: Vec<&PoolInfo> = pools.iter().collect();
        let costs = Self::costs(&candidates, 0);

        let mut best: Option<&PoolCost> = None;
        let mut best_cost = f64::INFINITY;
        for candidate in &costs {
            let cost = self.weighted_performance_cost(candidate);
            match best {
                None => {
                    best = Some(candidate);
                    best_cost = cost;
                }
                Some(current) => {
                    if best_cost >= self.min_cost_cut && cost <= best_cost {
                        // While any pool is above the idle cut, search for
                        // the cheapest.
                        best = Some(candidate);
                        best_cost = cost;
                    } else if cost < self.min_cost_cut
                        && best_cost < self.min_cost_cut
                        && min_cost_cut_position(&file.pnfs_id, candidate.pool)
                            < min_cost_cut_position(
                                &file.pnfs_id,
                                current.pool,
                            )
                    {
                        // Below the idle cut the same pool keeps being used,
                        // so that other replicas can age.
                        best = Some(candidate);
                        best_cost = cost;
                    }
                }
            }
        }
        let best = best.ok_or(Error::NoCandidates)?;

        let cost = best.performance_cost;
        let fallback_exceeded = self.is_fallback_cost_exceeded(cost);
        let cost_cut_exceeded = self.is_cost_cut_exceeded(cm, cost)?;
        if self.is_panic_cost_exceeded(cost) {
            return Err(Error::CostExceeded {
                pool: None,
                fallback_exceeded,
                cost_cut_exceeded,
            });
        }
        if fallback_exceeded || cost_cut_exceeded {
            return Err(Error::CostExceeded {
                pool: Some(Box::new(SelectedPool::from(best.pool))),
                fallback_exceeded,
                cost_cut_exceeded,
            });
        }

        Ok(SelectedPool::from(best.pool))
    }

    fn select_pool2pool(
        &self,
        cm: &dyn CostModule,
        src: &[PoolInfo],
        dst: &[PoolInfo],
        file: &FileAttributes,
        force: bool,
    ) -> Result<P2pPair, Error> {
        if src.is_empty() || dst.is_empty() {
            return Err(Error::NoCandidates);
        }

        if src.len() as i64 >= self.max_copies {
            return Err(Error::PermissionDenied(format!(
                "P2P denied: already too many copies ({})",
                src.len()
            )));
        }

        // Sources are only ranked by performance cost since they are only
        // read from.
        let src_refs: Vec<&PoolInfo> = src.iter().collect();
        let mut sources = Self::costs(&src_refs, 0);
        sources.sort_by(|a, b| self.by_performance_cost(a, b));
        let best_source_cost = sources[0].performance_cost;
        if !force && self.is_alert_cost_exceeded(best_source_cost) {
            return Err(Error::SourceCostExceeded(format!(
                "P2P denied: All source pools are too busy \
                 (performance cost > {})",
                self.alert_cost_cut
            )));
        }

        // The destination must be below the cost limits, otherwise reading
        // the file from it would trigger another copy.
        let max_target_cost = if self.slope > 0.01 {
            self.slope * best_source_cost
        } else {
            self.cost_cut.current(cm)?
        };
        let others: Vec<&PoolInfo> = dst
            .iter()
            .filter(|p| !src.iter().any(|s| s.name == p.name))
            .collect();
        let dst_refs: Vec<&PoolInfo> = others
            .iter()
            .copied()
            .filter(|p| p.can_hold_file(file.size))
            .collect();
        if !others.is_empty() && dst_refs.is_empty() {
            return Err(Error::AllPoolsFull {
                file_size: file.size,
            });
        }
        let mut destinations = Self::costs(&dst_refs, file.size);
        if !force && max_target_cost > 0.0 {
            destinations.retain(|c| c.performance_cost < max_target_cost);
        }
        destinations.sort_by(|a, b| self.by_full_cost(a, b));

        if destinations.is_empty() {
            return Err(Error::DestinationCostExceeded(format!(
                "P2P denied: All destination pools are too busy \
                 (performance cost > {})",
                max_target_cost
            )));
        }

        if self.same_host_copy == SameHost::NotChecked {
            return P2pPair::new(
                SelectedPool::from(sources[0].pool),
                SelectedPool::from(destinations[0].pool),
            );
        }

        // The cheapest pair on different hosts
        for source in &sources {
            for destination in &destinations {
                if let Some(host) = source.host() {
                    if destination.host() != Some(host) {
                        return P2pPair::new(
                            SelectedPool::from(source.pool),
                            SelectedPool::from(destination.pool),
                        );
                    }
                }
            }
        }

        match self.same_host_copy {
            SameHost::BestEffort => P2pPair::new(
                SelectedPool::from(sources[0].pool),
                SelectedPool::from(destinations[0].pool),
            ),
            _ => Err(Error::PermissionDenied(String::from(
                "P2P denied: sameHostCopy is 'never' and no matching pool found",
            ))),
        }
    }

    fn select_stage_pool(
        &self,
        _cm: &dyn CostModule,
        pools: &[PoolInfo],
        previous_pool: Option<&PoolName>,
        previous_host: Option<&str>,
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        let eligible = pools_with_room(pools, file.size)?;
        let costs = Self::costs(&eligible, file.size);

        let check_host = self.same_host_retry != SameHost::NotChecked;
        let best = costs
            .iter()
            .min_by(|a, b| {
                let by_pool = previous_pool
                    .map(|name| this_pool_last(name, a, b))
                    .unwrap_or(Ordering::Equal);
                let by_host = match previous_host {
                    Some(host) if check_host => this_host_last(host, a, b),
                    _ => Ordering::Equal,
                };
                by_pool.then(by_host).then_with(|| self.by_full_cost(a, b))
            })
            .ok_or(Error::NoCandidates)?;

        if self.same_host_retry == SameHost::Never
            && previous_host.is_some()
            && previous_host == best.host()
        {
            return Err(Error::PermissionDenied(String::from(
                "No cheap candidates available for stage",
            )));
        }

        if self.is_fallback_cost_exceeded(best.performance_cost) {
            return Err(Error::CostExceeded {
                pool: None,
                fallback_exceeded: true,
                cost_cut_exceeded: false,
            });
        }

        Ok(SelectedPool::from(best.pool))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::collections::HashMap;

    use crate::cost::CostSnapshot;
    use crate::partition::property_map;
    use crate::pool::{PoolCostInfo, PoolQueueInfo, PoolSpaceInfo, HOSTNAME_TAG};

    fn pool(name: &str, host: &str, free: u64, load: u32) -> PoolInfo {
        let mut tags = HashMap::new();
        tags.insert(String::from(HOSTNAME_TAG), String::from(host));
        PoolInfo::new(
            name.into(),
            format!("{}@{}Domain", name, name),
            PoolCostInfo {
                space: PoolSpaceInfo {
                    total: 1000,
                    free,
                    precious: 0,
                    removable: 0,
                    gap: 0,
                },
                queues: vec![PoolQueueInfo {
                    name: String::from("regular"),
                    active: load,
                    max: 10,
                    queued: 0,
                }],
            },
            tags,
        )
    }

    fn partition(defined: &[(&str, &str)]) -> ClassicPartition {
        ClassicPartition::new(PropertyMap::new(), property_map(defined))
            .unwrap()
    }

    fn file(size: u64) -> FileAttributes {
        FileAttributes::new("0000A1B2".into(), size)
    }

    #[test]
    fn percentile_parsing() {
        assert_eq!(CostCut::parse("50%"), Ok(CostCut::Percentile(0.5)));
        assert!(CostCut::parse("50%").unwrap().is_percentile());
        assert_eq!(CostCut::parse("1.5"), Ok(CostCut::Absolute(1.5)));
        assert!(!CostCut::parse("1.5").unwrap().is_percentile());

        for bad in &["0%", "100%", "150%", "-5%"] {
            match CostCut::parse(bad) {
                Err(Error::InvalidProperty { key, .. }) => assert_eq!(key, "p2p"),
                other => panic!("{} parsed as {:?}", bad, other),
            }
        }
        match CostCut::parse("lots%") {
            Err(Error::MalformedProperty { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn construction_fails_fast() {
        let bad = ClassicPartition::new(
            PropertyMap::new(),
            property_map(&[("p2p", "100%")]),
        );
        assert!(bad.unwrap_err().is_configuration());

        let bad = ClassicPartition::new(
            PropertyMap::new(),
            property_map(&[("sameHostCopy", "sometimes")]),
        );
        assert!(bad.unwrap_err().is_configuration());

        let bad = ClassicPartition::new(
            PropertyMap::new(),
            property_map(&[("halt", "high")]),
        );
        assert!(bad.unwrap_err().is_configuration());
    }

    #[test]
    fn defaults_parsed() {
        let p = partition(&[]);
        assert_eq!(p.max_copies, 3);
        assert_eq!(p.cost_cut, CostCut::Absolute(0.0));
        assert_eq!(p.same_host_copy, SameHost::BestEffort);
        assert_eq!(p.space_cost_factor, 1.0);
        assert_eq!(p.performance_cost_factor, 1.0);
        assert_eq!(p.partition_type(), TYPE);
    }

    #[test]
    fn write_selects_only_pools_with_room() {
        let pools = vec![
            pool("a", "h1", 100, 0),
            pool("b", "h2", 50, 0),
            pool("c", "h3", 0, 0),
        ];
        let cm = CostSnapshot::new(&pools);
        let p = partition(&[]);

        for _ in 0..20 {
            let selected = p.select_write_pool(&cm, &pools, &file(60)).unwrap();
            assert_eq!(selected.name, "a".into());
        }

        assert_eq!(
            p.select_write_pool(&cm, &pools, &file(100)),
            Err(Error::AllPoolsFull { file_size: 100 })
        );
        assert_eq!(
            p.select_write_pool(&cm, &[], &file(1)),
            Err(Error::NoCandidates)
        );
    }

    #[test]
    fn write_prefers_cheapest() {
        let pools = vec![pool("busy", "h1", 900, 9), pool("idle", "h2", 900, 0)];
        let cm = CostSnapshot::new(&pools);
        let p = partition(&[]);
        let selected = p.select_write_pool(&cm, &pools, &file(10)).unwrap();
        assert_eq!(selected.name, "idle".into());

        // Ignoring performance cost, the roomier pool wins
        let pools = vec![pool("roomy", "h1", 900, 9), pool("tight", "h2", 20, 0)];
        let p = partition(&[("cpucostfactor", "0.0")]);
        let selected = p.select_write_pool(&cm, &pools, &file(10)).unwrap();
        assert_eq!(selected.name, "roomy".into());
    }

    #[test]
    fn read_cost_cuts() {
        let pools = vec![pool("a", "h1", 100, 6), pool("b", "h2", 100, 8)];
        let cm = CostSnapshot::new(&pools);

        let p = partition(&[]);
        let selected = p.select_read_pool(&cm, &pools, &file(0)).unwrap();
        assert_eq!(selected.name, "a".into());

        let p = partition(&[("p2p", "0.5")]);
        match p.select_read_pool(&cm, &pools, &file(0)) {
            Err(Error::CostExceeded {
                pool: Some(pool),
                cost_cut_exceeded: true,
                fallback_exceeded: false,
            }) => assert_eq!(pool.name, "a".into()),
            other => panic!("unexpected {:?}", other),
        }

        let p = partition(&[("halt", "0.5")]);
        match p.select_read_pool(&cm, &pools, &file(0)) {
            Err(Error::CostExceeded { pool: None, .. }) => (),
            other => panic!("unexpected {:?}", other),
        }

        let p = partition(&[("fallback", "0.5")]);
        match p.select_read_pool(&cm, &pools, &file(0)) {
            Err(Error::CostExceeded {
                pool: Some(_),
                fallback_exceeded: true,
                ..
            }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn read_percentile_cost_cut() {
        let pools: Vec<PoolInfo> = (0..4)
            .map(|i| pool(&format!("p{}", i), "h", 100, i * 2))
            .collect();
        let cm = CostSnapshot::new(&pools);
        // Percentile 50% of {0.0, 0.2, 0.4, 0.6} is 0.4
        let p = partition(&[("p2p", "50%")]);
        let selected = p.select_read_pool(&cm, &pools, &file(0)).unwrap();
        assert_eq!(selected.name, "p0".into());

        let busy: Vec<PoolInfo> = pools[2..].to_vec();
        assert!(p.select_read_pool(&cm, &busy, &file(0)).is_err());
    }

    #[test]
    fn idle_reads_stick_to_one_pool() {
        let pools: Vec<PoolInfo> = (0..5)
            .map(|i| pool(&format!("p{}", i), "h", 100, 0))
            .collect();
        let cm = CostSnapshot::new(&pools);
        let p = partition(&[("idle", "0.5")]);

        let first = p.select_read_pool(&cm, &pools, &file(0)).unwrap();
        for _ in 0..20 {
            let again = p.select_read_pool(&cm, &pools, &file(0)).unwrap();
            assert_eq!(first.name, again.name);
        }
    }

    #[test]
    fn p2p_max_copies() {
        let src = vec![pool("a", "h1", 100, 0), pool("b", "h2", 100, 0)];
        let dst = vec![pool("c", "h3", 100, 0)];
        let cm = CostSnapshot::new(&[]);
        let p = partition(&[("max-copies", "2")]);
        match p.select_pool2pool(&cm, &src, &dst, &file(10), false) {
            Err(Error::PermissionDenied(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn p2p_avoids_same_host() {
        let src = vec![pool("a", "h1", 100, 0)];
        let dst = vec![pool("same", "h1", 100, 0), pool("other", "h2", 100, 5)];
        let cm = CostSnapshot::new(&[]);

        let p = partition(&[]);
        let pair = p.select_pool2pool(&cm, &src, &dst, &file(10), false).unwrap();
        assert_eq!(pair.source().name, "a".into());
        assert_eq!(pair.destination().name, "other".into());

        let p = partition(&[("sameHostCopy", "notchecked")]);
        let pair = p.select_pool2pool(&cm, &src, &dst, &file(10), false).unwrap();
        assert_eq!(pair.destination().name, "same".into());

        let only_same = vec![pool("same", "h1", 100, 0)];
        let p = partition(&[("sameHostCopy", "never")]);
        assert!(p
            .select_pool2pool(&cm, &src, &only_same, &file(10), false)
            .is_err());
        let p = partition(&[("sameHostCopy", "besteffort")]);
        let pair = p
            .select_pool2pool(&cm, &src, &only_same, &file(10), false)
            .unwrap();
        assert_eq!(pair.destination().name, "same".into());
    }

    #[test]
    fn p2p_cost_limits_and_force() {
        let src = vec![pool("a", "h1", 100, 9)];
        let dst = vec![pool("b", "h2", 100, 9)];
        let cm = CostSnapshot::new(&[]);

        let p = partition(&[("alert", "0.5")]);
        match p.select_pool2pool(&cm, &src, &dst, &file(10), false) {
            Err(Error::SourceCostExceeded(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(p.select_pool2pool(&cm, &src, &dst, &file(10), true).is_ok());

        let p = partition(&[("p2p", "0.5")]);
        match p.select_pool2pool(&cm, &src, &dst, &file(10), false) {
            Err(Error::DestinationCostExceeded(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(p.select_pool2pool(&cm, &src, &dst, &file(10), true).is_ok());
    }

    #[test]
    fn p2p_full_destinations() {
        let src = vec![pool("a", "h1", 100, 0)];
        let dst = vec![pool("b", "h2", 20, 0), pool("c", "h3", 0, 0)];
        let cm = CostSnapshot::new(&[]);
        let p = partition(&[]);

        assert_eq!(
            p.select_pool2pool(&cm, &src, &dst, &file(50), false),
            Err(Error::AllPoolsFull { file_size: 50 })
        );
        assert_eq!(
            p.select_pool2pool(&cm, &src, &dst, &file(50), true),
            Err(Error::AllPoolsFull { file_size: 50 })
        );

        let pair = p
            .select_pool2pool(&cm, &src, &dst, &file(10), false)
            .unwrap();
        assert_eq!(pair.destination().name, "b".into());
    }

    #[test]
    fn stage_avoids_previous_pool_and_host() {
        let pools = vec![
            pool("cheap", "h1", 900, 0),
            pool("sibling", "h1", 900, 1),
            pool("far", "h2", 900, 5),
        ];
        let cm = CostSnapshot::new(&pools);
        let p = partition(&[]);

        let selected = p
            .select_stage_pool(&cm, &pools, None, None, &file(10))
            .unwrap();
        assert_eq!(selected.name, "cheap".into());

        let previous: PoolName = "cheap".into();
        let selected = p
            .select_stage_pool(&cm, &pools, Some(&previous), None, &file(10))
            .unwrap();
        assert_eq!(selected.name, "sibling".into());

        let selected = p
            .select_stage_pool(&cm, &pools, Some(&previous), Some("h1"), &file(10))
            .unwrap();
        assert_eq!(selected.name, "far".into());

        let p = partition(&[("sameHostRetry", "never")]);
        let only_h1 = &pools[..2];
        assert!(p
            .select_stage_pool(&cm, only_h1, None, Some("h1"), &file(10))
            .is_err());
    }

    #[test]
    fn update_is_copy_on_write() {
        let p = partition(&[("halt", "5.0")]);
        let mut updates = crate::partition::PropertyUpdates::new();
        updates.insert(String::from("halt"), Some(String::from("9.0")));
        let updated = p.update_properties(&updates).unwrap();

        assert_eq!(p.panic_cost_cut, 5.0);
        assert_eq!(updated.properties().get_double("halt"), Ok(9.0));
        assert_eq!(updated.partition_type(), TYPE);

        let inherited = property_map(&[("alert", "3.0")]);
        let updated = updated.update_inherited(inherited).unwrap();
        assert_eq!(updated.properties().get_double("alert"), Ok(3.0));
        assert_eq!(updated.properties().get_double("halt"), Ok(9.0));
    }
}

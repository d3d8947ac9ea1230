// Copyright 2020 Joyent, Inc.

//! Random selection strategies.
//!
//! `random` picks uniformly among the eligible pools. `wrandom` weights
//! writes by the space a pool has left once the file is placed, and reads by
//! how idle the pool is.

use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;

use crate::cost::{performance_cost, CostModule};
use crate::error::Error;
use crate::file::FileAttributes;
use crate::partition::{
    defaults_with, pools_with_room, Partition, PartitionSettings, Properties,
    PropertyMap,
};
use crate::pool::{PoolInfo, PoolName};
use crate::selection::{P2pPair, SelectedPool};

pub const RANDOM_TYPE: &str = "random";
pub const WEIGHTED_RANDOM_TYPE: &str = "wrandom";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Weighting {
    Uniform,
    Weighted,
}

/// Partition choosing pools at random, uniformly or weighted.
#[derive(Clone, Debug)]
pub struct RandomPartition {
    properties: Properties,
    settings: PartitionSettings,
    weighting: Weighting,
}

impl RandomPartition {
    pub fn uniform(
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        RandomPartition::new(Weighting::Uniform, inherited, defined)
    }

    pub fn weighted(
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        RandomPartition::new(Weighting::Weighted, inherited, defined)
    }

    fn new(
        weighting: Weighting,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        let properties = Properties::new(defaults_with(&[]), inherited, defined)?;
        let settings = PartitionSettings::from_properties(&properties)?;
        Ok(RandomPartition {
            properties,
            settings,
            weighting,
        })
    }

    fn choose<'a, F>(
        &self,
        pools: &[&'a PoolInfo],
        weight: F,
    ) -> Result<&'a PoolInfo, Error>
    where
        F: Fn(&PoolInfo) -> f64,
    {
        let mut rng = rand::thread_rng();
        if self.weighting == Weighting::Weighted {
            // Weights that do not form a distribution fall back to uniform
            if let Ok(index) =
                WeightedIndex::new(pools.iter().map(|p| weight(*p)))
            {
                return Ok(pools[index.sample(&mut rng)]);
            }
        }
        pools.choose(&mut rng).copied().ok_or(Error::NoCandidates)
    }

    fn write(
        &self,
        pools: &[PoolInfo],
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        let eligible = pools_with_room(pools, file.size)?;
        self.choose(&eligible, |p| {
            p.available_space().saturating_sub(file.size) as f64
        })
        .map(SelectedPool::from)
    }

    fn read(&self, pools: &[PoolInfo]) -> Result<SelectedPool, Error> {
        let candidates: Vec<&PoolInfo> = pools.iter().collect();
        self.choose(&candidates, |p| 1.0 / (1.0 + performance_cost(&p.cost)))
            .map(SelectedPool::from)
    }
}

impl Partition for RandomPartition {
    fn partition_type(&self) -> &'static str {
        match self.weighting {
            Weighting::Uniform => RANDOM_TYPE,
            Weighting::Weighted => WEIGHTED_RANDOM_TYPE,
        }
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
        Ok(Arc::new(RandomPartition::new(
            self.weighting,
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
        self.write(pools, file)
    }

    fn select_read_pool(
        &self,
        _cm: &dyn CostModule,
        pools: &[PoolInfo],
        _file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        self.read(pools)
    }

    fn select_pool2pool(
        &self,
        _cm: &dyn CostModule,
        src: &[PoolInfo],
        dst: &[PoolInfo],
        file: &FileAttributes,
        _force: bool,
    ) -> Result<P2pPair, Error> {
        let source = self.read(src)?;
        let destinations: Vec<PoolInfo> = dst
            .iter()
            .filter(|p| p.name != source.name)
            .cloned()
            .collect();
        let destination = self.write(&destinations, file)?;
        P2pPair::new(source, destination)
    }

    fn select_stage_pool(
        &self,
        _cm: &dyn CostModule,
        pools: &[PoolInfo],
        _previous_pool: Option<&PoolName>,
        _previous_host: Option<&str>,
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error> {
        self.write(pools, file)
    }
}

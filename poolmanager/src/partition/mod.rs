// Copyright 2020 Joyent, Inc.

//! Partitions parameterize how pools are selected.
//!
//! A partition is an immutable value made of three layers of string
//! properties: the defaults of its strategy, the properties inherited from an
//! enclosing scope, and the properties defined on the partition itself. A
//! lookup consults `defined`, then `inherited`, then `defaults`. The typed
//! values a strategy depends on are parsed once, when the partition is built,
//! so a malformed value fails the construction and never a selection.
//!
//! Reconfiguring a partition never modifies it. `update_properties` and
//! `update_inherited` build a new partition of the same strategy, leaving the
//! old one (and any selection running on it) untouched.

pub mod classic;
pub mod factory;
pub mod lru;
pub mod manager;
pub mod random;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::cost::CostModule;
use crate::error::Error;
use crate::file::FileAttributes;
use crate::pool::{PoolInfo, PoolName};
use crate::selection::{P2pPair, SelectedPool};

/// A layer of partition properties.
pub type PropertyMap = BTreeMap<String, String>;

/// Changes to the defined layer of a partition. `None` removes the key so
/// the lookup falls back to the inherited and default layers.
pub type PropertyUpdates = BTreeMap<String, Option<String>>;

pub const P2P_ALLOWED: &str = "p2p-allowed";
pub const P2P_ONCOST: &str = "p2p-oncost";
pub const P2P_FORTRANSFER: &str = "p2p-fortransfer";
pub const STAGE_ALLOWED: &str = "stage-allowed";
pub const STAGE_ONCOST: &str = "stage-oncost";

// Defaults shared by every strategy
const BASE_DEFAULTS: &[(&str, &str)] = &[
    (P2P_ALLOWED, "yes"),
    (P2P_ONCOST, "no"),
    (P2P_FORTRANSFER, "no"),
    (STAGE_ALLOWED, "no"),
    (STAGE_ONCOST, "no"),
];

/// Build the defaults of a strategy: the shared defaults plus its own.
pub fn defaults_with(own: &[(&str, &str)]) -> PropertyMap {
    BASE_DEFAULTS
        .iter()
        .chain(own.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Build a property layer from literal pairs.
pub fn property_map(pairs: &[(&str, &str)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The three property layers of a partition.
#[derive(Clone, Debug, PartialEq)]
pub struct Properties {
    defaults: Arc<PropertyMap>,
    inherited: Arc<PropertyMap>,
    defined: Arc<PropertyMap>,
}

impl Properties {
    /// Layer the properties. Every defined key must be one the strategy has
    /// a default for. Inherited keys are not checked, since an enclosing
    /// scope may carry properties meant for other strategies.
    pub fn new(
        defaults: PropertyMap,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Self, Error> {
        if let Some(key) = defined.keys().find(|k| !defaults.contains_key(*k))
        {
            return Err(Error::UnknownProperty(key.clone()));
        }

        Ok(Properties {
            defaults: Arc::new(defaults),
            inherited: Arc::new(inherited),
            defined: Arc::new(defined),
        })
    }

    pub fn defaults(&self) -> &PropertyMap {
        &self.defaults
    }

    pub fn inherited(&self) -> &PropertyMap {
        &self.inherited
    }

    pub fn defined(&self) -> &PropertyMap {
        &self.defined
    }

    /// Resolve a key through the defined, inherited and default layers.
    pub fn get(&self, key: &str) -> Result<&str, Error> {
        self.defined
            .get(key)
            .or_else(|| self.inherited.get(key))
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
            .ok_or_else(|| Error::MissingProperty(key.to_string()))
    }

    /// Only "yes" and "no" are booleans.
    pub fn get_boolean(&self, key: &str) -> Result<bool, Error> {
        match self.get(key)? {
            "yes" => Ok(true),
            "no" => Ok(false),
            other => Err(malformed(key, other, "yes or no")),
        }
    }

    pub fn get_integer(&self, key: &str) -> Result<i64, Error> {
        let value = self.get(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| malformed(key, value, "an integer"))
    }

    pub fn get_double(&self, key: &str) -> Result<f64, Error> {
        let value = self.get(key)?;
        match value.trim().parse::<f64>() {
            Ok(d) if d.is_finite() => Ok(d),
            _ => Err(malformed(key, value, "a number")),
        }
    }

    /// The defined layer after applying `updates`: keys present in the
    /// updates replace, `None` removes, absent keys are carried over.
    pub fn updated_defined(&self, updates: &PropertyUpdates) -> PropertyMap {
        let mut defined = (*self.defined).clone();
        for (key, value) in updates {
            match value {
                Some(value) => {
                    defined.insert(key.clone(), value.clone());
                }
                None => {
                    defined.remove(key);
                }
            }
        }
        defined
    }

    /// Every key with its resolved value.
    pub fn resolved(&self) -> PropertyMap {
        let mut all = (*self.defaults).clone();
        all.extend(self.inherited.iter().map(|(k, v)| (k.clone(), v.clone())));
        all.extend(self.defined.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }
}

pub(crate) fn malformed(key: &str, value: &str, expected: &'static str) -> Error {
    Error::MalformedProperty {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// The policy flags every strategy carries, parsed once at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartitionSettings {
    pub p2p_allowed: bool,
    pub p2p_on_cost: bool,
    pub p2p_for_transfer: bool,
    pub stage_allowed: bool,
    pub stage_on_cost: bool,
}

impl PartitionSettings {
    pub fn from_properties(properties: &Properties) -> Result<Self, Error> {
        Ok(PartitionSettings {
            p2p_allowed: properties.get_boolean(P2P_ALLOWED)?,
            p2p_on_cost: properties.get_boolean(P2P_ONCOST)?,
            p2p_for_transfer: properties.get_boolean(P2P_FORTRANSFER)?,
            stage_allowed: properties.get_boolean(STAGE_ALLOWED)?,
            stage_on_cost: properties.get_boolean(STAGE_ONCOST)?,
        })
    }
}

/// A pool selection strategy together with its configuration.
///
/// Every operation reads the candidate list it is given and never modifies
/// it. Each fails with one of the "no eligible pool" errors when no
/// candidate survives filtering.
pub trait Partition: Debug + Send + Sync {
    /// The name this strategy is registered under.
    fn partition_type(&self) -> &'static str;

    fn properties(&self) -> &Properties;

    fn settings(&self) -> &PartitionSettings;

    /// Build a partition of the same strategy from new property layers.
    fn create(
        &self,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Arc<dyn Partition>, Error>;

    /// Choose a pool with room for the file.
    fn select_write_pool(
        &self,
        cm: &dyn CostModule,
        pools: &[PoolInfo],
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error>;

    /// Choose among pools already holding the file.
    fn select_read_pool(
        &self,
        cm: &dyn CostModule,
        pools: &[PoolInfo],
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error>;

    /// Choose a source among `src` (pools holding the file) and a destination
    /// among `dst`. `force` disables cost based refusal.
    fn select_pool2pool(
        &self,
        cm: &dyn CostModule,
        src: &[PoolInfo],
        dst: &[PoolInfo],
        file: &FileAttributes,
        force: bool,
    ) -> Result<P2pPair, Error>;

    /// Choose a pool to stage the file into from nearline storage,
    /// preferably not `previous_pool` nor a pool on `previous_host`.
    fn select_stage_pool(
        &self,
        cm: &dyn CostModule,
        pools: &[PoolInfo],
        previous_pool: Option<&PoolName>,
        previous_host: Option<&str>,
        file: &FileAttributes,
    ) -> Result<SelectedPool, Error>;

    /// A new partition with the defined layer updated.
    fn update_properties(
        &self,
        updates: &PropertyUpdates,
    ) -> Result<Arc<dyn Partition>, Error> {
        let properties = self.properties();
        self.create(
            properties.inherited().clone(),
            properties.updated_defined(updates),
        )
    }

    /// A new partition with the inherited layer replaced.
    fn update_inherited(
        &self,
        inherited: PropertyMap,
    ) -> Result<Arc<dyn Partition>, Error> {
        self.create(inherited, self.properties().defined().clone())
    }
}

// Pools that can hold the file, or AllPoolsFull.
pub(crate) fn pools_with_room<'a>(
    pools: &'a [PoolInfo],
    size: u64,
) -> Result<Vec<&'a PoolInfo>, Error> {
    if pools.is_empty() {
        return Err(Error::NoCandidates);
    }
    let eligible: Vec<&PoolInfo> =
        pools.iter().filter(|p| p.can_hold_file(size)).collect();
    if eligible.is_empty() {
        return Err(Error::AllPoolsFull { file_size: size });
    }
    Ok(eligible)
}

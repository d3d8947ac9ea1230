// Copyright 2020 Joyent, Inc.

//! The registry of partition strategies, keyed by type name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::partition::classic::{self, ClassicPartition};
use crate::partition::lru::{self, LruPartition};
use crate::partition::random::{self, RandomPartition};
use crate::partition::{Partition, PropertyMap};

type Constructor = dyn Fn(PropertyMap, PropertyMap) -> Result<Arc<dyn Partition>, Error>
    + Send
    + Sync;

/// Builds partitions of one strategy from an inherited and a defined
/// property layer.
#[derive(Clone)]
pub struct PartitionFactory {
    type_name: String,
    description: String,
    constructor: Arc<Constructor>,
}

impl PartitionFactory {
    pub fn new<F>(type_name: &str, description: &str, constructor: F) -> Self
    where
        F: Fn(PropertyMap, PropertyMap) -> Result<Arc<dyn Partition>, Error>
            + Send
            + Sync
            + 'static,
    {
        PartitionFactory {
            type_name: type_name.to_string(),
            description: description.to_string(),
            constructor: Arc::new(constructor),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn create(
        &self,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Arc<dyn Partition>, Error> {
        (self.constructor)(inherited, defined)
    }
}

impl fmt::Debug for PartitionFactory {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("PartitionFactory")
            .field("type_name", &self.type_name)
            .field("description", &self.description)
            .finish()
    }
}

/// Partition factories by type name.
#[derive(Clone, Debug, Default)]
pub struct PartitionFactories {
    factories: BTreeMap<String, PartitionFactory>,
}

impl PartitionFactories {
    /// An empty registry.
    pub fn new() -> Self {
        PartitionFactories::default()
    }

    /// A registry with the classic, lru, random and wrandom strategies.
    pub fn with_defaults() -> Self {
        let mut factories = PartitionFactories::new();
        factories.register(PartitionFactory::new(
            classic::TYPE,
            "Cost based selection with cost cuts",
            |inherited, defined| {
                Ok(Arc::new(ClassicPartition::new(inherited, defined)?))
            },
        ));
        factories.register(PartitionFactory::new(
            lru::TYPE,
            "Selects least recently used pool",
            |inherited, defined| {
                Ok(Arc::new(LruPartition::new(inherited, defined)?))
            },
        ));
        factories.register(PartitionFactory::new(
            random::RANDOM_TYPE,
            "Selects a random pool",
            |inherited, defined| {
                Ok(Arc::new(RandomPartition::uniform(inherited, defined)?))
            },
        ));
        factories.register(PartitionFactory::new(
            random::WEIGHTED_RANDOM_TYPE,
            "Selects a random pool weighted by available space",
            |inherited, defined| {
                Ok(Arc::new(RandomPartition::weighted(inherited, defined)?))
            },
        ));
        factories
    }

    /// Register a factory, replacing any factory of the same type name.
    pub fn register(&mut self, factory: PartitionFactory) {
        self.factories
            .insert(factory.type_name().to_string(), factory);
    }

    pub fn get(&self, type_name: &str) -> Result<&PartitionFactory, Error> {
        self.factories
            .get(type_name)
            .ok_or_else(|| Error::UnknownPartitionType(type_name.to_string()))
    }

    pub fn create(
        &self,
        type_name: &str,
        inherited: PropertyMap,
        defined: PropertyMap,
    ) -> Result<Arc<dyn Partition>, Error> {
        self.get(type_name)?.create(inherited, defined)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionFactory> {
        self.factories.values()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::partition::property_map;

    #[test]
    fn default_strategies_registered() {
        let factories = PartitionFactories::with_defaults();
        let names: Vec<&str> = factories.iter().map(|f| f.type_name()).collect();
        assert_eq!(names, vec!["classic", "lru", "random", "wrandom"]);

        for name in names {
            let partition = factories
                .create(name, PropertyMap::new(), PropertyMap::new())
                .unwrap();
            assert_eq!(partition.partition_type(), name);
        }
    }

    #[test]
    fn unknown_type() {
        let factories = PartitionFactories::with_defaults();
        match factories.create("fifo", PropertyMap::new(), PropertyMap::new()) {
            Err(Error::UnknownPartitionType(t)) => assert_eq!(t, "fifo"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn construction_errors_propagate() {
        let factories = PartitionFactories::with_defaults();
        let result = factories.create(
            "classic",
            PropertyMap::new(),
            property_map(&[("p2p", "0%")]),
        );
        assert!(result.unwrap_err().is_configuration());
    }

    #[test]
    fn custom_strategy() {
        let mut factories = PartitionFactories::new();
        factories.register(PartitionFactory::new(
            "roundrobin",
            "Alias of lru",
            |inherited, defined| {
                Ok(Arc::new(LruPartition::new(inherited, defined)?))
            },
        ));
        let factory = factories.get("roundrobin").unwrap();
        assert_eq!(factory.description(), "Alias of lru");
        assert!(factory
            .create(PropertyMap::new(), PropertyMap::new())
            .is_ok());
        assert!(factories.get("classic").is_err());
    }
}

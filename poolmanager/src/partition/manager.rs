// Copyright 2020 Joyent, Inc.

//! The table of named partitions.
//!
//! Partitions are immutable, so the table only ever swaps whole values.
//! A selection holding an `Arc` of a partition keeps using it undisturbed
//! while the table is reconfigured.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use slog::{debug, info, o, Drain, Logger};

use crate::error::Error;
use crate::partition::classic;
use crate::partition::factory::{PartitionFactories, PartitionFactory};
use crate::partition::{Partition, PropertyMap, PropertyUpdates};

/// The name of the partition used when a request names none.
pub const DEFAULT_PARTITION: &str = "default";

/// The serialized form of one partition.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PartitionDefinition {
    #[serde(rename = "type")]
    pub partition_type: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// The serialized form of a whole partition table.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PartitionSetup {
    /// Properties inherited by every partition.
    #[serde(default)]
    pub inherited: PropertyMap,
    pub partitions: BTreeMap<String, PartitionDefinition>,
}

#[derive(Debug)]
struct PartitionTable {
    inherited: PropertyMap,
    partitions: BTreeMap<String, Arc<dyn Partition>>,
}

/// Named partitions, always including the `default` partition.
#[derive(Debug)]
pub struct PartitionManager {
    table: RwLock<PartitionTable>,
    factories: PartitionFactories,
    log: Logger,
}

impl PartitionManager {
    /// A manager with the built in strategies and a classic `default`
    /// partition.
    pub fn new(log: Option<Logger>) -> Result<Self, Error> {
        PartitionManager::with_factories(PartitionFactories::with_defaults(), log)
    }

    pub fn with_factories(
        factories: PartitionFactories,
        log: Option<Logger>,
    ) -> Result<Self, Error> {
        let log = log.unwrap_or_else(|| {
            Logger::root(slog_stdlog::StdLog.fuse(), o!())
        });

        let mut partitions = BTreeMap::new();
        partitions.insert(
            DEFAULT_PARTITION.to_string(),
            factories.create(
                classic::TYPE,
                PropertyMap::new(),
                PropertyMap::new(),
            )?,
        );

        Ok(PartitionManager {
            table: RwLock::new(PartitionTable {
                inherited: PropertyMap::new(),
                partitions,
            }),
            factories,
            log,
        })
    }

    fn read_table(&self) -> RwLockReadGuard<PartitionTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<PartitionTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn factories(&self) -> impl Iterator<Item = &PartitionFactory> {
        self.factories.iter()
    }

    /// Create or replace the named partition.
    pub fn create_partition(
        &self,
        name: &str,
        partition_type: &str,
        properties: PropertyMap,
    ) -> Result<Arc<dyn Partition>, Error> {
        let mut table = self.write_table();
        let partition = self.factories.create(
            partition_type,
            table.inherited.clone(),
            properties,
        )?;
        table
            .partitions
            .insert(name.to_string(), Arc::clone(&partition));

        info!(self.log, "created partition";
            "name" => name, "type" => partition_type);
        Ok(partition)
    }

    /// Replace the named partition with a copy updated by `updates`.
    pub fn update_partition(
        &self,
        name: &str,
        updates: &PropertyUpdates,
    ) -> Result<Arc<dyn Partition>, Error> {
        let mut table = self.write_table();
        let current = table
            .partitions
            .get(name)
            .ok_or_else(|| Error::UnknownPartition(name.to_string()))?;
        let partition = current.update_properties(updates)?;
        table
            .partitions
            .insert(name.to_string(), Arc::clone(&partition));

        info!(self.log, "updated partition";
            "name" => name, "changes" => updates.len());
        Ok(partition)
    }

    /// Replace the inherited layer of every partition. Nothing changes if
    /// any partition rejects the new layer.
    pub fn set_inherited(&self, inherited: PropertyMap) -> Result<(), Error> {
        let mut table = self.write_table();
        let mut partitions = BTreeMap::new();
        for (name, partition) in table.partitions.iter() {
            partitions.insert(
                name.clone(),
                partition.update_inherited(inherited.clone())?,
            );
        }
        table.partitions = partitions;
        table.inherited = inherited;

        info!(self.log, "updated inherited partition properties");
        Ok(())
    }

    pub fn destroy_partition(&self, name: &str) -> Result<(), Error> {
        if name == DEFAULT_PARTITION {
            return Err(Error::InvalidSetup(String::from(
                "the default partition cannot be destroyed",
            )));
        }

        let mut table = self.write_table();
        table
            .partitions
            .remove(name)
            .ok_or_else(|| Error::UnknownPartition(name.to_string()))?;

        info!(self.log, "destroyed partition"; "name" => name);
        Ok(())
    }

    pub fn get_partition(&self, name: &str) -> Result<Arc<dyn Partition>, Error> {
        self.read_table()
            .partitions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownPartition(name.to_string()))
    }

    /// The named partition, or the default one if no name is given.
    pub fn get_partition_or_default(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn Partition>, Error> {
        self.get_partition(name.unwrap_or(DEFAULT_PARTITION))
    }

    pub fn default_partition(&self) -> Result<Arc<dyn Partition>, Error> {
        self.get_partition(DEFAULT_PARTITION)
    }

    /// All partitions by name.
    pub fn partitions(&self) -> BTreeMap<String, Arc<dyn Partition>> {
        self.read_table().partitions.clone()
    }

    pub fn inherited(&self) -> PropertyMap {
        self.read_table().inherited.clone()
    }

    /// Replace the whole table with the partitions described by `setup`.
    /// Nothing changes if any partition fails to build. A setup without a
    /// `default` partition gets a classic one.
    pub fn load(&self, setup: PartitionSetup) -> Result<(), Error> {
        let mut partitions = BTreeMap::new();
        for (name, definition) in setup.partitions {
            let partition = self.factories.create(
                &definition.partition_type,
                setup.inherited.clone(),
                definition.properties,
            )?;
            partitions.insert(name, partition);
        }
        if !partitions.contains_key(DEFAULT_PARTITION) {
            partitions.insert(
                DEFAULT_PARTITION.to_string(),
                self.factories.create(
                    classic::TYPE,
                    setup.inherited.clone(),
                    PropertyMap::new(),
                )?,
            );
        }

        let mut table = self.write_table();
        debug!(self.log, "loading partition setup";
            "partitions" => partitions.len());
        table.partitions = partitions;
        table.inherited = setup.inherited;

        info!(self.log, "loaded partition setup");
        Ok(())
    }

    /// Load a setup from its JSON form.
    pub fn load_setup(&self, json: &str) -> Result<(), Error> {
        let setup: PartitionSetup = serde_json::from_str(json)?;
        self.load(setup)
    }

    /// The current table in its serializable form. Only defined properties
    /// are written out.
    pub fn setup(&self) -> PartitionSetup {
        let table = self.read_table();
        PartitionSetup {
            inherited: table.inherited.clone(),
            partitions: table
                .partitions
                .iter()
                .map(|(name, partition)| {
                    (
                        name.clone(),
                        PartitionDefinition {
                            partition_type: partition
                                .partition_type()
                                .to_string(),
                            properties: partition
                                .properties()
                                .defined()
                                .clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn dump_setup(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.setup())?)
    }
}

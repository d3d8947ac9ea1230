// Copyright 2020 Joyent, Inc.

//! The selector side of pool selection.
//!
//! `PoolManager` answers select-pool requests. For every request it takes a
//! fresh candidate snapshot from its [`Inventory`](../inventory/trait.Inventory.html)
//! and hands it to the partition the request names.

use std::sync::Arc;

use slog::{debug, info, o, Drain, Logger};

use crate::error::Error;
use crate::file::FileAttributes;
use crate::inventory::{Direction, Inventory};
use crate::message::{IoDirection, Message, SelectPoolReply, SelectPoolRequest};
use crate::partition::manager::PartitionManager;
use crate::partition::Partition;
use crate::pool::PoolName;
use crate::selection::{P2pPair, SelectedPool};

/// The configuration options for a `PoolManager`.
#[derive(Debug, Default)]
pub struct PoolManagerOptions {
    /// An optional `slog` logger instance. If none is provided then the
    /// logging will fall back to using the
    /// [`slog-stdlog`](https://docs.rs/slog-stdlog) drain.
    pub log: Option<Logger>,
}

/// How a read request is served.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadPlan {
    /// Read from a pool already holding the file.
    Direct(SelectedPool),
    /// Replicate the file to a cheaper pool first.
    P2p(P2pPair),
    /// Restore the file from nearline storage first.
    Stage(SelectedPool),
}

pub struct PoolManager<I>
where
    I: Inventory,
{
    inventory: I,
    partitions: Arc<PartitionManager>,
    log: Logger,
}

impl<I> PoolManager<I>
where
    I: Inventory,
{
    pub fn new(
        options: PoolManagerOptions,
        inventory: I,
        partitions: Arc<PartitionManager>,
    ) -> Self {
        let log = options.log.unwrap_or_else(|| {
            Logger::root(slog_stdlog::StdLog.fuse(), o!())
        });

        PoolManager {
            inventory,
            partitions,
            log,
        }
    }

    pub fn partitions(&self) -> &Arc<PartitionManager> {
        &self.partitions
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    // The partition named by the request, else the one the inventory's
    // selection unit asks for, else the default.
    fn partition(
        &self,
        requested: Option<&str>,
        suggested: Option<&str>,
    ) -> Result<Arc<dyn Partition>, Error> {
        self.partitions
            .get_partition_or_default(requested.or(suggested))
    }

    pub fn select_write_pool(
        &self,
        file: &FileAttributes,
        partition: Option<&str>,
    ) -> Result<SelectedPool, Error> {
        let candidates = self.inventory.candidates(Direction::Write, file)?;
        let partition =
            self.partition(partition, candidates.partition.as_deref())?;
        let cm = self.inventory.cost_module();

        let selected =
            partition.select_write_pool(&*cm, &candidates.pools, file)?;
        debug!(self.log, "selected write pool";
            "pnfsid" => %file.pnfs_id, "pool" => %selected.name,
            "candidates" => candidates.pools.len());
        Ok(selected)
    }

    pub fn select_read_pool(
        &self,
        file: &FileAttributes,
        partition: Option<&str>,
    ) -> Result<SelectedPool, Error> {
        let candidates = self.inventory.candidates(Direction::Read, file)?;
        let partition =
            self.partition(partition, candidates.partition.as_deref())?;
        let cm = self.inventory.cost_module();

        let selected =
            partition.select_read_pool(&*cm, &candidates.pools, file)?;
        debug!(self.log, "selected read pool";
            "pnfsid" => %file.pnfs_id, "pool" => %selected.name);
        Ok(selected)
    }

    pub fn select_p2p_pair(
        &self,
        file: &FileAttributes,
        partition: Option<&str>,
        force: bool,
    ) -> Result<P2pPair, Error> {
        let sources = self.inventory.candidates(Direction::Read, file)?;
        let destinations = self.inventory.candidates(Direction::P2p, file)?;
        let partition =
            self.partition(partition, destinations.partition.as_deref())?;
        let cm = self.inventory.cost_module();

        let pair = partition.select_pool2pool(
            &*cm,
            &sources.pools,
            &destinations.pools,
            file,
            force,
        )?;
        debug!(self.log, "selected p2p pair";
            "pnfsid" => %file.pnfs_id,
            "source" => %pair.source().name,
            "destination" => %pair.destination().name);
        Ok(pair)
    }

    pub fn select_stage_pool(
        &self,
        file: &FileAttributes,
        partition: Option<&str>,
        previous_pool: Option<&PoolName>,
        previous_host: Option<&str>,
    ) -> Result<SelectedPool, Error> {
        let candidates = self.inventory.candidates(Direction::Stage, file)?;
        let partition =
            self.partition(partition, candidates.partition.as_deref())?;
        let cm = self.inventory.cost_module();

        let selected = partition.select_stage_pool(
            &*cm,
            &candidates.pools,
            previous_pool,
            previous_host,
            file,
        )?;
        debug!(self.log, "selected stage pool";
            "pnfsid" => %file.pnfs_id, "pool" => %selected.name);
        Ok(selected)
    }

    /// Decide how a read is served. A read refused on cost falls back, in
    /// order, to replication (if `p2p-oncost`), to staging (if
    /// `stage-oncost`) and finally to the expensive pool itself when the
    /// partition named one. A file without online replicas is staged if the
    /// partition allows it.
    pub fn plan_read(
        &self,
        file: &FileAttributes,
        partition_name: Option<&str>,
    ) -> Result<ReadPlan, Error> {
        let replicas = self.inventory.candidates(Direction::Read, file)?;
        let partition =
            self.partition(partition_name, replicas.partition.as_deref())?;
        let settings = *partition.settings();

        if replicas.pools.is_empty() {
            if !settings.stage_allowed {
                return Err(Error::PermissionDenied(format!(
                    "file {} is not online and staging is not allowed",
                    file.pnfs_id
                )));
            }
            return self
                .select_stage_pool(file, partition_name, None, None)
                .map(ReadPlan::Stage);
        }

        let cm = self.inventory.cost_module();
        match partition.select_read_pool(&*cm, &replicas.pools, file) {
            Ok(pool) => Ok(ReadPlan::Direct(pool)),
            Err(Error::CostExceeded {
                pool,
                fallback_exceeded,
                cost_cut_exceeded,
            }) => {
                debug!(self.log, "read cost exceeded";
                    "pnfsid" => %file.pnfs_id,
                    "fallback" => fallback_exceeded,
                    "cost_cut" => cost_cut_exceeded);

                if settings.p2p_allowed && settings.p2p_on_cost {
                    match self.select_p2p_pair(file, partition_name, false) {
                        Ok(pair) => return Ok(ReadPlan::P2p(pair)),
                        Err(e) => {
                            debug!(self.log, "no p2p on cost: {}", e);
                        }
                    }
                }

                if settings.stage_allowed && settings.stage_on_cost {
                    match self.select_stage_pool(
                        file,
                        partition_name,
                        None,
                        None,
                    ) {
                        Ok(pool) => return Ok(ReadPlan::Stage(pool)),
                        Err(e) => {
                            debug!(self.log, "no stage on cost: {}", e);
                        }
                    }
                }

                match pool {
                    Some(pool) => Ok(ReadPlan::Direct(*pool)),
                    None => Err(Error::CostExceeded {
                        pool: None,
                        fallback_exceeded,
                        cost_cut_exceeded,
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Answer a select-pool request. Reads that need a replication or a
    /// stage first are answered with `Error::FileNotInCache` so the client
    /// asks again once the file is in place.
    pub fn handle(&self, message: Message) -> Result<Message, Error> {
        let request = match message {
            Message::SelectPool(request) => request,
            other => {
                return Err(Error::ProtocolViolation(format!(
                    "pool manager cannot handle {} messages",
                    other.kind()
                )))
            }
        };

        let SelectPoolRequest {
            direction,
            file,
            partition,
            ..
        } = request;

        let selected = match direction {
            IoDirection::Write => {
                self.select_write_pool(&file, partition.as_deref())?
            }
            IoDirection::Read => {
                match self.plan_read(&file, partition.as_deref())? {
                    ReadPlan::Direct(pool) => pool,
                    ReadPlan::P2p(pair) => {
                        info!(self.log, "replicating file for read";
                            "pnfsid" => %file.pnfs_id,
                            "source" => %pair.source().name,
                            "destination" => %pair.destination().name);
                        return Err(Error::FileNotInCache(format!(
                            "{} is being replicated to {}",
                            file.pnfs_id,
                            pair.destination().name
                        )));
                    }
                    ReadPlan::Stage(pool) => {
                        info!(self.log, "staging file for read";
                            "pnfsid" => %file.pnfs_id, "pool" => %pool.name);
                        return Err(Error::FileNotInCache(format!(
                            "{} is being staged to {}",
                            file.pnfs_id, pool.name
                        )));
                    }
                }
            }
        };

        Ok(Message::SelectPoolReply(SelectPoolReply::new(
            file.pnfs_id,
            selected,
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::collections::HashMap;

    use crate::cost::{CostModule, CostSnapshot};
    use crate::file::ProtocolInfo;
    use crate::inventory::Candidates;
    use crate::partition::{property_map, P2P_ONCOST, STAGE_ALLOWED};
    use crate::pool::{
        PoolCostInfo, PoolInfo, PoolQueueInfo, PoolSpaceInfo, HOSTNAME_TAG,
    };

    // Pools holding the file are `online`; every pool accepts writes.
    struct FixedInventory {
        pools: Vec<PoolInfo>,
        online: Vec<&'static str>,
    }

    impl Inventory for FixedInventory {
        fn candidates(
            &self,
            direction: Direction,
            _file: &FileAttributes,
        ) -> Result<Candidates, Error> {
            let pools = match direction {
                Direction::Read => self
                    .pools
                    .iter()
                    .filter(|p| self.online.contains(&p.name.as_str()))
                    .cloned()
                    .collect(),
                _ => self.pools.clone(),
            };
            Ok(Candidates {
                pools,
                partition: None,
            })
        }

        fn cost_module(&self) -> Arc<dyn CostModule> {
            Arc::new(CostSnapshot::new(&self.pools))
        }
    }

    fn pool(name: &str, load: u32) -> PoolInfo {
        let mut tags = HashMap::new();
        tags.insert(HOSTNAME_TAG.to_string(), format!("{}-host", name));
        PoolInfo::new(
            name.into(),
            format!("{}@{}Domain", name, name),
            PoolCostInfo {
                space: PoolSpaceInfo {
                    total: 1000,
                    free: 1000,
                    ..Default::default()
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

    fn pool_manager(online: Vec<&'static str>) -> PoolManager<FixedInventory> {
        let inventory = FixedInventory {
            pools: vec![pool("busy", 9), pool("idle", 0)],
            online,
        };
        let partitions = Arc::new(PartitionManager::new(None).unwrap());
        PoolManager::new(PoolManagerOptions::default(), inventory, partitions)
    }

    fn file() -> FileAttributes {
        FileAttributes::new("0000C0FFEE".into(), 10)
    }

    #[test]
    fn direct_read() {
        let pm = pool_manager(vec!["busy"]);
        match pm.plan_read(&file(), None).unwrap() {
            ReadPlan::Direct(pool) => assert_eq!(pool.name, "busy".into()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn replicate_on_cost() {
        let pm = pool_manager(vec!["busy"]);
        pm.partitions()
            .create_partition(
                "hot",
                "classic",
                property_map(&[("p2p", "0.5"), (P2P_ONCOST, "yes")]),
            )
            .unwrap();

        match pm.plan_read(&file(), Some("hot")).unwrap() {
            ReadPlan::P2p(pair) => {
                assert_eq!(pair.source().name, "busy".into());
                assert_eq!(pair.destination().name, "idle".into());
            }
            other => panic!("unexpected {:?}", other),
        }

        // Without p2p-oncost the expensive pool is used after all
        pm.partitions()
            .create_partition("warm", "classic", property_map(&[("p2p", "0.5")]))
            .unwrap();
        match pm.plan_read(&file(), Some("warm")).unwrap() {
            ReadPlan::Direct(pool) => assert_eq!(pool.name, "busy".into()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stage_when_offline() {
        let pm = pool_manager(vec![]);
        match pm.plan_read(&file(), None) {
            Err(Error::PermissionDenied(_)) => (),
            other => panic!("unexpected {:?}", other),
        }

        pm.partitions()
            .create_partition(
                "tape",
                "classic",
                property_map(&[(STAGE_ALLOWED, "yes")]),
            )
            .unwrap();
        match pm.plan_read(&file(), Some("tape")).unwrap() {
            ReadPlan::Stage(pool) => assert_eq!(pool.name, "idle".into()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn handle_select_pool() {
        let pm = pool_manager(vec!["busy"]);
        let request = |direction, partition: Option<&str>| {
            Message::SelectPool(SelectPoolRequest {
                direction,
                file: file(),
                protocol: ProtocolInfo::new("DCap", 3),
                partition: partition.map(String::from),
            })
        };

        match pm.handle(request(IoDirection::Write, None)).unwrap() {
            Message::SelectPoolReply(reply) => {
                assert_eq!(reply.pool, "idle".into());
                assert_eq!(reply.address, "idle@idleDomain");
                assert_eq!(reply.pnfs_id, file().pnfs_id);
            }
            other => panic!("unexpected {:?}", other),
        }

        pm.partitions()
            .create_partition(
                "hot",
                "classic",
                property_map(&[("p2p", "0.5"), (P2P_ONCOST, "yes")]),
            )
            .unwrap();
        match pm.handle(request(IoDirection::Read, Some("hot"))) {
            Err(e @ Error::FileNotInCache(_)) => assert!(e.is_transient()),
            other => panic!("unexpected {:?}", other),
        }

        match pm.handle(request(IoDirection::Read, Some("missing"))) {
            Err(Error::UnknownPartition(name)) => assert_eq!(name, "missing"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

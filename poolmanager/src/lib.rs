// Copyright 2020 Joyent, Inc.

//! Pool selection for a distributed storage cluster
//!
//! A storage cluster keeps files on many *pools*, each a storage node with
//! its own disks, queues and load. Every time a client reads or writes a
//! file, some pool has to be chosen to serve it. This crate implements that
//! choice and the protocol a door (a client facing protocol endpoint) uses
//! to obtain it.
//!
//! The crate relies on three traits to stay independent of how pools are
//! discovered and how messages are delivered. These are the
//! [`Inventory`](inventory/trait.Inventory.html) trait, the
//! [`CostModule`](cost/trait.CostModule.html) trait and the
//! [`CellEndpoint`](endpoint/trait.CellEndpoint.html) trait.
//!
//! ## Inventories
//!
//! An *inventory* knows which pools may serve a request: pools holding a
//! replica of a file for reads, pools linked for writes, stages and
//! replications. For every request it returns a fresh list of
//! [`PoolInfo`](pool/struct.PoolInfo.html) snapshots together with a
//! [`CostModule`](cost/trait.CostModule.html) over the whole cluster.
//! Selection never changes what an inventory returns; it only ranks it.
//!
//! ## Partitions
//!
//! A [`Partition`](partition/trait.Partition.html) is a selection strategy
//! together with its configuration. The configuration is a map of string
//! properties in three layers: the strategy's defaults, properties inherited
//! from the enclosing scope and properties defined on the partition. Typed
//! values are parsed once, when the partition is built, so a bad value is
//! rejected at configuration time rather than in the middle of a request.
//!
//! Partitions are immutable. Changing a property builds a new partition and
//! the [`PartitionManager`](partition/manager/struct.PartitionManager.html)
//! swaps it in; selections running on the old value finish undisturbed.
//!
//! The strategies shipped with the crate are:
//!
//! | Type      | Selection                                                  |
//! |-----------|------------------------------------------------------------|
//! | `classic` | Cheapest pool by weighted space and performance cost, with |
//! |           | cost cuts that refuse or divert expensive requests         |
//! | `lru`     | Least recently used pool, lock free round robin            |
//! | `random`  | Uniformly random eligible pool                             |
//! | `wrandom` | Random eligible pool weighted by free space or idleness    |
//!
//! New strategies are added by registering a
//! [`PartitionFactory`](partition/factory/struct.PartitionFactory.html);
//! nothing that calls a partition needs to change.
//!
//! ## Least recently used selection
//!
//! The `lru` strategy remembers when each pool was last chosen in a table
//! shared by all `lru` partitions of the process, so reconfiguring a
//! partition does not reset its fairness history. Selection scans the
//! candidates for the oldest time and then swaps in a new time from a
//! counter that only moves forward, but only if the pool's time is still the
//! one the scan saw. A caller that loses the race scans again. No lock is
//! held across the decision, so a slow caller never stalls the others.
//!
//! Pools that were never chosen are given a random negative time on every
//! scan. They are always preferred over pools that were chosen, and among
//! themselves they are picked in random order.
//!
//! ## Selecting and engaging
//!
//! A door obtains a pool with a
//! [`PoolManagerAdapterProxy`](adapter/struct.PoolManagerAdapterProxy.html).
//! For every request it asks the pool manager to select a pool and then
//! asks that pool to start a mover for the file:
//!
//! ```text
//!   SelectingPool ---> EngagingPool ---> Done
//!        ^  |               |
//!        |  |  transient    | transient
//!        +--+ <-------------+
//!        |
//!        +---> TimedOut (budget spent), Failed (any other error)
//! ```
//!
//! Both steps are bounded by a budget given by the caller. Every wait is
//! charged to the budget with the time it actually took. When the budget is
//! spent the request fails with
//! [`Error::InternalTimeout`](error/enum.Error.html), which is distinct from
//! the timeouts of the individual calls.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use slog::{o, Drain, Logger};
//!
//! use poolmanager::adapter::types::AdapterOptions;
//! use poolmanager::adapter::PoolManagerAdapterProxy;
//! use poolmanager::file::{FileAttributes, ProtocolInfo};
//!
//! let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
//! let log = Logger::root(
//!     Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
//!     o!("build-id" => "0.1.0"),
//! );
//!
//! let options = AdapterOptions {
//!     pool_timeout: Some(5000),
//!     log: Some(log),
//!     ..Default::default()
//! };
//!
//! // Any CellEndpoint implementation routing to the pool manager
//! let proxy = PoolManagerAdapterProxy::new(options, endpoint);
//!
//! let file = FileAttributes::new("0000A4B1C9".into(), 1 << 20);
//! let engagement = proxy.write_pool(
//!     &file,
//!     &ProtocolInfo::new("DCap", 3),
//!     Duration::from_secs(30),
//! )?;
//! println!("writing to {} (mover {})", engagement.pool, engagement.mover_id);
//! ```
//!
//! ## [`Inventory`](inventory/trait.Inventory.html) trait implementer
//!
//! * `poolmanager-static-inventory`

#![allow(missing_docs)]

pub mod adapter;
pub mod cost;
pub mod endpoint;
pub mod error;
pub mod file;
pub mod inventory;
pub mod linkgroup;
pub mod message;
pub mod partition;
pub mod pool;
pub mod pool_manager;
pub mod selection;

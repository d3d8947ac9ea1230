// Copyright 2020 Joyent, Inc.

use std::fmt;
use std::time::Duration;

use derive_more::{Add, AddAssign, Display, From, Into};
use slog::Logger;

use crate::message::CellPath;
use crate::pool::PoolName;
use crate::selection::Assumption;

/// The configuration options for a `PoolManagerAdapterProxy`.
#[derive(Debug, Default)]
pub struct AdapterOptions {
    /// An optional path to the pool manager. If not specified the default is
    /// `PoolManager`.
    pub pool_manager: Option<CellPath>,
    /// An optional timeout in milliseconds for a pool to confirm that it
    /// started a mover. This is a fixed per-call budget, separate from the
    /// overall budget of a request. If not specified the default is 60
    /// seconds.
    pub pool_timeout: Option<u64>,
    /// An optional minimum duration in milliseconds of one retry iteration.
    /// A failed attempt that took less time than this waits out an
    /// exponential backoff interval before trying again. If not specified
    /// the default is 100 milliseconds.
    pub min_retry_delay: Option<u64>,
    /// An optional partition name sent with every selection request. If not
    /// specified the pool manager picks one.
    pub partition: Option<String>,
    /// An optional `slog` logger instance. If none is provided then the
    /// logging will fall back to using the
    /// [`slog-stdlog`](https://docs.rs/slog-stdlog) drain which is
    /// essentially the same as using the rust standard
    /// [`log`](https://docs.rs/log) crate.
    pub log: Option<Logger>,
}

/// Sum type representing the state of one selection and engagement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngagementState {
    /// Waiting for the pool manager to choose a pool.
    SelectingPool,
    /// Waiting for the chosen pool to start a mover.
    EngagingPool,
    /// A pool confirmed the request.
    Done,
    /// A non-retryable error ended the request.
    Failed,
    /// The overall budget ran out.
    TimedOut,
}

impl fmt::Display for EngagementState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngagementState::SelectingPool => {
                String::from("selecting pool").fmt(fmt)
            }
            EngagementState::EngagingPool => {
                String::from("engaging pool").fmt(fmt)
            }
            EngagementState::Done => String::from("done").fmt(fmt),
            EngagementState::Failed => String::from("failed").fmt(fmt),
            EngagementState::TimedOut => String::from("timed out").fmt(fmt),
        }
    }
}

/// A newtype wrapper around u32 used for counting the attempts of a request.
#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    Eq,
    From,
    Into,
    Ord,
    PartialOrd,
    PartialEq,
)]
pub struct AttemptCount(u32);

/// A pool that started a mover for a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Engagement {
    pub pool: PoolName,
    pub address: String,
    pub assumption: Assumption,
    pub mover_id: u64,
    /// How often the pool manager was asked for a pool.
    pub selection_attempts: AttemptCount,
    /// How often a pool was asked to start a mover.
    pub engagement_attempts: AttemptCount,
    /// The wall clock time the request took.
    pub elapsed: Duration,
}

// Copyright 2020 Joyent, Inc.

//! The client side of pool selection: ask the pool manager for a pool, then
//! ask that pool to serve the file.

pub mod types;

use std::thread;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use slog::{debug, error, info, o, warn, Drain, Logger};

use crate::adapter::types::{
    AdapterOptions, AttemptCount, Engagement, EngagementState,
};
use crate::endpoint::CellEndpoint;
use crate::error::Error;
use crate::file::{FileAttributes, ProtocolInfo};
use crate::message::{
    CellPath, IoDirection, Message, PoolIoRequest, SelectPoolReply,
    SelectPoolRequest,
};

// Default name of the pool manager cell
const DEFAULT_POOL_MANAGER: &str = "PoolManager";
// Pool reply timeout in milliseconds
const DEFAULT_POOL_TIMEOUT: u64 = 60_000;
// Minimum retry iteration in milliseconds
const DEFAULT_MIN_RETRY_DELAY: u64 = 100;
// Longest backoff pause in milliseconds
const MAX_RETRY_DELAY: u64 = 10_000;

/// Selects and engages pools on behalf of door cells.
///
/// Each request runs the state machine of
/// [`EngagementState`](types/enum.EngagementState.html) on the calling
/// thread: select a pool, ask it to start a mover, and on a transient
/// failure start over, until a pool confirms or the caller's budget is
/// spent. The budget is charged with the measured duration of every call.
pub struct PoolManagerAdapterProxy<E>
where
    E: CellEndpoint,
{
    endpoint: E,
    pool_manager: CellPath,
    pool_timeout: Duration,
    min_retry_delay: Duration,
    partition: Option<String>,
    log: Logger,
}

impl<E> PoolManagerAdapterProxy<E>
where
    E: CellEndpoint,
{
    pub fn new(options: AdapterOptions, endpoint: E) -> Self {
        let log = options.log.unwrap_or_else(|| {
            Logger::root(slog_stdlog::StdLog.fuse(), o!())
        });

        PoolManagerAdapterProxy {
            endpoint,
            pool_manager: options
                .pool_manager
                .unwrap_or_else(|| CellPath::new(DEFAULT_POOL_MANAGER)),
            pool_timeout: Duration::from_millis(
                options.pool_timeout.unwrap_or(DEFAULT_POOL_TIMEOUT),
            ),
            min_retry_delay: Duration::from_millis(
                options.min_retry_delay.unwrap_or(DEFAULT_MIN_RETRY_DELAY),
            ),
            partition: options.partition,
            log,
        }
    }

    pub fn pool_manager(&self) -> &CellPath {
        &self.pool_manager
    }

    /// Find a pool to read `file` from and have it start a mover, within
    /// `timeout`.
    pub fn read_pool(
        &self,
        file: &FileAttributes,
        protocol: &ProtocolInfo,
        timeout: Duration,
    ) -> Result<Engagement, Error> {
        self.select_and_engage(IoDirection::Read, file, protocol, timeout)
    }

    /// Find a pool to write `file` to and have it start a mover, within
    /// `timeout`.
    pub fn write_pool(
        &self,
        file: &FileAttributes,
        protocol: &ProtocolInfo,
        timeout: Duration,
    ) -> Result<Engagement, Error> {
        self.select_and_engage(IoDirection::Write, file, protocol, timeout)
    }

    fn select_and_engage(
        &self,
        direction: IoDirection,
        file: &FileAttributes,
        protocol: &ProtocolInfo,
        timeout: Duration,
    ) -> Result<Engagement, Error> {
        let started = Instant::now();
        let mut remaining = timeout;
        let mut state = EngagementState::SelectingPool;
        let mut selected: Option<SelectPoolReply> = None;
        let mut outcome: Option<Result<Engagement, Error>> = None;
        let mut selection_attempts = AttemptCount::from(0);
        let mut engagement_attempts = AttemptCount::from(0);
        let mut backoff = self.backoff();

        loop {
            debug!(self.log, "{} request for {}: {}", direction,
                file.pnfs_id, state;
                "remaining_ms" => remaining.as_millis() as u64);

            match state {
                EngagementState::SelectingPool => {
                    if remaining == Duration::from_millis(0) {
                        state = EngagementState::TimedOut;
                        continue;
                    }
                    selection_attempts += 1.into();

                    let request = Message::SelectPool(SelectPoolRequest {
                        direction,
                        file: file.clone(),
                        protocol: protocol.clone(),
                        partition: self.partition.clone(),
                    });
                    let call = Instant::now();
                    let result = self.endpoint.send_and_wait(
                        &self.pool_manager,
                        request,
                        remaining,
                    );
                    let elapsed = call.elapsed();
                    remaining =
                        remaining.checked_sub(elapsed).unwrap_or_default();

                    match result {
                        Ok(Message::SelectPoolReply(reply))
                            if reply.pnfs_id == file.pnfs_id =>
                        {
                            debug!(self.log, "pool manager selected {}",
                                reply.pool);
                            selected = Some(reply);
                            state = EngagementState::EngagingPool;
                        }
                        Ok(Message::SelectPoolReply(reply)) => {
                            outcome = Some(Err(Error::ProtocolViolation(
                                format!(
                                    "selection for {} answered for {}",
                                    file.pnfs_id, reply.pnfs_id
                                ),
                            )));
                            state = EngagementState::Failed;
                        }
                        Ok(other) => {
                            outcome = Some(Err(Error::ProtocolViolation(
                                format!(
                                    "unexpected {} reply to pool selection",
                                    other.kind()
                                ),
                            )));
                            state = EngagementState::Failed;
                        }
                        Err(e) if is_retryable(&e, direction) => {
                            warn!(self.log, "pool selection for {} failed, \
                                retrying: {}", file.pnfs_id, e);
                            self.pause(elapsed, &mut backoff, &mut remaining);
                        }
                        Err(e) => {
                            outcome = Some(Err(e));
                            state = EngagementState::Failed;
                        }
                    }
                }
                EngagementState::EngagingPool => {
                    if remaining == Duration::from_millis(0) {
                        state = EngagementState::TimedOut;
                        continue;
                    }
                    let reply = match selected.take() {
                        Some(reply) => reply,
                        None => {
                            state = EngagementState::SelectingPool;
                            continue;
                        }
                    };
                    engagement_attempts += 1.into();

                    let path = self.pool_manager.plus(&reply.address);
                    let request = Message::PoolIo(PoolIoRequest {
                        direction,
                        pool: reply.pool.clone(),
                        file: file.clone(),
                        protocol: protocol.clone(),
                        assumption: reply.assumption.clone(),
                    });
                    let call = Instant::now();
                    let result = self.endpoint.send_and_wait(
                        &path,
                        request,
                        self.pool_timeout.min(remaining),
                    );
                    let elapsed = call.elapsed();
                    remaining =
                        remaining.checked_sub(elapsed).unwrap_or_default();

                    match result {
                        Ok(Message::PoolIoReply(io))
                            if io.pool == reply.pool
                                && io.pnfs_id == file.pnfs_id =>
                        {
                            outcome = Some(Ok(Engagement {
                                pool: io.pool,
                                address: reply.address,
                                assumption: reply.assumption,
                                mover_id: io.mover_id,
                                selection_attempts,
                                engagement_attempts,
                                elapsed: started.elapsed(),
                            }));
                            state = EngagementState::Done;
                        }
                        Ok(Message::PoolIoReply(io)) => {
                            outcome = Some(Err(Error::ProtocolViolation(
                                format!(
                                    "pool {} confirmed {} on {}",
                                    reply.pool, io.pnfs_id, io.pool
                                ),
                            )));
                            state = EngagementState::Failed;
                        }
                        Ok(other) => {
                            outcome = Some(Err(Error::ProtocolViolation(
                                format!(
                                    "unexpected {} reply from pool {}",
                                    other.kind(),
                                    reply.pool
                                ),
                            )));
                            state = EngagementState::Failed;
                        }
                        Err(e) if is_retryable(&e, direction) => {
                            warn!(self.log, "pool {} failed to start a \
                                mover, selecting again: {}", reply.pool, e);
                            self.pause(elapsed, &mut backoff, &mut remaining);
                            state = EngagementState::SelectingPool;
                        }
                        Err(e) => {
                            outcome = Some(Err(e));
                            state = EngagementState::Failed;
                        }
                    }
                }
                EngagementState::TimedOut => {
                    outcome = Some(Err(Error::InternalTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                        attempts: selection_attempts.into(),
                    }));
                    break;
                }
                EngagementState::Done | EngagementState::Failed => break,
            }
        }

        match outcome {
            Some(Ok(engagement)) => {
                info!(self.log, "{} of {} engaged on {}", direction,
                    file.pnfs_id, engagement.pool;
                    "mover" => engagement.mover_id,
                    "selections" => u32::from(selection_attempts),
                    "engagements" => u32::from(engagement_attempts));
                Ok(engagement)
            }
            Some(Err(e)) => {
                error!(self.log, "{} of {} {}: {}", direction, file.pnfs_id,
                    state, e;
                    "selections" => u32::from(selection_attempts),
                    "engagements" => u32::from(engagement_attempts));
                Err(e)
            }
            None => Err(Error::InternalTimeout {
                timeout_ms: timeout.as_millis() as u64,
                attempts: selection_attempts.into(),
            }),
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.min_retry_delay,
            initial_interval: self.min_retry_delay,
            max_interval: Duration::from_millis(MAX_RETRY_DELAY)
                .max(self.min_retry_delay),
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    // An attempt shorter than the minimum retry delay waits out a backoff
    // interval, charged to the budget like any call.
    fn pause(
        &self,
        elapsed: Duration,
        backoff: &mut ExponentialBackoff,
        remaining: &mut Duration,
    ) {
        if elapsed >= self.min_retry_delay {
            return;
        }
        let interval = backoff
            .next_backoff()
            .unwrap_or(self.min_retry_delay)
            .min(*remaining);
        if interval == Duration::from_millis(0) {
            return;
        }

        let sleep = Instant::now();
        thread::sleep(interval);
        *remaining = remaining.checked_sub(sleep.elapsed()).unwrap_or_default();
    }
}

// Errors worth a new selection, from the pool manager or from a pool. "File
// not in cache" is only worth waiting out on reads; a write cannot be helped
// by a replication or a stage.
fn is_retryable(error: &Error, direction: IoDirection) -> bool {
    match error {
        Error::NoRoute(_) | Error::Timeout(_) => true,
        Error::FileNotInCache(_) => direction == IoDirection::Read,
        _ => false,
    }
}

// Copyright 2020 Joyent, Inc.

use std::time::Duration;

use crate::error::Error;
use crate::message::{CellPath, Message};

/// Message endpoint
///
/// The `CellEndpoint` trait is the interface to the messaging system the pool
/// manager and the pools are reached through. The transport itself is
/// outside this crate; an implementation need only deliver a message along a
/// path and hand back the reply.
///
/// Implementations must fail with `Error::Timeout` if no reply arrives
/// within `timeout`, and with `Error::NoRoute` if the destination cannot be
/// reached. Failures reported by the remote side are passed through as the
/// matching `Error` (for instance `Error::FileNotInCache`).
pub trait CellEndpoint: Send + Sync {
    fn send_and_wait(
        &self,
        path: &CellPath,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, Error>;
}

impl<T: CellEndpoint + ?Sized> CellEndpoint for std::sync::Arc<T> {
    fn send_and_wait(
        &self,
        path: &CellPath,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, Error> {
        (**self).send_and_wait(path, message, timeout)
    }
}

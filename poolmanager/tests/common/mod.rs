// Copyright 2020 Joyent, Inc.

#![allow(dead_code)]

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use slog::{o, Drain, Level, LevelFilter, Logger};

use poolmanager::pool::{
    PoolCostInfo, PoolInfo, PoolQueueInfo, PoolSpaceInfo, HOSTNAME_TAG,
};

pub const LOG_LEVEL_ENV_VAR: &str = "POOLMANAGER_LOG_LEVEL";

pub fn parse_log_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::Trace),
        "debug" => Some(Level::Debug),
        "info" => Some(Level::Info),
        "warning" => Some(Level::Warning),
        "error" => Some(Level::Error),
        "critical" => Some(Level::Critical),
        _ => None,
    }
}

pub fn standard_log(l: Level) -> Logger {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    Logger::root(
        Mutex::new(LevelFilter::new(
            slog_term::FullFormat::new(plain).build(),
            l,
        ))
        .fuse(),
        o!("build-id" => env!("CARGO_PKG_VERSION")),
    )
}

/// A terminal logger at the level named by `POOLMANAGER_LOG_LEVEL`, or at
/// `default_level` if the variable is unset or unrecognized.
pub fn log_from_env(default_level: Level) -> Logger {
    let level = env::var(LOG_LEVEL_ENV_VAR)
        .ok()
        .and_then(|s| parse_log_level(&s))
        .unwrap_or(default_level);
    standard_log(level)
}

pub fn pool(name: &str, host: &str, free: u64, load: u32) -> PoolInfo {
    let mut tags = HashMap::new();
    tags.insert(HOSTNAME_TAG.to_string(), host.to_string());
    PoolInfo::new(
        name.into(),
        format!("{}@{}Domain", name, name),
        PoolCostInfo {
            space: PoolSpaceInfo {
                total: free.max(1000),
                free,
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

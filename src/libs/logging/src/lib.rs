// Copyright (c) 2023 The SR-IOV utils contributors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::io::Write;
use std::process;
use std::result;
use std::sync::Arc;

use arc_swap::ArcSwap;
use slog::{o, Drain};

const LOG_LEVELS: &[(&str, slog::Level)] = &[
    ("trace", slog::Level::Trace),
    ("debug", slog::Level::Debug),
    ("info", slog::Level::Info),
    ("warn", slog::Level::Warning),
    ("error", slog::Level::Error),
    ("critical", slog::Level::Critical),
];

const ASYNC_THREAD_NAME: &str = "slog-async-logger";

/// Declare a crate local `$name!()` macro returning the scoped logger
/// tagged with `subsystem = $subsystem`.
///
/// Must be invoked at the crate root before any `mod` that uses it.
#[macro_export]
macro_rules! logger_with_subsystem {
    ($name: ident, $subsystem: expr) => {
        macro_rules! $name {
            () => {
                slog_scope::logger().new(slog::o!("subsystem" => $subsystem))
            };
        }
    };
}

/// Changes the level of a logger built by this crate while it is running.
#[derive(Clone, Debug)]
pub struct LevelHandle {
    level: Arc<ArcSwap<slog::Level>>,
}

impl LevelHandle {
    fn new(level: slog::Level) -> Self {
        LevelHandle {
            level: Arc::new(ArcSwap::from_pointee(level)),
        }
    }

    pub fn level(&self) -> slog::Level {
        **self.level.load()
    }

    pub fn set_level(&self, level: slog::Level) {
        self.level.store(Arc::new(level));
    }
}

// Drops records below the level currently held by the handle.
struct RuntimeLevelFilter<D> {
    drain: D,
    handle: LevelHandle,
}

impl<D> RuntimeLevelFilter<D> {
    fn new(drain: D, handle: LevelHandle) -> Self {
        RuntimeLevelFilter { drain, handle }
    }
}

impl<D> Drain for RuntimeLevelFilter<D>
where
    D: Drain,
{
    type Ok = Option<D::Ok>;
    type Err = Option<D::Err>;

    fn log(
        &self,
        record: &slog::Record,
        values: &slog::OwnedKVList,
    ) -> result::Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.handle.level()) {
            self.drain.log(record, values).map(Some).map_err(Some)
        } else {
            Ok(None)
        }
    }
}

/// Creates a logger which prints output as human readable text to the terminal.
pub fn create_term_logger(level: slog::Level) -> (slog::Logger, slog_async::AsyncGuard) {
    let term_drain = slog_term::term_compact().fuse();

    let (async_drain, guard) = slog_async::Async::new(term_drain)
        .thread_name(ASYNC_THREAD_NAME.into())
        .build_with_guard();

    // Filter before queueing so a level change applies to the next record.
    let filter_drain = RuntimeLevelFilter::new(async_drain.fuse(), LevelHandle::new(level)).fuse();

    let logger = slog::Logger::root(filter_drain, o!());

    (logger, guard)
}

/// Creates a logger which prints output as JSON.
///
/// The returned guard flushes pending records when dropped, so it must
/// outlive every use of the logger.
pub fn create_logger<W>(
    name: &str,
    source: &str,
    level: slog::Level,
    writer: W,
) -> (slog::Logger, slog_async::AsyncGuard)
where
    W: Write + Send + Sync + 'static,
{
    let (logger, _, guard) = create_logger_with_handle(name, source, level, writer);
    (logger, guard)
}

/// Same as [`create_logger`] but also returns a [`LevelHandle`] so the
/// caller can raise or lower the level later.
pub fn create_logger_with_handle<W>(
    name: &str,
    source: &str,
    level: slog::Level,
    writer: W,
) -> (slog::Logger, LevelHandle, slog_async::AsyncGuard)
where
    W: Write + Send + Sync + 'static,
{
    let json_drain = slog_json::Json::new(writer)
        .add_default_keys()
        .build()
        .fuse();

    let (async_drain, guard) = slog_async::Async::new(json_drain)
        .thread_name(ASYNC_THREAD_NAME.into())
        .build_with_guard();

    let handle = LevelHandle::new(level);
    let filter_drain = RuntimeLevelFilter::new(async_drain.fuse(), handle.clone()).fuse();

    let logger = slog::Logger::root(
        filter_drain,
        o!("version" => env!("CARGO_PKG_VERSION"),
            "pid" => process::id().to_string(),
            "name" => name.to_string(),
            "source" => source.to_string()),
    );

    (logger, handle, guard)
}

pub fn get_log_levels() -> Vec<&'static str> {
    LOG_LEVELS.iter().map(|(name, _)| *name).collect()
}

pub fn level_name_to_slog_level(level_name: &str) -> Result<slog::Level, String> {
    LOG_LEVELS
        .iter()
        .find(|(name, _)| *name == level_name)
        .map(|(_, level)| *level)
        .ok_or_else(|| format!("invalid log level: {:?}", level_name))
}

pub fn slog_level_to_level_name(level: slog::Level) -> Result<&'static str, &'static str> {
    LOG_LEVELS
        .iter()
        .find(|(_, l)| *l == level)
        .map(|(name, _)| *name)
        .ok_or("invalid slog level")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use slog::{debug, info};
    use std::fs;

    fn read_records(path: &std::path::Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_level_name_conversions() {
        for name in get_log_levels() {
            let level = level_name_to_slog_level(name).unwrap();
            assert_eq!(slog_level_to_level_name(level).unwrap(), name);
        }

        assert!(level_name_to_slog_level("").is_err());
        assert!(level_name_to_slog_level("foo").is_err());
        assert!(level_name_to_slog_level("WARN").is_err());
    }

    #[test]
    fn test_create_logger_writes_json() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let writer = file.reopen().unwrap();

        let (logger, guard) = create_logger("sriov-test", "unit", slog::Level::Info, writer);
        let logger = logger.new(o!("subsystem" => "provider"));

        info!(logger, "created virtual functions"; "address" => "0000:01:00.0");
        debug!(logger, "filtered out");

        drop(logger);
        drop(guard);

        let records = read_records(file.path());
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record["msg"], "created virtual functions");
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["name"], "sriov-test");
        assert_eq!(record["source"], "unit");
        assert_eq!(record["subsystem"], "provider");
        assert_eq!(record["address"], "0000:01:00.0");
        assert_eq!(record["pid"], process::id().to_string());
    }

    #[test]
    fn test_level_handle_changes_level_at_runtime() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let writer = file.reopen().unwrap();

        let (logger, handle, guard) =
            create_logger_with_handle("sriov-test", "unit", slog::Level::Info, writer);
        assert_eq!(handle.level(), slog::Level::Info);

        debug!(logger, "dropped");
        handle.set_level(slog::Level::Debug);
        debug!(logger, "kept");
        handle.set_level(slog::Level::Error);
        info!(logger, "dropped again");

        drop(logger);
        drop(guard);

        let records = read_records(file.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["msg"], "kept");
        assert_eq!(records[0]["level"], "DEBG");
    }
}

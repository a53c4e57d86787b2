//! provides logging helpers

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Directory for rolling log files. Logs go to stderr when unset.
pub const LOG_PATH_ENV_VAR: &str = "LOG_PATH";

const LOG_FILE_PREFIX: &str = "kube-resource-checker.log";

/// initiate the global tracing subscriber
///
/// `default_level` applies when `RUST_LOG` is not set. The returned guard must
/// be held until exit so buffered file output gets flushed.
pub fn init(default_level: filter::LevelFilter) -> Option<WorkerGuard> {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let log_path = std::env::var(LOG_PATH_ENV_VAR).ok();
    match log_path.as_deref().and_then(file_appender) {
        Some(appender) => {
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            let fmt_layer = layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter);
            registry().with(fmt_layer).init();
            Some(file_guard)
        }
        None => {
            let fmt_layer = layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(env_filter);
            registry().with(fmt_layer).init();
            None
        }
    }
}

fn file_appender(dir: &str) -> Option<RollingFileAppender> {
    let dir = Path::new(dir);
    match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(3)
        .build(dir)
    {
        Ok(appender) => Some(appender),
        Err(e) => {
            eprintln!(
                "failed to open log directory {}: {e}, logging to stderr",
                dir.display()
            );
            None
        }
    }
}

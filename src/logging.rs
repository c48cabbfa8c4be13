//! `tracing` wiring for binaries (§AMBIENT STACK: Logging). Library
//! consumers install their own subscriber; this helper exists only for
//! `main.rs` and integration tooling, matching the teacher's
//! `src/tracing/mod.rs` init convention.

use std::path::PathBuf;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// When set, logs are additionally written to a daily-rolling file
    /// under this directory (e.g. for a long-lived `watch.start` session).
    pub log_dir: Option<PathBuf>,
}

/// Installs a global `tracing` subscriber reading verbosity from
/// `OTTERINDEX_LOG`, falling back to `RUST_LOG`, falling back to `info`.
/// Returns the non-blocking file appender's guard when `log_dir` is set —
/// callers must keep it alive for the process lifetime or buffered lines
/// are lost on exit.
pub fn init(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("OTTERINDEX_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "otterindex.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

//! Logging initialization with file output support
//!
//! Console and `bastion.log` follow `RUST_LOG` (default `info`). When a log
//! directory is configured, [`security_log`](crate::security_log) events are
//! also written to `security.log`, which ignores `RUST_LOG` so the audit
//! trail cannot be filtered away.

use std::path::PathBuf;

use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::security_log;

const LOG_FILE_NAME: &str = "bastion.log";
const SECURITY_LOG_FILE_NAME: &str = "security.log";
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn security_filter() -> Targets {
    Targets::new().with_target(security_log::TARGET, Level::INFO)
}

/// Audit layer: security events only, one line each, no ANSI colors.
fn security_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(security_filter())
}

/// Initialize logging with optional file output.
/// Returns the guards that must be kept alive for the duration of the program.
pub fn init_logging(log_dir: Option<PathBuf>) -> Vec<WorkerGuard> {
    let console_layer = fmt::layer().with_target(true).with_filter(env_filter());

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(console_layer).init();
        return Vec::new();
    };

    // Daily rotating log files
    let (general, general_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE_NAME));
    let (audit, audit_guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
        &dir,
        SECURITY_LOG_FILE_NAME,
    ));

    let file_layer = fmt::layer()
        .with_writer(general)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(security_layer(audit))
        .init();

    vec![general_guard, audit_guard]
}

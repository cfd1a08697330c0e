//! Logging setup.

use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the file log writer alive. Buffered lines are flushed when dropped.
#[allow(missing_copy_implementations)]
#[derive(Debug)]
#[must_use]
pub(crate) struct Trace {
    _file_log_guard: Option<WorkerGuard>,
}

/// Initialize the tracing library, logging to stderr and, with a `log_dir`, to a daily file.
pub(crate) fn initialize(log_dir: Option<&Path>) -> Trace {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let (file_layer, _file_log_guard) = match log_dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "sandbox.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::new()
                .compact()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(non_blocking_file);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            fmt::Layer::new()
                .compact()
                .without_time()
                .with_line_number(true)
                .with_writer(std::io::stderr),
        );

    if let Err(err) = registry.try_init() {
        eprintln!("setting tracing default failed: {err}");
    }
    Trace { _file_log_guard }
}

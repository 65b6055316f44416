use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with a stdout layer and an optional log-file layer.
///
/// - Stdout: compact human-readable output, or JSON lines when `json` is set
/// - File: JSON lines appended to `<log_dir>/botcheck.log` when a directory is given
/// - Default level: INFO (DEBUG for this crate), override via RUST_LOG env
///
/// The returned guard must be held for the lifetime of the process so the
/// non-blocking file writer flushes on exit.
pub fn init(json: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,botcheck=debug"));

    let compact_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .compact()
    });

    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "botcheck.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(compact_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    tracing::debug!("Tracing initialized");
    guard
}

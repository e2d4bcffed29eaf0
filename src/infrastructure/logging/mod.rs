//! Logging infrastructure with optional file output.

use crate::infrastructure::config::paths;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging with console and optional file output.
///
/// `RUST_LOG` overrides the console level. File logs are written to:
/// - macOS: ~/Library/Application Support/follow-approver/logs/
/// - Windows: %APPDATA%\follow-approver\logs\
/// - Linux: ~/.config/follow-approver/logs/
pub fn setup(verbose: bool, log_to_file: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let file_layer = if log_to_file {
        let log_dir = paths::log_dir();

        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
            None
        } else {
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, &log_dir, "follow-approver.log");

            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(file_appender)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
    } else {
        None
    };

    // Option<Layer> is itself a layer; None is a no-op
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if log_to_file {
        tracing::info!("File logging enabled: {:?}", paths::log_dir());
    }
    tracing::debug!("Logging initialized (verbose={})", verbose);
}

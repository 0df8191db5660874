// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! Uses `env_logger` under the hood with a compact single-line format so
//! that progress output can be redirected to a log file.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes the logging subsystem
///
/// # Configuration
/// - Logs to stdout
/// - Default log level: Info, or Debug when `verbose` is set
/// - `RUST_LOG` overrides the default when present
pub fn init_logging(verbose: bool) {
    let mut builder = common_log_config();

    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    }

    // A second initialization (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}

/// Creates and configures a base logger builder with common settings
///
/// # Features
/// - Custom log format including:
///   - Timestamp (seconds since epoch)
///   - Log level
///   - Module path
///   - Line number
///   - Message
/// - Output to stdout
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}

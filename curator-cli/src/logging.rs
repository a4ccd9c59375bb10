// ============================================================================
// curator-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: env_logger initialisation for the CLI
//
// The application uses env_logger with the RUST_LOG environment variable:
// - RUST_LOG unset: info, or debug with --verbose
// - RUST_LOG=debug: rendered ffmpeg command lines and per-stage details
// - RUST_LOG=trace: everything

use env_logger::{Builder, Env};
use std::io::Write;

/// Initialises the global logger; RUST_LOG overrides the default level.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                get_timestamp(),
                record.level(),
                record.args()
            )
        })
        .init();
}

/// Returns the current local time formatted as "YYYY-MM-DD HH:MM:SS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

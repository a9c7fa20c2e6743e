//! Command-line interface: argument parsing and logger setup

pub mod args;

pub use args::{Args, Command};

use std::io::Write;

/// Initialize `env_logger` with `<timestamp> - <message>` lines.
///
/// `RUST_LOG` overrides the default level (`info`, or `warn` when quiet).
pub fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "{} - {}", buf.timestamp_millis(), record.args()))
        .init();
}

//! stderr logging for the binary.
//!
//! Library crates log through the `log` facade; this installs a
//! `tracing-subscriber` formatter that also captures those records.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a full filter directive, e.g. `voteflow_pipeline=debug`.
pub const LOG_ENV: &str = "VOTEFLOW_LOG";

fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// `VOTEFLOW_LOG` wins over `-v` flags when set.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .without_time()
        .try_init();
}

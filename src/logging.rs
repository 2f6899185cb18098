//! tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins over `verbosity` (0 info, 1 debug, 2+ trace). Calling this
/// again after a subscriber is installed does nothing.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr).with_target(false))
        .try_init();

    if result.is_ok() {
        tracing::debug!(verbosity, "logging initialized");
    }
}

//! Tracing subscriber setup.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Filter directive for a verbosity level.
///
/// `quiet` wins over any verbosity.
pub fn filter_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "info,buddy=info",
        1 => "info,buddy=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` overrides the verbosity flags when set. Calling this more than
/// once is a no-op.
pub fn init(verbosity: u8, quiet: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity, quiet)));

        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_err()
        {
            eprintln!("buddy: a tracing subscriber was already installed");
        }
    });
}

//! Tracing setup for the host binary

use silo_config::defaults;
use silo_config::EnvSource;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,silo_host::dashboard=warn,silo_host::telemetry=warn";

/// Install the global subscriber: `RUST_LOG` filtering, JSON output when
/// `SILO_LOG_FORMAT=json`
pub fn init(env: &dyn EnvSource) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if json_output(env) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    }
}

fn json_output(env: &dyn EnvSource) -> bool {
    env.var(defaults::env::LOG_FORMAT)
        .is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}

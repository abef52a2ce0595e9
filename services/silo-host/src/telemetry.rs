//! Telemetry consumers

use crate::builder::SiloBuilder;
use crate::error::{HostError, Result};
use crate::settings::TelemetryConsumer;
use silo_config::SiloConfig;
use tracing::{debug, info};

/// Performance counter collector for the platform the host runs on, if any
pub fn platform_collector() -> Option<TelemetryConsumer> {
    if cfg!(target_os = "linux") {
        Some(TelemetryConsumer::LinuxPerfCounters)
    } else if cfg!(target_os = "windows") {
        Some(TelemetryConsumer::WindowsPerfCounters)
    } else {
        None
    }
}

/// Add the Application Insights consumer and the platform collector when
/// an instrumentation key is configured
pub fn configure_telemetry<B>(builder: &mut B, silo: &SiloConfig) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    let Some(key) = silo.telemetry_key() else {
        return Ok(());
    };

    let insights = TelemetryConsumer::ApplicationInsights {
        instrumentation_key: key.to_string(),
    };
    let collector = platform_collector();
    if collector.is_none() {
        debug!("No performance counter collector for this platform");
    }

    for consumer in std::iter::once(insights).chain(collector) {
        let collector = consumer.driver().to_string();
        builder
            .add_telemetry(consumer)
            .map_err(|e| HostError::TelemetryLoadFailed {
                collector: collector.clone(),
                reason: e.to_string(),
            })?;
        info!("Telemetry consumer {} enabled", collector);
    }
    Ok(())
}

//! Silo host entry point

use silo_config::ProcessEnv;
use silo_host::{logging, HostAssembly};
use silo_plugin::ModuleExports;
use std::sync::Arc;
use tracing::{error, info};

/// The host binary ships no registration delegates of its own
fn host_exports() -> ModuleExports {
    ModuleExports::builder("silo-host").build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&ProcessEnv)?;

    info!("Starting silo host");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut assembly = HostAssembly::new(Arc::new(ProcessEnv));
    if let Ok(exe) = std::env::current_exe() {
        assembly = assembly.with_main_module(exe, host_exports);
    }

    let host = match assembly.build(&args) {
        Ok(host) => host,
        Err(e) => {
            error!("Host assembly failed: {}", e);
            return Err(e.into());
        }
    };

    let report = host.run().await;
    if !report.is_clean() {
        anyhow::bail!("{} isolation context(s) failed to release", report.failures.len());
    }

    info!("Silo host stopped");
    Ok(())
}

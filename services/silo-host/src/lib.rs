//! # Silo Host
//!
//! Bootstrap for a virtual-actor silo: layers configuration, loads grain
//! modules into isolated contexts, wires exactly one storage/clustering
//! backend and returns a host ready to run.
//!
//! ## Architecture
//!
//! ```text
//! args + env + hostsettings*.json
//!          │
//!          ▼
//!    HostAssembly ──► SiloBuilder ──► SiloHost ──► run / shutdown
//!          │              ▲
//!          ├── endpoint ──┤
//!          ├── provider ──┤   (MongoDB | SQLDB | MYSQL | InMemory | localhost)
//!          ├── modules  ──┤   (application parts + service callbacks)
//!          ├── telemetry ─┤
//!          └── dashboard ─┘
//! ```
//!
//! Every step reports failures through [`HostError`]; the first one aborts
//! assembly.

pub mod assembly;
pub mod builder;
pub mod dashboard;
pub mod endpoint;
pub mod error;
pub mod host;
pub mod logging;
pub mod provider;
pub mod recording;
pub mod settings;
pub mod telemetry;

pub use assembly::{assemble, AssembledModules, AssemblyContext, HostAssembly};
pub use builder::{Driver, DriverError, DriverRegistry, SiloBuilder, SiloHostBuilder};
pub use dashboard::{DashboardReminders, InMemoryReminderTable, ReminderEntry, ReminderTable};
pub use endpoint::{endpoint_binding, is_running_in_container, EndpointBinding};
pub use error::{BackendPurpose, HostError, Result};
pub use host::SiloHost;
pub use provider::configure_backend;
pub use recording::{BuilderCall, RecordingSiloBuilder};
pub use settings::SiloSettings;
pub use telemetry::{configure_telemetry, platform_collector};

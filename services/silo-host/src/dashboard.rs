//! Monitoring dashboard
//!
//! The dashboard's reminder view reads the reminder table directly. When
//! no table is registered (or the read fails) the view shows no rows
//! instead of failing the page.

use crate::builder::SiloBuilder;
use crate::error::{HostError, Result};
use crate::settings::DashboardSettings;
use parking_lot::RwLock;
use serde::Serialize;
use silo_config::DashboardOption;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Wire the dashboard when `Orleans:Dashboard:Enable` is set
pub fn configure_dashboard<B>(builder: &mut B, dashboard: &DashboardOption) -> Result<()>
where
    B: SiloBuilder + ?Sized,
{
    if !dashboard.enable {
        debug!("Dashboard disabled");
        return Ok(());
    }

    builder
        .use_dashboard(DashboardSettings { port: dashboard.port })
        .map_err(|e| HostError::DashboardLoadFailed { reason: e.to_string() })?;
    info!("Dashboard enabled on port {}", dashboard.port);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderEntry {
    pub grain_id: String,
    pub reminder_name: String,
    pub start_at: SystemTime,
    pub period_secs: u64,
}

#[derive(Debug, Error)]
#[error("Reminder table read failed: {0}")]
pub struct ReminderReadError(pub String);

pub trait ReminderTable: Send + Sync {
    fn read_rows(&self) -> std::result::Result<Vec<ReminderEntry>, ReminderReadError>;
}

/// Reminder table backing the in-memory reminder service
#[derive(Debug, Default)]
pub struct InMemoryReminderTable {
    rows: RwLock<Vec<ReminderEntry>>,
}

impl InMemoryReminderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by grain id and reminder name
    pub fn upsert(&self, entry: ReminderEntry) {
        let mut rows = self.rows.write();
        match rows
            .iter_mut()
            .find(|row| row.grain_id == entry.grain_id && row.reminder_name == entry.reminder_name)
        {
            Some(row) => *row = entry,
            None => rows.push(entry),
        }
    }

    pub fn remove(&self, grain_id: &str, reminder_name: &str) -> bool {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|row| !(row.grain_id == grain_id && row.reminder_name == reminder_name));
        rows.len() != before
    }
}

impl ReminderTable for InMemoryReminderTable {
    fn read_rows(&self) -> std::result::Result<Vec<ReminderEntry>, ReminderReadError> {
        Ok(self.rows.read().clone())
    }
}

/// Reminder view served by the dashboard
#[derive(Clone, Default)]
pub struct DashboardReminders {
    table: Option<Arc<dyn ReminderTable>>,
}

impl DashboardReminders {
    pub fn new(table: Option<Arc<dyn ReminderTable>>) -> Self {
        Self { table }
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn reminder_rows(&self) -> Vec<ReminderEntry> {
        let Some(table) = &self.table else {
            warn!("No reminder table registered, dashboard shows no reminders");
            return Vec::new();
        };

        table.read_rows().unwrap_or_else(|e| {
            warn!("Dashboard could not read reminders: {}", e);
            Vec::new()
        })
    }
}

impl std::fmt::Debug for DashboardReminders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardReminders")
            .field("has_table", &self.has_table())
            .finish()
    }
}

//! Bulk export, import and reset of the whole register.

use crate::fixtures;
use crate::policy::Action;
use crate::service::LedService;
use crate::session::Session;
use chrono::NaiveDate;
use led_types::{ImportReport, LedError, LedResult, Snapshot};

/// Suggested download name for an export taken on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("led-data-{}.json", date.format("%Y-%m-%d"))
}

impl LedService {
    pub async fn export_data(&self, session: &Session) -> LedResult<Snapshot> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ExportData)?;
        let snapshot = self.store().export_snapshot().await?;
        tracing::info!(
            actor = %actor.employee_id,
            incidents = snapshot.incidents.len(),
            iam_items = snapshot.iam_items.len(),
            "data exported"
        );
        Ok(snapshot)
    }

    /// Pretty-printed export document.
    pub async fn export_json(&self, session: &Session) -> LedResult<String> {
        let snapshot = self.export_data(session).await?;
        serde_json::to_string_pretty(&snapshot).map_err(|e| LedError::Serialization(e.to_string()))
    }

    /// Replace every collection present in `json`. All-or-nothing; see
    /// [`led_store::RecordStore::import_snapshot`].
    pub async fn import_data(&self, session: &Session, json: &str) -> LedResult<ImportReport> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ImportData)?;
        match self.store().import_snapshot(json).await {
            Ok(report) => {
                tracing::info!(actor = %actor.employee_id, ?report, "data imported");
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(actor = %actor.employee_id, error = %e, "data import rejected");
                Err(e)
            }
        }
    }

    /// Erase everything, including the persisted session, then re-seed demo accounts and
    /// business units if seeding is enabled. Incidents and IAM items stay empty.
    pub async fn reset_data(&self, session: &Session) -> LedResult<()> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ResetData)?;
        self.store().clear_all().await?;
        if self.config().seed_demo_data {
            fixtures::seed_if_empty(self.store()).await?;
        }
        tracing::warn!(actor = %actor.employee_id, "all data reset");
        Ok(())
    }
}

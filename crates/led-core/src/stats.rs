//! Dashboard figures over the incidents visible to the caller.

use crate::service::LedService;
use crate::session::Session;
use led_types::{DashboardStats, Incident, IncidentQuery, LedResult};

/// Aggregate `incidents`. Average loss is the mean actual loss, zero when there are none.
pub fn summarize<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> DashboardStats {
    let mut stats = DashboardStats::default();
    for incident in incidents {
        stats.total_incidents += 1;
        if incident.is_open() {
            stats.open_incidents += 1;
        } else {
            stats.closed_incidents += 1;
        }
        if incident.review_status.is_pending() {
            stats.pending_approvals += 1;
        }
        stats.total_potential_loss += incident.potential_loss;
        stats.total_recovery += incident.recovery;
        stats.total_actual_loss += incident.actual_loss;
        *stats
            .incidents_by_month
            .entry(incident.incident_date.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        *stats
            .incidents_by_cause
            .entry(incident.cause_of_accident.to_string())
            .or_insert(0) += 1;
    }
    if stats.total_incidents > 0 {
        stats.average_loss = stats.total_actual_loss / stats.total_incidents as f64;
    }
    stats
}

impl LedService {
    pub async fn dashboard(&self, session: &Session) -> LedResult<DashboardStats> {
        let actor = self.actor(session).await?;
        let visible = self
            .visible_incidents(&actor, &IncidentQuery::default())
            .await?;
        Ok(summarize(visible.iter().map(|v| &v.incident)))
    }
}

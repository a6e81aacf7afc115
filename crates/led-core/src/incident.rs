//! Incident lifecycle: create, edit, review and delete under the access policy.

use crate::policy::{self, Action, Capabilities};
use crate::service::{new_id, LedService};
use crate::session::Session;
use chrono::{Datelike, NaiveDate, Utc};
use led_types::{
    validate_incident, AccidentCause, Incident, IncidentFields, IncidentPatch, IncidentQuery,
    LedError, LedResult, NewIncident, OperationalStatus, PersonSnapshot, ReviewDecision,
    ReviewEvent, ReviewStatus, User,
};
use serde::Serialize;

/// An incident together with what the requesting user may do with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentView {
    #[serde(flatten)]
    pub incident: Incident,
    pub capabilities: Capabilities,
}

impl IncidentView {
    fn new(user: &User, incident: Incident) -> Self {
        let capabilities = policy::for_incident(user, &incident);
        Self {
            incident,
            capabilities,
        }
    }
}

fn validate(fields: &IncidentFields<'_>) -> LedResult<(NaiveDate, NaiveDate, AccidentCause)> {
    validate_incident(fields).map_err(LedError::Validation)
}

fn apply_patch(incident: &mut Incident, patch: IncidentPatch) {
    if let Some(v) = patch.incident_name {
        incident.incident_name = v.trim().to_string();
    }
    if let Some(v) = patch.incident_date {
        incident.incident_date = v;
    }
    if let Some(v) = patch.discovery_date {
        incident.discovery_date = v;
    }
    if let Some(v) = patch.business_unit {
        incident.business_unit = v.trim().to_string();
    }
    if let Some(v) = patch.description {
        incident.description = v;
    }
    if let Some(v) = patch.root_cause {
        incident.root_cause = v;
    }
    if let Some(v) = patch.cause_of_accident {
        incident.cause_of_accident = v;
    }
    if patch.involved_parties.is_some() {
        incident.involved_parties = patch.involved_parties;
    }
    if let Some(v) = patch.potential_loss {
        incident.potential_loss = v;
    }
    if let Some(v) = patch.recovery {
        incident.recovery = v;
    }
    if let Some(v) = patch.recovery_source {
        incident.recovery_source = v;
    }
}

fn position_of(items: &[Incident], id: &str) -> LedResult<usize> {
    items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| LedError::not_found("incident", id))
}

fn matches_query(user: &User, incident: &Incident, query: &IncidentQuery) -> bool {
    if let Some(year) = query.year {
        if incident.incident_date.year() != year {
            return false;
        }
    }
    if user.role == led_types::Role::Administrator {
        if let Some(unit) = query.business_unit.as_deref().map(str::trim) {
            if !unit.is_empty() && incident.business_unit != unit {
                return false;
            }
        }
    }
    if let Some(search) = query.search.as_deref().map(str::trim) {
        if !search.is_empty()
            && !incident
                .incident_name
                .to_lowercase()
                .contains(&search.to_lowercase())
        {
            return false;
        }
    }
    true
}

impl LedService {
    /// Record a new incident. It enters review at `Pending Approval L1`.
    pub async fn create_incident(
        &self,
        session: &Session,
        new: NewIncident,
    ) -> LedResult<IncidentView> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::CreateIncident)?;
        let (incident_date, discovery_date, cause_of_accident) =
            validate(&IncidentFields::from(&new))?;

        let now = Utc::now();
        let mut incident = Incident {
            id: new_id(),
            incident_name: new.incident_name.trim().to_string(),
            incident_date,
            discovery_date,
            business_unit: new.business_unit.trim().to_string(),
            description: new.description,
            root_cause: new.root_cause,
            cause_of_accident,
            involved_parties: new.involved_parties,
            potential_loss: new.potential_loss,
            recovery: new.recovery,
            actual_loss: 0.0,
            recovery_source: new.recovery_source,
            status: new.status.unwrap_or_default(),
            review_status: ReviewStatus::INITIAL,
            created_by: PersonSnapshot::from(&actor),
            review_history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        incident.recompute_actual_loss();
        self.store().add(incident.clone()).await?;

        tracing::info!(
            incident_id = %incident.id,
            actor = %actor.employee_id,
            actual_loss = incident.actual_loss,
            "incident created"
        );
        Ok(IncidentView::new(&actor, incident))
    }

    pub async fn get_incident(&self, session: &Session, id: &str) -> LedResult<IncidentView> {
        let actor = self.actor(session).await?;
        let incident: Incident = self
            .store()
            .find(id)
            .await?
            .ok_or_else(|| LedError::not_found("incident", id))?;
        let view = IncidentView::new(&actor, incident);
        if !view.capabilities.can_view {
            return Err(LedError::unauthorized(format!(
                "incident {} is outside your business unit",
                id
            )));
        }
        Ok(view)
    }

    /// Incidents visible to the caller, narrowed by `query`, in insertion order.
    pub async fn list_incidents(
        &self,
        session: &Session,
        query: &IncidentQuery,
    ) -> LedResult<Vec<IncidentView>> {
        let actor = self.actor(session).await?;
        self.visible_incidents(&actor, query).await
    }

    pub(crate) async fn visible_incidents(
        &self,
        actor: &User,
        query: &IncidentQuery,
    ) -> LedResult<Vec<IncidentView>> {
        let incidents: Vec<Incident> = self.store().get_all().await?;
        Ok(incidents
            .into_iter()
            .filter(|i| matches_query(actor, i, query))
            .map(|i| IncidentView::new(actor, i))
            .filter(|v| v.capabilities.can_view)
            .collect())
    }

    /// Apply a partial edit. The merged incident is validated as a whole before it is stored.
    pub async fn update_incident(
        &self,
        session: &Session,
        id: &str,
        patch: IncidentPatch,
    ) -> LedResult<IncidentView> {
        let actor = self.actor(session).await?;
        let view = self
            .store()
            .mutate(|items: &mut Vec<Incident>| -> LedResult<IncidentView> {
                let pos = position_of(items, id)?;
                if !policy::for_incident(&actor, &items[pos]).can_edit {
                    return Err(LedError::unauthorized(format!(
                        "{} may not edit incident {}",
                        actor.employee_id, id
                    )));
                }
                let mut updated = items[pos].clone();
                apply_patch(&mut updated, patch);
                validate(&IncidentFields::from(&updated))?;
                updated.recompute_actual_loss();
                updated.touch();
                items[pos] = updated.clone();
                Ok(IncidentView::new(&actor, updated))
            })
            .await?;
        tracing::info!(incident_id = %id, actor = %actor.employee_id, "incident updated");
        Ok(view)
    }

    /// Open or close an incident. Independent of the review status.
    pub async fn set_incident_status(
        &self,
        session: &Session,
        id: &str,
        status: OperationalStatus,
    ) -> LedResult<IncidentView> {
        let actor = self.actor(session).await?;
        let view = self
            .store()
            .mutate(|items: &mut Vec<Incident>| -> LedResult<IncidentView> {
                let pos = position_of(items, id)?;
                if !policy::for_incident(&actor, &items[pos]).can_edit {
                    return Err(LedError::unauthorized(format!(
                        "{} may not change the status of incident {}",
                        actor.employee_id, id
                    )));
                }
                let incident = &mut items[pos];
                incident.status = status;
                incident.touch();
                Ok(IncidentView::new(&actor, incident.clone()))
            })
            .await?;
        tracing::info!(incident_id = %id, actor = %actor.employee_id, ?status, "incident status changed");
        Ok(view)
    }

    pub async fn approve_incident(
        &self,
        session: &Session,
        id: &str,
        comment: Option<String>,
    ) -> LedResult<IncidentView> {
        self.review_incident(session, id, ReviewDecision::Approved, comment)
            .await
    }

    pub async fn reject_incident(
        &self,
        session: &Session,
        id: &str,
        comment: Option<String>,
    ) -> LedResult<IncidentView> {
        self.review_incident(session, id, ReviewDecision::Rejected, comment)
            .await
    }

    async fn review_incident(
        &self,
        session: &Session,
        id: &str,
        decision: ReviewDecision,
        comment: Option<String>,
    ) -> LedResult<IncidentView> {
        let actor = self.actor(session).await?;
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let view = self
            .store()
            .mutate(|items: &mut Vec<Incident>| -> LedResult<IncidentView> {
                let pos = position_of(items, id)?;
                let capabilities = policy::for_incident(&actor, &items[pos]);
                if !capabilities.can_view {
                    return Err(LedError::unauthorized(format!(
                        "{} may not view incident {}",
                        actor.employee_id, id
                    )));
                }
                let from = items[pos].review_status;
                let to = from.after(decision)?;
                if !capabilities.can_approve {
                    return Err(LedError::unauthorized(format!(
                        "{} may not {} incident {} in {}",
                        actor.role, decision, id, from
                    )));
                }
                let incident = &mut items[pos];
                incident.review_status = to;
                incident.review_history.push(ReviewEvent {
                    decision,
                    from_status: from,
                    to_status: to,
                    actor: PersonSnapshot::from(&actor),
                    comment,
                    at: Utc::now(),
                });
                incident.touch();
                Ok(IncidentView::new(&actor, incident.clone()))
            })
            .await?;
        tracing::info!(
            incident_id = %id,
            actor = %actor.employee_id,
            %decision,
            review_status = %view.incident.review_status,
            "incident reviewed"
        );
        Ok(view)
    }

    pub async fn delete_incident(&self, session: &Session, id: &str) -> LedResult<()> {
        let actor = self.actor(session).await?;
        self.store()
            .mutate(|items: &mut Vec<Incident>| -> LedResult<()> {
                let pos = position_of(items, id)?;
                let incident = &items[pos];
                if !policy::for_incident(&actor, incident).can_delete {
                    return Err(LedError::unauthorized(format!(
                        "{} may not delete incident {} in {}",
                        actor.employee_id, id, incident.review_status
                    )));
                }
                items.remove(pos);
                Ok(())
            })
            .await?;
        tracing::info!(incident_id = %id, actor = %actor.employee_id, "incident deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedConfig;

    fn new_incident(name: &str, potential: f64, recovery: f64) -> NewIncident {
        NewIncident {
            incident_name: name.to_string(),
            incident_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            discovery_date: NaiveDate::from_ymd_opt(2024, 3, 2),
            business_unit: "Risk Management".to_string(),
            cause_of_accident: Some(AccidentCause::Process),
            potential_loss: potential,
            recovery,
            ..Default::default()
        }
    }

    async fn service() -> LedService {
        let service = LedService::in_memory(LedConfig::default());
        service.bootstrap().await.unwrap();
        service
    }

    #[test]
    fn validation_reports_every_failing_field() {
        let fields = IncidentFields {
            incident_name: "abc",
            incident_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            discovery_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            business_unit: " ",
            cause_of_accident: None,
            potential_loss: -1.0,
            recovery: f64::NAN,
        };
        let Err(LedError::Validation(errors)) = validate(&fields) else {
            panic!("expected validation failure");
        };
        for field in [
            "incidentName",
            "discoveryDate",
            "businessUnit",
            "causeOfAccident",
            "potentialLoss",
            "recovery",
        ] {
            assert!(errors.contains(field), "{}", field);
        }
        assert!(!errors.contains("incidentDate"));
    }

    #[test]
    fn same_day_discovery_is_valid() {
        let mut new = new_incident("Same day discovery", 1.0, 0.0);
        new.discovery_date = new.incident_date;
        assert!(validate(&IncidentFields::from(&new)).is_ok());
    }

    #[tokio::test]
    async fn update_recomputes_loss_and_keeps_creator() {
        let service = service().await;
        let inputter = service.session_for("EMP001").await.unwrap();
        let created = service
            .create_incident(&inputter, new_incident("Payment file mismatch", 1000.0, 0.0))
            .await
            .unwrap();

        let patch = IncidentPatch {
            recovery: Some(250.0),
            ..Default::default()
        };
        let admin = service.session_for("EMP003").await.unwrap();
        let updated = service
            .update_incident(&admin, &created.incident.id, patch)
            .await
            .unwrap();
        assert_eq!(updated.incident.actual_loss, 750.0);
        assert_eq!(updated.incident.created_by.employee_id, "EMP001");
        assert!(updated.incident.updated_at >= created.incident.updated_at);
    }

    #[tokio::test]
    async fn invalid_patch_leaves_store_untouched() {
        let service = service().await;
        let inputter = service.session_for("EMP001").await.unwrap();
        let created = service
            .create_incident(&inputter, new_incident("Vendor invoice duplicated", 10.0, 0.0))
            .await
            .unwrap();
        let patch = IncidentPatch {
            discovery_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..Default::default()
        };
        let err = service
            .update_incident(&inputter, &created.incident.id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(_)));

        let stored = service
            .get_incident(&inputter, &created.incident.id)
            .await
            .unwrap();
        assert_eq!(stored.incident, created.incident);
    }

    #[tokio::test]
    async fn approvers_cannot_create_or_edit() {
        let service = service().await;
        let approver = service.session_for("EMP002").await.unwrap();
        let err = service
            .create_incident(&approver, new_incident("Approver attempt", 1.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)));

        let inputter = service.session_for("EMP001").await.unwrap();
        let created = service
            .create_incident(&inputter, new_incident("Branch cash shortfall", 1.0, 0.0))
            .await
            .unwrap();
        let err = service
            .set_incident_status(&approver, &created.incident.id, OperationalStatus::Closed)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn status_change_does_not_touch_review() {
        let service = service().await;
        let inputter = service.session_for("EMP001").await.unwrap();
        let created = service
            .create_incident(&inputter, new_incident("Unreconciled suspense item", 1.0, 0.0))
            .await
            .unwrap();
        let closed = service
            .set_incident_status(&inputter, &created.incident.id, OperationalStatus::Closed)
            .await
            .unwrap();
        assert_eq!(closed.incident.status, OperationalStatus::Closed);
        assert_eq!(closed.incident.review_status, ReviewStatus::PendingApprovalL1);
    }

    #[tokio::test]
    async fn list_filters_by_year_and_name() {
        let service = service().await;
        let inputter = service.session_for("EMP001").await.unwrap();
        service
            .create_incident(&inputter, new_incident("Card fraud ring", 1.0, 0.0))
            .await
            .unwrap();
        let mut older = new_incident("Legacy batch failure", 1.0, 0.0);
        older.incident_date = NaiveDate::from_ymd_opt(2023, 6, 1);
        older.discovery_date = NaiveDate::from_ymd_opt(2023, 6, 2);
        service.create_incident(&inputter, older).await.unwrap();

        let by_year = service
            .list_incidents(
                &inputter,
                &IncidentQuery {
                    year: Some(2023),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_year.len(), 1);

        let by_name = service
            .list_incidents(
                &inputter,
                &IncidentQuery {
                    search: Some("FRAUD".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].incident.incident_name, "Card fraud ring");
    }

    #[tokio::test]
    async fn hidden_reviewed_incident_is_refused_not_conflicted() {
        let service = service().await;
        let inputter = service.session_for("EMP001").await.unwrap();
        let approver = service.session_for("EMP002").await.unwrap();
        let admin = service.session_for("EMP003").await.unwrap();
        let id = service
            .create_incident(&inputter, new_incident("Duplicate vendor payment", 1.0, 0.0))
            .await
            .unwrap()
            .incident
            .id;
        service.reject_incident(&approver, &id, None).await.unwrap();

        service
            .update_user(
                &admin,
                &approver.user().id,
                led_types::UserPatch {
                    department: Some("Compliance".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = service.approve_incident(&approver, &id, None).await.unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)), "{:?}", err);

        let err = service.approve_incident(&admin, &id, None).await.unwrap_err();
        assert!(matches!(err, LedError::Transition(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn missing_incident_is_not_found() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let err = service.delete_incident(&admin, "nope").await.unwrap_err();
        assert!(matches!(err, LedError::NotFound { .. }));
    }
}

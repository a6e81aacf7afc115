//! Issue and Action Management items: remediation tasks, optionally linked to an incident.
//!
//! The incident link is checked only when it is set. If the incident later closes or is
//! deleted, the item keeps pointing at it.

use crate::policy::Action;
use crate::service::{new_id, non_blank, LedService};
use crate::session::Session;
use crate::IncidentView;
use chrono::Utc;
use led_types::{
    IamItem, IamItemPatch, IamStatus, IamSummary, Incident, IncidentQuery, LedError, LedResult,
    NewIamItem, ValidationErrors, MAX_PROGRESS,
};

fn clamp_progress(value: i64) -> u8 {
    value.clamp(0, i64::from(MAX_PROGRESS)) as u8
}

fn position_of(items: &[IamItem], id: &str) -> LedResult<usize> {
    items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| LedError::not_found("IAM item", id))
}

impl LedService {
    pub async fn list_iam_items(&self, session: &Session) -> LedResult<Vec<IamItem>> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageIamItems)?;
        Ok(self.store().get_all().await?)
    }

    /// Open incidents the caller can see; the candidates for a new item's link.
    pub async fn linkable_incidents(&self, session: &Session) -> LedResult<Vec<IncidentView>> {
        let actor = self.actor(session).await?;
        let visible = self
            .visible_incidents(&actor, &IncidentQuery::default())
            .await?;
        Ok(visible
            .into_iter()
            .filter(|v| v.incident.is_open())
            .collect())
    }

    /// Linked incident ids must exist and be open when the link is made.
    async fn check_link(&self, incident_id: &str, errors: &mut ValidationErrors) -> LedResult<()> {
        let incident: Option<Incident> = self.store().find(incident_id).await?;
        match incident {
            None => errors.add("incidentId", format!("unknown incident {}", incident_id)),
            Some(i) if !i.is_open() => errors.add("incidentId", "incident is closed"),
            Some(_) => {}
        }
        Ok(())
    }

    pub async fn create_iam_item(&self, session: &Session, new: NewIamItem) -> LedResult<IamItem> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageIamItems)?;

        let mut errors = ValidationErrors::new();
        let issue = non_blank(&new.issue);
        if issue.is_none() {
            errors.add("issue", "is required");
        }
        let incident_id = new.incident_id.as_deref().and_then(non_blank);
        if let Some(id) = incident_id.as_deref() {
            self.check_link(id, &mut errors).await?;
        }
        errors.into_result()?;

        let now = Utc::now();
        let item = IamItem {
            id: new_id(),
            incident_id,
            issue: issue.unwrap_or_default(),
            root_cause: new.root_cause,
            action_plan: new.action_plan,
            target_date: new.target_date,
            pic: new.pic.trim().to_string(),
            priority: new.priority,
            status: IamStatus::Pending,
            progress: 0,
            created_at: now,
            updated_at: now,
        };
        self.store().add(item.clone()).await?;
        tracing::info!(item_id = %item.id, actor = %actor.employee_id, "IAM item created");
        Ok(item)
    }

    /// Partial update. Status and progress are caller-set; progress is clamped to 0..=100.
    /// A `null` target date or priority clears it.
    pub async fn update_iam_item(
        &self,
        session: &Session,
        id: &str,
        patch: IamItemPatch,
    ) -> LedResult<IamItem> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageIamItems)?;

        let mut errors = ValidationErrors::new();
        if matches!(patch.issue.as_deref().map(str::trim), Some("")) {
            errors.add("issue", "must not be blank");
        }
        let link = patch.incident_id.as_deref().map(non_blank);
        if let Some(Some(incident_id)) = link.as_ref() {
            self.check_link(incident_id, &mut errors).await?;
        }
        errors.into_result()?;

        let item = self
            .store()
            .mutate(|items: &mut Vec<IamItem>| -> LedResult<IamItem> {
                let pos = position_of(items, id)?;
                let item = &mut items[pos];
                if let Some(link) = link {
                    item.incident_id = link;
                }
                if let Some(v) = patch.issue {
                    item.issue = v.trim().to_string();
                }
                if let Some(v) = patch.root_cause {
                    item.root_cause = v;
                }
                if let Some(v) = patch.action_plan {
                    item.action_plan = v;
                }
                if let Some(v) = patch.target_date {
                    item.target_date = v;
                }
                if let Some(v) = patch.pic {
                    item.pic = v.trim().to_string();
                }
                if let Some(v) = patch.priority {
                    item.priority = v;
                }
                if let Some(v) = patch.status {
                    item.status = v;
                }
                if let Some(v) = patch.progress {
                    item.progress = clamp_progress(v);
                }
                item.updated_at = Utc::now();
                Ok(item.clone())
            })
            .await?;
        tracing::info!(item_id = %id, actor = %actor.employee_id, status = ?item.status, "IAM item updated");
        Ok(item)
    }

    pub async fn delete_iam_item(&self, session: &Session, id: &str) -> LedResult<()> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageIamItems)?;
        if !self.store().delete::<IamItem>(id).await? {
            return Err(LedError::not_found("IAM item", id));
        }
        tracing::info!(item_id = %id, actor = %actor.employee_id, "IAM item deleted");
        Ok(())
    }

    pub async fn iam_summary(&self, session: &Session) -> LedResult<IamSummary> {
        let items = self.list_iam_items(session).await?;
        let mut summary = IamSummary {
            total: items.len(),
            ..Default::default()
        };
        for item in &items {
            match item.status {
                IamStatus::Pending => summary.pending += 1,
                IamStatus::InProgress => summary.in_progress += 1,
                IamStatus::Completed => summary.completed += 1,
                IamStatus::Overdue => summary.overdue += 1,
            }
        }
        Ok(summary)
    }
}

//! Business units. Incidents and users refer to units by name; nothing cascades.

use crate::policy::Action;
use crate::service::{new_id, non_blank, LedService};
use crate::session::Session;
use chrono::Utc;
use led_types::{
    BusinessUnit, BusinessUnitPatch, LedError, LedResult, NewBusinessUnit, ValidationErrors,
};

fn code_taken(units: &[BusinessUnit], code: &str, except: Option<&str>) -> bool {
    units
        .iter()
        .any(|u| u.code.eq_ignore_ascii_case(code) && Some(u.id.as_str()) != except)
}

fn duplicate_code(code: &str) -> LedError {
    LedError::Validation(ValidationErrors::single(
        "code",
        format!("code {} is already in use", code),
    ))
}

impl LedService {
    pub async fn list_business_units(&self, session: &Session) -> LedResult<Vec<BusinessUnit>> {
        self.actor(session).await?;
        Ok(self.store().get_all().await?)
    }

    pub async fn create_business_unit(
        &self,
        session: &Session,
        new: NewBusinessUnit,
    ) -> LedResult<BusinessUnit> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageBusinessUnits)?;

        let mut errors = ValidationErrors::new();
        let code = non_blank(&new.code);
        if code.is_none() {
            errors.add("code", "is required");
        }
        let name = non_blank(&new.name);
        if name.is_none() {
            errors.add("name", "is required");
        }
        errors.into_result()?;

        let now = Utc::now();
        let unit = BusinessUnit {
            id: new_id(),
            code: code.unwrap_or_default(),
            name: name.unwrap_or_default(),
            description: new.description.as_deref().and_then(non_blank),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let stored = unit.clone();
        self.store()
            .mutate(|units: &mut Vec<BusinessUnit>| -> LedResult<()> {
                if code_taken(units, &stored.code, None) {
                    return Err(duplicate_code(&stored.code));
                }
                units.push(stored);
                Ok(())
            })
            .await?;
        tracing::info!(unit_id = %unit.id, code = %unit.code, actor = %actor.employee_id, "business unit created");
        Ok(unit)
    }

    pub async fn update_business_unit(
        &self,
        session: &Session,
        id: &str,
        patch: BusinessUnitPatch,
    ) -> LedResult<BusinessUnit> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageBusinessUnits)?;

        let mut errors = ValidationErrors::new();
        if matches!(patch.code.as_deref().map(str::trim), Some("")) {
            errors.add("code", "must not be blank");
        }
        if matches!(patch.name.as_deref().map(str::trim), Some("")) {
            errors.add("name", "must not be blank");
        }
        errors.into_result()?;

        let unit = self
            .store()
            .mutate(|units: &mut Vec<BusinessUnit>| -> LedResult<BusinessUnit> {
                let pos = units
                    .iter()
                    .position(|u| u.id == id)
                    .ok_or_else(|| LedError::not_found("business unit", id))?;
                if let Some(code) = patch.code.as_deref().map(str::trim) {
                    if code_taken(units, code, Some(id)) {
                        return Err(duplicate_code(code));
                    }
                }
                let unit = &mut units[pos];
                if let Some(v) = patch.code {
                    unit.code = v.trim().to_string();
                }
                if let Some(v) = patch.name {
                    unit.name = v.trim().to_string();
                }
                if let Some(v) = patch.description {
                    unit.description = non_blank(&v);
                }
                if let Some(v) = patch.is_active {
                    unit.is_active = v;
                }
                unit.updated_at = Utc::now();
                Ok(unit.clone())
            })
            .await?;
        tracing::info!(unit_id = %id, actor = %actor.employee_id, "business unit updated");
        Ok(unit)
    }

    pub async fn delete_business_unit(&self, session: &Session, id: &str) -> LedResult<()> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageBusinessUnits)?;
        if !self.store().delete::<BusinessUnit>(id).await? {
            return Err(LedError::not_found("business unit", id));
        }
        tracing::info!(unit_id = %id, actor = %actor.employee_id, "business unit deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LedConfig;

    async fn service() -> LedService {
        let service = LedService::in_memory(LedConfig::default());
        service.bootstrap().await.unwrap();
        service
    }

    fn unit(code: &str, name: &str) -> NewBusinessUnit {
        NewBusinessUnit {
            code: code.to_string(),
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn codes_are_unique_ignoring_case() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let err = service
            .create_business_unit(&admin, unit("itd", "Another IT"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(ref e) if e.contains("code")));

        let ops = service
            .create_business_unit(&admin, unit("OPS", "Operations"))
            .await
            .unwrap();
        assert!(ops.is_active);
        let units = service.list_business_units(&admin).await.unwrap();
        assert_eq!(units.len(), 5);

        let renamed = service
            .update_business_unit(
                &admin,
                &ops.id,
                BusinessUnitPatch {
                    code: Some("ops".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.code, "ops");
        assert!(!renamed.is_active);
    }

    #[tokio::test]
    async fn writes_need_an_administrator() {
        let service = service().await;
        let inputter = service.session_for("EMP001").await.unwrap();
        assert_eq!(service.list_business_units(&inputter).await.unwrap().len(), 4);
        let err = service
            .create_business_unit(&inputter, unit("NEW", "New unit"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn delete_missing_unit_is_not_found() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let units = service.list_business_units(&admin).await.unwrap();
        service.delete_business_unit(&admin, &units[0].id).await.unwrap();
        let err = service
            .delete_business_unit(&admin, &units[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::NotFound { .. }));
    }
}

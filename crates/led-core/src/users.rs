//! User administration and self-service registration review.

use crate::policy::Action;
use crate::service::{new_id, non_blank, LedService};
use crate::session::Session;
use chrono::Utc;
use led_types::{
    LedError, LedResult, NewRegistration, NewUser, RegistrationStatus, Role, User, UserPatch,
    UserRegistration, ValidationErrors,
};

const DEFAULT_APPROVE_COMMENT: &str = "Application approved";
const DEFAULT_REJECT_COMMENT: &str = "Application rejected";

fn user_position(users: &[User], id: &str) -> LedResult<usize> {
    users
        .iter()
        .position(|u| u.id == id)
        .ok_or_else(|| LedError::not_found("user", id))
}

fn registration_position(items: &[UserRegistration], id: &str) -> LedResult<usize> {
    items
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| LedError::not_found("user registration", id))
}

/// Employee ids are unique across all users, active or not.
fn employee_id_taken(users: &[User], employee_id: &str, except: Option<&str>) -> bool {
    users
        .iter()
        .any(|u| u.employee_id == employee_id && Some(u.id.as_str()) != except)
}

fn require_pending(registration: &UserRegistration) -> LedResult<()> {
    if registration.status == RegistrationStatus::Pending {
        Ok(())
    } else {
        Err(LedError::Validation(ValidationErrors::single(
            "status",
            format!("registration was already {:?}", registration.status).to_lowercase(),
        )))
    }
}

fn review_comment(comment: Option<String>, default: &str) -> String {
    comment
        .as_deref()
        .and_then(non_blank)
        .unwrap_or_else(|| default.to_string())
}

impl LedService {
    pub async fn list_users(&self, session: &Session) -> LedResult<Vec<User>> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageUsers)?;
        Ok(self.store().get_all().await?)
    }

    pub async fn create_user(&self, session: &Session, new: NewUser) -> LedResult<User> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageUsers)?;

        let mut errors = ValidationErrors::new();
        let name = non_blank(&new.name);
        if name.is_none() {
            errors.add("name", "is required");
        }
        let employee_id = non_blank(&new.employee_id);
        if employee_id.is_none() {
            errors.add("employeeId", "is required");
        }
        errors.into_result()?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            name: name.unwrap_or_default(),
            employee_id: employee_id.unwrap_or_default(),
            position: new.position.trim().to_string(),
            department: new.department.trim().to_string(),
            role: new.role,
            email: new.email.trim().to_string(),
            phone: new.phone.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert_user(user.clone()).await?;
        tracing::info!(user_id = %user.id, employee_id = %user.employee_id, actor = %actor.employee_id, "user created");
        Ok(user)
    }

    async fn insert_user(&self, user: User) -> LedResult<()> {
        self.store()
            .mutate(|users: &mut Vec<User>| -> LedResult<()> {
                if employee_id_taken(users, &user.employee_id, None) {
                    return Err(LedError::Validation(ValidationErrors::single(
                        "employeeId",
                        format!("{} is already in use", user.employee_id),
                    )));
                }
                users.push(user);
                Ok(())
            })
            .await
    }

    /// Partial profile, role or active-flag update.
    ///
    /// Administrators cannot deactivate or demote their own account.
    pub async fn update_user(
        &self,
        session: &Session,
        id: &str,
        patch: UserPatch,
    ) -> LedResult<User> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ManageUsers)?;
        if actor.id == id
            && (patch.is_active == Some(false)
                || patch.role.is_some_and(|r| r != Role::Administrator))
        {
            return Err(LedError::unauthorized(
                "administrators cannot deactivate or demote their own account",
            ));
        }

        let mut errors = ValidationErrors::new();
        if matches!(patch.name.as_deref().map(str::trim), Some("")) {
            errors.add("name", "must not be blank");
        }
        if matches!(patch.employee_id.as_deref().map(str::trim), Some("")) {
            errors.add("employeeId", "must not be blank");
        }
        errors.into_result()?;

        let user = self
            .store()
            .mutate(|users: &mut Vec<User>| -> LedResult<User> {
                let pos = user_position(users, id)?;
                if let Some(employee_id) = patch.employee_id.as_deref().map(str::trim) {
                    if employee_id_taken(users, employee_id, Some(id)) {
                        return Err(LedError::Validation(ValidationErrors::single(
                            "employeeId",
                            format!("{} is already in use", employee_id),
                        )));
                    }
                }
                let user = &mut users[pos];
                if let Some(v) = patch.name {
                    user.name = v.trim().to_string();
                }
                if let Some(v) = patch.employee_id {
                    user.employee_id = v.trim().to_string();
                }
                if let Some(v) = patch.position {
                    user.position = v.trim().to_string();
                }
                if let Some(v) = patch.department {
                    user.department = v.trim().to_string();
                }
                if let Some(v) = patch.role {
                    user.role = v;
                }
                if let Some(v) = patch.email {
                    user.email = v.trim().to_string();
                }
                if let Some(v) = patch.phone {
                    user.phone = v.trim().to_string();
                }
                if let Some(v) = patch.is_active {
                    user.is_active = v;
                }
                user.updated_at = Utc::now();
                Ok(user.clone())
            })
            .await?;
        tracing::info!(user_id = %id, role = %user.role, active = user.is_active, actor = %actor.employee_id, "user updated");
        Ok(user)
    }

    /// Users are never removed, only deactivated; their incidents keep the creator snapshot.
    pub async fn deactivate_user(&self, session: &Session, id: &str) -> LedResult<User> {
        self.update_user(
            session,
            id,
            UserPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Submit an account application. No session is needed.
    pub async fn submit_registration(&self, new: NewRegistration) -> LedResult<UserRegistration> {
        let mut errors = ValidationErrors::new();
        let name = non_blank(&new.name);
        if name.is_none() {
            errors.add("name", "is required");
        }
        let employee_id = non_blank(&new.employee_id);
        match employee_id.as_deref() {
            None => errors.add("employeeId", "is required"),
            Some(eid) => {
                let users: Vec<User> = self.store().get_all().await?;
                if employee_id_taken(&users, eid, None) {
                    errors.add("employeeId", format!("{} already has an account", eid));
                }
            }
        }
        errors.into_result()?;

        let now = Utc::now();
        let registration = UserRegistration {
            id: new_id(),
            name: name.unwrap_or_default(),
            employee_id: employee_id.unwrap_or_default(),
            email: new.email.trim().to_string(),
            phone: new.phone.trim().to_string(),
            position: new.position.trim().to_string(),
            department: new.department.trim().to_string(),
            requested_role: new.requested_role,
            reason: new.reason,
            status: RegistrationStatus::Pending,
            review_comment: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        let stored = registration.clone();
        self.store()
            .mutate(|items: &mut Vec<UserRegistration>| -> LedResult<()> {
                let duplicate = items.iter().any(|r| {
                    r.status == RegistrationStatus::Pending
                        && r.employee_id == stored.employee_id
                });
                if duplicate {
                    return Err(LedError::Validation(ValidationErrors::single(
                        "employeeId",
                        format!("{} already has a pending application", stored.employee_id),
                    )));
                }
                items.push(stored);
                Ok(())
            })
            .await?;
        tracing::info!(registration_id = %registration.id, employee_id = %registration.employee_id, "registration submitted");
        Ok(registration)
    }

    pub async fn list_registrations(
        &self,
        session: &Session,
        status: Option<RegistrationStatus>,
    ) -> LedResult<Vec<UserRegistration>> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ReviewRegistrations)?;
        let items: Vec<UserRegistration> = self.store().get_all().await?;
        Ok(items
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect())
    }

    /// Approve a pending application and create the account with the requested role.
    ///
    /// The registration is claimed (moved to Approved) under the writer lock before the
    /// account is created; a concurrent review of the same application then fails. If the
    /// account cannot be created the claim is released and the application is Pending again.
    pub async fn approve_registration(
        &self,
        session: &Session,
        id: &str,
        comment: Option<String>,
    ) -> LedResult<User> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ReviewRegistrations)?;
        let registration = self
            .mark_registration(
                id,
                RegistrationStatus::Approved,
                review_comment(comment, DEFAULT_APPROVE_COMMENT),
                &actor,
            )
            .await?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            name: registration.name.clone(),
            employee_id: registration.employee_id.clone(),
            position: registration.position.clone(),
            department: registration.department.clone(),
            role: registration.requested_role,
            email: registration.email.clone(),
            phone: registration.phone.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = self.insert_user(user.clone()).await {
            tracing::warn!(registration_id = %id, error = %e, "account creation failed; registration reopened");
            self.reopen_registration(id).await?;
            return Err(e);
        }
        tracing::info!(registration_id = %id, employee_id = %user.employee_id, role = %user.role, actor = %actor.employee_id, "registration approved");
        Ok(user)
    }

    pub async fn reject_registration(
        &self,
        session: &Session,
        id: &str,
        comment: Option<String>,
    ) -> LedResult<UserRegistration> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ReviewRegistrations)?;
        let registration = self
            .mark_registration(
                id,
                RegistrationStatus::Rejected,
                review_comment(comment, DEFAULT_REJECT_COMMENT),
                &actor,
            )
            .await?;
        tracing::info!(registration_id = %id, actor = %actor.employee_id, "registration rejected");
        Ok(registration)
    }

    async fn mark_registration(
        &self,
        id: &str,
        status: RegistrationStatus,
        comment: String,
        reviewer: &User,
    ) -> LedResult<UserRegistration> {
        self.store()
            .mutate(|items: &mut Vec<UserRegistration>| -> LedResult<UserRegistration> {
                let pos = registration_position(items, id)?;
                let registration = &mut items[pos];
                require_pending(registration)?;
                let now = Utc::now();
                registration.status = status;
                registration.review_comment = Some(comment);
                registration.reviewed_by = Some(reviewer.name.clone());
                registration.reviewed_at = Some(now);
                registration.updated_at = now;
                Ok(registration.clone())
            })
            .await
    }

    /// Undo an approval claim whose account could not be created.
    async fn reopen_registration(&self, id: &str) -> LedResult<()> {
        self.store()
            .mutate(|items: &mut Vec<UserRegistration>| -> LedResult<()> {
                if let Some(registration) = items
                    .iter_mut()
                    .find(|r| r.id == id && r.status == RegistrationStatus::Approved)
                {
                    registration.status = RegistrationStatus::Pending;
                    registration.review_comment = None;
                    registration.reviewed_by = None;
                    registration.reviewed_at = None;
                    registration.updated_at = Utc::now();
                }
                Ok(())
            })
            .await
    }

    pub async fn delete_registration(&self, session: &Session, id: &str) -> LedResult<()> {
        let actor = self.actor(session).await?;
        Self::require(&actor, Action::ReviewRegistrations)?;
        if !self.store().delete::<UserRegistration>(id).await? {
            return Err(LedError::not_found("user registration", id));
        }
        tracing::info!(registration_id = %id, actor = %actor.employee_id, "registration deleted");
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

    fn application(employee_id: &str) -> NewRegistration {
        NewRegistration {
            name: "Zhao Liu".to_string(),
            employee_id: employee_id.to_string(),
            email: "zhaoliu@company.com".to_string(),
            phone: String::new(),
            position: "Compliance Officer".to_string(),
            department: "Compliance".to_string(),
            requested_role: Role::Approver,
            reason: "Joining the review rota".to_string(),
        }
    }

    #[tokio::test]
    async fn approving_a_registration_creates_an_account() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let registration = service
            .submit_registration(application("EMP010"))
            .await
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Pending);

        let user = service
            .approve_registration(&admin, &registration.id, None)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Approver);
        assert!(service.login("EMP010").await.is_ok());

        let reviewed = service
            .list_registrations(&admin, Some(RegistrationStatus::Approved))
            .await
            .unwrap();
        assert_eq!(reviewed.len(), 1);
        assert_eq!(reviewed[0].review_comment.as_deref(), Some("Application approved"));
        assert_eq!(reviewed[0].reviewed_by.as_deref(), Some("Wang Wu"));

        let err = service
            .reject_registration(&admin, &registration.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_account_creation_reopens_the_application() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let registration = service
            .submit_registration(application("EMP013"))
            .await
            .unwrap();
        service
            .create_user(
                &admin,
                NewUser {
                    name: "Direct hire".to_string(),
                    employee_id: "EMP013".to_string(),
                    position: String::new(),
                    department: String::new(),
                    role: Role::Inputter,
                    email: String::new(),
                    phone: String::new(),
                },
            )
            .await
            .unwrap();

        let err = service
            .approve_registration(&admin, &registration.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(ref e) if e.contains("employeeId")));
        let pending = service
            .list_registrations(&admin, Some(RegistrationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].reviewed_by.is_none());
    }

    #[tokio::test]
    async fn duplicate_applications_are_refused() {
        let service = service().await;
        let err = service
            .submit_registration(application("EMP001"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(ref e) if e.contains("employeeId")));

        service.submit_registration(application("EMP011")).await.unwrap();
        assert!(service.submit_registration(application("EMP011")).await.is_err());
    }

    #[tokio::test]
    async fn rejection_keeps_comment() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let registration = service
            .submit_registration(application("EMP012"))
            .await
            .unwrap();
        let rejected = service
            .reject_registration(&admin, &registration.id, Some("  Not eligible ".to_string()))
            .await
            .unwrap();
        assert_eq!(rejected.status, RegistrationStatus::Rejected);
        assert_eq!(rejected.review_comment.as_deref(), Some("Not eligible"));
        assert!(service.login("EMP012").await.is_err());
    }

    #[tokio::test]
    async fn only_administrators_manage_users() {
        let service = service().await;
        let approver = service.session_for("EMP002").await.unwrap();
        let err = service.list_users(&approver).await.unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)));
        let err = service
            .list_registrations(&approver, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn deactivation_blocks_login_but_not_self() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let users = service.list_users(&admin).await.unwrap();
        let inputter = users.iter().find(|u| u.employee_id == "EMP001").unwrap();

        let deactivated = service.deactivate_user(&admin, &inputter.id).await.unwrap();
        assert!(!deactivated.is_active);
        assert!(service.login("EMP001").await.is_err());

        let err = service
            .deactivate_user(&admin, &admin.user().id)
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn employee_ids_stay_unique() {
        let service = service().await;
        let admin = service.session_for("EMP003").await.unwrap();
        let err = service
            .create_user(
                &admin,
                NewUser {
                    name: "Copy".to_string(),
                    employee_id: "EMP002".to_string(),
                    position: String::new(),
                    department: String::new(),
                    role: Role::Inputter,
                    email: String::new(),
                    phone: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(_)));

        let users = service.list_users(&admin).await.unwrap();
        let approver = users.iter().find(|u| u.employee_id == "EMP002").unwrap();
        let err = service
            .update_user(
                &admin,
                &approver.id,
                UserPatch {
                    employee_id: Some("EMP001".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedError::Validation(_)));
    }
}

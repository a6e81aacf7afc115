//! Identity: login by employee id and explicit session values.
//!
//! There is no credential check. Identity is asserted by employee id alone, and an
//! inactive account cannot sign in.

use crate::service::LedService;
use chrono::{DateTime, Utc};
use led_types::{LedError, LedResult, User};
use serde::Serialize;

/// An authenticated caller. Passed explicitly to every operation that acts for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    user: User,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self {
            user,
            started_at: Utc::now(),
        }
    }

    /// User as resolved when the session started.
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn employee_id(&self) -> &str {
        &self.user.employee_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl LedService {
    /// Sign in and persist the session keys.
    pub async fn login(&self, employee_id: &str) -> LedResult<Session> {
        let session = self.session_for(employee_id).await?;
        self.store().save_session(session.user()).await?;
        tracing::info!(actor = %session.employee_id(), role = %session.user().role, "login");
        Ok(session)
    }

    pub async fn logout(&self) -> LedResult<()> {
        if let Some(user) = self.store().load_session().await? {
            tracing::info!(actor = %user.employee_id, "logout");
        }
        self.store().clear_session().await?;
        Ok(())
    }

    /// The persisted session user, if someone is signed in.
    pub async fn current_user(&self) -> LedResult<Option<User>> {
        Ok(self.store().load_session().await?)
    }

    /// Resolve a session for `employee_id` without touching the persisted session keys.
    pub async fn session_for(&self, employee_id: &str) -> LedResult<Session> {
        let wanted = employee_id.trim();
        if wanted.is_empty() {
            return Err(LedError::AuthenticationFailed(
                "employee id is required".to_string(),
            ));
        }
        let users: Vec<User> = self.store().get_all().await?;
        match users.into_iter().find(|u| u.employee_id == wanted) {
            Some(user) if user.is_active => Ok(Session::new(user)),
            Some(_) => Err(LedError::AuthenticationFailed(format!(
                "account {} is inactive",
                wanted
            ))),
            None => Err(LedError::AuthenticationFailed(format!(
                "unknown employee id {}",
                wanted
            ))),
        }
    }

    /// Current state of the session's user. Fails if the account was removed or deactivated.
    pub(crate) async fn actor(&self, session: &Session) -> LedResult<User> {
        let user: Option<User> = self.store().find(&session.user().id).await?;
        match user {
            Some(user) if user.is_active => Ok(user),
            _ => Err(LedError::AuthenticationFailed(format!(
                "session for {} is no longer valid",
                session.employee_id()
            ))),
        }
    }
}

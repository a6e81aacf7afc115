//! Service-level error taxonomy.

use crate::lifecycle::IllegalTransition;
use crate::traits::StoreError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Field-level validation failures, collected rather than stopping at the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`. The first message per field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise `LedError::Validation`.
    pub fn into_result(self) -> Result<(), LedError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LedError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Transition(#[from] IllegalTransition),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl LedError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LedError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        LedError::Unauthorized(reason.into())
    }
}

pub type LedResult<T> = Result<T, LedError>;

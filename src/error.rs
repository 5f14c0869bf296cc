use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the data-access layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database failure")]
    Database(#[source] sqlx::Error),

    #[error("Store timed out")]
    Timeout,

    #[error("Uniqueness conflict on {0}")]
    Conflict(&'static str),

    #[error("Store returned inconsistent data: {0}")]
    Corrupted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict("unique constraint")
            }
            _ => StoreError::Database(e),
        }
    }
}

/// Every operation resolves to a success payload or exactly one of these.
/// Display strings are stable and safe to show to end users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("You are not allowed to do that")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage is temporarily unavailable, try again")]
    StoreFailure,

    #[error("Internal error")]
    Internal,
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => {
                ActionError::Conflict(format!("Already exists: {}", what))
            }
            other => {
                error!(error = %other, "store failure");
                ActionError::StoreFailure
            }
        }
    }
}

/// Serializable envelope for transports that cannot carry `Result` directly.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(e: &ActionError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(e.to_string()),
        }
    }
}

impl<T> From<Result<T, ActionError>> for ActionResponse<T> {
    fn from(result: Result<T, ActionError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_data_or_error_never_both() {
        let ok: ActionResponse<i32> = Ok(7).into();
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 7);
        assert!(json.get("error").is_none());

        let err: ActionResponse<i32> = Err(ActionError::NotFound).into();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"], "Not found");
    }

    #[test]
    fn store_conflicts_surface_as_conflicts() {
        let err: ActionError = StoreError::Conflict("profiles.id").into();
        assert_eq!(
            err,
            ActionError::Conflict("Already exists: profiles.id".to_string())
        );

        let err: ActionError = StoreError::Timeout.into();
        assert_eq!(err, ActionError::StoreFailure);
    }

    #[test]
    fn pool_timeouts_map_to_timeout() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Timeout));
    }
}

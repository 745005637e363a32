//! Conversions from external infrastructure errors into domain errors.

use fieldsync_domain::FieldSyncError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FieldSyncError);

impl From<InfraError> for FieldSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FieldSyncError> for InfraError {
    fn from(value: FieldSyncError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → FieldSyncError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let mapped = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        FieldSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        FieldSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        FieldSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        FieldSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => FieldSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                FieldSyncError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                FieldSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                FieldSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidQuery => FieldSyncError::Database("invalid SQL query".into()),
            other => FieldSyncError::Database(other.to_string()),
        };

        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → FieldSyncError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(FieldSyncError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FieldSyncError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let mapped = if value.is_timeout() {
            FieldSyncError::Network(format!("http request timed out: {value}"))
        } else if value.is_connect() {
            FieldSyncError::Network(format!("http connection failed: {value}"))
        } else if value.is_decode() {
            FieldSyncError::Internal(format!("failed to decode http response: {value}"))
        } else if value.is_builder() {
            FieldSyncError::Internal(format!("failed to build http request: {value}"))
        } else {
            FieldSyncError::Network(format!("http error: {value}"))
        };

        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → FieldSyncError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(FieldSyncError::Internal(format!("json error: {value}")))
    }
}

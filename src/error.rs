use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

#[derive(Debug, Display)]
pub enum LedgerError {
    /// Bad input, rejected before any write.
    #[display(fmt = "{}", _0)]
    Validation(String),
    /// Duplicate or incompatible state (duplicate event, mapping bound elsewhere, illegal transition).
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "{} not found", _0)]
    NotFound(String),
    /// Storage failure; any open transaction has been rolled back.
    #[display(fmt = "storage failure: {}", _0)]
    Transaction(sqlx::Error),
    #[display(fmt = "device unreachable: {}", _0)]
    DeviceUnreachable(String),
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Transaction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Transaction(e)
    }
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }
}

/// Unique-key violation (MySQL ER_DUP_ENTRY). Foreign-key failures share SQLSTATE 23000
/// and are not duplicates.
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.kind() == sqlx::error::ErrorKind::UniqueViolation,
        _ => false,
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Transaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::DeviceUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            LedgerError::Transaction(e) => {
                tracing::error!(error = %e, "Storage operation failed");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn variants_map_to_http_statuses() {
        assert_eq!(
            LedgerError::validation("day_count must be positive").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(LedgerError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(LedgerError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            LedgerError::Transaction(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            LedgerError::DeviceUnreachable("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[actix_web::test]
    async fn storage_details_are_not_leaked() {
        let resp = LedgerError::Transaction(sqlx::Error::PoolTimedOut).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal Server Error");
    }

    #[actix_web::test]
    async fn not_found_names_the_entity() {
        let resp = LedgerError::not_found("Leave request 12").error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Leave request 12 not found");
    }

    #[test]
    fn non_database_errors_are_not_duplicates() {
        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
    }
}

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// MongoDB server code for a unique index violation.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Body of every 404 returned by the user endpoints.
pub const NOT_FOUND_MESSAGE: &str = "Usuario no encontrado";

/// One rejected field of a user payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub kind: String,
    pub path: String,
}

/// Write rejected by the schema before reaching the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationFailure {
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn field(&self, path: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.path == path)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User validation failed: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", error.path, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

impl From<validator::ValidationErrors> for ValidationFailure {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .filter_map(|(path, errs)| {
                let first = errs.first()?;
                Some(FieldError {
                    message: first
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Path `{}` is invalid.", path)),
                    kind: first.code.to_string(),
                    path: path.to_string(),
                })
            })
            .collect();

        // field_errors() is a HashMap
        fields.sort_by(|a, b| a.path.cmp(&b.path));

        ValidationFailure { errors: fields }
    }
}

/// Failure of a single document store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("E11000 duplicate key error collection: {collection} index: {field}_1 dup key: {{ {field}: \"{value}\" }}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Cast to ObjectId failed for value \"{0}\" (type string) at path \"_id\" for model \"User\"")]
    InvalidId(String),

    #[error("{0}")]
    Database(String),
}

impl StoreError {
    /// Raw error detail as sent to clients on 400/500 responses.
    pub fn detail(&self) -> Value {
        match self {
            StoreError::Validation(failure) => {
                let errors: Map<String, Value> = failure
                    .errors
                    .iter()
                    .map(|e| (e.path.clone(), json!(e)))
                    .collect();
                json!({
                    "name": "ValidationError",
                    "message": failure.to_string(),
                    "errors": errors,
                })
            }
            StoreError::DuplicateKey { field, value, .. } => {
                let mut key_pattern = Map::new();
                key_pattern.insert(field.clone(), json!(1));
                let mut key_value = Map::new();
                key_value.insert(field.clone(), json!(value));
                json!({
                    "name": "MongoServerError",
                    "code": DUPLICATE_KEY_CODE,
                    "keyPattern": key_pattern,
                    "keyValue": key_value,
                    "message": self.to_string(),
                })
            }
            StoreError::InvalidId(value) => json!({
                "name": "CastError",
                "kind": "ObjectId",
                "path": "_id",
                "value": value,
                "message": self.to_string(),
            }),
            StoreError::Database(_) => json!({
                "name": "DatabaseError",
                "message": self.to_string(),
            }),
        }
    }
}

/// HTTP-facing error of the user endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 with the raw store detail
    #[error(transparent)]
    Rejected(StoreError),

    /// 500 with the raw store detail
    #[error(transparent)]
    Failed(StoreError),

    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,

    /// Operation-specific status with a `{message, error}` body
    #[error("{message}: {source}")]
    Described {
        status: StatusCode,
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Invalid JSON body: {0}")]
    MalformedBody(String),
}

impl ApiError {
    pub fn described(status: StatusCode, message: &'static str, source: StoreError) -> Self {
        ApiError::Described {
            status,
            message,
            source,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Rejected(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Described { status, .. } => *status,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Rejected(e) | ApiError::Failed(e) => e.detail(),
            ApiError::NotFound => json!({ "message": NOT_FOUND_MESSAGE }),
            ApiError::Described {
                message, source, ..
            } => json!({
                "message": message,
                "error": source.to_string(),
            }),
            ApiError::MalformedBody(msg) => json!({
                "name": "ValidationError",
                "message": msg,
            }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_email() -> ValidationFailure {
        ValidationFailure {
            errors: vec![FieldError {
                message: "Path `email` is required.".to_string(),
                kind: "required".to_string(),
                path: "email".to_string(),
            }],
        }
    }

    #[test]
    fn test_validation_failure_message() {
        assert_eq!(
            missing_email().to_string(),
            "User validation failed: email: Path `email` is required."
        );
    }

    #[test]
    fn test_validation_detail_is_keyed_by_path() {
        let detail = StoreError::Validation(missing_email()).detail();

        assert_eq!(detail["name"], "ValidationError");
        assert_eq!(detail["errors"]["email"]["message"], "Path `email` is required.");
        assert_eq!(detail["errors"]["email"]["kind"], "required");
    }

    #[test]
    fn test_duplicate_key_detail() {
        let error = StoreError::DuplicateKey {
            collection: "test.usuarios".to_string(),
            field: "email".to_string(),
            value: "ana@example.com".to_string(),
        };
        let detail = error.detail();

        assert_eq!(detail["code"], 11000);
        assert_eq!(detail["keyPattern"]["email"], 1);
        assert_eq!(detail["keyValue"]["email"], "ana@example.com");
        assert!(error.to_string().starts_with("E11000 duplicate key error"));
    }

    #[test]
    fn test_status_mapping() {
        let rejected = ApiError::Rejected(StoreError::Validation(missing_email()));
        let failed = ApiError::Failed(StoreError::Database("connection reset".to_string()));
        let described = ApiError::described(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error al buscar el usuario",
            StoreError::InvalidId("abc".to_string()),
        );

        assert_eq!(rejected.error_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(failed.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::NotFound.error_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(described.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::MalformedBody("EOF".to_string()).error_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_described_keeps_cause_text() {
        let error = ApiError::described(
            StatusCode::BAD_REQUEST,
            "Error al actualizar el usuario",
            StoreError::InvalidId("abc".to_string()),
        );

        assert!(error.to_string().starts_with("Error al actualizar el usuario: Cast to ObjectId"));
    }
}

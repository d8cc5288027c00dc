use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The uniform error payload written for every failed request:
/// `{status, message, errors?}`.
///
/// Error responses in the OpenAPI document reference this type's
/// component schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorModel {
    /// HTTP status code of the response.
    pub status: u16,
    /// Human-readable summary.
    pub message: String,
    /// Individual causes, when there are any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

/// A single cause inside an [`ErrorModel`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorDetail {
    /// What went wrong.
    pub message: String,
    /// Where it went wrong (`"query.page"`, `"body"`, ...), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ErrorDetail {
    /// A cause with no location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// A cause pointing at a request location.
    pub fn at(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

/// Error type returned by handlers.
///
/// Variants carry the HTTP status the dispatcher writes; `Status` covers
/// anything the named variants don't.
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Unprocessable(String),
    Internal(String),
    Status {
        status: u16,
        message: String,
        errors: Vec<ErrorDetail>,
    },
}

impl ApiError {
    /// An arbitrary status-carrying error with no causes.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Append a cause.
    pub fn with_cause(self, cause: ErrorDetail) -> Self {
        let mut model = self.into_model();
        model.errors.push(cause);
        ApiError::Status {
            status: model.status,
            message: model.message,
            errors: model.errors,
        }
    }

    /// The HTTP status this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Unprocessable(_) => 422,
            ApiError::Internal(_) => 500,
            ApiError::Status { status, .. } => *status,
        }
    }

    /// Convert into the wire payload.
    pub fn into_model(self) -> ErrorModel {
        match self {
            ApiError::Status {
                status,
                message,
                errors,
            } => ErrorModel {
                status,
                message,
                errors,
            },
            other => ErrorModel {
                status: other.http_status(),
                message: match other {
                    ApiError::BadRequest(m)
                    | ApiError::Unauthorized(m)
                    | ApiError::Forbidden(m)
                    | ApiError::NotFound(m)
                    | ApiError::Unprocessable(m)
                    | ApiError::Internal(m) => m,
                    ApiError::Status { .. } => unreachable!(),
                },
                errors: Vec::new(),
            },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            ApiError::Unprocessable(msg) => write!(f, "Unprocessable: {msg}"),
            ApiError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            ApiError::Status { status, message, .. } => {
                write!(f, "Error {status}: {message}")
            }
        }
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(ApiError::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(ApiError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(ApiError::NotFound("x".into()).http_status(), 404);
        assert_eq!(ApiError::Unprocessable("x".into()).http_status(), 422);
        assert_eq!(ApiError::Internal("x".into()).http_status(), 500);
        assert_eq!(ApiError::status(418, "teapot").http_status(), 418);
    }

    #[test]
    fn model_skips_empty_errors() {
        let model = ApiError::NotFound("missing".into()).into_model();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json, serde_json::json!({"status": 404, "message": "missing"}));
    }

    #[test]
    fn model_keeps_causes() {
        let model = ApiError::status(500, "dependency failed")
            .with_cause(ErrorDetail::new("connection refused"))
            .into_model();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["errors"][0]["message"], "connection refused");
    }

    #[test]
    fn display_includes_message() {
        assert_eq!(
            ApiError::NotFound("user 7".into()).to_string(),
            "Not Found: user 7"
        );
        assert_eq!(
            ApiError::status(418, "teapot").to_string(),
            "Error 418: teapot"
        );
    }
}

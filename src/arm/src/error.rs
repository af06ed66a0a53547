//! Error types for the Azure REST backend

use apim_access_core::BackendError;
use serde_json::Value;
use thiserror::Error;

/// Error raised by [`ArmClient`](crate::ArmClient) before it is classified
/// into a [`BackendError`]
#[derive(Debug, Error)]
pub enum ArmError {
    /// The HTTP client could not be built or a URL could not be formed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// No bearer token is available for the endpoint
    #[error("Missing credential: {0}")]
    Token(String),

    /// The request never produced a response (connect, TLS, timeout)
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("HTTP {status} {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    /// A success response did not have the expected shape
    #[error("Unexpected response payload: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ArmError>;

/// Error codes that mean "not visible yet" although the status is 400
const REPLICATION_LAG_CODES: &[&str] = &["PrincipalNotFound", "RoleDefinitionDoesNotExist"];

impl From<ArmError> for BackendError {
    fn from(err: ArmError) -> Self {
        match err {
            ArmError::Token(msg) => BackendError::denied(msg),
            ArmError::Status {
                status,
                code,
                message,
            } => classify(status, &code, &message),
            err @ ArmError::Transport { .. } => BackendError::transient(err.to_string()),
            ArmError::Client(msg) | ArmError::Decode(msg) => BackendError::Other(msg),
        }
    }
}

/// Map an HTTP status and ARM error code onto the backend error taxonomy
pub fn classify(status: u16, code: &str, message: &str) -> BackendError {
    let detail = format!("{}: {}", code, message);

    if code.eq_ignore_ascii_case("RoleDefinitionHasAssignments") {
        return BackendError::HasAssignments(detail);
    }

    match status {
        401 | 403 => BackendError::denied(detail),
        404 => BackendError::not_found(detail),
        409 => BackendError::Conflict(detail),
        400 if REPLICATION_LAG_CODES
            .iter()
            .any(|c| code.eq_ignore_ascii_case(c)) =>
        {
            BackendError::not_found(detail)
        }
        400 | 422 => BackendError::validation(detail),
        408 | 429 | 500..=599 => BackendError::transient(detail),
        _ => BackendError::Other(format!("HTTP {} {}", status, detail)),
    }
}

/// Extract `(code, message)` from an ARM or Graph error body.
///
/// Both services wrap errors as `{"error": {"code", "message"}}`; some
/// older endpoints capitalize the wrapper.
pub fn parse_error_body(body: &Value) -> (String, String) {
    let err = body
        .get("error")
        .or_else(|| body.get("Error"))
        .unwrap_or(body);
    let code = err["code"].as_str().unwrap_or("Unknown").to_string();
    let message = err["message"].as_str().unwrap_or("unknown error").to_string();
    (code, message)
}

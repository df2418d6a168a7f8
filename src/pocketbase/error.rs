use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum PocketBaseError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Session storage error: {0}")]
    Io(String),
}

impl PocketBaseError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable text shown next to the form that triggered the call.
    pub fn message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for PocketBaseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: BTreeMap<String, FieldError>,
}

#[derive(Debug, Deserialize)]
struct FieldError {
    #[serde(default)]
    message: String,
}

/// Builds an `Api` error from a non-2xx response body.
///
/// PocketBase answers with `{ code, message, data }` where `data` maps field
/// names to validation failures. Field messages are appended so that
/// "Failed to create record." says which field was rejected.
pub(crate) fn api_error(status: u16, body: &str) -> PocketBaseError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();

    let mut message = if parsed.message.trim().is_empty() {
        format!("Request failed with status {status}")
    } else {
        parsed.message.trim().to_string()
    };

    let details: Vec<String> = parsed
        .data
        .iter()
        .filter(|(_, field)| !field.message.is_empty())
        .map(|(name, field)| format!("{name}: {}", field.message))
        .collect();

    if !details.is_empty() {
        message = format!("{message} ({})", details.join("; "));
    }

    PocketBaseError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_backend_message() {
        let err = api_error(400, r#"{"code":400,"message":"Failed to authenticate.","data":{}}"#);
        assert_eq!(err.message(), "Failed to authenticate.");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_api_error_appends_field_details() {
        let body = r#"{"code":400,"message":"Failed to create record.","data":{"email":{"code":"validation_not_unique","message":"Value must be unique."}}}"#;
        let err = api_error(400, body);
        assert_eq!(
            err.message(),
            "Failed to create record. (email: Value must be unique.)"
        );
    }

    #[test]
    fn test_api_error_without_body() {
        let err = api_error(502, "<html>bad gateway</html>");
        assert_eq!(err.message(), "Request failed with status 502");
        assert_eq!(err.status(), Some(502));
    }
}

use serde::Serialize;
use thiserror::Error;

/// A request the domain refused to carry out.
///
/// Rejections are never fatal: the operation is rolled back and the message
/// is surfaced to the caller as-is, alongside its [`ReasonCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Invalid(String),
}

/// Machine-readable counterpart of [`Rejection`], consumed by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    PermissionDenied,
    NotFound,
    Conflict,
    InvalidState,
    Invalid,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidState => "invalid_state",
            Self::Invalid => "invalid",
        }
    }
}

impl Rejection {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// `what` names the missing record, e.g. `"post"`.
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::PermissionDenied(_) => ReasonCode::PermissionDenied,
            Self::NotFound(_) => ReasonCode::NotFound,
            Self::Conflict(_) => ReasonCode::Conflict,
            Self::InvalidState(_) => ReasonCode::InvalidState,
            Self::Invalid(_) => ReasonCode::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_record() {
        let r = Rejection::not_found("study group");
        assert_eq!(r.to_string(), "study group not found");
        assert_eq!(r.reason(), ReasonCode::NotFound);
    }

    #[test]
    fn reason_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ReasonCode::InvalidState).unwrap();
        assert_eq!(json, format!("\"{}\"", ReasonCode::InvalidState.as_str()));
    }
}

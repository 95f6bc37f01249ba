use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors surfaced by the auth service. Store and library failures are
/// logged where they happen and reach callers only as one of these kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0} already exists")]
    DuplicateEmail(String),

    #[error("member number {0} already exists")]
    DuplicateMemberNumber(i64),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("storage failure")]
    Storage,

    #[error("corrupt stored credential")]
    CorruptCredential,

    #[error("internal failure")]
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail(_) | AuthError::DuplicateMemberNumber(_) => {
                StatusCode::CONFLICT
            }
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Storage | AuthError::CorruptCredential | AuthError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::DuplicateEmail(_) => "duplicate_email",
            AuthError::DuplicateMemberNumber(_) => "duplicate_member_number",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Storage | AuthError::CorruptCredential | AuthError::Internal => {
                "internal_error"
            }
        }
    }

    /// Message sent to the client. Server-side kinds share one opaque text.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Storage | AuthError::CorruptCredential | AuthError::Internal => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "error": self.code(),
                "message": self.public_message(),
            })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        // body_text can echo submitted values, so only the status is logged
        tracing::warn!(status = %rejection.status(), "request body rejected");
        AuthError::Validation("request body is malformed or missing required fields")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_side_kinds_do_not_leak_detail() {
        for err in [AuthError::Storage, AuthError::CorruptCredential, AuthError::Internal] {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.code(), "internal_error");
            assert_eq!(err.public_message(), "Internal server error");
        }
    }

    #[test]
    fn duplicate_email_names_the_address() {
        let err = AuthError::DuplicateEmail("ana@x.com".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "ana@x.com already exists");
    }

    #[test]
    fn auth_failures_are_unauthorized() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
    }
}

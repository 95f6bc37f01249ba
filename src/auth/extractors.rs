use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::auth::{dto::PublicUser, error::AuthError, services::AuthService};

/// Returns the token of a `Bearer <token>` header value. The scheme is
/// matched case-insensitively; an empty token counts as absent.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves the `Authorization` header of a request to an active user.
/// Every failure collapses into `Unauthenticated`.
pub async fn authorize(auth: &AuthService, headers: &HeaderMap) -> Result<PublicUser, AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthError::Unauthenticated)?;

    auth.resolve_session(token).await.map_err(|e| {
        if e != AuthError::Unauthenticated {
            warn!(error = %e, "session resolution failed");
        }
        AuthError::Unauthenticated
    })
}

/// The authenticated caller, handed to handlers as an explicit argument.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthService::from_ref(state);
        authorize(&auth, &parts.headers).await.map(CurrentUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parses_scheme() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER  abc "), Some("abc"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        assert_eq!(bearer_token("Basic dXNlcjpwdw=="), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("abc.def"), None);
        assert_eq!(bearer_token(""), None);
    }
}

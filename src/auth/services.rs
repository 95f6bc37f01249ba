use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{normalize_email, LoginRequest, LoginResponse, PublicUser, RegisterRequest},
    error::AuthError,
    jwt::TokenIssuer,
    password::CredentialHasher,
    repo::{StoreError, UniqueField, UserStore},
    repo_types::{NewUserRecord, User, DEFAULT_ROLE},
};

/// Registration, login and session resolution over a user store,
/// a password hasher and a token issuer.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
}

fn storage_error(op: &'static str, err: StoreError) -> AuthError {
    error!(error = %err, op, "user store failure");
    AuthError::Storage
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    /// Creates a user and returns its public view.
    #[instrument(skip_all)]
    pub async fn register(&self, mut input: RegisterRequest) -> Result<PublicUser, AuthError> {
        if let Err(e) = input.validate() {
            warn!(error = %e, "registration rejected");
            return Err(e);
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let record = NewUserRecord {
            email: input.email,
            name: input.name,
            last_name: input.last_name,
            member_number: input.member_number,
            password_hash,
            roles: vec![DEFAULT_ROLE.to_string()],
        };
        let email = record.email.clone();
        let member_number = record.member_number;

        let user = match self.store.insert(record).await {
            Ok(user) => user,
            Err(StoreError::Duplicate(UniqueField::Email)) => {
                warn!(email = %email, "email already registered");
                return Err(AuthError::DuplicateEmail(email));
            }
            Err(StoreError::Duplicate(UniqueField::MemberNumber)) => {
                warn!(?member_number, "member number already registered");
                // the store only reports this field when it was provided
                return Err(AuthError::DuplicateMemberNumber(
                    member_number.unwrap_or_default(),
                ));
            }
            Err(e) => return Err(storage_error("insert", e)),
        };

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.into())
    }

    /// Registers and immediately issues a session token for the new user.
    pub async fn sign_up(&self, input: RegisterRequest) -> Result<LoginResponse, AuthError> {
        let user = self.register(input).await?;
        let token = self.tokens.issue(user.id)?;
        Ok(LoginResponse { user, token })
    }

    /// Verifies an email/password pair. Unknown email and wrong password
    /// both yield `InvalidCredentials`.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: LoginRequest) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(&credentials.email);

        let user = self
            .store
            .find_by_email(&email)
            .await
            .map_err(|e| storage_error("find_by_email", e))?;

        let Some(user) = user else {
            // burn the same verify cost as a real account
            let _ = self
                .hasher
                .verify(&credentials.password, self.hasher.dummy_hash());
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(&credentials.password, &user.password_hash)? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginResponse {
            user: user.into(),
            token,
        })
    }

    /// Resolves a bearer token to an active user.
    pub async fn resolve_session(&self, token: &str) -> Result<PublicUser, AuthError> {
        let claims = self.tokens.verify(token).map_err(|e| {
            debug!(reason = %e, "token rejected");
            AuthError::Unauthenticated
        })?;

        let user = self
            .find_active(claims.sub)
            .await?
            .ok_or(AuthError::Unauthenticated)?;
        Ok(user.into())
    }

    /// Issues a fresh token for an already authenticated user.
    pub fn refresh_session(&self, user: &PublicUser) -> Result<LoginResponse, AuthError> {
        let token = self.tokens.issue(user.id)?;
        Ok(LoginResponse {
            user: user.clone(),
            token,
        })
    }

    pub async fn list_users(&self) -> Result<Vec<PublicUser>, AuthError> {
        let users = self
            .store
            .list()
            .await
            .map_err(|e| storage_error("list", e))?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    async fn find_active(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| storage_error("find_by_id", e))?;
        match user {
            Some(u) if u.is_active => Ok(Some(u)),
            Some(u) => {
                debug!(user_id = %u.id, "session for inactive user");
                Ok(None)
            }
            None => {
                debug!(user_id = %id, "session for unknown user");
                Ok(None)
            }
        }
    }
}

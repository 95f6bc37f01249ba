use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{error::AuthError, repo_types::User};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Request body for user registration.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub member_number: Option<i64>,
}

impl RegisterRequest {
    /// Normalises the email and checks the input shape.
    pub fn validate(&mut self) -> Result<(), AuthError> {
        self.email = normalize_email(&self.email);
        self.name = self.name.trim().to_string();
        self.last_name = self
            .last_name
            .take()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if self.name.is_empty() {
            return Err(AuthError::Validation("name is required"));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation("email is invalid"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation("password must be at least 6 characters"));
        }
        Ok(())
    }
}

/// Request body for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after login, sign-up or token check.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_number: Option<i64>,
    pub roles: Vec<String>,
    pub is_active: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            last_name: user.last_name,
            member_number: user.member_number,
            roles: user.roles,
            is_active: user.is_active,
        }
    }
}

use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use claims::Claims;
pub use dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest};
pub use error::AuthError;
pub use extractors::CurrentUser;
pub use services::AuthService;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUserRecord, User};

/// Column that tripped a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    MemberNumber,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0:?}")]
    Duplicate(UniqueField),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUserRecord) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// All users, oldest first.
    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

const USER_COLUMNS: &str =
    "id, email, name, last_name, member_number, password_hash, is_active, roles, created_at";

pub const EMAIL_CONSTRAINT: &str = "users_email_key";
pub const MEMBER_NUMBER_CONSTRAINT: &str = "users_member_number_key";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<UniqueField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    match db_err.constraint() {
        Some(EMAIL_CONSTRAINT) => Some(UniqueField::Email),
        Some(MEMBER_NUMBER_CONSTRAINT) => Some(UniqueField::MemberNumber),
        _ => None,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUserRecord) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, name, last_name, member_number, password_hash, roles)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.last_name)
            .bind(user.member_number)
            .bind(&user.password_hash)
            .bind(&user.roles)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(field) => StoreError::Duplicate(field),
                None => StoreError::Backend(anyhow::Error::new(e).context("insert user")),
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.db)
            .await
            .context("list users")?;
        Ok(users)
    }
}

/// In-process store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the active flag; returns false when the user does not exist.
    pub async fn set_active(&self, id: Uuid, active: bool) -> bool {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUserRecord) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if new.member_number.is_some()
            && users.values().any(|u| u.member_number == new.member_number)
        {
            return Err(StoreError::Duplicate(UniqueField::MemberNumber));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            last_name: new.last_name,
            member_number: new.member_number,
            password_hash: new.password_hash,
            is_active: true,
            roles: new.roles,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    fn record(email: &str, member_number: Option<i64>) -> NewUserRecord {
        NewUserRecord {
            email: email.into(),
            name: "Ana".into(),
            last_name: None,
            member_number,
            password_hash: "$argon2id$placeholder".into(),
            roles: vec!["user".into()],
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_defaults() {
        let store = MemoryUserStore::new();
        let user = store.insert(record("ana@x.com", None)).await.unwrap();
        assert!(user.is_active);
        assert_eq!(user.roles, vec!["user".to_string()]);
        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, "ana@x.com");
        let by_email = store.find_by_email("ana@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        let first = store.insert(record("ana@x.com", None)).await.unwrap();
        let err = store.insert(record("ana@x.com", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.find_by_email("ana@x.com").await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn member_number_unique_only_when_present() {
        let store = MemoryUserStore::new();
        store.insert(record("a@x.com", None)).await.unwrap();
        store.insert(record("b@x.com", None)).await.unwrap();
        store.insert(record("c@x.com", Some(7))).await.unwrap();
        let err = store.insert(record("d@x.com", Some(7))).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::MemberNumber)));
    }

    #[tokio::test]
    async fn set_active_updates_existing_only() {
        let store = MemoryUserStore::new();
        let user = store.insert(record("ana@x.com", None)).await.unwrap();
        assert!(store.set_active(user.id, false).await);
        assert!(!store.find_by_id(user.id).await.unwrap().unwrap().is_active);
        assert!(!store.set_active(Uuid::new_v4(), false).await);
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn db_error(code: &'static str, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(TestDbError {
            code: Some(code),
            constraint,
        }))
    }

    #[test]
    fn unique_violation_maps_named_constraints() {
        assert_eq!(
            unique_violation(&db_error("23505", Some(EMAIL_CONSTRAINT))),
            Some(UniqueField::Email)
        );
        assert_eq!(
            unique_violation(&db_error("23505", Some(MEMBER_NUMBER_CONSTRAINT))),
            Some(UniqueField::MemberNumber)
        );
    }

    #[test]
    fn unique_violation_ignores_other_constraints_and_codes() {
        assert_eq!(unique_violation(&db_error("23505", Some("users_pkey"))), None);
        assert_eq!(unique_violation(&db_error("23505", None)), None);
        assert_eq!(unique_violation(&db_error("23503", Some(EMAIL_CONSTRAINT))), None);
        assert_eq!(unique_violation(&sqlx::Error::RowNotFound), None);
    }
}

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::repo_types::{ActivationToken, NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let constraint = db.constraint().unwrap_or("unique").to_string();
                return StoreError::Conflict(constraint);
            }
        }
        StoreError::Database(e)
    }
}

/// Unit of work used by registration. Dropping it without `commit` rolls back.
#[async_trait]
pub trait RegistrationTx: Send {
    async fn insert_user(&mut self, new_user: &NewUser) -> Result<User, StoreError>;

    async fn insert_activation_token(
        &mut self,
        user_id: i64,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<ActivationToken, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Persistent user and activation token records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn exists_by_email_or_username(
        &self,
        email: &str,
        username: Option<&str>,
    ) -> Result<bool, StoreError>;

    async fn begin_registration(&self) -> Result<Box<dyn RegistrationTx>, StoreError>;

    /// Inserts the user and its activation token; both rows or neither.
    async fn create_user_and_activation_token(
        &self,
        new_user: &NewUser,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(User, ActivationToken), StoreError> {
        let mut tx = self.begin_registration().await?;
        let user = tx.insert_user(new_user).await?;
        let activation = tx.insert_activation_token(user.id, token, expires_at).await?;
        tx.commit().await?;
        Ok((user, activation))
    }

    async fn find_activation_token(
        &self,
        token: &str,
    ) -> Result<Option<ActivationToken>, StoreError>;

    async fn find_activation_token_for_user(
        &self,
        user_id: i64,
    ) -> Result<Option<ActivationToken>, StoreError>;

    /// Sets `active` and deletes the user's activation token in one transaction.
    async fn activate_user(&self, user_id: i64) -> Result<User, StoreError>;

    async fn replace_activation_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<ActivationToken, StoreError>;

    /// Stores a new hash and bumps `token_version`; returns the new version.
    async fn update_credentials(&self, user_id: i64, password_hash: &str)
        -> Result<i32, StoreError>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

pub struct PgRegistrationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RegistrationTx for PgRegistrationTx {
    async fn insert_user(&mut self, new_user: &NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, lastname, email, username, password_hash, roles, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, lastname, email, username, password_hash, roles, location,
                      active, token_version, created_at, updated_at
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.lastname)
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.roles)
        .bind(&new_user.location)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn insert_activation_token(
        &mut self,
        user_id: i64,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<ActivationToken, StoreError> {
        let activation = sqlx::query_as::<_, ActivationToken>(
            r#"
            INSERT INTO activation_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(activation)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        debug!("registration transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, lastname, email, username, password_hash, roles, location,
                   active, token_version, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, lastname, email, username, password_hash, roles, location,
                   active, token_version, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, lastname, email, username, password_hash, roles, location,
                   active, token_version, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn exists_by_email_or_username(
        &self,
        email: &str,
        username: Option<&str>,
    ) -> Result<bool, StoreError> {
        // NULL username never matches, so a missing one only checks the email.
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users WHERE email = $1 OR username = $2
            )
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn begin_registration(&self) -> Result<Box<dyn RegistrationTx>, StoreError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgRegistrationTx { tx }))
    }

    async fn find_activation_token(
        &self,
        token: &str,
    ) -> Result<Option<ActivationToken>, StoreError> {
        let row = sqlx::query_as::<_, ActivationToken>(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM activation_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_activation_token_for_user(
        &self,
        user_id: i64,
    ) -> Result<Option<ActivationToken>, StoreError> {
        let row = sqlx::query_as::<_, ActivationToken>(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM activation_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn activate_user(&self, user_id: i64) -> Result<User, StoreError> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET active = TRUE, updated_at = now()
             WHERE id = $1
            RETURNING id, name, lastname, email, username, password_hash, roles, location,
                      active, token_version, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        sqlx::query("DELETE FROM activation_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn replace_activation_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<ActivationToken, StoreError> {
        let mut tx = self.db.begin().await?;

        // Row lock serializes concurrent replacements for the same user.
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

        sqlx::query("DELETE FROM activation_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let activation = sqlx::query_as::<_, ActivationToken>(
            r#"
            INSERT INTO activation_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(activation)
    }

    async fn update_credentials(
        &self,
        user_id: i64,
        password_hash: &str,
    ) -> Result<i32, StoreError> {
        // Single statement: the row lock serializes concurrent increments.
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
               SET password_hash = $2,
                   token_version = token_version + 1,
                   updated_at = now()
             WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await?;
        version.ok_or(StoreError::NotFound)
    }
}

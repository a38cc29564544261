//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::map_unique;
use crate::error::{Result, ServerError};
use crate::user::User;

pub const EMAIL_CONFLICT: &str = "Email is already exists";
pub const PHONE_CONFLICT: &str = "Phone number is already exists";

/// Persistence port for user accounts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new [`User`]. `Conflict` on duplicated email or phone.
    async fn insert(&self, user: &User) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>>;

    async fn list(&self) -> Result<Vec<User>>;

    /// Save every mutable field of `user`.
    async fn update(&self, user: &User) -> Result<()>;

    /// Hard delete, cascading to sessions and diaries.
    ///
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Raw `users` row.
#[derive(Clone, Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub full_name: String,
    pub is_active: bool,
    pub role: String,
    pub photo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ServerError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = row.role.parse().map_err(|details| {
            ServerError::CorruptRecord {
                collection: "user",
                id: row.id.to_string(),
                details,
            }
        })?;

        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password,
            phone: row.phone,
            full_name: row.full_name,
            is_active: row.is_active,
            role,
            photo: row.photo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn conflict(constraint: &str) -> String {
    if constraint.contains("phone") {
        PHONE_CONFLICT.to_owned()
    } else {
        EMAIL_CONFLICT.to_owned()
    }
}

const SELECT_USER: &str = r#"SELECT id, email, password, phone, full_name, is_active, role, photo, created_at, updated_at
    FROM users"#;

/// PostgreSQL [`CredentialStore`].
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new [`PgCredentialStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Option<User>> {
        let query = format!("{SELECT_USER} WHERE {field} = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (id, email, password, phone, full_name, is_active, role, photo, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.role.to_string())
        .bind(&user.photo)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_unique(err, conflict))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("{SELECT_USER} WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by("email", email).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.find_by("phone", phone).await
    }

    async fn list(&self) -> Result<Vec<User>> {
        let query = format!("{SELECT_USER} ORDER BY created_at");
        sqlx::query_as::<_, UserRow>(&query)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"UPDATE users
                SET email = $1, password = $2, phone = $3, full_name = $4, is_active = $5, role = $6, photo = $7, updated_at = $8
                WHERE id = $9"#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.role.to_string())
        .bind(&user.photo)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(|err| map_unique(err, conflict))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            password: None,
            phone: None,
            full_name: "Alice".into(),
            is_active: true,
            role: role.into(),
            photo: "default.png".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_into_user() {
        let user = User::try_from(row("ADMIN")).unwrap();
        assert!(user.is_admin());
    }

    #[test]
    fn test_corrupted_role() {
        assert!(matches!(
            User::try_from(row("SUPERUSER")),
            Err(ServerError::CorruptRecord {
                collection: "user",
                ..
            })
        ));
    }

    #[test]
    fn test_conflict_message() {
        assert_eq!(conflict("users_phone_key"), PHONE_CONFLICT);
        assert_eq!(conflict("users_email_key"), EMAIL_CONFLICT);
    }
}

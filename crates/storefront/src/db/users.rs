//! User repository for database operations.
//!
//! Queries are checked at runtime (`sqlx::query_as` + `FromRow`), so the crate
//! builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use estore_core::{CartId, Email, Role, UserId};

use super::{RepositoryError, UserStore, map_unique_violation, parse_email_column};
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, email, first_name, last_name, age, role, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    first_name: String,
    last_name: String,
    age: Option<i32>,
    role: Role,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: parse_email_column(&r.email)?,
            first_name: r.first_name,
            last_name: r.last_name,
            age: r.age,
            role: r.role,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Postgres-backed [`UserStore`].
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn id_for(&self, email: &Email) -> Result<Option<UserId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, UserId>("SELECT id FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (email, first_name, last_name, age, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.email.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.age)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        row.try_into()
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        Ok(Some((r.user.try_into()?, r.password_hash)))
    }

    async fn role_of(&self, email: &Email) -> Result<Option<Role>, RepositoryError> {
        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn attach_cart(
        &self,
        email: &Email,
        cart: CartId,
    ) -> Result<Vec<CartId>, RepositoryError> {
        let user_id = self.id_for(email).await?.ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            r"
            INSERT INTO user_carts (user_id, cart_id)
            VALUES ($1, $2)
            ON CONFLICT (cart_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(cart)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        let holder =
            sqlx::query_scalar::<_, UserId>("SELECT user_id FROM user_carts WHERE cart_id = $1")
                .bind(cart)
                .fetch_optional(&self.pool)
                .await?;
        if holder != Some(user_id) {
            return Err(RepositoryError::Conflict(format!(
                "cart {cart} belongs to another user"
            )));
        }

        let carts = sqlx::query_scalar::<_, CartId>(
            "SELECT cart_id FROM user_carts WHERE user_id = $1 ORDER BY attached_at, cart_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(carts)
    }
}

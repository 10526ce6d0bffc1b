//! User repository

use chrono::Utc;
use safewatch_common::types::{PageParams, UserId};
use safewatch_common::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

use super::like_pattern;
use crate::db::{db_failure, is_unique_violation};
use crate::models::{CreateUser, Role, UpdateUser, User, UserFilter, UserStatus};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, input: CreateUser, password_hash: String) -> Result<User> {
        let id = Uuid::now_v7();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, role, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.username)
        .bind(&input.email)
        .bind(&password_hash)
        .bind(&input.full_name)
        .bind(&input.role)
        .bind(&input.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("Username or email already exists")
            } else {
                db_failure("Failed to create user")(e)
            }
        })
    }

    /// Get a user by ID
    pub async fn get(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("Failed to get user"))
    }

    /// Find a user by username or email (case-insensitive)
    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_failure("Failed to look up user"))
    }

    /// Check whether a username is taken
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to check username"))?;
        Ok(row.0)
    }

    /// Check whether an email is taken by someone other than `exclude`
    pub async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to check email"))?;
        Ok(row.0)
    }

    /// List users matching a filter, newest first, with the total match count
    pub async fn list(&self, filter: &UserFilter, page: PageParams) -> Result<(Vec<User>, i64)> {
        let search = like_pattern(filter.search.as_deref());
        let status = filter.status.map(|s| s.to_string());

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1 OR email ILIKE $1 OR full_name ILIKE $1)
              AND ($2::text IS NULL OR role = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&search)
        .bind(&filter.role)
        .bind(&status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_failure("Failed to list users"))?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL OR username ILIKE $1 OR email ILIKE $1 OR full_name ILIKE $1)
              AND ($2::text IS NULL OR role = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(&search)
        .bind(&filter.role)
        .bind(&status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to count users"))?;

        Ok((users, total.0))
    }

    /// Apply a partial update; `password_hash` replaces the stored hash when set
    pub async fn update(
        &self,
        id: UserId,
        input: UpdateUser,
        password_hash: Option<String>,
    ) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                role = COALESCE($4, role),
                phone = COALESCE($5, phone),
                status = COALESCE($6, status),
                password_hash = COALESCE($7, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.role)
        .bind(&input.phone)
        .bind(input.status.map(|s| s.to_string()))
        .bind(&password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict("Email already exists")
            } else {
                db_failure("Failed to update user")(e)
            }
        })
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to record login"))?;
        Ok(())
    }

    /// Whether the user authored campaigns or alerts that must keep their author
    pub async fn has_authored_records(&self, id: UserId) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM campaigns WHERE created_by = $1)
                OR EXISTS (SELECT 1 FROM sms_alerts WHERE created_by = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("Failed to check user dependencies"))?;
        Ok(row.0)
    }

    /// Soft delete: mark the user inactive
    pub async fn deactivate(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(UserStatus::Inactive.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to deactivate user"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete
    pub async fn delete(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_failure("Failed to delete user"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Count all users
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to count users"))?;
        Ok(row.0)
    }

    /// List the seeded roles
    pub async fn roles(&self) -> Result<Vec<Role>> {
        sqlx::query_as::<_, Role>("SELECT name, description FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("Failed to list roles"))
    }

    /// Check that a role exists
    pub async fn role_exists(&self, name: &str) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM roles WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("Failed to check role"))?;
        Ok(row.0)
    }
}

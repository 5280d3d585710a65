//! Users repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, User, UserQuery, UserShort},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by username (primary authentication lookup)
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// List users with optional name filter
    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let name = query
            .name
            .as_deref()
            .map(|n| format!("%{}%", n))
            .unwrap_or_else(|| "%".to_string());

        let users = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT id, username, name, role, unpaid_fines, active_loans
            FROM users
            WHERE name ILIKE $1
            ORDER BY name
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&name)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE name ILIKE $1")
            .bind(&name)
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Create a new user with an already-hashed password
    pub async fn create(&self, user: &CreateUser, password_hash: &str) -> AppResult<User> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
                .bind(&user.username)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            return Err(AppError::Conflict(format!(
                "Username {} already exists",
                user.username
            )));
        }

        let role = user.role.unwrap_or(crate::models::UserRole::Member);

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, name, email, phone, address, role,
                               unpaid_fines, lifetime_fines, active_loans,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, 0, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(password_hash)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update profile fields (password already hashed by the caller)
    pub async fn update_profile(
        &self,
        id: i32,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
        password_hash: Option<&str>,
    ) -> AppResult<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                password = COALESCE($5, password),
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(address)
        .bind(password_hash)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        Ok(updated)
    }

    /// Set the profile photo URL
    pub async fn set_photo(&self, id: i32, photo_url: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET photo_url = $1, updated_at = NOW() WHERE id = $2")
            .bind(photo_url)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// IDs of all admin accounts, for fanout of review-queue events
    pub async fn admin_ids(&self) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar("SELECT id FROM users WHERE role = 'admin'")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

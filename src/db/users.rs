// User storage
//
// Account records with bcrypt password hashes and a stored role name.

use crate::auth::Role;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;

/// User record from database
#[derive(Clone, Debug)]
pub struct DbUser {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

fn user_from_row(row: &Row) -> DbUser {
    let role: String = row.get(3);
    DbUser {
        id: row.get(0),
        username: row.get(1),
        password_hash: row.get(2),
        role: Role::from_db(&role),
        created_at: row.get(4),
    }
}

/// User service for database operations
pub struct UserService {
    pool: Pool,
}

impl UserService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new user account
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<DbUser, AppError> {
        let client = self.pool.get().await?;

        let now = Utc::now();
        let row = client
            .query_one(
                "INSERT INTO users (username, password_hash, role, created_at)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, username, password_hash, role, created_at",
                &[&username, &password_hash, &role.as_str(), &now],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::Conflict("User already exists".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        Ok(user_from_row(&row))
    }

    /// Find user by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<DbUser>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, username, password_hash, role, created_at
                 FROM users WHERE username = $1",
                &[&username],
            )
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i32) -> Result<Option<DbUser>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, username, password_hash, role, created_at
                 FROM users WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

//! Authentication route handlers
//!
//! Signup, login and current-user endpoints.

use crate::auth::{create_token, hash_password, verify_password, AccessToken, Claims, Role};
use crate::db::DbUser;
use crate::error::{validation_error, AppError};
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 80, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl From<&DbUser> for UserResponse {
    fn from(user: &DbUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserResponse,
    pub token: AccessToken,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserResponse,
}

// ============================================
// Route Handlers
// ============================================

/// POST /api/auth/signup
///
/// Register a new account. The role defaults to viewer.
pub async fn signup(
    State(state): State<SharedState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let password_hash = hash_password(&req.password)?;
    let role = req.role.unwrap_or_default();

    let user = state.users.create(&req.username, &password_hash, role).await?;

    state
        .audit
        .record("User Signup", "User", user.id, user.id)
        .await?;

    info!(user_id = user.id, username = %user.username, "user registered");

    let token = create_token(user.id, &user.username, user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user: UserResponse::from(&user),
            token,
        }),
    ))
}

/// POST /api/auth/login
///
/// Authenticate with username and password, receive a bearer token.
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    let token = create_token(user.id, &user.username, user.role)?;

    Ok(Json(AuthResponse {
        success: true,
        user: UserResponse::from(&user),
        token,
    }))
}

/// GET /api/auth/me
///
/// Current user info from the validated token.
pub async fn me(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    Ok(Json(MeResponse {
        success: true,
        user: UserResponse::from(&user),
    }))
}

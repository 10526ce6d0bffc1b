//! Auth handlers (`/api/auth`)

use axum::{extract::State, http::Method, response::IntoResponse};
use chrono::{DateTime, Utc};
use safewatch_common::types::UserId;
use safewatch_common::Error;
use safewatch_core::password::verify_password;
use safewatch_storage::models::User;
use safewatch_storage::repository::UserRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::AppState;
use crate::request::ApiRequest;
use crate::response::{ApiResponse, ApiResult};

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    /// Username or email
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: UserId,
    pub username: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn handle(State(state): State<Arc<AppState>>, req: ApiRequest) -> ApiResult {
    match (req.method(), req.action().unwrap_or("")) {
        (&Method::POST, "login") => login(&state, &req).await,
        (&Method::POST, "logout") => logout(&state, &req),
        (&Method::GET, "profile") => profile(&state, &req).await,
        (&Method::GET, "verify") => verify(&state, &req),
        _ => Err(req.unknown_action()),
    }
}

fn invalid_credentials() -> Error {
    Error::Auth("Invalid username or password".to_string())
}

/// Check credentials and issue a token; shared with `users?action=login`
pub async fn login(state: &AppState, req: &ApiRequest) -> ApiResult {
    let body: LoginRequest = req.body()?;
    let login = body.username.trim();
    if login.is_empty() || body.password.is_empty() {
        return Err(Error::validation("Username and password are required").into());
    }

    let users = UserRepository::new(state.db_pool.pool().clone());
    let Some(user) = users.find_by_login(login).await? else {
        warn!(login = %login, "Login failed: unknown user");
        return Err(invalid_credentials().into());
    };

    if !verify_password(&body.password, &user.password_hash)? {
        warn!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid_credentials().into());
    }
    if !user.is_active() {
        warn!(user_id = %user.id, "Login refused: account inactive");
        return Err(Error::Auth("Account is inactive".to_string()).into());
    }

    users.touch_last_login(user.id).await?;
    let issued = state.tokens.issue(&user)?;

    info!(user_id = %user.id, username = %user.username, "User logged in");
    Ok(ApiResponse::ok(LoginResponse {
        token: issued.token,
        token_type: issued.token_type,
        expires_at: issued.expires_at,
        user,
    })
    .with_message("Login successful")
    .into_response())
}

/// Tokens are stateless; logout only confirms the caller was signed in
fn logout(state: &AppState, req: &ApiRequest) -> ApiResult {
    let auth = state.authenticate(req)?;
    info!(user_id = %auth.user_id, "User logged out");
    Ok(ApiResponse::message("Logged out").into_response())
}

async fn profile(state: &AppState, req: &ApiRequest) -> ApiResult {
    let (_, user) = state.authenticate_active(req).await?;
    Ok(ApiResponse::ok(user).into_response())
}

fn verify(state: &AppState, req: &ApiRequest) -> ApiResult {
    let auth = state.authenticate(req)?;
    Ok(ApiResponse::ok(VerifyResponse {
        valid: true,
        user_id: auth.user_id,
        username: auth.username,
        role: auth.role,
        expires_at: auth.expires_at,
    })
    .into_response())
}

//! Authentication module

use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use safewatch_common::types::UserId;
use safewatch_common::{Config, Error, Result};
use safewatch_core::{AlertManager, SmsGateway};
use safewatch_storage::models::User;
use safewatch_storage::repository::UserRepository;
use safewatch_storage::{DatabasePool, SmsAlertRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::request::ApiRequest;
use crate::response::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub alerts: Arc<AlertManager<SmsAlertRepository>>,
}

impl AppState {
    pub fn new(db_pool: DatabasePool, config: Config, gateway: Arc<dyn SmsGateway>) -> Self {
        let store = Arc::new(SmsAlertRepository::new(db_pool.pool().clone()));
        let alerts = Arc::new(AlertManager::new(
            store,
            gateway,
            config.sms.cost_per_message,
        ));
        let tokens = TokenService::new(&config.auth.token_secret, config.auth.token_ttl_hours);

        Self {
            db_pool,
            config: Arc::new(config),
            tokens,
            alerts,
        }
    }

    /// The caller's identity; fails when no valid bearer token was sent
    pub fn authenticate(&self, req: &ApiRequest) -> Result<AuthContext> {
        if let Some(auth) = req.auth() {
            return Ok(auth.clone());
        }
        let token = req
            .bearer()
            .ok_or_else(|| Error::Auth("Authentication required".to_string()))?;
        self.tokens.verify(token)
    }

    /// Like [`AppState::authenticate`], but the account must still exist and be
    /// active. Tokens stay signed until they expire, so calls that act on the
    /// caller's own account check the stored status.
    pub async fn authenticate_active(&self, req: &ApiRequest) -> Result<(AuthContext, User)> {
        let auth = self.authenticate(req)?;
        let user = UserRepository::new(self.db_pool.pool().clone())
            .get(auth.user_id)
            .await?;
        Ok((auth, check_account(user)?))
    }

    /// The caller's user id when a valid token was sent, for `created_by` columns
    pub fn actor(&self, req: &ApiRequest) -> Option<UserId> {
        self.authenticate(req).ok().map(|auth| auth.user_id)
    }
}

fn check_account(user: Option<User>) -> Result<User> {
    match user {
        Some(user) if user.is_active() => Ok(user),
        Some(_) => Err(Error::Auth("Account is inactive".to_string())),
        None => Err(Error::Auth("Account no longer exists".to_string())),
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub username: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<Claims> for AuthContext {
    type Error = Error;

    fn try_from(claims: Claims) -> Result<Self> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Auth("Invalid token subject".to_string()))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| Error::Auth("Invalid token expiry".to_string()))?;

        Ok(Self {
            user_id,
            username: claims.username,
            role: claims.role,
            expires_at,
        })
    }
}

/// A freshly signed token
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// HS256 token signing and verification
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Sign a token for `user` valid for the configured lifetime
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        Ok(IssuedToken {
            token: self.sign(&claims)?,
            token_type: "Bearer",
            expires_at,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Check signature and expiry, and return the caller
    pub fn verify(&self, token: &str) -> Result<AuthContext> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => Error::Auth("Token expired".to_string()),
                    _ => Error::Auth("Invalid token".to_string()),
                }
            })?;

        AuthContext::try_from(claims)
    }
}

/// `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Login is the one `/api` call that cannot carry a token
fn is_login(request: &Request) -> bool {
    let path = request.uri().path();
    if !(path.ends_with("/auth") || path.ends_with("/users")) {
        return false;
    }
    Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .map(|Query(q)| q.get("action").map(String::as_str) == Some("login"))
        .unwrap_or(false)
}

/// Reject `/api` requests without a valid bearer token (when `auth.require_auth` is on)
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_login(&request) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(request.headers()) else {
        warn!("Missing bearer token in request to {}", request.uri().path());
        return ApiError(Error::Auth("Authentication required".to_string())).into_response();
    };

    match state.tokens.verify(token) {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(e) => {
            warn!("Rejected token in request to {}: {}", request.uri().path(), e);
            ApiError(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "dispatcher".to_string(),
            email: "dispatch@city.gov".to_string(),
            password_hash: String::new(),
            full_name: "Duty Dispatcher".to_string(),
            role: "manager".to_string(),
            phone: None,
            status: "active".to_string(),
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let tokens = TokenService::new("test-secret", 24);
        let user = user();
        let issued = tokens.issue(&user).unwrap();
        assert_eq!(issued.token_type, "Bearer");

        let auth = tokens.verify(&issued.token).unwrap();
        assert_eq!(auth.user_id, user.id);
        assert_eq!(auth.username, "dispatcher");
        assert_eq!(auth.role, "manager");
        assert_eq!(auth.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = TokenService::new("one", 24).issue(&user()).unwrap();
        let err = TokenService::new("two", 24).verify(&issued.token).unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new("test-secret", 24);
        let past = Utc::now() - Duration::hours(2);
        let token = tokens
            .sign(&Claims {
                sub: Uuid::new_v4().to_string(),
                username: "old".to_string(),
                role: "viewer".to_string(),
                iat: (past - Duration::hours(1)).timestamp(),
                exp: past.timestamp(),
            })
            .unwrap();

        assert_eq!(tokens.verify(&token).unwrap_err().to_string(), "Token expired");
    }

    #[test]
    fn test_retired_accounts_lose_access() {
        let active = user();
        assert_eq!(check_account(Some(active.clone())).unwrap().id, active.id);

        let mut inactive = user();
        inactive.status = "inactive".to_string();
        let err = check_account(Some(inactive)).unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Account is inactive");

        let err = check_account(None).unwrap_err();
        assert_eq!(err.to_string(), "Account no longer exists");
    }

    #[test]
    fn test_bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}

//! SafeWatch API - REST API server
//!
//! This crate provides the HTTP surface of SafeWatch: one path per resource
//! under `/api`, with the operation chosen by the method and the `action`
//! query parameter, plus token authentication and health checks.

pub mod auth;
pub mod handlers;
pub mod request;
pub mod response;
pub mod routes;

pub use auth::{AppState, AuthContext, TokenService};
pub use routes::create_router;

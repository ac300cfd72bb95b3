//! HTTP interface of Alertline.
//!
//! Serves the report intake and query endpoints on axum. Every route except
//! `/api/health` goes through [`auth::auth_middleware`], and every response
//! body uses the [`models::ApiResponse`] envelope.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod server;
pub mod shutdown;

pub use auth::{hash_token, AuthUser, Authenticator};
pub use config::Config;
pub use server::{create_router, run, RouterLimits, ServerState, Service};

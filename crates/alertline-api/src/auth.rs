//! Request authentication.
//!
//! Identities are resolved in this order:
//! 1. no `[auth]` section: anonymous, no user id
//! 2. the configured remote user header, set by a trusted proxy
//! 3. the `x-alertline-token` header, holding the sha256 hex of a client token
//! 4. the fallback user id, if configured
//!
//! Anything else is rejected with 401.

use std::collections::HashMap;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use sha2::{Digest, Sha256};

use alertline_core::config::headers;
use alertline_core::UserId;

use crate::config::{ApiToken, AuthConfig};
use crate::models::ErrorResponse;
use crate::server::ServerState;

/// Hex sha256 digest of a raw API token, as stored in `token_hash`.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// The caller of a request, stored in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthUser {
    pub user_id: Option<UserId>,
    pub name: Option<String>,
    pub client_id: Option<String>,
}

impl AuthUser {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Auth settings prepared for lookups.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: Option<AuthConfig>,
    tokens: HashMap<String, ApiToken>,
}

impl Authenticator {
    pub fn new(config: Option<AuthConfig>) -> Self {
        let tokens = config
            .iter()
            .flat_map(|c| c.api_tokens.iter())
            .map(|t| (t.token_hash.to_ascii_lowercase(), t.clone()))
            .collect();
        Self { config, tokens }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn authenticate(&self, request_headers: &HeaderMap) -> Result<AuthUser, ErrorResponse> {
        let Some(config) = &self.config else {
            return Ok(AuthUser::anonymous());
        };

        if let Some(header) = config.remote_user_header.as_deref() {
            if let Some(name) = header_value(request_headers, header) {
                let user_id = config.users.get(name).copied();
                if user_id.is_none() {
                    tracing::debug!(category = "auth", user = name, "Remote user has no user id");
                }
                return Ok(AuthUser {
                    user_id,
                    name: Some(name.to_string()),
                    client_id: None,
                });
            }
        }

        if let Some(hash) = header_value(request_headers, headers::API_TOKEN) {
            return match self.tokens.get(&hash.to_ascii_lowercase()) {
                Some(token) => Ok(AuthUser {
                    user_id: token.user_id,
                    name: None,
                    client_id: Some(token.client_id.clone()),
                }),
                None => {
                    tracing::warn!(category = "auth", "Rejected unknown API token");
                    Err(ErrorResponse::unauthorized("invalid API token"))
                }
            };
        }

        match config.fallback_user_id {
            Some(user_id) => Ok(AuthUser {
                user_id: Some(user_id),
                ..AuthUser::default()
            }),
            None => Err(ErrorResponse::unauthorized(format!(
                "missing credentials, send the {} header",
                headers::API_TOKEN
            ))),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the caller and store an [`AuthUser`] in the request extensions.
pub async fn auth_middleware(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let user = state.auth.authenticate(req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

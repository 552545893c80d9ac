//! Request middleware for the envmon-service API.
//!
//! This module provides middleware for:
//! - Account token authentication
//! - Optional token checks on sensor and station writes
//! - Legacy error status collapsing

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use envmon_types::Account;
use tracing::warn;

use crate::api::{AppError, CollapsibleError};
use crate::config::ErrorMode;
use crate::state::AppState;

/// The authenticated account, available to handlers behind [`require_account`].
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

/// Read the API token from the `Authorization` header.
///
/// Both a bare token and `Bearer <token>` are accepted.
pub fn request_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let token = match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value.trim(),
    };
    (!token.is_empty()).then_some(token)
}

async fn authenticate(state: &AppState, mut request: Request, next: Next) -> Response {
    let token = request_token(request.headers()).unwrap_or_default().to_string();

    match state.accounts.authenticate(&token).await {
        Ok(account) => {
            request.extensions_mut().insert(CurrentAccount(account));
            next.run(request).await
        }
        Err(e) => {
            warn!("Token authentication failed for {}", request.uri().path());
            AppError::from(e).into_response()
        }
    }
}

/// Token authentication middleware.
///
/// Returns 401 Unauthorized if the token is missing or unknown.
pub async fn require_account(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    authenticate(&state, request, next).await
}

/// Authenticate mutating requests when `security.require_token_for_writes` is set.
pub async fn guard_writes(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let safe = [Method::GET, Method::HEAD, Method::OPTIONS].contains(request.method());
    if safe || !state.config.security.require_token_for_writes {
        return next.run(request).await;
    }

    authenticate(&state, request, next).await
}

/// Rewrite error statuses to 400 in [`ErrorMode::Legacy`].
///
/// Only responses produced from an [`AppError`] other than an
/// authentication failure are touched.
pub async fn collapse_error_status(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if state.config.server.error_mode == ErrorMode::Legacy
        && response.extensions().get::<CollapsibleError>().is_some()
    {
        *response.status_mut() = StatusCode::BAD_REQUEST;
    }

    response
}

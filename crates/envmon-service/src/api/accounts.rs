//! Account endpoints: registration, login and token management.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    response::IntoResponse,
    routing::{delete, get, post},
};
use envmon_types::{Account, Base};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{AppError, ListParams, json_body, paged, parse_id};
use crate::middleware::CurrentAccount;
use crate::state::AppState;

/// Routes open to anonymous callers.
pub(super) fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes that need a valid account token.
pub(super) fn private_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/account", get(current_account))
        .route("/account/regenerateToken", post(regenerate_token))
        // Misspelled alias of regenerateToken.
        .route("/account/regenrateToken", post(regenerate_token))
        .route("/account/changePassword", post(change_password))
        .route("/accounts", get(list_accounts).post(upsert_account))
        .route("/accounts/{account_id}", delete(delete_account))
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

/// Body of `POST /accounts`. `password` is required for new accounts only.
#[derive(Debug, Deserialize)]
pub struct AccountPayload {
    pub id: Option<i64>,
    pub username: String,
    pub password: Option<String>,
}

#[instrument(skip_all)]
async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let credentials = json_body(payload)?;

    let account = state
        .accounts
        .register(&credentials.username, &credentials.password)
        .await?;
    info!("Registered account {}", account.base.id);
    Ok(Json(TokenResponse {
        token: account.token,
    }))
}

#[instrument(skip_all)]
async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let credentials = json_body(payload)?;

    let account = state
        .accounts
        .login(&credentials.username, &credentials.password)
        .await?;
    Ok(Json(TokenResponse {
        token: account.token,
    }))
}

async fn current_account(
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Json<Account> {
    Json(account)
}

#[instrument(skip_all, fields(account_id = account.base.id))]
async fn regenerate_token(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<Json<Account>, AppError> {
    let account = state.accounts.regenerate_token(account.base.id).await?;
    info!("Regenerated token for account {}", account.base.id);
    Ok(Json(account))
}

#[instrument(skip_all, fields(account_id = account.base.id))]
async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Account>, AppError> {
    let request = json_body(payload)?;

    let account = state
        .accounts
        .change_password(account.base.id, &request.new_password)
        .await?;
    info!("Changed password for account {}", account.base.id);
    Ok(Json(account))
}

#[instrument(skip_all)]
async fn list_accounts(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let page = state.accounts.get(&params.page()).await?;
    Ok(paged(page))
}

#[instrument(skip_all, fields(caller_id = caller.base.id))]
async fn upsert_account(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(caller)): Extension<CurrentAccount>,
    payload: Result<Json<AccountPayload>, JsonRejection>,
) -> Result<Json<Account>, AppError> {
    let payload = json_body(payload)?;
    let account = Account {
        base: Base::new(payload.id.unwrap_or(0)),
        username: payload.username,
        token: String::new(),
    };

    let saved = state
        .accounts
        .upsert(&caller, &account, payload.password.as_deref())
        .await?;
    info!("Saved account {}", saved.base.id);
    Ok(Json(saved))
}

#[instrument(skip_all, fields(caller_id = caller.base.id, account_id = %account_id))]
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(caller)): Extension<CurrentAccount>,
    Path(account_id): Path<String>,
) -> Result<Json<()>, AppError> {
    let id = parse_id(&account_id, "account_id")?;

    state.accounts.delete(&caller, id).await?;
    info!("Deleted account {}", id);
    Ok(Json(()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::router;
    use super::super::test_support::*;

    async fn register(app: &axum::Router, username: &str) -> String {
        let response = send(
            app,
            post_json(
                "/api/register",
                json!({"username": username, "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        response_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_register_login_and_current_account() {
        let app = router(create_test_state());
        let first = register(&app, "alice").await;

        let response = send(
            &app,
            post_json(
                "/api/login",
                json!({"username": "alice", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let token = response_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();
        assert_ne!(token, first);

        let response = send(&app, with_token(get_request("/api/account"), &token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["username"], "alice");
        assert_eq!(json["token"], token.as_str());
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_account_requires_token() {
        let app = router(create_test_state());

        let response = send(&app, get_request("/api/account")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["error"], "invalid or missing token");

        let response = send(&app, with_token(get_request("/api/accounts"), "bogus")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_login_is_unauthorized() {
        let app = router(create_test_state());
        register(&app, "alice").await;

        let response = send(
            &app,
            post_json(
                "/api/login",
                json!({"username": "alice", "password": "nope-nope"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let app = router(create_test_state_with(typed_config()));
        register(&app, "alice").await;

        let response = send(
            &app,
            post_json(
                "/api/register",
                json!({"username": "ALICE", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_regenerate_token_both_spellings() {
        let app = router(create_test_state());
        let token = register(&app, "alice").await;

        let response = send(
            &app,
            with_token(post_json("/api/account/regenerateToken", json!({})), &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let second = response_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();
        assert_ne!(second, token);

        let response = send(&app, with_token(get_request("/api/account"), &token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            with_token(post_json("/api/account/regenrateToken", json!({})), &second),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_change_password() {
        let app = router(create_test_state());
        let token = register(&app, "alice").await;

        let response = send(
            &app,
            with_token(
                post_json("/api/account/changePassword", json!({"new_password": "123"})),
                &token,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            with_token(
                post_json(
                    "/api/account/changePassword",
                    json!({"new_password": "better-secret"}),
                ),
                &token,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            post_json(
                "/api/login",
                json!({"username": "alice", "password": "better-secret"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_account_admin_routes() {
        let app = router(create_test_state());
        let token = register(&app, "admin").await;

        let response = send(
            &app,
            with_token(
                post_json(
                    "/api/accounts",
                    json!({"username": "field-tech", "password": "secret1"}),
                ),
                &token,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let created = response_json(response).await;
        let id = created["id"].as_i64().unwrap();
        assert!(created.get("token").is_none());

        let response = send(&app, with_token(get_request("/api/accounts?limit=1"), &token)).await;
        assert_eq!(response.headers()["x-total-count"], "2");
        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert!(json[0].get("token").is_none());

        let response = send(
            &app,
            post_json(
                "/api/login",
                json!({"username": "field-tech", "password": "secret1"}),
            ),
        )
        .await;
        let own_token = response_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string();
        let response = send(
            &app,
            with_token(delete_request(&format!("/api/accounts/{}", id)), &own_token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_body(response).await, "null");

        let response = send(
            &app,
            with_token(delete_request("/api/accounts/zero"), &token),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"], "invalid account_id");
    }

    #[tokio::test]
    async fn test_token_cannot_touch_other_accounts() {
        let app = router(create_test_state_with(typed_config()));
        let intruder = register(&app, "intruder").await;
        let owner = register(&app, "owner").await;

        let response = send(&app, with_token(get_request("/api/account"), &owner)).await;
        let owner_id = response_json(response).await["id"].as_i64().unwrap();

        let response = send(
            &app,
            with_token(
                post_json(
                    "/api/accounts",
                    json!({"id": owner_id, "username": "owner", "password": "stolen1"}),
                ),
                &intruder,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response_json(response).await["error"],
            "cannot modify another account"
        );

        let response = send(
            &app,
            post_json(
                "/api/login",
                json!({"username": "owner", "password": "stolen1"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            with_token(
                delete_request(&format!("/api/accounts/{}", owner_id)),
                &intruder,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&app, with_token(get_request("/api/account"), &owner)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_other_account_changes_are_bad_request_in_legacy_mode() {
        let app = router(create_test_state());
        let intruder = register(&app, "intruder").await;
        register(&app, "owner").await;

        let response = send(&app, with_token(get_request("/api/accounts"), &intruder)).await;
        let json = response_json(response).await;
        let owner_id = json
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["username"] == "owner")
            .unwrap()["id"]
            .as_i64()
            .unwrap();

        let response = send(
            &app,
            with_token(
                delete_request(&format!("/api/accounts/{}", owner_id)),
                &intruder,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response_json(response).await["error"],
            "cannot delete another account"
        );
    }
}

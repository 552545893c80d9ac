//! REST API endpoints for the envmon-service.
//!
//! Handlers are thin: they validate the shape of the request, make one
//! service call and map the outcome to a JSON response.
//!
//! ## Listings
//!
//! `GET` on a collection accepts optional `offset` and `limit` query
//! parameters. Values that are not non-negative integers are ignored. The
//! response body is the requested page and the `X-Total-Count` header carries
//! the size of the whole matching set.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors (`{"error": "..."}`) via
//! [`AppError`]. With the default [`ErrorMode::Legacy`](crate::config::ErrorMode)
//! every failure except authentication is reported as 400 Bad Request;
//! [`ErrorMode::Typed`](crate::config::ErrorMode) keeps the per-kind status.
//!
//! # Example
//!
//! ```ignore
//! use envmon_service::api;
//!
//! let app = api::router(state);
//! ```

mod accounts;
mod sensors;
mod stations;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::{HeaderName, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
};
use envmon_store::PageQuery;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::middleware::{collapse_error_status, guard_writes, require_account};
use crate::services::ServiceError;
use crate::state::AppState;

/// Header carrying the size of the whole matching set on listings.
pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

/// Build the complete application router, mounted under `server.base_path`.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .merge(accounts::public_routes());

    let resources = Router::new()
        .merge(sensors::routes())
        .merge(stations::routes())
        .route_layer(from_fn_with_state(Arc::clone(&state), guard_writes));

    let private = accounts::private_routes()
        .route_layer(from_fn_with_state(Arc::clone(&state), require_account));

    let api = Router::new().merge(public).merge(resources).merge(private);

    let base_path = state.config.server.base_path.as_str();
    let app = if base_path.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base_path, api)
    };

    app.layer(from_fn_with_state(Arc::clone(&state), collapse_error_status))
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Raw paging parameters, parsed leniently by [`ListParams::page`].
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> PageQuery {
        PageQuery {
            limit: lenient(self.limit.as_deref()),
            offset: lenient(self.offset.as_deref()),
        }
    }
}

/// Malformed, negative or out-of-range values count as absent.
fn lenient(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Parse a path or query identifier that must be a positive integer.
pub(crate) fn parse_id(raw: &str, name: &str) -> Result<i64, AppError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::BadRequest(format!("invalid {}", name))),
    }
}

/// Unwrap a JSON body, turning a rejection into a 400 with its message.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Listing response: `X-Total-Count` header plus the page as a JSON array.
pub(crate) fn paged<T: Serialize>(page: envmon_types::Page<T>) -> impl IntoResponse {
    (
        [(TOTAL_COUNT_HEADER, page.total.to_string())],
        Json(page.items),
    )
}

/// Marker attached to error responses that legacy mode reports as 400.
#[derive(Debug, Clone, Copy)]
pub struct CollapsibleError;

/// API error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Forbidden(String),
    Unavailable(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Invalid(msg) => AppError::BadRequest(msg),
            ServiceError::NotFound(msg) => AppError::NotFound(msg),
            ServiceError::Conflict(msg) => AppError::Conflict(msg),
            ServiceError::Unauthorized(msg) => AppError::Unauthorized(msg),
            ServiceError::Forbidden(msg) => AppError::Forbidden(msg),
            ServiceError::Internal(msg) => AppError::Internal(msg),
            e @ ServiceError::Store(_) => {
                tracing::error!("{}", e);
                AppError::Unavailable(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let collapsible = !matches!(self, AppError::Unauthorized(_));
        let message = match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Unavailable(msg)
            | AppError::Internal(msg) => msg,
        };

        let body = serde_json::json!({
            "error": message,
        });

        let mut response = (status, Json(body)).into_response();
        if collapsible {
            response.extensions_mut().insert(CollapsibleError);
        }
        response
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, Response},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::{Config, ErrorMode};
    use crate::state::AppState;

    pub fn create_test_state() -> Arc<AppState> {
        create_test_state_with(Config::default())
    }

    pub fn create_test_state_with(config: Config) -> Arc<AppState> {
        let store = envmon_store::Store::open_in_memory().unwrap();
        AppState::new(store, config)
    }

    pub fn typed_config() -> Config {
        let mut config = Config::default();
        config.server.error_mode = ErrorMode::Typed;
        config
    }

    pub async fn response_body(response: Response<Body>) -> String {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub async fn response_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_str(&response_body(response).await).unwrap()
    }

    pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone().oneshot(request).await.unwrap()
    }

    pub fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn delete_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn with_token(mut request: Request<Body>, token: &str) -> Request<Body> {
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        request
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(create_test_state());

        let response = send(&app, get_request("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_custom_base_path() {
        let mut config = crate::config::Config::default();
        config.server.base_path = "/v2".to_string();
        let app = router(create_test_state_with(config));

        assert_eq!(send(&app, get_request("/v2/health")).await.status(), StatusCode::OK);
        assert_eq!(
            send(&app, get_request("/api/health")).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_root_base_path() {
        let mut config = crate::config::Config::default();
        config.server.base_path = String::new();
        let app = router(create_test_state_with(config));

        assert_eq!(send(&app, get_request("/health")).await.status(), StatusCode::OK);
        assert_eq!(send(&app, get_request("/sensors")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = router(create_test_state());

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/sensors")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_bad_request_in_typed_mode() {
        let app = router(create_test_state_with(typed_config()));

        let response = send(
            &app,
            post_json("/api/stations", json!({"lat": "north"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_lenient_paging() {
        let params = ListParams {
            offset: Some("-5".to_string()),
            limit: Some("ten".to_string()),
        };
        assert_eq!(params.page(), PageQuery::new());

        let params = ListParams {
            offset: Some("20".to_string()),
            limit: Some(" 10 ".to_string()),
        };
        assert_eq!(params.page(), PageQuery::new().limit(10).offset(20));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "sensor_id").unwrap(), 42);
        for raw in ["0", "-1", "abc", "", "1.5"] {
            let err = parse_id(raw, "sensor_id").unwrap_err();
            assert!(matches!(err, AppError::BadRequest(ref m) if m == "invalid sensor_id"));
        }
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            AppError::from(ServiceError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ServiceError::Conflict("x".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(ServiceError::Unauthorized("x".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(ServiceError::Forbidden("x".into())).status(),
            StatusCode::FORBIDDEN
        );

        let response = AppError::Unauthorized("x".into()).into_response();
        assert!(response.extensions().get::<CollapsibleError>().is_none());
        let response = AppError::NotFound("x".into()).into_response();
        assert!(response.extensions().get::<CollapsibleError>().is_some());
    }
}

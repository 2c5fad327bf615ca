//! REST façade over the user and lookup stores.
//!
//! Four read/delete views, served alongside the bot from the same pool:
//!
//!   /get_users              - all users
//!   /get_user               - one user by ?userTgID=
//!   /get_history_by_tg      - full lookup history by ?userTgID=
//!   /delete_history_record  - soft-delete one record by ?ipCheckID=
//!
//! A shared middleware validates the path-specific ID parameter before any
//! handler runs; validation problems are HTTP 400, storage problems HTTP 500,
//! both with a `{success:false, error}` body.

use axum::extract::{RawQuery, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::error::{AppError, AppResult};
use crate::storage::db::DbPool;
use crate::storage::users::User;
use crate::storage::{get_connection, ip_checks, users};

/// Shared state for the API server.
#[derive(Clone)]
struct ApiState {
    db: Arc<DbPool>,
}

/// Envelope for every API response. Absent optional fields are omitted from
/// the JSON entirely.
#[derive(Debug, Default, Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    users: Option<Vec<User>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_check_history: Option<Vec<HistoryRecord>>,
}

/// One lookup record as served over the API, with the stored payload decoded
/// back into JSON. A payload that no longer parses is passed through as the
/// raw string rather than dropped.
#[derive(Debug, Serialize)]
struct HistoryRecord {
    id: i64,
    ip: String,
    ip_info: serde_json::Value,
    user_tg_id: i64,
    created_at: String,
}

impl From<ip_checks::IpCheck> for HistoryRecord {
    fn from(check: ip_checks::IpCheck) -> Self {
        let ip_info = serde_json::from_str(&check.ip_info)
            .unwrap_or_else(|_| serde_json::Value::String(check.ip_info.clone()));
        Self {
            id: check.id,
            ip: check.ip,
            ip_info,
            user_tg_id: check.user_tg_id,
            created_at: check.created_at,
        }
    }
}

fn error_response(status: StatusCode, error: &dyn Display) -> Response {
    let body = ApiResponse {
        success: false,
        error: Some(error.to_string()),
        ..ApiResponse::default()
    };
    (status, Json(body)).into_response()
}

fn internal_error(error: &AppError) -> Response {
    log::error!("API storage error: {}", error);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, error)
}

/// Extract and validate the named ID parameter from a query string: present,
/// non-empty, a base-10 non-negative integer.
fn id_check(query: &str, param: &str) -> Result<i64, AppError> {
    let raw = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());

    let Some(raw) = raw else {
        return Err(AppError::Validation(format!("parameter '{}' not found", param)));
    };

    match raw.parse::<i64>() {
        Ok(id) if id >= 0 => Ok(id),
        _ => Err(AppError::Validation(format!(
            "invalid value for query parameter '{}'. Must be unsigned integer",
            param
        ))),
    }
}

/// Which ID parameter a path requires, if any.
fn required_param(path: &str) -> Option<&'static str> {
    match path {
        "/get_user" | "/get_history_by_tg" => Some("userTgID"),
        "/delete_history_record" => Some("ipCheckID"),
        _ => None,
    }
}

/// Reject requests whose ID parameter is missing or malformed before any
/// handler runs.
async fn query_check_middleware(request: Request, next: Next) -> Response {
    if let Some(param) = required_param(request.uri().path()) {
        let query = request.uri().query().unwrap_or("");
        if let Err(e) = id_check(query, param) {
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    }
    next.run(request).await
}

/// GET /get_users — every known user.
async fn get_users_handler(State(state): State<ApiState>) -> Response {
    let result: AppResult<Vec<User>> = (|| {
        let conn = get_connection(&state.db)?;
        Ok(users::list_users(&conn)?)
    })();

    match result {
        Ok(all_users) => Json(ApiResponse {
            success: true,
            users: Some(all_users),
            ..ApiResponse::default()
        })
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// GET /get_user?userTgID= — one user, or a not-found error.
async fn get_user_handler(State(state): State<ApiState>, RawQuery(query): RawQuery) -> Response {
    let tg_id = match id_check(query.as_deref().unwrap_or(""), "userTgID") {
        Ok(tg_id) => tg_id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let result: AppResult<Option<User>> = (|| {
        let conn = get_connection(&state.db)?;
        Ok(users::get_user(&conn, tg_id)?)
    })();

    match result {
        Ok(Some(user)) => Json(ApiResponse {
            success: true,
            user: Some(user),
            ..ApiResponse::default()
        })
        .into_response(),
        Ok(None) => error_response(StatusCode::BAD_REQUEST, &"user not found"),
        Err(e) => internal_error(&e),
    }
}

/// GET /get_history_by_tg?userTgID= — that user's full lookup history.
async fn get_history_handler(State(state): State<ApiState>, RawQuery(query): RawQuery) -> Response {
    let tg_id = match id_check(query.as_deref().unwrap_or(""), "userTgID") {
        Ok(tg_id) => tg_id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let result: AppResult<Vec<ip_checks::IpCheck>> = (|| {
        let conn = get_connection(&state.db)?;
        Ok(ip_checks::list_by_tg_id(&conn, tg_id, false)?)
    })();

    match result {
        Ok(checks) => Json(ApiResponse {
            success: true,
            ip_check_history: Some(checks.into_iter().map(HistoryRecord::from).collect()),
            ..ApiResponse::default()
        })
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// GET /delete_history_record?ipCheckID= — soft-delete one record.
///
/// No ownership parameter by design of the surface: any caller may delete
/// any record by numeric ID. Repeating a delete succeeds.
async fn delete_history_record_handler(State(state): State<ApiState>, RawQuery(query): RawQuery) -> Response {
    let check_id = match id_check(query.as_deref().unwrap_or(""), "ipCheckID") {
        Ok(check_id) => check_id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let result: AppResult<()> = (|| {
        let conn = get_connection(&state.db)?;
        Ok(ip_checks::soft_delete_check(&conn, check_id)?)
    })();

    match result {
        Ok(()) => Json(ApiResponse {
            success: true,
            ..ApiResponse::default()
        })
        .into_response(),
        Err(e) => internal_error(&e),
    }
}

/// Build the API router over a storage pool.
pub fn router(db: Arc<DbPool>) -> Router {
    Router::new()
        .route("/get_users", get(get_users_handler))
        .route("/get_user", get(get_user_handler))
        .route("/get_history_by_tg", get(get_history_handler))
        .route("/delete_history_record", get(delete_history_record_handler))
        .layer(middleware::from_fn(query_check_middleware))
        .with_state(ApiState { db })
}

/// Start the API server.
pub async fn start_api_server(port: u16, db: Arc<DbPool>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(db);

    log::info!("Starting API server on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

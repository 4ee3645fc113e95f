use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::application::services::{Dashboard, JournalService};
use crate::domain::entities::{AccountRecord, AccountSettings, NewUser, Trade, TradeEntry, TradeFilter, User};
use crate::domain::errors::{JournalError, JournalErrorKind};

pub type AppState = Arc<JournalService>;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: bool,
}

/// Session start response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: i64,
    pub account: Option<AccountRecord>,
}

impl IntoResponse for JournalError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            JournalErrorKind::NotFound => StatusCode::NOT_FOUND,
            JournalErrorKind::Forbidden => StatusCode::FORBIDDEN,
            JournalErrorKind::Conflict => StatusCode::CONFLICT,
            JournalErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            JournalErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// JSON body extractor whose rejections use the `ErrorResponse` shape
///
/// Malformed or mistyped bodies answer 400. Body read failures, such as an
/// oversized body, keep the status axum assigns them.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> Response {
    let status = match &rejection {
        JsonRejection::BytesRejection(_) => rejection.status(),
        _ => StatusCode::BAD_REQUEST,
    };
    let error = rejection.body_text();
    (status, Json(ErrorResponse { error })).into_response()
}

/// All journal routes
pub fn build_router(service: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(register_user))
        .route("/users/:user_id/account", put(configure_account))
        .route("/users/:user_id/account/reset", post(reset_account))
        .route("/users/:user_id/session", post(start_session))
        .route("/users/:user_id/dashboard", get(get_dashboard))
        .route("/users/:user_id/trades", get(list_trades).post(add_trade))
        .route(
            "/users/:user_id/trades/:trade_id",
            get(get_trade).put(edit_trade).delete(delete_trade),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Health check endpoint
async fn health_check(State(service): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(service.pool()).await.is_ok();
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        database,
    })
}

async fn register_user(
    State(service): State<AppState>,
    JsonBody(user): JsonBody<NewUser>,
) -> Result<(StatusCode, Json<User>), JournalError> {
    let user = service.register_user(user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn configure_account(
    State(service): State<AppState>,
    Path(user_id): Path<i64>,
    JsonBody(settings): JsonBody<AccountSettings>,
) -> Result<Json<AccountRecord>, JournalError> {
    Ok(Json(service.configure_account(user_id, settings, today()).await?))
}

async fn reset_account(
    State(service): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<AccountRecord>, JournalError> {
    Ok(Json(service.reset_account(user_id, today()).await?))
}

async fn start_session(
    State(service): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<SessionResponse>, JournalError> {
    let account = service.start_session(user_id).await?;
    Ok(Json(SessionResponse { user_id, account }))
}

async fn get_dashboard(
    State(service): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Dashboard>, JournalError> {
    Ok(Json(service.dashboard(user_id, today()).await?))
}

async fn list_trades(
    State(service): State<AppState>,
    Path(user_id): Path<i64>,
    Query(filter): Query<TradeFilter>,
) -> Result<Json<Vec<Trade>>, JournalError> {
    Ok(Json(service.list_trades(user_id, filter).await?))
}

async fn add_trade(
    State(service): State<AppState>,
    Path(user_id): Path<i64>,
    JsonBody(entry): JsonBody<TradeEntry>,
) -> Result<(StatusCode, Json<Trade>), JournalError> {
    let trade = service.add_trade(user_id, entry).await?;
    Ok((StatusCode::CREATED, Json(trade)))
}

async fn get_trade(
    State(service): State<AppState>,
    Path((user_id, trade_id)): Path<(i64, i64)>,
) -> Result<Json<Trade>, JournalError> {
    Ok(Json(service.get_trade(user_id, trade_id).await?))
}

async fn edit_trade(
    State(service): State<AppState>,
    Path((user_id, trade_id)): Path<(i64, i64)>,
    JsonBody(entry): JsonBody<TradeEntry>,
) -> Result<Json<Trade>, JournalError> {
    Ok(Json(service.edit_trade(user_id, trade_id, entry).await?))
}

async fn delete_trade(
    State(service): State<AppState>,
    Path((user_id, trade_id)): Path<(i64, i64)>,
) -> Result<StatusCode, JournalError> {
    service.delete_trade(user_id, trade_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ValidationError;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (JournalError::UserNotFound(1), StatusCode::NOT_FOUND),
            (
                JournalError::NotTradeOwner {
                    user_id: 1,
                    trade_id: 2,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                JournalError::AccountNotConfigured { user_id: 1 },
                StatusCode::CONFLICT,
            ),
            (
                JournalError::Validation(ValidationError::CloseBeforeOpen),
                StatusCode::BAD_REQUEST,
            ),
            (
                JournalError::Storage(crate::persistence::DatabaseError::QueryError(
                    "disk I/O error".to_string(),
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}

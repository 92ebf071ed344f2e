// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The dashboard is a local tool; there is
// no authentication.
//
// CORS is configured permissively so a dev server on another port can call in.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::session::ControlCommand;
use crate::types::{PriceType, SelectionUpdate, Tenor, Timeframe, CURRENCY_PAIRS};

// =============================================================================
// Router construction
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/series", get(series))
        .route("/api/v1/options", get(options))
        .route("/api/v1/selection", post(set_selection))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// State & series
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn series(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.chart.series())
}

// =============================================================================
// Option sets
// =============================================================================

#[derive(Serialize)]
struct TenorOption {
    code: u8,
    label: &'static str,
}

#[derive(Serialize)]
struct OptionsResponse {
    currency_pairs: &'static [&'static str],
    tenors: Vec<TenorOption>,
    timeframes: Vec<&'static str>,
    price_types: Vec<&'static str>,
}

async fn options() -> impl IntoResponse {
    Json(OptionsResponse {
        currency_pairs: CURRENCY_PAIRS,
        tenors: Tenor::all()
            .map(|t| TenorOption {
                code: t.code(),
                label: t.label(),
            })
            .collect(),
        timeframes: Timeframe::ALL.iter().map(|tf| tf.label()).collect(),
        price_types: PriceType::ALL.iter().map(|pt| pt.as_str()).collect(),
    })
}

// =============================================================================
// Selection
// =============================================================================

async fn set_selection(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SelectionUpdate>, JsonRejection>,
) -> impl IntoResponse {
    let update = match body {
        Ok(Json(update)) => update,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "selection update rejected");
            return error_body(StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = ControlCommand::Select {
        update,
        reply: reply_tx,
    };
    if state.commands.send(command).await.is_err() {
        return error_body(StatusCode::SERVICE_UNAVAILABLE, "session controller is not running").into_response();
    }

    match reply_rx.await {
        Ok(Ok(selection)) => {
            info!(selection = %selection, "selection changed via API");
            (StatusCode::ACCEPTED, Json(selection)).into_response()
        }
        Ok(Err(message)) => {
            warn!(error = %message, "selection update rejected");
            error_body(StatusCode::BAD_REQUEST, message).into_response()
        }
        Err(_) => error_body(StatusCode::SERVICE_UNAVAILABLE, "session controller stopped").into_response(),
    }
}

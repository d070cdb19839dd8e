use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::commands::install::{check_installation, install_cli, InstallRequest};
use crate::commands::logs::{fetch_logs, LogQuery};
use crate::commands::settings::{load_legacy_settings, load_settings, save_settings};
use crate::error::{ErrorKind, SettingsError};
use crate::installer::Installer;
use crate::store::SettingsStore;

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<SettingsStore>,
    pub installer: Arc<Installer>,
}

impl ServerState {
    pub fn new(store: SettingsStore) -> Self {
        let installer = Installer::system(store.path());
        Self {
            store: Arc::new(store),
            installer: Arc::new(installer),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    settings_path: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn json_response<T: Serialize>(status: StatusCode, payload: T) -> Response {
    (status, Json(payload)).into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: message.into(),
        },
    )
}

fn settings_error_response(err: SettingsError) -> Response {
    let status = match err.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::CorruptDocument => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("[settings:http] {err}");
    } else {
        warn!("[settings:http] {err}");
    }
    error_response(status, err.to_string())
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/settings",
            get(get_settings_handler).post(save_settings_handler),
        )
        .route("/api/settings/legacy", get(get_legacy_settings_handler))
        .route(
            "/api/install",
            get(install_status_handler).post(install_handler),
        )
        .route("/api/logs", get(logs_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Serves on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("[settings:http] listening on http://{addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn run_http_server(addr: SocketAddr, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("[settings:http] failed to listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
        info!("[settings:http] shutting down");
    })
    .await
}

async fn health_handler(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        settings_path: state.store.path().display().to_string(),
    })
}

async fn get_settings_handler(State(state): State<ServerState>) -> Response {
    match load_settings(&state.store).await {
        Ok(settings) => json_response(StatusCode::OK, settings),
        Err(err) => settings_error_response(err),
    }
}

async fn get_legacy_settings_handler(State(state): State<ServerState>) -> Response {
    match load_legacy_settings(&state.store).await {
        Ok(view) => json_response(StatusCode::OK, view),
        Err(err) => settings_error_response(err),
    }
}

async fn save_settings_handler(
    State(state): State<ServerState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(changes) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Malformed JSON payload: {rejection}"),
            )
        }
    };

    match save_settings(&state.store, &changes).await {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => settings_error_response(err),
    }
}

async fn install_status_handler(State(state): State<ServerState>) -> Response {
    json_response(StatusCode::OK, check_installation(&state.installer).await)
}

async fn install_handler(
    State(state): State<ServerState>,
    payload: Result<Json<InstallRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid installation method");
    };

    match install_cli(&state.installer, &request).await {
        Ok(outcome) if outcome.success => json_response(StatusCode::OK, outcome),
        Ok(outcome) => json_response(StatusCode::INTERNAL_SERVER_ERROR, outcome),
        Err(message) => error_response(StatusCode::BAD_REQUEST, message),
    }
}

async fn logs_handler(Query(query): Query<LogQuery>) -> Response {
    match fetch_logs(&query).await {
        Ok(tail) => json_response(StatusCode::OK, tail),
        Err(message) => error_response(StatusCode::NOT_FOUND, message),
    }
}

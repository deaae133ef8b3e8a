// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The HTTP surface: thin translation between requests and the protocol
//! engine, every response wrapped in the `success`/`error` envelope.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    cfg::enums::{ReaderMode, TagFormat},
    driver::NotificationEvent,
    errors::GatewayError,
    protocol::{analyze, analyze::AnalyzeReport, clear, edit, initialize, inventory, secure},
    session::{ManagedSession, ReaderRegistry},
    tags::{RssiValue, TagOps},
};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ReaderRegistry>,
    pub default_format: TagFormat,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/test", get(test))
        .route("/readers", get(readers))
        .route("/inventory/{name}", get(run_inventory))
        .route("/initialize/{name}", post(run_initialize))
        .route("/edit/{name}", post(run_edit))
        .route("/clear/{name}", post(run_clear))
        .route("/secure/{name}", post(run_secure))
        .route("/unsecure/{name}", post(run_unsecure))
        .route("/analyze/{name}", get(run_analyze))
        .route("/notification/start/{name}", post(notification_start))
        .route("/notification/stop/{name}", post(notification_stop))
        .route("/notification/events/{name}", get(notification_events))
        .route("/notification/status", get(notification_status))
        .with_state(state)
}

/// Error half of the response envelope.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        let status = if e.is_input_error() {
            StatusCode::BAD_REQUEST
        } else if e.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            error!("operation failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn session_of(
    state: &AppState,
    name: &str,
) -> Result<Arc<ManagedSession>, ApiError> {
    Ok(state.registry.get(name)?)
}

async fn root() -> &'static str {
    "Hello Feig!"
}

async fn test() -> &'static str {
    "Test successful"
}

// ── /readers ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadersResponse {
    success: bool,
    reader_count: usize,
    readers: Vec<ReaderStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReaderStatus {
    name: String,
    address: String,
    port: u16,
    mode: String,
    antennas: Vec<u8>,
    antenna_mask: String,
    is_connected: bool,
    connection_status: String,
    notification_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_port: Option<u16>,
}

async fn readers(State(state): State<AppState>) -> Json<ReadersResponse> {
    let sessions = state.registry.all();
    let readers = sessions
        .iter()
        .map(|s| {
            let cfg = s.config();
            ReaderStatus {
                name: cfg.name.clone(),
                address: cfg.address.clone(),
                port: cfg.port,
                mode: cfg.mode.to_string(),
                antennas: cfg.antennas.clone(),
                antenna_mask: format!("0x{:02X}", cfg.antenna_mask()),
                is_connected: s.is_connected(),
                connection_status: s.connection_status().to_string(),
                notification_active: s.is_notification_active(),
                notification_port: s.notification_port(),
            }
        })
        .collect();
    Json(ReadersResponse {
        success: true,
        reader_count: sessions.len(),
        readers,
    })
}

// ── /inventory ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryResponse {
    success: bool,
    message: String,
    count: usize,
    tags: Vec<TagRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TagRecord {
    tag_type: String,
    epc: String,
    pc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_id: Option<String>,
    secured: bool,
    rssi_values: Vec<RssiValue>,
}

#[axum::debug_handler]
async fn run_inventory(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    let mask = session.config().antenna_mask();
    let tags = session
        .execute(async |driver| inventory::run(driver, mask))
        .await?;

    let records: Vec<TagRecord> = tags
        .iter()
        .map(|t| TagRecord {
            tag_type: t.tag_type().to_string(),
            epc: t.epc_hex(),
            pc: t.pc_hex(),
            media_id: t.media_id().ok(),
            secured: t.is_secured(),
            rssi_values: t.rssi_values(),
        })
        .collect();

    Ok(Json(InventoryResponse {
        success: true,
        message: format!("found {} tags", records.len()),
        count: records.len(),
        tags: records,
    }))
}

// ── /initialize ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeQuery {
    media_id: Option<String>,
    format: Option<String>,
    secured: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse {
    success: bool,
    message: String,
    epc: String,
    pc: String,
    media_id: String,
    secured: bool,
    format: String,
    tag_type: String,
}

async fn run_initialize(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<InitializeQuery>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    let media_id = query
        .media_id
        .ok_or_else(|| bad_request("query parameter mediaId is required"))?;
    let format = match &query.format {
        None => state.default_format,
        Some(s) => TagFormat::parse(s).ok_or_else(|| {
            ApiError::from(GatewayError::UnsupportedFormat(s.clone()))
        })?,
    };
    let secured = query.secured.unwrap_or(true);

    let tag = initialize::run(&session, format, &media_id, secured).await?;
    Ok(Json(InitializeResponse {
        success: true,
        message: "tag initialized".to_string(),
        epc: tag.epc_hex(),
        pc: tag.pc_hex(),
        media_id,
        secured,
        format: format.to_string(),
        tag_type: tag.tag_type().to_string(),
    }))
}

// ── /edit ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditQuery {
    epc: Option<String>,
    media_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditResponse {
    success: bool,
    message: String,
    old_epc: String,
    new_epc: String,
    media_id: String,
    tag_type: String,
}

async fn run_edit(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EditQuery>,
) -> Result<Json<EditResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    let epc = query
        .epc
        .ok_or_else(|| bad_request("query parameter epc is required"))?;
    let media_id = query
        .media_id
        .ok_or_else(|| bad_request("query parameter mediaId is required"))?;

    let outcome = edit::run(&session, &epc, &media_id).await?;
    Ok(Json(EditResponse {
        success: true,
        message: "media id rewritten".to_string(),
        old_epc: outcome.old_epc,
        new_epc: outcome.new_epc,
        media_id: outcome.media_id,
        tag_type: outcome.tag_type,
    }))
}

// ── /clear ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EpcQuery {
    epc: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    success: bool,
    message: String,
    old_epc: String,
    new_epc: String,
    new_pc: String,
    tid: String,
}

async fn run_clear(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
) -> Result<Json<ClearResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    let epc = query
        .epc
        .ok_or_else(|| bad_request("query parameter epc is required"))?;

    let outcome = clear::run(&session, &epc).await?;
    Ok(Json(ClearResponse {
        success: true,
        message: "tag cleared".to_string(),
        old_epc: outcome.old_epc,
        new_epc: outcome.new_epc,
        new_pc: outcome.new_pc,
        tid: outcome.tid,
    }))
}

// ── /secure, /unsecure ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecureResponse {
    success: bool,
    message: String,
    epc: String,
    tag_type: String,
    secured: bool,
}

async fn set_security(
    state: AppState,
    name: String,
    query: EpcQuery,
    secured: bool,
) -> Result<Json<SecureResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    let epc = query
        .epc
        .ok_or_else(|| bad_request("query parameter epc is required"))?;

    let outcome = secure::run(&session, &epc, secured).await?;
    Ok(Json(SecureResponse {
        success: true,
        message: if secured {
            "tag secured".to_string()
        } else {
            "tag unsecured".to_string()
        },
        epc: outcome.epc,
        tag_type: outcome.tag_type,
        secured: outcome.secured,
    }))
}

async fn run_secure(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
) -> Result<Json<SecureResponse>, ApiError> {
    set_security(state, name, query, true).await
}

async fn run_unsecure(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
) -> Result<Json<SecureResponse>, ApiError> {
    set_security(state, name, query, false).await
}

// ── /analyze ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    success: bool,
    epc: String,
    analysis: AnalyzeReport,
}

async fn run_analyze(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<EpcQuery>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    let epc = query
        .epc
        .ok_or_else(|| bad_request("query parameter epc is required"))?;

    let report = analyze::run(&session, &epc).await?;
    Ok(Json(AnalyzeResponse {
        success: true,
        epc: epc.to_uppercase(),
        analysis: report,
    }))
}

// ── /notification ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationStartResponse {
    success: bool,
    message: String,
    port: u16,
    reader_name: String,
}

async fn notification_start(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NotificationStartResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    if session.config().mode != ReaderMode::Notification {
        return Err(bad_request(format!(
            "reader {name} is not configured for notification mode"
        )));
    }

    let port = state.registry.allocate_listener_port();
    session.start_notification(port).await?;
    Ok(Json(NotificationStartResponse {
        success: true,
        message: "notification listener started".to_string(),
        port,
        reader_name: name,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationStopResponse {
    success: bool,
    message: String,
}

async fn notification_stop(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NotificationStopResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    session.stop_notification().await?;
    Ok(Json(NotificationStopResponse {
        success: true,
        message: "notification listener stopped".to_string(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationEventsResponse {
    success: bool,
    reader_name: String,
    event_count: usize,
    is_connected: bool,
    events: Vec<NotificationEvent>,
}

async fn notification_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NotificationEventsResponse>, ApiError> {
    let session = session_of(&state, &name)?;
    if !session.is_notification_active() {
        return Err(ApiError::from(GatewayError::NotificationInactive));
    }
    let events = session.queue().poll_all();
    Ok(Json(NotificationEventsResponse {
        success: true,
        reader_name: name,
        event_count: events.len(),
        is_connected: session.is_connected(),
        events,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationStatusResponse {
    success: bool,
    active_sessions: usize,
    sessions: Vec<NotificationSessionStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationSessionStatus {
    reader_name: String,
    port: u16,
    queued_events: usize,
    is_connected: bool,
}

async fn notification_status(
    State(state): State<AppState>,
) -> Json<NotificationStatusResponse> {
    let sessions: Vec<NotificationSessionStatus> = state
        .registry
        .all()
        .iter()
        .filter_map(|s| {
            s.notification_port().map(|port| NotificationSessionStatus {
                reader_name: s.name().to_string(),
                port,
                queued_events: s.queue().count(),
                is_connected: s.is_connected(),
            })
        })
        .collect();
    Json(NotificationStatusResponse {
        success: true,
        active_sessions: sessions.len(),
        sessions,
    })
}

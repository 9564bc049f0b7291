//! HTTP command surface. Each handler parses its input, takes the state lock
//! once, makes exactly one core call and renders the result.

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use time::OffsetDateTime;
use tokio::net::TcpListener;

use crate::control::sensors::{Reading, SensorReport};
use crate::control::{FireSubmode, ServoPosition, SharedState};
use crate::error::{self, ControlError};

const INDEX_HTML: &str = include_str!("ui/index.html");

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct SensorPayload {
    pub(crate) sensor1: Reading,
    pub(crate) sensor2: Reading,
    #[serde(default, alias = "fire_detected")]
    pub(crate) fire: Option<bool>,
}

fn success(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "status": "success", "message": message.into() }))
}

type ApiResult = error::Result<Json<Value>>;

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(api_status))
        .route("/api/sensor_data", post(sensor_data))
        .route("/api/esp_commands", get(esp_commands))
        .route("/api/pump/on", post(pump_on))
        .route("/api/pump/off", post(pump_off))
        .route("/api/servo/state1", post(servo_state1))
        .route("/api/servo/state2", post(servo_state2))
        .route("/api/servo/idle", post(servo_idle))
        .route("/api/servo/active", post(servo_active))
        .route("/api/mode/manual/start", post(manual_start))
        .route("/api/mode/manual/stop", post(manual_stop))
        .route("/api/mode/auto/start", post(auto_start))
        .route("/api/mode/auto/stop", post(auto_stop))
        .route("/api/fire_mode/{submode}", post(fire_mode))
        .route("/api/alarm/on", post(alarm_on))
        .route("/api/alarm/off", post(alarm_off))
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], INDEX_HTML)
}

async fn api_status(State(state): State<SharedState>) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    let st = state.read().await;
    Json(st.status(now))
}

async fn esp_commands(State(state): State<SharedState>) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    let mut st = state.write().await;
    Json(st.commands(now))
}

async fn sensor_data(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<SensorPayload>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload.map_err(|e| ControlError::InvalidInput(e.body_text()))?;
    let report = SensorReport {
        field1: payload.sensor1,
        field2: payload.sensor2,
        fire_detected: payload.fire,
    };

    let now = OffsetDateTime::now_utc();
    state.write().await.report_sensors(report, now)?;
    Ok(success("Sensor data received"))
}

// -- Manual actuators -------------------------------------------------------

async fn pump_on(State(state): State<SharedState>) -> ApiResult {
    state.write().await.manual_pump(true)?;
    Ok(success("Pump turned ON"))
}

async fn pump_off(State(state): State<SharedState>) -> ApiResult {
    state.write().await.manual_pump(false)?;
    Ok(success("Pump turned OFF"))
}

async fn servo_state1(State(state): State<SharedState>) -> ApiResult {
    state.write().await.manual_servo(ServoPosition::State1)?;
    Ok(success("Servo set to State 1 (180° right)"))
}

async fn servo_state2(State(state): State<SharedState>) -> ApiResult {
    state.write().await.manual_servo(ServoPosition::State2)?;
    Ok(success("Servo set to State 2 (rotating)"))
}

async fn servo_idle(State(state): State<SharedState>) -> ApiResult {
    state.write().await.manual_servo(ServoPosition::Idle)?;
    Ok(success("Servo set to Idle (90° center)"))
}

async fn servo_active(State(state): State<SharedState>) -> ApiResult {
    state.write().await.manual_servo(ServoPosition::State1)?;
    Ok(success("Servo activated (180° right)"))
}

// -- Modes ------------------------------------------------------------------

async fn manual_start(State(state): State<SharedState>) -> ApiResult {
    state.write().await.request_manual()?;
    Ok(success("Manual mode activated"))
}

async fn manual_stop(State(state): State<SharedState>) -> ApiResult {
    state.write().await.release_manual();
    Ok(success("Manual mode deactivated"))
}

async fn auto_start(State(state): State<SharedState>) -> ApiResult {
    state.write().await.request_auto()?;
    Ok(success("Auto mode activated"))
}

async fn auto_stop(State(state): State<SharedState>) -> ApiResult {
    state.write().await.release_auto();
    Ok(success("Auto mode deactivated"))
}

async fn fire_mode(State(state): State<SharedState>, Path(submode): Path<String>) -> ApiResult {
    let submode: FireSubmode = submode.parse()?;
    state.write().await.set_fire_submode(submode)?;
    Ok(success(format!("Fire mode set to {submode:?}")))
}

async fn alarm_on(State(state): State<SharedState>) -> ApiResult {
    state.write().await.alarm_on()?;
    Ok(success("Alarm turned ON"))
}

async fn alarm_off(State(state): State<SharedState>) -> ApiResult {
    state.write().await.alarm_off()?;
    Ok(success("Alarm turned OFF"))
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: SharedState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    tracing::info!(%addr, "web ui listening");

    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================

//! HTTP Route Handlers
//!
//! Each handler deserializes its request, calls exactly one Control Surface
//! method on the shared engine, and maps the result to a JSON envelope.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use hifi_core::{band_index, Engine, EngineError, EqConfig, NUM_BANDS};

use crate::error::ApiError;
use crate::ws::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/configure_output", post(configure_output))
        .route("/configure_upsampling", post(configure_upsampling))
        .route("/set_eq", post(set_eq))
        .route("/load", post(load))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/stop", post(stop))
        .route("/seek", post(seek))
        .route("/volume", post(set_volume))
        .route("/state", get(get_state))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

#[derive(Serialize)]
struct DevicesResponse {
    status: &'static str,
    devices: hifi_core::GroupedDevices,
}

async fn list_devices(State(state): State<AppState>) -> Result<Response, ApiError> {
    let devices = state.engine.list_devices()?;
    Ok(Json(DevicesResponse { status: "ok", devices }).into_response())
}

#[derive(Deserialize)]
struct ConfigureOutputRequest {
    device_id: Option<usize>,
    exclusive: bool,
}

async fn configure_output(
    State(state): State<AppState>,
    Json(req): Json<ConfigureOutputRequest>,
) -> Result<Response, ApiError> {
    info!(command = "configure_output", "handling request");
    state.engine.configure_output(req.device_id, req.exclusive)?;
    Ok(ok_response())
}

#[derive(Deserialize)]
struct ConfigureUpsamplingRequest {
    target_samplerate: Option<u32>,
}

async fn configure_upsampling(
    State(state): State<AppState>,
    Json(req): Json<ConfigureUpsamplingRequest>,
) -> Result<Response, ApiError> {
    info!(command = "configure_upsampling", "handling request");
    state.engine.configure_upsampling(req.target_samplerate)?;
    Ok(ok_response())
}

#[derive(Deserialize)]
struct SetEqRequest {
    bands: HashMap<String, f32>,
    enabled: bool,
}

async fn set_eq(State(state): State<AppState>, Json(req): Json<SetEqRequest>) -> Result<Response, ApiError> {
    info!(command = "set_eq", "handling request");

    let mut gains_db = [0.0_f32; NUM_BANDS];
    for (id, gain) in &req.bands {
        let idx = band_index(id)
            .ok_or_else(|| EngineError::BadRequest(format!("unknown eq band: {id}")))?;
        gains_db[idx] = *gain;
    }

    state.engine.set_eq(EqConfig { gains_db, enabled: req.enabled })?;
    Ok(ok_response())
}

#[derive(Deserialize)]
struct LoadRequest {
    path: String,
}

async fn load(State(state): State<AppState>, Json(req): Json<LoadRequest>) -> Result<Response, ApiError> {
    if req.path.trim().is_empty() {
        return Err(EngineError::BadRequest("path must not be empty".into()).into());
    }
    info!(command = "load", path = %req.path, "handling request");
    state.engine.load(&req.path)?;
    Ok(ok_response())
}

async fn play(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.engine.play()?;
    Ok(ok_response())
}

async fn pause(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.engine.pause()?;
    Ok(ok_response())
}

async fn stop(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.engine.stop()?;
    Ok(ok_response())
}

#[derive(Deserialize)]
struct SeekRequest {
    position: f64,
}

async fn seek(State(state): State<AppState>, Json(req): Json<SeekRequest>) -> Result<Response, ApiError> {
    state.engine.seek(req.position)?;
    Ok(ok_response())
}

#[derive(Deserialize)]
struct VolumeRequest {
    volume: f32,
}

async fn set_volume(State(state): State<AppState>, Json(req): Json<VolumeRequest>) -> Result<Response, ApiError> {
    state.engine.set_volume(req.volume)?;
    Ok(ok_response())
}

async fn get_state(State(state): State<AppState>) -> Response {
    Json(state.engine.state()).into_response()
}

fn ok_response() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

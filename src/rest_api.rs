#![allow(clippy::missing_errors_doc)]
//! REST management surface over the engine's [`ControlHandle`].
//!
//! Every response is JSON. Successful calls carry `"status": "ok"`; failures
//! use the `{"status":"error","error":{"type","message"}}` shape produced by
//! [`AppError`].

use axum::{
    extract::{rejection::JsonRejection, Path, State as AxumState},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::{PortConfig, PortMode},
    control::{ControlError, ControlHandle, SerialUpdate},
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct RestContext {
    pub control: ControlHandle,
}

#[derive(Deserialize)]
pub struct ModeRequest {
    pub mode: PortMode,
}

#[derive(Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

pub fn build_router(ctx: RestContext) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/system", get(system))
        .route("/api/ports", get(list_ports).post(add_port))
        .route("/api/ports/{tcp_port}", get(get_port))
        .route("/api/ports/{tcp_port}/config", post(update_config))
        .route("/api/ports/{tcp_port}/mode", post(set_mode))
        .route("/api/ports/{tcp_port}/enabled", post(set_enabled))
        .route("/api/ports/{tcp_port}/disconnect", post(disconnect))
        .with_state(ctx)
}

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::InvalidPayload(e.body_text()))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

async fn system(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    Json(json!({"status": "ok", "system": ctx.control.system()}))
}

async fn list_ports(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    Json(json!({"status": "ok", "ports": ctx.control.ports()}))
}

async fn get_port(
    AxumState(ctx): AxumState<RestContext>,
    Path(tcp_port): Path<u16>,
) -> AppResult<Json<Value>> {
    let port = ctx
        .control
        .port(tcp_port)
        .ok_or(ControlError::UnknownPort(tcp_port))?;
    Ok(Json(json!({"status": "ok", "port": port})))
}

async fn add_port(
    AxumState(ctx): AxumState<RestContext>,
    body: Result<Json<PortConfig>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let config = payload(body)?;
    let port = ctx.control.add_port(config).await?;
    Ok((StatusCode::CREATED, Json(json!({"status": "ok", "port": port}))))
}

async fn update_config(
    AxumState(ctx): AxumState<RestContext>,
    Path(tcp_port): Path<u16>,
    body: Result<Json<SerialUpdate>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let update = payload(body)?;
    let port = ctx.control.update_serial(tcp_port, update).await?;
    Ok(Json(json!({"status": "ok", "port": port})))
}

async fn set_mode(
    AxumState(ctx): AxumState<RestContext>,
    Path(tcp_port): Path<u16>,
    body: Result<Json<ModeRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = payload(body)?;
    let port = ctx.control.set_mode(tcp_port, request.mode).await?;
    Ok(Json(json!({"status": "ok", "port": port})))
}

async fn set_enabled(
    AxumState(ctx): AxumState<RestContext>,
    Path(tcp_port): Path<u16>,
    body: Result<Json<EnabledRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = payload(body)?;
    let port = ctx.control.set_enabled(tcp_port, request.enabled).await?;
    Ok(Json(json!({"status": "ok", "port": port})))
}

async fn disconnect(
    AxumState(ctx): AxumState<RestContext>,
    Path(tcp_port): Path<u16>,
) -> AppResult<Json<Value>> {
    let closed = ctx.control.disconnect(tcp_port).await?;
    Ok(Json(json!({"status": "ok", "closed_sessions": closed})))
}

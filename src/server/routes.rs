//! Request handlers.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{KeepAlive, KeepAliveStream, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::error::ApiError;
use crate::server::stream::ConsoleStream;
use crate::server::AppState;
use crate::session::CommandOptions;

#[derive(Serialize)]
pub struct StatusBody {
    pub running: bool,
    pub at_prompt: bool,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        running: state.service.is_running(),
        at_prompt: state.service.is_at_prompt(),
    })
}

pub async fn start(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.service.start().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CommandBody {
    pub text: String,
    #[serde(default)]
    pub expect_response: bool,
    #[serde(default = "default_true")]
    pub append_terminator: bool,
}

#[derive(Serialize)]
pub struct OutputBody {
    pub output: String,
}

pub async fn command(
    State(state): State<AppState>,
    Json(body): Json<CommandBody>,
) -> Result<Json<OutputBody>, ApiError> {
    let opts = CommandOptions {
        append_terminator: body.append_terminator,
        expect_response: body.expect_response,
    };
    let output = state.service.send_command(body.text, opts).await?;
    Ok(Json(OutputBody { output }))
}

pub async fn escape(State(state): State<AppState>) -> Result<Json<OutputBody>, ApiError> {
    let output = state.service.send_escape().await?;
    Ok(Json(OutputBody { output }))
}

pub async fn examine(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let snapshot = state.service.examine_state(&reference).await?;
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
pub struct DepositBody {
    pub value: String,
}

pub async fn deposit(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(body): Json<DepositBody>,
) -> Result<StatusCode, ApiError> {
    state.service.deposit_state(&reference, &body.value).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn breakpoints(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let table = state.service.breakpoints().await?;
    Ok(Json(table))
}

#[derive(Deserialize)]
pub struct QuitBody {
    pub grace_ms: Option<u64>,
}

pub async fn quit(
    State(state): State<AppState>,
    body: Option<Json<QuitBody>>,
) -> Result<StatusCode, ApiError> {
    let grace = body
        .and_then(|Json(body)| body.grace_ms)
        .map(Duration::from_millis)
        .unwrap_or(state.quit_grace);
    state.service.quit(grace).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stop(State(state): State<AppState>) -> StatusCode {
    state.service.stop();
    StatusCode::NO_CONTENT
}

/// Live console feed: full backlog replay, then live lines, then a terminal
/// `exit` event carrying the process exit code.
pub async fn console(State(state): State<AppState>) -> Sse<KeepAliveStream<ConsoleStream>> {
    let stream = ConsoleStream::new(state.bus.subscribe(), state.bus.subscribe_exit());
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn default_true() -> bool {
    true
}

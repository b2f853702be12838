use super::constants::{
    CACHE_CONTROL_NO_CACHE, CLIENT_CHANNEL_BUFFER, CONNECTION_KEEP_ALIVE,
    CONTENT_TYPE_EVENT_STREAM,
};
use super::relay::{StreamRelay, StreamSession};
use super::storage::PromptResponseSink;
use super::writer::ChannelWriter;
use crate::models::prompts::Prompt;
use crate::models::users::User;
use crate::web::chats::get_prompt_in_chat;
use crate::web::validate_jwt;
use crate::{ApiError, AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelStreamResponse {
    pub cancelled: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/prompt/:prompt_id/stream",
            post(stream_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/chat/:chat_id/prompts/:prompt_id/stream",
            post(stream_chat_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/prompt/:prompt_id/cancel",
            post(cancel_stream).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .with_state(state)
}

async fn stream_prompt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(prompt_id): Path<i32>,
) -> Result<Response, ApiError> {
    let prompt = state.db.get_prompt_for_user(prompt_id, user.id)?;
    start_stream(state, prompt)
}

async fn stream_chat_prompt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((chat_id, prompt_id)): Path<(i32, i32)>,
) -> Result<Response, ApiError> {
    let prompt = get_prompt_in_chat(&state, &user, chat_id, prompt_id)?;
    start_stream(state, prompt)
}

/// Claims the prompt, spawns the relay task and hands back the open body.
///
/// Every check that can fail happens before the response is built, so errors
/// reach the client as a status code and never as stream content.
fn start_stream(state: Arc<AppState>, prompt: Prompt) -> Result<Response, ApiError> {
    let guard = state
        .active_streams
        .register(prompt.id)
        .ok_or(ApiError::StreamInProgress)?;

    let backend = state.backends.select(&prompt.model_name);
    let cancel = guard.cancel_token();
    let stream = backend.generate(&prompt.prompt, cancel.clone());
    let session = StreamSession::new(prompt.id, cancel);

    let relay = StreamRelay::new(
        Arc::new(PromptResponseSink::new(state.db.clone())),
        state.config.persist_every_fragment,
    );
    let (mut writer, rx) = ChannelWriter::channel(CLIENT_CHANNEL_BUFFER);

    info!(
        "Streaming prompt {} with {} backend",
        prompt.id,
        backend.name()
    );

    tokio::spawn(async move {
        // released only after the final save
        let _guard = guard;
        let outcome = relay.run(session, stream, &mut writer).await;
        info!(
            "Prompt {} stream ended {:?} after {} fragments, {} bytes (persisted: {})",
            prompt.id,
            outcome.state,
            outcome.fragments,
            outcome.text.len(),
            outcome.persisted
        );
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE_EVENT_STREAM)
        .header(header::CACHE_CONTROL, CACHE_CONTROL_NO_CACHE)
        .header(header::CONNECTION, CONNECTION_KEEP_ALIVE)
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| {
            error!("Failed to build stream response: {:?}", e);
            ApiError::InternalServerError
        })
}

async fn cancel_stream(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(prompt_id): Path<i32>,
) -> Result<Json<CancelStreamResponse>, ApiError> {
    let prompt = state.db.get_prompt_for_user(prompt_id, user.id)?;
    let cancelled = state.active_streams.cancel(prompt.id);
    debug!("Cancel requested for prompt {}: {}", prompt.id, cancelled);
    Ok(Json(CancelStreamResponse { cancelled }))
}

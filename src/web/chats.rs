//! Chat, prompt and model listing routes

use crate::models::ai_models::AiModel;
use crate::models::chats::{Chat, NewChat};
use crate::models::prompts::{NewPrompt, Prompt, PromptChanges};
use crate::models::users::User;
use crate::web::validate_jwt;
use crate::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePromptRequest {
    pub user_input: String,
    #[serde(rename = "modelName")]
    pub model_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromptRequest {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub is_starred: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarPromptRequest {
    pub is_starred: bool,
}

/// A chat with its prompts inlined, as listed by `GET /api/chat`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWithPrompts {
    #[serde(flatten)]
    pub chat: Chat,
    pub prompts: Vec<Prompt>,
}

const DEFAULT_CHAT_TITLE: &str = "New Chat";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/models", get(list_models))
        .route(
            "/api/chat",
            get(list_chats).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/chat",
            post(create_chat).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/chat/:chat_id/prompts",
            post(create_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/prompt/:prompt_id",
            patch(update_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/prompt/:prompt_id/star",
            patch(star_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/chat/:chat_id/prompts/:prompt_id",
            patch(update_chat_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/chat/:chat_id/prompts/:prompt_id/star",
            patch(star_chat_prompt).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .route(
            "/api/starred",
            get(list_starred).layer(from_fn_with_state(state.clone(), validate_jwt)),
        )
        .with_state(state)
}

/// The user's prompt, as long as it sits in `chat_id`. A prompt in another
/// chat is reported as missing.
pub(crate) fn get_prompt_in_chat(
    data: &AppState,
    user: &User,
    chat_id: i32,
    prompt_id: i32,
) -> Result<Prompt, ApiError> {
    let chat = data.db.get_chat_for_user(chat_id, user.id)?;
    let prompt = data.db.get_prompt_for_user(prompt_id, user.id)?;
    if prompt.chat_id != chat.id {
        debug!("Prompt {} is not part of chat {}", prompt_id, chat_id);
        return Err(ApiError::NotFound);
    }
    Ok(prompt)
}

fn prompt_changes(body: UpdatePromptRequest) -> PromptChanges {
    let mut changes = body.is_starred.map(PromptChanges::starred).unwrap_or_default();
    changes.response = body.response;
    changes
}

async fn list_models(State(data): State<Arc<AppState>>) -> Result<Json<Vec<AiModel>>, ApiError> {
    Ok(Json(data.db.list_ai_models()?))
}

async fn list_chats(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ChatWithPrompts>>, ApiError> {
    let chats = data
        .db
        .list_chats_with_prompts(user.id)?
        .into_iter()
        .map(|(chat, prompts)| ChatWithPrompts { chat, prompts })
        .collect();
    Ok(Json(chats))
}

async fn create_chat(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(body): Json<CreateChatRequest>,
) -> Result<Json<Chat>, ApiError> {
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string());

    let chat = data.db.create_chat(NewChat::new(user.id, title))?;
    debug!("Created chat {} for user {}", chat.id, user.uuid);
    Ok(Json(chat))
}

async fn create_prompt(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(chat_id): Path<i32>,
    Json(body): Json<CreatePromptRequest>,
) -> Result<Json<Prompt>, ApiError> {
    if body.user_input.trim().is_empty() {
        return Err(ApiError::BadRequest);
    }

    let chat = data.db.get_chat_for_user(chat_id, user.id)?;
    let prompt = data
        .db
        .create_prompt(NewPrompt::new(chat.id, body.user_input, body.model_name))?;
    debug!("Created prompt {} in chat {}", prompt.id, chat.id);
    Ok(Json(prompt))
}

async fn update_prompt(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(prompt_id): Path<i32>,
    Json(body): Json<UpdatePromptRequest>,
) -> Result<Json<Prompt>, ApiError> {
    let prompt = data.db.get_prompt_for_user(prompt_id, user.id)?;
    Ok(Json(data.db.update_prompt(prompt.id, prompt_changes(body))?))
}

async fn update_chat_prompt(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((chat_id, prompt_id)): Path<(i32, i32)>,
    Json(body): Json<UpdatePromptRequest>,
) -> Result<Json<Prompt>, ApiError> {
    let prompt = get_prompt_in_chat(&data, &user, chat_id, prompt_id)?;
    Ok(Json(data.db.update_prompt(prompt.id, prompt_changes(body))?))
}

async fn star_prompt(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(prompt_id): Path<i32>,
    Json(body): Json<StarPromptRequest>,
) -> Result<Json<Prompt>, ApiError> {
    let prompt = data.db.get_prompt_for_user(prompt_id, user.id)?;
    let updated = data
        .db
        .update_prompt(prompt.id, PromptChanges::starred(body.is_starred))?;
    Ok(Json(updated))
}

async fn star_chat_prompt(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((chat_id, prompt_id)): Path<(i32, i32)>,
    Json(body): Json<StarPromptRequest>,
) -> Result<Json<Prompt>, ApiError> {
    let prompt = get_prompt_in_chat(&data, &user, chat_id, prompt_id)?;
    let updated = data
        .db
        .update_prompt(prompt.id, PromptChanges::starred(body.is_starred))?;
    Ok(Json(updated))
}

async fn list_starred(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Prompt>>, ApiError> {
    Ok(Json(data.db.list_starred_prompts(user.id)?))
}

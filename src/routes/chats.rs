use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{ChatSummary, Message};
use crate::routes::response::{success, success_with, ApiResponse, JsonBody};
use crate::routes::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// Ids of the chats the user takes part in
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResponse<Vec<String>> {
    let chats = state.chats.clone();
    let summaries = tokio::task::spawn_blocking(move || chats.list(current.username())).await??;
    Ok(success_with(
        summaries.into_iter().map(|s| s.id.to_string()).collect(),
    ))
}

/// Start a chat with another user
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<CreateChatRequest>,
) -> ApiResponse<ChatSummary> {
    if payload.to.is_empty() || payload.message.is_empty() {
        return Err(AppError::invalid("fields 'to' and 'message' are required"));
    }

    let chats = state.chats.clone();
    let summary = tokio::task::spawn_blocking(move || {
        chats.create(current.username(), &payload.to, &payload.message)
    })
    .await??;

    Ok(success_with(summary))
}

/// Participants and last message of a chat
pub async fn describe_chat(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<String>,
) -> ApiResponse<ChatSummary> {
    let chats = state.chats.clone();
    let summary =
        tokio::task::spawn_blocking(move || chats.describe(current.username(), &chat_id)).await??;
    Ok(success_with(summary))
}

/// Delete a chat for both participants
pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<String>,
) -> ApiResponse<()> {
    let chats = state.chats.clone();
    tokio::task::spawn_blocking(move || chats.delete(current.username(), &chat_id)).await??;
    Ok(success())
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<String>,
) -> ApiResponse<Vec<Message>> {
    let chats = state.chats.clone();
    let messages =
        tokio::task::spawn_blocking(move || chats.messages(current.username(), &chat_id)).await??;
    Ok(success_with(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<String>,
    JsonBody(payload): JsonBody<SendMessageRequest>,
) -> ApiResponse<Message> {
    if payload.message.is_empty() {
        return Err(AppError::invalid("field 'message' is required"));
    }

    let chats = state.chats.clone();
    let message = tokio::task::spawn_blocking(move || {
        chats.send(current.username(), &chat_id, &payload.message)
    })
    .await??;

    Ok(success_with(message))
}

/// Remove one of the user's own messages by position
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((chat_id, index)): Path<(String, String)>,
) -> ApiResponse<Message> {
    let index: usize = index
        .parse()
        .map_err(|_| AppError::invalid("message index must be a non-negative integer"))?;

    let chats = state.chats.clone();
    let removed = tokio::task::spawn_blocking(move || {
        chats.remove_message(current.username(), &chat_id, index)
    })
    .await??;

    Ok(success_with(removed))
}

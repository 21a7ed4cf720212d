use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use trustlet_types::api::{
    InboxEntry, InquiryRequest, MessageResponse, ReplyRequest, ResolveInviteResponse,
};

use crate::auth::AppState;
use crate::error::AppError;
use crate::middleware::Session;
use crate::workflow::{InviteResolution, Posted};

pub async fn inbox(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<InboxEntry>>, AppError> {
    let entries = state.workflow.inbox(session.user_id).await?;
    Ok(Json(entries))
}

pub async fn send_inquiry(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Json(req): Json<InquiryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let posted = state
        .workflow
        .inquire_about(session.user_id, listing_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message_response(posted))))
}

pub async fn send_reply(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Json(req): Json<ReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let posted = state
        .workflow
        .reply_to(session.user_id, message_id, &req.content, req.listing_id)
        .await?;
    Ok((StatusCode::CREATED, Json(message_response(posted))))
}

pub async fn approve_invite(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<Json<ResolveInviteResponse>, AppError> {
    let resolution = state
        .workflow
        .approve_invite(message_id, session.user_id)
        .await?;
    Ok(Json(resolve_response(resolution)))
}

pub async fn reject_invite(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<Json<ResolveInviteResponse>, AppError> {
    let resolution = state
        .workflow
        .reject_invite(message_id, session.user_id)
        .await?;
    Ok(Json(resolve_response(resolution)))
}

/// Removes the message from the caller's inbox. Status is untouched.
pub async fn hide_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, AppError> {
    state
        .workflow
        .hide_from_inbox(message_id, session.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn message_response(posted: Posted) -> MessageResponse {
    MessageResponse {
        message: posted.message,
        notification: posted.notification,
    }
}

fn resolve_response(resolution: InviteResolution) -> ResolveInviteResponse {
    ResolveInviteResponse {
        message_id: resolution.message_id,
        applicant_id: resolution.applicant_id,
        status: resolution.status,
        notification: resolution.notification,
    }
}

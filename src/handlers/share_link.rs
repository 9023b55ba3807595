use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::AuthedUser,
    models::share_link::ShareLink,
    repositories::conversation as conversation_repo,
    services::share_link::{self, LinkExpiry},
    state::AppState,
};

/// The request payload for creating a share link.
#[derive(Deserialize, Debug)]
pub struct CreateShareLinkRequest {
    pub expires_in: LinkExpiry,
}

/// A share link as returned to the conversation owner.
#[derive(Serialize)]
pub struct ShareLinkResponse {
    pub token: String,
    pub url: String,
    pub conversation_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<ShareLink> for ShareLinkResponse {
    fn from(link: ShareLink) -> Self {
        Self {
            url: format!("/respond/{}", link.token),
            token: link.token,
            conversation_id: link.conversation_id,
            expires_at: link.expires_at,
            created_at: link.created_at,
        }
    }
}

/// The response payload for revoking a share link.
#[derive(Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// Only the conversation's owner may manage its share link.
async fn require_ownership(
    state: &AppState,
    conversation_id: &Uuid,
    user_id: &Uuid,
) -> Result<()> {
    match conversation_repo::find_owner(&state.db, conversation_id).await? {
        None => Err(AppError::NotFound),
        Some(owner) if owner != *user_id => Err(AppError::Unauthorized),
        Some(_) => Ok(()),
    }
}

/// Creates a share link for a conversation, reusing the active one.
#[axum::debug_handler]
pub async fn create_share_link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<CreateShareLinkRequest>,
) -> Result<Response> {
    tracing::debug!(
        "🔗 Share link requested for conversation {} by {}",
        conversation_id,
        user.id
    );
    require_ownership(&state, &conversation_id, &user.id).await?;

    let link = share_link::create(&state.db, &conversation_id, &user.id, payload.expires_in).await?;

    Ok((StatusCode::CREATED, Json(ShareLinkResponse::from(link))).into_response())
}

/// Returns the active share link for a conversation, if any.
#[axum::debug_handler]
pub async fn get_share_link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Response> {
    require_ownership(&state, &conversation_id, &user.id).await?;

    let link = share_link::get(&state.db, &conversation_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(ShareLinkResponse::from(link)).into_response())
}

/// Revokes the active share link for a conversation.
#[axum::debug_handler]
pub async fn revoke_share_link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Response> {
    require_ownership(&state, &conversation_id, &user.id).await?;

    let revoked = share_link::revoke(&state.db, &conversation_id).await?;

    Ok(Json(RevokeResponse { revoked }).into_response())
}

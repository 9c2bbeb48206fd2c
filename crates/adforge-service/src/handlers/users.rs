//! User profile handlers.
//!
//! The upsert mirrors the sign-in flow: the frontend calls
//! `PUT /v1/users/me` after authenticating, and the record is created
//! from the identity provider's claims on first sight.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use adforge_core::{MediaRef, User};
use adforge_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Profile upsert request. All fields optional; the JWT claims fill
/// the gaps on first creation.
#[derive(Debug, Deserialize, Default)]
pub struct UpsertUserRequest {
    /// Display name override.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar blob reference override.
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

/// User profile response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Email address.
    pub email: String,
    /// Resolved avatar URL, if an avatar is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Current credit balance.
    pub credit_balance: i64,
    /// Creation timestamp.
    pub created_at: String,
}

impl UserResponse {
    fn from_user(user: &User, state: &AppState) -> Self {
        Self {
            id: user.id.to_string(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_ref.as_ref().map(|r| state.config.media_url(r)),
            credit_balance: user.credit_balance,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Create or update the calling user's profile.
pub async fn upsert_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Option<Json<UpsertUserRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let mut user = match state.store.get_user(&auth.user_id)? {
        Some(existing) => existing,
        None => {
            let display_name = auth
                .display_name
                .clone()
                .or_else(|| request.display_name.clone())
                .unwrap_or_else(|| "Anonymous".to_string());
            let email = auth.email.clone().unwrap_or_default();

            tracing::info!(user_id = %auth.user_id, "Creating user on first sign-in");
            User::new(auth.user_id, display_name, email)
        }
    };

    if let Some(name) = request.display_name {
        user.display_name = name;
    }
    if let Some(avatar) = request.avatar_ref {
        user.avatar_ref = Some(MediaRef::new(avatar));
    } else if user.avatar_ref.is_none() {
        user.avatar_ref = auth.avatar_url.clone().map(MediaRef::new);
    }
    if let Some(email) = &auth.email {
        user.email.clone_from(email);
    }
    user.updated_at = Utc::now();

    state.store.put_user(&user)?;

    Ok(Json(UserResponse::from_user(&user, &state)))
}

/// Get the calling user's profile.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store
        .get_user(&auth.user_id)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(UserResponse::from_user(&user, &state)))
}

//! Profile endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::api::ApiResult;
use crate::memory_db::UserProfile;
use crate::shared_state::AppState;
use crate::workflows::{self, ProfileUpdate};

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub status: String,
    pub message: String,
    pub user_id: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileDeleteResponse {
    pub status: String,
    pub message: String,
    pub user_id: i64,
}

pub async fn get_profile(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<UserProfile> {
    Ok(Json(workflows::get_profile(&state.ctx, user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<ProfileUpdateResponse> {
    let write = workflows::update_profile(&state.ctx, user_id, update).await?;
    Ok(Json(ProfileUpdateResponse {
        status: "success".to_string(),
        message: write.message().to_string(),
        user_id,
        updated_at: write.updated_at,
    }))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<ProfileDeleteResponse> {
    workflows::delete_profile(&state.ctx, user_id).await?;
    Ok(Json(ProfileDeleteResponse {
        status: "success".to_string(),
        message: "Profile deleted successfully".to_string(),
        user_id,
    }))
}

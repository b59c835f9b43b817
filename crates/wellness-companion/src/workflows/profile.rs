//! Profile read, merge-update and delete

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info};
use validator::Validate;

use crate::memory_db::{format_instant, UserProfile};
use crate::shared_state::ServiceContext;
use crate::workflows::error::{Phase, WorkflowError, WorkflowResult};

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(range(min = 1, max = 150))]
    pub age: Option<i64>,
    #[validate(length(max = 500))]
    pub background: Option<String>,
    pub preferences: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileWrite {
    pub created: bool,
    pub updated_at: String,
}

impl ProfileWrite {
    pub fn message(&self) -> &'static str {
        if self.created {
            "Profile created successfully"
        } else {
            "Profile updated successfully"
        }
    }
}

/// Stored profile, or defaults when the user has none
pub async fn get_profile(ctx: &ServiceContext, user_id: i64) -> WorkflowResult<UserProfile> {
    let stored = ctx.profiles.get_profile(user_id).await.map_err(|e| {
        error!("Profile read failed for user {}: {:#}", user_id, e);
        WorkflowError::dependency(Phase::ProfileRead, &e)
    })?;
    Ok(stored.unwrap_or_else(|| UserProfile::with_defaults(user_id)))
}

pub fn merge_profile(user_id: i64, existing: Option<UserProfile>, update: ProfileUpdate, now: &str) -> UserProfile {
    let mut profile = existing.unwrap_or_else(|| {
        let mut fresh = UserProfile::with_defaults(user_id);
        fresh.created_at = Some(now.to_string());
        fresh
    });

    if let Some(age) = update.age {
        profile.age = Some(age);
    }
    if let Some(background) = update.background {
        profile.background = background;
    }
    if let Some(preferences) = update.preferences {
        profile.preferences = preferences;
    }
    profile.updated_at = Some(now.to_string());
    profile
}

pub async fn update_profile(ctx: &ServiceContext, user_id: i64, update: ProfileUpdate) -> WorkflowResult<ProfileWrite> {
    if user_id <= 0 {
        return Err(WorkflowError::validation("user_id must be a positive integer"));
    }
    update
        .validate()
        .map_err(|e| WorkflowError::validation(format!("Invalid profile: {}", e)))?;

    let update_failed = |e: anyhow::Error| {
        error!("Profile update failed for user {}: {:#}", user_id, e);
        WorkflowError::dependency(Phase::ProfileUpdate, &e)
    };

    let existing = ctx.profiles.get_profile(user_id).await.map_err(update_failed)?;
    let created = existing.is_none();
    let now = format_instant(&Utc::now());
    let profile = merge_profile(user_id, existing, update, &now);

    ctx.profiles.put_profile(&profile).await.map_err(update_failed)?;

    info!("Profile {} for user {}", if created { "created" } else { "updated" }, user_id);
    Ok(ProfileWrite { created, updated_at: now })
}

pub async fn delete_profile(ctx: &ServiceContext, user_id: i64) -> WorkflowResult<()> {
    let deleted = ctx.profiles.delete_profile(user_id).await.map_err(|e| {
        error!("Profile delete failed for user {}: {:#}", user_id, e);
        WorkflowError::dependency(Phase::ProfileDelete, &e)
    })?;

    if !deleted {
        return Err(WorkflowError::NotFound(format!("Profile not found for user_id: {}", user_id)));
    }
    info!("Profile deleted for user {}", user_id);
    Ok(())
}

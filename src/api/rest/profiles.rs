use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::profile::UserProfile;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/profiles/:uid",
        get(get_profile).put(save_profile).patch(update_profile),
    )
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .profiles
        .get(&uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {uid} not found")))?;

    Ok(Json(profile))
}

async fn save_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(mut payload): Json<UserProfile>,
) -> Result<Json<UserProfile>, AppError> {
    payload.uid = uid;
    state.profiles.save(&payload).await?;
    Ok(Json(payload))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.profiles.update(&uid, fields).await?))
}

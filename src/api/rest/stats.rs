use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::auth::SignedInCourier;
use crate::engine::ledger::Redemption;
use crate::error::AppError;
use crate::models::stats::DeliveryStats;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats/me", get(my_stats))
        .route("/stats/me/redeem", post(redeem_points))
        .route("/stats/:uid", get(courier_stats))
}

#[derive(Deserialize)]
pub struct RedeemRequest {
    pub points: u64,
}

async fn my_stats(
    State(state): State<Arc<AppState>>,
    SignedInCourier(courier): SignedInCourier,
) -> Result<Json<DeliveryStats>, AppError> {
    Ok(Json(state.ledger.get(&courier.id).await?))
}

async fn courier_stats(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<DeliveryStats>, AppError> {
    Ok(Json(state.ledger.get(&uid).await?))
}

async fn redeem_points(
    State(state): State<Arc<AppState>>,
    SignedInCourier(courier): SignedInCourier,
    Json(payload): Json<RedeemRequest>,
) -> Result<Json<Redemption>, AppError> {
    Ok(Json(state.ledger.redeem(&courier.id, payload.points).await?))
}

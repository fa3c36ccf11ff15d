use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;

use crate::api::rest::auth::SignedInCourier;
use crate::engine::assignment::DeliveryReceipt;
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/available", get(list_available_orders))
        .route("/orders/mine", get(list_my_deliveries))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/deliver", post(mark_delivered))
}

async fn list_available_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.engine.list_available_orders().await?))
}

async fn list_my_deliveries(
    State(state): State<Arc<AppState>>,
    SignedInCourier(courier): SignedInCourier,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.engine.list_my_deliveries(&courier.id).await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.get_order(&id).await?))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    SignedInCourier(courier): SignedInCourier,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.accept_order(&id, &courier).await?))
}

async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    SignedInCourier(courier): SignedInCourier,
    Path(id): Path<String>,
) -> Result<Json<DeliveryReceipt>, AppError> {
    Ok(Json(state.engine.mark_delivered(&id, &courier).await?))
}

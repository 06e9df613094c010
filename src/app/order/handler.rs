//! 订单处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use super::{
    batch::BatchReport,
    model::{CreateOrderRequest, EditOrderRequest, Order},
    service::OrderService,
};
use crate::core::{error::CoreError, response::ApiResponse};

#[derive(Clone)]
pub struct AppState {
    pub order_service: OrderService,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/process", post(process_orders))
        .route(
            "/orders/:id",
            get(get_order).put(edit_order).delete(delete_order),
        )
}

pub async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Order>>>, CoreError> {
    let orders = state.order_service.list().await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), CoreError> {
    let order = state.order_service.create(payload).await?;
    let message = format!("Order {} created", order.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(order).with_message(message)),
    ))
}

pub async fn process_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<BatchReport>>, CoreError> {
    let report = state.order_service.process_pending().await?;
    let message = format!(
        "{} orders processed, {} failed, {} iterations",
        report.total_processed(),
        report.total_failed(),
        report.iteration_count()
    );
    Ok(Json(ApiResponse::success(report).with_message(message)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Order>>, CoreError> {
    let order = state.order_service.get(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn edit_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<EditOrderRequest>,
) -> Result<Json<ApiResponse<Order>>, CoreError> {
    let order = state.order_service.edit(id, payload).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, CoreError> {
    state.order_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// 健康检查
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, CoreError> {
    state.order_service.health().await?;

    Ok(Json(json!({
        "status": "healthy",
        "store": "connected",
        "timestamp": chrono::Utc::now()
    })))
}

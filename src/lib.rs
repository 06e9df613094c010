//! # Order Desk
//!
//! 订单管理服务：订单的增删改查，以及把全部 Pending 订单推进到
//! Processed 的批处理。
//!
//! - `app`：订单模型、存储抽象、业务服务、批处理与 HTTP 处理器
//! - `core`：错误类型、响应结构、中间件
//! - `infrastructure`：配置、日志、PostgreSQL 与内存存储

pub mod app;
pub mod core;
pub mod infrastructure;

use std::time::Duration;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::order::{handler, OrderService};
use crate::core::middleware::request_logging_middleware;
use crate::infrastructure::config::ServerConfig;

/// 组装带中间件的完整路由
pub fn build_router(order_service: OrderService, server: &ServerConfig) -> Router {
    handler::routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(
                    server.request_timeout_secs,
                )))
                .layer(middleware::from_fn(request_logging_middleware)),
        )
        .with_state(handler::AppState { order_service })
}

//! API 路由模块
//!
//! 对外只有两个入口：
//!
//! - [`health`] - 健康检查
//! - `/ws` - 实时推送（见 [`crate::message::ws`]）

pub mod health;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;
use crate::message::ws::ws_handler;

/// 同时处理中的 HTTP 请求上限（WebSocket 升级完成后不再占用）
const MAX_IN_FLIGHT_REQUESTS: usize = 1024;

/// 完整路由（带 tracing 中间件）
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT_REQUESTS)),
        )
        .with_state(state)
}

//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 健康检查（含数据库延迟） |
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "version": "0.1.0",
//!   "uptime_seconds": 42,
//!   "database": { "status": "ok", "latency_ms": 1, "message": null }
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use http::StatusCode;
use serde::Serialize;
use std::time::SystemTime;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// healthy | degraded
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: CheckResult,
}

/// 单项检查结果
#[derive(Debug, Serialize)]
pub struct CheckResult {
    /// ok | error
    pub status: &'static str,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

// 服务器启动时间 (首次访问时记录)
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

pub(crate) fn mark_start() {
    START_TIME.get_or_init(SystemTime::now);
}

fn uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 数据库不可用时返回 503
pub async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let started = std::time::Instant::now();
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db.pool)
        .await
    {
        Ok(_) => CheckResult {
            status: "ok",
            latency_ms: Some(started.elapsed().as_millis() as u64),
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check database query failed");
            CheckResult {
                status: "error",
                latency_ms: None,
                message: Some(format!("Database error: {e}")),
            }
        }
    };

    let (code, status) = if database.status == "ok" {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime_seconds(),
        database,
    };
    (code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::sessions::SystemClock;
    use axum::body::Body;
    use http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_health(state: ServerState) -> (StatusCode, serde_json::Value) {
        let response = router()
            .with_state(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_ok() {
        let state = ServerState::in_memory(Config::with_overrides("/tmp/dine-test", 0), Arc::new(SystemClock))
            .await
            .unwrap();
        let (status, body) = get_health(state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_degraded_when_pool_closed() {
        let state = ServerState::in_memory(Config::with_overrides("/tmp/dine-test", 0), Arc::new(SystemClock))
            .await
            .unwrap();
        state.db.pool.close().await;
        let (status, body) = get_health(state).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert!(body["database"]["message"].is_string());
    }
}

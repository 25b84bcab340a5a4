//! Server Implementation
//!
//! HTTP / WebSocket 服务器启动和管理

use std::future::Future;

use tokio::net::TcpListener;

use crate::core::{Config, Result, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// 监听 `http_port`，Ctrl+C 时优雅退出
    pub async fn run(self) -> Result<()> {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Dine server listening on {}", addr);

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };
        serve(listener, self.state, shutdown).await
    }
}

/// 在已绑定的 listener 上运行服务，直到 `shutdown` 完成
///
/// 后台任务随服务启动，服务退出后统一关闭。
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    crate::api::health::mark_start();
    let tasks = state.start_background_tasks();
    let app = crate::api::router(state);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    tasks.shutdown().await;
    result?;
    Ok(())
}

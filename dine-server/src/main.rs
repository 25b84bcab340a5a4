use anyhow::Context;
use dine_server::{Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 配置, 日志)
    let config = setup_environment();

    print_banner();
    tracing::info!(
        environment = %config.environment,
        port = config.http_port,
        "Dine server starting..."
    );

    // 2. 初始化服务器状态
    let state = ServerState::initialize(&config)
        .await
        .context("Failed to initialize server state")?;

    // 3. 启动 HTTP / WebSocket 服务 (后台任务随服务启动)
    let server = Server::with_state(config, state);
    server.run().await.context("Server error")?;

    Ok(())
}

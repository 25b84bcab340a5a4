//! Dine Server - 堂食桌台会话与订单生命周期引擎
//!
//! # 架构概述
//!
//! - **会话** (`sessions`): 桌台会话创建 / 关闭，闲置会话巡检
//! - **订单** (`orders`): 下单、状态流转（状态机在 `shared::order`）
//! - **推送** (`message`): 按餐厅分房间的实时广播，WebSocket 桥接
//! - **数据库** (`db`): SQLite (sqlx)，迁移内嵌
//!
//! # 模块结构
//!
//! ```text
//! dine-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # /health 与 /ws 路由
//! ├── db/            # 连接池与仓储
//! ├── sessions/      # SessionRegistry, InactivityReaper, Clock
//! ├── orders/        # OrderOrchestrator, 金额计算
//! ├── message/       # FanoutChannel, RoomHub, WebSocket
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod message;
pub mod orders;
pub mod sessions;
pub mod utils;

// Re-export 公共类型
pub use core::{BackgroundTasks, Config, Server, ServerState};
pub use message::{FanoutChannel, PushTransport, RoomHub};
pub use orders::{OrderError, OrderOrchestrator};
pub use sessions::{InactivityReaper, SessionError, SessionRegistry};
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 加载 `.env` 并按配置初始化日志
///
/// 在读取 [`Config`] 之前调用，`.env` 中的变量才能生效。
pub fn setup_environment() -> Config {
    if let Err(e) = dotenv::dotenv() {
        // .env 是可选的
        eprintln!("No .env loaded: {e}");
    }
    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        config.json_logs(),
        config.log_dir.as_deref(),
    );
    config
}

pub fn print_banner() {
    println!(
        r#"
    ____  _
   / __ \(_)___  ___
  / / / / / __ \/ _ \
 / /_/ / / / / /  __/
/_____/_/_/ /_/\___/
    "#
    );
}

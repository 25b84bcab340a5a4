use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{BackgroundTasks, Config, Result};
use crate::db::DbService;
use crate::message::{FanoutChannel, RoomHub};
use crate::orders::OrderOrchestrator;
use crate::sessions::{Clock, InactivityReaper, ReaperConfig, SessionRegistry, SystemClock};

const ROOM_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有字段都是 Clone（内部 Arc / 连接池），可以直接交给 axum 作为 State。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 服务器配置 |
/// | db | SQLite 连接池 |
/// | hub | 房间广播中心（WebSocket 订阅） |
/// | fanout | 推送通道（注入到各组件） |
/// | registry | 桌台 / 会话 |
/// | orders | 订单编排 |
/// | reaper | 闲置会话巡检 |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub hub: Arc<RoomHub>,
    pub fanout: FanoutChannel,
    pub registry: SessionRegistry,
    pub orders: OrderOrchestrator,
    pub reaper: InactivityReaper,
    pub clock: Arc<dyn Clock>,
}

impl ServerState {
    /// 组装各组件：一个 RoomHub、一个 FanoutChannel，按依赖顺序注入
    pub fn new(config: Config, db: DbService, clock: Arc<dyn Clock>) -> Self {
        let hub = Arc::new(RoomHub::new(config.fanout_channel_capacity.max(1)));
        let fanout = FanoutChannel::new(hub.clone());
        let registry = SessionRegistry::new(db.pool.clone(), fanout.clone(), clock.clone());
        let orders = OrderOrchestrator::new(
            db.pool.clone(),
            registry.clone(),
            fanout.clone(),
            clock.clone(),
        );
        let reaper = InactivityReaper::new(
            registry.clone(),
            clock.clone(),
            ReaperConfig::from_config(&config),
        );

        Self {
            config,
            db,
            hub,
            fanout,
            registry,
            orders,
            reaper,
            clock,
        }
    }

    /// 初始化服务器状态
    ///
    /// 1. 创建工作目录
    /// 2. 打开数据库并执行迁移
    /// 3. 组装服务
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let db_path = PathBuf::from(&config.database_path);
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = DbService::new(&config.database_path).await?;
        Ok(Self::new(config.clone(), db, Arc::new(SystemClock)))
    }

    /// 内存数据库状态（测试 / 演示）
    pub async fn in_memory(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = DbService::in_memory().await?;
        Ok(Self::new(config, db, clock))
    }

    /// 启动后台任务（会话巡检、空房间清理）
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        self.reaper.register(&mut tasks);

        let hub = self.hub.clone();
        tasks.spawn_periodic("room_prune", ROOM_PRUNE_INTERVAL, move || {
            let hub = hub.clone();
            async move {
                let removed = hub.prune();
                if removed > 0 {
                    tracing::debug!(removed, "Pruned empty rooms");
                }
            }
        });
        tasks.log_summary();
        tasks
    }
}

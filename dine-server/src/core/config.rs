use std::path::PathBuf;
use std::time::Duration;

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | DATABASE_PATH | {WORK_DIR}/dine.db | SQLite 文件 |
/// | HTTP_PORT | 3000 | HTTP / WebSocket 端口 |
/// | REAPER_INTERVAL_SECS | 300 | 会话巡检间隔 |
/// | SESSION_INACTIVITY_MINUTES | 30 | 会话闲置阈值 |
/// | FANOUT_CHANNEL_CAPACITY | 256 | 每个房间的广播缓冲 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，设置后按天滚动写文件 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/dine HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// 数据库文件路径
    pub database_path: String,
    /// HTTP 服务端口
    pub http_port: u16,
    /// 会话巡检间隔（秒）
    pub reaper_interval_secs: u64,
    /// 会话闲置阈值（分钟）
    pub session_inactivity_minutes: u64,
    /// 推送广播通道容量
    pub fanout_channel_capacity: usize,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| {
            PathBuf::from(&work_dir)
                .join("dine.db")
                .to_string_lossy()
                .into_owned()
        });
        Self {
            work_dir,
            database_path,
            http_port: env_or("HTTP_PORT", 3000),
            reaper_interval_secs: env_or("REAPER_INTERVAL_SECS", 300),
            session_inactivity_minutes: env_or("SESSION_INACTIVITY_MINUTES", 30),
            fanout_channel_capacity: env_or("FANOUT_CHANNEL_CAPACITY", 256),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.database_path = PathBuf::from(&config.work_dir)
            .join("dine.db")
            .to_string_lossy()
            .into_owned();
        config.http_port = http_port;
        config
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.session_inactivity_minutes * 60)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 生产环境输出 JSON 日志
    pub fn json_logs(&self) -> bool {
        self.is_production()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

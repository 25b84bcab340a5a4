use thiserror::Error;

use crate::utils::AppError;

/// 启动 / 运行期错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("数据库初始化失败: {0}")]
    Database(#[from] AppError),
}

pub type Result<T> = std::result::Result<T, ServerError>;

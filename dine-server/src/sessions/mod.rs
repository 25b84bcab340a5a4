//! 桌台会话
//!
//! - [`SessionRegistry`]: 会话创建 / 查询 / 关闭，桌台占用状态
//! - [`InactivityReaper`]: 定时关闭闲置会话
//! - [`Clock`]: 可注入时钟

pub mod clock;
pub mod error;
pub mod reaper;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, SessionResult};
pub use reaper::{InactivityReaper, ReaperConfig, SweepReport};
pub use registry::{ClosedSession, ResolvedSession, SessionRegistry};

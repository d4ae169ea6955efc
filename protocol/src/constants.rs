//! 协议常量定义

use std::time::Duration;

/// 单条响应最大长度
pub const MAX_RESPONSE_LEN: usize = 65536;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 阻塞读超时（秒）
pub const READ_TIMEOUT_SECS: u64 = 30;

/// 建连失败后的固定重试间隔（秒）
pub const RETRY_BACKOFF_SECS: u64 = 1;

/// 练习模式每方默认时间（秒）- 25 分钟
pub const PRACTICE_GAME_SECS: u32 = 1500;

/// 练习模式单步默认时间（秒）
pub const PRACTICE_MOVE_SECS: u32 = 300;

/// 练习模式读秒默认时间（秒）
pub const PRACTICE_FREE_SECS: u32 = 20;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 阻塞读超时 Duration
pub const READ_TIMEOUT: Duration = Duration::from_secs(READ_TIMEOUT_SECS);

/// 重试间隔 Duration
pub const RETRY_BACKOFF: Duration = Duration::from_secs(RETRY_BACKOFF_SECS);

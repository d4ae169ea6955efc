//! 错误类型定义

use protocol::{Color, ProtocolError};
use thiserror::Error;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 座位已被其他玩家占用
    #[error("Seat {color} at table {table_id} is already taken")]
    SeatTaken { table_id: String, color: Color },

    /// 请求的座位颜色不合法
    #[error("Invalid seat color: {0}")]
    InvalidSeat(Color),

    /// 桌子不存在
    #[error("Table {0} not found")]
    TableNotFound(String),

    /// 玩家没有可用的连接
    #[error("Player {0} has no connection")]
    NotConnected(String),

    /// 站点类型不支持该操作
    #[error("Operation not supported by this site type")]
    NotSupported,

    /// 站点的本地玩家已被拆除
    #[error("Local player of site {0} is already torn down")]
    PlayerGone(u32),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// 会话操作结果类型
pub type Result<T> = std::result::Result<T, SessionError>;

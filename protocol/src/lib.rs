//! 多后端中国象棋客户端共享协议库
//!
//! 包含:
//! - 座位颜色、对局类型、对局状态、时限等核心数据结构
//! - 与具体后端无关的 Request/Response 意图/结果对
//! - 桌子清单 (TableInfo) 及其文本编解码
//! - 错误类型定义

mod constants;
mod error;
mod message;
mod types;

pub use constants::*;
pub use error::{ProtocolError, Result};
pub use message::{
    Request, RequestType, Response, ResultCode, ReplySink, TableInfo,
};
pub use types::{
    Color, GameStatus, GameType, Move, Piece, PieceKind, PlayerKind, Position,
    ServerAddress, TimeInfo,
};

//! 会话编排核心
//!
//! 把三个独立的事实来源——本地棋盘交互、异步网络响应、AI 计算——
//! 收敛为一份一致的对局状态：
//! - Connection: 每个远端一个后台工作者，FIFO 请求队列，异步回投响应
//! - Player: 对后端类型多态的玩家抽象，把高层意图变成协议请求
//! - Table: 单个对局会话的权威状态与调停者
//! - Site: 单个后端端点，负责连接/断开/关停时序
//! - SiteManager: 进程级站点登记处，唯一的统一拆除入口
//!
//! 并发约定：所有 Table/Player/Site 状态只在协调上下文中变更；
//! 工作者只构造不可变的 Response 并通过通道投递，绝不直接改共享状态。

mod backend;
mod board;
mod connection;
mod error;
mod event;
mod manager;
mod player;
mod referee;
mod registry;
mod site;
mod table;
mod wire;

pub use backend::{backend_for, AlternateBackend, Backend, GenericBackend};
pub use board::BoardView;
pub use connection::Connection;
pub use error::{Result, SessionError};
pub use event::{SessionEvent, SiteId};
pub use manager::{Session, SiteManager};
pub use player::{AiEngine, AiPlayer, Player, PlayerRef};
pub use referee::{LenientReferee, Referee, RefereeState};
pub use registry::PlayerRegistry;
pub use site::{Site, SiteType, TableEnvironment};
pub use table::{Table, TableId, TableKind};
pub use wire::{StxWire, TcpWire, Wire};

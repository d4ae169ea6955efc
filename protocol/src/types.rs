//! 核心数据结构：座位颜色、对局类型/状态、时限、走法

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// 座位颜色（同时表示桌上的角色）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// 红方
    Red,
    /// 黑方
    Black,
    /// 旁观者
    None,
    /// 未知（不在桌上）
    Unknown,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Color::Red => "Red",
            Color::Black => "Black",
            Color::None => "None",
            Color::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Red" => Ok(Color::Red),
            "Black" => Ok(Color::Black),
            "None" => Ok(Color::None),
            "Unknown" => Ok(Color::Unknown),
            other => Err(ProtocolError::MalformedField {
                field: "color",
                value: other.to_string(),
            }),
        }
    }
}

/// 对局类型
///
/// 进入对局后不可变，只能在开局前通过一次显式的 UPDATE 交换修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    /// 计分对局
    Rated,
    /// 不计分对局
    Nonrated,
    /// 本地人机练习
    Practice,
}

impl GameType {
    /// UPDATE 请求中 rated 字段的线上表示
    pub fn rated_flag(&self) -> &'static str {
        match self {
            GameType::Rated => "1",
            _ => "0",
        }
    }
}

/// 对局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Unknown,
    InProgress,
    RedWin,
    BlackWin,
    Drawn,
}

impl GameStatus {
    /// 对局是否已经结束
    pub fn is_game_over(&self) -> bool {
        matches!(
            self,
            GameStatus::RedWin | GameStatus::BlackWin | GameStatus::Drawn
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameStatus::Unknown => "unknown",
            GameStatus::InProgress => "in_progress",
            GameStatus::RedWin => "red_win",
            GameStatus::BlackWin => "black_win",
            GameStatus::Drawn => "drawn",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for GameStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(GameStatus::Unknown),
            "in_progress" => Ok(GameStatus::InProgress),
            "red_win" => Ok(GameStatus::RedWin),
            "black_win" => Ok(GameStatus::BlackWin),
            "drawn" => Ok(GameStatus::Drawn),
            other => Err(ProtocolError::MalformedField {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// 时限信息
///
/// 每张桌子持有一份初始时限，外加红黑双方各一份实时时钟，
/// 对局重置时三者一起恢复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeInfo {
    /// 全局时间（秒）
    pub game_secs: u32,
    /// 单步时间（秒）
    pub move_secs: u32,
    /// 读秒时间（秒）
    pub free_secs: u32,
}

impl TimeInfo {
    pub fn new(game_secs: u32, move_secs: u32, free_secs: u32) -> Self {
        Self {
            game_secs,
            move_secs,
            free_secs,
        }
    }
}

/// 线上表示: "1500/300/20"
impl fmt::Display for TimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.game_secs, self.move_secs, self.free_secs)
    }
}

impl FromStr for TimeInfo {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::MalformedField {
            field: "itimes",
            value: s.to_string(),
        };
        let mut parts = s.split('/');
        let game_secs = parts.next().ok_or_else(malformed)?;
        let move_secs = parts.next().ok_or_else(malformed)?;
        let free_secs = parts.next().ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(Self {
            game_secs: game_secs.parse().map_err(|_| malformed())?,
            move_secs: move_secs.parse().map_err(|_| malformed())?,
            free_secs: free_secs.parse().map_err(|_| malformed())?,
        })
    }
}

/// 棋盘坐标（列 0-8，行 0-9）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

/// 棋子种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceKind {
    General,
    Advisor,
    Elephant,
    Horse,
    Chariot,
    Cannon,
    Soldier,
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
}

/// 一步走法
///
/// 由外部裁判/棋盘产生，记录后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub piece: Piece,
    pub from: Position,
    pub to: Position,
    pub captured: Option<Piece>,
}

impl Move {
    /// 线上记法: 四位数字 "xyXY"（源列行 + 目标列行）
    pub fn notation(&self) -> String {
        format!("{}{}{}{}", self.from.x, self.from.y, self.to.x, self.to.y)
    }
}

/// 玩家后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerKind {
    /// 本地玩家（其棋盘界面挂在桌上）
    Local,
    /// 本地 AI 玩家
    Ai,
    /// 通用远程服务器上的玩家
    Remote,
    /// 另一种线上方言的远程服务器上的玩家
    AlternateRemote,
    /// 远端参与者的占位记录（本客户端不控制）
    Dummy,
}

impl PlayerKind {
    /// 是否由本客户端控制（棋盘玩家推导的依据）
    pub fn is_locally_controlled(&self) -> bool {
        matches!(
            self,
            PlayerKind::Local | PlayerKind::Remote | PlayerKind::AlternateRemote
        )
    }
}

/// 服务器地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

//! 与具体后端无关的请求/响应类型
//!
//! Request 是上层意图的统一表示：一个类型标签加字符串键值参数。
//! 后端方言只在 Connection 边界把它格式化成各自的线上形式。
//! Response 是结果的统一表示：类型标签、结果码、原始负载文本。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::ProtocolError;
use crate::types::{GameType, TimeInfo};

/// 异步回投目标：Connection 工作者把 Response 投递到这里，
/// 协调上下文按自己的节奏取走，绝不跨线程直接回调。
pub type ReplySink = UnboundedSender<Response>;

/// 请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// 登录后端
    Connect,
    /// 登出后端
    Disconnect,
    /// 拉取桌子清单
    List,
    /// 开新桌
    New,
    /// 加入某桌
    Join,
    /// 离开某桌
    Leave,
    /// 走棋
    Move,
    /// 聊天消息
    Msg,
    /// 认输
    Resign,
    /// 求和（或响应求和）
    Draw,
    /// 重置对局
    Reset,
    /// 修改桌子选项（计分标志 + 时限）
    Update,
    /// 调整 AI 难度
    AiLevel,
    /// 轮询（仅限轮询型后端）
    Poll,
    /// 要求工作者清空队列后退出
    Shutdown,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestType::Connect => "CONNECT",
            RequestType::Disconnect => "DISCONNECT",
            RequestType::List => "LIST",
            RequestType::New => "NEW",
            RequestType::Join => "JOIN",
            RequestType::Leave => "LEAVE",
            RequestType::Move => "MOVE",
            RequestType::Msg => "MSG",
            RequestType::Resign => "RESIGN",
            RequestType::Draw => "DRAW",
            RequestType::Reset => "RESET",
            RequestType::Update => "UPDATE",
            RequestType::AiLevel => "AI_LEVEL",
            RequestType::Poll => "POLL",
            RequestType::Shutdown => "SHUTDOWN",
        };
        write!(f, "{}", s)
    }
}

/// 结果码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    Err,
    Timeout,
    NotFound,
    NotSupported,
}

impl ResultCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

/// 统一的请求
///
/// `reply_to` 为空表示发后不理（例如 SHUTDOWN）。
#[derive(Debug, Clone)]
pub struct Request {
    pub rtype: RequestType,
    pub params: HashMap<String, String>,
    pub reply_to: Option<ReplySink>,
}

impl Request {
    pub fn new(rtype: RequestType) -> Self {
        Self {
            rtype,
            params: HashMap::new(),
            reply_to: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_reply_to(mut self, sink: ReplySink) -> Self {
        self.reply_to = Some(sink);
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// 统一的响应
#[derive(Debug, Clone)]
pub struct Response {
    /// 始发请求的类型
    pub rtype: RequestType,
    pub code: ResultCode,
    /// 原始负载文本，由 Player/Site 解析成有类型的字段
    pub content: String,
}

impl Response {
    pub fn ok(rtype: RequestType, content: impl Into<String>) -> Self {
        Self {
            rtype,
            code: ResultCode::Ok,
            content: content.into(),
        }
    }

    pub fn error(rtype: RequestType, content: impl Into<String>) -> Self {
        Self {
            rtype,
            code: ResultCode::Err,
            content: content.into(),
        }
    }
}

/// 网络桌子的描述（LIST/JOIN 响应携带）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub id: String,
    pub game_type: GameType,
    pub initial_time: TimeInfo,
    pub red_time: TimeInfo,
    pub black_time: TimeInfo,
    pub red_id: Option<String>,
    pub red_score: i32,
    pub black_id: Option<String>,
    pub black_score: i32,
}

impl TableInfo {
    pub fn new(id: impl Into<String>, game_type: GameType, initial_time: TimeInfo) -> Self {
        Self {
            id: id.into(),
            game_type,
            initial_time,
            red_time: initial_time,
            black_time: initial_time,
            red_id: None,
            red_score: 0,
            black_id: None,
            black_score: 0,
        }
    }

    /// 通用后端的单条记录格式:
    /// `tid,rated,itimes,red_id,red_score,black_id,black_score`
    /// （空的座位以空字符串表示）
    pub fn from_record(record: &str) -> crate::Result<Self> {
        let fields: Vec<&str> = record.split(',').collect();
        if fields.len() != 7 {
            return Err(ProtocolError::MalformedRecord(record.to_string()));
        }
        let parse_score = |s: &str| -> crate::Result<i32> {
            if s.is_empty() {
                return Ok(0);
            }
            s.parse().map_err(|_| ProtocolError::MalformedField {
                field: "score",
                value: s.to_string(),
            })
        };
        let game_type = if fields[1] == "1" {
            GameType::Rated
        } else {
            GameType::Nonrated
        };
        let initial_time = TimeInfo::from_str(fields[2])?;
        let opt = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };
        Ok(Self {
            id: fields[0].to_string(),
            game_type,
            initial_time,
            red_time: initial_time,
            black_time: initial_time,
            red_id: opt(fields[3]),
            red_score: parse_score(fields[4])?,
            black_id: opt(fields[5]),
            black_score: parse_score(fields[6])?,
        })
    }

    pub fn to_record(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.id,
            self.game_type.rated_flag(),
            self.initial_time,
            self.red_id.as_deref().unwrap_or(""),
            self.red_score,
            self.black_id.as_deref().unwrap_or(""),
            self.black_score,
        )
    }

    /// 解析分号分隔的清单负载
    pub fn parse_list(content: &str) -> crate::Result<Vec<Self>> {
        content
            .split(';')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Self::from_record)
            .collect()
    }
}

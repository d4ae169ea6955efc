//! 玩家抽象
//!
//! 本地玩家把高层意图（连线、开桌、入座、走棋）变成统一的
//! Request 放进自己连接的队列；正确性在匹配的 Response 异步
//! 到达时才真正确立。AI 玩家走同样的 Request/Response 形状，
//! 只是当场出结果，不经过网络。

use std::sync::Arc;

use tracing::debug;

use protocol::{
    Color, ReplySink, Request, RequestType, Response, ServerAddress, TimeInfo,
};
use protocol::{PlayerKind, ResultCode};

use crate::backend::Backend;
use crate::connection::Connection;
use crate::error::{Result, SessionError};
use crate::table::{Table, TableId};

/// 玩家的轻量描述，桌子座位与占位登记都用它
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    pub id: String,
    pub kind: PlayerKind,
    pub score: i32,
}

impl PlayerRef {
    pub fn new(id: impl Into<String>, kind: PlayerKind, score: i32) -> Self {
        Self {
            id: id.into(),
            kind,
            score,
        }
    }
}

/// 会话在某个后端上的本地身份
///
/// 由 Site 独占持有；连接在创建时移交进来（0 或 1 条）。
pub struct Player {
    id: String,
    score: i32,
    kind: PlayerKind,
    /// 只用于认证 CONNECT 请求
    password: Option<String>,
    backend: Arc<dyn Backend>,
    connection: Option<Connection>,
    reply_sink: ReplySink,
    /// 占据中的桌子及各自的座位，按加入先后排列
    tables: Vec<(TableId, Color)>,
}

impl Player {
    pub fn new(
        id: impl Into<String>,
        kind: PlayerKind,
        password: Option<String>,
        backend: Arc<dyn Backend>,
        reply_sink: ReplySink,
    ) -> Self {
        Self {
            id: id.into(),
            score: 0,
            kind,
            password,
            backend,
            connection: None,
            reply_sink,
            tables: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> PlayerKind {
        self.kind
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn set_score(&mut self, score: i32) {
        self.score = score;
    }

    pub fn player_ref(&self) -> PlayerRef {
        PlayerRef::new(self.id.clone(), self.kind, self.score)
    }

    /// 为该玩家启动连接工作者（链路类型由后端策略决定）
    pub fn start_connection(&mut self, address: ServerAddress) {
        if self.connection.is_some() {
            debug!(player = %self.id, "Connection already started");
            return;
        }
        self.connection = Some(Connection::start(address, Arc::clone(&self.backend)));
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(Connection::is_connected)
            .unwrap_or(false)
    }

    /// 收回并关停连接（站点拆除的第二阶段调用）
    pub fn reset_connection(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.shutdown();
        }
    }

    fn enqueue(&self, req: Request) -> Result<()> {
        let conn = self
            .connection
            .as_ref()
            .ok_or_else(|| SessionError::NotConnected(self.id.clone()))?;
        conn.add_request(req.with_reply_to(self.reply_sink.clone()));
        Ok(())
    }

    /// 登录后端
    pub fn connect_to_server(&self) -> Result<()> {
        let mut req = Request::new(RequestType::Connect).with_param("pid", &self.id);
        if let Some(password) = &self.password {
            req = req.with_param("password", password);
        }
        self.enqueue(req)
    }

    /// 登出后端；匹配的响应到达后站点才进入关停就绪
    pub fn disconnect_from_server(&self) -> Result<()> {
        self.enqueue(Request::new(RequestType::Disconnect).with_param("pid", &self.id))
    }

    /// 拉取桌子清单
    pub fn query_tables(&self) -> Result<()> {
        self.enqueue(Request::new(RequestType::List).with_param("pid", &self.id))
    }

    /// 请服务器开一张新桌
    pub fn open_new_table(&self, initial_time: TimeInfo) -> Result<()> {
        self.enqueue(
            Request::new(RequestType::New)
                .with_param("pid", &self.id)
                .with_param("itimes", initial_time.to_string()),
        )
    }

    /// 请求加入某张网络桌
    pub fn join_network_table(&self, table_id: &str) -> Result<()> {
        self.enqueue(
            Request::new(RequestType::Join)
                .with_param("tid", table_id)
                .with_param("pid", &self.id),
        )
    }

    /// 离开某张网络桌
    pub fn leave_network_table(&self, table_id: &str) -> Result<()> {
        self.enqueue(
            Request::new(RequestType::Leave)
                .with_param("tid", table_id)
                .with_param("pid", &self.id),
        )
    }

    /// 拉取积压的推送事件（轮询型后端）
    pub fn poll_events(&self) -> Result<()> {
        self.enqueue(Request::new(RequestType::Poll).with_param("pid", &self.id))
    }

    /// 替桌子投递一条已构造好的请求（MOVE/MSG/RESIGN/DRAW/RESET/UPDATE）
    pub fn request_from_table(&self, req: Request) -> Result<()> {
        self.enqueue(req)
    }

    /// 乐观入座：本地校验通过立即生效，网络确认异步到达
    pub fn join_table_as(&mut self, table: &mut Table, color: Color) -> Result<()> {
        table.assign_player_as(self.player_ref(), color)?;
        self.on_joined_table(table.id(), color);
        Ok(())
    }

    /// 最近活跃的桌子及本方座位（一桌限定后端的策略依据）
    pub fn front_role(&self) -> Option<(&str, Color)> {
        self.tables
            .last()
            .map(|(tid, color)| (tid.as_str(), *color))
    }

    /// 占据中的桌子数
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub(crate) fn on_joined_table(&mut self, table_id: &str, color: Color) {
        self.tables.retain(|(tid, _)| tid != table_id);
        self.tables.push((table_id.to_string(), color));
    }

    pub(crate) fn on_left_table(&mut self, table_id: &str) {
        self.tables.retain(|(tid, _)| tid != table_id);
    }

    /// 桌子关闭时的玩家侧善后：通知服务器离座（发后不理）
    pub(crate) fn on_close_from_table(&mut self, table_id: &str) {
        if self.connection.is_some() {
            if let Err(err) = self.leave_network_table(table_id) {
                debug!(player = %self.id, table = table_id, %err, "Leave on close skipped");
            }
        }
        self.on_left_table(table_id);
    }
}

/// AI 计算引擎（外部协作者）
pub trait AiEngine: Send {
    /// 吃进对方一步走法，给出己方回应的记法（None 表示认负/无着）
    fn on_opponent_move(&mut self, notation: &str) -> Option<String>;

    /// 调整难度
    fn set_level(&mut self, level: u8);

    /// 回到初始局面
    fn reset(&mut self);
}

/// 桌子内嵌的 AI 玩家
///
/// 由练习桌独占拥有，随桌子销毁。请求当场出结果，
/// 但形状与网络玩家完全一致，桌面代码无需区分后端。
pub struct AiPlayer {
    id: String,
    engine: Box<dyn AiEngine>,
}

impl AiPlayer {
    pub fn new(id: impl Into<String>, engine: Box<dyn AiEngine>) -> Self {
        Self {
            id: id.into(),
            engine,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn player_ref(&self) -> PlayerRef {
        PlayerRef::new(self.id.clone(), PlayerKind::Ai, 0)
    }

    /// 同步处理一条来自桌子的请求，返回同形状的响应
    pub fn on_request_from_table(&mut self, req: &Request) -> Response {
        match req.rtype {
            RequestType::Move => {
                let Some(notation) = req.param("move") else {
                    return Response::error(req.rtype, "missing move parameter");
                };
                match self.engine.on_opponent_move(notation) {
                    Some(reply) => Response::ok(req.rtype, reply),
                    None => Response::ok(req.rtype, ""),
                }
            }
            RequestType::AiLevel => {
                match req.param("ai_level").and_then(|s| s.parse::<u8>().ok()) {
                    Some(level) => {
                        self.engine.set_level(level);
                        Response::ok(req.rtype, "")
                    }
                    None => Response::error(req.rtype, "malformed ai_level"),
                }
            }
            RequestType::Reset => {
                self.engine.reset();
                Response::ok(req.rtype, "")
            }
            other => Response {
                rtype: other,
                code: ResultCode::NotSupported,
                content: String::new(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! 测试用 AI 引擎：按脚本出着

    use super::AiEngine;
    use std::collections::VecDeque;

    pub(crate) struct ScriptedEngine {
        pub(crate) replies: VecDeque<String>,
        pub(crate) level: u8,
        pub(crate) resets: u32,
    }

    impl ScriptedEngine {
        pub(crate) fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: replies.into_iter().map(String::from).collect(),
                level: 0,
                resets: 0,
            }
        }
    }

    impl AiEngine for ScriptedEngine {
        fn on_opponent_move(&mut self, _notation: &str) -> Option<String> {
            self.replies.pop_front()
        }

        fn set_level(&mut self, level: u8) {
            self.level = level;
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }
}

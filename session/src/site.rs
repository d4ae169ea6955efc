//! 站点：单个后端端点
//!
//! 一个站点对应一个后端（或本地练习环境），独占持有恰好一个本地
//! 玩家、该站点上所有打开的桌子、以及远端参与者的占位登记册。
//!
//! 站点拆除走两阶段：第一阶段先把本地玩家从站点上摘下（此后任何
//! 重入调用都只看到空位），第二阶段才逐桌关闭并收回连接，最后发
//! 一条 SiteCloseReady 事件请登记处移除本站点。关桌可能同步重入
//! 站点方法，摘在前是该路径不炸的前提。

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use protocol::{
    Color, GameStatus, GameType, Move, Request, RequestType, Response, ServerAddress, TableInfo,
    TimeInfo, PRACTICE_FREE_SECS, PRACTICE_GAME_SECS, PRACTICE_MOVE_SECS,
};

use crate::board::BoardView;
use crate::error::{Result, SessionError};
use crate::event::{SessionEvent, SiteId};
use crate::player::{AiEngine, AiPlayer, Player};
use crate::referee::Referee;
use crate::registry::PlayerRegistry;
use crate::table::{Table, TableId, TableKind};

/// 站点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteType {
    /// 本地练习环境，不出网
    Local,
    /// 通用远程服务器
    Remote,
    /// 另一种线上方言的远程服务器（一次只允许在一张桌上）
    AlternateRemote,
}

/// 桌子协作者工厂，由界面层注入
///
/// 核心不拥有棋盘渲染、规则引擎和 AI 计算，开桌时通过这个工厂
/// 向外要实例。
pub trait TableEnvironment: Send {
    /// 为新桌构造棋盘界面；返回 None 表示这张桌不需要界面
    fn make_board(&mut self, info: &TableInfo) -> Option<Box<dyn BoardView>>;

    /// 为新桌构造裁判
    fn make_referee(&mut self) -> Arc<Mutex<dyn Referee + Send>>;

    /// 为练习桌构造 AI 引擎
    fn make_engine(&mut self) -> Box<dyn AiEngine>;
}

pub struct Site {
    id: SiteId,
    stype: SiteType,
    address: ServerAddress,
    /// 拆除的第一阶段把玩家摘走，之后站点只等待被移除
    player: Option<Player>,
    tables: HashMap<TableId, Table>,
    registry: PlayerRegistry,
    /// 最近一次 LIST 的结果
    listing: Vec<TableInfo>,
    connecting: bool,
    disconnecting: bool,
    events: UnboundedSender<SessionEvent>,
    env: Box<dyn TableEnvironment>,
}

impl Site {
    pub fn new(
        id: SiteId,
        stype: SiteType,
        address: ServerAddress,
        player: Player,
        events: UnboundedSender<SessionEvent>,
        env: Box<dyn TableEnvironment>,
    ) -> Self {
        Self {
            id,
            stype,
            address,
            player: Some(player),
            tables: HashMap::new(),
            registry: PlayerRegistry::new(),
            listing: Vec::new(),
            connecting: false,
            disconnecting: false,
            events,
            env,
        }
    }

    pub fn id(&self) -> SiteId {
        self.id
    }

    pub fn site_type(&self) -> SiteType {
        self.stype
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn listing(&self) -> &[TableInfo] {
        &self.listing
    }

    pub fn table(&self, table_id: &str) -> Option<&Table> {
        self.tables.get(table_id)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    fn local_player(&self) -> Result<&Player> {
        self.player
            .as_ref()
            .ok_or(SessionError::PlayerGone(self.id))
    }

    // ---- 连接时序 ----

    /// 发起登录；重入安全
    pub fn connect(&mut self) -> Result<()> {
        if self.stype == SiteType::Local {
            return Ok(());
        }
        if self.connecting {
            debug!(site = self.id, "Connect already in flight");
            return Ok(());
        }
        self.connecting = true;
        self.local_player()?.connect_to_server()
    }

    /// 发起登出；重入安全
    ///
    /// 真正的拆除要等 DISCONNECT 的响应回来才做。
    pub fn disconnect(&mut self) {
        if self.disconnecting {
            debug!(site = self.id, "Disconnect already in flight");
            return;
        }
        self.disconnecting = true;
        let connected = self
            .player
            .as_ref()
            .map(Player::is_connected)
            .unwrap_or(false);
        if !connected {
            self.handle_shutdown_ready_from_player();
            return;
        }
        let failed = match &self.player {
            Some(player) => player.disconnect_from_server().is_err(),
            None => true,
        };
        if failed {
            warn!(site = self.id, "Disconnect request failed, tearing down");
            self.handle_shutdown_ready_from_player();
        }
    }

    /// 两阶段拆除
    ///
    /// 第二次（重入）调用看到玩家已被摘走，直接返回。
    pub fn handle_shutdown_ready_from_player(&mut self) {
        let Some(mut player) = self.player.take() else {
            debug!(site = self.id, "Shutdown ready for an already torn down site");
            return;
        };
        info!(site = self.id, player = %player.id(), "Tearing down site");

        let table_ids: Vec<TableId> = self.tables.keys().cloned().collect();
        for tid in table_ids {
            if let Some(mut table) = self.tables.remove(&tid) {
                for gone in table.close() {
                    if gone.id == player.id() {
                        player.on_left_table(&tid);
                    } else {
                        self.registry.remove(&gone.id);
                    }
                }
            }
        }
        player.reset_connection();

        if self
            .events
            .send(SessionEvent::SiteCloseReady { site_id: self.id })
            .is_err()
        {
            debug!(site = self.id, "Session event channel is gone");
        }
    }

    // ---- 响应分发 ----

    /// 本站点连接工作者回投的响应都从这里进来
    pub fn on_response(&mut self, response: Response) {
        if self.player.is_none() {
            // 逻辑上已关闭，在途响应安全忽略
            debug!(site = self.id, rtype = %response.rtype, "Late response ignored");
            return;
        }
        match response.rtype {
            RequestType::Connect => self.on_connect_response(response),
            RequestType::Disconnect => self.handle_shutdown_ready_from_player(),
            RequestType::List => self.on_list_response(response),
            RequestType::New | RequestType::Join => self.on_join_response(response),
            RequestType::Leave => {
                if !response.code.is_ok() {
                    warn!(site = self.id, content = %response.content, "Leave rejected");
                }
            }
            RequestType::Poll => self.on_poll_response(response),
            RequestType::Move
            | RequestType::Msg
            | RequestType::Resign
            | RequestType::Draw
            | RequestType::Reset
            | RequestType::Update => {
                if !response.code.is_ok() {
                    warn!(
                        site = self.id, rtype = %response.rtype,
                        content = %response.content, "Action rejected by server"
                    );
                }
            }
            RequestType::AiLevel | RequestType::Shutdown => {
                debug!(site = self.id, rtype = %response.rtype, "Unexpected response type");
            }
        }
    }

    fn on_connect_response(&mut self, response: Response) {
        self.connecting = false;
        if response.code.is_ok() {
            info!(site = self.id, endpoint = %self.address, "Logged in");
            return;
        }
        warn!(site = self.id, content = %response.content, "Login failed");
        match self.stype {
            // 这种后端失败后不会自己断链，必须明确登出
            SiteType::AlternateRemote => self.disconnect(),
            _ => self.handle_shutdown_ready_from_player(),
        }
    }

    fn on_list_response(&mut self, response: Response) {
        if !response.code.is_ok() {
            warn!(site = self.id, content = %response.content, "List query failed");
            return;
        }
        match TableInfo::parse_list(&response.content) {
            Ok(listing) => {
                debug!(site = self.id, tables = listing.len(), "Table listing updated");
                self.listing = listing;
            }
            Err(err) => warn!(site = self.id, %err, "Malformed table listing"),
        }
    }

    fn on_join_response(&mut self, response: Response) {
        if !response.code.is_ok() {
            warn!(site = self.id, content = %response.content, "Join rejected");
            return;
        }
        match TableInfo::from_record(response.content.trim()) {
            Ok(info) => {
                if let Err(err) = self.join_local_player_to_table(info) {
                    warn!(site = self.id, %err, "Could not seat local player");
                }
            }
            Err(err) => warn!(site = self.id, %err, "Malformed table record"),
        }
    }

    /// 落座进一张（可能是刚得知的）网络桌
    ///
    /// 远端的红黑双方记为占位玩家；本地玩家按桌况对号入座，
    /// 不在红黑之列就作为旁观者入桌。
    fn join_local_player_to_table(&mut self, info: TableInfo) -> Result<()> {
        let local_id = self.local_player()?.id().to_string();

        if !self.tables.contains_key(&info.id) {
            let mut table = Table::new(
                info.id.clone(),
                self.id,
                info.game_type,
                info.initial_time,
                TableKind::Network,
                self.env.make_referee(),
            );
            if let Some(board) = self.env.make_board(&info) {
                table.attach_board(board);
            }
            self.tables.insert(info.id.clone(), table);
        }

        let local_color = if info.red_id.as_deref() == Some(local_id.as_str()) {
            Color::Red
        } else if info.black_id.as_deref() == Some(local_id.as_str()) {
            Color::Black
        } else {
            Color::None
        };

        // 先安放远端占位玩家，再让本地玩家入座
        let mut remote_seats = Vec::new();
        if let (Some(red_id), true) = (&info.red_id, local_color != Color::Red) {
            remote_seats.push((
                self.registry.get_or_create(red_id, info.red_score),
                Color::Red,
            ));
        }
        if let (Some(black_id), true) = (&info.black_id, local_color != Color::Black) {
            remote_seats.push((
                self.registry.get_or_create(black_id, info.black_score),
                Color::Black,
            ));
        }

        let table = self
            .tables
            .get_mut(&info.id)
            .ok_or_else(|| SessionError::TableNotFound(info.id.clone()))?;
        for (player_ref, color) in remote_seats {
            table.assign_player_as(player_ref, color)?;
        }
        let player = self
            .player
            .as_mut()
            .ok_or(SessionError::PlayerGone(self.id))?;
        player.join_table_as(table, local_color)?;
        info!(site = self.id, table = %info.id, color = %local_color, "Joined table");
        Ok(())
    }

    fn on_poll_response(&mut self, response: Response) {
        if !response.code.is_ok() {
            debug!(site = self.id, "Poll returned no events");
            return;
        }
        let lines: Vec<String> = response
            .content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        for line in lines {
            self.handle_push_event(&line);
        }
    }

    /// 一条服务器推送事件，形如 `op=MOVE&tid=T1&pid=bob&move=7747`
    fn handle_push_event(&mut self, line: &str) {
        let mut op = None;
        let mut params: HashMap<&str, &str> = HashMap::new();
        for pair in line.split('&') {
            match pair.split_once('=') {
                Some(("op", v)) => op = Some(v),
                Some((k, v)) => {
                    params.insert(k, v);
                }
                None => {}
            }
        }
        let (Some(op), Some(tid)) = (op, params.get("tid").copied()) else {
            warn!(site = self.id, line, "Malformed push event");
            return;
        };

        if op == "JOIN" {
            self.on_remote_join(tid, &params);
            return;
        }

        let Some(table) = self.tables.get_mut(tid) else {
            debug!(site = self.id, table = tid, op, "Push event for an unknown table");
            return;
        };
        let pid = params.get("pid").copied().unwrap_or("");
        match op {
            "MOVE" => {
                if let Some(mv) = params.get("move") {
                    table.on_new_move(mv);
                }
            }
            "MOVES" => {
                if let Some(moves) = params.get("moves") {
                    let history: Vec<String> =
                        moves.split('/').map(String::from).collect();
                    table.on_past_moves(&history);
                }
            }
            "MSG" => {
                if let Some(msg) = params.get("msg") {
                    let public = params.get("private").copied() != Some("1");
                    table.on_message_from_network(pid, msg, public);
                }
            }
            "SYS" => {
                if let Some(msg) = params.get("msg") {
                    table.on_system_msg_from_network(msg);
                }
            }
            "LEAVE" => {
                table.on_leave_from_network(pid);
                if let Some(player) = &mut self.player {
                    if player.id() == pid {
                        player.on_left_table(tid);
                    }
                }
            }
            "DRAW" => table.on_draw_request_from_network(pid),
            "END" => {
                let status = params
                    .get("status")
                    .and_then(|s| GameStatus::from_str(s).ok())
                    .unwrap_or(GameStatus::Unknown);
                let reason = params.get("reason").copied().unwrap_or("");
                table.on_game_over_from_network(status, reason);
            }
            "RESET" => table.on_game_reset_from_network(),
            "SCORE" => {
                if let Some(score) = params.get("score").and_then(|s| s.parse().ok()) {
                    table.on_score_from_network(pid, score);
                }
            }
            "UPDATE" => {
                let rated = params.get("rated").copied() == Some("1");
                if let Some(itimes) = params.get("itimes").and_then(|s| TimeInfo::from_str(s).ok())
                {
                    table.on_update_from_player(rated, itimes);
                }
            }
            other => debug!(site = self.id, op = other, "Unknown push event"),
        }
    }

    /// 远端玩家进桌（或换座）的推送
    fn on_remote_join(&mut self, tid: &str, params: &HashMap<&str, &str>) {
        let Some(pid) = params.get("pid").copied() else {
            warn!(site = self.id, table = tid, "Join push without pid");
            return;
        };
        let color = params
            .get("color")
            .and_then(|c| Color::from_str(c).ok())
            .unwrap_or(Color::None);
        let score = params
            .get("score")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let is_local = self.player.as_ref().map(Player::id) == Some(pid);
        if is_local {
            // 本方换座的确认
            if let (Some(table), Some(player)) = (self.tables.get_mut(tid), self.player.as_mut()) {
                if let Err(err) = player.join_table_as(table, color) {
                    warn!(site = self.id, table = tid, %err, "Seat confirmation failed");
                }
            }
            return;
        }

        let player_ref = self.registry.get_or_create(pid, score);
        if let Some(table) = self.tables.get_mut(tid) {
            if let Err(err) = table.assign_player_as(player_ref, color) {
                warn!(site = self.id, table = tid, player = pid, %err, "Remote join rejected");
            }
        }
    }

    // ---- 本地意图 ----

    /// 刷新桌子清单
    pub fn query_tables(&self) -> Result<()> {
        self.local_player()?.query_tables()
    }

    /// 拉取积压的推送事件（轮询型后端定期调用）
    pub fn poll_events(&self) -> Result<()> {
        self.local_player()?.poll_events()
    }

    /// 本地想加入某张网络桌
    pub fn on_local_request_join(&mut self, table_id: &str) -> Result<()> {
        if !self.enforce_single_table_policy()? {
            return Ok(());
        }
        self.local_player()?.join_network_table(table_id)
    }

    /// 本地想开一张新网络桌
    pub fn on_local_request_new(&mut self, initial_time: TimeInfo) -> Result<()> {
        if !self.enforce_single_table_policy()? {
            return Ok(());
        }
        self.local_player()?.open_new_table(initial_time)
    }

    /// 一桌限定策略（仅另类后端）
    ///
    /// 正在下棋的桌子挡住新动作；仅旁观的桌子先关掉再放行。
    /// 返回 false 表示动作被挡下。
    fn enforce_single_table_policy(&mut self) -> Result<bool> {
        if self.stype != SiteType::AlternateRemote {
            return Ok(true);
        }
        let Some((tid, color)) = self
            .local_player()?
            .front_role()
            .map(|(t, c)| (t.to_string(), c))
        else {
            return Ok(true);
        };
        match color {
            Color::Red | Color::Black => {
                warn!(site = self.id, table = %tid, "Still playing at a table, action blocked");
                Ok(false)
            }
            _ => {
                warn!(site = self.id, table = %tid, "Closing observed table to honor one-table policy");
                self.close_table(&tid);
                Ok(true)
            }
        }
    }

    /// 开一张本地练习桌：本地玩家执红，AI 执黑
    pub fn open_practice_table(&mut self) -> Result<TableId> {
        if self.stype != SiteType::Local {
            return Err(SessionError::NotSupported);
        }
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let table_id = format!("PRACTICE_{suffix}");
        let ai_id = format!("AI_{suffix}");
        let practice_time =
            TimeInfo::new(PRACTICE_GAME_SECS, PRACTICE_MOVE_SECS, PRACTICE_FREE_SECS);

        let ai = AiPlayer::new(ai_id, self.env.make_engine());
        let ai_ref = ai.player_ref();
        let info = TableInfo::new(table_id.clone(), GameType::Practice, practice_time);

        let mut table = Table::new(
            table_id.clone(),
            self.id,
            GameType::Practice,
            practice_time,
            TableKind::Practice { ai },
            self.env.make_referee(),
        );
        if let Some(board) = self.env.make_board(&info) {
            table.attach_board(board);
        }
        table.assign_player_as(ai_ref, Color::Black)?;
        let player = self
            .player
            .as_mut()
            .ok_or(SessionError::PlayerGone(self.id))?;
        player.join_table_as(&mut table, Color::Red)?;

        info!(site = self.id, table = %table_id, "Practice table opened");
        self.tables.insert(table_id.clone(), table);
        Ok(table_id)
    }

    /// 关掉一张桌子并做玩家侧善后
    pub fn close_table(&mut self, table_id: &str) {
        let Some(mut table) = self.tables.remove(table_id) else {
            debug!(site = self.id, table = table_id, "Close for an unknown table");
            return;
        };
        let network = !table.is_practice();
        for gone in table.close() {
            match &mut self.player {
                Some(player) if player.id() == gone.id => {
                    if network {
                        player.on_close_from_table(table_id);
                    } else {
                        player.on_left_table(table_id);
                    }
                }
                _ => {
                    self.registry.remove(&gone.id);
                }
            }
        }
    }

    // ---- 棋盘指令转投 ----

    fn deliver(&self, req: Option<Request>) -> Result<()> {
        match req {
            Some(req) => self.local_player()?.request_from_table(req),
            None => Ok(()),
        }
    }

    fn with_table<F>(&mut self, table_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Table) -> Option<Request>,
    {
        let table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| SessionError::TableNotFound(table_id.to_string()))?;
        let req = f(table);
        self.deliver(req)
    }

    pub fn on_board_move(&mut self, table_id: &str, mv: &Move) -> Result<()> {
        self.with_table(table_id, |t| t.on_move_from_board(mv))
    }

    pub fn on_board_message(&mut self, table_id: &str, message: &str) -> Result<()> {
        self.with_table(table_id, |t| t.on_message_from_board(message))
    }

    pub fn on_board_join(&mut self, table_id: &str, color: Color) -> Result<()> {
        self.with_table(table_id, |t| t.on_join_command_from_board(color))
    }

    pub fn on_board_options(
        &mut self,
        table_id: &str,
        rated: bool,
        itimes: TimeInfo,
    ) -> Result<()> {
        self.with_table(table_id, |t| t.on_options_command_from_board(rated, itimes))
    }

    pub fn on_board_resign(&mut self, table_id: &str) -> Result<()> {
        self.with_table(table_id, |t| t.on_resign_command_from_board())
    }

    pub fn on_board_draw(&mut self, table_id: &str) -> Result<()> {
        self.with_table(table_id, |t| t.on_draw_command_from_board())
    }

    pub fn on_board_draw_response(&mut self, table_id: &str, accepted: bool) -> Result<()> {
        self.with_table(table_id, |t| t.on_draw_response_from_board(accepted))
    }

    pub fn on_board_reset(&mut self, table_id: &str) -> Result<()> {
        self.with_table(table_id, |t| t.on_reset_command_from_board())
    }

    pub fn on_board_ai_level(&mut self, table_id: &str, level: u8) -> Result<()> {
        let table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| SessionError::TableNotFound(table_id.to_string()))?;
        table.on_ai_level_update(level)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! 站点/管理器测试共用的环境与构件

    use super::*;
    use crate::board::recording::RecordingBoard;
    use crate::player::scripted::ScriptedEngine;
    use crate::referee::LenientReferee;

    /// 所有桌子共用一块录音棋盘的测试环境
    pub(crate) struct TestEnv {
        pub(crate) board: RecordingBoard,
    }

    impl TestEnv {
        pub(crate) fn new() -> (Self, RecordingBoard) {
            let board = RecordingBoard::new();
            (
                Self {
                    board: board.clone(),
                },
                board,
            )
        }
    }

    impl TableEnvironment for TestEnv {
        fn make_board(&mut self, _info: &TableInfo) -> Option<Box<dyn BoardView>> {
            Some(Box::new(self.board.clone()))
        }

        fn make_referee(&mut self) -> Arc<Mutex<dyn Referee + Send>> {
            Arc::new(Mutex::new(LenientReferee::new()))
        }

        fn make_engine(&mut self) -> Box<dyn AiEngine> {
            Box::new(ScriptedEngine::new(vec!["7747", "1022"]))
        }
    }
}

//! 桌子：单个对局会话的权威状态与调停者
//!
//! 桌子把三路输入调停到一份状态上：棋盘发起的指令
//! （`on_*_from_board` 族）、网络推送（`on_*_from_network` 族）、
//! 以及练习桌内嵌 AI 的即时回应。
//!
//! 桌子自己不发网络请求：棋盘指令经鉴权后被构造成一条 Request
//! 返还给调用方（Site），由棋盘玩家的连接投递。红黑双方和棋盘
//! 玩家一律从按加入先后排列的座位表即时推导，不另存缓存字段。

use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};

use protocol::{
    Color, GameStatus, GameType, Move, PlayerKind, Request, RequestType, TableInfo, TimeInfo,
};

use crate::board::BoardView;
use crate::error::{Result, SessionError};
use crate::event::SiteId;
use crate::player::{AiPlayer, PlayerRef};
use crate::referee::Referee;

/// 桌子 ID
pub type TableId = String;

/// 桌子类别
pub enum TableKind {
    /// 对手在远端，指令经由网络确认
    Network,
    /// 本地人机练习，对手是桌子独占拥有的 AI 玩家
    Practice { ai: AiPlayer },
}

pub struct Table {
    id: TableId,
    site_id: SiteId,
    game_type: GameType,
    kind: TableKind,
    referee: Arc<Mutex<dyn Referee + Send>>,
    /// 挂接期间独占；关桌时温和关闭，绝不硬丢弃
    board: Option<Box<dyn BoardView>>,
    /// 规范座位表：玩家到座位的映射，按加入先后排列
    seats: Vec<(PlayerRef, Color)>,
    initial_time: TimeInfo,
    red_time: TimeInfo,
    black_time: TimeInfo,
    moves: Vec<String>,
    status: GameStatus,
}

impl Table {
    pub fn new(
        id: impl Into<TableId>,
        site_id: SiteId,
        game_type: GameType,
        initial_time: TimeInfo,
        kind: TableKind,
        referee: Arc<Mutex<dyn Referee + Send>>,
    ) -> Self {
        Self {
            id: id.into(),
            site_id,
            game_type,
            kind,
            referee,
            board: None,
            seats: Vec::new(),
            initial_time,
            red_time: initial_time,
            black_time: initial_time,
            moves: Vec::new(),
            status: GameStatus::InProgress,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn is_practice(&self) -> bool {
        matches!(self.kind, TableKind::Practice { .. })
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn attach_board(&mut self, board: Box<dyn BoardView>) {
        self.board = Some(board);
    }

    pub fn has_board(&self) -> bool {
        self.board.is_some()
    }

    /// 当前桌况快照（清单展示用）
    pub fn table_info(&self) -> TableInfo {
        let mut info = TableInfo::new(self.id.clone(), self.game_type, self.initial_time);
        info.red_time = self.red_time;
        info.black_time = self.black_time;
        if let Some(red) = self.red_player() {
            info.red_id = Some(red.id.clone());
            info.red_score = red.score;
        }
        if let Some(black) = self.black_player() {
            info.black_id = Some(black.id.clone());
            info.black_score = black.score;
        }
        info
    }

    // ---- 座位表（推导，不缓存） ----

    pub fn red_player(&self) -> Option<&PlayerRef> {
        self.seats
            .iter()
            .find(|(_, c)| *c == Color::Red)
            .map(|(p, _)| p)
    }

    pub fn black_player(&self) -> Option<&PlayerRef> {
        self.seats
            .iter()
            .find(|(_, c)| *c == Color::Black)
            .map(|(p, _)| p)
    }

    /// 棋盘背后的玩家：最近加入的本客户端控制的玩家
    pub fn board_player(&self) -> Option<&PlayerRef> {
        self.seats
            .iter()
            .rev()
            .find(|(p, _)| p.kind.is_locally_controlled())
            .map(|(p, _)| p)
    }

    pub fn player_role(&self, player_id: &str) -> Option<Color> {
        self.seats
            .iter()
            .find(|(p, _)| p.id == player_id)
            .map(|(_, c)| *c)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player_role(player_id).is_some()
    }

    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    /// 入座（或换座，或以 None 退为旁观）
    ///
    /// 座位唯一性：红黑各至多一人，一人至多占一个位置。
    pub fn assign_player_as(&mut self, player: PlayerRef, color: Color) -> Result<()> {
        match color {
            Color::Unknown => return Err(SessionError::InvalidSeat(color)),
            Color::Red | Color::Black => {
                let occupied = self
                    .seats
                    .iter()
                    .any(|(p, c)| *c == color && p.id != player.id);
                if occupied {
                    return Err(SessionError::SeatTaken {
                        table_id: self.id.clone(),
                        color,
                    });
                }
            }
            Color::None => {}
        }
        // 换座等价于先摘后插，加入次序随之刷新
        self.seats.retain(|(p, _)| p.id != player.id);
        if let Some(board) = &mut self.board {
            board.on_player_join(&player, color);
        }
        self.seats.push((player, color));
        Ok(())
    }

    fn mover_clock(&self, color: Color) -> TimeInfo {
        match color {
            Color::Black => self.black_time,
            _ => self.red_time,
        }
    }

    fn base_request(&self, rtype: RequestType, pid: &str) -> Request {
        Request::new(rtype)
            .with_param("tid", &self.id)
            .with_param("pid", pid)
    }

    /// 鉴权入口：棋盘指令一律以棋盘玩家当前座位为准
    fn seated_board_player(&self) -> Option<(&PlayerRef, Color)> {
        let player = self.board_player()?;
        match self.player_role(&player.id) {
            Some(color @ (Color::Red | Color::Black)) => Some((player, color)),
            _ => None,
        }
    }

    // ---- 棋盘发起 ----

    /// 本地走棋
    ///
    /// 练习桌把走法转给 AI 并立即落子回应；网络桌构造一条 MOVE
    /// 请求交由棋盘玩家投递，确认异步到达。
    pub fn on_move_from_board(&mut self, mv: &Move) -> Option<Request> {
        let Some((player, color)) = self.seated_board_player() else {
            warn!(table = %self.id, "Move from an empty or observing seat, dropped");
            if let Some(board) = &mut self.board {
                board.on_system_output("You are not seated; move ignored");
            }
            return None;
        };
        let pid = player.id.clone();
        let clock = self.mover_clock(color);

        let (accepted, status) = match self.referee.lock() {
            Ok(mut referee) => referee.validate_move(mv),
            Err(_) => {
                error!(table = %self.id, "Referee lock poisoned, move dropped");
                return None;
            }
        };
        if !accepted {
            warn!(table = %self.id, notation = %mv.notation(), "Move rejected by referee");
            if let Some(board) = &mut self.board {
                board.on_system_output("Illegal move");
            }
            return None;
        }
        self.moves.push(mv.notation());
        self.status = status;

        match &mut self.kind {
            TableKind::Practice { ai } => {
                let req = Request::new(RequestType::Move).with_param("move", mv.notation());
                let resp = ai.on_request_from_table(&req);
                if resp.code.is_ok() && !resp.content.is_empty() {
                    self.moves.push(resp.content.clone());
                    if let Some(board) = &mut self.board {
                        board.on_new_move(&resp.content);
                    }
                } else {
                    debug!(table = %self.id, "AI produced no reply move");
                }
                if status.is_game_over() {
                    self.on_game_over_from_network(status, "checkmate");
                }
                None
            }
            TableKind::Network => Some(
                self.base_request(RequestType::Move, &pid)
                    .with_param("move", mv.notation())
                    .with_param("status", status.to_string())
                    .with_param("game_time", clock.game_secs.to_string()),
            ),
        }
    }

    /// 本地聊天：练习桌直接回显，网络桌发 MSG
    pub fn on_message_from_board(&mut self, message: &str) -> Option<Request> {
        let pid = self.board_player()?.id.clone();
        match self.kind {
            TableKind::Practice { .. } => {
                if let Some(board) = &mut self.board {
                    board.on_wall_output(message, &pid, true);
                }
                None
            }
            TableKind::Network => Some(
                self.base_request(RequestType::Msg, &pid)
                    .with_param("msg", message),
            ),
        }
    }

    /// 本地请求换座
    pub fn on_join_command_from_board(&mut self, color: Color) -> Option<Request> {
        let Some(player) = self.board_player().cloned() else {
            warn!(table = %self.id, "Join command without a board player, dropped");
            return None;
        };
        match self.kind {
            TableKind::Practice { .. } => {
                if let Err(err) = self.assign_player_as(player, color) {
                    warn!(table = %self.id, %err, "Seat change rejected");
                }
                None
            }
            TableKind::Network => Some(
                self.base_request(RequestType::Join, &player.id)
                    .with_param("color", color.to_string()),
            ),
        }
    }

    /// 本地修改桌子选项（计分标志 + 时限）
    ///
    /// 鉴权：红方可改；红座空缺时黑方可改。
    pub fn on_options_command_from_board(
        &mut self,
        rated: bool,
        itimes: TimeInfo,
    ) -> Option<Request> {
        let authorized = match self.seated_board_player() {
            Some((_, Color::Red)) => true,
            Some((_, Color::Black)) => self.red_player().is_none(),
            _ => false,
        };
        if !authorized {
            warn!(table = %self.id, "Options command from unauthorized seat, dropped");
            return None;
        }
        let pid = self.seated_board_player()?.0.id.clone();
        let game_type = if rated {
            GameType::Rated
        } else {
            GameType::Nonrated
        };
        match self.kind {
            TableKind::Practice { .. } => {
                self.apply_options(game_type, itimes);
                None
            }
            TableKind::Network => Some(
                self.base_request(RequestType::Update, &pid)
                    .with_param("rated", game_type.rated_flag())
                    .with_param("itimes", itimes.to_string()),
            ),
        }
    }

    /// 本地认输：练习桌立即判对方胜，零请求
    pub fn on_resign_command_from_board(&mut self) -> Option<Request> {
        let Some((player, color)) = self.seated_board_player() else {
            warn!(table = %self.id, "Resign from an unseated player, dropped");
            return None;
        };
        let pid = player.id.clone();
        match self.kind {
            TableKind::Practice { .. } => {
                let status = if color == Color::Red {
                    GameStatus::BlackWin
                } else {
                    GameStatus::RedWin
                };
                self.on_game_over_from_network(status, "resign");
                None
            }
            TableKind::Network => Some(self.base_request(RequestType::Resign, &pid)),
        }
    }

    /// 本地求和：练习桌的 AI 一律应允
    pub fn on_draw_command_from_board(&mut self) -> Option<Request> {
        let Some((player, _)) = self.seated_board_player() else {
            warn!(table = %self.id, "Draw offer from an unseated player, dropped");
            return None;
        };
        let pid = player.id.clone();
        match self.kind {
            TableKind::Practice { .. } => {
                self.on_game_over_from_network(GameStatus::Drawn, "drawn by agreement");
                None
            }
            TableKind::Network => Some(self.base_request(RequestType::Draw, &pid)),
        }
    }

    /// 本地应答对方的求和请求
    pub fn on_draw_response_from_board(&mut self, accepted: bool) -> Option<Request> {
        let Some((player, _)) = self.seated_board_player() else {
            warn!(table = %self.id, "Draw response from an unseated player, dropped");
            return None;
        };
        let pid = player.id.clone();
        match self.kind {
            TableKind::Practice { .. } => None,
            TableKind::Network => Some(
                self.base_request(RequestType::Draw, &pid)
                    .with_param("draw_response", if accepted { "1" } else { "0" }),
            ),
        }
    }

    /// 本地重开对局：练习桌就地重置，零请求
    pub fn on_reset_command_from_board(&mut self) -> Option<Request> {
        let Some((player, _)) = self.seated_board_player() else {
            warn!(table = %self.id, "Reset from an unseated player, dropped");
            return None;
        };
        let pid = player.id.clone();
        match &mut self.kind {
            TableKind::Practice { ai } => {
                ai.on_request_from_table(&Request::new(RequestType::Reset));
                self.on_game_reset_from_network();
                None
            }
            TableKind::Network => Some(self.base_request(RequestType::Reset, &pid)),
        }
    }

    /// 调整练习桌的 AI 难度
    pub fn on_ai_level_update(&mut self, level: u8) -> Result<()> {
        match &mut self.kind {
            TableKind::Practice { ai } => {
                let req =
                    Request::new(RequestType::AiLevel).with_param("ai_level", level.to_string());
                let resp = ai.on_request_from_table(&req);
                if !resp.code.is_ok() {
                    warn!(table = %self.id, level, "AI level update rejected");
                }
                Ok(())
            }
            TableKind::Network => Err(SessionError::NotSupported),
        }
    }

    // ---- 网络推送 ----

    pub fn on_new_move(&mut self, notation: &str) {
        // 本方走法已在发出时记录，回声跳过
        if self.moves.last().map(String::as_str) == Some(notation) {
            return;
        }
        self.moves.push(notation.to_string());
        if let Some(board) = &mut self.board {
            board.on_new_move(notation);
        }
    }

    /// 加入途中对局时一次性补齐历史走法
    pub fn on_past_moves(&mut self, moves: &[String]) {
        self.moves = moves.to_vec();
        if let Some(board) = &mut self.board {
            board.on_past_moves(moves);
        }
    }

    pub fn on_message_from_network(&mut self, sender: &str, message: &str, public: bool) {
        if let Some(board) = &mut self.board {
            board.on_wall_output(message, sender, public);
        }
    }

    pub fn on_system_msg_from_network(&mut self, message: &str) {
        if let Some(board) = &mut self.board {
            board.on_system_output(message);
        }
    }

    pub fn on_leave_from_network(&mut self, player_id: &str) {
        let before = self.seats.len();
        self.seats.retain(|(p, _)| p.id != player_id);
        if self.seats.len() == before {
            debug!(table = %self.id, player = player_id, "Leave for a player not at this table");
            return;
        }
        if let Some(board) = &mut self.board {
            board.on_player_leave(player_id);
        }
    }

    /// 对方求和；仅当请求冲着棋盘玩家来时弹窗
    pub fn on_draw_request_from_network(&mut self, from_player_id: &str) {
        let popup = self
            .seated_board_player()
            .map(|(p, _)| p.id != from_player_id)
            .unwrap_or(false);
        if let Some(board) = &mut self.board {
            board.on_draw_request(from_player_id, popup);
        }
    }

    pub fn on_game_over_from_network(&mut self, status: GameStatus, reason: &str) {
        self.status = status;
        if let Some(board) = &mut self.board {
            board.on_game_over(status, reason);
        }
    }

    /// 对局重置：裁判归位，三份时钟一起恢复
    pub fn on_game_reset_from_network(&mut self) {
        if let Ok(mut referee) = self.referee.lock() {
            referee.reset_game();
        }
        self.moves.clear();
        self.status = GameStatus::InProgress;
        self.red_time = self.initial_time;
        self.black_time = self.initial_time;
        if let Some(board) = &mut self.board {
            board.on_game_reset();
        }
    }

    pub fn on_score_from_network(&mut self, player_id: &str, score: i32) {
        for (p, _) in &mut self.seats {
            if p.id == player_id {
                p.score = score;
            }
        }
        if let Some(board) = &mut self.board {
            board.on_player_score(player_id, score);
        }
    }

    /// 桌子选项被（任一方）更新
    pub fn on_update_from_player(&mut self, rated: bool, itimes: TimeInfo) {
        let game_type = if rated {
            GameType::Rated
        } else {
            GameType::Nonrated
        };
        self.apply_options(game_type, itimes);
    }

    fn apply_options(&mut self, game_type: GameType, itimes: TimeInfo) {
        self.game_type = game_type;
        self.initial_time = itimes;
        self.red_time = itimes;
        self.black_time = itimes;
        if let Some(board) = &mut self.board {
            board.on_table_update();
        }
    }

    // ---- 拆除 ----

    /// 关桌：清空座位表并温和关闭棋盘
    ///
    /// 返回被移走的玩家，调用方据此做各玩家的离桌善后；
    /// 桌子拥有的 AI 玩家随桌子一起销毁，不在返回之列。
    pub fn close(&mut self) -> Vec<PlayerRef> {
        let players: Vec<PlayerRef> = self
            .seats
            .drain(..)
            .map(|(p, _)| p)
            .filter(|p| p.kind != PlayerKind::Ai)
            .collect();
        if let Some(mut board) = self.board.take() {
            board.close();
        }
        players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::recording::RecordingBoard;
    use crate::player::scripted::ScriptedEngine;
    use crate::referee::LenientReferee;
    use protocol::{Piece, PieceKind, Position};
    use rand::seq::SliceRandom;
    use rand::Rng;

    fn referee() -> Arc<Mutex<dyn Referee + Send>> {
        Arc::new(Mutex::new(LenientReferee::new()))
    }

    fn network_table() -> Table {
        Table::new(
            "T1",
            1,
            GameType::Nonrated,
            TimeInfo::new(1500, 300, 20),
            TableKind::Network,
            referee(),
        )
    }

    fn practice_table(replies: Vec<&str>) -> Table {
        Table::new(
            "PRACTICE_1",
            1,
            GameType::Practice,
            TimeInfo::new(1500, 300, 20),
            TableKind::Practice {
                ai: AiPlayer::new("AI_1", Box::new(ScriptedEngine::new(replies))),
            },
            referee(),
        )
    }

    fn local(id: &str) -> PlayerRef {
        PlayerRef::new(id, PlayerKind::Local, 1500)
    }

    fn dummy(id: &str) -> PlayerRef {
        PlayerRef::new(id, PlayerKind::Dummy, 1500)
    }

    fn cannon_move() -> Move {
        Move {
            piece: Piece {
                kind: PieceKind::Cannon,
                color: Color::Red,
            },
            from: Position::new(7, 2),
            to: Position::new(4, 2),
            captured: None,
        }
    }

    #[test]
    fn test_seat_uniqueness_under_random_assignments() {
        let mut rng = rand::thread_rng();
        let ids = ["alice", "bob", "carol", "dave"];
        let colors = [Color::Red, Color::Black, Color::None];
        let mut table = network_table();

        for _ in 0..200 {
            let id = ids.choose(&mut rng).unwrap();
            let color = colors[rng.gen_range(0..colors.len())];
            let _ = table.assign_player_as(dummy(id), color);

            let reds = table.seats.iter().filter(|(_, c)| *c == Color::Red).count();
            let blacks = table
                .seats
                .iter()
                .filter(|(_, c)| *c == Color::Black)
                .count();
            assert!(reds <= 1, "more than one red seat");
            assert!(blacks <= 1, "more than one black seat");
            for id in ids {
                let entries = table.seats.iter().filter(|(p, _)| p.id == id).count();
                assert!(entries <= 1, "player {id} listed twice");
            }
        }
    }

    #[test]
    fn test_taken_seat_is_rejected() {
        let mut table = network_table();
        table.assign_player_as(dummy("alice"), Color::Red).unwrap();
        assert!(matches!(
            table.assign_player_as(dummy("bob"), Color::Red),
            Err(SessionError::SeatTaken { .. })
        ));
        // 同一玩家重申自己的座位不算冲突
        table.assign_player_as(dummy("alice"), Color::Red).unwrap();
    }

    #[test]
    fn test_none_clears_a_held_seat() {
        let mut table = network_table();
        table.assign_player_as(dummy("alice"), Color::Red).unwrap();
        table.assign_player_as(dummy("alice"), Color::None).unwrap();
        assert!(table.red_player().is_none());
        assert_eq!(table.player_role("alice"), Some(Color::None));
        // 腾出的座位可以被再占
        table.assign_player_as(dummy("bob"), Color::Red).unwrap();
    }

    #[test]
    fn test_unknown_seat_is_invalid() {
        let mut table = network_table();
        assert!(matches!(
            table.assign_player_as(dummy("alice"), Color::Unknown),
            Err(SessionError::InvalidSeat(_))
        ));
    }

    #[test]
    fn test_board_player_is_latest_local() {
        let mut table = network_table();
        table.assign_player_as(local("alice"), Color::Red).unwrap();
        table.assign_player_as(dummy("bob"), Color::Black).unwrap();
        assert_eq!(table.board_player().unwrap().id, "alice");
        assert_eq!(table.red_player().unwrap().id, "alice");
        assert_eq!(table.black_player().unwrap().id, "bob");
    }

    #[test]
    fn test_remote_site_player_drives_the_board() {
        let mut table = network_table();
        table
            .assign_player_as(PlayerRef::new("alice", PlayerKind::Remote, 1500), Color::Red)
            .unwrap();
        table.assign_player_as(dummy("bob"), Color::Black).unwrap();

        assert_eq!(table.board_player().unwrap().id, "alice");
        let req = table.on_resign_command_from_board().unwrap();
        assert_eq!(req.param("pid"), Some("alice"));
    }

    #[test]
    fn test_move_from_empty_seat_is_dropped() {
        let board = RecordingBoard::new();
        let mut table = network_table();
        table.attach_board(Box::new(board.clone()));
        // 棋盘玩家只是旁观
        table.assign_player_as(local("alice"), Color::None).unwrap();

        assert!(table.on_move_from_board(&cannon_move()).is_none());
        assert!(table.moves().is_empty());
        assert!(board.calls().iter().any(|c| c.starts_with("system:")));
    }

    #[test]
    fn test_network_move_builds_one_request() {
        let mut table = network_table();
        table.assign_player_as(local("alice"), Color::Red).unwrap();

        let req = table.on_move_from_board(&cannon_move()).unwrap();
        assert_eq!(req.rtype, RequestType::Move);
        assert_eq!(req.param("tid"), Some("T1"));
        assert_eq!(req.param("pid"), Some("alice"));
        assert_eq!(req.param("move"), Some("7242"));
        assert_eq!(req.param("game_time"), Some("1500"));
        assert_eq!(table.moves(), ["7242"]);
    }

    #[test]
    fn test_practice_move_routes_to_ai() {
        let board = RecordingBoard::new();
        let mut table = practice_table(vec!["7747"]);
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(local("alice"), Color::Red).unwrap();

        assert!(table.on_move_from_board(&cannon_move()).is_none());
        assert_eq!(table.moves(), ["7242", "7747"]);
        assert!(board.calls().contains(&"move:7747".to_string()));
    }

    #[test]
    fn test_practice_resign_resolves_locally() {
        let board = RecordingBoard::new();
        let mut table = practice_table(vec![]);
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(local("alice"), Color::Red).unwrap();

        assert!(table.on_resign_command_from_board().is_none());
        assert_eq!(table.status(), GameStatus::BlackWin);
        assert!(board
            .calls()
            .contains(&"game_over:black_win:resign".to_string()));
    }

    #[test]
    fn test_practice_draw_resolves_locally() {
        let mut table = practice_table(vec![]);
        table.assign_player_as(local("alice"), Color::Black).unwrap();
        assert!(table.on_draw_command_from_board().is_none());
        assert_eq!(table.status(), GameStatus::Drawn);
    }

    #[test]
    fn test_draw_response_builds_one_request() {
        let mut table = network_table();
        table.assign_player_as(local("alice"), Color::Red).unwrap();

        let req = table.on_draw_response_from_board(true).unwrap();
        assert_eq!(req.rtype, RequestType::Draw);
        assert_eq!(req.param("tid"), Some("T1"));
        assert_eq!(req.param("pid"), Some("alice"));
        assert_eq!(req.param("draw_response"), Some("1"));

        let req = table.on_draw_response_from_board(false).unwrap();
        assert_eq!(req.param("draw_response"), Some("0"));
    }

    #[test]
    fn test_options_authorization() {
        let mut table = network_table();
        table.assign_player_as(local("alice"), Color::Red).unwrap();

        let req = table
            .on_options_command_from_board(true, TimeInfo::new(1200, 240, 30))
            .unwrap();
        assert_eq!(req.rtype, RequestType::Update);
        assert_eq!(req.param("rated"), Some("1"));
        assert_eq!(req.param("itimes"), Some("1200/240/30"));

        // 黑方仅在红座空缺时有权
        let mut table = network_table();
        table.assign_player_as(local("bob"), Color::Black).unwrap();
        assert!(table
            .on_options_command_from_board(false, TimeInfo::new(600, 60, 10))
            .is_some());
        table.assign_player_as(dummy("alice"), Color::Red).unwrap();
        assert!(table
            .on_options_command_from_board(false, TimeInfo::new(600, 60, 10))
            .is_none());
    }

    #[test]
    fn test_observer_commands_build_no_requests() {
        let mut table = network_table();
        table.assign_player_as(local("alice"), Color::None).unwrap();
        assert!(table.on_resign_command_from_board().is_none());
        assert!(table.on_draw_command_from_board().is_none());
        assert!(table.on_draw_response_from_board(true).is_none());
        assert!(table.on_reset_command_from_board().is_none());
        assert!(table
            .on_options_command_from_board(true, TimeInfo::new(600, 60, 10))
            .is_none());
    }

    #[test]
    fn test_network_echo_of_own_move_is_skipped() {
        let board = RecordingBoard::new();
        let mut table = network_table();
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(local("alice"), Color::Red).unwrap();

        table.on_move_from_board(&cannon_move());
        table.on_new_move("7242");
        assert_eq!(table.moves(), ["7242"]);

        table.on_new_move("7747");
        assert_eq!(table.moves(), ["7242", "7747"]);
        assert_eq!(board.calls(), vec!["move:7747".to_string()]);
    }

    #[test]
    fn test_game_reset_restores_clocks_and_history() {
        let board = RecordingBoard::new();
        let mut table = network_table();
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(local("alice"), Color::Red).unwrap();
        table.on_move_from_board(&cannon_move());
        table.on_game_over_from_network(GameStatus::RedWin, "timeout");

        table.on_game_reset_from_network();
        assert!(table.moves().is_empty());
        assert_eq!(table.status(), GameStatus::InProgress);
        assert!(board.calls().contains(&"game_reset".to_string()));
    }

    #[test]
    fn test_draw_request_popup_targets_board_player() {
        let board = RecordingBoard::new();
        let mut table = network_table();
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(local("alice"), Color::Red).unwrap();
        table.assign_player_as(dummy("bob"), Color::Black).unwrap();

        table.on_draw_request_from_network("bob");
        assert!(board.calls().contains(&"draw_request:bob:true".to_string()));
    }

    #[test]
    fn test_score_update_reaches_seat_and_board() {
        let board = RecordingBoard::new();
        let mut table = network_table();
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(dummy("bob"), Color::Black).unwrap();

        table.on_score_from_network("bob", 1650);
        assert_eq!(table.black_player().unwrap().score, 1650);
        assert!(board.calls().contains(&"score:bob:1650".to_string()));
    }

    #[test]
    fn test_close_empties_table_and_closes_board() {
        let board = RecordingBoard::new();
        let mut table = practice_table(vec![]);
        table.attach_board(Box::new(board.clone()));
        table.assign_player_as(local("alice"), Color::Red).unwrap();
        table
            .assign_player_as(PlayerRef::new("AI_1", PlayerKind::Ai, 0), Color::Black)
            .unwrap();

        let players = table.close();
        // AI 玩家随桌销毁，不进善后清单
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "alice");
        assert_eq!(table.player_count(), 0);
        assert!(!table.has_board());
        assert_eq!(board.calls().last().unwrap(), "close");
    }

    #[test]
    fn test_table_info_snapshot() {
        let mut table = network_table();
        table.assign_player_as(local("alice"), Color::Red).unwrap();
        let info = table.table_info();
        assert_eq!(info.id, "T1");
        assert_eq!(info.red_id.as_deref(), Some("alice"));
        assert_eq!(info.red_score, 1500);
        assert!(info.black_id.is_none());
    }
}

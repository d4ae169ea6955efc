//! 棋盘界面接口
//!
//! 桌子对外唯一的展示出口。实现方负责渲染与命中测试，
//! 核心只通过这组入站调用通知它；棋盘对核心的出站调用
//! 走 Table 的 `on_*_from_board` 族。

use protocol::{Color, GameStatus};

use crate::player::PlayerRef;

/// 挂在桌上的棋盘界面（每桌 0 或 1 个，挂接期间由桌子独占）
pub trait BoardView: Send {
    fn on_player_join(&mut self, player: &PlayerRef, color: Color);
    fn on_new_move(&mut self, notation: &str);
    fn on_past_moves(&mut self, moves: &[String]);
    fn on_player_leave(&mut self, player_id: &str);
    /// 聊天输出；`public` 为 false 表示私聊
    fn on_wall_output(&mut self, message: &str, sender: &str, public: bool);
    fn on_system_output(&mut self, message: &str);
    /// `popup` 表示求和请求正是冲着本地玩家来的
    fn on_draw_request(&mut self, from_player_id: &str, popup: bool);
    fn on_game_over(&mut self, status: GameStatus, reason: &str);
    fn on_game_reset(&mut self);
    fn on_player_score(&mut self, player_id: &str, score: i32);
    fn on_table_update(&mut self);
    /// 温和关闭：界面可能还有在途事件，不允许直接硬析构
    fn close(&mut self);
}

#[cfg(test)]
pub(crate) mod recording {
    //! 测试用棋盘：把每次入站调用记成一行文本

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct RecordingBoard {
        pub(crate) calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingBoard {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, line: String) {
            self.calls.lock().unwrap().push(line);
        }
    }

    impl BoardView for RecordingBoard {
        fn on_player_join(&mut self, player: &PlayerRef, color: Color) {
            self.record(format!("join:{}:{}", player.id, color));
        }

        fn on_new_move(&mut self, notation: &str) {
            self.record(format!("move:{}", notation));
        }

        fn on_past_moves(&mut self, moves: &[String]) {
            self.record(format!("past_moves:{}", moves.len()));
        }

        fn on_player_leave(&mut self, player_id: &str) {
            self.record(format!("leave:{}", player_id));
        }

        fn on_wall_output(&mut self, message: &str, sender: &str, public: bool) {
            self.record(format!("wall:{}:{}:{}", sender, message, public));
        }

        fn on_system_output(&mut self, message: &str) {
            self.record(format!("system:{}", message));
        }

        fn on_draw_request(&mut self, from_player_id: &str, popup: bool) {
            self.record(format!("draw_request:{}:{}", from_player_id, popup));
        }

        fn on_game_over(&mut self, status: GameStatus, reason: &str) {
            self.record(format!("game_over:{}:{}", status, reason));
        }

        fn on_game_reset(&mut self) {
            self.record("game_reset".to_string());
        }

        fn on_player_score(&mut self, player_id: &str, score: i32) {
            self.record(format!("score:{}:{}", player_id, score));
        }

        fn on_table_update(&mut self) {
            self.record("table_update".to_string());
        }

        fn close(&mut self) {
            self.record("close".to_string());
        }
    }
}

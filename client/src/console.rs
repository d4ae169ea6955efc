//! 控制台棋盘与桌子协作者工厂
//!
//! 不渲染棋盘图形，把桌子的每个入站通知打成一行带时间戳的文本。

use std::sync::Arc;
use std::sync::Mutex;

use chess_session::{
    AiEngine, BoardView, LenientReferee, PlayerRef, Referee, TableEnvironment,
};
use protocol::{Color, GameStatus, TableInfo};

use crate::engine::BookEngine;

fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// 把桌子通知打印到标准输出的棋盘
pub struct ConsoleBoard {
    table_id: String,
}

impl ConsoleBoard {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
        }
    }

    fn line(&self, text: &str) {
        println!("[{}] ({}) {}", stamp(), self.table_id, text);
    }
}

impl BoardView for ConsoleBoard {
    fn on_player_join(&mut self, player: &PlayerRef, color: Color) {
        self.line(&format!("{} 入座 {} ({})", player.id, color, player.score));
    }

    fn on_new_move(&mut self, notation: &str) {
        self.line(&format!("走子 {}", notation));
    }

    fn on_past_moves(&mut self, moves: &[String]) {
        self.line(&format!("补齐历史 {} 手: {}", moves.len(), moves.join(" ")));
    }

    fn on_player_leave(&mut self, player_id: &str) {
        self.line(&format!("{} 离桌", player_id));
    }

    fn on_wall_output(&mut self, message: &str, sender: &str, public: bool) {
        let tag = if public { "" } else { " (私聊)" };
        self.line(&format!("{}{}: {}", sender, tag, message));
    }

    fn on_system_output(&mut self, message: &str) {
        self.line(&format!("* {}", message));
    }

    fn on_draw_request(&mut self, from_player_id: &str, popup: bool) {
        if popup {
            self.line(&format!(
                "{} 提出和棋，输入 accept / decline 应答",
                from_player_id
            ));
        } else {
            self.line(&format!("{} 提出和棋", from_player_id));
        }
    }

    fn on_game_over(&mut self, status: GameStatus, reason: &str) {
        self.line(&format!("对局结束: {} ({})", status, reason));
    }

    fn on_game_reset(&mut self) {
        self.line("对局重置");
    }

    fn on_player_score(&mut self, player_id: &str, score: i32) {
        self.line(&format!("{} 积分更新: {}", player_id, score));
    }

    fn on_table_update(&mut self) {
        self.line("桌子选项已更新");
    }

    fn close(&mut self) {
        self.line("桌子关闭");
    }
}

/// 控制台环境：录到标准输出的棋盘 + 占位裁判 + 照谱引擎
pub struct ConsoleEnv {
    ai_level: u8,
}

impl ConsoleEnv {
    pub fn new(ai_level: u8) -> Self {
        Self { ai_level }
    }
}

impl TableEnvironment for ConsoleEnv {
    fn make_board(&mut self, info: &TableInfo) -> Option<Box<dyn BoardView>> {
        Some(Box::new(ConsoleBoard::new(info.id.clone())))
    }

    fn make_referee(&mut self) -> Arc<Mutex<dyn Referee + Send>> {
        Arc::new(Mutex::new(LenientReferee::new()))
    }

    fn make_engine(&mut self) -> Box<dyn AiEngine> {
        Box::new(BookEngine::new(self.ai_level))
    }
}

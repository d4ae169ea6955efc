//! 照谱走子的简易 AI 引擎
//!
//! 真实的搜索引擎可以替换这里的实现，核心只认 AiEngine 接口。
//! 这个引擎按固定开局谱应着，谱走完即不再出着（核心把 None
//! 视为无着）。难度只决定照谱深度。

use chess_session::AiEngine;

/// 黑方开局谱
const OPENING_BOOK: &[&str] = &["7747", "1047", "7062", "1967", "2142", "0010"];

pub struct BookEngine {
    level: u8,
    cursor: usize,
}

impl BookEngine {
    pub fn new(level: u8) -> Self {
        Self {
            level: level.clamp(1, 10),
            cursor: 0,
        }
    }

    fn depth(&self) -> usize {
        // 每级多照一手谱
        usize::from(self.level).min(OPENING_BOOK.len())
    }
}

impl AiEngine for BookEngine {
    fn on_opponent_move(&mut self, _notation: &str) -> Option<String> {
        if self.cursor >= self.depth() {
            return None;
        }
        let reply = OPENING_BOOK[self.cursor];
        self.cursor += 1;
        Some(reply.to_string())
    }

    fn set_level(&mut self, level: u8) {
        self.level = level.clamp(1, 10);
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

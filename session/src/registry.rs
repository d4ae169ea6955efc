//! 远端参与者占位登记处
//!
//! 网络桌上的对手和旁观者由本客户端之外的人控制，本地只为他们
//! 维护占位记录。每个站点一本登记册，身份空间互不串扰。

use std::collections::HashMap;

use protocol::PlayerKind;

use crate::player::PlayerRef;

#[derive(Default)]
pub struct PlayerRegistry {
    players: HashMap<String, PlayerRef>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出已知的占位记录，或者新建一条
    ///
    /// 已知玩家的分数以最新一次报告为准。
    pub fn get_or_create(&mut self, player_id: &str, score: i32) -> PlayerRef {
        let entry = self
            .players
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerRef::new(player_id, PlayerKind::Dummy, score));
        entry.score = score;
        entry.clone()
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerRef> {
        self.players.get(player_id)
    }

    pub fn remove(&mut self, player_id: &str) -> Option<PlayerRef> {
        self.players.remove(player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

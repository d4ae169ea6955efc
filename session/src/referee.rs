//! 裁判接口
//!
//! 走法合法性与终局判定完全由外部规则引擎决定，核心只调用它
//! 并对裁决作出反应。

use protocol::{GameStatus, Move, Piece, Position};

/// 裁判眼中的对局快照
#[derive(Debug, Clone)]
pub struct RefereeState {
    pub pieces: Vec<(Piece, Position)>,
    pub status: GameStatus,
}

/// 外部规则引擎
pub trait Referee: Send {
    /// 校验一步走法，返回 (是否接受, 之后的对局状态)
    fn validate_move(&mut self, mv: &Move) -> (bool, GameStatus);

    /// 当前对局快照
    fn game_state(&self) -> RefereeState;

    /// 重置对局
    fn reset_game(&mut self);
}

/// 接受一切走法的占位裁判
///
/// 真实的规则引擎在核心之外接入；这个实现用于练习桌演示和测试，
/// 只维护"进行中"状态。
pub struct LenientReferee {
    status: GameStatus,
}

impl LenientReferee {
    pub fn new() -> Self {
        Self {
            status: GameStatus::InProgress,
        }
    }
}

impl Default for LenientReferee {
    fn default() -> Self {
        Self::new()
    }
}

impl Referee for LenientReferee {
    fn validate_move(&mut self, _mv: &Move) -> (bool, GameStatus) {
        (true, self.status)
    }

    fn game_state(&self) -> RefereeState {
        RefereeState {
            pieces: Vec::new(),
            status: self.status,
        }
    }

    fn reset_game(&mut self) {
        self.status = GameStatus::InProgress;
    }
}

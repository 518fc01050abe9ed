//! 对局会话
//!
//! 棋盘、着法历史与"思考中"门闩的宿主。表示层通过本模块的
//! 落子 / 悔棋 / 请求着法 / 取消搜索 / 查询候选五个入口访问引擎核心。

use crate::ai::{AIConfig, AIEngine};
use crate::board::Board;
use crate::types::{GameResult, Player, Point};
use crate::worker::SearchHost;
use log::warn;
use rand::prelude::*;

/// 一次确认落子的历史记录
#[derive(Debug, Clone, Copy)]
struct PlyRecord {
    point: Point,
    player: Player,
}

/// 对局会话
///
/// 棋盘在整个会话期间存续：确认着法永久落子，搜索过程中的
/// 临时落子全部经由守卫恢复。
pub struct GameSession {
    board: Board,
    history: Vec<PlyRecord>,
    winner: Option<Player>,
    game_over: bool,
    /// 自动应手的一方（悔棋按回合对回退时用）
    engine_player: Player,
    host: SearchHost,
    thinking: bool,
    rng: StdRng,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    /// 新对局：人执黑先行，引擎执白
    pub fn new() -> Self {
        GameSession {
            board: Board::new(),
            history: Vec::new(),
            winner: None,
            game_over: false,
            engine_player: Player::White,
            host: SearchHost::new(),
            thinking: false,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> Player {
        self.board.to_move()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    /// 最近一手
    pub fn last_move(&self) -> Option<Point> {
        self.history.last().map(|r| r.point)
    }

    /// 对局结果
    pub fn result(&self) -> GameResult {
        match self.winner {
            Some(Player::Black) => GameResult::BlackWin,
            Some(Player::White) => GameResult::WhiteWin,
            None if self.board.is_full() => GameResult::Draw,
            None => GameResult::Ongoing,
        }
    }

    /// 候选着法查询（纯函数，不改状态）
    pub fn valid_moves(&self) -> Vec<Point> {
        self.board.valid_moves()
    }

    /// 当前行棋方落子
    ///
    /// 占用点或对局已结束时拒绝并返回 `false`，状态不变。
    /// 成五即终局，行棋方不再切换（与悔棋的回退约定配套）。
    pub fn apply_move(&mut self, row: i8, col: i8) -> bool {
        let pt = Point::new(row, col);
        if self.game_over || self.thinking || !self.board.is_empty_cell(pt) {
            return false;
        }

        let player = self.board.to_move();
        self.board.put(pt, player);
        self.history.push(PlyRecord { point: pt, player });

        if self.board.check_win(pt, player) {
            self.game_over = true;
            self.winner = Some(player);
        } else {
            self.board.set_to_move(player.opposite());
        }
        true
    }

    /// 悔棋
    ///
    /// 最后一手是引擎所落且盘上至少两手时回退一个完整回合，
    /// 否则回退一手。返回实际回退的手数；恢复行棋方并解除终局。
    pub fn undo(&mut self) -> usize {
        if self.history.is_empty() || self.thinking {
            return 0;
        }

        let engine_moved_last = self
            .history
            .last()
            .is_some_and(|r| r.player == self.engine_player);
        let plies = if engine_moved_last && self.history.len() >= 2 {
            2
        } else {
            1
        };

        let mut undone = 0;
        for _ in 0..plies {
            let Some(record) = self.history.pop() else { break };
            self.board.take(record.point);
            self.board.set_to_move(record.player);
            undone += 1;
        }

        self.game_over = false;
        self.winner = None;
        undone
    }

    /// 请求当前行棋方的最佳着法
    ///
    /// 任何故障（未知策略、非满盘却无结果）降级为均匀随机合法着法，
    /// 会话绝不因搜索失败而停摆。只有确无合法着法才返回 `None`。
    pub fn request_best_move(&mut self, strategy: &str, config: &AIConfig) -> Option<Point> {
        if self.game_over || self.thinking {
            return None;
        }
        self.thinking = true;

        let player = self.board.to_move();
        let result = match strategy {
            // 专家档经由宿主线程执行，获得硬超时与故障隔离
            "expert" | "negamax" => {
                let depth = config.max_depth.max(1);
                let budget = config.time_budget.unwrap_or(1500);
                self.host.request(&self.board, player, depth, budget)
            }
            _ => match AIEngine::from_strategy(strategy, config) {
                Ok(engine) => engine.select_best_move(&self.board),
                Err(e) => {
                    warn!("strategy error: {}", e);
                    None
                }
            },
        };

        let resolved = result.or_else(|| self.random_fallback());
        self.thinking = false;
        resolved
    }

    /// 请求引擎应一手并直接落子，返回落点
    pub fn engine_reply(&mut self, strategy: &str, config: &AIConfig) -> Option<Point> {
        let mv = self.request_best_move(strategy, config)?;
        if self.apply_move(mv.row, mv.col) {
            Some(mv)
        } else {
            None
        }
    }

    /// 取消在途搜索并立即清除思考状态
    pub fn cancel_search(&mut self) {
        self.host.cancel();
        self.thinking = false;
    }

    /// 故障降级：均匀随机合法着法
    fn random_fallback(&mut self) -> Option<Point> {
        let moves = self.board.valid_moves();
        if moves.is_empty() {
            return None;
        }
        warn!("search produced no move, degrading to a random legal move");
        Some(moves[self.rng.gen_range(0..moves.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_move_rejects_occupied() {
        let mut session = GameSession::new();
        assert!(session.apply_move(9, 9));
        let notation = session.board().to_notation();
        assert!(!session.apply_move(9, 9));
        assert_eq!(session.board().to_notation(), notation);
        assert_eq!(session.current_player(), Player::White);
    }

    #[test]
    fn test_apply_move_rejects_after_game_over() {
        let mut session = GameSession::new();
        // 黑白交替，黑在第 10 行连五
        for i in 0..4 {
            assert!(session.apply_move(9, 4 + i)); // 黑
            assert!(session.apply_move(0, i)); // 白
        }
        assert!(session.apply_move(9, 8)); // 黑成五
        assert!(session.is_game_over());
        assert_eq!(session.winner(), Some(Player::Black));
        assert!(!session.apply_move(5, 5));
    }

    #[test]
    fn test_undo_single_ply() {
        let mut session = GameSession::new();
        session.apply_move(9, 9); // 黑
        // 白方行棋中悔棋：只回退黑的一手
        assert_eq!(session.undo(), 1);
        assert_eq!(session.current_player(), Player::Black);
        assert_eq!(session.board().stones(), 0);
    }

    #[test]
    fn test_undo_turn_pair_after_engine_reply() {
        let mut session = GameSession::new();
        session.apply_move(9, 9); // 人（黑）
        session.apply_move(9, 10); // 引擎（白）
        let hash_start = Board::new().hash();

        // 轮到人走，引擎刚应手：回退一个完整回合
        assert_eq!(session.undo(), 2);
        assert_eq!(session.board().stones(), 0);
        assert_eq!(session.board().hash(), hash_start);
        assert_eq!(session.current_player(), Player::Black);
    }

    #[test]
    fn test_undo_clears_game_over() {
        let mut session = GameSession::new();
        for i in 0..4 {
            session.apply_move(9, 4 + i);
            session.apply_move(0, i);
        }
        session.apply_move(9, 8);
        assert!(session.is_game_over());
        // 终局时行棋方未切换（黑），只回退制胜一手
        assert_eq!(session.undo(), 1);
        assert!(!session.is_game_over());
        assert_eq!(session.winner(), None);
        assert_eq!(session.current_player(), Player::Black);
        assert!(session.apply_move(9, 8));
    }

    #[test]
    fn test_request_best_move_returns_legal() {
        let mut session = GameSession::new();
        session.apply_move(9, 9);
        let config = AIConfig {
            max_depth: 2,
            time_budget: Some(200),
            seed: Some(42),
        };
        let mv = session.request_best_move("minimax", &config).unwrap();
        assert!(session.board().get(mv).is_none());
        assert!(!session.is_thinking());
    }

    #[test]
    fn test_unknown_strategy_degrades_to_random() {
        let mut session = GameSession::new();
        session.apply_move(9, 9);
        let mv = session
            .request_best_move("alphazero", &AIConfig::default())
            .unwrap();
        assert!(session.board().get(mv).is_none());
    }

    #[test]
    fn test_engine_reply_applies_move() {
        let mut session = GameSession::new();
        session.apply_move(9, 9);
        let config = AIConfig {
            max_depth: 1,
            time_budget: Some(100),
            seed: Some(7),
        };
        let mv = session.engine_reply("expert", &config).unwrap();
        assert_eq!(session.board().get(mv), Some(Player::White));
        assert_eq!(session.current_player(), Player::Black);
    }

    #[test]
    fn test_cancel_search_clears_thinking() {
        let mut session = GameSession::new();
        session.cancel_search();
        assert!(!session.is_thinking());
    }
}

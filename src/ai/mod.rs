//! AI 策略模块
//!
//! 提供多档强度的 AI 策略实现：随机、minimax、专家 negamax、蒙特卡洛

mod expert;
mod mcts;
mod minimax;
mod random;

pub use expert::{ExpertAI, ExpertSearch};
pub use mcts::{MctsAI, MctsParams};
pub use minimax::MinimaxAI;
pub use random::RandomAI;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering};

/// 全局节点计数器
pub static NODE_COUNT: AtomicU64 = AtomicU64::new(0);

/// 最近一次搜索完成的最大深度
pub static DEPTH_REACHED: AtomicU32 = AtomicU32::new(0);

/// 重置节点计数器
pub fn reset_node_count() {
    NODE_COUNT.store(0, AtomicOrdering::Relaxed);
}

/// 获取当前节点计数
pub fn get_node_count() -> u64 {
    NODE_COUNT.load(AtomicOrdering::Relaxed)
}

/// 重置深度记录
pub fn reset_depth_reached() {
    DEPTH_REACHED.store(0, AtomicOrdering::Relaxed);
}

/// 获取最近完成的搜索深度
pub fn get_depth_reached() -> u32 {
    DEPTH_REACHED.load(AtomicOrdering::Relaxed)
}

use crate::board::Board;
use crate::types::Point;
use std::cmp::Ordering;

/// 可用策略名（`from_strategy` 接受的取值）
pub const AVAILABLE_STRATEGIES: [&str; 4] = ["random", "minimax", "expert", "mcts"];

/// 默认策略
pub const DEFAULT_STRATEGY: &str = "expert";

/// AI 配置
#[derive(Debug, Clone)]
pub struct AIConfig {
    /// 最大搜索深度（MCTS 把 1-4 解释为难度档）
    pub max_depth: u32,
    /// 时间预算（毫秒）
    pub time_budget: Option<u64>,
    /// 随机种子
    pub seed: Option<u64>,
}

impl Default for AIConfig {
    fn default() -> Self {
        AIConfig {
            max_depth: 4,
            time_budget: None,
            seed: None,
        }
    }
}

/// 着法评分
#[derive(Debug, Clone)]
pub struct ScoredMove {
    pub point: Point,
    pub score: f64,
}

/// AI 策略接口
///
/// 策略为 `board.to_move()` 一方行棋；实现内部克隆棋盘，
/// 调用方的棋盘不会被修改。
pub trait AIStrategy {
    /// 选择着法（返回带评分的着法列表）
    fn select_moves(&self, board: &Board, n: usize) -> Vec<ScoredMove>;

    /// 选择最佳着法
    fn select_best_move(&self, board: &Board) -> Option<Point> {
        self.select_moves(board, 1).first().map(|sm| sm.point)
    }
}

/// 排序辅助函数
pub(crate) fn sort_and_truncate(scored: &mut Vec<ScoredMove>, n: usize) {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(n);
}

/// AI 引擎 - 统一的策略入口
pub struct AIEngine {
    strategy: Box<dyn AIStrategy>,
}

impl AIEngine {
    /// 创建随机 AI
    pub fn random(seed: Option<u64>) -> Self {
        AIEngine {
            strategy: Box::new(RandomAI::new(seed)),
        }
    }

    /// 创建 minimax AI（低/中强度档）
    pub fn minimax(config: &AIConfig) -> Self {
        AIEngine {
            strategy: Box::new(MinimaxAI::new(config)),
        }
    }

    /// 创建专家 negamax AI
    pub fn expert(config: &AIConfig) -> Self {
        AIEngine {
            strategy: Box::new(ExpertAI::new(config)),
        }
    }

    /// 创建蒙特卡洛 AI
    pub fn mcts(config: &AIConfig) -> Self {
        AIEngine {
            strategy: Box::new(MctsAI::new(config)),
        }
    }

    /// 从策略名称创建
    pub fn from_strategy(name: &str, config: &AIConfig) -> Result<Self, String> {
        match name.to_lowercase().as_str() {
            "random" => Ok(Self::random(config.seed)),
            "minimax" => Ok(Self::minimax(config)),
            "expert" | "negamax" => Ok(Self::expert(config)),
            "mcts" | "montecarlo" => Ok(Self::mcts(config)),
            _ => Err(format!(
                "Unknown strategy: {}. Available: {}",
                name,
                AVAILABLE_STRATEGIES.join(", ")
            )),
        }
    }

    /// 按难度档（1-4）创建：1-3 为 minimax 深度 2/4/6，4 为专家搜索
    pub fn from_difficulty(level: u32) -> Self {
        match level {
            1 => Self::minimax(&AIConfig {
                max_depth: 2,
                ..Default::default()
            }),
            2 => Self::minimax(&AIConfig {
                max_depth: 4,
                ..Default::default()
            }),
            3 => Self::minimax(&AIConfig {
                max_depth: 6,
                ..Default::default()
            }),
            _ => Self::expert(&AIConfig {
                max_depth: 12,
                time_budget: Some(8000),
                seed: None,
            }),
        }
    }

    /// 选择最佳着法
    pub fn select_best_move(&self, board: &Board) -> Option<Point> {
        self.strategy.select_best_move(board)
    }

    /// 选择前 n 个着法
    pub fn select_moves(&self, board: &Board, n: usize) -> Vec<ScoredMove> {
        self.strategy.select_moves(board, n)
    }

    /// 从记谱字符串选择着法（返回记谱与评分）
    pub fn select_moves_notation(&self, text: &str, n: usize) -> Result<Vec<(String, f64)>, String> {
        let board = Board::from_notation(text)?;
        let moves = self.strategy.select_moves(&board, n);
        Ok(moves
            .into_iter()
            .map(|sm| (sm.point.to_notation(), sm.score))
            .collect())
    }

    /// 从记谱字符串选择最佳着法
    pub fn select_best_move_notation(&self, text: &str) -> Result<Option<String>, String> {
        let board = Board::from_notation(text)?;
        Ok(self
            .strategy
            .select_best_move(&board)
            .map(|pt| pt.to_notation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Player, Point};

    fn midgame_board() -> Board {
        let mut board = Board::new();
        board.put(Point::new(9, 9), Player::Black);
        board.put(Point::new(9, 10), Player::White);
        board.put(Point::new(10, 9), Player::Black);
        board.set_to_move(Player::White);
        board
    }

    #[test]
    fn test_random_ai() {
        let board = midgame_board();
        let ai = AIEngine::random(Some(42));
        let moves = ai.select_moves(&board, 5);
        assert_eq!(moves.len(), 5);
        for sm in &moves {
            assert!(board.get(sm.point).is_none());
        }
    }

    #[test]
    fn test_minimax_ai() {
        let board = midgame_board();
        let config = AIConfig {
            max_depth: 2,
            ..Default::default()
        };
        let ai = AIEngine::minimax(&config);
        assert!(ai.select_best_move(&board).is_some());
    }

    #[test]
    fn test_expert_ai() {
        let board = midgame_board();
        let config = AIConfig {
            max_depth: 2,
            time_budget: Some(500),
            seed: None,
        };
        let ai = AIEngine::expert(&config);
        assert!(ai.select_best_move(&board).is_some());
    }

    #[test]
    fn test_mcts_ai() {
        let board = midgame_board();
        let config = AIConfig {
            max_depth: 1,
            time_budget: Some(100),
            seed: Some(42),
        };
        let ai = AIEngine::mcts(&config);
        assert!(ai.select_best_move(&board).is_some());
    }

    #[test]
    fn test_all_strategies_from_name() {
        let config = AIConfig::default();
        for name in AVAILABLE_STRATEGIES {
            assert!(
                AIEngine::from_strategy(name, &config).is_ok(),
                "Failed to create strategy: {}",
                name
            );
        }
        assert!(AIEngine::from_strategy("alphazero", &config).is_err());
    }

    #[test]
    fn test_notation_entry_point() {
        let text = Board::new().to_notation();
        let ai = AIEngine::from_strategy("minimax", &AIConfig::default()).unwrap();
        let best = ai.select_best_move_notation(&text).unwrap();
        // 空棋盘唯一候选是天元
        assert_eq!(best.as_deref(), Some("j10"));
    }
}

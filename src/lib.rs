//! Gomoku AI Engine
//!
//! 五子棋（连五）AI 引擎 - 多档强度的落子选择

pub mod ai;
pub mod board;
pub mod eval;
pub mod game;
pub mod test_positions;
pub mod types;
pub mod worker;

pub use ai::{
    get_depth_reached, get_node_count, reset_depth_reached, reset_node_count, AIConfig, AIEngine,
    AIStrategy, ExpertAI, ExpertSearch, MctsAI, MctsParams, MinimaxAI, RandomAI, ScoredMove,
    AVAILABLE_STRATEGIES, DEFAULT_STRATEGY,
};
pub use board::{Board, PlacedStone};
pub use eval::{evaluate_board, evaluate_point, order_moves};
pub use game::GameSession;
pub use types::{GameResult, PatternCounts, Player, Point, BOARD_SIZE, CELL_COUNT};
pub use worker::{fallback_move, search_blocking, SearchHost, SearchMessage};

//! Minimax AI 策略（低/中强度档）
//!
//! 先查即胜/即防捷径，再做迭代加深的 alpha-beta minimax。
//! 时间检查在着法之间与深度之间轮询；被打断的深度整体丢弃，
//! 保留上一个完整深度的结果。

use super::{sort_and_truncate, AIConfig, AIStrategy, ScoredMove, DEPTH_REACHED, NODE_COUNT};
use crate::board::Board;
use crate::eval::{evaluate_board, order_moves, SCORE_FIVE, SCORE_OPEN_FOUR};
use crate::types::{Player, Point};
use log::debug;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::time::{Duration, Instant};

/// 未设预算时的默认时限
const DEFAULT_TIME_BUDGET_MS: u64 = 5000;

/// Minimax AI - 固定深度 alpha-beta 搜索
pub struct MinimaxAI {
    max_depth: u32,
    time_budget: Duration,
}

impl MinimaxAI {
    pub fn new(config: &AIConfig) -> Self {
        MinimaxAI {
            max_depth: config.max_depth.max(1),
            time_budget: Duration::from_millis(
                config.time_budget.unwrap_or(DEFAULT_TIME_BUDGET_MS),
            ),
        }
    }

    /// 标准递归 alpha-beta
    ///
    /// `perspective` 是根节点行棋方；`maximizing` 与 `to_move == perspective`
    /// 始终同步。除每层的着法排序外不携带任何跨节点状态。
    #[allow(clippy::too_many_arguments)]
    fn minimax(
        &self,
        board: &mut Board,
        depth: u32,
        to_move: Player,
        mut alpha: i64,
        mut beta: i64,
        maximizing: bool,
        perspective: Player,
    ) -> i64 {
        NODE_COUNT.fetch_add(1, AtomicOrdering::Relaxed);

        if depth == 0 {
            return evaluate_board(board, perspective);
        }

        let moves = board.valid_moves();
        if moves.is_empty() {
            return 0;
        }
        let ordered = order_moves(board, moves, to_move);
        let opponent = to_move.opposite();

        if maximizing {
            let mut max_score = i64::MIN;
            for mv in ordered {
                let mut placed = board.place(mv, to_move);
                let score = if placed.check_win(mv, to_move) {
                    SCORE_FIVE + depth as i64
                } else {
                    self.minimax(&mut placed, depth - 1, opponent, alpha, beta, false, perspective)
                };
                drop(placed);

                max_score = max_score.max(score);
                alpha = alpha.max(score);
                if alpha >= beta {
                    break; // beta 剪枝
                }
            }
            max_score
        } else {
            let mut min_score = i64::MAX;
            for mv in ordered {
                let mut placed = board.place(mv, to_move);
                let score = if placed.check_win(mv, to_move) {
                    -(SCORE_FIVE + depth as i64)
                } else {
                    self.minimax(&mut placed, depth - 1, opponent, alpha, beta, true, perspective)
                };
                drop(placed);

                min_score = min_score.min(score);
                beta = beta.min(score);
                if alpha >= beta {
                    break; // alpha 剪枝
                }
            }
            min_score
        }
    }

    /// 迭代加深主循环
    fn iterative_deepening(
        &self,
        board: &mut Board,
        ordered: &[Point],
        player: Player,
    ) -> Vec<(Point, i64)> {
        let opponent = player.opposite();
        let deadline = Instant::now() + self.time_budget;
        let mut best: Vec<(Point, i64)> = Vec::new();

        for depth in 1..=self.max_depth {
            if Instant::now() >= deadline {
                break;
            }

            let mut current: Vec<(Point, i64)> = Vec::with_capacity(ordered.len());
            for &mv in ordered {
                if Instant::now() >= deadline {
                    break;
                }
                let mut placed = board.place(mv, player);
                let score = if placed.check_win(mv, player) {
                    SCORE_FIVE + depth as i64
                } else {
                    self.minimax(
                        &mut placed,
                        depth - 1,
                        opponent,
                        i64::MIN,
                        i64::MAX,
                        false,
                        player,
                    )
                };
                drop(placed);
                current.push((mv, score));
            }

            // 只有完整跑完一个深度才采纳其结果
            if current.len() == ordered.len() {
                current.sort_by(|a, b| b.1.cmp(&a.1));
                debug!(
                    "minimax depth {} complete, best {} score {}",
                    depth, current[0].0, current[0].1
                );
                best = current;
                DEPTH_REACHED.store(depth, AtomicOrdering::Relaxed);
            } else {
                break;
            }
        }

        best
    }
}

impl AIStrategy for MinimaxAI {
    fn select_moves(&self, board: &Board, n: usize) -> Vec<ScoredMove> {
        let mut board = board.clone();
        let player = board.to_move();
        let opponent = player.opposite();

        let moves = board.valid_moves();
        if moves.is_empty() {
            return Vec::new();
        }
        let ordered = order_moves(&board, moves, player);

        // 即胜：己方落子成五或活四
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, player);
            if patterns.five > 0 || patterns.open_four > 0 {
                return vec![ScoredMove {
                    point: mv,
                    score: SCORE_FIVE as f64,
                }];
            }
        }

        // 即防：对方下一手能成五或活四，抢先封堵
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, opponent);
            if patterns.five > 0 || patterns.open_four > 0 {
                return vec![ScoredMove {
                    point: mv,
                    score: SCORE_OPEN_FOUR as f64,
                }];
            }
        }

        let results = self.iterative_deepening(&mut board, &ordered, player);

        // 连深度 1 都没完成（预算耗尽）：退回排序首选
        if results.is_empty() {
            return vec![ScoredMove {
                point: ordered[0],
                score: 0.0,
            }];
        }

        let mut scored: Vec<ScoredMove> = results
            .into_iter()
            .map(|(point, score)| ScoredMove {
                point,
                score: score as f64,
            })
            .collect();

        sort_and_truncate(&mut scored, n);
        scored
    }
}

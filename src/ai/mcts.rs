//! 蒙特卡洛 AI 策略
//!
//! 对排序后的前 N 个候选做 UCB1 多臂老虎机选择，在私有棋盘副本上
//! 跑模拟对局。统计量用启发式评估做小额先验播种，提前向强着倾斜。

use super::{sort_and_truncate, AIConfig, AIStrategy, ScoredMove};
use crate::board::Board;
use crate::eval::{evaluate_point, order_moves};
use crate::types::{Player, Point, CELL_COUNT};
use rand::prelude::*;
use std::time::{Duration, Instant};

/// 先验模拟次数
const PRIOR_SIMS: u32 = 2;

/// 难度档位参数
#[derive(Debug, Clone, Copy)]
pub struct MctsParams {
    /// 时间预算（毫秒）
    pub time_budget_ms: u64,
    /// 候选着法数
    pub candidates: usize,
    /// 走启发式模拟的比例
    pub smart_ratio: f64,
    /// UCB 探索系数
    pub explore_c: f64,
}

impl MctsParams {
    /// 难度 1-4 的参数表；其他数值按毫秒预算处理（下限 50ms）
    pub fn from_difficulty_or_time(value: u64) -> MctsParams {
        match value {
            1 => MctsParams {
                time_budget_ms: 120,
                candidates: 6,
                smart_ratio: 0.15,
                explore_c: 1.2,
            },
            2 => MctsParams {
                time_budget_ms: 350,
                candidates: 10,
                smart_ratio: 0.25,
                explore_c: 1.0,
            },
            3 => MctsParams {
                time_budget_ms: 800,
                candidates: 14,
                smart_ratio: 0.45,
                explore_c: 0.85,
            },
            4 => MctsParams {
                time_budget_ms: 1500,
                candidates: 20,
                smart_ratio: 0.95,
                explore_c: 0.6,
            },
            ms => MctsParams {
                time_budget_ms: ms.max(50),
                candidates: 10,
                smart_ratio: 0.25,
                explore_c: 1.0,
            },
        }
    }
}

/// 每个候选的模拟统计
#[derive(Debug, Clone, Copy, Default)]
struct MoveStats {
    sims: u32,
    wins: u32,
}

/// MCTS AI - UCB1 选择 + 启发偏置模拟
pub struct MctsAI {
    params: MctsParams,
    rng: StdRng,
}

impl MctsAI {
    /// `config.time_budget` 优先作为毫秒预算；否则把 `max_depth` 当难度档
    pub fn new(config: &AIConfig) -> Self {
        let params = match config.time_budget {
            Some(ms) => MctsParams::from_difficulty_or_time(ms),
            None => MctsParams::from_difficulty_or_time(config.max_depth as u64),
        };
        Self::with_params(params, config.seed)
    }

    pub fn with_params(params: MctsParams, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        MctsAI { params, rng }
    }

    /// 从 `first` 落子开始模拟到分出胜负或无子可落
    ///
    /// 在棋盘副本上进行；返回赢家，无人获胜（含下满）返回 `None`。
    fn playout(
        &self,
        board: &Board,
        first: Point,
        player: Player,
        smart: bool,
        heuristic_chance: f64,
        rng: &mut StdRng,
    ) -> Option<Player> {
        let mut sim = board.clone();
        sim.put(first, player);
        if sim.check_win(first, player) {
            return Some(player);
        }

        let mut turn = player.opposite();
        // 落子数上限防止死循环
        for _ in 0..CELL_COUNT {
            let moves = sim.valid_moves();
            if moves.is_empty() {
                break;
            }

            let mv = if smart && moves.len() > 1 && rng.gen::<f64>() < heuristic_chance {
                // 局部启发：选当前最高评估点
                *moves
                    .iter()
                    .max_by_key(|&&pt| evaluate_point(&sim, pt, turn, false))
                    .unwrap_or(&moves[0])
            } else {
                moves[rng.gen_range(0..moves.len())]
            };

            sim.put(mv, turn);
            if sim.check_win(mv, turn) {
                return Some(turn);
            }
            turn = turn.opposite();
        }

        None
    }

    /// UCB1 主循环
    fn run_bandit(&self, board: &Board, candidates: &[Point], player: Player) -> Vec<MoveStats> {
        let mut rng = self.rng.clone();
        let mut stats = vec![MoveStats::default(); candidates.len()];

        // 先验播种：按归一化启发评估给每个候选 2 次虚拟模拟
        let prior_scores: Vec<i64> = candidates
            .iter()
            .map(|&pt| evaluate_point(board, pt, player, true).max(0))
            .collect();
        let min_s = prior_scores.iter().copied().min().unwrap_or(0);
        let max_s = prior_scores.iter().copied().max().unwrap_or(0);
        for (stat, &score) in stats.iter_mut().zip(&prior_scores) {
            let normalized = if max_s > min_s {
                (score - min_s) as f64 / (max_s - min_s) as f64
            } else {
                0.5
            };
            stat.sims = PRIOR_SIMS;
            stat.wins = (normalized * PRIOR_SIMS as f64).round() as u32;
        }

        let deadline = Instant::now() + Duration::from_millis(self.params.time_budget_ms);
        let mut total_sims: u64 = stats.iter().map(|s| s.sims as u64).sum();

        while Instant::now() < deadline {
            // 选择：未模拟过的候选无条件优先，其余取 UCB1 最大者
            let mut best_idx = 0;
            let mut best_ucb = f64::NEG_INFINITY;
            for (i, stat) in stats.iter().enumerate() {
                let ucb = if stat.sims == 0 {
                    f64::INFINITY
                } else {
                    let win_rate = stat.wins as f64 / stat.sims as f64;
                    win_rate
                        + self.params.explore_c
                            * ((total_sims as f64 + 1.0).ln() / stat.sims as f64).sqrt()
                };
                if ucb > best_ucb {
                    best_ucb = ucb;
                    best_idx = i;
                }
            }

            // 高档位确定性走启发模拟，否则按比例抽签
            let smart = self.params.smart_ratio >= 0.9
                || rng.gen::<f64>() < self.params.smart_ratio;
            let heuristic_chance = self.params.smart_ratio.max(0.35);
            let winner = self.playout(
                board,
                candidates[best_idx],
                player,
                smart,
                heuristic_chance,
                &mut rng,
            );

            stats[best_idx].sims += 1;
            total_sims += 1;
            if winner == Some(player) {
                stats[best_idx].wins += 1;
            }
        }

        stats
    }

    /// 终选评分：胜局计 1、负局计 0.5，除以模拟数
    fn final_rate(stat: &MoveStats) -> f64 {
        if stat.sims == 0 {
            return 0.0;
        }
        let losses = stat.sims - stat.wins;
        (stat.wins as f64 + 0.5 * losses as f64) / stat.sims as f64
    }
}

impl AIStrategy for MctsAI {
    fn select_moves(&self, board: &Board, n: usize) -> Vec<ScoredMove> {
        let board = board.clone();
        let player = board.to_move();
        let opponent = player.opposite();

        let moves = board.valid_moves();
        if moves.is_empty() {
            return Vec::new();
        }
        let ordered = order_moves(&board, moves, player);

        // 即胜/即防捷径与搜索档保持一致
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, player);
            if patterns.five > 0 || patterns.open_four > 0 {
                return vec![ScoredMove {
                    point: mv,
                    score: 1.0,
                }];
            }
        }
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, opponent);
            if patterns.five > 0 || patterns.open_four > 0 {
                return vec![ScoredMove {
                    point: mv,
                    score: 1.0,
                }];
            }
        }

        let count = self.params.candidates.min(ordered.len()).max(1);
        let candidates = &ordered[..count];
        let stats = self.run_bandit(&board, candidates, player);

        let mut scored: Vec<ScoredMove> = candidates
            .iter()
            .zip(&stats)
            .map(|(&point, stat)| ScoredMove {
                point,
                score: Self::final_rate(stat),
            })
            .collect();

        sort_and_truncate(&mut scored, n);
        scored
    }
}

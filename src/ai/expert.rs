//! 专家档 negamax 搜索引擎
//!
//! 迭代加深 negamax/alpha-beta，带：
//! - 32 位增量 Zobrist 哈希的定长数组置换表（深度优先替换）
//! - 每深度两个槽位的杀手着法
//! - 按点索引的历史启发（截断记 `1 << depth`）
//! - 根节点的即胜/即防/双威胁捷径与威胁分排序
//!
//! 同一个同步搜索函数既可在调用线程直接执行，也可由后台
//! 工作线程携带协作式停止标志执行。

use super::{sort_and_truncate, AIConfig, AIStrategy, ScoredMove, DEPTH_REACHED, NODE_COUNT};
use crate::board::Board;
use crate::eval::{evaluate_board, evaluate_point, order_moves, SCORE_FIVE};
use crate::types::{Player, Point, CELL_COUNT};
use log::debug;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 未设预算时的默认时限
const DEFAULT_TIME_BUDGET_MS: u64 = 1500;

/// 根节点候选着法上限
const ROOT_CANDIDATE_LIMIT: usize = 40;

// ============================================================================
// 置换表
// ============================================================================

const TT_SIZE: usize = 1 << 20;
const TT_MASK: usize = TT_SIZE - 1;

/// 表项分值的性质
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    None,
    /// 精确值（窗口内搜完所有着法）
    Exact,
    /// beta 截断产生的下界
    Lower,
    /// 所有着法都未超过 alpha 产生的上界
    Upper,
}

#[derive(Clone, Copy)]
struct TTEntry {
    hash: u32,
    side: Player,
    depth: u8,
    score: i64,
    bound: Bound,
}

impl Default for TTEntry {
    fn default() -> Self {
        TTEntry {
            hash: 0,
            side: Player::Black,
            depth: 0,
            score: 0,
            bound: Bound::None,
        }
    }
}

/// 定长数组置换表，`hash & TT_MASK` 定位，碰撞时深度优先替换
struct TranspositionTable {
    entries: Vec<TTEntry>,
}

impl TranspositionTable {
    fn new() -> Self {
        TranspositionTable {
            entries: vec![TTEntry::default(); TT_SIZE],
        }
    }

    fn clear(&mut self) {
        self.entries.fill(TTEntry::default());
    }

    /// 查找 (hash, side) 且存储深度不小于 `depth` 的表项
    #[inline]
    fn probe(&self, hash: u32, side: Player, depth: u32) -> Option<&TTEntry> {
        let entry = &self.entries[(hash as usize) & TT_MASK];
        if entry.bound != Bound::None
            && entry.hash == hash
            && entry.side == side
            && entry.depth as u32 >= depth
        {
            Some(entry)
        } else {
            None
        }
    }

    #[inline]
    fn store(&mut self, hash: u32, side: Player, depth: u32, score: i64, bound: Bound) {
        let entry = &mut self.entries[(hash as usize) & TT_MASK];
        if entry.bound == Bound::None || entry.hash != hash || depth >= entry.depth as u32 {
            *entry = TTEntry {
                hash,
                side,
                depth: depth.min(u8::MAX as u32) as u8,
                score,
                bound,
            };
        }
    }
}

// ============================================================================
// 搜索
// ============================================================================

/// 一次专家搜索调用的全部状态
///
/// 置换表、杀手、历史都在 `run` 开始时清零，只在本次调用内有效。
pub struct ExpertSearch {
    max_depth: u32,
    time_budget: Duration,
    start: Instant,
    stop: Option<Arc<AtomicBool>>,
    tt: TranspositionTable,
    killers: Vec<[Option<Point>; 2]>,
    history: Vec<u64>,
}

impl ExpertSearch {
    pub fn new(max_depth: u32, time_budget_ms: u64) -> Self {
        let max_depth = max_depth.max(1);
        ExpertSearch {
            max_depth,
            time_budget: Duration::from_millis(time_budget_ms),
            start: Instant::now(),
            stop: None,
            tt: TranspositionTable::new(),
            killers: vec![[None; 2]; (max_depth + 2) as usize],
            history: vec![0; CELL_COUNT],
        }
    }

    /// 附加协作式停止标志（后台工作线程的取消通道）
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// 时间预算耗尽或被要求停止
    ///
    /// 只在迭代加深的着法之间与深度之间轮询；单个子树可能超出
    /// 预算至多一次完整评估。
    #[inline]
    fn halted(&self) -> bool {
        self.start.elapsed() >= self.time_budget
            || self
                .stop
                .as_ref()
                .is_some_and(|f| f.load(AtomicOrdering::Relaxed))
    }

    /// 为 `player` 搜索最佳着法
    ///
    /// 返回后棋盘保证与进入时一致（所有临时落子均已撤销）。
    /// 无合法着法时返回 `None`。
    pub fn run(&mut self, board: &mut Board, player: Player) -> Option<Point> {
        self.start = Instant::now();
        self.tt.clear();
        for slots in &mut self.killers {
            *slots = [None; 2];
        }
        self.history.fill(0);

        let moves = board.valid_moves();
        if moves.is_empty() {
            return None;
        }
        let opponent = player.opposite();
        let ordered = order_moves(board, moves, player);

        // 即胜：成五或活四直接落子
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, player);
            if patterns.five > 0 || patterns.open_four > 0 {
                return Some(mv);
            }
        }

        // 即防：对方下一手的成五/活四点必须先封
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, opponent);
            if patterns.five > 0 || patterns.open_four > 0 {
                return Some(mv);
            }
        }

        // 双威胁（叉）检测，并为候选排序累计威胁分
        let mut threat_scores = vec![0u32; CELL_COUNT];
        for &mv in &ordered {
            let patterns = board.analyze_position(mv, player);
            let threat = (patterns.open_four as u32 + patterns.four as u32) * 3
                + patterns.open_three as u32;
            threat_scores[mv.to_index()] = threat;
            if patterns.open_four as u32 + patterns.open_three as u32 >= 2 {
                return Some(mv);
            }
        }

        // 威胁分降序稳定重排（同分保持启发排序），截断候选规模
        let mut candidates = ordered;
        candidates
            .sort_by(|a, b| threat_scores[b.to_index()].cmp(&threat_scores[a.to_index()]));
        candidates.truncate(ROOT_CANDIDATE_LIMIT);

        let mut best: Option<(Point, i64)> = None;

        for depth in 1..=self.max_depth {
            if self.halted() {
                break;
            }

            let mut depth_best: Option<(Point, i64)> = None;
            for &mv in &candidates {
                if self.halted() {
                    break;
                }
                let mut placed = board.place(mv, player);
                let score = if placed.check_win(mv, player) {
                    SCORE_FIVE + depth as i64
                } else {
                    -self.negamax(&mut placed, depth - 1, opponent, i64::MIN + 1, i64::MAX)
                };
                drop(placed);

                if depth_best.map_or(true, |(_, s)| score > s) {
                    depth_best = Some((mv, score));
                }
            }

            if let Some((mv, score)) = depth_best {
                debug!("expert depth {} best {} score {}", depth, mv, score);
                best = Some((mv, score));
                DEPTH_REACHED.store(depth, AtomicOrdering::Relaxed);
            }
        }

        best.map(|(mv, _)| mv).or_else(|| candidates.first().copied())
    }

    /// Negamax 递归（fail-soft）
    ///
    /// 分值始终以 `to_move` 方视角为正。哈希由棋盘落子守卫增量维护，
    /// 绝不在搜索中途整盘重算。
    fn negamax(
        &mut self,
        board: &mut Board,
        depth: u32,
        to_move: Player,
        mut alpha: i64,
        beta: i64,
    ) -> i64 {
        NODE_COUNT.fetch_add(1, AtomicOrdering::Relaxed);

        if depth == 0 {
            return evaluate_board(board, to_move);
        }

        let hash = board.hash();
        if let Some(entry) = self.tt.probe(hash, to_move, depth) {
            match entry.bound {
                Bound::Exact => return entry.score,
                Bound::Lower if entry.score >= beta => return entry.score,
                Bound::Upper if entry.score <= alpha => return entry.score,
                _ => {}
            }
        }
        let alpha_orig = alpha;

        let moves = board.valid_moves();
        if moves.is_empty() {
            return 0;
        }
        let mut ordered = order_moves(board, moves, to_move);

        // 本深度的杀手优先，其次历史分降序
        let killers = self
            .killers
            .get(depth as usize)
            .copied()
            .unwrap_or([None; 2]);
        {
            let history = &self.history;
            ordered.sort_by(|a, b| {
                let a_killer = killers.contains(&Some(*a));
                let b_killer = killers.contains(&Some(*b));
                match (a_killer, b_killer) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => history[b.to_index()].cmp(&history[a.to_index()]),
                }
            });
        }

        let opponent = to_move.opposite();
        let mut best = i64::MIN + 1;

        for mv in ordered {
            let mut placed = board.place(mv, to_move);
            let val = if placed.check_win(mv, to_move) {
                SCORE_FIVE + depth as i64
            } else {
                -self.negamax(&mut placed, depth - 1, opponent, -beta, -alpha)
            };
            drop(placed);

            if val > best {
                best = val;
            }
            if val > alpha {
                alpha = val;
            }

            if alpha >= beta {
                // 截断：登记杀手与历史分，存下界
                self.record_killer(depth, mv);
                self.history[mv.to_index()] += 1u64 << depth.min(63);
                self.tt.store(hash, to_move, depth, val, Bound::Lower);
                return val;
            }
        }

        let bound = if best <= alpha_orig {
            Bound::Upper
        } else {
            Bound::Exact
        };
        self.tt.store(hash, to_move, depth, best, bound);
        best
    }

    /// 杀手槽：容量 2，最近者在前，去重
    fn record_killer(&mut self, depth: u32, mv: Point) {
        if let Some(slots) = self.killers.get_mut(depth as usize) {
            if slots[0] != Some(mv) {
                slots[1] = slots[0];
                slots[0] = Some(mv);
            }
        }
    }
}

/// 专家 AI - `ExpertSearch` 的策略封装
pub struct ExpertAI {
    max_depth: u32,
    time_budget_ms: u64,
}

impl ExpertAI {
    pub fn new(config: &AIConfig) -> Self {
        ExpertAI {
            max_depth: config.max_depth.max(1),
            time_budget_ms: config.time_budget.unwrap_or(DEFAULT_TIME_BUDGET_MS),
        }
    }
}

impl AIStrategy for ExpertAI {
    fn select_moves(&self, board: &Board, n: usize) -> Vec<ScoredMove> {
        let mut board = board.clone();
        let player = board.to_move();
        let mut search = ExpertSearch::new(self.max_depth, self.time_budget_ms);

        let mut scored: Vec<ScoredMove> = search
            .run(&mut board, player)
            .map(|point| ScoredMove {
                point,
                score: evaluate_point(&board, point, player, true) as f64,
            })
            .into_iter()
            .collect();

        sort_and_truncate(&mut scored, n);
        scored
    }
}

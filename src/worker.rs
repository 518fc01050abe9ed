//! 后台搜索工作线程
//!
//! 把专家搜索派发到隔离线程执行，通过带类型的通道回报
//! 进度 / 结果 / 错误三类消息。宿主侧实施硬超时（预算加宽限），
//! 超时或故障一律降级为排序首选着法；取消通过协作式停止标志完成。
//!
//! 同一个同步搜索函数（[`ExpertSearch::run`]）既可经
//! [`SearchHost::dispatch`] 在后台执行，也可经 [`search_blocking`]
//! 在调用线程阻塞执行。

use crate::ai::ExpertSearch;
use crate::board::Board;
use crate::eval::order_moves;
use crate::types::{Player, Point};
use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 硬超时宽限
const TIMEOUT_GRACE_MS: u64 = 300;

/// 进度报告周期（独立计时器，与递归深度解耦）
const PROGRESS_INTERVAL_MS: u64 = 300;

/// 工作线程回报的消息
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMessage {
    /// 周期性进度
    Progress { elapsed_ms: u64, budget_ms: u64 },
    /// 最终结果（`None` 表示无合法着法）
    Result { best: Option<Point> },
    /// 搜索故障，宿主侧降级处理
    Error { message: String },
}

/// 在调用线程同步执行专家搜索（阻塞）
pub fn search_blocking(
    board: &mut Board,
    player: Player,
    max_depth: u32,
    budget_ms: u64,
) -> Option<Point> {
    ExpertSearch::new(max_depth, budget_ms).run(board, player)
}

/// 故障/超时降级：排序首选，排序结果为空则取首个合法着法
pub fn fallback_move(board: &Board, player: Player) -> Option<Point> {
    let moves = board.valid_moves();
    order_moves(board, moves.clone(), player)
        .first()
        .copied()
        .or_else(|| moves.first().copied())
}

struct WorkerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// 搜索宿主：同一时刻至多一个搜索在途
pub struct SearchHost {
    current: Option<WorkerHandle>,
}

impl Default for SearchHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchHost {
    pub fn new() -> Self {
        SearchHost { current: None }
    }

    /// 是否有搜索在途
    pub fn is_searching(&self) -> bool {
        self.current.is_some()
    }

    /// 派发一次专家搜索
    ///
    /// 携带棋盘快照与搜索参数启动工作线程；已有在途搜索会先被取消。
    /// 返回的接收端依次收到若干 `Progress`，最后一条 `Result` 或 `Error`。
    pub fn dispatch(
        &mut self,
        board: &Board,
        player: Player,
        max_depth: u32,
        budget_ms: u64,
    ) -> Receiver<SearchMessage> {
        self.cancel();

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let mut snapshot = board.clone();
        let worker_stop = Arc::clone(&stop);

        let spawned = thread::Builder::new()
            .name("expert-search".to_string())
            .spawn(move || {
                let start = Instant::now();
                let done = Arc::new(AtomicBool::new(false));

                // 进度计时器：独立线程按固定周期上报
                let ticker_tx = tx.clone();
                let ticker_done = Arc::clone(&done);
                let ticker_stop = Arc::clone(&worker_stop);
                let _ticker = thread::spawn(move || loop {
                    thread::sleep(Duration::from_millis(PROGRESS_INTERVAL_MS));
                    if ticker_done.load(AtomicOrdering::Relaxed)
                        || ticker_stop.load(AtomicOrdering::Relaxed)
                    {
                        break;
                    }
                    let msg = SearchMessage::Progress {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        budget_ms,
                    };
                    if ticker_tx.send(msg).is_err() {
                        break;
                    }
                });

                let search_stop = Arc::clone(&worker_stop);
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    ExpertSearch::new(max_depth, budget_ms)
                        .with_stop_flag(search_stop)
                        .run(&mut snapshot, player)
                }));
                done.store(true, AtomicOrdering::Relaxed);

                let msg = match outcome {
                    Ok(best) => SearchMessage::Result { best },
                    Err(payload) => {
                        let message = if let Some(s) = payload.downcast_ref::<&str>() {
                            (*s).to_string()
                        } else if let Some(s) = payload.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "search thread panicked".to_string()
                        };
                        warn!("expert search thread panicked: {}", message);
                        SearchMessage::Error { message }
                    }
                };
                let _ = tx.send(msg);
            });

        match spawned {
            Ok(handle) => {
                self.current = Some(WorkerHandle {
                    stop,
                    thread: handle,
                });
            }
            Err(e) => {
                // 线程不可用：接收端将直接断开，调用方走降级路径
                warn!("failed to spawn search worker: {}", e);
            }
        }

        rx
    }

    /// 等待派发结果并实施硬超时
    ///
    /// 预算加宽限内未收到结果则置停止标志并降级；`Error`、通道断开
    /// 同样降级。`board` 仅用于计算降级着法。
    pub fn resolve(
        &mut self,
        rx: &Receiver<SearchMessage>,
        budget_ms: u64,
        board: &Board,
        player: Player,
    ) -> Option<Point> {
        let deadline = Instant::now() + Duration::from_millis(budget_ms + TIMEOUT_GRACE_MS);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("expert search timed out, falling back to ordered move");
                self.cancel();
                return fallback_move(board, player);
            }

            match rx.recv_timeout(remaining) {
                Ok(SearchMessage::Progress {
                    elapsed_ms,
                    budget_ms,
                }) => {
                    debug!("search progress: {}ms / {}ms", elapsed_ms, budget_ms);
                }
                Ok(SearchMessage::Result { best }) => {
                    self.reap();
                    return best;
                }
                Ok(SearchMessage::Error { message }) => {
                    warn!("search worker error: {}", message);
                    self.reap();
                    return fallback_move(board, player);
                }
                Err(RecvTimeoutError::Timeout) => {
                    // 回到循环顶部复查截止时间
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("search worker channel closed unexpectedly");
                    self.reap();
                    return fallback_move(board, player);
                }
            }
        }
    }

    /// 派发并阻塞等待（带硬超时保护的便捷路径）
    pub fn request(
        &mut self,
        board: &Board,
        player: Player,
        max_depth: u32,
        budget_ms: u64,
    ) -> Option<Point> {
        let rx = self.dispatch(board, player, max_depth, budget_ms);
        self.resolve(&rx, budget_ms, board, player)
    }

    /// 取消在途搜索
    ///
    /// 置协作式停止标志后立即返回，不等待线程退出；被丢弃的搜索
    /// 不回收部分结果。
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.stop.store(true, AtomicOrdering::Relaxed);
            drop(handle.thread);
        }
    }

    /// 正常完成后回收线程
    fn reap(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.stop.store(true, AtomicOrdering::Relaxed);
            let _ = handle.thread.join();
        }
    }
}

impl Drop for SearchHost {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_positions;

    #[test]
    fn test_dispatch_delivers_result() {
        let board = test_positions::scattered_midgame();
        let mut host = SearchHost::new();
        let best = host.request(&board, Player::White, 2, 300);
        assert!(board.get(best.unwrap()).is_none());
        assert!(!host.is_searching());
    }

    #[test]
    fn test_cancel_stops_worker() {
        let board = test_positions::scattered_midgame();
        let mut host = SearchHost::new();
        let rx = host.dispatch(&board, Player::White, 12, 60_000);
        assert!(host.is_searching());
        host.cancel();
        assert!(!host.is_searching());

        // 协作式停止：工作线程应很快回报（提前返回的合法着法）
        let mut result = None;
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(500)) {
                Ok(SearchMessage::Result { best }) => {
                    result = best;
                    break;
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        assert!(result.is_some());
    }

    #[test]
    fn test_redispatch_replaces_previous_search() {
        let board = test_positions::scattered_midgame();
        let mut host = SearchHost::new();
        let _rx1 = host.dispatch(&board, Player::White, 12, 60_000);
        let rx2 = host.dispatch(&board, Player::White, 1, 300);
        let best = host.resolve(&rx2, 300, &board, Player::White);
        assert!(board.get(best.unwrap()).is_none());
    }

    #[test]
    fn test_search_blocking_path() {
        let mut board = test_positions::scattered_midgame();
        let best = search_blocking(&mut board, Player::White, 2, 200).unwrap();
        assert!(board.get(best).is_none());
    }

    #[test]
    fn test_fallback_move_is_legal() {
        let board = test_positions::black_open_four_white_to_move();
        let best = fallback_move(&board, Player::White).unwrap();
        assert!(board.get(best).is_none());
        assert_eq!(fallback_move(&Board::new(), Player::Black), Some(Point::new(9, 9)));
    }
}

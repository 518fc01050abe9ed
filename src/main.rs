//! Gomoku AI CLI
//!
//! 命令行界面，用于测试引擎
//!
//! 支持两种模式：
//! 1. 单次命令模式：每次执行一个命令
//! 2. Server 模式：长驻进程，通过 stdin/stdout 按行交换 JSON

use clap::{Parser, Subcommand};
use gomoku_ai::{
    evaluate_board, get_depth_reached, get_node_count, reset_depth_reached, reset_node_count,
    AIConfig, AIEngine, Board, DEFAULT_STRATEGY,
};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "gomoku-ai")]
#[command(about = "Gomoku (five-in-a-row) AI Engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出候选着法
    Moves {
        /// 棋盘记谱字符串
        #[arg(long)]
        board: String,
    },

    /// 选择最佳着法
    Best {
        /// 棋盘记谱字符串
        #[arg(long)]
        board: String,

        /// AI 策略 (random, minimax, expert, mcts)
        #[arg(long, default_value = DEFAULT_STRATEGY)]
        strategy: String,

        /// 最大搜索深度
        #[arg(long, default_value = "8")]
        depth: u32,

        /// 时间预算（毫秒）
        #[arg(long)]
        time_budget: Option<u64>,

        /// 返回的着法数量
        #[arg(long, default_value = "1")]
        n: usize,

        /// JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 静态评估当前局面
    Eval {
        /// 棋盘记谱字符串
        #[arg(long)]
        board: String,

        /// JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 启动 server 模式（stdin/stdout 通信）
    Server,
}

#[derive(Serialize, Deserialize)]
struct MoveResult {
    #[serde(rename = "move")]
    mv: String,
    score: f64,
}

#[derive(Serialize, Deserialize)]
struct MovesResponse {
    moves: Vec<MoveResult>,
    total: usize,
}

// Server 模式的请求和响应结构
#[derive(Serialize, Deserialize)]
struct ServerRequest {
    cmd: String,
    #[serde(default)]
    board: String,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    depth: Option<u32>,
    #[serde(default)]
    time_budget: Option<u64>,
    #[serde(default)]
    n: Option<usize>,
}

#[derive(Serialize, Deserialize, Default)]
struct ServerResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    moves: Option<Vec<MoveResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    legal_moves: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    turn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ServerResponse {
    fn success_moves(moves: Vec<MoveResult>, depth: u32, nodes: u64, nps: f64, elapsed_ms: f64) -> Self {
        Self {
            ok: true,
            moves: Some(moves),
            depth: Some(depth),
            nodes: Some(nodes),
            nps: Some(nps),
            elapsed_ms: Some(elapsed_ms),
            ..Default::default()
        }
    }

    fn success_legal_moves(legal_moves: Vec<String>) -> Self {
        Self {
            ok: true,
            legal_moves: Some(legal_moves),
            ..Default::default()
        }
    }

    fn success_eval(eval: i64, turn: &str) -> Self {
        Self {
            ok: true,
            eval: Some(eval),
            turn: Some(turn.to_string()),
            ..Default::default()
        }
    }

    fn error(msg: &str) -> Self {
        Self {
            ok: false,
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

fn calc_nps(nodes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        nodes as f64 / elapsed_secs
    } else {
        0.0
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Moves { board } => match Board::from_notation(&board) {
            Ok(board) => {
                let moves = board.valid_moves();
                println!("Valid moves ({}):", moves.len());
                for mv in &moves {
                    println!("  {}", mv);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Best {
            board,
            strategy,
            depth,
            time_budget,
            n,
            json,
        } => {
            let config = AIConfig {
                max_depth: depth,
                time_budget,
                seed: None,
            };

            let ai = match AIEngine::from_strategy(&strategy, &config) {
                Ok(ai) => ai,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            // 重置计数器
            reset_node_count();
            reset_depth_reached();
            let start = Instant::now();

            match ai.select_moves_notation(&board, n) {
                Ok(moves) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    let nodes = get_node_count();
                    let depth_reached = get_depth_reached();
                    let nps = calc_nps(nodes, elapsed);

                    if json {
                        let response = MovesResponse {
                            total: moves.len(),
                            moves: moves
                                .into_iter()
                                .map(|(mv, score)| MoveResult { mv, score })
                                .collect(),
                        };
                        println!("{}", serde_json::to_string_pretty(&response).unwrap());
                        eprintln!(
                            "Stats: depth={}, nodes={}, time={:.3}s, nps={:.0}",
                            depth_reached, nodes, elapsed, nps
                        );
                    } else {
                        println!("Best moves (strategy={}):", strategy);
                        for (mv, score) in moves {
                            println!("  {} (score: {:.2})", mv, score);
                        }
                        println!(
                            "\nStats: depth={}, nodes={}, time={:.3}s, nps={:.0}",
                            depth_reached, nodes, elapsed, nps
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Eval { board, json } => match Board::from_notation(&board) {
            Ok(board) => {
                let turn = board.to_move();
                let score = evaluate_board(&board, turn);

                if json {
                    println!(
                        "{{\"turn\": \"{}\", \"eval\": {}}}",
                        turn.to_char(),
                        score
                    );
                } else {
                    println!("Static eval ({} to move): {}", turn, score);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Server => {
            run_server();
        }
    }
}

/// Server 模式主循环
/// 从 stdin 读取 JSON 请求，返回 JSON 响应到 stdout
fn run_server() {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };

        // 空行跳过
        if line.trim().is_empty() {
            continue;
        }

        // 解析请求
        let request: ServerRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let response = ServerResponse::error(&format!("Invalid JSON: {}", e));
                println!("{}", serde_json::to_string(&response).unwrap());
                let _ = stdout.flush();
                continue;
            }
        };

        // 处理命令
        let response = match request.cmd.as_str() {
            "best" => handle_best_request(&request),
            "moves" => handle_moves_request(&request),
            "eval" => handle_eval_request(&request),
            "quit" => break,
            _ => ServerResponse::error(&format!("Unknown command: {}", request.cmd)),
        };

        // 返回响应
        println!("{}", serde_json::to_string(&response).unwrap());
        let _ = stdout.flush();
    }
}

/// 处理 best 命令
fn handle_best_request(request: &ServerRequest) -> ServerResponse {
    let strategy = request.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY);
    let n = request.n.unwrap_or(1);

    let config = AIConfig {
        max_depth: request.depth.unwrap_or(8),
        time_budget: request.time_budget,
        seed: None,
    };

    let ai = match AIEngine::from_strategy(strategy, &config) {
        Ok(ai) => ai,
        Err(e) => return ServerResponse::error(&format!("Invalid strategy: {}", e)),
    };

    reset_node_count();
    reset_depth_reached();
    let start = Instant::now();

    match ai.select_moves_notation(&request.board, n) {
        Ok(moves) => {
            let elapsed = start.elapsed().as_secs_f64();
            let nodes = get_node_count();
            let depth = get_depth_reached();
            let nps = calc_nps(nodes, elapsed);

            let move_results: Vec<MoveResult> = moves
                .into_iter()
                .map(|(mv, score)| MoveResult { mv, score })
                .collect();

            ServerResponse::success_moves(move_results, depth, nodes, nps, elapsed * 1000.0)
        }
        Err(e) => ServerResponse::error(&format!("AI error: {}", e)),
    }
}

/// 处理 moves 命令
fn handle_moves_request(request: &ServerRequest) -> ServerResponse {
    match Board::from_notation(&request.board) {
        Ok(board) => {
            let moves = board.valid_moves().iter().map(|p| p.to_notation()).collect();
            ServerResponse::success_legal_moves(moves)
        }
        Err(e) => ServerResponse::error(&format!("Invalid board: {}", e)),
    }
}

/// 处理 eval 命令（静态评估）
fn handle_eval_request(request: &ServerRequest) -> ServerResponse {
    match Board::from_notation(&request.board) {
        Ok(board) => {
            let turn = board.to_move();
            let score = evaluate_board(&board, turn);
            ServerResponse::success_eval(score, &turn.to_char().to_string())
        }
        Err(e) => ServerResponse::error(&format!("Invalid board: {}", e)),
    }
}

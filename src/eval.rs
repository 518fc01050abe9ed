//! 局面评估与着法排序
//!
//! 把连子模式映射为标量分值：权重近似几何增长，反映威胁等级。
//! `analyze_position` 不读取落点本身，因此所有评估都无需真正落子。

use crate::board::Board;
use crate::types::{Player, Point, BOARD_SIZE, CELL_COUNT};

/// 五连（胜型）
pub const SCORE_FIVE: i64 = 100_000_000;
/// 活四（近乎必胜）
pub const SCORE_OPEN_FOUR: i64 = 50_000;
/// 冲四
pub const SCORE_FOUR: i64 = 8_000;
/// 活三
pub const SCORE_OPEN_THREE: i64 = 3_000;
/// 眠三
pub const SCORE_THREE: i64 = 600;
/// 活二
pub const SCORE_OPEN_TWO: i64 = 100;
/// 眠二
pub const SCORE_TWO: i64 = 20;

/// 防守权重：排序时对方在同一点的潜在收益乘以此系数
const DEFENSE_WEIGHT: f64 = 1.2;

/// 评估在 `pt` 落 `player` 的子的价值
///
/// `include_positional` 打开时额外计入活二/眠二与位置分；
/// 快速排序路径（`order_moves`）只看三连以上的威胁。
pub fn evaluate_point(board: &Board, pt: Point, player: Player, include_positional: bool) -> i64 {
    let patterns = board.analyze_position(pt, player);
    let mut score = 0;

    score += patterns.five as i64 * SCORE_FIVE;
    score += patterns.open_four as i64 * SCORE_OPEN_FOUR;
    score += patterns.four as i64 * SCORE_FOUR;
    score += patterns.open_three as i64 * SCORE_OPEN_THREE;
    score += patterns.three as i64 * SCORE_THREE;

    if include_positional {
        score += patterns.open_two as i64 * SCORE_OPEN_TWO;
        score += patterns.two as i64 * SCORE_TWO;
        score += positional_score(pt);
    }

    score
}

/// 位置分：中心临近加权（曼哈顿距离）加星位奖励
pub fn positional_score(pt: Point) -> i64 {
    let center = BOARD_SIZE / 2;
    let distance = (pt.row - center).abs() + (pt.col - center).abs();
    let mut score = (BOARD_SIZE - distance) as i64 * 2;
    if pt.is_star_point() {
        score += 5;
    }
    score
}

/// 全盘静态评估
///
/// 以 `perspective` 方所有棋子的评估值减去对方棋子的评估值，
/// 作为深度受限搜索的叶节点启发值。
pub fn evaluate_board(board: &Board, perspective: Player) -> i64 {
    let mut score = 0;
    for idx in 0..CELL_COUNT {
        let pt = Point::from_index(idx);
        match board.get(pt) {
            Some(player) if player == perspective => {
                score += evaluate_point(board, pt, player, true);
            }
            Some(player) => {
                score -= evaluate_point(board, pt, player, true);
            }
            None => {}
        }
    }
    score
}

/// 着法排序：进攻收益加 1.2 倍的对方潜在收益，降序
///
/// 先手堵住危险点的权重高于单纯进攻。强着排前能最大化
/// alpha-beta 剪枝率，输出是输入着法的一个排列。
pub fn order_moves(board: &Board, moves: Vec<Point>, player: Player) -> Vec<Point> {
    let opponent = player.opposite();
    let mut scored: Vec<(Point, f64)> = moves
        .into_iter()
        .map(|pt| {
            let my_score = evaluate_point(board, pt, player, false) as f64;
            let opp_score = evaluate_point(board, pt, opponent, false) as f64;
            (pt, my_score + DEFENSE_WEIGHT * opp_score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(pt, _)| pt).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(stones: &[(i8, i8, Player)]) -> Board {
        let mut board = Board::new();
        for &(row, col, player) in stones {
            board.put(Point::new(row, col), player);
        }
        board
    }

    #[test]
    fn test_open_four_outweighs_lesser_threats() {
        assert!(SCORE_FIVE > 100 * SCORE_OPEN_FOUR);
        assert!(SCORE_OPEN_FOUR > SCORE_FOUR);
        assert!(SCORE_FOUR > SCORE_OPEN_THREE);
        assert!(SCORE_OPEN_THREE > SCORE_THREE);
    }

    #[test]
    fn test_evaluate_point_open_three() {
        let board = board_with(&[(9, 5, Player::Black), (9, 6, Player::Black)]);
        let score = evaluate_point(&board, Point::new(9, 7), Player::Black, false);
        assert_eq!(score, SCORE_OPEN_THREE);
    }

    #[test]
    fn test_positional_score_peaks_at_center() {
        let center = positional_score(Point::new(9, 9));
        assert!(center > positional_score(Point::new(0, 0)));
        // 天元本身也是星位
        assert_eq!(center, 19 * 2 + 5);
    }

    #[test]
    fn test_evaluate_board_antisymmetric() {
        let board = board_with(&[
            (9, 9, Player::Black),
            (9, 10, Player::Black),
            (3, 3, Player::White),
        ]);
        assert_eq!(
            evaluate_board(&board, Player::Black),
            -evaluate_board(&board, Player::White)
        );
    }

    #[test]
    fn test_order_moves_is_permutation() {
        let board = board_with(&[(9, 9, Player::Black), (10, 10, Player::White)]);
        let moves = board.valid_moves();
        let mut original = moves.clone();
        let mut ordered = order_moves(&board, moves, Player::Black);
        original.sort_by_key(Point::to_index);
        ordered.sort_by_key(Point::to_index);
        assert_eq!(original, ordered);
    }

    #[test]
    fn test_order_moves_prefers_blocking_open_four() {
        // 白方排序时，封堵黑活四端点应排在首位
        let board = board_with(&[
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
            (9, 8, Player::Black),
        ]);
        let ordered = order_moves(&board, board.valid_moves(), Player::White);
        let first = ordered[0];
        assert!(first == Point::new(9, 4) || first == Point::new(9, 9));
    }
}

//! 测试局面库
//!
//! 各模块测试共用的典型局面。行棋方在每个构造函数中显式设定。

use crate::board::Board;
use crate::types::{Player, Point};

/// 按 (row, col, player) 列表摆子
pub fn board_with(stones: &[(i8, i8, Player)], to_move: Player) -> Board {
    let mut board = Board::new();
    for &(row, col, player) in stones {
        board.put(Point::new(row, col), player);
    }
    board.set_to_move(to_move);
    board
}

/// 黑 e10-h10 四连、d10 被白封：黑走 i10 即成五
pub fn black_four_one_gap() -> Board {
    board_with(
        &[
            (9, 3, Player::White),
            (9, 4, Player::Black),
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
        ],
        Player::Black,
    )
}

/// 黑 f10-i10 活四，白方行棋：必须封 e10 或 j10
pub fn black_open_four_white_to_move() -> Board {
    board_with(
        &[
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
            (9, 8, Player::Black),
        ],
        Player::White,
    )
}

/// 黑 f10-h10 三连、e10 被白封，黑方行棋：i10 冲四是强制着法
pub fn black_blocked_three() -> Board {
    board_with(
        &[
            (9, 4, Player::White),
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
        ],
        Player::Black,
    )
}

/// 无明显威胁的散开中盘，白方行棋
pub fn scattered_midgame() -> Board {
    board_with(
        &[
            (9, 9, Player::Black),
            (9, 10, Player::White),
            (10, 9, Player::Black),
            (8, 8, Player::White),
            (11, 10, Player::Black),
        ],
        Player::White,
    )
}

/// 小范围残局：子数少到可以全宽暴力搜索对拍
pub fn tiny_tactical() -> Board {
    board_with(
        &[
            (9, 8, Player::Black),
            (9, 9, Player::Black),
            (10, 9, Player::White),
            (10, 10, Player::White),
        ],
        Player::Black,
    )
}

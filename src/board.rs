//! 五子棋棋盘模型
//!
//! 使用扁平数组存储 19x19 棋盘，增量维护 Zobrist 哈希与子数。
//! 搜索中的临时落子通过 [`PlacedStone`] 守卫完成，离开作用域自动撤销，
//! 保证任何退出路径（正常返回、提前 break、`?` 传播）都能恢复棋盘。

use lazy_static::lazy_static;
use rand::prelude::*;
use std::ops::{Deref, DerefMut};

use crate::types::{
    GameResult, PatternCounts, Player, Point, BOARD_SIZE, CELL_COUNT, DIRECTIONS,
};

// ============================================================================
// Zobrist 哈希
// ============================================================================

/// Zobrist 哈希表 - 每个交叉点、每种棋色一个 32 位随机常量
struct Zobrist {
    cells: Vec<[u32; 2]>,
}

impl Zobrist {
    fn new() -> Self {
        // 固定种子，保证哈希跨进程可复现
        let mut rng = StdRng::seed_from_u64(0x6F6D_6F6B_75);
        let cells = (0..CELL_COUNT).map(|_| [rng.gen(), rng.gen()]).collect();
        Zobrist { cells }
    }

    #[inline]
    fn cell(&self, idx: usize, player: Player) -> u32 {
        let side = match player {
            Player::Black => 0,
            Player::White => 1,
        };
        self.cells[idx][side]
    }
}

lazy_static! {
    static ref ZOBRIST: Zobrist = Zobrist::new();
}

// ============================================================================
// 棋盘
// ============================================================================

/// 19x19 棋盘
///
/// `hash` 与 `stones` 随落子/提子增量更新；同一点的两次异或会还原哈希，
/// 因此置换表键不依赖落子顺序。
#[derive(Clone)]
pub struct Board {
    cells: [Option<Player>; CELL_COUNT],
    to_move: Player,
    stones: usize,
    hash: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// 创建空棋盘（黑先）
    pub fn new() -> Self {
        Board {
            cells: [None; CELL_COUNT],
            to_move: Player::Black,
            stones: 0,
            hash: 0,
        }
    }

    /// 当前行棋方
    #[inline]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    /// 设置行棋方（由对局会话与搜索根节点管理）
    #[inline]
    pub fn set_to_move(&mut self, player: Player) {
        self.to_move = player;
    }

    /// 当前局面哈希（32 位 Zobrist）
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// 盘上子数
    #[inline]
    pub fn stones(&self) -> usize {
        self.stones
    }

    /// 棋盘是否已下满
    #[inline]
    pub fn is_full(&self) -> bool {
        self.stones == CELL_COUNT
    }

    /// 获取交叉点状态
    #[inline]
    pub fn get(&self, pt: Point) -> Option<Player> {
        if !pt.is_valid() {
            return None;
        }
        self.cells[pt.to_index()]
    }

    /// 交叉点是否为空（界外视为非空）
    #[inline]
    pub fn is_empty_cell(&self, pt: Point) -> bool {
        pt.is_valid() && self.cells[pt.to_index()].is_none()
    }

    /// 落子（永久性，供对局会话与模拟使用）
    ///
    /// 不切换行棋方；调用方负责回合管理。
    pub fn put(&mut self, pt: Point, player: Player) {
        let idx = pt.to_index();
        debug_assert!(self.cells[idx].is_none(), "put on occupied cell {}", pt);
        self.cells[idx] = Some(player);
        self.stones += 1;
        self.hash ^= ZOBRIST.cell(idx, player);
    }

    /// 提子，返回被移除的棋色
    pub fn take(&mut self, pt: Point) -> Option<Player> {
        let idx = pt.to_index();
        let removed = self.cells[idx].take()?;
        self.stones -= 1;
        self.hash ^= ZOBRIST.cell(idx, removed);
        Some(removed)
    }

    /// 临时落子，返回离开作用域时自动撤销的守卫
    pub fn place(&mut self, pt: Point, player: Player) -> PlacedStone<'_> {
        self.put(pt, player);
        PlacedStone { board: self, point: pt }
    }

    /// 从头重算哈希（校验增量维护用）
    pub fn compute_hash(&self) -> u32 {
        let mut h = 0u32;
        for (idx, cell) in self.cells.iter().enumerate() {
            if let Some(player) = cell {
                h ^= ZOBRIST.cell(idx, *player);
            }
        }
        h
    }

    // ------------------------------------------------------------------
    // 规则判定
    // ------------------------------------------------------------------

    /// 沿 (dr, dc) 方向数与落点相连的同色子（不含落点本身）
    #[inline]
    fn count_run(&self, pt: Point, dr: i8, dc: i8, player: Player) -> u8 {
        let mut count = 0;
        let mut cur = pt.offset(dr, dc);
        while cur.is_valid() && self.cells[cur.to_index()] == Some(player) {
            count += 1;
            cur = cur.offset(dr, dc);
        }
        count
    }

    /// 判断在 `pt` 落 `player` 的子是否构成恰好五连
    ///
    /// 落点本身按 `player` 计，不要求盘上已有子。某一方向上超过
    /// 五连（长连）不构成胜利，但不妨碍其他方向上的五连成立。
    pub fn check_win(&self, pt: Point, player: Player) -> bool {
        for (dr, dc) in DIRECTIONS {
            let count =
                1 + self.count_run(pt, dr, dc, player) + self.count_run(pt, -dr, -dc, player);
            if count == 5 {
                return true;
            }
        }
        false
    }

    /// 分析在 `pt` 落 `player` 的子后四个方向形成的连子模式
    ///
    /// 落点本身按 `player` 计。端点为界外或异色子视为受阻；
    /// 长连（>5）不计入任何模式。
    pub fn analyze_position(&self, pt: Point, player: Player) -> PatternCounts {
        let mut patterns = PatternCounts::default();

        for (dr, dc) in DIRECTIONS {
            let mut left = 0u8;
            let mut cur = pt.offset(-dr, -dc);
            while cur.is_valid() && self.cells[cur.to_index()] == Some(player) {
                left += 1;
                cur = cur.offset(-dr, -dc);
            }
            let left_blocked = !self.is_empty_cell(cur);

            let mut right = 0u8;
            let mut cur = pt.offset(dr, dc);
            while cur.is_valid() && self.cells[cur.to_index()] == Some(player) {
                right += 1;
                cur = cur.offset(dr, dc);
            }
            let right_blocked = !self.is_empty_cell(cur);

            let count = left + right + 1;
            let open = !left_blocked && !right_blocked;

            match count {
                5 => patterns.five += 1,
                4 if open => patterns.open_four += 1,
                4 => patterns.four += 1,
                3 if open => patterns.open_three += 1,
                3 => patterns.three += 1,
                2 if open => patterns.open_two += 1,
                2 => patterns.two += 1,
                _ => {}
            }
        }

        patterns
    }

    /// 全盘扫描找胜方（模拟对局起始状态用；搜索中用 `check_win` 判落点）
    pub fn winner(&self) -> Option<Player> {
        for idx in 0..CELL_COUNT {
            if let Some(player) = self.cells[idx] {
                if self.check_win(Point::from_index(idx), player) {
                    return Some(player);
                }
            }
        }
        None
    }

    /// 当前对局结果
    pub fn game_result(&self) -> GameResult {
        match self.winner() {
            Some(Player::Black) => GameResult::BlackWin,
            Some(Player::White) => GameResult::WhiteWin,
            None if self.is_full() => GameResult::Draw,
            None => GameResult::Ongoing,
        }
    }

    // ------------------------------------------------------------------
    // 候选着法生成
    // ------------------------------------------------------------------

    /// `pt` 的切比雪夫距离 `range` 邻域内是否有子
    fn has_neighbor(&self, pt: Point, range: i8) -> bool {
        for dr in -range..=range {
            for dc in -range..=range {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let cur = pt.offset(dr, dc);
                if cur.is_valid() && self.cells[cur.to_index()].is_some() {
                    return true;
                }
            }
        }
        false
    }

    /// 生成候选着法
    ///
    /// 空棋盘只返回天元；否则返回所有距已有棋子 2 格以内的空点，
    /// 把分支因子从整盘压缩到局部边界。只要存在合法着法结果非空。
    pub fn valid_moves(&self) -> Vec<Point> {
        if self.stones == 0 {
            let center = BOARD_SIZE / 2;
            return vec![Point::new(center, center)];
        }

        let mut moves = Vec::new();
        for idx in 0..CELL_COUNT {
            if self.cells[idx].is_none() {
                let pt = Point::from_index(idx);
                if self.has_neighbor(pt, 2) {
                    moves.push(pt);
                }
            }
        }
        moves
    }

    // ------------------------------------------------------------------
    // 棋盘记谱（CLI/server 输入输出）
    // ------------------------------------------------------------------

    /// 从记谱字符串创建棋盘
    ///
    /// 格式：`<棋盘> <行棋方>`。棋盘从第 19 行到第 1 行以 `/` 分隔，
    /// `x` 为黑子、`o` 为白子、数字为连续空点数；行棋方为 `x` 或 `o`。
    pub fn from_notation(s: &str) -> Result<Board, String> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid board format: expected '<board> <turn>', got: {}",
                s
            ));
        }

        let rows: Vec<&str> = parts[0].split('/').collect();
        if rows.len() != BOARD_SIZE as usize {
            return Err(format!(
                "Invalid board: expected {} rows, got {}",
                BOARD_SIZE,
                rows.len()
            ));
        }

        let mut board = Board::new();

        for (row_idx, row_str) in rows.iter().enumerate() {
            // 记谱从上往下是 row 18 到 row 0
            let row = BOARD_SIZE - 1 - row_idx as i8;
            let mut col: i32 = 0;
            let mut run: i32 = 0;

            for ch in row_str.chars() {
                if let Some(d) = ch.to_digit(10) {
                    run = run * 10 + d as i32;
                    if run > BOARD_SIZE as i32 {
                        return Err(format!("Row {} overflows the board", row + 1));
                    }
                    continue;
                }
                col += run;
                run = 0;
                match Player::from_char(ch) {
                    Some(player) => {
                        let pt = Point::new(row, col as i8);
                        if col >= BOARD_SIZE as i32 {
                            return Err(format!("Row {} overflows the board", row + 1));
                        }
                        board.put(pt, player);
                        col += 1;
                    }
                    None => return Err(format!("Invalid board char: {}", ch)),
                }
            }
            col += run;
            if col != BOARD_SIZE as i32 {
                return Err(format!(
                    "Row {} has {} cells, expected {}",
                    row + 1,
                    col,
                    BOARD_SIZE
                ));
            }
        }

        let turn = Player::from_char(parts[1].chars().next().unwrap_or('x'))
            .ok_or_else(|| format!("Invalid turn: {}", parts[1]))?;
        board.set_to_move(turn);

        Ok(board)
    }

    /// 转换为记谱字符串
    pub fn to_notation(&self) -> String {
        let mut rows = Vec::with_capacity(BOARD_SIZE as usize);
        for row in (0..BOARD_SIZE).rev() {
            let mut row_str = String::new();
            let mut run = 0;
            for col in 0..BOARD_SIZE {
                match self.cells[Point::new(row, col).to_index()] {
                    Some(player) => {
                        if run > 0 {
                            row_str.push_str(&run.to_string());
                            run = 0;
                        }
                        row_str.push(player.to_char());
                    }
                    None => run += 1,
                }
            }
            if run > 0 {
                row_str.push_str(&run.to_string());
            }
            rows.push(row_str);
        }
        format!("{} {}", rows.join("/"), self.to_move.to_char())
    }
}

/// 临时落子守卫
///
/// `Drop` 时提子并回退哈希，保证搜索的任何退出路径都恢复棋盘原状。
pub struct PlacedStone<'a> {
    board: &'a mut Board,
    point: Point,
}

impl PlacedStone<'_> {
    /// 守卫对应的落点
    pub fn point(&self) -> Point {
        self.point
    }
}

impl Deref for PlacedStone<'_> {
    type Target = Board;

    fn deref(&self) -> &Board {
        self.board
    }
}

impl DerefMut for PlacedStone<'_> {
    fn deref_mut(&mut self) -> &mut Board {
        self.board
    }
}

impl Drop for PlacedStone<'_> {
    fn drop(&mut self) {
        self.board.take(self.point);
    }
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
    fn test_empty_board_center_move() {
        let board = Board::new();
        assert_eq!(board.valid_moves(), vec![Point::new(9, 9)]);
    }

    #[test]
    fn test_valid_moves_frontier() {
        let board = board_with(&[(9, 9, Player::Black)]);
        let moves = board.valid_moves();
        // 半径 2 的邻域共 24 个空点
        assert_eq!(moves.len(), 24);
        assert!(!moves.contains(&Point::new(9, 9)));
        assert!(moves.contains(&Point::new(7, 7)));
        assert!(!moves.contains(&Point::new(6, 9)));
    }

    #[test]
    fn test_valid_moves_never_occupied() {
        let board = board_with(&[
            (9, 9, Player::Black),
            (9, 10, Player::White),
            (10, 9, Player::Black),
        ]);
        for mv in board.valid_moves() {
            assert!(board.get(mv).is_none());
        }
    }

    #[test]
    fn test_check_win_exactly_five() {
        // 黑在第 10 行已有 e10 f10 g10 h10，i10 成五
        let board = board_with(&[
            (9, 4, Player::Black),
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
        ]);
        assert!(board.check_win(Point::new(9, 8), Player::Black));
        assert!(!board.check_win(Point::new(9, 8), Player::White));
        assert!(!board.check_win(Point::new(9, 9), Player::Black));
    }

    #[test]
    fn test_check_win_overline_is_not_a_win() {
        // d10..h10 五子在盘，i10 落子形成六连
        let board = board_with(&[
            (9, 3, Player::Black),
            (9, 4, Player::Black),
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
        ]);
        assert!(!board.check_win(Point::new(9, 8), Player::Black));
    }

    #[test]
    fn test_check_win_five_beside_overline() {
        // 横向落子会成六连，纵向恰好成五：纵向五连仍然获胜
        let board = board_with(&[
            (9, 3, Player::Black),
            (9, 4, Player::Black),
            (9, 5, Player::Black),
            (9, 7, Player::Black),
            (9, 8, Player::Black),
            (5, 6, Player::Black),
            (6, 6, Player::Black),
            (7, 6, Player::Black),
            (8, 6, Player::Black),
        ]);
        assert!(board.check_win(Point::new(9, 6), Player::Black));
    }

    #[test]
    fn test_check_win_matches_five_count() {
        let board = board_with(&[
            (9, 4, Player::Black),
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
            (5, 5, Player::White),
            (6, 6, Player::White),
        ]);
        for idx in 0..CELL_COUNT {
            let pt = Point::from_index(idx);
            for player in [Player::Black, Player::White] {
                assert_eq!(
                    board.check_win(pt, player),
                    board.analyze_position(pt, player).five >= 1,
                    "mismatch at {} for {}",
                    pt,
                    player
                );
            }
        }
    }

    #[test]
    fn test_analyze_open_four() {
        // f10..i10 四连，两端 e10/j10 均空
        let board = board_with(&[
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
        ]);
        let patterns = board.analyze_position(Point::new(9, 8), Player::Black);
        assert_eq!(patterns.open_four, 1);
        assert_eq!(patterns.four, 0);
    }

    #[test]
    fn test_analyze_blocked_four() {
        let board = board_with(&[
            (9, 5, Player::Black),
            (9, 6, Player::Black),
            (9, 7, Player::Black),
            (9, 4, Player::White),
        ]);
        let patterns = board.analyze_position(Point::new(9, 8), Player::Black);
        assert_eq!(patterns.open_four, 0);
        assert_eq!(patterns.four, 1);
    }

    #[test]
    fn test_analyze_edge_blocked() {
        // 贴边的二连：a1 一端在界外
        let board = board_with(&[(0, 1, Player::White)]);
        let patterns = board.analyze_position(Point::new(0, 0), Player::White);
        assert_eq!(patterns.two, 1);
        assert_eq!(patterns.open_two, 0);
    }

    #[test]
    fn test_hash_round_trip_on_guard_drop() {
        let mut board = board_with(&[(9, 9, Player::Black), (9, 10, Player::White)]);
        let before = board.hash();
        {
            let mut placed = board.place(Point::new(10, 10), Player::Black);
            assert_ne!(placed.hash(), before);
            // 嵌套落子同样回退
            let inner = placed.place(Point::new(11, 11), Player::White);
            drop(inner);
        }
        assert_eq!(board.hash(), before);
        assert_eq!(board.get(Point::new(10, 10)), None);
    }

    #[test]
    fn test_incremental_hash_matches_recompute() {
        let mut board = Board::new();
        board.put(Point::new(3, 3), Player::Black);
        board.put(Point::new(15, 15), Player::White);
        board.put(Point::new(9, 9), Player::Black);
        assert_eq!(board.hash(), board.compute_hash());
        board.take(Point::new(15, 15));
        assert_eq!(board.hash(), board.compute_hash());
    }

    #[test]
    fn test_notation_round_trip() {
        let mut board = board_with(&[
            (9, 9, Player::Black),
            (9, 10, Player::White),
            (0, 0, Player::Black),
            (18, 18, Player::White),
        ]);
        board.set_to_move(Player::White);
        let text = board.to_notation();
        let parsed = Board::from_notation(&text).unwrap();
        assert_eq!(parsed.to_notation(), text);
        assert_eq!(parsed.hash(), board.hash());
        assert_eq!(parsed.to_move(), Player::White);
    }

    #[test]
    fn test_notation_empty_board() {
        let board = Board::new();
        let text = board.to_notation();
        assert_eq!(text.split(' ').next().unwrap(), vec!["19"; 19].join("/"));
        assert!(Board::from_notation(&text).is_ok());
    }

    #[test]
    fn test_notation_rejects_garbage() {
        assert!(Board::from_notation("19/19 x").is_err());
        assert!(Board::from_notation(&format!("{} z", vec!["19"; 19].join("/"))).is_err());
        assert!(Board::from_notation(&format!("{} x", vec!["18x"; 19].join("/"))).is_ok());
        assert!(Board::from_notation(&format!("{} x", vec!["20"; 19].join("/"))).is_err());
    }

    #[test]
    fn test_winner_scan() {
        let board = board_with(&[
            (9, 4, Player::White),
            (9, 5, Player::White),
            (9, 6, Player::White),
            (9, 7, Player::White),
            (9, 8, Player::White),
        ]);
        assert_eq!(board.winner(), Some(Player::White));
        assert_eq!(board.game_result(), GameResult::WhiteWin);
        assert_eq!(Board::new().game_result(), GameResult::Ongoing);
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

pub const GRID_WIDTH: usize = 10;
pub const GRID_HEIGHT: usize = 20;

// Timing (in milliseconds)
/// Gravity interval per level, indexed directly by level with no interpolation.
pub const FALL_INTERVALS_MS: [u64; 20] = [
    500, 490, 480, 430, 380, 330, 280, 230, 180, 180, 170, 150, 140, 130, 120, 110, 100, 90, 80,
    70,
];
pub const LINES_PER_LEVEL: u32 = 10;
pub const MAX_LEVEL: u32 = 19;
pub const HIGHLIGHT_DURATION_MS: u64 = 100;

// Scoring
/// Points for 1..=4 rows cleared by a single lock, before the level multiplier.
pub const CLEAR_SCORES: [u32; 4] = [40, 100, 300, 1200];
pub const SOFT_DROP_SCORE: u32 = 1; // per row, manual descent only
pub const HARD_DROP_SCORE: u32 = 2; // per row

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PieceKind {
    T,
    O,
    J,
    L,
    I,
    Z,
    S,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::T,
        PieceKind::O,
        PieceKind::J,
        PieceKind::L,
        PieceKind::I,
        PieceKind::Z,
        PieceKind::S,
    ];

    /// Initial pivot and the 4 cell offsets, before the spawn column shift.
    /// O and I pivot on a half-integer point so rotation keeps their footprint.
    fn layout(self) -> ((f32, f32), [(i32, i32); 4]) {
        match self {
            PieceKind::T => ((1.0, 1.0), [(0, 1), (1, 1), (2, 1), (1, 0)]),
            PieceKind::O => ((1.5, 0.5), [(1, 0), (2, 0), (2, 1), (1, 1)]),
            PieceKind::J => ((1.0, 1.0), [(0, 0), (0, 1), (1, 1), (2, 1)]),
            PieceKind::L => ((1.0, 1.0), [(0, 1), (1, 1), (2, 1), (2, 0)]),
            PieceKind::I => ((1.5, 0.5), [(0, 0), (1, 0), (2, 0), (3, 0)]),
            PieceKind::Z => ((1.0, 1.0), [(0, 0), (1, 0), (1, 1), (2, 1)]),
            PieceKind::S => ((1.0, 1.0), [(0, 1), (1, 1), (1, 0), (2, 0)]),
        }
    }

    /// Builds the piece at its spawn position near the top center of a grid.
    pub fn spawn(self, grid_width: usize) -> ActivePiece {
        let offset = (grid_width as i32 / 2) - 2;
        let ((px, py), cells) = self.layout();
        let squares = cells.map(|(x, y)| Square {
            x: x + offset,
            y,
            kind: self,
        });
        ActivePiece {
            pivot: (px + offset as f32, py),
            squares,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Square {
    pub x: i32,
    pub y: i32,
    pub kind: PieceKind,
}

/// A grid cell: empty, or the kind tag of the piece that locked there.
pub type Cell = Option<PieceKind>;

// ============================================================================
// Grid
// ============================================================================

pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    /// Dimensions are fixed for the lifetime of the grid.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Self {
            width,
            height,
            cells: vec![vec![None; width]; height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.cells
    }

    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.cells[y][x]
    }

    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[y][x] = cell;
    }

    /// False when (x, y) is outside the grid or already occupied.
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= self.width as i32 || y < 0 || y >= self.height as i32 {
            return false;
        }
        self.cells[y as usize][x as usize].is_none()
    }

    /// Writes the squares of a locking piece into the grid.
    /// Callers have already validated the positions.
    pub fn commit(&mut self, squares: &[Square; 4]) {
        for square in squares {
            debug_assert!(self.is_free(square.x, square.y));
            self.cells[square.y as usize][square.x as usize] = Some(square.kind);
        }
    }

    /// Removes every full row, letting the rows above it fall by one.
    /// Returns the cleared row indices in ascending order.
    pub fn clear_full_rows(&mut self) -> Vec<usize> {
        let mut cleared = Vec::new();
        for row in 0..self.height {
            if self.cells[row].iter().all(Option::is_some) {
                self.cells.remove(row);
                self.cells.insert(0, vec![None; self.width]);
                cleared.push(row);
            }
        }
        cleared
    }
}

// ============================================================================
// Active Piece
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MoveOutcome {
    pub moved_x: bool,
    pub moved_y: bool,
    /// A downward delta was requested and refused: the lock trigger.
    pub blocked_below: bool,
}

#[derive(Clone, Debug)]
pub struct ActivePiece {
    pub pivot: (f32, f32),
    pub squares: [Square; 4],
}

impl ActivePiece {
    pub fn kind(&self) -> PieceKind {
        self.squares[0].kind
    }

    /// Unchecked shift of squares and pivot.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for square in &mut self.squares {
            square.x += dx;
            square.y += dy;
        }
        self.pivot.0 += dx as f32;
        self.pivot.1 += dy as f32;
    }

    /// Validates each axis against the pre-move position and commits them
    /// independently, so a diagonal intent can apply on one axis only.
    pub fn try_move(&mut self, grid: &Grid, dx: i32, dy: i32) -> MoveOutcome {
        let valid_x = self.squares.iter().all(|s| grid.is_free(s.x + dx, s.y));
        let valid_y = self.squares.iter().all(|s| grid.is_free(s.x, s.y + dy));

        if valid_x && dx != 0 {
            for square in &mut self.squares {
                square.x += dx;
            }
            self.pivot.0 += dx as f32;
        }
        if valid_y && dy != 0 {
            for square in &mut self.squares {
                square.y += dy;
            }
            self.pivot.1 += dy as f32;
        }

        MoveOutcome {
            moved_x: valid_x && dx != 0,
            moved_y: valid_y && dy != 0,
            blocked_below: dy > 0 && !valid_y,
        }
    }

    /// Rotates 90° clockwise about the pivot with a boundary-only kick:
    /// candidates are pushed back inside the left, right and top edges, then
    /// the whole rotation is rejected if any corrected cell is not free.
    /// There is no downward correction; a candidate past the bottom edge
    /// fails the occupancy check instead.
    pub fn rotate(&mut self, grid: &Grid) -> bool {
        let (px, py) = self.pivot;
        let mut candidates = [(0i32, 0i32); 4];
        for (i, square) in self.squares.iter().enumerate() {
            let nx = (-(square.y as f32 - py) + px) as i32;
            let ny = ((square.x as f32 - px) + py) as i32;
            candidates[i] = (nx, ny);
        }

        let mut push_x = 0i32;
        let mut push_y = 0i32;
        while candidates.iter().any(|&(x, _)| x + push_x < 0) {
            push_x += 1;
        }
        while candidates
            .iter()
            .any(|&(x, _)| x + push_x > grid.width() as i32 - 1)
        {
            push_x -= 1;
        }
        while candidates.iter().any(|&(_, y)| y + push_y < 0) {
            push_y += 1;
        }

        if candidates
            .iter()
            .any(|&(x, y)| !grid.is_free(x + push_x, y + push_y))
        {
            return false;
        }

        for (square, &(x, y)) in self.squares.iter_mut().zip(&candidates) {
            square.x = x + push_x;
            square.y = y + push_y;
        }
        self.pivot = (px + push_x as f32, py + push_y as f32);
        true
    }

    /// Smallest downward offset at which the piece no longer fits.
    /// At least 1 for a piece standing on a valid position.
    pub fn drop_distance(&self, grid: &Grid) -> i32 {
        let mut distance = 0;
        while self
            .squares
            .iter()
            .all(|s| grid.is_free(s.x, s.y + distance))
        {
            distance += 1;
        }
        distance
    }
}

// ============================================================================
// Piece Supply
// ============================================================================

pub trait PieceSource {
    fn draw(&mut self) -> PieceKind;
}

/// Draw-without-replacement supply: a pool of the 7 kinds that shrinks with
/// every draw and refills when exhausted, so each run of 7 draws between
/// refills is a permutation of all kinds.
pub struct BagRandomizer {
    pool: Vec<PieceKind>,
    rng: StdRng,
}

impl BagRandomizer {
    pub fn new() -> Self {
        Self {
            pool: PieceKind::ALL.to_vec(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            pool: PieceKind::ALL.to_vec(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }
}

impl Default for BagRandomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceSource for BagRandomizer {
    fn draw(&mut self) -> PieceKind {
        if self.pool.is_empty() {
            self.pool = PieceKind::ALL.to_vec();
        }
        debug_assert!(!self.pool.is_empty());
        let index = self.rng.gen_range(0..self.pool.len());
        self.pool.swap_remove(index)
    }
}

/// Cycles through a fixed list of kinds. Used by tests that need to know
/// exactly which pieces come up.
pub struct SequencePieceSource {
    kinds: Vec<PieceKind>,
    index: usize,
}

impl SequencePieceSource {
    pub fn new(kinds: Vec<PieceKind>) -> Self {
        Self { kinds, index: 0 }
    }
}

impl PieceSource for SequencePieceSource {
    fn draw(&mut self) -> PieceKind {
        let kind = self.kinds[self.index % self.kinds.len()];
        self.index += 1;
        kind
    }
}

// ============================================================================
// Game
// ============================================================================

/// Player intent for one tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TickInput {
    /// -1, 0 or 1.
    pub move_x: i32,
    /// 0 or 1; 1 is a manual soft drop.
    pub move_y: i32,
    pub rotate: bool,
    pub hard_drop: bool,
}

/// A row cleared recently enough to still be flashed by the renderer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RowHighlight {
    pub at_ms: u64,
    pub row: usize,
}

/// Read-only view of one tick's state for the presentation layer.
/// Preview squares are in spawn coordinates; the host offsets them into
/// its side panel.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Vec<Cell>>,
    pub active: [Square; 4],
    pub preview: [Square; 4],
    pub lines: u32,
    pub score: u32,
    pub level: u32,
    pub game_over: bool,
    pub highlights: Vec<RowHighlight>,
}

/// `level = min(lines / 10, 19)`.
pub fn level_for_lines(lines: u32) -> u32 {
    (lines / LINES_PER_LEVEL).min(MAX_LEVEL)
}

pub struct Game {
    pub grid: Grid,
    pub active: ActivePiece,
    /// The one piece held as "next", promoted to active on lock.
    pub preview: ActivePiece,
    pub lines: u32,
    pub level: u32,
    pub score: u32,
    pub game_over: bool,
    source: Box<dyn PieceSource>,
    clock_ms: u64,
    last_fall_ms: u64,
    fall_interval_ms: u64,
    highlights: Vec<RowHighlight>,
}

impl Game {
    pub fn new() -> Self {
        Self::with_source(GRID_WIDTH, GRID_HEIGHT, Box::new(BagRandomizer::new()))
    }

    pub fn with_source(width: usize, height: usize, mut source: Box<dyn PieceSource>) -> Self {
        let grid = Grid::new(width, height);
        // First draw fills the preview slot, second becomes the active piece.
        let preview = source.draw().spawn(width);
        let active = source.draw().spawn(width);
        Self {
            grid,
            active,
            preview,
            lines: 0,
            level: 0,
            score: 0,
            game_over: false,
            source,
            clock_ms: 0,
            last_fall_ms: 0,
            fall_interval_ms: FALL_INTERVALS_MS[0],
            highlights: Vec::new(),
        }
    }

    /// Starts from a prepared grid and active piece; used by tests.
    pub fn with_grid(grid: Grid, active: ActivePiece) -> Self {
        let width = grid.width();
        let mut source: Box<dyn PieceSource> = Box::new(BagRandomizer::new());
        let preview = source.draw().spawn(width);
        Self {
            grid,
            active,
            preview,
            lines: 0,
            level: 0,
            score: 0,
            game_over: false,
            source,
            clock_ms: 0,
            last_fall_ms: 0,
            fall_interval_ms: FALL_INTERVALS_MS[0],
            highlights: Vec::new(),
        }
    }

    pub fn fall_interval(&self) -> u64 {
        self.fall_interval_ms
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn highlights(&self) -> &[RowHighlight] {
        &self.highlights
    }

    /// Advances the state machine by one tick. Fixed order: fall timer,
    /// hard drop, horizontal/vertical move, rotate. Once the game is over
    /// the board no longer mutates but stays queryable.
    pub fn advance(&mut self, input: TickInput, elapsed: Duration) {
        self.clock_ms += elapsed.as_millis() as u64;
        let clock = self.clock_ms;
        self.highlights
            .retain(|h| clock - h.at_ms <= HIGHLIGHT_DURATION_MS);

        if self.game_over {
            return;
        }

        let move_x = input.move_x.clamp(-1, 1);
        let mut move_y = input.move_y.clamp(0, 1);
        let mut manual = true;

        // Gravity: a forced descent replaces the player's and is unscored.
        if self.clock_ms - self.last_fall_ms >= self.fall_interval_ms {
            self.last_fall_ms = self.clock_ms;
            move_y = 1;
            manual = false;
        }

        if input.hard_drop {
            self.hard_drop();
            if self.game_over {
                return;
            }
        }

        // After a hard drop this acts on the freshly spawned piece.
        let outcome = self.active.try_move(&self.grid, move_x, move_y);
        if outcome.moved_y {
            if manual {
                self.score += SOFT_DROP_SCORE * move_y as u32;
            }
            self.last_fall_ms = self.clock_ms;
        }
        if outcome.blocked_below {
            self.lock_active();
            if self.game_over {
                return;
            }
        }

        if input.rotate {
            self.active.rotate(&self.grid);
        }
    }

    /// Descends to one short of the first colliding offset, awards 2 points
    /// per offset, then runs the ordinary lock sequence.
    fn hard_drop(&mut self) {
        let distance = self.active.drop_distance(&self.grid);
        if distance > 0 {
            self.score += HARD_DROP_SCORE * distance as u32;
            self.last_fall_ms = self.clock_ms;
            self.active.translate(0, distance - 1);
        }
        self.lock_active();
    }

    /// Commit, clear, score, respawn. Game over when the piece locked
    /// essentially at spawn height (pivot row <= 1.5).
    fn lock_active(&mut self) {
        let pivot_row = self.active.pivot.1;
        self.grid.commit(&self.active.squares);

        let cleared = self.grid.clear_full_rows();
        let combo = cleared.len() as u32;
        for row in cleared {
            self.highlights.push(RowHighlight {
                at_ms: self.clock_ms,
                row,
            });
        }
        if combo > 0 {
            self.lines += combo;
            // A 4-cell piece cannot complete more than 4 rows at once;
            // clamp rather than index past the table if it ever did.
            let entry = CLEAR_SCORES[(combo.min(4) - 1) as usize];
            self.score += entry * (self.level + 1);
        }
        self.level = level_for_lines(self.lines);
        self.fall_interval_ms = FALL_INTERVALS_MS[self.level as usize];

        let next = self.source.draw().spawn(self.grid.width());
        self.active = std::mem::replace(&mut self.preview, next);

        if pivot_row <= 1.5 {
            self.game_over = true;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            width: self.grid.width(),
            height: self.grid.height(),
            cells: self.grid.rows().to_vec(),
            active: self.active.squares,
            preview: self.preview.squares,
            lines: self.lines,
            score: self.score,
            level: self.level,
            game_over: self.game_over,
            highlights: self.highlights.clone(),
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;

    pub fn empty_grid() -> Grid {
        Grid::new(GRID_WIDTH, GRID_HEIGHT)
    }

    pub fn fill_row(grid: &mut Grid, y: usize) {
        for x in 0..grid.width() {
            grid.set_cell(x, y, Some(PieceKind::T));
        }
    }

    pub fn fill_row_with_gap(grid: &mut Grid, y: usize, gap_x: usize) {
        for x in 0..grid.width() {
            if x != gap_x {
                grid.set_cell(x, y, Some(PieceKind::T));
            }
        }
    }
}

//! Bit-packed arena board.
//!
//! One `u32` per row; bit `x` of row `y + 1` is the cell at column `x`, row `y`.
//! Row 0 and every row past the interior are zero padding, so the row above
//! and below any interior row can always be read without bounds checks.

use std::fmt;

/// Side length of the square arena interior.
pub const ARENA: usize = 25;
/// Column/row index of the arena center.
pub const CENTER: usize = 12;
/// Rows stored per board: padding above, the interior, and padding below
/// wide enough for an 8-row batch starting at the last interior row.
pub const BOARD_ROWS: usize = 34;
/// Mask of the valid column bits.
pub const ROW_MASK: u32 = (1 << ARENA) - 1;
/// Column bits of the 3x3 trigger region.
pub const TRIGGER_COLUMNS: u32 = 0b111 << (CENTER - 1);
/// Interior rows (0-based) covered by the trigger region.
pub const TRIGGER_ROWS: std::ops::RangeInclusive<usize> = (CENTER - 1)..=(CENTER + 1);

/// A 25x25 bit-packed board with zero padding.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(align(32))]
pub struct Bitboard {
    rows: [u32; BOARD_ROWS],
}

impl Default for Bitboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Bitboard {
    /// Empty board.
    pub const fn new() -> Self {
        Self {
            rows: [0; BOARD_ROWS],
        }
    }

    /// Build a board from interior (x, y) coordinates; out-of-range points are dropped.
    pub fn from_cells<I: IntoIterator<Item = (i32, i32)>>(cells: I) -> Self {
        let mut board = Self::new();
        for (x, y) in cells {
            board.set_checked(x, y);
        }
        board
    }

    pub fn clear(&mut self) {
        self.rows = [0; BOARD_ROWS];
    }

    /// Interior row `y` (0-based).
    #[inline]
    pub fn row(&self, y: usize) -> u32 {
        self.rows[y + 1]
    }

    /// Raw padded storage, including the padding rows.
    #[inline]
    pub fn raw(&self) -> &[u32; BOARD_ROWS] {
        &self.rows
    }

    #[inline]
    pub fn raw_mut(&mut self) -> &mut [u32; BOARD_ROWS] {
        &mut self.rows
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < ARENA && y < ARENA && self.rows[y + 1] & (1 << x) != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        debug_assert!(x < ARENA && y < ARENA);
        if alive {
            self.rows[y + 1] |= 1 << x;
        } else {
            self.rows[y + 1] &= !(1 << x);
        }
    }

    /// Set a cell if it lies inside the interior. Returns whether it did.
    #[inline]
    pub fn set_checked(&mut self, x: i32, y: i32) -> bool {
        if (0..ARENA as i32).contains(&x) && (0..ARENA as i32).contains(&y) {
            self.rows[y as usize + 1] |= 1 << x;
            true
        } else {
            false
        }
    }

    /// Whether every interior cell is dead.
    pub fn is_empty(&self) -> bool {
        self.interior().iter().all(|&r| r == 0)
    }

    /// Number of set cells.
    pub fn population(&self) -> u32 {
        self.interior().iter().map(|r| r.count_ones()).sum()
    }

    /// Set cells inside the 3x3 trigger region.
    pub fn trigger_population(&self) -> u32 {
        TRIGGER_ROWS
            .map(|y| (self.row(y) & TRIGGER_COLUMNS).count_ones())
            .sum()
    }

    /// Clear the trigger region.
    pub fn clear_trigger(&mut self) {
        for y in TRIGGER_ROWS {
            self.rows[y + 1] &= !TRIGGER_COLUMNS;
        }
    }

    /// Remove every cell that is set in `mask`.
    #[inline]
    pub fn subtract(&mut self, mask: &Bitboard) {
        for (r, m) in self.rows.iter_mut().zip(mask.rows.iter()) {
            *r &= !m;
        }
    }

    /// Zero the padding rows and any bits outside the column range.
    #[inline]
    pub fn sanitize(&mut self) {
        self.rows[0] = 0;
        for r in &mut self.rows[1..=ARENA] {
            *r &= ROW_MASK;
        }
        for r in &mut self.rows[ARENA + 1..] {
            *r = 0;
        }
    }

    /// Interior rows.
    #[inline]
    pub fn interior(&self) -> &[u32] {
        &self.rows[1..=ARENA]
    }

    /// Iterator over set interior cells as (x, y).
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.interior().iter().enumerate().flat_map(|(y, &row)| {
            let mut bits = row;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let x = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some((x, y))
            })
        })
    }

    /// ASCII rendering with life, wall and center markers.
    pub fn render(&self, walls: Option<&Bitboard>) -> String {
        let mut out = String::with_capacity(ARENA * (ARENA * 2 + 1));
        for y in 0..ARENA {
            for x in 0..ARENA {
                let c = if x == CENTER && y == CENTER {
                    '@'
                } else if self.get(x, y) {
                    'C'
                } else if walls.is_some_and(|w| w.get(x, y)) {
                    '#'
                } else {
                    '.'
                };
                out.push(c);
                if x + 1 < ARENA {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitboard ({} cells)", self.population())?;
        f.write_str(&self.render(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut b = Bitboard::new();
        b.set(0, 0, true);
        b.set(24, 24, true);
        assert!(b.get(0, 0));
        assert!(b.get(24, 24));
        assert!(!b.get(1, 0));
        assert_eq!(b.population(), 2);
        b.set(0, 0, false);
        assert_eq!(b.population(), 1);
    }

    #[test]
    fn test_out_of_range_dropped() {
        let b = Bitboard::from_cells([(-1, 0), (25, 3), (3, 25), (4, 4)]);
        assert_eq!(b.population(), 1);
        assert!(b.get(4, 4));
    }

    #[test]
    fn test_trigger_region() {
        let mut b = Bitboard::from_cells([(11, 11), (13, 13), (10, 12), (12, 14)]);
        assert_eq!(b.trigger_population(), 2);
        b.clear_trigger();
        assert_eq!(b.trigger_population(), 0);
        assert_eq!(b.population(), 2);
    }

    #[test]
    fn test_cells_iterator() {
        let b = Bitboard::from_cells([(3, 1), (0, 0), (24, 1)]);
        let cells: Vec<_> = b.cells().collect();
        assert_eq!(cells, vec![(0, 0), (3, 1), (24, 1)]);
    }

    #[test]
    fn test_render_markers() {
        let life = Bitboard::from_cells([(0, 0)]);
        let walls = Bitboard::from_cells([(1, 0)]);
        let text = life.render(Some(&walls));
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("C # ."));
        assert_eq!(text.lines().nth(CENTER).unwrap().split(' ').nth(CENTER), Some("@"));
        assert_eq!(text.lines().count(), ARENA);
    }

    #[test]
    fn test_sanitize_clears_padding() {
        let mut b = Bitboard::new();
        b.raw_mut()[0] = u32::MAX;
        b.raw_mut()[5] = u32::MAX;
        b.raw_mut()[30] = 1;
        b.sanitize();
        assert_eq!(b.raw()[0], 0);
        assert_eq!(b.raw()[5], ROW_MASK);
        assert_eq!(b.raw()[30], 0);
    }
}

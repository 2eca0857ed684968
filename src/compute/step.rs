//! Generation step for the bit-packed board.
//!
//! `step_parallel` counts the eight neighbours of every cell with carry-save
//! additions over three bit planes (ones, twos, fours-or-more), eight rows at a
//! time, and never materializes a per-cell count. `step_scalar` counts
//! neighbours cell by cell and is the reference the parallel kernel must match
//! bit for bit.

use super::board::{ARENA, BOARD_ROWS, Bitboard, ROW_MASK};

/// Rows processed per batch.
pub const LANES: usize = 8;

type Lanes = [u32; LANES];

#[inline(always)]
fn load(src: &[u32; BOARD_ROWS], at: usize) -> Lanes {
    let mut out = [0u32; LANES];
    out.copy_from_slice(&src[at..at + LANES]);
    out
}

/// Bit-plane counter: `ones`, `twos` and a saturating `fours` flag.
#[derive(Default)]
struct Planes {
    ones: Lanes,
    twos: Lanes,
    fours: Lanes,
}

impl Planes {
    #[inline(always)]
    fn add(&mut self, x: &Lanes) {
        for i in 0..LANES {
            let c0 = self.ones[i] & x[i];
            self.ones[i] ^= x[i];
            let c1 = self.twos[i] & c0;
            self.twos[i] ^= c0;
            self.fours[i] |= c1;
        }
    }
}

#[inline(always)]
fn shifted(rows: &Lanes, left: bool) -> Lanes {
    let mut out = [0u32; LANES];
    for i in 0..LANES {
        out[i] = if left { rows[i] << 1 } else { rows[i] >> 1 };
    }
    out
}

/// Next state of `LANES` consecutive rows given the rows above, at, and below.
#[inline(always)]
fn step_lanes(top: &Lanes, mid: &Lanes, bot: &Lanes) -> Lanes {
    let mut planes = Planes::default();

    planes.add(&shifted(top, true));
    planes.add(top);
    planes.add(&shifted(top, false));
    planes.add(&shifted(mid, true));
    planes.add(&shifted(mid, false));
    planes.add(&shifted(bot, true));
    planes.add(bot);
    planes.add(&shifted(bot, false));

    // Exactly two or three neighbours: twos set, fours clear. Three needs the
    // ones bit; two needs the cell to be alive already.
    let mut out = [0u32; LANES];
    for i in 0..LANES {
        out[i] = planes.twos[i] & !planes.fours[i] & (planes.ones[i] | mid[i]) & ROW_MASK;
    }
    out
}

/// Advance `current` one generation into `next` using batched bit-plane arithmetic.
///
/// `current` must have zeroed padding (every board built through `Bitboard`
/// does). `next` is fully overwritten.
pub fn step_parallel(current: &Bitboard, next: &mut Bitboard) {
    let src = current.raw();
    let dst = next.raw_mut();

    let mut start = 1;
    while start <= ARENA {
        let top = load(src, start - 1);
        let mid = load(src, start);
        let bot = load(src, start + 1);
        let out = step_lanes(&top, &mid, &bot);
        dst[start..start + LANES].copy_from_slice(&out);
        start += LANES;
    }

    next.sanitize();
}

/// Advance `current` one generation into `next`, one cell at a time.
pub fn step_scalar(current: &Bitboard, next: &mut Bitboard) {
    next.clear();
    for y in 0..ARENA {
        for x in 0..ARENA {
            let mut neighbours = 0;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx >= 0 && ny >= 0 && current.get(nx as usize, ny as usize) {
                        neighbours += 1;
                    }
                }
            }
            let alive = current.get(x, y);
            if neighbours == 3 || (alive && neighbours == 2) {
                next.set(x, y, true);
            }
        }
    }
}

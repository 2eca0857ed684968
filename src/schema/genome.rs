//! Genome data model: structures ("organs"), symmetry, and adaptive mutation weights.
//!
//! These are plain value types. Random generation, mutation and board
//! rendering live in `compute::evolution::genome`.

use serde::{Deserialize, Serialize};

/// Maximum number of structures a genome can hold.
pub const MAX_STRUCTURES: usize = 15;
/// Maximum number of relative points in one structure.
pub const MAX_POINTS: usize = 10;
/// Relative offsets are clamped to `-JITTER_RADIUS..=JITTER_RADIUS`.
pub const JITTER_RADIUS: i8 = 5;
/// Largest valid anchor coordinate (the arena interior is 25x25).
pub const MAX_ANCHOR: i8 = 24;
/// Weight increment applied when a mutation is accepted.
pub const REWARD_BOOST: f64 = 0.05;

/// A point offset relative to its structure's anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelativePoint {
    pub dx: i8,
    pub dy: i8,
}

/// A cluster of relative points placed at an anchor.
///
/// Obstacle structures render into the wall layer, all others into the life layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "StructureRepr", into = "StructureRepr")]
pub struct Structure {
    /// Anchor column.
    pub x: i8,
    /// Anchor row.
    pub y: i8,
    /// Whether this structure is a wall rather than living cells.
    pub obstacle: bool,
    points: [RelativePoint; MAX_POINTS],
    len: u8,
}

impl PartialEq for Structure {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.obstacle == other.obstacle
            && self.points() == other.points()
    }
}

impl Eq for Structure {}

impl Default for Structure {
    fn default() -> Self {
        Self::new(12, 12, false)
    }
}

impl Structure {
    /// Create an empty structure at an anchor.
    pub fn new(x: i8, y: i8, obstacle: bool) -> Self {
        Self {
            x: x.clamp(0, MAX_ANCHOR),
            y: y.clamp(0, MAX_ANCHOR),
            obstacle,
            points: [RelativePoint::default(); MAX_POINTS],
            len: 0,
        }
    }

    /// Create a structure from a list of offsets (extra points beyond capacity are dropped).
    pub fn with_points(x: i8, y: i8, obstacle: bool, offsets: &[(i8, i8)]) -> Self {
        let mut s = Self::new(x, y, obstacle);
        for &(dx, dy) in offsets {
            s.push_point(dx, dy);
        }
        s
    }

    pub fn points(&self) -> &[RelativePoint] {
        &self.points[..self.len as usize]
    }

    pub fn points_mut(&mut self) -> &mut [RelativePoint] {
        &mut self.points[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len as usize >= MAX_POINTS
    }

    /// Append a point. Returns false (and does nothing) when full.
    pub fn push_point(&mut self, dx: i8, dy: i8) -> bool {
        if self.is_full() {
            return false;
        }
        self.points[self.len as usize] = RelativePoint {
            dx: dx.clamp(-JITTER_RADIUS, JITTER_RADIUS),
            dy: dy.clamp(-JITTER_RADIUS, JITTER_RADIUS),
        };
        self.len += 1;
        true
    }

    /// Remove a point by swapping the last one into its slot.
    pub fn swap_remove_point(&mut self, index: usize) -> Option<RelativePoint> {
        if index >= self.len() {
            return None;
        }
        let removed = self.points[index];
        self.len -= 1;
        self.points[index] = self.points[self.len as usize];
        Some(removed)
    }

    /// Integer centroid of the relative points (rounded toward zero).
    pub fn centroid(&self) -> (i8, i8) {
        if self.is_empty() {
            return (0, 0);
        }
        let n = self.len() as i32;
        let (sx, sy) = self
            .points()
            .iter()
            .fold((0i32, 0i32), |(sx, sy), p| (sx + p.dx as i32, sy + p.dy as i32));
        ((sx / n) as i8, (sy / n) as i8)
    }

    /// Reflect the points about the structure's own centroid.
    ///
    /// Returns false and leaves the shape alone when any reflected point would
    /// fall outside `JITTER_RADIUS`.
    pub fn mirror_local(&mut self, flip_x: bool, flip_y: bool) -> bool {
        let (cx, cy) = self.centroid();
        let reflect = |v: i8, c: i8, flip: bool| if flip { 2 * c - v } else { v };
        let fits = self.points().iter().all(|p| {
            reflect(p.dx, cx, flip_x).abs() <= JITTER_RADIUS
                && reflect(p.dy, cy, flip_y).abs() <= JITTER_RADIUS
        });
        if !fits {
            return false;
        }
        for p in self.points_mut() {
            p.dx = reflect(p.dx, cx, flip_x);
            p.dy = reflect(p.dy, cy, flip_y);
        }
        true
    }

    /// Rotate the points a quarter turn about the anchor.
    pub fn rotate_90(&mut self) {
        for p in self.points_mut() {
            let dx = p.dx;
            p.dx = -p.dy;
            p.dy = dx;
        }
    }

    /// Reflect the anchor through the arena center.
    pub fn mirror_anchor(&mut self) {
        self.x = MAX_ANCHOR - self.x;
        self.y = MAX_ANCHOR - self.y;
    }

    /// Move the anchor, clamped to the arena.
    pub fn translate(&mut self, dx: i8, dy: i8) {
        self.x = (self.x + dx).clamp(0, MAX_ANCHOR);
        self.y = (self.y + dy).clamp(0, MAX_ANCHOR);
    }

    /// Absolute (x, y) coordinates of every point, possibly outside the arena.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.points()
            .iter()
            .map(|p| (self.x as i32 + p.dx as i32, self.y as i32 + p.dy as i32))
    }
}

#[derive(Serialize, Deserialize)]
struct StructureRepr {
    x: i8,
    y: i8,
    #[serde(default)]
    obstacle: bool,
    points: Vec<RelativePoint>,
}

impl From<Structure> for StructureRepr {
    fn from(s: Structure) -> Self {
        Self {
            x: s.x,
            y: s.y,
            obstacle: s.obstacle,
            points: s.points().to_vec(),
        }
    }
}

impl TryFrom<StructureRepr> for Structure {
    type Error = GenomeError;

    fn try_from(repr: StructureRepr) -> Result<Self, Self::Error> {
        if repr.points.len() > MAX_POINTS {
            return Err(GenomeError::TooManyPoints(repr.points.len()));
        }
        let mut s = Structure::new(repr.x, repr.y, repr.obstacle);
        for p in repr.points {
            s.push_point(p.dx, p.dy);
        }
        Ok(s)
    }
}

/// Structural edit types a genome can select from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Translate every structure by the same +-1 step.
    ShiftPattern,
    /// Translate one structure.
    ShiftStructure,
    /// Move one point within the jitter radius.
    JitterPoint,
    /// Reflect one structure's anchor through the arena center.
    MirrorBoard,
    /// Reflect or rotate one structure about its own centroid.
    MirrorLocal,
    /// Add or remove a point (or a whole structure at the limits).
    ResizeStructure,
    /// Toggle global 180-degree symmetry.
    ToggleSymmetry,
    /// Remove an obstacle structure.
    RemoveObstacle,
    /// Place an obstacle next to the best-known life footprint.
    AddObstacle,
}

impl MutationKind {
    pub const COUNT: usize = 9;

    pub const ALL: [MutationKind; Self::COUNT] = [
        MutationKind::ShiftPattern,
        MutationKind::ShiftStructure,
        MutationKind::JitterPoint,
        MutationKind::MirrorBoard,
        MutationKind::MirrorLocal,
        MutationKind::ResizeStructure,
        MutationKind::ToggleSymmetry,
        MutationKind::RemoveObstacle,
        MutationKind::AddObstacle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-genome multinomial distribution over mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct MutationWeights([f64; MutationKind::COUNT]);

impl Default for MutationWeights {
    fn default() -> Self {
        let mut w = [1.0 / MutationKind::COUNT as f64; MutationKind::COUNT];
        // Guided wall placement pays off far more often than the other edits.
        w[MutationKind::AddObstacle.index()] = 0.4;
        let mut weights = Self(w);
        weights.normalize();
        weights
    }
}

impl MutationWeights {
    /// Uniform distribution.
    pub fn uniform() -> Self {
        Self([1.0 / MutationKind::COUNT as f64; MutationKind::COUNT])
    }

    pub fn get(&self, kind: MutationKind) -> f64 {
        self.0[kind.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Inverse-CDF selection for `r` drawn uniformly from `[0, 1)`.
    pub fn select(&self, r: f64) -> MutationKind {
        let mut cumulative = 0.0;
        for (kind, &w) in MutationKind::ALL.iter().zip(self.0.iter()) {
            cumulative += w;
            if r < cumulative {
                return *kind;
            }
        }
        // Rounding can leave the cumulative sum just below 1.
        MutationKind::ALL
            .iter()
            .rev()
            .zip(self.0.iter().rev())
            .find(|&(_, &w)| w > 0.0)
            .map(|(kind, _)| *kind)
            .unwrap_or(MutationKind::AddObstacle)
    }

    /// Increase one kind's weight by `boost` and renormalize.
    pub fn reward(&mut self, kind: MutationKind, boost: f64) {
        self.0[kind.index()] += boost.max(0.0);
        self.normalize();
    }

    /// Average with another distribution and renormalize.
    pub fn blend(&mut self, other: &MutationWeights) {
        for (w, o) in self.0.iter_mut().zip(other.0.iter()) {
            *w = (*w + o) / 2.0;
        }
        self.normalize();
    }

    /// Rescale so the entries sum to 1. Falls back to uniform on a degenerate vector.
    pub fn normalize(&mut self) {
        for w in self.0.iter_mut() {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
            }
        }
        let sum: f64 = self.0.iter().sum();
        if sum <= f64::EPSILON {
            *self = Self::uniform();
            return;
        }
        for w in self.0.iter_mut() {
            *w /= sum;
        }
    }
}

impl From<MutationWeights> for Vec<f64> {
    fn from(w: MutationWeights) -> Self {
        w.0.to_vec()
    }
}

impl TryFrom<Vec<f64>> for MutationWeights {
    type Error = GenomeError;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        let arr: [f64; MutationKind::COUNT] = v
            .try_into()
            .map_err(|v: Vec<f64>| GenomeError::WeightCount(v.len()))?;
        let mut weights = Self(arr);
        let sum: f64 = arr.iter().sum();
        if arr.iter().any(|w| !w.is_finite() || *w < 0.0) || (sum - 1.0).abs() > 1e-9 {
            weights.normalize();
        }
        Ok(weights)
    }
}

/// A seed pattern description: structures, symmetry and mutation preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GenomeRepr", into = "GenomeRepr")]
pub struct Genome {
    structures: [Structure; MAX_STRUCTURES],
    count: u8,
    /// Mirror every point through the arena center when rendering.
    pub symmetric: bool,
    /// Adaptive operator-selection distribution.
    pub weights: MutationWeights,
    /// Mutation applied most recently, rewarded on acceptance.
    pub last_mutation: Option<MutationKind>,
}

impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        self.structures() == other.structures()
            && self.symmetric == other.symmetric
            && self.weights == other.weights
            && self.last_mutation == other.last_mutation
    }
}

impl Default for Genome {
    fn default() -> Self {
        Self {
            structures: [Structure::default(); MAX_STRUCTURES],
            count: 0,
            symmetric: true,
            weights: MutationWeights::default(),
            last_mutation: None,
        }
    }
}

impl Genome {
    /// Empty symmetric genome with default weights.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures[..self.count as usize]
    }

    pub fn structures_mut(&mut self) -> &mut [Structure] {
        &mut self.structures[..self.count as usize]
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count as usize >= MAX_STRUCTURES
    }

    /// Append a structure. Returns false (and does nothing) when full.
    pub fn push_structure(&mut self, structure: Structure) -> bool {
        if self.is_full() {
            return false;
        }
        self.structures[self.count as usize] = structure;
        self.count += 1;
        true
    }

    /// Remove a structure by swapping the last one into its slot.
    pub fn swap_remove_structure(&mut self, index: usize) -> Option<Structure> {
        if index >= self.len() {
            return None;
        }
        let removed = self.structures[index];
        self.count -= 1;
        self.structures[index] = self.structures[self.count as usize];
        Some(removed)
    }

    /// Replace every structure with those of `other`.
    pub fn copy_structures_from(&mut self, other: &Genome) {
        self.structures = other.structures;
        self.count = other.count;
    }

    pub fn life_count(&self) -> usize {
        self.structures().iter().filter(|s| !s.obstacle).count()
    }

    pub fn obstacle_count(&self) -> usize {
        self.structures().iter().filter(|s| s.obstacle).count()
    }

    /// Whether at least one life structure exists.
    pub fn has_life(&self) -> bool {
        self.structures().iter().any(|s| !s.obstacle)
    }

    /// Reinforce the most recently applied mutation kind.
    pub fn reward_last_mutation(&mut self) {
        if let Some(kind) = self.last_mutation {
            self.weights.reward(kind, REWARD_BOOST);
        }
    }

    /// Short label for reports.
    pub fn symmetry_label(&self) -> &'static str {
        if self.symmetric { "HR180" } else { "ASYM" }
    }
}

#[derive(Serialize, Deserialize)]
struct GenomeRepr {
    structures: Vec<Structure>,
    #[serde(default = "default_symmetric")]
    symmetric: bool,
    #[serde(default)]
    weights: MutationWeights,
    #[serde(default)]
    last_mutation: Option<MutationKind>,
}

fn default_symmetric() -> bool {
    true
}

impl From<Genome> for GenomeRepr {
    fn from(g: Genome) -> Self {
        Self {
            structures: g.structures().to_vec(),
            symmetric: g.symmetric,
            weights: g.weights,
            last_mutation: g.last_mutation,
        }
    }
}

impl TryFrom<GenomeRepr> for Genome {
    type Error = GenomeError;

    fn try_from(repr: GenomeRepr) -> Result<Self, Self::Error> {
        if repr.structures.len() > MAX_STRUCTURES {
            return Err(GenomeError::TooManyStructures(repr.structures.len()));
        }
        let mut genome = Genome {
            symmetric: repr.symmetric,
            weights: repr.weights,
            last_mutation: repr.last_mutation,
            ..Genome::default()
        };
        for s in repr.structures {
            genome.push_structure(s);
        }
        Ok(genome)
    }
}

/// Errors raised when decoding serialized genomes.
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    #[error("structure has {0} points, at most {MAX_POINTS} allowed")]
    TooManyPoints(usize),
    #[error("genome has {0} structures, at most {MAX_STRUCTURES} allowed")]
    TooManyStructures(usize),
    #[error("expected {n} mutation weights, got {0}", n = MutationKind::COUNT)]
    WeightCount(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(w: &MutationWeights) -> f64 {
        w.as_slice().iter().sum()
    }

    #[test]
    fn test_default_weights_normalized() {
        let w = MutationWeights::default();
        assert!((sum(&w) - 1.0).abs() < 1e-12);
        assert!(w.get(MutationKind::AddObstacle) > w.get(MutationKind::JitterPoint));
    }

    #[test]
    fn test_select_inverse_cdf() {
        let w = MutationWeights::uniform();
        assert_eq!(w.select(0.0), MutationKind::ShiftPattern);
        assert_eq!(w.select(0.9999), MutationKind::AddObstacle);
        assert_eq!(w.select(1.0), MutationKind::AddObstacle);
        let step = 1.0 / MutationKind::COUNT as f64;
        assert_eq!(w.select(step * 2.5), MutationKind::JitterPoint);
    }

    #[test]
    fn test_reward_keeps_distribution() {
        let mut w = MutationWeights::uniform();
        let before = w.get(MutationKind::MirrorLocal);
        for _ in 0..100 {
            w.reward(MutationKind::MirrorLocal, REWARD_BOOST);
            assert!((sum(&w) - 1.0).abs() < 1e-9);
            assert!(w.as_slice().iter().all(|&x| x >= 0.0));
        }
        assert!(w.get(MutationKind::MirrorLocal) > before);
    }

    #[test]
    fn test_blend_averages() {
        let mut a = MutationWeights::uniform();
        let mut b = MutationWeights::uniform();
        b.reward(MutationKind::ToggleSymmetry, 1.0);
        a.blend(&b);
        assert!((sum(&a) - 1.0).abs() < 1e-12);
        let expected = (MutationWeights::uniform().get(MutationKind::ToggleSymmetry)
            + b.get(MutationKind::ToggleSymmetry))
            / 2.0;
        assert!((a.get(MutationKind::ToggleSymmetry) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_structure_capacity_noop() {
        let mut s = Structure::new(3, 3, false);
        for i in 0..MAX_POINTS {
            assert!(s.push_point(i as i8 % 3, 0));
        }
        assert!(!s.push_point(1, 1));
        assert_eq!(s.len(), MAX_POINTS);
    }

    #[test]
    fn test_offsets_clamped() {
        let s = Structure::with_points(0, 0, false, &[(20, -20)]);
        assert_eq!(s.points()[0], RelativePoint { dx: 5, dy: -5 });
    }

    #[test]
    fn test_mirror_local_about_centroid() {
        let mut s = Structure::with_points(10, 10, false, &[(0, 0), (2, 0)]);
        s.mirror_local(true, false);
        let mut xs: Vec<i8> = s.points().iter().map(|p| p.dx).collect();
        xs.sort();
        assert_eq!(xs, vec![0, 2]);
    }

    #[test]
    fn test_rotate_four_times_identity() {
        let start = Structure::with_points(5, 5, false, &[(1, 2), (-3, 0), (0, 4)]);
        let mut s = start;
        for _ in 0..4 {
            s.rotate_90();
        }
        assert_eq!(s, start);
    }

    #[test]
    fn test_genome_capacity_and_remove() {
        let mut g = Genome::new();
        for i in 0..MAX_STRUCTURES {
            assert!(g.push_structure(Structure::new(i as i8, 0, i % 2 == 0)));
        }
        assert!(!g.push_structure(Structure::default()));
        g.swap_remove_structure(0);
        assert_eq!(g.len(), MAX_STRUCTURES - 1);
        assert_eq!(g.structures()[0].x, (MAX_STRUCTURES - 1) as i8);
    }

    #[test]
    fn test_genome_serialization() {
        let mut g = Genome::new();
        g.push_structure(Structure::with_points(4, 7, false, &[(0, 0), (1, 0)]));
        g.push_structure(Structure::with_points(9, 9, true, &[(0, 1)]));
        g.last_mutation = Some(MutationKind::JitterPoint);

        let json = serde_json::to_string(&g).unwrap();
        let restored: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, g);
    }

    #[test]
    fn test_weight_count_error() {
        assert_eq!(
            GenomeError::WeightCount(2).to_string(),
            "expected 9 mutation weights, got 2"
        );
        let err = serde_json::from_str::<MutationWeights>("[0.5, 0.5]").unwrap_err();
        assert!(err.to_string().contains("got 2"));
    }

    #[test]
    fn test_mirror_local_keeps_shape_at_radius() {
        let offsets = [(5, 0), (-5, 1), (5, 2)];
        let mut s = Structure::with_points(12, 12, false, &offsets);
        // Centroid dx is 1, so 5 and -5 would reflect to -3 and 7.
        assert!(!s.mirror_local(true, false));
        let dxs: Vec<i8> = s.points().iter().map(|p| p.dx).collect();
        assert_eq!(dxs, vec![5, -5, 5]);

        // Vertical reflection stays in range and keeps every point distinct.
        assert!(s.mirror_local(false, true));
        let mut dys: Vec<i8> = s.points().iter().map(|p| p.dy).collect();
        dys.sort();
        assert_eq!(dys, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_symmetry_matches_default() {
        let g: Genome = serde_json::from_str(r#"{"structures": []}"#).unwrap();
        assert!(g.symmetric);
        assert_eq!(g.symmetric, Genome::default().symmetric);
    }

    #[test]
    fn test_deserialize_rejects_oversized() {
        let points: Vec<String> = (0..11).map(|_| r#"{"dx":0,"dy":0}"#.to_string()).collect();
        let json = format!(r#"{{"x":1,"y":1,"points":[{}]}}"#, points.join(","));
        assert!(serde_json::from_str::<Structure>(&json).is_err());
    }
}

//! 3x3 dot grid: dot identity, gesture sequences, skip-dot inference and
//! on-screen geometry.
//!
//! Dots are numbered left-to-right, top-to-bottom:
//!
//! ```text
//! 0 1 2
//! 3 4 5
//! 6 7 8
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LockError;

/// Dots per row/column.
pub const GRID_SIDE: u8 = 3;
/// Total dots on the grid.
pub const DOT_COUNT: usize = 9;
/// A gesture must connect at least this many dots.
pub const MIN_PATTERN_LEN: usize = 3;

/// One dot on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Dot(u8);

impl Dot {
    pub const CENTER: Dot = Dot(4);

    pub fn new(index: u8) -> Option<Dot> {
        (usize::from(index) < DOT_COUNT).then_some(Dot(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn row(self) -> u8 {
        self.0 / GRID_SIDE
    }

    pub fn col(self) -> u8 {
        self.0 % GRID_SIDE
    }

    fn at(row: u8, col: u8) -> Dot {
        Dot(row * GRID_SIDE + col)
    }

    pub fn all() -> impl Iterator<Item = Dot> {
        (0..DOT_COUNT as u8).map(Dot)
    }
}

impl TryFrom<u8> for Dot {
    type Error = LockError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Dot::new(index).ok_or(LockError::InvalidDot(index))
    }
}

impl From<Dot> for u8 {
    fn from(d: Dot) -> u8 {
        d.0
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The dot a straight stroke from `from` to `to` passes over, if any.
///
/// Covers the row and column skips, the two long diagonals through the
/// center, and the 1<->7 / 3<->5 crossings through the center.
pub fn implied_midpoint(from: Dot, to: Dot) -> Option<Dot> {
    let (ar, ac) = (from.row(), from.col());
    let (br, bc) = (to.row(), to.col());
    let dr = ar.abs_diff(br);
    let dc = ac.abs_diff(bc);

    if ar == br && dc == 2 {
        return Some(Dot::at(ar, (ac + bc) / 2));
    }
    if ac == bc && dr == 2 {
        return Some(Dot::at((ar + br) / 2, ac));
    }
    if dr == 2 && dc == 2 {
        return Some(Dot::CENTER);
    }
    if matches!(
        (from.index(), to.index()),
        (1, 7) | (7, 1) | (3, 5) | (5, 3)
    ) {
        return Some(Dot::CENTER);
    }
    None
}

/// Ordered dots of one gesture; a dot appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GestureSequence(Vec<Dot>);

impl GestureSequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from raw indices. Rejects indices outside 0..=8.
    pub fn from_indices(indices: &[u8]) -> Result<Self, LockError> {
        indices
            .iter()
            .map(|&ix| Dot::try_from(ix))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn dots(&self) -> &[Dot] {
        &self.0
    }

    pub fn indices(&self) -> Vec<u8> {
        self.0.iter().map(|d| d.index()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, dot: Dot) -> bool {
        self.0.contains(&dot)
    }

    pub fn last(&self) -> Option<Dot> {
        self.0.last().copied()
    }

    /// Long enough to be submitted.
    pub fn is_complete(&self) -> bool {
        self.0.len() >= MIN_PATTERN_LEN
    }

    /// Appends `dot` unless it is already part of the gesture.
    pub(crate) fn visit(&mut self, dot: Dot) -> bool {
        if self.contains(dot) {
            return false;
        }
        self.0.push(dot);
        true
    }

    /// Hyphen-joined decimal indices, e.g. `6-3-0-4-7-5`.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|d| d.index().to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for GestureSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for GestureSequence {
    type Err = String;

    /// Accepts `6-3-0`, `6,3,0` or `6 3 0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = Vec::new();
        for tok in s
            .split(|c: char| c == '-' || c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let ix: u8 = tok
                .parse()
                .map_err(|_| format!("'{tok}' is not a dot index"))?;
            out.push(ix);
        }
        GestureSequence::from_indices(&out).map_err(|e| e.to_string())
    }
}

/// A position in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Where the grid and its nine dots currently sit on screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub bounds: Rect,
    pub centers: [Point; DOT_COUNT],
}

impl GridLayout {
    pub fn new(bounds: Rect, centers: [Point; DOT_COUNT]) -> Self {
        Self { bounds, centers }
    }

    /// Dots centered in the cells of an even 3x3 split of `bounds`.
    pub fn uniform(bounds: Rect) -> Self {
        let side = f64::from(GRID_SIDE);
        let centers = std::array::from_fn(|i| {
            let dot = Dot(i as u8);
            Point::new(
                bounds.left + bounds.width * (f64::from(dot.col()) + 0.5) / side,
                bounds.top + bounds.height * (f64::from(dot.row()) + 0.5) / side,
            )
        });
        Self { bounds, centers }
    }

    pub fn center(&self, dot: Dot) -> Point {
        self.centers[usize::from(dot.index())]
    }

    /// Detection threshold: one eighth of the smaller grid side.
    pub fn pick_radius(&self) -> f64 {
        self.bounds.width.min(self.bounds.height) / 8.0
    }

    /// Nearest dot strictly within the pick radius of `p`.
    pub fn hit(&self, p: Point) -> Option<Dot> {
        let radius = self.pick_radius();
        Dot::all()
            .map(|d| (d, p.distance(self.center(d))))
            .filter(|(_, dist)| *dist < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(d, _)| d)
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout::uniform(Rect::new(0.0, 0.0, 300.0, 300.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn d(ix: u8) -> Dot {
        Dot::new(ix).unwrap()
    }

    fn expected_midpoints() -> BTreeMap<(u8, u8), u8> {
        let mut m = BTreeMap::new();
        for (a, b, mid) in [
            // rows
            (0, 2, 1),
            (3, 5, 4),
            (6, 8, 7),
            // columns
            (0, 6, 3),
            (1, 7, 4),
            (2, 8, 5),
            // long diagonals
            (0, 8, 4),
            (2, 6, 4),
        ] {
            m.insert((a, b), mid);
            m.insert((b, a), mid);
        }
        m
    }

    #[test]
    fn midpoint_table_covers_all_ordered_pairs() {
        let expected = expected_midpoints();
        let mut checked = 0;
        for a in Dot::all() {
            for b in Dot::all().filter(|b| *b != a) {
                let want = expected.get(&(a.index(), b.index())).map(|&m| d(m));
                assert_eq!(implied_midpoint(a, b), want, "pair {a}->{b}");
                checked += 1;
            }
        }
        assert_eq!(checked, 72);
    }

    #[test]
    fn knight_moves_imply_nothing() {
        assert_eq!(implied_midpoint(d(0), d(5)), None);
        assert_eq!(implied_midpoint(d(0), d(7)), None);
        assert_eq!(implied_midpoint(d(6), d(1)), None);
    }

    #[test]
    fn dot_rejects_out_of_range() {
        assert!(Dot::new(8).is_some());
        assert!(Dot::new(9).is_none());
        assert_eq!(Dot::try_from(12u8), Err(LockError::InvalidDot(12)));
    }

    #[test]
    fn sequence_encodes_hyphen_joined() {
        let seq = GestureSequence::from_indices(&[6, 3, 0, 4, 7, 5]).unwrap();
        assert_eq!(seq.encode(), "6-3-0-4-7-5");
        assert_eq!("6,3,0,4,7,5".parse::<GestureSequence>().unwrap(), seq);
        assert!("1-9".parse::<GestureSequence>().is_err());
        assert!("a-b".parse::<GestureSequence>().is_err());
    }

    #[test]
    fn sequence_serializes_as_plain_indices() {
        let seq = GestureSequence::from_indices(&[0, 4, 8]).unwrap();
        assert_eq!(serde_json::to_string(&seq).unwrap(), "[0,4,8]");
        let back: GestureSequence = serde_json::from_str("[0,4,8]").unwrap();
        assert_eq!(back, seq);
        assert!(serde_json::from_str::<GestureSequence>("[0,9]").is_err());
    }

    #[test]
    fn uniform_layout_places_centers_and_radius() {
        let layout = GridLayout::uniform(Rect::new(10.0, 20.0, 300.0, 240.0));
        assert_eq!(layout.center(d(0)), Point::new(60.0, 60.0));
        assert_eq!(layout.center(d(4)), Point::new(160.0, 140.0));
        assert_eq!(layout.center(d(8)), Point::new(260.0, 220.0));
        assert_eq!(layout.pick_radius(), 30.0);
    }

    #[test]
    fn hit_requires_strictly_inside_radius() {
        let layout = GridLayout::default();
        // radius 37.5, dot 0 at (50, 50)
        assert_eq!(layout.hit(Point::new(50.0, 50.0)), Some(d(0)));
        assert_eq!(layout.hit(Point::new(87.0, 50.0)), Some(d(0)));
        assert_eq!(layout.hit(Point::new(87.5, 50.0)), None);
        assert_eq!(layout.hit(Point::new(100.0, 100.0)), None);
    }
}

//! Gesture recognition over the 3x3 grid.
//!
//! One stroke (begin -> moves -> end) becomes an ordered, duplicate-free
//! [`GestureSequence`]. When the stroke jumps over a dot (row/column skip,
//! long diagonal) the skipped dot is recorded before the reached one, like
//! the usual phone pattern lock.

use crate::grid::{implied_midpoint, GestureSequence, GridLayout, Point};
use crate::input::Stroke;

/// What a release produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Release {
    /// No stroke was in progress.
    Idle,
    /// Fewer than the minimum number of dots.
    TooShort(GestureSequence),
    Complete(GestureSequence),
}

#[derive(Clone, Debug, Default)]
pub struct GestureRecognizer {
    active: bool,
    visited: GestureSequence,
    layout: GridLayout,
    /// Last tracked pointer position, for drawing the trailing segment.
    cursor: Option<Point>,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn visited(&self) -> &GestureSequence {
        &self.visited
    }

    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    /// Starts a stroke. The layout is captured now and used until release.
    pub fn begin(&mut self, layout: &GridLayout, at: Point) {
        self.layout = layout.clone();
        self.visited = GestureSequence::new();
        self.active = true;
        self.track(at);
    }

    /// Feeds one position; ignored unless a stroke is in progress.
    pub fn track(&mut self, at: Point) {
        if !self.active {
            return;
        }
        self.cursor = Some(at);
        let Some(hit) = self.layout.hit(at) else {
            return;
        };
        if self.visited.contains(hit) {
            return;
        }
        if let Some(mid) = self
            .visited
            .last()
            .and_then(|last| implied_midpoint(last, hit))
        {
            self.visited.visit(mid);
        }
        self.visited.visit(hit);
    }

    /// Ends the stroke and hands out the sequence. The drawn dots stay
    /// visible until [`GestureRecognizer::clear`].
    pub fn release(&mut self) -> Release {
        if !self.active {
            return Release::Idle;
        }
        self.active = false;
        self.cursor = None;
        let seq = self.visited.clone();
        if seq.is_complete() {
            Release::Complete(seq)
        } else {
            Release::TooShort(seq)
        }
    }

    /// Stops tracking without evaluating.
    pub fn abandon(&mut self) {
        self.active = false;
        self.cursor = None;
    }

    /// Drops the drawn dots and any stroke in progress.
    pub fn clear(&mut self) {
        self.active = false;
        self.cursor = None;
        self.visited = GestureSequence::new();
    }

    /// Applies one normalised stroke step. Returns the release outcome on `End`.
    pub fn feed(&mut self, layout: &GridLayout, stroke: Stroke) -> Option<Release> {
        match stroke {
            Stroke::Begin(p) => self.begin(layout, p),
            Stroke::Move(p) => self.track(p),
            Stroke::End => return Some(self.release()),
            Stroke::Cancel => self.clear(),
            Stroke::Abandon => self.abandon(),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Dot;

    fn center(ix: u8) -> Point {
        GridLayout::default().center(Dot::new(ix).unwrap())
    }

    fn draw(stops: &[u8]) -> Release {
        let layout = GridLayout::default();
        let mut r = GestureRecognizer::new();
        r.begin(&layout, center(stops[0]));
        for &ix in &stops[1..] {
            r.track(center(ix));
        }
        r.release()
    }

    fn complete(ix: &[u8]) -> Release {
        Release::Complete(GestureSequence::from_indices(ix).unwrap())
    }

    #[test]
    fn adjacent_dots_are_recorded_in_order() {
        assert_eq!(draw(&[0, 1, 4, 5]), complete(&[0, 1, 4, 5]));
    }

    #[test]
    fn revisits_are_ignored() {
        assert_eq!(draw(&[0, 1, 0, 2]), complete(&[0, 1, 2]));
    }

    #[test]
    fn skip_over_already_visited_midpoint_adds_nothing() {
        // 1 is visited first, then 0 -> 2 crosses it again.
        assert_eq!(draw(&[1, 0, 2]), complete(&[1, 0, 2]));
    }

    #[test]
    fn short_gesture_is_reported_as_too_short() {
        assert_eq!(
            draw(&[0, 1]),
            Release::TooShort(GestureSequence::from_indices(&[0, 1]).unwrap())
        );
    }

    #[test]
    fn positions_between_dots_do_not_register() {
        let layout = GridLayout::default();
        let mut r = GestureRecognizer::new();
        r.begin(&layout, Point::new(100.0, 100.0));
        assert!(r.visited().is_empty());
        assert_eq!(r.cursor(), Some(Point::new(100.0, 100.0)));
    }

    #[test]
    fn moves_without_begin_are_ignored() {
        let mut r = GestureRecognizer::new();
        r.track(center(0));
        assert!(r.visited().is_empty());
        assert_eq!(r.release(), Release::Idle);
    }

    #[test]
    fn cancel_clears_and_abandon_keeps_drawing() {
        let layout = GridLayout::default();
        let mut r = GestureRecognizer::new();
        r.feed(&layout, Stroke::Begin(center(0)));
        r.feed(&layout, Stroke::Move(center(1)));
        r.feed(&layout, Stroke::Abandon);
        assert!(!r.is_active());
        assert_eq!(r.visited().len(), 2);
        assert_eq!(r.feed(&layout, Stroke::End), Some(Release::Idle));

        r.feed(&layout, Stroke::Begin(center(3)));
        r.feed(&layout, Stroke::Cancel);
        assert!(r.visited().is_empty());
    }
}

//! Host input events and their normalisation into a single stroke stream.
//!
//! Pointer events and the legacy touch + mouse pair are equivalent sources;
//! the recognizer only ever sees [`Stroke`]s.

use serde::{Deserialize, Serialize};

use crate::grid::Point;

/// One raw input event as delivered by the host surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    PointerCancel,
    /// `touches` holds the active touch points; the first one drives the stroke.
    TouchStart { touches: Vec<Point> },
    TouchMove { touches: Vec<Point> },
    TouchEnd,
    MouseDown { x: f64, y: f64 },
    MouseMove { x: f64, y: f64 },
    MouseUp,
    MouseLeave,
}

/// Input-model-agnostic stroke step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stroke {
    Begin(Point),
    Move(Point),
    /// Release: the gesture is evaluated.
    End,
    /// Interrupted by the platform: the drawing is cleared, nothing is evaluated.
    Cancel,
    /// Pointer left the surface: tracking stops, the drawing stays as is.
    Abandon,
}

impl InputEvent {
    /// `None` for events that carry no usable position (e.g. an empty touch list).
    pub fn stroke(&self) -> Option<Stroke> {
        match self {
            InputEvent::PointerDown { x, y } | InputEvent::MouseDown { x, y } => {
                Some(Stroke::Begin(Point::new(*x, *y)))
            }
            InputEvent::PointerMove { x, y } | InputEvent::MouseMove { x, y } => {
                Some(Stroke::Move(Point::new(*x, *y)))
            }
            InputEvent::TouchStart { touches } => touches.first().map(|p| Stroke::Begin(*p)),
            InputEvent::TouchMove { touches } => touches.first().map(|p| Stroke::Move(*p)),
            InputEvent::PointerUp | InputEvent::MouseUp | InputEvent::TouchEnd => {
                Some(Stroke::End)
            }
            InputEvent::PointerCancel => Some(Stroke::Cancel),
            InputEvent::MouseLeave => Some(Stroke::Abandon),
        }
    }
}

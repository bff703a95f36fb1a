//! Pointer gestures over the canvas
//!
//! This module contains pure state that can be unit tested without browser
//! dependencies. It decides what a pointer event means (drag a node, pan the
//! view, change hover) and leaves carrying it out to the caller.

/// Pointer travel, in pixels, after which a press no longer counts as a click
pub const CLICK_SLOP: f32 = 3.0;

/// Zoom factor for a wheel event, the same curve d3-zoom uses for pixel deltas
pub fn wheel_factor(delta_y: f32) -> f32 {
    2f32.powf(-delta_y * 0.002)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Pointer went down on a node and has not travelled yet
    Pressed { node: usize, origin: (f32, f32) },
    Dragging { node: usize },
    Panning { last: (f32, f32) },
}

/// What the host should do in response to a pointer event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    None,
    StartDrag(usize),
    /// Move a node to a screen point
    Drag { node: usize, x: f32, y: f32 },
    EndDrag(usize),
    Pan { dx: f32, dy: f32 },
    Hover {
        left: Option<usize>,
        entered: Option<usize>,
    },
}

/// Gesture tracker for one canvas
#[derive(Debug, Clone, Default)]
pub struct Camera {
    gesture: Gesture,
    hovered: Option<usize>,
    suppress_click: bool,
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Pointer down; `hit` is the node under the pointer
    pub fn press(&mut self, hit: Option<usize>, x: f32, y: f32) -> PointerAction {
        self.suppress_click = false;
        match hit {
            Some(node) => {
                self.gesture = Gesture::Pressed {
                    node,
                    origin: (x, y),
                };
                PointerAction::StartDrag(node)
            }
            None => {
                self.gesture = Gesture::Panning { last: (x, y) };
                PointerAction::None
            }
        }
    }

    /// Pointer move; `hit` is only consulted while no button is down
    pub fn move_to(&mut self, hit: impl FnOnce() -> Option<usize>, x: f32, y: f32) -> PointerAction {
        match self.gesture {
            Gesture::Pressed { node, origin } => {
                let (dx, dy) = (x - origin.0, y - origin.1);
                if dx * dx + dy * dy > CLICK_SLOP * CLICK_SLOP {
                    self.gesture = Gesture::Dragging { node };
                    self.suppress_click = true;
                }
                PointerAction::Drag { node, x, y }
            }
            Gesture::Dragging { node } => PointerAction::Drag { node, x, y },
            Gesture::Panning { last } => {
                let (dx, dy) = (x - last.0, y - last.1);
                self.gesture = Gesture::Panning { last: (x, y) };
                if dx != 0.0 || dy != 0.0 {
                    self.suppress_click = true;
                }
                PointerAction::Pan { dx, dy }
            }
            Gesture::Idle => {
                let hit = hit();
                if hit == self.hovered {
                    return PointerAction::None;
                }
                let left = std::mem::replace(&mut self.hovered, hit);
                PointerAction::Hover { left, entered: hit }
            }
        }
    }

    /// Pointer up
    pub fn release(&mut self) -> PointerAction {
        match std::mem::take(&mut self.gesture) {
            Gesture::Pressed { node, .. } | Gesture::Dragging { node } => {
                PointerAction::EndDrag(node)
            }
            _ => PointerAction::None,
        }
    }

    /// Pointer left the canvas: ends any drag and clears hover
    pub fn leave(&mut self) -> (PointerAction, Option<usize>) {
        let ended = self.release();
        (ended, self.hovered.take())
    }

    /// Whether the click that follows the last release is a real click
    pub fn take_click(&mut self) -> bool {
        !std::mem::take(&mut self.suppress_click)
    }

    /// Forget hover and gestures, e.g. when a new graph replaces the old one
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

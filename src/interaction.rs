//! Pointer interaction over a running simulation
//!
//! Drag pins a node and freezes the layout, release unpins it after a short
//! delay and reheats the simulation. Hover freezes a moving layout so the
//! highlighted node does not slide away. Clicking opens a small composer whose
//! submission becomes a follow-up question about that node.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::Viewport;
use crate::simulation::ForceSimulation;
use crate::style;

/// Errors raised by the inline composer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposerError {
    /// Submitted text was empty after trimming
    #[error("query text is empty")]
    EmptyQuery,

    /// No composer is open
    #[error("no composer is open")]
    NotOpen,
}

/// Receives follow-up questions. Fire and forget.
pub trait QuerySink {
    fn submit_query(&mut self, query: String);
}

impl<F: FnMut(String)> QuerySink for F {
    fn submit_query(&mut self, query: String) {
        self(query)
    }
}

/// Timing and geometry of pointer interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Delay between drag end and unpinning, in milliseconds
    pub release_delay_ms: u64,

    /// Alpha the simulation is reheated to after a release
    pub release_alpha: f32,

    /// Hover only freezes a simulation hotter than this
    pub hover_pause_alpha: f32,

    /// How long the empty-submit cue stays visible, in milliseconds
    pub error_cue_ms: u64,

    pub composer_width: f32,
    pub composer_height: f32,

    /// Zoom limits
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            release_delay_ms: 300,
            release_alpha: 0.1,
            hover_pause_alpha: 0.01,
            error_cue_ms: 2000,
            composer_width: 350.0,
            composer_height: 120.0,
            min_zoom: 0.1,
            max_zoom: 8.0,
        }
    }
}

/// Drag lifecycle of the single draggable node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Free,
    Dragging {
        node: usize,
    },
    /// Released, still pinned until `at`
    Releasing {
        node: usize,
        at: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovered {
        node: usize,
        /// Whether entering the hover froze the simulation
        paused: bool,
    },
}

/// Pan and zoom applied to the world: `screen = world * k + (x, y)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.k + self.x, y * self.k + self.y)
    }

    pub fn invert(&self, sx: f32, sy: f32) -> (f32, f32) {
        ((sx - self.x) / self.k, (sy - self.y) / self.k)
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Scale by `factor` keeping the screen point `(px, py)` fixed
    pub fn zoom_about(&mut self, factor: f32, px: f32, py: f32, min: f32, max: f32) {
        let (wx, wy) = self.invert(px, py);
        self.k = (self.k * factor).clamp(min, max);
        self.x = px - wx * self.k;
        self.y = py - wy * self.k;
    }
}

/// Keys the composer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerKey {
    Enter { shift: bool },
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerOutcome {
    /// The query was handed to the sink
    Submitted(String),
    Dismissed,
    /// Still open, nothing happened
    Editing,
}

/// The inline question box anchored next to a node
#[derive(Debug, Clone, PartialEq)]
pub struct Composer {
    node: usize,
    node_id: String,
    left: f32,
    top: f32,
    text: String,
    error_until: Option<Duration>,
}

impl Composer {
    pub fn node(&self) -> usize {
        self.node
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Top-left corner in container coordinates
    pub fn position(&self) -> (f32, f32) {
        (self.left, self.top)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn shows_error(&self, now: Duration) -> bool {
        self.error_until.is_some_and(|until| now < until)
    }

    /// The packaged follow-up question
    pub fn query(&self) -> Result<String, ComposerError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ComposerError::EmptyQuery);
        }
        Ok(format!("关于\"{}\"：{}", self.node_id, text))
    }
}

/// Place a `width × height` box next to a screen point, inside the container
pub fn composer_position(
    (nx, ny): (f32, f32),
    container: Viewport,
    width: f32,
    height: f32,
) -> (f32, f32) {
    const GAP: f32 = 20.0;
    const LIFT: f32 = 60.0;
    const PAD: f32 = 10.0;

    let mut left = (nx + GAP).min(container.width - width - PAD);
    let mut top = (ny - LIFT).max(PAD);
    if left < PAD {
        left = (nx - width - GAP).max(PAD);
    }
    if top + height > container.height - PAD {
        top = (ny - height - GAP).max(PAD);
    }
    (left, top)
}

/// Per-node emphasis on top of the baseline style
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeHighlight {
    pub opacity: f32,
    pub radius_scale: f32,
    pub stroke_width: f32,
    /// Bold, accent-coloured label
    pub emphasized: bool,
}

/// Per-edge opacity and width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeHighlight {
    pub opacity: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub nodes: Vec<NodeHighlight>,
    pub edges: Vec<EdgeHighlight>,
}

/// Drag, hover and composer state for one graph
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    config: InteractionConfig,
    drag: DragState,
    hover: HoverState,
    composer: Option<Composer>,
    transform: ViewTransform,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn drag(&self) -> DragState {
        self.drag
    }

    pub fn hover(&self) -> HoverState {
        self.hover
    }

    pub fn composer(&self) -> Option<&Composer> {
        self.composer.as_ref()
    }

    pub fn composer_mut(&mut self) -> Option<&mut Composer> {
        self.composer.as_mut()
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn transform_mut(&mut self) -> &mut ViewTransform {
        &mut self.transform
    }

    /// Zoom about a screen point within the configured limits
    pub fn zoom(&mut self, factor: f32, px: f32, py: f32) {
        let (min, max) = (self.config.min_zoom, self.config.max_zoom);
        self.transform.zoom_about(factor, px, py, min, max);
    }

    /// Forget everything tied to the previous graph
    pub fn reset(&mut self) {
        self.drag = DragState::Free;
        self.hover = HoverState::Idle;
        self.composer = None;
        self.transform = ViewTransform::IDENTITY;
    }

    pub fn drag_start(&mut self, sim: &mut ForceSimulation, node: usize) {
        if let DragState::Releasing { node: previous, .. } = self.drag {
            sim.unpin(previous);
        }
        let Some((x, y)) = sim.node(node).map(|n| (n.x, n.y)) else {
            return;
        };
        sim.pause();
        sim.pin(node, x, y);
        self.drag = DragState::Dragging { node };
    }

    /// Move the dragged node; returns the clamped position
    pub fn drag_move(
        &mut self,
        sim: &mut ForceSimulation,
        node: usize,
        x: f32,
        y: f32,
    ) -> Option<(f32, f32)> {
        match self.drag {
            DragState::Dragging { node: dragged } if dragged == node => sim.pin(node, x, y),
            _ => None,
        }
    }

    pub fn drag_end(&mut self, node: usize, now: Duration) {
        if self.drag == (DragState::Dragging { node }) {
            let at = now + Duration::from_millis(self.config.release_delay_ms);
            self.drag = DragState::Releasing { node, at };
        }
    }

    /// Fire a due release. Returns whether the simulation was reheated.
    pub fn poll(&mut self, sim: &mut ForceSimulation, now: Duration) -> bool {
        match self.drag {
            DragState::Releasing { node, at } if now >= at => {
                sim.unpin(node);
                self.drag = DragState::Free;
                sim.reheat(self.config.release_alpha, now)
            }
            _ => false,
        }
    }

    pub fn hover_enter(&mut self, sim: &mut ForceSimulation, node: usize) {
        if matches!(self.drag, DragState::Dragging { .. }) {
            return;
        }
        // A release reheat may have resumed the simulation since the last hover
        let already =
            matches!(self.hover, HoverState::Hovered { paused: true, .. }) && sim.is_paused();
        let paused = if !already && sim.alpha() > self.config.hover_pause_alpha {
            sim.pause()
        } else {
            already
        };
        self.hover = HoverState::Hovered { node, paused };
    }

    pub fn hover_leave(&mut self, sim: &mut ForceSimulation) {
        if matches!(self.drag, DragState::Dragging { .. }) {
            return;
        }
        if let HoverState::Hovered { paused: true, .. } = self.hover {
            sim.resume();
        }
        self.hover = HoverState::Idle;
    }

    /// Open the composer next to `node` as seen through the current transform
    pub fn click(
        &mut self,
        sim: &ForceSimulation,
        node: usize,
        container: Viewport,
    ) -> Option<&Composer> {
        let target = sim.node(node)?;
        let anchor = self.transform.apply(target.x, target.y);
        let (left, top) = composer_position(
            anchor,
            container,
            self.config.composer_width,
            self.config.composer_height,
        );
        self.composer = Some(Composer {
            node,
            node_id: target.id.clone(),
            left,
            top,
            text: String::new(),
            error_until: None,
        });
        self.composer.as_ref()
    }

    pub fn dismiss_composer(&mut self) -> bool {
        self.composer.take().is_some()
    }

    /// Submit the composer text. Empty text shows the error cue and keeps the
    /// composer open.
    pub fn submit_composer(
        &mut self,
        now: Duration,
        sink: &mut dyn QuerySink,
    ) -> Result<ComposerOutcome, ComposerError> {
        let composer = self.composer.as_mut().ok_or(ComposerError::NotOpen)?;
        match composer.query() {
            Ok(query) => {
                self.composer = None;
                tracing::debug!(%query, "submitting follow-up query");
                sink.submit_query(query.clone());
                Ok(ComposerOutcome::Submitted(query))
            }
            Err(err) => {
                composer.error_until = Some(now + Duration::from_millis(self.config.error_cue_ms));
                Err(err)
            }
        }
    }

    pub fn composer_key(
        &mut self,
        key: ComposerKey,
        now: Duration,
        sink: &mut dyn QuerySink,
    ) -> Result<ComposerOutcome, ComposerError> {
        if self.composer.is_none() {
            return Err(ComposerError::NotOpen);
        }
        match key {
            ComposerKey::Enter { shift: false } => self.submit_composer(now, sink),
            ComposerKey::Enter { shift: true } => Ok(ComposerOutcome::Editing),
            ComposerKey::Escape => {
                self.dismiss_composer();
                Ok(ComposerOutcome::Dismissed)
            }
        }
    }

    /// Emphasis for every node and edge of `sim`, index aligned
    pub fn highlight(&self, sim: &ForceSimulation) -> Highlight {
        let focus = match (self.drag, self.hover) {
            (DragState::Dragging { node }, _) => Some((node, true)),
            (_, HoverState::Hovered { node, .. }) => Some((node, false)),
            _ => None,
        };

        let nodes = sim
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let base = style::stroke_width(n.level);
                match focus {
                    Some((f, true)) if f == i => NodeHighlight {
                        opacity: 1.0,
                        radius_scale: 1.1,
                        stroke_width: 3.0,
                        emphasized: false,
                    },
                    Some((f, false)) if f == i => NodeHighlight {
                        opacity: 1.0,
                        radius_scale: 1.12,
                        stroke_width: base + 1.0,
                        emphasized: true,
                    },
                    Some((_, dragging)) => NodeHighlight {
                        opacity: if dragging { 0.7 } else { 0.4 },
                        radius_scale: 1.0,
                        stroke_width: base,
                        emphasized: false,
                    },
                    None => NodeHighlight {
                        opacity: 1.0,
                        radius_scale: 1.0,
                        stroke_width: base,
                        emphasized: false,
                    },
                }
            })
            .collect();

        let edges = sim
            .edges()
            .iter()
            .map(|e| {
                let touches = focus.is_some_and(|(f, _)| e.source == f || e.target == f);
                let base = EdgeHighlight {
                    opacity: style::edge_opacity(e.kind),
                    width: style::edge_width(e.value),
                };
                match focus {
                    Some((_, false)) if touches => EdgeHighlight {
                        opacity: 0.9,
                        width: e.value.max(0.0).sqrt() * 2.0,
                    },
                    Some((_, false)) => EdgeHighlight {
                        opacity: 0.2,
                        ..base
                    },
                    Some((_, true)) if !touches => EdgeHighlight {
                        opacity: 0.4,
                        ..base
                    },
                    _ => base,
                }
            })
            .collect();

        Highlight { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutConfig, place};
    use crate::model::ConceptGraph;
    use crate::simulation::{SimulationConfig, TickEvent};

    const VIEW: Viewport = Viewport {
        width: 600.0,
        height: 600.0,
    };

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn simulation() -> ForceSimulation {
        let mut graph = ConceptGraph::fallback();
        place(&mut graph.nodes, VIEW, &LayoutConfig::default());
        ForceSimulation::new(&graph, VIEW, SimulationConfig::default(), Duration::ZERO)
    }

    #[test]
    fn drag_release_unpins_after_delay() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();

        ui.drag_start(&mut sim, 1);
        assert!(sim.is_paused());
        assert_eq!(ui.drag_move(&mut sim, 1, 500.0, 500.0), Some((500.0, 500.0)));
        ui.drag_end(1, ms(1000));

        assert!(!ui.poll(&mut sim, ms(1299)));
        assert!(sim.nodes()[1].fx.is_some());

        assert!(ui.poll(&mut sim, ms(1300)));
        assert_eq!(ui.drag(), DragState::Free);
        let node = &sim.nodes()[1];
        assert!(node.fx.is_none() && node.fy.is_none());
        assert!((sim.alpha() - 0.1).abs() < 1e-6);

        assert_eq!(sim.tick(ms(1316)), TickEvent::Ticked);
        let node = &sim.nodes()[1];
        assert!((60.0..=540.0).contains(&node.x) && (60.0..=540.0).contains(&node.y));
    }

    #[test]
    fn drag_move_is_clamped_and_ignores_other_nodes() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();
        ui.drag_start(&mut sim, 0);
        assert_eq!(ui.drag_move(&mut sim, 0, -40.0, 900.0), Some((60.0, 540.0)));
        assert_eq!(ui.drag_move(&mut sim, 2, 100.0, 100.0), None);
    }

    #[test]
    fn hover_pauses_hot_simulation_and_resumes_it() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();

        ui.hover_enter(&mut sim, 2);
        assert!(sim.is_paused());
        assert_eq!(ui.hover(), HoverState::Hovered { node: 2, paused: true });

        ui.hover_leave(&mut sim);
        assert!(sim.is_running());
        assert_eq!(ui.hover(), HoverState::Idle);
    }

    #[test]
    fn hover_leave_does_not_resume_foreign_pause() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();
        sim.reheat(0.005, Duration::ZERO);

        ui.hover_enter(&mut sim, 0);
        assert!(sim.is_running());
        sim.pause();
        ui.hover_leave(&mut sim);
        assert!(sim.is_paused());
    }

    #[test]
    fn hover_pauses_again_after_release_reheat() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();

        ui.hover_enter(&mut sim, 2);
        ui.drag_start(&mut sim, 0);
        ui.drag_end(0, ms(0));
        assert!(ui.poll(&mut sim, ms(300)));
        assert!(sim.is_running());

        ui.hover_enter(&mut sim, 1);
        assert!(sim.is_paused());
        assert_eq!(ui.hover(), HoverState::Hovered { node: 1, paused: true });

        ui.hover_leave(&mut sim);
        assert!(sim.is_running());
    }

    #[test]
    fn hover_is_ignored_while_dragging() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();
        ui.drag_start(&mut sim, 0);
        ui.hover_enter(&mut sim, 1);
        assert_eq!(ui.hover(), HoverState::Idle);
    }

    #[test]
    fn composer_position_flips_inside_container() {
        let container = Viewport::new(800.0, 600.0);
        assert_eq!(composer_position((100.0, 200.0), container, 350.0, 120.0), (120.0, 140.0));
        // too far right: pushed back inside
        assert_eq!(composer_position((700.0, 200.0), container, 350.0, 120.0), (440.0, 140.0));
        // too low: flipped above
        assert_eq!(composer_position((100.0, 590.0), container, 350.0, 120.0), (120.0, 450.0));
        // narrow container: pinned to the padding
        let narrow = Viewport::new(300.0, 600.0);
        assert_eq!(composer_position((50.0, 10.0), narrow, 350.0, 120.0), (10.0, 10.0));
    }

    #[test]
    fn click_anchors_through_transform() {
        let sim = simulation();
        let mut ui = InteractionController::default();
        ui.transform_mut().k = 2.0;
        ui.transform_mut().pan(-300.0, -300.0);

        let container = Viewport::new(1000.0, 1000.0);
        let composer = ui.click(&sim, 0, container).unwrap();
        // root sits at (300, 300) in the world, (300, 300) on screen
        assert_eq!(composer.position(), (320.0, 240.0));
        assert_eq!(composer.node_id(), "测试节点");
    }

    #[test]
    fn empty_submit_keeps_composer_and_skips_sink() {
        let sim = simulation();
        let mut ui = InteractionController::default();
        ui.click(&sim, 1, VIEW);
        ui.composer_mut().unwrap().set_text("   \n ");

        let mut sent = Vec::new();
        let mut sink = |q: String| sent.push(q);
        let result = ui.composer_key(ComposerKey::Enter { shift: false }, ms(100), &mut sink);

        assert_eq!(result, Err(ComposerError::EmptyQuery));
        assert!(sent.is_empty());
        let composer = ui.composer().unwrap();
        assert!(composer.shows_error(ms(2099)));
        assert!(!composer.shows_error(ms(2100)));
    }

    #[test]
    fn submit_packages_query_and_closes() {
        let sim = simulation();
        let mut ui = InteractionController::default();
        ui.click(&sim, 1, VIEW);
        ui.composer_mut().unwrap().set_text("  这是什么？ ");

        let mut sent = Vec::new();
        let mut sink = |q: String| sent.push(q);
        let outcome = ui.submit_composer(ms(0), &mut sink).unwrap();

        assert_eq!(sent, vec!["关于\"子节点1\"：这是什么？".to_string()]);
        assert_eq!(outcome, ComposerOutcome::Submitted(sent[0].clone()));
        assert!(ui.composer().is_none());
    }

    #[test]
    fn composer_keys() {
        let sim = simulation();
        let mut ui = InteractionController::default();
        let mut sink = |_: String| {};
        assert_eq!(
            ui.composer_key(ComposerKey::Escape, ms(0), &mut sink),
            Err(ComposerError::NotOpen)
        );

        ui.click(&sim, 0, VIEW);
        assert_eq!(
            ui.composer_key(ComposerKey::Enter { shift: true }, ms(0), &mut sink),
            Ok(ComposerOutcome::Editing)
        );
        assert_eq!(
            ui.composer_key(ComposerKey::Escape, ms(0), &mut sink),
            Ok(ComposerOutcome::Dismissed)
        );
        assert!(ui.composer().is_none());
    }

    #[test]
    fn hover_highlight() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();
        ui.hover_enter(&mut sim, 1);
        let h = ui.highlight(&sim);

        assert_eq!(h.nodes[1].radius_scale, 1.12);
        assert_eq!(h.nodes[1].stroke_width, 3.0);
        assert!(h.nodes[1].emphasized);
        assert_eq!(h.nodes[2].opacity, 0.4);
        // edge 0 touches node 1, edge 1 does not
        assert_eq!(h.edges[0].opacity, 0.9);
        assert_eq!(h.edges[0].width, 3.0_f32.sqrt() * 2.0);
        assert_eq!(h.edges[1].opacity, 0.2);
    }

    #[test]
    fn drag_highlight_and_baseline() {
        let mut sim = simulation();
        let mut ui = InteractionController::default();
        let baseline = ui.highlight(&sim);
        assert!(baseline.nodes.iter().all(|n| n.opacity == 1.0));
        assert_eq!(baseline.edges[0].opacity, 0.8);

        ui.drag_start(&mut sim, 2);
        let h = ui.highlight(&sim);
        assert_eq!(h.nodes[2].radius_scale, 1.1);
        assert_eq!(h.nodes[2].stroke_width, 3.0);
        assert_eq!(h.nodes[0].opacity, 0.7);
        assert_eq!(h.edges[0].opacity, 0.4);
        assert_eq!(h.edges[1].opacity, 0.8);
    }

    #[test]
    fn zoom_keeps_anchor_and_respects_limits() {
        let mut ui = InteractionController::default();
        ui.zoom(2.0, 100.0, 100.0);
        assert_eq!(ui.transform().apply(100.0, 100.0), (100.0, 100.0));
        assert_eq!(ui.transform().k, 2.0);

        ui.zoom(100.0, 0.0, 0.0);
        assert_eq!(ui.transform().k, 8.0);
        ui.zoom(0.0001, 0.0, 0.0);
        assert_eq!(ui.transform().k, 0.1);
    }
}

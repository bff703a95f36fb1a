//! Browser view for conceptmap concept graphs
//!
//! This crate provides WASM bindings that own a [`GraphSession`], feed it
//! pointer events and `performance.now()` timestamps, and draw it to a 2D
//! canvas every animation frame.

use std::time::Duration;

use wasm_bindgen::prelude::*;

use conceptmap::config::Settings;
use conceptmap::layout::Viewport;
use conceptmap::session::GraphSession;
use conceptmap::simulation::TickEvent;

pub mod camera;
pub mod canvas2d;

use camera::{Camera, PointerAction};
use canvas2d::Canvas2DRenderer;

/// Initialize WASM panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn millis(now_ms: f64) -> Duration {
    Duration::from_secs_f64(now_ms.max(0.0) / 1000.0)
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// An interactive concept map on a canvas
#[wasm_bindgen]
pub struct ConceptMapView {
    session: GraphSession,
    renderer: Canvas2DRenderer,
    camera: Camera,
    on_query: js_sys::Function,
}

#[wasm_bindgen]
impl ConceptMapView {
    /// `on_query` receives the follow-up question composed for a node
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: web_sys::HtmlCanvasElement,
        on_query: js_sys::Function,
    ) -> Result<ConceptMapView, JsValue> {
        let renderer = Canvas2DRenderer::new(canvas).map_err(|e| JsValue::from_str(&e))?;
        let settings = Settings::default();
        let seed = settings
            .session
            .seed
            .unwrap_or_else(|| (js_sys::Math::random() * 2f64.powi(53)) as u64);
        let mut session = GraphSession::with_seed(settings, seed);
        session.set_viewport(Some(Viewport::new(
            renderer.width() as f32,
            renderer.height() as f32,
        )));

        Ok(Self {
            session,
            renderer,
            camera: Camera::new(),
            on_query,
        })
    }

    /// Replace the shown graph with one extracted from `text`
    pub fn generate_from_text(&mut self, text: &str, now_ms: f64) -> Result<(), JsValue> {
        self.camera.reset();
        self.session
            .generate_from_text(text, millis(now_ms))
            .map(|_| ())
            .map_err(js_error)
    }

    pub fn regenerate_last_layout(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.camera.reset();
        self.session
            .regenerate_last_layout(millis(now_ms))
            .map(|_| ())
            .map_err(js_error)
    }

    /// Append a chunk of a streaming reply; the graph is built by
    /// `finish_stream`
    pub fn stream_text(&mut self, chunk: &str) {
        self.session.stream_text(chunk);
    }

    pub fn finish_stream(&mut self, now_ms: f64) -> Result<(), JsValue> {
        let before = self.simulation_id();
        let result = self
            .session
            .finish_stream(millis(now_ms))
            .map(|_| ())
            .map_err(js_error);
        if self.simulation_id() != before {
            self.camera.reset();
        }
        result
    }

    /// Resize the canvas; the layout follows after the resize settles
    pub fn resize(&mut self, width: u32, height: u32, now_ms: f64) {
        self.renderer.resize(width, height);
        let viewport = Viewport::new(width as f32, height as f32);
        if self.session.viewport().is_none() {
            self.session.set_viewport(Some(viewport));
        } else {
            self.session.resize(viewport, millis(now_ms));
        }
    }

    /// Advance and draw one frame. Returns whether the simulation is still
    /// moving.
    pub fn frame(&mut self, now_ms: f64) -> bool {
        let before = self.simulation_id();
        let event = self.session.frame(millis(now_ms));
        // A settled resize rebuilds the graph; pointer state refers to old nodes
        if self.simulation_id() != before {
            self.camera.reset();
        }
        self.renderer.render(&self.session);
        matches!(event, Some(TickEvent::Ticked | TickEvent::Idle))
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> Result<(), JsValue> {
        let hit = self.session.node_at(x, y);
        match self.camera.press(hit, x, y) {
            PointerAction::StartDrag(node) => self.session.drag_start(node).map_err(js_error),
            _ => {
                self.session.dismiss_composer();
                Ok(())
            }
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> Result<(), JsValue> {
        let session = &self.session;
        let action = self.camera.move_to(|| session.node_at(x, y), x, y);
        self.apply(action)
    }

    pub fn pointer_up(&mut self, now_ms: f64) -> Result<(), JsValue> {
        let action = self.camera.release();
        self.apply_at(action, millis(now_ms))
    }

    pub fn pointer_leave(&mut self, now_ms: f64) -> Result<(), JsValue> {
        let (action, hovered) = self.camera.leave();
        if hovered.is_some() {
            self.session.hover_leave();
        }
        self.apply_at(action, millis(now_ms))
    }

    /// Zoom about the pointer
    pub fn wheel(&mut self, x: f32, y: f32, delta_y: f32) {
        self.session
            .interaction_mut()
            .zoom(camera::wheel_factor(delta_y), x, y);
    }

    /// Open the composer for the node under the pointer. Returns its anchor
    /// as JSON (`node`, `left`, `top`, `width`, `height`), or nothing when the
    /// click missed or ended a drag.
    pub fn click(&mut self, x: f32, y: f32) -> Result<Option<String>, JsValue> {
        if !self.camera.take_click() {
            return Ok(None);
        }
        let Some(node) = self.session.node_at(x, y) else {
            self.session.dismiss_composer();
            return Ok(None);
        };
        let composer = self.session.click(node).map_err(js_error)?;
        let config = self.session.interaction().config();
        let (left, top) = composer.position();
        let anchor = serde_json::json!({
            "node": composer.node_id(),
            "left": left,
            "top": top,
            "width": config.composer_width,
            "height": config.composer_height,
        });
        Ok(Some(anchor.to_string()))
    }

    /// Send the composed question through `on_query`. Fails on an empty
    /// question; the composer then stays open with its error cue.
    pub fn submit_composer(&mut self, text: &str, now_ms: f64) -> Result<(), JsValue> {
        self.session.composer_input(text).map_err(js_error)?;
        let on_query = &self.on_query;
        let mut sink = |query: String| {
            if let Err(err) = on_query.call1(&JsValue::NULL, &JsValue::from_str(&query)) {
                web_sys::console::error_1(&err);
            }
        };
        self.session
            .submit_composer(millis(now_ms), &mut sink)
            .map(|_| ())
            .map_err(js_error)
    }

    pub fn composer_shows_error(&self, now_ms: f64) -> bool {
        self.session
            .interaction()
            .composer()
            .is_some_and(|c| c.shows_error(millis(now_ms)))
    }

    pub fn dismiss_composer(&mut self) -> bool {
        self.session.dismiss_composer()
    }

    /// The shown graph with current positions, in the JSON exchange format
    pub fn graph_json(&self) -> Option<String> {
        let graph = self.session.snapshot()?;
        serde_json::to_string(&graph).ok()
    }

    /// Stop the simulation and drop pending updates
    pub fn close(&mut self) {
        self.camera.reset();
        self.session.close();
    }
}

impl ConceptMapView {
    fn simulation_id(&self) -> Option<u64> {
        self.session.simulation().map(|sim| sim.handle().id())
    }

    fn apply(&mut self, action: PointerAction) -> Result<(), JsValue> {
        match action {
            PointerAction::Drag { node, x, y } => {
                let (wx, wy) = self.session.interaction().transform().invert(x, y);
                self.session.drag_move(node, wx, wy).map_err(js_error)?;
            }
            PointerAction::Pan { dx, dy } => {
                self.session.interaction_mut().transform_mut().pan(dx, dy);
            }
            PointerAction::Hover { left, entered } => {
                if left.is_some() {
                    self.session.hover_leave();
                }
                if let Some(node) = entered {
                    self.session.hover_enter(node).map_err(js_error)?;
                }
            }
            PointerAction::StartDrag(node) => self.session.drag_start(node).map_err(js_error)?,
            PointerAction::EndDrag(_) | PointerAction::None => {}
        }
        Ok(())
    }

    fn apply_at(&mut self, action: PointerAction, now: Duration) -> Result<(), JsValue> {
        match action {
            PointerAction::EndDrag(node) => self.session.drag_end(node, now).map_err(js_error),
            other => self.apply(other),
        }
    }
}

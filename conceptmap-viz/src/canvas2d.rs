//! 2D Canvas rendering for concept maps
//!
//! Draws a session's live simulation with the same encoding the SVG writer
//! uses, plus the hover and drag highlight.

use std::f64::consts::TAU;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use conceptmap::interaction::Highlight;
use conceptmap::model::{ConceptGraph, Level};
use conceptmap::session::GraphSession;
use conceptmap::simulation::{ForceSimulation, Profile};
use conceptmap::style::{self, EdgeStyle, NodeStyle};

/// 2D Canvas renderer
pub struct Canvas2DRenderer {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl Canvas2DRenderer {
    /// Create renderer from canvas element
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, String> {
        let ctx = canvas
            .get_context("2d")
            .map_err(|e| format!("Failed to get 2d context: {:?}", e))?
            .ok_or("2d context not available")?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| "Failed to cast to CanvasRenderingContext2d")?;

        Ok(Self { canvas, ctx })
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Update canvas dimensions
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    /// Draw the session's current state
    pub fn render(&self, session: &GraphSession) {
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0).ok();
        self.ctx.set_global_alpha(1.0);
        self.ctx.set_fill_style_str(style::BACKGROUND);
        self.ctx
            .fill_rect(0.0, 0.0, self.width() as f64, self.height() as f64);

        let (Some(sim), Some(graph), Some(highlight)) =
            (session.simulation(), session.last_graph(), session.highlight())
        else {
            return;
        };
        let profile = session.settings().simulation.profile;

        let t = session.interaction().transform();
        self.ctx
            .set_transform(t.k as f64, 0.0, 0.0, t.k as f64, t.x as f64, t.y as f64)
            .ok();

        self.render_edges(sim, &highlight, profile);
        self.render_nodes(sim, graph, &highlight, profile);
        self.ctx.set_global_alpha(1.0);
    }

    fn render_edges(&self, sim: &ForceSimulation, highlight: &Highlight, profile: Profile) {
        let nodes = sim.nodes();
        for (edge, lit) in sim.edges().iter().zip(&highlight.edges) {
            let look = EdgeStyle::for_edge(edge.kind, edge.value, profile);
            let source = &nodes[edge.source];
            let target = &nodes[edge.target];

            let dash: js_sys::Array = look
                .dash
                .unwrap_or_default()
                .split(',')
                .filter_map(|s| s.trim().parse::<f64>().ok())
                .map(JsValue::from)
                .collect();
            self.ctx.set_line_dash(&dash).ok();

            self.ctx.set_global_alpha(lit.opacity as f64);
            self.ctx.set_stroke_style_str(look.color);
            self.ctx.set_line_width(lit.width as f64);
            self.ctx.begin_path();
            self.ctx.move_to(source.x as f64, source.y as f64);
            self.ctx.line_to(target.x as f64, target.y as f64);
            self.ctx.stroke();
        }
        self.ctx.set_line_dash(&js_sys::Array::new()).ok();
    }

    fn render_nodes(
        &self,
        sim: &ForceSimulation,
        graph: &ConceptGraph,
        highlight: &Highlight,
        profile: Profile,
    ) {
        for ((node, concept), lit) in sim.nodes().iter().zip(&graph.nodes).zip(&highlight.nodes) {
            let look = NodeStyle::for_node(concept, profile);
            let (x, y) = (node.x as f64, node.y as f64);
            let r = (look.radius * lit.radius_scale) as f64;

            self.ctx.set_global_alpha(lit.opacity as f64);

            let fill = self.ctx.create_linear_gradient(x - r, y - r, x + r, y + r);
            fill.add_color_stop(0.0, look.fill.start).ok();
            fill.add_color_stop(1.0, look.fill.end).ok();

            self.ctx.begin_path();
            self.ctx.arc(x, y, r, 0.0, TAU).ok();
            self.ctx.set_fill_style_canvas_gradient(&fill);
            self.ctx.fill();
            self.ctx.set_stroke_style_str(look.stroke);
            self.ctx.set_line_width(lit.stroke_width as f64);
            self.ctx.stroke();

            if node.level == Level::Core {
                let offset = (-node.size + 6.0) as f64;
                self.ctx.begin_path();
                self.ctx
                    .arc(
                        x + offset,
                        y + offset,
                        style::CORE_MARKER_RADIUS as f64,
                        0.0,
                        TAU,
                    )
                    .ok();
                self.ctx.set_fill_style_str(style::CORE_MARKER);
                self.ctx.fill();
                self.ctx.set_stroke_style_str("white");
                self.ctx.set_line_width(1.0);
                self.ctx.stroke();
            }

            let (weight, color) = if lit.emphasized {
                (700, style::LABEL_HIGHLIGHT)
            } else {
                (look.label_weight, style::LABEL_COLOR)
            };
            self.ctx.set_font(&format!(
                "{weight} {}px -apple-system, BlinkMacSystemFont, sans-serif",
                look.label_size
            ));
            self.ctx.set_text_align("left");
            self.ctx.set_text_baseline("middle");
            self.ctx.set_fill_style_str(color);
            let _ = self
                .ctx
                .fill_text(&node.id, x + node.size as f64 + 8.0, y);
        }
    }
}

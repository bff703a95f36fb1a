//! SVG and HTML output
//!
//! Draws a positioned graph with the same visual encoding the browser view
//! uses: gradient-filled circles, typed and weighted edges, labels to the
//! right of each node and a marker on core concepts.

use std::collections::{BTreeSet, HashMap};

use askama::Template;

use crate::io::{IoError, IoResult, Writer};
use crate::layout::Viewport;
use crate::model::{ConceptGraph, Level};
use crate::simulation::Profile;
use crate::style::{self, EdgeStyle, Fill, NodeStyle};

/// Compact decimal for attribute values
fn num(v: f32) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

struct SvgGradient {
    group: u8,
    start: &'static str,
    end: &'static str,
}

struct SvgEdge {
    kind: &'static str,
    x1: String,
    y1: String,
    x2: String,
    y2: String,
    color: &'static str,
    opacity: String,
    width: String,
    dash: Option<&'static str>,
}

struct SvgNode {
    id: String,
    level: u8,
    group: u8,
    x: String,
    y: String,
    radius: String,
    stroke: &'static str,
    stroke_width: String,
    core: bool,
    marker: String,
    label_dx: String,
    label_size: String,
    label_weight: u16,
}

#[derive(Template)]
#[template(path = "graph.svg", escape = "html")]
struct GraphSvgTemplate {
    width: String,
    height: String,
    background: &'static str,
    label_color: &'static str,
    marker_color: &'static str,
    marker_radius: String,
    gradients: Vec<SvgGradient>,
    edges: Vec<SvgEdge>,
    nodes: Vec<SvgNode>,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    title: &'a str,
    background: &'a str,
    node_count: usize,
    link_count: usize,
    svg: &'a str,
}

/// Standalone SVG document
#[derive(Debug, Clone)]
pub struct SvgWriter {
    viewport: Viewport,
    profile: Profile,
}

impl SvgWriter {
    pub fn new(viewport: Viewport, profile: Profile) -> Self {
        Self { viewport, profile }
    }

    fn build_template(&self, graph: &ConceptGraph) -> GraphSvgTemplate {
        let groups: BTreeSet<u8> = graph.nodes.iter().map(|n| n.group).collect();
        let gradients = groups
            .into_iter()
            .map(|group| {
                let Fill { start, end } = Fill::for_group(group, self.profile);
                SvgGradient { group, start, end }
            })
            .collect();

        let positions: HashMap<&str, (f32, f32)> = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), (n.x, n.y)))
            .collect();

        let edges = graph
            .links
            .iter()
            .filter_map(|link| {
                let (x1, y1) = *positions.get(link.source.as_str())?;
                let (x2, y2) = *positions.get(link.target.as_str())?;
                let look = EdgeStyle::for_edge(link.kind, link.value, self.profile);
                Some(SvgEdge {
                    kind: link.kind.as_str(),
                    x1: num(x1),
                    y1: num(y1),
                    x2: num(x2),
                    y2: num(y2),
                    color: look.color,
                    opacity: num(look.opacity),
                    width: num(look.width),
                    dash: look.dash,
                })
            })
            .collect();

        let nodes = graph
            .nodes
            .iter()
            .map(|node| {
                let look = NodeStyle::for_node(node, self.profile);
                SvgNode {
                    id: node.id.clone(),
                    level: node.level.number(),
                    group: node.group,
                    x: num(node.x),
                    y: num(node.y),
                    radius: num(look.radius),
                    stroke: look.stroke,
                    stroke_width: num(look.stroke_width),
                    core: node.level == Level::Core,
                    marker: num(-node.size + 6.0),
                    label_dx: num(node.size + 8.0),
                    label_size: num(look.label_size),
                    label_weight: look.label_weight,
                }
            })
            .collect();

        GraphSvgTemplate {
            width: num(self.viewport.width),
            height: num(self.viewport.height),
            background: style::BACKGROUND,
            label_color: style::LABEL_COLOR,
            marker_color: style::CORE_MARKER,
            marker_radius: num(style::CORE_MARKER_RADIUS),
            gradients,
            edges,
            nodes,
        }
    }
}

impl Writer for SvgWriter {
    fn render(&self, graph: &ConceptGraph) -> IoResult<String> {
        self.build_template(graph)
            .render()
            .map_err(|e| IoError::Write(e.to_string()))
    }

    fn format_id(&self) -> &str {
        "svg"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["svg"]
    }
}

/// HTML page with the graph inlined as SVG
#[derive(Debug, Clone)]
pub struct HtmlWriter {
    svg: SvgWriter,
    title: String,
}

impl HtmlWriter {
    pub fn new(viewport: Viewport, profile: Profile) -> Self {
        Self {
            svg: SvgWriter::new(viewport, profile),
            title: "Concept map".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl Writer for HtmlWriter {
    fn render(&self, graph: &ConceptGraph) -> IoResult<String> {
        let svg = self.svg.render(graph)?;
        IndexTemplate {
            title: &self.title,
            background: style::BACKGROUND,
            node_count: graph.nodes.len(),
            link_count: graph.links.len(),
            svg: &svg,
        }
        .render()
        .map_err(|e| IoError::Write(e.to_string()))
    }

    fn format_id(&self) -> &str {
        "html"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }
}

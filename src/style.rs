//! Visual encoding of concepts and edges
//!
//! Shared by the SVG writer and the canvas renderer so both draw the same
//! graph the same way. Colours are CSS hex strings.

use crate::model::{ConceptNode, EdgeKind, Level};
use crate::simulation::Profile;

pub const BACKGROUND: &str = "#fafbfc";
pub const LABEL_COLOR: &str = "#1F2937";
pub const LABEL_HIGHLIGHT: &str = "#7C3AED";
pub const CORE_MARKER: &str = "#EF4444";
pub const CORE_MARKER_RADIUS: f32 = 4.0;

/// Gradient stops for the enhanced look, by group
const GRADIENTS: [(&str, &str); 4] = [
    ("#7C3AED", "#A855F7"),
    ("#3B82F6", "#60A5FA"),
    ("#10B981", "#34D399"),
    ("#F59E0B", "#FBBF24"),
];

/// Flat fills for the basic look, by group
const PALETTE: [&str; 8] = [
    "#EF4444", "#3B82F6", "#10B981", "#F59E0B", "#8B5CF6", "#F97316", "#14B8A6", "#EC4899",
];

/// A two-stop linear fill; flat fills repeat the colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub start: &'static str,
    pub end: &'static str,
}

impl Fill {
    /// Fill for a colour group (1-based, wraps)
    pub fn for_group(group: u8, profile: Profile) -> Self {
        let slot = usize::from(group.max(1) - 1);
        match profile {
            Profile::Enhanced => {
                let (start, end) = GRADIENTS[slot % GRADIENTS.len()];
                Self { start, end }
            }
            Profile::Basic => {
                let color = PALETTE[slot % PALETTE.len()];
                Self {
                    start: color,
                    end: color,
                }
            }
        }
    }
}

/// Baseline look of a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub fill: Fill,
    pub stroke: &'static str,
    pub stroke_width: f32,
    pub radius: f32,
    pub label_size: f32,
    pub label_weight: u16,
}

impl NodeStyle {
    pub fn for_node(node: &ConceptNode, profile: Profile) -> Self {
        let stroke = match profile {
            Profile::Enhanced => match node.group {
                1 => "#7C3AED",
                2 => "#3B82F6",
                3 => "#10B981",
                4 => "#F59E0B",
                _ => "#6B7280",
            },
            Profile::Basic => match node.level {
                Level::Core => "#DC2626",
                Level::Secondary => "#2563EB",
                _ => "#059669",
            },
        };
        Self {
            fill: Fill::for_group(node.group, profile),
            stroke,
            stroke_width: stroke_width(node.level),
            radius: node.size,
            label_size: label_font_size(node.size),
            label_weight: if node.level <= Level::Secondary { 600 } else { 400 },
        }
    }
}

/// Baseline look of an edge
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStyle {
    pub color: &'static str,
    pub opacity: f32,
    pub width: f32,
    pub dash: Option<&'static str>,
}

impl EdgeStyle {
    pub fn for_edge(kind: EdgeKind, value: f32, profile: Profile) -> Self {
        Self {
            color: edge_color(kind, profile),
            opacity: edge_opacity(kind),
            width: edge_width(value),
            dash: kind.is_exploratory().then_some("5,5"),
        }
    }
}

pub fn edge_color(kind: EdgeKind, profile: Profile) -> &'static str {
    match (kind, profile) {
        (EdgeKind::Core, _) => "#7C3AED",
        (EdgeKind::Hierarchy, _) => "#3B82F6",
        (EdgeKind::Application, _) => "#10B981",
        (EdgeKind::Related, Profile::Enhanced) => "#6B7280",
        (EdgeKind::Related, Profile::Basic) => "#F59E0B",
    }
}

pub fn edge_opacity(kind: EdgeKind) -> f32 {
    match kind {
        EdgeKind::Core => 0.8,
        EdgeKind::Hierarchy => 0.6,
        EdgeKind::Application => 0.4,
        EdgeKind::Related => 0.3,
    }
}

/// Stroke width grows with the square root of the weight
pub fn edge_width(value: f32) -> f32 {
    value.max(0.0).sqrt() * 1.5
}

pub fn stroke_width(level: Level) -> f32 {
    match level {
        Level::Core => 3.0,
        Level::Secondary => 2.0,
        _ => 1.5,
    }
}

pub fn label_font_size(size: f32) -> f32 {
    (size * 0.5).max(10.0)
}

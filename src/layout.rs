//! Deterministic starting positions
//!
//! Core concepts start packed around the viewport centre, every other level on
//! its own ring. The force simulation takes it from there.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::model::{ConceptNode, Level};

/// Size of the drawing surface, in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Used when a host cannot measure its container
    pub const FALLBACK: Viewport = Viewport {
        width: 500.0,
        height: 500.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Zero or negative dimensions cannot be laid out
    pub fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Ring geometry for the initial placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius of the core cluster when there is more than one core concept
    pub core_radius: f32,

    /// Radius of the level-2 ring
    pub ring_base: f32,

    /// Added per level beyond 2
    pub ring_step: f32,

    /// Angular offset per level, in radians
    pub ring_twist: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            core_radius: 40.0,
            ring_base: 80.0,
            ring_step: 60.0,
            ring_twist: 0.5,
        }
    }
}

impl LayoutConfig {
    /// Ring radius and angular offset for a level
    fn ring(&self, level: Level, count: usize) -> (f32, f32) {
        match level {
            Level::Core if count > 1 => (self.core_radius, 0.0),
            Level::Core => (0.0, 0.0),
            other => {
                let n = f32::from(other.number());
                (self.ring_base + (n - 1.0) * self.ring_step, n * self.ring_twist)
            }
        }
    }
}

/// Write starting coordinates into `nodes`, clearing any fixed overrides
pub fn place(nodes: &mut [ConceptNode], viewport: Viewport, config: &LayoutConfig) {
    let (cx, cy) = viewport.center();

    let mut tiers: BTreeMap<Level, Vec<usize>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        tiers.entry(node.level).or_default().push(i);
    }

    for (level, members) in tiers {
        let count = members.len();
        let (radius, offset) = config.ring(level, count);
        for (slot, i) in members.into_iter().enumerate() {
            let angle = slot as f32 / count as f32 * TAU + offset;
            let node = &mut nodes[i];
            node.x = cx + angle.cos() * radius;
            node.y = cy + angle.sin() * radius;
            node.fx = None;
            node.fy = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(node: &ConceptNode, (cx, cy): (f32, f32)) -> f32 {
        ((node.x - cx).powi(2) + (node.y - cy).powi(2)).sqrt()
    }

    #[test]
    fn lone_core_node_sits_at_center() {
        let mut nodes = vec![ConceptNode::new("rust", Level::Core, 1, 20.0)];
        place(&mut nodes, Viewport::new(600.0, 400.0), &LayoutConfig::default());
        assert_eq!((nodes[0].x, nodes[0].y), (300.0, 200.0));
    }

    #[test]
    fn levels_land_on_their_rings() {
        let mut nodes = vec![
            ConceptNode::new("a", Level::Core, 1, 20.0),
            ConceptNode::new("b", Level::Core, 2, 20.0),
            ConceptNode::new("c", Level::Secondary, 3, 15.0),
            ConceptNode::new("d", Level::Secondary, 4, 15.0),
            ConceptNode::new("e", Level::Secondary, 5, 15.0),
            ConceptNode::new("f", Level::Tertiary, 6, 12.0),
        ];
        let viewport = Viewport::new(800.0, 800.0);
        place(&mut nodes, viewport, &LayoutConfig::default());

        let center = viewport.center();
        for (node, expected) in nodes.iter().zip([40.0, 40.0, 80.0 + 60.0, 140.0, 140.0, 200.0]) {
            assert!((distance(node, center) - expected).abs() < 1e-3, "{}", node.id);
        }
        // second core node is opposite the first
        assert!((nodes[1].x - 360.0).abs() < 1e-3);
    }

    #[test]
    fn placement_is_deterministic_and_clears_pins() {
        let mut graph = crate::model::ConceptGraph::fallback();
        graph.nodes[1].fx = Some(10.0);
        graph.nodes[1].fy = Some(10.0);
        let mut again = graph.clone();

        place(&mut graph.nodes, Viewport::default(), &LayoutConfig::default());
        place(&mut again.nodes, Viewport::default(), &LayoutConfig::default());

        assert_eq!(graph, again);
        assert!(graph.nodes.iter().all(|n| !n.is_pinned()));
    }
}

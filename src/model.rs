//! Concept graph data model
//!
//! A graph is produced fresh for every extraction and replaced wholesale; it is
//! never patched. Node ids double as display labels and as the join key edges
//! refer to, so the checked constructor rejects duplicates and dangling edges.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling a graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Two nodes share the same id
    #[error("duplicate concept node: {0}")]
    DuplicateNode(String),

    /// An edge references a node id that is not in the graph
    #[error("edge {from} -> {to} references an unknown node")]
    DanglingEdge { from: String, to: String },

    /// A level outside 1..=4 was found in serialized data
    #[error("invalid concept level: {0}")]
    InvalidLevel(u8),
}

/// Coarseness tier of a concept. Lower is more central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Level {
    Core = 1,
    Secondary = 2,
    Tertiary = 3,
    Peripheral = 4,
}

impl Level {
    /// Numeric tier (1..=4)
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.number()
    }
}

impl TryFrom<u8> for Level {
    type Error = GraphError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::Core),
            2 => Ok(Level::Secondary),
            3 => Ok(Level::Tertiary),
            4 => Ok(Level::Peripheral),
            other => Err(GraphError::InvalidLevel(other)),
        }
    }
}

/// Relationship carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Between core concepts
    Core,
    /// Core concept to a secondary one
    Hierarchy,
    /// Secondary concept to a tertiary one
    Application,
    /// Randomly paired, low-confidence exploratory link
    Related,
}

impl EdgeKind {
    /// All kinds, in rendering order
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::Core,
        EdgeKind::Hierarchy,
        EdgeKind::Application,
        EdgeKind::Related,
    ];

    /// Lowercase name, as serialized
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Core => "core",
            EdgeKind::Hierarchy => "hierarchy",
            EdgeKind::Application => "application",
            EdgeKind::Related => "related",
        }
    }

    /// Whether this is an exploratory, low-confidence connection
    pub fn is_exploratory(self) -> bool {
        matches!(self, EdgeKind::Related)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Display label, unique within a graph
    pub id: String,

    /// Tier assigned from the concept's rank
    pub level: Level,

    /// Colour bucket (1..=8), independent of level
    pub group: u8,

    /// Render radius
    pub size: f32,

    /// Current position
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,

    /// Fixed-position override, set while the node is pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<f32>,
}

impl ConceptNode {
    /// Create an unplaced node
    pub fn new(id: impl Into<String>, level: Level, group: u8, size: f32) -> Self {
        Self {
            id: id.into(),
            level,
            group,
            size,
            x: 0.0,
            y: 0.0,
            fx: None,
            fy: None,
        }
    }

    /// Whether a fixed-position override is active
    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

/// A directed, typed edge between two concepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEdge {
    /// Source node id
    pub source: String,

    /// Target node id
    pub target: String,

    /// Relationship type; drives colour, opacity and dash style
    #[serde(rename = "type")]
    pub kind: EdgeKind,

    /// Weight; stroke width scales with its square root
    pub value: f32,
}

impl ConceptEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
        value: f32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            value,
        }
    }

    /// Whether either endpoint is `id`
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// Complete concept graph, as exchanged with renderers and the chat client
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConceptGraph {
    /// All concepts
    pub nodes: Vec<ConceptNode>,

    /// All edges, referencing nodes by id
    pub links: Vec<ConceptEdge>,
}

impl ConceptGraph {
    /// Build a graph, rejecting duplicate ids and edges with unknown endpoints
    pub fn new(nodes: Vec<ConceptNode>, links: Vec<ConceptEdge>) -> Result<Self, GraphError> {
        let graph = Self { nodes, links };
        graph.validate()?;
        Ok(graph)
    }

    /// Check id uniqueness and edge resolution
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        for link in &self.links {
            if !ids.contains(link.source.as_str()) || !ids.contains(link.target.as_str()) {
                return Err(GraphError::DanglingEdge {
                    from: link.source.clone(),
                    to: link.target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Drop edges whose endpoints are missing; returns how many were dropped
    pub fn retain_resolved_links(&mut self) -> usize {
        let ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let before = self.links.len();
        self.links.retain(|link| {
            let resolved = ids.contains(&link.source) && ids.contains(&link.target);
            if !resolved {
                tracing::warn!(
                    from = %link.source,
                    to = %link.target,
                    "dropping edge with unknown endpoint"
                );
            }
            resolved
        });
        before - self.links.len()
    }

    /// The fixed graph shown when nothing useful can be extracted
    pub fn fallback() -> Self {
        let root = "测试节点";
        Self {
            nodes: vec![
                ConceptNode::new(root, Level::Core, 1, 20.0),
                ConceptNode::new("子节点1", Level::Secondary, 2, 15.0),
                ConceptNode::new("子节点2", Level::Secondary, 3, 15.0),
            ],
            links: vec![
                ConceptEdge::new(root, "子节点1", EdgeKind::Core, 3.0),
                ConceptEdge::new(root, "子节点2", EdgeKind::Core, 2.0),
            ],
        }
    }

    /// Index of the node with the given id
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

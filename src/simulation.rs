//! Force-directed layout driver
//!
//! A d3-force style simulation over a concept graph: link springs, per-level
//! many-body charge, centering, collision and (for the enhanced profile) level
//! rings. The host calls [`ForceSimulation::tick`] once per frame with the
//! current time; the driver stops itself on convergence or after a hard
//! timeout. Every tick clamps nodes into the viewport minus a margin.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::Viewport;
use crate::model::{ConceptGraph, ConceptNode, EdgeKind, Level};

static NEXT_SIMULATION_ID: AtomicU64 = AtomicU64::new(1);

const GOLDEN_ANGLE: f32 = 2.399_963;

/// Force tuning preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Profile {
    /// Level-aware distances and charges plus radial rings
    #[default]
    Enhanced,
    /// Uniform forces, strong centering
    Basic,
}

/// Force parameters for one profile
#[derive(Debug, Clone, PartialEq)]
pub struct Forces {
    /// Rest length is `link_base + (source level + target level) * link_per_level`
    pub link_base: f32,
    pub link_per_level: f32,
    pub link_strength: f32,

    /// Charge by level, index 0 is level 1
    pub charge: [f32; 4],
    pub charge_distance_max: f32,

    pub center_strength: f32,

    /// Collision radius is `size + collide_padding`
    pub collide_padding: f32,
    pub collide_strength: f32,
    pub collide_iterations: usize,

    /// Ring radius is `(level - 1) * radial_step`; zero strength disables
    pub radial_step: f32,
    pub radial_strength: f32,

    /// Pull toward the centre on each axis; zero disables
    pub position_strength: f32,

    pub alpha: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
}

impl Profile {
    pub fn forces(self) -> Forces {
        match self {
            Profile::Enhanced => Forces {
                link_base: 80.0,
                link_per_level: 25.0,
                link_strength: 0.4,
                charge: [-600.0, -300.0, -150.0, -150.0],
                charge_distance_max: 250.0,
                center_strength: 0.03,
                collide_padding: 20.0,
                collide_strength: 0.7,
                collide_iterations: 2,
                radial_step: 90.0,
                radial_strength: 0.2,
                position_strength: 0.01,
                alpha: 0.2,
                alpha_decay: 0.015,
                velocity_decay: 0.8,
            },
            Profile::Basic => Forces {
                link_base: 120.0,
                link_per_level: 0.0,
                link_strength: 0.5,
                charge: [-400.0; 4],
                charge_distance_max: 400.0,
                center_strength: 1.0,
                collide_padding: 18.0,
                collide_strength: 0.8,
                collide_iterations: 1,
                radial_step: 0.0,
                radial_strength: 0.0,
                position_strength: 0.0,
                alpha: 0.2,
                alpha_decay: 0.02,
                velocity_decay: 0.4,
            },
        }
    }
}

impl Forces {
    fn link_distance(&self, source: Level, target: Level) -> f32 {
        let levels = f32::from(source.number() + target.number());
        self.link_base + levels * self.link_per_level
    }

    fn charge_for(&self, level: Level) -> f32 {
        self.charge[usize::from(level.number() - 1)]
    }

    fn ring_radius(&self, level: Level) -> f32 {
        f32::from(level.number() - 1) * self.radial_step
    }
}

/// Driver settings shared by every profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub profile: Profile,

    /// Distance kept between nodes and the viewport edge
    pub margin: f32,

    /// Hard stop after this long, in milliseconds
    pub timeout_ms: u64,

    /// Stop once alpha falls below this
    pub alpha_min: f32,

    /// Alpha decays toward this value
    pub alpha_target: f32,

    /// Tick budget for headless runs
    pub max_headless_ticks: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Enhanced,
            margin: 60.0,
            timeout_ms: 3000,
            alpha_min: 0.001,
            alpha_target: 0.0,
            max_headless_ticks: 600,
        }
    }
}

impl SimulationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Why a simulation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Alpha fell below the minimum
    Converged,
    /// The hard timeout elapsed
    TimedOut,
    /// A newer graph took over
    Replaced,
    /// The owning session closed
    Closed,
}

impl StopReason {
    /// Final stops cannot be reheated
    pub fn is_final(self) -> bool {
        matches!(self, StopReason::Replaced | StopReason::Closed)
    }
}

/// Outcome of a single [`ForceSimulation::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// Positions advanced
    Ticked,
    /// Paused, nothing moved
    Idle,
    /// Not running any more
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped(StopReason),
}

/// Cheap, clonable view of a simulation's liveness.
///
/// Frames scheduled against a simulation that has since stopped check this
/// before touching anything.
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    id: u64,
    live: Arc<AtomicBool>,
}

impl SimulationHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// A node with position and velocity
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    pub id: String,
    pub level: Level,
    pub size: f32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
}

impl SimNode {
    fn from_concept(node: &ConceptNode) -> Self {
        Self {
            id: node.id.clone(),
            level: node.level,
            size: node.size,
            x: node.x,
            y: node.y,
            vx: 0.0,
            vy: 0.0,
            fx: node.fx,
            fy: node.fy,
        }
    }
}

/// An edge resolved to node indices
#[derive(Debug, Clone, PartialEq)]
pub struct SimEdge {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
    pub value: f32,
    /// Share of the spring correction applied to the target
    bias: f32,
}

/// Tiny deterministic displacement for coincident points
#[derive(Debug, Default)]
struct Jiggle(u32);

impl Jiggle {
    fn next(&mut self) -> f32 {
        self.0 = self.0.wrapping_add(1);
        let s = (self.0 as f32 * GOLDEN_ANGLE).sin();
        s.signum() * (1.0 + s.abs()) * 1e-6
    }
}

/// Keep `(x, y)` inside the viewport shrunk by `margin`. A dimension smaller
/// than two margins collapses to its midpoint.
pub fn clamp_to_viewport(x: f32, y: f32, viewport: Viewport, margin: f32) -> (f32, f32) {
    fn axis(v: f32, dim: f32, margin: f32) -> f32 {
        if dim > 2.0 * margin {
            v.clamp(margin, dim - margin)
        } else {
            dim / 2.0
        }
    }
    (
        axis(x, viewport.width, margin),
        axis(y, viewport.height, margin),
    )
}

/// Force simulation over one concept graph
#[derive(Debug)]
pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    edges: Vec<SimEdge>,
    forces: Forces,
    config: SimulationConfig,
    viewport: Viewport,
    alpha: f32,
    started: Duration,
    last_tick: Duration,
    state: RunState,
    id: u64,
    live: Arc<AtomicBool>,
    jiggle: Jiggle,
}

impl ForceSimulation {
    /// Start a simulation from the graph's current positions.
    ///
    /// Edges whose endpoints cannot be found are dropped with a warning.
    pub fn new(
        graph: &ConceptGraph,
        viewport: Viewport,
        config: SimulationConfig,
        now: Duration,
    ) -> Self {
        let nodes: Vec<SimNode> = graph.nodes.iter().map(SimNode::from_concept).collect();

        let index: std::collections::HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let resolved: Vec<(usize, usize, EdgeKind, f32)> = graph
            .links
            .iter()
            .filter_map(|e| {
                let found = index
                    .get(e.source.as_str())
                    .zip(index.get(e.target.as_str()));
                if found.is_none() {
                    tracing::warn!(
                        from = %e.source,
                        to = %e.target,
                        "dropping edge with unknown endpoint"
                    );
                }
                found.map(|(s, t)| (*s, *t, e.kind, e.value))
            })
            .collect();

        let mut degree = vec![0u32; nodes.len()];
        for (s, t, _, _) in &resolved {
            degree[*s] += 1;
            degree[*t] += 1;
        }

        let edges = resolved
            .into_iter()
            .map(|(source, target, kind, value)| {
                let (ds, dt) = (degree[source] as f32, degree[target] as f32);
                SimEdge {
                    source,
                    target,
                    kind,
                    value,
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        let forces = config.profile.forces();
        let id = NEXT_SIMULATION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, nodes = nodes.len(), profile = ?config.profile, "simulation started");

        Self {
            nodes,
            edges,
            alpha: forces.alpha,
            forces,
            config,
            viewport,
            started: now,
            last_tick: now,
            state: RunState::Running,
            id,
            live: Arc::new(AtomicBool::new(true)),
            jiggle: Jiggle::default(),
        }
    }

    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            id: self.id,
            live: Arc::clone(&self.live),
        }
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[SimEdge] {
        &self.edges
    }

    pub fn node(&self, index: usize) -> Option<&SimNode> {
        self.nodes.get(index)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.state {
            RunState::Stopped(reason) => Some(reason),
            _ => None,
        }
    }

    /// Advance by one tick if running
    pub fn tick(&mut self, now: Duration) -> TickEvent {
        match self.state {
            RunState::Paused => return TickEvent::Idle,
            RunState::Stopped(reason) => return TickEvent::Stopped(reason),
            RunState::Running => {}
        }

        self.last_tick = now;
        if now.saturating_sub(self.started) >= self.config.timeout() {
            self.stop(StopReason::TimedOut);
            return TickEvent::Stopped(StopReason::TimedOut);
        }

        self.step();

        if self.alpha < self.config.alpha_min {
            self.stop(StopReason::Converged);
            return TickEvent::Stopped(StopReason::Converged);
        }
        TickEvent::Ticked
    }

    /// Freeze in place; returns whether anything changed
    pub fn pause(&mut self) -> bool {
        if self.state == RunState::Running {
            self.state = RunState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.state == RunState::Paused {
            self.state = RunState::Running;
            true
        } else {
            false
        }
    }

    /// Stop the simulation. The first reason sticks until a reheat.
    pub fn stop(&mut self, reason: StopReason) {
        if let RunState::Stopped(current) = self.state {
            if current.is_final() || !reason.is_final() {
                return;
            }
        }
        self.state = RunState::Stopped(reason);
        self.live.store(false, Ordering::Release);
        tracing::debug!(id = self.id, ?reason, alpha = self.alpha, "simulation stopped");
    }

    /// Restart at `alpha` with a fresh timeout. Does nothing after a final
    /// stop.
    pub fn reheat(&mut self, alpha: f32, now: Duration) -> bool {
        if self.stop_reason().is_some_and(StopReason::is_final) {
            return false;
        }
        self.alpha = alpha;
        self.started = now;
        self.last_tick = now;
        self.state = RunState::Running;
        self.live.store(true, Ordering::Release);
        true
    }

    /// Fix a node at `(x, y)` after clamping; returns the clamped point
    pub fn pin(&mut self, index: usize, x: f32, y: f32) -> Option<(f32, f32)> {
        let (x, y) = clamp_to_viewport(x, y, self.viewport, self.config.margin);
        let node = self.nodes.get_mut(index)?;
        node.fx = Some(x);
        node.fy = Some(y);
        node.x = x;
        node.y = y;
        Some((x, y))
    }

    pub fn unpin(&mut self, index: usize) -> bool {
        match self.nodes.get_mut(index) {
            Some(node) => {
                node.fx = None;
                node.fy = None;
                true
            }
            None => false,
        }
    }

    /// Topmost node whose disc contains `(x, y)`
    pub fn node_at(&self, x: f32, y: f32) -> Option<usize> {
        self.nodes.iter().rposition(|n| {
            let (dx, dy) = (n.x - x, n.y - y);
            dx * dx + dy * dy <= n.size * n.size
        })
    }

    /// Tick on a synthetic clock until stopped or out of budget
    pub fn run_to_convergence(&mut self, max_iterations: usize, frame: Duration) -> TickEvent {
        let mut now = self.last_tick;
        let mut event = TickEvent::Idle;
        for _ in 0..max_iterations {
            now += frame;
            event = self.tick(now);
            if event != TickEvent::Ticked {
                break;
            }
        }
        event
    }

    /// Copy positions and pins back onto the graph's nodes, matched by id
    pub fn write_back(&self, graph: &mut ConceptGraph) {
        for node in &mut graph.nodes {
            if let Some(sim) = self.nodes.iter().find(|n| n.id == node.id) {
                node.x = sim.x;
                node.y = sim.y;
                node.fx = sim.fx;
                node.fy = sim.fy;
            }
        }
    }

    fn step(&mut self) {
        self.alpha += (self.config.alpha_target - self.alpha) * self.forces.alpha_decay;
        if self.nodes.is_empty() {
            return;
        }

        self.apply_link_force();
        self.apply_many_body_force();
        self.apply_center_force();
        for _ in 0..self.forces.collide_iterations {
            self.apply_collide_force();
        }
        if self.forces.radial_strength > 0.0 {
            self.apply_radial_force();
        }
        if self.forces.position_strength > 0.0 {
            self.apply_position_force();
        }

        let keep = 1.0 - self.forces.velocity_decay;
        let (viewport, margin) = (self.viewport, self.config.margin);
        for node in &mut self.nodes {
            match node.fx {
                Some(fx) => {
                    node.x = fx;
                    node.vx = 0.0;
                }
                None => {
                    node.vx *= keep;
                    node.x += node.vx;
                }
            }
            match node.fy {
                Some(fy) => {
                    node.y = fy;
                    node.vy = 0.0;
                }
                None => {
                    node.vy *= keep;
                    node.y += node.vy;
                }
            }
            (node.x, node.y) = clamp_to_viewport(node.x, node.y, viewport, margin);
        }
    }

    /// Springs toward the rest length, using velocity-predicted positions
    fn apply_link_force(&mut self) {
        let Self {
            nodes,
            edges,
            forces,
            jiggle,
            alpha,
            ..
        } = self;

        for edge in edges.iter() {
            let (s, t) = (edge.source, edge.target);
            if s == t {
                continue;
            }
            let mut x = nodes[t].x + nodes[t].vx - nodes[s].x - nodes[s].vx;
            let mut y = nodes[t].y + nodes[t].vy - nodes[s].y - nodes[s].vy;
            if x == 0.0 {
                x = jiggle.next();
            }
            if y == 0.0 {
                y = jiggle.next();
            }

            let l = (x * x + y * y).sqrt();
            let distance = forces.link_distance(nodes[s].level, nodes[t].level);
            let k = (l - distance) / l * *alpha * forces.link_strength;
            let (x, y) = (x * k, y * k);

            nodes[t].vx -= x * edge.bias;
            nodes[t].vy -= y * edge.bias;
            nodes[s].vx += x * (1.0 - edge.bias);
            nodes[s].vy += y * (1.0 - edge.bias);
        }
    }

    /// Pairwise charge; repulsive for negative strengths
    fn apply_many_body_force(&mut self) {
        let Self {
            nodes,
            forces,
            jiggle,
            alpha,
            ..
        } = self;
        let max2 = forces.charge_distance_max * forces.charge_distance_max;

        for i in 0..nodes.len() {
            for j in 0..nodes.len() {
                if i == j {
                    continue;
                }
                let mut x = nodes[j].x - nodes[i].x;
                let mut y = nodes[j].y - nodes[i].y;
                let mut l = x * x + y * y;
                if l >= max2 {
                    continue;
                }
                if x == 0.0 {
                    x = jiggle.next();
                    l = x * x + y * y;
                }
                if y == 0.0 {
                    y = jiggle.next();
                    l = x * x + y * y;
                }
                if l < 1.0 {
                    l = l.sqrt();
                }

                let w = forces.charge_for(nodes[j].level) * *alpha / l;
                nodes[i].vx += x * w;
                nodes[i].vy += y * w;
            }
        }
    }

    /// Translate everything so the mean moves toward the viewport centre
    fn apply_center_force(&mut self) {
        let (cx, cy) = self.viewport.center();
        let n = self.nodes.len() as f32;
        let strength = self.forces.center_strength;
        let sx = (self.nodes.iter().map(|n| n.x).sum::<f32>() / n - cx) * strength;
        let sy = (self.nodes.iter().map(|n| n.y).sum::<f32>() / n - cy) * strength;
        for node in &mut self.nodes {
            node.x -= sx;
            node.y -= sy;
        }
    }

    /// Push overlapping discs apart, weighted by radius squared
    fn apply_collide_force(&mut self) {
        let Self {
            nodes,
            forces,
            jiggle,
            ..
        } = self;
        let padding = forces.collide_padding;

        for i in 0..nodes.len() {
            let ri = nodes[i].size + padding;
            let xi = nodes[i].x + nodes[i].vx;
            let yi = nodes[i].y + nodes[i].vy;

            for j in (i + 1)..nodes.len() {
                let rj = nodes[j].size + padding;
                let r = ri + rj;
                let mut x = xi - nodes[j].x - nodes[j].vx;
                let mut y = yi - nodes[j].y - nodes[j].vy;
                let mut l = x * x + y * y;
                if l >= r * r {
                    continue;
                }
                if x == 0.0 {
                    x = jiggle.next();
                    l = x * x + y * y;
                }
                if y == 0.0 {
                    y = jiggle.next();
                    l = x * x + y * y;
                }

                let d = l.sqrt();
                let k = (r - d) / d * forces.collide_strength;
                let (x, y) = (x * k, y * k);
                let share = (rj * rj) / (ri * ri + rj * rj);

                nodes[i].vx += x * share;
                nodes[i].vy += y * share;
                nodes[j].vx -= x * (1.0 - share);
                nodes[j].vy -= y * (1.0 - share);
            }
        }
    }

    /// Pull each node toward its level's ring around the centre
    fn apply_radial_force(&mut self) {
        let (cx, cy) = self.viewport.center();
        let strength = self.forces.radial_strength * self.alpha;
        for node in &mut self.nodes {
            let mut dx = node.x - cx;
            let mut dy = node.y - cy;
            if dx == 0.0 {
                dx = 1e-6;
            }
            if dy == 0.0 {
                dy = 1e-6;
            }
            let r = (dx * dx + dy * dy).sqrt();
            let k = (self.forces.ring_radius(node.level) - r) * strength / r;
            node.vx += dx * k;
            node.vy += dy * k;
        }
    }

    fn apply_position_force(&mut self) {
        let (cx, cy) = self.viewport.center();
        let k = self.forces.position_strength * self.alpha;
        for node in &mut self.nodes {
            node.vx += (cx - node.x) * k;
            node.vy += (cy - node.y) * k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutConfig, place};
    use crate::model::ConceptEdge;

    const FRAME: Duration = Duration::from_millis(16);

    fn placed(viewport: Viewport) -> ConceptGraph {
        let mut graph = ConceptGraph::fallback();
        place(&mut graph.nodes, viewport, &LayoutConfig::default());
        graph
    }

    fn start(graph: &ConceptGraph, viewport: Viewport, profile: Profile) -> ForceSimulation {
        let config = SimulationConfig {
            profile,
            ..Default::default()
        };
        ForceSimulation::new(graph, viewport, config, Duration::ZERO)
    }

    #[test]
    fn creates_simulation_from_graph() {
        let viewport = Viewport::new(600.0, 600.0);
        let sim = start(&placed(viewport), viewport, Profile::Enhanced);
        assert_eq!(sim.nodes().len(), 3);
        assert_eq!(sim.edges().len(), 2);
        assert_eq!(sim.alpha(), 0.2);
        assert!(sim.handle().is_live());
    }

    #[test]
    fn unresolved_edges_are_dropped() {
        let mut graph = placed(Viewport::default());
        graph
            .links
            .push(ConceptEdge::new("测试节点", "ghost", EdgeKind::Related, 1.0));
        let sim = start(&graph, Viewport::default(), Profile::Basic);
        assert_eq!(sim.edges().len(), 2);
    }

    #[test]
    fn alpha_decays_toward_target() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        assert_eq!(sim.tick(FRAME), TickEvent::Ticked);
        assert!((sim.alpha() - 0.2 * 0.985).abs() < 1e-6);
    }

    #[test]
    fn nodes_stay_inside_margins_every_tick() {
        let viewport = Viewport::new(600.0, 400.0);
        let mut graph = placed(viewport);
        graph.nodes[0].x = -500.0;
        graph.nodes[1].y = 5000.0;

        for profile in [Profile::Enhanced, Profile::Basic] {
            let mut sim = start(&graph, viewport, profile);
            let mut now = Duration::ZERO;
            while sim.is_running() {
                now += FRAME;
                sim.tick(now);
                for node in sim.nodes() {
                    assert!((60.0..=540.0).contains(&node.x), "{} x={}", node.id, node.x);
                    assert!((60.0..=340.0).contains(&node.y), "{} y={}", node.id, node.y);
                }
            }
        }
    }

    #[test]
    fn tiny_viewport_collapses_to_midpoint() {
        let viewport = Viewport::new(100.0, 90.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        sim.tick(FRAME);
        for node in sim.nodes() {
            assert_eq!((node.x, node.y), (50.0, 45.0));
        }
    }

    #[test]
    fn stops_at_timeout() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        let handle = sim.handle();
        assert_eq!(sim.tick(FRAME), TickEvent::Ticked);
        assert_eq!(
            sim.tick(Duration::from_millis(3000)),
            TickEvent::Stopped(StopReason::TimedOut)
        );
        assert!(!handle.is_live());
        assert_eq!(
            sim.tick(Duration::from_millis(3016)),
            TickEvent::Stopped(StopReason::TimedOut)
        );
    }

    #[test]
    fn converges_without_timeout_pressure() {
        let viewport = Viewport::new(600.0, 600.0);
        let config = SimulationConfig {
            timeout_ms: u64::MAX,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&placed(viewport), viewport, config, Duration::ZERO);
        let event = sim.run_to_convergence(2000, FRAME);
        assert_eq!(event, TickEvent::Stopped(StopReason::Converged));
        assert!(sim.alpha() < 0.001);
    }

    #[test]
    fn headless_run_always_stops() {
        let viewport = Viewport::new(800.0, 600.0);
        for profile in [Profile::Enhanced, Profile::Basic] {
            let mut sim = start(&placed(viewport), viewport, profile);
            let event = sim.run_to_convergence(600, FRAME);
            assert!(matches!(event, TickEvent::Stopped(_)), "{profile:?}");
        }
    }

    #[test]
    fn paused_simulation_does_not_move() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        sim.tick(FRAME);
        assert!(sim.pause());
        let before = sim.nodes().to_vec();
        assert_eq!(sim.tick(FRAME * 2), TickEvent::Idle);
        assert_eq!(sim.nodes(), before.as_slice());
        assert!(sim.resume());
        assert_eq!(sim.tick(FRAME * 3), TickEvent::Ticked);
    }

    #[test]
    fn final_stop_cannot_be_reheated() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        sim.stop(StopReason::Replaced);
        assert!(!sim.reheat(0.1, FRAME));
        assert!(!sim.resume());
        assert_eq!(sim.tick(FRAME), TickEvent::Stopped(StopReason::Replaced));
    }

    #[test]
    fn reheat_revives_a_settled_simulation() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        let handle = sim.handle();
        sim.tick(Duration::from_millis(3000));
        assert!(!handle.is_live());

        let now = Duration::from_millis(5000);
        assert!(sim.reheat(0.1, now));
        assert!(handle.is_live());
        assert_eq!(sim.tick(now + FRAME), TickEvent::Ticked);
        assert!(sim.alpha() < 0.1);
    }

    #[test]
    fn replaced_overrides_a_settled_stop() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Basic);
        sim.stop(StopReason::Converged);
        sim.stop(StopReason::Replaced);
        assert_eq!(sim.stop_reason(), Some(StopReason::Replaced));
        sim.stop(StopReason::Closed);
        assert_eq!(sim.stop_reason(), Some(StopReason::Replaced));
    }

    #[test]
    fn pinned_node_holds_position() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut sim = start(&placed(viewport), viewport, Profile::Enhanced);
        assert_eq!(sim.pin(1, 500.0, 700.0), Some((500.0, 540.0)));
        for i in 1..20 {
            sim.tick(FRAME * i);
        }
        let node = &sim.nodes()[1];
        assert_eq!((node.x, node.y), (500.0, 540.0));
        assert_eq!((node.vx, node.vy), (0.0, 0.0));

        assert!(sim.unpin(1));
        assert!(sim.pin(9, 0.0, 0.0).is_none());
    }

    #[test]
    fn coincident_nodes_separate() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut graph = ConceptGraph::new(
            vec![
                ConceptNode::new("a", Level::Secondary, 1, 15.0),
                ConceptNode::new("b", Level::Secondary, 2, 15.0),
            ],
            vec![],
        )
        .unwrap();
        for node in &mut graph.nodes {
            node.x = 300.0;
            node.y = 300.0;
        }
        let mut sim = start(&graph, viewport, Profile::Basic);
        sim.run_to_convergence(100, FRAME);
        let (a, b) = (&sim.nodes()[0], &sim.nodes()[1]);
        let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        assert!(d > 30.0, "distance {d}");
        assert!(d.is_finite());
    }

    #[test]
    fn empty_graph_handles_gracefully() {
        let mut sim = start(&ConceptGraph::default(), Viewport::default(), Profile::Enhanced);
        sim.run_to_convergence(100, FRAME);
        assert!(sim.nodes().is_empty());
    }

    #[test]
    fn write_back_and_hit_test() {
        let viewport = Viewport::new(600.0, 600.0);
        let mut graph = placed(viewport);
        let mut sim = start(&graph, viewport, Profile::Enhanced);
        sim.run_to_convergence(50, FRAME);
        sim.write_back(&mut graph);

        let root = &sim.nodes()[0];
        assert_eq!((graph.nodes[0].x, graph.nodes[0].y), (root.x, root.y));
        assert_eq!(sim.node_at(root.x + 5.0, root.y), Some(0));
        assert_eq!(sim.node_at(-100.0, -100.0), None);
    }
}

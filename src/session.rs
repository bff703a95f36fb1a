//! Graph session
//!
//! Owns everything one graph panel needs: the extractor and its random
//! source, the last graph, the live simulation, pointer interaction, the
//! resize debouncer and the reply being streamed. Hosts drive it with
//! [`GraphSession::frame`] once per turn.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::config::Settings;
use crate::extractor::ConceptExtractor;
use crate::interaction::{
    Composer, ComposerError, ComposerKey, ComposerOutcome, Highlight, InteractionController,
    QuerySink,
};
use crate::layout::{self, Viewport};
use crate::model::ConceptGraph;
use crate::simulation::{ForceSimulation, SimulationHandle, StopReason, TickEvent};

/// Errors returned by session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The host has not reported a usable viewport
    #[error("no viewport available")]
    NoViewport,

    /// A node index outside the current graph
    #[error("unknown node index: {0}")]
    UnknownNode(usize),

    /// Nothing has been shown yet, or the session is closed
    #[error("no active graph")]
    NoActiveGraph,

    #[error(transparent)]
    Composer(#[from] ComposerError),
}

/// Synthetic frame length for headless layout
pub const HEADLESS_FRAME: Duration = Duration::from_millis(16);

/// Fires once, `delay` after the most recent `schedule`
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    due: Option<Duration>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    pub fn schedule(&mut self, now: Duration) {
        self.due = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// True once the quiet period has elapsed; disarms itself
    pub fn fire(&mut self, now: Duration) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// A concept-map panel
#[derive(Debug)]
pub struct GraphSession {
    settings: Settings,
    extractor: ConceptExtractor,
    rng: StdRng,
    viewport: Option<Viewport>,
    last_graph: Option<ConceptGraph>,
    simulation: Option<ForceSimulation>,
    interaction: InteractionController,
    resize: Debouncer,
    pending_viewport: Option<Viewport>,
    stream_buffer: String,
}

impl GraphSession {
    pub fn new(settings: Settings, rng: StdRng) -> Self {
        Self {
            extractor: ConceptExtractor::new(settings.extractor.clone()),
            interaction: InteractionController::new(settings.interaction.clone()),
            resize: Debouncer::new(Duration::from_millis(settings.session.resize_debounce_ms)),
            settings,
            rng,
            viewport: None,
            last_graph: None,
            simulation: None,
            pending_viewport: None,
            stream_buffer: String::new(),
        }
    }

    pub fn with_seed(settings: Settings, seed: u64) -> Self {
        Self::new(settings, StdRng::seed_from_u64(seed))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Set the viewport immediately, without relayout
    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    pub fn last_graph(&self) -> Option<&ConceptGraph> {
        self.last_graph.as_ref()
    }

    pub fn simulation(&self) -> Option<&ForceSimulation> {
        self.simulation.as_ref()
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut InteractionController {
        &mut self.interaction
    }

    /// Extract a graph from `text` and show it. Extraction problems degrade
    /// to the fallback graph.
    pub fn generate_from_text(
        &mut self,
        text: &str,
        now: Duration,
    ) -> Result<SimulationHandle, SessionError> {
        let graph = match self.extractor.extract(text, &mut self.rng) {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(%err, "extraction failed, showing fallback graph");
                ConceptGraph::fallback()
            }
        };
        self.show_graph(graph, now)
    }

    /// Replace whatever is shown with `graph`.
    ///
    /// The previous simulation is stopped before anything else, so a missing
    /// viewport leaves nothing running.
    pub fn show_graph(
        &mut self,
        mut graph: ConceptGraph,
        now: Duration,
    ) -> Result<SimulationHandle, SessionError> {
        if let Some(mut previous) = self.simulation.take() {
            previous.stop(StopReason::Replaced);
        }
        self.interaction.reset();
        self.last_graph = Some(graph.clone());

        let viewport = self
            .viewport
            .filter(Viewport::is_usable)
            .ok_or(SessionError::NoViewport)?;

        layout::place(&mut graph.nodes, viewport, &self.settings.layout);
        let simulation =
            ForceSimulation::new(&graph, viewport, self.settings.simulation.clone(), now);
        let handle = simulation.handle();
        tracing::debug!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            simulation = handle.id(),
            "showing graph"
        );
        self.simulation = Some(simulation);
        Ok(handle)
    }

    /// Lay out the last graph again, e.g. for a new viewport
    pub fn regenerate_last_layout(
        &mut self,
        now: Duration,
    ) -> Result<SimulationHandle, SessionError> {
        let graph = self.last_graph.clone().ok_or(SessionError::NoActiveGraph)?;
        self.show_graph(graph, now)
    }

    /// Debounced viewport change
    pub fn resize(&mut self, viewport: Viewport, now: Duration) {
        self.pending_viewport = Some(viewport);
        self.resize.schedule(now);
    }

    /// Append a chunk of a streaming reply. The shown graph is left alone
    /// until [`finish_stream`](Self::finish_stream).
    pub fn stream_text(&mut self, chunk: &str) {
        self.stream_buffer.push_str(chunk);
    }

    /// Text streamed since the last `finish_stream`
    pub fn streamed_text(&self) -> &str {
        &self.stream_buffer
    }

    /// End the stream and build one graph from the complete reply
    pub fn finish_stream(
        &mut self,
        now: Duration,
    ) -> Result<Option<SimulationHandle>, SessionError> {
        let text = std::mem::take(&mut self.stream_buffer);
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.generate_from_text(&text, now).map(Some)
    }

    /// One host turn: a due resize, a due drag release, then one tick.
    /// `None` while nothing is shown.
    pub fn frame(&mut self, now: Duration) -> Option<TickEvent> {
        if self.resize.fire(now) {
            if let Some(viewport) = self.pending_viewport.take() {
                self.viewport = Some(viewport);
            }
            if self.last_graph.is_some() {
                if let Err(err) = self.regenerate_last_layout(now) {
                    tracing::warn!(%err, "relayout after resize failed");
                }
            }
        }

        let simulation = self.simulation.as_mut()?;
        self.interaction.poll(simulation, now);
        Some(simulation.tick(now))
    }

    /// Run frames on a synthetic clock until the simulation stops. Returns the
    /// last event and the clock it ended at.
    pub fn settle(&mut self, start: Duration, frame: Duration) -> (Option<TickEvent>, Duration) {
        let mut now = start;
        let mut last = None;
        for _ in 0..self.settings.simulation.max_headless_ticks {
            now += frame;
            last = self.frame(now);
            if !matches!(last, Some(TickEvent::Ticked | TickEvent::Idle)) {
                break;
            }
        }
        (last, now)
    }

    fn active(
        simulation: &mut Option<ForceSimulation>,
        node: usize,
    ) -> Result<&mut ForceSimulation, SessionError> {
        let simulation = simulation.as_mut().ok_or(SessionError::NoActiveGraph)?;
        if simulation.node(node).is_none() {
            return Err(SessionError::UnknownNode(node));
        }
        Ok(simulation)
    }

    pub fn drag_start(&mut self, node: usize) -> Result<(), SessionError> {
        let simulation = Self::active(&mut self.simulation, node)?;
        self.interaction.drag_start(simulation, node);
        Ok(())
    }

    /// Drag to a world-space point; returns the clamped position
    pub fn drag_move(&mut self, node: usize, x: f32, y: f32) -> Result<(f32, f32), SessionError> {
        let simulation = Self::active(&mut self.simulation, node)?;
        self.interaction
            .drag_move(simulation, node, x, y)
            .ok_or(SessionError::UnknownNode(node))
    }

    pub fn drag_end(&mut self, node: usize, now: Duration) -> Result<(), SessionError> {
        Self::active(&mut self.simulation, node)?;
        self.interaction.drag_end(node, now);
        Ok(())
    }

    pub fn hover_enter(&mut self, node: usize) -> Result<(), SessionError> {
        let simulation = Self::active(&mut self.simulation, node)?;
        self.interaction.hover_enter(simulation, node);
        Ok(())
    }

    pub fn hover_leave(&mut self) {
        if let Some(simulation) = self.simulation.as_mut() {
            self.interaction.hover_leave(simulation);
        }
    }

    /// Open the composer for `node`, anchored inside the viewport
    pub fn click(&mut self, node: usize) -> Result<Composer, SessionError> {
        let container = self.viewport.ok_or(SessionError::NoViewport)?;
        let simulation = self.simulation.as_ref().ok_or(SessionError::NoActiveGraph)?;
        self.interaction
            .click(simulation, node, container)
            .cloned()
            .ok_or(SessionError::UnknownNode(node))
    }

    pub fn composer_input(&mut self, text: &str) -> Result<(), SessionError> {
        let composer = self
            .interaction
            .composer_mut()
            .ok_or(ComposerError::NotOpen)?;
        composer.set_text(text);
        Ok(())
    }

    pub fn composer_key(
        &mut self,
        key: ComposerKey,
        now: Duration,
        sink: &mut dyn QuerySink,
    ) -> Result<ComposerOutcome, SessionError> {
        Ok(self.interaction.composer_key(key, now, sink)?)
    }

    pub fn submit_composer(
        &mut self,
        now: Duration,
        sink: &mut dyn QuerySink,
    ) -> Result<ComposerOutcome, SessionError> {
        Ok(self.interaction.submit_composer(now, sink)?)
    }

    /// Escape or a click outside the composer
    pub fn dismiss_composer(&mut self) -> bool {
        self.interaction.dismiss_composer()
    }

    /// Node under a screen point, through the current pan and zoom
    pub fn node_at(&self, sx: f32, sy: f32) -> Option<usize> {
        let (x, y) = self.interaction.transform().invert(sx, sy);
        self.simulation.as_ref()?.node_at(x, y)
    }

    pub fn highlight(&self) -> Option<Highlight> {
        let simulation = self.simulation.as_ref()?;
        Some(self.interaction.highlight(simulation))
    }

    /// The shown graph with current positions
    pub fn snapshot(&self) -> Option<ConceptGraph> {
        let mut graph = self.last_graph.clone()?;
        if let Some(simulation) = &self.simulation {
            simulation.write_back(&mut graph);
        }
        Some(graph)
    }

    /// Extract, lay out and settle `text` on a synthetic clock; the session
    /// viewport falls back to the configured one
    pub fn render_text(&mut self, text: &str) -> Result<ConceptGraph, SessionError> {
        let graph = match self.extractor.extract(text, &mut self.rng) {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(%err, "extraction failed, rendering fallback graph");
                ConceptGraph::fallback()
            }
        };
        self.render_graph(graph)
    }

    /// Lay out and settle an existing graph headlessly
    pub fn render_graph(&mut self, graph: ConceptGraph) -> Result<ConceptGraph, SessionError> {
        if self.viewport.is_none() {
            self.viewport = Some(self.settings.viewport);
        }
        self.show_graph(graph, Duration::ZERO)?;
        let (event, _) = self.settle(Duration::ZERO, HEADLESS_FRAME);
        tracing::debug!(?event, "headless layout finished");
        self.snapshot().ok_or(SessionError::NoActiveGraph)
    }

    /// Stop everything; the session can show a new graph afterwards
    pub fn close(&mut self) {
        if let Some(mut simulation) = self.simulation.take() {
            simulation.stop(StopReason::Closed);
        }
        self.interaction.reset();
        self.resize.cancel();
        self.stream_buffer.clear();
        self.pending_viewport = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::DragState;
    use crate::model::Level;

    const FRAME: Duration = Duration::from_millis(16);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn session(width: f32, height: f32) -> GraphSession {
        let mut session = GraphSession::with_seed(Settings::default(), 7);
        session.set_viewport(Some(Viewport::new(width, height)));
        session
    }

    const TEXT: &str = "Rust 的所有权系统 ownership borrowing lifetimes 借用检查器 \
                        ownership borrowing 所有权系统 cargo crates";

    #[test]
    fn replacing_a_graph_stops_the_previous_simulation() {
        let mut session = session(800.0, 600.0);
        let first = session.generate_from_text(TEXT, ms(0)).unwrap();
        assert!(first.is_live());

        let second = session.generate_from_text("Vue React JavaScript 组件开发", ms(10)).unwrap();
        assert!(!first.is_live());
        assert!(second.is_live());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn missing_viewport_fails_without_leaking() {
        let mut session = session(800.0, 600.0);
        let first = session.generate_from_text(TEXT, ms(0)).unwrap();

        session.set_viewport(None);
        let err = session.generate_from_text(TEXT, ms(10)).unwrap_err();
        assert_eq!(err, SessionError::NoViewport);
        assert!(!first.is_live());
        assert!(session.simulation().is_none());
        assert!(session.last_graph().is_some());
        assert_eq!(session.frame(ms(20)), None);
    }

    #[test]
    fn regenerate_requires_a_graph() {
        let mut session = session(800.0, 600.0);
        assert_eq!(
            session.regenerate_last_layout(ms(0)).unwrap_err(),
            SessionError::NoActiveGraph
        );
        session.generate_from_text(TEXT, ms(0)).unwrap();
        let before = session.last_graph().cloned();
        session.regenerate_last_layout(ms(5)).unwrap();
        assert_eq!(session.last_graph().cloned(), before);
    }

    #[test]
    fn resize_is_debounced() {
        let mut session = session(800.0, 600.0);
        let first = session.generate_from_text(TEXT, ms(0)).unwrap();

        session.resize(Viewport::new(400.0, 400.0), ms(100));
        session.resize(Viewport::new(500.0, 500.0), ms(200));
        session.frame(ms(499));
        assert!(first.is_live());
        assert_eq!(session.viewport(), Some(Viewport::new(800.0, 600.0)));

        session.frame(ms(500));
        assert!(!first.is_live());
        assert_eq!(session.viewport(), Some(Viewport::new(500.0, 500.0)));
        assert_eq!(
            session.simulation().map(|s| s.viewport()),
            Some(Viewport::new(500.0, 500.0))
        );
    }

    #[test]
    fn streaming_builds_one_graph_and_keeps_interaction() {
        let mut session = session(800.0, 600.0);
        let shown = session.generate_from_text(TEXT, ms(0)).unwrap();
        session.click(0).unwrap();
        session.composer_input("这个概念是什么").unwrap();
        session.drag_start(1).unwrap();

        session.stream_text("Vue React ");
        session.frame(ms(1000));
        session.stream_text("JavaScript 组件 状态管理");
        // a long pause mid-reply
        session.frame(ms(1400));
        session.frame(ms(2000));

        assert!(shown.is_live());
        assert_eq!(session.simulation().map(|s| s.handle().id()), Some(shown.id()));
        assert_eq!(session.interaction().drag(), DragState::Dragging { node: 1 });
        assert_eq!(
            session.interaction().composer().map(|c| c.text()),
            Some("这个概念是什么")
        );
        assert_eq!(session.streamed_text(), "Vue React JavaScript 组件 状态管理");

        session.stream_text(" Vue 路由 Vue");
        let finished = session.finish_stream(ms(2100)).unwrap().unwrap();
        assert!(!shown.is_live());
        assert!(finished.is_live());
        assert_eq!(session.simulation().map(|s| s.handle().id()), Some(finished.id()));
        assert!(session.last_graph().unwrap().index_of("Vue").is_some());
        assert_eq!(session.streamed_text(), "");

        // nothing left to build
        session.frame(ms(3000));
        assert!(finished.is_live());
        assert_eq!(session.finish_stream(ms(3100)).unwrap().map(|h| h.id()), None);
    }

    #[test]
    fn tech_terms_become_core_concepts() {
        let mut session = session(800.0, 600.0);
        let text = ["Vue React JavaScript 前端 开发 组件 状态管理"; 3].join(" ");
        session.generate_from_text(&text, ms(0)).unwrap();
        let graph = session.snapshot().unwrap();
        let vue = &graph.nodes[graph.index_of("Vue").unwrap()];
        assert_eq!(vue.level, Level::Core);
    }

    #[test]
    fn drag_and_release_inside_bounds() {
        let mut session = session(600.0, 600.0);
        session.generate_from_text("", ms(0)).unwrap();

        session.drag_start(1).unwrap();
        assert_eq!(session.drag_move(1, 500.0, 500.0).unwrap(), (500.0, 500.0));
        session.drag_end(1, ms(100)).unwrap();

        let mut now = ms(100);
        while now < ms(400) {
            now += FRAME;
            session.frame(now);
        }
        assert_eq!(session.interaction().drag(), DragState::Free);

        let (_, _) = session.settle(now, FRAME);
        let graph = session.snapshot().unwrap();
        let node = &graph.nodes[1];
        assert!(node.fx.is_none() && node.fy.is_none());
        assert!((60.0..=540.0).contains(&node.x));
        assert!((60.0..=540.0).contains(&node.y));
    }

    #[test]
    fn unknown_nodes_are_rejected() {
        let mut session = session(600.0, 600.0);
        assert_eq!(session.drag_start(0), Err(SessionError::NoActiveGraph));
        session.generate_from_text("", ms(0)).unwrap();
        assert_eq!(session.drag_start(3), Err(SessionError::UnknownNode(3)));
        assert_eq!(session.hover_enter(9), Err(SessionError::UnknownNode(9)));
        assert_eq!(session.click(5).unwrap_err(), SessionError::UnknownNode(5));
    }

    #[test]
    fn empty_composer_never_reaches_the_sink() {
        let mut session = session(600.0, 600.0);
        session.generate_from_text("", ms(0)).unwrap();
        session.click(0).unwrap();
        session.composer_input("   ").unwrap();

        let mut calls = 0;
        let mut sink = |_: String| calls += 1;
        let err = session
            .composer_key(ComposerKey::Enter { shift: false }, ms(10), &mut sink)
            .unwrap_err();
        assert_eq!(err, SessionError::Composer(ComposerError::EmptyQuery));
        assert_eq!(calls, 0);
        assert!(session.interaction().composer().is_some());
    }

    #[test]
    fn composer_submits_follow_up() {
        let mut session = session(600.0, 600.0);
        session.generate_from_text("", ms(0)).unwrap();
        session.click(0).unwrap();
        session.composer_input("展开讲讲").unwrap();

        let mut sent = Vec::new();
        let mut sink = |q: String| sent.push(q);
        session.submit_composer(ms(10), &mut sink).unwrap();
        assert_eq!(sent, vec!["关于\"测试节点\"：展开讲讲".to_string()]);
    }

    #[test]
    fn settle_stops_and_close_kills_the_handle() {
        let mut session = session(800.0, 600.0);
        let handle = session.generate_from_text(TEXT, ms(0)).unwrap();
        let (event, _) = session.settle(ms(0), FRAME);
        assert!(matches!(event, Some(TickEvent::Stopped(_))));

        let handle2 = session.regenerate_last_layout(ms(5000)).unwrap();
        assert!(!handle.is_live());
        session.close();
        assert!(!handle2.is_live());
        assert!(session.simulation().is_none());
    }

    #[test]
    fn render_text_uses_configured_viewport() {
        let mut settings = Settings::default();
        settings.viewport = Viewport::new(640.0, 480.0);
        let mut session = GraphSession::with_seed(settings, 3);

        let graph = session.render_text(TEXT).unwrap();
        assert_eq!(session.viewport(), Some(Viewport::new(640.0, 480.0)));
        assert!(!graph.nodes.is_empty());
        for node in &graph.nodes {
            assert!((60.0..=580.0).contains(&node.x), "{} x={}", node.id, node.x);
            assert!((60.0..=420.0).contains(&node.y), "{} y={}", node.id, node.y);
        }
        assert!(!session.simulation().unwrap().is_running());
    }

    #[test]
    fn render_graph_rejects_unusable_viewport() {
        let mut session = session(0.0, 0.0);
        assert_eq!(
            session.render_graph(ConceptGraph::fallback()).unwrap_err(),
            SessionError::NoViewport
        );
    }

    #[test]
    fn node_at_goes_through_the_transform() {
        let mut session = session(600.0, 600.0);
        session.generate_from_text("", ms(0)).unwrap();
        // fallback root starts alone at the centre
        assert_eq!(session.node_at(300.0, 300.0), Some(0));

        session.interaction_mut().transform_mut().pan(100.0, 0.0);
        assert_eq!(session.node_at(400.0, 300.0), Some(0));
        assert_eq!(session.node_at(5.0, 5.0), None);
    }
}

//! Heuristic concept extraction
//!
//! Turns free text into a small leveled concept graph. Extraction is frequency
//! based: tokens are counted across three overlapping passes, filtered through
//! stop-word and code-keyword lists, boosted toward technical vocabulary and
//! ranked. Nothing here can fail on bad input; degenerate text yields
//! [`ConceptGraph::fallback`].

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{ConceptEdge, ConceptGraph, ConceptNode, EdgeKind, GraphError, Level};

/// Function words in Chinese and English, compared case-insensitively
const STOP_WORDS: &[&str] = &[
    // Chinese
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也", "很",
    "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "来", "对", "那", "这", "它", "但",
    "而", "或", "因为", "所以", "如果", "虽然", "可以", "应该", "能够", "需要", "通过", "使用",
    "进行", "实现", "提供", "包含", "主要", "重要", "基本", "简单", "复杂", "特别", "一般", "通常",
    "经常", "可能", "比如", "例如", "包括", "特别是", "尤其是", "另外", "此外", "而且", "同时",
    // English
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "this", "that", "these", "those",
    "can", "could", "will", "would", "should", "do", "does", "did", "get", "got", "make", "made",
    "take", "took", "come", "came", "go", "went", "see", "saw", "know", "knew", "think", "thought",
    "say", "said", "work", "worked", "way", "ways", "time", "times", "year", "years", "day", "days",
    "new", "old", "good", "bad", "big", "small", "long", "short", "high", "low", "first", "last",
    "next", "some", "any", "all", "each", "every", "other", "another", "much", "many", "more",
    "most", "less", "few", "several", "both", "either", "neither",
];

/// Keywords that show up in pasted code and carry no topic
const CODE_WORDS: &[&str] = &[
    "function", "return", "var", "let", "const", "if", "else", "for", "while", "class", "public",
    "private", "static",
];

/// Substrings that double a token's count
const TECH_TERMS: &[&str] = &[
    "vue", "react", "javascript", "python", "css", "html", "node", "api", "http", "json", "xml",
    "sql", "database",
];

/// Hard cap on concepts per graph, whatever the settings ask for
pub const MAX_CONCEPTS: usize = 15;
const MIN_CONCEPT_CHARS: usize = 2;
const MAX_CONCEPT_CHARS: usize = 20;
const CJK_CHUNK: (usize, usize) = (2, 8);
const WORD_CHUNK: (usize, usize) = (3, 15);

/// How ranked concepts are layered and connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Strategy {
    /// Three levels by rank, deterministic sizes, chained core edges
    #[default]
    Ranked,
    /// Four fixed-size tiers with jittered sizes and denser core edges
    Tiered,
}

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Upper bound on the number of concepts kept, clamped to [`MAX_CONCEPTS`]
    pub max_concepts: usize,

    /// Normalized texts shorter than this produce the fallback graph
    pub min_text_chars: usize,

    /// Layering and edge rules
    pub strategy: Strategy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_concepts: MAX_CONCEPTS,
            min_text_chars: 10,
            strategy: Strategy::Ranked,
        }
    }
}

/// A token that survived filtering, with its boosted count and rank score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub count: u32,
    pub score: u32,
}

impl Candidate {
    fn new(text: String, raw_count: u32) -> Self {
        let lower = text.to_lowercase();
        let count = if TECH_TERMS.iter().any(|term| lower.contains(term)) {
            raw_count * 2
        } else {
            raw_count
        };
        let len = text.chars().count();
        let score = count + u32::from(len > 2) + u32::from(len > 4);
        Self { text, count, score }
    }
}

/// Extracts concept graphs from text
#[derive(Debug, Clone, Default)]
pub struct ConceptExtractor {
    config: ExtractorConfig,
}

impl ConceptExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract a concept graph from `text`.
    ///
    /// The random source only feeds exploratory `related` edges and, for the
    /// tiered strategy, size jitter. Short or concept-free text returns the
    /// fallback graph.
    ///
    /// # Errors
    /// Returns a [`GraphError`] if the assembled graph is inconsistent, which
    /// callers treat like degenerate input.
    pub fn extract<R: Rng + ?Sized>(
        &self,
        text: &str,
        rng: &mut R,
    ) -> Result<ConceptGraph, GraphError> {
        let normalized = normalize(text);
        let chars = normalized.chars().count();
        if chars < self.config.min_text_chars {
            tracing::debug!(chars, "text too short, using fallback graph");
            return Ok(ConceptGraph::fallback());
        }

        let limit = self.config.max_concepts.min(MAX_CONCEPTS);
        let candidates = rank_candidates(&normalized, limit);
        if candidates.is_empty() {
            tracing::debug!("no concepts survived filtering, using fallback graph");
            return Ok(ConceptGraph::fallback());
        }

        let graph = match self.config.strategy {
            Strategy::Ranked => build_ranked(&candidates, rng)?,
            Strategy::Tiered => build_tiered(&candidates, rng)?,
        };
        tracing::debug!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            strategy = ?self.config.strategy,
            "extracted concept graph"
        );
        Ok(graph)
    }
}

/// CJK unified ideographs in the common block
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Replace everything but ideographs, ASCII alphanumerics and intra-token dots
/// with single spaces, trimmed.
pub fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut gap = false;

    for (i, &c) in chars.iter().enumerate() {
        let dotted = c == '.'
            && i > 0
            && chars[i - 1].is_ascii_alphanumeric()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphanumeric());

        if is_cjk(c) || c.is_ascii_alphanumeric() || dotted {
            if gap && !out.is_empty() {
                out.push(' ');
            }
            gap = false;
            out.push(c);
        } else {
            gap = true;
        }
    }
    out
}

/// Maximal runs of characters matching `pred`
fn runs(text: &str, pred: impl Fn(char) -> bool) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (pred(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push(&text[s..i]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}

/// Greedy chunks of at most `max` chars, dropping a tail shorter than `min`
fn chunks(run: &str, (min, max): (usize, usize)) -> Vec<&str> {
    let bounds: Vec<usize> = run
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(run.len()))
        .collect();
    let char_count = bounds.len() - 1;

    (0..char_count)
        .step_by(max)
        .map(|start| (start, (start + max).min(char_count)))
        .filter(|(start, end)| end - start >= min)
        .map(|(start, end)| &run[bounds[start]..bounds[end]])
        .collect()
}

/// Tokens from the three overlapping passes, in pass order: ideograph runs,
/// ASCII words, then alphanumeric tokens (dots allowed inside).
pub fn tokenize(normalized: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for run in runs(normalized, is_cjk) {
        tokens.extend(chunks(run, CJK_CHUNK));
    }
    for run in runs(normalized, |c| c.is_ascii_alphabetic()) {
        tokens.extend(chunks(run, WORD_CHUNK));
    }
    tokens.extend(runs(normalized, |c| c.is_ascii_alphanumeric() || c == '.'));
    tokens
}

/// Whether a token may become a concept
pub fn is_valid_concept(word: &str) -> bool {
    let len = word.chars().count();
    if !(MIN_CONCEPT_CHARS..=MAX_CONCEPT_CHARS).contains(&len) {
        return false;
    }

    let lower = word.to_lowercase();
    if STOP_WORDS.contains(&lower.as_str()) || CODE_WORDS.contains(&lower.as_str()) {
        return false;
    }

    if word.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    word.chars().any(|c| is_cjk(c) || c.is_ascii_alphabetic())
}

/// Count, filter, boost and rank tokens of already normalized text.
///
/// Ties keep first-seen order.
pub fn rank_candidates(normalized: &str, limit: usize) -> Vec<Candidate> {
    let mut counts: Vec<(String, u32)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for token in tokenize(normalized) {
        if !is_valid_concept(token) {
            continue;
        }
        match index.get(token) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(token, counts.len());
                counts.push((token.to_string(), 1));
            }
        }
    }

    let mut candidates: Vec<Candidate> = counts
        .into_iter()
        .map(|(text, count)| Candidate::new(text, count))
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(limit);
    candidates
}

fn ranked_level(rank: usize) -> Level {
    match rank {
        0..=2 => Level::Core,
        3..=7 => Level::Secondary,
        _ => Level::Tertiary,
    }
}

fn ids_at(nodes: &[ConceptNode], level: Level) -> Vec<&str> {
    nodes
        .iter()
        .filter(|n| n.level == level)
        .map(|n| n.id.as_str())
        .collect()
}

fn build_ranked<R: Rng + ?Sized>(
    candidates: &[Candidate],
    rng: &mut R,
) -> Result<ConceptGraph, GraphError> {
    let nodes: Vec<ConceptNode> = candidates
        .iter()
        .enumerate()
        .map(|(rank, c)| {
            let size = (28.0 - rank as f32 * 1.2).max(12.0);
            ConceptNode::new(c.text.clone(), ranked_level(rank), (rank % 8) as u8 + 1, size)
        })
        .collect();

    let core = ids_at(&nodes, Level::Core);
    let secondary = ids_at(&nodes, Level::Secondary);
    let tertiary = ids_at(&nodes, Level::Tertiary);
    let mut links = Vec::new();

    for pair in core.windows(2) {
        links.push(ConceptEdge::new(pair[0], pair[1], EdgeKind::Core, 5.0));
    }

    for (i, source) in core.iter().enumerate() {
        for target in secondary.iter().skip(i * 2).take(2) {
            links.push(ConceptEdge::new(*source, *target, EdgeKind::Hierarchy, 3.0));
        }
    }

    for (source, target) in secondary.iter().zip(tertiary.iter()) {
        links.push(ConceptEdge::new(*source, *target, EdgeKind::Application, 2.0));
    }

    let n = nodes.len();
    if n > 3 {
        for _ in 0..(n / 3).min(3) {
            let a = rng.gen_range(0..n);
            let b = rng.gen_range(0..n);
            if a != b {
                links.push(ConceptEdge::new(
                    nodes[a].id.as_str(),
                    nodes[b].id.as_str(),
                    EdgeKind::Related,
                    1.0,
                ));
            }
        }
    }

    ConceptGraph::new(nodes, links)
}

/// Tier bounds for the tiered strategy: (level, first rank, end rank, base size, jitter span)
const TIERS: [(Level, usize, usize, f32, f32); 4] = [
    (Level::Core, 0, 3, 25.0, 10.0),
    (Level::Secondary, 3, 7, 18.0, 8.0),
    (Level::Tertiary, 7, 11, 12.0, 6.0),
    (Level::Peripheral, 11, usize::MAX, 8.0, 4.0),
];

fn build_tiered<R: Rng + ?Sized>(
    candidates: &[Candidate],
    rng: &mut R,
) -> Result<ConceptGraph, GraphError> {
    let mut nodes = Vec::with_capacity(candidates.len());
    for (level, start, end, base, span) in TIERS {
        let tier = &candidates[start.min(candidates.len())..end.min(candidates.len())];
        // Jitter is sorted so size never grows with rank inside a tier
        let mut jitter: Vec<f32> = tier.iter().map(|_| rng.r#gen::<f32>()).collect();
        jitter.sort_by(|a, b| b.total_cmp(a));
        for (candidate, j) in tier.iter().zip(jitter) {
            nodes.push(ConceptNode::new(
                candidate.text.clone(),
                level,
                level.number(),
                base + j * span,
            ));
        }
    }

    let core = ids_at(&nodes, Level::Core);
    let secondary = ids_at(&nodes, Level::Secondary);
    let tertiary = ids_at(&nodes, Level::Tertiary);
    let mut links = Vec::new();

    for (i, a) in core.iter().enumerate() {
        for b in &core[i + 1..] {
            let value = 8.0 + rng.r#gen::<f32>() * 4.0;
            links.push(ConceptEdge::new(*a, *b, EdgeKind::Core, value));
        }
    }

    for source in &core {
        for target in secondary.iter().take(2) {
            let value = 6.0 + rng.r#gen::<f32>() * 3.0;
            links.push(ConceptEdge::new(*source, *target, EdgeKind::Hierarchy, value));
        }
    }

    if let Some(target) = tertiary.first() {
        for source in &secondary {
            if rng.gen_bool(0.5) {
                let value = 4.0 + rng.r#gen::<f32>() * 2.0;
                links.push(ConceptEdge::new(*source, *target, EdgeKind::Application, value));
            }
        }
    }

    let n = nodes.len();
    for _ in 0..n.min(3) {
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        if a != b {
            let value = 2.0 + rng.r#gen::<f32>() * 2.0;
            links.push(ConceptEdge::new(
                nodes[a].id.as_str(),
                nodes[b].id.as_str(),
                EdgeKind::Related,
                value,
            ));
        }
    }

    ConceptGraph::new(nodes, links)
}

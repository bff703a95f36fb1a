//! Graph input and output
//!
//! Writers turn a positioned concept graph into a file format; the registry
//! picks one from an explicit format id or the output path's extension.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::layout::Viewport;
use crate::model::ConceptGraph;
use crate::simulation::Profile;
use crate::svg_writer::{HtmlWriter, SvgWriter};

/// Errors that can occur during reading or writing
#[derive(Error, Debug)]
pub enum IoError {
    /// The file format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine file format from path: {0}")]
    UnknownExtension(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parsing error occurred
    #[error("parse error: {0}")]
    Parse(String),

    /// A rendering/writing error occurred
    #[error("write error: {0}")]
    Write(String),
}

/// Result type for reader/writer operations
pub type IoResult<T> = Result<T, IoError>;

/// A writer outputs a concept graph in one format
pub trait Writer {
    /// Render the graph to a string
    fn render(&self, graph: &ConceptGraph) -> IoResult<String>;

    /// Identifier for this output format (e.g., "json", "svg")
    fn format_id(&self) -> &str;

    /// File extensions this writer produces
    fn supported_extensions(&self) -> &[&str];

    /// Write the graph to the output path
    fn write(&self, graph: &ConceptGraph, output: &Path) -> IoResult<()> {
        let content = self.render(graph)?;
        fs::write(output, content)?;
        tracing::info!(path = %output.display(), format = self.format_id(), "wrote graph");
        Ok(())
    }

    /// Check if this writer can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Pretty-printed JSON in the `{ nodes, links }` exchange format
#[derive(Debug, Default)]
pub struct JsonWriter;

impl JsonWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Writer for JsonWriter {
    fn render(&self, graph: &ConceptGraph) -> IoResult<String> {
        serde_json::to_string_pretty(graph).map_err(|e| IoError::Write(e.to_string()))
    }

    fn format_id(&self) -> &str {
        "json"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}

/// Registry of available writers
pub struct FormatRegistry {
    writers: Vec<Box<dyn Writer>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            writers: Vec::new(),
        }
    }

    /// Create a registry with the JSON, SVG and HTML writers, drawing on a
    /// `viewport`-sized canvas in the `profile` look
    pub fn with_defaults(viewport: Viewport, profile: Profile) -> Self {
        let mut registry = Self::new();
        registry.register_writer(Box::new(JsonWriter::new()));
        registry.register_writer(Box::new(SvgWriter::new(viewport, profile)));
        registry.register_writer(Box::new(HtmlWriter::new(viewport, profile)));
        registry
    }

    /// Register a writer
    pub fn register_writer(&mut self, writer: Box<dyn Writer>) {
        self.writers.push(writer);
    }

    /// Find a writer by format ID
    pub fn writer_for_format(&self, format_id: &str) -> Option<&dyn Writer> {
        self.writers
            .iter()
            .find(|w| w.format_id().eq_ignore_ascii_case(format_id))
            .map(|w| w.as_ref())
    }

    /// Get file extension from a path
    pub fn extension_from_path(path: &Path) -> Option<&str> {
        path.extension().and_then(|e| e.to_str())
    }

    /// Find a writer for the given path based on its extension
    pub fn writer_for_path(&self, path: &Path) -> IoResult<&dyn Writer> {
        let ext = Self::extension_from_path(path)
            .ok_or_else(|| IoError::UnknownExtension(path.display().to_string()))?;

        self.writers
            .iter()
            .find(|w| w.supports_extension(ext))
            .map(|w| w.as_ref())
            .ok_or_else(|| IoError::UnsupportedFormat(ext.to_string()))
    }
}

/// Read a UTF-8 text file
pub fn read_text(path: &Path) -> IoResult<String> {
    Ok(fs::read_to_string(path)?)
}

/// Read a graph in the JSON exchange format.
///
/// Edges pointing at unknown nodes are dropped; duplicate ids are an error.
pub fn read_graph(path: &Path) -> IoResult<ConceptGraph> {
    let content = fs::read_to_string(path)?;
    let mut graph: ConceptGraph =
        serde_json::from_str(&content).map_err(|e| IoError::Parse(e.to_string()))?;
    graph.retain_resolved_links();
    graph
        .validate()
        .map_err(|e| IoError::Parse(e.to_string()))?;
    Ok(graph)
}

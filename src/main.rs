use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use conceptmap::config::Settings;
use conceptmap::extractor::{ConceptExtractor, Strategy};
use conceptmap::io::{self, FormatRegistry, JsonWriter, Writer};
use conceptmap::model::ConceptGraph;
use conceptmap::session::GraphSession;
use conceptmap::simulation::Profile;

mod server;

/// Turn free text into a laid-out concept map.
#[derive(Parser)]
#[command(name = "conceptmap")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for the random source
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Concept ranking strategy
    #[arg(long, global = true, value_enum)]
    strategy: Option<Strategy>,

    /// Force and style preset
    #[arg(long, global = true, value_enum)]
    profile: Option<Profile>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract concepts without layout
    Extract {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract, lay out and settle a graph, then write it
    Render {
        /// Input text file, or a graph in JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (.svg, .html or .json)
        #[arg(short, long)]
        output: PathBuf,

        /// Canvas width
        #[arg(long)]
        width: Option<f32>,

        /// Canvas height
        #[arg(long)]
        height: Option<f32>,

        /// Output format, overriding the extension
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Start development server with hot reload
    Serve {
        /// Input text file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the rendered page
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Port to run the server on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

impl Cli {
    /// Settings file merged with the global flags
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(seed) = self.seed {
            settings.session.seed = Some(seed);
        }
        if let Some(strategy) = self.strategy {
            settings.extractor.strategy = strategy;
        }
        if let Some(profile) = self.profile {
            settings.simulation.profile = profile;
        }
        Ok(settings)
    }
}

pub(crate) fn seed_or_clock(settings: &Settings) -> u64 {
    settings.session.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    })
}

fn extract(settings: &Settings, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let text = io::read_text(input).with_context(|| format!("reading {}", input.display()))?;
    let mut rng = StdRng::seed_from_u64(seed_or_clock(settings));
    let graph = ConceptExtractor::new(settings.extractor.clone())
        .extract(&text, &mut rng)
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "extraction failed, writing fallback graph");
            ConceptGraph::fallback()
        });

    let writer = JsonWriter::new();
    match output {
        Some(path) => writer.write(&graph, path)?,
        None => println!("{}", writer.render(&graph)?),
    }
    Ok(())
}

fn render(
    settings: &Settings,
    input: &Path,
    output: &Path,
    format: Option<&str>,
) -> anyhow::Result<()> {
    let registry = FormatRegistry::with_defaults(settings.viewport, settings.simulation.profile);
    let writer = match format {
        Some(id) => registry
            .writer_for_format(id)
            .ok_or_else(|| anyhow::anyhow!("unsupported format: {id}"))?,
        None => registry.writer_for_path(output)?,
    };

    let mut session = GraphSession::with_seed(settings.clone(), seed_or_clock(settings));
    let is_graph = FormatRegistry::extension_from_path(input)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let graph = if is_graph {
        session.render_graph(io::read_graph(input)?)?
    } else {
        let text =
            io::read_text(input).with_context(|| format!("reading {}", input.display()))?;
        session.render_text(&text)?
    };

    writer.write(&graph, output)?;
    println!(
        "Rendered {} concepts to {}",
        graph.nodes.len(),
        output.display()
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut settings = cli.settings()?;

    match cli.command {
        Commands::Extract { input, output } => {
            extract(&settings, &input, output.as_deref())?;
        }
        Commands::Render {
            input,
            output,
            width,
            height,
            format,
        } => {
            if let Some(width) = width {
                settings.viewport.width = width;
            }
            if let Some(height) = height {
                settings.viewport.height = height;
            }
            render(&settings, &input, &output, format.as_deref())?;
        }
        Commands::Serve {
            input,
            output,
            port,
        } => {
            server::serve(settings, &input, &output, port).await?;
        }
    }

    Ok(())
}

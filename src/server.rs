use std::fs;
use std::path::{Path, PathBuf};

use axum::Router;
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_livereload::LiveReloadLayer;

use conceptmap::config::Settings;
use conceptmap::io::{self, Writer};
use conceptmap::session::GraphSession;
use conceptmap::svg_writer::HtmlWriter;

/// Re-render `output/index.html` from the input text
fn regenerate(session: &mut GraphSession, input: &Path, output: &Path) -> anyhow::Result<()> {
    let text = io::read_text(input)?;
    let graph = session.render_text(&text)?;

    let settings = session.settings();
    let title = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Concept map");
    let writer = HtmlWriter::new(settings.viewport, settings.simulation.profile).with_title(title);

    fs::create_dir_all(output)?;
    writer.write(&graph, &output.join("index.html"))?;
    Ok(())
}

/// Start the development server with hot reload
pub async fn serve(settings: Settings, input: &Path, output: &Path, port: u16) -> anyhow::Result<()> {
    let debounce = tokio::time::Duration::from_millis(settings.session.watch_debounce_ms);
    let seed = crate::seed_or_clock(&settings);
    let mut session = GraphSession::with_seed(settings, seed);

    regenerate(&mut session, input, output)?;
    println!("Rendered initial concept map in {}", output.display());

    let (tx, mut rx) = mpsc::channel::<()>(1);

    let input_name = input.file_name().map(|n| n.to_os_string());
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
        if let Ok(event) = res {
            let touches_input = input_name
                .as_ref()
                .is_none_or(|name| event.paths.iter().any(|p| p.file_name() == Some(name)));
            if touches_input && (event.kind.is_modify() || event.kind.is_create()) {
                let _ = tx.blocking_send(());
            }
        }
    })?;

    // Editors often replace the file, so watch its directory
    let watch_path = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;

    // The task owns the session from here on
    let input_for_regen = input.to_path_buf();
    let output_for_regen = output.to_path_buf();
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            tokio::time::sleep(debounce).await;
            while rx.try_recv().is_ok() {}

            match regenerate(&mut session, &input_for_regen, &output_for_regen) {
                Ok(()) => tracing::info!("regenerated concept map"),
                Err(e) => tracing::error!("error regenerating: {e:#}"),
            }
        }
    });

    let livereload = LiveReloadLayer::new();
    let reloader = livereload.reloader();

    let mut output_watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
        if let Ok(event) = res {
            if event.kind.is_modify() || event.kind.is_create() {
                reloader.reload();
            }
        }
    })?;
    output_watcher.watch(output, RecursiveMode::Recursive)?;

    let app = Router::new()
        .fallback_service(ServeDir::new(output))
        .layer(livereload);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Development server running at http://localhost:{port}");
    println!("Watching {} for changes...", input.display());
    println!("Press Ctrl+C to stop");

    let _watcher = watcher;
    let _output_watcher = output_watcher;

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regenerate_writes_index_html() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reply.txt");
        fs::write(&input, "Rust ownership borrowing lifetimes cargo crates traits").unwrap();
        let output = dir.path().join("site");

        let mut session = GraphSession::with_seed(Settings::default(), 1);
        regenerate(&mut session, &input, &output).unwrap();

        let html = fs::read_to_string(output.join("index.html")).unwrap();
        assert!(html.contains("<title>reply</title>"));
        assert!(html.contains("<svg xmlns"));
    }

    #[test]
    fn regenerate_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = GraphSession::with_seed(Settings::default(), 1);
        let result = regenerate(&mut session, &dir.path().join("gone.txt"), dir.path());
        assert!(result.is_err());
    }
}

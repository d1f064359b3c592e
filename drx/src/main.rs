//! DRX - A terminal viewer for rich-text documents with collapsible sections

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use drx_core::{html, json, markdown, CollapsibleHeading, Config, Document, Format};
use drx_tui::App;
use log::debug;
use std::path::PathBuf;

/// View and fold rich-text documents in the terminal
#[derive(Parser, Debug)]
#[command(name = "drx")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON or Markdown document
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Input format (guessed from the extension by default)
    #[arg(short, long, value_enum)]
    format: Option<InputFormat>,

    /// Print the document in another format and exit
    #[arg(short, long, value_enum)]
    export: Option<ExportFormat>,

    /// Use this configuration file instead of the default one
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    Json,
    Markdown,
}

impl From<InputFormat> for Format {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Json => Format::Json,
            InputFormat::Markdown => Format::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Json,
    Markdown,
    Html,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    let schema = CollapsibleHeading::new(&config.headings.levels).schema()?;
    let doc = Document::load(&args.file, args.format.map(Format::from), &schema)
        .with_context(|| format!("Failed to load document: {}", args.file.display()))?;
    debug!("Opened {} with {} blocks", doc.display_name(), doc.root.child_count());

    if let Some(export) = args.export {
        let output = match export {
            ExportFormat::Json => json::to_json(&doc.root)?,
            ExportFormat::Markdown => markdown::to_markdown(&doc.root, &schema),
            ExportFormat::Html => html::to_html(&doc.root, &schema),
        };
        print!("{}", output);
        return Ok(());
    }

    let app = App::new(config, doc).context("Failed to start editor")?;
    drx_tui::run(app).context("TUI application error")?;

    Ok(())
}

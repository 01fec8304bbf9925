//! storyline CLI: chapters, entities and key paragraphs from long-form documents.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use storyline::config::StoryConfig;
use storyline::pipeline::Pipeline;
use storyline::span::CharMap;

#[derive(Parser)]
#[command(name = "storyline", version, about = "Chapters, entities and key paragraphs from long-form documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the story as JSON.
    Process {
        /// PDF file, or JSON fragment dump.
        file: PathBuf,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file (stdout if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Extract and segment only, printing chapter and paragraph spans.
    Segment {
        /// PDF file, or JSON fragment dump.
        file: PathBuf,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print or save the default configuration.
    Config {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<StoryConfig> {
    match path {
        Some(path) => Ok(StoryConfig::load(path)?),
        None => Ok(StoryConfig::default()),
    }
}

/// First `max` characters of `text`, with an ellipsis if cut.
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            file,
            config,
            output,
        } => {
            let pipeline = Pipeline::from_config(load_config(config.as_deref())?);
            let story = pipeline.process_file(&file)?;
            let json = serde_json::to_string_pretty(&story).into_diagnostic()?;

            match output {
                Some(path) => {
                    std::fs::write(&path, json).into_diagnostic()?;
                    println!(
                        "Wrote {} chapters, {} paragraphs, {} entities to {}",
                        story.chapter_count(),
                        story.paragraph_count(),
                        story.entity_count(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }

        Commands::Segment { file, config } => {
            let pipeline = Pipeline::new(load_config(config.as_deref())?, Default::default());
            let segmentation = pipeline.segment_file(&file)?;
            let chars = CharMap::new(&segmentation.text);

            println!(
                "{} characters, {} chapters, {} paragraphs",
                chars.char_len(),
                segmentation.chapters.len(),
                segmentation.paragraphs.len()
            );
            for (c, chapter) in segmentation.chapters.iter().enumerate() {
                println!("\nChapter {} {chapter}", c + 1);
                for (p, paragraph) in segmentation
                    .paragraphs
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| chapter.contains(p))
                {
                    let text = chars.slice(&segmentation.text, *paragraph).unwrap_or_default();
                    println!("  {p:>5} {paragraph}  {}", preview(text, 60));
                }
            }
        }

        Commands::Config { output } => {
            let config = StoryConfig::default();
            match output {
                Some(path) => {
                    config.save(&path)?;
                    println!("Saved default configuration to {}", path.display());
                }
                None => print!("{}", config.to_toml()?),
            }
        }
    }

    Ok(())
}

//! Stage CLI: command-line interface for rendering card designs.
//!
//! Usage:
//!   stage render <DESIGN>     Render a design JSON file to PNG or JPEG
//!   stage presets             List the aspect-ratio presets

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stage",
    about = "Render social cards from design snapshots",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/stage/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a design to an image file
    Render {
        /// Path to the design JSON file
        design: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: png|jpg (defaults to the configured format)
        #[arg(long)]
        format: Option<String>,

        /// Lossy quality in (0, 1]
        #[arg(long)]
        quality: Option<f64>,

        /// Device pixel multiplier
        #[arg(long)]
        scale: Option<f64>,

        /// Logical output width
        #[arg(long, requires = "height", conflicts_with = "aspect")]
        width: Option<u32>,

        /// Logical output height
        #[arg(long, requires = "width", conflicts_with = "aspect")]
        height: Option<u32>,

        /// Aspect-ratio preset id (overrides the design's selection)
        #[arg(long)]
        aspect: Option<String>,

        /// User image placed centered on the stage when the design has no scene
        #[arg(long)]
        image: Option<PathBuf>,

        /// Also print the data URL to stdout
        #[arg(long)]
        data_url: bool,
    },

    /// List aspect-ratio presets
    Presets {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => stage_common::config::AppConfig::load_from(path)?,
        None => stage_common::config::AppConfig::load(),
    };
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    stage_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render {
            design,
            output,
            format,
            quality,
            scale,
            width,
            height,
            aspect,
            image,
            data_url,
        } => {
            let size = width.zip(height);
            commands::render::run(
                &config,
                commands::render::RenderArgs {
                    design,
                    output,
                    format,
                    quality,
                    scale,
                    size,
                    aspect,
                    image,
                    data_url,
                },
            )
            .await
        }
        Commands::Presets { json } => commands::presets::run(json),
    }
}

//! Glyphsmith CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config file
//! - `run`      Start the font-builder bot
//! - `build`    Assemble a font offline from a glyph manifest
//! - `doctor`   Diagnose configuration and storage

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::run::ChannelKind;

#[derive(Parser)]
#[command(
    name = "glyphsmith",
    about = "Glyphsmith — build TrueType fonts from SVG glyphs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.glyphsmith/config.toml
    #[arg(short, long, global = true, env = "GLYPHSMITH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Start the font-builder bot
    Run {
        /// Channel to serve
        #[arg(long, value_enum, default_value_t = ChannelKind::Telegram)]
        channel: ChannelKind,

        /// Where the cli channel writes finished fonts
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assemble a font from a manifest of SVG outlines
    Build {
        /// TOML manifest with [[glyph]] entries
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output file (defaults to font.file_name from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Diagnose configuration and storage
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config).await?,
        Commands::Run { channel, output } => commands::run::run(config, channel, output).await?,
        Commands::Build { manifest, output } => commands::build::run(config, &manifest, output).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}

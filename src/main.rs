use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campusboard::ai::pipeline::ContentPipeline;
use campusboard::{
    AiManager, ConfigLoader, ProviderRegistry, RateLimiter, ResponseCache, UpdateCategory,
};

/// Parse a category name from the command line
fn parse_category(s: &str) -> Result<UpdateCategory, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "campusboard")]
#[command(version, about = "AI content core for a college updates board")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Config file (default: layered lookup)")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter campusboard.toml in the current directory
    Init {
        #[arg(long, short, help = "Overwrite an existing config file")]
        force: bool,
    },

    /// Classify text into a board category
    Categorize {
        #[arg(help = "Text to classify")]
        text: Option<String>,
        #[arg(long, short, help = "Read the text from a file instead")]
        file: Option<PathBuf>,
    },

    /// Produce a title and description for text
    Format {
        #[arg(help = "Text to format")]
        text: Option<String>,
        #[arg(long, short, help = "Read the text from a file instead")]
        file: Option<PathBuf>,
        #[arg(long, value_parser = parse_category, help = "Skip classification and use this category")]
        category: Option<UpdateCategory>,
    },

    /// Run a multi-file submission through the full pipeline
    Process {
        #[arg(long, short = 'm', help = "Context message accompanying the files")]
        context: Option<String>,
        #[arg(help = "Files to extract and combine")]
        files: Vec<PathBuf>,
    },

    /// Extract text from one file (image files go through the vision path)
    Extract {
        file: PathBuf,
    },

    /// Show configured providers and their health
    Providers,
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Init writes a fresh config; don't require loading one first
    if let Commands::Init { force } = cli.command {
        let path = ConfigLoader::project_config_path();
        ConfigLoader::write_default(&path, force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let registry = Arc::new(ProviderRegistry::from_entries(&config.providers));
    let limiter = Arc::new(RateLimiter::new(config.limiter.max_concurrent));
    let manager = Arc::new(AiManager::new(
        Arc::clone(&registry),
        limiter,
        Duration::from_secs(config.fallback.cooldown_secs),
    ));
    let cache = Arc::new(ResponseCache::new(config.cache.capacity));
    let pipeline = ContentPipeline::new(Arc::clone(&manager), cache, config.format.clone());

    let rt = Runtime::new()?;
    match cli.command {
        Commands::Init { .. } => {} // handled above
        Commands::Categorize { text, file } => {
            rt.block_on(async {
                let input = campusboard::cli::commands::resolve_input(text, file).await?;
                campusboard::cli::commands::categorize(&pipeline, &input).await
            })?;
        }
        Commands::Format {
            text,
            file,
            category,
        } => {
            rt.block_on(async {
                let input = campusboard::cli::commands::resolve_input(text, file).await?;
                campusboard::cli::commands::format(&pipeline, &input, category).await
            })?;
        }
        Commands::Process { context, files } => {
            rt.block_on(campusboard::cli::commands::process(
                &pipeline, context, files,
            ))?;
        }
        Commands::Extract { file } => {
            rt.block_on(campusboard::cli::commands::extract(&pipeline, file))?;
        }
        Commands::Providers => {
            campusboard::cli::commands::providers(&manager);
        }
    }

    Ok(())
}

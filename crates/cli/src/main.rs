//! Dotprompt CLI
//!
//! Main entry point for the dotprompt command-line tool.
//! Resolves, inspects and renders `.prompt` templates.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ListCommand, MetadataCommand, PartialsCommand, RenderCommand};
use dotprompt_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Dotprompt CLI - resolve and render prompt templates
#[derive(Parser, Debug)]
#[command(name = "dotprompt")]
#[command(about = "Resolve and render .prompt templates", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOTPROMPT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOTPROMPT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Default model when the prompt names none
    #[arg(short, long, global = true, env = "DOTPROMPT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print fully resolved prompt metadata
    Metadata(MetadataCommand),

    /// List partials referenced by a prompt
    Partials(PartialsCommand),

    /// Render a prompt template
    Render(RenderCommand),

    /// List prompts in the workspace
    List(ListCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Load configuration for the selected workspace and config file
    let config = AppConfig::load_from(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(None, cli.model, cli.log_level, cli.verbose, cli.no_color);

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Default model: {:?}", config.default_model);

    let command_name = match &cli.command {
        Commands::Metadata(_) => "metadata",
        Commands::Partials(_) => "partials",
        Commands::Render(_) => "render",
        Commands::List(_) => "list",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Metadata(cmd) => cmd.execute(&config).await,
        Commands::Partials(cmd) => cmd.execute(&config).await,
        Commands::Render(cmd) => cmd.execute(&config).await,
        Commands::List(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

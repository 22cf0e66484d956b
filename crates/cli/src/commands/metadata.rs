//! Metadata command handler.
//!
//! Resolves a prompt's metadata and prints it as JSON.

use super::{load_overrides, SourceArgs};
use clap::Args;
use dotprompt::Dotprompt;
use dotprompt_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Print fully resolved prompt metadata
#[derive(Args, Debug)]
pub struct MetadataCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// YAML or JSON file with metadata overrides
    #[arg(short, long)]
    pub overrides: Option<PathBuf>,

    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

impl MetadataCommand {
    /// Execute the metadata command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing metadata command");
        tracing::debug!("Metadata command options: {:?}", self);

        let source = self.source.read(config)?;
        let overrides = load_overrides(self.overrides.as_deref())?;

        let dotprompt = Dotprompt::from_config(config)?;
        let metadata = dotprompt
            .render_metadata(&source, overrides.as_ref())
            .await?;

        tracing::debug!(
            "Resolved {} tool definitions",
            metadata.tool_defs.as_ref().map_or(0, Vec::len)
        );

        let output = if self.compact {
            serde_json::to_string(&metadata)?
        } else {
            serde_json::to_string_pretty(&metadata)?
        };
        println!("{}", output);

        Ok(())
    }
}

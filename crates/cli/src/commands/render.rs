//! Render command handler.
//!
//! Resolves metadata, preloads partials and renders the template body.

use super::{load_overrides, SourceArgs};
use clap::Args;
use dotprompt::Dotprompt;
use dotprompt_core::{config::AppConfig, AppError, AppResult};
use serde_json::Value;
use std::path::PathBuf;

/// Render a prompt template
#[derive(Args, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Input data as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub data: String,

    /// YAML or JSON file with metadata overrides
    #[arg(short, long)]
    pub overrides: Option<PathBuf>,

    /// Print the resolved metadata alongside the text as JSON
    #[arg(long)]
    pub json: bool,
}

impl RenderCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing render command");
        tracing::debug!("Render command options: {:?}", self);

        let data: Value = serde_json::from_str(&self.data)?;
        if !data.is_object() {
            return Err(AppError::Config(
                "--data must be a JSON object".to_string(),
            ));
        }

        let source = self.source.read(config)?;
        let overrides = load_overrides(self.overrides.as_deref())?;

        let dotprompt = Dotprompt::from_config(config)?;
        let rendered = dotprompt
            .render(&source, &data, overrides.as_ref())
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        } else {
            println!("{}", rendered.text);
        }

        Ok(())
    }
}

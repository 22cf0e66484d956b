//! Partials command handler.
//!
//! Lists the partials a prompt references.

use super::SourceArgs;
use clap::Args;
use dotprompt::{identify_partials, parse_document};
use dotprompt_core::{config::AppConfig, AppResult};

/// List partials referenced by a prompt
#[derive(Args, Debug)]
pub struct PartialsCommand {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl PartialsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing partials command");

        let source = self.source.read(config)?;
        let parsed = parse_document(&source)?;

        for name in identify_partials(&parsed.template) {
            println!("{}", name);
        }

        Ok(())
    }
}

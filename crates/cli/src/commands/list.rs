//! List command handler.
//!
//! Lists prompts (and optionally partials) in the workspace prompt directory.

use clap::Args;
use dotprompt::DirectoryPromptStore;
use dotprompt_core::{config::AppConfig, AppResult};

/// List prompts in the workspace
#[derive(Args, Debug)]
pub struct ListCommand {
    /// List partials instead of prompts
    #[arg(short, long)]
    pub partials: bool,
}

impl ListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing list command");

        let store = DirectoryPromptStore::new(&config.prompt_dir);
        let names = if self.partials {
            store.list_partials()?
        } else {
            store.list()?
        };

        if names.is_empty() {
            tracing::warn!("No prompts found in {:?}", store.dir());
        }

        for name in names {
            println!("{}", name);
        }

        Ok(())
    }
}

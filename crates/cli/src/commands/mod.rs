//! Command handlers for the Dotprompt CLI.
//!
//! This module organizes all CLI commands into separate submodules, plus the
//! source-loading helpers they share.

pub mod list;
pub mod metadata;
pub mod partials;
pub mod render;

// Re-export command types for convenience
pub use list::ListCommand;
pub use metadata::MetadataCommand;
pub use partials::PartialsCommand;
pub use render::RenderCommand;

use clap::Args;
use dotprompt::{metadata_from_map, DirectoryPromptStore, PromptMetadata};
use dotprompt_core::{config::AppConfig, AppError, AppResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Where to read a prompt from: a file, or a name in the prompt store.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Path to a .prompt file
    #[arg(required_unless_present = "name")]
    pub file: Option<PathBuf>,

    /// Prompt name in the workspace prompt directory
    #[arg(short, long, conflicts_with = "file")]
    pub name: Option<String>,

    /// Prompt variant (with --name)
    #[arg(long, requires = "name")]
    pub variant: Option<String>,
}

impl SourceArgs {
    /// Read the raw prompt text.
    pub fn read(&self, config: &AppConfig) -> AppResult<String> {
        if let Some(file) = &self.file {
            tracing::debug!("Reading prompt file {:?}", file);
            return std::fs::read_to_string(file).map_err(|e| {
                AppError::Prompt(format!("Failed to read prompt file {:?}: {}", file, e))
            });
        }

        let name = self
            .name
            .as_deref()
            .ok_or_else(|| AppError::Config("No prompt file or name provided".to_string()))?;

        DirectoryPromptStore::new(&config.prompt_dir).load(name, self.variant.as_deref())
    }
}

/// Load a metadata overrides file (YAML or JSON).
///
/// Keys are interpreted the same way as prompt front-matter.
pub fn load_overrides(path: Option<&Path>) -> AppResult<Option<PromptMetadata>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read overrides file {:?}: {}", path, e))
    })?;

    let map = match serde_yaml::from_str::<Value>(&contents)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(AppError::Config(format!(
                "Overrides file {:?} must contain a mapping, got: {}",
                path, other
            )));
        }
    };

    Ok(Some(metadata_from_map(map)?))
}

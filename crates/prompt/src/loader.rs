//! Directory-backed prompt store.
//!
//! Prompts live in `<dir>/<name>.prompt`, with variants in
//! `<dir>/<name>.<variant>.prompt`. Subdirectories are part of a prompt's
//! name (`support/triage`).
//!
//! Files whose name starts with `_` are partials: `_header.prompt` defines
//! the partial `header`. Partial names use `.` for subdirectories, so
//! `support/_tone.prompt` is referenced as `{{> support.tone}}`.

use crate::resolver::Resolver;
use async_trait::async_trait;
use dotprompt_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

const PROMPT_EXTENSION: &str = "prompt";

/// Loads prompt and partial sources from a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryPromptStore {
    dir: PathBuf,
}

impl DirectoryPromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the raw text of a prompt.
    ///
    /// # Example
    /// ```no_run
    /// use dotprompt::DirectoryPromptStore;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = DirectoryPromptStore::new(".dotprompt/prompts");
    /// let source = store.load("support/triage", Some("concise"))?;
    /// println!("{}", source);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(&self, name: &str, variant: Option<&str>) -> AppResult<String> {
        validate_name(name)?;
        let file_name = match variant {
            Some(variant) => format!("{}.{}.{}", name, variant, PROMPT_EXTENSION),
            None => format!("{}.{}", name, PROMPT_EXTENSION),
        };
        let path = self.dir.join(file_name);

        tracing::debug!("Loading prompt from: {:?}", path);

        if !path.exists() {
            return Err(AppError::Prompt(format!("Prompt file not found: {:?}", path)));
        }

        std::fs::read_to_string(&path)
            .map_err(|e| AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e)))
    }

    /// Load a partial's source, if the store has it.
    ///
    /// `a.b` is looked up as `_a.b.prompt` first, then as `a/_b.prompt`.
    pub fn load_partial(&self, name: &str) -> AppResult<Option<String>> {
        validate_partial_name(name)?;

        let Some(path) = self.partial_paths(name).into_iter().find(|p| p.exists()) else {
            return Ok(None);
        };

        tracing::debug!("Loading partial '{}' from: {:?}", name, path);

        let source = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Prompt(format!("Failed to read partial file {:?}: {}", path, e))
        })?;
        Ok(Some(source))
    }

    fn partial_paths(&self, name: &str) -> Vec<PathBuf> {
        let mut paths = vec![self.dir.join(partial_file_name(name))];
        if let Some((parent, base)) = name.rsplit_once('.') {
            let mut nested = self.dir.clone();
            nested.extend(parent.split('.'));
            paths.push(nested.join(partial_file_name(base)));
        }
        paths
    }

    /// List prompt names (without variants), sorted.
    pub fn list(&self) -> AppResult<Vec<String>> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|(stem, _)| !stem.starts_with('_'))
            .map(|(stem, rel)| {
                let name = stem.split('.').next().unwrap_or(&stem).to_string();
                join_relative(&rel, &name)
            })
            .collect();

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// List partial names, sorted.
    pub fn list_partials(&self) -> AppResult<Vec<String>> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .filter_map(|(stem, rel)| {
                stem.strip_prefix('_').map(|partial| {
                    if rel.is_empty() {
                        partial.to_string()
                    } else {
                        format!("{}.{}", rel.replace('/', "."), partial)
                    }
                })
            })
            .collect();

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// File stems of `.prompt` files with their parent directory relative to the store.
    fn entries(&self) -> AppResult<Vec<(String, String)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(PROMPT_EXTENSION) {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let rel = path
                .parent()
                .and_then(|p| p.strip_prefix(&self.dir).ok())
                .map(|p| {
                    p.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/")
                })
                .unwrap_or_default();

            entries.push((stem.to_string(), rel));
        }

        Ok(entries)
    }
}

#[async_trait]
impl Resolver<String> for DirectoryPromptStore {
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.load_partial(name)?)
    }
}

fn join_relative(rel: &str, name: &str) -> String {
    if rel.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", rel, name)
    }
}

fn partial_file_name(name: &str) -> String {
    format!("_{}.{}", name, PROMPT_EXTENSION)
}

/// Partial names are dot-separated segments of template-legal characters.
fn validate_partial_name(name: &str) -> AppResult<()> {
    let legal = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    if name.is_empty() || !name.split('.').all(|part| !part.is_empty() && part.chars().all(legal)) {
        return Err(AppError::Prompt(format!("Invalid partial name: {}", name)));
    }
    Ok(())
}

/// Reject names that would escape the store directory.
fn validate_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::Prompt("Prompt name cannot be empty".to_string()));
    }

    if name.split('/').any(|part| part == ".." || part.is_empty()) || name.starts_with('/') {
        return Err(AppError::Prompt(format!("Invalid prompt name: {}", name)));
    }

    Ok(())
}

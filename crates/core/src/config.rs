//! Configuration management for Dotprompt.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config files (.dotprompt/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources override earlier ones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default number of tool lookups allowed in flight for one resolution.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 16;

/// Main configuration for a Dotprompt session and the CLI around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .dotprompt/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Model used when neither the prompt nor the caller names one
    pub default_model: Option<String>,

    /// Default generation config per model name
    pub model_configs: HashMap<String, Map<String, Value>>,

    /// Statically registered JSON schemas, by name
    pub schemas: HashMap<String, Value>,

    /// Statically registered tool definitions (raw form)
    pub tools: Vec<Value>,

    /// Statically registered partial templates, by name
    pub partials: HashMap<String, String>,

    /// Directory holding `.prompt` files
    pub prompt_dir: PathBuf,

    /// Upper bound on concurrent tool lookups within one resolution
    pub max_concurrent_lookups: usize,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    default_model: Option<String>,
    #[serde(default)]
    model_configs: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    schemas: HashMap<String, Value>,
    #[serde(default)]
    tools: Vec<Value>,
    #[serde(default)]
    partials: HashMap<String, String>,
    prompts: Option<PromptsConfig>,
    resolution: Option<ResolutionConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PromptsConfig {
    directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionConfig {
    max_concurrent_lookups: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_workspace(workspace)
    }
}

impl AppConfig {
    /// Default configuration rooted at the given workspace.
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        let prompt_dir = workspace.join(".dotprompt/prompts");
        Self {
            workspace,
            config_file: None,
            default_model: None,
            model_configs: HashMap::new(),
            schemas: HashMap::new(),
            tools: Vec::new(),
            partials: HashMap::new(),
            prompt_dir,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }

    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `DOTPROMPT_WORKSPACE`: Override workspace path
    /// - `DOTPROMPT_CONFIG`: Path to config file
    /// - `DOTPROMPT_MODEL`: Default model
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use dotprompt_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Default model: {:?}", config.default_model);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(
            std::env::var("DOTPROMPT_WORKSPACE").ok().map(PathBuf::from),
            std::env::var("DOTPROMPT_CONFIG").ok().map(PathBuf::from),
        )
    }

    /// Load configuration for an explicit workspace and config file.
    ///
    /// Either may be `None`: the workspace defaults to the current directory
    /// and the config file to `<workspace>/.dotprompt/config.yaml`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = match workspace {
            Some(workspace) => Self::for_workspace(workspace),
            None => Self::default(),
        };
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.dotprompt_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(model) = std::env::var("DOTPROMPT_MODEL") {
            config.default_model = Some(model);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Merging config file {:?}", path);
        Ok(self.merge_file(config_file))
    }

    fn merge_file(&self, file: ConfigFile) -> Self {
        let mut result = self.clone();

        if file.default_model.is_some() {
            result.default_model = file.default_model;
        }

        // Per-model configs are merged key by key, file wins
        for (model, config) in file.model_configs {
            result
                .model_configs
                .entry(model)
                .or_default()
                .extend(config);
        }

        result.schemas.extend(file.schemas);
        result.tools.extend(file.tools);
        result.partials.extend(file.partials);

        if let Some(dir) = file.prompts.and_then(|p| p.directory) {
            result.prompt_dir = result.workspace.join(dir);
        }

        if let Some(limit) = file.resolution.and_then(|r| r.max_concurrent_lookups) {
            result.max_concurrent_lookups = limit;
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.prompt_dir = workspace.join(".dotprompt/prompts");
            self.workspace = workspace;
        }

        if let Some(model) = model {
            self.default_model = Some(model);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .dotprompt directory.
    pub fn dotprompt_dir(&self) -> PathBuf {
        self.workspace.join(".dotprompt")
    }

    /// Default generation config for a model, if any.
    pub fn model_config(&self, model: &str) -> Option<&Map<String, Value>> {
        self.model_configs.get(model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_lookups == 0 {
            return Err(AppError::Config(
                "resolution.maxConcurrentLookups must be at least 1".to_string(),
            ));
        }

        for (index, tool) in self.tools.iter().enumerate() {
            if tool.get("name").and_then(Value::as_str).is_none() {
                return Err(AppError::Config(format!(
                    "Tool entry {} is missing a string 'name'",
                    index
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::for_workspace("/tmp/ws");
        assert_eq!(config.default_model, None);
        assert_eq!(config.max_concurrent_lookups, DEFAULT_MAX_CONCURRENT_LOOKUPS);
        assert!(config.prompt_dir.ends_with(".dotprompt/prompts"));
        assert!(!config.verbose);
    }

    #[test]
    fn test_merge_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
defaultModel: gpt
modelConfigs:
  gpt:
    temperature: 0.2
schemas:
  Person:
    type: object
tools:
  - name: calc
    description: Calculator
    inputSchema: { type: object }
partials:
  greeting: "Hello {{name}}"
prompts:
  directory: prompts
resolution:
  maxConcurrentLookups: 4
logging:
  level: debug
  color: false
"#,
        )
        .unwrap();

        let mut base = AppConfig::for_workspace(temp_dir.path());
        base.model_configs.insert(
            "gpt".to_string(),
            json!({"topK": 3, "temperature": 1.0})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let config = base.merge_yaml(&path).unwrap();
        assert_eq!(config.default_model.as_deref(), Some("gpt"));
        let gpt = config.model_config("gpt").unwrap();
        assert_eq!(gpt.get("temperature"), Some(&json!(0.2)));
        assert_eq!(gpt.get("topK"), Some(&json!(3)));
        assert!(config.schemas.contains_key("Person"));
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.partials["greeting"], "Hello {{name}}");
        assert_eq!(config.prompt_dir, temp_dir.path().join("prompts"));
        assert_eq!(config.max_concurrent_lookups, 4);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.no_color);
    }

    #[test]
    fn test_load_from_workspace_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join(".dotprompt")).unwrap();
        fs::write(
            temp_dir.path().join(".dotprompt/config.yaml"),
            "resolution:\n  maxConcurrentLookups: 2\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(temp_dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.max_concurrent_lookups, 2);
    }

    #[test]
    fn test_load_from_missing_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load_from(
            Some(temp_dir.path().to_path_buf()),
            Some(temp_dir.path().join("absent.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let result = AppConfig::load_from(Some(PathBuf::from("/nonexistent/dotprompt/ws")), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "defaultModel: [unclosed").unwrap();

        let result = AppConfig::for_workspace(temp_dir.path()).merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::for_workspace("/tmp/ws");
        let overridden = config.with_overrides(
            Some(PathBuf::from("/tmp/other")),
            Some("gemini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.workspace, PathBuf::from("/tmp/other"));
        assert_eq!(
            overridden.prompt_dir,
            PathBuf::from("/tmp/other/.dotprompt/prompts")
        );
        assert_eq!(overridden.default_model.as_deref(), Some("gemini"));
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::for_workspace("/tmp/ws");
        config.max_concurrent_lookups = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unnamed_tool() {
        let mut config = AppConfig::for_workspace("/tmp/ws");
        config.tools.push(json!({"description": "no name"}));
        assert!(config.validate().is_err());
    }
}

//! Prompt metadata types.
//!
//! This module defines the domain entities shared by the resolution pipeline.
//! The wire form is camelCase so front-matter, config files and JSON output
//! all use the same field names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A standard JSON schema object. Opaque beyond pass-through.
pub type JsonSchema = Value;

/// Metadata that configures a prompt render.
///
/// Every field is optional so that a record can act as a partial layer in a
/// merge: an absent field never overrides an earlier value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    /// Prompt name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Variant of the named prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Content version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Generation config, deep-merged across layers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,

    /// Input schema and defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PromptInputConfig>,

    /// Output schema and format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PromptOutputConfig>,

    /// Tool names still needing resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,

    /// Resolved tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_defs: Option<Vec<ToolDefinition>>,

    /// Unprocessed front-matter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Map<String, Value>>,

    /// Vendor extensions, keyed by namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,

    /// Free-form fields preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptMetadata {
    /// A record carrying only a generation config.
    pub fn with_config(config: Map<String, Value>) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Input schema, if declared.
    pub fn input_schema(&self) -> Option<&Value> {
        self.input.as_ref().and_then(|i| i.schema.as_ref())
    }

    /// Output schema, if declared.
    pub fn output_schema(&self) -> Option<&Value> {
        self.output.as_ref().and_then(|o| o.schema.as_ref())
    }
}

/// Input configuration for a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptInputConfig {
    /// Picoschema or JSON schema describing the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Default input values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Output configuration for a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOutputConfig {
    /// Picoschema or JSON schema describing the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Output format (e.g., "text", "json")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A callable tool a model may invoke. Identity is the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input_schema: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ToolDefinition {
    /// Create a tool definition with a name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: Value::Null,
            output_schema: None,
        }
    }

    /// Set the input schema.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Set the output schema.
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

/// Result of parsing raw prompt text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPrompt {
    /// Template body with the front-matter removed
    pub template: String,

    /// Metadata declared in the front-matter
    pub metadata: PromptMetadata,
}

/// Source accepted by the metadata facade.
#[derive(Debug, Clone, Copy)]
pub enum PromptSource<'a> {
    /// Raw prompt text, parsed on demand
    Text(&'a str),

    /// An already-parsed prompt
    Parsed(&'a ParsedPrompt),
}

impl<'a> From<&'a str> for PromptSource<'a> {
    fn from(text: &'a str) -> Self {
        PromptSource::Text(text)
    }
}

impl<'a> From<&'a String> for PromptSource<'a> {
    fn from(text: &'a String) -> Self {
        PromptSource::Text(text.as_str())
    }
}

impl<'a> From<&'a ParsedPrompt> for PromptSource<'a> {
    fn from(parsed: &'a ParsedPrompt) -> Self {
        PromptSource::Parsed(parsed)
    }
}

/// A fully rendered prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPrompt {
    /// Resolved metadata used for the render
    pub metadata: PromptMetadata,

    /// Rendered template text
    pub text: String,
}

//! Front-matter parser for `.prompt` documents.
//!
//! A document is an optional YAML front-matter block delimited by `---`
//! lines, followed by the template body:
//!
//! ```text
//! ---
//! model: gpt
//! tools: [calc]
//! ---
//! Hello {{name}}!
//! ```

use crate::types::{ParsedPrompt, PromptMetadata};
use dotprompt_core::{AppError, AppResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^---[ \t]*\r?\n(?:([\s\S]*?)\r?\n)?---[ \t]*(?:\r?\n([\s\S]*))?$").unwrap()
});

/// Front-matter keys that map onto `PromptMetadata` fields.
const RESERVED_METADATA_KEYWORDS: &[&str] = &[
    "name",
    "variant",
    "version",
    "description",
    "model",
    "config",
    "input",
    "output",
    "tools",
    "toolDefs",
    "raw",
    "ext",
];

/// Turns raw prompt text into a structured document.
pub trait DocumentParser: Send + Sync {
    /// Parse prompt text. Malformed front-matter is an `AppError::Parse`.
    fn parse(&self, source: &str) -> AppResult<ParsedPrompt>;
}

/// The default YAML front-matter parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontmatterParser;

impl DocumentParser for FrontmatterParser {
    fn parse(&self, source: &str) -> AppResult<ParsedPrompt> {
        parse_document(source)
    }
}

/// Parse a prompt document into its metadata and template body.
///
/// Text without a front-matter block is treated as a bare template.
/// Keys of the form `namespace.key` are lifted into `ext[namespace][key]`;
/// other unknown keys are preserved in `extra`.
pub fn parse_document(source: &str) -> AppResult<ParsedPrompt> {
    let Some(captures) = FRONTMATTER_RE.captures(source) else {
        return Ok(ParsedPrompt {
            template: source.to_string(),
            metadata: PromptMetadata::default(),
        });
    };

    let frontmatter = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());

    let raw = parse_frontmatter(frontmatter)?;
    let mut metadata = metadata_from_map(raw.clone())?;
    metadata.raw = Some(raw);

    tracing::debug!(
        "Parsed prompt front-matter with {} keys",
        metadata.raw.as_ref().map_or(0, Map::len)
    );

    Ok(ParsedPrompt {
        template: body.to_string(),
        metadata,
    })
}

fn parse_frontmatter(frontmatter: &str) -> AppResult<Map<String, Value>> {
    if frontmatter.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: Value = serde_yaml::from_str(frontmatter)
        .map_err(|e| AppError::Parse(format!("Invalid front-matter YAML: {}", e)))?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(AppError::Parse(format!(
            "Front-matter must be a mapping, got: {}",
            other
        ))),
    }
}

/// Build metadata from a mapping of front-matter style keys.
///
/// Reserved keys become fields, `namespace.key` entries are lifted into
/// `ext`, and everything else lands in `extra`. `raw` is left unset.
pub fn metadata_from_map(map: Map<String, Value>) -> AppResult<PromptMetadata> {
    let mut reserved = Map::new();
    let mut ext = Map::new();
    let mut extra = Map::new();

    for (key, value) in map {
        if RESERVED_METADATA_KEYWORDS.contains(&key.as_str()) {
            reserved.insert(key, value);
        } else if let Some((namespace, field)) = key.rsplit_once('.') {
            let entry = ext
                .entry(namespace.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(fields) = entry {
                fields.insert(field.to_string(), value);
            }
        } else {
            extra.insert(key, value);
        }
    }

    let mut metadata: PromptMetadata = serde_json::from_value(Value::Object(reserved))
        .map_err(|e| AppError::Parse(format!("Invalid front-matter field: {}", e)))?;

    if !ext.is_empty() {
        metadata.ext.get_or_insert_with(Map::new).extend(ext);
    }
    metadata.extra = extra;

    Ok(metadata)
}

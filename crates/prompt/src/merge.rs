//! Metadata merge engine.
//!
//! Layers are folded left to right onto a base record. A field present in a
//! layer replaces the accumulated value, except `config`, which is merged key
//! by key. Absent fields never erase anything. Free-form `extra` fields are
//! overlaid key by key as well.
//!
//! After folding, tools are resolved and then picoschemas expanded, in that
//! order: a failed tool lookup short-circuits before any schema work.

use crate::picoschema;
use crate::schema::SchemaResolverAdapter;
use crate::tools::ToolResolution;
use crate::types::PromptMetadata;
use dotprompt_core::AppResult;

/// Fold `layers` onto `base`, without resolving anything.
pub fn merge_layers<'a, I>(base: PromptMetadata, layers: I) -> PromptMetadata
where
    I: IntoIterator<Item = &'a PromptMetadata>,
{
    layers.into_iter().fold(base, overlay)
}

fn overlay(mut acc: PromptMetadata, layer: &PromptMetadata) -> PromptMetadata {
    fn replace<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            target.clone_from(value);
        }
    }

    replace(&mut acc.name, &layer.name);
    replace(&mut acc.variant, &layer.variant);
    replace(&mut acc.version, &layer.version);
    replace(&mut acc.description, &layer.description);
    replace(&mut acc.model, &layer.model);
    replace(&mut acc.input, &layer.input);
    replace(&mut acc.output, &layer.output);
    replace(&mut acc.tools, &layer.tools);
    replace(&mut acc.tool_defs, &layer.tool_defs);
    replace(&mut acc.raw, &layer.raw);
    replace(&mut acc.ext, &layer.ext);

    if let Some(config) = &layer.config {
        acc.config
            .get_or_insert_with(Default::default)
            .extend(config.clone());
    }

    acc.extra
        .extend(layer.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

    acc
}

/// Merge layers onto `base`, then resolve tools and expand schemas.
pub async fn merge_and_resolve<'a, I>(
    base: PromptMetadata,
    layers: I,
    tools: &ToolResolution,
    schemas: &SchemaResolverAdapter,
) -> AppResult<PromptMetadata>
where
    I: IntoIterator<Item = &'a PromptMetadata>,
{
    let merged = merge_layers(base, layers);
    let resolved = tools.resolve_tools(&merged).await?;
    expand_schemas(resolved, schemas).await
}

/// Expand `input.schema` and `output.schema` from picoschema to JSON schema.
pub async fn expand_schemas(
    mut meta: PromptMetadata,
    schemas: &SchemaResolverAdapter,
) -> AppResult<PromptMetadata> {
    if let Some(input) = meta.input.as_mut() {
        if let Some(schema) = input.schema.take() {
            tracing::debug!("Expanding input schema");
            input.schema = picoschema::expand(&schema, schemas).await?;
        }
    }

    if let Some(output) = meta.output.as_mut() {
        if let Some(schema) = output.schema.take() {
            tracing::debug!("Expanding output schema");
            output.schema = picoschema::expand(&schema, schemas).await?;
        }
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{FnResolver, SchemaResolver, ToolResolver};
    use crate::types::{PromptInputConfig, PromptOutputConfig, ToolDefinition};
    use dotprompt_core::AppError;
    use serde_json::{json, Map, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    fn no_tools() -> ToolResolution {
        ToolResolution::new(Arc::new(HashMap::new()), None)
    }

    fn no_schemas() -> SchemaResolverAdapter {
        SchemaResolverAdapter::new(Arc::new(HashMap::new()), None)
    }

    #[test]
    fn test_config_is_deep_merged() {
        let base = PromptMetadata {
            config: config(json!({"a": 1, "b": 2})),
            ..Default::default()
        };
        let layer = PromptMetadata {
            config: config(json!({"b": 3, "c": 4})),
            ..Default::default()
        };

        let merged = merge_layers(base, [&layer]);
        assert_eq!(merged.config, config(json!({"a": 1, "b": 3, "c": 4})));
    }

    #[test]
    fn test_absent_config_leaves_accumulator() {
        let base = PromptMetadata {
            config: config(json!({"a": 1})),
            ..Default::default()
        };
        let merged = merge_layers(base, [&PromptMetadata::default()]);
        assert_eq!(merged.config, config(json!({"a": 1})));
    }

    #[test]
    fn test_absent_fields_never_erase() {
        let base = PromptMetadata {
            model: Some("gpt".to_string()),
            description: Some("base".to_string()),
            tools: Some(vec!["calc".to_string()]),
            ..Default::default()
        };
        let layer = PromptMetadata {
            description: Some("layer".to_string()),
            ..Default::default()
        };

        let merged = merge_layers(base, [&layer, &PromptMetadata::default()]);
        assert_eq!(merged.model.as_deref(), Some("gpt"));
        assert_eq!(merged.description.as_deref(), Some("layer"));
        assert_eq!(merged.tools, Some(vec!["calc".to_string()]));
    }

    #[test]
    fn test_later_layers_win() {
        let first = PromptMetadata {
            model: Some("a".to_string()),
            output: Some(PromptOutputConfig {
                schema: None,
                format: Some("text".to_string()),
            }),
            ..Default::default()
        };
        let second = PromptMetadata {
            model: Some("b".to_string()),
            output: Some(PromptOutputConfig {
                schema: Some(json!("string")),
                format: None,
            }),
            ..Default::default()
        };

        let merged = merge_layers(PromptMetadata::default(), [&first, &second]);
        assert_eq!(merged.model.as_deref(), Some("b"));
        // Whole-field replacement: format from the first layer is gone
        assert_eq!(merged.output.unwrap().format, None);
    }

    #[test]
    fn test_extra_fields_survive_merge() {
        let mut base = PromptMetadata::default();
        base.extra.insert("team".to_string(), json!("search"));
        let mut layer = PromptMetadata::default();
        layer.extra.insert("owner".to_string(), json!("ana"));

        let merged = merge_layers(base, [&layer]);
        assert_eq!(merged.extra.get("team"), Some(&json!("search")));
        assert_eq!(merged.extra.get("owner"), Some(&json!("ana")));
    }

    #[tokio::test]
    async fn test_schemas_expanded_after_merge() {
        let base = PromptMetadata {
            input: Some(PromptInputConfig {
                schema: Some(json!({"old": "string"})),
                default: None,
            }),
            ..Default::default()
        };
        let layer = PromptMetadata {
            input: Some(PromptInputConfig {
                schema: Some(json!({"name": "string"})),
                default: Some(json!({"name": "World"})),
            }),
            ..Default::default()
        };

        let out = merge_and_resolve(base, [&layer], &no_tools(), &no_schemas())
            .await
            .unwrap();
        let input = out.input.unwrap();
        assert_eq!(input.schema.unwrap()["required"], json!(["name"]));
        assert_eq!(input.default, Some(json!({"name": "World"})));
    }

    #[tokio::test]
    async fn test_tool_failure_skips_schema_expansion() {
        let schema_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&schema_calls);
        let schema_resolver: Arc<SchemaResolver> = Arc::new(FnResolver::new(
            move |_: &str| -> anyhow::Result<Option<Value>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(json!({"type": "object"})))
            },
        ));
        let schemas = SchemaResolverAdapter::new(Arc::new(HashMap::new()), Some(schema_resolver));

        let tool_resolver: Arc<ToolResolver> = Arc::new(FnResolver::new(
            |_: &str| -> anyhow::Result<Option<ToolDefinition>> { Ok(None) },
        ));
        let tools = ToolResolution::new(Arc::new(HashMap::new()), Some(tool_resolver));

        let layer = PromptMetadata {
            tools: Some(vec!["missing".to_string()]),
            output: Some(PromptOutputConfig {
                schema: Some(json!("Remote")),
                format: None,
            }),
            ..Default::default()
        };

        let result = merge_and_resolve(PromptMetadata::default(), [&layer], &tools, &schemas).await;
        assert!(matches!(result, Err(AppError::ToolNotFound(_))));
        assert_eq!(schema_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolving_resolved_record_is_noop() {
        let resolved = PromptMetadata {
            model: Some("gpt".to_string()),
            config: config(json!({"temperature": 0.2})),
            tools: Some(vec![]),
            tool_defs: Some(vec![ToolDefinition::new("calc", "Calculator")]),
            output: Some(PromptOutputConfig {
                schema: Some(json!({"type": "object", "properties": {}})),
                format: Some("json".to_string()),
            }),
            ..Default::default()
        };

        let again = merge_and_resolve(resolved.clone(), std::iter::empty(), &no_tools(), &no_schemas())
            .await
            .unwrap();
        assert_eq!(again, resolved);
    }
}

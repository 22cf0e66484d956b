//! The Dotprompt session.
//!
//! A [`Dotprompt`] owns the long-lived registries (tools, schemas, partials,
//! helpers) and the caller-supplied resolvers. It is configured once and then
//! shared; `define_*` calls may happen at any time and are visible to every
//! resolution that starts afterwards. Each resolution works from registry
//! snapshots taken when it starts.

use crate::loader::DirectoryPromptStore;
use crate::merge;
use crate::parser::{DocumentParser, FrontmatterParser};
use crate::partials::identify_partials;
use crate::registry::Registry;
use crate::resolver::{PartialResolver, SchemaResolver, ToolResolver};
use crate::schema::SchemaResolverAdapter;
use crate::tools::ToolResolution;
use crate::types::{
    JsonSchema, ParsedPrompt, PromptMetadata, PromptSource, RenderedPrompt, ToolDefinition,
};
use dotprompt_core::config::DEFAULT_MAX_CONCURRENT_LOOKUPS;
use dotprompt_core::{AppConfig, AppError, AppResult};
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// A template helper: receives the evaluated parameters, returns the text to emit.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> String + Send + Sync>;

/// Construction options for a [`Dotprompt`] session.
#[derive(Default)]
pub struct DotpromptOptions {
    default_model: Option<String>,
    model_configs: HashMap<String, Map<String, Value>>,
    tools: HashMap<String, ToolDefinition>,
    tool_resolver: Option<Arc<ToolResolver>>,
    schemas: HashMap<String, JsonSchema>,
    schema_resolver: Option<Arc<SchemaResolver>>,
    partials: HashMap<String, String>,
    partial_resolver: Option<Arc<PartialResolver>>,
    helpers: HashMap<String, HelperFn>,
    parser: Option<Arc<dyn DocumentParser>>,
    max_concurrent_lookups: Option<usize>,
}

impl DotpromptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model used when neither the prompt nor the caller names one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Default generation config for a model.
    pub fn with_model_config(mut self, model: impl Into<String>, config: Map<String, Value>) -> Self {
        self.model_configs.insert(model.into(), config);
        self
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    pub fn with_tool_resolver(mut self, resolver: Arc<ToolResolver>) -> Self {
        self.tool_resolver = Some(resolver);
        self
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: JsonSchema) -> Self {
        self.schemas.insert(name.into(), schema);
        self
    }

    pub fn with_schema_resolver(mut self, resolver: Arc<SchemaResolver>) -> Self {
        self.schema_resolver = Some(resolver);
        self
    }

    pub fn with_partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.insert(name.into(), source.into());
        self
    }

    pub fn with_partial_resolver(mut self, resolver: Arc<PartialResolver>) -> Self {
        self.partial_resolver = Some(resolver);
        self
    }

    pub fn with_helper(mut self, name: impl Into<String>, helper: HelperFn) -> Self {
        self.helpers.insert(name.into(), helper);
        self
    }

    /// Replace the default front-matter parser.
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_max_concurrent_lookups(mut self, limit: usize) -> Self {
        self.max_concurrent_lookups = Some(limit);
        self
    }
}

/// A prompt session: registries, resolvers and the metadata pipeline.
pub struct Dotprompt {
    default_model: Option<String>,
    model_configs: HashMap<String, Map<String, Value>>,
    tools: Registry<ToolDefinition>,
    schemas: Registry<JsonSchema>,
    partials: Registry<String>,
    helpers: Registry<HelperFn>,
    tool_resolver: Option<Arc<ToolResolver>>,
    schema_resolver: Option<Arc<SchemaResolver>>,
    partial_resolver: Option<Arc<PartialResolver>>,
    parser: Arc<dyn DocumentParser>,
    max_concurrent_lookups: usize,
}

impl Default for Dotprompt {
    fn default() -> Self {
        Self::new(DotpromptOptions::default())
    }
}

impl Dotprompt {
    /// Create a session from options.
    pub fn new(options: DotpromptOptions) -> Self {
        Self {
            default_model: options.default_model,
            model_configs: options.model_configs,
            tools: Registry::from_map(options.tools),
            schemas: Registry::from_map(options.schemas),
            partials: Registry::from_map(options.partials),
            helpers: Registry::from_map(options.helpers),
            tool_resolver: options.tool_resolver,
            schema_resolver: options.schema_resolver,
            partial_resolver: options.partial_resolver,
            parser: options
                .parser
                .unwrap_or_else(|| Arc::new(FrontmatterParser)),
            max_concurrent_lookups: options
                .max_concurrent_lookups
                .unwrap_or(DEFAULT_MAX_CONCURRENT_LOOKUPS),
        }
    }

    /// Create a session from application configuration.
    ///
    /// Registers the configured tools, schemas and partials, and resolves
    /// missing partials from the configured prompt directory.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let mut options = DotpromptOptions::new()
            .with_max_concurrent_lookups(config.max_concurrent_lookups)
            .with_partial_resolver(Arc::new(DirectoryPromptStore::new(&config.prompt_dir)));

        if let Some(model) = &config.default_model {
            options = options.with_default_model(model.clone());
        }
        for (model, model_config) in &config.model_configs {
            options = options.with_model_config(model.clone(), model_config.clone());
        }
        for (name, schema) in &config.schemas {
            options = options.with_schema(name.clone(), schema.clone());
        }
        for (name, source) in &config.partials {
            options = options.with_partial(name.clone(), source.clone());
        }
        for raw in &config.tools {
            let tool: ToolDefinition = serde_json::from_value(raw.clone()).map_err(|e| {
                AppError::Config(format!("Invalid tool definition in config: {}", e))
            })?;
            options = options.with_tool(tool);
        }

        Ok(Self::new(options))
    }

    /// Register a tool definition. Last write wins.
    pub fn define_tool(&self, tool: ToolDefinition) -> &Self {
        tracing::debug!("Defining tool '{}'", tool.name);
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    /// Register a named JSON schema. Last write wins.
    pub fn define_schema(&self, name: impl Into<String>, schema: JsonSchema) -> &Self {
        self.schemas.insert(name, schema);
        self
    }

    /// Register a partial template. Last write wins.
    pub fn define_partial(&self, name: impl Into<String>, source: impl Into<String>) -> &Self {
        self.partials.insert(name, source.into());
        self
    }

    /// Register a template helper. Last write wins.
    pub fn define_helper(&self, name: impl Into<String>, helper: HelperFn) -> &Self {
        self.helpers.insert(name, helper);
        self
    }

    /// Parse raw prompt text with the session's parser.
    pub fn parse(&self, source: &str) -> AppResult<ParsedPrompt> {
        self.parser.parse(source)
    }

    /// Names of the partials referenced by a template.
    pub fn identify_partials(&self, template: &str) -> BTreeSet<String> {
        identify_partials(template)
    }

    /// Resolve the tool names in `meta` against the current registry and resolver.
    pub async fn resolve_tools(&self, meta: &PromptMetadata) -> AppResult<PromptMetadata> {
        self.tool_resolution().resolve_tools(meta).await
    }

    /// Resolve a schema by name from the registry, then the schema resolver.
    pub async fn resolve_named_schema(&self, name: &str) -> AppResult<Option<JsonSchema>> {
        self.schema_adapter().resolve_named_schema(name).await
    }

    /// Merge `layers` onto `base`, then resolve tools and expand schemas.
    pub async fn merge_and_resolve(
        &self,
        base: PromptMetadata,
        layers: &[&PromptMetadata],
    ) -> AppResult<PromptMetadata> {
        merge::merge_and_resolve(
            base,
            layers.iter().copied(),
            &self.tool_resolution(),
            &self.schema_adapter(),
        )
        .await
    }

    /// Produce fully merged and resolved metadata for a prompt.
    ///
    /// Text that fails to parse yields empty metadata rather than an error;
    /// callers that need strict parsing should call [`Dotprompt::parse`]
    /// themselves and pass the parsed prompt.
    ///
    /// The effective model is `overrides.model`, else the prompt's model,
    /// else the session default. Its configured defaults form the base layer.
    pub async fn render_metadata<'a>(
        &self,
        source: impl Into<PromptSource<'a>>,
        overrides: Option<&PromptMetadata>,
    ) -> AppResult<PromptMetadata> {
        let parsed_storage;
        let parsed = match source.into() {
            PromptSource::Parsed(parsed) => parsed,
            PromptSource::Text(text) => match self.parse(text) {
                Ok(parsed) => {
                    parsed_storage = parsed;
                    &parsed_storage
                }
                Err(AppError::Parse(reason)) => {
                    tracing::warn!("Prompt failed to parse, using empty metadata: {}", reason);
                    return Ok(PromptMetadata::default());
                }
                Err(e) => return Err(e),
            },
        };

        let model = overrides
            .and_then(|o| o.model.clone())
            .or_else(|| parsed.metadata.model.clone())
            .or_else(|| self.default_model.clone());

        let model_config = model
            .as_deref()
            .and_then(|m| self.model_configs.get(m))
            .cloned()
            .unwrap_or_default();

        tracing::debug!("Rendering metadata for model {:?}", model);

        let base = PromptMetadata::with_config(model_config);
        let mut layers = vec![&parsed.metadata];
        if let Some(overrides) = overrides {
            layers.push(overrides);
        }

        self.merge_and_resolve(base, &layers).await
    }

    /// Load every partial the template references that is not registered yet.
    ///
    /// Loaded partials are registered and scanned in turn, so nested
    /// references are loaded too. Names the resolver does not know are left
    /// for the renderer to report.
    pub async fn resolve_partials(&self, template: &str) -> AppResult<()> {
        let mut pending: Vec<String> = identify_partials(template).into_iter().collect();
        let mut seen = HashSet::new();

        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }

            if let Some(source) = self.partials.get(&name) {
                pending.extend(identify_partials(&source));
                continue;
            }

            let Some(resolver) = &self.partial_resolver else {
                continue;
            };

            let loaded = resolver.lookup(&name).await.map_err(|e| {
                AppError::Prompt(format!("Partial resolver failed for '{}': {:#}", name, e))
            })?;

            match loaded {
                Some(source) => {
                    tracing::debug!("Loaded partial '{}'", name);
                    pending.extend(identify_partials(&source));
                    self.define_partial(name, source);
                }
                None => tracing::debug!("Partial '{}' not found by resolver", name),
            }
        }

        Ok(())
    }

    /// Resolve metadata and render the template body.
    ///
    /// The render context is `input.default` overlaid with `data`.
    pub async fn render<'a>(
        &self,
        source: impl Into<PromptSource<'a>>,
        data: &Value,
        overrides: Option<&PromptMetadata>,
    ) -> AppResult<RenderedPrompt> {
        let parsed = match source.into() {
            PromptSource::Text(text) => self.parse(text)?,
            PromptSource::Parsed(parsed) => parsed.clone(),
        };

        self.resolve_partials(&parsed.template).await?;
        let metadata = self.render_metadata(&parsed, overrides).await?;
        let context = render_context(&metadata, data);
        let text = self.render_template(&parsed.template, &context)?;

        Ok(RenderedPrompt { metadata, text })
    }

    fn render_template(&self, template: &str, context: &Value) -> AppResult<String> {
        let mut handlebars = Handlebars::new();

        // Prompts are plain text
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in self.partials.snapshot().iter() {
            handlebars
                .register_partial(name, source.as_str())
                .map_err(|e| AppError::Prompt(format!("Failed to register partial '{}': {}", name, e)))?;
        }

        for (name, helper) in self.helpers.snapshot().iter() {
            let helper = Arc::clone(helper);
            handlebars.register_helper(
                name,
                Box::new(
                    move |h: &Helper,
                          _: &Handlebars,
                          _: &Context,
                          _: &mut RenderContext,
                          out: &mut dyn Output|
                          -> HelperResult {
                        let params: Vec<Value> =
                            h.params().iter().map(|p| p.value().clone()).collect();
                        out.write(&helper(&params))?;
                        Ok(())
                    },
                ),
            );
        }

        handlebars
            .register_template_string("prompt", template)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

        handlebars
            .render("prompt", context)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
    }

    fn tool_resolution(&self) -> ToolResolution {
        ToolResolution::new(self.tools.snapshot(), self.tool_resolver.clone())
            .with_max_concurrent(self.max_concurrent_lookups)
    }

    fn schema_adapter(&self) -> SchemaResolverAdapter {
        SchemaResolverAdapter::new(self.schemas.snapshot(), self.schema_resolver.clone())
    }
}

fn render_context(metadata: &PromptMetadata, data: &Value) -> Value {
    let mut context = match metadata.input.as_ref().and_then(|i| i.default.as_ref()) {
        Some(Value::Object(defaults)) => defaults.clone(),
        _ => Map::new(),
    };

    if let Value::Object(values) = data {
        context.extend(values.clone());
    }

    Value::Object(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AsyncFnResolver, FnResolver, StaticResolver};
    use serde_json::json;

    fn calc() -> ToolDefinition {
        ToolDefinition::new("calc", "Evaluates arithmetic")
            .with_input_schema(json!({"type": "object", "properties": {"expr": {"type": "string"}}}))
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn session() -> Dotprompt {
        Dotprompt::new(
            DotpromptOptions::new()
                .with_default_model("gpt")
                .with_model_config("gpt", map(json!({"temperature": 0.2})))
                .with_tool(calc()),
        )
    }

    #[tokio::test]
    async fn test_render_metadata_end_to_end() {
        let meta = session()
            .render_metadata("---\nmodel: gpt\ntools: [calc]\n---\nBody", None)
            .await
            .unwrap();

        assert_eq!(meta.model.as_deref(), Some("gpt"));
        assert_eq!(meta.config, Some(map(json!({"temperature": 0.2}))));
        assert_eq!(meta.tools, Some(vec![]));
        assert_eq!(meta.tool_defs, Some(vec![calc()]));
    }

    #[tokio::test]
    async fn test_overrides_pick_model_and_config() {
        let dotprompt = Dotprompt::new(
            DotpromptOptions::new()
                .with_default_model("gpt")
                .with_model_config("gpt", map(json!({"temperature": 0.2})))
                .with_model_config("gemini", map(json!({"temperature": 0.9, "topK": 5}))),
        );
        let overrides = PromptMetadata {
            model: Some("gemini".to_string()),
            config: Some(map(json!({"topK": 1}))),
            ..Default::default()
        };

        let meta = dotprompt
            .render_metadata("---\nconfig:\n  maxOutputTokens: 100\n---\nHi", Some(&overrides))
            .await
            .unwrap();

        assert_eq!(meta.model.as_deref(), Some("gemini"));
        assert_eq!(
            meta.config,
            Some(map(json!({"temperature": 0.9, "topK": 1, "maxOutputTokens": 100})))
        );
    }

    #[tokio::test]
    async fn test_default_model_config_applies_without_declared_model() {
        let meta = session().render_metadata("Just a body", None).await.unwrap();
        assert_eq!(meta.model, None);
        assert_eq!(meta.config, Some(map(json!({"temperature": 0.2}))));
    }

    #[tokio::test]
    async fn test_unknown_model_has_empty_config() {
        let meta = session()
            .render_metadata("---\nmodel: other\n---\n", None)
            .await
            .unwrap();
        assert_eq!(meta.model.as_deref(), Some("other"));
        assert_eq!(meta.config, Some(Map::new()));
    }

    #[tokio::test]
    async fn test_parse_failure_yields_empty_metadata() {
        let meta = session()
            .render_metadata("---\nmodel: [broken\n---\nBody", None)
            .await
            .unwrap();
        assert_eq!(meta, PromptMetadata::default());
    }

    #[tokio::test]
    async fn test_parsed_source_is_accepted() {
        let dotprompt = session();
        let parsed = dotprompt.parse("---\ntools: [calc]\n---\nBody").unwrap();
        let meta = dotprompt.render_metadata(&parsed, None).await.unwrap();
        assert_eq!(meta.tool_defs, Some(vec![calc()]));
    }

    #[tokio::test]
    async fn test_define_tool_visible_to_next_resolution() {
        let dotprompt = Dotprompt::default();
        let source = "---\ntools: [lookup]\n---\n";

        let before = dotprompt.render_metadata(source, None).await.unwrap();
        assert_eq!(before.tools, Some(vec!["lookup".to_string()]));

        dotprompt.define_tool(ToolDefinition::new("lookup", "Looks things up"));
        let after = dotprompt.render_metadata(source, None).await.unwrap();
        assert_eq!(after.tools, Some(vec![]));
        assert_eq!(after.tool_defs.unwrap()[0].name, "lookup");
    }

    #[tokio::test]
    async fn test_tool_resolver_failure_propagates() {
        let resolver: Arc<ToolResolver> = Arc::new(FnResolver::new(
            |_: &str| -> anyhow::Result<Option<ToolDefinition>> { Ok(None) },
        ));
        let dotprompt = Dotprompt::new(DotpromptOptions::new().with_tool_resolver(resolver));

        let result = dotprompt
            .render_metadata("---\ntools: [typo]\n---\n", None)
            .await;
        assert!(matches!(result, Err(AppError::ToolNotFound(ref name)) if name == "typo"));
    }

    #[tokio::test]
    async fn test_named_schema_registered_later() {
        let dotprompt = Dotprompt::default();
        let source = "---\ninput:\n  schema:\n    person: Person\n---\n";

        let missing = dotprompt.resolve_named_schema("Person").await.unwrap();
        assert!(missing.is_none());
        let before = dotprompt.render_metadata(source, None).await;
        assert!(matches!(before, Err(AppError::SchemaExpansion(_))));

        dotprompt.define_schema(
            "Person",
            json!({"type": "object", "properties": {"name": {"type": "string"}}}),
        );
        let after = dotprompt.render_metadata(source, None).await.unwrap();
        assert_eq!(
            after.input_schema().unwrap()["properties"]["person"]["properties"]["name"],
            json!({"type": "string"})
        );
    }

    #[tokio::test]
    async fn test_output_schema_uses_schema_resolver() {
        let resolver: Arc<SchemaResolver> = Arc::new(AsyncFnResolver::new(|name: String| async move {
            Ok::<_, anyhow::Error>((name == "Answer").then(|| json!({"type": "string"})))
        }));
        let dotprompt = Dotprompt::new(DotpromptOptions::new().with_schema_resolver(resolver));

        let meta = dotprompt
            .render_metadata("---\noutput:\n  format: json\n  schema: Answer\n---\n", None)
            .await
            .unwrap();
        let output = meta.output.unwrap();
        assert_eq!(output.schema, Some(json!({"type": "string"})));
        assert_eq!(output.format.as_deref(), Some("json"));
    }

    #[tokio::test]
    async fn test_resolve_partials_loads_nested() {
        let resolver: Arc<PartialResolver> = Arc::new(StaticResolver::new(HashMap::from([
            ("outer".to_string(), "[{{> inner}}]".to_string()),
            ("inner".to_string(), "inner text".to_string()),
        ])));
        let dotprompt = Dotprompt::new(DotpromptOptions::new().with_partial_resolver(resolver));

        dotprompt.resolve_partials("{{> outer}} {{> missing}}").await.unwrap();

        assert!(dotprompt.partials.contains("outer"));
        assert!(dotprompt.partials.contains("inner"));
        assert!(!dotprompt.partials.contains("missing"));
    }

    #[tokio::test]
    async fn test_render_with_partials_helpers_and_defaults() {
        let dotprompt = Dotprompt::new(
            DotpromptOptions::new()
                .with_partial("signature", "-- {{shout team}}")
                .with_helper(
                    "shout",
                    Arc::new(|params: &[Value]| {
                        params
                            .first()
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_uppercase()
                    }),
                ),
        );

        let source = "---\ninput:\n  default:\n    name: World\n    team: docs\n---\nHello {{name}} & co {{> signature}}";
        let rendered = dotprompt
            .render(source, &json!({"name": "Ana"}), None)
            .await
            .unwrap();

        assert_eq!(rendered.text, "Hello Ana & co -- DOCS");
        assert_eq!(
            rendered.metadata.input.unwrap().default,
            Some(json!({"name": "World", "team": "docs"}))
        );
    }

    #[tokio::test]
    async fn test_render_loads_nested_partials_from_store() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("support")).unwrap();
        std::fs::write(temp_dir.path().join("support/_tone.prompt"), "calmly, {{name}}").unwrap();
        std::fs::write(temp_dir.path().join("_footer.prompt"), "-- {{> support.tone}}").unwrap();

        let store: Arc<PartialResolver> = Arc::new(DirectoryPromptStore::new(temp_dir.path()));
        let dotprompt = Dotprompt::new(DotpromptOptions::new().with_partial_resolver(store));

        let template = "Triage {{> support.tone}} {{> footer}}";
        assert_eq!(
            dotprompt.identify_partials(template).into_iter().collect::<Vec<_>>(),
            vec!["footer", "support.tone"]
        );

        let rendered = dotprompt
            .render(template, &json!({"name": "Ana"}), None)
            .await
            .unwrap();
        assert_eq!(rendered.text, "Triage calmly, Ana -- calmly, Ana");
        assert!(dotprompt.partials.contains("support.tone"));
    }

    #[tokio::test]
    async fn test_scalar_parenthetical_type_is_rejected() {
        let result = Dotprompt::default()
            .render_metadata(
                "---\ninput:\n  schema:\n    age(integer, years old): integer\n---\n",
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::SchemaExpansion(ref msg)) if msg.contains("integer")));
    }

    #[tokio::test]
    async fn test_render_rejects_unparseable_source() {
        let result = Dotprompt::default()
            .render("---\nmodel: [broken\n---\nBody", &json!({}), None)
            .await;
        assert!(matches!(result, Err(AppError::Parse(_))));
    }

    #[test]
    fn test_from_config_registers_static_entries() {
        let mut config = AppConfig::for_workspace("/tmp/ws");
        config.default_model = Some("gpt".to_string());
        config.tools.push(json!({"name": "calc", "description": "Calculator"}));
        config.schemas.insert("Person".to_string(), json!({"type": "object"}));
        config.partials.insert("header".to_string(), "# {{title}}".to_string());

        let dotprompt = Dotprompt::from_config(&config).unwrap();
        assert_eq!(dotprompt.default_model.as_deref(), Some("gpt"));
        assert!(dotprompt.tools.contains("calc"));
        assert!(dotprompt.schemas.contains("Person"));
        assert!(dotprompt.partials.contains("header"));
    }
}

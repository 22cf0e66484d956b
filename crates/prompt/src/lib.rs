//! Prompt metadata resolution for `.prompt` templates.
//!
//! This crate turns a Handlebars prompt template with YAML front-matter into
//! one fully merged, fully resolved metadata record:
//! - Front-matter parsing
//! - Layered metadata merging with deep-merged model config
//! - Concurrent tool resolution
//! - Picoschema expansion into JSON schema
//! - Partial discovery and preloading
//!
//! # Example
//! ```no_run
//! use dotprompt::{Dotprompt, DotpromptOptions, ToolDefinition};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dotprompt = Dotprompt::new(
//!     DotpromptOptions::new()
//!         .with_default_model("gpt")
//!         .with_tool(ToolDefinition::new("calc", "Evaluates arithmetic")),
//! );
//!
//! let metadata = dotprompt
//!     .render_metadata("---\ntools: [calc]\n---\nWhat is {{expr}}?", None)
//!     .await?;
//! assert_eq!(metadata.tools, Some(vec![]));
//! # Ok(())
//! # }
//! ```

pub mod dotprompt;
pub mod loader;
pub mod merge;
pub mod parser;
pub mod partials;
pub mod picoschema;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod tools;
pub mod types;

// Re-export main types
pub use dotprompt::{Dotprompt, DotpromptOptions, HelperFn};
pub use loader::DirectoryPromptStore;
pub use merge::{merge_and_resolve, merge_layers};
pub use parser::{metadata_from_map, parse_document, DocumentParser, FrontmatterParser};
pub use partials::identify_partials;
pub use resolver::{
    AsyncFnResolver, FnResolver, PartialResolver, Resolver, SchemaResolver, StaticResolver,
    ToolResolver,
};
pub use schema::SchemaResolverAdapter;
pub use tools::{resolve_tool, ToolResolution};
pub use types::{
    JsonSchema, ParsedPrompt, PromptInputConfig, PromptMetadata, PromptOutputConfig,
    PromptSource, RenderedPrompt, ToolDefinition,
};

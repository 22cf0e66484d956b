//! Named-schema lookup used during picoschema expansion.

use crate::resolver::SchemaResolver;
use crate::types::JsonSchema;
use dotprompt_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Combines the static schema registry with an optional user resolver.
///
/// Lookups check the registry snapshot first, then the resolver. A name
/// neither source knows is `Ok(None)`; callers decide whether that is fatal.
#[derive(Clone)]
pub struct SchemaResolverAdapter {
    schemas: Arc<HashMap<String, JsonSchema>>,
    resolver: Option<Arc<SchemaResolver>>,
}

impl SchemaResolverAdapter {
    pub fn new(
        schemas: Arc<HashMap<String, JsonSchema>>,
        resolver: Option<Arc<SchemaResolver>>,
    ) -> Self {
        Self { schemas, resolver }
    }

    /// Resolve a schema by exact name.
    pub async fn resolve_named_schema(&self, name: &str) -> AppResult<Option<JsonSchema>> {
        if let Some(schema) = self.schemas.get(name) {
            tracing::debug!("Schema '{}' found in registry", name);
            return Ok(Some(schema.clone()));
        }

        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };

        tracing::debug!("Resolving schema '{}' via resolver", name);
        resolver.lookup(name).await.map_err(|e| {
            AppError::SchemaExpansion(format!("Schema resolver failed for '{}': {:#}", name, e))
        })
    }
}

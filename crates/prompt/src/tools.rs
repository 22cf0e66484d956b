//! Tool resolution.
//!
//! Turns the tool names listed in a metadata record into tool definitions.
//! Names found in the static registry are resolved immediately; the rest go
//! to the configured tool resolver, concurrently. Without a resolver, unknown
//! names stay in `tools` untouched.
//!
//! Resolution is all-or-nothing: if any resolver lookup fails, the caller
//! gets the error and the input record is left as it was.

use crate::resolver::ToolResolver;
use crate::types::{PromptMetadata, ToolDefinition};
use dotprompt_core::config::DEFAULT_MAX_CONCURRENT_LOOKUPS;
use dotprompt_core::{AppError, AppResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve one tool name through a resolver.
///
/// An explicit absence is `ToolNotFound`; a failing resolver is
/// `ToolResolverFailed`.
pub async fn resolve_tool(name: &str, resolver: &ToolResolver) -> AppResult<ToolDefinition> {
    match resolver.lookup(name).await {
        Ok(Some(tool)) => Ok(tool),
        Ok(None) => Err(AppError::ToolNotFound(name.to_string())),
        Err(e) => Err(AppError::tool_resolver_failed(name, e)),
    }
}

#[derive(Debug, Default)]
struct ToolPartition<'n> {
    local: Vec<ToolDefinition>,
    deferred: Vec<&'n str>,
    unresolved: Vec<String>,
}

/// One tool-resolution pass over a fixed registry snapshot.
#[derive(Clone)]
pub struct ToolResolution {
    tools: Arc<HashMap<String, ToolDefinition>>,
    resolver: Option<Arc<ToolResolver>>,
    max_concurrent: usize,
}

impl ToolResolution {
    pub fn new(
        tools: Arc<HashMap<String, ToolDefinition>>,
        resolver: Option<Arc<ToolResolver>>,
    ) -> Self {
        Self {
            tools,
            resolver,
            max_concurrent: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }

    /// Limit the number of resolver lookups in flight at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Resolve the tool names in `meta`.
    ///
    /// On success the returned record has `toolDefs` = existing definitions,
    /// then registry hits, then resolver results, each in name order; and
    /// `tools` = names left unresolved because no resolver is configured.
    pub async fn resolve_tools(&self, meta: &PromptMetadata) -> AppResult<PromptMetadata> {
        let names = match &meta.tools {
            Some(names) if !names.is_empty() => names,
            _ => return Ok(meta.clone()),
        };

        let partition = self.partition(names);

        tracing::debug!(
            "Tool partition: {} local, {} deferred, {} unresolved",
            partition.local.len(),
            partition.deferred.len(),
            partition.unresolved.len()
        );

        let mut tool_defs = meta.tool_defs.clone().unwrap_or_default();
        tool_defs.extend(partition.local);

        if let Some(resolver) = &self.resolver {
            if !partition.deferred.is_empty() {
                tool_defs.extend(
                    self.resolve_deferred(&partition.deferred, resolver.as_ref())
                        .await?,
                );
            }
        }

        let mut out = meta.clone();
        out.tool_defs = Some(tool_defs);
        out.tools = Some(partition.unresolved);
        Ok(out)
    }

    /// Split names into registry hits, resolver lookups and leftovers,
    /// keeping each bucket in name order.
    fn partition<'n>(&self, names: &'n [String]) -> ToolPartition<'n> {
        let mut partition = ToolPartition::default();
        for name in names {
            if let Some(tool) = self.tools.get(name) {
                partition.local.push(tool.clone());
            } else if self.resolver.is_some() {
                partition.deferred.push(name.as_str());
            } else {
                partition.unresolved.push(name.clone());
            }
        }
        partition
    }

    /// Look up every deferred name concurrently, failing fast.
    ///
    /// The first failure drops the stream, which cancels lookups still in
    /// flight. Results are returned in the order of `names`.
    async fn resolve_deferred(
        &self,
        names: &[&str],
        resolver: &ToolResolver,
    ) -> AppResult<Vec<ToolDefinition>> {
        let mut resolved: Vec<(usize, ToolDefinition)> = stream::iter(names.iter().enumerate())
            .map(|(index, name)| async move {
                resolve_tool(name, resolver).await.map_err(|e| {
                    tracing::warn!("Tool resolution failed for '{}': {}", name, e);
                    e
                })
                .map(|tool| (index, tool))
            })
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await?;

        resolved.sort_by_key(|(index, _)| *index);
        Ok(resolved.into_iter().map(|(_, tool)| tool).collect())
    }
}

//! Name-based lookup capabilities supplied by callers.
//!
//! Tools, schemas and partials can each be supplied as a static map, a
//! synchronous closure, or a closure returning a future. All three shapes
//! are adapted into the single async [`Resolver`] trait at construction, so
//! the pipeline never needs to know which form it was given.
//!
//! # Example
//! ```no_run
//! use dotprompt::resolver::{AsyncFnResolver, FnResolver, Resolver};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let schemas = FnResolver::new(|name: &str| -> anyhow::Result<Option<serde_json::Value>> {
//!     Ok((name == "Person").then(|| json!({"type": "object"})))
//! });
//! assert!(schemas.lookup("Person").await?.is_some());
//!
//! let partials = AsyncFnResolver::new(|name: String| async move {
//!     Ok::<_, anyhow::Error>(Some(format!("partial {}", name)))
//! });
//! assert_eq!(partials.lookup("header").await?.as_deref(), Some("partial header"));
//! # Ok(())
//! # }
//! ```

use crate::types::{JsonSchema, ToolDefinition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;

/// Look up a value by name.
///
/// `Ok(None)` means the name is unknown to this resolver; `Err` means the
/// lookup itself failed.
#[async_trait]
pub trait Resolver<T: Send + 'static>: Send + Sync {
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<T>>;
}

/// Resolves tool names to definitions.
pub type ToolResolver = dyn Resolver<ToolDefinition>;

/// Resolves schema names to JSON schemas.
pub type SchemaResolver = dyn Resolver<JsonSchema>;

/// Resolves partial names to template source.
pub type PartialResolver = dyn Resolver<String>;

/// A resolver backed by a fixed map.
#[derive(Debug, Clone)]
pub struct StaticResolver<T> {
    entries: HashMap<String, T>,
}

impl<T> StaticResolver<T> {
    pub fn new(entries: HashMap<String, T>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl<T> Resolver<T> for StaticResolver<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<T>> {
        Ok(self.entries.get(name).cloned())
    }
}

/// A resolver backed by a synchronous closure.
pub struct FnResolver<F> {
    lookup_fn: F,
}

impl<F> FnResolver<F> {
    pub fn new(lookup_fn: F) -> Self {
        Self { lookup_fn }
    }
}

#[async_trait]
impl<T, F> Resolver<T> for FnResolver<F>
where
    T: Send + 'static,
    F: Fn(&str) -> anyhow::Result<Option<T>> + Send + Sync,
{
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<T>> {
        (self.lookup_fn)(name)
    }
}

/// A resolver backed by a closure returning a future.
pub struct AsyncFnResolver<F> {
    lookup_fn: F,
}

impl<F> AsyncFnResolver<F> {
    pub fn new(lookup_fn: F) -> Self {
        Self { lookup_fn }
    }
}

#[async_trait]
impl<T, F, Fut> Resolver<T> for AsyncFnResolver<F>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
{
    async fn lookup(&self, name: &str) -> anyhow::Result<Option<T>> {
        (self.lookup_fn)(name.to_string()).await
    }
}

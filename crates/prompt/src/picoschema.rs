//! Picoschema expansion.
//!
//! Picoschema is a compact YAML-friendly schema notation:
//!
//! ```yaml
//! title: string, the title of the article
//! tags?(array, topic tags): string
//! author(object):
//!   name: string
//!   email?: string
//! status(enum): [DRAFT, PUBLISHED]
//! (*): any
//! ```
//!
//! [`expand`] turns it into standard JSON schema. Values that are already
//! JSON schema (a recognised `type`, or a `properties` object) pass through
//! unchanged, so expanding twice is harmless. Any other bare type name is
//! looked up as a named schema.

use crate::schema::SchemaResolverAdapter;
use crate::types::JsonSchema;
use dotprompt_core::{AppError, AppResult};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Map, Value};

const SCALAR_TYPES: &[&str] = &["string", "boolean", "null", "number", "integer", "any"];
const WILDCARD_PROPERTY_NAME: &str = "(*)";

/// Expand a picoschema (or pass through a JSON schema).
///
/// Returns `Ok(None)` for a `null` schema.
pub async fn expand(
    schema: &Value,
    resolver: &SchemaResolverAdapter,
) -> AppResult<Option<JsonSchema>> {
    Picoschema { resolver }.parse(schema).await
}

struct Picoschema<'a> {
    resolver: &'a SchemaResolverAdapter,
}

impl<'a> Picoschema<'a> {
    async fn parse(&self, schema: &Value) -> AppResult<Option<JsonSchema>> {
        match schema {
            Value::Null => Ok(None),
            Value::String(_) => self.parse_pico(schema).await.map(Some),
            Value::Object(map) if is_json_schema(map) => {
                let mut out = map.clone();
                if !out.contains_key("type") {
                    out.insert("type".to_string(), json!("object"));
                }
                Ok(Some(Value::Object(out)))
            }
            _ => self.parse_pico(schema).await.map(Some),
        }
    }

    fn parse_pico<'s>(&'s self, value: &'s Value) -> BoxFuture<'s, AppResult<JsonSchema>> {
        async move {
            match value {
                Value::String(text) => self.parse_type_string(text).await,
                Value::Object(map) => self.parse_object(map).await,
                other => Err(AppError::SchemaExpansion(format!(
                    "Picoschema: only consists of objects and strings. Got: {}",
                    other
                ))),
            }
        }
        .boxed()
    }

    async fn parse_type_string(&self, text: &str) -> AppResult<JsonSchema> {
        let (type_name, description) = extract_description(text);

        let mut schema = if SCALAR_TYPES.contains(&type_name) {
            scalar_schema(type_name)
        } else {
            self.must_resolve_schema(type_name).await?
        };

        if let (Some(description), Value::Object(map)) = (description, &mut schema) {
            map.insert("description".to_string(), json!(description));
        }
        Ok(schema)
    }

    async fn parse_object(&self, object: &Map<String, Value>) -> AppResult<JsonSchema> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut additional_properties = json!(false);

        for (key, value) in object {
            if key == WILDCARD_PROPERTY_NAME {
                additional_properties = self.parse_pico(value).await?;
                continue;
            }

            let (name, type_info) = match key.split_once('(') {
                Some((name, rest)) => {
                    let inner = rest.strip_suffix(')').ok_or_else(|| {
                        AppError::SchemaExpansion(format!(
                            "Picoschema: unterminated type annotation in key '{}'",
                            key
                        ))
                    })?;
                    (name, Some(inner))
                }
                None => (key.as_str(), None),
            };

            let (property_name, optional) = match name.strip_suffix('?') {
                Some(stripped) => (stripped, true),
                None => (name, false),
            };
            if !optional {
                required.push(json!(property_name));
            }

            let Some(type_info) = type_info else {
                let mut property = self.parse_pico(value).await?;
                if optional {
                    make_nullable(&mut property);
                }
                properties.insert(property_name.to_string(), property);
                continue;
            };

            let (type_name, description) = extract_description(type_info);
            let mut property = match type_name {
                "array" => {
                    let items = self.parse_pico(value).await?;
                    let array_type = if optional {
                        json!(["array", "null"])
                    } else {
                        json!("array")
                    };
                    json!({"type": array_type, "items": items})
                }
                "object" => {
                    let mut property = self.parse_pico(value).await?;
                    if optional {
                        make_nullable(&mut property);
                    }
                    property
                }
                "enum" => {
                    let Value::Array(values) = value else {
                        return Err(AppError::SchemaExpansion(format!(
                            "Picoschema: enum '{}' must list its values",
                            property_name
                        )));
                    };
                    let mut values = values.clone();
                    if optional && !values.contains(&Value::Null) {
                        values.push(Value::Null);
                    }
                    json!({"enum": values})
                }
                other => {
                    return Err(AppError::SchemaExpansion(format!(
                        "Picoschema: parenthetical types must be 'object', 'array' or 'enum', got: {}",
                        other
                    )));
                }
            };

            if let (Some(description), Value::Object(map)) = (description, &mut property) {
                map.insert("description".to_string(), json!(description));
            }
            properties.insert(property_name.to_string(), property);
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema.insert("additionalProperties".to_string(), additional_properties);
        Ok(Value::Object(schema))
    }

    async fn must_resolve_schema(&self, name: &str) -> AppResult<JsonSchema> {
        self.resolver
            .resolve_named_schema(name)
            .await?
            .ok_or_else(|| {
                AppError::SchemaExpansion(format!(
                    "Picoschema: could not find schema with name '{}'",
                    name
                ))
            })
    }
}

fn is_json_schema(map: &Map<String, Value>) -> bool {
    let typed = match map.get("type") {
        Some(Value::String(t)) => SCALAR_TYPES.contains(&t.as_str()) || t == "object" || t == "array",
        Some(Value::Array(_)) => true,
        _ => false,
    };
    typed || matches!(map.get("properties"), Some(Value::Object(_)))
}

fn scalar_schema(type_name: &str) -> JsonSchema {
    if type_name == "any" {
        json!({})
    } else {
        json!({"type": type_name})
    }
}

fn make_nullable(schema: &mut JsonSchema) {
    if let Some(Value::String(type_name)) = schema.get("type").cloned() {
        schema["type"] = json!([type_name, "null"]);
    }
}

/// Split `"type, description"` into its parts.
fn extract_description(input: &str) -> (&str, Option<&str>) {
    match input.split_once(',') {
        Some((type_name, description)) => (type_name.trim(), Some(description.trim())),
        None => (input.trim(), None),
    }
}

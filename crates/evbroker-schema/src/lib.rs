//! Compiles registered JSON-Schema documents and validates event payloads
//! against them.
//!
//! Compilation is expensive (the `jsonschema` crate walks and resolves the
//! whole document), so compiled schemas are cached keyed by
//! `(topic, event_type)` and only recompiled when a new schema is
//! registered.

use std::collections::HashMap;
use std::sync::RwLock;

use evbroker_types::{BrokerError, BrokerResult, Schema};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Thread-safe cache of compiled schemas.
pub struct SchemaRegistry {
    compiled: RwLock<HashMap<(String, String), JSONSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Compile and cache `schema` for `topic`'s `event_type`.
    ///
    /// Schemas are additive-only: a schema already registered for this
    /// `(topic, event_type)` pair is left untouched and this call is a no-op.
    pub fn register(&self, topic: &str, schema: &Schema) -> BrokerResult<()> {
        let key = (topic.to_string(), schema.event_type.clone());
        if self.compiled.read().unwrap().contains_key(&key) {
            return Ok(());
        }

        let compiled = JSONSchema::compile(&schema.body).map_err(|e| BrokerError::TopicConfigError(
            format!("invalid schema for event type '{}': {}", schema.event_type, e),
        ))?;

        self.compiled.write().unwrap().insert(key, compiled);
        Ok(())
    }

    pub fn has_schema(&self, topic: &str, event_type: &str) -> bool {
        self.compiled
            .read()
            .unwrap()
            .contains_key(&(topic.to_string(), event_type.to_string()))
    }

    /// Validate `payload` against the schema registered for
    /// `(topic, event_type)`. Returns `BrokerError::SchemaNotFound` when no
    /// schema is registered for that event type on this topic, and
    /// `BrokerError::SchemaValidation` carrying the JSON-pointer paths of
    /// each failing location when the payload does not conform.
    pub fn validate(&self, topic: &str, event_type: &str, payload: &Value) -> BrokerResult<()> {
        let guard = self.compiled.read().unwrap();
        let compiled = guard
            .get(&(topic.to_string(), event_type.to_string()))
            .ok_or_else(|| BrokerError::SchemaNotFound {
                topic: topic.to_string(),
                event_type: event_type.to_string(),
            })?;

        if let Err(errors) = compiled.validate(payload) {
            let paths: Vec<String> = errors.map(|e| e.instance_path.to_string()).collect();
            let message = format!("payload does not conform to the schema for '{event_type}'");
            return Err(BrokerError::SchemaValidation { paths, message });
        }

        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Resource: a named, typed desired-state object.
//!
//! A `Resource` plays two roles. The manifest declares one per managed
//! unit (the desired state); a provider builds a second instance from
//! direct system inspection (the current state). The two must never be
//! derived from each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConvergeError;
use crate::types::{Action, Value};

/// A declarative desired-state object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    name: String,
    type_tag: String,
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    updated_by_last_action: bool,
}

impl Resource {
    /// Create a resource with no actions or properties.
    pub fn new(type_tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            actions: Vec::new(),
            properties: BTreeMap::new(),
            updated_by_last_action: false,
        }
    }

    /// Append an action to run, in declaration order.
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Set a declared property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Actions requested for this resource, in declaration order.
    /// An empty list means the explicit no-op.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Convenience accessor for string-valued properties.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Convenience accessor for boolean-valued properties.
    pub fn property_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(Value::as_bool)
    }

    /// Set or overwrite a property. Providers use this while building
    /// an observed-state resource.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Whether a real side effect occurred for this resource during
    /// the current run.
    pub fn updated_by_last_action(&self) -> bool {
        self.updated_by_last_action
    }

    /// Record that a side effect occurred. Handlers may call this
    /// directly when an update happens outside the converge log.
    pub fn mark_updated(&mut self) {
        self.updated_by_last_action = true;
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_tag, self.name)
    }
}

/// Ordered collection of resources, addressable by display name.
///
/// Iteration order is declaration order; later resources may depend on
/// the side effects of earlier ones.
#[derive(Debug, Default)]
pub struct ResourceCollection {
    resources: Vec<Resource>,
    index: BTreeMap<String, usize>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource. The `type[name]` form must be unique within
    /// the collection.
    pub fn push(&mut self, resource: Resource) -> Result<(), ConvergeError> {
        let key = resource.to_string();
        if self.index.contains_key(&key) {
            return Err(ConvergeError::DuplicateResource { name: key });
        }
        self.index.insert(key, self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Resource> {
        self.resources.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Resource> {
        self.resources.get_mut(index)
    }

    /// Look up a resource by its `type[name]` form.
    pub fn lookup(&self, key: &str) -> Option<&Resource> {
        self.index.get(key).map(|&i| &self.resources[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }
}

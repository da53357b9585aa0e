//! Recipe loading: TOML manifest to resource collection.
//!
//! A recipe declares resources in the order they should converge:
//!
//! ```toml
//! [[resource]]
//! type = "package"
//! name = "ripgrep"
//! action = "install"
//!
//! [[resource]]
//! type = "file"
//! name = "/etc/motd"
//! action = ["create", "touch"]
//! content = "managed by tend"
//! ```
//!
//! Any key other than `type`, `name`, and `action` becomes a declared
//! property on the resource.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use convergence::{Action, ConvergeError, Resource, ResourceCollection, Value};

use crate::providers;

/// Errors raised while loading a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("recipe not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("failed to read recipe: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid recipe syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("resource `{resource}`: {source}")]
    Resource {
        resource: String,
        source: ConvergeError,
    },

    #[error("resource `{resource}`: no default action for type `{type_tag}`")]
    NoDefaultAction { resource: String, type_tag: String },

    #[error("resource `{resource}`: property `{key}` has an unsupported value type")]
    UnsupportedProperty { resource: String, key: String },

    #[error(transparent)]
    Collection(#[from] ConvergeError),
}

#[derive(Debug, Deserialize)]
struct RecipeFile {
    #[serde(default, rename = "resource")]
    resources: Vec<ResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    #[serde(rename = "type")]
    type_tag: String,
    name: String,
    #[serde(default)]
    action: Option<ActionField>,
    #[serde(flatten)]
    properties: BTreeMap<String, toml::Value>,
}

/// `action = "install"` or `action = ["stop", "disable"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActionField {
    One(String),
    Many(Vec<String>),
}

/// Load a recipe file into an ordered resource collection.
pub fn load(path: &Path) -> Result<ResourceCollection, RecipeError> {
    if !path.exists() {
        return Err(RecipeError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Parse recipe text into an ordered resource collection.
pub fn parse(text: &str) -> Result<ResourceCollection, RecipeError> {
    let file: RecipeFile = toml::from_str(text)?;
    let mut collection = ResourceCollection::new();

    for entry in file.resources {
        let display = format!("{}[{}]", entry.type_tag, entry.name);
        let mut resource = Resource::new(&entry.type_tag, &entry.name);

        for action in resolve_actions(&entry, &display)? {
            resource = resource.with_action(action);
        }

        for (key, value) in &entry.properties {
            let value = convert_value(value).ok_or_else(|| RecipeError::UnsupportedProperty {
                resource: display.clone(),
                key: key.clone(),
            })?;
            resource.set_property(key, value);
        }

        collection.push(resource)?;
    }

    Ok(collection)
}

fn resolve_actions(entry: &ResourceEntry, display: &str) -> Result<Vec<Action>, RecipeError> {
    let names: Vec<&str> = match &entry.action {
        Some(ActionField::One(name)) => vec![name.as_str()],
        Some(ActionField::Many(names)) => names.iter().map(String::as_str).collect(),
        None => {
            // No action declared: fall back to the type default.
            let action = providers::default_action(&entry.type_tag).ok_or_else(|| {
                RecipeError::NoDefaultAction {
                    resource: display.to_string(),
                    type_tag: entry.type_tag.clone(),
                }
            })?;
            return Ok(vec![action]);
        }
    };

    names
        .into_iter()
        .map(|name| {
            name.parse().map_err(|source| RecipeError::Resource {
                resource: display.to_string(),
                source,
            })
        })
        .collect()
}

fn convert_value(value: &toml::Value) -> Option<Value> {
    match value {
        toml::Value::String(s) => Some(Value::String(s.clone())),
        toml::Value::Integer(i) => Some(Value::Integer(*i)),
        toml::Value::Boolean(b) => Some(Value::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_declaration_order() {
        let collection = parse(
            r#"
            [[resource]]
            type = "package"
            name = "ripgrep"
            action = "install"

            [[resource]]
            type = "file"
            name = "/etc/motd"
            action = "create"
            content = "hello"
            mode = 420
            backup = true
            "#,
        )
        .unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(0).unwrap().type_tag(), "package");

        let file = collection.get(1).unwrap();
        assert_eq!(file.actions(), [Action::Create]);
        assert_eq!(file.property_str("content"), Some("hello"));
        assert_eq!(file.property("mode").unwrap().as_int(), Some(420));
        assert_eq!(file.property_bool("backup"), Some(true));
    }

    #[test]
    fn test_action_list() {
        let collection = parse(
            r#"
            [[resource]]
            type = "service"
            name = "telemetry"
            action = ["stop", "disable"]
            "#,
        )
        .unwrap();

        assert_eq!(
            collection.get(0).unwrap().actions(),
            [Action::Stop, Action::Disable]
        );
    }

    #[test]
    fn test_missing_action_uses_type_default() {
        let collection = parse(
            r#"
            [[resource]]
            type = "package"
            name = "git"
            "#,
        )
        .unwrap();

        assert_eq!(collection.get(0).unwrap().actions(), [Action::Install]);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = parse(
            r#"
            [[resource]]
            type = "file"
            name = "/tmp/x"
            action = "explode"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("explode"));
    }

    #[test]
    fn test_duplicate_resources_are_rejected() {
        let err = parse(
            r#"
            [[resource]]
            type = "file"
            name = "/tmp/x"
            action = "create"

            [[resource]]
            type = "file"
            name = "/tmp/x"
            action = "delete"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.toml");
        std::fs::write(
            &path,
            r#"
            [[resource]]
            type = "message"
            name = "greeting"
            message = "converged"
            "#,
        )
        .unwrap();

        let collection = load(&path).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get(0).unwrap().actions(), [Action::Write]);

        assert!(matches!(
            load(&dir.path().join("missing.toml")),
            Err(RecipeError::NotFound(_))
        ));
    }
}

//! Agent settings file.
//!
//! Settings live at `<config dir>/tend/config.toml` and only carry
//! knobs that are not per-run: the default recipe location and the
//! failure policy. Everything the agent converges comes from the
//! recipe itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default recipe path; `~` is expanded.
    #[serde(default)]
    pub recipe: Option<String>,

    /// Keep converging after a resource fails.
    #[serde(default)]
    pub keep_going: bool,
}

impl Config {
    /// Location of the settings file, if a config directory exists.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tend").join("config.toml"))
    }

    /// Load settings, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config: {}", path.display()))
    }

    /// Resolve the recipe path: explicit override first, then the
    /// configured default, then `recipe.toml` in the working
    /// directory.
    pub fn recipe_path(&self, override_path: Option<&Path>) -> PathBuf {
        if let Some(path) = override_path {
            return path.to_path_buf();
        }
        if let Some(recipe) = &self.recipe {
            return PathBuf::from(shellexpand::tilde(recipe).into_owned());
        }
        PathBuf::from("recipe.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.recipe.is_none());
        assert!(!config.keep_going);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "recipe = \"/srv/recipe.toml\"\nkeep_going = true\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.recipe.as_deref(), Some("/srv/recipe.toml"));
        assert!(config.keep_going);
    }

    #[test]
    fn test_recipe_path_resolution() {
        let config = Config {
            recipe: Some("/srv/recipe.toml".to_string()),
            keep_going: false,
        };
        assert_eq!(config.recipe_path(None), PathBuf::from("/srv/recipe.toml"));
        assert_eq!(
            config.recipe_path(Some(Path::new("/tmp/other.toml"))),
            PathBuf::from("/tmp/other.toml")
        );

        let bare = Config::default();
        assert_eq!(bare.recipe_path(None), PathBuf::from("recipe.toml"));
    }
}

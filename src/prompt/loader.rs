//! Prompt Loader - resolve template sources, with on-disk overrides
//!
//! Templates are embedded in the binary. A configured directory may override
//! any of them with a `<name>.hbs` file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::info;

use super::templates;
use crate::error::{QuimeraError, Result};

/// Loads and caches template sources
pub struct PromptLoader {
    /// Optional directory holding `<name>.hbs` overrides
    templates_dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, String>>,
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded()
    }
}

impl PromptLoader {
    /// Loader with only the embedded templates
    pub fn embedded() -> Self {
        Self {
            templates_dir: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loader that prefers files in `templates_dir`
    pub fn with_overrides(templates_dir: impl AsRef<Path>) -> Self {
        Self {
            templates_dir: Some(templates_dir.as_ref().to_path_buf()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Template source for `name`
    pub fn load(&self, name: &str) -> Result<String> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|e| QuimeraError::Template(format!("Failed to acquire read lock: {}", e)))?;
            if let Some(content) = cache.get(name) {
                return Ok(content.clone());
            }
        }

        let content = match self.override_path(name) {
            Some(path) if path.is_file() => {
                info!("Using template override {}", path.display());
                std::fs::read_to_string(&path).map_err(|e| {
                    QuimeraError::Template(format!("Failed to load template '{}' from {:?}: {}", name, path, e))
                })?
            }
            _ => templates::embedded(name)
                .ok_or_else(|| QuimeraError::Template(format!("Unknown template '{}'", name)))?
                .to_string(),
        };

        {
            let mut cache = self
                .cache
                .write()
                .map_err(|e| QuimeraError::Template(format!("Failed to acquire write lock: {}", e)))?;
            cache.insert(name.to_string(), content.clone());
        }

        Ok(content)
    }

    fn override_path(&self, name: &str) -> Option<PathBuf> {
        self.templates_dir.as_ref().map(|dir| dir.join(format!("{}.hbs", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_embedded() {
        let loader = PromptLoader::embedded();
        let content = loader.load("next_prompt").unwrap();
        assert!(content.contains("{{trace}}"));
    }

    #[test]
    fn test_unknown_template() {
        assert!(PromptLoader::embedded().load("nope").is_err());
    }

    #[test]
    fn test_override_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("constraints.hbs"), "Only {{valuableTokenName}}").unwrap();

        let loader = PromptLoader::with_overrides(temp.path());
        assert_eq!(loader.load("constraints").unwrap(), "Only {{valuableTokenName}}");
        // Templates without an override fall back to the embedded source
        assert!(loader.load("initial_prompt").unwrap().contains("# Instructions"));
    }

    #[test]
    fn test_load_is_cached() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("constraints.hbs");
        std::fs::write(&path, "first").unwrap();

        let loader = PromptLoader::with_overrides(temp.path());
        assert_eq!(loader.load("constraints").unwrap(), "first");
        std::fs::write(&path, "second").unwrap();
        assert_eq!(loader.load("constraints").unwrap(), "first");
    }
}

//! Prompt template store and renderer
//!
//! Loads markdown prompt templates with {{var}} placeholders through the same
//! load-once cache discipline as the task templates, and renders them with
//! per-user dynamic variables for the voice session's prompt override.

use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::types::{AstraError, Result};

/// Process-owned cache of prompt templates keyed by path
pub struct PromptStore {
    cache: DashMap<PathBuf, Arc<String>>,
}

impl PromptStore {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a raw template, loading it from disk on first access
    pub fn get(&self, path: &Path) -> Result<Arc<String>> {
        if let Some(entry) = self.cache.get(path) {
            return Ok(Arc::clone(entry.value()));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            AstraError::Template(format!("Cannot read prompt {}: {}", path.display(), e))
        })?;
        let raw = Arc::new(raw);

        let entry = self
            .cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&raw));
        debug!(prompt = %path.display(), "Prompt template loaded");
        Ok(Arc::clone(entry.value()))
    }

    /// Load and render a template with the given variables
    pub fn render(&self, path: &Path, vars: &HashMap<String, String>) -> Result<String> {
        let template = self.get(path)?;
        Ok(render_str(&template, vars))
    }

    /// Drop all cached templates
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for PromptStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace {{var}} placeholders; unknown placeholders pass through unchanged
pub fn render_str(template: &str, vars: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_render_substitutes_known_vars() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Ada".to_string());
        vars.insert("sign".to_string(), "Aries".to_string());

        let out = render_str("Hello {{name}}, your sign is {{sign}}.", &vars);
        assert_eq!(out, "Hello Ada, your sign is Aries.");
    }

    #[test]
    fn test_unknown_placeholder_passes_through() {
        let out = render_str("{{missing}} stays", &HashMap::new());
        assert_eq!(out, "{{missing}} stays");
    }

    #[test]
    fn test_store_caches_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responder.md");
        fs::write(&path, "You are Astra, speaking to {{display_name}}.").unwrap();

        let store = PromptStore::new();
        let first = store.get(&path).unwrap();
        let second = store.get(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mut vars = HashMap::new();
        vars.insert("display_name".to_string(), "Ada".to_string());
        let rendered = store.render(&path, &vars).unwrap();
        assert_eq!(rendered, "You are Astra, speaking to Ada.");
    }
}

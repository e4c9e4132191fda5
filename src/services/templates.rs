//! Task definition template store
//!
//! Loads YAML task definitions (birth chart, horoscope) from a configured
//! directory. An explicit cache object owned by the process and injected via
//! AppState: populate-on-first-access, optional warm-up at startup, entries
//! immutable once inserted, explicit clear. Concurrent reads are safe.

use dashmap::DashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::{AstraError, Result};

/// A parsed task definition
#[derive(Debug, Clone)]
pub struct TaskTemplate {
    /// Template name (file stem)
    pub name: String,
    /// Parsed YAML definition
    pub definition: serde_yaml::Value,
}

impl TaskTemplate {
    /// Definition as JSON for the task-runner API
    pub fn as_json(&self) -> Result<Value> {
        serde_json::to_value(&self.definition)
            .map_err(|e| AstraError::Template(format!("Template '{}' not JSON-compatible: {}", self.name, e)))
    }
}

/// Process-owned cache of task definition templates
pub struct TaskTemplateStore {
    dir: PathBuf,
    cache: DashMap<String, Arc<TaskTemplate>>,
}

impl TaskTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    /// Get a template by name, loading it from disk on first access
    pub fn get(&self, name: &str) -> Result<Arc<TaskTemplate>> {
        if let Some(entry) = self.cache.get(name) {
            return Ok(Arc::clone(entry.value()));
        }

        let template = Arc::new(self.load(name)?);
        // Insert-once: a concurrent loader may have won the race; keep the
        // existing entry so cached templates stay immutable
        let entry = self
            .cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&template));
        Ok(Arc::clone(entry.value()))
    }

    /// Load every *.yaml file in the template directory into the cache
    pub fn warm_up(&self) -> Result<usize> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            AstraError::Template(format!(
                "Cannot read template directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut loaded = 0usize;
        for entry in entries {
            let path = entry
                .map_err(|e| AstraError::Template(format!("Directory read failed: {}", e)))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                self.get(name)?;
                loaded += 1;
            }
        }

        info!(dir = %self.dir.display(), count = loaded, "Task templates warmed up");
        Ok(loaded)
    }

    /// Drop all cached templates (next access reloads from disk)
    pub fn clear(&self) {
        self.cache.clear();
        debug!("Task template cache cleared");
    }

    /// Number of cached templates
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn load(&self, name: &str) -> Result<TaskTemplate> {
        let path = self.dir.join(format!("{}.yaml", name));
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            AstraError::Template(format!("Cannot read template {}: {}", path.display(), e))
        })?;

        let definition: serde_yaml::Value = serde_yaml::from_str(&raw)
            .map_err(|e| AstraError::Template(format!("Invalid YAML in {}: {}", path.display(), e)))?;

        debug!(template = %name, "Task template loaded");

        Ok(TaskTemplate {
            name: name.to_string(),
            definition,
        })
    }

    /// Template directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, TaskTemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(format!("{}.yaml", name)), content).unwrap();
        }
        let store = TaskTemplateStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_populate_on_first_access() {
        let (_dir, store) = store_with(&[("birth_chart", "name: Birth Chart\nmain: []\n")]);
        assert!(store.is_empty());

        let template = store.get("birth_chart").unwrap();
        assert_eq!(template.name, "birth_chart");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cached_entry_is_reused() {
        let (_dir, store) = store_with(&[("horoscope", "name: Horoscope\n")]);
        let first = store.get("horoscope").unwrap();
        let second = store.get("horoscope").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_warm_up_loads_all_yaml_files() {
        let (_dir, store) = store_with(&[
            ("birth_chart", "name: Birth Chart\n"),
            ("horoscope", "name: Horoscope\n"),
        ]);
        let loaded = store.warm_up().unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear_forces_reload() {
        let (dir, store) = store_with(&[("horoscope", "name: Old\n")]);
        let before = store.get("horoscope").unwrap();

        fs::write(dir.path().join("horoscope.yaml"), "name: New\n").unwrap();
        // Cached entry is immutable; the old parse is still served
        let cached = store.get("horoscope").unwrap();
        assert!(Arc::ptr_eq(&before, &cached));

        store.clear();
        let reloaded = store.get("horoscope").unwrap();
        assert!(!Arc::ptr_eq(&before, &reloaded));
    }

    #[test]
    fn test_missing_template_errors() {
        let (_dir, store) = store_with(&[]);
        assert!(store.get("nope").is_err());
    }

    #[test]
    fn test_as_json() {
        let (_dir, store) = store_with(&[("birth_chart", "name: Birth Chart\nsteps:\n  - eval: 1\n")]);
        let json = store.get("birth_chart").unwrap().as_json().unwrap();
        assert_eq!(json["name"], "Birth Chart");
        assert_eq!(json["steps"][0]["eval"], 1);
    }
}

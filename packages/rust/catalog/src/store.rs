//! Generic keyed, insertion-ordered catalog backed by a JSON array file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use schemaharvest_shared::{Dataset, HarvestError, Module, Result};

/// An entity with a stable identity key.
pub trait CatalogEntry: Clone + Serialize + DeserializeOwned {
    fn key(&self) -> &str;
}

impl CatalogEntry for Module {
    fn key(&self) -> &str {
        &self.name
    }
}

impl CatalogEntry for Dataset {
    fn key(&self) -> &str {
        &self.name
    }
}

/// In-memory working set of one catalog file.
///
/// Mutations only touch memory; [`Catalog::commit`] is the single point
/// where state reaches disk.
#[derive(Debug)]
pub struct Catalog<E> {
    path: PathBuf,
    entries: Vec<E>,
    positions: HashMap<String, usize>,
    readonly: bool,
}

impl<E: CatalogEntry> Catalog<E> {
    /// Create an empty, writable catalog bound to `path`. Does not touch disk.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            positions: HashMap::new(),
            readonly: false,
        }
    }

    /// Create an empty catalog whose [`commit`](Self::commit) always fails.
    pub fn open_readonly(path: impl Into<PathBuf>) -> Self {
        Self {
            readonly: true,
            ..Self::open(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory state with the file's contents.
    ///
    /// A missing or blank file loads as an empty catalog. On a parse error the
    /// catalog is left empty and the error is returned. Repeated keys keep the
    /// first position and the last value.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&mut self) -> Result<()> {
        self.entries.clear();
        self.positions.clear();

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("catalog file not found, starting empty");
                return Ok(());
            }
            Err(e) => return Err(HarvestError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            debug!("catalog file is empty");
            return Ok(());
        }

        let entries: Vec<E> = serde_json::from_str(&content).map_err(|e| {
            HarvestError::Storage(format!("invalid catalog {}: {e}", self.path.display()))
        })?;

        for entry in entries {
            self.save(entry);
        }

        debug!(entries = self.entries.len(), "catalog loaded");
        Ok(())
    }

    /// Insert or replace by key. A replaced entry keeps its position.
    pub fn save(&mut self, entry: E) {
        match self.positions.get(entry.key()) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.positions.insert(entry.key().to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Remove by key, returning the removed entry.
    pub fn delete(&mut self, key: &str) -> Option<E> {
        let idx = self.positions.remove(key)?;
        let removed = self.entries.remove(idx);
        for (i, entry) in self.entries.iter().enumerate().skip(idx) {
            self.positions.insert(entry.key().to_string(), i);
        }
        Some(removed)
    }

    /// Remove the entry with the same key as `entry`.
    pub fn delete_entry(&mut self, entry: &E) -> Option<E> {
        self.delete(entry.key())
    }

    pub fn get(&self, key: &str) -> Option<&E> {
        self.positions.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().to_string()).collect()
    }

    pub(crate) fn entries(&self) -> &[E] {
        &self.entries
    }

    /// Copy of all entries in insertion order, detached from later mutation.
    pub fn snapshot(&self) -> Vec<E> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the current state to disk (temp file, then rename).
    #[instrument(skip(self), fields(path = %self.path.display(), entries = self.entries.len()))]
    pub fn commit(&self) -> Result<()> {
        self.check_writable()?;

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| HarvestError::Storage(format!("JSON serialization failed: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
        }

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| {
                HarvestError::Storage(format!("catalog path has no file name: {}", self.path.display()))
            })?
            .to_string_lossy();
        let temp = self.path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, json).map_err(|e| HarvestError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| HarvestError::io(&self.path, e))?;

        debug!("catalog committed");
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(HarvestError::Storage(format!(
                "catalog {} is opened read-only",
                self.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sh-store-test-{}", uuid::Uuid::now_v7()))
            .join(name)
    }

    fn module(name: &str, datasets: &[&str]) -> Module {
        Module {
            name: name.into(),
            url: format!("https://docs.example.com/{}", name.to_lowercase()),
            datasets: datasets.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = temp_path("modules.json");
        let mut catalog: Catalog<Module> = Catalog::open(&path);
        catalog.load().unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn blank_file_loads_empty() {
        let path = temp_path("modules.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "  \n").unwrap();

        let mut catalog: Catalog<Module> = Catalog::open(&path);
        catalog.load().unwrap();
        assert!(catalog.is_empty());
        cleanup(&path);
    }

    #[test]
    fn malformed_file_is_an_error_and_leaves_catalog_empty() {
        let path = temp_path("modules.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let mut catalog: Catalog<Module> = Catalog::open(&path);
        catalog.save(module("Stale", &[]));
        let err = catalog.load().unwrap_err();
        assert!(matches!(err, HarvestError::Storage(_)));
        assert!(catalog.is_empty());
        cleanup(&path);
    }

    #[test]
    fn save_commit_load_roundtrip() {
        let path = temp_path("modules.json");
        let mut catalog: Catalog<Module> = Catalog::open(&path);
        catalog.save(module("Users", &["Users", "User Logins"]));
        catalog.save(module("Awards", &["Awards Issued"]));
        catalog.commit().unwrap();

        let mut reloaded: Catalog<Module> = Catalog::open(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.snapshot(), catalog.snapshot());
        assert_eq!(reloaded.keys(), vec!["Users", "Awards"]);
        cleanup(&path);
    }

    #[test]
    fn upsert_keeps_position() {
        let mut catalog: Catalog<Module> = Catalog::open(temp_path("m.json"));
        catalog.save(module("A", &[]));
        catalog.save(module("B", &[]));
        catalog.save(module("A", &["x"]));

        assert_eq!(catalog.keys(), vec!["A", "B"]);
        assert_eq!(catalog.get("A").unwrap().datasets, vec!["x"]);
    }

    #[test]
    fn delete_by_key_and_by_entry() {
        let mut catalog: Catalog<Module> = Catalog::open(temp_path("m.json"));
        catalog.save(module("A", &[]));
        catalog.save(module("B", &[]));
        catalog.save(module("C", &[]));

        assert_eq!(catalog.delete("A").unwrap().name, "A");
        assert!(catalog.delete("A").is_none());
        assert_eq!(catalog.get("C").unwrap().name, "C");

        let b = catalog.get("B").unwrap().clone();
        assert!(catalog.delete_entry(&b).is_some());
        assert_eq!(catalog.keys(), vec!["C"]);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut catalog: Catalog<Module> = Catalog::open(temp_path("m.json"));
        catalog.save(module("A", &[]));
        catalog.save(module("B", &[]));

        let snapshot = catalog.snapshot();
        for m in &snapshot {
            catalog.delete(&m.name);
        }
        assert_eq!(snapshot.len(), 2);
        assert!(catalog.is_empty());
    }

    #[test]
    fn duplicate_keys_in_file_collapse() {
        let path = temp_path("modules.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[{"name":"A","url":"u1","datasets":[]},
                {"name":"B","url":"u2","datasets":[]},
                {"name":"A","url":"u3","datasets":["x"]}]"#,
        )
        .unwrap();

        let mut catalog: Catalog<Module> = Catalog::open(&path);
        catalog.load().unwrap();
        assert_eq!(catalog.keys(), vec!["A", "B"]);
        assert_eq!(catalog.get("A").unwrap().url, "u3");
        cleanup(&path);
    }

    #[test]
    fn readonly_catalog_refuses_commit() {
        let path = temp_path("modules.json");
        let mut catalog: Catalog<Module> = Catalog::open_readonly(&path);
        catalog.save(module("A", &[]));
        assert!(catalog.commit().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn commit_leaves_no_temp_file() {
        let path = temp_path("modules.json");
        let mut catalog: Catalog<Module> = Catalog::open(&path);
        catalog.save(module("A", &[]));
        catalog.commit().unwrap();

        let dir = path.parent().unwrap();
        let names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["modules.json"]);
        cleanup(&path);
    }
}

//! Dataset catalog with a `module_name -> name` secondary index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use schemaharvest_shared::{Dataset, HarvestError, Result};

use crate::store::Catalog;

/// [`Catalog<Dataset>`] plus the module-name index the reconciler joins on.
///
/// The index is rebuilt after every load, save, and delete, so a lookup never
/// observes a stale mapping.
#[derive(Debug)]
pub struct DatasetCatalog {
    inner: Catalog<Dataset>,
    by_module: HashMap<String, String>,
}

impl DatasetCatalog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Catalog::open(path),
            by_module: HashMap::new(),
        }
    }

    pub fn open_readonly(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Catalog::open_readonly(path),
            by_module: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Load from disk. The index reflects whatever was loaded, even on error.
    pub fn load(&mut self) -> Result<()> {
        let result = self.inner.load();
        self.rebuild_index();
        result
    }

    /// Insert or replace by name.
    ///
    /// Fails if another dataset already owns this dataset's `module_name`.
    pub fn save(&mut self, dataset: Dataset) -> Result<()> {
        if let Some(owner) = self.by_module.get(&dataset.module_name) {
            if *owner != dataset.name {
                return Err(HarvestError::validation(format!(
                    "module name {:?} already belongs to dataset {owner:?}, not {:?}",
                    dataset.module_name, dataset.name
                )));
            }
        }
        self.inner.save(dataset);
        self.rebuild_index();
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Option<Dataset> {
        let removed = self.inner.delete(name);
        self.rebuild_index();
        removed
    }

    pub fn delete_entry(&mut self, dataset: &Dataset) -> Option<Dataset> {
        self.delete(&dataset.name)
    }

    /// Name of the dataset whose `module_name` is `module_name`.
    pub fn key_for(&self, module_name: &str) -> Option<&str> {
        self.by_module.get(module_name).map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn snapshot(&self) -> Vec<Dataset> {
        self.inner.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn rebuild_index(&mut self) {
        self.by_module.clear();
        for dataset in self.inner.entries() {
            if let Some(previous) = self
                .by_module
                .insert(dataset.module_name.clone(), dataset.name.clone())
            {
                warn!(
                    module_name = %dataset.module_name,
                    previous = %previous,
                    current = %dataset.name,
                    "module name claimed by more than one dataset, keeping the later one"
                );
            }
        }
    }
}

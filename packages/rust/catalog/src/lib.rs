//! File-backed catalogs for modules and datasets.
//!
//! Each catalog is a JSON array on disk, held fully in memory while in use:
//! - [`Catalog`]: generic keyed, insertion-ordered store with load/save/delete/commit
//! - [`DatasetCatalog`]: dataset store with the `module_name -> name` index
//!
//! **Access rules:** the harvester opens both catalogs writable; readers such as
//! code generators use `open_readonly`, which refuses to commit.

mod dataset;
mod store;

pub use dataset::DatasetCatalog;
pub use store::{Catalog, CatalogEntry};

use schemaharvest_shared::Module;

/// The module catalog.
pub type ModuleCatalog = Catalog<Module>;

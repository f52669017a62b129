//! HTML navigation and column-table parsing for dataset documentation pages.
//!
//! This crate provides:
//! - [`navigator`]: locates the content block and segments it into
//!   heading/paragraphs/table groups
//! - [`table`]: turns one column table into typed [`ColumnRecord`]s
//! - [`module`]: drives both over a whole module document
//! - [`text`]: visible-text cleaning shared by all of the above

pub mod module;
pub mod navigator;
pub mod table;
pub mod text;

pub use module::{ModuleParser, RawDataset};
pub use navigator::{Navigator, Segment};
pub use table::{COLUMN_CELLS, ColumnRecord, parse_column_table};
pub use text::{clean_text, normalize};

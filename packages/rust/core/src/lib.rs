//! Harvest orchestration for SchemaHarvest.
//!
//! This crate turns parsed module documents into catalog entries:
//! - [`assembler`]: dataset/column identity and flag rules
//! - [`reconcile`]: the harvest run (fetch → parse → diff → upsert → reclaim → commit)
//! - [`progress`]: structured run events and the sink they are sent to

pub mod assembler;
pub mod progress;
pub mod reconcile;

pub use assembler::Assembler;
pub use progress::{HarvestEvent, ProgressSink, RunState, SilentProgress};
pub use reconcile::{
    DatasetDiff, HarvestOptions, HarvestReport, Reconciler, diff_datasets, harvest,
};

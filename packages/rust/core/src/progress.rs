//! Structured progress events emitted during a harvest run.

use std::fmt;

/// Reconciler state. A run moves forward through these and ends in
/// `Committed` (or `GlobalReclaim` for a dry run) or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loaded,
    Fetching,
    Parsing,
    Merging,
    GlobalReclaim,
    Committed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loaded => "loaded",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Merging => "merging",
            Self::GlobalReclaim => "global-reclaim",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One thing that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    StateChanged(RunState),
    /// Processing of a module began.
    ModuleStarted { module: String },
    /// Heading already listed for the module.
    DatasetMatched { module_name: String },
    /// Heading not previously listed for the module.
    DatasetAdded { module_name: String },
    /// Heading listed for the module but absent from its document.
    DatasetMissing { module_name: String },
    /// Dataset removed because no module produced it.
    DatasetReclaimed { name: String },
}

impl HarvestEvent {
    /// Human-readable line for this event, if it has one.
    ///
    /// Module lines carry the name; dataset lines are prefixed with
    /// `+` (added), `~` (matched), `!` (missing) or `-` (reclaimed).
    pub fn render(&self) -> Option<String> {
        match self {
            Self::StateChanged(_) => None,
            Self::ModuleStarted { module } => Some(module.clone()),
            Self::DatasetAdded { module_name } => Some(format!("  + {module_name}")),
            Self::DatasetMatched { module_name } => Some(format!("  ~ {module_name}")),
            Self::DatasetMissing { module_name } => Some(format!("  ! {module_name}")),
            Self::DatasetReclaimed { name } => Some(format!("- {name}")),
        }
    }
}

/// Receiver for [`HarvestEvent`]s. The caller decides how to render them.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &HarvestEvent);
}

/// No-op sink for headless/test usage.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: &HarvestEvent) {}
}

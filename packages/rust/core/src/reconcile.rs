//! Harvest run: fetch every module, parse, merge into the dataset catalog,
//! reclaim orphans, commit.
//!
//! A run is all-or-nothing. Any module failure aborts before the commit, so
//! the catalog files are exactly as they were before the run.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use schemaharvest_catalog::{DatasetCatalog, ModuleCatalog};
use schemaharvest_fetch::DocumentFetcher;
use schemaharvest_parser::ModuleParser;
use schemaharvest_shared::{AppConfig, Dataset, HarvestError, Module, Result};

use crate::assembler::Assembler;
use crate::progress::{HarvestEvent, ProgressSink, RunState};

// ---------------------------------------------------------------------------
// Options & report
// ---------------------------------------------------------------------------

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Run everything up to and including reclamation, but do not commit.
    pub dry_run: bool,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Modules processed.
    pub modules: usize,
    pub matched: usize,
    pub added: usize,
    pub missing: usize,
    /// Datasets deleted by the global sweep.
    pub reclaimed: usize,
    /// Dataset catalog size after the run.
    pub datasets_total: usize,
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Diff helpers
// ---------------------------------------------------------------------------

/// Headings of one module, grouped by how they compare with the last run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DatasetDiff {
    pub matched: Vec<String>,
    pub added: Vec<String>,
    pub missing: Vec<String>,
}

/// Compare a module's stored headings with freshly parsed ones.
pub fn diff_datasets(stored: &[String], fresh: &[String]) -> DatasetDiff {
    let stored_set: HashSet<&str> = stored.iter().map(String::as_str).collect();
    let fresh_set: HashSet<&str> = fresh.iter().map(String::as_str).collect();

    let mut diff = DatasetDiff::default();

    for heading in fresh {
        if stored_set.contains(heading.as_str()) {
            diff.matched.push(heading.clone());
        } else {
            diff.added.push(heading.clone());
        }
    }

    for heading in stored {
        if !fresh_set.contains(heading.as_str()) {
            diff.missing.push(heading.clone());
        }
    }

    diff
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Drives harvest runs with one fetcher and fixed parsing tables.
pub struct Reconciler<F> {
    fetcher: F,
    parser: ModuleParser,
    assembler: Assembler,
}

impl<F: DocumentFetcher> Reconciler<F> {
    pub fn new(fetcher: F, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: ModuleParser::new(&config.navigator)?,
            assembler: Assembler::new(&config.assembler),
        })
    }

    /// Run one harvest against the given catalogs.
    ///
    /// Both catalogs are (re)loaded from disk first; a load failure is logged
    /// and the catalog is treated as empty.
    #[instrument(skip_all, fields(modules_path = %modules.path().display(), dry_run = options.dry_run))]
    pub async fn run(
        &self,
        modules: &mut ModuleCatalog,
        datasets: &mut DatasetCatalog,
        options: &HarvestOptions,
        progress: &dyn ProgressSink,
    ) -> Result<HarvestReport> {
        progress.emit(&HarvestEvent::StateChanged(RunState::Idle));

        let result = self.run_inner(modules, datasets, options, progress).await;
        if let Err(e) = &result {
            error!(error = %e, "harvest failed, nothing committed");
            progress.emit(&HarvestEvent::StateChanged(RunState::Failed));
        }
        result
    }

    async fn run_inner(
        &self,
        modules: &mut ModuleCatalog,
        datasets: &mut DatasetCatalog,
        options: &HarvestOptions,
        progress: &dyn ProgressSink,
    ) -> Result<HarvestReport> {
        let start = Instant::now();
        let started_at = Utc::now();

        // --- Load ---
        if let Err(e) = modules.load() {
            warn!(error = %e, "module catalog unreadable, starting empty");
        }
        if let Err(e) = datasets.load() {
            warn!(error = %e, "dataset catalog unreadable, starting empty");
        }
        progress.emit(&HarvestEvent::StateChanged(RunState::Loaded));

        let module_list = modules.snapshot();
        info!(modules = module_list.len(), datasets = datasets.len(), "catalogs loaded");

        let mut report = HarvestReport {
            started_at,
            elapsed: Duration::ZERO,
            modules: module_list.len(),
            matched: 0,
            added: 0,
            missing: 0,
            reclaimed: 0,
            datasets_total: 0,
            dry_run: options.dry_run,
        };
        let mut available: HashSet<String> = HashSet::new();

        // --- Per module ---
        for module in module_list {
            progress.emit(&HarvestEvent::ModuleStarted {
                module: module.name.clone(),
            });

            let fresh = self
                .harvest_module(&module, progress)
                .await
                .map_err(|e| HarvestError::in_module(&module.name, e))?;

            progress.emit(&HarvestEvent::StateChanged(RunState::Merging));

            let headings: Vec<String> = fresh.iter().map(|d| d.module_name.clone()).collect();
            let diff = diff_datasets(&module.datasets, &headings);
            report_diff(&diff, progress);
            report.matched += diff.matched.len();
            report.added += diff.added.len();
            report.missing += diff.missing.len();

            info!(
                module = %module.name,
                matched = diff.matched.len(),
                added = diff.added.len(),
                missing = diff.missing.len(),
                "module harvested"
            );

            modules.save(Module {
                datasets: headings,
                ..module.clone()
            });

            for dataset in fresh {
                let merged = merge_dataset(datasets, dataset)
                    .map_err(|e| HarvestError::in_module(&module.name, e))?;
                available.insert(merged.name.clone());
                datasets
                    .save(merged)
                    .map_err(|e| HarvestError::in_module(&module.name, e))?;
            }
        }

        // --- Global reclaim ---
        progress.emit(&HarvestEvent::StateChanged(RunState::GlobalReclaim));
        for name in datasets.keys() {
            if !available.contains(&name) {
                datasets.delete(&name);
                debug!(%name, "reclaimed orphan dataset");
                progress.emit(&HarvestEvent::DatasetReclaimed { name });
                report.reclaimed += 1;
            }
        }

        report.datasets_total = datasets.len();

        // --- Commit ---
        if options.dry_run {
            info!("dry run, skipping commit");
        } else {
            datasets.commit()?;
            modules.commit()?;
            progress.emit(&HarvestEvent::StateChanged(RunState::Committed));
        }

        report.elapsed = start.elapsed();
        info!(
            added = report.added,
            reclaimed = report.reclaimed,
            datasets = report.datasets_total,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "harvest complete"
        );

        Ok(report)
    }

    /// Fetch and parse one module's document into assembled datasets.
    async fn harvest_module(
        &self,
        module: &Module,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Dataset>> {
        progress.emit(&HarvestEvent::StateChanged(RunState::Fetching));
        let html = self.fetcher.fetch(&module.url).await?.into_html(&module.url)?;

        progress.emit(&HarvestEvent::StateChanged(RunState::Parsing));
        let raws = self.parser.parse(&html)?;

        Ok(self.assembler.assemble_all(&module.url, raws))
    }
}

/// Reuse the catalog entry owning `fresh.module_name`, if any, overwriting
/// only its url, description, and columns.
///
/// A new heading whose derived name is already held by a different heading
/// is an error.
fn merge_dataset(datasets: &DatasetCatalog, fresh: Dataset) -> Result<Dataset> {
    let existing = datasets
        .key_for(&fresh.module_name)
        .and_then(|name| datasets.get(name));

    if let Some(existing) = existing {
        return Ok(Dataset {
            url: fresh.url,
            description: fresh.description,
            columns: fresh.columns,
            ..existing.clone()
        });
    }

    if let Some(taken) = datasets.get(&fresh.name) {
        return Err(HarvestError::validation(format!(
            "heading {:?} derives dataset name {:?}, already used by heading {:?}",
            fresh.module_name, fresh.name, taken.module_name
        )));
    }

    Ok(fresh)
}

fn report_diff(diff: &DatasetDiff, progress: &dyn ProgressSink) {
    for module_name in &diff.added {
        progress.emit(&HarvestEvent::DatasetAdded {
            module_name: module_name.clone(),
        });
    }
    for module_name in &diff.matched {
        progress.emit(&HarvestEvent::DatasetMatched {
            module_name: module_name.clone(),
        });
    }
    for module_name in &diff.missing {
        progress.emit(&HarvestEvent::DatasetMissing {
            module_name: module_name.clone(),
        });
    }
}

/// Open both catalogs from `config` and run one harvest.
pub async fn harvest<F: DocumentFetcher>(
    config: &AppConfig,
    fetcher: F,
    options: &HarvestOptions,
    progress: &dyn ProgressSink,
) -> Result<HarvestReport> {
    let reconciler = Reconciler::new(fetcher, config)?;
    let mut modules = ModuleCatalog::open(&config.catalog.modules_path);
    let mut datasets = DatasetCatalog::open(&config.catalog.datasets_path);
    reconciler
        .run(&mut modules, &mut datasets, options, progress)
        .await
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::*;
    use schemaharvest_fetch::{FetchedDocument, StaticFetcher};
    use schemaharvest_shared::ErrorCategory;
    use crate::SilentProgress;

    const AWARDS_URL: &str = "https://docs.example.com/awards";
    const BROKEN_URL: &str = "https://docs.example.com/broken";

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<HarvestEvent>>,
    }

    impl ProgressSink for Recorder {
        fn emit(&self, event: &HarvestEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl Recorder {
        fn lines(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(HarvestEvent::render)
                .collect()
        }

        fn states(&self) -> Vec<RunState> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    HarvestEvent::StateChanged(s) => Some(*s),
                    _ => None,
                })
                .collect()
        }
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("{}/../../../fixtures/html/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    /// Minimal page in the navigator's expected shape with one single-row
    /// table per heading.
    fn page(headings: &[&str]) -> String {
        let sections: String = headings
            .iter()
            .map(|h| {
                format!(
                    "<h2>{h}</h2><p>{h} data.</p><table>\
                     <thead><tr><th>V</th><th>F</th><th>D</th><th>T</th><th>S</th><th>K</th></tr></thead>\
                     <tbody><tr><td>1.0</td><td>Id</td><td>Identifier.</td><td>int</td><td>4</td><td>PK</td></tr></tbody>\
                     </table>"
                )
            })
            .collect();
        format!(
            r#"<html><body><div id="bodyDisplay"><div class="lia-message-body">
            <div class="lia-message-body-content"><article>{sections}</article></div>
            </div></div></body></html>"#
        )
    }

    struct Workspace {
        dir: PathBuf,
        config: AppConfig,
    }

    impl Workspace {
        fn new(modules: &[Module]) -> Self {
            let dir = std::env::temp_dir().join(format!("sh-reconcile-test-{}", uuid::Uuid::now_v7()));
            let mut config = AppConfig::default();
            config.catalog.modules_path = dir.join("modules.json");
            config.catalog.datasets_path = dir.join("datasets.json");

            let mut catalog = ModuleCatalog::open(&config.catalog.modules_path);
            for module in modules {
                catalog.save(module.clone());
            }
            catalog.commit().unwrap();

            Self { dir, config }
        }

        fn modules(&self) -> ModuleCatalog {
            let mut catalog = ModuleCatalog::open(&self.config.catalog.modules_path);
            catalog.load().unwrap();
            catalog
        }

        fn datasets(&self) -> DatasetCatalog {
            let mut catalog = DatasetCatalog::open(&self.config.catalog.datasets_path);
            catalog.load().unwrap();
            catalog
        }

        fn read(&self, path: &Path) -> Option<String> {
            std::fs::read_to_string(path).ok()
        }

        fn files(&self) -> (Option<String>, Option<String>) {
            (
                self.read(&self.config.catalog.modules_path),
                self.read(&self.config.catalog.datasets_path),
            )
        }

        async fn run<F: DocumentFetcher>(
            &self,
            fetcher: F,
            progress: &dyn ProgressSink,
        ) -> Result<HarvestReport> {
            harvest(&self.config, fetcher, &HarvestOptions::default(), progress).await
        }
    }

    impl Drop for Workspace {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn awards_fetcher() -> StaticFetcher {
        StaticFetcher::new().with_page(AWARDS_URL, load_fixture("awards.html"))
    }

    #[test]
    fn diff_classifies_headings() {
        let stored = vec!["A".to_string(), "B".to_string()];
        let fresh = vec!["B".to_string(), "C".to_string()];
        let diff = diff_datasets(&stored, &fresh);
        assert_eq!(diff.matched, vec!["B"]);
        assert_eq!(diff.added, vec!["C"]);
        assert_eq!(diff.missing, vec!["A"]);
    }

    #[tokio::test]
    async fn first_run_populates_both_catalogs() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        let recorder = Recorder::default();

        let report = ws.run(awards_fetcher(), &recorder).await.unwrap();
        assert_eq!(report.modules, 1);
        assert_eq!(report.added, 2);
        assert_eq!(report.matched, 0);
        assert_eq!(report.datasets_total, 2);

        let modules = ws.modules();
        assert_eq!(
            modules.get("Awards").unwrap().datasets,
            vec!["Awards Issued", "Award Criteria"]
        );

        let datasets = ws.datasets();
        assert_eq!(datasets.keys(), vec!["AwardsIssued", "AwardCriteria"]);
        let issued = datasets.get("AwardsIssued").unwrap();
        assert_eq!(issued.sql_table_name, "D2L_AWARDS_ISSUED");
        assert_eq!(issued.url, "https://docs.example.com/awards#awards-issued");
        assert_eq!(issued.description, "Issued badges and certificates.");
        assert_eq!(
            datasets.get("AwardCriteria").unwrap().description,
            "Criteria configured for each award."
        );

        assert_eq!(
            recorder.lines(),
            vec!["Awards", "  + Awards Issued", "  + Award Criteria"]
        );
        assert_eq!(
            recorder.states(),
            vec![
                RunState::Idle,
                RunState::Loaded,
                RunState::Fetching,
                RunState::Parsing,
                RunState::Merging,
                RunState::GlobalReclaim,
                RunState::Committed,
            ]
        );
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        ws.run(awards_fetcher(), &SilentProgress).await.unwrap();
        let before = ws.files();

        let recorder = Recorder::default();
        let report = ws.run(awards_fetcher(), &recorder).await.unwrap();

        assert_eq!(ws.files(), before);
        assert_eq!(report.matched, 2);
        assert_eq!(report.added, 0);
        assert_eq!(report.reclaimed, 0);
        assert_eq!(
            recorder.lines(),
            vec!["Awards", "  ~ Awards Issued", "  ~ Award Criteria"]
        );
    }

    #[tokio::test]
    async fn vanished_heading_is_reported_and_reclaimed() {
        let url = "https://docs.example.com/users";
        let ws = Workspace::new(&[Module::new("Users", url)]);
        let first = StaticFetcher::new().with_page(url, page(&["Users", "User Logins"]));
        ws.run(first, &SilentProgress).await.unwrap();
        assert!(ws.datasets().contains("UserLogins"));

        let recorder = Recorder::default();
        let second = StaticFetcher::new().with_page(url, page(&["Users"]));
        let report = ws.run(second, &recorder).await.unwrap();

        assert_eq!(report.missing, 1);
        assert_eq!(report.reclaimed, 1);
        assert!(!ws.datasets().contains("UserLogins"));
        assert_eq!(ws.datasets().key_for("User Logins"), None);
        assert_eq!(ws.modules().get("Users").unwrap().datasets, vec!["Users"]);
        assert!(recorder.lines().contains(&"  ! User Logins".to_string()));
        assert!(recorder.lines().contains(&"- UserLogins".to_string()));
    }

    #[tokio::test]
    async fn heading_moving_between_modules_survives() {
        let a = "https://docs.example.com/a";
        let b = "https://docs.example.com/b";
        let ws = Workspace::new(&[Module::new("A", a), Module::new("B", b)]);

        let first = StaticFetcher::new()
            .with_page(a, page(&["Shared"]))
            .with_page(b, page(&["Other"]));
        ws.run(first, &SilentProgress).await.unwrap();

        let second = StaticFetcher::new()
            .with_page(a, page(&["Other"]))
            .with_page(b, page(&["Shared"]));
        let report = ws.run(second, &SilentProgress).await.unwrap();

        assert_eq!(report.reclaimed, 0);
        let datasets = ws.datasets();
        assert_eq!(datasets.len(), 2);
        assert_eq!(
            datasets.get("Shared").unwrap().url,
            "https://docs.example.com/b#shared"
        );
    }

    #[tokio::test]
    async fn auxiliary_names_survive_reharvest() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        ws.run(awards_fetcher(), &SilentProgress).await.unwrap();

        let mut datasets = ws.datasets();
        let mut issued = datasets.get("AwardsIssued").unwrap().clone();
        issued.entity_name = "AwardIssue".into();
        issued.table_name = "award_issues".into();
        issued.description = "stale".into();
        datasets.save(issued).unwrap();
        datasets.commit().unwrap();

        ws.run(awards_fetcher(), &SilentProgress).await.unwrap();

        let issued = ws.datasets().get("AwardsIssued").unwrap().clone();
        assert_eq!(issued.entity_name, "AwardIssue");
        assert_eq!(issued.table_name, "award_issues");
        assert_eq!(issued.description, "Issued badges and certificates.");
    }

    #[tokio::test]
    async fn shape_error_aborts_without_commit() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        ws.run(awards_fetcher(), &SilentProgress).await.unwrap();

        let mut modules = ws.modules();
        modules.save(Module::new("Broken", BROKEN_URL));
        modules.commit().unwrap();
        let before = ws.files();

        let fetcher = awards_fetcher().with_page(BROKEN_URL, load_fixture("shape_error.html"));
        let recorder = Recorder::default();
        let err = ws.run(fetcher, &recorder).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Shape);
        let message = err.to_string();
        assert!(message.contains("Broken"), "{message}");
        assert_eq!(ws.files(), before);
        assert!(!ws.datasets().contains("BrokenRows"));
        assert_eq!(recorder.states().last(), Some(&RunState::Failed));
    }

    #[tokio::test]
    async fn colliding_dataset_name_aborts_and_keeps_existing_entry() {
        let url = "https://docs.example.com/org";
        let ws = Workspace::new(&[Module::new("Org", url)]);
        let first = StaticFetcher::new().with_page(url, page(&["Org Units"]));
        ws.run(first, &SilentProgress).await.unwrap();

        let mut datasets = ws.datasets();
        let mut units = datasets.get("OrgUnits").unwrap().clone();
        units.entity_name = "Custom".into();
        datasets.save(units).unwrap();
        datasets.commit().unwrap();
        let before = ws.files();

        let second = StaticFetcher::new().with_page(url, page(&["Org Units", "Org-Units"]));
        let err = ws.run(second, &SilentProgress).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Validation);
        let message = err.to_string();
        assert!(message.contains("Org"), "{message}");
        assert!(message.contains("Org-Units"), "{message}");
        assert_eq!(ws.files(), before);
        let datasets = ws.datasets();
        assert_eq!(datasets.key_for("Org Units"), Some("OrgUnits"));
        assert_eq!(datasets.get("OrgUnits").unwrap().entity_name, "Custom");
    }

    #[tokio::test]
    async fn colliding_headings_on_first_run_write_nothing() {
        let url = "https://docs.example.com/org";
        let ws = Workspace::new(&[Module::new("Org", url)]);
        let fetcher = StaticFetcher::new().with_page(url, page(&["Org Units", "Org-Units"]));

        let err = ws.run(fetcher, &SilentProgress).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(ws.read(&ws.config.catalog.datasets_path).is_none());
        assert!(ws.modules().get("Org").unwrap().datasets.is_empty());
    }

    #[tokio::test]
    async fn failed_dataset_commit_leaves_module_catalog_unchanged() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        std::fs::create_dir_all(&ws.config.catalog.datasets_path).unwrap();
        let modules_before = ws.read(&ws.config.catalog.modules_path);

        assert!(ws.run(awards_fetcher(), &SilentProgress).await.is_err());
        assert_eq!(ws.read(&ws.config.catalog.modules_path), modules_before);
    }

    #[tokio::test]
    async fn non_200_fetch_aborts_first_run() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        let mut fetcher = StaticFetcher::new();
        fetcher.insert(AWARDS_URL, FetchedDocument::new(500, "oops"));

        let err = ws.run(fetcher, &SilentProgress).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(ws.read(&ws.config.catalog.datasets_path).is_none());
    }

    #[tokio::test]
    async fn missing_anchor_is_a_structure_error() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        let fetcher = StaticFetcher::new().with_page(AWARDS_URL, load_fixture("no_anchor.html"));

        let err = ws.run(fetcher, &SilentProgress).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structure);
    }

    #[tokio::test]
    async fn unreadable_dataset_catalog_is_treated_as_empty() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        std::fs::write(&ws.config.catalog.datasets_path, "{broken").unwrap();

        let report = ws.run(awards_fetcher(), &SilentProgress).await.unwrap();
        assert_eq!(report.datasets_total, 2);
        assert_eq!(ws.datasets().len(), 2);
    }

    #[tokio::test]
    async fn dry_run_leaves_files_untouched() {
        let ws = Workspace::new(&[Module::new("Awards", AWARDS_URL)]);
        let before = ws.files();
        let recorder = Recorder::default();

        let options = HarvestOptions { dry_run: true };
        let report = harvest(&ws.config, awards_fetcher(), &options, &recorder)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.added, 2);
        assert_eq!(ws.files(), before);
        assert_eq!(recorder.states().last(), Some(&RunState::GlobalReclaim));
    }
}

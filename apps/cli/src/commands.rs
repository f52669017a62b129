//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use schemaharvest_catalog::{DatasetCatalog, ModuleCatalog};
use schemaharvest_core::{
    Assembler, HarvestEvent, HarvestOptions, HarvestReport, ProgressSink, RunState,
};
use schemaharvest_fetch::{HttpFetcher, parse_http_url};
use schemaharvest_parser::ModuleParser;
use schemaharvest_shared::{AppConfig, Module, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SchemaHarvest: keep a dataset schema catalog in sync with its documentation.
#[derive(Parser)]
#[command(
    name = "schemaharvest",
    version,
    about = "Harvest dataset schemas from documentation pages into a JSON catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.schemaharvest/schemaharvest.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Module catalog file, overriding the config.
    #[arg(long, global = true)]
    pub modules: Option<PathBuf>,

    /// Dataset catalog file, overriding the config.
    #[arg(long, global = true)]
    pub datasets: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch every module, reconcile the dataset catalog, and commit.
    Harvest {
        /// Run everything but leave the catalog files untouched.
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage the module catalog.
    Module {
        #[command(subcommand)]
        action: ModuleAction,
    },

    /// Read the dataset catalog.
    Dataset {
        #[command(subcommand)]
        action: DatasetAction,
    },

    /// Parse a local HTML file and print the datasets it would yield.
    Inspect {
        /// HTML file to parse.
        file: PathBuf,

        /// Module URL used for dataset anchors (defaults to the file's URL).
        #[arg(long)]
        url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Module catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum ModuleAction {
    /// Add a module, or change the URL of an existing one.
    Add {
        /// Module name (catalog key).
        name: String,
        /// Documentation page URL.
        url: String,
    },
    /// List modules in catalog order.
    List,
    /// Remove a module. Its datasets are reclaimed on the next harvest.
    Remove {
        /// Module name.
        name: String,
    },
}

/// Dataset catalog subcommands.
#[derive(Subcommand)]
pub(crate) enum DatasetAction {
    /// List datasets in catalog order.
    List,
    /// Print one dataset as JSON.
    Show {
        /// Dataset name.
        name: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "schemaharvest=info",
        1 => "schemaharvest=debug",
        _ => "schemaharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        };
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Harvest { dry_run } => cmd_harvest(&config, dry_run).await,
        Command::Module { action } => match action {
            ModuleAction::Add { name, url } => cmd_module_add(&config, &name, &url),
            ModuleAction::List => cmd_module_list(&config),
            ModuleAction::Remove { name } => cmd_module_remove(&config, &name),
        },
        Command::Dataset { action } => match action {
            DatasetAction::List => cmd_dataset_list(&config),
            DatasetAction::Show { name } => cmd_dataset_show(&config, &name),
        },
        Command::Inspect { file, url } => cmd_inspect(&config, &file, url.as_deref()),
        Command::Config { .. } => Ok(()),
    }
}

/// Config file (explicit or default) with catalog path overrides applied.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(path) = &cli.modules {
        config.catalog.modules_path = path.clone();
    }
    if let Some(path) = &cli.datasets {
        config.catalog.datasets_path = path.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

async fn cmd_harvest(config: &AppConfig, dry_run: bool) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let options = HarvestOptions { dry_run };

    info!(
        modules = %config.catalog.modules_path.display(),
        datasets = %config.catalog.datasets_path.display(),
        dry_run,
        "starting harvest"
    );

    let reporter = CliProgress::new();
    let result = schemaharvest_core::harvest(config, fetcher, &options, &reporter).await;
    reporter.finish();

    print_report(&result?);
    Ok(())
}

fn print_report(report: &HarvestReport) {
    println!();
    if report.dry_run {
        println!("  Dry run complete, nothing written.");
    } else {
        println!("  Catalog updated!");
    }
    println!("  Started:   {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Modules:   {}", report.modules);
    println!("  Added:     {}", report.added);
    println!("  Matched:   {}", report.matched);
    println!("  Missing:   {}", report.missing);
    println!("  Reclaimed: {}", report.reclaimed);
    println!("  Datasets:  {}", report.datasets_total);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner for run state plus one printed line per module/dataset event.
struct CliProgress {
    spinner: ProgressBar,
    module: Mutex<String>,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            module: Mutex::new(String::new()),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressSink for CliProgress {
    fn emit(&self, event: &HarvestEvent) {
        match event {
            HarvestEvent::ModuleStarted { module } => {
                if let Ok(mut current) = self.module.lock() {
                    current.clone_from(module);
                }
            }
            HarvestEvent::StateChanged(state) => {
                let module = self.module.lock().map(|m| m.clone()).unwrap_or_default();
                let message = match state {
                    RunState::Fetching | RunState::Parsing | RunState::Merging => {
                        format!("{state} {module}")
                    }
                    _ => state.to_string(),
                };
                self.spinner.set_message(message);
            }
            _ => {}
        }

        if let Some(line) = event.render() {
            self.spinner.println(line);
        }
    }
}

// ---------------------------------------------------------------------------
// Module catalog
// ---------------------------------------------------------------------------

fn open_modules(config: &AppConfig) -> Result<ModuleCatalog> {
    let mut modules = ModuleCatalog::open(&config.catalog.modules_path);
    modules.load()?;
    Ok(modules)
}

fn cmd_module_add(config: &AppConfig, name: &str, url: &str) -> Result<()> {
    parse_http_url(url)?;
    let mut modules = open_modules(config)?;

    let module = match modules.get(name) {
        Some(existing) => Module {
            url: url.to_string(),
            ..existing.clone()
        },
        None => Module::new(name, url),
    };
    let updated = modules.contains(name);
    modules.save(module);
    modules.commit()?;

    info!(name, url, updated, "module saved");
    println!("{} module {name}", if updated { "Updated" } else { "Added" });
    Ok(())
}

fn cmd_module_list(config: &AppConfig) -> Result<()> {
    let modules = open_modules(config)?;
    if modules.is_empty() {
        println!("No modules. Add one with `schemaharvest module add <name> <url>`.");
        return Ok(());
    }
    for module in modules.snapshot() {
        println!("{}  {}  ({} datasets)", module.name, module.url, module.datasets.len());
    }
    Ok(())
}

fn cmd_module_remove(config: &AppConfig, name: &str) -> Result<()> {
    let mut modules = open_modules(config)?;
    modules
        .delete(name)
        .ok_or_else(|| eyre!("no module named '{name}'"))?;
    modules.commit()?;

    info!(name, "module removed");
    println!("Removed module {name}; its datasets are reclaimed on the next harvest.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Dataset catalog
// ---------------------------------------------------------------------------

fn open_datasets(config: &AppConfig) -> Result<DatasetCatalog> {
    let mut datasets = DatasetCatalog::open_readonly(&config.catalog.datasets_path);
    datasets.load()?;
    Ok(datasets)
}

fn cmd_dataset_list(config: &AppConfig) -> Result<()> {
    let datasets = open_datasets(config)?;
    if datasets.is_empty() {
        println!("No datasets. Run `schemaharvest harvest` first.");
        return Ok(());
    }
    for dataset in datasets.snapshot() {
        println!(
            "{}  {}  \"{}\"  ({} columns)",
            dataset.name,
            dataset.sql_table_name,
            dataset.module_name,
            dataset.columns.len()
        );
    }
    Ok(())
}

fn cmd_dataset_show(config: &AppConfig, name: &str) -> Result<()> {
    let datasets = open_datasets(config)?;
    let dataset = datasets
        .get(name)
        .ok_or_else(|| eyre!("no dataset named '{name}'"))?;
    println!("{}", serde_json::to_string_pretty(dataset)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

fn cmd_inspect(config: &AppConfig, file: &Path, url: Option<&str>) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;

    let module_url = match url {
        Some(url) => url.to_string(),
        None => {
            let absolute = std::fs::canonicalize(file)?;
            url::Url::from_file_path(&absolute)
                .map_err(|_| eyre!("cannot build a URL for '{}'", absolute.display()))?
                .to_string()
        }
    };

    let parser = ModuleParser::new(&config.navigator)?;
    let raws = parser.parse(&html)?;
    let datasets = Assembler::new(&config.assembler).assemble_all(&module_url, raws);

    info!(file = %file.display(), datasets = datasets.len(), "inspected document");
    println!("{}", serde_json::to_string_pretty(&datasets)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sheetwright_core::dispatch::AssistantRegistry;
use sheetwright_core::generation::{GenerationSettings, Generator};
use sheetwright_core::pipeline::{ProgressReporter, RunReport, Runner};
use sheetwright_core::scheduler::{RowObserver, RowOutcome, RowState};
use sheetwright_core::selector::RowWindow;
use sheetwright_llm::{HttpImageFetcher, ResponsesClient};
use sheetwright_sheets::GoogleSheets;
use sheetwright_shared::{
    AppConfig, RunConfig, init_config, load_config, read_secret, resolve_db_path,
};
use sheetwright_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Sheetwright: generate product copy straight into your spreadsheets.
#[derive(Parser)]
#[command(
    name = "sheetwright",
    version,
    about = "Generate content for spreadsheet rows and write it back in place.",
    long_about = None,
)]
pub(crate) struct Cli {
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
    /// Process one worksheet with one task type.
    Run {
        /// Spreadsheet link or key.
        source: String,

        /// Task type, e.g. `description` (see `sheetwright tasks`).
        #[arg(short, long)]
        task: String,

        /// Zero-based worksheet (tab) index.
        #[arg(short, long, default_value = "0")]
        worksheet: usize,

        /// First sheet row to process (1-based, inclusive).
        #[arg(long)]
        from: Option<u32>,

        /// Row to stop before (exclusive).
        #[arg(long)]
        to: Option<u32>,

        /// Model identifier (defaults to config).
        #[arg(short, long)]
        model: Option<String>,

        /// Rows generated concurrently per group.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between groups, in seconds.
        #[arg(long)]
        cooldown: Option<u64>,
    },

    /// Process several worksheets of one spreadsheet concurrently.
    RunMany {
        /// Spreadsheet link or key.
        source: String,

        /// `task=worksheet_index` pairs (repeatable).
        #[arg(long = "map", value_parser = parse_entry, required = true)]
        entries: Vec<(String, usize)>,

        /// Model identifier (defaults to config).
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Generate once from field values given on the command line.
    Generate {
        /// Task type.
        task: String,

        /// `name=value` field values (repeatable).
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Model identifier (defaults to config).
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the available task types and their fields.
    Tasks,

    /// Inspect the generation history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// History subcommands.
#[derive(Subcommand)]
pub(crate) enum HistoryAction {
    /// Show the most recent records.
    List {
        /// Maximum number of records.
        #[arg(short, long, default_value = "20")]
        limit: u32,
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

fn parse_entry(s: &str) -> std::result::Result<(String, usize), String> {
    let (task, index) = s
        .split_once('=')
        .ok_or_else(|| format!("expected task=index, got '{s}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("worksheet index in '{s}' is not a number"))?;
    Ok((task.trim().to_string(), index))
}

fn parse_field(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sheetwright=info",
        1 => "sheetwright=debug",
        _ => "sheetwright=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            source,
            task,
            worksheet,
            from,
            to,
            model,
            batch_size,
            cooldown,
        } => {
            let overrides = Overrides {
                batch_size,
                cooldown,
            };
            cmd_run(&source, &task, worksheet, from, to, model, overrides).await
        }
        Command::RunMany {
            source,
            entries,
            model,
        } => cmd_run_many(&source, &entries, model).await,
        Command::Generate {
            task,
            fields,
            model,
        } => cmd_generate(&task, &fields, model).await,
        Command::Tasks => cmd_tasks(),
        Command::History { action } => match action {
            HistoryAction::List { limit } => cmd_history_list(limit).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Scheduling flags that override config values.
#[derive(Default)]
struct Overrides {
    batch_size: Option<usize>,
    cooldown: Option<u64>,
}

/// Build a runner over the configured backends.
async fn build_runner(config: &AppConfig, overrides: Overrides) -> Result<Runner> {
    let mut run_config = RunConfig::from(config);
    if let Some(size) = overrides.batch_size {
        run_config.batch_size = size.max(1);
    }
    if let Some(secs) = overrides.cooldown {
        run_config.cooldown = Duration::from_secs(secs);
    }

    let settings = GenerationSettings::from(config);
    let api_key = read_secret(&config.generation.api_key_env, "generation API key")?;
    let token = read_secret(&config.sheets.token_env, "Google Sheets access token")?;

    let sheets = GoogleSheets::new(&config.sheets.base_url, token, run_config.lookup_timeout)?;
    // Pipeline deadlines are tighter; this only bounds a stuck connection.
    let model = ResponsesClient::new(
        &config.generation.base_url,
        api_key,
        settings.multimodal_timeout,
    )?;
    let images = HttpImageFetcher::new(settings.lookup_timeout)?;

    let db_path = resolve_db_path(config)?;
    let storage = Arc::new(Storage::open(&db_path).await?);
    info!(db = %db_path.display(), "storage ready");

    let generator = Generator::new(Arc::new(model), storage.clone(), Arc::new(images), settings);
    Ok(Runner::new(
        Arc::new(AssistantRegistry::builtin()),
        Arc::new(sheets),
        Arc::new(generator),
        storage,
        run_config,
    ))
}

fn resolve_model(config: &AppConfig, model: Option<String>) -> String {
    model.unwrap_or_else(|| config.defaults.model.clone())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    source: &str,
    task: &str,
    worksheet: usize,
    from: Option<u32>,
    to: Option<u32>,
    model: Option<String>,
    overrides: Overrides,
) -> Result<()> {
    let config = load_config()?;
    let model = resolve_model(&config, model);
    let window = match (from, to) {
        (None, None) => None,
        (from, to) => Some(RowWindow::new(from.unwrap_or(config.defaults.first_row), to)?),
    };

    let runner = build_runner(&config, overrides).await?;
    info!(source, task, worksheet, model = %model, "starting run");

    let progress = CliProgress::new();
    let result = runner
        .process_one(&model, source, task, worksheet, window, &progress)
        .await;
    progress.finish();
    let report = result?;

    print_report(&report);
    if report.failed() > 0 {
        return Err(eyre!(
            "{} of {} rows failed",
            report.failed(),
            report.selected
        ));
    }
    Ok(())
}

async fn cmd_run_many(source: &str, entries: &[(String, usize)], model: Option<String>) -> Result<()> {
    let config = load_config()?;
    let model = resolve_model(&config, model);
    let runner = build_runner(&config, Overrides::default()).await?;
    info!(source, entries = entries.len(), model = %model, "starting runs");

    let progress = Arc::new(CliProgress::new());
    let result = runner
        .process_many(&model, source, entries, progress.clone())
        .await;
    progress.finish();

    let mut failed_entries = 0;
    for entry in result? {
        match entry.result {
            Ok(report) => {
                print_report(&report);
                if report.failed() > 0 {
                    failed_entries += 1;
                }
            }
            Err(e) => {
                failed_entries += 1;
                println!();
                println!("  {} (worksheet {}) failed: {e}", entry.task_type, entry.worksheet_index);
            }
        }
    }
    println!();

    if failed_entries > 0 {
        return Err(eyre!("{failed_entries} of {} runs had failures", entries.len()));
    }
    Ok(())
}

async fn cmd_generate(task: &str, fields: &[(String, String)], model: Option<String>) -> Result<()> {
    let config = load_config()?;
    let model = resolve_model(&config, model);
    let runner = build_runner(&config, Overrides::default()).await?;

    let output = runner.generate_manual(&model, task, fields).await?;
    println!("{}", output.render());
    Ok(())
}

fn cmd_tasks() -> Result<()> {
    let registry = AssistantRegistry::builtin();
    println!();
    for spec in registry.iter() {
        let fields = spec
            .fields
            .iter()
            .map(|f| if f.required { format!("{}*", f.name) } else { f.name.to_string() })
            .collect::<Vec<_>>()
            .join(", ");
        let mut flags = Vec::new();
        if spec.refine {
            flags.push("refined");
        }
        if spec.multimodal() {
            flags.push("images");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("  {:<18} {fields}{flags}", spec.task_type.as_str());
    }
    println!();
    println!("  * required field");
    println!();
    Ok(())
}

async fn cmd_history_list(limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&resolve_db_path(&config)?).await?;
    let records = storage.list_history(limit).await?;
    let total = storage.count_history().await?;

    if records.is_empty() {
        println!("No history records yet.");
        return Ok(());
    }

    println!();
    for record in &records {
        let preview: String = record.output.chars().take(60).collect();
        let ellipsis = if record.output.chars().count() > 60 { "..." } else { "" };
        println!(
            "  {}  {:<18} {:<6} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.task_type.as_str(),
            record.origin.as_str(),
            record.source,
        );
        println!("      {}{ellipsis}", preview.replace('\n', " "));
    }
    println!();
    println!("  Showing {} of {total} records", records.len());
    println!();
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("  {} on '{}'", report.task_type, report.worksheet);
    println!("  Selected:  {}", report.selected);
    println!("  Written:   {}", report.succeeded());
    println!("  Failed:    {}", report.failed());
    println!("  Batches:   {}", report.batch.batches);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    for failure in report.batch.failures() {
        println!(
            "    row {}: {}",
            failure.row,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl RowObserver for CliProgress {
    fn row_finished(&self, outcome: &RowOutcome, done: usize, total: usize) {
        let mark = if outcome.state == RowState::Succeeded { "ok" } else { "failed" };
        self.spinner
            .set_message(format!("Generating [{done}/{total}] row {} {mark}", outcome.row));
    }

    fn cooling_down(&self, cooldown: Duration) {
        self.spinner
            .set_message(format!("Cooling down for {}s", cooldown.as_secs()));
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, report: &RunReport) {
        self.spinner.println(format!(
            "  {} '{}': {} written, {} failed",
            report.task_type,
            report.worksheet,
            report.succeeded(),
            report.failed()
        ));
    }
}

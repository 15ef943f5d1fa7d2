//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Report, Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use postfeed_core::update::is_excluded;
use postfeed_core::{
    Collaborators, UpdateConfig, UpdateError, UpdateProgress, UpdateReport, WatchSchedule,
    identifier_of, repair_corpus, run_update, watch,
};
use postfeed_feed::{FeedSource, FeedSourceConfig};
use postfeed_nlp::{NlpConfig, OpenAiNlp};
use postfeed_shared::{
    AppConfig, ContentSource, NlpService, PostArchive, PostId, Summary, SummaryFile,
    init_config, load_config, load_config_from, validate_api_key,
};
use postfeed_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// postfeed: summarize and index an author's posts as they are published.
#[derive(Parser)]
#[command(
    name = "postfeed",
    version,
    about = "Summarize and index new posts from an author's feed.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.postfeed/postfeed.toml).
    #[arg(long, global = true, env = "POSTFEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Process every new post in the feed once.
    Update,

    /// Run `update` on a fixed interval until interrupted.
    Watch {
        /// Seconds between runs (defaults to `schedule.interval_secs`).
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Generate, export, or import summaries files.
    Summaries {
        #[command(subcommand)]
        action: SummariesAction,
    },

    /// Retrieval corpus maintenance.
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Summaries subcommands.
#[derive(Subcommand)]
pub(crate) enum SummariesAction {
    /// Summarize feed posts without touching the store.
    Generate {
        /// Only the post whose link contains this string.
        #[arg(long)]
        id: Option<String>,

        /// Output file (summary.json for one post, summaries.json otherwise).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write stored summaries to a file.
    Export {
        /// Only the summary with this identifier.
        #[arg(long)]
        id: Option<String>,

        /// Output file (summary.json for one post, summaries.json otherwise).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Store every summary from a summaries file.
    Import {
        /// File in the `{"Items": [...]}` format.
        file: PathBuf,

        /// Also write each summary to `<DIR>/<id>.md`.
        #[arg(long, value_name = "DIR")]
        markdown_dir: Option<PathBuf>,
    },
}

/// Corpus subcommands.
#[derive(Subcommand)]
pub(crate) enum CorpusAction {
    /// Add documents for stored summaries missing from the corpus.
    Repair,
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
        0 => "postfeed=info",
        1 => "postfeed=debug",
        _ => "postfeed=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Update => cmd_update(&resolve_config(config_path)?).await,
        Command::Watch { interval_secs } => {
            cmd_watch(&resolve_config(config_path)?, interval_secs).await
        }
        Command::Summaries { action } => {
            let config = resolve_config(config_path)?;
            match action {
                SummariesAction::Generate { id, out } => {
                    cmd_summaries_generate(&config, id.as_deref(), out).await
                }
                SummariesAction::Export { id, out } => {
                    cmd_summaries_export(&config, id.as_deref(), out).await
                }
                SummariesAction::Import { file, markdown_dir } => {
                    cmd_summaries_import(&config, &file, markdown_dir.as_deref()).await
                }
            }
        }
        Command::Corpus { action } => match action {
            CorpusAction::Repair => cmd_corpus_repair(&resolve_config(config_path)?).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Collaborator wiring
// ---------------------------------------------------------------------------

fn feed_source(config: &AppConfig) -> Result<FeedSource> {
    Ok(FeedSource::new(FeedSourceConfig::from(config))?)
}

fn nlp_service(config: &AppConfig) -> Result<OpenAiNlp> {
    let api_key = validate_api_key(config)?;
    Ok(OpenAiNlp::new(NlpConfig::from_app(config, api_key))?)
}

async fn open_store(config: &AppConfig) -> Result<Storage> {
    Storage::open(Path::new(&config.storage.db_path))
        .await
        .wrap_err_with(|| format!("failed to open database {}", config.storage.db_path))
}

/// Attach the failing step to an update error for the exit report.
fn update_failure(err: UpdateError) -> Report {
    let kind = err.kind();
    Report::new(err).wrap_err(format!("update run failed ({kind})"))
}

// ---------------------------------------------------------------------------
// update / watch
// ---------------------------------------------------------------------------

async fn cmd_update(config: &AppConfig) -> Result<()> {
    let source = feed_source(config)?;
    let nlp = nlp_service(config)?;
    let store = open_store(config).await?;

    let reporter = CliProgress::new();
    let report = update_once(config, &source, &nlp, &store, &reporter).await?;

    println!();
    println!("  Update complete.");
    println!("  Feed items: {}", report.items_seen);
    println!("  Excluded:   {}", report.items_excluded);
    println!("  Known:      {}", report.items_known);
    println!("  New:        {}", report.processed.len());
    for id in &report.processed {
        println!("    + {id}");
    }
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn update_once(
    config: &AppConfig,
    source: &FeedSource,
    nlp: &OpenAiNlp,
    store: &Storage,
    progress: &dyn UpdateProgress,
) -> Result<UpdateReport> {
    let collab = Collaborators {
        source,
        nlp,
        store,
    };
    run_update(&UpdateConfig::from(config), collab, progress)
        .await
        .map_err(update_failure)
}

async fn cmd_watch(config: &AppConfig, interval_secs: Option<u64>) -> Result<()> {
    let interval_secs = interval_secs.unwrap_or(config.schedule.interval_secs);
    if interval_secs == 0 {
        return Err(eyre!("interval must be at least one second"));
    }

    let source = feed_source(config)?;
    let nlp = nlp_service(config)?;
    let store = open_store(config).await?;
    let collab = Collaborators {
        source: &source,
        nlp: &nlp,
        store: &store,
    };
    let schedule = WatchSchedule {
        interval: Duration::from_secs(interval_secs),
        max_runs: None,
    };

    info!(interval_secs, feed = %config.feed.url, "watching feed");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for interrupt, watch runs until killed");
            std::future::pending::<()>().await;
        }
    };
    let update_config = UpdateConfig::from(config);
    let outcome = watch(&update_config, collab, &LogProgress, &schedule, shutdown).await;

    info!(
        runs = outcome.runs,
        failures = outcome.failures,
        processed = outcome.processed,
        "watch stopped"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// summaries
// ---------------------------------------------------------------------------

/// Default output file: singular when one post was requested.
fn default_summaries_path(single: bool) -> PathBuf {
    PathBuf::from(if single { "summary.json" } else { "summaries.json" })
}

fn write_summaries(path: &Path, summaries: Vec<Summary>) -> Result<()> {
    let file = SummaryFile { items: summaries };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {} summaries to {}", file.items.len(), path.display());
    Ok(())
}

async fn cmd_summaries_generate(
    config: &AppConfig,
    id: Option<&str>,
    out: Option<PathBuf>,
) -> Result<()> {
    let source = feed_source(config)?;
    let nlp = nlp_service(config)?;

    let items: Vec<_> = source
        .get_items(&config.feed.url)
        .await?
        .into_iter()
        .filter(|item| !is_excluded(&item.link, &config.feed.exclude_patterns))
        .filter(|item| id.is_none_or(|id| item.link.contains(id)))
        .collect();

    if let Some(id) = id.filter(|_| items.is_empty()) {
        return Err(eyre!("no feed item with a link containing '{id}'"));
    }

    let spinner = CliProgress::new();
    let mut summaries = Vec::with_capacity(items.len());
    for (n, item) in items.iter().enumerate() {
        spinner.set_message(format!("Summarizing [{}/{}] {}", n + 1, items.len(), item.title));
        let text = source.get_text(&item.link).await?;
        let summary = nlp.summarize(&text).await?;
        summaries.push(Summary {
            id: identifier_of(&item.link),
            url: item.link.clone(),
            title: item.title.clone(),
            summary,
        });
    }
    spinner.finish();

    let out = out.unwrap_or_else(|| default_summaries_path(id.is_some()));
    write_summaries(&out, summaries)
}

async fn cmd_summaries_export(
    config: &AppConfig,
    id: Option<&str>,
    out: Option<PathBuf>,
) -> Result<()> {
    let store = Storage::open_readonly(Path::new(&config.storage.db_path)).await?;

    let summaries = match id {
        Some(id) => {
            let summary = store
                .get_summary(&PostId::new(id))
                .await?
                .ok_or_else(|| eyre!("no stored summary with id '{id}'"))?;
            vec![summary]
        }
        None => store.list_summaries().await?,
    };

    let out = out.unwrap_or_else(|| default_summaries_path(id.is_some()));
    write_summaries(&out, summaries)
}

/// Publish each summary body as `{id}.md` under `dir`.
fn write_markdown_summaries(dir: &Path, summaries: &[Summary]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
    for summary in summaries {
        let path = dir.join(format!("{}.md", summary.id));
        std::fs::write(&path, &summary.summary)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

async fn cmd_summaries_import(
    config: &AppConfig,
    file: &Path,
    markdown_dir: Option<&Path>,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let parsed: SummaryFile = serde_json::from_str(&content)
        .wrap_err_with(|| format!("{} is not a summaries file", file.display()))?;
    parsed.validate()?;

    if parsed.items.is_empty() {
        warn!(file = %file.display(), "summaries file has no items");
        return Ok(());
    }

    let store = open_store(config).await?;
    store.store_summaries(&parsed.items).await?;
    println!("Imported {} summaries", parsed.items.len());

    if let Some(dir) = markdown_dir {
        write_markdown_summaries(dir, &parsed.items)?;
        println!("Wrote {} markdown files to {}", parsed.items.len(), dir.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// corpus
// ---------------------------------------------------------------------------

async fn cmd_corpus_repair(config: &AppConfig) -> Result<()> {
    let nlp = nlp_service(config)?;
    let store = open_store(config).await?;

    let archive: &dyn PostArchive = &store;
    let report = repair_corpus(&nlp, archive).await.map_err(update_failure)?;

    println!();
    println!("  Corpus repair complete.");
    println!("  Added:        {}", report.documents_added);
    println!("  Missing text: {}", report.missing_text);
    println!("  Corpus size:  {}", report.corpus_len);
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporters
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn set_message(&self, msg: String) {
        self.spinner.set_message(msg);
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl UpdateProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item_processed(&self, id: &PostId, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Processed new post {current} (of {total} in feed): {title}"));
        self.spinner.println(format!("  + {id}  {title}"));
    }

    fn done(&self, _report: &UpdateReport) {
        self.finish();
    }
}

/// Reporter for unattended runs: progress goes to the log only.
struct LogProgress;

impl UpdateProgress for LogProgress {
    fn phase(&self, name: &str) {
        tracing::debug!(phase = name, "update phase");
    }

    fn item_processed(&self, id: &PostId, title: &str, _current: usize, _total: usize) {
        info!(%id, title, "new post processed");
    }

    fn done(&self, _report: &UpdateReport) {}
}

//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use leadscout_core::{EnrichConfig, ProgressReporter, RunEstimate, estimate, plan};
use leadscout_dataset::Dataset;
use leadscout_shared::{
    AppConfig, ColumnsConfig, EnrichSettings, Preset, RunStatistics, delay_from_secs,
    init_config, load_config, resolve_api_key,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LeadScout: find Instagram profiles for your leads.
#[derive(Parser)]
#[command(
    name = "leadscout",
    version,
    about = "Enrich a CSV of leads with Instagram profile URLs via web search.",
    long_about = None,
)]
pub(crate) struct Cli {
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

/// Throughput preset.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum PresetArg {
    /// 1 lead per batch, 1.0s apart.
    Safe,
    /// 5 leads per batch, 1.2s apart.
    Balanced,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Safe => Preset::Safe,
            PresetArg::Balanced => Preset::Balanced,
        }
    }
}

/// Options for the `enrich` command.
#[derive(clap::Args)]
pub(crate) struct EnrichArgs {
    /// Lead CSV to enrich.
    pub input: PathBuf,

    /// Output CSV. Defaults to <results_dir>/enriched_<timestamp>.csv.
    /// Pass the input path to resume in place.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Only process the first N rows.
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Query template with {name} and {email} placeholders.
    #[arg(short, long)]
    pub template: Option<String>,

    /// Throughput preset (overridden by --batch-size / --delay).
    #[arg(long)]
    pub preset: Option<PresetArg>,

    /// Rows per batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds between batches.
    #[arg(long)]
    pub delay: Option<f64>,

    /// Save progress every N processed rows.
    #[arg(long)]
    pub save_every: Option<usize>,

    /// Retries per search call on transient failure.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Header of the name column.
    #[arg(long)]
    pub name_column: Option<String>,

    /// Header of the email column.
    #[arg(long)]
    pub email_column: Option<String>,

    /// Scrape profile details for found rows (needs the scraper token).
    #[arg(long)]
    pub deep: bool,

    /// Leave rows already marked Not Found alone.
    #[arg(long)]
    pub skip_not_found: bool,

    /// Stop after the first rate-limited batch.
    #[arg(long)]
    pub halt_on_rate_limit: bool,

    /// Print the plan and estimate without calling any API.
    #[arg(long)]
    pub dry_run: bool,

    /// Print run statistics as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Look up profile URLs for the leads in a CSV file.
    Enrich(EnrichArgs),

    /// Summarize a lead file (e.g. a previous run's output).
    Status {
        /// CSV file to inspect.
        file: PathBuf,

        /// Header of the name column.
        #[arg(long)]
        name_column: Option<String>,

        /// Header of the email column.
        #[arg(long)]
        email_column: Option<String>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
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
        0 => "leadscout=info",
        1 => "leadscout=debug",
        _ => "leadscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
    match cli.command {
        Command::Enrich(args) => cmd_enrich(args).await,
        Command::Status {
            file,
            name_column,
            email_column,
            json,
        } => cmd_status(&file, name_column, email_column, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// enrich
// ---------------------------------------------------------------------------

async fn cmd_enrich(args: EnrichArgs) -> Result<()> {
    let config = load_config()?;
    let settings = resolve_settings(&config, &args)?;
    let columns = resolve_columns(&config, args.name_column.clone(), args.email_column.clone());

    let dataset = Dataset::load(&args.input, &columns)?;
    let run_plan = plan(&dataset, args.max_rows, settings.skip_not_found);
    let est = estimate(run_plan.eligible.len(), &settings);

    let plan_text = render_plan(&args.input, run_plan.working_set, run_plan.skipped(), &est);
    if args.json {
        eprint!("{plan_text}");
    } else {
        print!("{plan_text}");
    }

    if args.dry_run {
        return Ok(());
    }
    // Credentials are checked before any row is touched.
    let search_key = resolve_api_key(&config.search.api_key_env)?;
    let scraper_key = if settings.deep_enrich {
        Some(resolve_api_key(&config.scraper.api_key_env)?)
    } else {
        None
    };

    let output = match args.out {
        Some(path) => path,
        None => default_output_path(&config.defaults.results_dir)?,
    };

    info!(
        input = %args.input.display(),
        output = %output.display(),
        batch_size = settings.batch_size,
        delay_ms = settings.delay.as_millis(),
        deep = settings.deep_enrich,
        "enriching leads"
    );

    let enrich_config = EnrichConfig {
        input: args.input,
        output: output.clone(),
        max_rows: args.max_rows,
        columns,
        settings,
        search: config.search.clone(),
        search_key,
        scraper: config.scraper.clone(),
        scraper_key,
    };

    let reporter = CliProgress::new()?;
    let stats = leadscout_core::enrich(&enrich_config, &reporter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats, &output);
    }

    Ok(())
}

/// Config file, then preset, then explicit flags.
fn resolve_settings(config: &AppConfig, args: &EnrichArgs) -> Result<EnrichSettings> {
    let mut settings = EnrichSettings::try_from(config)?;

    if let Some(preset) = args.preset {
        settings.apply_preset(preset.into());
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(delay) = args.delay {
        settings.delay = delay_from_secs(delay)?;
    }
    if let Some(save_every) = args.save_every {
        settings.save_every = save_every;
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(template) = &args.template {
        settings.query_template = Some(template.clone());
    }
    settings.deep_enrich = args.deep;
    settings.skip_not_found = args.skip_not_found;
    settings.halt_on_rate_limit |= args.halt_on_rate_limit;

    settings.validate()?;
    Ok(settings)
}

fn resolve_columns(
    config: &AppConfig,
    name: Option<String>,
    email: Option<String>,
) -> ColumnsConfig {
    ColumnsConfig {
        name: name.unwrap_or_else(|| config.columns.name.clone()),
        email: email.unwrap_or_else(|| config.columns.email.clone()),
    }
}

/// `<results_dir>/enriched_<YYYYmmdd_HHMMSS>.csv`, creating the directory.
fn default_output_path(results_dir: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(results_dir);
    std::fs::create_dir_all(&dir)
        .map_err(|e| eyre!("cannot create results directory '{}': {e}", dir.display()))?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("enriched_{stamp}.csv")))
}

/// Plan block shown before a run. Goes to stderr under `--json`.
fn render_plan(input: &Path, working_set: usize, skipped: usize, est: &RunEstimate) -> String {
    format!(
        "\n  Input:     {}\n  Rows:      {working_set}\n  Done:      {skipped}\n  \
         Pending:   {}\n  Requests:  up to {}\n  Est. time: {}\n\n",
        input.display(),
        est.leads,
        est.requests,
        format_duration(est.duration),
    )
}

fn print_stats(stats: &RunStatistics, output: &Path) {
    println!();
    println!("  Enrichment complete!");
    println!("  Processed:   {}", stats.processed);
    println!("  Found:       {}", stats.found);
    println!("  Not found:   {}", stats.not_found);
    if stats.blocked > 0 {
        println!("  Rate limited: {} (rerun to retry)", stats.blocked);
    }
    if stats.profiles_enriched > 0 || stats.enrich_failures > 0 {
        println!(
            "  Enriched:    {} ({} failed)",
            stats.profiles_enriched, stats.enrich_failures
        );
    }
    println!("  API calls:   {}", stats.api_requests);
    println!("  Success:     {:.1}%", stats.success_rate());
    println!("  Output:      {}", output.display());
    println!();
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} leads {msg}",
            )?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { bar })
    }
}

impl ProgressReporter for CliProgress {
    fn run_started(&self, pending: usize, skipped: usize) {
        self.bar.set_length(pending as u64);
        if skipped > 0 {
            self.bar.set_message(format!("(resuming, {skipped} done)"));
        }
    }

    fn batch_done(&self, processed: usize, _total: usize) {
        self.bar.set_position(processed as u64);
    }

    fn checkpoint_saved(&self, processed: usize) {
        self.bar.set_message(format!("(saved at {processed})"));
    }

    fn done(&self, _stats: &RunStatistics) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn cmd_status(
    file: &Path,
    name_column: Option<String>,
    email_column: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let columns = resolve_columns(&config, name_column, email_column);
    let summary = Dataset::load(file, &columns)?.summary();

    if json {
        let value = serde_json::json!({
            "file": file.display().to_string(),
            "total": summary.total,
            "found": summary.found,
            "not_found": summary.not_found,
            "pending": summary.pending,
            "enriched": summary.enriched,
            "success_rate": summary.success_rate,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  File:      {}", file.display());
    println!("  Rows:      {}", summary.total);
    println!("  Found:     {}", summary.found);
    println!("  Not found: {}", summary.not_found);
    println!("  Pending:   {}", summary.pending);
    if summary.enriched > 0 {
        println!("  Enriched:  {}", summary.enriched);
    }
    println!("  Success:   {:.1}%", summary.success_rate);
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> EnrichArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Enrich(args) => args,
            _ => panic!("expected enrich"),
        }
    }

    #[test]
    fn flags_override_preset_and_config() {
        let args = parse(&[
            "leadscout",
            "enrich",
            "leads.csv",
            "--preset",
            "safe",
            "--delay",
            "2.5",
            "--template",
            "{email} instagram",
        ]);
        let settings = resolve_settings(&AppConfig::default(), &args).unwrap();

        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.delay, Duration::from_millis(2500));
        assert_eq!(settings.query_template.as_deref(), Some("{email} instagram"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let args = parse(&["leadscout", "enrich", "leads.csv", "--batch-size", "0"]);
        assert!(resolve_settings(&AppConfig::default(), &args).is_err());
    }

    #[test]
    fn negative_delay_is_rejected() {
        let args = parse(&["leadscout", "enrich", "leads.csv", "--delay=-1"]);
        assert!(resolve_settings(&AppConfig::default(), &args).is_err());
    }

    #[test]
    fn column_flags_override_config() {
        let columns = resolve_columns(&AppConfig::default(), Some("Name".into()), None);
        assert_eq!(columns.name, "Name");
        assert_eq!(columns.email, "Person - Email - Work");
    }

    #[test]
    fn plan_block_lists_counts() {
        let est = RunEstimate {
            leads: 3,
            requests: 6,
            duration: Duration::from_secs(6),
        };
        let text = render_plan(Path::new("leads.csv"), 5, 2, &est);

        assert!(text.contains("Input:     leads.csv"));
        assert!(text.contains("Done:      2"));
        assert!(text.contains("Pending:   3"));
        assert!(text.contains("Requests:  up to 6"));
        assert!(text.contains("Est. time: 6.0s"));
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h 1m");
    }
}

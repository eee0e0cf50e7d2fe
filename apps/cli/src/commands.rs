//! CLI definition, argument validation, routing, and tracing setup.

use std::io::{self, Write};
use std::path::Path;

use clap::Parser;
use color_eyre::eyre::Result;
use crossterm::tty::IsTty;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use tldr_archive::HttpSource;
use tldr_core::{ProgressReporter, UpdateReport};
use tldr_markup::Style;
use tldr_shared::{AppConfig, PlatformSet, TldrError, UpdateConfig, current_platform, load_config};
use tldr_storage::Storage;

/// Where users can contribute missing pages.
const PAGES_REPOSITORY: &str = "https://github.com/tldr-pages/tldr";

/// The only page language cached locally.
const CACHED_LANGUAGE: &str = "en";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Simplified, community-driven man pages.
#[derive(Parser, Debug)]
#[command(
    name = "tldr",
    version,
    about = "Display simplified, example-based help pages for command-line tools.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Command to show; several words are joined with '-' (git commit → git-commit).
    #[arg(value_name = "COMMAND")]
    pub words: Vec<String>,

    /// Redownload all pages before anything else.
    #[arg(short, long)]
    pub update: bool,

    /// List every command available for the platform.
    #[arg(short, long)]
    pub list: bool,

    /// Show the cache location, last update, and page counts.
    #[arg(long)]
    pub info: bool,

    /// Platform to show pages for (defaults to the current OS).
    #[arg(short, long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Page language. Only English pages are cached.
    #[arg(short = 'L', long, value_name = "LANGUAGE")]
    pub language: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// The page name for the positional words.
    fn command_name(&self) -> Option<String> {
        if self.words.is_empty() {
            return None;
        }
        Some(self.words.join("-").to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Argument validation
// ---------------------------------------------------------------------------

/// Check the flag and argument combination.
///
/// `--platform`, `--language` and the logging flags are modifiers and never
/// count. `--update` may be combined with anything.
pub(crate) fn validate_arguments(cli: &Cli) -> tldr_shared::Result<()> {
    let actions = [cli.list, cli.info].into_iter().filter(|set| *set).count();
    let has_command = !cli.words.is_empty();

    if !cli.update && actions == 0 && !has_command {
        return Err(TldrError::validation("missing argument: command"));
    }
    if actions > 0 && has_command {
        return Err(TldrError::validation("too many arguments: expected none"));
    }
    if actions > 1 {
        return Err(TldrError::validation("at most one flag can be set"));
    }
    Ok(())
}

/// The platform for `--list` or a page lookup; `None` when neither is requested.
///
/// Resolved after any update so that a bad `[display] platform` never blocks
/// `tldr --update`.
fn lookup_platform(cli: &Cli, config: &AppConfig) -> tldr_shared::Result<Option<String>> {
    if !cli.list && cli.words.is_empty() {
        return Ok(None);
    }
    let platforms = config.platform_set()?;
    let requested = cli.platform.as_deref().or(config.display.platform.as_deref());
    resolve_platform(requested, &platforms)
}

/// Pick the platform partition searched before `common`.
///
/// An explicit name must belong to `platforms`. Without one, the detected OS
/// is used when it is part of the set; otherwise only `common` is searched.
fn resolve_platform(
    requested: Option<&str>,
    platforms: &PlatformSet,
) -> tldr_shared::Result<Option<String>> {
    match requested {
        Some(name) => platforms.resolve(name).map(Some),
        None => Ok(current_platform()
            .filter(|p| platforms.contains(p))
            .map(str::to_string)),
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tldr=warn",
        1 => "tldr=info",
        2 => "tldr=debug",
        _ => "tldr=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    validate_arguments(&cli)?;

    let config = load_config()?;

    let language = cli.language.as_deref().unwrap_or(&config.display.language);
    if !language.eq_ignore_ascii_case(CACHED_LANGUAGE) {
        warn!(language, "only English pages are cached, showing English");
    }

    let db_path = config.database_path()?;
    debug!(db = %db_path.display(), "resolved settings");

    if cli.update {
        cmd_update(&config, &db_path).await?;
    }

    let platform = lookup_platform(&cli, &config)?;

    if cli.list {
        cmd_list(&config, &db_path, platform.as_deref()).await
    } else if cli.info {
        cmd_info(&db_path).await
    } else if let Some(command) = cli.command_name() {
        cmd_render(&config, &db_path, &command, platform.as_deref()).await
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_update(config: &AppConfig, db_path: &Path) -> Result<()> {
    let update_config = UpdateConfig::try_from(config)?;
    let source = HttpSource::new(update_config.archive_url.clone(), update_config.timeout)?;
    let storage = Storage::open(db_path).await?;

    info!(
        url = %update_config.archive_url,
        db = %db_path.display(),
        platforms = %update_config.platforms,
        "updating page cache"
    );

    let reporter = CliProgress::new();
    let result = tldr_core::update(&update_config, &source, &storage, &reporter).await;
    if result.is_err() {
        reporter.spinner.finish_and_clear();
    }
    let report = result?;

    eprintln!(
        "Updated {} pages in {:.1}s.",
        report.total_stored(),
        report.elapsed.as_secs_f64()
    );
    if !report.warnings.is_empty() {
        eprintln!("{} entries could not be read; run with -v for details.", report.warnings.len());
    }

    Ok(())
}

async fn cmd_render(
    config: &AppConfig,
    db_path: &Path,
    command: &str,
    platform: Option<&str>,
) -> Result<()> {
    let Some(storage) = open_cache(db_path).await? else {
        return report_outcome(config, TldrError::EmptyDatabase);
    };

    let stdout = io::stdout();
    let styled = config.display.color.should_style(stdout.is_tty());

    match tldr_core::render_command(&storage, command, platform, styled, stdout.lock()).await {
        Ok(page) => {
            debug!(command, partition = %page.partition, "page rendered");
            Ok(())
        }
        Err(e) => report_outcome(config, e),
    }
}

async fn cmd_list(config: &AppConfig, db_path: &Path, platform: Option<&str>) -> Result<()> {
    let Some(storage) = open_cache(db_path).await? else {
        return report_outcome(config, TldrError::EmptyDatabase);
    };

    let commands = match tldr_core::list_commands(&storage, platform).await {
        Ok(commands) => commands,
        Err(e) => return report_outcome(config, e),
    };

    let mut out = io::stdout().lock();
    for command in &commands {
        writeln!(out, "{command}")?;
    }
    Ok(())
}

async fn cmd_info(db_path: &Path) -> Result<()> {
    println!();
    println!("  Database:    {}", db_path.display());

    let Some(storage) = open_cache(db_path).await? else {
        println!("  Last update: never");
        println!();
        return Ok(());
    };

    match storage.last_update().await? {
        Some(record) => {
            println!("  Last update: {}", record.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
            match serde_json::from_str::<UpdateReport>(&record.stats_json) {
                Ok(stats) => println!("  Source:      {}", stats.source),
                Err(e) => debug!(error = %e, "unreadable update stats"),
            }
        }
        None => println!("  Last update: never"),
    }

    let counts = storage.partition_counts().await?;
    if !counts.is_empty() {
        println!("  Pages:");
        for (partition, count) in counts {
            println!("    {partition:<10} {count}");
        }
    }
    println!();

    Ok(())
}

/// Open the cache read-only. A database that was never created is `None`.
async fn open_cache(db_path: &Path) -> tldr_shared::Result<Option<Storage>> {
    if !db_path.exists() {
        debug!(db = %db_path.display(), "page cache does not exist yet");
        return Ok(None);
    }
    Storage::open_readonly(db_path).await.map(Some)
}

/// Print guidance for expected lookup outcomes; propagate everything else.
fn report_outcome(config: &AppConfig, err: TldrError) -> Result<()> {
    if !err.is_user_facing() {
        return Err(err.into());
    }

    let styled = config.display.color.should_style(io::stderr().is_tty());
    if let Some(text) = guidance(&err, styled) {
        eprint!("{text}");
    }
    Ok(())
}

/// User-facing text for [`TldrError::EmptyDatabase`] and [`TldrError::NotFound`].
fn guidance(err: &TldrError, styled: bool) -> Option<String> {
    let paint = |text: &str, style: Style| {
        if styled {
            style.content_style().apply(text).to_string()
        } else {
            text.to_string()
        }
    };
    let hint = format!(
        "You can try updating the database using {}.",
        paint("tldr --update", Style::Verbatim)
    );

    match err {
        TldrError::EmptyDatabase => Some(format!("\n  The database is empty.\n  {hint}\n\n")),
        TldrError::NotFound { command } => Some(format!(
            "\n  {} documentation is not available.\n  {hint}\n  Or add a page yourself to {PAGES_REPOSITORY}.\n\n",
            paint(command.as_str(), Style::Heading)
        )),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
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
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_stored(&self, path: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("Storing [{current}/{total}] {path}"));
    }

    fn done(&self, _report: &UpdateReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tldr").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    fn validation_message(args: &[&str]) -> Option<String> {
        validate_arguments(&parse(args)).err().map(|e| match e {
            TldrError::Validation { message } => message,
            other => panic!("unexpected error: {other}"),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn command_alone_is_valid() {
        assert_eq!(validation_message(&["tar"]), None);
        assert_eq!(validation_message(&["git", "commit"]), None);
    }

    #[test]
    fn nothing_to_do_is_missing_command() {
        assert_eq!(validation_message(&[]).as_deref(), Some("missing argument: command"));
        assert_eq!(
            validation_message(&["-p", "linux", "-L", "en", "-vv"]).as_deref(),
            Some("missing argument: command")
        );
    }

    #[test]
    fn update_combines_with_anything() {
        assert_eq!(validation_message(&["-u"]), None);
        assert_eq!(validation_message(&["--update", "ls"]), None);
        assert_eq!(validation_message(&["-u", "--list"]), None);
    }

    #[test]
    fn action_flag_with_command_is_rejected() {
        assert_eq!(
            validation_message(&["--list", "ls"]).as_deref(),
            Some("too many arguments: expected none")
        );
        assert_eq!(
            validation_message(&["-u", "--info", "ls"]).as_deref(),
            Some("too many arguments: expected none")
        );
    }

    #[test]
    fn two_action_flags_are_rejected() {
        assert_eq!(
            validation_message(&["--list", "--info"]).as_deref(),
            Some("at most one flag can be set")
        );
    }

    #[test]
    fn modifiers_do_not_count() {
        assert_eq!(validation_message(&["-p", "osx", "--list"]), None);
        assert_eq!(validation_message(&["--language", "de", "ls"]), None);
    }

    // -----------------------------------------------------------------------
    // Arguments
    // -----------------------------------------------------------------------

    #[test]
    fn words_join_into_command_name() {
        assert_eq!(parse(&["git", "Commit"]).command_name().as_deref(), Some("git-commit"));
        assert_eq!(parse(&["-u"]).command_name(), None);
    }

    #[test]
    fn explicit_platform_must_be_known() {
        let platforms = PlatformSet::new(["linux", "osx"]).unwrap();
        assert_eq!(
            resolve_platform(Some("OSX"), &platforms).unwrap().as_deref(),
            Some("osx")
        );
        let err = resolve_platform(Some("plan9"), &platforms).unwrap_err();
        assert!(err.to_string().contains("linux, osx"));
    }

    #[test]
    fn detected_platform_outside_set_searches_common_only() {
        let platforms = PlatformSet::new(["plan9"]).unwrap();
        assert_eq!(resolve_platform(None, &platforms).unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Guidance
    // -----------------------------------------------------------------------

    #[test]
    fn empty_database_guidance() {
        let text = guidance(&TldrError::EmptyDatabase, false).unwrap();
        assert_eq!(
            text,
            "\n  The database is empty.\n  You can try updating the database using tldr --update.\n\n"
        );
    }

    #[test]
    fn not_found_guidance_names_command() {
        let err = TldrError::NotFound {
            command: "frobnicate".into(),
        };
        let text = guidance(&err, false).unwrap();
        assert!(text.starts_with("\n  frobnicate documentation is not available."));
        assert!(text.contains("tldr --update"));
        assert!(text.contains(PAGES_REPOSITORY));
    }

    #[test]
    fn update_alone_ignores_configured_platform() {
        let mut config = AppConfig::default();
        config.display.platform = Some("plan9".into());

        assert_eq!(lookup_platform(&parse(&["-u"]), &config).unwrap(), None);
        assert_eq!(lookup_platform(&parse(&["--info"]), &config).unwrap(), None);
        assert!(lookup_platform(&parse(&["-u", "ls"]), &config).is_err());
        assert!(lookup_platform(&parse(&["--list"]), &config).is_err());
    }

    #[test]
    fn flag_platform_overrides_config() {
        let mut config = AppConfig::default();
        config.display.platform = Some("plan9".into());
        assert_eq!(
            lookup_platform(&parse(&["-p", "osx", "ls"]), &config).unwrap().as_deref(),
            Some("osx")
        );
    }

    #[test]
    fn user_facing_outcomes_have_guidance() {
        let outcomes = [
            TldrError::EmptyDatabase,
            TldrError::NotFound {
                command: "ls".into(),
            },
        ];
        for err in &outcomes {
            assert!(err.is_user_facing());
            assert!(guidance(err, false).is_some());
        }
    }

    #[test]
    fn faults_are_propagated() {
        let config = AppConfig::default();
        assert!(report_outcome(&config, TldrError::Store("disk full".into())).is_err());
        assert!(report_outcome(&config, TldrError::EmptyDatabase).is_ok());
    }

    #[test]
    fn faults_have_no_guidance() {
        assert!(guidance(&TldrError::Store("disk full".into()), false).is_none());
    }
}

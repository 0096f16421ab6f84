use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use npm_validator::{
    compromised,
    config::{load_settings, resolve_config_path, user_config_path, validate_feed_ids, Settings},
    feed::HttpFetcher,
    matcher::scan_repository,
    model::{CompromisedListSnapshot, CompromisedMap},
    output::{format_report_to_string, print_feed_table, print_report, OutputFormat},
    update::build_snapshot,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const FINDINGS: u8 = 10;
}

#[derive(Parser)]
#[command(name = "npm-validator")]
#[command(
    author,
    version,
    about = "Detect compromised npm packages in lockfiles using threat-intelligence feeds"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a repository for compromised package versions
    Scan {
        /// Repository root to scan
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Pre-built compromised list (file path or URL) instead of live feeds
        #[arg(short, long, env = "NPM_VALIDATOR_LIST")]
        list: Option<String>,

        /// Feed settings file
        #[arg(short, long, env = "NPM_VALIDATOR_FEEDS_CONFIG")]
        config: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit successfully even when findings are reported
        #[arg(
            long,
            env = "NPM_VALIDATOR_WARN_ONLY",
            value_parser = BoolishValueParser::new()
        )]
        warn_only: bool,
    },

    /// Fetch all enabled feeds and write a compromised-list snapshot
    Update {
        /// Snapshot file to write; an existing one is diffed against
        #[arg(short, long)]
        output: PathBuf,

        /// Feed settings file
        #[arg(short, long, env = "NPM_VALIDATOR_FEEDS_CONFIG")]
        config: Option<PathBuf>,

        /// Identifier recorded in the snapshot (defaults to a timestamp)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// List configured feeds
    Feeds {
        /// Feed settings file
        #[arg(short, long, env = "NPM_VALIDATOR_FEEDS_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show or create the settings file
    Config {
        /// Generate default settings file
        #[arg(long)]
        init: bool,

        /// Show settings file path
        #[arg(long)]
        path: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

/// Logs go to stderr so JSON on stdout stays clean.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Scan {
            root,
            list,
            config,
            format,
            output,
            warn_only,
        } => run_scan(&root, list, config, &format, output, warn_only),
        Commands::Update {
            output,
            config,
            run_id,
        } => {
            run_update(&output, config, run_id)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Feeds { config } => {
            list_feeds(config)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Loads settings from the resolved path, or the built-in feeds when no
/// settings file exists.
fn settings_for(explicit: Option<PathBuf>) -> Result<Settings> {
    let settings = match resolve_config_path(explicit.as_deref()) {
        Some(path) => load_settings(&path)
            .with_context(|| format!("Failed to load feed settings from {}", path.display()))?,
        None => {
            tracing::info!("no settings file found, using built-in feeds");
            Settings::builtin()
        }
    };
    validate_feed_ids(&settings)?;
    Ok(settings)
}

fn run_scan(
    root: &Path,
    list: Option<String>,
    config: Option<PathBuf>,
    format: &str,
    output_file: Option<PathBuf>,
    warn_only: bool,
) -> Result<u8> {
    let format = OutputFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table && output_file.is_none();

    if !root.is_dir() {
        anyhow::bail!("Scan root is not a directory: {}", root.display());
    }

    let progress = if is_interactive {
        Some(spinner("Loading compromised package list...")?)
    } else {
        None
    };

    let fetcher = HttpFetcher::new()?;
    let compromised: CompromisedMap = match list {
        Some(source) => compromised::load(&source, &fetcher)
            .with_context(|| format!("Failed to load compromised list from {}", source))?,
        None => {
            let settings = settings_for(config)?;
            build_snapshot(&fetcher, &settings, None, "scan", None)?
                .snapshot
                .to_mapping()
        }
    };

    if let Some(pb) = &progress {
        pb.set_message(format!("Scanning {}...", root.display()));
    }

    let report = scan_repository(root, &compromised)
        .with_context(|| format!("Failed to scan {}", root.display()))?;

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Checked {} project(s) against {} compromised package(s)",
            report.totals.projects,
            compromised.len()
        ));
    }

    if let Some(path) = output_file {
        let content = format_report_to_string(&report, format)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("Report written to: {}", path.display());
    } else {
        print_report(&report, format)?;
    }

    if report.has_findings && !warn_only {
        Ok(exit_codes::FINDINGS)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

fn read_previous_snapshot(path: &Path) -> Option<CompromisedListSnapshot> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable previous snapshot");
            None
        }
    }
}

fn run_update(output: &Path, config: Option<PathBuf>, run_id: Option<String>) -> Result<()> {
    let settings = settings_for(config)?;
    let run_id = run_id.unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string());
    let previous = read_previous_snapshot(output);

    let pb = spinner("Fetching feeds...")?;
    let fetcher = HttpFetcher::new()?;
    let outcome = build_snapshot(&fetcher, &settings, previous.as_ref(), &run_id, None);
    pb.finish_and_clear();
    let outcome = outcome?;

    let json = serde_json::to_string_pretty(&outcome.snapshot)?;
    fs::write(output, json).with_context(|| format!("Failed to write snapshot to {}", output.display()))?;

    for aggregation in &outcome.aggregations {
        println!(
            "  {:<20} {} packages, {} versions, {} skipped",
            aggregation.display_name,
            aggregation.package_count(),
            aggregation.version_count(),
            aggregation.skipped_records.len()
        );
    }
    for failure in &outcome.failures {
        println!("  failed: {}", failure);
    }

    let snapshot = &outcome.snapshot;
    println!(
        "Wrote {} packages ({} versions) to {}",
        snapshot.totals.packages,
        snapshot.totals.versions,
        output.display()
    );
    if let Some(summary) = &snapshot.change_summary {
        println!("  +{} / -{} packages since previous snapshot", summary.added, summary.removed);
    }

    Ok(())
}

fn list_feeds(config: Option<PathBuf>) -> Result<()> {
    let (settings, origin) = match resolve_config_path(config.as_deref()) {
        Some(path) => (load_settings(&path)?, path.display().to_string()),
        None => (Settings::builtin(), "built-in defaults".to_string()),
    };

    println!("Feeds from {}:", origin);
    println!();
    print_feed_table(&settings.feeds);

    if let Err(e) = validate_feed_ids(&settings) {
        println!();
        println!("Warning: {}", e);
    }

    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = user_config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Settings file already exists at: {}", config_path.display());
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = Settings::generate_default_config();
        fs::write(&config_path, &content)?;
        println!("Created settings file at: {}", config_path.display());
        println!();
        println!("{}", content);
        return Ok(());
    }

    match resolve_config_path(None) {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            println!("Settings file: {}", path.display());
            println!();
            println!("{}", content);
        }
        None => {
            println!("No settings file found; the built-in feeds are used.");
            println!("Run 'npm-validator config --init' to create one.");
            println!();
            println!("Settings path: {}", config_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_warn_only(args: &[&str]) -> bool {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Scan { warn_only, .. } => warn_only,
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_warn_only_flag_and_env() {
        std::env::remove_var("NPM_VALIDATOR_WARN_ONLY");
        assert!(!scan_warn_only(&["npm-validator", "scan"]));
        assert!(scan_warn_only(&["npm-validator", "scan", "--warn-only"]));

        for value in ["1", "true", "yes", "y"] {
            std::env::set_var("NPM_VALIDATOR_WARN_ONLY", value);
            assert!(scan_warn_only(&["npm-validator", "scan"]), "{value}");
        }
        std::env::set_var("NPM_VALIDATOR_WARN_ONLY", "0");
        assert!(!scan_warn_only(&["npm-validator", "scan"]));

        std::env::remove_var("NPM_VALIDATOR_WARN_ONLY");
    }
}

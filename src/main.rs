//! Lookout CLI - scan a workspace once or watch it continuously.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use lookout::{
    BuiltinLoader, CancelToken, ConsoleSink, EngineProvider, ExclusionFilter, FsWorkspace,
    JsonFileStore, Opt, OptionStore, OptionsBridge, ScanSummary, Scanner, WorkspaceWatcher,
    EXCLUDE_KEY,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "lookout",
    version,
    about = "Incremental JavaScript linter for project workspaces"
)]
struct Cli {
    /// Workspace roots to scan (default: current directory)
    paths: Vec<PathBuf>,

    /// Settings file: a flat JSON object of option values
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Additional exclusion patterns (globs)
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<String>,

    /// Additional predefined global names (comma-separated)
    #[arg(long)]
    predef: Option<String>,

    /// Watch for changes and re-scan incrementally
    #[arg(short, long)]
    watch: bool,

    /// List the option catalogue and exit
    #[arg(long)]
    list_options: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if cli.list_options {
        print_catalogue();
        return;
    }

    match run(&cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(err) => {
            eprintln!("{}: {:#}", "error".red().bold(), err);
            process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let roots: Vec<PathBuf> = if cli.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths.clone()
    };

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(default_settings_path);
    let store =
        Arc::new(JsonFileStore::open(&settings_path).context("reading settings file")?);
    apply_overrides(&store, cli)?;

    let bridge = OptionsBridge::new(Arc::clone(&store) as Arc<dyn OptionStore>);
    let provider = EngineProvider::new(Box::new(BuiltinLoader), bridge);
    let filter = ExclusionFilter::new(Arc::clone(&store) as Arc<dyn OptionStore>);
    let mut scanner = Scanner::new(provider, filter);

    let summary = scan_roots(&mut scanner, &roots, cli)?;
    print_summary(&summary);

    if cli.watch {
        watch_loop(&mut scanner, &store, &roots, &settings_path, cli)?;
        return Ok(0);
    }

    Ok(if summary.issue_count > 0 { 1 } else { 0 })
}

/// Full scan over every root, one summary.
fn scan_roots(
    scanner: &mut Scanner,
    roots: &[PathBuf],
    cli: &Cli,
) -> anyhow::Result<ScanSummary> {
    let cancel = CancelToken::new();
    let mut sink = ConsoleSink::new(!cli.no_color);
    let mut total = ScanSummary::default();
    for root in roots {
        let workspace = FsWorkspace::new(root);
        let summary = scanner
            .full_scan(&workspace, &mut sink, &cancel)
            .with_context(|| format!("scanning {}", root.display()))?;
        total.merge(summary);
    }
    Ok(total)
}

/// Fold command-line overrides into the store (in memory only).
fn apply_overrides(store: &JsonFileStore, cli: &Cli) -> anyhow::Result<()> {
    if !cli.exclude.is_empty() {
        let mut patterns = store.get(EXCLUDE_KEY)?.unwrap_or_default();
        for pattern in &cli.exclude {
            if !patterns.is_empty() {
                patterns.push('\n');
            }
            patterns.push_str(pattern);
        }
        store.set(EXCLUDE_KEY, patterns);
    }
    if let Some(predef) = &cli.predef {
        let merged = match store.get(Opt::Predef.name())? {
            Some(existing) if !existing.is_empty() => format!("{},{}", existing, predef),
            _ => predef.clone(),
        };
        store.set(Opt::Predef.name(), merged);
    }
    Ok(())
}

fn watch_loop(
    scanner: &mut Scanner,
    store: &Arc<JsonFileStore>,
    roots: &[PathBuf],
    settings: &Path,
    cli: &Cli,
) -> anyhow::Result<()> {
    let watcher =
        WorkspaceWatcher::new(roots, Some(settings)).context("starting file watcher")?;
    println!("\n{}", "Watching for changes (ctrl-c to stop)".dimmed());

    let cancel = CancelToken::new();
    while let Some(batch) = watcher.wait() {
        if batch.settings_changed {
            // New configuration can change every file's result; the store
            // reload invalidates the engine through its subscription.
            if let Err(err) = store.reload() {
                log::warn!("settings reload failed: {}", err);
            }
            scanner.filter().refresh();
            match scan_roots(scanner, roots, cli) {
                Ok(summary) => print_summary(&summary),
                Err(err) => eprintln!("{}: {:#}", "error".red().bold(), err),
            }
            continue;
        }

        let workspace = FsWorkspace::new(roots.first().cloned().unwrap_or_else(|| ".".into()));
        let mut sink = ConsoleSink::new(!cli.no_color);
        match scanner.incremental_scan(&batch.changes, &workspace, &mut sink, &cancel) {
            Ok(summary) => print_summary(&summary),
            Err(err) => eprintln!("{}: {}", "error".red().bold(), err),
        }
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary) {
    let issues = if summary.issue_count == 1 {
        "issue"
    } else {
        "issues"
    };
    let line = format!(
        "{} files scanned, {} analyzed, {} excluded, {} {} found",
        summary.files_visited,
        summary.files_analyzed,
        summary.files_excluded,
        summary.issue_count,
        issues
    );
    if summary.issue_count > 0 {
        println!("\n{}", line.yellow());
    } else {
        println!("\n{}", line.green());
    }
    if summary.files_failed > 0 {
        let failed = format!("{} file(s) could not be analyzed", summary.files_failed);
        println!("{}", failed.red());
    }
}

/// Print the option catalogue in declaration order.
fn print_catalogue() {
    let width = Opt::max_name_len();
    println!("{}", "Available options".bold());
    for &opt in Opt::all() {
        // Pad before coloring: escape codes would break the alignment.
        let name = format!("{:<width$}", opt.name(), width = width);
        println!(
            "  {}  {:<6}  {}",
            name.cyan(),
            opt.value_type().to_string(),
            opt.description()
        );
    }
}

/// `lookout.json` next to the workspace, falling back to `~/.lookout.json`.
fn default_settings_path() -> PathBuf {
    let local = PathBuf::from("lookout.json");
    if local.exists() {
        return local;
    }
    if let Some(home) = dirs::home_dir() {
        let user = home.join(".lookout.json");
        if user.exists() {
            return user;
        }
    }
    local
}

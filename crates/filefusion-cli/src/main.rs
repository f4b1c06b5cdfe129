use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use fs2::FileExt;
use tracing::debug;

use filefusion_core::{
    Condition, Config, FileFusionError, FileOutcome, LoadedRules, Organizer, Relocator, Result,
    RuleStore, RuleTable, RunStats, TransferMode,
};

mod args;
use args::{Cli, Commands, ConfigAction, RulesAction, Shell};

const LOCK_FILE: &str = "organize.lock";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let base_dir = resolve_base_dir(cli.base_dir);

    let result = match cli.command {
        Some(Commands::Organize {
            inputs,
            method,
            move_files,
            copy,
            dry_run,
            jobs,
            exclude,
        }) => {
            let mode = if move_files {
                Some(TransferMode::Move)
            } else if copy {
                Some(TransferMode::Copy)
            } else {
                None
            };
            handle_organize(
                &base_dir, inputs, &method, mode, dry_run, jobs, &exclude, cli.quiet,
            )
        }
        Some(Commands::Rules { action }) => handle_rules(action, &base_dir),
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// `RUST_LOG` wins; otherwise warn, info with -v, error with -q.
fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "filefusion", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var("FILEFUSION_BASE") {
        return PathBuf::from(base);
    }

    dirs::home_dir()
        .map(|h| h.join(".filefusion"))
        .unwrap_or_else(|| PathBuf::from(".filefusion"))
}

/// Last positional input is the destination, the rest are sources.
fn split_inputs(mut inputs: Vec<PathBuf>) -> Option<(Vec<PathBuf>, PathBuf)> {
    if inputs.len() < 2 {
        return None;
    }
    let destination = inputs.pop()?;
    Some((inputs, destination))
}

/// Hold an exclusive lock in the base directory for the life of the run.
fn acquire_lock(base_dir: &Path) -> Result<File> {
    fs::create_dir_all(base_dir)?;
    let path = base_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)?;

    file.try_lock_exclusive()
        .map_err(|_| FileFusionError::AlreadyRunning { path: path.clone() })?;
    debug!(path = %path.display(), "acquired lock");
    Ok(file)
}

#[allow(clippy::too_many_arguments)]
fn handle_organize(
    base_dir: &Path,
    inputs: Vec<PathBuf>,
    method: &[String],
    mode: Option<TransferMode>,
    dry_run: bool,
    jobs: Option<usize>,
    exclude: &[String],
    quiet: bool,
) -> Result<()> {
    let config = Config::load(base_dir)?;
    let Some((sources, destination)) = split_inputs(inputs) else {
        Cli::command()
            .error(
                clap::error::ErrorKind::WrongNumberOfValues,
                "organize needs at least one SOURCE and a DEST",
            )
            .exit()
    };

    let mode = mode.unwrap_or(config.relocate.mode);
    let jobs = jobs.unwrap_or(config.walk.jobs);
    let mut patterns = config.walk.exclude.clone();
    patterns.extend(exclude.iter().cloned());

    let _lock = acquire_lock(base_dir)?;

    let store = rule_store(&config, base_dir, std::env::current_dir()?);
    let loaded = store.load(method);
    print_load_warnings(&loaded);

    let relocator = Relocator::new(mode)
        .with_retry(
            config.relocate.attempts,
            Duration::from_millis(config.relocate.backoff_ms),
        )
        .with_dry_run(dry_run);

    if !quiet {
        println!();
        for source in &sources {
            println!("Source: {}", source.display());
        }
        println!("Destination: {}", destination.display());
        println!(
            "Rules: {} from {}",
            loaded.table.len(),
            loaded
                .loaded
                .iter()
                .map(|d| d.identifier.as_str())
                .collect::<Vec<_>>()
                .join(", ")
                .cyan()
        );
        println!("Mode: {}", mode);
        if dry_run {
            println!("{}", "(dry run)".yellow());
        }
        println!();
    }

    let organizer = Organizer::new(sources, destination, loaded.table, relocator)
        .with_exclude(&patterns)?
        .with_jobs(jobs);

    let on_file = |path: &Path, outcome: &FileOutcome| {
        if quiet && !matches!(outcome, FileOutcome::Failed { .. }) {
            return;
        }
        let line = match outcome {
            FileOutcome::Relocated { destination, .. } => format!(
                "  {} {} -> {}",
                "[OK]".green(),
                path.display(),
                destination.display()
            ),
            FileOutcome::Planned { destination, .. } => format!(
                "  {} {} -> {}",
                "[PLAN]".cyan(),
                path.display(),
                destination.display()
            ),
            FileOutcome::AlreadyInPlace => {
                format!("  {} {} (already in place)", "[SKIP]".yellow(), path.display())
            }
            FileOutcome::Duplicate => format!("  {} {}", "[DUP]".yellow(), path.display()),
            FileOutcome::Failed { reason } => format!(
                "  {} {}: {}",
                "[FAIL]".red().bold(),
                path.display(),
                reason
            ),
        };
        println!("{}", line);
    };

    let stats = organizer.run(Some(&on_file))?;
    if !quiet {
        print_summary(&stats, dry_run);
    }

    Ok(())
}

fn print_summary(stats: &RunStats, dry_run: bool) {
    println!();
    println!(
        "Processed {} files ({:.2} MB) in {:.2} seconds",
        stats.files,
        stats.megabytes(),
        stats.elapsed.as_secs_f64()
    );
    println!();
    println!("Summary:");
    if dry_run {
        println!("  Planned: {}", stats.planned);
    } else {
        println!("  Relocated: {}", stats.relocated);
    }
    println!("  Unmatched: {}", stats.unmatched);
    println!("  Already in place: {}", stats.already_in_place);
    println!("  Duplicates: {}", stats.duplicates);
    println!("  Failed: {}", stats.failed_count());

    if stats.cancelled {
        println!();
        println!("{}", "(cancelled)".yellow());
    }

    if !stats.failed.is_empty() {
        println!();
        println!("Failed files:");
        for failed in &stats.failed {
            println!("  {} {}", failed.path.display(), failed.reason.red());
        }
    }
    println!();
}

/// Rule documents in the working directory shadow the rules directory.
fn rule_store(config: &Config, base_dir: &Path, cwd: PathBuf) -> RuleStore {
    RuleStore::new(config.rules_dir(base_dir)).with_search_dir(cwd)
}

fn print_load_warnings(loaded: &LoadedRules) {
    let _ = write_load_warnings(&mut io::stderr().lock(), loaded);
}

fn write_load_warnings(out: &mut impl Write, loaded: &LoadedRules) -> io::Result<()> {
    for warning in &loaded.warnings {
        writeln!(out, "  {} {}", "[WARN]".yellow().bold(), warning)?;
    }
    Ok(())
}

fn handle_rules(action: RulesAction, base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir)?;
    let store = rule_store(&config, base_dir, std::env::current_dir()?);

    match action {
        RulesAction::List => {
            let documents = store.list()?;
            if documents.is_empty() {
                println!("No rule documents found in {}", store.rules_dir().display());
                println!();
                println!("Add one with: filefusion rules import <id> <file.json>");
                return Ok(());
            }

            println!();
            println!("Available rule documents:");
            println!();
            for document in documents {
                println!("  {}", document.identifier.cyan().bold());
                println!("    {}", document.path.display());
            }
            println!();
        }
        RulesAction::Show { ids, json } => {
            let loaded = store.load(&ids);
            print_load_warnings(&loaded);

            if json {
                println!("{}", serde_json::to_string_pretty(&table_to_json(&loaded.table))?);
            } else {
                print_table(&loaded.table);
            }
        }
        RulesAction::Check { ids } => {
            let ids = if ids.is_empty() {
                store.list()?.into_iter().map(|d| d.identifier).collect()
            } else {
                ids
            };

            let mut problems = 0;
            println!();
            for id in &ids {
                match store.load_document(id) {
                    Ok((_, table)) => {
                        let invalid = table.invalid_conditions();
                        if invalid.is_empty() {
                            println!("  {} {} ({} rules)", "[OK]".green(), id, table.len());
                        }
                        for (rule, condition) in invalid {
                            problems += 1;
                            println!(
                                "  {} {}: {}: {}",
                                "[WARN]".yellow().bold(),
                                id,
                                rule,
                                describe_condition(condition)
                            );
                        }
                    }
                    Err(e) => {
                        problems += 1;
                        println!("  {} {}", "[FAIL]".red().bold(), e);
                    }
                }
            }
            println!();

            if problems > 0 {
                return Err(FileFusionError::RuleLoad {
                    identifier: ids.join(", "),
                    message: format!("{} problem(s) found", problems),
                });
            }
        }
        RulesAction::Import { id, file } => {
            let document = store.import(&id, &file)?;
            println!("{} {}", "Imported:".green(), document.path.display());
        }
        RulesAction::Remove { id, force } => {
            let document = store
                .list()?
                .into_iter()
                .find(|d| d.identifier == id)
                .ok_or_else(|| FileFusionError::RuleLoad {
                    identifier: id.clone(),
                    message: format!("not found in {}", store.rules_dir().display()),
                })?;

            if !force {
                println!();
                println!("Remove rule document '{}'? This will delete:", id.yellow());
                println!("  {}", document.path.display());
                println!();
                print!("Type 'yes' to confirm: ");
                io::stdout().flush()?;

                let mut input = String::new();
                io::stdin().read_line(&mut input)?;

                if input.trim() != "yes" {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            store.remove(&id)?;
            println!("{} {}", "Removed:".red(), document.path.display());
        }
    }

    Ok(())
}

fn describe_condition(condition: &Condition) -> String {
    match condition {
        Condition::Invalid { source, error } => format!("'{}' ({})", source, error),
        other => format!("'{}'", other),
    }
}

fn print_table(table: &RuleTable) {
    println!();
    let mut directives = table.directives().peekable();
    if directives.peek().is_some() {
        println!("Directives:");
        for (name, value) in directives {
            println!("  {} = {}", name.cyan(), value);
        }
        println!();
    }

    if table.is_empty() {
        println!("No rules.");
        println!();
        return;
    }

    println!("Rules (first wins ties):");
    println!();
    for rule in table.rules() {
        println!("  {}", rule.name.cyan().bold());
        if rule.conditions.is_empty() {
            println!("    {}", "(no conditions, never selected)".dimmed());
        }
        for condition in &rule.conditions {
            match condition {
                Condition::Invalid { .. } => {
                    println!("    - {}", describe_condition(condition).red())
                }
                other => println!("    - {}", other),
            }
        }
        println!();
    }
}

fn table_to_json(table: &RuleTable) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (name, value) in table.directives() {
        object.insert(name.clone(), value.clone());
    }
    for rule in table.rules() {
        let conditions = rule
            .conditions
            .iter()
            .map(|c| serde_json::Value::String(c.to_string()))
            .collect();
        object.insert(rule.name.clone(), serde_json::Value::Array(conditions));
    }
    serde_json::Value::Object(object)
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(FileFusionError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}

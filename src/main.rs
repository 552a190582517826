//! hashsentry: streaming file hashing with quota-gated reputation lookups.
//!
//! This is the main entry point for the CLI application.

use hashsentry::core::config::Config;
use hashsentry::core::error::{Error, Result};
use hashsentry::core::types::{DigestKind, FileRecord};
use hashsentry::reputation::apikey::{masked, ApiKeyStore};
use hashsentry::reputation::{
    create_provider, large_batch_warning, BatchEvent, BatchSummary, LookupBatchRunner,
    LookupClient, LookupItem, QuotaStatus, QuotaStore,
};
use hashsentry::scanner::{ConsoleProgressReporter, ResultTable, ScanController, ScanEvent, ScanSource};
use hashsentry::ui::cli::{Cli, Commands, ConfigAction, KeyAction, OutputFormat};
use hashsentry::ui::report::{export_lookups, export_records, ReportFormat};
use hashsentry::utils::format::human_size;
use hashsentry::utils::logging::{cleanup_old_logs, init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{} error: {:?}", e.category(), e);
            eprintln!("Error: {}", e);
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_config_path);
    let config = match &cli.config {
        Some(path) if !path.exists() => return Err(Error::PathNotFound(path.clone())),
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    config.validate()?;

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_config(&config)
    };
    if config.logging.log_path.is_some() {
        let log_dir = config.logging.log_dir();
        log_config = log_config.with_file(
            log_dir.join(format!("hashsentry_{}.log", chrono::Local::now().format("%Y%m%d"))),
        );
        if let Err(e) = cleanup_old_logs(&log_dir, config.logging.keep_logs_days) {
            eprintln!("Warning: log cleanup failed: {}", e);
        }
    }
    init_logging(log_config)?;

    log::info!("hashsentry v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Configuration loaded from {}", config_path.display());

    match cli.command {
        Some(Commands::Hash {
            paths,
            output,
            lookup,
            lookup_output,
        }) => {
            run_hash(&config, paths, output, lookup, lookup_output, cli.format, cli.verbose).await
        }
        Some(Commands::Lookup { digests, output }) => {
            let items = digests
                .iter()
                .map(|d| LookupItem::from_digest(d))
                .collect::<Result<Vec<_>>>()?;
            run_lookups(&config, items, output, cli.format).await
        }
        Some(Commands::Quota) => run_quota(&config, cli.format),
        Some(Commands::Key { action }) => run_key(action, &config),
        Some(Commands::Config { action }) => run_config(action, &config, &config_path),
        Some(Commands::Info) => run_info(&config, &config_path),
        None => {
            println!("hashsentry - File hashing with reputation lookups");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  hashsentry hash ~/Downloads            Hash every file in a folder");
            println!("  hashsentry hash a.exe b.dll --lookup   Hash files and look them up");
            println!("  hashsentry key set <API_KEY>           Store a reputation API key");
            println!("  hashsentry quota                       Show lookup quota usage");
            Ok(())
        }
    }
}

/// Hash a folder or file list, optionally followed by lookups.
async fn run_hash(
    config: &Config,
    paths: Vec<PathBuf>,
    output: Option<PathBuf>,
    lookup: bool,
    lookup_output: Option<PathBuf>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let controller = Arc::new(ScanController::new(&config.scan));

    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, stopping scan");
                if let Err(e) = controller.stop() {
                    log::debug!("Stop ignored: {}", e);
                }
            }
        })
    };
    let toggle = spawn_pause_toggle(Arc::clone(&controller));
    if toggle.is_some() && format == OutputFormat::Text {
        eprintln!(
            "Send SIGUSR1 to pause or resume (kill -USR1 {})",
            std::process::id()
        );
    }

    let started = controller.start(ScanSource::from_paths(paths)).await;
    let mut handle = match started {
        Ok(handle) => handle,
        Err(e) => {
            interrupt.abort();
            if let Some(toggle) = toggle {
                toggle.abort();
            }
            return Err(e);
        }
    };

    let reporter = if verbose {
        ConsoleProgressReporter::new().verbose()
    } else {
        ConsoleProgressReporter::new()
    };
    let show_progress = format == OutputFormat::Text;

    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::Started { total } => log::debug!("Worker started on {} file(s)", total),
            ScanEvent::Progress(progress) if show_progress => reporter.report(&progress),
            ScanEvent::FileHashed(record) if show_progress => reporter.report_record(&record),
            ScanEvent::Paused if show_progress => reporter.report_paused(),
            ScanEvent::Warning { path, message } => {
                log::warn!("Skipped {}: {}", path.display(), message)
            }
            ScanEvent::Finished {
                state,
                processed,
                total,
            } if show_progress => reporter.finish(state, processed, total),
            _ => {}
        }
    }
    interrupt.abort();
    if let Some(toggle) = toggle {
        toggle.abort();
    }

    let report = handle.join().await?;
    let mut table = ResultTable::new();
    table.extend(report.records);
    let stats = table.statistics();

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "scan_id": report.id,
                "state": report.state,
                "total_files": report.total_files,
                "statistics": stats,
                "records": table.records(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!();
            println!("=== Hashing {} ===", report.state);
            println!("Scan ID:         {}", report.id);
            println!("Files:           {}/{}", stats.total_files, report.total_files);
            println!("Hashed:          {}", stats.hashed);
            println!("Errors:          {}", stats.errors);
            println!("Total Size:      {}", human_size(stats.total_bytes));
            println!();
            for record in table.records() {
                print_record(record);
            }
        }
    }

    if let Some(path) = output {
        export_to(&path, |fmt| export_records(table.records(), fmt, &path))?;
    }

    if lookup {
        table.select_all(true);
        let items = table.selected_lookup_items();
        if items.is_empty() {
            println!("No hashed files to look up.");
            return Ok(());
        }
        run_lookups(config, items, lookup_output, format).await?;
    }

    Ok(())
}

/// Toggle pause/resume of the running scan on SIGUSR1.
#[cfg(unix)]
fn spawn_pause_toggle(controller: Arc<ScanController>) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut toggles = match signal(SignalKind::user_defined1()) {
        Ok(toggles) => toggles,
        Err(e) => {
            log::warn!("Pause toggle unavailable: {}", e);
            return None;
        }
    };
    Some(tokio::spawn(async move {
        while toggles.recv().await.is_some() {
            match controller.toggle_pause() {
                Ok(state) => log::info!("Scan {} by SIGUSR1", state),
                Err(e) => log::debug!("Pause toggle ignored: {}", e),
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_pause_toggle(_controller: Arc<ScanController>) -> Option<JoinHandle<()>> {
    None
}

fn print_record(record: &FileRecord) {
    println!(
        "{}  {:>10}  {}",
        record.digests.column(DigestKind::Sha256),
        record.size_human(),
        record.relative_path
    );
}

fn export_to<F>(path: &Path, export: F) -> Result<()>
where
    F: FnOnce(ReportFormat) -> Result<usize>,
{
    let rows = export(ReportFormat::from_path(path))?;
    log::info!("Exported {} row(s) to {}", rows, path.display());
    eprintln!("Exported {} row(s) to {}", rows, path.display());
    Ok(())
}

/// Run a paced lookup batch.
async fn run_lookups(
    config: &Config,
    mut items: Vec<LookupItem>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let api_key = ApiKeyStore::default_location()
        .resolve(&config.lookup)
        .map(|(key, source)| {
            log::debug!("Using API key from {}", source);
            key
        });
    let service = create_provider(&config.lookup, api_key)?;

    let quota = Arc::new(QuotaStore::from_config(&config.quota));
    quota.check(items.len() as u64)?;
    if let Some(warning) = large_batch_warning(items.len(), config.lookup.pacing(), &quota.status()?) {
        log::warn!("{}", warning);
        if format == OutputFormat::Text {
            eprintln!("Warning: {}", warning);
        }
    }

    let runner = LookupBatchRunner::new(LookupClient::new(service, Arc::clone(&quota)), config.lookup.pacing());

    let interrupt = {
        let cancel = runner.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, cancelling lookups");
                cancel.cancel();
            }
        })
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let text = format == OutputFormat::Text;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !text {
                continue;
            }
            match event {
                BatchEvent::Started { total } => {
                    println!("Looking up {} digest(s)", total);
                    println!(
                        "{:<10}  {:<6}  {:<16}  {:>4}  {:>4}  {:>4}  {:<12}  Filename",
                        "Status", "Type", "Hash", "Mal", "Sus", "Cln", "Last Scan"
                    );
                }
                BatchEvent::Updated { item, .. } => print_item(&item),
                BatchEvent::Waiting { next_index, delay } => {
                    log::debug!("Waiting {:?} before item {}", delay, next_index + 1)
                }
                _ => {}
            }
        }
    });

    let result = runner.run(&mut items, &tx).await;
    drop(tx);
    let _ = printer.await;
    interrupt.abort();
    let summary = result?;
    let status = quota.status()?;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "summary": summary,
                "items": items,
                "quota": status,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => print_summary(&summary, &status),
    }

    if let Some(path) = output {
        export_to(&path, |fmt| export_lookups(&items, fmt, &path))?;
    }

    Ok(())
}

fn print_item(item: &LookupItem) {
    let [malicious, suspicious, clean] = item.count_columns();
    println!(
        "{:<10}  {:<6}  {:<16}  {:>4}  {:>4}  {:>4}  {:<12}  {}",
        item.status.label(),
        item.digest_kind,
        item.digest_display(),
        malicious,
        suspicious,
        clean,
        item.last_scan_display(),
        item.filename
    );
}

fn print_summary(summary: &BatchSummary, status: &QuotaStatus) {
    println!();
    println!("=== Lookups {:?} ===", summary.state);
    println!("Total:           {}", summary.total);
    println!("Threats:         {}", summary.malicious);
    println!("Suspicious:      {}", summary.suspicious);
    println!("Clean:           {}", summary.clean);
    println!("Errors:          {}", summary.errors);
    if summary.cancelled > 0 {
        println!("Not checked:     {}", summary.cancelled);
    }
    print_quota(status);
}

fn print_quota(status: &QuotaStatus) {
    println!(
        "Quota today:     {}/{} ({} left)",
        status.daily_used, status.daily_limit, status.daily_remaining
    );
    println!(
        "Quota month:     {}/{} ({} left)",
        status.monthly_used, status.monthly_limit, status.monthly_remaining
    );
}

/// Show quota usage.
fn run_quota(config: &Config, format: OutputFormat) -> Result<()> {
    let status = QuotaStore::from_config(&config.quota).status()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => print_quota(&status),
    }
    Ok(())
}

/// Manage the API key.
fn run_key(action: KeyAction, config: &Config) -> Result<()> {
    let store = ApiKeyStore::default_location();
    match action {
        KeyAction::Set { key } => {
            store.save(&key)?;
            println!("API key saved to {}", store.path().display());
        }
        KeyAction::Show => match store.resolve(&config.lookup) {
            Some((key, source)) => println!("{} (from {})", masked(&key), source),
            None => println!("No API key configured."),
        },
        KeyAction::Clear => {
            if store.clear()? {
                println!("API key removed.");
            } else {
                println!("No stored API key.");
            }
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset => {
            log::info!("Resetting configuration to defaults...");
            Config::default().save(config_path)?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

/// Show application information.
fn run_info(config: &Config, config_path: &Path) -> Result<()> {
    println!("hashsentry - File hashing with reputation lookups");
    println!();
    println!("Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("Config Path:      {}", config_path.display());
    println!("Data Directory:   {}", Config::data_dir().display());
    println!("Log Directory:    {}", config.logging.log_dir().display());
    println!("Quota File:       {}", config.quota.quota_file().display());
    println!("API Key File:     {}", ApiKeyStore::default_location().path().display());
    println!();
    println!("Lookup Settings:");
    println!("  Endpoint:       {}", config.lookup.endpoint);
    println!("  Pacing:         {} s", config.lookup.pacing_secs);
    println!("  Timeout:        {} s", config.lookup.timeout_secs);
    println!(
        "  Quota:          {}/day, {}/month",
        config.quota.daily_limit, config.quota.monthly_limit
    );
    println!();
    println!("Scan Settings:");
    println!("  Chunk Size:     {}", human_size(config.scan.chunk_size as u64));
    Ok(())
}

//! CLI command implementations.

use chrono::Local;
use colored::Colorize;
use hopper_core::{
    list_directory, BoxError, FileConsumer, FsLockProbe, LockProbe, TriggerMode, WatchConfig,
    WatchError,
};
use hopper_watcher::{DirectoryWatcher, TriggerConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Write a default config file into a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = WatchConfig::path_for(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    WatchConfig::default().save(&config_path)?;

    println!("{} Initialized Hopper in {}", "✓".green(), path.display());
    println!("  Edit {} to change settings", config_path.display().to_string().cyan());
    println!("  Run {} to start watching", "hopper watch".cyan());

    Ok(())
}

/// Command-line flags that take precedence over the config file.
#[derive(Debug, Default)]
pub struct WatchOverrides {
    pub filter: Option<String>,
    pub realtime: bool,
    pub interval: Option<u64>,
    pub ignore_existing: bool,
}

impl WatchOverrides {
    /// Layers the flags on top of `config`.
    pub fn apply(self, mut config: WatchConfig) -> WatchConfig {
        if self.filter.is_some() {
            config.filter = self.filter;
        }
        if self.realtime {
            config.mode = TriggerMode::Realtime;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if self.ignore_existing {
            config.ignore_existing_on_start = true;
        }
        config
    }
}

/// Prints arrivals and problems above the spinner.
struct ConsoleConsumer {
    spinner: ProgressBar,
    delivered: AtomicUsize,
    errors: AtomicUsize,
}

impl ConsoleConsumer {
    fn new(spinner: ProgressBar) -> Self {
        Self {
            spinner,
            delivered: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    fn refresh(&self) {
        self.spinner.set_message(format!(
            "Watching... {} delivered, {} errors",
            self.delivered.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed)
        ));
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

impl FileConsumer for ConsoleConsumer {
    fn on_available(&self, path: &Path) -> std::result::Result<(), BoxError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.spinner.println(format!(
            "{} {} {}",
            timestamp().dimmed(),
            "✓".green(),
            path.display()
        ));
        self.refresh();
        Ok(())
    }

    fn on_error(&self, error: &WatchError, path: Option<&Path>) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        let context = path
            .map(|p| format!(" ({})", p.display()))
            .unwrap_or_default();
        self.spinner.println(format!(
            "{} {} {}{}",
            timestamp().dimmed(),
            "⚠".yellow(),
            error,
            context.dimmed()
        ));
        self.refresh();
    }
}

/// Watch a directory until Ctrl-C.
pub async fn watch(path: &Path, overrides: WatchOverrides) -> Result<()> {
    let config = overrides.apply(WatchConfig::load_or_default(path)?);
    config.validate()?;
    tracing::debug!(?config, "Effective config");

    let target = config.target(path)?;
    let trigger = TriggerConfig::from_config(&config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let consumer = Arc::new(ConsoleConsumer::new(spinner.clone()));
    consumer.refresh();

    let watcher = DirectoryWatcher::new(target, consumer.clone())
        .with_trigger(trigger)
        .with_retry_interval(config.retry_interval());

    spinner.println(format!(
        "{} Watching {} ({}, every {}s{})",
        "✓".green(),
        path.display().to_string().cyan(),
        config.mode,
        config.interval_secs,
        config
            .filter
            .as_ref()
            .map(|f| format!(", filter {}", f))
            .unwrap_or_default()
    ));

    watcher.start().await?;
    tokio::signal::ctrl_c().await?;

    spinner.set_message("Stopping...");
    watcher.stop().await?;
    spinner.finish_and_clear();

    println!(
        "{} Stopped after {} scans: {} delivered, {} errors",
        "✓".green(),
        watcher.scan_count(),
        consumer.delivered.load(Ordering::Relaxed).to_string().cyan(),
        consumer.errors.load(Ordering::Relaxed)
    );

    Ok(())
}

/// State of a file at the time of a one-off scan.
#[derive(Debug, PartialEq, Eq)]
enum FileStatus {
    Ready,
    Locked,
    Gone,
}

fn file_status(probe: &dyn LockProbe, path: &Path) -> std::result::Result<FileStatus, WatchError> {
    match probe.is_locked(path) {
        Ok(false) => Ok(FileStatus::Ready),
        Ok(true) => Ok(FileStatus::Locked),
        Err(e) if e.is_not_found() => Ok(FileStatus::Gone),
        Err(e) => Err(e),
    }
}

/// List a directory once and show which files are ready.
pub fn scan(path: &Path, filter: Option<&str>) -> Result<()> {
    let overrides = WatchOverrides {
        filter: filter.map(str::to_string),
        ..WatchOverrides::default()
    };
    let config = overrides.apply(WatchConfig::load_or_default(path)?);
    let target = config.target(path)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Scanning files...");

    let files = list_directory(&target)?;
    let mut statuses = Vec::with_capacity(files.len());
    for file in &files {
        statuses.push(file_status(&FsLockProbe, file)?);
    }

    spinner.finish_and_clear();

    if files.is_empty() {
        println!("{} No files in {}", "✓".green(), path.display());
        return Ok(());
    }

    let mut ready = 0;
    for (file, status) in files.iter().zip(&statuses) {
        let name = file.display().to_string();
        match status {
            FileStatus::Ready => {
                ready += 1;
                println!("  {} {}", "ready ".green(), name);
            }
            FileStatus::Locked => println!("  {} {}", "locked".yellow(), name),
            FileStatus::Gone => println!("  {} {}", "gone  ".dimmed(), name.dimmed()),
        }
    }

    println!();
    println!(
        "{} {} of {} files ready",
        "✓".green(),
        ready.to_string().cyan(),
        files.len()
    );

    Ok(())
}

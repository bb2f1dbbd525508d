//! Sort run controller: discover, identify in parallel, classify and move in order

use crate::classify::Classifier;
use crate::content::ContentReader;
use crate::discovery::discover_roms;
use crate::library::{HashLibrary, LoadReport};
use crate::models::{DiscoveryOptions, RunStatistics};
use crate::progress::ProgressTracker;
use crate::{Config, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared flag requesting a run to stop after the current file
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Controller for one sort run over a source directory
pub struct Sorter {
    classifier: Classifier,
    reader: Arc<ContentReader>,
    destination_root: PathBuf,
    config: Config,
    discovery: DiscoveryOptions,
    load_report: Option<LoadReport>,
    progress: Arc<ProgressTracker>,
    cancel: CancelFlag,
}

impl Sorter {
    /// Create a sorter moving merit-bearing ROMs under `destination_root`
    pub fn new(library: Arc<HashLibrary>, destination_root: PathBuf, config: Config) -> Self {
        Self {
            classifier: Classifier::new(library, destination_root.clone(), &config),
            reader: Arc::new(ContentReader::from_config(&config)),
            destination_root,
            config,
            discovery: DiscoveryOptions::default(),
            load_report: None,
            progress: Arc::new(ProgressTracker::new()),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_discovery_options(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = options;
        self
    }

    /// Carry library load warnings into the run statistics
    pub fn with_load_report(mut self, report: LoadReport) -> Self {
        self.load_report = Some(report);
        self
    }

    pub fn with_reader(mut self, reader: ContentReader) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Sort every ROM under `source_dir`.
    ///
    /// Reading and hashing run up to `thread_count` files ahead; decisions and
    /// moves happen one file at a time in sorted path order.
    pub async fn run(&self, source_dir: &Path) -> Result<RunStatistics> {
        let start_time = Instant::now();

        if !source_dir.is_dir() {
            return Err(format!("Source directory does not exist: {}", source_dir.display()).into());
        }

        let mut stats = RunStatistics::new();
        if let Some(report) = &self.load_report {
            for skipped in &report.skipped {
                stats.record_error(&skipped.item, skipped.kind, &skipped.message);
            }
        }

        let options = self.discovery_options().await;
        let files = discover_roms(source_dir, &options).await?;
        info!("Discovered {} files in {}", files.len(), source_dir.display());

        self.progress.reset();
        self.progress.set_total_files(files.len() as u64);

        let reader = &self.reader;
        let classifier = &self.classifier;
        let mut identified = stream::iter(files.iter())
            .map(|path| async move { (path, classifier.identify(reader, path).await) })
            .buffered(self.config.thread_count.max(1));

        while let Some((path, identities)) = identified.next().await {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled after {} of {} files", stats.total, files.len());
                stats.cancelled = true;
                break;
            }

            let outcome = self.classifier.resolve(path, identities).await;
            outcome.record_into(&mut stats);
            self.progress.file_done(path.clone(), outcome.moved_to().is_some());
        }

        self.progress.emit_progress();
        stats.duration_secs = start_time.elapsed().as_secs_f64();
        info!(
            "Sorted {} files: {} with achievements, {} without, {} not found, {} unreadable, {} moved",
            stats.total,
            stats.with_merit,
            stats.without_merit,
            stats.not_found,
            stats.unreadable,
            stats.moved
        );
        Ok(stats)
    }

    /// Discovery options extended with this run's own output folders
    async fn discovery_options(&self) -> DiscoveryOptions {
        let mut options = self
            .discovery
            .clone()
            .exclude_directory(self.destination_root.join(&self.config.quarantine_dir_name));

        match tokio::fs::read_dir(&self.destination_root).await {
            Ok(mut entries) => {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    let is_platform_dir = is_dir
                        && entry
                            .file_name()
                            .to_string_lossy()
                            .starts_with(&self.config.folder_prefix);
                    if is_platform_dir {
                        options = options.exclude_directory(entry.path());
                    }
                }
            }
            Err(err) => {
                // A destination that does not exist yet holds nothing to exclude
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot list {}: {}", self.destination_root.display(), err);
                }
            }
        }
        options
    }
}

//! Duplicate detection within platform folders.
//!
//! Each folder is scanned flat in lexicographic order. The first file with a
//! given content hash stays; later files with the same hash are moved into a
//! per-folder directory under the quarantine root, never overwriting anything
//! already there.

use crate::classify::{move_file, unique_destination};
use crate::content::ContentReader;
use crate::discovery::discover_roms;
use crate::hash::IdentityComputer;
use crate::models::{
    DedupeRun, DedupeStats, DiscoveryOptions, ErrorKind, ItemError, QuarantinedFile,
};
use crate::sorter::CancelFlag;
use crate::{Config, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Duplicate detector for flat platform folders
pub struct DuplicateDetector {
    reader: Arc<ContentReader>,
    computer: IdentityComputer,
    parallelism: usize,
    cancel: CancelFlag,
}

impl DuplicateDetector {
    pub fn new(reader: Arc<ContentReader>, computer: IdentityComputer) -> Self {
        Self {
            reader,
            computer,
            parallelism: 1,
            cancel: CancelFlag::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            reader: Arc::new(ContentReader::from_config(config)),
            computer: IdentityComputer::new(config.hash_algorithm),
            parallelism: config.thread_count.max(1),
            cancel: CancelFlag::new(),
        }
    }

    /// Number of files read and hashed ahead of the move loop
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for stopping the run between files
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Move every repeated content in `folder` into `quarantine_root/<folder name>/`
    ///
    /// Stops before the next file once the cancel flag is set.
    pub async fn dedupe_folder(
        &self,
        folder: &Path,
        quarantine_root: &Path,
    ) -> Result<DedupeStats> {
        let mut stats = DedupeStats::new(folder.to_path_buf());
        let files = discover_roms(folder, &DiscoveryOptions::default().max_depth(1)).await?;
        let target_dir = quarantine_root.join(stats.folder_name());

        let reader = &self.reader;
        let computer = &self.computer;
        let mut hashed = stream::iter(files.iter())
            .map(|path| async move {
                let hash = reader
                    .read_payload(path)
                    .await
                    .map(|payload| computer.hash(&payload));
                (path, hash)
            })
            .buffered(self.parallelism);

        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        while let Some((path, hash)) = hashed.next().await {
            if self.cancel.is_cancelled() {
                warn!("[{}] Cancelled after {} files", stats.folder_name(), stats.total_files);
                break;
            }
            stats.total_files += 1;
            let item = display_name(path);

            let hash = match hash {
                Ok(hash) => hash,
                Err(err) => {
                    warn!("[{}] Skipping (cannot read): {}: {}", stats.folder_name(), item, err);
                    stats.read_errors += 1;
                    stats.errors.push(ItemError {
                        item,
                        kind: ErrorKind::Unreadable,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let Some(original) = seen.get(&hash) else {
                seen.insert(hash, path.clone());
                stats.unique_files += 1;
                continue;
            };

            let moved: std::io::Result<PathBuf> = async {
                tokio::fs::create_dir_all(&target_dir).await?;
                let destination = unique_destination(&target_dir, Path::new(&item)).await;
                move_file(path, &destination).await.map(|()| destination)
            }
            .await;

            match moved {
                Ok(destination) => {
                    info!(
                        "[{}] Duplicate: {} (same content as {}) -> {}",
                        stats.folder_name(),
                        item,
                        display_name(original),
                        destination.display()
                    );
                    stats.duplicates_moved += 1;
                    stats.quarantined.push(QuarantinedFile {
                        original: original.clone(),
                        source: path.clone(),
                        destination,
                    });
                }
                Err(err) => {
                    warn!("[{}] Failed to quarantine {}: {}", stats.folder_name(), item, err);
                    stats.move_failures += 1;
                    stats.errors.push(ItemError {
                        item,
                        kind: ErrorKind::MoveFailed,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(stats)
    }

    /// Deduplicate every `<prefix>*` folder directly under `base`
    pub async fn dedupe_all(
        &self,
        base: &Path,
        prefix: &str,
        quarantine_root: &Path,
    ) -> Result<DedupeRun> {
        let start_time = Instant::now();
        let mut run = DedupeRun::new(quarantine_root.to_path_buf());

        let folders: Vec<PathBuf> = find_sorted_folders(base, prefix)
            .await?
            .into_iter()
            .filter(|folder| folder != quarantine_root)
            .collect();
        if folders.is_empty() {
            info!("No '{}*' folders found in {}", prefix, base.display());
        }

        for folder in folders {
            if self.cancel.is_cancelled() {
                break;
            }
            let stats = self.dedupe_folder(&folder, quarantine_root).await?;
            info!(
                "Summary for {}: {} files, {} unique, {} duplicates moved, {} read errors",
                stats.folder_name(),
                stats.total_files,
                stats.unique_files,
                stats.duplicates_moved,
                stats.read_errors
            );
            run.folders.push(stats);
        }

        run.cancelled = self.cancel.is_cancelled();
        run.duration_secs = start_time.elapsed().as_secs_f64();
        Ok(run)
    }
}

/// Directories directly under `base` whose name starts with `prefix`, sorted
pub async fn find_sorted_folders(base: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(base).await?;
    let mut folders = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        if is_dir && entry.file_name().to_string_lossy().starts_with(prefix) {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

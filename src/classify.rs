//! ROM classification: resolve identities against the hash library and place the file

use crate::content::ContentReader;
use crate::error::ReadError;
use crate::hash::{IdentityComputer, IdentitySet};
use crate::library::HashLibrary;
use crate::models::{ClassificationResult, ErrorKind, ItemError, Placement, RunStatistics};
use crate::platform::platform_folder;
use crate::{CollisionPolicy, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Payload could not be read; file left in place
    Unreadable(String),
    Classified {
        result: ClassificationResult,
        placement: Placement,
    },
}

/// Per-file outcome together with any warning raised while placing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: Outcome,
    pub warning: Option<ItemError>,
}

impl FileOutcome {
    pub fn result(&self) -> Option<&ClassificationResult> {
        match &self.outcome {
            Outcome::Classified { result, .. } => Some(result),
            Outcome::Unreadable(_) => None,
        }
    }

    pub fn moved_to(&self) -> Option<&PathBuf> {
        match &self.outcome {
            Outcome::Classified { placement, .. } => placement.moved_to(),
            Outcome::Unreadable(_) => None,
        }
    }

    /// Fold this outcome into the run statistics
    pub fn record_into(&self, stats: &mut RunStatistics) {
        let item = file_name(&self.path);
        match &self.outcome {
            Outcome::Unreadable(message) => stats.record_unreadable(&item, message),
            Outcome::Classified { result, placement } => {
                stats.record_result(result);
                if matches!(placement, Placement::Moved(_)) {
                    stats.record_move();
                }
            }
        }
        if let Some(warning) = &self.warning {
            stats.record_error(&warning.item, warning.kind, &warning.message);
        }
    }
}

/// Classifier deciding the destination of each ROM
pub struct Classifier {
    library: Arc<HashLibrary>,
    computer: IdentityComputer,
    destination_root: PathBuf,
    folder_prefix: String,
    collision_policy: CollisionPolicy,
}

impl Classifier {
    pub fn new(library: Arc<HashLibrary>, destination_root: PathBuf, config: &Config) -> Self {
        Self {
            library,
            computer: IdentityComputer::new(config.hash_algorithm),
            destination_root,
            folder_prefix: config.folder_prefix.clone(),
            collision_policy: config.collision_policy,
        }
    }

    /// Read and hash a file. Side-effect free, safe to run concurrently.
    pub async fn identify(
        &self,
        reader: &Arc<ContentReader>,
        path: &Path,
    ) -> Result<IdentitySet, ReadError> {
        let payload = reader.read_payload(path).await?;
        Ok(self.computer.compute_identities(&payload))
    }

    /// Classification decision for a set of identities
    pub fn decide(&self, identities: &IdentitySet) -> ClassificationResult {
        match self.library.lookup(identities) {
            Some(metadata) => ClassificationResult::from_metadata(metadata),
            None => ClassificationResult::NotFound,
        }
    }

    /// Folder a merit-bearing game of this platform belongs in
    pub fn destination_dir(&self, platform: &str) -> Option<PathBuf> {
        platform_folder(platform)
            .map(|folder| self.destination_root.join(format!("{}{}", self.folder_prefix, folder)))
    }

    /// Full classification of one file: read, identify, decide, place
    pub async fn classify(&self, reader: &Arc<ContentReader>, path: &Path) -> FileOutcome {
        let identified = self.identify(reader, path).await;
        self.resolve(path, identified).await
    }

    /// Decide and apply the side effect for an already identified file
    pub async fn resolve(
        &self,
        path: &Path,
        identified: Result<IdentitySet, ReadError>,
    ) -> FileOutcome {
        let identities = match identified {
            Ok(identities) => identities,
            Err(err) => {
                warn!("Cannot read {}: {}", path.display(), err);
                return FileOutcome {
                    path: path.to_path_buf(),
                    outcome: Outcome::Unreadable(err.to_string()),
                    warning: None,
                };
            }
        };

        let result = self.decide(&identities);
        debug!("{} ({}): {:?}", path.display(), identities.primary(), result);

        let (placement, warning) = match &result {
            ClassificationResult::FoundWithMerit { platform, .. } => {
                self.place(path, platform).await
            }
            _ => (Placement::InPlace, None),
        };

        FileOutcome {
            path: path.to_path_buf(),
            outcome: Outcome::Classified { result, placement },
            warning,
        }
    }

    /// Move a merit-bearing file into its platform folder
    async fn place(&self, path: &Path, platform: &str) -> (Placement, Option<ItemError>) {
        let item = file_name(path);

        let Some(target_dir) = self.destination_dir(platform) else {
            warn!("No folder for platform {:?}, leaving {} in place", platform, item);
            return (
                Placement::InPlace,
                Some(ItemError {
                    item,
                    kind: ErrorKind::DestinationUnresolved,
                    message: format!("platform {:?} maps to no folder", platform),
                }),
            );
        };

        let Some(name) = path.file_name() else {
            return (Placement::InPlace, None);
        };
        let mut target = target_dir.join(name);

        if path == target {
            return (Placement::AlreadyPlaced(target), None);
        }

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            match self.collision_policy {
                CollisionPolicy::Refuse => {
                    warn!("{} already exists, leaving {} in place", target.display(), item);
                    return (
                        Placement::InPlace,
                        Some(ItemError {
                            item,
                            kind: ErrorKind::DestinationExists,
                            message: format!("{} already exists", target.display()),
                        }),
                    );
                }
                CollisionPolicy::Rename => {
                    target = unique_destination(&target_dir, Path::new(name)).await;
                }
                CollisionPolicy::Overwrite => {}
            }
        }

        let moved: std::io::Result<()> = async {
            tokio::fs::create_dir_all(&target_dir).await?;
            move_file(path, &target).await
        }
        .await;
        match moved {
            Ok(()) => {
                info!("Moved {} -> {}", item, target.display());
                (Placement::Moved(target), None)
            }
            Err(err) => {
                warn!("Failed to move {}: {}", item, err);
                (
                    Placement::InPlace,
                    Some(ItemError {
                        item,
                        kind: ErrorKind::MoveFailed,
                        message: err.to_string(),
                    }),
                )
            }
        }
    }
}

/// Rename `from` to `to`, falling back to copy and delete across filesystems
pub async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Err(err) if err.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_then_remove(from, to).await
        }
        result => result,
    }
}

/// Copy `from` to `to` and delete `from`. On failure the file exists only at `from`.
async fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    tokio::fs::copy(from, to).await?;
    if let Err(err) = tokio::fs::remove_file(from).await {
        if let Err(cleanup) = tokio::fs::remove_file(to).await {
            warn!("Could not remove partial copy {}: {}", to.display(), cleanup);
        }
        return Err(err);
    }
    Ok(())
}

/// First free `<stem>_dup<N><ext>` path in `dir`, or `dir/name` when that is free
pub async fn unique_destination(dir: &Path, name: &Path) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u64;
    loop {
        let candidate = dir.join(format!("{}_dup{}{}", stem, counter, extension));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        counter += 1;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

//! Data models for ROM identification, sorting, and deduplication

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One game record as it appears in a hash library source file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameRecord {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "ConsoleID", default)]
    pub console_id: Option<u32>,
    #[serde(rename = "ConsoleName", default)]
    pub console_name: String,
    #[serde(rename = "NumAchievements", default)]
    pub num_achievements: Option<u32>,
    #[serde(rename = "Hashes", default)]
    pub hashes: Vec<String>,
}

/// Game metadata stored in the hash library for each hash key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameMetadata {
    /// Game identifier in the reference library
    pub game_id: u64,
    /// Display title
    pub title: String,
    /// Platform / console name
    pub console_name: String,
    /// Platform identifier
    pub console_id: Option<u32>,
    /// Achievement count; zero means nothing is tracked for the game
    pub merit_score: u32,
}

impl From<&GameRecord> for GameMetadata {
    fn from(record: &GameRecord) -> Self {
        Self {
            game_id: record.id,
            title: record.title.clone(),
            console_name: record.console_name.clone(),
            console_id: record.console_id,
            merit_score: record.num_achievements.unwrap_or(0),
        }
    }
}

/// Outcome of resolving a ROM's identity against the hash library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClassificationResult {
    NotFound,
    FoundNoMerit {
        title: String,
    },
    FoundWithMerit {
        title: String,
        platform: String,
        merit_score: u32,
    },
}

impl ClassificationResult {
    /// Build the result for a library hit
    pub fn from_metadata(metadata: &GameMetadata) -> Self {
        if metadata.merit_score == 0 {
            ClassificationResult::FoundNoMerit {
                title: metadata.title.clone(),
            }
        } else {
            ClassificationResult::FoundWithMerit {
                title: metadata.title.clone(),
                platform: metadata.console_name.clone(),
                merit_score: metadata.merit_score,
            }
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, ClassificationResult::NotFound)
    }
}

/// Where a classified file ended up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Placement {
    /// File left at its original path
    InPlace,
    /// File already sits at its destination
    AlreadyPlaced(PathBuf),
    /// File moved to the given path
    Moved(PathBuf),
}

impl Placement {
    pub fn moved_to(&self) -> Option<&PathBuf> {
        match self {
            Placement::Moved(path) => Some(path),
            _ => None,
        }
    }
}

/// Categories of per-item errors and warnings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// File could not be read or its archive could not be extracted
    Unreadable,
    /// A hash library source file was skipped
    LibraryLoad,
    /// Platform name maps to no usable folder
    DestinationUnresolved,
    /// A same-named file already exists at the destination
    DestinationExists,
    /// The move itself failed
    MoveFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Unreadable => "Unreadable File",
            ErrorKind::LibraryLoad => "Hash Library Error",
            ErrorKind::DestinationUnresolved => "Unresolved Destination",
            ErrorKind::DestinationExists => "Destination Exists",
            ErrorKind::MoveFailed => "Move Failed",
        };
        f.write_str(label)
    }
}

/// Error or warning attached to a single item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemError {
    /// File name (or library file name) the error belongs to
    pub item: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Aggregate statistics of a classification run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: u64,
    pub with_merit: u64,
    pub without_merit: u64,
    pub not_found: u64,
    pub unreadable: u64,
    /// Files actually relocated
    pub moved: u64,
    /// Title -> merit score of every merit-bearing item
    pub merit_scores: BTreeMap<String, u32>,
    pub errors: Vec<ItemError>,
    pub error_histogram: BTreeMap<ErrorKind, u64>,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    /// Whether the run stopped early on request
    pub cancelled: bool,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_with_merit(&mut self, title: &str, merit_score: u32) {
        self.total += 1;
        self.with_merit += 1;
        self.merit_scores.insert(title.to_string(), merit_score);
    }

    pub fn record_without_merit(&mut self) {
        self.total += 1;
        self.without_merit += 1;
    }

    pub fn record_not_found(&mut self) {
        self.total += 1;
        self.not_found += 1;
    }

    pub fn record_unreadable(&mut self, item: &str, message: &str) {
        self.total += 1;
        self.unreadable += 1;
        self.record_error(item, ErrorKind::Unreadable, message);
    }

    /// Record the outcome of one classification
    pub fn record_result(&mut self, result: &ClassificationResult) {
        match result {
            ClassificationResult::NotFound => self.record_not_found(),
            ClassificationResult::FoundNoMerit { .. } => self.record_without_merit(),
            ClassificationResult::FoundWithMerit {
                title, merit_score, ..
            } => self.record_with_merit(title, *merit_score),
        }
    }

    pub fn record_move(&mut self) {
        self.moved += 1;
    }

    /// Add an error entry without touching the outcome counters
    pub fn record_error(&mut self, item: &str, kind: ErrorKind, message: &str) {
        self.errors.push(ItemError {
            item: item.to_string(),
            kind,
            message: message.to_string(),
        });
        *self.error_histogram.entry(kind).or_insert(0) += 1;
    }

    /// Processed files that carry an error or placement warning
    pub fn files_with_errors(&self) -> u64 {
        self.errors
            .iter()
            .filter(|error| error.kind != ErrorKind::LibraryLoad)
            .count() as u64
    }

    /// Whether every processed file falls into exactly one outcome bucket
    pub fn is_reconciled(&self) -> bool {
        self.total == self.with_merit + self.without_merit + self.not_found + self.unreadable
    }

    /// Merit-bearing titles sorted by score, highest first
    pub fn merit_ranking(&self) -> Vec<(&str, u32)> {
        let mut ranking: Vec<(&str, u32)> = self
            .merit_scores
            .iter()
            .map(|(title, score)| (title.as_str(), *score))
            .collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranking
    }

    /// Errors grouped by kind, preserving insertion order within a group
    pub fn errors_by_kind(&self) -> BTreeMap<ErrorKind, Vec<&ItemError>> {
        let mut groups: BTreeMap<ErrorKind, Vec<&ItemError>> = BTreeMap::new();
        for error in &self.errors {
            groups.entry(error.kind).or_default().push(error);
        }
        groups
    }

    pub fn percentage(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (count as f64 / self.total as f64) * 100.0
        }
    }
}

/// A duplicate moved into quarantine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuarantinedFile {
    /// First-seen file with the same content
    pub original: PathBuf,
    /// Where the duplicate was
    pub source: PathBuf,
    /// Where it was moved to
    pub destination: PathBuf,
}

/// Deduplication statistics for one folder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupeStats {
    pub folder: PathBuf,
    pub total_files: u64,
    pub unique_files: u64,
    pub duplicates_moved: u64,
    pub read_errors: u64,
    pub move_failures: u64,
    pub quarantined: Vec<QuarantinedFile>,
    pub errors: Vec<ItemError>,
}

impl DedupeStats {
    pub fn new(folder: PathBuf) -> Self {
        Self {
            folder,
            ..Self::default()
        }
    }

    /// Folder name used in report lines
    pub fn folder_name(&self) -> String {
        self.folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.display().to_string())
    }
}

/// Totals across all deduplicated folders
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DedupeTotals {
    pub folders_processed: u64,
    pub total_files: u64,
    pub unique_files: u64,
    pub duplicates_moved: u64,
    pub read_errors: u64,
    pub move_failures: u64,
}

/// Result of deduplicating every platform folder under a base directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupeRun {
    pub quarantine_root: PathBuf,
    pub folders: Vec<DedupeStats>,
    pub duration_secs: f64,
    /// Whether the run stopped early on request
    pub cancelled: bool,
}

impl DedupeRun {
    pub fn new(quarantine_root: PathBuf) -> Self {
        Self {
            quarantine_root,
            ..Self::default()
        }
    }

    pub fn totals(&self) -> DedupeTotals {
        self.folders
            .iter()
            .fold(DedupeTotals::default(), |mut totals, stats| {
                totals.folders_processed += 1;
                totals.total_files += stats.total_files;
                totals.unique_files += stats.unique_files;
                totals.duplicates_moved += stats.duplicates_moved;
                totals.read_errors += stats.read_errors;
                totals.move_failures += stats.move_failures;
                totals
            })
    }
}

/// Options for ROM discovery
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Glob patterns to exclude (matched against full path and file name)
    pub exclude_patterns: Vec<String>,
    /// Directories excluded together with everything below them
    pub exclude_directories: Vec<PathBuf>,
    /// File extensions to include (if specified, only these extensions are considered)
    pub include_extensions: Vec<String>,
    /// File extensions to skip
    pub exclude_extensions: Vec<String>,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Maximum depth to traverse
    pub max_depth: Option<usize>,
}

impl DiscoveryOptions {
    /// Add multiple glob patterns to exclude
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns.extend(patterns.into_iter().map(|p| p.into()));
        self
    }

    /// Exclude a directory tree
    pub fn exclude_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.exclude_directories.push(directory.into());
        self
    }

    /// Add multiple file extensions to include
    pub fn include_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_extensions
            .extend(extensions.into_iter().map(|e| e.into()));
        self
    }

    /// Add multiple file extensions to exclude
    pub fn exclude_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_extensions
            .extend(extensions.into_iter().map(|e| e.into()));
        self
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Progress information for an ongoing run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub files_processed: u64,
    pub total_files: u64,
    pub current_file: Option<PathBuf>,
    pub files_moved: u64,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate progress percentage
    pub fn progress_percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.files_processed as f64 / self.total_files as f64) * 100.0
        }
    }
}

//! Hash library: content hash -> game metadata, merged from per-platform source files

use crate::error::LibraryError;
use crate::hash::IdentitySet;
use crate::models::{ErrorKind, GameMetadata, GameRecord, ItemError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summary of a library load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    /// Source files that contributed records
    pub files_loaded: Vec<PathBuf>,
    /// Source files skipped as malformed
    pub skipped: Vec<ItemError>,
    pub games_loaded: u64,
    /// Keys already present when a later record declared them
    pub collisions: u64,
}

/// In-memory mapping from lowercase content hash to game metadata.
///
/// Immutable once loaded, so it can be shared across tasks without locking.
#[derive(Debug, Clone, Default)]
pub struct HashLibrary {
    entries: HashMap<String, GameMetadata>,
}

impl HashLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` source file in `dir`, in file-name order.
    ///
    /// Malformed files are skipped with a warning. Fails only when the directory
    /// is missing or none of its files could be used.
    pub fn load_dir(dir: &Path) -> Result<(Self, LoadReport), LibraryError> {
        if !dir.is_dir() {
            return Err(LibraryError::MissingDirectory(dir.to_path_buf()));
        }
        let sources = list_sources(dir)?;
        let (library, report) = Self::load(&sources);
        if report.files_loaded.is_empty() {
            return Err(LibraryError::NoUsableSources(dir.to_path_buf()));
        }
        info!(
            "Loaded hash library: {} hashes from {} files ({} skipped)",
            library.len(),
            report.files_loaded.len(),
            report.skipped.len()
        );
        Ok((library, report))
    }

    /// Load the given source files in order into a fresh library
    pub fn load(sources: &[PathBuf]) -> (Self, LoadReport) {
        let mut library = Self::new();
        let mut report = LoadReport::default();

        for source in sources {
            match read_records(source) {
                Ok(records) => {
                    for record in &records {
                        report.collisions += library.insert_record(record);
                    }
                    report.games_loaded += records.len() as u64;
                    report.files_loaded.push(source.clone());
                    debug!("Loaded {} games from {}", records.len(), source.display());
                }
                Err(err) => {
                    warn!("Skipping hash library file {}: {}", source.display(), err);
                    report.skipped.push(ItemError {
                        item: file_label(source),
                        kind: ErrorKind::LibraryLoad,
                        message: err.to_string(),
                    });
                }
            }
        }

        (library, report)
    }

    /// Insert every hash of a record; returns how many keys were already taken
    pub fn insert_record(&mut self, record: &GameRecord) -> u64 {
        let metadata = GameMetadata::from(record);
        let mut collisions = 0;
        for hash in &record.hashes {
            let key = hash.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if self.entries.contains_key(&key) {
                collisions += 1;
                continue;
            }
            self.entries.insert(key, metadata.clone());
        }
        collisions
    }

    /// First entry matching any identity, in identity order
    pub fn lookup(&self, identities: &IdentitySet) -> Option<&GameMetadata> {
        identities.iter().find_map(|hash| self.get(hash))
    }

    pub fn get(&self, hash: &str) -> Option<&GameMetadata> {
        self.entries.get(&hash.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merged hash -> game id lookup file consumed by other tooling
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergedLookup {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "MD5List")]
    pub md5_list: BTreeMap<String, u64>,
}

/// Counters from one merge pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeStats {
    pub files_merged: u64,
    pub games_processed: u64,
    pub hashes_added: u64,
    pub collisions: u64,
    pub skipped: Vec<ItemError>,
}

impl MergedLookup {
    /// Append the records of every source; existing keys are never overwritten
    pub fn merge_sources(&mut self, sources: &[PathBuf]) -> MergeStats {
        let mut stats = MergeStats::default();

        for source in sources {
            let records = match read_records(source) {
                Ok(records) => records,
                Err(err) => {
                    warn!("Skipping hash library file {}: {}", source.display(), err);
                    stats.skipped.push(ItemError {
                        item: file_label(source),
                        kind: ErrorKind::LibraryLoad,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for record in &records {
                let (added, collided) = self.merge_record(record);
                stats.hashes_added += added;
                stats.collisions += collided;
            }
            stats.games_processed += records.len() as u64;
            stats.files_merged += 1;
        }

        self.success = true;
        stats
    }

    /// Returns (keys added, keys already present)
    pub fn merge_record(&mut self, record: &GameRecord) -> (u64, u64) {
        let mut added = 0;
        let mut collided = 0;
        for hash in &record.hashes {
            let key = hash.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if self.md5_list.contains_key(&key) {
                collided += 1;
            } else {
                self.md5_list.insert(key, record.id);
                added += 1;
            }
        }
        (added, collided)
    }

    /// Read an existing lookup file, or start empty when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, LibraryError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), LibraryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Merge every source in `library_dir` into the lookup file at `output`
pub fn merge_library_dir(library_dir: &Path, output: &Path) -> Result<MergeStats, LibraryError> {
    if !library_dir.is_dir() {
        return Err(LibraryError::MissingDirectory(library_dir.to_path_buf()));
    }
    let sources = list_sources(library_dir)?;
    let mut lookup = MergedLookup::load_or_default(output)?;
    let stats = lookup.merge_sources(&sources);
    if stats.files_merged == 0 {
        return Err(LibraryError::NoUsableSources(library_dir.to_path_buf()));
    }
    lookup.save(output)?;
    info!(
        "Merged {} games from {} files: {} hashes added, {} collisions",
        stats.games_processed, stats.files_merged, stats.hashes_added, stats.collisions
    );
    Ok(stats)
}

/// `*.json` files directly inside `dir`, sorted by file name
pub fn list_sources(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
        })
        .collect();
    sources.sort();
    Ok(sources)
}

fn read_records(path: &Path) -> Result<Vec<GameRecord>, LibraryError> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|err| LibraryError::Malformed {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::IdentityComputer;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn record(id: u64, title: &str, merit: u32, hashes: &[&str]) -> GameRecord {
        GameRecord {
            id,
            title: title.to_string(),
            console_id: Some(7),
            console_name: "NES/Famicom".to_string(),
            num_achievements: Some(merit),
            hashes: hashes.iter().map(|h| h.to_string()).collect(),
        }
    }

    fn write_source(dir: &Path, name: &str, records: &[GameRecord]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string(records).unwrap()).unwrap();
        path
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Keys are stored lowercase and found regardless of query case
        #[test]
        fn test_lookup_is_case_insensitive(hash in "[0-9a-fA-F]{32}") {
            let mut library = HashLibrary::new();
            library.insert_record(&record(1, "Game", 3, &[hash.as_str()]));

            prop_assert!(library.get(&hash.to_lowercase()).is_some());
            prop_assert!(library.get(&hash.to_uppercase()).is_some());
        }

        /// Re-merging the same records adds nothing and counts every key as a collision
        #[test]
        fn test_merge_is_idempotent(
            hashes in prop::collection::btree_set("[0-9a-f]{32}", 1..20)
        ) {
            let hashes: Vec<&str> = hashes.iter().map(String::as_str).collect();
            let game = record(9, "Game", 1, &hashes);
            let mut lookup = MergedLookup::default();

            let (added, collided) = lookup.merge_record(&game);
            prop_assert_eq!(added, hashes.len() as u64);
            prop_assert_eq!(collided, 0);

            let snapshot = lookup.clone();
            let (added, collided) = lookup.merge_record(&game);
            prop_assert_eq!(added, 0);
            prop_assert_eq!(collided, hashes.len() as u64);
            prop_assert_eq!(lookup, snapshot);
        }
    }

    #[test]
    fn test_lookup_returns_first_matching_identity() {
        let computer = IdentityComputer::default();
        let mut payload = crate::hash::HEADER_SIGNATURE.to_vec();
        payload.resize(crate::hash::HEADER_SIZE, 0);
        payload.extend_from_slice(b"body");
        let identities = computer.compute_identities(&payload);

        let full = computer.hash(&payload);
        let headerless = computer.hash(b"body");

        let mut library = HashLibrary::new();
        library.insert_record(&record(1, "Headerless", 1, &[headerless.as_str()]));
        assert_eq!(library.lookup(&identities).unwrap().title, "Headerless");

        library.insert_record(&record(2, "Full", 1, &[full.as_str()]));
        assert_eq!(library.lookup(&identities).unwrap().title, "Full");
    }

    #[test]
    fn test_lookup_miss() {
        let library = HashLibrary::new();
        let identities = IdentityComputer::default().compute_identities(b"nothing");
        assert!(library.lookup(&identities).is_none());
    }

    #[test]
    fn test_load_dir_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        write_source(dir.path(), "all-fc.json", &[record(1, "Game X", 42, &["DEADBEEF"])]);
        fs::write(dir.path().join("all-gba.json"), b"{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let (library, report) = HashLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(report.files_loaded.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].item, "all-gba.json");
        assert_eq!(library.get("deadbeef").unwrap().merit_score, 42);
    }

    #[test]
    fn test_load_dir_first_writer_wins() {
        let dir = TempDir::new().unwrap();
        write_source(dir.path(), "a.json", &[record(1, "First", 5, &["aa"])]);
        write_source(dir.path(), "b.json", &[record(2, "Second", 9, &["AA", "bb"])]);

        let (library, report) = HashLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.get("aa").unwrap().title, "First");
        assert_eq!(library.get("bb").unwrap().title, "Second");
        assert_eq!(report.collisions, 1);
    }

    #[test]
    fn test_load_dir_missing_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = HashLibrary::load_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, LibraryError::MissingDirectory(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_load_dir_without_usable_files_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), b"[{\"ID\": \"x\"}]").unwrap();

        let err = HashLibrary::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LibraryError::NoUsableSources(_)));
    }

    #[test]
    fn test_merge_keeps_preexisting_entry() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("data").join("0_hashlibrary.json");

        let mut existing = MergedLookup::default();
        existing.success = true;
        existing.md5_list.insert("deadbeef".to_string(), 100);
        existing.save(&output).unwrap();

        let sources = dir.path().join("sources");
        fs::create_dir(&sources).unwrap();
        write_source(&sources, "all-fc.json", &[record(200, "Other", 1, &["DEADBEEF", "cafe"])]);

        let stats = merge_library_dir(&sources, &output).unwrap();
        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.hashes_added, 1);

        let merged = MergedLookup::load_or_default(&output).unwrap();
        assert!(merged.success);
        assert_eq!(merged.md5_list["deadbeef"], 100);
        assert_eq!(merged.md5_list["cafe"], 200);
    }

    #[test]
    fn test_merged_lookup_format() {
        let mut lookup = MergedLookup::default();
        lookup.merge_record(&record(3, "Game", 0, &["ABC"]));
        lookup.success = true;

        let json: serde_json::Value = serde_json::to_value(&lookup).unwrap();
        assert_eq!(json["Success"], true);
        assert_eq!(json["MD5List"]["abc"], 3);
    }
}

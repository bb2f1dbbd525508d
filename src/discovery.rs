//! ROM discovery: walk a source tree and list candidate files in sorted order

use crate::{models::DiscoveryOptions, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Directory walker collecting ROM candidates
pub struct RomWalker {
    patterns: Vec<Pattern>,
    /// Errors encountered during traversal
    errors: Vec<String>,
}

impl RomWalker {
    /// Create a walker; invalid glob patterns are dropped with a warning
    pub fn new(options: &DiscoveryOptions) -> Self {
        let patterns = options
            .exclude_patterns
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern) {
                Ok(p) => Some(p),
                Err(err) => {
                    warn!("Ignoring invalid exclude pattern {:?}: {}", pattern, err);
                    None
                }
            })
            .collect();
        Self {
            patterns,
            errors: Vec::new(),
        }
    }

    /// Walk `root` and return matching files sorted by path
    pub fn walk(&mut self, root: &Path, options: &DiscoveryOptions) -> Vec<PathBuf> {
        let mut walker = WalkDir::new(root).follow_links(options.follow_symlinks);
        if let Some(max_depth) = options.max_depth {
            walker = walker.max_depth(max_depth);
        }

        let mut files = Vec::new();
        let iter = walker
            .into_iter()
            .filter_entry(|entry| !is_excluded_dir(entry, &options.exclude_directories));

        for entry in iter {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_candidate(entry.path(), options) {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    warn!("Error walking directory: {}", err);
                    self.errors.push(err.to_string());
                }
            }
        }

        files.sort();
        files
    }

    fn is_candidate(&self, path: &Path, options: &DiscoveryOptions) -> bool {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        if !options.include_extensions.is_empty() {
            let included = extension.as_deref().map_or(false, |ext| {
                options
                    .include_extensions
                    .iter()
                    .any(|inc| normalize_ext(inc) == ext)
            });
            if !included {
                return false;
            }
        }

        if let Some(ext) = extension.as_deref() {
            if options
                .exclude_extensions
                .iter()
                .any(|exc| normalize_ext(exc) == ext)
            {
                return false;
            }
        }

        !self.matches_exclude_patterns(path)
    }

    fn matches_exclude_patterns(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.patterns
            .iter()
            .any(|pattern| pattern.matches(&path_str) || pattern.matches(&file_name))
    }

    /// Errors encountered during traversal
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn is_excluded_dir(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    entry.file_type().is_dir() && excluded.iter().any(|dir| entry.path() == dir.as_path())
}

/// Discover ROM files under `root` on the blocking pool
pub async fn discover_roms(root: &Path, options: &DiscoveryOptions) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    let options = options.clone();
    let files = tokio::task::spawn_blocking(move || {
        let mut walker = RomWalker::new(&options);
        walker.walk(&root, &options)
    })
    .await?;
    Ok(files)
}

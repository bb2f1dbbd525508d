//! ROM Sorter
//!
//! Identifies game ROM files by content rather than by name, resolves them against a
//! hash library of game metadata, sorts files that carry achievements into per-platform
//! folders, and moves duplicate content into a quarantine folder.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod classify;
pub mod content;
pub mod discovery;
pub mod duplicate;
pub mod error;
pub mod hash;
pub mod library;
pub mod models;
pub mod platform;
pub mod progress;
pub mod report;
pub mod sorter;

pub use classify::Classifier;
pub use content::ContentReader;
pub use duplicate::DuplicateDetector;
pub use error::{LibraryError, ReadError};
pub use hash::{IdentityComputer, IdentitySet};
pub use library::HashLibrary;
pub use models::*;
pub use sorter::{CancelFlag, Sorter};

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of files read and hashed concurrently
    pub thread_count: usize,
    /// Hash algorithm to use
    pub hash_algorithm: HashAlgorithm,
    /// Largest payload (plain file or archive member) that will be read
    pub max_payload_bytes: u64,
    /// Time allowed for reading a single file
    pub read_timeout: Duration,
    /// What to do when the destination of a move already exists
    pub collision_policy: CollisionPolicy,
    /// Prefix of platform folders, also used to find folders to deduplicate
    pub folder_prefix: String,
    /// Name of the folder duplicates are moved into
    pub quarantine_dir_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_count: num_cpus::get(),
            hash_algorithm: HashAlgorithm::Md5,
            max_payload_bytes: 512 * 1024 * 1024, // 512MB
            read_timeout: Duration::from_secs(60),
            collision_policy: CollisionPolicy::Refuse,
            folder_prefix: "sorted_".to_string(),
            quarantine_dir_name: "duplicates".to_string(),
        }
    }
}

/// Hash algorithm options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Md5 => write!(f, "md5"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Handling of a same-named file at a move destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Leave the source file where it is
    Refuse,
    /// Move under a `_dup<N>` suffixed name
    Rename,
    /// Replace the existing file
    Overwrite,
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionPolicy::Refuse => write!(f, "refuse"),
            CollisionPolicy::Rename => write!(f, "rename"),
            CollisionPolicy::Overwrite => write!(f, "overwrite"),
        }
    }
}

//! Payload extraction for ROM files, unwrapping one level of archive container

use crate::error::ReadError;
use crate::Config;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// ROM extensions preferred when picking an archive member, in priority order
pub const PRIORITY_EXTENSIONS: &[&str] = &[
    "gba", "gbc", "gb", "nes", "fds", "sfc", "smc", "n64", "z64", "v64", "md", "gen", "smd",
    "sms", "gg", "pce", "a26", "lnx", "ngp", "ngc", "nds", "32x", "ws", "wsc", "vb",
];

/// Rule used to pick one member out of an archive's entry names
pub enum MemberRule {
    /// First entry whose extension matches, case-insensitively
    Extension(String),
    /// First entry accepted by the predicate
    Predicate(Box<dyn Fn(&str) -> bool + Send + Sync>),
    /// First entry in enumeration order
    First,
}

impl MemberRule {
    fn matches(&self, name: &str) -> bool {
        match self {
            MemberRule::Extension(ext) => Path::new(name)
                .extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
                .unwrap_or(false),
            MemberRule::Predicate(predicate) => predicate(name),
            MemberRule::First => true,
        }
    }
}

impl std::fmt::Debug for MemberRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRule::Extension(ext) => write!(f, "Extension({})", ext),
            MemberRule::Predicate(_) => write!(f, "Predicate"),
            MemberRule::First => write!(f, "First"),
        }
    }
}

/// Ordered list of member rules; the first rule with a match decides
#[derive(Debug)]
pub struct MemberSelector {
    rules: Vec<MemberRule>,
}

impl MemberSelector {
    pub fn new(rules: Vec<MemberRule>) -> Self {
        Self { rules }
    }

    /// Index into `names` of the member to extract
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Option<usize> {
        self.rules.iter().find_map(|rule| {
            names
                .iter()
                .position(|name| rule.matches(name.as_ref()))
        })
    }
}

impl Default for MemberSelector {
    /// Priority ROM extensions first, then the first entry
    fn default() -> Self {
        let mut rules: Vec<MemberRule> = PRIORITY_EXTENSIONS
            .iter()
            .map(|ext| MemberRule::Extension(ext.to_string()))
            .collect();
        rules.push(MemberRule::First);
        Self { rules }
    }
}

/// A container format that can be unwrapped to a single payload
pub trait ContainerFormat: Send + Sync {
    /// Whether the path looks like this container
    fn matches(&self, path: &Path) -> bool;

    /// Read the selected member's bytes
    fn extract(
        &self,
        path: &Path,
        selector: &MemberSelector,
        max_bytes: u64,
    ) -> Result<Vec<u8>, ReadError>;
}

/// Zip archives
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipContainer;

impl ContainerFormat for ZipContainer {
    fn matches(&self, path: &Path) -> bool {
        has_extension(path, "zip")
    }

    fn extract(
        &self,
        path: &Path,
        selector: &MemberSelector,
        max_bytes: u64,
    ) -> Result<Vec<u8>, ReadError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))?;

        // (archive index, name) of every file entry. Raw access lists members
        // that are encrypted or use a compression method this build lacks.
        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            if !entry.is_dir() {
                entries.push((index, entry.name().to_string()));
            }
        }
        if entries.is_empty() {
            return Err(ReadError::EmptyArchive);
        }

        let names: Vec<&str> = entries.iter().map(|(_, name)| name.as_str()).collect();
        let chosen = selector.select(&names).ok_or(ReadError::EmptyArchive)?;
        let entry = archive.by_index(entries[chosen].0)?;

        if entry.size() > max_bytes {
            return Err(ReadError::TooLarge {
                size: entry.size(),
                limit: max_bytes,
            });
        }

        read_capped(entry, max_bytes)
    }
}

/// Reader that turns a ROM file into its canonical payload
pub struct ContentReader {
    containers: Vec<Box<dyn ContainerFormat>>,
    selector: MemberSelector,
    max_payload_bytes: u64,
    read_timeout: Duration,
}

impl ContentReader {
    /// Create a reader that understands zip archives
    pub fn new(max_payload_bytes: u64, read_timeout: Duration) -> Self {
        Self {
            containers: vec![Box::new(ZipContainer)],
            selector: MemberSelector::default(),
            max_payload_bytes,
            read_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_payload_bytes, config.read_timeout)
    }

    /// Register an additional container format
    pub fn with_container(mut self, container: Box<dyn ContainerFormat>) -> Self {
        self.containers.push(container);
        self
    }

    /// Replace the archive member selection rules
    pub fn with_selector(mut self, selector: MemberSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Read the payload synchronously
    pub fn read_payload_blocking(&self, path: &Path) -> Result<Vec<u8>, ReadError> {
        if let Some(container) = self.containers.iter().find(|c| c.matches(path)) {
            return container.extract(path, &self.selector, self.max_payload_bytes);
        }

        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size > self.max_payload_bytes {
            return Err(ReadError::TooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }
        read_capped(BufReader::new(file), self.max_payload_bytes)
    }

    /// Read the payload on the blocking pool, bounded by the read timeout
    pub async fn read_payload(self: &Arc<Self>, path: &Path) -> Result<Vec<u8>, ReadError> {
        let reader = Arc::clone(self);
        let owned = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || reader.read_payload_blocking(&owned));

        match tokio::time::timeout(self.read_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ReadError::Task(join_err.to_string())),
            Err(_) => Err(ReadError::Timeout(self.read_timeout)),
        }
    }
}

impl Default for ContentReader {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Read to the end, failing once more than `max_bytes` have been produced
fn read_capped<R: Read>(reader: R, max_bytes: u64) -> Result<Vec<u8>, ReadError> {
    let mut data = Vec::new();
    reader.take(max_bytes.saturating_add(1)).read_to_end(&mut data)?;
    if data.len() as u64 > max_bytes {
        return Err(ReadError::TooLarge {
            size: data.len() as u64,
            limit: max_bytes,
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::unstable::write::FileOptionsExt;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_selector_prefers_priority_extension() {
        let selector = MemberSelector::default();
        let names = ["readme.txt", "game.GBA", "other.nes"];
        assert_eq!(selector.select(&names), Some(1));
    }

    #[test]
    fn test_selector_priority_order_beats_entry_order() {
        let selector = MemberSelector::default();
        // "gba" ranks above "nes" regardless of entry order
        let names = ["game.nes", "game.gba"];
        assert_eq!(selector.select(&names), Some(1));
    }

    #[test]
    fn test_selector_falls_back_to_first() {
        let selector = MemberSelector::default();
        assert_eq!(selector.select(&["a.bin", "b.txt"]), Some(0));
        assert_eq!(selector.select::<&str>(&[]), None);
    }

    #[test]
    fn test_custom_predicate_rule() {
        let selector = MemberSelector::new(vec![MemberRule::Predicate(Box::new(|name| {
            name.contains("(USA)")
        }))]);
        assert_eq!(selector.select(&["x (EU).bin", "x (USA).bin"]), Some(1));
        assert_eq!(selector.select(&["x (EU).bin"]), None);
    }

    #[test]
    fn test_plain_file_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.gba");
        std::fs::write(&path, b"plain rom data").unwrap();

        let reader = ContentReader::default();
        assert_eq!(reader.read_payload_blocking(&path).unwrap(), b"plain rom data");
    }

    #[test]
    fn test_zip_member_selection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.zip");
        write_zip(
            &path,
            &[("info.txt", &b"not a rom"[..]), ("game.sfc", &b"snes rom"[..])],
        );

        let reader = ContentReader::default();
        assert_eq!(reader.read_payload_blocking(&path).unwrap(), b"snes rom");
    }

    #[test]
    fn test_zip_uppercase_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("GAME.ZIP");
        write_zip(&path, &[("rom.bin", &b"bytes"[..])]);

        let reader = ContentReader::default();
        assert_eq!(reader.read_payload_blocking(&path).unwrap(), b"bytes");
    }

    #[test]
    fn test_empty_zip_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.zip");
        write_zip(&path, &[]);

        let reader = ContentReader::default();
        assert!(matches!(
            reader.read_payload_blocking(&path),
            Err(ReadError::EmptyArchive)
        ));
    }

    #[test]
    fn test_corrupt_zip_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let reader = ContentReader::default();
        assert!(reader.read_payload_blocking(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let reader = ContentReader::default();
        assert!(matches!(
            reader.read_payload_blocking(&dir.path().join("nope.gba")),
            Err(ReadError::Io(_))
        ));
    }

    #[test]
    fn test_size_cap() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("big.gba");
        std::fs::write(&plain, vec![0u8; 64]).unwrap();
        let zipped = dir.path().join("big.zip");
        write_zip(&zipped, &[("big.gba", &[0u8; 64][..])]);

        let reader = ContentReader::new(32, Duration::from_secs(5));
        assert!(matches!(
            reader.read_payload_blocking(&plain),
            Err(ReadError::TooLarge { size: 64, limit: 32 })
        ));
        assert!(matches!(
            reader.read_payload_blocking(&zipped),
            Err(ReadError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_encrypted_side_entry_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file(
                "readme.txt",
                SimpleFileOptions::default().with_deprecated_encryption(b"secret"),
            )
            .unwrap();
        writer.write_all(b"locked notes").unwrap();
        writer
            .start_file("game.gba", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"plain gba rom").unwrap();
        writer.finish().unwrap();

        let payload = ContentReader::default().read_payload_blocking(&path).unwrap();
        assert_eq!(payload, b"plain gba rom");
    }

    /// Container that takes longer than any sensible read timeout
    struct SlowContainer(Duration);

    impl ContainerFormat for SlowContainer {
        fn matches(&self, path: &Path) -> bool {
            has_extension(path, "slow")
        }

        fn extract(&self, _: &Path, _: &MemberSelector, _: u64) -> Result<Vec<u8>, ReadError> {
            std::thread::sleep(self.0);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.slow");
        std::fs::write(&path, b"slow").unwrap();

        let timeout = Duration::from_millis(20);
        let reader = Arc::new(
            ContentReader::new(1024, timeout)
                .with_container(Box::new(SlowContainer(Duration::from_millis(300)))),
        );
        let result = reader.read_payload(&path).await;
        assert!(matches!(result, Err(ReadError::Timeout(limit)) if limit == timeout));
    }

    #[tokio::test]
    async fn test_async_read_matches_blocking() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game.zip");
        write_zip(&path, &[("game.gb", &b"gameboy"[..])]);

        let reader = Arc::new(ContentReader::default());
        let payload = reader.read_payload(&path).await.unwrap();
        assert_eq!(payload, reader.read_payload_blocking(&path).unwrap());
    }
}

//! Report generation for sort and dedupe runs

use crate::models::{DedupeRun, RunStatistics};
use crate::Result;
use std::path::Path;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Configuration for report formatting
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Whether to list each error under its kind
    pub include_errors: bool,
    /// Whether to list each quarantined file in dedupe reports
    pub include_details: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_errors: true,
            include_details: true,
        }
    }
}

const RULE: &str = "------------------------------";

/// Generator for run reports
pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            config: ReportConfig::default(),
        }
    }

    pub fn with_config(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Report for a sort run
    pub fn generate_run_report(
        &self,
        stats: &RunStatistics,
        format: OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(stats)?),
            OutputFormat::Text => Ok(self.run_text(stats)),
        }
    }

    /// Report for a dedupe run
    pub fn generate_dedupe_report(&self, run: &DedupeRun, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "quarantine_root": run.quarantine_root,
                    "duration_secs": run.duration_secs,
                    "cancelled": run.cancelled,
                    "overall": run.totals(),
                    "folders": run.folders,
                });
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Text => Ok(self.dedupe_text(run)),
        }
    }

    fn run_text(&self, stats: &RunStatistics) -> String {
        let banner = "=".repeat(50);
        let mut report = String::new();

        report.push_str(&format!("\n{}\n", banner));
        report.push_str("SORTING COMPLETE - SUMMARY REPORT\n");
        report.push_str(&format!("{}\n", banner));
        if stats.cancelled {
            report.push_str("\nRun was cancelled before all files were processed\n");
        }
        report.push_str(&format!("\nProcessing Duration: {:.2} seconds\n", stats.duration_secs));
        report.push_str(&format!("\nTotal ROMs processed: {}\n", stats.total));
        report.push_str(&format!("ROMs with achievements: {}\n", stats.with_merit));
        report.push_str(&format!("ROMs without achievements: {}\n", stats.without_merit));
        report.push_str(&format!("ROMs not found in hash library: {}\n", stats.not_found));
        report.push_str(&format!("Unreadable ROMs: {}\n", stats.unreadable));
        report.push_str(&format!("ROMs moved: {}\n", stats.moved));

        let ranking = stats.merit_ranking();
        if !ranking.is_empty() {
            report.push_str(&format!("\nGames with achievements:\n{}\n", RULE));
            for (title, score) in ranking {
                report.push_str(&format!("{}: {} achievements\n", title, score));
            }
        }

        if !stats.error_histogram.is_empty() {
            report.push_str(&format!("\nError Summary:\n{}\n", RULE));
            for (kind, count) in &stats.error_histogram {
                report.push_str(&format!("{}: {} occurrences\n", kind, count));
            }
        }

        if self.config.include_errors && !stats.errors.is_empty() {
            report.push_str(&format!("\nDetailed Errors:\n{}\n", RULE));
            for (kind, errors) in stats.errors_by_kind() {
                report.push_str(&format!("\n{}:\n", kind));
                for error in errors {
                    report.push_str(&format!("  - {}: {}\n", error.item, error.message));
                }
            }
        }

        if stats.total > 0 {
            report.push_str(&format!("\nStatistics:\n{}\n", RULE));
            report.push_str(&format!(
                "ROMs with achievements: {:.2}%\n",
                stats.percentage(stats.with_merit)
            ));
            report.push_str(&format!(
                "ROMs with errors: {:.2}%\n",
                stats.percentage(stats.files_with_errors())
            ));
            report.push_str(&format!(
                "ROMs not found: {:.2}%\n",
                stats.percentage(stats.not_found)
            ));
        }

        report
    }

    fn dedupe_text(&self, run: &DedupeRun) -> String {
        let mut report = String::new();

        if run.cancelled {
            report.push_str("Run was cancelled before all folders were processed\n\n");
        }
        if run.folders.is_empty() {
            report.push_str("No platform folders found.\n");
        }

        for stats in &run.folders {
            let name = stats.folder_name();
            report.push_str(&format!("=== {} ===\n", name));
            if self.config.include_details {
                for quarantined in &stats.quarantined {
                    report.push_str(&format!(
                        "[{}] Duplicate: {} (same content as {}) -> moved to {}\n",
                        name,
                        file_name(&quarantined.source),
                        file_name(&quarantined.original),
                        quarantined.destination.display()
                    ));
                }
            }
            if self.config.include_errors {
                for error in &stats.errors {
                    report.push_str(&format!(
                        "[{}] {}: {}: {}\n",
                        name, error.kind, error.item, error.message
                    ));
                }
            }
            report.push_str(&format!(
                "Summary for {}: {} files, {} unique, {} duplicates moved, {} read errors\n\n",
                name,
                stats.total_files,
                stats.unique_files,
                stats.duplicates_moved,
                stats.read_errors
            ));
        }

        let totals = run.totals();
        report.push_str("=== Overall summary ===\n");
        report.push_str(&format!("Folders processed       : {}\n", totals.folders_processed));
        report.push_str(&format!("Total files scanned     : {}\n", totals.total_files));
        report.push_str(&format!("Unique files kept       : {}\n", totals.unique_files));
        report.push_str(&format!("Duplicates moved        : {}\n", totals.duplicates_moved));
        report.push_str(&format!("Files with read errors  : {}\n", totals.read_errors));
        if totals.move_failures > 0 {
            report.push_str(&format!("Failed moves            : {}\n", totals.move_failures));
        }
        report.push_str(&format!(
            "\nDuplicates are stored under: {}\n",
            run.quarantine_root.display()
        ));

        report
    }

    /// Write a report to `path`, creating parent directories
    pub async fn save_to_file(&self, content: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DedupeStats, ErrorKind, QuarantinedFile};
    use std::path::PathBuf;

    fn sample_stats() -> RunStatistics {
        let mut stats = RunStatistics::new();
        stats.record_with_merit("Low Game", 3);
        stats.record_with_merit("High Game", 80);
        stats.record_move();
        stats.record_without_merit();
        stats.record_not_found();
        stats.record_unreadable("broken.zip", "corrupt archive");
        stats.record_error("Game.nes", ErrorKind::DestinationExists, "already exists");
        stats.duration_secs = 1.5;
        stats
    }

    #[test]
    fn test_run_text_report() {
        let report = ReportGenerator::new()
            .generate_run_report(&sample_stats(), OutputFormat::Text)
            .unwrap();

        assert!(report.contains("SORTING COMPLETE - SUMMARY REPORT"));
        assert!(report.contains("Processing Duration: 1.50 seconds"));
        assert!(report.contains("Total ROMs processed: 5"));
        assert!(report.contains("ROMs not found in hash library: 1"));
        assert!(report.contains("Unreadable File: 1 occurrences"));
        assert!(report.contains("  - broken.zip: corrupt archive"));
        assert!(report.contains("ROMs with achievements: 40.00%"));

        // Highest merit first
        let high = report.find("High Game: 80 achievements").unwrap();
        let low = report.find("Low Game: 3 achievements").unwrap();
        assert!(high < low);
    }

    #[test]
    fn test_run_report_without_errors() {
        let generator = ReportGenerator::with_config(ReportConfig {
            include_errors: false,
            ..ReportConfig::default()
        });
        let report = generator
            .generate_run_report(&sample_stats(), OutputFormat::Text)
            .unwrap();

        assert!(report.contains("Error Summary"));
        assert!(!report.contains("Detailed Errors"));
        assert!(!report.contains("corrupt archive"));
    }

    #[test]
    fn test_empty_run_has_no_percentages() {
        let report = ReportGenerator::new()
            .generate_run_report(&RunStatistics::new(), OutputFormat::Text)
            .unwrap();
        assert!(report.contains("Total ROMs processed: 0"));
        assert!(!report.contains("Statistics:"));
    }

    #[test]
    fn test_run_json_report() {
        let report = ReportGenerator::new()
            .generate_run_report(&sample_stats(), OutputFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["total"], 5);
        assert_eq!(value["merit_scores"]["High Game"], 80);
    }

    #[test]
    fn test_dedupe_reports() {
        let mut stats = DedupeStats::new(PathBuf::from("/roms/sorted_NES"));
        stats.total_files = 3;
        stats.unique_files = 2;
        stats.duplicates_moved = 1;
        stats.quarantined.push(QuarantinedFile {
            original: PathBuf::from("/roms/sorted_NES/A.nes"),
            source: PathBuf::from("/roms/sorted_NES/C.nes"),
            destination: PathBuf::from("/roms/duplicates/sorted_NES/C.nes"),
        });
        let mut run = DedupeRun::new(PathBuf::from("/roms/duplicates"));
        run.folders.push(stats);

        let generator = ReportGenerator::new();
        let text = generator.generate_dedupe_report(&run, OutputFormat::Text).unwrap();
        assert!(text.contains("=== sorted_NES ==="));
        assert!(text.contains("Duplicate: C.nes (same content as A.nes)"));
        assert!(text.contains(
            "Summary for sorted_NES: 3 files, 2 unique, 1 duplicates moved, 0 read errors"
        ));
        assert!(!text.contains("cancelled"));
        assert!(text.contains("Folders processed       : 1"));

        let json = generator.generate_dedupe_report(&run, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["overall"]["duplicates_moved"], 1);
        assert_eq!(value["folders"][0]["unique_files"], 2);
    }

    #[test]
    fn test_error_percentage_ignores_library_warnings() {
        let mut stats = RunStatistics::new();
        stats.record_not_found();
        for i in 0..3 {
            stats.record_error(&format!("lib{}.json", i), ErrorKind::LibraryLoad, "bad json");
        }
        stats.record_error("rom.gba", ErrorKind::MoveFailed, "denied");

        let report = ReportGenerator::new()
            .generate_run_report(&stats, OutputFormat::Text)
            .unwrap();
        assert!(report.contains("ROMs with errors: 100.00%"));
        assert!(report.contains("Hash Library Error: 3 occurrences"));
    }

    #[test]
    fn test_cancelled_dedupe_report() {
        let mut run = DedupeRun::new(PathBuf::from("/roms/duplicates"));
        run.cancelled = true;

        let generator = ReportGenerator::new();
        let text = generator.generate_dedupe_report(&run, OutputFormat::Text).unwrap();
        assert!(text.starts_with("Run was cancelled"));
        assert!(text.contains("Folders processed       : 0"));

        let json = generator.generate_dedupe_report(&run, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cancelled"], true);
    }

    #[tokio::test]
    async fn test_save_to_file() {
        let generator = ReportGenerator::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("reports").join("sorting_report.txt");

        generator.save_to_file("report body", &file_path).await.unwrap();

        let saved = tokio::fs::read_to_string(&file_path).await.unwrap();
        assert_eq!(saved, "report body");
    }
}

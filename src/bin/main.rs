//! CLI entry point for the ROM sorter

use clap::{Parser, Subcommand, ValueEnum};
use rom_sorter::duplicate::DuplicateDetector;
use rom_sorter::library::merge_library_dir;
use rom_sorter::report::{OutputFormat as ReportOutputFormat, ReportGenerator};
use rom_sorter::sorter::CancelFlag;
use rom_sorter::{
    CollisionPolicy, Config, DiscoveryOptions, HashAlgorithm, HashLibrary, Result, Sorter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "rom-sorter")]
#[command(about = "Identify ROMs by content and sort the ones with achievements by platform")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify ROMs against a hash library and move those with achievements
    Sort {
        /// Directory holding the ROMs to sort
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Directory of per-platform hash library files
        #[arg(short, long, value_name = "DIR")]
        library: PathBuf,

        /// Where platform folders are created (default: SOURCE)
        #[arg(short, long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// What to do when the destination file already exists
        #[arg(long, value_enum, default_value_t = CollisionArg::Refuse)]
        on_collision: CollisionArg,

        /// Hash algorithm used for identities
        #[arg(long, value_enum, default_value_t = HashAlgorithmArg::Md5)]
        hash: HashAlgorithmArg,

        /// Number of files read concurrently (default: number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Include only these file extensions (can be specified multiple times)
        #[arg(long, value_name = "EXT")]
        include_ext: Vec<String>,

        /// Exclude patterns (glob patterns, can be specified multiple times)
        #[arg(short, long, value_name = "PATTERN")]
        exclude: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Output file path (if not specified, output goes to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Move duplicate ROMs out of platform folders into a quarantine folder
    Dedupe {
        /// Directory containing the platform folders
        #[arg(value_name = "BASE")]
        base: PathBuf,

        /// Quarantine folder (default: BASE/duplicates)
        #[arg(short, long, value_name = "DIR")]
        quarantine: Option<PathBuf>,

        /// Prefix of the folders to deduplicate
        #[arg(long, default_value = "sorted_")]
        prefix: String,

        /// Hash algorithm used to compare contents
        #[arg(long, value_enum, default_value_t = HashAlgorithmArg::Md5)]
        hash: HashAlgorithmArg,

        /// Number of files read concurrently (default: number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Merge hash library files into a single hash -> game id lookup file
    Merge {
        #[arg(value_name = "LIBRARY_DIR")]
        library_dir: PathBuf,

        /// Lookup file to create or extend
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HashAlgorithmArg {
    /// MD5, the format hash libraries are published in
    Md5,
    Sha256,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollisionArg {
    /// Leave the file where it is
    Refuse,
    /// Move under a _dup<N> suffixed name
    Rename,
    /// Replace the existing file
    Overwrite,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sort {
            source,
            library,
            dest,
            on_collision,
            hash,
            threads,
            include_ext,
            exclude,
            format,
            output,
            verbose,
        } => {
            init_tracing(verbose);

            let mut config = Config::default();
            config.hash_algorithm = hash.into();
            config.collision_policy = on_collision.into();
            apply_threads(&mut config, threads);

            let (hash_library, load_report) = match HashLibrary::load_dir(&library) {
                Ok(loaded) => loaded,
                Err(err) => {
                    eprintln!("Error: Cannot load hash library: {}", err);
                    std::process::exit(1);
                }
            };

            let discovery_options = DiscoveryOptions::default()
                .include_extensions(include_ext)
                .exclude_patterns(exclude);
            let destination = dest.unwrap_or_else(|| source.clone());

            println!("Sorting ROMs in: {:?}", source);
            println!("Configuration:");
            println!("  Hash library: {} hashes", hash_library.len());
            println!("  Destination: {:?}", destination);
            println!("  Hash algorithm: {}", config.hash_algorithm);
            println!("  On collision: {}", config.collision_policy);
            println!("  Threads: {}", config.thread_count);
            if !discovery_options.include_extensions.is_empty() {
                println!("  Include extensions: {:?}", discovery_options.include_extensions);
            }
            if !discovery_options.exclude_patterns.is_empty() {
                println!("  Exclude patterns: {:?}", discovery_options.exclude_patterns);
            }
            println!();

            let sorter = Sorter::new(Arc::new(hash_library), destination, config)
                .with_discovery_options(discovery_options)
                .with_load_report(load_report);
            cancel_on_ctrl_c(sorter.cancel_flag());

            let progress_task = verbose.then(|| {
                let mut events = sorter.progress().subscribe();
                tokio::spawn(async move {
                    while let Ok(event) = events.recv().await {
                        let progress = event.progress;
                        info!(
                            "Progress: {}/{} ({:.1}%), {} moved",
                            progress.files_processed,
                            progress.total_files,
                            progress.progress_percentage(),
                            progress.files_moved
                        );
                    }
                })
            });

            let stats = match sorter.run(&source).await {
                Ok(stats) => stats,
                Err(err) => {
                    eprintln!("Sort failed: {}", err);
                    std::process::exit(1);
                }
            };
            if let Some(task) = progress_task {
                task.abort();
            }

            let report_generator = ReportGenerator::new();
            let report = report_generator.generate_run_report(&stats, format.into())?;
            emit_report(&report_generator, &report, output.as_deref()).await?;

            if stats.cancelled {
                std::process::exit(130);
            }
        }

        Commands::Dedupe {
            base,
            quarantine,
            prefix,
            hash,
            threads,
            format,
            output,
            verbose,
        } => {
            init_tracing(verbose);

            let mut config = Config {
                folder_prefix: prefix,
                hash_algorithm: hash.into(),
                ..Config::default()
            };
            apply_threads(&mut config, threads);
            let quarantine_root =
                quarantine.unwrap_or_else(|| base.join(&config.quarantine_dir_name));

            println!("Deduplicating '{}*' folders in: {:?}", config.folder_prefix, base);
            println!("Duplicates go to: {:?}", quarantine_root);
            println!("  Hash algorithm: {}", config.hash_algorithm);
            println!("  Threads: {}", config.thread_count);
            println!();

            let detector = DuplicateDetector::from_config(&config);
            cancel_on_ctrl_c(detector.cancel_flag());

            let run = match detector
                .dedupe_all(&base, &config.folder_prefix, &quarantine_root)
                .await
            {
                Ok(run) => run,
                Err(err) => {
                    eprintln!("Dedupe failed: {}", err);
                    std::process::exit(1);
                }
            };

            let report_generator = ReportGenerator::new();
            let report = report_generator.generate_dedupe_report(&run, format.into())?;
            emit_report(&report_generator, &report, output.as_deref()).await?;

            if run.cancelled {
                std::process::exit(130);
            }
        }

        Commands::Merge { library_dir, output } => {
            init_tracing(false);

            let stats = match merge_library_dir(&library_dir, &output) {
                Ok(stats) => stats,
                Err(err) => {
                    eprintln!("Error: Merge failed: {}", err);
                    std::process::exit(1);
                }
            };

            println!("Merged {} library files into {:?}", stats.files_merged, output);
            println!("  Games processed: {}", stats.games_processed);
            println!("  Hashes added: {}", stats.hashes_added);
            println!("  Collisions (kept existing): {}", stats.collisions);
            for skipped in &stats.skipped {
                println!("  Skipped {}: {}", skipped.item, skipped.message);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

/// Override the default thread count, rejecting zero
fn apply_threads(config: &mut Config, threads: Option<usize>) {
    if let Some(thread_count) = threads {
        if thread_count == 0 {
            eprintln!("Error: Thread count must be greater than 0");
            std::process::exit(1);
        }
        config.thread_count = thread_count;
    }
}

/// Request cooperative cancellation on the first Ctrl-C
fn cancel_on_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nReceived interrupt signal, stopping after the current file...");
            cancel.cancel();
        }
    });
}

async fn emit_report(
    generator: &ReportGenerator,
    report: &str,
    output: Option<&Path>,
) -> Result<()> {
    match output {
        Some(path) => {
            generator
                .save_to_file(report, path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to save report to {:?}: {}", path, e))?;
            println!("Report saved to: {:?}", path);
        }
        None => println!("{}", report),
    }
    Ok(())
}

impl From<OutputFormat> for ReportOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportOutputFormat::Text,
            OutputFormat::Json => ReportOutputFormat::Json,
        }
    }
}

impl From<HashAlgorithmArg> for HashAlgorithm {
    fn from(arg: HashAlgorithmArg) -> Self {
        match arg {
            HashAlgorithmArg::Md5 => HashAlgorithm::Md5,
            HashAlgorithmArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Refuse => CollisionPolicy::Refuse,
            CollisionArg::Rename => CollisionPolicy::Rename,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dedupe_accepts_hash_and_threads() {
        let cli = Cli::try_parse_from([
            "rom-sorter",
            "dedupe",
            "/roms",
            "--hash",
            "sha256",
            "--threads",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Dedupe { hash, threads, .. } => {
                assert_eq!(HashAlgorithm::from(hash), HashAlgorithm::Sha256);
                assert_eq!(threads, Some(3));
            }
            _ => panic!("expected the dedupe subcommand"),
        }
    }
}

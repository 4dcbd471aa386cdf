use anyhow::Context;
use clap::{Parser, Subcommand};
use contentpack_build::{BuildConfig, Builder, UnpackOptions};
use contentpack_common::Category;
use contentpack_config::{Archive, ChecksumOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contentpack", about = "Compile and decompile content definitions")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root containing contentpack.json and the data directories
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack config sources into client and server archives
    Pack {
        /// Categories to pack; all stale categories when omitted
        categories: Vec<Category>,
        /// Rebuild even if outputs are up to date
        #[arg(short, long)]
        force: bool,
        /// Fail on checksum mismatches
        #[arg(short, long)]
        strict: bool,
    },
    /// Decode archives back into source text
    Unpack {
        category: Category,
        /// Directory holding client/ and server/ archives
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Review against the packed output archives
        #[arg(short, long)]
        compare: bool,
        /// Rename placeholder model files after the records using them
        #[arg(long)]
        rename_models: bool,
        /// Output text file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify archives against the manifest and checksums
    Validate {
        /// Categories to validate; every config category when omitted
        categories: Vec<Category>,
    },
    /// Print registry sizes and archive checksums
    Info,
}

fn describe(outcome: ChecksumOutcome) -> String {
    match outcome {
        ChecksumOutcome::Matched(crc) => format!("{crc:#010x} ok"),
        ChecksumOutcome::Unfrozen(crc) => format!("{crc:#010x} (not frozen)"),
        ChecksumOutcome::Tolerated { expected, actual } => {
            format!("{actual:#010x} MISMATCH (expected {expected:#010x})")
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = BuildConfig::load(&cli.root)
        .with_context(|| format!("loading config from {}", cli.root.display()))?;

    match cli.command {
        Commands::Pack {
            categories,
            force,
            strict,
        } => {
            config.force |= force;
            config.strict |= strict;
            let mut builder = Builder::new(config)?;
            if categories.is_empty() {
                let summary = builder.pack_all()?;
                for report in &summary.packed {
                    println!("{}: {} records, crc {}", report.category, report.records, describe(report.checksum));
                }
                if !summary.skipped.is_empty() {
                    let skipped: Vec<&str> = summary.skipped.iter().map(|c| c.name()).collect();
                    println!("up to date: {}", skipped.join(", "));
                }
            } else {
                for category in categories {
                    let report = builder
                        .pack(category)
                        .with_context(|| format!("packing {category}"))?;
                    println!("{}: {} records, crc {}", report.category, report.records, describe(report.checksum));
                }
            }
        }
        Commands::Unpack {
            category,
            input,
            compare,
            rename_models,
            output,
        } => {
            let mut builder = Builder::new(config)?;
            let report = builder
                .unpack(
                    category,
                    &UnpackOptions {
                        input,
                        compare,
                        rename_models,
                        output,
                    },
                )
                .with_context(|| format!("unpacking {category}"))?;
            println!(
                "{}: {} records -> {} ({} to review, {} appended, {} models renamed)",
                report.category,
                report.records,
                report.output.display(),
                report.reviews,
                report.appended,
                report.renamed
            );
        }
        Commands::Validate { categories } => {
            let builder = Builder::new(config)?;
            let categories = if categories.is_empty() {
                Category::CONFIGS.to_vec()
            } else {
                categories
            };
            for category in categories {
                let report = builder
                    .validate(category)
                    .with_context(|| format!("validating {category}"))?;
                println!("{}: {} records, crc {}", report.category, report.records, describe(report.checksum));
            }
        }
        Commands::Info => {
            println!("contentpack v{}", env!("CARGO_PKG_VERSION"));
            let builder = Builder::new(config)?;
            let layout = &builder.config().layout;
            for category in Category::ALL {
                let registry = builder.registries().get(category);
                let archive = if category.is_config() && Archive::exists(&layout.client, category) {
                    let client = Archive::load(&layout.client, category)?;
                    format!(", client {} records crc {:#010x}", client.len(), client.crc32())
                } else {
                    String::new()
                };
                println!(
                    "{category}: {} names, next id {}{archive}",
                    registry.len(),
                    registry.next_id()
                );
            }
        }
    }

    Ok(())
}

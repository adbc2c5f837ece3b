use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use fwinspect::commands::{
    decompress_command, default_config_command, extract_metadata_command, inspect_command,
    InspectOptions,
};
use fwinspect::init_tracing;

/// Firmware image inspection CLI.
///
/// This CLI is a thin wrapper around `fwinspect-core` (exposed in code as `fwinspect_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "fwinspect",
    version,
    about = "Inspect flashed firmware images and their ELF companions",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConfigFormat {
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect a firmware image.
    ///
    /// Reports section usage, the vector table, keyword strings, MD5/SHA-256
    /// digests and flash utilisation.
    Inspect {
        /// Path to the raw firmware image (e.g. build/Pixhawk1/bin/arducopter.bin).
        image: PathBuf,

        /// Optional ELF (or PE) the image was built from, for measured section sizes.
        #[arg(long)]
        elf: Option<PathBuf>,

        /// Inspection config file (.json, .yaml or .yml).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flash capacity of the target board in bytes. Defaults to 2 MiB.
        #[arg(long)]
        flash_size: Option<u64>,

        /// RAM usage (bytes) assumed when no ELF is given. Defaults to 64 KiB.
        #[arg(long)]
        ram_estimate: Option<u64>,

        /// Maximum matches kept per string category.
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum printable run length treated as a string.
        #[arg(long)]
        min_len: Option<usize>,

        /// Also scan for GPS coordinates and location parameters.
        #[arg(long, default_value_t = false)]
        locations: bool,

        /// Treat the image as a zlib stream and inspect its inflated contents.
        #[arg(long, default_value_t = false, conflicts_with = "bundle")]
        zlib: bool,

        /// Treat the image as a .px4/.apj bundle and inspect the firmware in
        /// its metadata `image` field.
        #[arg(long, default_value_t = false)]
        bundle: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Inflate a zlib-compressed firmware file.
    Decompress {
        /// Compressed input file.
        input: PathBuf,

        /// Output path. Defaults to `<stem>_decompressed.bin` next to the input.
        output: Option<PathBuf>,
    },

    /// Write the payloads embedded in a .px4/.apj metadata block to files.
    ///
    /// `image` becomes firmware.bin, XML payloads are decoded and inflated,
    /// and the remaining fields go to metadata.json.
    ExtractMetadata {
        /// Firmware or bundle file carrying the JSON metadata.
        input: PathBuf,

        /// Output directory. Defaults to `extracted`.
        output_dir: Option<PathBuf>,
    },

    /// Print the default inspection config.
    DefaultConfig {
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Inspect {
            image,
            elf,
            config,
            flash_size,
            ram_estimate,
            limit,
            min_len,
            locations,
            zlib,
            bundle,
            json,
        } => inspect_command(&InspectOptions {
            image,
            elf,
            config,
            flash_size,
            ram_estimate,
            limit,
            min_len,
            locations,
            zlib,
            bundle,
            json,
        })?,
        Command::Decompress { input, output } => {
            decompress_command(&input, output.as_deref())?;
        }
        Command::ExtractMetadata { input, output_dir } => {
            extract_metadata_command(&input, output_dir.as_deref())?;
        }
        Command::DefaultConfig { format } => {
            let format = match format {
                ConfigFormat::Json => "json",
                ConfigFormat::Yaml => "yaml",
            };
            default_config_command(format)?
        }
    }

    Ok(())
}

//! fetal-seg command line
//!
//! Segments fetal brain MRI volumes with a trained 2D DynUNet.
//!
//! # Usage
//!
//! ## Explicit files
//! ```bash
//! fetal-seg segment --in-files sub01/image/case_reo/t2.nii.gz --config-file config.yml \
//!     --default-model models/dynunet.onnx
//! ```
//!
//! ## Directory walk
//! ```bash
//! fetal-seg batch --input-dir /data/image --config-file config.yml --output json
//! ```
//!
//! ## Network schedule
//! ```bash
//! fetal-seg topology --config-file config.yml
//! ```

mod cli;
mod options;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fetal-seg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetal brain MRI segmentation with a 2D DynUNet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How results are printed to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Flags shared by every command that runs the network.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// YAML configuration of the trained network
    #[arg(long = "config-file", env = "FETAL_SEG_CONFIG")]
    pub config_file: PathBuf,

    /// Write masks to OUT_FOLDER/<stem>/<stem>_<postfix><ext> instead of
    /// substituting `image` with `mask` in the input path
    #[arg(long = "out-folder")]
    pub out_folder: Option<PathBuf>,

    /// Postfix appended to output file stems
    #[arg(long = "out-postfix")]
    pub out_postfix: Option<String>,

    /// ONNX model used when the config says `model_to_load: default`
    #[arg(long = "default-model", env = "FETAL_SEG_DEFAULT_MODEL")]
    pub default_model: Option<PathBuf>,

    /// Device to use (cpu, cuda, cuda:0, etc.)
    #[arg(long, env = "FETAL_SEG_DEVICE")]
    pub device: Option<String>,

    /// Stop at the first failing case
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "pretty")]
    pub output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment the listed files
    Segment {
        /// Input NIfTI volumes
        #[arg(long = "in-files", num_args = 1.., required = true)]
        in_files: Vec<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Segment every NIfTI file under a directory that has no mask yet
    Batch {
        /// Root of the input tree
        #[arg(long = "input-dir", env = "FETAL_SEG_INPUT_DIR")]
        input_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the kernel and stride schedule derived from the config
    Topology {
        /// YAML configuration of the trained network
        #[arg(long = "config-file", env = "FETAL_SEG_CONFIG")]
        config_file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "pretty")]
        output: OutputFormat,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fetal_seg::utils::init_tracing();

    let cli = Cli::parse();

    let success = match cli.command {
        Commands::Segment { in_files, run } => cli::segment_files(&in_files, &run)?,
        Commands::Batch { input_dir, run } => cli::segment_directory(&input_dir, &run)?,
        Commands::Topology {
            config_file,
            output,
        } => {
            cli::print_topology(&config_file, output)?;
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

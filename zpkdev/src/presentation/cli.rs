use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use zpk_core::StorageFormat;

#[derive(Parser)]
#[command(author, version, about = "zpkdev: package conformance CLI", long_about = None)]
pub struct Cli {
    /// Loader configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Source selection shared by every reading command.
#[derive(Args, Clone, Debug)]
pub struct OpenArgs {
    /// Path or file: URL of the package
    pub url: String,
    /// Declared storage format (zip, ofopxml, package). Defaults to the config value.
    #[arg(long)]
    pub format: Option<StorageFormat>,
    /// Fall back to the repair scanner when the package is malformed
    #[arg(long)]
    pub repair: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a package and report whether it conforms
    Check {
        #[command(flatten)]
        open: OpenArgs,
    },
    /// List entries
    List {
        #[command(flatten)]
        open: OpenArgs,
    },
    /// Decode every entry and print content digests
    Verify {
        #[command(flatten)]
        open: OpenArgs,
    },
    /// Stream one entry to stdout
    Cat {
        #[command(flatten)]
        open: OpenArgs,
        entry: String,
    },
    /// Extract every entry below a directory
    Extract {
        #[command(flatten)]
        open: OpenArgs,
        dest: PathBuf,
    },
    /// Pack inputs into a new archive
    Pack {
        out: PathBuf,
        inputs: Vec<PathBuf>,

        #[arg(long, default_value = "zip")]
        format: StorageFormat,

        #[arg(long)]
        deterministic: bool,

        /// Only compress when it saves at least this fraction
        #[arg(long, default_value_t = 0.05)]
        min_gain: f32,

        /// Deflate level 0-9
        #[arg(long, default_value_t = 6)]
        level: u32,

        /// Content of the mimetype entry for --format package
        #[arg(long)]
        mimetype: Option<String>,
    },
}

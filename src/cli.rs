use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Bundle directory. Defaults to the configured bundle path.
    #[clap(short, long, global = true)]
    pub bundle: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed a catalog and save it as a bundle
    Build {
        /// Catalog file (.csv with a header row, or .json array)
        #[clap(short, long)]
        catalog: PathBuf,
    },

    /// Recommend titles similar to a catalog title
    Title {
        /// Title to look up (case-insensitive)
        title: String,

        /// Number of recommendations
        #[clap(short)]
        k: Option<usize>,
    },

    /// Recommend titles whose synopsis matches free text
    Synopsis {
        /// Plot description to match against
        text: String,

        /// Number of recommendations
        #[clap(short)]
        k: Option<usize>,
    },

    /// Print bundle and model information
    Info {},
}

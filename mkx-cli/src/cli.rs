use std::path::PathBuf;

use clap::Parser;
use mkx_engine::{ExtractConfig, TrackSpec};

/// Extract tracks from Matroska files into other files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Matroska file to read
    pub input: PathBuf,

    /// Tracks to extract, as TID:output
    #[arg(required = true, value_name = "TID:OUTPUT")]
    pub tracks: Vec<TrackSpec>,

    /// Also write a cue sheet from the chapters and tags next to each output
    #[arg(short, long)]
    pub cuesheet: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub config: ExtractConfig,
}

impl Args {
    /// The requested tracks with the global options applied.
    pub fn track_specs(&self) -> Vec<TrackSpec> {
        self.tracks
            .iter()
            .cloned()
            .map(|spec| spec.with_cuesheet(self.cuesheet))
            .collect()
    }
}

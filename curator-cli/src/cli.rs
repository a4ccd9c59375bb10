// curator-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use curator_core::library::{EpisodeTarget, MovieTarget, episode_path, movie_path};
use curator_core::{FieldOrder, ResolutionTier, TranscodeOptions};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Curator: media ingestion and transcode planning",
    long_about = "Inspects source files, plans crop/scale/deinterlace and audio \
                  normalisation, and encodes them to MP4 via curator-core."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML config file overriding the planner defaults
    #[arg(short, long, global = true, value_name = "FILE", env = "CURATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probes a file and prints its transcode plan without encoding
    Plan(PlanArgs),
    /// Plans, encodes and verifies one or more files
    Process(ProcessArgs),
}

/// Per-file target policy flags shared by both subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Scale down to this height tier (1080, 720 or 480)
    #[arg(long, value_name = "HEIGHT")]
    pub max_height: Option<u32>,

    /// Remove letterbox/pillarbox bars found by cropdetect
    #[arg(long)]
    pub crop: bool,

    /// Deinterlace sources detected as interlaced
    #[arg(long)]
    pub deinterlace: bool,

    /// Skip field-order detection and assume this order (tff, bff, progressive)
    #[arg(long, value_name = "ORDER", requires = "deinterlace")]
    pub field_order: Option<FieldOrder>,

    /// Keep the non-default audio tracks as well
    #[arg(long)]
    pub keep_other_audio: bool,
}

impl PolicyArgs {
    pub fn to_options(&self) -> TranscodeOptions {
        TranscodeOptions {
            allow_crop: self.crop,
            max_height: self.max_height,
            deinterlace: self.deinterlace,
            forced_field_order: self.field_order,
            keep_other_audio: self.keep_other_audio,
        }
    }
}

/// Where the file would be filed in the media-server library.
#[derive(Args, Debug, Clone, Default)]
pub struct LibraryArgs {
    /// Library root the destination path is built under
    #[arg(long, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Movie title
    #[arg(long, requires_all = ["library", "year"], conflicts_with = "show")]
    pub title: Option<String>,

    /// Movie release year
    #[arg(long, requires = "title")]
    pub year: Option<i32>,

    /// Collection folder the movie is grouped under
    #[arg(long, requires = "title")]
    pub collection: Option<String>,

    /// Append the output resolution tier to the movie file name
    #[arg(long, requires = "title")]
    pub tier_suffix: bool,

    /// TV show name
    #[arg(long, requires_all = ["library", "season", "episode", "episode_name"])]
    pub show: Option<String>,

    /// Season number (0 for specials)
    #[arg(long, requires = "show")]
    pub season: Option<u32>,

    #[arg(long, requires = "show")]
    pub episode: Option<u32>,

    #[arg(long, requires = "show", value_name = "NAME")]
    pub episode_name: Option<String>,
}

impl LibraryArgs {
    /// Library destination for a file of the given output tier, if enough
    /// naming details were supplied.
    pub fn destination(&self, tier: ResolutionTier) -> Option<PathBuf> {
        let root = self.library.as_deref()?;
        if let (Some(title), Some(year)) = (self.title.as_deref(), self.year) {
            let movie = MovieTarget {
                title,
                year,
                collection: self.collection.as_deref(),
                tier: self.tier_suffix.then_some(tier),
            };
            return Some(movie_path(root, &movie));
        }
        if let (Some(show), Some(season), Some(episode), Some(name)) = (
            self.show.as_deref(),
            self.season,
            self.episode,
            self.episode_name.as_deref(),
        ) {
            let target = EpisodeTarget {
                show,
                season,
                episode,
                name,
            };
            return Some(episode_path(root, &target));
        }
        None
    }
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Source media file
    #[arg(required = true, value_name = "INPUT")]
    pub input: PathBuf,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub library: LibraryArgs,

    /// Print the plan and the assembled commands as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Source media files
    #[arg(required = true, num_args = 1.., value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Directory the encoded MP4 files are written to
    #[arg(short, long, required = true, value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Override the number of concurrent encodes
    #[arg(short = 'j', long, value_name = "COUNT", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
}

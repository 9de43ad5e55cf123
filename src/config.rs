use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Merge COCO json / CVAT xml annotation exports into one corpus and split it
/// into train/val/test sets.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merge annotation exports into a single COCO file
    Unite(UniteArgs),
    /// Filter categories and split a COCO file into train/val/test
    Split(SplitArgs),
    /// Unite, then split, in one go
    Run(RunArgs),
    /// Print image, annotation and per-category counts of COCO files
    Stats(StatsArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct UniteArgs {
    /// Annotation files (.json or .xml) or directories containing them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path of the united COCO json file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Ordered target categories; defaults to every source category
    #[arg(short = 'c', long = "categories", value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Directory holding the image files referenced by the annotations
    #[arg(short = 'i', long = "images")]
    pub images: Option<PathBuf>,

    /// Where to move images without annotations [default: <images>/not_in_annotations]
    #[arg(long = "quarantine", conflicts_with = "no_quarantine")]
    pub quarantine: Option<PathBuf>,

    /// Delete images without annotations instead of quarantining them
    #[arg(long = "no_quarantine")]
    pub no_quarantine: bool,

    /// Number of threads used to read annotation files (0 = one per core)
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,
}

impl UniteArgs {
    pub fn quarantine_dir(&self) -> Option<PathBuf> {
        if self.no_quarantine {
            return None;
        }
        self.quarantine.clone().or_else(|| {
            self.images
                .as_ref()
                .map(|images| images.join("not_in_annotations"))
        })
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SplitOptions {
    /// Split ratios as `train val [test]`
    #[arg(
        long = "split",
        num_args = 2..=3,
        default_values_t = [0.8, 0.1, 0.1],
        value_parser = validate_ratio
    )]
    pub ratios: Vec<f64>,

    /// Seed for the image shuffle
    #[arg(long = "seed", default_value_t = 1337)]
    pub seed: u64,

    /// Drop categories with fewer annotations than this before splitting
    #[arg(long = "min_count", default_value_t = 0)]
    pub min_count: usize,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SplitArgs {
    /// United COCO json file
    pub input: PathBuf,

    /// Directory receiving train.json, val.json and test.json
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: PathBuf,

    /// Copy each partition's images from this directory into <output_dir>/images/<split>
    #[arg(short = 'i', long = "images")]
    pub images: Option<PathBuf>,

    #[command(flatten)]
    pub options: SplitOptions,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub unite: UniteArgs,

    /// Directory receiving train.json, val.json and test.json
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Copy each partition's images into <output_dir>/images/<split>
    #[arg(long = "copy_images", requires = "images")]
    pub copy_images: bool,

    #[command(flatten)]
    pub options: SplitOptions,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatsArgs {
    /// COCO json files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Print the counts as json on stdout
    #[arg(long = "json")]
    pub json: bool,
}

// Validate that a single ratio is between 0.0 and 1.0
pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}

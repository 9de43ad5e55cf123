//! End-to-end drivers behind the command line
//!
//! Stages always run in the same order: normalize, merge, prune, then
//! category selection and split. Category selection sees the whole united
//! corpus, never a single partition.

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::coco::AnnotationSet;
use crate::config::{RunArgs, SplitArgs, SplitOptions, StatsArgs, UniteArgs};
use crate::error::{Error, Result};
use crate::io::{read_annotation_set, write_annotation_set};
use crate::merge::{default_target_categories, merge, MergeReport};
use crate::normalize::{discover_sources, load_sources, NormalizeReport};
use crate::prune::{prune, PruneReport};
use crate::select::select_categories;
use crate::split::{copy_partition_images, split, validate_ratios, write_partitions, Partition};
use crate::stats::{print_stats, stats};

/// Everything that was skipped, dropped or removed while uniting
#[derive(Debug, Default, Clone)]
pub struct UniteReport {
    pub files_found: usize,
    pub files_failed: usize,
    pub skipped_elements: NormalizeReport,
    pub target_categories: Vec<String>,
    pub merge: MergeReport,
    pub prune: PruneReport,
}

impl UniteReport {
    pub fn print_summary(&self) {
        info!("=== Unite Summary ===");
        info!(
            "Annotation files: {} found, {} failed",
            self.files_found, self.files_failed
        );
        info!("Target categories: {}", self.target_categories.join(", "));
        if self.skipped_elements.skipped() > 0 {
            warn!(
                "Shapes skipped while reading: {} unknown label, {} malformed, {} not polygons",
                self.skipped_elements.unknown_category,
                self.skipped_elements.malformed,
                self.skipped_elements.unsupported_shape
            );
        }
        self.merge.print_summary();
        self.prune.print_summary();
    }
}

/// Merge already-normalized sets and prune the result.
pub fn unite_sets(
    sets: &[AnnotationSet],
    target_categories: &[String],
    image_root: Option<&Path>,
    quarantine: Option<&Path>,
) -> (AnnotationSet, MergeReport, PruneReport) {
    let (merged, merge_report) = merge(sets, target_categories, image_root);
    let (pruned, prune_report) = prune(merged, image_root, quarantine);
    (pruned, merge_report, prune_report)
}

/// Load every input, merge and prune. Nothing is written.
pub fn unite(args: &UniteArgs) -> Result<(AnnotationSet, UniteReport)> {
    let paths = discover_sources(&args.inputs)?;
    let mut loaded = load_sources(&paths, args.workers);
    if loaded.sources.is_empty() {
        if !loaded.failures.is_empty() {
            return Err(loaded.failures.swap_remove(0).1);
        }
        warn!("No annotation files to unite");
    }

    let sets: Vec<AnnotationSet> = loaded.sources.iter().map(|s| s.set.clone()).collect();
    let target_categories = if args.categories.is_empty() {
        default_target_categories(&sets)
    } else {
        args.categories.clone()
    };

    let quarantine = args.quarantine_dir();
    let (set, merge_report, prune_report) = unite_sets(
        &sets,
        &target_categories,
        args.images.as_deref(),
        quarantine.as_deref(),
    );

    let report = UniteReport {
        files_found: paths.len(),
        files_failed: loaded.failures.len(),
        skipped_elements: loaded.skipped_elements(),
        target_categories,
        merge: merge_report,
        prune: prune_report,
    };
    Ok((set, report))
}

/// Category selection, in-memory pruning and the split itself.
///
/// Ratios are checked before any work is done.
pub fn prepare_partitions(set: &AnnotationSet, options: &SplitOptions) -> Result<Vec<AnnotationSet>> {
    validate_ratios(&options.ratios)?;

    let (selected, _) = select_categories(set, options.min_count);
    let (selected, prune_report) = prune(selected, None, None);
    if prune_report.removed_images() > 0 {
        info!(
            "{} images left without annotations after category selection",
            prune_report.removed_images()
        );
    }
    print_stats("Selected corpus", &stats(&selected));

    let partitions = split(&selected, &options.ratios, options.seed)?;
    for (partition, kind) in partitions.iter().zip(Partition::ALL) {
        print_stats(kind.name(), &stats(partition));
    }
    Ok(partitions)
}

fn write_split(
    set: &AnnotationSet,
    options: &SplitOptions,
    output_dir: &Path,
    image_root: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let partitions = prepare_partitions(set, options)?;
    let paths = write_partitions(&partitions, output_dir)?;
    if let Some(root) = image_root {
        copy_partition_images(&partitions, root, output_dir)?;
    }
    Ok(paths)
}

pub fn run_unite(args: &UniteArgs) -> Result<()> {
    let (set, report) = unite(args)?;
    write_annotation_set(&set, &args.output)?;
    report.print_summary();
    print_stats("United corpus", &stats(&set));
    Ok(())
}

pub fn run_split(args: &SplitArgs) -> Result<()> {
    validate_ratios(&args.options.ratios)?;
    let set = read_annotation_set(&args.input)?;
    write_split(&set, &args.options, &args.output_dir, args.images.as_deref())?;
    Ok(())
}

pub fn run(args: &RunArgs) -> Result<()> {
    validate_ratios(&args.options.ratios)?;
    let (set, report) = unite(&args.unite)?;
    write_annotation_set(&set, &args.unite.output)?;
    report.print_summary();

    let image_root = if args.copy_images {
        args.unite.images.as_deref()
    } else {
        None
    };
    write_split(&set, &args.options, &args.output_dir, image_root)?;
    Ok(())
}

pub fn run_stats(args: &StatsArgs) -> Result<()> {
    for input in &args.inputs {
        let report = stats(&read_annotation_set(input)?);
        if args.json {
            let rendered = serde_json::to_string_pretty(&report).map_err(|source| Error::Json {
                path: input.clone(),
                source,
            })?;
            println!("{}", rendered);
        } else {
            print_stats(&input.display().to_string(), &report);
        }
    }
    Ok(())
}

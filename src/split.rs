//! Seeded train/val/test partitioning at image granularity

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use crate::coco::{Annotation, AnnotationSet, Image};
use crate::error::{Error, Result};
use crate::io::{copy_image, write_annotation_set};
use crate::utils::{create_output_directory, create_progress_bar};

const RATIO_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Train,
    Val,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Val, Partition::Test];

    pub fn name(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Val => "val",
            Partition::Test => "test",
        }
    }
}

/// Check that `ratios` describes a train/val or train/val/test split.
pub fn validate_ratios(ratios: &[f64]) -> Result<()> {
    let invalid = |reason| Error::InvalidRatios {
        ratios: ratios.to_vec(),
        reason,
    };
    if ratios.len() != 2 && ratios.len() != 3 {
        return Err(invalid("expected 2 or 3 ratios"));
    }
    if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(invalid("ratios must be non-negative"));
    }
    if ratios.iter().sum::<f64>() > 1.0 + RATIO_TOLERANCE {
        return Err(invalid("ratios must not sum above 1.0"));
    }
    Ok(())
}

/// Number of images per partition for `total` shuffled images.
///
/// Boundaries are cumulative: train ends at `floor(r0 * total)`, val at
/// `floor((r0 + r1) * total)`. With three ratios the test partition takes
/// everything after val. With two, images past the val boundary belong to
/// no partition.
pub fn partition_sizes(total: usize, ratios: &[f64]) -> Vec<usize> {
    let boundary =
        |cumulative: f64| ((cumulative * total as f64 + RATIO_TOLERANCE).floor() as usize).min(total);

    let train = boundary(ratios[0]);
    let val = boundary(ratios[0] + ratios[1]).max(train) - train;
    if ratios.len() == 2 {
        return vec![train, val];
    }
    vec![train, val, total - train - val]
}

/// Split `set` into 2 or 3 disjoint partitions.
///
/// Images are ordered by file name, then shuffled with a generator seeded by
/// `seed`, so the same input and seed always give the same partitions. Every
/// annotation travels with its image. Each partition is a standalone set with
/// dense ids from 1 and the input's category list. Two ratios summing below
/// 1.0 leave the trailing images of the shuffle out of both partitions.
pub fn split(set: &AnnotationSet, ratios: &[f64], seed: u64) -> Result<Vec<AnnotationSet>> {
    validate_ratios(ratios)?;

    let mut images: Vec<&Image> = set.images.values().collect();
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name).then(a.id.cmp(&b.id)));
    let mut rng = StdRng::seed_from_u64(seed);
    images.shuffle(&mut rng);

    let by_image = set.annotations_by_image();
    let sizes = partition_sizes(images.len(), ratios);
    let unassigned = images.len() - sizes.iter().sum::<usize>();
    if unassigned > 0 {
        warn!(
            "{} of {} images fall outside the split ratios and are left out",
            unassigned,
            images.len()
        );
    }

    let mut partitions = Vec::with_capacity(ratios.len());
    let mut start = 0;
    for size in sizes {
        partitions.push(build_partition(
            set,
            &images[start..start + size],
            &by_image,
        ));
        start += size;
    }
    Ok(partitions)
}

fn build_partition(
    set: &AnnotationSet,
    images: &[&Image],
    by_image: &HashMap<u32, Vec<usize>>,
) -> AnnotationSet {
    let mut partition = AnnotationSet {
        categories: set.categories.clone(),
        ..Default::default()
    };
    let mut next_annotation_id = 1u32;

    for (idx, image) in images.iter().enumerate() {
        let image_id = idx as u32 + 1;
        partition.images.insert(
            image_id,
            Image {
                id: image_id,
                ..(*image).clone()
            },
        );
        for &ann_idx in by_image.get(&image.id).map(Vec::as_slice).unwrap_or(&[]) {
            partition.annotations.push(Annotation {
                id: next_annotation_id,
                image_id,
                ..set.annotations[ann_idx].clone()
            });
            next_annotation_id += 1;
        }
    }
    partition
}

/// Write each partition to `<output_dir>/<name>.json`.
pub fn write_partitions(partitions: &[AnnotationSet], output_dir: &Path) -> Result<Vec<PathBuf>> {
    partitions
        .iter()
        .zip(Partition::ALL)
        .map(|(partition, kind)| {
            let path = output_dir.join(format!("{}.json", kind.name()));
            write_annotation_set(partition, &path)?;
            Ok(path)
        })
        .collect()
}

/// Counts from copying partition images
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Copy each partition's images from `image_root` into
/// `<output_dir>/images/<name>/`.
pub fn copy_partition_images(
    partitions: &[AnnotationSet],
    image_root: &Path,
    output_dir: &Path,
) -> Result<CopyReport> {
    let copied = AtomicUsize::new(0);
    let missing = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    for (partition, kind) in partitions.iter().zip(Partition::ALL) {
        let images_dir = output_dir.join("images").join(kind.name());
        let images_dir =
            create_output_directory(&images_dir).map_err(|e| Error::io(&images_dir, e))?;

        let pb = create_progress_bar(partition.image_count() as u64, kind.name());
        partition.images.values().par_bridge().for_each(|image| {
            match copy_image(image_root, &image.file_name, &images_dir) {
                Ok(()) => {
                    copied.fetch_add(1, Relaxed);
                }
                Err(e) if e.is_not_found() => {
                    warn!("{}", e);
                    missing.fetch_add(1, Relaxed);
                }
                Err(e) => {
                    warn!("Failed to copy {}: {}", image.file_name, e);
                    failed.fetch_add(1, Relaxed);
                }
            }
            pb.inc(1);
        });
        pb.finish_with_message(format!("{} images copied", kind.name()));
    }

    let report = CopyReport {
        copied: copied.into_inner(),
        missing: missing.into_inner(),
        failed: failed.into_inner(),
    };
    info!(
        "Partition images: {} copied, {} missing, {} failed",
        report.copied, report.missing, report.failed
    );
    Ok(report)
}

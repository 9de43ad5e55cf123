//! Consistency filter
//!
//! Drops annotations that point at unknown images or categories, then drops
//! images left without any annotation. Unlike the other stages this one
//! works destructively on the set it is given, and optionally on the image
//! files backing it.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::coco::{AnnotationSet, Image};
use crate::io::{dispose_image, FileDisposal};

/// Before/after counts for one pruning pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub images_before: usize,
    pub images_after: usize,
    pub annotations_before: usize,
    pub annotations_after: usize,
    pub orphan_annotations: usize,
    pub files_deleted: usize,
    pub files_quarantined: usize,
    pub files_missing: usize,
    pub files_failed: usize,
}

impl PruneReport {
    pub fn removed_images(&self) -> usize {
        self.images_before - self.images_after
    }

    pub fn print_summary(&self) {
        info!("=== Prune Summary ===");
        info!(
            "Images: {} before, {} after ({} without annotations removed)",
            self.images_before,
            self.images_after,
            self.removed_images()
        );
        info!(
            "Annotations: {} before, {} after",
            self.annotations_before, self.annotations_after
        );
        if self.orphan_annotations > 0 {
            warn!("Orphaned annotations removed: {}", self.orphan_annotations);
        }
        if self.files_deleted + self.files_quarantined > 0 {
            info!(
                "Image files deleted: {}, quarantined: {}",
                self.files_deleted, self.files_quarantined
            );
        }
        if self.files_missing > 0 {
            warn!("Image files already missing: {}", self.files_missing);
        }
        if self.files_failed > 0 {
            warn!("Image files that could not be removed: {}", self.files_failed);
        }
    }
}

/// Remove annotations whose image or category does not resolve.
///
/// Returns the number of annotations removed.
pub fn prune_orphans(set: &mut AnnotationSet) -> usize {
    let category_ids = set.category_ids();
    let before = set.annotations.len();
    let images = &set.images;
    set.annotations.retain(|ann| {
        images.contains_key(&ann.image_id) && category_ids.contains(&ann.category_id)
    });
    before - set.annotations.len()
}

/// Remove every image that has no annotation.
///
/// With an `image_root`, the removed images' files are deleted from it, after
/// being copied into `quarantine` when one is given. A file that is already
/// gone is counted, not treated as an error.
pub fn prune_empty_images(
    mut set: AnnotationSet,
    image_root: Option<&Path>,
    quarantine: Option<&Path>,
) -> (AnnotationSet, PruneReport) {
    let mut report = PruneReport {
        images_before: set.image_count(),
        annotations_before: set.annotation_count(),
        ..Default::default()
    };

    let annotated: HashSet<u32> = set.annotations.iter().map(|ann| ann.image_id).collect();
    let mut removed: Vec<Image> = Vec::new();
    set.images.retain(|id, image| {
        let keep = annotated.contains(id);
        if !keep {
            removed.push(image.clone());
        }
        keep
    });

    if let Some(root) = image_root {
        for image in &removed {
            match dispose_image(root, &image.file_name, quarantine) {
                Ok(FileDisposal::Deleted) => report.files_deleted += 1,
                Ok(FileDisposal::Quarantined) => report.files_quarantined += 1,
                Ok(FileDisposal::Missing) => {
                    debug!("Image file already absent: {}", image.file_name);
                    report.files_missing += 1;
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", image.file_name, e);
                    report.files_failed += 1;
                }
            }
        }
    }

    report.images_after = set.image_count();
    report.annotations_after = set.annotation_count();
    (set, report)
}

/// Full consistency pass: orphaned annotations first, then empty images.
pub fn prune(
    mut set: AnnotationSet,
    image_root: Option<&Path>,
    quarantine: Option<&Path>,
) -> (AnnotationSet, PruneReport) {
    let annotations_before = set.annotation_count();
    let orphans = prune_orphans(&mut set);
    let (set, mut report) = prune_empty_images(set, image_root, quarantine);
    report.annotations_before = annotations_before;
    report.orphan_annotations = orphans;
    (set, report)
}

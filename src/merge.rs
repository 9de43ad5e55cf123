//! Union of several annotation sets into one corpus
//!
//! Images are deduplicated by file name with the first occurrence winning, so
//! callers set precedence purely through the order of the input sets. A later
//! image with an already seen file name is dropped together with all of its
//! annotations, even if those annotations carry information the first copy
//! lacks.

use indexmap::IndexSet;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::coco::{Annotation, AnnotationSet, Category, Image};
use crate::io::locate_image;

/// Counts collected while merging
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub sources: usize,
    pub images_in: usize,
    pub images_out: usize,
    pub duplicate_images: usize,
    pub missing_image_files: usize,
    pub annotations_in: usize,
    pub annotations_out: usize,
    /// Annotations lost because their image was a duplicate.
    pub duplicate_image_annotations: usize,
    /// Annotations whose category is not among the target categories.
    pub dropped_category_annotations: usize,
    /// Annotations whose category id is not declared by their own source.
    pub unknown_category_annotations: usize,
    /// Annotations whose image id is not declared by their own source.
    pub orphan_annotations: usize,
    /// Source category names that are not target categories.
    pub dropped_categories: Vec<String>,
}

impl MergeReport {
    pub fn print_summary(&self) {
        info!("=== Merge Summary ===");
        info!("Sources merged: {}", self.sources);
        info!("Images: {} in, {} out", self.images_in, self.images_out);
        info!(
            "Annotations: {} in, {} out",
            self.annotations_in, self.annotations_out
        );
        if self.duplicate_images > 0 {
            warn!(
                "Duplicate images skipped: {} (with {} annotations)",
                self.duplicate_images, self.duplicate_image_annotations
            );
        }
        if self.dropped_category_annotations > 0 {
            warn!(
                "Annotations dropped for non-target categories: {} ({})",
                self.dropped_category_annotations,
                self.dropped_categories.join(", ")
            );
        }
        if self.unknown_category_annotations > 0 {
            warn!(
                "Annotations with undeclared category ids: {}",
                self.unknown_category_annotations
            );
        }
        if self.orphan_annotations > 0 {
            warn!(
                "Annotations referencing undeclared images: {}",
                self.orphan_annotations
            );
        }
        if self.missing_image_files > 0 {
            warn!("Images missing on disk: {}", self.missing_image_files);
        }
    }
}

/// Every category name found in `sets`, in first-seen order.
pub fn default_target_categories(sets: &[AnnotationSet]) -> Vec<String> {
    sets.iter()
        .flat_map(|set| set.categories.iter().map(|c| c.name.clone()))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Merge `sets` into a single annotation set.
///
/// `target_categories` fixes the output categories and their ids (`1..=N` in
/// list order). If `image_root` is given, every kept image is checked for
/// existence under it; missing files are counted, never fatal.
pub fn merge(
    sets: &[AnnotationSet],
    target_categories: &[String],
    image_root: Option<&Path>,
) -> (AnnotationSet, MergeReport) {
    let mut report = MergeReport {
        sources: sets.len(),
        ..Default::default()
    };

    let target_names: IndexSet<&str> = target_categories.iter().map(String::as_str).collect();
    let categories: Vec<Category> = target_names
        .iter()
        .enumerate()
        .map(|(idx, name)| Category::new(idx as u32 + 1, *name))
        .collect();
    let category_ids: HashMap<&str, u32> = categories
        .iter()
        .map(|c| (c.name.as_str(), c.id))
        .collect();

    let mut merged = AnnotationSet {
        categories: categories.clone(),
        ..Default::default()
    };
    let mut seen_file_names: HashSet<&str> = HashSet::new();
    let mut dropped_categories: IndexSet<&str> = IndexSet::new();
    let mut next_image_id = 1u32;
    let mut next_annotation_id = 1u32;

    for set in sets {
        let local_names = set.category_names();
        dropped_categories.extend(
            set.categories
                .iter()
                .map(|c| c.name.as_str())
                .filter(|name| !category_ids.contains_key(name)),
        );

        // source image id -> merged image id, `None` for duplicates
        let mut image_ids: HashMap<u32, Option<u32>> = HashMap::with_capacity(set.images.len());
        for image in set.images.values() {
            report.images_in += 1;
            if !seen_file_names.insert(image.file_name.as_str()) {
                debug!("Duplicate image skipped: {}", image.file_name);
                report.duplicate_images += 1;
                image_ids.insert(image.id, None);
                continue;
            }

            if let Some(root) = image_root {
                if let Err(e) = locate_image(root, &image.file_name) {
                    debug!("{}", e);
                    report.missing_image_files += 1;
                }
            }

            let id = next_image_id;
            next_image_id += 1;
            image_ids.insert(image.id, Some(id));
            merged.images.insert(
                id,
                Image {
                    id,
                    ..image.clone()
                },
            );
        }

        for annotation in &set.annotations {
            report.annotations_in += 1;
            let image_id = match image_ids.get(&annotation.image_id) {
                Some(Some(id)) => *id,
                Some(None) => {
                    report.duplicate_image_annotations += 1;
                    continue;
                }
                None => {
                    report.orphan_annotations += 1;
                    continue;
                }
            };
            let Some(name) = local_names.get(&annotation.category_id) else {
                report.unknown_category_annotations += 1;
                continue;
            };
            let Some(&category_id) = category_ids.get(name) else {
                report.dropped_category_annotations += 1;
                continue;
            };

            merged.annotations.push(Annotation {
                id: next_annotation_id,
                image_id,
                category_id,
                ..annotation.clone()
            });
            next_annotation_id += 1;
        }
    }

    report.images_out = merged.image_count();
    report.annotations_out = merged.annotation_count();
    report.dropped_categories = dropped_categories.into_iter().map(String::from).collect();
    (merged, report)
}

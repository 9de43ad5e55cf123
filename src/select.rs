//! Threshold-based category selection
//!
//! Runs on the whole merged corpus, before any split, so a category is kept
//! or dropped for every partition at once.

use indexmap::IndexMap;
use log::info;
use std::collections::HashMap;

use crate::coco::{Annotation, AnnotationSet, Category};

/// Keep the categories with at least `min_count` annotations.
///
/// Kept categories retain their relative order and get dense ids from 1.
/// Annotations of dropped categories are removed and the remaining ones are
/// renumbered densely. Images are left untouched. Applying the selection to
/// its own output with the same threshold changes nothing.
pub fn select_categories(
    set: &AnnotationSet,
    min_count: usize,
) -> (AnnotationSet, IndexMap<String, u32>) {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for ann in &set.annotations {
        *counts.entry(ann.category_id).or_default() += 1;
    }

    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut name_to_id: IndexMap<String, u32> = IndexMap::new();
    let mut categories = Vec::new();
    for category in &set.categories {
        let count = counts.get(&category.id).copied().unwrap_or(0);
        if count < min_count {
            info!(
                "Dropping category {} ({} < {} annotations)",
                category.name, count, min_count
            );
            continue;
        }
        let id = categories.len() as u32 + 1;
        remap.insert(category.id, id);
        name_to_id.insert(category.name.clone(), id);
        categories.push(Category {
            id,
            ..category.clone()
        });
    }

    let annotations: Vec<Annotation> = set
        .annotations
        .iter()
        .filter_map(|ann| remap.get(&ann.category_id).map(|&id| (ann, id)))
        .enumerate()
        .map(|(idx, (ann, category_id))| Annotation {
            id: idx as u32 + 1,
            category_id,
            ..ann.clone()
        })
        .collect();

    info!(
        "Selected {} of {} categories; {} of {} annotations kept",
        categories.len(),
        set.categories.len(),
        annotations.len(),
        set.annotations.len()
    );

    (
        AnnotationSet {
            categories,
            images: set.images.clone(),
            annotations,
        },
        name_to_id,
    )
}

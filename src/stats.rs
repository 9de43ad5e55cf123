use indexmap::IndexMap;
use log::info;
use std::collections::HashMap;

use crate::coco::AnnotationSet;

pub const ALL_IMAGES: &str = "ALL_images";
pub const ALL_ANNOTATIONS: &str = "ALL_annotations";

/// Image, annotation and per-category counts of an annotation set.
///
/// Rendered as a flat mapping: the two totals first, then every category
/// that has annotations, most frequent first.
pub fn stats(set: &AnnotationSet) -> IndexMap<String, usize> {
    let mut per_category: HashMap<u32, usize> = HashMap::new();
    for ann in &set.annotations {
        *per_category.entry(ann.category_id).or_default() += 1;
    }

    let mut categories: Vec<(&str, usize)> = set
        .categories
        .iter()
        .filter_map(|c| per_category.get(&c.id).map(|&count| (c.name.as_str(), count)))
        .collect();
    // stable, so ties keep category order
    categories.sort_by(|a, b| b.1.cmp(&a.1));

    let mut report = IndexMap::with_capacity(categories.len() + 2);
    report.insert(ALL_IMAGES.to_string(), set.image_count());
    report.insert(ALL_ANNOTATIONS.to_string(), set.annotation_count());
    for (name, count) in categories {
        report.insert(name.to_string(), count);
    }
    report
}

pub fn print_stats(label: &str, report: &IndexMap<String, usize>) {
    info!("=== {} ===", label);
    for (key, value) in report {
        info!("{}: ({})", key, value);
    }
}

//! COCO / CVAT annotation uniter
//!
//! This library merges independently produced annotation exports into one
//! consistent COCO corpus, removes duplicates and orphans, and splits the
//! result into train/val/test sets for detector training.

pub mod coco;
pub mod config;
pub mod cvat;
pub mod error;
pub mod io;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod prune;
pub mod select;
pub mod split;
pub mod stats;
pub mod utils;

// Re-export commonly used types and functions
pub use coco::{Annotation, AnnotationSet, Category, Image, Segmentation};
pub use config::{Args, Command};
pub use error::{Error, Result};
pub use merge::{merge, MergeReport};
pub use normalize::{normalize, SourceFormat};
pub use prune::{prune, prune_empty_images, PruneReport};
pub use select::select_categories;
pub use split::{split, Partition};
pub use stats::stats;

//! COCO format data structures and the canonical annotation set
//!
//! Input documents are parsed leniently into [`CocoDocument`]; every stage of
//! the pipeline works on an [`AnnotationSet`]; output is always written as a
//! [`CocoFile`], which carries a freshly built `info`/`licenses` header.

use chrono::Datelike;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};

/// COCO dataset information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Info {
    pub year: i32,
    pub version: String,
    pub description: String,
    pub contributor: String,
    pub url: String,
    pub date_created: String,
}

impl Default for Info {
    fn default() -> Self {
        let today = chrono::Utc::now().date_naive();
        Self {
            year: today.year(),
            version: "1.0".to_string(),
            description: "United annotation corpus".to_string(),
            contributor: "coco-unite".to_string(),
            url: String::new(),
            date_created: today.to_string(),
        }
    }
}

/// COCO license information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct License {
    pub id: u32,
    pub name: String,
    pub url: String,
}

impl Default for License {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            url: String::new(),
        }
    }
}

/// COCO category information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub supercategory: String,
}

impl Category {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            supercategory: String::new(),
        }
    }
}

/// COCO image information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub id: u32,
    pub file_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: u32,
}

impl Image {
    pub fn new(id: u32, file_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Segmentation {
    /// List of polygons, each a flat `[x, y, x, y, ...]` sequence.
    Polygons(Vec<Vec<f64>>),
    /// Run-length encoded mask, compressed (string) or not (integer list).
    Rle {
        counts: serde_json::Value,
        size: [u32; 2],
    },
}

/// COCO annotation information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(default)]
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bbox: [f64; 4], // [x, y, width, height]
    #[serde(default, deserialize_with = "null_as_default")]
    pub area: f64,
    #[serde(default, deserialize_with = "deserialize_iscrowd")]
    pub iscrowd: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

impl Annotation {
    pub fn new(id: u32, image_id: u32, category_id: u32, bbox: [f64; 4], area: f64) -> Self {
        Self {
            id,
            image_id,
            category_id,
            bbox,
            area,
            iscrowd: 0,
            segmentation: None,
            attributes: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_iscrowd<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u64),
    }
    match Option::<IsCrowd>::deserialize(deserializer)? {
        Some(IsCrowd::Bool(b)) => Ok(b as u8),
        Some(IsCrowd::Int(i)) => Ok((i != 0) as u8),
        None => Ok(0),
    }
}

/// A COCO document as read from disk. The header is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CocoDocument {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// Complete COCO dataset structure, as written to disk
#[derive(Debug, Clone, Serialize)]
pub struct CocoFile {
    pub info: Info,
    pub licenses: Vec<License>,
    pub categories: Vec<Category>,
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
}

/// The canonical in-memory bundle of categories, images and annotations.
///
/// Images are keyed by id and keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    pub categories: Vec<Category>,
    pub images: IndexMap<u32, Image>,
    pub annotations: Vec<Annotation>,
}

impl From<CocoDocument> for AnnotationSet {
    fn from(doc: CocoDocument) -> Self {
        Self {
            categories: doc.categories,
            images: doc.images.into_iter().map(|img| (img.id, img)).collect(),
            annotations: doc.annotations,
        }
    }
}

impl AnnotationSet {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Maps category id to category name.
    pub fn category_names(&self) -> HashMap<u32, &str> {
        self.categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect()
    }

    pub fn category_ids(&self) -> HashSet<u32> {
        self.categories.iter().map(|c| c.id).collect()
    }

    /// Groups annotation indices by the image they belong to.
    pub fn annotations_by_image(&self) -> HashMap<u32, Vec<usize>> {
        let mut grouped: HashMap<u32, Vec<usize>> = HashMap::new();
        for (idx, ann) in self.annotations.iter().enumerate() {
            grouped.entry(ann.image_id).or_default().push(idx);
        }
        grouped
    }

    /// Build the serializable COCO file with a fresh header.
    pub fn to_coco_file(&self) -> CocoFile {
        CocoFile {
            info: Info::default(),
            licenses: vec![License::default()],
            categories: self.categories.clone(),
            images: self.images.values().cloned().collect(),
            annotations: self.annotations.clone(),
        }
    }
}

/// Calculate polygon area using the shoelace formula
pub fn calculate_polygon_area(polygon: &[f64]) -> f64 {
    if polygon.len() < 6 || polygon.len() % 2 != 0 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = polygon.len() / 2;

    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i * 2] * polygon[j * 2 + 1] - polygon[j * 2] * polygon[i * 2 + 1];
    }

    area.abs() / 2.0
}

/// Calculate the axis-aligned bounding box `[x, y, w, h]` of flat polygon points
pub fn calculate_bbox_from_polygon(polygon: &[f64]) -> [f64; 4] {
    if polygon.len() < 2 || polygon.len() % 2 != 0 {
        return [0.0, 0.0, 0.0, 0.0];
    }

    let (min_x, min_y, max_x, max_y) = polygon.chunks_exact(2).fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(min_x, min_y, max_x, max_y), p| {
            (min_x.min(p[0]), min_y.min(p[1]), max_x.max(p[0]), max_y.max(p[1]))
        },
    );

    [min_x, min_y, max_x - min_x, max_y - min_y]
}

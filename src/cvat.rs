//! CVAT polygon XML documents
//!
//! Only the parts of a CVAT "images" export that matter for object annotation
//! are modelled: the task's label list and the shapes of each `<image>`.
//! Polygons become annotations; boxes, polylines and the other shape kinds
//! are skipped and counted, in any order relative to the polygons.

use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

use crate::coco::{
    calculate_bbox_from_polygon, calculate_polygon_area, Annotation, AnnotationSet, Category,
    Image, Segmentation,
};
use crate::error::{Error, Result};
use crate::normalize::NormalizeReport;

#[derive(Debug, Deserialize)]
pub struct CvatAnnotations {
    pub meta: Meta,
    #[serde(rename = "image", default)]
    pub images: Vec<CvatImage>,
}

#[derive(Debug, Deserialize)]
pub struct Meta {
    pub task: Task,
}

#[derive(Debug, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Default, Deserialize)]
pub struct Labels {
    #[serde(rename = "label", default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CvatImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Every shape of the image, in document order.
    #[serde(rename = "$value", default)]
    pub shapes: Vec<Shape>,
}

/// A child element of `<image>`. Only polygons become annotations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Polygon(CvatPolygon),
    Box(OtherShape),
    Polyline(OtherShape),
    Points(OtherShape),
    Ellipse(OtherShape),
    Cuboid(OtherShape),
    Skeleton(OtherShape),
    Mask(OtherShape),
    Tag(OtherShape),
    #[serde(other)]
    Unknown,
}

/// Non-polygon shape; its geometry is not read.
#[derive(Debug, Deserialize)]
pub struct OtherShape {
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct CvatPolygon {
    pub label: String,
    /// `x1,y1;x2,y2;...`
    pub points: String,
    #[serde(default)]
    pub occluded: Option<String>,
}

pub fn from_reader<R: Read>(reader: R) -> std::result::Result<CvatAnnotations, serde_xml_rs::Error> {
    serde_xml_rs::from_reader(reader)
}

/// Parse CVAT point lists. Both `,` and `;` separate values.
pub fn parse_points(points: &str) -> Result<Vec<f64>> {
    let values = points
        .split(|c| c == ',' || c == ';')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::MalformedPoints(points.to_string()))?;

    if values.is_empty() || values.len() % 2 != 0 {
        return Err(Error::MalformedPoints(points.to_string()));
    }
    Ok(values)
}

impl CvatAnnotations {
    /// Convert into an annotation set with dense ids in document order.
    ///
    /// Non-polygon shapes and polygons that cannot be converted are skipped
    /// and counted in `report`.
    pub fn into_annotation_set(self, report: &mut NormalizeReport) -> AnnotationSet {
        let categories: Vec<Category> = self
            .meta
            .task
            .labels
            .labels
            .iter()
            .enumerate()
            .map(|(idx, label)| Category::new(idx as u32 + 1, label.name.clone()))
            .collect();
        let category_ids: HashMap<&str, u32> = categories
            .iter()
            .map(|c| (c.name.as_str(), c.id))
            .collect();

        let mut set = AnnotationSet::default();
        let mut next_annotation_id = 1;

        for (idx, image) in self.images.iter().enumerate() {
            let image_id = idx as u32 + 1;
            set.images.insert(
                image_id,
                Image::new(image_id, image.name.clone(), image.width, image.height),
            );

            for shape in &image.shapes {
                let Shape::Polygon(polygon) = shape else {
                    debug!("Skipping non-polygon shape on {}", image.name);
                    report.unsupported_shape += 1;
                    continue;
                };
                match convert_polygon(polygon, &category_ids, next_annotation_id, image_id) {
                    Ok(annotation) => {
                        set.annotations.push(annotation);
                        next_annotation_id += 1;
                    }
                    Err(e @ Error::UnknownCategory { .. }) => {
                        debug!("Skipping polygon on {}: {}", image.name, e);
                        report.unknown_category += 1;
                    }
                    Err(e) => {
                        debug!("Skipping polygon on {}: {}", image.name, e);
                        report.malformed += 1;
                    }
                }
            }
        }

        set.categories = categories;
        set
    }
}

/// Area and bounding box are measured on the integer-truncated contour; the
/// segmentation keeps the original coordinates.
fn convert_polygon(
    polygon: &CvatPolygon,
    category_ids: &HashMap<&str, u32>,
    id: u32,
    image_id: u32,
) -> Result<Annotation> {
    let category_id = *category_ids
        .get(polygon.label.as_str())
        .ok_or_else(|| Error::UnknownCategory {
            label: polygon.label.clone(),
        })?;

    let points = parse_points(&polygon.points)?;
    let contour: Vec<f64> = points.iter().map(|v| v.trunc()).collect();

    let mut annotation = Annotation::new(
        id,
        image_id,
        category_id,
        calculate_bbox_from_polygon(&contour),
        calculate_polygon_area(&contour),
    );
    annotation.segmentation = Some(Segmentation::Polygons(vec![points]));
    annotation.attributes = Some(serde_json::json!({
        "occluded": polygon.occluded.as_deref() == Some("1"),
    }));
    Ok(annotation)
}

//! COCO JSON writer.
//!
//! A whole batch becomes a single `annotations.json`.
//!
//! # Id conventions
//!
//! - image ids are 1-based positions in the archive order;
//! - category ids are label registry indices plus [`COCO_CATEGORY_ID_OFFSET`];
//! - annotation ids run from 1 across the whole batch.
//!
//! # Bounding boxes
//!
//! COCO boxes are `[x, y, width, height]` with `(x, y)` the top-left corner,
//! in whole pixels. They are derived from the same rounded corners the VOC
//! writer uses, so both formats agree on every box.

use serde::{Deserialize, Serialize};

use super::{AnnotationFile, ArchiveItem};
use crate::archive::layout::COCO_JSON;
use crate::error::MoonlabelError;
use crate::ir::{AnnotationId, CategoryId, ImageId, ImageResult, LabelIndex};

/// Added to a label's registry index to form its COCO category id.
pub const COCO_CATEGORY_ID_OFFSET: u64 = 0;

// ============================================================================
// COCO Schema Types
// ============================================================================

/// Top-level COCO document.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<CocoInfo>,

    #[serde(default)]
    pub images: Vec<CocoImage>,

    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,

    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CocoInfo {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CocoImage {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CocoCategory {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CocoAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,

    /// `[x, y, width, height]` in whole pixels.
    pub bbox: [i64; 4],

    #[serde(default)]
    pub area: i64,

    #[serde(default)]
    pub iscrowd: u8,

    #[serde(default)]
    pub segmentation: serde_json::Value,
}

// ============================================================================
// Public API
// ============================================================================

/// Encodes the batch into a single `annotations.json` file.
pub fn encode(
    items: &[ArchiveItem<'_, ImageResult>],
    labels: &LabelIndex,
) -> Result<AnnotationFile, MoonlabelError> {
    let json = to_coco_string(items, labels)?;
    Ok(AnnotationFile::new(COCO_JSON, json))
}

/// Renders the COCO document for the batch as pretty-printed JSON.
pub fn to_coco_string(
    items: &[ArchiveItem<'_, ImageResult>],
    labels: &LabelIndex,
) -> Result<String, MoonlabelError> {
    let dataset = build_dataset(items, labels)?;
    serde_json::to_string_pretty(&dataset).map_err(MoonlabelError::CocoJsonWrite)
}

/// COCO category id of the label at `index` in the registry.
pub fn category_id(index: usize) -> CategoryId {
    CategoryId::new(index as u64 + COCO_CATEGORY_ID_OFFSET)
}

// ============================================================================
// Conversion
// ============================================================================

fn build_dataset(
    items: &[ArchiveItem<'_, ImageResult>],
    labels: &LabelIndex,
) -> Result<CocoDataset, MoonlabelError> {
    let categories = labels
        .iter()
        .map(|(idx, name)| CocoCategory {
            id: category_id(idx).as_u64(),
            name: name.to_string(),
        })
        .collect();

    let mut images = Vec::with_capacity(items.len());
    let mut annotations = Vec::new();
    let mut image_id = ImageId::new(1);
    let mut annotation_id = AnnotationId::new(1);

    for item in items {
        let size = item.result.image.dimensions()?;
        images.push(CocoImage {
            id: image_id.as_u64(),
            file_name: item.file_name.to_string(),
            width: size.width,
            height: size.height,
        });

        for detection in &item.result.detections {
            let index = labels.index_of(&detection.label).ok_or_else(|| {
                MoonlabelError::LabelNotRegistered {
                    label: detection.label.clone(),
                }
            })?;
            let rect = detection
                .bbox()
                .to_xyxy()
                .to_pixel(f64::from(size.width), f64::from(size.height))
                .round();

            annotations.push(CocoAnnotation {
                id: annotation_id.as_u64(),
                image_id: image_id.as_u64(),
                category_id: category_id(index).as_u64(),
                bbox: rect.to_xywh(),
                area: rect.area(),
                iscrowd: 0,
                segmentation: serde_json::Value::Array(vec![]),
            });
            annotation_id = annotation_id.next();
        }

        image_id = image_id.next();
    }

    Ok(CocoDataset {
        info: Some(CocoInfo {
            description: "Dataset exported by moonlabel".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
        images,
        annotations,
        categories,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Detection, ImageFile};
    use serde_json::Value;

    fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
        let row_stride = (width * 3).div_ceil(4) * 4;
        let pixel_array_size = row_stride * height;
        let file_size = 54 + pixel_array_size;

        let mut bytes = Vec::with_capacity(file_size as usize);
        bytes.extend_from_slice(b"BM");
        bytes.extend_from_slice(&file_size.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&54u32.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&(width as i32).to_le_bytes());
        bytes.extend_from_slice(&(height as i32).to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&24u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
        bytes.extend_from_slice(&2835u32.to_le_bytes());
        bytes.extend_from_slice(&2835u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.resize(file_size as usize, 0);
        bytes
    }

    fn result(name: &str, labels: &[&str]) -> ImageResult {
        ImageResult::new(
            ImageFile::new(name, bmp_bytes(100, 200)),
            labels
                .iter()
                .map(|label| Detection::new(*label, 0.5, 0.5, 0.2, 0.1))
                .collect(),
        )
    }

    fn render(batch: &[ImageResult]) -> Value {
        let labels = LabelIndex::build(batch);
        let items: Vec<_> = batch
            .iter()
            .map(|r| ArchiveItem::new(r.image.file_name.as_str(), r))
            .collect();
        let json = to_coco_string(&items, &labels).expect("encode coco");
        serde_json::from_str(&json).expect("valid json")
    }

    #[test]
    fn categories_follow_registry_order() {
        let json = render(&[result("a.bmp", &["person"]), result("b.bmp", &["car", "person"])]);

        let categories = json["categories"].as_array().expect("categories array");
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0]["id"], 0);
        assert_eq!(categories[0]["name"], "person");
        assert_eq!(categories[1]["id"], 1);
        assert_eq!(categories[1]["name"], "car");
    }

    #[test]
    fn annotation_ids_run_across_the_batch() {
        let json = render(&[result("a.bmp", &["person"]), result("b.bmp", &["car", "person"])]);

        let annotations = json["annotations"].as_array().expect("annotations array");
        let ids: Vec<u64> = annotations.iter().filter_map(|a| a["id"].as_u64()).collect();
        let image_ids: Vec<u64> = annotations
            .iter()
            .filter_map(|a| a["image_id"].as_u64())
            .collect();
        let category_ids: Vec<u64> = annotations
            .iter()
            .filter_map(|a| a["category_id"].as_u64())
            .collect();

        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(image_ids, [1, 2, 2]);
        assert_eq!(category_ids, [0, 1, 0]);
    }

    #[test]
    fn bbox_uses_rounded_pixel_corners() {
        let json = render(&[result("a.bmp", &["cat"])]);
        let ann = &json["annotations"][0];

        assert_eq!(ann["bbox"], serde_json::json!([40, 90, 20, 20]));
        assert_eq!(ann["area"], 400);
        assert_eq!(ann["iscrowd"], 0);
        assert_eq!(ann["segmentation"], serde_json::json!([]));
        assert_eq!(json["images"][0]["width"], 100);
        assert_eq!(json["images"][0]["height"], 200);
    }

    #[test]
    fn info_has_no_timestamps() {
        let json = render(&[result("a.bmp", &[])]);
        let info = json["info"].as_object().expect("info object");
        assert!(info.contains_key("description"));
        assert!(info.contains_key("version"));
        assert!(!info.contains_key("date_created"));
        assert_eq!(json["annotations"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn output_is_deterministic() {
        let batch = [result("a.bmp", &["person"]), result("b.bmp", &["car"])];
        assert_eq!(render(&batch), render(&batch));
    }
}

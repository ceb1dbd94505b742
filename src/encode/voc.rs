//! Pascal VOC XML writer.
//!
//! One `annotations/<base>.xml` document per image. Boxes are written in
//! absolute pixel corners, so every image's dimensions are read from its
//! header; an unreadable header fails the whole export.

use super::{base_name, AnnotationFile, ArchiveItem};
use crate::archive::layout::{ANNOTATIONS_DIR, IMAGES_DIR};
use crate::error::MoonlabelError;
use crate::ir::{Detection, ImageResult, ImageSize};

const VOC_XML_EXTENSION: &str = "xml";

/// Encodes one VOC document per image.
pub fn encode(items: &[ArchiveItem<'_, ImageResult>]) -> Result<Vec<AnnotationFile>, MoonlabelError> {
    let mut files = Vec::with_capacity(items.len());

    for item in items {
        let size = item.result.image.dimensions()?;
        let path = format!(
            "{ANNOTATIONS_DIR}/{}.{VOC_XML_EXTENSION}",
            base_name(item.file_name)
        );
        let xml = voc_document(item.file_name, size, &item.result.detections);
        files.push(AnnotationFile::new(path, xml));
    }

    Ok(files)
}

/// Renders the VOC document for one image of known size.
pub fn voc_document(file_name: &str, size: ImageSize, detections: &[Detection]) -> String {
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<annotation>\n");
    xml.push_str(&format!("  <folder>{IMAGES_DIR}</folder>\n"));
    xml.push_str(&format!("  <filename>{}</filename>\n", xml_escape(file_name)));
    xml.push_str("  <size>\n");
    xml.push_str(&format!("    <width>{}</width>\n", size.width));
    xml.push_str(&format!("    <height>{}</height>\n", size.height));
    xml.push_str("  </size>\n");

    for detection in detections {
        let rect = detection
            .bbox()
            .to_xyxy()
            .to_pixel(f64::from(size.width), f64::from(size.height))
            .round();

        xml.push_str("  <object>\n");
        xml.push_str(&format!("    <name>{}</name>\n", xml_escape(&detection.label)));
        xml.push_str("    <pose>Unspecified</pose>\n");
        xml.push_str("    <truncated>0</truncated>\n");
        xml.push_str("    <difficult>0</difficult>\n");
        xml.push_str("    <bndbox>\n");
        xml.push_str(&format!("      <xmin>{}</xmin>\n", rect.xmin));
        xml.push_str(&format!("      <ymin>{}</ymin>\n", rect.ymin));
        xml.push_str(&format!("      <xmax>{}</xmax>\n", rect.xmax));
        xml.push_str(&format!("      <ymax>{}</ymax>\n", rect.ymax));
        xml.push_str("    </bndbox>\n");
        xml.push_str("  </object>\n");
    }

    xml.push_str("</annotation>\n");
    xml
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

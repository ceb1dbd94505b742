//! Coordinate space markers for bounding boxes.
//!
//! Backends report boxes as fractions of the image size, while VOC and COCO
//! want absolute pixels. Tagging boxes with the space they live in keeps the
//! two from being mixed up in the encoders.

/// A coordinate space a bounding box can be expressed in.
pub trait CoordinateSpace: private::Sealed {
    /// Short name used in debug output.
    const NAME: &'static str;
}

/// Absolute pixel coordinates, origin at the top-left corner of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Coordinates expressed as fractions of image width/height.
///
/// Values are nominally in `[0, 1]` but nothing clamps them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Normalized {}

impl CoordinateSpace for Pixel {
    const NAME: &'static str = "px";
}

impl CoordinateSpace for Normalized {
    const NAME: &'static str = "norm";
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Pixel {}
    impl Sealed for super::Normalized {}
}

//! Bounding box geometry shared by every export format.
//!
//! Detections arrive as normalized center/size boxes ([`BBoxCxCyWh`]). YOLO
//! writes them through untouched; VOC and COCO convert them to pixel corners
//! ([`BBoxXYXY`]) and round to whole pixels ([`PixelRect`]).

use std::fmt;
use std::marker::PhantomData;

use super::space::{CoordinateSpace, Normalized, Pixel};

/// A box described by its center point and its size.
///
/// Zero or negative sizes are representable; encoders emit them as-is
/// instead of rejecting them.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxCxCyWh<TSpace> {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxCxCyWh<TSpace> {
    /// Creates a box from its center and size.
    #[inline]
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            _space: PhantomData,
        }
    }

    /// Returns true if both width and height are strictly positive.
    #[inline]
    pub fn has_area(&self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }

    /// Converts to corner form in the same coordinate space.
    #[inline]
    pub fn to_xyxy(&self) -> BBoxXYXY<TSpace> {
        BBoxXYXY::from_xyxy(
            self.cx - self.w / 2.0,
            self.cy - self.h / 2.0,
            self.cx + self.w / 2.0,
            self.cy + self.h / 2.0,
        )
    }
}

/// An axis-aligned box in corner form (xmin, ymin, xmax, ymax).
///
/// The constructor does not require `min <= max`.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    /// Creates a box from explicit corners.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            _space: PhantomData,
        }
    }

    /// Width of the box. Negative if the corners are swapped.
    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Height of the box. Negative if the corners are swapped.
    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Converts to center/size form in the same coordinate space.
    #[inline]
    pub fn to_cxcywh(&self) -> BBoxCxCyWh<TSpace> {
        BBoxCxCyWh::new(
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
            self.width(),
            self.height(),
        )
    }
}

impl BBoxXYXY<Normalized> {
    /// Scales normalized corners to pixel corners for an image of the given size.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Pixel> {
        BBoxXYXY::from_xyxy(
            self.xmin * image_width,
            self.ymin * image_height,
            self.xmax * image_width,
            self.ymax * image_height,
        )
    }
}

impl BBoxXYXY<Pixel> {
    /// Rounds each corner to the nearest whole pixel (halves away from zero).
    pub fn round(&self) -> PixelRect {
        PixelRect {
            xmin: self.xmin.round() as i64,
            ymin: self.ymin.round() as i64,
            xmax: self.xmax.round() as i64,
            ymax: self.ymax.round() as i64,
        }
    }
}

impl<TSpace: CoordinateSpace> fmt::Debug for BBoxCxCyWh<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BBoxCxCyWh")
            .field("space", &TSpace::NAME)
            .field("cx", &self.cx)
            .field("cy", &self.cy)
            .field("w", &self.w)
            .field("h", &self.h)
            .finish()
    }
}

impl<TSpace: CoordinateSpace> fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("space", &TSpace::NAME)
            .field("xmin", &self.xmin)
            .field("ymin", &self.ymin)
            .field("xmax", &self.xmax)
            .field("ymax", &self.ymax)
            .finish()
    }
}

/// Integer pixel corners, as written into VOC and COCO files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

/// Corners saturate at the `i64` bounds for far out-of-range boxes, so the
/// derived extents saturate too instead of overflowing.
impl PixelRect {
    #[inline]
    pub fn width(&self) -> i64 {
        self.xmax.saturating_sub(self.xmin)
    }

    #[inline]
    pub fn height(&self) -> i64 {
        self.ymax.saturating_sub(self.ymin)
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    /// COCO-style `[x, y, width, height]` with `(x, y)` the top-left corner.
    #[inline]
    pub fn to_xywh(&self) -> [i64; 4] {
        [self.xmin, self.ymin, self.width(), self.height()]
    }
}

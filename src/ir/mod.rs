//! Result model shared by the request orchestrator and every exporter.
//!
//! Everything an export needs lives here: the per-image detection and caption
//! results, the batch that groups them, the batch-wide label registry and the
//! box geometry used to move between normalized and pixel coordinates.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: marker types keep normalized and pixel boxes apart,
//!    and COCO ids are newtypes.
//!
//! 2. **Backend-agnostic**: detections are stored in one normalized
//!    center/size form whatever backend produced them.
//!
//! 3. **Permissive Construction**: zero-area or out-of-range boxes are
//!    representable and exported as-is.
//!
//! # Example
//!
//! ```
//! use moonlabel::ir::{Batch, Detection, ImageFile, ImageResult, LabelIndex};
//!
//! let results = vec![ImageResult::new(
//!     ImageFile::new("street.jpg", Vec::new()),
//!     vec![
//!         Detection::new("car", 0.5, 0.5, 0.2, 0.3),
//!         Detection::new("person", 0.2, 0.6, 0.1, 0.4),
//!     ],
//! )];
//!
//! let labels = LabelIndex::build(&results);
//! assert_eq!(labels.index_of("person"), Some(1));
//!
//! let batch = Batch::Detections(results);
//! assert_eq!(batch.object_count(), 2);
//! ```

mod bbox;
mod ids;
pub mod io_manifest;
mod labels;
mod model;
mod space;

pub use bbox::{BBoxCxCyWh, BBoxXYXY, PixelRect};
pub use ids::{AnnotationId, CategoryId, ImageId};
pub use labels::LabelIndex;
pub use model::{
    Batch, CaptionLength, CaptionResult, Detection, ExportFormat, ImageFile, ImageResult,
    ImageSize,
};
pub use space::{CoordinateSpace, Normalized, Pixel};

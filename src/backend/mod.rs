//! Vision backend seam.
//!
//! The engine only ever talks to a [`VisionBackend`]. Remote services are
//! reached through [`remote::HttpBackend`] (cargo feature `remote`); an
//! in-process model can be plugged in by implementing the trait directly.

#[cfg(feature = "remote")]
pub mod remote;

use crate::config::{BackendConfig, BackendMode};
use crate::error::{BackendError, MoonlabelError};
use crate::ir::{CaptionLength, Detection, ImageFile};

/// A source of detections and captions for single images.
///
/// Calls are blocking and made one at a time.
pub trait VisionBackend {
    /// Finds every instance of `label` in the image.
    ///
    /// Boxes are returned in normalized coordinates.
    fn detect(&mut self, image: &ImageFile, label: &str) -> Result<Vec<Detection>, BackendError>;

    /// Describes the image in prose.
    fn caption(&mut self, image: &ImageFile, length: CaptionLength)
        -> Result<String, BackendError>;
}

impl<T: VisionBackend + ?Sized> VisionBackend for Box<T> {
    fn detect(&mut self, image: &ImageFile, label: &str) -> Result<Vec<Detection>, BackendError> {
        (**self).detect(image, label)
    }

    fn caption(
        &mut self,
        image: &ImageFile,
        length: CaptionLength,
    ) -> Result<String, BackendError> {
        (**self).caption(image, length)
    }
}

/// Builds the backend a configuration describes.
///
/// Local mode has no built-in engine: embedders pass their own
/// [`VisionBackend`] instead, and this returns
/// [`MoonlabelError::BackendUnavailable`].
pub fn connect(config: &BackendConfig) -> Result<Box<dyn VisionBackend>, MoonlabelError> {
    config.validate()?;

    match config.mode {
        BackendMode::Local => Err(MoonlabelError::BackendUnavailable(
            "local mode needs an in-process model, and none is built into this binary".to_string(),
        )),
        BackendMode::Cloud | BackendMode::Station => connect_remote(config),
    }
}

#[cfg(feature = "remote")]
fn connect_remote(config: &BackendConfig) -> Result<Box<dyn VisionBackend>, MoonlabelError> {
    Ok(Box::new(remote::HttpBackend::new(config)?))
}

#[cfg(not(feature = "remote"))]
fn connect_remote(config: &BackendConfig) -> Result<Box<dyn VisionBackend>, MoonlabelError> {
    Err(MoonlabelError::BackendUnavailable(format!(
        "{} mode requires building with the `remote` feature",
        config.mode
    )))
}

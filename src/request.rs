//! Sequential detection and caption requests against a vision backend.
//!
//! Images are processed strictly one after another, and for detection one
//! backend call is made per label term. Results come back in input order,
//! which is what makes label indices deterministic downstream.
//!
//! A failed call never aborts the batch. What happens to the image is
//! decided by the [`FailurePolicy`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::backend::VisionBackend;
use crate::error::BackendError;
use crate::ir::{CaptionLength, CaptionResult, ImageFile, ImageResult};

/// What to do with an image when one of its detection calls fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Drop the image from the results and record it as failed.
    #[default]
    AbandonImage,
    /// Skip only the failed label; the image keeps its other detections.
    SkipLabel,
}

/// Images processed so far out of the batch size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed share of the batch in `[0, 1]`. An empty batch is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.processed, self.total)
    }
}

/// A backend call that failed for one image and label.
#[derive(Debug)]
pub struct ImageFailure {
    /// Position of the image in the input.
    pub index: usize,
    pub file_name: String,
    pub label: String,
    pub error: BackendError,
}

impl fmt::Display for ImageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (label '{}'): {}",
            self.file_name, self.label, self.error
        )
    }
}

/// Outcome of a detection run.
#[derive(Debug, Default)]
pub struct DetectionRun {
    /// Successfully processed images, in input order.
    pub results: Vec<ImageResult>,
    /// Input positions of `results`, parallel to it.
    pub indices: Vec<usize>,
    /// Images that were abandoned, one entry per image.
    pub failures: Vec<ImageFailure>,
    /// Labels skipped under [`FailurePolicy::SkipLabel`].
    pub skipped: Vec<ImageFailure>,
}

impl DetectionRun {
    /// True when there was input and none of it produced a result.
    pub fn all_failed(&self) -> bool {
        self.results.is_empty() && !self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

/// Drives a backend over a batch of images.
pub struct RequestOrchestrator<'b, B: VisionBackend + ?Sized> {
    backend: &'b mut B,
    policy: FailurePolicy,
}

impl<'b, B: VisionBackend + ?Sized> RequestOrchestrator<'b, B> {
    pub fn new(backend: &'b mut B) -> Self {
        Self {
            backend,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs one detection call per `(image, label)` pair.
    ///
    /// `on_progress` is called once after every image, whether it succeeded
    /// or not.
    pub fn detect_images<F>(
        &mut self,
        images: Vec<ImageFile>,
        labels: &[String],
        mut on_progress: F,
    ) -> DetectionRun
    where
        F: FnMut(Progress),
    {
        let total = images.len();
        let mut run = DetectionRun::default();

        for (index, image) in images.into_iter().enumerate() {
            let mut detections = Vec::new();
            let mut abandoned = None;

            for label in labels {
                debug!(file = %image.file_name, label = %label, "requesting detections");
                match self.backend.detect(&image, label) {
                    Ok(found) => {
                        debug!(file = %image.file_name, label = %label, count = found.len(), "detections received");
                        detections.extend(found);
                    }
                    Err(error) => {
                        let failure = ImageFailure {
                            index,
                            file_name: image.file_name.clone(),
                            label: label.clone(),
                            error,
                        };
                        match self.policy {
                            FailurePolicy::AbandonImage => {
                                warn!(%failure, "abandoning image");
                                abandoned = Some(failure);
                                break;
                            }
                            FailurePolicy::SkipLabel => {
                                warn!(%failure, "skipping label");
                                run.skipped.push(failure);
                            }
                        }
                    }
                }
            }

            match abandoned {
                Some(failure) => run.failures.push(failure),
                None => {
                    run.results.push(ImageResult::new(image, detections));
                    run.indices.push(index);
                }
            }

            on_progress(Progress {
                processed: index + 1,
                total,
            });
        }

        info!(
            images = total,
            succeeded = run.results.len(),
            failed = run.failures.len(),
            "detection run finished"
        );
        run
    }

    /// Requests one caption per image.
    ///
    /// A failed call yields an empty caption, so every input image stays in
    /// the output.
    pub fn caption_images<F>(
        &mut self,
        images: Vec<ImageFile>,
        length: CaptionLength,
        mut on_progress: F,
    ) -> Vec<CaptionResult>
    where
        F: FnMut(Progress),
    {
        let total = images.len();
        let mut results = Vec::with_capacity(total);

        for (index, image) in images.into_iter().enumerate() {
            debug!(file = %image.file_name, length = length.name(), "requesting caption");
            let caption = match self.backend.caption(&image, length) {
                Ok(caption) => caption,
                Err(error) => {
                    warn!(file = %image.file_name, %error, "caption failed; keeping empty caption");
                    String::new()
                }
            };
            results.push(CaptionResult::new(image, caption));

            on_progress(Progress {
                processed: index + 1,
                total,
            });
        }

        info!(images = total, "caption run finished");
        results
    }
}

/// Splits a comma-separated label list into trimmed, non-empty terms.
///
/// ```
/// use moonlabel::request::parse_label_terms;
///
/// assert_eq!(parse_label_terms(" person, car,,"), ["person", "car"]);
/// ```
pub fn parse_label_terms(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

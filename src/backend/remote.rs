//! Blocking HTTP backend for the hosted service and self-hosted stations.
//!
//! Both speak the same JSON API:
//!
//! - `POST {base}/detect` with `{"image_url": <data url>, "object": <label>}`
//!   answers `{"objects": [{"x_min", "y_min", "x_max", "y_max"}]}` in
//!   normalized corners;
//! - `POST {base}/caption` with `{"image_url", "length", "stream": false}`
//!   answers `{"caption": "..."}`.
//!
//! Images travel inline as base64 data URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::VisionBackend;
use crate::config::{BackendConfig, BackendMode};
use crate::error::{BackendError, MoonlabelError};
use crate::ir::{CaptionLength, Detection, ImageFile};

/// Header carrying the API key in cloud mode.
pub const AUTH_HEADER: &str = "X-Moondream-Auth";

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    image_url: &'a str,
    object: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    objects: Vec<DetectedObject>,
}

#[derive(Debug, Deserialize)]
struct DetectedObject {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct CaptionRequest<'a> {
    image_url: &'a str,
    length: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    caption: String,
}

/// A [`VisionBackend`] reached over HTTP.
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Creates a backend for the cloud or station mode of `config`.
    pub fn new(config: &BackendConfig) -> Result<Self, MoonlabelError> {
        let base_url = config.base_url()?;
        let api_key = match config.mode {
            BackendMode::Cloud => config.api_key.clone(),
            BackendMode::Station | BackendMode::Local => None,
        };

        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build();
        let agent: ureq::Agent = agent_config.into();

        Ok(Self {
            agent,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");

        let mut request = self.agent.post(&url);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header(AUTH_HEADER, key);
        }

        let mut response = request.send_json(body).map_err(|source| match source {
            ureq::Error::StatusCode(status) => BackendError::Status {
                url: url.clone(),
                status,
            },
            other => BackendError::Transport {
                url: url.clone(),
                message: other.to_string(),
            },
        })?;

        response
            .body_mut()
            .read_json::<R>()
            .map_err(|source| BackendError::InvalidResponse {
                url,
                message: source.to_string(),
            })
    }
}

impl VisionBackend for HttpBackend {
    fn detect(&mut self, image: &ImageFile, label: &str) -> Result<Vec<Detection>, BackendError> {
        let image_url = data_url(image);
        let response: DetectResponse = self.post_json(
            "detect",
            &DetectRequest {
                image_url: &image_url,
                object: label,
            },
        )?;
        Ok(into_detections(response, label))
    }

    fn caption(
        &mut self,
        image: &ImageFile,
        length: CaptionLength,
    ) -> Result<String, BackendError> {
        let image_url = data_url(image);
        let response: CaptionResponse = self.post_json(
            "caption",
            &CaptionRequest {
                image_url: &image_url,
                length: length.api_value(),
                stream: false,
            },
        )?;
        Ok(response.caption)
    }
}

/// Encodes an image as a `data:<mime>;base64,...` URL.
pub fn data_url(image: &ImageFile) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type(),
        STANDARD.encode(&image.data)
    )
}

fn into_detections(response: DetectResponse, requested: &str) -> Vec<Detection> {
    response
        .objects
        .into_iter()
        .map(|object| {
            let label = object
                .label
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| requested.to_string());
            Detection::from_corners(label, object.x_min, object.y_min, object.x_max, object.y_max)
        })
        .collect()
}

//! Photo links to inline image attachments.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use sheetwright_shared::{Result, SheetwrightError};

use crate::ImageAttachment;

/// Maximum image size accepted (20 MB).
const MAX_IMAGE_SIZE: usize = 20 * 1024 * 1024;

/// Resolves a photo reference from a sheet cell into image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, link: &str) -> Result<ImageAttachment>;
}

/// Fetches photo links over HTTP.
pub struct HttpImageFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Sheetwright/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SheetwrightError::Network(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client, timeout })
    }
}

/// Guess a MIME type from the link's extension.
fn mime_from_link(link: &str) -> &'static str {
    let path = link.split(['?', '#']).next().unwrap_or(link).to_ascii_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, link: &str) -> Result<ImageAttachment> {
        let url = url::Url::parse(link.trim())
            .map_err(|e| SheetwrightError::validation(format!("invalid photo link '{link}': {e}")))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SheetwrightError::timeout("photo fetch", self.timeout)
            } else {
                SheetwrightError::Network(format!("failed to fetch photo {link}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetwrightError::Rejected {
                status: status.as_u16(),
                message: format!("photo {link} could not be fetched"),
            });
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_IMAGE_SIZE)
        {
            return Err(SheetwrightError::validation(format!(
                "photo {link} exceeds {MAX_IMAGE_SIZE} bytes"
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            SheetwrightError::Network(format!("failed to read photo {link}: {e}"))
        })?;
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(SheetwrightError::validation(format!(
                "photo {link} exceeds {MAX_IMAGE_SIZE} bytes"
            )));
        }

        debug!(size = bytes.len(), "fetched photo");
        Ok(ImageAttachment {
            mime: header_mime.unwrap_or_else(|| mime_from_link(link).to_string()),
            bytes: bytes.to_vec(),
        })
    }
}

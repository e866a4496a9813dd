//! Downloading and decoding source images.

use std::io::Read;

use image::RgbaImage;
use tracing::debug;

use crate::error::{MapError, Result};

const IMGUR_PREFIX: &str = "https://imgur.com/";
const IMGUR_DIRECT: &str = "https://i.imgur.com/";
const IMGUR_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Largest response body accepted from a remote server.
pub const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches the raw bytes behind a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Fetcher`] over HTTP(S).
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
            user_agent: format!("mapframe/{}", env!("CARGO_PKG_VERSION")),
            max_bytes: MAX_DOWNLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = match self.agent.get(url).set("User-Agent", &self.user_agent).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(MapError::NetworkFetch {
                    url: url.to_string(),
                    message: format!("server answered with HTTP {}", code),
                })
            }
            Err(e) => {
                return Err(MapError::NetworkFetch {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| MapError::NetworkFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(MapError::NetworkFetch {
                url: url.to_string(),
                message: format!("the image is larger than {} bytes", self.max_bytes),
            });
        }

        debug!(url, bytes = bytes.len(), "downloaded image");
        Ok(bytes)
    }
}

/// URLs to try, in order, for a user-supplied link.
///
/// Imgur page links are rewritten to direct image links, one per known
/// extension. Gallery links cannot be resolved and are rejected.
pub fn candidate_urls(url: &str) -> Result<Vec<String>> {
    let url = url.trim();
    let is_imgur = url
        .get(..IMGUR_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMGUR_PREFIX));
    if !is_imgur {
        return Ok(vec![url.to_string()]);
    }

    let rest = &url[IMGUR_PREFIX.len()..];
    if rest.contains("gallery/") {
        return Err(MapError::UnsupportedSource {
            message: "We do not support imgur gallery yet, please use direct link to image instead."
                .to_string(),
            help: Some("Right-click the image and copy its address".to_string()),
        });
    }

    Ok(IMGUR_EXTENSIONS
        .iter()
        .map(|ext| format!("{}{}.{}", IMGUR_DIRECT, rest, ext))
        .collect())
}

/// Download `url` and decode it.
///
/// Candidates from [`candidate_urls`] are tried in order until one decodes.
/// If at least one download succeeded the failure is reported as an invalid
/// image, otherwise the last download error is returned.
pub fn load_image(fetcher: &dyn Fetcher, url: &str) -> Result<RgbaImage> {
    let mut fetch_error = None;
    let mut downloaded = false;

    for candidate in candidate_urls(url)? {
        let bytes = match fetcher.fetch(&candidate) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(url = %candidate, error = %e, "download failed");
                fetch_error = Some(e);
                continue;
            }
        };
        downloaded = true;

        match image::load_from_memory(&bytes) {
            Ok(img) => return Ok(img.to_rgba8()),
            Err(e) => debug!(url = %candidate, error = %e, "not a decodable image"),
        }
    }

    match fetch_error {
        Some(e) if !downloaded => Err(e),
        _ => Err(MapError::InvalidImage {
            url: url.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher shared by the pipeline tests.

    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    use image::{ImageFormat, Rgba, RgbaImage};

    use super::Fetcher;
    use crate::error::{MapError, Result};

    #[derive(Default)]
    pub struct MemoryFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        pub fn with_image(self, url: &str, width: u32, height: u32) -> Self {
            self.with_body(url, png_bytes(width, height))
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl Fetcher for MemoryFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| MapError::NetworkFetch {
                    url: url.to_string(),
                    message: "server answered with HTTP 404".to_string(),
                })
        }
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([30, 120, 200, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }
}

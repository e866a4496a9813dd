//! Image acquisition and tiling.
//!
//! A render request flows through these stages:
//!
//! 1. [`source`]: resolve the link, download and decode it.
//! 2. [`SizeLimits`]: reject oversized sources.
//! 3. [`ScalingType`]: fit the image to the requested tile area.
//! 4. [`PosterImage`]: cut it into 128 × 128 tiles.
//! 5. [`ImageStore`]: write the tiles as PNG files.
//!
//! [`ImageRenderer`] drives the stages on the worker pool and hands registry
//! and host work to the main thread.

mod limits;
mod poster;
mod renderer;
mod scaling;
pub mod source;
mod store;

pub use limits::SizeLimits;
pub use poster::PosterImage;
pub use renderer::{ImageRenderer, PipelineConfig, RenderRequest, UpdateRequest};
pub use scaling::{center_on_canvas, ScalingType};
pub use source::{candidate_urls, load_image, Fetcher, HttpFetcher, MAX_DOWNLOAD_BYTES};
pub use store::ImageStore;

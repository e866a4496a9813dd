//! mapframe - images on game maps
//!
//! Fetches images from URLs, scales and cuts them into 128 × 128 map tiles,
//! and keeps a persistent registry of which player owns which map IDs.
//! A one-shot migrator imports saves from the pre-v3 format.
//!
//! The host game server owns one main thread. Registry state and host calls
//! stay on it; downloads, decoding and file IO run on a small worker pool
//! (see [`executor`]).

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod imaging;
pub mod migration;
pub mod output;
pub mod registry;
pub mod types;

pub use config::{DataDir, PluginConfig};
pub use error::{MapError, Result};
pub use executor::{MainThread, MainThreadHandle, RenderPool, RenderTask};
pub use host::{HeadlessHost, MapHost};
pub use imaging::{
    Fetcher, HttpFetcher, ImageRenderer, ImageStore, PipelineConfig, PosterImage, RenderRequest,
    ScalingType, SizeLimits, UpdateRequest,
};
pub use migration::{IdentityResolver, MigrationReport, MojangResolver, V3Migrator};
pub use registry::{MapRegistry, MapStore, QuotaLimits, Reservation};
pub use types::{
    ImageMap, MapId, MapKind, MapType, OwnerId, PosterGrid, MAX_POSTER_SIDE, TILE_SIZE,
};

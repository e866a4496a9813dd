pub mod completions;
pub mod delete;
pub mod list;
pub mod migrate;
pub mod rename;
pub mod render;
pub mod update;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{DataDir, PluginConfig};
use crate::error::Result;
use crate::executor::{MainThread, RenderPool};
use crate::host::HeadlessHost;
use crate::imaging::{HttpFetcher, ImageRenderer, ImageStore, PipelineConfig};
use crate::registry::{MapRegistry, MapStore};

/// mapframe - Render images onto map tiles and manage the map registry
#[derive(Parser, Debug)]
#[command(name = "mapframe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Plugin data directory (holds config.yml, images/ and maps/)
    #[arg(long, short = 'd', global = true, default_value = ".")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render an image from a URL into a new map or poster
    Render(render::RenderArgs),

    /// Redraw an existing map from a new image
    Update(update::UpdateArgs),

    /// List registered maps
    List(list::ListArgs),

    /// Delete a map from the registry
    Delete(delete::DeleteArgs),

    /// Rename a map
    Rename(rename::RenameArgs),

    /// Migrate pre-v3 map.yml and poster.yml into the registry
    Migrate(migrate::MigrateArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Data directory opened by a command: configuration, registry and a
/// headless host.
pub struct Session {
    pub data: DataDir,
    pub config: PluginConfig,
    pub registry: MapRegistry,
    pub host: HeadlessHost,
}

impl Session {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let data = DataDir::new(data_dir);
        let config = data.load_config()?;
        let registry = MapRegistry::open(MapStore::new(data.maps_dir()), config.quota_limits())?;
        Ok(Self {
            data,
            config,
            registry,
            host: HeadlessHost::new(),
        })
    }

    pub fn image_store(&self) -> ImageStore {
        ImageStore::new(self.data.images_dir())
    }

    /// A renderer downloading over HTTP and scheduling on `main`.
    pub fn renderer(&self, main: &MainThread) -> Result<ImageRenderer> {
        Ok(ImageRenderer::new(
            RenderPool::new()?,
            main.handle(),
            self.image_store(),
            Box::new(HttpFetcher::new()),
            PipelineConfig::from_config(&self.config),
        ))
    }
}

//! Render requests: from a URL to installed, registered map tiles.
//!
//! Each request runs on the [`RenderPool`]. Registry and host work is handed
//! to the main thread through a [`MainThreadHandle`]; the worker blocks until
//! the main thread answers, so a request always sees its stages in order:
//! reservation, tile files, renderer installation, registration.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{info, warn};

use crate::config::PluginConfig;
use crate::error::{MapError, Result};
use crate::executor::{MainThreadHandle, RenderPool, RenderTask};
use crate::registry::{MapRegistry, Reservation};
use crate::types::{
    ImageMap, MapId, MapKind, OwnerId, PosterGrid, MAX_POSTER_SIDE, TILE_SIZE,
};

use super::scaling::center_on_canvas;
use super::{load_image, Fetcher, ImageStore, PosterImage, ScalingType, SizeLimits};

/// Pipeline settings taken from the plugin configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub size_limits: SizeLimits,
    /// Keep the unsplit poster image next to its tiles.
    pub save_full_image: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            size_limits: config.size_limits(),
            save_full_image: config.save_full_image,
        }
    }
}

/// A request to render a new map.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    pub scaling: ScalingType,
    pub owner: OwnerId,
    /// Requested width in tiles.
    pub width: u32,
    /// Requested height in tiles.
    pub height: u32,
    /// Display name; the map type's default name when `None`.
    pub name: Option<String>,
    pub bypass_size_limit: bool,
}

impl RenderRequest {
    /// A 1 × 1 contained render with no name.
    pub fn new(url: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            url: url.into(),
            scaling: ScalingType::default(),
            owner,
            width: 1,
            height: 1,
            name: None,
            bypass_size_limit: false,
        }
    }

    pub fn scaling(mut self, scaling: ScalingType) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bypass_size_limit(mut self, bypass: bool) -> Self {
        self.bypass_size_limit = bypass;
        self
    }
}

/// A request to redraw an existing map from a new image.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub url: String,
    pub scaling: ScalingType,
    pub owner: OwnerId,
    /// Key of the map to redraw.
    pub target_key: String,
    pub bypass_size_limit: bool,
}

impl UpdateRequest {
    pub fn new(url: impl Into<String>, owner: OwnerId, target_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scaling: ScalingType::default(),
            owner,
            target_key: target_key.into(),
            bypass_size_limit: false,
        }
    }

    pub fn scaling(mut self, scaling: ScalingType) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn bypass_size_limit(mut self, bypass: bool) -> Self {
        self.bypass_size_limit = bypass;
        self
    }
}

/// Runs render and update requests off the main thread.
pub struct ImageRenderer {
    pool: RenderPool,
    pipeline: Arc<Pipeline>,
}

impl ImageRenderer {
    pub fn new(
        pool: RenderPool,
        main: MainThreadHandle,
        store: ImageStore,
        fetcher: Box<dyn Fetcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pool,
            pipeline: Arc::new(Pipeline {
                main,
                store,
                fetcher,
                config,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.pipeline.config
    }

    pub fn store(&self) -> &ImageStore {
        &self.pipeline.store
    }

    /// Render a new single map or poster.
    pub fn render(&self, request: RenderRequest) -> RenderTask<ImageMap> {
        let pipeline = Arc::clone(&self.pipeline);
        self.pool.submit(move || pipeline.render(request))
    }

    /// Redraw an existing map in place, keeping its IDs and geometry.
    pub fn update(&self, request: UpdateRequest) -> RenderTask<ImageMap> {
        let pipeline = Arc::clone(&self.pipeline);
        self.pool.submit(move || pipeline.update(request))
    }
}

struct Pipeline {
    main: MainThreadHandle,
    store: ImageStore,
    fetcher: Box<dyn Fetcher>,
    config: PipelineConfig,
}

impl Pipeline {
    fn render(&self, request: RenderRequest) -> Result<ImageMap> {
        info!(url = %request.url, owner = %request.owner, "Rendering image");
        let source = self.load(&request.url, request.bypass_size_limit)?;
        let poster = layout(&source, request.scaling, request.width, request.height)?;

        let RenderRequest { owner, name, .. } = request;
        if poster.is_single_tile() {
            let tile = center_on_canvas(poster.image(), TILE_SIZE, TILE_SIZE);
            self.finish(owner, name, (1, 1), vec![tile], None)
        } else {
            let tiles = poster.tiles();
            let size = (poster.columns(), poster.rows());
            self.finish(owner, name, size, tiles, Some(poster.image()))
        }
    }

    /// Reserve IDs, write the tiles, then install and register on the main
    /// thread.
    fn finish(
        &self,
        owner: OwnerId,
        name: Option<String>,
        (columns, rows): (u32, u32),
        tiles: Vec<RgbaImage>,
        full: Option<&RgbaImage>,
    ) -> Result<ImageMap> {
        let count = tiles.len();
        let reservation = self
            .main
            .call(move |registry, _| registry.reserve(count, owner))??;
        let held = HeldReservation::new(self.main.clone(), reservation);
        let ids = held.ids().to_vec();

        let kind = kind_for(columns, rows, &ids)?;
        self.save(&ids, &tiles, full)?;

        self.main.call(move |registry, host| {
            for (id, tile) in ids.iter().zip(&tiles) {
                host.install_renderer(*id, tile);
            }
            held.commit(registry, name.as_deref(), kind)
        })?
    }

    fn update(&self, request: UpdateRequest) -> Result<ImageMap> {
        let UpdateRequest {
            url,
            scaling,
            owner,
            target_key,
            bypass_size_limit,
        } = request;

        let key = target_key.clone();
        let target = self
            .main
            .call(move |registry, _| registry.find_by_key(owner, &key).cloned())?
            .ok_or_else(|| MapError::NotFound {
                message: format!("You don't have a map named '{}'.", target_key),
            })?;

        info!(url = %url, %owner, key = %target.key, "Updating map");
        let source = self.load(&url, bypass_size_limit)?;

        let (columns, rows) = target.dimensions();
        let (width, height) = tile_area(columns, rows)?;
        let scaled = scaling.resize(&source, width, height);
        let poster = PosterImage::new(center_on_canvas(&scaled, width, height));
        let tiles = poster.tiles();
        let full = target.grid().map(|_| poster.image());
        self.save(target.ids(), &tiles, full)?;

        let ids = target.ids().to_vec();
        self.main.call(move |_, host| {
            for (id, tile) in ids.iter().zip(&tiles) {
                host.install_renderer(*id, tile);
            }
        })?;

        Ok(target)
    }

    fn load(&self, url: &str, bypass_size_limit: bool) -> Result<RgbaImage> {
        let source = load_image(self.fetcher.as_ref(), url)?;
        self.config
            .size_limits
            .check(source.width(), source.height(), bypass_size_limit)?;
        Ok(source)
    }

    fn save(&self, ids: &[MapId], tiles: &[RgbaImage], full: Option<&RgbaImage>) -> Result<()> {
        self.store.save_tiles(ids, tiles)?;
        if let (true, Some(image), Some(first), Some(last)) =
            (self.config.save_full_image, full, ids.first(), ids.last())
        {
            self.store.save_full(*first, *last, image)?;
        }
        Ok(())
    }
}

/// A reservation owned by a worker.
///
/// Dropping it before [`HeldReservation::commit`] releases it on the main
/// thread, including when the worker unwinds.
struct HeldReservation {
    main: MainThreadHandle,
    reservation: Option<Reservation>,
}

impl HeldReservation {
    fn new(main: MainThreadHandle, reservation: Reservation) -> Self {
        Self {
            main,
            reservation: Some(reservation),
        }
    }

    fn ids(&self) -> &[MapId] {
        self.reservation
            .as_ref()
            .map(Reservation::ids)
            .unwrap_or_default()
    }

    /// Register the map. Must run on the main thread.
    fn commit(
        mut self,
        registry: &mut MapRegistry,
        name: Option<&str>,
        kind: MapKind,
    ) -> Result<ImageMap> {
        match self.reservation.take() {
            Some(reservation) => registry.commit(reservation, name, kind),
            None => Err(MapError::InvalidMap {
                message: "reservation was already used or released".to_string(),
            }),
        }
    }
}

impl Drop for HeldReservation {
    fn drop(&mut self) {
        let Some(reservation) = self.reservation.take() else {
            return;
        };
        if let Err(e) = self.main.execute(move |registry, _| registry.release(reservation)) {
            warn!("Could not release reserved map IDs: {}", e);
        }
    }
}

/// Scale `source` for a `width` × `height` tile request.
///
/// A scaled 1 × 1 request always yields one tile. Unscaled images keep their
/// size and take as many tiles as they cover.
fn layout(
    source: &RgbaImage,
    scaling: ScalingType,
    width: u32,
    height: u32,
) -> Result<PosterImage> {
    let width = width.max(1);
    let height = height.max(1);
    if width > MAX_POSTER_SIDE || height > MAX_POSTER_SIDE {
        return Err(MapError::PosterTooLarge {
            columns: width,
            rows: height,
        });
    }
    let (pixel_width, pixel_height) = tile_area(width, height)?;
    Ok(PosterImage::new(scaling.resize(source, pixel_width, pixel_height)))
}

/// Pixel size of a `columns` × `rows` tile grid.
fn tile_area(columns: u32, rows: u32) -> Result<(u32, u32)> {
    match (columns.checked_mul(TILE_SIZE), rows.checked_mul(TILE_SIZE)) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(MapError::PosterTooLarge { columns, rows }),
    }
}

fn kind_for(columns: u32, rows: u32, ids: &[MapId]) -> Result<MapKind> {
    match ids {
        [id] if columns == 1 && rows == 1 => Ok(MapKind::Single { id: *id }),
        _ => PosterGrid::new(columns, rows, ids.to_vec()).map(MapKind::Poster),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MainThread;
    use crate::host::HeadlessHost;
    use crate::imaging::source::testing::MemoryFetcher;
    use crate::registry::{MapRegistry, MapStore, QuotaLimits};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct Fixture {
        dir: TempDir,
        main: MainThread,
        registry: MapRegistry,
        host: HeadlessHost,
        renderer: ImageRenderer,
    }

    impl Fixture {
        fn new(fetcher: MemoryFetcher, limits: QuotaLimits, config: PipelineConfig) -> Self {
            let dir = TempDir::new().unwrap();
            Self::with_images(dir, "images", fetcher, limits, config)
        }

        fn with_images(
            dir: TempDir,
            images: &str,
            fetcher: MemoryFetcher,
            limits: QuotaLimits,
            config: PipelineConfig,
        ) -> Self {
            let main = MainThread::new();
            let registry =
                MapRegistry::open(MapStore::new(dir.path().join("maps")), limits).unwrap();
            let renderer = ImageRenderer::new(
                RenderPool::with_threads(2).unwrap(),
                main.handle(),
                ImageStore::new(dir.path().join(images)),
                Box::new(fetcher),
                config,
            );
            Self {
                dir,
                main,
                registry,
                host: HeadlessHost::new(),
                renderer,
            }
        }

        fn render(&mut self, request: RenderRequest) -> Result<ImageMap> {
            let task = self.renderer.render(request);
            self.main.run_until(&mut self.registry, &mut self.host, task)
        }

        fn update(&mut self, request: UpdateRequest) -> Result<ImageMap> {
            let task = self.renderer.update(request);
            self.main.run_until(&mut self.registry, &mut self.host, task)
        }
    }

    const CAT: &str = "https://example.com/cat.png";
    const WIDE: &str = "https://example.com/wide.png";

    fn fetcher() -> MemoryFetcher {
        MemoryFetcher::new()
            .with_image(CAT, 64, 48)
            .with_image(WIDE, 300, 130)
    }

    #[test]
    fn test_render_single_map() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::default(), PipelineConfig::default());
        let owner = Uuid::new_v4();

        let map = fx.render(RenderRequest::new(CAT, owner).name("Cat")).unwrap();

        assert_eq!(map.kind, MapKind::Single { id: 0 });
        assert_eq!(map.key, "cat");
        assert_eq!(fx.host.installed(), &[0]);
        assert!(fx.renderer.store().has_tile(0));
        assert_eq!(fx.renderer.store().load_tile(0).unwrap().dimensions(), (128, 128));
        assert_eq!(fx.registry.find_by_key(owner, "cat"), Some(&map));
    }

    #[test]
    fn test_render_poster_with_full_image() {
        let config = PipelineConfig {
            save_full_image: true,
            ..Default::default()
        };
        let mut fx = Fixture::new(fetcher(), QuotaLimits::default(), config);
        let owner = Uuid::new_v4();

        let map = fx
            .render(
                RenderRequest::new(WIDE, owner)
                    .scaling(ScalingType::Stretched)
                    .size(2, 2),
            )
            .unwrap();

        assert_eq!(map.dimensions(), (2, 2));
        assert_eq!(map.ids(), &[0, 1, 2, 3]);
        assert_eq!(map.name, "Poster");
        assert_eq!(fx.host.installed(), &[0, 1, 2, 3]);
        for id in 0..4 {
            assert!(fx.renderer.store().has_tile(id));
        }
        assert!(fx.dir.path().join("images/_0-3.png").is_file());
    }

    #[test]
    fn test_unscaled_image_keeps_its_size() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::default(), PipelineConfig::default());
        let map = fx
            .render(RenderRequest::new(WIDE, Uuid::new_v4()).scaling(ScalingType::None))
            .unwrap();
        // 300 × 130 pixels cover 3 × 2 tiles.
        assert_eq!(map.dimensions(), (3, 2));
        assert_eq!(fx.registry.next_id(), 6);
    }

    #[test]
    fn test_owner_quota_allocates_nothing() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::new(3, 0), PipelineConfig::default());
        let owner = Uuid::new_v4();

        let err = fx
            .render(RenderRequest::new(WIDE, owner).size(2, 2))
            .unwrap_err();

        assert!(matches!(err, MapError::OwnerQuota { limit: 3 }));
        assert_eq!(fx.registry.next_id(), 0);
        assert!(fx.registry.is_empty());
        assert!(fx.host.installed().is_empty());
        assert!(!fx.renderer.store().has_tile(0));
    }

    #[test]
    fn test_size_limit_and_bypass() {
        let config = PipelineConfig {
            size_limits: SizeLimits::new(100, 100),
            save_full_image: false,
        };
        let mut fx = Fixture::new(fetcher(), QuotaLimits::default(), config);
        let owner = Uuid::new_v4();

        let err = fx.render(RenderRequest::new(WIDE, owner)).unwrap_err();
        assert_eq!(err.to_string(), "The image is too wide!");
        assert_eq!(fx.registry.next_id(), 0);

        let map = fx
            .render(RenderRequest::new(WIDE, owner).bypass_size_limit(true))
            .unwrap();
        assert_eq!(map.tile_count(), 1);
    }

    #[test]
    fn test_io_failure_releases_reservation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blocked"), b"not a directory").unwrap();
        let mut fx = Fixture::with_images(
            dir,
            "blocked",
            fetcher(),
            QuotaLimits::new(1, 0),
            PipelineConfig::default(),
        );
        let owner = Uuid::new_v4();

        let err = fx.render(RenderRequest::new(CAT, owner)).unwrap_err();
        assert!(matches!(err, MapError::Io { .. }));
        assert!(fx.registry.is_empty());
        // The reserved ID is gone but it no longer counts against the quota.
        assert!(fx.registry.check_quota(1, owner).is_ok());
    }

    #[test]
    fn test_update_rewrites_same_ids() {
        let fetcher = fetcher().with_image("https://example.com/new.png", 512, 128);
        let mut fx = Fixture::new(fetcher, QuotaLimits::default(), PipelineConfig::default());
        let owner = Uuid::new_v4();

        let poster = fx
            .render(RenderRequest::new(WIDE, owner).size(2, 1).name("Banner"))
            .unwrap();
        let before = fx.registry.next_id();

        let updated = fx
            .update(UpdateRequest::new("https://example.com/new.png", owner, "banner"))
            .unwrap();

        assert_eq!(updated.ids(), poster.ids());
        assert_eq!(fx.registry.next_id(), before);
        assert_eq!(fx.host.installed(), &[0, 1, 0, 1]);
    }

    #[test]
    fn test_update_unknown_map() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::default(), PipelineConfig::default());
        let err = fx
            .update(UpdateRequest::new(CAT, Uuid::new_v4(), "nothing"))
            .unwrap_err();
        assert!(matches!(err, MapError::NotFound { .. }));
    }

    #[test]
    fn test_layout_single_for_scaled_one_by_one() {
        let source = RgbaImage::new(1000, 300);
        let poster = layout(&source, ScalingType::Covered, 1, 1).unwrap();
        assert!(poster.is_single_tile());
        let poster = layout(&source, ScalingType::Contained, 4, 2).unwrap();
        assert_eq!((poster.columns(), poster.rows()), (4, 2));
    }

    #[test]
    fn test_layout_rejects_oversized_grid() {
        let source = RgbaImage::new(10, 10);
        let err = layout(&source, ScalingType::None, 33_554_432, 1).unwrap_err();
        assert!(matches!(
            err,
            MapError::PosterTooLarge {
                columns: 33_554_432,
                rows: 1
            }
        ));
        assert!(layout(&source, ScalingType::Stretched, 1, MAX_POSTER_SIDE + 1).is_err());
        assert!(matches!(
            tile_area(u32::MAX, 1),
            Err(MapError::PosterTooLarge { .. })
        ));
    }

    #[test]
    fn test_oversized_render_allocates_nothing() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::default(), PipelineConfig::default());
        let err = fx
            .render(RenderRequest::new(CAT, Uuid::new_v4()).size(MAX_POSTER_SIDE + 1, 1))
            .unwrap_err();
        assert!(matches!(err, MapError::PosterTooLarge { .. }));
        assert_eq!(fx.registry.next_id(), 0);
    }

    #[test]
    fn test_dropped_reservation_is_released() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::new(2, 0), PipelineConfig::default());
        let owner = Uuid::new_v4();

        let reservation = fx.registry.reserve(2, owner).unwrap();
        let held = HeldReservation::new(fx.main.handle(), reservation);
        assert_eq!(held.ids(), &[0, 1]);
        assert!(fx.registry.check_quota(1, owner).is_err());

        drop(held);
        fx.main.pump(&mut fx.registry, &mut fx.host);
        assert!(fx.registry.check_quota(2, owner).is_ok());
        assert_eq!(fx.registry.next_id(), 2);
    }

    #[test]
    fn test_committed_reservation_is_kept() {
        let mut fx = Fixture::new(fetcher(), QuotaLimits::new(1, 0), PipelineConfig::default());
        let owner = Uuid::new_v4();

        let reservation = fx.registry.reserve(1, owner).unwrap();
        let held = HeldReservation::new(fx.main.handle(), reservation);
        let map = held
            .commit(&mut fx.registry, Some("Kept"), MapKind::Single { id: 0 })
            .unwrap();
        assert_eq!(fx.main.pump(&mut fx.registry, &mut fx.host), 0);
        assert_eq!(fx.registry.find_by_key(owner, "kept"), Some(&map));
        assert!(fx.registry.check_quota(1, owner).is_err());
    }
}

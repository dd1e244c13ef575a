//! Level-of-detail media resolution.
//!
//! Maps the current map zoom and a marker coordinate to the media the
//! player should show:
//!
//! ```text
//!   zoom < cluster_zoom                 Global    output/L0_global.mp4
//!   cluster_zoom <= zoom < marker_zoom  Regional  output/{L1|L2}/z{z}_x{x}_y{y}.mp4
//!   zoom >= marker_zoom                 Item      best media of the item
//! ```
//!
//! Inside the regional band a second, independent threshold on the live map
//! zoom picks between the coarse (z5, `L1`) and fine (z8, `L2`) tile grids.
//!
//! The resolver is a pure function of its arguments. It holds only its
//! configuration and can be shared across threads and called from any
//! number of event handlers at once.

mod config;

pub use config::{
    LodConfig, RegionalLevel, DEFAULT_CLUSTER_ZOOM, DEFAULT_MARKER_ZOOM, DEFAULT_SECONDARY_ZOOM,
};

use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::coord::{to_tile_address, CoordError, LatLng, TileAddress};
use crate::item::Item;

/// Precondition violations. "No media" is never an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// The item carries no coordinate.
    #[error("Item '{title}' has no coordinates")]
    InvalidItem { title: String },

    /// The coordinate cannot be projected.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordError),
}

/// Level of geographic aggregation at which media is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailTier {
    Global,
    Regional,
    Item,
}

impl DetailTier {
    /// Classifies a zoom value.
    ///
    /// Boundaries belong to the more detailed tier: `zoom == cluster_zoom` is
    /// Regional and `zoom == marker_zoom` is Item.
    pub fn classify(zoom: f64, config: &LodConfig) -> Self {
        if zoom < config.cluster_zoom {
            DetailTier::Global
        } else if zoom < config.marker_zoom {
            DetailTier::Regional
        } else {
            DetailTier::Item
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DetailTier::Global => "global",
            DetailTier::Regional => "regional",
            DetailTier::Item => "item",
        }
    }
}

impl fmt::Display for DetailTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Zoom values a resolution depends on.
///
/// `zoom` selects the tier; `live_zoom` is the map's zoom at call time and
/// selects the regional grid. Host UIs usually pass the same value for both,
/// which is what `From<f64>` does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub zoom: f64,
    pub live_zoom: f64,
}

impl ZoomState {
    pub fn new(zoom: f64, live_zoom: f64) -> Self {
        Self { zoom, live_zoom }
    }
}

impl From<f64> for ZoomState {
    fn from(zoom: f64) -> Self {
        Self {
            zoom,
            live_zoom: zoom,
        }
    }
}

impl From<(f64, f64)> for ZoomState {
    fn from((zoom, live_zoom): (f64, f64)) -> Self {
        Self { zoom, live_zoom }
    }
}

/// Path handed to the media player.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath(String);

impl ResourcePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves zoom + coordinate + item to a resource path.
#[derive(Debug, Clone, Default)]
pub struct LodResolver {
    config: LodConfig,
}

impl LodResolver {
    pub fn new(config: LodConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Classifies a zoom value with this resolver's thresholds.
    pub fn tier(&self, zoom: f64) -> DetailTier {
        DetailTier::classify(zoom, &self.config)
    }

    /// Resolves the media for `item` shown at `coord`.
    ///
    /// Returns `Ok(None)` when nothing is playable; callers clear the player
    /// in that case.
    ///
    /// # Errors
    ///
    /// `InvalidCoordinate` if the zoom is in the regional band and `coord`
    /// is outside the Web Mercator range. The other tiers never look at
    /// `coord`.
    pub fn resolve(
        &self,
        zoom: impl Into<ZoomState>,
        coord: LatLng,
        item: &Item,
    ) -> Result<Option<ResourcePath>, ResolveError> {
        let zoom = zoom.into();
        let tier = self.tier(zoom.zoom);
        let tiered = match tier {
            DetailTier::Global => Some(self.global_path()),
            DetailTier::Regional => Some(self.regional_path(coord, zoom.live_zoom)?),
            DetailTier::Item => None,
        };

        let resolved = tiered.or_else(|| item.best_media().map(|p| ResourcePath(p.to_string())));
        trace!(
            zoom = zoom.zoom,
            live_zoom = zoom.live_zoom,
            tier = %tier,
            title = %item.title,
            path = ?resolved,
            "Resolved media"
        );
        Ok(resolved)
    }

    /// Resolves using the item's own coordinate.
    ///
    /// # Errors
    ///
    /// `InvalidItem` if the item has no coordinate.
    pub fn resolve_item(
        &self,
        zoom: impl Into<ZoomState>,
        item: &Item,
    ) -> Result<Option<ResourcePath>, ResolveError> {
        let coord = item.coords.ok_or_else(|| ResolveError::InvalidItem {
            title: item.title.clone(),
        })?;
        self.resolve(zoom, coord, item)
    }

    /// Regional grid level selected by the live map zoom.
    pub fn regional_level(&self, live_zoom: f64) -> &RegionalLevel {
        if live_zoom >= self.config.secondary_zoom {
            &self.config.fine
        } else {
            &self.config.coarse
        }
    }

    /// Tile address of `coord` on the grid selected by `live_zoom`.
    pub fn regional_tile(&self, coord: LatLng, live_zoom: f64) -> Result<TileAddress, CoordError> {
        to_tile_address(coord, self.regional_level(live_zoom).zoom)
    }

    /// `{root}/L0_global.{ext}`
    pub fn global_path(&self) -> ResourcePath {
        ResourcePath(format!(
            "{}/L0_global.{}",
            self.config.output_root, self.config.extension
        ))
    }

    /// `{root}/{label}/z{z}_x{x}_y{y}.{ext}` for a tile on a regional level.
    pub fn tile_path(&self, level: &RegionalLevel, tile: &TileAddress) -> ResourcePath {
        ResourcePath(format!(
            "{}/{}/{}.{}",
            self.config.output_root,
            level.label,
            tile.file_stem(),
            self.config.extension
        ))
    }

    fn regional_path(&self, coord: LatLng, live_zoom: f64) -> Result<ResourcePath, CoordError> {
        let level = self.regional_level(live_zoom);
        let tile = to_tile_address(coord, level.zoom)?;
        Ok(self.tile_path(level, &tile))
    }
}

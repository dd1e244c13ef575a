//! Coordinate types and validation bounds.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level accepted for tile addressing.
pub const MAX_ZOOM: u8 = 22;

/// Errors raised by coordinate conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside the Web Mercator range or not finite.
    #[error("Invalid latitude: {0} (must be within {MIN_LAT}..={MAX_LAT})")]
    InvalidLatitude(f64),

    /// Longitude is outside -180..=180 or not finite.
    #[error("Invalid longitude: {0} (must be within {MIN_LON}..={MAX_LON})")]
    InvalidLongitude(f64),

    /// Zoom level is above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (max: {MAX_ZOOM})")]
    InvalidZoom(u8),
}

/// A WGS84 coordinate in degrees.
///
/// Serialized as a `[lat, lng]` pair, which is how item documents carry
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new coordinate without validation.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks that the coordinate can be projected with Web Mercator.
    ///
    /// NaN fails both range checks, so non-finite values are rejected too.
    pub fn validate(&self) -> Result<(), CoordError> {
        if !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(CoordError::InvalidLatitude(self.lat));
        }
        if !(MIN_LON..=MAX_LON).contains(&self.lng) {
            return Err(CoordError::InvalidLongitude(self.lng));
        }
        Ok(())
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(c: LatLng) -> Self {
        [c.lat, c.lng]
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lng)
    }
}

/// Slippy-map tile address.
///
/// - `x`: column, west to east (0 to 2^zoom - 1)
/// - `y`: row, north to south (0 to 2^zoom - 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    /// Creates a tile address.
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Identifier used in output file names: `z{zoom}_x{x}_y{y}`.
    pub fn file_stem(&self) -> String {
        format!("z{}_x{}_y{}", self.zoom, self.x, self.y)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

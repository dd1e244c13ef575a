//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator slippy-map tile addresses. The resolver uses this to pick
//! regional videos and the render planner uses it to group items into tiles,
//! so both always agree on which tile a coordinate falls in.

mod types;

pub use types::{
    CoordError, LatLng, TileAddress, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts a geographic coordinate to a tile address.
///
/// # Arguments
///
/// * `coord` - Latitude in -85.05112878..=85.05112878, longitude in -180..=180
/// * `zoom` - Zoom level (0 to 22)
///
/// # Returns
///
/// A `Result` containing the tile address or an error if inputs are invalid.
#[inline]
pub fn to_tile_address(coord: LatLng, zoom: u8) -> Result<TileAddress, CoordError> {
    coord.validate()?;
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    // Number of tiles along each axis at this zoom level
    let n = 2.0_f64.powi(zoom as i32);
    // lng = 180 and the southern bound land exactly on the far edge
    let last = (1u32 << zoom) - 1;

    let x = (((coord.lng + 180.0) / 360.0 * n).floor() as u32).min(last);

    // ln(tan φ + sec φ) is the Mercator ordinate of φ
    let lat_rad = coord.lat * PI / 180.0;
    let mercator = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    let y = (((1.0 - mercator / PI) / 2.0 * n).floor().max(0.0) as u32).min(last);

    Ok(TileAddress { zoom, x, y })
}

/// Converts a tile address back to geographic coordinates.
///
/// Returns the coordinate of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lng(tile: &TileAddress) -> LatLng {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lng = tile.x as f64 / n * 360.0 - 180.0;

    // Inverse Web Mercator
    let y = tile.y as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    LatLng { lat, lng }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kyoto_area_at_zoom_8() {
        let tile = to_tile_address(LatLng::new(35.0, 135.0), 8).unwrap();
        assert_eq!(tile, TileAddress::new(8, 224, 101));
    }

    #[test]
    fn test_kyoto_area_at_zoom_5() {
        let tile = to_tile_address(LatLng::new(35.0, 135.0), 5).unwrap();
        assert_eq!(tile, TileAddress::new(5, 28, 12));
    }

    #[test]
    fn test_new_york_city_at_zoom_16() {
        let tile = to_tile_address(LatLng::new(40.7128, -74.0060), 16).unwrap();
        assert_eq!(tile.y, 24640);
        assert_eq!(tile.x, 19295);
        assert_eq!(tile.zoom, 16);
    }

    #[test]
    fn test_origin_at_zoom_0() {
        let tile = to_tile_address(LatLng::new(0.0, 0.0), 0).unwrap();
        assert_eq!(tile, TileAddress::new(0, 0, 0));
    }

    #[test]
    fn test_repeated_conversion_is_stable() {
        let coord = LatLng::new(43.06417, 141.34694);
        let first = to_tile_address(coord, 8).unwrap();
        let second = to_tile_address(coord, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_antimeridian_stays_in_range() {
        let tile = to_tile_address(LatLng::new(0.0, 180.0), 8).unwrap();
        assert_eq!(tile.x, 255);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_address(LatLng::new(90.0, 0.0), 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_nan_latitude_rejected() {
        let result = to_tile_address(LatLng::new(f64::NAN, 0.0), 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = to_tile_address(LatLng::new(10.0, 181.0), 10);
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_address(LatLng::new(10.0, 10.0), 23);
        assert_eq!(result, Err(CoordError::InvalidZoom(23)));
    }

    #[test]
    fn test_file_stem_format() {
        let tile = TileAddress::new(8, 224, 101);
        assert_eq!(tile.file_stem(), "z8_x224_y101");
        assert_eq!(tile.to_string(), "8/224/101");
    }

    #[test]
    fn test_latlng_serde_as_pair() {
        let coord: LatLng = serde_json::from_str("[35.5, 139.25]").unwrap();
        assert_eq!(coord, LatLng::new(35.5, 139.25));
        assert_eq!(serde_json::to_string(&coord).unwrap(), "[35.5,139.25]");
    }

    #[test]
    fn test_tile_to_lat_lng_northwest_corner() {
        let tile = to_tile_address(LatLng::new(35.0, 135.0), 8).unwrap();
        let corner = tile_to_lat_lng(&tile);

        assert!(corner.lat >= 35.0, "corner should be north of the point");
        assert!(corner.lng <= 135.0, "corner should be west of the point");
        assert!((corner.lat - 35.0).abs() < 1.5);
        assert!((corner.lng - 135.0).abs() < 1.5);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_tile_in_bounds(
                lat in -85.05..85.05_f64,
                lng in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let tile = to_tile_address(LatLng::new(lat, lng), zoom)?;
                let max_tile = 2u32.pow(zoom as u32);

                prop_assert!(tile.x < max_tile, "x {} exceeds {} at zoom {}", tile.x, max_tile, zoom);
                prop_assert!(tile.y < max_tile, "y {} exceeds {} at zoom {}", tile.y, max_tile, zoom);
                prop_assert_eq!(tile.zoom, zoom);
            }

            #[test]
            fn test_point_lies_inside_its_tile(
                lat in -85.0..85.0_f64,
                lng in -179.9..179.9_f64,
                zoom in 0u8..=16
            ) {
                let tile = to_tile_address(LatLng::new(lat, lng), zoom)?;
                let nw = tile_to_lat_lng(&tile);
                let se = tile_to_lat_lng(&TileAddress::new(zoom, tile.x + 1, tile.y + 1));

                prop_assert!(lng >= nw.lng - 1e-9 && lng <= se.lng + 1e-9);
                prop_assert!(lat <= nw.lat + 1e-9 && lat >= se.lat - 1e-9);
            }

            #[test]
            fn test_longitude_monotonic(
                lat in 0.0..1.0_f64,
                lng1 in -180.0..-90.0_f64,
                lng2 in -90.0..0.0_f64,
                zoom in 10u8..=15
            ) {
                let tile1 = to_tile_address(LatLng::new(lat, lng1), zoom)?;
                let tile2 = to_tile_address(LatLng::new(lat, lng2), zoom)?;
                prop_assert!(tile1.x < tile2.x);
            }

            #[test]
            fn test_reject_invalid_latitude(
                lat in -90.0..-85.06_f64,
                lng in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let result = to_tile_address(LatLng::new(lat, lng), zoom);
                prop_assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
            }
        }
    }
}

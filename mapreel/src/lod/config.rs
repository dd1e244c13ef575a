//! Resolver thresholds and output layout.

/// Default zoom at which the map switches from the global overview to
/// regional clusters.
pub const DEFAULT_CLUSTER_ZOOM: f64 = 7.0;

/// Default zoom at which individual markers take over.
pub const DEFAULT_MARKER_ZOOM: f64 = 12.0;

/// Default live-zoom threshold for switching to the fine regional grid.
pub const DEFAULT_SECONDARY_ZOOM: f64 = 9.0;

/// One regional tile grid: the tile zoom and its directory label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalLevel {
    pub zoom: u8,
    pub label: String,
}

impl RegionalLevel {
    pub fn new(zoom: u8, label: impl Into<String>) -> Self {
        Self {
            zoom,
            label: label.into(),
        }
    }

    /// z5 tiles under `L1`.
    pub fn coarse() -> Self {
        Self::new(5, "L1")
    }

    /// z8 tiles under `L2`.
    pub fn fine() -> Self {
        Self::new(8, "L2")
    }
}

/// Resolver configuration.
///
/// `cluster_zoom`/`marker_zoom` split the zoom range into tiers, while
/// `secondary_zoom` is compared against the live map zoom to choose a
/// regional grid. They are separate knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct LodConfig {
    pub cluster_zoom: f64,
    pub marker_zoom: f64,
    pub secondary_zoom: f64,
    pub coarse: RegionalLevel,
    pub fine: RegionalLevel,
    /// Directory prefix of generated media.
    pub output_root: String,
    /// File extension of generated media, without the dot.
    pub extension: String,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            cluster_zoom: DEFAULT_CLUSTER_ZOOM,
            marker_zoom: DEFAULT_MARKER_ZOOM,
            secondary_zoom: DEFAULT_SECONDARY_ZOOM,
            coarse: RegionalLevel::coarse(),
            fine: RegionalLevel::fine(),
            output_root: "output".to_string(),
            extension: "mp4".to_string(),
        }
    }
}

impl LodConfig {
    /// Regional levels from coarse to fine.
    pub fn regional_levels(&self) -> [&RegionalLevel; 2] {
        [&self.coarse, &self.fine]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LodConfig::default();
        assert_eq!(config.cluster_zoom, 7.0);
        assert_eq!(config.marker_zoom, 12.0);
        assert_eq!(config.secondary_zoom, 9.0);
        assert_eq!(config.coarse, RegionalLevel::new(5, "L1"));
        assert_eq!(config.fine, RegionalLevel::new(8, "L2"));
        assert_eq!(config.output_root, "output");
        assert_eq!(config.extension, "mp4");
    }

    #[test]
    fn test_regional_levels_order() {
        let config = LodConfig::default();
        let [coarse, fine] = config.regional_levels();
        assert!(coarse.zoom < fine.zoom);
    }
}

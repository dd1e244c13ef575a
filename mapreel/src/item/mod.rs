//! Points of interest and their media.
//!
//! Items are loaded once from a JSON document and never mutated afterwards.
//! The [`ItemCatalog`] owns them and doubles as the dispatch table used by
//! click handlers: a marker or popup carries only the item title, and the
//! handler looks the item up here.
//!
//! # Document Format
//!
//! ```json
//! [
//!   {
//!     "title": "Fushimi Inari",
//!     "coords": [34.9671, 135.7727],
//!     "media": [
//!       { "type": "video", "path": "media/inari.mp4" },
//!       { "type": "image", "path": "media/inari.jpg", "duration_hint": 3 }
//!     ]
//!   },
//!   { "title": "Old Entry", "coords": [35.0, 135.0], "video": "legacy.mp4" }
//! ]
//! ```

mod catalog;

pub use catalog::{CatalogError, ItemCatalog, LoadReport, Rejection};

use serde::{Deserialize, Serialize};

use crate::coord::LatLng;

/// Kind of a media entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    /// Any type this crate does not play; never selected.
    #[serde(other)]
    Other,
}

/// One playable media file attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub path: String,
    /// Seconds to show an image, or maximum seconds of a video, when the
    /// entry is rendered into a clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hint: Option<f64>,
}

impl MediaEntry {
    /// Creates a video entry.
    pub fn video(path: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            path: path.into(),
            duration_hint: None,
        }
    }

    /// Creates an image entry.
    pub fn image(path: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            path: path.into(),
            duration_hint: None,
        }
    }
}

/// A point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique display key.
    pub title: String,

    /// Location of the marker. Every loaded item is expected to have one.
    #[serde(default)]
    pub coords: Option<LatLng>,

    /// Media in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaEntry>,

    /// Legacy single video path, used when `media` has nothing playable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,

    /// Legacy single image path, used after `video`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Item {
    /// Creates an item with no media.
    pub fn new(title: impl Into<String>, coords: LatLng) -> Self {
        Self {
            title: title.into(),
            coords: Some(coords),
            media: Vec::new(),
            video: None,
            image: None,
        }
    }

    /// Appends a media entry.
    pub fn with_media(mut self, entry: MediaEntry) -> Self {
        self.media.push(entry);
        self
    }

    /// Sets the legacy video path.
    pub fn with_legacy_video(mut self, path: impl Into<String>) -> Self {
        self.video = Some(path.into());
        self
    }

    /// Sets the legacy image path.
    pub fn with_legacy_image(mut self, path: impl Into<String>) -> Self {
        self.image = Some(path.into());
        self
    }

    /// Returns the best playable path for this item.
    ///
    /// Order: first video in `media`, first image in `media`, legacy
    /// `video`, legacy `image`. Empty paths count as absent wherever they
    /// appear.
    pub fn best_media(&self) -> Option<&str> {
        let first_of = |kind: MediaKind| {
            self.media
                .iter()
                .find(|m| m.kind == kind && !m.path.is_empty())
                .map(|m| m.path.as_str())
        };

        first_of(MediaKind::Video)
            .or_else(|| first_of(MediaKind::Image))
            .or_else(|| self.video.as_deref().filter(|p| !p.is_empty()))
            .or_else(|| self.image.as_deref().filter(|p| !p.is_empty()))
    }
}

/// Free-function form of [`Item::best_media`].
pub fn pick_best_media(item: &Item) -> Option<&str> {
    item.best_media()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Item {
        Item::new("spot", LatLng::new(35.0, 135.0))
    }

    #[test]
    fn test_video_in_media_wins_over_everything() {
        let item = base()
            .with_media(MediaEntry::image("a.jpg"))
            .with_media(MediaEntry::video("b.mp4"))
            .with_legacy_video("legacy.mp4")
            .with_legacy_image("legacy.jpg");
        assert_eq!(pick_best_media(&item), Some("b.mp4"));
    }

    #[test]
    fn test_first_video_is_chosen() {
        let item = base()
            .with_media(MediaEntry::video("first.mp4"))
            .with_media(MediaEntry::video("second.mp4"));
        assert_eq!(item.best_media(), Some("first.mp4"));
    }

    #[test]
    fn test_image_in_media_beats_legacy_video() {
        let item = base()
            .with_media(MediaEntry::image("a.jpg"))
            .with_legacy_video("legacy.mp4");
        assert_eq!(item.best_media(), Some("a.jpg"));
    }

    #[test]
    fn test_empty_media_paths_are_skipped() {
        let item = base()
            .with_media(MediaEntry::video(""))
            .with_media(MediaEntry::image("a.jpg"));
        assert_eq!(item.best_media(), Some("a.jpg"));

        let item = base()
            .with_media(MediaEntry::image(""))
            .with_legacy_video("legacy.mp4");
        assert_eq!(item.best_media(), Some("legacy.mp4"));

        let item = base().with_media(MediaEntry::video(""));
        assert_eq!(item.best_media(), None);
    }

    #[test]
    fn test_legacy_video_beats_legacy_image() {
        let item = base()
            .with_legacy_video("legacy.mp4")
            .with_legacy_image("legacy.jpg");
        assert_eq!(item.best_media(), Some("legacy.mp4"));
    }

    #[test]
    fn test_legacy_image_last_resort() {
        let item = base().with_legacy_image("legacy.jpg");
        assert_eq!(item.best_media(), Some("legacy.jpg"));
    }

    #[test]
    fn test_nothing_playable() {
        assert_eq!(base().best_media(), None);
    }

    #[test]
    fn test_unknown_media_type_is_skipped() {
        let item: Item = serde_json::from_str(
            r#"{"title":"t","coords":[1,2],"media":[{"type":"audio","path":"a.ogg"}],"image":"i.png"}"#,
        )
        .unwrap();
        assert_eq!(item.media[0].kind, MediaKind::Other);
        assert_eq!(item.best_media(), Some("i.png"));
    }

    #[test]
    fn test_empty_legacy_path_counts_as_absent() {
        let item = base().with_legacy_video("").with_legacy_image("x.jpg");
        assert_eq!(item.best_media(), Some("x.jpg"));
    }

    #[test]
    fn test_deserialize_full_item() {
        let item: Item = serde_json::from_str(
            r#"{
                "title": "Shrine",
                "coords": [34.9671, 135.7727],
                "media": [{"type": "image", "path": "a.jpg", "duration_hint": 3}]
            }"#,
        )
        .unwrap();

        assert_eq!(item.title, "Shrine");
        assert_eq!(item.coords, Some(LatLng::new(34.9671, 135.7727)));
        assert_eq!(item.media[0].duration_hint, Some(3.0));
        assert!(item.video.is_none());
    }
}

//! Offline render planning.
//!
//! Computes the ffmpeg work that produces every file the resolver can point
//! at:
//!
//! | Level | Output                              | Contents                          |
//! |-------|-------------------------------------|-----------------------------------|
//! | L0    | `output/L0_global.mp4`              | first clip of every item          |
//! | L1    | `output/L1/z5_x{x}_y{y}.mp4`        | first clip of each item in tile   |
//! | L2    | `output/L2/z8_x{x}_y{y}.mp4`        | first clip of each item in tile   |
//! | L3    | `output/L3/{slug}.mp4`              | every clip of one item            |
//!
//! Each item is first cut into normalized unit clips (one per media entry,
//! or a black placeholder), which the level outputs then concatenate.
//! Planning performs no I/O; running the commands is left to the caller.

mod step;

pub use step::{ClipSource, Composite, RenderStep, UnitClip, VideoFormat};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::coord::{to_tile_address, TileAddress};
use crate::item::{Item, ItemCatalog, MediaKind};
use crate::lod::{LodConfig, LodResolver, RegionalLevel};

/// Seconds an image is shown when the entry has no duration hint.
pub const DEFAULT_IMAGE_SECONDS: f64 = 4.0;

/// Maximum seconds taken from a video when the entry has no duration hint.
pub const DEFAULT_VIDEO_MAX_SECONDS: f64 = 6.0;

/// Length of the placeholder clip of an item without media.
pub const PLACEHOLDER_SECONDS: f64 = 2.0;

/// Level label of per-item outputs.
pub const PER_ITEM_LABEL: &str = "L3";

/// Filesystem-safe form of a title: runs of characters other than word
/// characters and `-` become `_`, and leading/trailing `_` are dropped.
pub fn slug(title: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^\w\-]+").expect("static regex"));
    re.replace_all(title, "_").trim_matches('_').to_string()
}

/// Planner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Scratch directory for unit clips and concat lists.
    pub work_dir: PathBuf,
    pub format: VideoFormat,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("render_work"),
            format: VideoFormat::default(),
        }
    }
}

/// The complete set of render steps for a catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPlan {
    pub clips: Vec<UnitClip>,
    pub composites: Vec<Composite>,
}

impl RenderPlan {
    /// Steps in execution order: unit clips first, then composites.
    pub fn steps(&self) -> Vec<RenderStep> {
        self.clips
            .iter()
            .cloned()
            .map(RenderStep::Clip)
            .chain(self.composites.iter().cloned().map(RenderStep::Concat))
            .collect()
    }

    /// Final outputs, in plan order.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.composites.iter().map(|c| c.output.as_path())
    }

    /// Composites of one level.
    pub fn level<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Composite> + 'a {
        self.composites.iter().filter(move |c| c.level == label)
    }
}

/// Builds [`RenderPlan`]s using the resolver's output layout.
pub struct RenderPlanner {
    resolver: LodResolver,
    settings: RenderSettings,
}

impl RenderPlanner {
    pub fn new(config: LodConfig, settings: RenderSettings) -> Self {
        Self {
            resolver: LodResolver::new(config),
            settings,
        }
    }

    /// Plans every level for `catalog`.
    ///
    /// Media entries for which `media_exists` returns `false` are skipped,
    /// as are entries of unknown type.
    pub fn plan<F>(&self, catalog: &ItemCatalog, media_exists: F) -> RenderPlan
    where
        F: Fn(&str) -> bool,
    {
        let items: Vec<&Item> = catalog.iter().collect();
        let keys = unique_slugs(&items);

        let mut plan = RenderPlan::default();
        let mut clips_by_item: Vec<Vec<PathBuf>> = Vec::with_capacity(items.len());
        for (item, key) in items.iter().zip(&keys) {
            let clips = self.unit_clips(item, key, &media_exists);
            clips_by_item.push(clips.iter().map(|c| c.output.clone()).collect());
            plan.clips.extend(clips);
        }

        let firsts: Vec<PathBuf> = clips_by_item
            .iter()
            .filter_map(|clips| clips.first().cloned())
            .collect();
        if !firsts.is_empty() {
            let output = PathBuf::from(self.resolver.global_path().as_str());
            plan.composites.push(self.composite("L0", firsts, output));
        }

        let config = self.resolver.config().clone();
        for level in config.regional_levels() {
            self.plan_regional(&mut plan, level, &items, &clips_by_item);
        }

        let root = Path::new(&config.output_root).join(PER_ITEM_LABEL);
        for (clips, key) in clips_by_item.iter().zip(&keys) {
            if clips.is_empty() {
                continue;
            }
            let output = root.join(format!("{}.{}", key, config.extension));
            plan.composites
                .push(self.composite(PER_ITEM_LABEL, clips.clone(), output));
        }

        debug!(
            items = items.len(),
            clips = plan.clips.len(),
            outputs = plan.composites.len(),
            "Render plan built"
        );
        plan
    }

    fn plan_regional(
        &self,
        plan: &mut RenderPlan,
        level: &RegionalLevel,
        items: &[&Item],
        clips_by_item: &[Vec<PathBuf>],
    ) {
        // Tiles in order of first appearance.
        let mut tiles: Vec<(TileAddress, Vec<PathBuf>)> = Vec::new();
        let mut index: HashMap<TileAddress, usize> = HashMap::new();

        for (item, clips) in items.iter().zip(clips_by_item) {
            let Some(coords) = item.coords else {
                continue;
            };
            let tile = match to_tile_address(coords, level.zoom) {
                Ok(tile) => tile,
                Err(e) => {
                    warn!(title = %item.title, error = %e, "Skipping item with invalid coordinates");
                    continue;
                }
            };
            let slot = *index.entry(tile).or_insert_with(|| {
                tiles.push((tile, Vec::new()));
                tiles.len() - 1
            });
            if let Some(first) = clips.first() {
                tiles[slot].1.push(first.clone());
            }
        }

        for (tile, inputs) in tiles {
            if inputs.is_empty() {
                continue;
            }
            let output = PathBuf::from(self.resolver.tile_path(level, &tile).as_str());
            plan.composites
                .push(self.composite(&level.label, inputs, output));
        }
    }

    fn unit_clips<F>(&self, item: &Item, key: &str, media_exists: &F) -> Vec<UnitClip>
    where
        F: Fn(&str) -> bool,
    {
        let work = &self.settings.work_dir;
        let mut clips = Vec::new();

        for (kind, path, hint) in media_sources(item) {
            if path.is_empty() || !media_exists(path) {
                continue;
            }
            let source = match kind {
                MediaKind::Image => ClipSource::Image {
                    path: path.to_string(),
                    seconds: duration_or(hint, DEFAULT_IMAGE_SECONDS),
                },
                MediaKind::Video => ClipSource::Video {
                    path: path.to_string(),
                    max_seconds: duration_or(hint, DEFAULT_VIDEO_MAX_SECONDS),
                },
                MediaKind::Other => continue,
            };
            clips.push(UnitClip {
                item: item.title.clone(),
                source,
                output: work.join(format!("{}_{:02}.mp4", key, clips.len())),
                format: self.settings.format,
            });
        }

        if clips.is_empty() {
            clips.push(UnitClip {
                item: item.title.clone(),
                source: ClipSource::Placeholder {
                    seconds: PLACEHOLDER_SECONDS,
                },
                output: work.join(format!("{}_placeholder.mp4", key)),
                format: self.settings.format,
            });
        }
        clips
    }

    fn composite(&self, level: &str, inputs: Vec<PathBuf>, output: PathBuf) -> Composite {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Composite {
            level: level.to_string(),
            list_file: self
                .settings
                .work_dir
                .join(format!("{}_{}_list.txt", level, stem)),
            inputs,
            output,
        }
    }
}

/// Media of an item in list order; the legacy fields stand in when the
/// list is empty. Empty paths are dropped.
fn media_sources(item: &Item) -> Vec<(MediaKind, &str, Option<f64>)> {
    if !item.media.is_empty() {
        return item
            .media
            .iter()
            .filter(|m| !m.path.is_empty())
            .map(|m| (m.kind, m.path.as_str(), m.duration_hint))
            .collect();
    }
    let mut legacy = Vec::new();
    if let Some(video) = item.video.as_deref().filter(|p| !p.is_empty()) {
        legacy.push((MediaKind::Video, video, None));
    }
    if let Some(image) = item.image.as_deref().filter(|p| !p.is_empty()) {
        legacy.push((MediaKind::Image, image, None));
    }
    legacy
}

fn duration_or(hint: Option<f64>, default: f64) -> f64 {
    match hint {
        Some(secs) if secs.is_finite() && secs > 0.0 => secs,
        _ => default,
    }
}

/// Slugs of all items, made unique with a numeric suffix.
fn unique_slugs(items: &[&Item]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    items
        .iter()
        .map(|item| {
            let mut base = slug(&item.title);
            if base.is_empty() {
                base = "item".to_string();
            }
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}_{}", base, count)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LatLng;
    use crate::item::MediaEntry;

    fn catalog(items: Vec<Item>) -> ItemCatalog {
        ItemCatalog::from_items(items).0
    }

    fn planner() -> RenderPlanner {
        RenderPlanner::new(LodConfig::default(), RenderSettings::default())
    }

    fn outputs(plan: &RenderPlan) -> Vec<String> {
        plan.outputs().map(|p| p.display().to_string()).collect()
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Fushimi Inari"), "Fushimi_Inari");
        assert_eq!(slug("  Kyoto / Gion!! "), "Kyoto_Gion");
        assert_eq!(slug("pre-war"), "pre-war");
        assert_eq!(slug("清水寺"), "清水寺");
        assert_eq!(slug("!!!"), "");
    }

    #[test]
    fn test_plan_levels() {
        let items = vec![
            Item::new("Kyoto", LatLng::new(35.0, 135.0))
                .with_media(MediaEntry::video("kyoto.mp4"))
                .with_media(MediaEntry::image("kyoto.jpg")),
            Item::new("Osaka", LatLng::new(34.69, 135.50)).with_media(MediaEntry::image("osaka.jpg")),
        ];
        let plan = planner().plan(&catalog(items), |_| true);

        assert_eq!(plan.clips.len(), 3);
        let outs = outputs(&plan);
        assert_eq!(outs[0], "output/L0_global.mp4");
        assert!(outs.contains(&"output/L1/z5_x28_y12.mp4".to_string()));
        assert!(outs.contains(&"output/L2/z8_x224_y101.mp4".to_string()));
        assert!(outs.contains(&"output/L3/Kyoto.mp4".to_string()));
        assert!(outs.contains(&"output/L3/Osaka.mp4".to_string()));

        let global = plan.level("L0").next().unwrap();
        assert_eq!(
            global.inputs,
            vec![
                PathBuf::from("render_work/Kyoto_00.mp4"),
                PathBuf::from("render_work/Osaka_00.mp4")
            ]
        );

        let kyoto = plan
            .level(PER_ITEM_LABEL)
            .find(|c| c.output.ends_with("Kyoto.mp4"))
            .unwrap();
        assert_eq!(kyoto.inputs.len(), 2);
    }

    #[test]
    fn test_shared_tile_groups_items_in_order() {
        let items = vec![
            Item::new("A", LatLng::new(35.0, 135.0)).with_media(MediaEntry::image("a.jpg")),
            Item::new("B", LatLng::new(35.01, 135.01)).with_media(MediaEntry::image("b.jpg")),
        ];
        let plan = planner().plan(&catalog(items), |_| true);

        let l1: Vec<&Composite> = plan.level("L1").collect();
        assert_eq!(l1.len(), 1);
        assert_eq!(
            l1[0].inputs,
            vec![
                PathBuf::from("render_work/A_00.mp4"),
                PathBuf::from("render_work/B_00.mp4")
            ]
        );
        assert_eq!(l1[0].list_file, PathBuf::from("render_work/L1_z5_x28_y12_list.txt"));
    }

    #[test]
    fn test_item_without_media_gets_placeholder() {
        let items = vec![Item::new("Empty", LatLng::new(35.0, 135.0))];
        let plan = planner().plan(&catalog(items), |_| true);

        assert_eq!(plan.clips.len(), 1);
        assert_eq!(
            plan.clips[0].source,
            ClipSource::Placeholder {
                seconds: PLACEHOLDER_SECONDS
            }
        );
        assert_eq!(
            plan.clips[0].output,
            PathBuf::from("render_work/Empty_placeholder.mp4")
        );
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let items = vec![Item::new("Spot", LatLng::new(35.0, 135.0))
            .with_media(MediaEntry::video("gone.mp4"))
            .with_media(MediaEntry::image("here.jpg"))];
        let plan = planner().plan(&catalog(items), |p| p == "here.jpg");

        assert_eq!(plan.clips.len(), 1);
        assert_eq!(
            plan.clips[0].source,
            ClipSource::Image {
                path: "here.jpg".to_string(),
                seconds: DEFAULT_IMAGE_SECONDS
            }
        );
        assert_eq!(plan.clips[0].output, PathBuf::from("render_work/Spot_00.mp4"));
    }

    #[test]
    fn test_empty_media_path_is_not_a_clip() {
        let items = vec![Item::new("Spot", LatLng::new(35.0, 135.0))
            .with_media(MediaEntry::video(""))
            .with_media(MediaEntry::image("here.jpg"))];
        let plan = planner().plan(&catalog(items), |_| true);

        assert_eq!(plan.clips.len(), 1);
        assert_eq!(
            plan.clips[0].source,
            ClipSource::Image {
                path: "here.jpg".to_string(),
                seconds: DEFAULT_IMAGE_SECONDS
            }
        );
    }

    #[test]
    fn test_duration_hints() {
        let mut video = MediaEntry::video("v.mp4");
        video.duration_hint = Some(3.0);
        let mut image = MediaEntry::image("i.jpg");
        image.duration_hint = Some(-1.0);
        let items = vec![Item::new("Spot", LatLng::new(35.0, 135.0))
            .with_media(video)
            .with_media(image)];
        let plan = planner().plan(&catalog(items), |_| true);

        assert_eq!(
            plan.clips[0].source,
            ClipSource::Video {
                path: "v.mp4".to_string(),
                max_seconds: 3.0
            }
        );
        assert_eq!(
            plan.clips[1].source,
            ClipSource::Image {
                path: "i.jpg".to_string(),
                seconds: DEFAULT_IMAGE_SECONDS
            }
        );
    }

    #[test]
    fn test_legacy_media_used_when_list_empty() {
        let items = vec![Item::new("Old", LatLng::new(35.0, 135.0)).with_legacy_video("old.mp4")];
        let plan = planner().plan(&catalog(items), |_| true);
        assert!(matches!(plan.clips[0].source, ClipSource::Video { ref path, .. } if path == "old.mp4"));
    }

    #[test]
    fn test_colliding_slugs_are_disambiguated() {
        let items = vec![
            Item::new("a b", LatLng::new(35.0, 135.0)),
            Item::new("a_b", LatLng::new(10.0, 10.0)),
        ];
        let plan = planner().plan(&catalog(items), |_| true);
        let l3: Vec<String> = plan
            .level(PER_ITEM_LABEL)
            .map(|c| c.output.display().to_string())
            .collect();
        assert_eq!(l3, vec!["output/L3/a_b.mp4", "output/L3/a_b_2.mp4"]);
    }

    #[test]
    fn test_plan_covers_every_resolvable_regional_path() {
        let items = vec![
            Item::new("Kyoto", LatLng::new(35.0, 135.0)).with_media(MediaEntry::image("k.jpg")),
            Item::new("Paris", LatLng::new(48.8566, 2.3522)).with_media(MediaEntry::image("p.jpg")),
            Item::new("Lima", LatLng::new(-12.0464, -77.0428)),
        ];
        let catalog = catalog(items);
        let plan = planner().plan(&catalog, |_| true);
        let outs = outputs(&plan);
        let resolver = LodResolver::new(LodConfig::default());

        for item in catalog.iter() {
            for live_zoom in [7.0, 8.5, 9.0, 11.0] {
                let path = resolver
                    .resolve((10.0, live_zoom), item.coords.unwrap(), item)
                    .unwrap()
                    .unwrap();
                assert!(outs.contains(&path.to_string()), "{} missing", path);
            }
        }
    }

    #[test]
    fn test_steps_order_clips_before_composites() {
        let items = vec![Item::new("A", LatLng::new(1.0, 1.0)).with_media(MediaEntry::image("a.jpg"))];
        let plan = planner().plan(&catalog(items), |_| true);
        let steps = plan.steps();
        assert!(matches!(steps[0], RenderStep::Clip(_)));
        assert!(steps[1..].iter().all(|s| matches!(s, RenderStep::Concat(_))));
    }
}

//! Individual ffmpeg steps of a render plan.

use std::fmt;
use std::path::{Path, PathBuf};

/// Output frame size and rate. Vertical 1080x1920 at 30 fps by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

impl VideoFormat {
    /// Letterbox filter fitting any input into the frame.
    fn fit_filter(&self) -> String {
        format!(
            "scale=w={w}:h={h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        )
    }
}

/// What a unit clip is cut from.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipSource {
    /// A still shown for `seconds`.
    Image { path: String, seconds: f64 },
    /// A video trimmed to at most `max_seconds`.
    Video { path: String, max_seconds: f64 },
    /// Black frames for an item with nothing playable.
    Placeholder { seconds: f64 },
}

/// One normalized clip of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitClip {
    pub item: String,
    pub source: ClipSource,
    pub output: PathBuf,
    pub format: VideoFormat,
}

/// A level output stitched from unit clips.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    /// `L0`, `L1`, `L2` or `L3`.
    pub level: String,
    pub inputs: Vec<PathBuf>,
    pub list_file: PathBuf,
    pub output: PathBuf,
}

impl Composite {
    /// Contents of the ffmpeg concat demuxer list.
    pub fn list_contents(&self) -> String {
        self.inputs
            .iter()
            .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', r"'\''")))
            .collect()
    }
}

/// A single ffmpeg invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderStep {
    Clip(UnitClip),
    Concat(Composite),
}

impl RenderStep {
    pub fn output(&self) -> &Path {
        match self {
            RenderStep::Clip(clip) => &clip.output,
            RenderStep::Concat(composite) => &composite.output,
        }
    }

    /// ffmpeg arguments, without the program name.
    pub fn args(&self) -> Vec<String> {
        match self {
            RenderStep::Clip(clip) => clip_args(clip),
            RenderStep::Concat(composite) => vec![
                "-y".into(),
                "-f".into(),
                "concat".into(),
                "-safe".into(),
                "0".into(),
                "-i".into(),
                path_arg(&composite.list_file),
                "-c".into(),
                "copy".into(),
                path_arg(&composite.output),
            ],
        }
    }

    /// Shell-quoted command line.
    pub fn command(&self) -> String {
        let mut words = vec!["ffmpeg".to_string()];
        words.extend(self.args());
        shell_words::join(words)
    }
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn clip_args(clip: &UnitClip) -> Vec<String> {
    let format = clip.format;
    let mut args: Vec<String> = vec!["-y".into()];
    match &clip.source {
        ClipSource::Image { path, seconds } => {
            args.extend([
                "-loop".into(),
                "1".into(),
                "-t".into(),
                seconds.to_string(),
                "-i".into(),
                path.clone(),
                "-vf".into(),
                format.fit_filter(),
            ]);
        }
        ClipSource::Video { path, max_seconds } => {
            args.extend([
                "-i".into(),
                path.clone(),
                "-t".into(),
                max_seconds.to_string(),
                "-vf".into(),
                format.fit_filter(),
            ]);
        }
        ClipSource::Placeholder { seconds } => {
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c=black:s={}x{}:d={}",
                    format.width, format.height, seconds
                ),
            ]);
        }
    }

    args.extend([
        "-r".into(),
        format.fps.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ]);
    match clip.source {
        ClipSource::Image { .. } => args.push("-an".into()),
        ClipSource::Video { .. } => args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "128k".into(),
        ]),
        ClipSource::Placeholder { .. } => {}
    }
    args.push(path_arg(&clip.output));
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(source: ClipSource) -> RenderStep {
        RenderStep::Clip(UnitClip {
            item: "Spot".to_string(),
            source,
            output: PathBuf::from("render_work/Spot_00.mp4"),
            format: VideoFormat::default(),
        })
    }

    #[test]
    fn test_image_command() {
        let step = clip(ClipSource::Image {
            path: "media/spot.jpg".to_string(),
            seconds: 4.0,
        });
        let args = step.args();
        assert_eq!(&args[..7], &["-y", "-loop", "1", "-t", "4", "-i", "media/spot.jpg"]);
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().unwrap(), "render_work/Spot_00.mp4");
        assert!(step.command().starts_with("ffmpeg -y -loop 1 -t 4 -i media/spot.jpg -vf "));
    }

    #[test]
    fn test_video_command_trims_and_keeps_audio() {
        let step = clip(ClipSource::Video {
            path: "media/spot.mp4".to_string(),
            max_seconds: 6.0,
        });
        let args = step.args();
        assert_eq!(&args[1..5], &["-i", "media/spot.mp4", "-t", "6"]);
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
    }

    #[test]
    fn test_placeholder_command() {
        let step = clip(ClipSource::Placeholder { seconds: 2.0 });
        assert!(step
            .args()
            .contains(&"color=c=black:s=1080x1920:d=2".to_string()));
    }

    #[test]
    fn test_filter_is_quoted_in_command() {
        let step = clip(ClipSource::Image {
            path: "my photo.jpg".to_string(),
            seconds: 3.5,
        });
        let command = step.command();
        assert!(command.contains("'my photo.jpg'"));
        assert!(command.contains(
            "'scale=w=1080:h=1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2'"
        ));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let composite = Composite {
            level: "L3".to_string(),
            inputs: vec![PathBuf::from("w/a.mp4"), PathBuf::from("w/it's.mp4")],
            list_file: PathBuf::from("w/L3_a_list.txt"),
            output: PathBuf::from("output/L3/a.mp4"),
        };
        assert_eq!(
            composite.list_contents(),
            "file 'w/a.mp4'\nfile 'w/it'\\''s.mp4'\n"
        );
        assert_eq!(
            RenderStep::Concat(composite).command(),
            "ffmpeg -y -f concat -safe 0 -i w/L3_a_list.txt -c copy output/L3/a.mp4"
        );
    }
}

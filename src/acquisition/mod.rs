use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod profile;
pub mod ytdlp;

pub use profile::{AudioPostProcess, OptionProfile};
pub use ytdlp::YtDlpAcquirer;

use crate::staging::StagedFile;
use crate::utils::format_file_size;
use crate::{FetchError, Result};

/// Output formats a caller can ask for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Best mp4 video muxed with m4a audio
    #[default]
    Mp4,
    /// Audio only, transcoded to mp3
    Mp3,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 2] = [MediaFormat::Mp4, MediaFormat::Mp3];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
        }
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl FromStr for MediaFormat {
    type Err = FetchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mp4" => Ok(MediaFormat::Mp4),
            "mp3" => Ok(MediaFormat::Mp3),
            other => Err(FetchError::InvalidRequest(format!(
                "Unsupported format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable rendition that carries both video and audio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format_id: Option<String>,
    /// Resolution label such as "720p"
    pub quality: Option<String>,
    pub container: Option<String>,
    /// Human-readable size, exact or approximate
    pub size: Option<String>,
    pub fps: Option<f64>,
    #[serde(skip)]
    pub height: Option<u64>,
}

impl FormatInfo {
    /// Muxed entry from a yt-dlp `formats[]` element, `None` for video-only or audio-only
    fn from_json(format: &serde_json::Value) -> Option<Self> {
        let text = |key: &str| format[key].as_str().map(|s| s.to_string());
        let has = |key: &str| format[key].as_str().map_or(false, |codec| codec != "none");
        if !has("vcodec") || !has("acodec") {
            return None;
        }

        let height = format["height"].as_u64();
        let size = format["filesize"]
            .as_u64()
            .or_else(|| format["filesize_approx"].as_u64())
            .map(format_file_size);

        Some(Self {
            format_id: text("format_id"),
            quality: height.map(|h| format!("{}p", h)).or_else(|| text("format_note")),
            container: text("ext"),
            size,
            fps: format["fps"].as_f64(),
            height,
        })
    }
}

/// Metadata reported by the extractor for a source URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Duration in seconds if available
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    /// Name of the extractor that handled the URL (e.g. "youtube")
    pub extractor: Option<String>,
    pub view_count: Option<u64>,
    pub description: Option<String>,
    /// Muxed renditions, highest resolution first
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
}

impl MediaInfo {
    /// Build from yt-dlp `--dump-json` output
    pub fn from_json(info: &serde_json::Value) -> Self {
        let text = |key: &str| info[key].as_str().map(|s| s.to_string());

        Self {
            title: text("title"),
            uploader: text("uploader").or_else(|| text("channel")),
            duration: info["duration"].as_f64(),
            thumbnail: text("thumbnail"),
            webpage_url: text("webpage_url"),
            extractor: text("extractor_key").or_else(|| text("extractor")),
            view_count: info["view_count"].as_u64(),
            description: text("description"),
            formats: muxed_formats(&info["formats"]),
        }
    }
}

/// Keep one entry per quality and container, sorted by resolution descending
fn muxed_formats(formats: &serde_json::Value) -> Vec<FormatInfo> {
    let mut muxed: Vec<FormatInfo> = Vec::new();

    for format in formats.as_array().into_iter().flatten() {
        let Some(entry) = FormatInfo::from_json(format) else {
            continue;
        };
        let duplicate = muxed
            .iter()
            .any(|seen| seen.quality == entry.quality && seen.container == entry.container);
        if !duplicate {
            muxed.push(entry);
        }
    }

    // stable, so equal heights keep yt-dlp's order
    muxed.sort_by(|a, b| b.height.cmp(&a.height));
    muxed
}

/// Fetches and transcodes media into the staging area
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    /// Fetch `url` and produce one staged file in the requested format.
    ///
    /// The returned guard deletes the file when dropped.
    async fn acquire(&self, url: &str, format: MediaFormat) -> Result<StagedFile>;

    /// Look up metadata without downloading
    async fn probe(&self, url: &str) -> Result<MediaInfo>;
}

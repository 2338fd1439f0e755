use std::path::PathBuf;

use super::MediaFormat;

/// Preferred mp4 video + m4a audio, falling back to the best combined stream
pub const MP4_FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best";
pub const MP3_FORMAT_SELECTOR: &str = "bestaudio";
pub const MP3_AUDIO_QUALITY: &str = "192K";

/// Audio extraction step run by yt-dlp through ffmpeg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPostProcess {
    pub codec: &'static str,
    pub quality: &'static str,
}

/// yt-dlp options derived from a requested [`MediaFormat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionProfile {
    pub format: MediaFormat,
    pub selector: &'static str,
    pub audio: Option<AudioPostProcess>,
    pub output_template: String,
}

impl OptionProfile {
    pub fn for_format(format: MediaFormat, output_template: impl Into<String>) -> Self {
        let output_template = output_template.into();
        match format {
            MediaFormat::Mp3 => Self {
                format,
                selector: MP3_FORMAT_SELECTOR,
                audio: Some(AudioPostProcess {
                    codec: "mp3",
                    quality: MP3_AUDIO_QUALITY,
                }),
                output_template,
            },
            MediaFormat::Mp4 => Self {
                format,
                selector: MP4_FORMAT_SELECTOR,
                audio: None,
                output_template,
            },
        }
    }

    /// Command line arguments for this profile, without the source URL
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            self.selector.to_string(),
            "--output".to_string(),
            self.output_template.clone(),
        ];

        if let Some(audio) = &self.audio {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                audio.codec.to_string(),
                "--audio-quality".to_string(),
                audio.quality.to_string(),
            ]);
        }

        args
    }

    /// Adjust the produced path to what the post-processor leaves on disk.
    ///
    /// Audio extraction swaps the container after yt-dlp computed the filename,
    /// so the mp3 profile always ends in `.mp3`.
    pub fn final_path(&self, produced: PathBuf) -> PathBuf {
        match self.format {
            MediaFormat::Mp3 => produced.with_extension("mp3"),
            MediaFormat::Mp4 => produced,
        }
    }

    /// One-line description used by the `formats` command
    pub fn describe(&self) -> String {
        match &self.audio {
            Some(audio) => format!(
                "format={} extract-audio codec={} quality={}",
                self.selector, audio.codec, audio.quality
            ),
            None => format!("format={}", self.selector),
        }
    }
}

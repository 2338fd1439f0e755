//! Media Fetch - a small HTTP service for grabbing media with yt-dlp
//!
//! This library accepts a media URL plus an output format (`mp4` or `mp3`), lets yt-dlp
//! (and the ffmpeg it drives) fetch and transcode the content into a staging directory,
//! and streams the staged file back to the caller before deleting it.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod server;
pub mod staging;
pub mod utils;

pub use acquisition::{
    FormatInfo, MediaAcquirer, MediaFormat, MediaInfo, OptionProfile, YtDlpAcquirer,
};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use staging::{Reservation, StagedFile, StagingArea};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to media fetching
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    InvalidRequest(String),

    /// Message is passed through to HTTP clients verbatim.
    #[error("{0}")]
    AcquisitionFailed(String),

    #[error("{0} is not available. Please install it: https://github.com/yt-dlp/yt-dlp")]
    ToolMissing(String),

    #[error("Staging directory error: {0}")]
    Staging(String),
}

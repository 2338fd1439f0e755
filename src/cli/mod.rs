use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::acquisition::MediaFormat;

#[derive(Parser)]
#[command(
    name = "media-fetch",
    about = "Media Fetch - download media with yt-dlp as mp4 or mp3 over HTTP",
    version,
    long_about = "A small HTTP service that accepts a media URL and an output format, lets yt-dlp fetch and transcode it, streams the file back to the caller and deletes it afterwards."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Interface to bind (overrides the config file)
        #[arg(long, env = "MEDIA_FETCH_HOST", value_name = "HOST")]
        host: Option<String>,

        /// Port to bind (overrides the config file)
        #[arg(short, long, env = "PORT", value_name = "PORT")]
        port: Option<u16>,
    },

    /// Fetch a single URL to a local file without starting the server
    Fetch {
        /// Media URL to fetch
        #[arg(value_name = "URL")]
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "mp4")]
        format: MediaFormat,

        /// Output file or directory (current directory if not specified)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show metadata and available formats for a URL without downloading
    Info {
        /// Media URL to inspect
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the current configuration to the config file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },

    /// List supported output formats
    Formats,
}

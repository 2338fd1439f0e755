use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{MediaAcquirer, MediaFormat, MediaInfo, OptionProfile};
use crate::config::AcquisitionConfig;
use crate::staging::{Reservation, StagedFile, StagingArea};
use crate::utils::extract_domain;
use crate::{FetchError, Result};

/// Media acquirer backed by the yt-dlp command line tool
pub struct YtDlpAcquirer {
    yt_dlp_path: String,
    ffmpeg_location: Option<PathBuf>,
    timeout: Option<Duration>,
    staging: StagingArea,
}

impl YtDlpAcquirer {
    pub fn new(staging: StagingArea) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
            timeout: None,
            staging,
        }
    }

    pub fn from_config(config: &AcquisitionConfig, staging: StagingArea) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
            timeout: config.timeout(),
            staging,
        }
    }

    pub fn with_yt_dlp_path(mut self, path: impl Into<String>) -> Self {
        self.yt_dlp_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Full argument list for one acquisition
    fn acquisition_args(&self, profile: &OptionProfile, url: &str) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            // prints the final path once post-processing has moved the file
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        args.extend(profile.to_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Run yt-dlp to completion, mapping every failure to a readable message
    async fn run(&self, args: Vec<String>) -> Result<Output> {
        let command = Command::new(&self.yt_dlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command).await.map_err(|_| {
                FetchError::AcquisitionFailed(format!(
                    "acquisition timed out after {}s",
                    limit.as_secs()
                ))
            })?,
            None => command.await,
        };

        let output = result.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                FetchError::ToolMissing(self.yt_dlp_path.clone())
            } else {
                FetchError::AcquisitionFailed(format!("Failed to run yt-dlp: {}", e))
            }
        })?;

        if !output.status.success() {
            return Err(FetchError::AcquisitionFailed(failure_message(&output)).into());
        }

        Ok(output)
    }

    /// Work out which staged file yt-dlp produced for this reservation
    fn resolve_output(
        &self,
        reservation: &Reservation,
        profile: &OptionProfile,
        stdout: &[u8],
    ) -> Result<PathBuf> {
        let printed = last_line(stdout)
            .and_then(|line| Path::new(&line).file_name().map(|name| name.to_owned()))
            .map(|name| reservation.dir().join(name))
            .filter(|path| is_reserved_name(reservation, path) && path.is_file());

        let produced = printed
            .or_else(|| reservation.find_output())
            .ok_or_else(|| {
                FetchError::AcquisitionFailed(
                    "yt-dlp finished but no output file was found".to_string(),
                )
            })?;

        let final_path = profile.final_path(produced);
        if !final_path.is_file() {
            return Err(FetchError::AcquisitionFailed(format!(
                "Expected output file is missing: {}",
                final_path.display()
            ))
            .into());
        }

        Ok(final_path)
    }
}

#[async_trait]
impl MediaAcquirer for YtDlpAcquirer {
    async fn acquire(&self, url: &str, format: MediaFormat) -> Result<StagedFile> {
        let reservation = self.staging.reserve();
        let profile = OptionProfile::for_format(format, reservation.output_template());
        let host = extract_domain(url).unwrap_or_else(|| "-".to_string());

        tracing::info!(
            id = %reservation.id(),
            host = %host,
            %format,
            "Starting acquisition"
        );

        let output = self.run(self.acquisition_args(&profile, url)).await?;
        let path = self.resolve_output(&reservation, &profile, &output.stdout)?;

        tracing::info!(id = %reservation.id(), path = %path.display(), "Acquisition complete");
        Ok(reservation.commit(path))
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo> {
        tracing::debug!("Extracting media info for: {}", url);

        let output = self
            .run(vec![
                "--dump-json".to_string(),
                "--no-playlist".to_string(),
                "--no-warnings".to_string(),
                "--".to_string(),
                url.to_string(),
            ])
            .await?;

        let info: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            FetchError::AcquisitionFailed(format!("yt-dlp returned invalid JSON: {}", e))
        })?;

        Ok(MediaInfo::from_json(&info))
    }
}

fn last_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(ToString::to_string)
}

/// Last non-empty stderr line, which is where yt-dlp puts its `ERROR:` message
fn failure_message(output: &Output) -> String {
    last_line(&output.stderr).unwrap_or_else(|| match output.status.code() {
        Some(code) => format!("yt-dlp exited with status {}", code),
        None => "yt-dlp was terminated by a signal".to_string(),
    })
}

fn is_reserved_name(reservation: &Reservation, path: &Path) -> bool {
    let prefix = format!("{}.", reservation.id());
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(&prefix))
        .unwrap_or(false)
}

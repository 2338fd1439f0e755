use std::path::Path;
use url::Url;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Clock-style duration, `M:SS` or `H:MM:SS`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, total % 3600 / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Replace anything outside a conservative ASCII set so the name fits in a header
pub fn sanitize_ascii_filename(filename: &str) -> String {
    let sanitized = filename
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') => c,
            _ => '_',
        })
        .collect::<String>();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "download.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Content-Disposition` value that makes clients save the body as `filename`
pub fn build_content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitize_ascii_filename(filename),
        urlencoding::encode(filename)
    )
}

/// MIME type guessed from the file extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!("{} - required for fetching media", yt_dlp_path));
    }

    // yt-dlp needs ffmpeg to merge mp4 streams and to transcode mp3
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for merging and audio transcoding".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(30.4), "0:30");
        assert_eq!(format_duration(90.0), "1:30");
        assert_eq!(format_duration(596.5), "9:57");
        assert_eq!(format_duration(3661.0), "1:01:01");
    }

    #[test]
    fn test_sanitize_ascii_filename() {
        assert_eq!(sanitize_ascii_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_ascii_filename("a\"b;c.mp3"), "a_b_c.mp3");
        assert_eq!(sanitize_ascii_filename("şarkı.mp3"), "_ark_.mp3");
        assert_eq!(sanitize_ascii_filename("   "), "download.bin");
    }

    #[test]
    fn test_build_content_disposition() {
        assert_eq!(
            build_content_disposition("0b9e.mp3"),
            "attachment; filename=\"0b9e.mp3\"; filename*=UTF-8''0b9e.mp3"
        );
        assert!(build_content_disposition("a b.mp4").ends_with("UTF-8''a%20b.mp4"));
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("/x/a.mp4")), "video/mp4");
        assert_eq!(content_type_for_path(Path::new("/x/a.MP3")), "audio/mpeg");
        assert_eq!(content_type_for_path(Path::new("/x/a.mkv")), "video/x-matroska");
        assert_eq!(content_type_for_path(Path::new("/x/a")), "application/octet-stream");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.youtube.com/watch?v=123").as_deref(),
            Some("youtube.com")
        );
        assert_eq!(extract_domain("https://example.com/video").as_deref(), Some("example.com"));
        assert_eq!(extract_domain("invalid-url"), None);
    }
}

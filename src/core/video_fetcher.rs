//! Video Fetcher Module
//!
//! Resolves stream metadata for a video URL and downloads the lowest
//! resolution stream to a local file. Stream resolution and download are
//! delegated to a [`VideoSource`]; the default source shells out to `yt-dlp`.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::core::models::{AppError, AppResult, LocalVideoFile, StreamFormat, VideoMetadata};
use crate::utils::validation::validate_video_url;

/// External video platform boundary
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Resolve title and available streams for `url`
    async fn resolve_streams(&self, url: &str) -> AppResult<VideoMetadata>;

    /// Download one stream of `url` to `dest`, overwriting any existing file
    async fn download(&self, url: &str, format: &StreamFormat, dest: &Path) -> AppResult<()>;
}

#[async_trait]
impl<T: VideoSource + ?Sized> VideoSource for Arc<T> {
    async fn resolve_streams(&self, url: &str) -> AppResult<VideoMetadata> {
        (**self).resolve_streams(url).await
    }

    async fn download(&self, url: &str, format: &StreamFormat, dest: &Path) -> AppResult<()> {
        (**self).download(url, format, dest).await
    }
}

/// [`VideoSource`] backed by the `yt-dlp` command line tool
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    binary: String,
}

impl YtDlpSource {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether the configured binary runs at all
    pub async fn check_available(&self) -> bool {
        match tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                debug!("yt-dlp version: {}", version.trim());
                true
            }
            Ok(output) => {
                warn!("yt-dlp exited with {}", output.status);
                false
            }
            Err(e) => {
                warn!("yt-dlp is not available: {}", e);
                false
            }
        }
    }
}

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl VideoSource for YtDlpSource {
    async fn resolve_streams(&self, url: &str) -> AppResult<VideoMetadata> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["--dump-json", "--no-warnings", "--no-playlist", url])
            .output()
            .await
            .map_err(|e| AppError::Resolution(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_failure(&stderr));
        }

        let json_value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::Resolution(format!("Failed to parse yt-dlp output: {}", e)))?;

        parse_video_metadata(&json_value)
    }

    async fn download(&self, url: &str, format: &StreamFormat, dest: &Path) -> AppResult<()> {
        // yt-dlp treats `%` in the output path as a template marker
        let template = dest.display().to_string().replace('%', "%%");

        let output = tokio::process::Command::new(&self.binary)
            .args([
                "--no-warnings",
                "--no-playlist",
                "--no-part",
                "--force-overwrites",
                "-f",
                &format.format_id,
                "-o",
                &template,
                url,
            ])
            .output()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Fetch(first_error_line(&stderr)));
        }

        Ok(())
    }
}

/// Fetches a video into a local file via a [`VideoSource`]
pub struct VideoFetcher<V> {
    source: V,
}

impl<V: VideoSource> VideoFetcher<V> {
    pub fn new(source: V) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &V {
        &self.source
    }

    /// Download the lowest resolution stream of `url` to `dest`
    pub async fn fetch(&self, url: &str, dest: &Path) -> AppResult<LocalVideoFile> {
        let url = validate_video_url(url)
            .map_err(|e| AppError::Resolution(e.to_string()))?
            .to_string();

        debug!("🔍 Resolving streams for {}", url);
        let metadata = self.source.resolve_streams(&url).await?;

        let format = select_lowest_resolution(&metadata.formats).ok_or_else(|| {
            AppError::Resolution(format!("No downloadable streams for {}", url))
        })?;

        info!(
            "⬇️ Downloading '{}' stream {} ({}) -> {}",
            metadata.title,
            format.format_id,
            format
                .height
                .map(|h| format!("{}p", h))
                .unwrap_or_else(|| "unknown resolution".to_string()),
            dest.display()
        );

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.source.download(&url, format, dest).await?;

        let size = match tokio::fs::metadata(dest).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(AppError::Fetch(format!(
                    "Download finished but {} does not exist",
                    dest.display()
                )))
            }
        };
        if size == 0 {
            return Err(AppError::Fetch(format!(
                "Downloaded file {} is empty",
                dest.display()
            )));
        }

        let title = if metadata.title.trim().is_empty() {
            metadata.id.clone()
        } else {
            metadata.title.clone()
        };

        info!("✅ Downloaded {} bytes for '{}'", size, title);

        Ok(LocalVideoFile {
            path: dest.to_path_buf(),
            title,
            mime_type: mime_type_for_ext(&format.ext).to_string(),
        })
    }
}

/// Pick the lowest resolution stream, preferring muxed mp4 streams
pub fn select_lowest_resolution(formats: &[StreamFormat]) -> Option<&StreamFormat> {
    let rank = |f: &StreamFormat| -> u8 {
        match (f.is_progressive(), f.ext == "mp4") {
            (true, true) => 0,
            (true, false) => 1,
            _ => 2,
        }
    };

    formats
        .iter()
        .filter(|f| f.has_video())
        .enumerate()
        .min_by_key(|(index, f)| {
            (
                rank(f),
                f.height.unwrap_or(u32::MAX),
                f.filesize.unwrap_or(u64::MAX),
                *index,
            )
        })
        .map(|(_, f)| f)
}

/// MIME type announced to the remote service for a container extension
pub fn mime_type_for_ext(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "flv" => "video/x-flv",
        _ => "video/mp4",
    }
}

pub(crate) fn parse_video_metadata(json: &serde_json::Value) -> AppResult<VideoMetadata> {
    let id = json["id"]
        .as_str()
        .ok_or_else(|| AppError::Resolution("Missing video ID in yt-dlp output".to_string()))?
        .to_string();

    let title = json["title"].as_str().unwrap_or_default().to_string();

    let webpage_url = json["webpage_url"]
        .as_str()
        .or_else(|| json["original_url"].as_str())
        .unwrap_or_default()
        .to_string();

    let formats = json["formats"]
        .as_array()
        .map(|formats| {
            formats
                .iter()
                .filter_map(parse_stream_format)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(VideoMetadata {
        id,
        title,
        webpage_url,
        duration: json["duration"].as_f64().map(|d| d.round() as u64),
        formats,
    })
}

fn parse_stream_format(json: &serde_json::Value) -> Option<StreamFormat> {
    let format_id = json["format_id"].as_str()?.to_string();

    Some(StreamFormat {
        format_id,
        ext: json["ext"].as_str().unwrap_or("mp4").to_string(),
        width: json["width"].as_u64().map(|w| w as u32),
        height: json["height"].as_u64().map(|h| h as u32),
        vcodec: json["vcodec"].as_str().map(str::to_string),
        acodec: json["acodec"].as_str().map(str::to_string),
        filesize: json["filesize"]
            .as_u64()
            .or_else(|| json["filesize_approx"].as_u64()),
    })
}

fn unresolvable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)unsupported url|is not a valid url|video unavailable|private video|does not exist|no video formats found|incomplete youtube id",
        )
        .expect("static regex")
    })
}

/// Unresolvable URLs map to `Resolution`; restrictions and network trouble to `Fetch`
fn classify_ytdlp_failure(stderr: &str) -> AppError {
    let message = first_error_line(stderr);
    if unresolvable_pattern().is_match(stderr) {
        AppError::Resolution(message)
    } else {
        AppError::Fetch(message)
    }
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| stderr.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("yt-dlp exited without output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream(
        id: &str,
        ext: &str,
        height: Option<u32>,
        vcodec: &str,
        acodec: &str,
    ) -> StreamFormat {
        StreamFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            width: None,
            height,
            vcodec: Some(vcodec.to_string()),
            acodec: Some(acodec.to_string()),
            filesize: None,
        }
    }

    #[test]
    fn test_select_lowest_progressive_mp4() {
        let formats = vec![
            stream("140", "m4a", None, "none", "mp4a.40.2"),
            stream("160", "mp4", Some(144), "avc1", "none"),
            stream("22", "mp4", Some(720), "avc1", "mp4a.40.2"),
            stream("18", "mp4", Some(360), "avc1", "mp4a.40.2"),
            stream("43", "webm", Some(240), "vp8", "vorbis"),
        ];

        let selected = select_lowest_resolution(&formats).unwrap();
        assert_eq!(selected.format_id, "18");
    }

    #[test]
    fn test_select_falls_back_to_video_only() {
        let formats = vec![
            stream("140", "m4a", None, "none", "mp4a.40.2"),
            stream("137", "mp4", Some(1080), "avc1", "none"),
            stream("160", "mp4", Some(144), "avc1", "none"),
        ];

        let selected = select_lowest_resolution(&formats).unwrap();
        assert_eq!(selected.format_id, "160");
    }

    #[test]
    fn test_select_ties_prefer_smaller_then_first() {
        let mut a = stream("a", "mp4", Some(360), "avc1", "aac");
        a.filesize = Some(2_000);
        let mut b = stream("b", "mp4", Some(360), "avc1", "aac");
        b.filesize = Some(1_000);
        let c = stream("c", "mp4", Some(360), "avc1", "aac");
        let d = stream("d", "mp4", Some(360), "avc1", "aac");

        assert_eq!(select_lowest_resolution(&[a, b]).unwrap().format_id, "b");
        assert_eq!(select_lowest_resolution(&[c, d]).unwrap().format_id, "c");
    }

    #[test]
    fn test_select_none_without_video() {
        let formats = vec![stream("140", "m4a", None, "none", "mp4a.40.2")];
        assert!(select_lowest_resolution(&formats).is_none());
        assert!(select_lowest_resolution(&[]).is_none());
    }

    #[test]
    fn test_parse_video_metadata() {
        let value = json!({
            "id": "dQw4w9WgXcQ",
            "title": "Demo",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "duration": 212.0,
            "formats": [
                {"format_id": "18", "ext": "mp4", "height": 360, "width": 640,
                 "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "filesize_approx": 1234},
                {"ext": "mp4"}
            ]
        });

        let metadata = parse_video_metadata(&value).unwrap();
        assert_eq!(metadata.title, "Demo");
        assert_eq!(metadata.duration, Some(212));
        assert_eq!(metadata.formats.len(), 1);
        assert_eq!(metadata.formats[0].filesize, Some(1234));
        assert!(metadata.formats[0].is_progressive());
    }

    #[test]
    fn test_parse_video_metadata_requires_id() {
        let err = parse_video_metadata(&json!({"title": "x"})).unwrap_err();
        assert!(matches!(err, AppError::Resolution(_)));
    }

    #[test]
    fn test_classify_ytdlp_failure() {
        let unavailable = "WARNING: foo\nERROR: [youtube] abc: Video unavailable\n";
        assert!(matches!(
            classify_ytdlp_failure(unavailable),
            AppError::Resolution(msg) if msg.contains("Video unavailable")
        ));

        let geo =
            "ERROR: [youtube] abc: The uploader has not made this video available in your country";
        assert!(matches!(classify_ytdlp_failure(geo), AppError::Fetch(_)));

        assert_eq!(first_error_line(""), "yt-dlp exited without output");
    }

    #[test]
    fn test_mime_type_for_ext() {
        assert_eq!(mime_type_for_ext("mp4"), "video/mp4");
        assert_eq!(mime_type_for_ext("WEBM"), "video/webm");
        assert_eq!(mime_type_for_ext("unknown"), "video/mp4");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let source = YtDlpSource::new("definitely-not-a-real-yt-dlp-binary");
        assert!(!source.check_available().await);

        let err = source
            .resolve_streams("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Resolution(msg) if msg.contains("Failed to run yt-dlp")));
    }
}

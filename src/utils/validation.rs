//! URL and input validation utilities

use anyhow::{anyhow, bail, Result};
use url::Url;

/// Parse `url` and require an http(s) scheme with a host
pub fn validate_video_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        bail!("Video URL is empty");
    }

    let parsed = Url::parse(trimmed).map_err(|e| anyhow!("Invalid URL format: {}", e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => bail!("Unsupported URL scheme: {}", other),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        bail!("URL has no host: {}", trimmed);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        let parsed = validate_video_url("https://www.youtube.com/watch?v=abc").unwrap();
        assert_eq!(parsed.host_str(), Some("www.youtube.com"));
        assert!(validate_video_url("  http://youtu.be/abc  ").is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        for input in [
            "",
            "   ",
            "not a url",
            "ftp://example.com/video.mp4",
            "file:///etc/passwd",
        ] {
            assert!(validate_video_url(input).is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_error_message_names_scheme() {
        let err = validate_video_url("ftp://example.com/v").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }
}

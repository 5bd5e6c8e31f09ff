//! Configuration file tests
//!
//! Exercise AppConfig against JSON files written to disk, the way a user
//! would edit or share them.

#[cfg(test)]
mod tests {
    use super::super::config::{AppConfig, DEFAULT_SUMMARY_PROMPT};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_and_import(json: &str) -> anyhow::Result<AppConfig> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        AppConfig::import(&content)
    }

    #[test]
    fn test_exported_file_round_trips_through_disk() {
        let mut config = AppConfig::default();
        config.gemini.model = "gemini-1.5-flash".to_string();
        config.pipeline.max_concurrent_requests = 4;
        config.fetcher.temp_directory = Some("/var/tmp/summaries".to_string());

        let imported = write_and_import(&config.export().unwrap()).unwrap();

        assert_eq!(imported.gemini.model, "gemini-1.5-flash");
        assert_eq!(imported.pipeline.max_concurrent_requests, 4);
        assert_eq!(
            imported.fetcher.temp_dir(),
            PathBuf::from("/var/tmp/summaries")
        );
        assert_eq!(imported.gemini.prompt, DEFAULT_SUMMARY_PROMPT);
    }

    #[test]
    fn test_api_key_in_file_is_ignored_on_export() {
        let mut json: serde_json::Value =
            serde_json::from_str(&AppConfig::default().export().unwrap()).unwrap();
        json["gemini"]["api_key"] = serde_json::json!("from-file");

        let imported = write_and_import(&json.to_string()).unwrap();
        // Reading a hand-edited key is allowed; writing it back is not
        assert_eq!(imported.gemini.api_key.as_deref(), Some("from-file"));
        assert!(!imported.export().unwrap().contains("from-file"));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut json: serde_json::Value =
            serde_json::from_str(&AppConfig::default().export().unwrap()).unwrap();
        json["pipeline"]["poll_interval_seconds"] = serde_json::json!(0);

        let err = write_and_import(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("invalid"));

        assert!(write_and_import("{ not json").is_err());
    }

    #[test]
    fn test_default_prompt_is_overridable_from_file() {
        assert!(DEFAULT_SUMMARY_PROMPT.contains("5 bullet points"));
        assert!(DEFAULT_SUMMARY_PROMPT.contains("detailed summary"));

        let korean = "이 동영상을 요약합니다. 주요 내용을 5개의 bullet point로 정리해주세요.";
        let mut json: serde_json::Value =
            serde_json::from_str(&AppConfig::default().export().unwrap()).unwrap();
        json["gemini"]["prompt"] = serde_json::json!(korean);

        let imported = write_and_import(&json.to_string()).unwrap();
        assert_eq!(imported.gemini.prompt, korean);
    }

    #[test]
    fn test_default_temp_dir_is_under_system_temp() {
        let config = AppConfig::default();
        assert!(config.fetcher.temp_dir().starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_config_path_is_json_file() {
        if let Ok(path) = AppConfig::get_config_path() {
            assert_eq!(path.file_name().unwrap(), "config.json");
        }
    }
}

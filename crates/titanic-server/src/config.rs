//! YAML configuration loading for the prediction server.

use std::path::{Path, PathBuf};

use titanic_core::ServiceConfig;

/// Environment variable naming the config file when no CLI argument is given.
pub const CONFIG_ENV_VAR: &str = "TITANIC_CONFIG";

/// Load a [`ServiceConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: ServiceConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    Ok(config)
}

/// Config file named by the first CLI argument, then [`CONFIG_ENV_VAR`].
pub fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
        .map(PathBuf::from)
}

/// Load the file at `path`, or fall back to defaults when there is none.
///
/// Runs before tracing is installed, so it does not log.
pub fn load_service_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(ServiceConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(yaml: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_config_full() {
        let yaml = r#"
listen_addr: "127.0.0.1:9000"
model_path: "/srv/models/classifier.json"
pipeline_path: "/srv/models/pipeline.json"
max_upload_bytes: 2048
history:
  view_limit: 5
logging:
  level: debug
  format: json
shutdown:
  timeout_seconds: 3
"#;
        let f = write_yaml(yaml);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(
            config.model_path,
            PathBuf::from("/srv/models/classifier.json")
        );
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.history.view_limit, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.shutdown.timeout_seconds, 3);
    }

    #[test]
    fn test_load_config_partial_uses_defaults() {
        let f = write_yaml("listen_addr: \"127.0.0.1:1234\"\n");
        let config = load_config(f.path()).unwrap();
        let defaults = ServiceConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:1234");
        assert_eq!(config.model_path, defaults.model_path);
        assert_eq!(config.history.view_limit, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let f = write_yaml("listen_addr: [unclosed");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config YAML"));
    }

    #[test]
    fn test_service_config_without_path_is_default() {
        let config = load_service_config(None).unwrap();
        let defaults = ServiceConfig::default();
        assert_eq!(config.listen_addr, defaults.listen_addr);
        assert_eq!(config.model_path, defaults.model_path);
    }

    #[test]
    fn test_service_config_reads_given_path() {
        let f = write_yaml("listen_addr: \"127.0.0.1:4321\"\n");
        let config = load_service_config(Some(f.path())).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:4321");
    }
}

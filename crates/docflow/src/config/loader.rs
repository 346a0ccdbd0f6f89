use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();

    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.queue_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "queue_capacity must be at least 1".to_string(),
        });
    }

    if config.ocr.enabled && config.ocr.languages.is_empty() {
        return Err(ConfigError::Validation {
            message: "OCR is enabled but no languages are configured".to_string(),
        });
    }

    if config.input_directory == config.data_directory {
        return Err(ConfigError::Validation {
            message: "input_directory and data_directory must differ".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "input_directory": "/srv/inbox",
            "data_directory": "/srv/data"
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.input_directory, "/srv/inbox");
        assert!(config.worker_count >= 1);
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.ocr.languages, vec!["eng"]);
        assert_eq!(config.tools.pandoc, "pandoc");
        assert_eq!(
            config.database_path(),
            std::path::PathBuf::from("/srv/data/docflow.db")
        );
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "input_directory": "/in",
            "data_directory": "/data",
            "database_path": "/var/lib/docflow.db",
            "worker_count": 3,
            "queue_capacity": 2,
            "users": ["alice"],
            "ocr": { "languages": ["eng", "deu"], "dpi": 200 },
            "tools": { "pandoc": "/opt/pandoc" },
            "dispatch": { "pull_interval_secs": 5, "loop_delay_ms": 0 },
            "logging": { "level": "debug", "json": true }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.users, vec!["alice"]);
        assert_eq!(config.ocr.dpi, 200);
        assert_eq!(config.tools.pandoc, "/opt/pandoc");
        assert_eq!(config.tools.pdftoppm, "pdftoppm");
        assert_eq!(config.dispatch.pull_interval_secs, 5);
        assert_eq!(config.dispatch.heartbeat_ms, 1000);
        assert!(config.logging.json);
    }

    #[test]
    fn test_schema_rejects_unknown_and_invalid_fields() {
        let unknown = r#"{"version":"1.0","input_directory":"/in","data_directory":"/d","output":"x"}"#;
        assert!(matches!(
            load_config_from_str(unknown),
            Err(ConfigError::SchemaValidation { .. })
        ));

        let zero_workers =
            r#"{"version":"1.0","input_directory":"/in","data_directory":"/d","worker_count":0}"#;
        assert!(matches!(
            load_config_from_str(zero_workers),
            Err(ConfigError::SchemaValidation { .. })
        ));

        let missing = r#"{"version":"1.0","input_directory":"/in"}"#;
        assert!(load_config_from_str(missing).is_err());
    }

    #[test]
    fn test_semantic_validation() {
        let no_languages =
            r#"{"version":"1.0","input_directory":"/in","data_directory":"/d","ocr":{"languages":[]}}"#;
        assert!(matches!(
            load_config_from_str(no_languages),
            Err(ConfigError::Validation { .. })
        ));

        let same_dirs = r#"{"version":"1.0","input_directory":"/x","data_directory":"/x"}"#;
        assert!(matches!(
            load_config_from_str(same_dirs),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/docflow.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}

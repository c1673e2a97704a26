use std::fs;
use std::path::{Path, PathBuf};

use jl_join::{DEFAULT_SUFFIXES, JoinOptions, JoinVariant};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Startup settings. Every field has a default, so a config file only needs
/// the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub use_sample: bool,
    pub table_a: Option<PathBuf>,
    pub table_b: Option<PathBuf>,
    pub key_a: Option<String>,
    pub key_b: Option<String>,
    pub variant: JoinVariant,
    pub show_tables: bool,
    pub show_result: bool,
    pub suffixes: (String, String),
    pub table_a_name: String,
    pub table_b_name: String,
    /// Directory for exports written without an explicit path.
    pub export_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            use_sample: true,
            table_a: None,
            table_b: None,
            key_a: None,
            key_b: None,
            variant: JoinVariant::Inner,
            show_tables: true,
            show_result: true,
            suffixes: (DEFAULT_SUFFIXES.0.to_owned(), DEFAULT_SUFFIXES.1.to_owned()),
            table_a_name: "Table A".to_owned(),
            table_b_name: "Table B".to_owned(),
            export_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_json_str(input: &str) -> Result<Self, AppError> {
        serde_json::from_str(input).map_err(AppError::ConfigParse)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            suffixes: self.suffixes.clone(),
            ..JoinOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use jl_join::JoinVariant;

    use super::AppConfig;
    use crate::error::ErrorKind;

    #[test]
    fn empty_object_yields_defaults() {
        let config = AppConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert!(config.use_sample);
        assert_eq!(config.variant, JoinVariant::Inner);
        assert_eq!(config.join_options().suffixes, ("_x".to_owned(), "_y".to_owned()));
    }

    #[test]
    fn partial_config_overrides_named_fields() {
        let config = AppConfig::from_json_str(
            r#"{"use_sample": false, "table_a": "a.csv", "variant": "left_with_null", "suffixes": ["_l", "_r"]}"#,
        )
        .expect("parse");
        assert!(!config.use_sample);
        assert_eq!(config.table_a, Some(PathBuf::from("a.csv")));
        assert_eq!(config.variant, JoinVariant::LeftWithNull);
        assert_eq!(config.suffixes.1, "_r");
        assert!(config.show_tables);
    }

    #[test]
    fn unknown_fields_are_config_errors() {
        let err = AppConfig::from_json_str(r#"{"use_sampel": true}"#).expect_err("typo");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = AppConfig::load(&dir.path().join("absent.json")).expect_err("absent");
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}

//! Language configuration.
//!
//! A [`LanguageConfig`] is usually embedded next to a grammar and loaded
//! from JSON:
//!
//! ```json
//! {
//!   "languageId": "people",
//!   "fileExtensions": [".people"],
//!   "caseInsensitive": false,
//!   "exportPolicy": "topLevel",
//!   "parserWorkers": 2
//! }
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParseOptions;
use crate::semantic::{ExportPolicy, ReferenceCase};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid language config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid language config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageConfig {
    pub language_id: String,
    /// Extensions including the leading dot, e.g. `.people`.
    pub file_extensions: Vec<String>,
    /// Keyword matching ignores ASCII case.
    pub case_insensitive: bool,
    /// Reference names ignore ASCII case; follows `case_insensitive` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_insensitive_references: Option<bool>,
    /// Per target type overrides of `case_insensitive_references`, keyed by type name.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub reference_case_insensitive: IndexMap<String, bool>,
    pub export_policy: ExportPolicy,
    /// Parser worker threads; 0 parses on the build thread.
    pub parser_workers: usize,
    pub max_parse_depth: usize,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            language_id: "language".to_string(),
            file_extensions: Vec::new(),
            case_insensitive: false,
            case_insensitive_references: None,
            reference_case_insensitive: IndexMap::new(),
            export_policy: ExportPolicy::AllNamed,
            parser_workers: 0,
            max_parse_depth: ParseOptions::default().max_depth,
        }
    }
}

impl LanguageConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parse_depth == 0 {
            return Err(ConfigError::Invalid("maxParseDepth must be positive".into()));
        }
        if let Some(extension) = self.file_extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(ConfigError::Invalid(format!(
                "file extension `{extension}` must start with a dot"
            )));
        }
        Ok(())
    }

    pub fn references_case_insensitive(&self) -> bool {
        self.case_insensitive_references
            .unwrap_or(self.case_insensitive)
    }

    /// Reference name matching for every target type.
    pub fn reference_case(&self) -> ReferenceCase {
        self.reference_case_insensitive.iter().fold(
            ReferenceCase::from(self.references_case_insensitive()),
            |case, (target_type, insensitive)| case.with_type(target_type.as_str(), *insensitive),
        )
    }

    /// Whether `path` ends with one of the configured extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        self.file_extensions
            .iter()
            .any(|extension| name.len() > extension.len() && name.ends_with(extension.as_str()))
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            case_insensitive: self.case_insensitive,
            max_depth: self.max_parse_depth,
        }
    }
}

/// Per-build switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    /// Run registered validation checks in the `Validated` phase.
    pub validation: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { validation: true }
    }
}

//! Interface configuration document.
//!
//! The gateway is driven by a single JSON document declaring every logical
//! interface. This module only covers reading and shaping the document;
//! per-interface validation happens at admission time in the registry.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Directory appended to the config file's own directory when the document
/// does not override `rulebase`.
pub const DEFAULT_RULEBASE_DIR: &str = "interfaceRules";

/// Default mock engine name when the document does not declare one.
pub const DEFAULT_ENGINE: &str = "mockjs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load interface configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("interface configuration has a syntax error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no status specified in interface configuration")]
    MissingStatus,
}

/// The top-level interface configuration document.
///
/// `status` is required but modeled as an `Option` so that its absence
/// surfaces as [`ConfigError::MissingStatus`] rather than a generic parse
/// failure. Interface entries stay as raw JSON values here: one malformed
/// entry must not poison the rest of the document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub rulebase: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<Value>,
}

impl ConfigDocument {
    /// Read and parse the document at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: ConfigDocument = serde_json::from_str(&contents)?;
        Ok(doc)
    }

    /// Parse an in-memory document.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Registry-wide default status; fatal when absent.
    pub fn required_status(&self) -> Result<&str, ConfigError> {
        self.status.as_deref().ok_or(ConfigError::MissingStatus)
    }

    /// Mock engine name, defaulted.
    pub fn engine(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    /// Resolve the rulebase directory.
    ///
    /// A `rulebase` declared in the document wins (trailing slash trimmed);
    /// otherwise the config file's own directory with `interfaceRules`
    /// appended is used. `base_dir` is the directory of the config file, or
    /// the process working directory for in-memory documents.
    pub fn resolved_rulebase(&self, base_dir: &Path) -> PathBuf {
        match self.rulebase.as_deref() {
            Some(dir) => base_dir.join(dir.trim_end_matches('/')),
            None => base_dir.join(DEFAULT_RULEBASE_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_defaults() {
        let doc = ConfigDocument::from_value(json!({ "status": "online" })).unwrap();
        assert_eq!(doc.required_status().unwrap(), "online");
        assert_eq!(doc.engine(), "mockjs");
        assert!(doc.interfaces.is_empty());
        assert_eq!(
            doc.resolved_rulebase(Path::new("conf")),
            PathBuf::from("conf/interfaceRules")
        );
    }

    #[test]
    fn missing_status_is_fatal() {
        let doc = ConfigDocument::from_value(json!({ "title": "gw" })).unwrap();
        assert!(matches!(
            doc.required_status(),
            Err(ConfigError::MissingStatus)
        ));
    }

    #[test]
    fn declared_rulebase_overrides_default() {
        let doc = ConfigDocument::from_value(json!({
            "status": "online",
            "rulebase": "rules/"
        }))
        .unwrap();
        assert_eq!(
            doc.resolved_rulebase(Path::new("/etc/portico")),
            PathBuf::from("/etc/portico/rules")
        );
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let err = ConfigDocument::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let err = ConfigDocument::from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

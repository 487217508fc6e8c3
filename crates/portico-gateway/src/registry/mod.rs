//! Profile registry: validates and indexes interface declarations.
//!
//! The registry is built once from a configuration document, is read-only
//! afterwards, and is the single source of truth for interface profiles,
//! their public projections, and their mock rules.

pub mod profile;


use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigDocument, ConfigError};
use crate::metrics;

pub use profile::{
    normalize_profile, ClientInterfaceDescriptor, DataType, Encoding, InterfaceProfile,
    InterfaceStatus, Method, ProfileDecl, ProfileRejection,
};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("interface profile [{0}] is not found")]
    UnknownInterface(String),
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rule file {path} has a syntax error: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Indexed, validated interface profiles. Mutated only during load.
#[derive(Debug)]
pub struct ProfileRegistry {
    profiles: HashMap<String, InterfaceProfile>,
    client_interfaces: HashMap<String, ClientInterfaceDescriptor>,
    default_status: String,
    engine: String,
    rulebase: PathBuf,
}

impl ProfileRegistry {
    /// Load from a configuration file on disk. Fatal on unreadable or
    /// unparsable documents and on a missing top-level `status`.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading interface profiles from {}", path.display());
        let doc = ConfigDocument::from_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::load_document(doc, base_dir)
    }

    /// Load from an in-memory document. `base_dir` anchors relative rulebase
    /// resolution.
    pub fn load_document(doc: ConfigDocument, base_dir: &Path) -> Result<Self, ConfigError> {
        let default_status = doc.required_status()?.to_string();
        if doc.title.is_some() || doc.version.is_some() {
            info!(
                "interface configuration: title={} version={}",
                doc.title.as_deref().unwrap_or("-"),
                doc.version.as_deref().unwrap_or("-")
            );
        }

        let mut registry = ProfileRegistry {
            profiles: HashMap::new(),
            client_interfaces: HashMap::new(),
            rulebase: doc.resolved_rulebase(base_dir),
            engine: doc.engine().to_string(),
            default_status,
        };

        for entry in doc.interfaces {
            registry.add_entry(entry);
        }
        Ok(registry)
    }

    /// Admit one raw document entry. Returns whether it was admitted;
    /// malformed entries are logged and skipped, never fatal.
    pub fn add_entry(&mut self, entry: Value) -> bool {
        match serde_json::from_value::<ProfileDecl>(entry) {
            Ok(decl) => self.add_profile(decl),
            Err(e) => {
                self.reject(&ProfileRejection::Malformed(e.to_string()));
                false
            }
        }
    }

    /// Run the admission pipeline for one declaration and store the profile
    /// and its public projection on success.
    pub fn add_profile(&mut self, decl: ProfileDecl) -> bool {
        let admitted = normalize_profile(decl, &self.rulebase, &self.default_status, |id| {
            self.profiles.contains_key(id)
        });
        match admitted {
            Ok(prof) => {
                info!("interface [{}] loaded, status={}", prof.id, prof.status.as_str());
                metrics::ADMISSIONS_TOTAL
                    .with_label_values(&["admitted"])
                    .inc();
                self.client_interfaces
                    .insert(prof.id.clone(), ClientInterfaceDescriptor::from(&prof));
                self.profiles.insert(prof.id.clone(), prof);
                true
            }
            Err(rejection) => {
                self.reject(&rejection);
                false
            }
        }
    }

    fn reject(&self, rejection: &ProfileRejection) {
        warn!("interface profile dropped: {}", rejection);
        metrics::ADMISSIONS_TOTAL
            .with_label_values(&["rejected"])
            .inc();
    }

    pub fn get_profile(&self, interface_id: &str) -> Option<&InterfaceProfile> {
        self.profiles.get(interface_id)
    }

    pub fn is_profile_existed(&self, interface_id: &str) -> bool {
        self.profiles.contains_key(interface_id)
    }

    /// Load and parse the mock rule for an interface.
    pub fn get_rule(&self, interface_id: &str) -> Result<Value, RuleError> {
        let profile = self
            .profiles
            .get(interface_id)
            .ok_or_else(|| RuleError::UnknownInterface(interface_id.to_string()))?;
        let path = &profile.rule_file;
        let contents = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| RuleError::Parse {
            path: path.clone(),
            source,
        })
    }

    /// Ids with `prefix` as a literal leading substring. An empty prefix
    /// matches nothing.
    pub fn get_interface_ids_by_prefix(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let mut ids: Vec<String> = self
            .profiles
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn get_client_interfaces(&self) -> &HashMap<String, ClientInterfaceDescriptor> {
        &self.client_interfaces
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn default_status(&self) -> &str {
        &self.default_status
    }

    pub fn rulebase(&self) -> &Path {
        &self.rulebase
    }
}

//! Interface profile declarations and admission-time normalization.
//!
//! A [`ProfileDecl`] is the raw shape found in the configuration document; an
//! [`InterfaceProfile`] is the normalized, validated form the rest of the
//! gateway works with. Normalization is a pure function: it returns the
//! admission outcome and leaves logging to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Default per-call timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Dot-segmented interface id grammar: `segment(.segment)*`, each segment `\w+`.
static ID_GRAMMAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+\.)*\w+$").unwrap());

/// Check an interface id against the dot-segment grammar.
pub fn is_valid_id(id: &str) -> bool {
    ID_GRAMMAR.is_match(id)
}

/// Raw interface declaration as it appears in the configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDecl {
    pub id: Option<String>,
    pub name: Option<String>,
    pub urls: HashMap<String, String>,
    pub method: Option<String>,
    pub data_type: Option<String>,
    pub status: Option<String>,
    pub rule_file: Option<String>,
    pub is_rule_static: bool,
    pub is_cookie_needed: bool,
    pub signed: bool,
    pub intercepted: Option<bool>,
    pub timeout: Option<u64>,
    pub encoding: Option<String>,
}

/// HTTP verb whitelist. Unrecognized values normalize to GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn normalize(declared: Option<&str>) -> Self {
        match declared.map(str::to_ascii_uppercase).as_deref() {
            Some("POST") => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Response data type whitelist. Unrecognized values normalize to json.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Json,
    Text,
    Jsonp,
}

impl DataType {
    pub fn normalize(declared: Option<&str>) -> Self {
        match declared.map(str::to_ascii_lowercase).as_deref() {
            Some("text") => DataType::Text,
            Some("jsonp") => DataType::Jsonp,
            _ => DataType::Json,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Json => "json",
            DataType::Text => "text",
            DataType::Jsonp => "jsonp",
        }
    }

    /// Content type written by the interception adapter.
    pub fn content_type(self) -> &'static str {
        match self {
            DataType::Json => "application/json; charset=utf-8",
            DataType::Text => "text/plain; charset=utf-8",
            DataType::Jsonp => "application/x-javascript; charset=utf-8",
        }
    }
}

/// Behavior mode selected for an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceStatus {
    /// Proxy to the backend registered under this environment name.
    Env(String),
    /// Synthesize a mock response from the interface's rule.
    Mock,
    /// Synthesize an error-shaped payload from the interface's rule.
    MockErr,
}

impl InterfaceStatus {
    /// Resolve a declared status against the interface's `urls` and the
    /// registry-wide default. A declared value that is neither an environment
    /// key nor `mock`/`mockerr` falls back to the default, taken at face
    /// value: a default naming an environment missing from `urls` is allowed
    /// here and only fails later, at proxy construction.
    pub fn resolve(declared: Option<&str>, urls: &HashMap<String, String>, default: &str) -> Self {
        let effective = match declared {
            Some(s) if s == "mock" || s == "mockerr" || urls.contains_key(s) => s,
            _ => default,
        };
        match effective {
            "mock" => InterfaceStatus::Mock,
            "mockerr" => InterfaceStatus::MockErr,
            env => InterfaceStatus::Env(env.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InterfaceStatus::Env(env) => env,
            InterfaceStatus::Mock => "mock",
            InterfaceStatus::MockErr => "mockerr",
        }
    }
}

/// Response decode mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    /// Hand the response bytes back untouched.
    Raw,
    /// Decode the response as text. The declared charset name is carried for
    /// diagnostics; decoding itself is UTF-8.
    Text(String),
}

impl Encoding {
    pub fn normalize(declared: Option<&str>) -> Self {
        match declared {
            Some("raw") => Encoding::Raw,
            Some(name) => Encoding::Text(name.to_string()),
            None => Encoding::Text("utf-8".to_string()),
        }
    }
}

/// A single admission failure. Non-fatal: the registry logs it and skips the
/// profile.
#[derive(Debug, Error)]
pub enum ProfileRejection {
    #[error("interface profile has no id")]
    MissingId,
    #[error("invalid interface id: {0}")]
    InvalidId(String),
    #[error("interface [{0}] is already registered")]
    Duplicate(String),
    #[error("interface [{id}] declares no urls and no rule file exists at {path}")]
    NoUrlNoRule { id: String, path: PathBuf },
    #[error("malformed interface declaration: {0}")]
    Malformed(String),
}

/// Normalized, validated interface profile. Immutable after admission.
#[derive(Debug, Clone)]
pub struct InterfaceProfile {
    pub id: String,
    pub name: Option<String>,
    pub urls: HashMap<String, String>,
    pub method: Method,
    pub data_type: DataType,
    pub status: InterfaceStatus,
    pub rule_file: PathBuf,
    pub is_rule_static: bool,
    pub is_cookie_needed: bool,
    pub signed: bool,
    pub intercepted: bool,
    pub timeout: Duration,
    pub encoding: Encoding,
}

impl InterfaceProfile {
    /// Plain keyed accessor into profile metadata, for callers that only
    /// carry a field name (logging, aggregation diagnostics).
    pub fn option(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(json!(self.id)),
            "name" => self.name.as_ref().map(|n| json!(n)),
            "method" => Some(json!(self.method.as_str())),
            "dataType" => Some(json!(self.data_type.as_str())),
            "status" => Some(json!(self.status.as_str())),
            "ruleFile" => Some(json!(self.rule_file.display().to_string())),
            "isRuleStatic" => Some(json!(self.is_rule_static)),
            "isCookieNeeded" => Some(json!(self.is_cookie_needed)),
            "signed" => Some(json!(self.signed)),
            "intercepted" => Some(json!(self.intercepted)),
            "timeout" => Some(json!(self.timeout.as_millis() as u64)),
            _ => None,
        }
    }
}

/// Public-safe projection of an admitted profile: no URLs, no rule paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInterfaceDescriptor {
    pub id: String,
    pub method: Method,
    pub data_type: DataType,
}

impl From<&InterfaceProfile> for ClientInterfaceDescriptor {
    fn from(profile: &InterfaceProfile) -> Self {
        ClientInterfaceDescriptor {
            id: profile.id.clone(),
            method: profile.method,
            data_type: profile.data_type,
        }
    }
}

/// Validate and normalize one declaration.
///
/// The pipeline short-circuits on the first failure, in this order: missing
/// id, id grammar, duplicate, rule-file resolution, no-urls-and-no-rule-file,
/// status fallback, whitelist and default normalization.
pub fn normalize_profile<F>(
    decl: ProfileDecl,
    rulebase: &Path,
    default_status: &str,
    is_registered: F,
) -> Result<InterfaceProfile, ProfileRejection>
where
    F: Fn(&str) -> bool,
{
    let id = decl.id.ok_or(ProfileRejection::MissingId)?;
    if !is_valid_id(&id) {
        return Err(ProfileRejection::InvalidId(id));
    }
    if is_registered(&id) {
        return Err(ProfileRejection::Duplicate(id));
    }

    let rule_file = rulebase.join(
        decl.rule_file
            .unwrap_or_else(|| format!("{id}.rule.json")),
    );

    if decl.urls.is_empty() && !rule_file.exists() {
        return Err(ProfileRejection::NoUrlNoRule {
            id,
            path: rule_file,
        });
    }

    let status = InterfaceStatus::resolve(decl.status.as_deref(), &decl.urls, default_status);

    Ok(InterfaceProfile {
        method: Method::normalize(decl.method.as_deref()),
        data_type: DataType::normalize(decl.data_type.as_deref()),
        encoding: Encoding::normalize(decl.encoding.as_deref()),
        timeout: Duration::from_millis(decl.timeout.unwrap_or(DEFAULT_TIMEOUT_MS)),
        intercepted: decl.intercepted.unwrap_or(true),
        is_rule_static: decl.is_rule_static,
        is_cookie_needed: decl.is_cookie_needed,
        signed: decl.signed,
        name: decl.name,
        urls: decl.urls,
        rule_file,
        status,
        id,
    })
}

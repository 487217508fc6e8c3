//! Pluggable mock-data synthesis.
//!
//! The core hands a rule template to a [`MockEngine`] and never inspects the
//! template semantics itself. Engines are selected by the `engine` field of
//! the configuration document.

pub mod template;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum MockEngineError {
    #[error("invalid repeat directive [{0}]")]
    InvalidRepeat(String),
    #[error("placeholder @{name} failed: {reason}")]
    Placeholder { name: String, reason: String },
}

/// Mock-data synthesis capability: one template in, one result out.
pub trait MockEngine: Send + Sync {
    fn generate(&self, template: &Value) -> Result<Value, MockEngineError>;
}

/// Select an engine by its configured name. Unknown names fall back to the
/// default template engine with a warning rather than failing the load.
pub fn engine_by_name(name: &str) -> Arc<dyn MockEngine> {
    match name {
        template::ENGINE_NAME => Arc::new(template::TemplateEngine::default()),
        other => {
            warn!(
                "unknown mock engine [{}], falling back to [{}]",
                other,
                template::ENGINE_NAME
            );
            Arc::new(template::TemplateEngine::default())
        }
    }
}

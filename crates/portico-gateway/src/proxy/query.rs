//! Canonical request-parameter serialization.

use urlencoding::encode;

/// Request parameters for one proxied call.
///
/// `Raw` carries an already-serialized query string (the interception adapter
/// passes inbound query strings and POST bodies through unchanged). `Pairs`
/// carries pre-rendered `k=v` fragments. `Map` carries key/value pairs in
/// insertion order; values are percent-encoded on serialization so that
/// JSON- or array-looking string values round-trip through the wire safely.
#[derive(Debug, Clone, Default)]
pub enum Params {
    #[default]
    None,
    Raw(String),
    Pairs(Vec<String>),
    Map(Vec<(String, String)>),
}

impl Params {
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Params::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Serialize params into a query string.
pub fn query_stringify(params: &Params) -> String {
    match params {
        Params::None => String::new(),
        Params::Raw(s) => s.clone(),
        Params::Pairs(pairs) => pairs.join("&"),
        Params::Map(entries) => entries
            .iter()
            .map(|(key, value)| format!("{key}={}", encode(value)))
            .collect::<Vec<_>>()
            .join("&"),
    }
}

//! Built-in template engine.
//!
//! Implements the mockjs-flavored subset used by interface rules:
//!
//! - Placeholder strings expand to randomized values: `@integer`,
//!   `@integer(min,max)`, `@natural`, `@float`, `@boolean`, `@string(len)`,
//!   `@word`, `@guid`.
//! - Object keys of the form `"name|count"` repeat their value `count`
//!   times into an array (arrays cycle their elements, strings concatenate).
//! - A string that is exactly one placeholder expands to a typed value;
//!   embedded placeholders substitute textually.
//! - Everything else passes through verbatim.

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};

use super::{MockEngine, MockEngineError};

pub const ENGINE_NAME: &str = "mockjs";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([a-z]+)(?:\(([^)]*)\))?").unwrap());

#[derive(Debug, Default)]
pub struct TemplateEngine;

impl MockEngine for TemplateEngine {
    fn generate(&self, template: &Value) -> Result<Value, MockEngineError> {
        expand(template)
    }
}

fn expand(template: &Value) -> Result<Value, MockEngineError> {
    match template {
        Value::String(s) => expand_string(s),
        Value::Array(items) => items.iter().map(expand).collect::<Result<Vec<_>, _>>().map(Value::Array),
        Value::Object(map) => expand_object(map),
        other => Ok(other.clone()),
    }
}

fn expand_object(map: &Map<String, Value>) -> Result<Value, MockEngineError> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        match key.split_once('|') {
            Some((name, count)) => {
                let count: usize = count
                    .trim()
                    .parse()
                    .map_err(|_| MockEngineError::InvalidRepeat(key.clone()))?;
                out.insert(name.to_string(), repeat(key, value, count)?);
            }
            None => {
                out.insert(key.clone(), expand(value)?);
            }
        }
    }
    Ok(Value::Object(out))
}

fn repeat(key: &str, value: &Value, count: usize) -> Result<Value, MockEngineError> {
    match value {
        // Cycle the array's elements up to `count` items.
        Value::Array(items) if !items.is_empty() => (0..count)
            .map(|i| expand(&items[i % items.len()]))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        // Concatenate the expanded string `count` times.
        Value::String(s) => {
            let expanded = expand_string(s)?;
            let rendered = render(&expanded);
            Ok(Value::String(rendered.repeat(count)))
        }
        // Repeat an object template into an array of independent expansions.
        Value::Object(_) => (0..count)
            .map(|_| expand(value))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Err(MockEngineError::InvalidRepeat(key.to_string())),
    }
}

fn expand_string(s: &str) -> Result<Value, MockEngineError> {
    // A string that is exactly one placeholder yields a typed value.
    if let Some(caps) = PLACEHOLDER.captures(s) {
        if caps.get(0).map(|m| m.as_str()) == Some(s) {
            let name = &caps[1];
            let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            if let Some(value) = synthesize(name, args)? {
                return Ok(value);
            }
            return Ok(Value::String(s.to_string()));
        }
    }

    // Otherwise substitute embedded placeholders textually, leaving unknown
    // ones verbatim.
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(s) {
        let whole = caps.get(0).unwrap();
        let name = &caps[1];
        let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        out.push_str(&s[last..whole.start()]);
        match synthesize(name, args)? {
            Some(value) => out.push_str(&render(&value)),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}

/// Render an expanded value for textual substitution.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Synthesize one placeholder. `Ok(None)` means the placeholder is unknown
/// and should pass through verbatim: rules are opaque documents, and a
/// directive this engine does not understand is not an error.
fn synthesize(name: &str, args: &str) -> Result<Option<Value>, MockEngineError> {
    let mut rng = rand::thread_rng();
    let value = match name {
        "integer" => {
            let (min, max) = int_range(name, args, i64::MIN / 2, i64::MAX / 2)?;
            Value::Number(Number::from(rng.gen_range(min..=max)))
        }
        "natural" => {
            let (min, max) = int_range(name, args, 0, i64::MAX / 2)?;
            let min = min.max(0);
            let max = max.max(min);
            Value::Number(Number::from(rng.gen_range(min..=max)))
        }
        "float" => {
            let (min, max) = int_range(name, args, 0, 10_000)?;
            let raw = rng.gen_range(min as f64..=max as f64);
            Number::from_f64((raw * 100.0).round() / 100.0)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        "boolean" => Value::Bool(rng.gen_bool(0.5)),
        "string" => {
            let len = match args.trim() {
                "" => 8,
                arg => arg.parse().map_err(|_| MockEngineError::Placeholder {
                    name: name.to_string(),
                    reason: format!("invalid length [{arg}]"),
                })?,
            };
            let s: String = (&mut rng)
                .sample_iter(Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            Value::String(s)
        }
        "word" => {
            let len = rng.gen_range(3..=10);
            let s: String = (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            Value::String(s)
        }
        "guid" => {
            let hex = format!("{:032x}", rng.gen::<u128>());
            Value::String(format!(
                "{}-{}-{}-{}-{}",
                &hex[0..8],
                &hex[8..12],
                &hex[12..16],
                &hex[16..20],
                &hex[20..32]
            ))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn int_range(
    name: &str,
    args: &str,
    default_min: i64,
    default_max: i64,
) -> Result<(i64, i64), MockEngineError> {
    if args.trim().is_empty() {
        return Ok((default_min, default_max));
    }
    let parts: Vec<i64> = args
        .split(',')
        .map(|p| {
            p.trim().parse().map_err(|_| MockEngineError::Placeholder {
                name: name.to_string(),
                reason: format!("invalid range [{args}]"),
            })
        })
        .collect::<Result<_, _>>()?;
    let (min, max) = match parts.as_slice() {
        [only] => (*only, default_max.max(*only)),
        [min, max, ..] => (*min, *max),
        [] => (default_min, default_max),
    };
    Ok(if min > max { (max, min) } else { (min, max) })
}

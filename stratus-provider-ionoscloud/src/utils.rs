//! Helpers for reading configuration attributes and writing state attributes

use std::collections::HashMap;

use stratus_core::provider::{ProviderError, ProviderResult};
use stratus_core::resource::Value;

pub type Attributes = HashMap<String, Value>;

pub fn get_str<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

pub fn require_str<'a>(attrs: &'a Attributes, key: &str) -> ProviderResult<&'a str> {
    get_str(attrs, key)
        .ok_or_else(|| ProviderError::validation(format!("Missing required attribute: {}", key)))
}

pub fn get_int(attrs: &Attributes, key: &str) -> Option<i64> {
    attrs.get(key).and_then(Value::as_int)
}

pub fn require_int(attrs: &Attributes, key: &str) -> ProviderResult<i64> {
    get_int(attrs, key)
        .ok_or_else(|| ProviderError::validation(format!("Missing required attribute: {}", key)))
}

pub fn get_bool(attrs: &Attributes, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

pub fn get_bool_or(attrs: &Attributes, key: &str, default: bool) -> bool {
    get_bool(attrs, key).unwrap_or(default)
}

/// Location attribute; unset means the product-wide default endpoint
pub fn location(attrs: &Attributes) -> &str {
    get_str(attrs, "location").unwrap_or("")
}

/// Nested blocks stored as a list of maps
pub fn get_blocks<'a>(attrs: &'a Attributes, key: &str) -> Vec<&'a Attributes> {
    attrs
        .get(key)
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_map).collect())
        .unwrap_or_default()
}

/// First nested block of a single-block attribute
pub fn get_block<'a>(attrs: &'a Attributes, key: &str) -> Option<&'a Attributes> {
    get_blocks(attrs, key).into_iter().next()
}

pub fn get_string_list(attrs: &Attributes, key: &str) -> Vec<String> {
    attrs
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn get_string_map(attrs: &Attributes, key: &str) -> HashMap<String, String> {
    attrs
        .get(key)
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Insert `value` when present, remove the key otherwise
pub fn set_opt(attrs: &mut Attributes, key: &str, value: Option<impl Into<Value>>) {
    match value {
        Some(v) => {
            attrs.insert(key.to_string(), v.into());
        }
        None => {
            attrs.remove(key);
        }
    }
}

/// Build one nested block
pub fn block<const N: usize>(entries: [(&str, Option<Value>); N]) -> Value {
    Value::Map(
        entries
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect(),
    )
}

pub fn string_list(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| Value::String(s.clone())).collect())
}

pub fn string_map(map: &HashMap<String, String>) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

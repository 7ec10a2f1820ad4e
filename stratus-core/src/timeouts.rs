//! Per-operation timeouts configured through a `timeouts` block

use std::collections::HashMap;
use std::time::Duration;

use crate::resource::Value;

/// Name of the attribute holding the timeouts block
pub const TIMEOUTS_ATTRIBUTE: &str = "timeouts";

/// Timeouts for each lifecycle operation of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(60 * 60),
            read: Duration::from_secs(20 * 60),
            update: Duration::from_secs(60 * 60),
            delete: Duration::from_secs(60 * 60),
        }
    }
}

impl Timeouts {
    /// Read the `timeouts` block from resource attributes, falling back to
    /// `defaults` for unset or unparsable entries. Schema validation rejects
    /// unparsable entries before an operation gets here.
    pub fn from_attributes(attributes: &HashMap<String, Value>, defaults: Timeouts) -> Self {
        let Some(block) = attributes.get(TIMEOUTS_ATTRIBUTE).and_then(Value::as_map) else {
            return defaults;
        };
        let get = |key: &str, fallback: Duration| {
            block
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| parse_duration(s).ok())
                .unwrap_or(fallback)
        };
        Self {
            create: get("create", defaults.create),
            read: get("read", defaults.read),
            update: get("update", defaults.update),
            delete: get("delete", defaults.delete),
        }
    }
}

/// Parse a duration string such as "90m", "1h30m", "45s" or "2h"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let input = s.trim();
    if input.is_empty() {
        return Err("Empty duration".to_string());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let multiplier = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("Invalid duration '{}': unknown unit '{}'", s, c)),
        };
        if digits.is_empty() {
            return Err(format!("Invalid duration '{}': missing number before '{}'", s, c));
        }
        total = digits
            .parse::<u64>()
            .ok()
            .and_then(|amount| amount.checked_mul(multiplier))
            .and_then(|seconds| total.checked_add(seconds))
            .ok_or_else(|| format!("Invalid duration '{}': too large", s))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("Invalid duration '{}': missing unit", s));
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("90m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration(" 2h "), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn rejects_durations_that_overflow() {
        let err = parse_duration("5124095576030432h").unwrap_err();
        assert!(err.contains("too large"), "{}", err);
        assert!(parse_duration("18446744073709551615s1s").is_err());
        assert!(parse_duration("99999999999999999999999s").is_err());
    }

    #[test]
    fn block_overrides_only_configured_operations() {
        let mut block = HashMap::new();
        block.insert("create".to_string(), Value::String("2h".to_string()));
        let mut attrs = HashMap::new();
        attrs.insert(TIMEOUTS_ATTRIBUTE.to_string(), Value::Map(block));

        let timeouts = Timeouts::from_attributes(&attrs, Timeouts::default());
        assert_eq!(timeouts.create, Duration::from_secs(7200));
        assert_eq!(timeouts.delete, Timeouts::default().delete);
    }

    #[test]
    fn missing_block_uses_defaults() {
        let timeouts = Timeouts::from_attributes(&HashMap::new(), Timeouts::default());
        assert_eq!(timeouts, Timeouts::default());
    }
}

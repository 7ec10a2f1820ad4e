//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, so configuration can be
//! rejected before any API call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;
use crate::timeouts::{TIMEOUTS_ATTRIBUTE, parse_duration};

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map with string keys
    Map(Box<AttributeType>),
    /// Nested block with its own attributes
    Object(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Enum type from a list of allowed values
    pub fn enum_of(values: &[&str]) -> Self {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// List of nested blocks
    pub fn list_of_objects(attributes: Vec<AttributeSchema>) -> Self {
        AttributeType::List(Box::new(AttributeType::Object(attributes)))
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Object(attributes), Value::Map(map)) => {
                for schema in attributes {
                    if schema.is_required() && !map.contains_key(&schema.name) {
                        return Err(TypeError::MissingRequired {
                            name: schema.name.clone(),
                        });
                    }
                }
                for (k, v) in map {
                    let schema = attributes.iter().find(|a| &a.name == k).ok_or_else(|| {
                        TypeError::UnknownAttribute { name: k.clone() }
                    })?;
                    schema
                        .attr_type
                        .validate(v)
                        .map_err(|e| TypeError::MapValueError {
                            key: k.clone(),
                            inner: Box::new(e),
                        })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Object(_) => "Object".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be configured")]
    ComputedAttribute { name: String },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// How an attribute participates in configuration and state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    /// Must be configured
    Required,
    /// May be configured, never set by the provider
    Optional,
    /// Set by the provider only
    Computed,
    /// May be configured; the provider fills it in when it is not
    OptionalComputed,
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub mode: AttributeMode,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Value must not be printed or logged
    pub sensitive: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            mode: AttributeMode::Optional,
            default: None,
            description: None,
            sensitive: false,
            force_new: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.mode = AttributeMode::Required;
        self
    }

    pub fn computed(mut self) -> Self {
        self.mode = AttributeMode::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.mode = AttributeMode::OptionalComputed;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.mode == AttributeMode::Required
    }

    pub fn is_configurable(&self) -> bool {
        self.mode != AttributeMode::Computed
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    /// Whether a `timeouts` block is accepted
    pub timeouts: bool,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            timeouts: false,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_timeouts(mut self) -> Self {
        self.timeouts = true;
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.is_required() && !attributes.contains_key(name) && schema.default.is_none()
            {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Type check each attribute
        for (name, value) in attributes {
            if self.timeouts && name == TIMEOUTS_ATTRIBUTE {
                if let Err(e) = validate_timeouts(value) {
                    errors.push(e);
                }
                continue;
            }
            match self.attributes.get(name) {
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
                Some(schema) if !schema.is_configurable() => {
                    errors.push(TypeError::ComputedAttribute { name: name.clone() })
                }
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(TypeError::AttributeError {
                            name: name.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort_by_key(|e| e.to_string());
            Err(errors)
        }
    }

    /// Return the attributes with schema defaults filled in for unset attributes
    pub fn apply_defaults(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        let mut merged = attributes.clone();
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default {
                merged
                    .entry(name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        merged
    }

    /// Names of `force_new` attributes whose configured value differs from state.
    ///
    /// A sensitive attribute missing from state is write-only (the API never
    /// returns it, so an imported state lacks it) and its value is unknown
    /// rather than changed.
    pub fn replacement_attributes(
        &self,
        current: &HashMap<String, Value>,
        desired: &HashMap<String, Value>,
    ) -> Vec<String> {
        let mut changed: Vec<String> = self
            .attributes
            .values()
            .filter(|schema| schema.force_new)
            .filter_map(|schema| {
                let want = desired.get(&schema.name)?;
                match current.get(&schema.name) {
                    Some(have) if have == want => None,
                    None if schema.sensitive => None,
                    _ => Some(schema.name.clone()),
                }
            })
            .collect();
        changed.sort();
        changed
    }

    /// Names of attributes whose values must not be displayed
    pub fn sensitive_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.sensitive)
            .map(|a| a.name.as_str())
            .collect();
        names.sort();
        names
    }
}

fn validate_timeouts(value: &Value) -> Result<(), TypeError> {
    let map = value.as_map().ok_or_else(|| TypeError::TypeMismatch {
        expected: "Map<String>".to_string(),
        got: value.type_name(),
    })?;
    for (key, v) in map {
        if !matches!(key.as_str(), "create" | "read" | "update" | "delete") {
            return Err(TypeError::UnknownAttribute {
                name: format!("{}.{}", TIMEOUTS_ATTRIBUTE, key),
            });
        }
        let s = v.as_str().ok_or_else(|| TypeError::TypeMismatch {
            expected: "String".to_string(),
            got: v.type_name(),
        })?;
        parse_duration(s).map_err(|message| TypeError::ValidationFailed { message })?;
    }
    Ok(())
}

/// Helper functions for common types
pub mod types {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n > 0 => Ok(()),
                Value::Int(_) => Err("Value must be positive".to_string()),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// TCP/UDP port number
    pub fn port() -> AttributeType {
        AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (1..=65535).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("Port {} out of range 1-65535", n)),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// UUID in the canonical hyphenated form
    pub fn uuid() -> AttributeType {
        AttributeType::Custom {
            name: "Uuid".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_uuid(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    static BUCKET_NAME: LazyLock<Option<Regex>> =
        LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").ok());

    /// Object storage bucket name (3-63 characters, lowercase, digits, dots, hyphens)
    pub fn bucket_name() -> AttributeType {
        AttributeType::Custom {
            name: "BucketName".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    if BUCKET_NAME.as_ref().is_some_and(|re| re.is_match(s)) && !s.contains("..") {
                        Ok(())
                    } else {
                        Err(format!(
                            "Invalid bucket name '{}': 3-63 lowercase letters, digits, dots or hyphens",
                            s
                        ))
                    }
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }
}

/// Validate a canonical hyphenated UUID
pub fn validate_uuid(s: &str) -> Result<(), String> {
    if s.len() != 36 || uuid::Uuid::parse_str(s).is_err() {
        return Err(format!("Invalid UUID '{}'", s));
    }
    Ok(())
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    }

    let ip = parts[0];
    let prefix = parts[1];

    // Validate IP address
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    // Validate prefix length
    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::enum_of(&["XS", "S"]);
        assert!(t.validate(&Value::String("XS".to_string())).is_ok());
        assert!(t.validate(&Value::String("XL".to_string())).is_err());
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
        assert!(t.validate(&Value::String("1".to_string())).is_err());
    }

    #[test]
    fn validate_uuid_type() {
        let t = types::uuid();
        assert!(
            t.validate(&Value::String(
                "7c9b4a52-7e0e-4bc4-8e36-4e3f4a1d6c11".to_string()
            ))
            .is_ok()
        );
        assert!(
            t.validate(&Value::String("7c9b4a527e0e4bc48e364e3f4a1d6c11".to_string()))
                .is_err()
        );
        assert!(t.validate(&Value::String("not-a-uuid".to_string())).is_err());
    }

    #[test]
    fn validate_port_type() {
        let t = types::port();
        assert!(t.validate(&Value::Int(51820)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(70000)).is_err());
    }

    #[test]
    fn validate_bucket_name_type() {
        let t = types::bucket_name();
        assert!(t.validate(&Value::String("my-bucket.logs".to_string())).is_ok());
        assert!(t.validate(&Value::String("ab".to_string())).is_err());
        assert!(t.validate(&Value::String("Upper".to_string())).is_err());
        assert!(t.validate(&Value::String("a..b".to_string())).is_err());
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();
        assert!(t.validate(&Value::String("10.0.0.0/16".to_string())).is_ok());
        assert!(t.validate(&Value::String("0.0.0.0/0".to_string())).is_ok());
        assert!(t.validate(&Value::String("10.0.0.0".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.0/33".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.256/16".to_string())).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_nested_object() {
        let t = AttributeType::list_of_objects(vec![
            AttributeSchema::new("datacenter_id", types::uuid()).required(),
            AttributeSchema::new("lan_id", AttributeType::String).required(),
        ]);
        let ok = Value::List(vec![Value::Map(attrs(&[
            (
                "datacenter_id",
                Value::String("7c9b4a52-7e0e-4bc4-8e36-4e3f4a1d6c11".to_string()),
            ),
            ("lan_id", Value::String("2".to_string())),
        ]))]);
        assert!(t.validate(&ok).is_ok());

        let missing = Value::List(vec![Value::Map(attrs(&[(
            "lan_id",
            Value::String("2".to_string()),
        )]))]);
        assert!(t.validate(&missing).is_err());

        let unknown = Value::List(vec![Value::Map(attrs(&[
            (
                "datacenter_id",
                Value::String("7c9b4a52-7e0e-4bc4-8e36-4e3f4a1d6c11".to_string()),
            ),
            ("lan_id", Value::String("2".to_string())),
            ("extra", Value::Bool(true)),
        ]))]);
        assert!(t.validate(&unknown).is_err());
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", types::positive_int()))
            .attribute(AttributeSchema::new("id", AttributeType::String).computed());

        assert!(
            schema
                .validate(&attrs(&[
                    ("name", Value::String("a".to_string())),
                    ("count", Value::Int(5)),
                ]))
                .is_ok()
        );

        let errors = schema
            .validate(&attrs(&[
                ("id", Value::String("x".to_string())),
                ("bogus", Value::Bool(true)),
            ]))
            .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(e, TypeError::MissingRequired { name } if name == "name")));
        assert!(errors.iter().any(|e| matches!(e, TypeError::ComputedAttribute { name } if name == "id")));
        assert!(errors.iter().any(|e| matches!(e, TypeError::UnknownAttribute { name } if name == "bogus")));
    }

    #[test]
    fn timeouts_block_accepted_only_when_enabled() {
        let timeouts = Value::Map(attrs(&[("create", Value::String("90m".to_string()))]));
        let without = ResourceSchema::new("r");
        assert!(without.validate(&attrs(&[("timeouts", timeouts.clone())])).is_err());

        let with = ResourceSchema::new("r").with_timeouts();
        assert!(with.validate(&attrs(&[("timeouts", timeouts)])).is_ok());

        let bad = Value::Map(attrs(&[("create", Value::String("soon".to_string()))]));
        assert!(with.validate(&attrs(&[("timeouts", bad)])).is_err());
    }

    #[test]
    fn defaults_fill_unset_attributes() {
        let schema = ResourceSchema::new("dns_record")
            .attribute(AttributeSchema::new("ttl", AttributeType::Int).with_default(3600i64))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool).with_default(true));
        let merged = schema.apply_defaults(&attrs(&[("ttl", Value::Int(60))]));
        assert_eq!(merged.get("ttl"), Some(&Value::Int(60)));
        assert_eq!(merged.get("enabled"), Some(&Value::Bool(true)));
    }

    #[test]
    fn replacement_attributes_only_for_changed_force_new() {
        let schema = ResourceSchema::new("kafka_topic")
            .attribute(AttributeSchema::new("name", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("cluster_id", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("description", AttributeType::String));
        let current = attrs(&[
            ("name", Value::String("a".to_string())),
            ("cluster_id", Value::String("c".to_string())),
            ("description", Value::String("old".to_string())),
        ]);
        let desired = attrs(&[
            ("name", Value::String("b".to_string())),
            ("cluster_id", Value::String("c".to_string())),
            ("description", Value::String("new".to_string())),
        ]);
        assert_eq!(schema.replacement_attributes(&current, &desired), vec!["name"]);
    }

    #[test]
    fn write_only_attribute_missing_from_state_is_not_a_change() {
        let schema = ResourceSchema::new("mariadb_cluster")
            .attribute(AttributeSchema::new("credentials", AttributeType::String).sensitive().force_new())
            .attribute(AttributeSchema::new("location", AttributeType::String).force_new());
        let desired = attrs(&[
            ("credentials", Value::String("admin:pw".to_string())),
            ("location", Value::String("de/txl".to_string())),
        ]);

        let imported = attrs(&[("location", Value::String("de/txl".to_string()))]);
        assert!(schema.replacement_attributes(&imported, &desired).is_empty());

        let stored = attrs(&[
            ("credentials", Value::String("admin:old".to_string())),
            ("location", Value::String("de/txl".to_string())),
        ]);
        assert_eq!(schema.replacement_attributes(&stored, &desired), vec!["credentials"]);

        let moved = attrs(&[]);
        assert_eq!(schema.replacement_attributes(&moved, &desired), vec!["location"]);
    }

    #[test]
    fn overflowing_timeout_is_a_validation_error() {
        let schema = ResourceSchema::new("r").with_timeouts();
        let huge = Value::Map(attrs(&[("create", Value::String("5124095576030432h".to_string()))]));
        let errors = schema.validate(&attrs(&[("timeouts", huge)])).unwrap_err();
        assert!(errors[0].to_string().contains("too large"));
    }
}

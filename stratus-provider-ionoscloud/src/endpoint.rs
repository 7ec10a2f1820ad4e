//! Endpoint resolution
//!
//! Every product API is served from a per-location base URL. The URL for a
//! (product, location) pair is chosen from, in order of precedence:
//!
//! 1. an explicit per-product endpoint in the provider configuration,
//! 2. a matching entry in the loaded configuration file,
//! 3. the product's `IONOS_API_URL_*` environment variable,
//! 4. the compiled-in default table.
//!
//! The resolved endpoint is handed to each request explicitly; clients never
//! keep a mutable "current" URL.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use stratus_core::provider::{ProviderError, ProviderResult};

use crate::fileconfig::FileConfig;

const KAFKA_ENDPOINTS: &[(&str, &str)] = &[
    ("", "https://kafka.de-fra.ionos.com"),
    ("de/fra", "https://kafka.de-fra.ionos.com"),
    ("de/txl", "https://kafka.de-txl.ionos.com"),
    ("es/vit", "https://kafka.es-vit.ionos.com"),
    ("fr/par", "https://kafka.fr-par.ionos.com"),
    ("gb/lhr", "https://kafka.gb-lhr.ionos.com"),
    ("gb/bhx", "https://kafka.gb-bhx.ionos.com"),
    ("us/ewr", "https://kafka.us-ewr.ionos.com"),
    ("us/las", "https://kafka.us-las.ionos.com"),
    ("us/mci", "https://kafka.us-mci.ionos.com"),
];

const DNS_ENDPOINTS: &[(&str, &str)] = &[("", "https://dns.de-fra.ionos.com")];

const MARIADB_ENDPOINTS: &[(&str, &str)] = &[
    ("", "https://mariadb.de-txl.ionos.com"),
    ("de/fra", "https://mariadb.de-fra.ionos.com"),
    ("de/txl", "https://mariadb.de-txl.ionos.com"),
    ("es/vit", "https://mariadb.es-vit.ionos.com"),
    ("fr/par", "https://mariadb.fr-par.ionos.com"),
    ("gb/lhr", "https://mariadb.gb-lhr.ionos.com"),
    ("us/ewr", "https://mariadb.us-ewr.ionos.com"),
    ("us/las", "https://mariadb.us-las.ionos.com"),
    ("us/mci", "https://mariadb.us-mci.ionos.com"),
];

const LOGGING_ENDPOINTS: &[(&str, &str)] = &[
    ("", "https://logging.de-txl.ionos.com"),
    ("de/fra", "https://logging.de-fra.ionos.com"),
    ("de/txl", "https://logging.de-txl.ionos.com"),
    ("es/vit", "https://logging.es-vit.ionos.com"),
    ("fr/par", "https://logging.fr-par.ionos.com"),
    ("gb/lhr", "https://logging.gb-lhr.ionos.com"),
];

const APIGATEWAY_ENDPOINTS: &[(&str, &str)] = &[
    ("", "https://apigateway.de-txl.ionos.com"),
    ("de/fra", "https://apigateway.de-fra.ionos.com"),
    ("de/txl", "https://apigateway.de-txl.ionos.com"),
    ("es/vit", "https://apigateway.es-vit.ionos.com"),
    ("fr/par", "https://apigateway.fr-par.ionos.com"),
    ("gb/lhr", "https://apigateway.gb-lhr.ionos.com"),
];

const VPN_ENDPOINTS: &[(&str, &str)] = &[
    ("", "https://vpn.de-fra.ionos.com"),
    ("de/fra", "https://vpn.de-fra.ionos.com"),
    ("de/txl", "https://vpn.de-txl.ionos.com"),
    ("es/vit", "https://vpn.es-vit.ionos.com"),
    ("fr/par", "https://vpn.fr-par.ionos.com"),
    ("gb/lhr", "https://vpn.gb-lhr.ionos.com"),
    ("gb/bhx", "https://vpn.gb-bhx.ionos.com"),
    ("us/ewr", "https://vpn.us-ewr.ionos.com"),
    ("us/las", "https://vpn.us-las.ionos.com"),
    ("us/mci", "https://vpn.us-mci.ionos.com"),
];

const OBJECT_STORAGE_ENDPOINTS: &[(&str, &str)] = &[
    ("", "https://s3.eu-central-3.ionoscloud.com"),
    ("eu-central-1", "https://s3.eu-central-1.ionoscloud.com"),
    ("eu-central-2", "https://s3.eu-central-2.ionoscloud.com"),
    ("eu-central-3", "https://s3.eu-central-3.ionoscloud.com"),
    ("eu-south-2", "https://s3.eu-south-2.ionoscloud.com"),
];

/// Object storage region used when no location is configured
pub const DEFAULT_OBJECT_STORAGE_REGION: &str = "eu-central-3";

/// Cloud product with its own API endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Kafka,
    Dns,
    MariaDb,
    Logging,
    ApiGateway,
    ObjectStorage,
    Vpn,
}

impl Product {
    pub const ALL: [Product; 7] = [
        Product::Kafka,
        Product::Dns,
        Product::MariaDb,
        Product::Logging,
        Product::ApiGateway,
        Product::ObjectStorage,
        Product::Vpn,
    ];

    /// Product name as used in the configuration file
    pub fn name(&self) -> &'static str {
        match self {
            Product::Kafka => "kafka",
            Product::Dns => "dns",
            Product::MariaDb => "mariadb",
            Product::Logging => "logging",
            Product::ApiGateway => "apigateway",
            Product::ObjectStorage => "objectstorage",
            Product::Vpn => "vpn",
        }
    }

    /// Environment variable overriding the product URL
    pub fn env_var(&self) -> &'static str {
        match self {
            Product::Kafka => "IONOS_API_URL_KAFKA",
            Product::Dns => "IONOS_API_URL_DNS",
            Product::MariaDb => "IONOS_API_URL_MARIADB",
            Product::Logging => "IONOS_API_URL_LOGGING",
            Product::ApiGateway => "IONOS_API_URL_APIGATEWAY",
            Product::ObjectStorage => "IONOS_API_URL_OBJECT_STORAGE",
            Product::Vpn => "IONOS_API_URL_VPN",
        }
    }

    fn default_endpoints(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Product::Kafka => KAFKA_ENDPOINTS,
            Product::Dns => DNS_ENDPOINTS,
            Product::MariaDb => MARIADB_ENDPOINTS,
            Product::Logging => LOGGING_ENDPOINTS,
            Product::ApiGateway => APIGATEWAY_ENDPOINTS,
            Product::ObjectStorage => OBJECT_STORAGE_ENDPOINTS,
            Product::Vpn => VPN_ENDPOINTS,
        }
    }

    /// Compiled-in default URL for a location; the empty location selects the
    /// product-wide default
    pub fn default_endpoint(&self, location: &str) -> Option<&'static str> {
        self.default_endpoints()
            .iter()
            .find(|(loc, _)| *loc == location)
            .map(|(_, url)| *url)
    }

    /// Locations with a compiled-in endpoint
    pub fn locations(&self) -> Vec<&'static str> {
        self.default_endpoints()
            .iter()
            .map(|(loc, _)| *loc)
            .filter(|loc| !loc.is_empty())
            .collect()
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Product {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        Product::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| {
                ProviderError::configuration(format!(
                    "Unknown product '{}', expected one of: {}",
                    s,
                    Product::ALL.map(|p| p.name()).join(", ")
                ))
            })
    }
}

/// Where a resolved URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    Explicit,
    ConfigFile,
    Environment,
    Default,
}

impl fmt::Display for EndpointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointSource::Explicit => "provider configuration",
            EndpointSource::ConfigFile => "config file",
            EndpointSource::Environment => "environment",
            EndpointSource::Default => "default",
        };
        write!(f, "{}", s)
    }
}

/// Endpoint selected for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub product: Product,
    pub location: String,
    pub url: String,
    pub source: EndpointSource,
    pub skip_tls_verify: bool,
    /// Base64-encoded PEM certificate authority to trust in addition to the system roots
    pub certificate_authority: Option<String>,
}

/// Normalize a user-supplied URL: trim whitespace and trailing slashes, and
/// default to https when no scheme is given
pub fn clean_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Inputs to endpoint resolution besides product and location
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub explicit: Option<&'a str>,
    pub file: Option<&'a FileConfig>,
    pub insecure: bool,
}

/// Resolve the endpoint for (product, location).
///
/// `env` looks up environment variables; passing it in keeps resolution a
/// pure function of its inputs.
pub fn resolve(
    product: Product,
    location: &str,
    overrides: &Overrides<'_>,
    env: impl Fn(&str) -> Option<String>,
) -> ProviderResult<ResolvedEndpoint> {
    let location = location.trim();
    let environment_ca = overrides
        .file
        .and_then(|f| f.environment_certificate())
        .map(str::to_string);
    let endpoint = |url: String, source: EndpointSource| ResolvedEndpoint {
        product,
        location: location.to_string(),
        url,
        source,
        skip_tls_verify: overrides.insecure,
        certificate_authority: environment_ca.clone(),
    };

    if let Some(url) = overrides.explicit.filter(|u| !u.trim().is_empty()) {
        return Ok(endpoint(clean_url(url), EndpointSource::Explicit));
    }

    if let Some(entry) = overrides
        .file
        .and_then(|f| f.endpoint_for(product.name(), location))
    {
        let mut resolved = endpoint(clean_url(&entry.name), EndpointSource::ConfigFile);
        resolved.skip_tls_verify |= entry.skip_tls_verify;
        if entry.certificate_auth_data.is_some() {
            resolved.certificate_authority = entry.certificate_auth_data.clone();
        }
        return Ok(resolved);
    }

    if let Some(url) = env(product.env_var()).filter(|u| !u.trim().is_empty()) {
        return Ok(endpoint(clean_url(&url), EndpointSource::Environment));
    }

    match product.default_endpoint(location) {
        Some(url) => Ok(endpoint(url.to_string(), EndpointSource::Default)),
        None => Err(ProviderError::configuration(format!(
            "Unsupported location '{}' for {}, expected one of: {}",
            location,
            product,
            product.locations().join(", ")
        ))),
    }
}

/// Provider-wide endpoint resolver
///
/// Holds the inputs captured when the provider is configured and resolves
/// endpoints for every request.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    explicit: HashMap<Product, String>,
    file: Option<Arc<FileConfig>>,
    env: HashMap<String, String>,
    insecure: bool,
}

impl EndpointResolver {
    pub fn new(
        explicit: HashMap<Product, String>,
        file: Option<Arc<FileConfig>>,
        env: HashMap<String, String>,
        insecure: bool,
    ) -> Self {
        Self {
            explicit,
            file,
            env,
            insecure,
        }
    }

    pub fn resolve(&self, product: Product, location: &str) -> ProviderResult<ResolvedEndpoint> {
        let overrides = Overrides {
            explicit: self.explicit.get(&product).map(String::as_str),
            file: self.file.as_deref(),
            insecure: self.insecure,
        };
        let resolved = resolve(product, location, &overrides, |key| self.env.get(key).cloned())?;
        log::trace!(
            "resolved {} endpoint for location '{}' to {} ({})",
            product,
            resolved.location,
            resolved.url,
            resolved.source
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::provider::ErrorKind;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn file_with_kafka_override() -> FileConfig {
        FileConfig::parse(
            r#"
environments:
  - name: test
    certificateAuthData: ZW52LWNh
    products:
      - name: kafka
        endpoints:
          - location: de/fra
            name: https://kafka.file.example.com/
            skipTlsVerify: true
"#,
        )
        .unwrap()
    }

    #[test]
    fn config_file_override_beats_env_and_defaults() {
        let file = file_with_kafka_override();
        let overrides = Overrides {
            file: Some(&file),
            ..Default::default()
        };
        let env = |key: &str| {
            (key == "IONOS_API_URL_KAFKA").then(|| "https://kafka.env.example.com".to_string())
        };

        let resolved = resolve(Product::Kafka, "de/fra", &overrides, env).unwrap();
        assert_eq!(resolved.url, "https://kafka.file.example.com");
        assert_eq!(resolved.source, EndpointSource::ConfigFile);
        assert!(resolved.skip_tls_verify);
        assert_eq!(resolved.certificate_authority.as_deref(), Some("ZW52LWNh"));
    }

    #[test]
    fn config_file_override_applies_only_to_its_location() {
        let file = file_with_kafka_override();
        let overrides = Overrides {
            file: Some(&file),
            ..Default::default()
        };
        let resolved = resolve(Product::Kafka, "de/txl", &overrides, no_env).unwrap();
        assert_eq!(resolved.url, "https://kafka.de-txl.ionos.com");
        assert_eq!(resolved.source, EndpointSource::Default);
    }

    #[test]
    fn defaults_for_every_product_and_location() {
        let overrides = Overrides::default();
        for product in Product::ALL {
            for location in product.locations() {
                let resolved = resolve(product, location, &overrides, no_env).unwrap();
                assert_eq!(Some(resolved.url.as_str()), product.default_endpoint(location));
                assert_eq!(resolved.source, EndpointSource::Default);
            }
            let resolved = resolve(product, "", &overrides, no_env).unwrap();
            assert_eq!(Some(resolved.url.as_str()), product.default_endpoint(""));
        }
    }

    #[test]
    fn env_var_is_cleaned_and_used_without_higher_overrides() {
        let env = |key: &str| {
            (key == "IONOS_API_URL_LOGGING").then(|| " logging.internal.example.com/ ".to_string())
        };
        let resolved = resolve(Product::Logging, "de/txl", &Overrides::default(), env).unwrap();
        assert_eq!(resolved.url, "https://logging.internal.example.com");
        assert_eq!(resolved.source, EndpointSource::Environment);
    }

    #[test]
    fn env_var_of_other_product_is_ignored() {
        let env = |key: &str| {
            (key == "IONOS_API_URL_KAFKA").then(|| "https://kafka.env.example.com".to_string())
        };
        let resolved = resolve(Product::Vpn, "", &Overrides::default(), env).unwrap();
        assert_eq!(resolved.url, "https://vpn.de-fra.ionos.com");
    }

    #[test]
    fn explicit_override_beats_config_file() {
        let file = file_with_kafka_override();
        let overrides = Overrides {
            explicit: Some("http://localhost:8080/"),
            file: Some(&file),
            insecure: false,
        };
        let resolved = resolve(Product::Kafka, "de/fra", &overrides, no_env).unwrap();
        assert_eq!(resolved.url, "http://localhost:8080");
        assert_eq!(resolved.source, EndpointSource::Explicit);
        assert!(!resolved.skip_tls_verify);
    }

    #[test]
    fn unknown_location_without_override_is_configuration_error() {
        let err = resolve(Product::Logging, "us/las", &Overrides::default(), no_env).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert!(err.message.contains("de/fra"));
    }

    #[test]
    fn unknown_location_with_env_override_resolves() {
        let env = |key: &str| {
            (key == "IONOS_API_URL_LOGGING").then(|| "https://logging.example.com".to_string())
        };
        let resolved = resolve(Product::Logging, "us/las", &Overrides::default(), env).unwrap();
        assert_eq!(resolved.url, "https://logging.example.com");
    }

    #[test]
    fn insecure_flag_propagates() {
        let overrides = Overrides {
            insecure: true,
            ..Default::default()
        };
        let resolved = resolve(Product::Dns, "", &overrides, no_env).unwrap();
        assert!(resolved.skip_tls_verify);
    }

    #[test]
    fn resolver_uses_captured_env_snapshot() {
        let mut env = HashMap::new();
        env.insert(
            "IONOS_API_URL_MARIADB".to_string(),
            "https://mariadb.example.com".to_string(),
        );
        let resolver = EndpointResolver::new(HashMap::new(), None, env, false);
        let resolved = resolver.resolve(Product::MariaDb, "de/fra").unwrap();
        assert_eq!(resolved.url, "https://mariadb.example.com");
    }

    #[test]
    fn product_names_parse() {
        assert_eq!("kafka".parse::<Product>().unwrap(), Product::Kafka);
        assert_eq!("object_storage".parse::<Product>().unwrap(), Product::ObjectStorage);
        assert_eq!("API-Gateway".parse::<Product>().unwrap(), Product::ApiGateway);
        assert!("compute".parse::<Product>().is_err());
    }

    #[test]
    fn clean_url_normalizes() {
        assert_eq!(clean_url("https://a.example.com/"), "https://a.example.com");
        assert_eq!(clean_url("a.example.com"), "https://a.example.com");
        assert_eq!(clean_url("http://localhost:1234"), "http://localhost:1234");
    }
}

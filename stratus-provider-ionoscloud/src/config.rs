//! Provider configuration
//!
//! Settings come from three places: explicit values set by the caller, the
//! `IONOS_*` environment variables and the current profile of the
//! configuration file. Explicit values win over the environment, the
//! environment wins over the file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use stratus_core::provider::{ProviderError, ProviderResult};

use crate::endpoint::{EndpointResolver, Product};
use crate::fileconfig::FileConfig;

pub const ENV_TOKEN: &str = "IONOS_TOKEN";
pub const ENV_USERNAME: &str = "IONOS_USERNAME";
pub const ENV_PASSWORD: &str = "IONOS_PASSWORD";
pub const ENV_S3_ACCESS_KEY: &str = "IONOS_S3_ACCESS_KEY";
pub const ENV_S3_SECRET_KEY: &str = "IONOS_S3_SECRET_KEY";
pub const ENV_CONFIG_FILE: &str = "IONOS_CONFIG_FILE";
pub const ENV_ALLOW_INSECURE: &str = "IONOS_ALLOW_INSECURE";

/// Credentials for the REST APIs
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => write!(f, "Token(***)"),
            Credentials::Basic { username, .. } => {
                write!(f, "Basic {{ username: {:?}, password: *** }}", username)
            }
        }
    }
}

/// Access keys for object storage
#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S3Credentials {{ access_key: {:?}, secret_key: *** }}", self.access_key)
    }
}

/// Provider configuration
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    /// Per-product endpoint overrides
    pub endpoints: HashMap<Product, String>,
    /// Skip TLS certificate verification for every endpoint
    pub insecure: bool,
    /// Configuration file; `None` means the default path, which may be absent
    pub config_file: Option<PathBuf>,
    /// Snapshot of the `IONOS_API_URL_*` variables used for endpoint resolution
    pub env: HashMap<String, String>,
}

impl ProviderConfig {
    /// Configuration from the process environment
    pub fn from_env() -> Self {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("IONOS_"))
            .collect();
        Self::from_env_map(&env)
    }

    /// Configuration from a snapshot of environment variables
    pub fn from_env_map(env: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            env.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url_vars = Product::ALL
            .iter()
            .filter_map(|p| get(p.env_var()).map(|v| (p.env_var().to_string(), v)))
            .collect();

        Self {
            token: get(ENV_TOKEN),
            username: get(ENV_USERNAME),
            password: get(ENV_PASSWORD),
            s3_access_key: get(ENV_S3_ACCESS_KEY),
            s3_secret_key: get(ENV_S3_SECRET_KEY),
            endpoints: HashMap::new(),
            insecure: get(ENV_ALLOW_INSECURE).is_some_and(|v| is_truthy(&v)),
            config_file: get(ENV_CONFIG_FILE).map(PathBuf::from),
            env: url_vars,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_s3_keys(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.s3_access_key = Some(access_key.into());
        self.s3_secret_key = Some(secret_key.into());
        self
    }

    pub fn with_endpoint(mut self, product: Product, url: impl Into<String>) -> Self {
        self.endpoints.insert(product, url.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Fill in credentials missing here from the current profile of the file
    pub fn merge_profile(&mut self, file: &FileConfig) {
        let Some(creds) = file.profile_credentials() else {
            return;
        };
        if self.credentials().is_some() {
            return;
        }
        log::debug!("using credentials from the config file profile");
        self.token = self.token.take().or_else(|| creds.token.clone());
        self.username = self.username.take().or_else(|| creds.username.clone());
        self.password = self.password.take().or_else(|| creds.password.clone());
    }

    /// REST credentials; a token takes precedence over username and password
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(token) = &self.token {
            return Some(Credentials::Token(token.clone()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn s3_credentials(&self) -> Option<S3Credentials> {
        match (&self.s3_access_key, &self.s3_secret_key) {
            (Some(access_key), Some(secret_key)) => Some(S3Credentials {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
            }),
            _ => None,
        }
    }

    /// Check the configuration carries usable credentials.
    ///
    /// REST credentials may be left out when object storage keys are set;
    /// REST calls then fail when they are made.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.username.is_some() != self.password.is_some() && self.token.is_none() {
            return Err(ProviderError::configuration(
                "Both username and password must be set for basic authentication",
            ));
        }
        if self.s3_access_key.is_some() != self.s3_secret_key.is_some() {
            return Err(ProviderError::configuration(format!(
                "Both {} and {} must be set for object storage",
                ENV_S3_ACCESS_KEY, ENV_S3_SECRET_KEY
            )));
        }
        if self.credentials().is_none() && self.s3_credentials().is_none() {
            return Err(ProviderError::configuration(format!(
                "Missing credentials: set {} or {} and {}, or {} and {} for object storage only",
                ENV_TOKEN, ENV_USERNAME, ENV_PASSWORD, ENV_S3_ACCESS_KEY, ENV_S3_SECRET_KEY
            )));
        }
        Ok(())
    }

    /// Load the configuration file.
    ///
    /// A missing file at the default location is not an error; a missing file
    /// that was named explicitly is.
    pub fn load_file_config(&self) -> ProviderResult<Option<FileConfig>> {
        let result = match &self.config_file {
            Some(path) => FileConfig::load(path).map(Some),
            None => match FileConfig::default_path() {
                Some(path) => FileConfig::load_if_exists(&path),
                None => Ok(None),
            },
        };
        result.map_err(|e| ProviderError::configuration(e.to_string()).with_cause(e))
    }

    /// Endpoint resolver capturing this configuration
    pub fn endpoint_resolver(&self, file: Option<Arc<FileConfig>>) -> EndpointResolver {
        EndpointResolver::new(self.endpoints.clone(), file, self.env.clone(), self.insecure)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

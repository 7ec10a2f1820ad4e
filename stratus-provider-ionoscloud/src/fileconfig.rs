//! Shared IONOS configuration file
//!
//! The file (YAML, `~/.ionos/config` by default) carries profiles with
//! credentials and environments with per-product, per-location endpoint
//! overrides:
//!
//! ```yaml
//! version: 1.0
//! currentProfile: dev
//! profiles:
//!   - name: dev
//!     environment: dev
//!     credentials:
//!       token: "..."
//! environments:
//!   - name: dev
//!     certificateAuthData: "..."
//!     products:
//!       - name: kafka
//!         endpoints:
//!           - location: de/fra
//!             name: https://kafka.dev.example.com
//!             skipTlsVerify: true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Profile '{0}' selected by currentProfile does not exist")]
    ProfileNotFound(String),
}

/// Parsed configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub version: Option<f64>,
    #[serde(default)]
    pub current_profile: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub credentials: Option<FileCredentials>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCredentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub certificate_auth_data: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductOverrides {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointOverride>,
}

/// Endpoint override for one location of a product
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointOverride {
    #[serde(default)]
    pub location: String,
    /// Endpoint URL
    pub name: String,
    #[serde(default)]
    pub skip_tls_verify: bool,
    #[serde(default)]
    pub certificate_auth_data: Option<String>,
}

impl FileConfig {
    /// Default location of the configuration file (`~/.ionos/config`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ionos").join("config"))
    }

    /// Load and parse a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.check_profile()?;
        log::debug!("loaded config file {}", path.display());
        Ok(config)
    }

    /// Load the file only if it exists
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    fn check_profile(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.current_profile
            && !self.profiles.iter().any(|p| &p.name == name)
        {
            return Err(ConfigError::ProfileNotFound(name.clone()));
        }
        Ok(())
    }

    /// Profile selected by `currentProfile`, or the only profile when there is one
    pub fn current_profile(&self) -> Option<&Profile> {
        match &self.current_profile {
            Some(name) => self.profiles.iter().find(|p| &p.name == name),
            None if self.profiles.len() == 1 => self.profiles.first(),
            None => None,
        }
    }

    /// Environment of the current profile, or the only environment when there is one
    pub fn current_environment(&self) -> Option<&Environment> {
        let by_profile = self
            .current_profile()
            .and_then(|p| p.environment.as_ref())
            .and_then(|name| self.environments.iter().find(|e| &e.name == name));
        match by_profile {
            Some(env) => Some(env),
            None if self.environments.len() == 1 => self.environments.first(),
            None => None,
        }
    }

    /// Credentials of the current profile
    pub fn profile_credentials(&self) -> Option<&FileCredentials> {
        self.current_profile().and_then(|p| p.credentials.as_ref())
    }

    /// Endpoint override for (product, location) in the current environment.
    ///
    /// The first matching entry wins; further matches are reported and ignored.
    pub fn endpoint_for(&self, product: &str, location: &str) -> Option<&EndpointOverride> {
        let environment = self.current_environment()?;
        let mut matches = environment
            .products
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(product))
            .flat_map(|p| p.endpoints.iter())
            .filter(|e| e.location.trim() == location);

        let first = matches.next()?;
        let ignored = matches.count();
        if ignored > 0 {
            log::warn!(
                "{} endpoint overrides found for product '{}' and location '{}' in environment '{}', using the first one ({})",
                ignored + 1,
                product,
                location,
                environment.name,
                first.name
            );
        }
        Some(first)
    }

    /// Certificate authority data that applies to the whole current environment
    pub fn environment_certificate(&self) -> Option<&str> {
        self.current_environment()
            .and_then(|e| e.certificate_auth_data.as_deref())
    }
}

//! Stratus IONOS Cloud Provider
//!
//! Manages Kafka, Cloud DNS, MariaDB, logging pipelines, API gateways,
//! WireGuard VPN gateways and object storage buckets.
//!
//! ## Module Structure
//!
//! - `config` / `fileconfig` - provider settings from the environment and the
//!   shared IONOS configuration file
//! - `endpoint` - per-product, per-location endpoint resolution
//! - `client` - REST client shared by the product services
//! - `services` - typed wrappers around each product API
//! - `resources` - resource, data source and ephemeral implementations
//! - `provider` - `IonosCloudProvider`, the `Provider` implementation

pub mod client;
pub mod config;
pub mod endpoint;
pub mod fileconfig;
pub mod provider;
pub mod resources;
pub mod services;
pub mod utils;

pub use config::ProviderConfig;
pub use endpoint::{EndpointResolver, Product, ResolvedEndpoint};
pub use provider::IonosCloudProvider;

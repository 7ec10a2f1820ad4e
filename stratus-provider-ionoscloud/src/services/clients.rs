//! Bundle of product services shared by all resource operations

use std::sync::Arc;

use stratus_core::provider::ProviderResult;

use crate::client::ApiClient;
use crate::config::ProviderConfig;
use crate::endpoint::{EndpointResolver, Product};
use crate::fileconfig::FileConfig;

use super::RestService;
use super::apigateway::ApiGatewayService;
use super::dns::DnsService;
use super::kafka::KafkaService;
use super::logging::LoggingService;
use super::mariadb::MariaDbService;
use super::objectstorage::ObjectStorageService;
use super::vpn::VpnService;

#[derive(Debug, Clone)]
pub struct ServiceClients {
    pub endpoints: Arc<EndpointResolver>,
    pub kafka: KafkaService,
    pub dns: DnsService,
    pub mariadb: MariaDbService,
    pub logging: LoggingService,
    pub apigateway: ApiGatewayService,
    pub objectstorage: ObjectStorageService,
    pub vpn: VpnService,
}

impl ServiceClients {
    /// Build every service from a validated configuration.
    ///
    /// Credentials missing from `config` are taken from the current profile of
    /// `file`.
    pub fn new(config: &ProviderConfig, file: Option<FileConfig>) -> ProviderResult<Self> {
        let mut config = config.clone();
        if let Some(file) = &file {
            config.merge_profile(file);
        }
        config.validate()?;
        if config.credentials().is_none() {
            log::debug!("no REST credentials configured, only object storage is usable");
        }

        let client = ApiClient::new(config.credentials())?;
        let endpoints = Arc::new(config.endpoint_resolver(file.map(Arc::new)));
        let rest = |product| RestService::new(product, client.clone(), endpoints.clone());

        Ok(Self {
            kafka: KafkaService::new(rest(Product::Kafka)),
            dns: DnsService::new(rest(Product::Dns)),
            mariadb: MariaDbService::new(rest(Product::MariaDb)),
            logging: LoggingService::new(rest(Product::Logging)),
            apigateway: ApiGatewayService::new(rest(Product::ApiGateway)),
            vpn: VpnService::new(rest(Product::Vpn)),
            objectstorage: ObjectStorageService::new(config.s3_credentials(), endpoints.clone()),
            endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn requires_credentials() {
        let err = ServiceClients::new(&ProviderConfig::default(), None).unwrap_err();
        assert_eq!(err.kind, stratus_core::provider::ErrorKind::Configuration);
    }

    #[test]
    fn profile_credentials_are_enough() {
        let file = FileConfig::parse(
            "profiles:\n  - name: p\n    credentials:\n      token: t\n",
        )
        .unwrap();
        let clients = ServiceClients::new(&ProviderConfig::default(), Some(file)).unwrap();
        let endpoint = clients.endpoints.resolve(Product::Kafka, "").unwrap();
        assert_eq!(endpoint.url, "https://kafka.de-fra.ionos.com");
    }

    #[tokio::test]
    async fn object_storage_keys_without_rest_credentials() {
        let config = ProviderConfig::default().with_s3_keys("ak", "sk");
        let clients = ServiceClients::new(&config, None).unwrap();

        let err = clients.dns.get_zone("z-1").await.unwrap_err();
        assert_eq!(err.kind, stratus_core::provider::ErrorKind::Configuration);
    }
}

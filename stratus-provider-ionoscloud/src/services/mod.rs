//! Product API services
//!
//! Each service wraps the shared [`ApiClient`](crate::client::ApiClient) for
//! one product. Methods take the location of the object they address and
//! resolve the endpoint for every call.
//!
//! ## Module Structure
//!
//! - `kafka`, `dns`, `mariadb`, `logging`, `apigateway`, `vpn` - REST products
//! - `objectstorage` - S3-compatible object storage
//! - `clients` - `ServiceClients`, the bundle handed to every resource

pub mod apigateway;
pub mod clients;
pub mod dns;
pub mod kafka;
pub mod logging;
pub mod mariadb;
pub mod objectstorage;
pub mod vpn;

pub use clients::ServiceClients;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stratus_core::provider::ProviderResult;

use crate::client::ApiClient;
use crate::endpoint::{EndpointResolver, Product, ResolvedEndpoint};

/// Provisioning state reported once an object is ready
pub const STATE_AVAILABLE: &str = "AVAILABLE";
/// Provisioning state reported when the cloud gave up on an object
pub const STATE_FAILED: &str = "FAILED";

/// Client and endpoint resolver bound to one product
#[derive(Debug, Clone)]
pub struct RestService {
    product: Product,
    client: ApiClient,
    endpoints: Arc<EndpointResolver>,
}

impl RestService {
    pub fn new(product: Product, client: ApiClient, endpoints: Arc<EndpointResolver>) -> Self {
        Self {
            product,
            client,
            endpoints,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Endpoint serving `location`
    pub fn endpoint(&self, location: &str) -> ProviderResult<ResolvedEndpoint> {
        self.endpoints.resolve(self.product, location)
    }

    pub async fn get<T: DeserializeOwned>(&self, location: &str, path: &str) -> ProviderResult<T> {
        let endpoint = self.endpoint(location)?;
        self.client.get(&endpoint, path).await
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        location: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> ProviderResult<Vec<T>> {
        let endpoint = self.endpoint(location)?;
        let collection: Collection<T> = self.client.get_query(&endpoint, path, query).await?;
        Ok(collection.items)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        location: &str,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let endpoint = self.endpoint(location)?;
        self.client.post(&endpoint, path, body).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        location: &str,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let endpoint = self.endpoint(location)?;
        self.client.put(&endpoint, path, body).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        location: &str,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        let endpoint = self.endpoint(location)?;
        self.client.patch(&endpoint, path, body).await
    }

    pub async fn delete(&self, location: &str, path: &str) -> ProviderResult<()> {
        let endpoint = self.endpoint(location)?;
        self.client.delete(&endpoint, path).await
    }
}

/// Object returned by the REST APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResource<P, M = Metadata> {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<M>,
    pub properties: P,
}

/// List response
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Body of create and update requests
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest<P> {
    pub properties: P,
}

impl<P> CreateRequest<P> {
    pub fn new(properties: P) -> Self {
        Self { properties }
    }
}

/// Metadata shared by all REST products
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, alias = "status")]
    pub state: Option<String>,
    #[serde(default, alias = "statusMessage")]
    pub message: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub last_modified_date: Option<String>,
}

/// Access to the provisioning state of an object
pub trait Provisioned {
    fn state(&self) -> Option<&str>;

    fn state_message(&self) -> Option<&str> {
        None
    }
}

impl Provisioned for Metadata {
    fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    fn state_message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl<P, M: Provisioned> Provisioned for ApiResource<P, M> {
    fn state(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(Provisioned::state)
    }

    fn state_message(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(Provisioned::state_message)
    }
}

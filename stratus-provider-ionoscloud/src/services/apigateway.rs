//! API gateways and their routes

use serde::{Deserialize, Serialize};
use stratus_core::provider::ProviderResult;

use super::{ApiResource, CreateRequest, Metadata, Provisioned, RestService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    pub name: String,
    #[serde(default)]
    pub logs: bool,
    #[serde(default)]
    pub metrics: bool,
    #[serde(default)]
    pub custom_domains: Vec<CustomDomain>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMetadata {
    #[serde(flatten)]
    pub common: Metadata,
    #[serde(default)]
    pub public_endpoint: Option<String>,
}

impl Provisioned for GatewayMetadata {
    fn state(&self) -> Option<&str> {
        self.common.state()
    }

    fn state_message(&self) -> Option<&str> {
        self.common.state_message()
    }
}

pub type Gateway = ApiResource<GatewayProperties, GatewayMetadata>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upstream {
    pub scheme: String,
    pub host: String,
    pub port: i64,
    pub loadbalancer: String,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProperties {
    pub name: String,
    #[serde(rename = "type")]
    pub route_type: String,
    pub paths: Vec<String>,
    pub methods: Vec<String>,
    #[serde(default)]
    pub websocket: bool,
    pub upstreams: Vec<Upstream>,
}

pub type Route = ApiResource<RouteProperties>;

#[derive(Debug, Clone)]
pub struct ApiGatewayService {
    rest: RestService,
}

impl ApiGatewayService {
    pub fn new(rest: RestService) -> Self {
        Self { rest }
    }

    pub async fn create_gateway(
        &self,
        location: &str,
        properties: GatewayProperties,
    ) -> ProviderResult<Gateway> {
        let gateway: Gateway = self
            .rest
            .post(location, "/gateways", &CreateRequest::new(properties))
            .await?;
        log::info!("created API gateway {} in '{}'", gateway.id, location);
        Ok(gateway)
    }

    pub async fn get_gateway(&self, location: &str, id: &str) -> ProviderResult<Gateway> {
        self.rest.get(location, &format!("/gateways/{}", id)).await
    }

    pub async fn list_gateways(&self, location: &str) -> ProviderResult<Vec<Gateway>> {
        self.rest.list(location, "/gateways", &[]).await
    }

    pub async fn update_gateway(
        &self,
        location: &str,
        id: &str,
        properties: GatewayProperties,
    ) -> ProviderResult<Gateway> {
        self.rest
            .put(location, &format!("/gateways/{}", id), &CreateRequest::new(properties))
            .await
    }

    pub async fn delete_gateway(&self, location: &str, id: &str) -> ProviderResult<()> {
        self.rest.delete(location, &format!("/gateways/{}", id)).await
    }

    pub async fn create_route(
        &self,
        location: &str,
        gateway_id: &str,
        properties: RouteProperties,
    ) -> ProviderResult<Route> {
        let route: Route = self
            .rest
            .post(
                location,
                &format!("/gateways/{}/routes", gateway_id),
                &CreateRequest::new(properties),
            )
            .await?;
        log::info!("created route {} on API gateway {}", route.id, gateway_id);
        Ok(route)
    }

    pub async fn get_route(
        &self,
        location: &str,
        gateway_id: &str,
        route_id: &str,
    ) -> ProviderResult<Route> {
        self.rest
            .get(location, &format!("/gateways/{}/routes/{}", gateway_id, route_id))
            .await
    }

    pub async fn update_route(
        &self,
        location: &str,
        gateway_id: &str,
        route_id: &str,
        properties: RouteProperties,
    ) -> ProviderResult<Route> {
        self.rest
            .put(
                location,
                &format!("/gateways/{}/routes/{}", gateway_id, route_id),
                &CreateRequest::new(properties),
            )
            .await
    }

    pub async fn delete_route(
        &self,
        location: &str,
        gateway_id: &str,
        route_id: &str,
    ) -> ProviderResult<()> {
        self.rest
            .delete(location, &format!("/gateways/{}/routes/{}", gateway_id, route_id))
            .await
    }
}

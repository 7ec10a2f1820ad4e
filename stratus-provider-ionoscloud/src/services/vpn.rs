//! WireGuard VPN gateways and peers

use serde::{Deserialize, Serialize};
use stratus_core::provider::ProviderResult;

use super::{ApiResource, CreateRequest, Metadata, Provisioned, RestService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConnection {
    pub datacenter_id: String,
    pub lan_id: String,
    #[serde(default, rename = "ipv4CIDR", skip_serializing_if = "Option::is_none")]
    pub ipv4_cidr: Option<String>,
    #[serde(default, rename = "ipv6CIDR", skip_serializing_if = "Option::is_none")]
    pub ipv6_cidr: Option<String>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireguardGatewayProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "gatewayIP")]
    pub gateway_ip: String,
    #[serde(default, rename = "interfaceIPv4CIDR", skip_serializing_if = "Option::is_none")]
    pub interface_ipv4_cidr: Option<String>,
    #[serde(default, rename = "interfaceIPv6CIDR", skip_serializing_if = "Option::is_none")]
    pub interface_ipv6_cidr: Option<String>,
    pub connections: Vec<GatewayConnection>,
    /// Write-only; the API never returns it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<i64>,
}

impl std::fmt::Debug for WireguardGatewayProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireguardGatewayProperties")
            .field("name", &self.name)
            .field("gateway_ip", &self.gateway_ip)
            .field("connections", &self.connections)
            .field("listen_port", &self.listen_port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireguardGatewayMetadata {
    #[serde(flatten)]
    pub common: Metadata,
    #[serde(default)]
    pub public_key: Option<String>,
}

impl Provisioned for WireguardGatewayMetadata {
    fn state(&self) -> Option<&str> {
        self.common.state()
    }

    fn state_message(&self) -> Option<&str> {
        self.common.state_message()
    }
}

pub type WireguardGateway = ApiResource<WireguardGatewayProperties, WireguardGatewayMetadata>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEndpoint {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<PeerEndpoint>,
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<String>,
    pub public_key: String,
}

pub type Peer = ApiResource<PeerProperties>;

#[derive(Debug, Clone)]
pub struct VpnService {
    rest: RestService,
}

impl VpnService {
    pub fn new(rest: RestService) -> Self {
        Self { rest }
    }

    pub async fn create_gateway(
        &self,
        location: &str,
        properties: WireguardGatewayProperties,
    ) -> ProviderResult<WireguardGateway> {
        let gateway: WireguardGateway = self
            .rest
            .post(location, "/wireguardgateways", &CreateRequest::new(properties))
            .await?;
        log::info!("created WireGuard gateway {} in '{}'", gateway.id, location);
        Ok(gateway)
    }

    pub async fn get_gateway(&self, location: &str, id: &str) -> ProviderResult<WireguardGateway> {
        self.rest
            .get(location, &format!("/wireguardgateways/{}", id))
            .await
    }

    pub async fn list_gateways(&self, location: &str) -> ProviderResult<Vec<WireguardGateway>> {
        self.rest.list(location, "/wireguardgateways", &[]).await
    }

    pub async fn update_gateway(
        &self,
        location: &str,
        id: &str,
        properties: WireguardGatewayProperties,
    ) -> ProviderResult<WireguardGateway> {
        self.rest
            .put(
                location,
                &format!("/wireguardgateways/{}", id),
                &CreateRequest::new(properties),
            )
            .await
    }

    pub async fn delete_gateway(&self, location: &str, id: &str) -> ProviderResult<()> {
        self.rest
            .delete(location, &format!("/wireguardgateways/{}", id))
            .await
    }

    pub async fn create_peer(
        &self,
        location: &str,
        gateway_id: &str,
        properties: PeerProperties,
    ) -> ProviderResult<Peer> {
        let peer: Peer = self
            .rest
            .post(
                location,
                &format!("/wireguardgateways/{}/peers", gateway_id),
                &CreateRequest::new(properties),
            )
            .await?;
        log::info!("created WireGuard peer {} on gateway {}", peer.id, gateway_id);
        Ok(peer)
    }

    pub async fn get_peer(
        &self,
        location: &str,
        gateway_id: &str,
        peer_id: &str,
    ) -> ProviderResult<Peer> {
        self.rest
            .get(
                location,
                &format!("/wireguardgateways/{}/peers/{}", gateway_id, peer_id),
            )
            .await
    }

    pub async fn update_peer(
        &self,
        location: &str,
        gateway_id: &str,
        peer_id: &str,
        properties: PeerProperties,
    ) -> ProviderResult<Peer> {
        self.rest
            .put(
                location,
                &format!("/wireguardgateways/{}/peers/{}", gateway_id, peer_id),
                &CreateRequest::new(properties),
            )
            .await
    }

    pub async fn delete_peer(
        &self,
        location: &str,
        gateway_id: &str,
        peer_id: &str,
    ) -> ProviderResult<()> {
        self.rest
            .delete(
                location,
                &format!("/wireguardgateways/{}/peers/{}", gateway_id, peer_id),
            )
            .await
    }
}

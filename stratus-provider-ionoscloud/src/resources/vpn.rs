//! WireGuard VPN gateways and peers

use async_trait::async_trait;
use stratus_core::provider::ProviderResult;
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    Context, DataSource, Lookup, ManagedResource, id_attribute, identifier, ignore_not_found,
    import_state, location_attribute, lookup, lookup_id_attribute, or_not_found, parent_id,
    single_match, timeouts, wait_for_available, wait_for_deletion,
};
use crate::endpoint::Product;
use crate::services::vpn::{
    GatewayConnection, Peer, PeerEndpoint, PeerProperties, WireguardGateway,
    WireguardGatewayProperties,
};
use crate::utils::{
    Attributes, block, get_block, get_blocks, get_int, get_str, get_string_list, location,
    require_str, set_opt, string_list,
};

const DEFAULT_LISTEN_PORT: i64 = 51820;

// =============================================================================
// Gateway
// =============================================================================

fn connection_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("datacenter_id", types::uuid()).required(),
        AttributeSchema::new("lan_id", AttributeType::String).required(),
        AttributeSchema::new("ipv4_cidr", types::cidr()),
        AttributeSchema::new("ipv6_cidr", AttributeType::String),
    ])
}

fn gateway_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let attr = |a: AttributeSchema, required: bool| match (configurable, required) {
        (true, true) => a.required(),
        (true, false) => a,
        (false, _) => a.computed(),
    };
    schema
        .attribute(attr(AttributeSchema::new("description", AttributeType::String), false))
        .attribute(attr(
            AttributeSchema::new("gateway_ip", AttributeType::String)
                .with_description("Public IP the gateway listens on"),
            true,
        ))
        .attribute(attr(AttributeSchema::new("interface_ipv4_cidr", types::cidr()), false))
        .attribute(attr(AttributeSchema::new("interface_ipv6_cidr", AttributeType::String), false))
        .attribute(attr(AttributeSchema::new("connections", connection_block()), true))
        .attribute(if configurable {
            AttributeSchema::new("listen_port", types::port())
                .optional_computed()
                .with_default(DEFAULT_LISTEN_PORT)
        } else {
            AttributeSchema::new("listen_port", types::port()).computed()
        })
        .attribute(AttributeSchema::new("public_key", AttributeType::String).computed())
        .attribute(location_attribute(Product::Vpn))
}

fn gateway_properties(attrs: &Attributes) -> ProviderResult<WireguardGatewayProperties> {
    let connections = get_blocks(attrs, "connections")
        .into_iter()
        .map(|c| {
            Ok(GatewayConnection {
                datacenter_id: require_str(c, "datacenter_id")?.to_string(),
                lan_id: require_str(c, "lan_id")?.to_string(),
                ipv4_cidr: get_str(c, "ipv4_cidr").map(str::to_string),
                ipv6_cidr: get_str(c, "ipv6_cidr").map(str::to_string),
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    Ok(WireguardGatewayProperties {
        name: require_str(attrs, "name")?.to_string(),
        description: get_str(attrs, "description").map(str::to_string),
        gateway_ip: require_str(attrs, "gateway_ip")?.to_string(),
        interface_ipv4_cidr: get_str(attrs, "interface_ipv4_cidr").map(str::to_string),
        interface_ipv6_cidr: get_str(attrs, "interface_ipv6_cidr").map(str::to_string),
        connections,
        private_key: get_str(attrs, "private_key").map(str::to_string),
        listen_port: get_int(attrs, "listen_port"),
    })
}

/// State of a gateway; the private key is write-only and kept from `base`
fn gateway_state(
    id: ResourceId,
    base: &Attributes,
    location: &str,
    gateway: &WireguardGateway,
) -> State {
    let props = &gateway.properties;
    let connections = props
        .connections
        .iter()
        .map(|c| {
            block([
                ("datacenter_id", Some(Value::from(c.datacenter_id.as_str()))),
                ("lan_id", Some(Value::from(c.lan_id.as_str()))),
                ("ipv4_cidr", c.ipv4_cidr.as_deref().map(Value::from)),
                ("ipv6_cidr", c.ipv6_cidr.as_deref().map(Value::from)),
            ])
        })
        .collect();
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), gateway.id.as_str().into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    set_opt(&mut attrs, "description", props.description.clone());
    attrs.insert("gateway_ip".to_string(), props.gateway_ip.as_str().into());
    set_opt(&mut attrs, "interface_ipv4_cidr", props.interface_ipv4_cidr.clone());
    set_opt(&mut attrs, "interface_ipv6_cidr", props.interface_ipv6_cidr.clone());
    attrs.insert("connections".to_string(), Value::List(connections));
    set_opt(&mut attrs, "listen_port", props.listen_port);
    set_opt(
        &mut attrs,
        "public_key",
        gateway.metadata.as_ref().and_then(|m| m.public_key.clone()),
    );
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(gateway.id.clone())
}

pub struct WireguardGatewayResource;

#[async_trait]
impl ManagedResource for WireguardGatewayResource {
    fn type_name(&self) -> &'static str {
        "vpn_wireguard_gateway"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("WireGuard VPN gateway")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(
                AttributeSchema::new("private_key", AttributeType::String)
                    .required()
                    .sensitive()
                    .with_description("WireGuard private key of the gateway; never read back"),
            );
        gateway_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let vpn = &ctx.services.vpn;

        let created = vpn
            .create_gateway(location, gateway_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("WireGuard gateway {}", created.id), &wait, || {
            vpn.get_gateway(location, &created.id)
        })
        .await?;

        let gateway = vpn.get_gateway(location, &created.id).await?;
        Ok(gateway_state(resource.id.clone(), attrs, location, &gateway))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let result = ctx
            .services
            .vpn
            .get_gateway(location, identifier(current)?)
            .await
            .map(|g| gateway_state(current.id.clone(), &current.attributes, location, &g));
        or_not_found(&current.id, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        current: &State,
        desired: &Resource,
    ) -> ProviderResult<State> {
        let attrs = &desired.attributes;
        let location = location(&current.attributes);
        let id = identifier(current)?;
        let vpn = &ctx.services.vpn;

        vpn.update_gateway(location, id, gateway_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("WireGuard gateway {}", id), &wait, || {
            vpn.get_gateway(location, id)
        })
        .await?;

        let gateway = vpn.get_gateway(location, id).await?;
        Ok(gateway_state(current.id.clone(), attrs, location, &gateway))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let id = identifier(current)?;
        let vpn = &ctx.services.vpn;

        ignore_not_found(vpn.delete_gateway(location, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of WireGuard gateway {}", id), &wait, || {
            vpn.get_gateway(location, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        let state = import_state(self, ctx, id, import_id, &["gateway_id"]).await?;
        log::warn!(
            "{}: private_key cannot be imported and must be set in configuration",
            state.id
        );
        Ok(state)
    }
}

pub struct WireguardGatewayDataSource;

#[async_trait]
impl DataSource for WireguardGatewayDataSource {
    fn type_name(&self) -> &'static str {
        "vpn_wireguard_gateway"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up a WireGuard gateway by id or name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed());
        gateway_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let vpn = &ctx.services.vpn;
        let gateway = match lookup(attrs, "name")? {
            Lookup::Id(id) => vpn.get_gateway(location, id).await?,
            Lookup::Name(name) => {
                let matches = vpn
                    .list_gateways(location)
                    .await?
                    .into_iter()
                    .filter(|g| g.properties.name == name)
                    .collect();
                single_match("WireGuard gateway", name, matches)?
            }
        };
        Ok(gateway_state(config.id.clone(), attrs, location, &gateway))
    }
}

// =============================================================================
// Peer
// =============================================================================

fn peer_properties(attrs: &Attributes) -> ProviderResult<PeerProperties> {
    let endpoint = match get_block(attrs, "endpoint") {
        Some(e) => Some(PeerEndpoint {
            host: require_str(e, "host")?.to_string(),
            port: Some(get_int(e, "port").unwrap_or(DEFAULT_LISTEN_PORT)),
        }),
        None => None,
    };
    Ok(PeerProperties {
        name: require_str(attrs, "name")?.to_string(),
        description: get_str(attrs, "description").map(str::to_string),
        endpoint,
        allowed_ips: get_string_list(attrs, "allowed_ips"),
        public_key: require_str(attrs, "public_key")?.to_string(),
    })
}

fn peer_state(
    id: ResourceId,
    base: &Attributes,
    location: &str,
    gateway_id: &str,
    peer: &Peer,
) -> State {
    let props = &peer.properties;
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), peer.id.as_str().into());
    attrs.insert("gateway_id".to_string(), gateway_id.into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    set_opt(&mut attrs, "description", props.description.clone());
    set_opt(
        &mut attrs,
        "endpoint",
        props.endpoint.as_ref().map(|e| {
            Value::List(vec![block([
                ("host", Some(Value::from(e.host.as_str()))),
                ("port", e.port.map(Value::from)),
            ])])
        }),
    );
    attrs.insert("allowed_ips".to_string(), string_list(&props.allowed_ips));
    attrs.insert("public_key".to_string(), props.public_key.as_str().into());
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(peer.id.clone())
}

pub struct WireguardPeerResource;

#[async_trait]
impl ManagedResource for WireguardPeerResource {
    fn type_name(&self) -> &'static str {
        "vpn_wireguard_peer"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Peer allowed to connect to a WireGuard gateway")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("gateway_id", types::uuid()).required().force_new())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new(
                "endpoint",
                AttributeType::list_of_objects(vec![
                    AttributeSchema::new("host", AttributeType::String).required(),
                    AttributeSchema::new("port", types::port()),
                ]),
            ))
            .attribute(
                AttributeSchema::new(
                    "allowed_ips",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .required()
                .with_description("Subnets routed to this peer"),
            )
            .attribute(AttributeSchema::new("public_key", AttributeType::String).required())
            .attribute(location_attribute(Product::Vpn))
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let gateway_id = require_str(attrs, "gateway_id")?;
        let vpn = &ctx.services.vpn;

        let created = vpn
            .create_peer(location, gateway_id, peer_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("WireGuard peer {}", created.id), &wait, || {
            vpn.get_peer(location, gateway_id, &created.id)
        })
        .await?;

        let peer = vpn.get_peer(location, gateway_id, &created.id).await?;
        Ok(peer_state(resource.id.clone(), attrs, location, gateway_id, &peer))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let gateway_id = parent_id(current, "gateway_id")?;
        let result = ctx
            .services
            .vpn
            .get_peer(location, gateway_id, identifier(current)?)
            .await
            .map(|p| peer_state(current.id.clone(), &current.attributes, location, gateway_id, &p));
        or_not_found(&current.id, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        current: &State,
        desired: &Resource,
    ) -> ProviderResult<State> {
        let attrs = &desired.attributes;
        let location = location(&current.attributes);
        let gateway_id = parent_id(current, "gateway_id")?;
        let id = identifier(current)?;
        let vpn = &ctx.services.vpn;

        vpn.update_peer(location, gateway_id, id, peer_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("WireGuard peer {}", id), &wait, || {
            vpn.get_peer(location, gateway_id, id)
        })
        .await?;

        let peer = vpn.get_peer(location, gateway_id, id).await?;
        Ok(peer_state(current.id.clone(), attrs, location, gateway_id, &peer))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let gateway_id = parent_id(current, "gateway_id")?;
        let id = identifier(current)?;
        let vpn = &ctx.services.vpn;

        ignore_not_found(vpn.delete_peer(location, gateway_id, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of WireGuard peer {}", id), &wait, || {
            vpn.get_peer(location, gateway_id, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["gateway_id", "peer_id"]).await
    }
}

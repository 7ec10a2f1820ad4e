//! API gateways and routes

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
use crate::services::apigateway::{
    CustomDomain, Gateway, GatewayProperties, Route, RouteProperties, Upstream,
};
use crate::utils::{
    Attributes, block, get_blocks, get_bool_or, get_int, get_str, get_string_list, location,
    require_str, string_list,
};

const METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD", "CONNECT", "TRACE",
];
const SCHEMES: &[&str] = &["http", "https"];
const LOADBALANCERS: &[&str] = &["roundrobin", "least_connections"];

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_PORT: i64 = 80;
const DEFAULT_LOADBALANCER: &str = "roundrobin";
const DEFAULT_WEIGHT: i64 = 100;

// =============================================================================
// Gateway
// =============================================================================

fn custom_domain_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("name", AttributeType::String).required(),
        AttributeSchema::new("certificate_id", types::uuid())
            .with_description("Certificate manager certificate served for the domain"),
    ])
}

fn gateway_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let flag = |name: &str| {
        let attr = AttributeSchema::new(name, AttributeType::Bool);
        if configurable {
            attr.optional_computed().with_default(false)
        } else {
            attr.computed()
        }
    };
    let domains = AttributeSchema::new("custom_domains", custom_domain_block());
    schema
        .attribute(flag("logs"))
        .attribute(flag("metrics"))
        .attribute(if configurable { domains } else { domains.computed() })
        .attribute(
            AttributeSchema::new("public_endpoint", AttributeType::String)
                .computed()
                .with_description("Host name the gateway answers on"),
        )
        .attribute(location_attribute(Product::ApiGateway))
}

fn gateway_properties(attrs: &Attributes) -> ProviderResult<GatewayProperties> {
    let custom_domains = get_blocks(attrs, "custom_domains")
        .into_iter()
        .map(|d| {
            Ok(CustomDomain {
                name: require_str(d, "name")?.to_string(),
                certificate_id: get_str(d, "certificate_id").map(str::to_string),
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    Ok(GatewayProperties {
        name: require_str(attrs, "name")?.to_string(),
        logs: get_bool_or(attrs, "logs", false),
        metrics: get_bool_or(attrs, "metrics", false),
        custom_domains,
    })
}

fn gateway_state(id: ResourceId, base: &Attributes, location: &str, gateway: &Gateway) -> State {
    let props = &gateway.properties;
    let domains = props
        .custom_domains
        .iter()
        .map(|d| {
            block([
                ("name", Some(Value::from(d.name.as_str()))),
                ("certificate_id", d.certificate_id.as_deref().map(Value::from)),
            ])
        })
        .collect();
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), gateway.id.as_str().into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    attrs.insert("logs".to_string(), props.logs.into());
    attrs.insert("metrics".to_string(), props.metrics.into());
    attrs.insert("custom_domains".to_string(), Value::List(domains));
    if let Some(endpoint) = gateway.metadata.as_ref().and_then(|m| m.public_endpoint.as_deref()) {
        attrs.insert("public_endpoint".to_string(), endpoint.into());
    }
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(gateway.id.clone())
}

pub struct ApiGatewayResource;

#[async_trait]
impl ManagedResource for ApiGatewayResource {
    fn type_name(&self) -> &'static str {
        "apigateway"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Managed API gateway")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).required());
        gateway_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let gateways = &ctx.services.apigateway;

        let created = gateways
            .create_gateway(location, gateway_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("API gateway {}", created.id), &wait, || {
            gateways.get_gateway(location, &created.id)
        })
        .await?;

        let gateway = gateways.get_gateway(location, &created.id).await?;
        Ok(gateway_state(resource.id.clone(), attrs, location, &gateway))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let result = ctx
            .services
            .apigateway
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
        let gateways = &ctx.services.apigateway;

        gateways
            .update_gateway(location, id, gateway_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("API gateway {}", id), &wait, || {
            gateways.get_gateway(location, id)
        })
        .await?;

        let gateway = gateways.get_gateway(location, id).await?;
        Ok(gateway_state(current.id.clone(), attrs, location, &gateway))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let id = identifier(current)?;
        let gateways = &ctx.services.apigateway;

        ignore_not_found(gateways.delete_gateway(location, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of API gateway {}", id), &wait, || {
            gateways.get_gateway(location, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["gateway_id"]).await
    }
}

pub struct ApiGatewayDataSource;

#[async_trait]
impl DataSource for ApiGatewayDataSource {
    fn type_name(&self) -> &'static str {
        "apigateway"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up an API gateway by id or name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed());
        gateway_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let gateways = &ctx.services.apigateway;
        let gateway = match lookup(attrs, "name")? {
            Lookup::Id(id) => gateways.get_gateway(location, id).await?,
            Lookup::Name(name) => {
                let matches = gateways
                    .list_gateways(location)
                    .await?
                    .into_iter()
                    .filter(|g| g.properties.name == name)
                    .collect();
                single_match("API gateway", name, matches)?
            }
        };
        Ok(gateway_state(config.id.clone(), attrs, location, &gateway))
    }
}

// =============================================================================
// Route
// =============================================================================

fn upstream_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("scheme", AttributeType::enum_of(SCHEMES)),
        AttributeSchema::new("host", AttributeType::String).required(),
        AttributeSchema::new("port", types::port()),
        AttributeSchema::new("loadbalancer", AttributeType::enum_of(LOADBALANCERS)),
        AttributeSchema::new("weight", types::positive_int()),
    ])
}

fn route_properties(attrs: &Attributes) -> ProviderResult<RouteProperties> {
    let upstreams = get_blocks(attrs, "upstreams")
        .into_iter()
        .map(|u| {
            Ok(Upstream {
                scheme: get_str(u, "scheme").unwrap_or(DEFAULT_SCHEME).to_string(),
                host: require_str(u, "host")?.to_string(),
                port: get_int(u, "port").unwrap_or(DEFAULT_PORT),
                loadbalancer: get_str(u, "loadbalancer")
                    .unwrap_or(DEFAULT_LOADBALANCER)
                    .to_string(),
                weight: get_int(u, "weight").unwrap_or(DEFAULT_WEIGHT),
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    Ok(RouteProperties {
        name: require_str(attrs, "name")?.to_string(),
        route_type: get_str(attrs, "type").unwrap_or("http").to_string(),
        paths: get_string_list(attrs, "paths"),
        methods: get_string_list(attrs, "methods"),
        websocket: get_bool_or(attrs, "websocket", false),
        upstreams,
    })
}

fn route_state(
    id: ResourceId,
    base: &Attributes,
    location: &str,
    gateway_id: &str,
    route: &Route,
) -> State {
    let props = &route.properties;
    let upstreams = props
        .upstreams
        .iter()
        .map(|u| {
            block([
                ("scheme", Some(Value::from(u.scheme.as_str()))),
                ("host", Some(Value::from(u.host.as_str()))),
                ("port", Some(Value::from(u.port))),
                ("loadbalancer", Some(Value::from(u.loadbalancer.as_str()))),
                ("weight", Some(Value::from(u.weight))),
            ])
        })
        .collect();
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), route.id.as_str().into());
    attrs.insert("gateway_id".to_string(), gateway_id.into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    attrs.insert("type".to_string(), props.route_type.as_str().into());
    attrs.insert("paths".to_string(), string_list(&props.paths));
    attrs.insert("methods".to_string(), string_list(&props.methods));
    attrs.insert("websocket".to_string(), props.websocket.into());
    attrs.insert("upstreams".to_string(), Value::List(upstreams));
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(route.id.clone())
}

pub struct ApiGatewayRouteResource;

#[async_trait]
impl ManagedResource for ApiGatewayRouteResource {
    fn type_name(&self) -> &'static str {
        "apigateway_route"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Route forwarding gateway paths to upstream services")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("gateway_id", types::uuid()).required().force_new())
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(
                AttributeSchema::new("type", AttributeType::enum_of(&["http"]))
                    .optional_computed()
                    .with_default("http"),
            )
            .attribute(
                AttributeSchema::new("paths", AttributeType::List(Box::new(AttributeType::String)))
                    .required(),
            )
            .attribute(
                AttributeSchema::new(
                    "methods",
                    AttributeType::List(Box::new(AttributeType::enum_of(METHODS))),
                )
                .required(),
            )
            .attribute(
                AttributeSchema::new("websocket", AttributeType::Bool)
                    .optional_computed()
                    .with_default(false),
            )
            .attribute(AttributeSchema::new("upstreams", upstream_block()).required())
            .attribute(location_attribute(Product::ApiGateway))
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let gateway_id = require_str(attrs, "gateway_id")?;
        let gateways = &ctx.services.apigateway;

        let created = gateways
            .create_route(location, gateway_id, route_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("API gateway route {}", created.id), &wait, || {
            gateways.get_route(location, gateway_id, &created.id)
        })
        .await?;

        let route = gateways.get_route(location, gateway_id, &created.id).await?;
        Ok(route_state(resource.id.clone(), attrs, location, gateway_id, &route))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let gateway_id = parent_id(current, "gateway_id")?;
        let result = ctx
            .services
            .apigateway
            .get_route(location, gateway_id, identifier(current)?)
            .await
            .map(|r| route_state(current.id.clone(), &current.attributes, location, gateway_id, &r));
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
        let gateways = &ctx.services.apigateway;

        gateways
            .update_route(location, gateway_id, id, route_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("API gateway route {}", id), &wait, || {
            gateways.get_route(location, gateway_id, id)
        })
        .await?;

        let route = gateways.get_route(location, gateway_id, id).await?;
        Ok(route_state(current.id.clone(), attrs, location, gateway_id, &route))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let gateway_id = parent_id(current, "gateway_id")?;
        let id = identifier(current)?;
        let gateways = &ctx.services.apigateway;

        ignore_not_found(gateways.delete_route(location, gateway_id, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of API gateway route {}", id), &wait, || {
            gateways.get_route(location, gateway_id, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["gateway_id", "route_id"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn route_attrs() -> Attributes {
        let mut upstream = HashMap::new();
        upstream.insert("host".to_string(), Value::from("backend.example.com"));
        let mut attrs = Attributes::new();
        attrs.insert("gateway_id".to_string(), "5e6f7a8b-9c0d-4e1f-a2b3-c4d5e6f7a8b9".into());
        attrs.insert("name".to_string(), "users".into());
        attrs.insert("paths".to_string(), Value::from(vec!["/users"]));
        attrs.insert("methods".to_string(), Value::from(vec!["GET", "POST"]));
        attrs.insert("upstreams".to_string(), Value::List(vec![Value::Map(upstream)]));
        attrs
    }

    #[test]
    fn upstream_defaults() {
        let attrs = route_attrs();
        assert!(ApiGatewayRouteResource.schema().validate(&attrs).is_ok());
        let props = route_properties(&attrs).unwrap();
        assert_eq!(
            props.upstreams,
            vec![Upstream {
                scheme: "http".to_string(),
                host: "backend.example.com".to_string(),
                port: 80,
                loadbalancer: "roundrobin".to_string(),
                weight: 100,
            }]
        );
        assert_eq!(props.route_type, "http");
    }

    #[test]
    fn rejects_unknown_method_and_port() {
        let schema = ApiGatewayRouteResource.schema();
        let mut attrs = route_attrs();
        attrs.insert("methods".to_string(), Value::from(vec!["FETCH"]));
        assert!(schema.validate(&attrs).is_err());

        let mut attrs = route_attrs();
        let mut upstream = HashMap::new();
        upstream.insert("host".to_string(), Value::from("backend"));
        upstream.insert("port".to_string(), Value::Int(70000));
        attrs.insert("upstreams".to_string(), Value::List(vec![Value::Map(upstream)]));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn gateway_flags_default_off() {
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), "edge".into());
        let props = gateway_properties(&attrs).unwrap();
        assert!(!props.logs && !props.metrics);
        assert!(props.custom_domains.is_empty());
    }
}

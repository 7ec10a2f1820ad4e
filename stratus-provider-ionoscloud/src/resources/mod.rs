//! Resource, data source and ephemeral resource implementations
//!
//! This module defines:
//! - The traits implemented per resource type
//! - The registry the provider dispatches through
//! - Helpers shared by all products (import ids, lookups, waiting)

pub mod apigateway;
pub mod dns;
pub mod kafka;
pub mod logging;
pub mod mariadb;
pub mod objectstorage;
pub mod vpn;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use stratus_core::provider::{ProviderError, ProviderResult, ResourceType};
use stratus_core::resource::{Resource, ResourceId, ResourceKind, State};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use stratus_core::timeouts::Timeouts;
use stratus_core::wait::{WaitConfig, permanent, transient, wait_until};

use crate::services::{Provisioned, STATE_AVAILABLE, STATE_FAILED, ServiceClients};
use crate::utils::{Attributes, get_str};

// =============================================================================
// Operation Context
// =============================================================================

/// Everything a resource operation needs
#[derive(Debug, Clone)]
pub struct Context {
    pub services: ServiceClients,
    /// Backoff settings for polling; the timeout comes from the operation
    pub wait: WaitConfig,
}

impl Context {
    pub fn new(services: ServiceClients) -> Self {
        Self {
            services,
            wait: WaitConfig::default(),
        }
    }

    pub fn wait_config(&self, timeout: Duration) -> WaitConfig {
        self.wait.clone().with_timeout(timeout)
    }
}

// =============================================================================
// Resource Traits
// =============================================================================

/// Resource with a full lifecycle
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State>;

    /// Returns `State::not_found` when the object is gone
    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State>;

    async fn update(&self, ctx: &Context, current: &State, desired: &Resource)
    -> ProviderResult<State>;

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()>;

    async fn import(&self, ctx: &Context, id: &ResourceId, import_id: &str)
    -> ProviderResult<State>;
}

/// Read-only lookup of an existing object
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State>;
}

/// Value fetched on demand and never persisted
#[async_trait]
pub trait EphemeralResource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn open(&self, ctx: &Context, config: &Resource) -> ProviderResult<State>;
}

// =============================================================================
// Registry
// =============================================================================

/// All resource types of the provider, looked up by type name
pub struct Registry {
    managed: Vec<Box<dyn ManagedResource>>,
    data_sources: Vec<Box<dyn DataSource>>,
    ephemeral: Vec<Box<dyn EphemeralResource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            managed: vec![
                Box::new(kafka::KafkaClusterResource),
                Box::new(kafka::KafkaTopicResource),
                Box::new(dns::DnsZoneResource),
                Box::new(dns::DnsRecordResource),
                Box::new(mariadb::MariaDbClusterResource),
                Box::new(logging::LoggingPipelineResource),
                Box::new(apigateway::ApiGatewayResource),
                Box::new(apigateway::ApiGatewayRouteResource),
                Box::new(vpn::WireguardGatewayResource),
                Box::new(vpn::WireguardPeerResource),
                Box::new(objectstorage::BucketResource),
            ],
            data_sources: vec![
                Box::new(kafka::KafkaClusterDataSource),
                Box::new(kafka::KafkaTopicDataSource),
                Box::new(kafka::KafkaUserCredentialsDataSource),
                Box::new(dns::DnsZoneDataSource),
                Box::new(dns::DnsRecordDataSource),
                Box::new(mariadb::MariaDbClusterDataSource),
                Box::new(mariadb::MariaDbBackupsDataSource),
                Box::new(logging::LoggingPipelineDataSource),
                Box::new(apigateway::ApiGatewayDataSource),
                Box::new(vpn::WireguardGatewayDataSource),
                Box::new(objectstorage::BucketDataSource),
            ],
            ephemeral: vec![Box::new(kafka::KafkaUserCredentialsEphemeral)],
        }
    }

    pub fn managed(&self, type_name: &str) -> ProviderResult<&dyn ManagedResource> {
        self.managed
            .iter()
            .find(|r| r.type_name() == type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| unknown_type(ResourceKind::Managed, type_name))
    }

    pub fn data_source(&self, type_name: &str) -> ProviderResult<&dyn DataSource> {
        self.data_sources
            .iter()
            .find(|r| r.type_name() == type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| unknown_type(ResourceKind::Data, type_name))
    }

    pub fn ephemeral(&self, type_name: &str) -> ProviderResult<&dyn EphemeralResource> {
        self.ephemeral
            .iter()
            .find(|r| r.type_name() == type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| unknown_type(ResourceKind::Ephemeral, type_name))
    }

    /// Schema of a type of the given kind
    pub fn schema(&self, kind: ResourceKind, type_name: &str) -> ProviderResult<ResourceSchema> {
        match kind {
            ResourceKind::Managed => self.managed(type_name).map(|r| r.schema()),
            ResourceKind::Data => self.data_source(type_name).map(|r| r.schema()),
            ResourceKind::Ephemeral => self.ephemeral(type_name).map(|r| r.schema()),
        }
    }

    /// Every registered type as a `ResourceType`
    pub fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        let managed = self
            .managed
            .iter()
            .map(|r| RegisteredType::new(r.type_name(), ResourceKind::Managed, r.schema()));
        let data = self
            .data_sources
            .iter()
            .map(|r| RegisteredType::new(r.type_name(), ResourceKind::Data, r.schema()));
        let ephemeral = self
            .ephemeral
            .iter()
            .map(|r| RegisteredType::new(r.type_name(), ResourceKind::Ephemeral, r.schema()));
        managed
            .chain(data)
            .chain(ephemeral)
            .map(|t| Box::new(t) as Box<dyn ResourceType>)
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_type(kind: ResourceKind, type_name: &str) -> ProviderError {
    ProviderError::validation(format!("Unknown {} type: {}", kind, type_name))
}

struct RegisteredType {
    name: &'static str,
    kind: ResourceKind,
    schema: ResourceSchema,
}

impl RegisteredType {
    fn new(name: &'static str, kind: ResourceKind, schema: ResourceSchema) -> Self {
        Self { name, kind, schema }
    }
}

impl ResourceType for RegisteredType {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn schema(&self) -> ResourceSchema {
        self.schema.clone()
    }
}

// =============================================================================
// Shared Schema Attributes
// =============================================================================

pub fn id_attribute() -> AttributeSchema {
    AttributeSchema::new("id", AttributeType::String)
        .computed()
        .with_description("Identifier assigned by the cloud")
}

pub fn location_attribute(product: crate::endpoint::Product) -> AttributeSchema {
    AttributeSchema::new("location", AttributeType::String)
        .force_new()
        .with_description(format!(
            "Location of the {} endpoint: {}",
            product,
            product.locations().join(", ")
        ))
}

/// Optional `id` used to look up a data source
pub fn lookup_id_attribute() -> AttributeSchema {
    AttributeSchema::new("id", AttributeType::String)
        .optional_computed()
        .with_description("Identifier to look up; conflicts with the name")
}

// =============================================================================
// Import IDs
// =============================================================================

/// Parsed import id of the form `[location:]part1[:part2...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportId {
    pub location: String,
    pub parts: Vec<String>,
}

/// Parse an import id with `names.len()` parts and an optional leading location
pub fn parse_import_id(import_id: &str, names: &[&str]) -> ProviderResult<ImportId> {
    let segments: Vec<&str> = import_id.trim().split(':').collect();
    let (location, parts) = if segments.len() == names.len() {
        ("", segments.as_slice())
    } else if segments.len() == names.len() + 1 {
        (segments[0], &segments[1..])
    } else {
        return Err(invalid_import_id(import_id, names));
    };
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid_import_id(import_id, names));
    }
    Ok(ImportId {
        location: location.to_string(),
        parts: parts.iter().map(|p| p.to_string()).collect(),
    })
}

fn invalid_import_id(import_id: &str, names: &[&str]) -> ProviderError {
    ProviderError::validation(format!(
        "Invalid import id '{}', expected [location:]{}",
        import_id,
        names.join(":")
    ))
}

/// Import by reading the object an import id points at.
///
/// `names` lists the import id parts; all but the last are parent
/// identifiers stored under their name, the last is the object identifier.
pub async fn import_state(
    resource: &dyn ManagedResource,
    ctx: &Context,
    id: &ResourceId,
    import_id: &str,
    names: &[&str],
) -> ProviderResult<State> {
    let parsed = parse_import_id(import_id, names)?;
    let (identifier, parents) = parsed
        .parts
        .split_last()
        .ok_or_else(|| invalid_import_id(import_id, names))?;

    let mut start = State::from_identifier(id.clone(), identifier.clone());
    if !parsed.location.is_empty() {
        start = start.with_attribute("location", parsed.location.clone());
    }
    for (name, value) in names.iter().zip(parents) {
        start = start.with_attribute(*name, value.clone());
    }

    let state = resource.read(ctx, &start).await?;
    if !state.exists {
        return Err(ProviderError::not_found(format!(
            "{} '{}' does not exist",
            resource.type_name(),
            import_id
        )));
    }
    Ok(state)
}

/// Identifier of a state, required for read, update and delete
pub fn identifier(state: &State) -> ProviderResult<&str> {
    state
        .identifier
        .as_deref()
        .ok_or_else(|| ProviderError::validation("State has no identifier").for_resource(state.id.clone()))
}

/// Parent identifier stored in state
pub fn parent_id<'a>(state: &'a State, key: &str) -> ProviderResult<&'a str> {
    get_str(&state.attributes, key).ok_or_else(|| {
        ProviderError::validation(format!("State is missing {}", key)).for_resource(state.id.clone())
    })
}

/// Turn a not-found error into `State::not_found`
pub fn or_not_found(id: &ResourceId, result: ProviderResult<State>) -> ProviderResult<State> {
    match result {
        Err(e) if e.is_not_found() => {
            log::info!("{} no longer exists, removing it from state", id);
            Ok(State::not_found(id.clone()))
        }
        other => other,
    }
}

/// Delete tolerating objects that are already gone
pub fn ignore_not_found(result: ProviderResult<()>) -> ProviderResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

// =============================================================================
// Data Source Lookups
// =============================================================================

/// How a data source identifies the object it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// Read the `id` / name pair of a data source; exactly one must be set
pub fn lookup<'a>(attrs: &'a Attributes, name_key: &str) -> ProviderResult<Lookup<'a>> {
    match (get_str(attrs, "id"), get_str(attrs, name_key)) {
        (Some(id), None) => Ok(Lookup::Id(id)),
        (None, Some(name)) => Ok(Lookup::Name(name)),
        (Some(_), Some(_)) => Err(ProviderError::validation(format!(
            "Only one of id and {} can be set",
            name_key
        ))),
        (None, None) => Err(ProviderError::validation(format!(
            "One of id or {} must be set",
            name_key
        ))),
    }
}

/// The single object matching `name`
pub fn single_match<T>(what: &str, name: &str, mut matches: Vec<T>) -> ProviderResult<T> {
    match matches.len() {
        0 => Err(ProviderError::not_found(format!(
            "No {} found with name '{}'",
            what, name
        ))),
        1 => Ok(matches.remove(0)),
        n => Err(ProviderError::validation(format!(
            "{} {}s found with name '{}', use the id to select one",
            n, what, name
        ))),
    }
}

// =============================================================================
// Waiting
// =============================================================================

/// Timeouts of a resource from its `timeouts` block
pub fn timeouts(attrs: &Attributes) -> Timeouts {
    Timeouts::from_attributes(attrs, Timeouts::default())
}

/// Poll until the object reports `AVAILABLE`.
///
/// A `FAILED` state or any API error other than not-found aborts the wait.
/// Objects that do not report a state count as available.
pub async fn wait_for_available<T, F, Fut>(
    what: &str,
    config: &WaitConfig,
    mut fetch: F,
) -> ProviderResult<()>
where
    T: Provisioned,
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    wait_until(what, config, || {
        let fetched = fetch();
        async move {
            match fetched.await {
                Ok(object) => match object.state() {
                    None | Some(STATE_AVAILABLE) => Ok(true),
                    Some(STATE_FAILED) => {
                        let detail = object
                            .state_message()
                            .map(|m| format!(": {}", m))
                            .unwrap_or_default();
                        Err(permanent(ProviderError::new(format!(
                            "{} reached state FAILED{}",
                            what, detail
                        ))))
                    }
                    Some(state) => {
                        log::debug!("{} is {}", what, state);
                        Ok(false)
                    }
                },
                Err(e) if e.is_not_found() => Err(transient(e)),
                Err(e) => Err(permanent(e)),
            }
        }
    })
    .await
}

/// Poll until fetching the object reports not-found
pub async fn wait_for_deletion<T, F, Fut>(
    what: &str,
    config: &WaitConfig,
    mut fetch: F,
) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    wait_until(what, config, || {
        let fetched = fetch();
        async move {
            match fetched.await {
                Ok(_) => Ok(false),
                Err(e) if e.is_not_found() => Ok(true),
                Err(e) => Err(permanent(e)),
            }
        }
    })
    .await
}

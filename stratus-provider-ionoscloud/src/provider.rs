//! IONOS Cloud implementation of the `Provider` trait
//!
//! Every call is dispatched through the registry by resource type. Schema
//! validation and defaults are applied here, before any API request.

use std::time::Duration;

use stratus_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use stratus_core::resource::{Resource, ResourceId, State};
use stratus_core::schema::{ResourceSchema, TypeError};
use stratus_core::wait::WaitConfig;

use crate::config::ProviderConfig;
use crate::resources::{Context, Registry, timeouts};
use crate::services::ServiceClients;

pub struct IonosCloudProvider {
    registry: Registry,
    ctx: Context,
}

impl IonosCloudProvider {
    pub fn new(services: ServiceClients) -> Self {
        Self {
            registry: Registry::new(),
            ctx: Context::new(services),
        }
    }

    /// Build the provider from configuration, loading the config file if any
    pub fn from_config(config: ProviderConfig) -> ProviderResult<Self> {
        let file = config.load_file_config()?;
        let services = ServiceClients::new(&config, file)?;
        Ok(Self::new(services))
    }

    /// Override the polling backoff; per-operation timeouts still apply
    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.ctx.wait = wait;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn services(&self) -> &ServiceClients {
        &self.ctx.services
    }
}

impl std::fmt::Debug for IonosCloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IonosCloudProvider")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

fn validation_error(errors: Vec<TypeError>) -> ProviderError {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    ProviderError::validation(format!("Invalid configuration: {}", messages.join("; ")))
}

/// Validate configured attributes and fill in schema defaults
fn prepare(schema: &ResourceSchema, resource: &Resource) -> ProviderResult<Resource> {
    schema.validate(&resource.attributes).map_err(validation_error)?;
    let mut prepared = resource.clone();
    prepared.attributes = schema.apply_defaults(&resource.attributes);
    Ok(prepared)
}

/// Attach the resource id unless the error already names one
fn attach(id: &ResourceId) -> impl Fn(ProviderError) -> ProviderError + '_ {
    move |err| {
        if err.resource_id.is_some() {
            err
        } else {
            err.for_resource(id.clone())
        }
    }
}

async fn with_read_timeout<T>(
    timeout: Duration,
    what: &ResourceId,
    op: impl std::future::Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::timeout(format!(
            "timed out after {:?} reading {}",
            timeout, what
        ))),
    }
}

impl Provider for IonosCloudProvider {
    fn name(&self) -> &'static str {
        "ionoscloud"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.registry.resource_types()
    }

    fn read(&self, current: &State) -> BoxFuture<'_, ProviderResult<State>> {
        let current = current.clone();
        Box::pin(async move {
            let resource = self
                .registry
                .managed(&current.id.resource_type)
                .map_err(attach(&current.id))?;
            let timeout = timeouts(&current.attributes).read;
            with_read_timeout(timeout, &current.id, resource.read(&self.ctx, &current))
                .await
                .map_err(attach(&current.id))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let handler = self
                .registry
                .managed(&resource.id.resource_type)
                .map_err(attach(&resource.id))?;
            let prepared = prepare(&handler.schema(), &resource).map_err(attach(&resource.id))?;
            log::info!("creating {}", resource.id);
            handler
                .create(&self.ctx, &prepared)
                .await
                .map_err(attach(&resource.id))
        })
    }

    fn update(&self, from: &State, to: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let handler = self
                .registry
                .managed(&to.id.resource_type)
                .map_err(attach(&to.id))?;
            let schema = handler.schema();
            let prepared = prepare(&schema, &to).map_err(attach(&to.id))?;

            let replaced = schema.replacement_attributes(&from.attributes, &prepared.attributes);
            if !replaced.is_empty() {
                return Err(ProviderError::validation(format!(
                    "Changing {} requires replacing the resource",
                    replaced.join(", ")
                ))
                .for_resource(to.id.clone()));
            }

            log::info!("updating {}", to.id);
            handler
                .update(&self.ctx, &from, &prepared)
                .await
                .map_err(attach(&to.id))
        })
    }

    fn delete(&self, current: &State) -> BoxFuture<'_, ProviderResult<()>> {
        let current = current.clone();
        Box::pin(async move {
            let handler = self
                .registry
                .managed(&current.id.resource_type)
                .map_err(attach(&current.id))?;
            log::info!("deleting {}", current.id);
            handler
                .delete(&self.ctx, &current)
                .await
                .map_err(attach(&current.id))
        })
    }

    fn import(&self, id: &ResourceId, import_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let import_id = import_id.to_string();
        Box::pin(async move {
            let handler = self
                .registry
                .managed(&id.resource_type)
                .map_err(attach(&id))?;
            log::info!("importing {} from '{}'", id, import_id);
            handler
                .import(&self.ctx, &id, &import_id)
                .await
                .map_err(attach(&id))
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let handler = self
                .registry
                .data_source(&resource.id.resource_type)
                .map_err(attach(&resource.id))?;
            let prepared = prepare(&handler.schema(), &resource).map_err(attach(&resource.id))?;
            handler
                .read(&self.ctx, &prepared)
                .await
                .map_err(attach(&resource.id))
        })
    }

    fn open_ephemeral(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let handler = self
                .registry
                .ephemeral(&resource.id.resource_type)
                .map_err(attach(&resource.id))?;
            let prepared = prepare(&handler.schema(), &resource).map_err(attach(&resource.id))?;
            handler
                .open(&self.ctx, &prepared)
                .await
                .map_err(attach(&resource.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use std::collections::HashMap;
    use stratus_core::provider::ErrorKind;
    use stratus_core::resource::Value;

    fn provider() -> IonosCloudProvider {
        let config = ProviderConfig::default().with_token("test-token");
        IonosCloudProvider::new(ServiceClients::new(&config, None).unwrap())
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let err = provider()
            .create(&Resource::new("kafka_mirror", "m"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.resource_id, Some(ResourceId::new("kafka_mirror", "m")));
    }

    #[tokio::test]
    async fn invalid_configuration_fails_before_any_request() {
        let resource = Resource::new("kafka_topic", "t")
            .with_attribute("cluster_id", "not-a-uuid")
            .with_attribute("name", "orders");
        let err = provider().create(&resource).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("Invalid UUID"), "{}", err.message);
    }

    #[tokio::test]
    async fn force_new_change_is_rejected() {
        let from = State::existing(
            ResourceId::new("dns_zone", "main"),
            HashMap::from([("zone_name".to_string(), Value::from("example.com"))]),
        )
        .with_identifier("z1");
        let to = Resource::new("dns_zone", "main").with_attribute("zone_name", "example.org");
        let err = provider().update(&from, &to).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("zone_name"));
    }

    #[test]
    fn lists_every_registered_type() {
        let names: Vec<_> = provider()
            .resource_types()
            .iter()
            .map(|t| t.name())
            .collect();
        assert!(names.contains(&"s3_bucket"));
        assert!(names.contains(&"vpn_wireguard_peer"));
    }
}

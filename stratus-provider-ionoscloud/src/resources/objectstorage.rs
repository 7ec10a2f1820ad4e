//! S3 buckets
//!
//! Buckets are identified by name. The location is the object storage region
//! and defaults to eu-central-3.

use async_trait::async_trait;
use stratus_core::provider::{ProviderError, ProviderResult};
use stratus_core::resource::{Resource, ResourceId, State};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use stratus_core::wait::{permanent, wait_until};

use super::{Context, DataSource, ManagedResource, identifier, location_attribute, parse_import_id, timeouts};
use crate::endpoint::Product;
use crate::services::objectstorage::ObjectStorageService;
use crate::utils::{Attributes, get_bool_or, get_string_map, location, require_str, string_map};

fn tags_attribute() -> AttributeSchema {
    AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
}

async fn bucket_state(
    ctx: &Context,
    id: ResourceId,
    base: &Attributes,
    location: &str,
    name: &str,
) -> ProviderResult<State> {
    let storage = &ctx.services.objectstorage;
    if !storage.bucket_exists(location, name).await? {
        return Err(ProviderError::not_found(format!("Bucket {} does not exist", name)));
    }
    let tags = storage.get_tags(location, name).await?;

    let mut attrs = base.clone();
    attrs.insert("name".to_string(), name.into());
    attrs.insert("region".to_string(), ObjectStorageService::region(location).into());
    attrs.insert("tags".to_string(), string_map(&tags));
    Ok(State::existing(id, attrs).with_identifier(name))
}

/// Poll until the bucket's existence matches `exists`
async fn wait_for_bucket(
    ctx: &Context,
    location: &str,
    name: &str,
    exists: bool,
    timeout: std::time::Duration,
) -> ProviderResult<()> {
    let storage = &ctx.services.objectstorage;
    let what = if exists {
        format!("bucket {}", name)
    } else {
        format!("deletion of bucket {}", name)
    };
    wait_until(&what, &ctx.wait_config(timeout), || async move {
        match storage.bucket_exists(location, name).await {
            Ok(found) => Ok(found == exists),
            Err(e) => Err(permanent(e)),
        }
    })
    .await
}

pub struct BucketResource;

#[async_trait]
impl ManagedResource for BucketResource {
    fn type_name(&self) -> &'static str {
        "s3_bucket"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Object storage bucket")
            .with_timeouts()
            .attribute(
                AttributeSchema::new("name", types::bucket_name())
                    .required()
                    .force_new(),
            )
            .attribute(location_attribute(Product::ObjectStorage))
            .attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .computed()
                    .with_description("Region the bucket lives in"),
            )
            .attribute(
                AttributeSchema::new("force_destroy", AttributeType::Bool)
                    .optional_computed()
                    .with_default(false)
                    .with_description("Delete all objects when destroying the bucket"),
            )
            .attribute(tags_attribute())
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let name = require_str(attrs, "name")?;
        let storage = &ctx.services.objectstorage;

        storage.create_bucket(location, name).await?;
        wait_for_bucket(ctx, location, name, true, timeouts(attrs).create).await?;

        let tags = get_string_map(attrs, "tags");
        if !tags.is_empty() {
            storage.put_tags(location, name, &tags).await?;
        }
        bucket_state(ctx, resource.id.clone(), attrs, location, name).await
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let name = identifier(current)?;
        match bucket_state(ctx, current.id.clone(), &current.attributes, location, name).await {
            Err(e) if e.is_not_found() => {
                log::info!("{} no longer exists, removing it from state", current.id);
                Ok(State::not_found(current.id.clone()))
            }
            other => other,
        }
    }

    async fn update(
        &self,
        ctx: &Context,
        current: &State,
        desired: &Resource,
    ) -> ProviderResult<State> {
        let attrs = &desired.attributes;
        let location = location(&current.attributes);
        let name = identifier(current)?;

        let tags = get_string_map(attrs, "tags");
        if tags != get_string_map(&current.attributes, "tags") {
            ctx.services
                .objectstorage
                .put_tags(location, name, &tags)
                .await?;
        }
        bucket_state(ctx, current.id.clone(), attrs, location, name).await
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let name = identifier(current)?;
        let force = get_bool_or(&current.attributes, "force_destroy", false);

        match ctx
            .services
            .objectstorage
            .delete_bucket(location, name, force)
            .await
        {
            Err(e) if e.is_not_found() => return Ok(()),
            other => other?,
        }
        wait_for_bucket(
            ctx,
            location,
            name,
            false,
            timeouts(&current.attributes).delete,
        )
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        let parsed = parse_import_id(import_id, &["name"])?;
        let mut attrs = Attributes::new();
        if !parsed.location.is_empty() {
            attrs.insert("location".to_string(), parsed.location.as_str().into());
        }
        bucket_state(ctx, id.clone(), &attrs, &parsed.location, &parsed.parts[0]).await
    }
}

pub struct BucketDataSource;

#[async_trait]
impl DataSource for BucketDataSource {
    fn type_name(&self) -> &'static str {
        "s3_bucket"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Look up an existing bucket by name")
            .attribute(AttributeSchema::new("name", types::bucket_name()).required())
            .attribute(location_attribute(Product::ObjectStorage))
            .attribute(AttributeSchema::new("region", AttributeType::String).computed())
            .attribute(tags_attribute().computed())
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let name = require_str(attrs, "name")?;
        bucket_state(ctx, config.id.clone(), attrs, location(attrs), name).await
    }
}

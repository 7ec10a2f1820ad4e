//! S3-compatible object storage
//!
//! Buckets live in a region; the region doubles as the location used to
//! resolve the endpoint and as the signing region.

use std::collections::HashMap;
use std::sync::Arc;

use aws_sdk_s3::Client;
use dashmap::DashMap;
use aws_sdk_s3::config::{Credentials as AwsCredentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier, Tag, Tagging,
};
use stratus_core::provider::{ProviderError, ProviderResult};

use crate::config::S3Credentials;
use crate::endpoint::{DEFAULT_OBJECT_STORAGE_REGION, EndpointResolver, Product, ResolvedEndpoint};

/// Objects removed per DeleteObjects call
const DELETE_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ObjectStorageService {
    credentials: Option<S3Credentials>,
    endpoints: Arc<EndpointResolver>,
    /// S3 clients by endpoint URL and region
    clients: Arc<DashMap<(String, String), Client>>,
}

impl ObjectStorageService {
    pub fn new(credentials: Option<S3Credentials>, endpoints: Arc<EndpointResolver>) -> Self {
        Self {
            credentials,
            endpoints,
            clients: Arc::new(DashMap::new()),
        }
    }

    /// Region of a location; the empty location is the default region
    pub fn region(location: &str) -> &str {
        if location.is_empty() {
            DEFAULT_OBJECT_STORAGE_REGION
        } else {
            location
        }
    }

    pub fn endpoint(&self, location: &str) -> ProviderResult<ResolvedEndpoint> {
        self.endpoints.resolve(Product::ObjectStorage, location)
    }

    /// S3 client for the endpoint serving `location`, built on first use
    async fn client(&self, location: &str) -> ProviderResult<Client> {
        let endpoint = self.endpoint(location)?;
        let key = (endpoint.url.clone(), Self::region(location).to_string());
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        if endpoint.skip_tls_verify || endpoint.certificate_authority.is_some() {
            log::warn!(
                "TLS settings are not applied to object storage endpoint {}",
                endpoint.url
            );
        }
        let client = self.build_client(&endpoint, &key.1).await;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    async fn build_client(&self, endpoint: &ResolvedEndpoint, region: &str) -> Client {
        log::debug!("creating S3 client for {} in '{}'", endpoint.url, region);
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(&endpoint.url);
        if let Some(creds) = &self.credentials {
            loader = loader.credentials_provider(AwsCredentials::new(
                &creds.access_key,
                &creds.secret_key,
                None,
                None,
                "ionoscloud",
            ));
        }
        let sdk_config = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        Client::from_conf(config)
    }

    fn ensure_credentials(&self) -> ProviderResult<()> {
        if self.credentials.is_none() {
            return Err(ProviderError::configuration(
                "Object storage requires IONOS_S3_ACCESS_KEY and IONOS_S3_SECRET_KEY",
            ));
        }
        Ok(())
    }

    pub async fn create_bucket(&self, location: &str, name: &str) -> ProviderResult<()> {
        self.ensure_credentials()?;
        let client = self.client(location).await?;
        let constraint = BucketLocationConstraint::from(Self::region(location));
        let configuration = CreateBucketConfiguration::builder()
            .location_constraint(constraint)
            .build();

        client
            .create_bucket()
            .bucket(name)
            .create_bucket_configuration(configuration)
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to create bucket {}", name), e))?;
        log::info!("created bucket {} in '{}'", name, Self::region(location));
        Ok(())
    }

    /// Whether the bucket exists and is reachable with the configured keys
    pub async fn bucket_exists(&self, location: &str, name: &str) -> ProviderResult<bool> {
        self.ensure_credentials()?;
        let client = self.client(location).await?;
        match client.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(true),
            Err(err) if is_not_found_error(&err) => Ok(false),
            Err(err) => Err(s3_error(format!("Failed to look up bucket {}", name), err)),
        }
    }

    /// Delete a bucket; with `force` every object in it is removed first
    pub async fn delete_bucket(&self, location: &str, name: &str, force: bool) -> ProviderResult<()> {
        self.ensure_credentials()?;
        let client = self.client(location).await?;
        if force {
            empty_bucket(&client, name).await?;
        }
        match client.delete_bucket().bucket(name).send().await {
            Ok(_) => {
                log::info!("deleted bucket {}", name);
                Ok(())
            }
            Err(err) if is_not_found_error(&err) => Err(ProviderError::not_found(format!(
                "Bucket {} does not exist",
                name
            ))),
            Err(err) => Err(s3_error(format!("Failed to delete bucket {}", name), err)),
        }
    }

    /// Bucket tags; a bucket without tags yields an empty map
    pub async fn get_tags(&self, location: &str, name: &str) -> ProviderResult<HashMap<String, String>> {
        self.ensure_credentials()?;
        let client = self.client(location).await?;
        match client.get_bucket_tagging().bucket(name).send().await {
            Ok(output) => Ok(output
                .tag_set()
                .iter()
                .map(|t| (t.key().to_string(), t.value().to_string()))
                .collect()),
            Err(err) if is_not_found_error(&err) => Ok(HashMap::new()),
            Err(err) => Err(s3_error(format!("Failed to read tags of bucket {}", name), err)),
        }
    }

    /// Replace the bucket tags; an empty map removes them
    pub async fn put_tags(
        &self,
        location: &str,
        name: &str,
        tags: &HashMap<String, String>,
    ) -> ProviderResult<()> {
        self.ensure_credentials()?;
        let client = self.client(location).await?;
        if tags.is_empty() {
            client
                .delete_bucket_tagging()
                .bucket(name)
                .send()
                .await
                .map_err(|e| s3_error(format!("Failed to remove tags of bucket {}", name), e))?;
            return Ok(());
        }

        let mut tag_set = Vec::with_capacity(tags.len());
        for (key, value) in tags {
            tag_set.push(
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| ProviderError::validation(format!("Invalid tag '{}': {}", key, e)))?,
            );
        }
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| ProviderError::validation(format!("Invalid tags: {}", e)))?;

        client
            .put_bucket_tagging()
            .bucket(name)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to tag bucket {}", name), e))?;
        Ok(())
    }
}

async fn empty_bucket(client: &Client, name: &str) -> ProviderResult<()> {
    let mut continuation: Option<String> = None;
    let mut removed = 0usize;
    loop {
        let page = client
            .list_objects_v2()
            .bucket(name)
            .set_continuation_token(continuation.take())
            .send()
            .await
            .map_err(|e| s3_error(format!("Failed to list objects of bucket {}", name), e))?;

        let keys: Vec<String> = page
            .contents()
            .iter()
            .filter_map(|o| o.key().map(str::to_string))
            .collect();
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ProviderError::new(format!("Invalid object key: {}", e)))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| ProviderError::new(format!("Invalid delete request: {}", e)))?;
            client
                .delete_objects()
                .bucket(name)
                .delete(delete)
                .send()
                .await
                .map_err(|e| s3_error(format!("Failed to empty bucket {}", name), e))?;
            removed += batch.len();
        }

        match page.next_continuation_token() {
            Some(token) if page.is_truncated().unwrap_or(false) => {
                continuation = Some(token.to_string())
            }
            _ => break,
        }
    }
    log::debug!("removed {} objects from bucket {}", removed, name);
    Ok(())
}

/// Check if an S3 error is a "not found" error
fn is_not_found_error<E: std::fmt::Debug>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|raw| raw.status().as_u16() == 404)
}

fn s3_error<E>(context: String, err: SdkError<E>) -> ProviderError
where
    E: std::error::Error + 'static,
{
    ProviderError::new(format!("{}: {}", context, DisplayErrorContext(&err)))
}

//! Logging service pipelines

use serde::{Deserialize, Serialize};
use stratus_core::provider::ProviderResult;

use super::{ApiResource, CreateRequest, RestService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    #[serde(rename = "type")]
    pub destination_type: String,
    pub retention_in_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineLog {
    pub source: String,
    pub tag: String,
    pub protocol: String,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProperties {
    pub name: String,
    pub logs: Vec<PipelineLog>,
    #[serde(default, skip_serializing)]
    pub grafana_address: Option<String>,
    #[serde(default, skip_serializing)]
    pub tcp_address: Option<String>,
    #[serde(default, skip_serializing)]
    pub http_address: Option<String>,
}

pub type Pipeline = ApiResource<PipelineProperties>;

#[derive(Debug, Clone)]
pub struct LoggingService {
    rest: RestService,
}

impl LoggingService {
    pub fn new(rest: RestService) -> Self {
        Self { rest }
    }

    pub async fn create_pipeline(
        &self,
        location: &str,
        properties: PipelineProperties,
    ) -> ProviderResult<Pipeline> {
        let pipeline: Pipeline = self
            .rest
            .post(location, "/pipelines", &CreateRequest::new(properties))
            .await?;
        log::info!("created logging pipeline {} in '{}'", pipeline.id, location);
        Ok(pipeline)
    }

    pub async fn get_pipeline(&self, location: &str, id: &str) -> ProviderResult<Pipeline> {
        self.rest.get(location, &format!("/pipelines/{}", id)).await
    }

    pub async fn list_pipelines(&self, location: &str) -> ProviderResult<Vec<Pipeline>> {
        self.rest.list(location, "/pipelines", &[]).await
    }

    pub async fn update_pipeline(
        &self,
        location: &str,
        id: &str,
        properties: PipelineProperties,
    ) -> ProviderResult<Pipeline> {
        self.rest
            .patch(location, &format!("/pipelines/{}", id), &CreateRequest::new(properties))
            .await
    }

    pub async fn delete_pipeline(&self, location: &str, id: &str) -> ProviderResult<()> {
        self.rest.delete(location, &format!("/pipelines/{}", id)).await
    }
}

//! Cloud DNS zones and records

use serde::{Deserialize, Serialize};
use stratus_core::provider::ProviderResult;

use super::{ApiResource, CreateRequest, Metadata, Provisioned, RestService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneProperties {
    pub zone_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMetadata {
    #[serde(flatten)]
    pub common: Metadata,
    #[serde(default)]
    pub nameservers: Vec<String>,
}

impl Provisioned for ZoneMetadata {
    fn state(&self) -> Option<&str> {
        self.common.state()
    }

    fn state_message(&self) -> Option<&str> {
        self.common.state_message()
    }
}

pub type Zone = ApiResource<ZoneProperties, ZoneMetadata>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordProperties {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(flatten)]
    pub common: Metadata,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl Provisioned for RecordMetadata {
    fn state(&self) -> Option<&str> {
        self.common.state()
    }

    fn state_message(&self) -> Option<&str> {
        self.common.state_message()
    }
}

pub type Record = ApiResource<RecordProperties, RecordMetadata>;

/// Cloud DNS is a global service; every call uses the product-wide endpoint
#[derive(Debug, Clone)]
pub struct DnsService {
    rest: RestService,
}

const GLOBAL: &str = "";

impl DnsService {
    pub fn new(rest: RestService) -> Self {
        Self { rest }
    }

    pub async fn create_zone(&self, properties: ZoneProperties) -> ProviderResult<Zone> {
        let zone: Zone = self
            .rest
            .post(GLOBAL, "/zones", &CreateRequest::new(properties))
            .await?;
        log::info!("created DNS zone {} ({})", zone.properties.zone_name, zone.id);
        Ok(zone)
    }

    pub async fn get_zone(&self, id: &str) -> ProviderResult<Zone> {
        self.rest.get(GLOBAL, &format!("/zones/{}", id)).await
    }

    /// Zones, optionally filtered by (partial) zone name
    pub async fn list_zones(&self, zone_name: Option<&str>) -> ProviderResult<Vec<Zone>> {
        let query: Vec<(&str, &str)> = zone_name
            .map(|name| vec![("filter.zoneName", name)])
            .unwrap_or_default();
        self.rest.list(GLOBAL, "/zones", &query).await
    }

    pub async fn update_zone(&self, id: &str, properties: ZoneProperties) -> ProviderResult<Zone> {
        self.rest
            .put(GLOBAL, &format!("/zones/{}", id), &CreateRequest::new(properties))
            .await
    }

    pub async fn delete_zone(&self, id: &str) -> ProviderResult<()> {
        self.rest.delete(GLOBAL, &format!("/zones/{}", id)).await
    }

    pub async fn create_record(
        &self,
        zone_id: &str,
        properties: RecordProperties,
    ) -> ProviderResult<Record> {
        let record: Record = self
            .rest
            .post(
                GLOBAL,
                &format!("/zones/{}/records", zone_id),
                &CreateRequest::new(properties),
            )
            .await?;
        log::info!("created DNS record {} in zone {}", record.id, zone_id);
        Ok(record)
    }

    pub async fn get_record(&self, zone_id: &str, record_id: &str) -> ProviderResult<Record> {
        self.rest
            .get(GLOBAL, &format!("/zones/{}/records/{}", zone_id, record_id))
            .await
    }

    /// Records of a zone, optionally filtered by (partial) name
    pub async fn list_records(
        &self,
        zone_id: &str,
        name: Option<&str>,
    ) -> ProviderResult<Vec<Record>> {
        let query: Vec<(&str, &str)> = name
            .map(|name| vec![("filter.name", name)])
            .unwrap_or_default();
        self.rest
            .list(GLOBAL, &format!("/zones/{}/records", zone_id), &query)
            .await
    }

    pub async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        properties: RecordProperties,
    ) -> ProviderResult<Record> {
        self.rest
            .put(
                GLOBAL,
                &format!("/zones/{}/records/{}", zone_id, record_id),
                &CreateRequest::new(properties),
            )
            .await
    }

    pub async fn delete_record(&self, zone_id: &str, record_id: &str) -> ProviderResult<()> {
        self.rest
            .delete(GLOBAL, &format!("/zones/{}/records/{}", zone_id, record_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_type_uses_wire_name() {
        let body = serde_json::to_value(CreateRequest::new(RecordProperties {
            name: "www".to_string(),
            record_type: "A".to_string(),
            content: "1.2.3.4".to_string(),
            ttl: Some(3600),
            priority: None,
            enabled: Some(true),
        }))
        .unwrap();
        assert_eq!(
            body,
            json!({"properties": {"name": "www", "type": "A", "content": "1.2.3.4", "ttl": 3600, "enabled": true}})
        );
    }

    #[test]
    fn zone_metadata_reads_nameservers() {
        let zone: Zone = serde_json::from_value(json!({
            "id": "z1",
            "metadata": {"state": "PROVISIONING", "nameservers": ["ns1.example.net"]},
            "properties": {"zoneName": "example.com"}
        }))
        .unwrap();
        assert_eq!(zone.state(), Some("PROVISIONING"));
        assert_eq!(zone.metadata.unwrap().nameservers.len(), 1);
    }
}

//! Event streams for Apache Kafka

use serde::{Deserialize, Serialize};
use stratus_core::provider::{ProviderError, ProviderResult};

use super::{ApiResource, CreateRequest, Metadata, Provisioned, RestService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaConnection {
    pub datacenter_id: String,
    pub lan_id: String,
    pub broker_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    pub name: String,
    pub version: String,
    pub size: String,
    pub connections: Vec<KafkaConnection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    #[serde(flatten)]
    pub common: Metadata,
    #[serde(default)]
    pub broker_addresses: Vec<String>,
}

impl Provisioned for ClusterMetadata {
    fn state(&self) -> Option<&str> {
        self.common.state()
    }

    fn state_message(&self) -> Option<&str> {
        self.common.state_message()
    }
}

pub type Cluster = ApiResource<ClusterProperties, ClusterMetadata>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRetention {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_bytes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_partitions: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_retention: Option<LogRetention>,
}

pub type Topic = ApiResource<TopicProperties>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProperties {
    pub name: String,
}

pub type User = ApiResource<UserProperties>;

/// Credentials in the access response; any of them may be missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccessMetadata {
    #[serde(default)]
    pub certificate_authority: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
}

pub type UserAccess = ApiResource<UserProperties, UserAccessMetadata>;

/// Complete client credentials of a Kafka user
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub user_id: String,
    pub username: String,
    pub certificate_authority: String,
    pub private_key: String,
    pub certificate: String,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl TryFrom<UserAccess> for UserCredentials {
    type Error = ProviderError;

    /// Requires all three credential fields; a partial response yields no credentials at all
    fn try_from(access: UserAccess) -> Result<Self, Self::Error> {
        let metadata = access.metadata.unwrap_or_default();
        match (
            metadata.certificate_authority,
            metadata.private_key,
            metadata.certificate,
        ) {
            (Some(certificate_authority), Some(private_key), Some(certificate)) => Ok(Self {
                user_id: access.id,
                username: access.properties.name,
                certificate_authority,
                private_key,
                certificate,
            }),
            _ => Err(ProviderError::invalid_response(format!(
                "invalid API response format for credentials of Kafka user {}",
                access.id
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KafkaService {
    rest: RestService,
}

impl KafkaService {
    pub fn new(rest: RestService) -> Self {
        Self { rest }
    }

    pub async fn create_cluster(
        &self,
        location: &str,
        properties: ClusterProperties,
    ) -> ProviderResult<Cluster> {
        let cluster: Cluster = self
            .rest
            .post(location, "/clusters", &CreateRequest::new(properties))
            .await?;
        log::info!("created Kafka cluster {} in '{}'", cluster.id, location);
        Ok(cluster)
    }

    pub async fn get_cluster(&self, location: &str, id: &str) -> ProviderResult<Cluster> {
        self.rest.get(location, &format!("/clusters/{}", id)).await
    }

    pub async fn list_clusters(&self, location: &str) -> ProviderResult<Vec<Cluster>> {
        self.rest.list(location, "/clusters", &[]).await
    }

    pub async fn delete_cluster(&self, location: &str, id: &str) -> ProviderResult<()> {
        self.rest.delete(location, &format!("/clusters/{}", id)).await?;
        log::info!("deleted Kafka cluster {} in '{}'", id, location);
        Ok(())
    }

    pub async fn create_topic(
        &self,
        location: &str,
        cluster_id: &str,
        properties: TopicProperties,
    ) -> ProviderResult<Topic> {
        let topic: Topic = self
            .rest
            .post(
                location,
                &format!("/clusters/{}/topics", cluster_id),
                &CreateRequest::new(properties),
            )
            .await?;
        log::info!("created Kafka topic {} in cluster {}", topic.id, cluster_id);
        Ok(topic)
    }

    pub async fn get_topic(
        &self,
        location: &str,
        cluster_id: &str,
        topic_id: &str,
    ) -> ProviderResult<Topic> {
        self.rest
            .get(location, &format!("/clusters/{}/topics/{}", cluster_id, topic_id))
            .await
    }

    pub async fn list_topics(&self, location: &str, cluster_id: &str) -> ProviderResult<Vec<Topic>> {
        self.rest
            .list(location, &format!("/clusters/{}/topics", cluster_id), &[])
            .await
    }

    pub async fn delete_topic(
        &self,
        location: &str,
        cluster_id: &str,
        topic_id: &str,
    ) -> ProviderResult<()> {
        self.rest
            .delete(location, &format!("/clusters/{}/topics/{}", cluster_id, topic_id))
            .await
    }

    pub async fn list_users(&self, location: &str, cluster_id: &str) -> ProviderResult<Vec<User>> {
        self.rest
            .list(location, &format!("/clusters/{}/users", cluster_id), &[])
            .await
    }

    /// Client certificate and key of a user
    pub async fn get_user_credentials(
        &self,
        location: &str,
        cluster_id: &str,
        user_id: &str,
    ) -> ProviderResult<UserCredentials> {
        let access: UserAccess = self
            .rest
            .get(
                location,
                &format!("/clusters/{}/users/{}/access", cluster_id, user_id),
            )
            .await?;
        UserCredentials::try_from(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cluster_metadata_carries_broker_addresses() {
        let cluster: Cluster = serde_json::from_value(json!({
            "id": "c1",
            "metadata": {"state": "AVAILABLE", "brokerAddresses": ["10.0.0.1:9093"]},
            "properties": {
                "name": "events",
                "version": "3.7.0",
                "size": "S",
                "connections": [{
                    "datacenterId": "dc",
                    "lanId": "2",
                    "brokerAddresses": ["10.0.0.1/24"]
                }]
            }
        }))
        .unwrap();
        assert_eq!(cluster.state(), Some("AVAILABLE"));
        assert_eq!(
            cluster.metadata.unwrap().broker_addresses,
            vec!["10.0.0.1:9093".to_string()]
        );
    }

    #[test]
    fn topic_request_omits_unset_fields() {
        let body = serde_json::to_value(CreateRequest::new(TopicProperties {
            name: "orders".to_string(),
            replication_factor: Some(3),
            number_of_partitions: None,
            log_retention: None,
        }))
        .unwrap();
        assert_eq!(
            body,
            json!({"properties": {"name": "orders", "replicationFactor": 3}})
        );
    }

    #[test]
    fn partial_credentials_are_rejected() {
        let access: UserAccess = serde_json::from_value(json!({
            "id": "u1",
            "metadata": {"certificateAuthority": "ca", "certificate": "cert"},
            "properties": {"name": "admin"}
        }))
        .unwrap();
        let err = UserCredentials::try_from(access).unwrap_err();
        assert_eq!(err.kind, stratus_core::provider::ErrorKind::InvalidResponse);
        assert!(err.message.contains("invalid API response format"));
    }

    #[test]
    fn credentials_debug_omits_key_material() {
        let creds = UserCredentials {
            user_id: "u1".to_string(),
            username: "admin".to_string(),
            certificate_authority: "ca".to_string(),
            private_key: "very-secret-key".to_string(),
            certificate: "cert".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("very-secret-key"));
    }
}

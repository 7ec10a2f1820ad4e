//! Managed MariaDB clusters and backups

use serde::{Deserialize, Serialize};
use stratus_core::provider::ProviderResult;

use super::{ApiResource, CreateRequest, RestService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub datacenter_id: String,
    pub lan_id: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    pub day_of_the_week: String,
    pub time: String,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DbUser {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DbUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbUser {{ username: {:?}, password: *** }}", self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    pub display_name: String,
    pub mariadb_version: String,
    pub instances: i64,
    pub cores: i64,
    pub ram: i64,
    pub storage_size: i64,
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    /// Initial administrator; only sent on create, never returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<DbUser>,
    #[serde(default, skip_serializing)]
    pub dns_name: Option<String>,
}

pub type Cluster = ApiResource<ClusterProperties>;

/// Fields that can change in place
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mariadb_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseBackup {
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupProperties {
    pub cluster_id: String,
    #[serde(default)]
    pub earliest_recovery_target_time: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub base_backups: Vec<BaseBackup>,
}

pub type Backup = ApiResource<BackupProperties>;

#[derive(Debug, Clone)]
pub struct MariaDbService {
    rest: RestService,
}

impl MariaDbService {
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
        log::info!("created MariaDB cluster {} in '{}'", cluster.id, location);
        Ok(cluster)
    }

    pub async fn get_cluster(&self, location: &str, id: &str) -> ProviderResult<Cluster> {
        self.rest.get(location, &format!("/clusters/{}", id)).await
    }

    pub async fn list_clusters(&self, location: &str) -> ProviderResult<Vec<Cluster>> {
        self.rest.list(location, "/clusters", &[]).await
    }

    pub async fn update_cluster(
        &self,
        location: &str,
        id: &str,
        patch: ClusterPatch,
    ) -> ProviderResult<Cluster> {
        self.rest
            .patch(location, &format!("/clusters/{}", id), &CreateRequest::new(patch))
            .await
    }

    pub async fn delete_cluster(&self, location: &str, id: &str) -> ProviderResult<()> {
        self.rest.delete(location, &format!("/clusters/{}", id)).await
    }

    /// Backups of one cluster, or of every cluster in the location
    pub async fn list_backups(
        &self,
        location: &str,
        cluster_id: Option<&str>,
    ) -> ProviderResult<Vec<Backup>> {
        let path = match cluster_id {
            Some(id) => format!("/clusters/{}/backups", id),
            None => "/backups".to_string(),
        };
        self.rest.list(location, &path, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_serializes_only_changed_fields() {
        let patch = ClusterPatch {
            instances: Some(3),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(CreateRequest::new(patch)).unwrap(),
            json!({"properties": {"instances": 3}})
        );
    }

    #[test]
    fn dns_name_is_read_but_never_sent() {
        let cluster: Cluster = serde_json::from_value(json!({
            "id": "m1",
            "properties": {
                "displayName": "db",
                "mariadbVersion": "10.6",
                "instances": 1,
                "cores": 2,
                "ram": 4,
                "storageSize": 10,
                "connections": [],
                "dnsName": "m1.mariadb.example.com"
            }
        }))
        .unwrap();
        assert_eq!(cluster.properties.dns_name.as_deref(), Some("m1.mariadb.example.com"));
        let sent = serde_json::to_value(&cluster.properties).unwrap();
        assert!(sent.get("dnsName").is_none());
    }
}

//! Managed MariaDB clusters and their backups

use async_trait::async_trait;
use stratus_core::provider::ProviderResult;
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    Context, DataSource, Lookup, ManagedResource, id_attribute, identifier, ignore_not_found,
    import_state, location_attribute, lookup, lookup_id_attribute, or_not_found, single_match,
    timeouts, wait_for_available, wait_for_deletion,
};
use crate::endpoint::Product;
use crate::services::mariadb::{
    Backup, Cluster, ClusterPatch, ClusterProperties, Connection, DbUser, MaintenanceWindow,
};
use crate::utils::{
    Attributes, block, get_block, get_blocks, get_int, get_str, location, require_int,
    require_str, set_opt,
};

const VERSIONS: &[&str] = &["10.6", "10.11"];
const WEEKDAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

// =============================================================================
// Schemas
// =============================================================================

fn connection_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("datacenter_id", types::uuid()).required(),
        AttributeSchema::new("lan_id", AttributeType::String).required(),
        AttributeSchema::new("cidr", types::cidr())
            .required()
            .with_description("IP and prefix of the primary instance; replicas take the next addresses"),
    ])
}

fn maintenance_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("day_of_the_week", AttributeType::enum_of(WEEKDAYS)).required(),
        AttributeSchema::new("time", AttributeType::String)
            .required()
            .with_description("Start time in UTC, HH:MM:SS"),
    ])
}

fn credentials_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("username", AttributeType::String).required(),
        AttributeSchema::new("password", AttributeType::String).required(),
    ])
}

fn cluster_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let attr = |a: AttributeSchema| if configurable { a.required() } else { a.computed() };
    let attributes = [
        attr(AttributeSchema::new("mariadb_version", AttributeType::enum_of(VERSIONS))),
        attr(
            AttributeSchema::new("instances", types::positive_int())
                .with_description("Number of instances, one primary and the rest replicas"),
        ),
        attr(AttributeSchema::new("cores", types::positive_int())),
        attr(AttributeSchema::new("ram", types::positive_int()).with_description("RAM in GB")),
        attr(AttributeSchema::new("storage_size", types::positive_int()).with_description("Storage in GB")),
    ];
    let connection = AttributeSchema::new("connection", connection_block());
    attributes
        .into_iter()
        .fold(schema, ResourceSchema::attribute)
        .attribute(if configurable {
            connection.required().force_new()
        } else {
            connection.computed()
        })
        .attribute(if configurable {
            AttributeSchema::new("maintenance_window", maintenance_block()).optional_computed()
        } else {
            AttributeSchema::new("maintenance_window", maintenance_block()).computed()
        })
        .attribute(AttributeSchema::new("dns_name", AttributeType::String).computed())
        .attribute(location_attribute(Product::MariaDb))
}

// =============================================================================
// Conversions
// =============================================================================

fn maintenance_window(attrs: &Attributes) -> ProviderResult<Option<MaintenanceWindow>> {
    let Some(window) = get_block(attrs, "maintenance_window") else {
        return Ok(None);
    };
    Ok(Some(MaintenanceWindow {
        day_of_the_week: require_str(window, "day_of_the_week")?.to_string(),
        time: require_str(window, "time")?.to_string(),
    }))
}

fn db_user(attrs: &Attributes) -> ProviderResult<DbUser> {
    Ok(DbUser {
        username: require_str(attrs, "username")?.to_string(),
        password: require_str(attrs, "password")?.to_string(),
    })
}

fn cluster_properties(attrs: &Attributes) -> ProviderResult<ClusterProperties> {
    let connections = get_blocks(attrs, "connection")
        .into_iter()
        .map(|c| {
            Ok(Connection {
                datacenter_id: require_str(c, "datacenter_id")?.to_string(),
                lan_id: require_str(c, "lan_id")?.to_string(),
                cidr: require_str(c, "cidr")?.to_string(),
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    let credentials = get_block(attrs, "credentials").map(db_user).transpose()?;

    Ok(ClusterProperties {
        display_name: require_str(attrs, "display_name")?.to_string(),
        mariadb_version: require_str(attrs, "mariadb_version")?.to_string(),
        instances: require_int(attrs, "instances")?,
        cores: require_int(attrs, "cores")?,
        ram: require_int(attrs, "ram")?,
        storage_size: require_int(attrs, "storage_size")?,
        connections,
        maintenance_window: maintenance_window(attrs)?,
        credentials,
        dns_name: None,
    })
}

/// Fields whose desired value differs from state
fn cluster_patch(current: &Attributes, desired: &Attributes) -> ProviderResult<ClusterPatch> {
    let changed_str = |key: &str| {
        let want = get_str(desired, key)?;
        (get_str(current, key) != Some(want)).then(|| want.to_string())
    };
    let changed_int = |key: &str| {
        let want = get_int(desired, key)?;
        (get_int(current, key) != Some(want)).then_some(want)
    };
    let window = maintenance_window(desired)?;
    let window = if window != maintenance_window(current)? {
        window
    } else {
        None
    };
    Ok(ClusterPatch {
        display_name: changed_str("display_name"),
        mariadb_version: changed_str("mariadb_version"),
        instances: changed_int("instances"),
        cores: changed_int("cores"),
        ram: changed_int("ram"),
        storage_size: changed_int("storage_size"),
        maintenance_window: window,
    })
}

fn cluster_state(id: ResourceId, base: &Attributes, location: &str, cluster: &Cluster) -> State {
    let props = &cluster.properties;
    let connections = props
        .connections
        .iter()
        .map(|c| {
            block([
                ("datacenter_id", Some(Value::from(c.datacenter_id.as_str()))),
                ("lan_id", Some(Value::from(c.lan_id.as_str()))),
                ("cidr", Some(Value::from(c.cidr.as_str()))),
            ])
        })
        .collect::<Vec<_>>();

    let mut attrs = base.clone();
    attrs.insert("id".to_string(), cluster.id.as_str().into());
    attrs.insert("display_name".to_string(), props.display_name.as_str().into());
    attrs.insert("mariadb_version".to_string(), props.mariadb_version.as_str().into());
    attrs.insert("instances".to_string(), props.instances.into());
    attrs.insert("cores".to_string(), props.cores.into());
    attrs.insert("ram".to_string(), props.ram.into());
    attrs.insert("storage_size".to_string(), props.storage_size.into());
    attrs.insert("connection".to_string(), Value::List(connections));
    set_opt(
        &mut attrs,
        "maintenance_window",
        props.maintenance_window.as_ref().map(|w| {
            Value::List(vec![block([
                ("day_of_the_week", Some(Value::from(w.day_of_the_week.as_str()))),
                ("time", Some(Value::from(w.time.as_str()))),
            ])])
        }),
    );
    set_opt(&mut attrs, "dns_name", props.dns_name.clone());
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(cluster.id.clone())
}

fn backup_value(backup: &Backup) -> Value {
    let props = &backup.properties;
    let base_backups = props
        .base_backups
        .iter()
        .map(|b| {
            block([
                ("created", b.created.as_deref().map(Value::from)),
                ("size", b.size.map(Value::from)),
            ])
        })
        .collect();
    block([
        ("id", Some(Value::from(backup.id.as_str()))),
        ("cluster_id", Some(Value::from(props.cluster_id.as_str()))),
        ("size", props.size.map(Value::from)),
        (
            "earliest_recovery_target_time",
            props.earliest_recovery_target_time.as_deref().map(Value::from),
        ),
        ("base_backups", Some(Value::List(base_backups))),
    ])
}

// =============================================================================
// Cluster
// =============================================================================

pub struct MariaDbClusterResource;

#[async_trait]
impl ManagedResource for MariaDbClusterResource {
    fn type_name(&self) -> &'static str {
        "mariadb_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Managed MariaDB cluster")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("display_name", AttributeType::String).required())
            .attribute(
                AttributeSchema::new("credentials", credentials_block())
                    .required()
                    .sensitive()
                    .force_new()
                    .with_description("Initial administrator, only used on create"),
            );
        cluster_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let mariadb = &ctx.services.mariadb;

        let created = mariadb
            .create_cluster(location, cluster_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("MariaDB cluster {}", created.id), &wait, || {
            mariadb.get_cluster(location, &created.id)
        })
        .await?;

        let cluster = mariadb.get_cluster(location, &created.id).await?;
        Ok(cluster_state(resource.id.clone(), attrs, location, &cluster))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let result = ctx
            .services
            .mariadb
            .get_cluster(location, identifier(current)?)
            .await
            .map(|cluster| cluster_state(current.id.clone(), &current.attributes, location, &cluster));
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
        let mariadb = &ctx.services.mariadb;

        let patch = cluster_patch(&current.attributes, attrs)?;
        if patch != ClusterPatch::default() {
            mariadb.update_cluster(location, id, patch).await?;
            let wait = ctx.wait_config(timeouts(attrs).update);
            wait_for_available(&format!("MariaDB cluster {}", id), &wait, || {
                mariadb.get_cluster(location, id)
            })
            .await?;
        }

        let cluster = mariadb.get_cluster(location, id).await?;
        Ok(cluster_state(current.id.clone(), attrs, location, &cluster))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let id = identifier(current)?;
        let mariadb = &ctx.services.mariadb;

        ignore_not_found(mariadb.delete_cluster(location, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of MariaDB cluster {}", id), &wait, || {
            mariadb.get_cluster(location, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["cluster_id"]).await
    }
}

pub struct MariaDbClusterDataSource;

#[async_trait]
impl DataSource for MariaDbClusterDataSource {
    fn type_name(&self) -> &'static str {
        "mariadb_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up a MariaDB cluster by id or display name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("display_name", AttributeType::String).optional_computed());
        cluster_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let mariadb = &ctx.services.mariadb;
        let cluster = match lookup(attrs, "display_name")? {
            Lookup::Id(id) => mariadb.get_cluster(location, id).await?,
            Lookup::Name(name) => {
                let matches = mariadb
                    .list_clusters(location)
                    .await?
                    .into_iter()
                    .filter(|c| c.properties.display_name == name)
                    .collect();
                single_match("MariaDB cluster", name, matches)?
            }
        };
        Ok(cluster_state(config.id.clone(), attrs, location, &cluster))
    }
}

// =============================================================================
// Backups
// =============================================================================

pub struct MariaDbBackupsDataSource;

#[async_trait]
impl DataSource for MariaDbBackupsDataSource {
    fn type_name(&self) -> &'static str {
        "mariadb_backups"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Backups of one MariaDB cluster, or of all clusters in a location")
            .attribute(
                AttributeSchema::new("cluster_id", types::uuid())
                    .with_description("Restrict the list to this cluster"),
            )
            .attribute(location_attribute(Product::MariaDb))
            .attribute(
                AttributeSchema::new(
                    "backups",
                    AttributeType::list_of_objects(vec![
                        AttributeSchema::new("id", AttributeType::String).computed(),
                        AttributeSchema::new("cluster_id", AttributeType::String).computed(),
                        AttributeSchema::new("size", AttributeType::Int).computed(),
                        AttributeSchema::new("earliest_recovery_target_time", AttributeType::String)
                            .computed(),
                        AttributeSchema::new(
                            "base_backups",
                            AttributeType::list_of_objects(vec![
                                AttributeSchema::new("created", AttributeType::String).computed(),
                                AttributeSchema::new("size", AttributeType::Int).computed(),
                            ]),
                        )
                        .computed(),
                    ]),
                )
                .computed(),
            )
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let cluster_id = get_str(attrs, "cluster_id");
        let backups = ctx
            .services
            .mariadb
            .list_backups(location, cluster_id)
            .await?;
        log::debug!("found {} MariaDB backups", backups.len());

        let mut state_attrs = attrs.clone();
        state_attrs.insert(
            "backups".to_string(),
            Value::List(backups.iter().map(backup_value).collect()),
        );
        let identifier = cluster_id.unwrap_or(location).to_string();
        Ok(State::existing(config.id.clone(), state_attrs).with_identifier(identifier))
    }
}

//! Kafka clusters, topics and user credentials
//!
//! The Kafka API has no update operations: every configurable attribute
//! forces replacement, and update only refreshes state.

use async_trait::async_trait;
use stratus_core::provider::ProviderResult;
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    Context, DataSource, EphemeralResource, Lookup, ManagedResource, id_attribute, identifier,
    ignore_not_found, import_state, location_attribute, lookup, lookup_id_attribute, or_not_found,
    parent_id, single_match, timeouts, wait_for_available, wait_for_deletion,
};
use crate::endpoint::Product;
use crate::services::kafka::{
    Cluster, ClusterProperties, KafkaConnection, LogRetention, Topic, TopicProperties,
    UserCredentials,
};
use crate::utils::{
    Attributes, block, get_blocks, get_int, get_string_list, location, require_str, string_list,
};

const CLUSTER_SIZES: &[&str] = &["XS", "S", "M", "L", "XL"];

const DEFAULT_REPLICATION_FACTOR: i64 = 3;
const DEFAULT_PARTITIONS: i64 = 3;
/// One week in milliseconds
const DEFAULT_RETENTION_TIME: i64 = 604_800_000;
/// 1 GiB
const DEFAULT_SEGMENT_BYTES: i64 = 1_073_741_824;

// =============================================================================
// Schemas
// =============================================================================

fn connection_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("datacenter_id", types::uuid()).required(),
        AttributeSchema::new("lan_id", AttributeType::String).required(),
        AttributeSchema::new("broker_addresses", AttributeType::List(Box::new(types::cidr())))
            .required()
            .with_description("Private IPs with prefix of the brokers in the LAN"),
    ])
}

fn cluster_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let attr = |a: AttributeSchema| if configurable { a.required().force_new() } else { a.computed() };
    schema
        .attribute(attr(AttributeSchema::new("version", AttributeType::String)))
        .attribute(attr(AttributeSchema::new("size", AttributeType::enum_of(CLUSTER_SIZES))))
        .attribute(attr(AttributeSchema::new("connection", connection_block())))
        .attribute(
            AttributeSchema::new("broker_addresses", AttributeType::List(Box::new(AttributeType::String)))
                .computed()
                .with_description("Addresses clients use to reach the brokers"),
        )
        .attribute(location_attribute(Product::Kafka))
}

fn topic_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let attr = |a: AttributeSchema, default: i64| {
        if configurable {
            a.optional_computed().force_new().with_default(default)
        } else {
            a.computed()
        }
    };
    schema
        .attribute(attr(
            AttributeSchema::new("replication_factor", types::positive_int()),
            DEFAULT_REPLICATION_FACTOR,
        ))
        .attribute(attr(
            AttributeSchema::new("number_of_partitions", types::positive_int()),
            DEFAULT_PARTITIONS,
        ))
        .attribute(attr(
            AttributeSchema::new("retention_time", AttributeType::Int)
                .with_description("Retention in milliseconds; -1 keeps messages forever"),
            DEFAULT_RETENTION_TIME,
        ))
        .attribute(attr(
            AttributeSchema::new("segment_bytes", types::positive_int()),
            DEFAULT_SEGMENT_BYTES,
        ))
        .attribute(
            AttributeSchema::new("cluster_id", types::uuid())
                .required()
                .force_new(),
        )
        .attribute(location_attribute(Product::Kafka))
}

fn credentials_schema(type_name: &str) -> ResourceSchema {
    ResourceSchema::new(type_name)
        .with_description("Client certificate and key of a Kafka user")
        .attribute(lookup_id_attribute())
        .attribute(AttributeSchema::new("username", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("cluster_id", types::uuid()).required())
        .attribute(location_attribute(Product::Kafka))
        .attribute(
            AttributeSchema::new("certificate_authority", AttributeType::String)
                .computed()
                .sensitive(),
        )
        .attribute(
            AttributeSchema::new("private_key", AttributeType::String)
                .computed()
                .sensitive(),
        )
        .attribute(
            AttributeSchema::new("certificate", AttributeType::String)
                .computed()
                .sensitive(),
        )
}

// =============================================================================
// Conversions
// =============================================================================

fn cluster_properties(attrs: &Attributes) -> ProviderResult<ClusterProperties> {
    let connections = get_blocks(attrs, "connection")
        .into_iter()
        .map(|c| {
            Ok(KafkaConnection {
                datacenter_id: require_str(c, "datacenter_id")?.to_string(),
                lan_id: require_str(c, "lan_id")?.to_string(),
                broker_addresses: get_string_list(c, "broker_addresses"),
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    Ok(ClusterProperties {
        name: require_str(attrs, "name")?.to_string(),
        version: require_str(attrs, "version")?.to_string(),
        size: require_str(attrs, "size")?.to_string(),
        connections,
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
                ("broker_addresses", Some(string_list(&c.broker_addresses))),
            ])
        })
        .collect::<Vec<_>>();
    let brokers = cluster
        .metadata
        .as_ref()
        .map(|m| m.broker_addresses.clone())
        .unwrap_or_default();

    let mut attrs = base.clone();
    attrs.insert("id".to_string(), cluster.id.as_str().into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    attrs.insert("version".to_string(), props.version.as_str().into());
    attrs.insert("size".to_string(), props.size.as_str().into());
    attrs.insert("connection".to_string(), Value::List(connections));
    attrs.insert("broker_addresses".to_string(), string_list(&brokers));
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(cluster.id.clone())
}

fn topic_properties(attrs: &Attributes) -> ProviderResult<TopicProperties> {
    Ok(TopicProperties {
        name: require_str(attrs, "name")?.to_string(),
        replication_factor: get_int(attrs, "replication_factor"),
        number_of_partitions: get_int(attrs, "number_of_partitions"),
        log_retention: Some(LogRetention {
            retention_time: get_int(attrs, "retention_time"),
            segment_bytes: get_int(attrs, "segment_bytes"),
        }),
    })
}

fn topic_state(
    id: ResourceId,
    base: &Attributes,
    location: &str,
    cluster_id: &str,
    topic: &Topic,
) -> State {
    let props = &topic.properties;
    let retention = props.log_retention.clone().unwrap_or_default();
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), topic.id.as_str().into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    attrs.insert("cluster_id".to_string(), cluster_id.into());
    for (key, value) in [
        ("replication_factor", props.replication_factor),
        ("number_of_partitions", props.number_of_partitions),
        ("retention_time", retention.retention_time),
        ("segment_bytes", retention.segment_bytes),
    ] {
        if let Some(v) = value {
            attrs.insert(key.to_string(), v.into());
        }
    }
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(topic.id.clone())
}

fn credentials_state(id: ResourceId, base: &Attributes, creds: UserCredentials) -> State {
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), creds.user_id.as_str().into());
    attrs.insert("username".to_string(), creds.username.into());
    attrs.insert(
        "certificate_authority".to_string(),
        creds.certificate_authority.into(),
    );
    attrs.insert("private_key".to_string(), creds.private_key.into());
    attrs.insert("certificate".to_string(), creds.certificate.into());
    State::existing(id, attrs).with_identifier(creds.user_id)
}

// =============================================================================
// Cluster
// =============================================================================

pub struct KafkaClusterResource;

#[async_trait]
impl ManagedResource for KafkaClusterResource {
    fn type_name(&self) -> &'static str {
        "kafka_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Managed Apache Kafka cluster")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            );
        cluster_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let kafka = &ctx.services.kafka;

        let created = kafka.create_cluster(location, cluster_properties(attrs)?).await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("Kafka cluster {}", created.id), &wait, || {
            kafka.get_cluster(location, &created.id)
        })
        .await?;

        let cluster = kafka.get_cluster(location, &created.id).await?;
        Ok(cluster_state(resource.id.clone(), attrs, location, &cluster))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let result = ctx
            .services
            .kafka
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
        let mut refreshed = current.clone();
        refreshed.attributes.extend(desired.attributes.clone());
        self.read(ctx, &refreshed).await
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let id = identifier(current)?;
        let kafka = &ctx.services.kafka;

        ignore_not_found(kafka.delete_cluster(location, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of Kafka cluster {}", id), &wait, || {
            kafka.get_cluster(location, id)
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

pub struct KafkaClusterDataSource;

#[async_trait]
impl DataSource for KafkaClusterDataSource {
    fn type_name(&self) -> &'static str {
        "kafka_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up a Kafka cluster by id or name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed());
        cluster_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let kafka = &ctx.services.kafka;
        let cluster = match lookup(attrs, "name")? {
            Lookup::Id(id) => kafka.get_cluster(location, id).await?,
            Lookup::Name(name) => {
                let matches = kafka
                    .list_clusters(location)
                    .await?
                    .into_iter()
                    .filter(|c| c.properties.name == name)
                    .collect();
                single_match("Kafka cluster", name, matches)?
            }
        };
        Ok(cluster_state(config.id.clone(), attrs, location, &cluster))
    }
}

// =============================================================================
// Topic
// =============================================================================

pub struct KafkaTopicResource;

#[async_trait]
impl ManagedResource for KafkaTopicResource {
    fn type_name(&self) -> &'static str {
        "kafka_topic"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Topic of a Kafka cluster")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            );
        topic_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let cluster_id = require_str(attrs, "cluster_id")?;
        let kafka = &ctx.services.kafka;

        let created = kafka
            .create_topic(location, cluster_id, topic_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("Kafka topic {}", created.id), &wait, || {
            kafka.get_topic(location, cluster_id, &created.id)
        })
        .await?;

        let topic = kafka.get_topic(location, cluster_id, &created.id).await?;
        Ok(topic_state(resource.id.clone(), attrs, location, cluster_id, &topic))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let cluster_id = parent_id(current, "cluster_id")?;
        let result = ctx
            .services
            .kafka
            .get_topic(location, cluster_id, identifier(current)?)
            .await
            .map(|topic| {
                topic_state(
                    current.id.clone(),
                    &current.attributes,
                    location,
                    cluster_id,
                    &topic,
                )
            });
        or_not_found(&current.id, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        current: &State,
        desired: &Resource,
    ) -> ProviderResult<State> {
        let mut refreshed = current.clone();
        refreshed.attributes.extend(desired.attributes.clone());
        self.read(ctx, &refreshed).await
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let cluster_id = parent_id(current, "cluster_id")?;
        let id = identifier(current)?;
        let kafka = &ctx.services.kafka;

        ignore_not_found(kafka.delete_topic(location, cluster_id, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of Kafka topic {}", id), &wait, || {
            kafka.get_topic(location, cluster_id, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["cluster_id", "topic_id"]).await
    }
}

pub struct KafkaTopicDataSource;

#[async_trait]
impl DataSource for KafkaTopicDataSource {
    fn type_name(&self) -> &'static str {
        "kafka_topic"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up a Kafka topic by id or name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed());
        topic_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let cluster_id = require_str(attrs, "cluster_id")?;
        let kafka = &ctx.services.kafka;
        let topic = match lookup(attrs, "name")? {
            Lookup::Id(id) => kafka.get_topic(location, cluster_id, id).await?,
            Lookup::Name(name) => {
                let matches = kafka
                    .list_topics(location, cluster_id)
                    .await?
                    .into_iter()
                    .filter(|t| t.properties.name == name)
                    .collect();
                single_match("Kafka topic", name, matches)?
            }
        };
        Ok(topic_state(config.id.clone(), attrs, location, cluster_id, &topic))
    }
}

// =============================================================================
// User Credentials
// =============================================================================

async fn fetch_credentials(ctx: &Context, attrs: &Attributes) -> ProviderResult<UserCredentials> {
    let location = location(attrs);
    let cluster_id = require_str(attrs, "cluster_id")?;
    let kafka = &ctx.services.kafka;
    let user_id = match lookup(attrs, "username")? {
        Lookup::Id(id) => id.to_string(),
        Lookup::Name(name) => {
            let matches = kafka
                .list_users(location, cluster_id)
                .await?
                .into_iter()
                .filter(|u| u.properties.name == name)
                .collect();
            single_match("Kafka user", name, matches)?.id
        }
    };
    kafka
        .get_user_credentials(location, cluster_id, &user_id)
        .await
}

pub struct KafkaUserCredentialsDataSource;

#[async_trait]
impl DataSource for KafkaUserCredentialsDataSource {
    fn type_name(&self) -> &'static str {
        "kafka_user_credentials"
    }

    fn schema(&self) -> ResourceSchema {
        credentials_schema(self.type_name())
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let creds = fetch_credentials(ctx, &config.attributes).await?;
        Ok(credentials_state(config.id.clone(), &config.attributes, creds))
    }
}

pub struct KafkaUserCredentialsEphemeral;

#[async_trait]
impl EphemeralResource for KafkaUserCredentialsEphemeral {
    fn type_name(&self) -> &'static str {
        "kafka_user_credentials"
    }

    fn schema(&self) -> ResourceSchema {
        credentials_schema(self.type_name())
    }

    async fn open(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let creds = fetch_credentials(ctx, &config.attributes).await?;
        log::debug!("opened credentials of Kafka user {}", creds.user_id);
        Ok(credentials_state(config.id.clone(), &config.attributes, creds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_cluster() -> Attributes {
        let mut connection = HashMap::new();
        connection.insert(
            "datacenter_id".to_string(),
            Value::from("7c9b4a52-7e0e-4bc4-8e36-4e3f4a1d6c11"),
        );
        connection.insert("lan_id".to_string(), Value::from("2"));
        connection.insert(
            "broker_addresses".to_string(),
            Value::from(vec!["192.168.1.101/24"]),
        );
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), "events".into());
        attrs.insert("version".to_string(), "3.7.0".into());
        attrs.insert("size".to_string(), "S".into());
        attrs.insert("location".to_string(), "de/fra".into());
        attrs.insert("connection".to_string(), Value::List(vec![Value::Map(connection)]));
        attrs
    }

    #[test]
    fn cluster_schema_accepts_valid_configuration() {
        let schema = KafkaClusterResource.schema();
        assert!(schema.validate(&valid_cluster()).is_ok());
    }

    #[test]
    fn cluster_schema_rejects_unknown_size_and_bad_datacenter() {
        let schema = KafkaClusterResource.schema();
        let mut attrs = valid_cluster();
        attrs.insert("size".to_string(), "XXL".into());
        assert!(schema.validate(&attrs).is_err());

        let mut attrs = valid_cluster();
        let mut connection = HashMap::new();
        connection.insert("datacenter_id".to_string(), Value::from("dc-1"));
        connection.insert("lan_id".to_string(), Value::from("2"));
        connection.insert("broker_addresses".to_string(), Value::from(vec!["10.0.0.1/24"]));
        attrs.insert("connection".to_string(), Value::List(vec![Value::Map(connection)]));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn cluster_properties_from_attributes() {
        let props = cluster_properties(&valid_cluster()).unwrap();
        assert_eq!(props.size, "S");
        assert_eq!(props.connections.len(), 1);
        assert_eq!(props.connections[0].broker_addresses, vec!["192.168.1.101/24"]);
    }

    #[test]
    fn topic_defaults_are_applied() {
        let schema = KafkaTopicResource.schema();
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), "orders".into());
        attrs.insert(
            "cluster_id".to_string(),
            "7c9b4a52-7e0e-4bc4-8e36-4e3f4a1d6c11".into(),
        );
        let merged = schema.apply_defaults(&attrs);
        assert_eq!(get_int(&merged, "replication_factor"), Some(3));
        assert_eq!(get_int(&merged, "retention_time"), Some(DEFAULT_RETENTION_TIME));
        let props = topic_properties(&merged).unwrap();
        assert_eq!(props.number_of_partitions, Some(3));
    }

    #[test]
    fn credentials_are_sensitive() {
        let schema = KafkaUserCredentialsEphemeral.schema();
        assert_eq!(
            schema.sensitive_attributes(),
            vec!["certificate", "certificate_authority", "private_key"]
        );
    }
}

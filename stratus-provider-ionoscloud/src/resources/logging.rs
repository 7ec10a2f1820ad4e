//! Logging service pipelines

use async_trait::async_trait;
use stratus_core::provider::ProviderResult;
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{
    Context, DataSource, Lookup, ManagedResource, id_attribute, identifier, ignore_not_found,
    import_state, location_attribute, lookup, lookup_id_attribute, or_not_found, single_match,
    timeouts, wait_for_available, wait_for_deletion,
};
use crate::endpoint::Product;
use crate::services::logging::{Destination, Pipeline, PipelineLog, PipelineProperties};
use crate::utils::{Attributes, block, get_blocks, get_int, get_str, location, require_str, set_opt};

const SOURCES: &[&str] = &["docker", "kubernetes", "systemd", "generic"];
const PROTOCOLS: &[&str] = &["http", "tcp"];
const DESTINATION_TYPES: &[&str] = &["loki"];
const RETENTION_DAYS: &[&str] = &["7", "14", "30"];

const DEFAULT_DESTINATION: &str = "loki";
const DEFAULT_RETENTION_DAYS: i64 = 30;

fn log_block() -> AttributeType {
    AttributeType::list_of_objects(vec![
        AttributeSchema::new("source", AttributeType::enum_of(SOURCES)).required(),
        AttributeSchema::new("tag", AttributeType::String)
            .required()
            .with_description("Tag identifying the log stream of this source"),
        AttributeSchema::new("protocol", AttributeType::enum_of(PROTOCOLS)).required(),
        AttributeSchema::new(
            "destinations",
            AttributeType::list_of_objects(vec![
                AttributeSchema::new("type", AttributeType::enum_of(DESTINATION_TYPES)),
                AttributeSchema::new("retention_in_days", AttributeType::Int).with_description(
                    format!("Days logs are kept: {}", RETENTION_DAYS.join(", ")),
                ),
            ]),
        ),
    ])
}

fn pipeline_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let logs = AttributeSchema::new("log", log_block());
    schema
        .attribute(if configurable { logs.required() } else { logs.computed() })
        .attribute(AttributeSchema::new("grafana_address", AttributeType::String).computed())
        .attribute(AttributeSchema::new("tcp_address", AttributeType::String).computed())
        .attribute(AttributeSchema::new("http_address", AttributeType::String).computed())
        .attribute(location_attribute(Product::Logging))
}

fn pipeline_properties(attrs: &Attributes) -> ProviderResult<PipelineProperties> {
    let mut logs = Vec::new();
    for log in get_blocks(attrs, "log") {
        let destinations = get_blocks(log, "destinations")
            .into_iter()
            .map(|d| Destination {
                destination_type: get_str(d, "type").unwrap_or(DEFAULT_DESTINATION).to_string(),
                retention_in_days: get_int(d, "retention_in_days").unwrap_or(DEFAULT_RETENTION_DAYS),
            })
            .collect();
        logs.push(PipelineLog {
            source: require_str(log, "source")?.to_string(),
            tag: require_str(log, "tag")?.to_string(),
            protocol: require_str(log, "protocol")?.to_string(),
            destinations,
        });
    }
    Ok(PipelineProperties {
        name: require_str(attrs, "name")?.to_string(),
        logs,
        grafana_address: None,
        tcp_address: None,
        http_address: None,
    })
}

fn pipeline_state(id: ResourceId, base: &Attributes, location: &str, pipeline: &Pipeline) -> State {
    let props = &pipeline.properties;
    let logs = props
        .logs
        .iter()
        .map(|log| {
            let destinations = log
                .destinations
                .iter()
                .map(|d| {
                    block([
                        ("type", Some(Value::from(d.destination_type.as_str()))),
                        ("retention_in_days", Some(Value::from(d.retention_in_days))),
                    ])
                })
                .collect();
            block([
                ("source", Some(Value::from(log.source.as_str()))),
                ("tag", Some(Value::from(log.tag.as_str()))),
                ("protocol", Some(Value::from(log.protocol.as_str()))),
                ("destinations", Some(Value::List(destinations))),
            ])
        })
        .collect();

    let mut attrs = base.clone();
    attrs.insert("id".to_string(), pipeline.id.as_str().into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    attrs.insert("log".to_string(), Value::List(logs));
    set_opt(&mut attrs, "grafana_address", props.grafana_address.clone());
    set_opt(&mut attrs, "tcp_address", props.tcp_address.clone());
    set_opt(&mut attrs, "http_address", props.http_address.clone());
    if !location.is_empty() {
        attrs.insert("location".to_string(), location.into());
    }
    State::existing(id, attrs).with_identifier(pipeline.id.clone())
}

pub struct LoggingPipelineResource;

#[async_trait]
impl ManagedResource for LoggingPipelineResource {
    fn type_name(&self) -> &'static str {
        "logging_pipeline"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Log pipeline shipping logs to a managed Loki")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).required());
        pipeline_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let location = location(attrs);
        let logging = &ctx.services.logging;

        let created = logging
            .create_pipeline(location, pipeline_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("logging pipeline {}", created.id), &wait, || {
            logging.get_pipeline(location, &created.id)
        })
        .await?;

        let pipeline = logging.get_pipeline(location, &created.id).await?;
        Ok(pipeline_state(resource.id.clone(), attrs, location, &pipeline))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let location = location(&current.attributes);
        let result = ctx
            .services
            .logging
            .get_pipeline(location, identifier(current)?)
            .await
            .map(|p| pipeline_state(current.id.clone(), &current.attributes, location, &p));
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
        let logging = &ctx.services.logging;

        logging
            .update_pipeline(location, id, pipeline_properties(attrs)?)
            .await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("logging pipeline {}", id), &wait, || {
            logging.get_pipeline(location, id)
        })
        .await?;

        let pipeline = logging.get_pipeline(location, id).await?;
        Ok(pipeline_state(current.id.clone(), attrs, location, &pipeline))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let location = location(&current.attributes);
        let id = identifier(current)?;
        let logging = &ctx.services.logging;

        ignore_not_found(logging.delete_pipeline(location, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of logging pipeline {}", id), &wait, || {
            logging.get_pipeline(location, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["pipeline_id"]).await
    }
}

pub struct LoggingPipelineDataSource;

#[async_trait]
impl DataSource for LoggingPipelineDataSource {
    fn type_name(&self) -> &'static str {
        "logging_pipeline"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up a logging pipeline by id or name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed());
        pipeline_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let location = location(attrs);
        let logging = &ctx.services.logging;
        let pipeline = match lookup(attrs, "name")? {
            Lookup::Id(id) => logging.get_pipeline(location, id).await?,
            Lookup::Name(name) => {
                let matches = logging
                    .list_pipelines(location)
                    .await?
                    .into_iter()
                    .filter(|p| p.properties.name == name)
                    .collect();
                single_match("logging pipeline", name, matches)?
            }
        };
        Ok(pipeline_state(config.id.clone(), attrs, location, &pipeline))
    }
}

//! Cloud DNS zones and records
//!
//! DNS is served from a single global endpoint, so these types carry no
//! `location` attribute.

use async_trait::async_trait;
use stratus_core::provider::ProviderResult;
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{
    Context, DataSource, Lookup, ManagedResource, id_attribute, identifier, ignore_not_found,
    import_state, lookup, lookup_id_attribute, or_not_found, parent_id, single_match, timeouts,
    wait_for_available, wait_for_deletion,
};
use crate::services::dns::{Record, RecordProperties, Zone, ZoneProperties};
use crate::utils::{Attributes, get_bool, get_int, get_str, require_str, set_opt, string_list};

const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "ALIAS", "MX", "NS", "SRV", "TXT", "CAA", "SSHFP", "TLSA", "SMIMEA",
    "DS", "HTTPS", "SVCB", "CERT", "URI", "RP", "LOC", "OPENPGPKEY",
];

const DEFAULT_TTL: i64 = 3600;

fn drop_location(mut state: State) -> State {
    state.attributes.remove("location");
    state
}

// =============================================================================
// Zone
// =============================================================================

fn zone_properties(attrs: &Attributes) -> ProviderResult<ZoneProperties> {
    Ok(ZoneProperties {
        zone_name: require_str(attrs, "zone_name")?.to_string(),
        description: get_str(attrs, "description").map(str::to_string),
        enabled: get_bool(attrs, "enabled"),
    })
}

fn zone_state(id: ResourceId, base: &Attributes, zone: &Zone) -> State {
    let props = &zone.properties;
    let nameservers = zone
        .metadata
        .as_ref()
        .map(|m| m.nameservers.clone())
        .unwrap_or_default();
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), zone.id.as_str().into());
    attrs.insert("zone_name".to_string(), props.zone_name.as_str().into());
    set_opt(&mut attrs, "description", props.description.clone());
    set_opt(&mut attrs, "enabled", props.enabled);
    attrs.insert("nameservers".to_string(), string_list(&nameservers));
    State::existing(id, attrs).with_identifier(zone.id.clone())
}

pub struct DnsZoneResource;

#[async_trait]
impl ManagedResource for DnsZoneResource {
    fn type_name(&self) -> &'static str {
        "dns_zone"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("DNS zone hosted by Cloud DNS")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(
                AttributeSchema::new("zone_name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(
                AttributeSchema::new("enabled", AttributeType::Bool)
                    .optional_computed()
                    .with_default(true),
            )
            .attribute(
                AttributeSchema::new("nameservers", AttributeType::List(Box::new(AttributeType::String)))
                    .computed(),
            )
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let dns = &ctx.services.dns;

        let created = dns.create_zone(zone_properties(attrs)?).await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("DNS zone {}", created.id), &wait, || {
            dns.get_zone(&created.id)
        })
        .await?;

        let zone = dns.get_zone(&created.id).await?;
        Ok(zone_state(resource.id.clone(), attrs, &zone))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let result = ctx
            .services
            .dns
            .get_zone(identifier(current)?)
            .await
            .map(|zone| zone_state(current.id.clone(), &current.attributes, &zone));
        or_not_found(&current.id, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        current: &State,
        desired: &Resource,
    ) -> ProviderResult<State> {
        let attrs = &desired.attributes;
        let id = identifier(current)?;
        let dns = &ctx.services.dns;

        dns.update_zone(id, zone_properties(attrs)?).await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("DNS zone {}", id), &wait, || dns.get_zone(id)).await?;

        let zone = dns.get_zone(id).await?;
        Ok(zone_state(current.id.clone(), attrs, &zone))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let id = identifier(current)?;
        let dns = &ctx.services.dns;

        ignore_not_found(dns.delete_zone(id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of DNS zone {}", id), &wait, || dns.get_zone(id)).await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["zone_id"])
            .await
            .map(drop_location)
    }
}

pub struct DnsZoneDataSource;

#[async_trait]
impl DataSource for DnsZoneDataSource {
    fn type_name(&self) -> &'static str {
        "dns_zone"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.type_name())
            .with_description("Look up a DNS zone by id or zone name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("zone_name", AttributeType::String).optional_computed())
            .attribute(AttributeSchema::new("description", AttributeType::String).computed())
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool).computed())
            .attribute(
                AttributeSchema::new("nameservers", AttributeType::List(Box::new(AttributeType::String)))
                    .computed(),
            )
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let dns = &ctx.services.dns;
        let zone = match lookup(attrs, "zone_name")? {
            Lookup::Id(id) => dns.get_zone(id).await?,
            Lookup::Name(name) => {
                // the API filter matches partial names
                let matches = dns
                    .list_zones(Some(name))
                    .await?
                    .into_iter()
                    .filter(|z| z.properties.zone_name == name)
                    .collect();
                single_match("DNS zone", name, matches)?
            }
        };
        Ok(zone_state(config.id.clone(), attrs, &zone))
    }
}

// =============================================================================
// Record
// =============================================================================

fn record_properties(attrs: &Attributes) -> ProviderResult<RecordProperties> {
    Ok(RecordProperties {
        name: require_str(attrs, "name")?.to_string(),
        record_type: require_str(attrs, "type")?.to_string(),
        content: require_str(attrs, "content")?.to_string(),
        ttl: get_int(attrs, "ttl"),
        priority: get_int(attrs, "priority"),
        enabled: get_bool(attrs, "enabled"),
    })
}

fn record_state(id: ResourceId, base: &Attributes, zone_id: &str, record: &Record) -> State {
    let props = &record.properties;
    let fqdn = record.metadata.as_ref().and_then(|m| m.fqdn.clone());
    let mut attrs = base.clone();
    attrs.insert("id".to_string(), record.id.as_str().into());
    attrs.insert("zone_id".to_string(), zone_id.into());
    attrs.insert("name".to_string(), props.name.as_str().into());
    attrs.insert("type".to_string(), props.record_type.as_str().into());
    attrs.insert("content".to_string(), props.content.as_str().into());
    set_opt(&mut attrs, "ttl", props.ttl);
    set_opt(&mut attrs, "priority", props.priority);
    set_opt(&mut attrs, "enabled", props.enabled);
    set_opt(&mut attrs, "fqdn", fqdn);
    State::existing(id, attrs).with_identifier(record.id.clone())
}

fn record_attributes(schema: ResourceSchema, configurable: bool) -> ResourceSchema {
    let attr = |a: AttributeSchema| if configurable { a.required() } else { a.computed() };
    let optional = |a: AttributeSchema, default: Option<Value>| match (configurable, default) {
        (true, Some(default)) => a.optional_computed().with_default(default),
        (true, None) => a,
        (false, _) => a.computed(),
    };
    schema
        .attribute(AttributeSchema::new("zone_id", types::uuid()).required().force_new())
        .attribute(attr(AttributeSchema::new("type", AttributeType::enum_of(RECORD_TYPES))))
        .attribute(attr(AttributeSchema::new("content", AttributeType::String)))
        .attribute(optional(
            AttributeSchema::new("ttl", types::positive_int()),
            Some(DEFAULT_TTL.into()),
        ))
        .attribute(optional(
            AttributeSchema::new("priority", AttributeType::Int)
                .with_description("Priority of MX and SRV records"),
            None,
        ))
        .attribute(optional(
            AttributeSchema::new("enabled", AttributeType::Bool),
            Some(true.into()),
        ))
        .attribute(AttributeSchema::new("fqdn", AttributeType::String).computed())
}

pub struct DnsRecordResource;

#[async_trait]
impl ManagedResource for DnsRecordResource {
    fn type_name(&self) -> &'static str {
        "dns_record"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Record of a DNS zone")
            .with_timeouts()
            .attribute(id_attribute())
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .with_description("Record name relative to the zone; empty for the apex"),
            );
        record_attributes(schema, true)
    }

    async fn create(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let attrs = &resource.attributes;
        let zone_id = require_str(attrs, "zone_id")?;
        let dns = &ctx.services.dns;

        let created = dns.create_record(zone_id, record_properties(attrs)?).await?;
        let wait = ctx.wait_config(timeouts(attrs).create);
        wait_for_available(&format!("DNS record {}", created.id), &wait, || {
            dns.get_record(zone_id, &created.id)
        })
        .await?;

        let record = dns.get_record(zone_id, &created.id).await?;
        Ok(record_state(resource.id.clone(), attrs, zone_id, &record))
    }

    async fn read(&self, ctx: &Context, current: &State) -> ProviderResult<State> {
        let zone_id = parent_id(current, "zone_id")?;
        let result = ctx
            .services
            .dns
            .get_record(zone_id, identifier(current)?)
            .await
            .map(|record| record_state(current.id.clone(), &current.attributes, zone_id, &record));
        or_not_found(&current.id, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        current: &State,
        desired: &Resource,
    ) -> ProviderResult<State> {
        let attrs = &desired.attributes;
        let zone_id = parent_id(current, "zone_id")?;
        let id = identifier(current)?;
        let dns = &ctx.services.dns;

        dns.update_record(zone_id, id, record_properties(attrs)?).await?;
        let wait = ctx.wait_config(timeouts(attrs).update);
        wait_for_available(&format!("DNS record {}", id), &wait, || {
            dns.get_record(zone_id, id)
        })
        .await?;

        let record = dns.get_record(zone_id, id).await?;
        Ok(record_state(current.id.clone(), attrs, zone_id, &record))
    }

    async fn delete(&self, ctx: &Context, current: &State) -> ProviderResult<()> {
        let zone_id = parent_id(current, "zone_id")?;
        let id = identifier(current)?;
        let dns = &ctx.services.dns;

        ignore_not_found(dns.delete_record(zone_id, id).await)?;
        let wait = ctx.wait_config(timeouts(&current.attributes).delete);
        wait_for_deletion(&format!("deletion of DNS record {}", id), &wait, || {
            dns.get_record(zone_id, id)
        })
        .await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &ResourceId,
        import_id: &str,
    ) -> ProviderResult<State> {
        import_state(self, ctx, id, import_id, &["zone_id", "record_id"])
            .await
            .map(drop_location)
    }
}

pub struct DnsRecordDataSource;

#[async_trait]
impl DataSource for DnsRecordDataSource {
    fn type_name(&self) -> &'static str {
        "dns_record"
    }

    fn schema(&self) -> ResourceSchema {
        let schema = ResourceSchema::new(self.type_name())
            .with_description("Look up a DNS record by id or name")
            .attribute(lookup_id_attribute())
            .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed());
        record_attributes(schema, false)
    }

    async fn read(&self, ctx: &Context, config: &Resource) -> ProviderResult<State> {
        let attrs = &config.attributes;
        let zone_id = require_str(attrs, "zone_id")?;
        let dns = &ctx.services.dns;
        let record = match lookup(attrs, "name")? {
            Lookup::Id(id) => dns.get_record(zone_id, id).await?,
            Lookup::Name(name) => {
                let matches = dns
                    .list_records(zone_id, Some(name))
                    .await?
                    .into_iter()
                    .filter(|r| r.properties.name == name)
                    .collect();
                single_match("DNS record", name, matches)?
            }
        };
        Ok(record_state(config.id.clone(), attrs, zone_id, &record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_attrs() -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("zone_id".to_string(), "1b2c3d4e-5f60-4a7b-8c9d-0e1f2a3b4c5d".into());
        attrs.insert("name".to_string(), "www".into());
        attrs.insert("type".to_string(), "A".into());
        attrs.insert("content".to_string(), "203.0.113.10".into());
        attrs
    }

    #[test]
    fn record_schema_validates_type() {
        let schema = DnsRecordResource.schema();
        assert!(schema.validate(&record_attrs()).is_ok());

        let mut attrs = record_attrs();
        attrs.insert("type".to_string(), "BOGUS".into());
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn record_defaults_fill_ttl_and_enabled() {
        let merged = DnsRecordResource.schema().apply_defaults(&record_attrs());
        let props = record_properties(&merged).unwrap();
        assert_eq!(props.ttl, Some(DEFAULT_TTL));
        assert_eq!(props.enabled, Some(true));
        assert_eq!(props.priority, None);
    }

    #[test]
    fn zone_change_of_name_requires_replacement() {
        let schema = DnsZoneResource.schema();
        let mut current = Attributes::new();
        current.insert("zone_name".to_string(), Value::from("example.com"));
        current.insert("description".to_string(), Value::from("old"));
        let mut desired = current.clone();
        desired.insert("description".to_string(), Value::from("new"));
        assert!(schema.replacement_attributes(&current, &desired).is_empty());
        desired.insert("zone_name".to_string(), Value::from("example.org"));
        assert_eq!(schema.replacement_attributes(&current, &desired), vec!["zone_name"]);
    }

    #[test]
    fn data_source_rejects_configured_computed_values() {
        let schema = DnsRecordDataSource.schema();
        let mut attrs = Attributes::new();
        attrs.insert("zone_id".to_string(), "1b2c3d4e-5f60-4a7b-8c9d-0e1f2a3b4c5d".into());
        attrs.insert("name".to_string(), "www".into());
        assert!(schema.validate(&attrs).is_ok());
        attrs.insert("content".to_string(), "203.0.113.10".into());
        assert!(schema.validate(&attrs).is_err());
    }
}

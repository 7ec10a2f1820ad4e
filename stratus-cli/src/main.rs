use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use stratus_core::provider::{Provider, ResourceType};
use stratus_core::resource::{Resource, ResourceId, ResourceKind, State, Value};
use stratus_core::schema::{AttributeMode, ResourceSchema};
use stratus_provider_ionoscloud::resources::Registry;
use stratus_provider_ionoscloud::{IonosCloudProvider, Product, ProviderConfig, ResolvedEndpoint};

const MASK: &str = "(sensitive)";

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Manage IONOS Cloud resources", long_about = None)]
struct Cli {
    /// IONOS configuration file (defaults to ~/.ionos/config)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Print sensitive attributes instead of masking them
    #[arg(long, global = true)]
    show_sensitive: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Resource,
    Data,
    Ephemeral,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Resource => ResourceKind::Managed,
            KindArg::Data => ResourceKind::Data,
            KindArg::Ephemeral => ResourceKind::Ephemeral,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List supported resource types
    Types,
    /// Show the attributes of a resource type
    Schema {
        resource_type: String,

        #[arg(long, value_enum, default_value = "resource")]
        kind: KindArg,
    },
    /// Show the endpoint used for a product and location
    Endpoint {
        /// Product name (kafka, dns, mariadb, logging, apigateway, objectstorage, vpn)
        product: String,

        #[arg(long, default_value = "")]
        location: String,
    },
    /// Create a resource from a JSON configuration file
    Create { file: PathBuf },
    /// Refresh a resource from a JSON state file
    Read { state: PathBuf },
    /// Update a resource to match a configuration file
    Update {
        file: PathBuf,

        /// State file of the existing resource
        #[arg(long)]
        from: PathBuf,
    },
    /// Delete the resource of a state file
    Delete { state: PathBuf },
    /// Import an existing object as `[location:]id` or `[location:]parent:child`
    Import {
        resource_type: String,
        name: String,
        import_id: String,
    },
    /// Read a data source from a JSON configuration file
    Data { file: PathBuf },
    /// Open an ephemeral resource from a JSON configuration file
    Ephemeral { file: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> Result<(), String> {
    let show_sensitive = cli.show_sensitive;
    match cli.command {
        Commands::Types => {
            run_types(&Registry::new());
            Ok(())
        }
        Commands::Schema {
            resource_type,
            kind,
        } => run_schema(&Registry::new(), &resource_type, kind.into()),
        Commands::Endpoint { product, location } => {
            let config = provider_config(cli.config_file, cli.insecure);
            run_endpoint(&config, &product, &location)
        }
        command => {
            let config = provider_config(cli.config_file, cli.insecure);
            let provider = IonosCloudProvider::from_config(config).map_err(|e| e.to_string())?;
            let (state, kind) = run_operation(&provider, command).await?;
            if let Some(state) = state {
                print_state(provider.registry(), &state, kind, show_sensitive)?;
            }
            Ok(())
        }
    }
}

fn provider_config(config_file: Option<PathBuf>, insecure: bool) -> ProviderConfig {
    let mut config = ProviderConfig::from_env();
    if let Some(path) = config_file {
        config = config.with_config_file(path);
    }
    if insecure {
        config = config.with_insecure(true);
    }
    config
}

// =============================================================================
// Inspection commands
// =============================================================================

fn run_types(registry: &Registry) {
    let mut types = registry.resource_types();
    types.sort_by_key(|t| (kind_order(t.kind()), t.name()));
    for t in types {
        let description = t.schema().description.unwrap_or_default();
        println!(
            "{:<20} {:<26} {}",
            t.kind().to_string().cyan(),
            t.name().bold(),
            description.dimmed()
        );
    }
}

fn kind_order(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::Managed => 0,
        ResourceKind::Data => 1,
        ResourceKind::Ephemeral => 2,
    }
}

fn find_schema(registry: &Registry, resource_type: &str, kind: ResourceKind) -> Option<ResourceSchema> {
    registry.schema(kind, resource_type).ok()
}

fn run_schema(registry: &Registry, resource_type: &str, kind: ResourceKind) -> Result<(), String> {
    let schema = find_schema(registry, resource_type, kind)
        .ok_or_else(|| format!("Unknown {} type: {}", kind, resource_type))?;

    println!("{} {}", kind.to_string().cyan(), schema.resource_type.bold());
    if let Some(description) = &schema.description {
        println!("  {}", description);
    }
    println!();

    let mut attributes: Vec<_> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    for attr in attributes {
        let mode = match attr.mode {
            AttributeMode::Required => "required".yellow(),
            AttributeMode::Optional => "optional".normal(),
            AttributeMode::Computed => "computed".dimmed(),
            AttributeMode::OptionalComputed => "optional, computed".normal(),
        };
        let mut flags = Vec::new();
        if attr.force_new {
            flags.push("forces replacement".to_string());
        }
        if attr.sensitive {
            flags.push("sensitive".to_string());
        }
        if let Some(default) = &attr.default {
            flags.push(format!("default {}", default.to_json()));
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("  {:<24} ({}){}", attr.name.bold(), mode, flags.dimmed());
        if let Some(description) = &attr.description {
            println!("  {:<24} {}", "", description);
        }
    }
    Ok(())
}

/// Resolve without credentials; only the configuration file is read
fn resolve_endpoint(
    config: &ProviderConfig,
    product: &str,
    location: &str,
) -> Result<ResolvedEndpoint, String> {
    let product = product.parse::<Product>().map_err(|e| e.to_string())?;
    let file = config.load_file_config().map_err(|e| e.to_string())?;
    config
        .endpoint_resolver(file.map(Arc::new))
        .resolve(product, location)
        .map_err(|e| e.to_string())
}

fn run_endpoint(config: &ProviderConfig, product: &str, location: &str) -> Result<(), String> {
    let resolved = resolve_endpoint(config, product, location)?;

    println!("{}", resolved.url.bold());
    println!("  source: {}", resolved.source);
    if resolved.skip_tls_verify {
        println!("  {}", "TLS verification disabled".yellow());
    }
    if resolved.certificate_authority.is_some() {
        println!("  custom certificate authority");
    }
    Ok(())
}

// =============================================================================
// Lifecycle commands
// =============================================================================

async fn run_operation(
    provider: &IonosCloudProvider,
    command: Commands,
) -> Result<(Option<State>, ResourceKind), String> {
    let result = match command {
        Commands::Create { file } => {
            let resource = load_resource(&file, ResourceKind::Managed)?;
            let state = provider.create(&resource).await;
            (state.map(Some), ResourceKind::Managed)
        }
        Commands::Read { state } => {
            let current = load_state(&state)?;
            let refreshed = provider.read(&current).await;
            if let Ok(s) = &refreshed
                && !s.exists
            {
                eprintln!("{} {} no longer exists", "!".yellow().bold(), s.id);
            }
            (refreshed.map(Some), ResourceKind::Managed)
        }
        Commands::Update { file, from } => {
            let current = load_state(&from)?;
            let desired = load_resource(&file, ResourceKind::Managed)?;
            if current.id != desired.id {
                return Err(format!(
                    "State {} does not belong to resource {}",
                    current.id, desired.id
                ));
            }
            (provider.update(&current, &desired).await.map(Some), ResourceKind::Managed)
        }
        Commands::Delete { state } => {
            let current = load_state(&state)?;
            let deleted = provider.delete(&current).await;
            if deleted.is_ok() {
                eprintln!("{} {} deleted", "✓".green().bold(), current.id);
            }
            (deleted.map(|()| None), ResourceKind::Managed)
        }
        Commands::Import {
            resource_type,
            name,
            import_id,
        } => {
            let id = ResourceId::new(resource_type, name);
            (provider.import(&id, &import_id).await.map(Some), ResourceKind::Managed)
        }
        Commands::Data { file } => {
            let resource = load_resource(&file, ResourceKind::Data)?;
            (provider.read_data_source(&resource).await.map(Some), ResourceKind::Data)
        }
        Commands::Ephemeral { file } => {
            let resource = load_resource(&file, ResourceKind::Ephemeral)?;
            (provider.open_ephemeral(&resource).await.map(Some), ResourceKind::Ephemeral)
        }
        Commands::Types | Commands::Schema { .. } | Commands::Endpoint { .. } => {
            return Ok((None, ResourceKind::Managed));
        }
    };

    match result {
        (Ok(state), kind) => Ok((state, kind)),
        (Err(e), _) => Err(e.to_string()),
    }
}

// =============================================================================
// Files
// =============================================================================

fn read_json(path: &Path) -> Result<serde_json::Value, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn required_field<'a>(doc: &'a serde_json::Value, field: &str, path: &Path) -> Result<&'a str, String> {
    doc.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("{}: missing string field '{}'", path.display(), field))
}

fn attributes_of(doc: &serde_json::Value, path: &Path) -> Result<HashMap<String, Value>, String> {
    match doc.get("attributes") {
        None => Ok(HashMap::new()),
        Some(serde_json::Value::Object(map)) => {
            let mut attributes = HashMap::new();
            for (k, v) in map {
                let value = Value::from_json(v)
                    .map_err(|e| format!("{}: attribute '{}': {}", path.display(), k, e))?;
                if let Some(value) = value {
                    attributes.insert(k.clone(), value);
                }
            }
            Ok(attributes)
        }
        Some(_) => Err(format!("{}: 'attributes' must be an object", path.display())),
    }
}

/// Load `{"type": ..., "name": ..., "attributes": {...}}`
fn load_resource(path: &Path, kind: ResourceKind) -> Result<Resource, String> {
    let doc = read_json(path)?;
    let resource_type = required_field(&doc, "type", path)?;
    let name = required_field(&doc, "name", path)?;
    Ok(Resource::new(resource_type, name)
        .with_attributes(attributes_of(&doc, path)?)
        .with_kind(kind))
}

/// Load a state file as written by `print_state`
fn load_state(path: &Path) -> Result<State, String> {
    let doc = read_json(path)?;
    let resource_type = required_field(&doc, "type", path)?;
    let name = required_field(&doc, "name", path)?;
    let identifier = required_field(&doc, "identifier", path)?;

    let attributes = attributes_of(&doc, path)?;
    if attributes.values().any(|v| v.as_str() == Some(MASK)) {
        return Err(format!(
            "{} contains masked values; write it with --show-sensitive",
            path.display()
        ));
    }
    let mut state =
        State::from_identifier(ResourceId::new(resource_type, name), identifier.to_string());
    state.attributes = attributes;
    Ok(state)
}

fn state_json(state: &State, sensitive: &[&str]) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = state
        .attributes
        .iter()
        .map(|(k, v)| {
            let value = if sensitive.contains(&k.as_str()) {
                serde_json::Value::String(MASK.to_string())
            } else {
                v.to_json()
            };
            (k.clone(), value)
        })
        .collect();
    json!({
        "type": state.id.resource_type,
        "name": state.id.name,
        "identifier": state.identifier,
        "exists": state.exists,
        "attributes": attributes,
    })
}

fn print_state(
    registry: &Registry,
    state: &State,
    kind: ResourceKind,
    show_sensitive: bool,
) -> Result<(), String> {
    let schema = find_schema(registry, &state.id.resource_type, kind);
    let sensitive = match (&schema, show_sensitive) {
        (Some(schema), false) => schema.sensitive_attributes(),
        _ => Vec::new(),
    };
    let output = serde_json::to_string_pretty(&state_json(state, &sensitive))
        .map_err(|e| format!("Failed to encode state: {}", e))?;
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_resource_file() {
        let file = write_temp(
            r#"{"type": "dns_zone", "name": "main", "attributes": {"zone_name": "example.com", "enabled": true}}"#,
        );
        let resource = load_resource(file.path(), ResourceKind::Managed).unwrap();
        assert_eq!(resource.id, ResourceId::new("dns_zone", "main"));
        assert_eq!(
            resource.attributes.get("zone_name"),
            Some(&Value::from("example.com"))
        );
        assert_eq!(resource.attributes.get("enabled"), Some(&Value::Bool(true)));
    }

    #[test]
    fn resource_file_requires_type() {
        let file = write_temp(r#"{"name": "main"}"#);
        let err = load_resource(file.path(), ResourceKind::Managed).unwrap_err();
        assert!(err.contains("'type'"), "{}", err);
    }

    #[test]
    fn state_output_masks_sensitive_attributes() {
        let state = State::from_identifier(ResourceId::new("kafka_user_credentials", "u"), "id-1")
            .with_attribute("private_key", "secret")
            .with_attribute("username", "admin");
        let output = state_json(&state, &["private_key"]);
        assert_eq!(output["attributes"]["private_key"], MASK);
        assert_eq!(output["attributes"]["username"], "admin");
        assert_eq!(output["identifier"], "id-1");
    }

    #[test]
    fn printed_state_loads_back() {
        let state = State::from_identifier(ResourceId::new("kafka_topic", "orders"), "t-1")
            .with_attribute("cluster_id", "c-1")
            .with_attribute("number_of_partitions", 6i64);
        let file = write_temp(&state_json(&state, &[]).to_string());
        assert_eq!(load_state(file.path()).unwrap(), state);
    }

    #[test]
    fn inspection_needs_no_credentials() {
        let registry = Registry::new();
        assert!(registry.resource_types().iter().any(|t| t.name() == "kafka_cluster"));
        assert!(find_schema(&registry, "mariadb_cluster", ResourceKind::Managed).is_some());
        assert!(run_schema(&registry, "dns_zone", ResourceKind::Managed).is_ok());

        let file = write_temp("{}");
        let config = ProviderConfig::default().with_config_file(file.path());
        let resolved = resolve_endpoint(&config, "dns", "").unwrap();
        assert_eq!(resolved.url, "https://dns.de-fra.ionos.com");
    }

    #[test]
    fn fractional_attribute_is_rejected() {
        let file = write_temp(r#"{"type": "mariadb_cluster", "name": "db", "attributes": {"ram": 4.5}}"#);
        let err = load_resource(file.path(), ResourceKind::Managed).unwrap_err();
        assert!(err.contains("'ram'"), "{}", err);
    }

    #[test]
    fn masked_state_is_rejected() {
        let state = State::from_identifier(ResourceId::new("vpn_wireguard_gateway", "gw"), "g-1")
            .with_attribute("private_key", "secret");
        let file = write_temp(&state_json(&state, &["private_key"]).to_string());
        let err = load_state(file.path()).unwrap_err();
        assert!(err.contains("--show-sensitive"), "{}", err);
    }
}

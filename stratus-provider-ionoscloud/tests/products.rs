//! Requests sent by each product against a mock IONOS API

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use stratus_core::provider::Provider;
use stratus_core::resource::{Resource, ResourceId, ResourceKind, State, Value};
use stratus_core::wait::WaitConfig;
use stratus_provider_ionoscloud::endpoint::Product;
use stratus_provider_ionoscloud::services::ServiceClients;
use stratus_provider_ionoscloud::{IonosCloudProvider, ProviderConfig};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ZONE_ID: &str = "0b6f6a52-7c1d-4c5e-9d8a-3f2e1d0c9b8a";
const RECORD_ID: &str = "5e4d3c2b-1a09-4f8e-8d7c-6b5a49382716";
const CLUSTER_ID: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";
const DATACENTER_ID: &str = "1d2c3b4a-5f6e-4d7c-9b8a-0f1e2d3c4b5a";
const PIPELINE_ID: &str = "7f6e5d4c-3b2a-4190-8f7e-6d5c4b3a2918";
const GATEWAY_ID: &str = "2a3b4c5d-6e7f-4a8b-9c0d-1e2f3a4b5c6d";
const ROUTE_ID: &str = "6c5b4a39-2817-4f6e-9d5c-4b3a29180f7e";
const WG_GATEWAY_ID: &str = "4e5f6a7b-8c9d-4e0f-a1b2-c3d4e5f6a7b8";
const PEER_ID: &str = "8d9e0f1a-2b3c-4d4e-b5f6-a7b8c9d0e1f2";
const BUCKET: &str = "team-artifacts";

/// Provider with every product pointed at the mock server
fn provider_for(server: &MockServer) -> IonosCloudProvider {
    let mut config = ProviderConfig::default()
        .with_token("test-token")
        .with_s3_keys("access-key", "secret-key");
    for product in Product::ALL {
        config = config.with_endpoint(product, server.uri());
    }
    IonosCloudProvider::new(ServiceClients::new(&config, None).unwrap())
        .with_wait_config(WaitConfig::fixed(Duration::from_millis(10), Duration::from_secs(5)))
}

fn attributes(value: serde_json::Value) -> HashMap<String, Value> {
    match Value::from_json(&value) {
        Ok(Some(Value::Map(map))) => map,
        other => panic!("expected an object, got {:?}", other),
    }
}

fn resource(resource_type: &str, name: &str, attrs: serde_json::Value) -> Resource {
    Resource::new(resource_type, name).with_attributes(attributes(attrs))
}

fn state(resource_type: &str, name: &str, identifier: &str, attrs: serde_json::Value) -> State {
    let mut state = State::from_identifier(ResourceId::new(resource_type, name), identifier);
    state.attributes = attributes(attrs);
    state
}

async fn count_requests(server: &MockServer, verb: &str, url_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == url_path)
        .count()
}

async fn respond_to_get(server: &MockServer, url_path: String, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// =============================================================================
// DNS
// =============================================================================

fn zone_json(description: &str) -> serde_json::Value {
    json!({
        "id": ZONE_ID,
        "metadata": {"state": "AVAILABLE", "nameservers": ["ns-ic.ui-dns.com", "ns-ic.ui-dns.de"]},
        "properties": {"zoneName": "example.com", "description": description, "enabled": true}
    })
}

fn record_json(content: &str, ttl: i64) -> serde_json::Value {
    json!({
        "id": RECORD_ID,
        "metadata": {"state": "AVAILABLE", "fqdn": "www.example.com", "zoneId": ZONE_ID},
        "properties": {"name": "www", "type": "A", "content": content, "ttl": ttl, "enabled": true}
    })
}

#[tokio::test]
async fn dns_zone_update_puts_all_properties() {
    let server = MockServer::start().await;
    let zone_path = format!("/zones/{}", ZONE_ID);
    Mock::given(method("PUT"))
        .and(path(zone_path.clone()))
        .and(body_json(json!({
            "properties": {"zoneName": "example.com", "description": "public zone", "enabled": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_json("public zone")))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, zone_path, zone_json("public zone")).await;

    let current = state(
        "dns_zone",
        "main",
        ZONE_ID,
        json!({"id": ZONE_ID, "zone_name": "example.com", "description": "old", "enabled": true}),
    );
    let desired = resource(
        "dns_zone",
        "main",
        json!({"zone_name": "example.com", "description": "public zone"}),
    );

    let updated = provider_for(&server).update(&current, &desired).await.unwrap();
    assert_eq!(updated.attributes.get("description"), Some(&Value::from("public zone")));
    assert_eq!(
        updated.attributes.get("nameservers").and_then(Value::as_list).map(<[Value]>::len),
        Some(2)
    );
}

#[tokio::test]
async fn dns_record_create_sends_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/zones/{}/records", ZONE_ID)))
        .and(body_json(json!({
            "properties": {"name": "www", "type": "A", "content": "203.0.113.5", "ttl": 3600, "enabled": true}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(record_json("203.0.113.5", 3600)))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(
        &server,
        format!("/zones/{}/records/{}", ZONE_ID, RECORD_ID),
        record_json("203.0.113.5", 3600),
    )
    .await;

    let created = provider_for(&server)
        .create(&resource(
            "dns_record",
            "www",
            json!({"zone_id": ZONE_ID, "name": "www", "type": "A", "content": "203.0.113.5"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.identifier.as_deref(), Some(RECORD_ID));
    assert_eq!(created.attributes.get("fqdn"), Some(&Value::from("www.example.com")));
    assert!(!created.attributes.contains_key("location"));
}

#[tokio::test]
async fn dns_record_update_puts_changed_content() {
    let server = MockServer::start().await;
    let record_path = format!("/zones/{}/records/{}", ZONE_ID, RECORD_ID);
    Mock::given(method("PUT"))
        .and(path(record_path.clone()))
        .and(body_json(json!({
            "properties": {"name": "www", "type": "A", "content": "203.0.113.9", "ttl": 600, "enabled": true}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record_json("203.0.113.9", 600)))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, record_path, record_json("203.0.113.9", 600)).await;

    let current = state(
        "dns_record",
        "www",
        RECORD_ID,
        json!({"zone_id": ZONE_ID, "name": "www", "type": "A", "content": "203.0.113.5", "ttl": 3600}),
    );
    let desired = resource(
        "dns_record",
        "www",
        json!({"zone_id": ZONE_ID, "name": "www", "type": "A", "content": "203.0.113.9", "ttl": 600}),
    );

    let updated = provider_for(&server).update(&current, &desired).await.unwrap();
    assert_eq!(updated.attributes.get("content"), Some(&Value::from("203.0.113.9")));
    assert_eq!(updated.attributes.get("ttl"), Some(&Value::Int(600)));
}

#[tokio::test]
async fn dns_zone_delete_polls_until_gone() {
    let server = MockServer::start().await;
    let zone_path = format!("/zones/{}", ZONE_ID);
    Mock::given(method("DELETE"))
        .and(path(zone_path.clone()))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(zone_path.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_json("old")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(zone_path.clone()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let current = state("dns_zone", "main", ZONE_ID, json!({"zone_name": "example.com"}));
    provider_for(&server).delete(&current).await.unwrap();

    assert!(count_requests(&server, "GET", &zone_path).await >= 3);
}

// =============================================================================
// MariaDB
// =============================================================================

fn cluster_config(cores: i64) -> serde_json::Value {
    json!({
        "display_name": "orders-db",
        "mariadb_version": "10.11",
        "instances": 1,
        "cores": cores,
        "ram": 4,
        "storage_size": 10,
        "connection": [{"datacenter_id": DATACENTER_ID, "lan_id": "1", "cidr": "192.168.1.100/24"}],
        "credentials": [{"username": "admin", "password": "s3cret-pass"}],
        "location": "de/txl"
    })
}

fn cluster_json(cores: i64) -> serde_json::Value {
    json!({
        "id": CLUSTER_ID,
        "metadata": {"state": "AVAILABLE"},
        "properties": {
            "displayName": "orders-db",
            "mariadbVersion": "10.11",
            "instances": 1,
            "cores": cores,
            "ram": 4,
            "storageSize": 10,
            "connections": [{"datacenterId": DATACENTER_ID, "lanId": "1", "cidr": "192.168.1.100/24"}],
            "dnsName": "ma-orders.mariadb.de-txl.ionos.com"
        }
    })
}

fn cluster_state(cores: i64) -> State {
    let mut current = state("mariadb_cluster", "db", CLUSTER_ID, cluster_config(cores));
    current.attributes.insert("id".to_string(), Value::from(CLUSTER_ID));
    current
}

#[tokio::test]
async fn mariadb_update_patches_only_changed_fields() {
    let server = MockServer::start().await;
    let cluster_path = format!("/clusters/{}", CLUSTER_ID);
    Mock::given(method("PATCH"))
        .and(path(cluster_path.clone()))
        .and(body_json(json!({"properties": {"cores": 8}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(cluster_json(8)))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, cluster_path, cluster_json(8)).await;

    let updated = provider_for(&server)
        .update(&cluster_state(4), &resource("mariadb_cluster", "db", cluster_config(8)))
        .await
        .unwrap();
    assert_eq!(updated.attributes.get("cores"), Some(&Value::Int(8)));
    assert!(updated.attributes.contains_key("credentials"));
}

#[tokio::test]
async fn mariadb_update_without_changes_sends_no_patch() {
    let server = MockServer::start().await;
    let cluster_path = format!("/clusters/{}", CLUSTER_ID);
    Mock::given(method("PATCH"))
        .and(path(cluster_path.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(cluster_json(4)))
        .expect(0)
        .mount(&server)
        .await;
    respond_to_get(&server, cluster_path, cluster_json(4)).await;

    let updated = provider_for(&server)
        .update(&cluster_state(4), &resource("mariadb_cluster", "db", cluster_config(4)))
        .await
        .unwrap();
    assert_eq!(
        updated.attributes.get("dns_name"),
        Some(&Value::from("ma-orders.mariadb.de-txl.ionos.com"))
    );
}

#[tokio::test]
async fn imported_mariadb_cluster_can_be_updated_in_place() {
    let server = MockServer::start().await;
    let cluster_path = format!("/clusters/{}", CLUSTER_ID);
    Mock::given(method("PATCH"))
        .and(path(cluster_path.clone()))
        .and(body_json(json!({"properties": {"cores": 8}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(cluster_json(8)))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, cluster_path, cluster_json(4)).await;

    let provider = provider_for(&server);
    let imported = provider
        .import(
            &ResourceId::new("mariadb_cluster", "db"),
            &format!("de/txl:{}", CLUSTER_ID),
        )
        .await
        .unwrap();
    assert!(!imported.attributes.contains_key("credentials"));

    let updated = provider
        .update(&imported, &resource("mariadb_cluster", "db", cluster_config(8)))
        .await
        .unwrap();
    assert!(updated.exists);
    assert!(updated.attributes.contains_key("credentials"));
}

#[tokio::test]
async fn mariadb_backups_of_one_cluster_or_all() {
    let server = MockServer::start().await;
    let backup = json!({
        "id": "b-1",
        "properties": {
            "clusterId": CLUSTER_ID,
            "size": 2048,
            "earliestRecoveryTargetTime": "2024-05-01T00:00:00Z",
            "baseBackups": [{"created": "2024-05-01T00:00:00Z", "size": 1024}]
        }
    });
    Mock::given(method("GET"))
        .and(path(format!("/clusters/{}/backups", CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [backup.clone()]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/backups"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [backup.clone(), backup]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let one = provider
        .read_data_source(
            &resource("mariadb_backups", "one", json!({"cluster_id": CLUSTER_ID, "location": "de/txl"}))
                .with_kind(ResourceKind::Data),
        )
        .await
        .unwrap();
    let backups = one.attributes.get("backups").and_then(Value::as_list).unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        backups[0].as_map().and_then(|b| b.get("size")),
        Some(&Value::Int(2048))
    );

    let all = provider
        .read_data_source(
            &resource("mariadb_backups", "all", json!({"location": "de/txl"}))
                .with_kind(ResourceKind::Data),
        )
        .await
        .unwrap();
    assert_eq!(all.attributes.get("backups").and_then(Value::as_list).map(<[Value]>::len), Some(2));
    assert_eq!(all.identifier.as_deref(), Some("de/txl"));
}

// =============================================================================
// Logging
// =============================================================================

#[tokio::test]
async fn logging_update_patches_pipeline() {
    let server = MockServer::start().await;
    let pipeline_path = format!("/pipelines/{}", PIPELINE_ID);
    let pipeline = json!({
        "id": PIPELINE_ID,
        "metadata": {"state": "AVAILABLE"},
        "properties": {
            "name": "app-logs",
            "logs": [{
                "source": "kubernetes",
                "tag": "app",
                "protocol": "http",
                "destinations": [{"type": "loki", "retentionInDays": 7}]
            }],
            "grafanaAddress": "grafana.logging.de-txl.ionos.com",
            "httpAddress": "http.logging.de-txl.ionos.com"
        }
    });
    Mock::given(method("PATCH"))
        .and(path(pipeline_path.clone()))
        .and(body_json(json!({
            "properties": {
                "name": "app-logs",
                "logs": [{
                    "source": "kubernetes",
                    "tag": "app",
                    "protocol": "http",
                    "destinations": [{"type": "loki", "retentionInDays": 7}]
                }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(pipeline.clone()))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, pipeline_path, pipeline).await;

    let current = state(
        "logging_pipeline",
        "app",
        PIPELINE_ID,
        json!({
            "name": "app",
            "log": [{"source": "kubernetes", "tag": "app", "protocol": "http"}],
            "location": "de/txl"
        }),
    );
    let desired = resource(
        "logging_pipeline",
        "app",
        json!({
            "name": "app-logs",
            "log": [{
                "source": "kubernetes",
                "tag": "app",
                "protocol": "http",
                "destinations": [{"type": "loki", "retention_in_days": 7}]
            }],
            "location": "de/txl"
        }),
    );

    let updated = provider_for(&server).update(&current, &desired).await.unwrap();
    assert_eq!(updated.attributes.get("name"), Some(&Value::from("app-logs")));
    assert_eq!(
        updated.attributes.get("grafana_address"),
        Some(&Value::from("grafana.logging.de-txl.ionos.com"))
    );
}

// =============================================================================
// API Gateway
// =============================================================================

#[tokio::test]
async fn apigateway_update_puts_gateway() {
    let server = MockServer::start().await;
    let gateway_path = format!("/gateways/{}", GATEWAY_ID);
    let gateway = json!({
        "id": GATEWAY_ID,
        "metadata": {"status": "AVAILABLE", "publicEndpoint": "gw-1.apigateway.de-txl.ionos.com"},
        "properties": {
            "name": "public-api",
            "logs": false,
            "metrics": true,
            "customDomains": [{"name": "api.example.com"}]
        }
    });
    Mock::given(method("PUT"))
        .and(path(gateway_path.clone()))
        .and(body_json(json!({
            "properties": {
                "name": "public-api",
                "logs": false,
                "metrics": true,
                "customDomains": [{"name": "api.example.com"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gateway.clone()))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, gateway_path, gateway).await;

    let current = state(
        "apigateway",
        "api",
        GATEWAY_ID,
        json!({"name": "public-api", "logs": false, "metrics": false, "location": "de/txl"}),
    );
    let desired = resource(
        "apigateway",
        "api",
        json!({
            "name": "public-api",
            "metrics": true,
            "custom_domains": [{"name": "api.example.com"}],
            "location": "de/txl"
        }),
    );

    let updated = provider_for(&server).update(&current, &desired).await.unwrap();
    assert_eq!(updated.attributes.get("metrics"), Some(&Value::Bool(true)));
    assert_eq!(
        updated.attributes.get("public_endpoint"),
        Some(&Value::from("gw-1.apigateway.de-txl.ionos.com"))
    );
}

#[tokio::test]
async fn apigateway_route_update_fills_upstream_defaults() {
    let server = MockServer::start().await;
    let route_path = format!("/gateways/{}/routes/{}", GATEWAY_ID, ROUTE_ID);
    let properties = json!({
        "name": "users",
        "type": "http",
        "paths": ["/users"],
        "methods": ["GET", "POST"],
        "websocket": false,
        "upstreams": [{
            "scheme": "http",
            "host": "backend.example.com",
            "port": 80,
            "loadbalancer": "roundrobin",
            "weight": 100
        }]
    });
    let route = json!({"id": ROUTE_ID, "metadata": {"status": "AVAILABLE"}, "properties": properties});
    Mock::given(method("PUT"))
        .and(path(route_path.clone()))
        .and(body_json(json!({"properties": properties})))
        .respond_with(ResponseTemplate::new(200).set_body_json(route.clone()))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, route_path, route).await;

    let current = state(
        "apigateway_route",
        "users",
        ROUTE_ID,
        json!({
            "gateway_id": GATEWAY_ID,
            "name": "users",
            "paths": ["/users"],
            "methods": ["GET"],
            "upstreams": [{"host": "backend.example.com"}]
        }),
    );
    let desired = resource(
        "apigateway_route",
        "users",
        json!({
            "gateway_id": GATEWAY_ID,
            "name": "users",
            "paths": ["/users"],
            "methods": ["GET", "POST"],
            "upstreams": [{"host": "backend.example.com"}]
        }),
    );

    let updated = provider_for(&server).update(&current, &desired).await.unwrap();
    assert_eq!(
        updated.attributes.get("methods").and_then(Value::as_list).map(<[Value]>::len),
        Some(2)
    );
}

// =============================================================================
// VPN
// =============================================================================

#[tokio::test]
async fn wireguard_gateway_update_sends_private_key_and_keeps_it() {
    let server = MockServer::start().await;
    let gateway_path = format!("/wireguardgateways/{}", WG_GATEWAY_ID);
    let gateway = json!({
        "id": WG_GATEWAY_ID,
        "metadata": {"status": "AVAILABLE", "publicKey": "cHVibGljLWtleQ=="},
        "properties": {
            "name": "edge",
            "description": "office tunnel",
            "gatewayIP": "203.0.113.10",
            "connections": [{"datacenterId": DATACENTER_ID, "lanId": "1", "ipv4CIDR": "192.168.1.100/24"}],
            "listenPort": 51820
        }
    });
    Mock::given(method("PUT"))
        .and(path(gateway_path.clone()))
        .and(body_json(json!({
            "properties": {
                "name": "edge",
                "description": "office tunnel",
                "gatewayIP": "203.0.113.10",
                "connections": [{"datacenterId": DATACENTER_ID, "lanId": "1", "ipv4CIDR": "192.168.1.100/24"}],
                "privateKey": "cHJpdmF0ZS1rZXk=",
                "listenPort": 51820
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gateway.clone()))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, gateway_path, gateway).await;

    let config = json!({
        "name": "edge",
        "description": "office tunnel",
        "private_key": "cHJpdmF0ZS1rZXk=",
        "gateway_ip": "203.0.113.10",
        "connections": [{"datacenter_id": DATACENTER_ID, "lan_id": "1", "ipv4_cidr": "192.168.1.100/24"}],
        "location": "de/txl"
    });
    let mut current = state("vpn_wireguard_gateway", "edge", WG_GATEWAY_ID, config.clone());
    current.attributes.insert("description".to_string(), Value::from("old"));

    let updated = provider_for(&server)
        .update(&current, &resource("vpn_wireguard_gateway", "edge", config))
        .await
        .unwrap();
    assert_eq!(updated.attributes.get("private_key"), Some(&Value::from("cHJpdmF0ZS1rZXk=")));
    assert_eq!(updated.attributes.get("public_key"), Some(&Value::from("cHVibGljLWtleQ==")));
}

#[tokio::test]
async fn wireguard_peer_update_puts_peer() {
    let server = MockServer::start().await;
    let peer_path = format!("/wireguardgateways/{}/peers/{}", WG_GATEWAY_ID, PEER_ID);
    let peer = json!({
        "id": PEER_ID,
        "metadata": {"status": "AVAILABLE"},
        "properties": {
            "name": "laptop",
            "endpoint": {"host": "198.51.100.7", "port": 51820},
            "allowedIPs": ["10.7.0.2/32", "10.7.1.0/24"],
            "publicKey": "cGVlci1rZXk="
        }
    });
    Mock::given(method("PUT"))
        .and(path(peer_path.clone()))
        .and(body_json(json!({
            "properties": {
                "name": "laptop",
                "endpoint": {"host": "198.51.100.7", "port": 51820},
                "allowedIPs": ["10.7.0.2/32", "10.7.1.0/24"],
                "publicKey": "cGVlci1rZXk="
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(peer.clone()))
        .expect(1)
        .mount(&server)
        .await;
    respond_to_get(&server, peer_path, peer).await;

    let current = state(
        "vpn_wireguard_peer",
        "laptop",
        PEER_ID,
        json!({
            "gateway_id": WG_GATEWAY_ID,
            "name": "laptop",
            "allowed_ips": ["10.7.0.2/32"],
            "public_key": "cGVlci1rZXk=",
            "location": "de/txl"
        }),
    );
    let desired = resource(
        "vpn_wireguard_peer",
        "laptop",
        json!({
            "gateway_id": WG_GATEWAY_ID,
            "name": "laptop",
            "endpoint": [{"host": "198.51.100.7"}],
            "allowed_ips": ["10.7.0.2/32", "10.7.1.0/24"],
            "public_key": "cGVlci1rZXk=",
            "location": "de/txl"
        }),
    );

    let updated = provider_for(&server).update(&current, &desired).await.unwrap();
    assert_eq!(
        updated.attributes.get("allowed_ips").and_then(Value::as_list).map(<[Value]>::len),
        Some(2)
    );
}

// =============================================================================
// Object Storage
// =============================================================================

fn bucket_path() -> String {
    format!("/{}", BUCKET)
}

#[tokio::test]
async fn bucket_create_waits_until_visible() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    // a bucket without tags answers GetBucketTagging with 404
    Mock::given(method("GET"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let created = provider_for(&server)
        .create(&resource("s3_bucket", "artifacts", json!({"name": BUCKET})))
        .await
        .unwrap();

    assert_eq!(created.identifier.as_deref(), Some(BUCKET));
    assert_eq!(created.attributes.get("region"), Some(&Value::from("eu-central-3")));
    assert!(count_requests(&server, "HEAD", &bucket_path()).await >= 3);
}

#[tokio::test]
async fn bucket_force_destroy_empties_it_first() {
    let server = MockServer::start().await;
    let listing = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>team-artifacts</Name>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>build/1.tar.gz</Key><Size>10</Size></Contents>
  <Contents><Key>build/2.tar.gz</Key><Size>20</Size></Contents>
</ListBucketResult>"#;
    Mock::given(method("GET"))
        .and(path(bucket_path()))
        .and(query_param("list-type", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(listing, "application/xml"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<?xml version="1.0" encoding="UTF-8"?><DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"></DeleteResult>"#,
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let current = state(
        "s3_bucket",
        "artifacts",
        BUCKET,
        json!({"name": BUCKET, "force_destroy": true}),
    );
    provider_for(&server).delete(&current).await.unwrap();
}

#[tokio::test]
async fn bucket_delete_without_force_leaves_objects_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(bucket_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let current = state("s3_bucket", "artifacts", BUCKET, json!({"name": BUCKET}));
    provider_for(&server).delete(&current).await.unwrap();
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration tests against a real engine over HTTP.
//!
//! Tests use testcontainers for portability - no external docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Run all engine tests (requires Docker)
//! cargo test --test engine_http -- --ignored
//! ```

use std::collections::BTreeMap;

use serde_json::json;
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

use cloudsearch_gateway::{DocumentRequest, Gateway, GatewayConfig, RequestContext};

const ENGINE_PORT: u16 = 10041;

// =============================================================================
// Container Helpers
// =============================================================================

/// Engine in HTTP server mode. Readiness is checked by `HttpEngine::connect`.
fn engine_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("groonga/groonga", "latest")
        .with_exposed_port(ENGINE_PORT)
        .with_wait_for(WaitFor::seconds(2));
    docker.run(image)
}

async fn connect(container: &Container<'_, GenericImage>) -> Gateway {
    let config = GatewayConfig {
        engine_url: Some(format!(
            "http://127.0.0.1:{}",
            container.get_host_port_ipv4(ENGINE_PORT)
        )),
        engine_connect_retries: 10,
        ..Default::default()
    };
    Gateway::connect(config).await.expect("engine reachable")
}

fn action(name: &str, pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    params.insert("Action".into(), name.into());
    params.insert("Version".into(), "2011-02-01".into());
    params
}

// =============================================================================
// Happy Path Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_domain_lifecycle() {
    let docker = Cli::default();
    let container = engine_container(&docker);
    let gateway = connect(&container).await;

    let response = gateway
        .handle_config_action(&action("CreateDomain", &[("DomainName", "companies")]))
        .await;
    assert_eq!(response.status, 200, "{}", response.body);

    let tables: Vec<String> = gateway
        .engine()
        .table_list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert!(tables.contains(&"companies".to_string()));
    assert!(tables.contains(&"companies_BigramTerms".to_string()));

    let response = gateway
        .handle_config_action(&action("DeleteDomain", &[("DomainName", "companies")]))
        .await;
    assert_eq!(response.status, 200);
    assert!(!gateway.engine().table_exists("companies").await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_batch_then_search() {
    let docker = Cli::default();
    let container = engine_container(&docker);
    let gateway = connect(&container).await;

    gateway
        .handle_config_action(&action("CreateDomain", &[("DomainName", "companies")]))
        .await;
    for (name, field_type) in [("name", "text"), ("age", "uint")] {
        let response = gateway
            .handle_config_action(&action(
                "DefineIndexField",
                &[
                    ("DomainName", "companies"),
                    ("IndexField.IndexFieldName", name),
                    ("IndexField.IndexFieldType", field_type),
                ],
            ))
            .await;
        assert_eq!(response.status, 200, "{}", response.body);
    }

    let context = RequestContext::named("companies");
    let batch = r#"[
      {"type": "add", "id": "1", "version": 1, "lang": "en", "fields": {"name": "Hongo Tokyo", "age": 2}},
      {"type": "add", "id": "2", "version": 1, "lang": "en", "fields": {"name": "Sapporo Hokkaido", "age": 5}}
    ]"#;
    let response = gateway
        .handle_documents(&DocumentRequest::new(context.clone(), "application/json", batch))
        .await;
    assert_eq!(response.body, json!({"status": "success", "adds": 2, "deletes": 0}));

    let response = gateway.handle_search(&context, [("q", "Tokyo")]).await;
    assert_eq!(response.status, 200, "{}", response.body);
    assert_eq!(response.body["hits"]["found"], 1);
    assert_eq!(response.body["hits"]["hit"][0]["id"], "1");

    let response = gateway.handle_search(&context, [("bq", "age:3..")]).await;
    assert_eq!(response.body["hits"]["found"], 1);
    assert_eq!(response.body["hits"]["hit"][0]["id"], "2");
}

// =============================================================================
// Failure Scenarios
// =============================================================================

#[tokio::test]
async fn failure_unreachable_engine() {
    let config = GatewayConfig {
        engine_url: Some("http://127.0.0.1:1".to_string()),
        engine_timeout_ms: 200,
        engine_connect_retries: 0,
        ..Default::default()
    };
    assert!(Gateway::connect(config).await.is_err());
}

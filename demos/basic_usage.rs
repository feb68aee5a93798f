// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic gateway usage example.
//!
//! Demonstrates:
//! 1. Creating a domain and defining index fields through the configuration API
//! 2. Uploading an SDF batch (JSON) and a second one (XML)
//! 3. Running simple, boolean and faceted searches
//! 4. Displaying metrics
//!
//! Runs on the in-memory engine unless `ENGINE_URL` is set, e.g.
//!
//! ```bash
//! docker run -d -p 10041:10041 groonga/groonga
//! ENGINE_URL=http://localhost:10041 cargo run --example basic_usage
//! ```

use std::collections::BTreeMap;

use cloudsearch_gateway::{DocumentRequest, Gateway, GatewayConfig, RequestContext};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

fn action(name: &str, pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    params.insert("Action".into(), name.into());
    params.insert("Version".into(), "2011-02-01".into());
    params
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .map_err(|_| "failed to install metrics recorder")?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║         cloudsearch-gateway: Basic Usage Example              ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Domain and index fields
    // ─────────────────────────────────────────────────────────────────────────
    let config = GatewayConfig {
        engine_url: std::env::var("ENGINE_URL").ok(),
        ..Default::default()
    };
    let gateway = Gateway::connect(config).await?;

    println!("📦 Creating domain 'companies'...");
    let response = gateway
        .handle_config_action(&action("CreateDomain", &[("DomainName", "companies")]))
        .await;
    println!("   └─ {} {}", response.status, response.body["DomainStatus"]["DocService"]);

    for (name, field_type, options) in [
        ("name", "text", vec![("IndexField.TextOptions.ResultEnabled", "true")]),
        ("age", "uint", vec![]),
        ("product", "literal", vec![
            ("IndexField.LiteralOptions.SearchEnabled", "true"),
            ("IndexField.LiteralOptions.FacetEnabled", "true"),
        ]),
    ] {
        let mut pairs = vec![
            ("DomainName", "companies"),
            ("IndexField.IndexFieldName", name),
            ("IndexField.IndexFieldType", field_type),
        ];
        pairs.extend(options);
        let response = gateway.handle_config_action(&action("DefineIndexField", &pairs)).await;
        println!("   └─ {} ({}) → {}", name, field_type, response.status);
    }
    gateway
        .handle_config_action(&action(
            "UpdateDefaultSearchField",
            &[("DomainName", "companies"), ("DefaultSearchField", "name")],
        ))
        .await;

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Document batches
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Uploading documents...");
    let context = RequestContext::default().with_path("/gcs/companies/2011-02-01/documents/batch");
    let json_batch = r#"[
        {"type": "add", "id": "1", "version": 1, "lang": "en",
         "fields": {"name": "Brazil", "age": 1, "product": "groonga"}},
        {"type": "add", "id": "2", "version": 1, "lang": "en",
         "fields": {"name": "Hongo Tokyo", "age": 2, "product": "groonga"}},
        {"type": "add", "id": "3", "version": 1, "lang": "en",
         "fields": {"name": "Nakano Tokyo", "age": 3, "product": "mroonga"}}
    ]"#;
    let response = gateway
        .handle_documents(&DocumentRequest::new(context.clone(), "application/json", json_batch))
        .await;
    println!("   └─ JSON batch → {} {}", response.status, response.body);

    let xml_batch = r#"<?xml version="1.0" encoding="UTF-8"?>
<batch>
  <add id="4" version="1" lang="en">
    <field name="name">Shibuya Tokyo</field>
    <field name="age">4</field>
    <field name="product">rroonga</field>
  </add>
  <delete id="1" version="2"/>
</batch>"#;
    let response = gateway
        .handle_documents(&DocumentRequest::new(context.clone(), "application/xml", xml_batch))
        .await;
    println!("   └─ XML batch  → {} {}", response.status, response.body);

    gateway
        .handle_config_action(&action("IndexDocuments", &[("DomainName", "companies")]))
        .await;

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Searches
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Searching...");
    let search = RequestContext::named("companies");
    let queries: [&[(&str, &str)]; 4] = [
        &[("q", "Tokyo"), ("return-fields", "name")],
        &[("bq", "(and name:'Tokyo' age:3..)")],
        &[("q", "Tokyo"), ("facet", "product"), ("rank", "-age")],
        &[("bq", "(not name:'Tokyo')")],
    ];
    for pairs in queries {
        let response = gateway.handle_search(&search, pairs.iter().copied()).await;
        println!("   ├─ {:?}", pairs);
        println!("   │  └─ {} {}", response.status, response.body["hits"]);
        if let Some(facets) = response.body.get("facets") {
            println!("   │  └─ facets {}", facets);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, counters first.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        };
        match value {
            DebugValue::Counter(v) => counters.push((name, v)),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, samples.len(), sum));
            }
            DebugValue::Gauge(_) => {}
        }
    }
    counters.sort();
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    println!("   ┌─ Counters");
    for (name, value) in &counters {
        println!("   │  └─ {} = {}", name, value);
    }
    println!("   └─ Histograms");
    for (name, count, sum) in &histograms {
        println!("      └─ {} count={} sum={:.4}", name, count, sum);
    }
}

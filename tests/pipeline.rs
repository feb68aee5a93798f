// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! End-to-end tests on the in-memory engine.
//!
//! Every test builds its own [`Gateway`] so nothing is shared between them.
//!
//! # Running Tests
//! ```bash
//! cargo test --test pipeline
//! ```
//!
//! # Test Organization
//! - `config_*` - configuration API: names, fields, options
//! - `batch_*` - document batches: adds, deletes, SDF formats, rejection
//! - `search_*` - search endpoint: queries, facets, ranking
//! - `migrate_*` - field type changes

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use cloudsearch_gateway::batch::sdf;
use cloudsearch_gateway::domain::name::validate_domain_name;
use cloudsearch_gateway::engine::SelectOptions;
use cloudsearch_gateway::{
    DocumentRequest, Domain, FieldOption, FieldType, Gateway, GatewayConfig, GatewayError, RequestContext,
};

// =============================================================================
// Helpers
// =============================================================================

const TEN_COMPANIES: &str = r#"[
  {"type": "add", "id": "1", "version": 1, "lang": "en", "fields": {"name": "Brazil", "age": 1, "product": "groonga"}},
  {"type": "add", "id": "2", "version": 1, "lang": "en", "fields": {"name": "Hongo Tokyo", "age": 2, "product": "groonga"}},
  {"type": "add", "id": "3", "version": 1, "lang": "en", "fields": {"name": "Nakano Tokyo", "age": 3, "product": "mroonga"}},
  {"type": "add", "id": "4", "version": 1, "lang": "en", "fields": {"name": "Shibuya Tokyo", "age": 4, "product": "rroonga"}},
  {"type": "add", "id": "5", "version": 1, "lang": "en", "fields": {"name": "Sapporo Hokkaido", "age": 5, "product": "groonga"}},
  {"type": "add", "id": "6", "version": 1, "lang": "en", "fields": {"name": "Kyoto", "age": 6, "product": "mroonga"}},
  {"type": "add", "id": "7", "version": 1, "lang": "en", "fields": {"name": "Osaka", "age": 7, "product": "nroonga"}},
  {"type": "add", "id": "8", "version": 1, "lang": "en", "fields": {"name": "Nagoya", "age": 8, "product": "groonga"}},
  {"type": "add", "id": "9", "version": 1, "lang": "en", "fields": {"name": "Fukuoka", "age": 9, "product": "rroonga"}},
  {"type": "add", "id": "10", "version": 1, "lang": "en", "fields": {"name": "Sendai", "age": 10, "product": "mroonga"}}
]"#;

const TEN_COMPANIES_DUMP: &str = r#"load --table companies
[
["_key","age","name","product"],
["1",1,"Brazil","groonga"],
["2",2,"Hongo Tokyo","groonga"],
["3",3,"Nakano Tokyo","mroonga"],
["4",4,"Shibuya Tokyo","rroonga"],
["5",5,"Sapporo Hokkaido","groonga"],
["6",6,"Kyoto","mroonga"],
["7",7,"Osaka","nroonga"],
["8",8,"Nagoya","groonga"],
["9",9,"Fukuoka","rroonga"],
["10",10,"Sendai","mroonga"]
]"#;

fn action(name: &str, pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    params.insert("Action".into(), name.into());
    params.insert("Version".into(), "2011-02-01".into());
    params
}

fn doc_context() -> RequestContext {
    RequestContext::default().with_host("doc-companies-00000000000000000000000000.us-east-1.localhost")
}

fn search_context() -> RequestContext {
    RequestContext::default().with_path("/gcs/companies/2011-02-01/search")
}

/// Gateway with `companies` holding `name` (text), `age` (uint) and
/// `product` (literal, searchable and facetable).
async fn companies_gateway() -> Gateway {
    let gateway = Gateway::in_memory(GatewayConfig::default());
    let response = gateway
        .handle_config_action(&action("CreateDomain", &[("DomainName", "companies")]))
        .await;
    assert_eq!(response.status, 200, "{}", response.body);

    let fields: [(&str, &str, &[(&str, &str)]); 3] = [
        ("name", "text", &[("IndexField.TextOptions.ResultEnabled", "true")]),
        ("age", "uint", &[]),
        (
            "product",
            "literal",
            &[
                ("IndexField.LiteralOptions.SearchEnabled", "true"),
                ("IndexField.LiteralOptions.FacetEnabled", "true"),
            ],
        ),
    ];
    for (name, field_type, options) in fields {
        let mut pairs = vec![
            ("DomainName", "companies"),
            ("IndexField.IndexFieldName", name),
            ("IndexField.IndexFieldType", field_type),
        ];
        pairs.extend_from_slice(options);
        let response = gateway.handle_config_action(&action("DefineIndexField", &pairs)).await;
        assert_eq!(response.status, 200, "{}", response.body);
    }
    gateway
}

async fn upload(gateway: &Gateway, content_type: &str, body: &str) -> Value {
    let response = gateway
        .handle_documents(&DocumentRequest::new(doc_context(), content_type, body))
        .await;
    assert_eq!(response.status, 200, "{}", response.body);
    response.body
}

async fn dump(gateway: &Gateway) -> String {
    gateway.engine().dump(vec!["companies".into()]).await.unwrap()
}

fn companies(gateway: &Gateway) -> Arc<Domain> {
    gateway.registry().domain("companies").unwrap()
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_name_validation_aggregates_violations() {
    let err = validate_domain_name("a").unwrap_err();
    assert_eq!(err.violations.len(), 2);
    assert!(err.violations[0].contains("regular expression pattern"));
    assert!(err.violations[1].contains("greater than or equal to 3"));

    let err = validate_domain_name("ab").unwrap_err();
    assert_eq!(err.violations.len(), 1);
    assert!(err.violations[0].contains("greater than or equal to 3"));

    let err = validate_domain_name(&"a".repeat(37)).unwrap_err();
    assert_eq!(err.violations.len(), 1);
    assert!(err.violations[0].contains("less than or equal to 28"));
}

#[tokio::test]
async fn config_create_domain_with_bad_name_reports_every_violation() {
    let gateway = Gateway::in_memory(GatewayConfig::default());
    let response = gateway
        .handle_config_action(&action("CreateDomain", &[("DomainName", "a")]))
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["code"], "ValidationError");
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .starts_with("2 validation errors detected"));
}

#[tokio::test]
async fn config_create_is_idempotent_and_delete_cascades() {
    let gateway = companies_gateway().await;
    let again = gateway
        .handle_config_action(&action("CreateDomain", &[("DomainName", "companies")]))
        .await;
    assert_eq!(again.status, 200);

    let tables: Vec<String> = gateway
        .engine()
        .table_list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    for expected in [
        "companies",
        "companies_BigramTerms",
        "companies_configurations",
        "companies_index_age",
        "companies_index_product",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing {} in {:?}", expected, tables);
    }

    let response = gateway
        .handle_config_action(&action("DescribeDomains", &[]))
        .await;
    assert_eq!(response.body["DomainStatusList"].as_array().unwrap().len(), 1);

    gateway
        .handle_config_action(&action("DeleteDomain", &[("DomainName", "companies")]))
        .await;
    assert!(gateway.engine().table_list().await.unwrap().is_empty());
}

#[tokio::test]
async fn config_facet_and_result_conflict_in_any_order() {
    let gateway = companies_gateway().await;
    let domain = companies(&gateway);

    for order in [
        [FieldOption::FacetEnabled, FieldOption::ResultEnabled],
        [FieldOption::ResultEnabled, FieldOption::FacetEnabled],
    ] {
        let mut field = domain.get_index_field("product").await.unwrap();
        field.unset_option(FieldOption::FacetEnabled);
        for option in order {
            field.set_option(option, true);
        }
        match field.save().await {
            Err(GatewayError::FieldOptionConflict(message)) => assert!(message.contains("product")),
            other => panic!("expected conflict, got {:?}", other.map(|_| ())),
        }
    }

    // Nothing was written: the field keeps its original options
    let field = domain.get_index_field("product").await.unwrap();
    assert_eq!(field.option(FieldOption::FacetEnabled).await.unwrap(), json!(true));
    assert_eq!(field.option(FieldOption::ResultEnabled).await.unwrap(), json!(false));
}

#[tokio::test]
async fn config_describe_index_fields() {
    let gateway = companies_gateway().await;
    let response = gateway
        .handle_config_action(&action(
            "DescribeIndexFields",
            &[("DomainName", "companies"), ("FieldNames.member.1", "product")],
        ))
        .await;
    let fields = response.body["IndexFields"].as_array().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(
        fields[0]["Options"],
        json!({
            "IndexFieldName": "product",
            "IndexFieldType": "literal",
            "LiteralOptions": {"SearchEnabled": true, "FacetEnabled": true, "ResultEnabled": false}
        })
    );
    assert_eq!(fields[0]["Status"]["UpdateVersion"], 2);
}

// =============================================================================
// Document batches
// =============================================================================

#[tokio::test]
async fn batch_ten_adds() {
    let gateway = companies_gateway().await;
    let outcome = upload(&gateway, "application/json", TEN_COMPANIES).await;
    assert_eq!(outcome, json!({"status": "success", "adds": 10, "deletes": 0}));
    assert_eq!(dump(&gateway).await, TEN_COMPANIES_DUMP);
    assert_eq!(companies(&gateway).searchable_documents_count().await.unwrap(), 10);
}

#[tokio::test]
async fn batch_delete() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let outcome = upload(
        &gateway,
        "application/json",
        r#"[{"type": "delete", "id": "3", "version": 2}]"#,
    )
    .await;
    assert_eq!(outcome, json!({"status": "success", "adds": 0, "deletes": 1}));

    let dump = dump(&gateway).await;
    assert!(!dump.contains("Nakano Tokyo"));
    assert!(dump.contains("Hongo Tokyo"));
    assert_eq!(companies(&gateway).searchable_documents_count().await.unwrap(), 9);
}

#[tokio::test]
async fn batch_xml_and_json_are_equivalent() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<batch>
  <add id="1" version="1" lang="en">
    <field name="name">Hongo Tokyo</field>
    <field name="age">2</field>
    <field name="product">groonga</field>
  </add>
  <add id="2" version="1" lang="en">
    <field name="name">Nakano Tokyo</field>
    <field name="age">3</field>
    <field name="product">mroonga</field>
  </add>
  <delete id="3" version="2"/>
</batch>"#;
    let json = r#"[
      {"type": "add", "id": 1, "version": 1, "lang": "en", "fields": {"name": "Hongo Tokyo", "age": 2, "product": "groonga"}},
      {"type": "add", "id": 2, "version": 1, "lang": "en", "fields": {"name": "Nakano Tokyo", "age": 3, "product": "mroonga"}},
      {"type": "delete", "id": 3, "version": 2}
    ]"#;
    assert_eq!(
        sdf::decode("application/xml", xml).expect("xml batch"),
        sdf::decode("application/json", json).expect("json batch")
    );

    let from_xml = companies_gateway().await;
    let from_json = companies_gateway().await;
    let xml_outcome = upload(&from_xml, "application/xml", xml).await;
    let json_outcome = upload(&from_json, "application/json", json).await;
    assert_eq!(xml_outcome, json_outcome);
    assert_eq!(xml_outcome["warnings"], json!([{"message": "document not found: 3"}]));
    assert_eq!(dump(&from_xml).await, dump(&from_json).await);
}

#[tokio::test]
async fn batch_unknown_fields_rejected_without_writes() {
    let gateway = companies_gateway().await;
    let outcome = upload(
        &gateway,
        "application/json",
        r#"[
          {"type": "add", "id": "1", "fields": {"name": "Hongo", "nonexistent": "x"}},
          {"type": "add", "id": "2", "fields": {"other": "y", "nonexistent": "z"}}
        ]"#,
    )
    .await;
    assert_eq!(
        outcome,
        json!({
            "status": "error",
            "adds": 0,
            "deletes": 0,
            "errors": [
                {"message": "undefined field: nonexistent"},
                {"message": "undefined field: other"}
            ]
        })
    );
    assert_eq!(companies(&gateway).searchable_documents_count().await.unwrap(), 0);
}

#[tokio::test]
async fn batch_per_document_errors_do_not_abort() {
    let gateway = companies_gateway().await;
    let outcome = upload(
        &gateway,
        "application/json",
        r#"[
          {"type": "add", "id": "1", "fields": {"age": "not a number"}},
          {"type": "add", "id": "2", "fields": {"name": "Hongo", "age": 20}}
        ]"#,
    )
    .await;
    assert_eq!(outcome["status"], "error");
    assert_eq!(outcome["adds"], 1);
    assert!(outcome["errors"][0]["message"].as_str().unwrap().starts_with("1: "));
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn search_simple_query() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let response = gateway.handle_search(&search_context(), [("q", "Tokyo")]).await;
    assert_eq!(response.status, 200, "{}", response.body);
    assert_eq!(response.body["hits"]["found"], 3);
    assert_eq!(response.body["hits"]["start"], 0);
    assert_eq!(response.body["rank"], "-text_relevance");
    assert_eq!(response.body["match-expr"], "name:'Tokyo'");
    let ids: Vec<&str> = response.body["hits"]["hit"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| hit["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2", "3", "4"]);
}

#[tokio::test]
async fn search_boolean_query_with_return_fields() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let response = gateway
        .handle_search(
            &search_context(),
            [("bq", "(and name:'Tokyo' age:3..)"), ("return-fields", "name,age")],
        )
        .await;
    assert_eq!(response.body["hits"]["found"], 2);
    assert_eq!(
        response.body["hits"]["hit"][0],
        json!({"id": "3", "data": {"name": ["Nakano Tokyo"], "age": ["3"]}})
    );
}

#[tokio::test]
async fn search_facets_and_paging() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let response = gateway
        .handle_search(
            &search_context(),
            [("bq", "age:1..10"), ("facet", "product"), ("size", "2"), ("start", "1")],
        )
        .await;
    assert_eq!(response.body["hits"]["found"], 10);
    assert_eq!(response.body["hits"]["start"], 1);
    assert_eq!(response.body["hits"]["hit"].as_array().unwrap().len(), 2);
    let constraints = &response.body["facets"]["product"]["constraints"];
    assert_eq!(constraints[0], json!({"value": "groonga", "count": 4}));
}

#[tokio::test]
async fn search_rank_on_unindexed_field_omits_sort() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let response = gateway
        .handle_search(&search_context(), [("q", "Tokyo"), ("rank", "-unknown")])
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["rank"], "-unknown");
    assert_eq!(response.body["hits"]["hit"][0]["id"], "2");

    let response = gateway
        .handle_search(&search_context(), [("q", "Tokyo"), ("rank", "-age")])
        .await;
    assert_eq!(response.body["hits"]["hit"][0]["id"], "4");
}

#[tokio::test]
async fn search_untranslatable_query_matches_nothing() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let response = gateway
        .handle_search(&search_context(), [("bq", "(not name:'Tokyo')")])
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["hits"]["found"], 0);
    assert_eq!(response.body["match-expr"], "(not name:'Tokyo')");
}

#[tokio::test]
async fn search_with_synonyms() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;
    let response = gateway
        .handle_config_action(&action(
            "UpdateSynonymOptions",
            &[("DomainName", "companies"), ("Synonyms", r#"{"synonyms": {"capital": ["Tokyo"]}}"#)],
        ))
        .await;
    assert_eq!(response.status, 200, "{}", response.body);

    let response = gateway.handle_search(&search_context(), [("q", "capital")]).await;
    assert_eq!(response.body["hits"]["found"], 3);
}

#[tokio::test]
async fn search_unknown_domain_uses_error_envelope() {
    let gateway = Gateway::in_memory(GatewayConfig::default());
    let response = gateway.handle_search(&search_context(), [("q", "Tokyo")]).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], "info");
    assert_eq!(response.body["messages"][0]["severity"], "fatal");
    assert!(response.body.get("rid").is_some());
}

// =============================================================================
// Migration
// =============================================================================

async fn values_of(domain: &Domain, field: &str) -> Vec<Value> {
    let reply = domain
        .engine()
        .select(SelectOptions::all(domain.table_name(), &["_key", field]))
        .await
        .unwrap();
    reply.records.rows.into_iter().map(|row| row[1].clone()).collect()
}

#[tokio::test]
async fn migrate_text_to_uint_and_back() {
    let gateway = Gateway::in_memory(GatewayConfig::default());
    let domain = companies(&gateway);
    domain.create().await.unwrap();
    domain.index_field("code", FieldType::Text).create().await.unwrap();
    let outcome = upload(
        &gateway,
        "application/json",
        r#"[
          {"type": "add", "id": "1", "fields": {"code": "12"}},
          {"type": "add", "id": "2", "fields": {"code": "abc"}}
        ]"#,
    )
    .await;
    assert_eq!(outcome["adds"], 2);

    let mut field = domain.get_index_field("code").await.unwrap();
    field.change_type(FieldType::UInt).await.unwrap();
    assert_eq!(values_of(&domain, "code").await, vec![json!(12), json!(0)]);
    assert_eq!(domain.get_index_field("code").await.unwrap().field_type(), FieldType::UInt);

    field.change_type(FieldType::Text).await.unwrap();
    assert_eq!(values_of(&domain, "code").await, vec![json!("12"), json!("0")]);
}

#[tokio::test]
async fn migrate_via_define_index_field_keeps_documents() {
    let gateway = companies_gateway().await;
    upload(&gateway, "application/json", TEN_COMPANIES).await;

    let response = gateway
        .handle_config_action(&action(
            "DefineIndexField",
            &[
                ("DomainName", "companies"),
                ("IndexField.IndexFieldName", "age"),
                ("IndexField.IndexFieldType", "text"),
            ],
        ))
        .await;
    assert_eq!(response.status, 200, "{}", response.body);
    assert_eq!(response.body["IndexField"]["Options"]["IndexFieldType"], "text");

    let response = gateway.handle_search(&search_context(), [("bq", "age:'10'")]).await;
    assert_eq!(response.body["hits"]["found"], 1);
}

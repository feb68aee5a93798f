// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for the gateway's parsers and validators.
//!
//! Uses proptest to generate random/malformed inputs and verify nothing
//! panics, only returns clean errors.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use cloudsearch_gateway::batch::sdf;
use cloudsearch_gateway::domain::name::{domain_id, validate_domain_name, validate_field_name};
use cloudsearch_gateway::search::{boolean, quote_bq, simple, Query};
use cloudsearch_gateway::{BatchRecord, DocumentId, FieldOption, FieldOptions, FieldType};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn valid_domain_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,27}"
}

/// Fragments of the boolean query language glued together at random.
fn bq_fragment_strategy() -> impl Strategy<Value = String> {
    let token = prop_oneof![
        Just("(".to_string()),
        Just(")".to_string()),
        Just("and ".to_string()),
        Just("or ".to_string()),
        Just("not ".to_string()),
        Just("name:".to_string()),
        Just("age:".to_string()),
        Just("..".to_string()),
        Just("'".to_string()),
        Just("\\".to_string()),
        Just(" ".to_string()),
        "[0-9]{1,5}",
        "[a-z]{1,6}",
    ];
    prop::collection::vec(token, 0..30).prop_map(|parts| parts.concat())
}

// =============================================================================
// Name Validation
// =============================================================================

proptest! {
    /// Names matching the pattern within length bounds are always accepted
    #[test]
    fn prop_valid_domain_names_accepted(name in valid_domain_name_strategy()) {
        prop_assert!(validate_domain_name(&name).is_ok());
    }

    /// Arbitrary input is either accepted or reported with at least one violation
    #[test]
    fn fuzz_domain_name_validation(name in ".*") {
        if let Err(e) = validate_domain_name(&name) {
            prop_assert!(!e.violations.is_empty());
            prop_assert!(e.violations.len() <= 3);
        }
    }

    /// Uppercase or underscore never passes domain validation
    #[test]
    fn prop_domain_name_rejects_upper_and_underscore(
        head in "[a-z]{1,10}",
        bad in "[A-Z_]",
        tail in "[a-z]{1,10}",
    ) {
        let name = format!("{}{}{}", head, bad, tail);
        prop_assert!(validate_domain_name(&name).is_err());
    }

    /// Field names never panic the validator
    #[test]
    fn fuzz_field_name_validation(name in ".*") {
        let _ = validate_field_name(&name);
    }

    /// Domain ids are stable and 26 lowercase hex digits
    #[test]
    fn prop_domain_id_shape(name in valid_domain_name_strategy()) {
        let id = domain_id(&name);
        prop_assert_eq!(id.len(), 26);
        prop_assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        prop_assert_eq!(id, domain_id(&name));
    }
}

// =============================================================================
// Query Translators
// =============================================================================

proptest! {
    /// The boolean parser never panics on arbitrary text
    #[test]
    fn fuzz_boolean_parse_arbitrary(input in ".*") {
        let _ = boolean::parse(&input);
    }

    /// The boolean parser never panics on near-grammatical input
    #[test]
    fn fuzz_boolean_parse_fragments(input in bq_fragment_strategy()) {
        if let Ok(query) = boolean::parse(&input) {
            // Anything accepted re-parses from its rendered form
            let rendered = query.to_string();
            prop_assert_eq!(boolean::parse(&rendered).ok(), Some(query));
        }
    }

    /// Quoting any text yields a literal the parser reads back unchanged
    #[test]
    fn prop_quoted_literal_roundtrip(text in "[ -~]{0,40}") {
        let query = boolean::parse(&format!("name:{}", quote_bq(&text)));
        prop_assert_eq!(query.ok(), Some(Query::field_text("name", text.as_str())));
    }

    /// Simple-query terms never contain separators and are never empty
    #[test]
    fn prop_simple_terms_clean(q in ".*") {
        for term in simple::terms(&q) {
            prop_assert!(!term.is_empty());
            prop_assert!(!term.chars().any(|c| c.is_whitespace() || matches!(c, '+' | '-' | '|')));
        }
    }

    /// A simple query with terms and a default field always translates
    #[test]
    fn prop_simple_translate_with_field(q in "[a-z]{1,8}( [a-z]{1,8}){0,4}") {
        let translated = simple::translate(&q, &["name".to_string()]);
        prop_assert!(matches!(translated, Ok(Some(_))));
    }
}

// =============================================================================
// SDF Decoding
// =============================================================================

proptest! {
    /// JSON SDF decoding never panics on arbitrary bytes
    #[test]
    fn fuzz_sdf_json_random(body in ".*") {
        let _ = sdf::decode_json(&body);
    }

    /// XML SDF decoding never panics on arbitrary text
    #[test]
    fn fuzz_sdf_xml_random(body in ".*") {
        let _ = sdf::decode_xml(&body);
    }

    /// Numeric id text is always coerced to a number
    #[test]
    fn prop_numeric_id_coerced(id in any::<u32>()) {
        let body = json!([{"type": "delete", "id": id.to_string()}]).to_string();
        let records = sdf::decode_json(&body).unwrap();
        prop_assert_eq!(records[0].id(), &DocumentId::Number(u64::from(id)));
    }

    /// XML and JSON encodings of one add decode to the same record, field whitespace included
    #[test]
    fn prop_xml_json_equivalence(id in 1u32..100_000, name in "[a-zA-Z ]{1,20}") {
        let xml = format!(
            "<batch>\n  <add id=\"{}\" version=\"1\" lang=\"en\">\n    <field name=\"name\">{}</field>\n  </add>\n</batch>",
            id, name
        );
        let json = json!([{
            "type": "add", "id": id, "version": 1, "lang": "en",
            "fields": {"name": name}
        }])
        .to_string();
        prop_assert_eq!(sdf::decode_xml(&xml).unwrap(), sdf::decode_json(&json).unwrap());
    }
}

// =============================================================================
// Field Options
// =============================================================================

proptest! {
    /// facet+result together is rejected whatever the order of application
    #[test]
    fn prop_facet_result_conflict_any_order(facet_first in any::<bool>(), literal in any::<bool>()) {
        let field_type = if literal { FieldType::Literal } else { FieldType::Text };
        let order = if facet_first {
            [FieldOption::FacetEnabled, FieldOption::ResultEnabled]
        } else {
            [FieldOption::ResultEnabled, FieldOption::FacetEnabled]
        };
        let mut options = FieldOptions::defaults(field_type);
        for option in order {
            options.apply("f", option, &Value::Bool(true)).unwrap();
        }
        prop_assert!(options.check_conflicts("f").is_err());

        let values: BTreeMap<FieldOption, Value> = order.iter().map(|o| (*o, Value::Bool(true))).collect();
        prop_assert!(FieldOptions::from_values("f", field_type, &values).is_err());
    }

    /// Batch records survive a JSON round trip through the SDF decoder
    #[test]
    fn prop_add_record_reencodes(id in 1u64..1_000_000, age in any::<u32>()) {
        let mut fields = BTreeMap::new();
        fields.insert("age".to_string(), json!(age));
        let record = BatchRecord::add(id, fields);
        let body = serde_json::to_string(&vec![record.clone()]).unwrap();
        prop_assert_eq!(sdf::decode_json(&body).unwrap(), vec![record]);
    }
}

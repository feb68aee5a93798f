// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search request to engine `select` options.

use tracing::debug;

use super::boolean;
use super::query::{Query, QueryNode, Untranslatable};
use super::simple;
use super::translator::FilterTranslator;
use crate::domain::{DomainSchema, SYNONYMS_COLUMN, SYNONYMS_TABLE_SUFFIX};
use crate::engine::{SelectOptions, KEY_COLUMN, NSUBRECS_COLUMN};
use crate::error::{GatewayError, Result};
use crate::metrics;

pub const DEFAULT_RANK: &str = "-text_relevance";

/// Filter matching no record, used for queries the engine cannot express.
pub const MATCH_NOTHING: &str = "_id == 0";

/// Search request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub q: Option<String>,
    pub bq: Option<String>,
    pub size: Option<usize>,
    pub start: Option<usize>,
    pub return_fields: Vec<String>,
    pub facets: Vec<String>,
    pub rank: Option<String>,
}

fn comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `size`/`start`. Counts must fit the engine's signed 64-bit integers.
fn parse_count(name: &str, value: &str) -> Result<usize> {
    let invalid = || {
        GatewayError::validation(format!(
            "Value '{}' at '{}' failed to satisfy constraint: Member must be a non-negative integer no greater than {}",
            value,
            name,
            i64::MAX
        ))
    };
    let count: u64 = value.trim().parse().map_err(|_| invalid())?;
    i64::try_from(count)
        .ok()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(invalid)
}

impl SearchParams {
    /// Build from query-string pairs. Unknown parameters are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut params = SearchParams::default();
        for (key, value) in pairs {
            match key {
                "q" => params.q = Some(value.to_string()),
                "bq" => params.bq = Some(value.to_string()),
                "size" => params.size = Some(parse_count(key, value)?),
                "start" => params.start = Some(parse_count(key, value)?),
                "return-fields" => params.return_fields = comma_list(value),
                "facet" => params.facets = comma_list(value),
                "rank" => params.rank = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn query(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Default::default()
        }
    }
}

/// Everything needed to run a search and format its response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub options: SelectOptions,
    /// Boolean-query form of the combined `q` and `bq`.
    pub match_expr: String,
    pub rank: String,
    pub untranslatable: bool,
    pub return_fields: Vec<String>,
    pub facets: Vec<String>,
    pub start: usize,
}

pub struct SearchQueryCompiler<'a> {
    schema: &'a DomainSchema,
    default_size: usize,
}

impl<'a> SearchQueryCompiler<'a> {
    pub fn new(schema: &'a DomainSchema, default_size: usize) -> Self {
        Self { schema, default_size }
    }

    /// Parse `q` and `bq` into one query. `Ok(None)` means "everything".
    fn query(&self, params: &SearchParams) -> Result<Option<Query>, (&'static str, Untranslatable)> {
        let mut clauses = Vec::new();
        if let Some(ref q) = params.q {
            if let Some(query) = simple::translate(q, &self.schema.default_fields()).map_err(|e| ("q", e))? {
                clauses.push(query.root);
            }
        }
        if let Some(bq) = params.bq.as_deref().map(str::trim).filter(|bq| !bq.is_empty()) {
            clauses.push(boolean::parse(bq).map_err(|e| ("bq", e))?.root);
        }
        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop().map(Query::new),
            _ => Some(Query::new(QueryNode::And(clauses))),
        })
    }

    fn match_expr(params: &SearchParams, query: Option<&Query>) -> String {
        match query {
            Some(query) => query.to_string(),
            None => params.bq.clone().or_else(|| params.q.clone()).unwrap_or_default(),
        }
    }

    /// Sort keys for `rank`, keeping only those naming existing fields.
    fn sortby(&self, rank: &str) -> Option<String> {
        let keys: Vec<&str> = rank
            .split(',')
            .map(str::trim)
            .filter(|key| self.schema.field(key.trim_start_matches('-')).is_some())
            .collect();
        if keys.is_empty() {
            None
        } else {
            Some(keys.join(","))
        }
    }

    pub fn compile(&self, params: &SearchParams) -> CompiledSearch {
        let table = self.schema.domain.clone();
        let mut options = SelectOptions::new(&table);

        let (filter, match_expr, untranslatable) = match self.query(params) {
            Ok(None) => (None, Self::match_expr(params, None), false),
            Ok(Some(query)) => {
                let expr = Self::match_expr(params, Some(&query));
                match FilterTranslator::new(self.schema).translate(&query) {
                    Ok(filter) => (Some(filter), expr, false),
                    Err(e) => {
                        metrics::record_untranslatable_query("filter");
                        debug!(domain = %table, reason = %e, "Query not translatable");
                        (Some(MATCH_NOTHING.to_string()), expr, true)
                    }
                }
            }
            Err((kind, e)) => {
                metrics::record_untranslatable_query(kind);
                debug!(domain = %table, kind, reason = %e, "Query not translatable");
                (Some(MATCH_NOTHING.to_string()), Self::match_expr(params, None), true)
            }
        };
        options.filter = filter;

        let return_fields: Vec<String> = params
            .return_fields
            .iter()
            .filter(|name| self.schema.field(name).is_some_and(|f| f.options.result_enabled()))
            .cloned()
            .collect();
        options.output_columns = std::iter::once(KEY_COLUMN.to_string())
            .chain(return_fields.iter().cloned())
            .collect();

        let facets: Vec<String> = params
            .facets
            .iter()
            .filter(|name| self.schema.field(name).is_some_and(|f| f.options.facet_enabled()))
            .cloned()
            .collect();
        if !facets.is_empty() {
            options.drilldown = facets.clone();
            options.drilldown_sortby = Some(format!("-{}", NSUBRECS_COLUMN));
            options.drilldown_output_columns = vec![KEY_COLUMN.to_string(), NSUBRECS_COLUMN.to_string()];
        }

        let rank = params.rank.clone().unwrap_or_else(|| DEFAULT_RANK.to_string());
        options.sortby = self.sortby(&rank);

        let start = params.start.unwrap_or(0);
        options.offset = start;
        options.limit = i64::try_from(params.size.unwrap_or(self.default_size)).unwrap_or(i64::MAX);

        if self.schema.has_synonyms {
            options.query_expansion = Some(format!(
                "{}{}.{}",
                self.schema.domain, SYNONYMS_TABLE_SUFFIX, SYNONYMS_COLUMN
            ));
        }

        CompiledSearch {
            options,
            match_expr,
            rank,
            untranslatable,
            return_fields,
            facets,
            start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldSchema;
    use crate::field::{FieldOption, FieldOptions, FieldType};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn field(name: &str, field_type: FieldType, enable: &[FieldOption]) -> (String, FieldSchema) {
        let mut options = FieldOptions::defaults(field_type);
        for option in enable {
            options.apply(name, *option, &json!(true)).unwrap();
        }
        (
            name.to_string(),
            FieldSchema {
                name: name.to_string(),
                field_type,
                multiple_values: false,
                options,
            },
        )
    }

    fn schema() -> DomainSchema {
        let fields: BTreeMap<_, _> = [
            field("name", FieldType::Text, &[FieldOption::ResultEnabled]),
            field("address", FieldType::Text, &[]),
            field("age", FieldType::UInt, &[]),
            field("product", FieldType::Literal, &[FieldOption::SearchEnabled, FieldOption::FacetEnabled]),
        ]
        .into_iter()
        .collect();
        DomainSchema {
            domain: "companies".into(),
            fields,
            default_search_field: Some("name".into()),
            has_synonyms: false,
        }
    }

    #[test]
    fn test_simple_query() {
        let schema = schema();
        let compiled = SearchQueryCompiler::new(&schema, 10).compile(&SearchParams::query("Tokyo"));
        assert_eq!(compiled.options.filter.as_deref(), Some(r#"name @ "Tokyo""#));
        assert_eq!(compiled.match_expr, "name:'Tokyo'");
        assert_eq!(compiled.options.output_columns, vec!["_key"]);
        assert_eq!((compiled.options.offset, compiled.options.limit), (0, 10));
        assert_eq!(compiled.rank, DEFAULT_RANK);
        assert_eq!(compiled.options.sortby, None);
        assert_eq!(compiled.options.query_expansion, None);
    }

    #[test]
    fn test_q_and_bq_are_anded() {
        let schema = schema();
        let params = SearchParams {
            q: Some("tokyo".into()),
            bq: Some("age:20..".into()),
            ..Default::default()
        };
        let compiled = SearchQueryCompiler::new(&schema, 10).compile(&params);
        assert_eq!(compiled.options.filter.as_deref(), Some(r#"(name @ "tokyo" && age >= 20)"#));
    }

    #[test]
    fn test_untranslatable_matches_nothing() {
        let schema = schema();
        let params = SearchParams {
            bq: Some("(not name:'x')".into()),
            ..Default::default()
        };
        let compiled = SearchQueryCompiler::new(&schema, 10).compile(&params);
        assert!(compiled.untranslatable);
        assert_eq!(compiled.options.filter.as_deref(), Some(MATCH_NOTHING));
        assert_eq!(compiled.match_expr, "(not name:'x')");
    }

    #[test]
    fn test_unindexed_rank_omits_sortby() {
        let schema = schema();
        let mut params = SearchParams::query("tokyo");
        params.rank = Some("-unknown".into());
        assert_eq!(SearchQueryCompiler::new(&schema, 10).compile(&params).options.sortby, None);

        params.rank = Some("-age".into());
        assert_eq!(
            SearchQueryCompiler::new(&schema, 10).compile(&params).options.sortby.as_deref(),
            Some("-age")
        );
    }

    #[test]
    fn test_return_fields_and_facets_are_partitioned() {
        let schema = schema();
        let params = SearchParams::from_pairs([
            ("q", "tokyo"),
            ("return-fields", "name,address,missing"),
            ("facet", "product,name"),
            ("size", "5"),
            ("start", "2"),
        ])
        .unwrap();
        let compiled = SearchQueryCompiler::new(&schema, 10).compile(&params);
        assert_eq!(compiled.options.output_columns, vec!["_key", "name"]);
        assert_eq!(compiled.options.drilldown, vec!["product"]);
        assert_eq!(compiled.options.drilldown_sortby.as_deref(), Some("-_nsubrecs"));
        assert_eq!(compiled.options.drilldown_output_columns, vec!["_key", "_nsubrecs"]);
        assert_eq!((compiled.options.offset, compiled.options.limit), (2, 5));
    }

    #[test]
    fn test_synonyms_enable_query_expansion() {
        let mut schema = schema();
        schema.has_synonyms = true;
        let compiled = SearchQueryCompiler::new(&schema, 10).compile(&SearchParams::query("tokyo"));
        assert_eq!(compiled.options.query_expansion.as_deref(), Some("companies_synonyms.synonyms"));
    }

    #[test]
    fn test_invalid_size() {
        assert!(SearchParams::from_pairs([("size", "-1")]).is_err());
    }

    #[test]
    fn test_counts_beyond_signed_range_are_rejected() {
        let max = i64::MAX.to_string();
        let params = SearchParams::from_pairs([("size", max.as_str()), ("start", max.as_str())]).unwrap();
        let compiled = SearchQueryCompiler::new(&schema(), 10).compile(&params);
        assert_eq!(compiled.options.limit, i64::MAX);

        let over = (i64::MAX as u64 + 1).to_string();
        for key in ["size", "start"] {
            let err = SearchParams::from_pairs([(key, over.as_str())]).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
        assert!(SearchParams::from_pairs([("size", u64::MAX.to_string().as_str())]).is_err());
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `q` translation.
//!
//! Only bare terms are understood. `+`, `-` and `|` separate terms and carry
//! no operator meaning.

use super::query::{FieldQuery, Query, QueryNode, QueryValue, Untranslatable};

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '+' | '-' | '|')
}

pub fn terms(q: &str) -> Vec<&str> {
    q.split(is_separator).filter(|t| !t.is_empty()).collect()
}

/// Every term must match one of `default_fields`.
///
/// Returns `Ok(None)` for a query with no terms.
pub fn translate(q: &str, default_fields: &[String]) -> Result<Option<Query>, Untranslatable> {
    let terms = terms(q);
    if terms.is_empty() {
        return Ok(None);
    }
    if default_fields.is_empty() {
        return Err(Untranslatable::new("no default search field"));
    }

    let mut clauses: Vec<QueryNode> = terms
        .iter()
        .map(|term| {
            let mut alternatives: Vec<QueryNode> = default_fields
                .iter()
                .map(|field| {
                    QueryNode::Field(FieldQuery {
                        field: field.clone(),
                        value: QueryValue::Text(term.to_string()),
                    })
                })
                .collect();
            if alternatives.len() == 1 {
                alternatives.remove(0)
            } else {
                QueryNode::Or(alternatives)
            }
        })
        .collect();

    let root = if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        QueryNode::And(clauses)
    };
    Ok(Some(Query::new(root)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_separators() {
        assert_eq!(terms("hongo +tokyo -groonga|mroonga  "), vec!["hongo", "tokyo", "groonga", "mroonga"]);
    }

    #[test]
    fn test_single_term_single_field() {
        let query = translate("Tokyo", &fields(&["name"])).unwrap().unwrap();
        assert_eq!(query.to_string(), "name:'Tokyo'");
    }

    #[test]
    fn test_terms_anded_fields_ored() {
        let query = translate("hongo tokyo", &fields(&["address", "name"])).unwrap().unwrap();
        assert_eq!(
            query.to_string(),
            "(and (or address:'hongo' name:'hongo') (or address:'tokyo' name:'tokyo'))"
        );
    }

    #[test]
    fn test_empty_and_fieldless() {
        assert_eq!(translate("  + ", &fields(&["name"])).unwrap(), None);
        assert!(translate("tokyo", &[]).is_err());
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query AST to engine filter script.
//!
//! ```text
//! name:'tokyo'          (text)     name @ "tokyo"
//! product:'groonga'     (literal)  product == "groonga"
//! age:10..20            (uint)     (age >= 10 && age <= 20)
//! (and a b)                        (a && b)
//! (or a b)                         (a || b)
//! 'tokyo'                          default fields, ORed
//! ```

use super::query::{FieldQuery, Query, QueryNode, QueryValue, Untranslatable};
use crate::domain::{DomainSchema, FieldSchema};
use crate::engine::quote_literal;
use crate::field::FieldType;

pub struct FilterTranslator<'a> {
    schema: &'a DomainSchema,
}

impl<'a> FilterTranslator<'a> {
    pub fn new(schema: &'a DomainSchema) -> Self {
        Self { schema }
    }

    pub fn translate(&self, query: &Query) -> Result<String, Untranslatable> {
        self.translate_node(&query.root)
    }

    fn translate_node(&self, node: &QueryNode) -> Result<String, Untranslatable> {
        match node {
            QueryNode::Phrase(text) => {
                let fields = self.schema.default_fields();
                if fields.is_empty() {
                    return Err(Untranslatable::new("no default search field"));
                }
                let parts = fields
                    .iter()
                    .map(|field| {
                        self.translate_field(&FieldQuery {
                            field: field.clone(),
                            value: QueryValue::Text(text.clone()),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::join(parts, " || "))
            }
            QueryNode::Field(field) => self.translate_field(field),
            QueryNode::And(nodes) => Ok(Self::join(self.translate_all(nodes)?, " && ")),
            QueryNode::Or(nodes) => Ok(Self::join(self.translate_all(nodes)?, " || ")),
        }
    }

    fn translate_all(&self, nodes: &[QueryNode]) -> Result<Vec<String>, Untranslatable> {
        nodes.iter().map(|node| self.translate_node(node)).collect()
    }

    fn join(mut parts: Vec<String>, separator: &str) -> String {
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            format!("({})", parts.join(separator))
        }
    }

    fn field(&self, name: &str) -> Result<&FieldSchema, Untranslatable> {
        self.schema
            .field(name)
            .ok_or_else(|| Untranslatable::new(format!("unknown field: {}", name)))
    }

    fn translate_field(&self, query: &FieldQuery) -> Result<String, Untranslatable> {
        let field = self.field(&query.field)?;
        let name = &field.name;
        match (field.field_type, &query.value) {
            (FieldType::Text, QueryValue::Text(text)) => Ok(format!("{} @ {}", name, quote_literal(text))),
            (FieldType::Text, QueryValue::Number(n)) => Ok(format!("{} @ {}", name, quote_literal(&n.to_string()))),
            (FieldType::Literal, _) if !field.options.search_enabled() => {
                Err(Untranslatable::new(format!("field is not searchable: {}", name)))
            }
            (FieldType::Literal, QueryValue::Text(text)) => Ok(format!("{} == {}", name, quote_literal(text))),
            (FieldType::Literal, QueryValue::Number(n)) => {
                Ok(format!("{} == {}", name, quote_literal(&n.to_string())))
            }
            (FieldType::UInt, QueryValue::Number(n)) => Ok(format!("{} == {}", name, n)),
            (FieldType::UInt, QueryValue::Text(text)) => match text.trim().parse::<u32>() {
                Ok(n) => Ok(format!("{} == {}", name, n)),
                Err(_) => Err(Untranslatable::new(format!("not a uint value for {}: {}", name, text))),
            },
            (FieldType::UInt, QueryValue::Range { min, max }) => Ok(match (min, max) {
                (Some(min), Some(max)) => format!("({} >= {} && {} <= {})", name, min, name, max),
                (Some(min), None) => format!("{} >= {}", name, min),
                (None, Some(max)) => format!("{} <= {}", name, max),
                (None, None) => return Err(Untranslatable::new("unbounded range")),
            }),
            (_, QueryValue::Range { .. }) => Err(Untranslatable::new(format!("range on non-uint field: {}", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldSchema;
    use crate::field::{FieldOption, FieldOptions};
    use crate::search::boolean;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn schema() -> DomainSchema {
        let mut fields = BTreeMap::new();
        let mut add = |name: &str, field_type: FieldType, options: FieldOptions| {
            fields.insert(
                name.to_string(),
                FieldSchema {
                    name: name.to_string(),
                    field_type,
                    multiple_values: false,
                    options,
                },
            );
        };
        add("name", FieldType::Text, FieldOptions::defaults(FieldType::Text));
        add("address", FieldType::Text, FieldOptions::defaults(FieldType::Text));
        add("age", FieldType::UInt, FieldOptions::defaults(FieldType::UInt));
        let mut product = FieldOptions::defaults(FieldType::Literal);
        product
            .apply("product", FieldOption::SearchEnabled, &json!(true))
            .unwrap();
        add("product", FieldType::Literal, product);
        add("hidden", FieldType::Literal, FieldOptions::defaults(FieldType::Literal));
        DomainSchema {
            domain: "companies".into(),
            fields,
            default_search_field: None,
            has_synonyms: false,
        }
    }

    fn translate(bq: &str) -> Result<String, Untranslatable> {
        let schema = schema();
        FilterTranslator::new(&schema).translate(&boolean::parse(bq)?)
    }

    #[test]
    fn test_field_types() {
        assert_eq!(translate("name:'tokyo'").unwrap(), r#"name @ "tokyo""#);
        assert_eq!(translate("product:'groonga'").unwrap(), r#"product == "groonga""#);
        assert_eq!(translate("age:10..20").unwrap(), "(age >= 10 && age <= 20)");
        assert_eq!(translate("age:..20").unwrap(), "age <= 20");
        assert_eq!(translate("age:'32'").unwrap(), "age == 32");
    }

    #[test]
    fn test_phrase_uses_default_fields() {
        assert_eq!(
            translate("(and 'tokyo' product:'groonga')").unwrap(),
            r#"((address @ "tokyo" || name @ "tokyo") && product == "groonga")"#
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(translate(r"name:'say \'hi\''").unwrap(), r#"name @ "say 'hi'""#);
        assert_eq!(translate(r#"name:'a"b'"#).unwrap(), r#"name @ "a\"b""#);
    }

    #[test]
    fn test_untranslatable_fields() {
        assert!(translate("missing:'x'").is_err());
        assert!(translate("hidden:'x'").is_err());
        assert!(translate("name:1..2").is_err());
        assert!(translate("age:'old'").is_err());
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Naming rules for domains and index fields.
//!
//! Every violated constraint is reported, in the order pattern, too short,
//! too long, so a caller sees all problems with a name at once.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

pub const DOMAIN_NAME_MIN: usize = 3;
pub const DOMAIN_NAME_MAX: usize = 28;
pub const FIELD_NAME_MIN: usize = 1;
pub const FIELD_NAME_MAX: usize = 64;

/// Field names the search API uses for its own purposes.
pub const RESERVED_FIELD_NAMES: &[&str] = &["body", "docid", "text_relevance"];

static DOMAIN_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9\-]+$").expect("valid domain name pattern"));

static FIELD_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid field name pattern"));

struct NameRule<'a> {
    member: &'a str,
    pattern: &'a Regex,
    pattern_text: &'a str,
    min: usize,
    max: usize,
}

impl NameRule<'_> {
    fn check(&self, value: &str) -> Result<(), ValidationError> {
        let prefix = format!("Value '{}' at '{}' failed to satisfy constraint: Member must", value, self.member);
        let mut violations = Vec::new();
        if !self.pattern.is_match(value) {
            violations.push(format!(
                "{} satisfy regular expression pattern: {}",
                prefix, self.pattern_text
            ));
        }
        let length = value.chars().count();
        if length < self.min {
            violations.push(format!("{} have length greater than or equal to {}", prefix, self.min));
        }
        if length > self.max {
            violations.push(format!("{} have length less than or equal to {}", prefix, self.max));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

pub fn validate_domain_name(name: &str) -> Result<(), ValidationError> {
    NameRule {
        member: "domainName",
        pattern: &DOMAIN_NAME_PATTERN,
        pattern_text: r"[a-z][a-z0-9\-]+",
        min: DOMAIN_NAME_MIN,
        max: DOMAIN_NAME_MAX,
    }
    .check(name)
}

pub fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    NameRule {
        member: "indexField.indexFieldName",
        pattern: &FIELD_NAME_PATTERN,
        pattern_text: "[a-z][a-z0-9_]*",
        min: FIELD_NAME_MIN,
        max: FIELD_NAME_MAX,
    }
    .check(name)
}

pub fn is_reserved_field_name(name: &str) -> bool {
    RESERVED_FIELD_NAMES.contains(&name)
}

/// Opaque domain id: the first 26 hex digits of SHA-256 over the name.
pub fn domain_id(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(26);
    id
}

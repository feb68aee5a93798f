// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration API (`Action=...` requests).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::types::{ApiError, ApiResponse, OptionState};
use super::Gateway;
use crate::domain::name::validate_field_name;
use crate::domain::Domain;
use crate::error::GatewayError;
use crate::field::{FieldOption, FieldOptions, FieldType, OptionRule};
use crate::metrics;

type Params = BTreeMap<String, String>;
type ActionResult = std::result::Result<Value, ApiError>;

fn required<'p>(params: &'p Params, name: &str) -> std::result::Result<&'p str, ApiError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ApiError::missing_parameter(name))
}

/// Values of `<prefix>.member.N` parameters, ordered by `N`.
fn members(params: &Params, prefix: &str) -> Vec<String> {
    let key_prefix = format!("{}.member.", prefix);
    let mut indexed: Vec<(u32, String)> = params
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(&key_prefix)?.parse().ok()?;
            Some((index, value.clone()))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}

fn options_prefix(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "IndexField.TextOptions.",
        FieldType::UInt => "IndexField.UIntOptions.",
        FieldType::Literal => "IndexField.LiteralOptions.",
    }
}

#[derive(Debug, Default, Deserialize)]
struct SynonymOptions {
    #[serde(default)]
    synonyms: BTreeMap<String, Vec<String>>,
}

impl Gateway {
    /// Dispatch one configuration API request.
    ///
    /// `Action` and `Version` are mandatory and `Version` must equal the
    /// configured API version. Failures come back as `{code, message}` with a
    /// 4xx status.
    pub async fn handle_config_action(&self, params: &Params) -> ApiResponse {
        let Some(action) = params.get("Action").map(String::as_str) else {
            return ApiError::missing_parameter("Action").into();
        };
        match params.get("Version") {
            None => return ApiError::missing_parameter("Version").into(),
            Some(version) if *version != self.config.api_version => {
                return ApiError::invalid_parameter("Version", version).into();
            }
            Some(_) => {}
        }

        let result = match action {
            "CreateDomain" => self.create_domain(params).await,
            "DeleteDomain" => self.delete_domain(params).await,
            "DescribeDomains" => self.describe_domains(params).await,
            "DefineIndexField" => self.define_index_field(params).await,
            "DeleteIndexField" => self.delete_index_field(params).await,
            "DescribeIndexFields" => self.describe_index_fields(params).await,
            "IndexDocuments" => self.index_documents(params).await,
            "UpdateSynonymOptions" => self.update_synonym_options(params).await,
            "DescribeSynonymOptions" => self.describe_synonym_options(params).await,
            "UpdateDefaultSearchField" => self.update_default_search_field(params).await,
            "DescribeDefaultSearchField" => self.describe_default_search_field(params).await,
            other => {
                metrics::record_api_action("unknown", "invalid");
                return ApiError::invalid_action(other).into();
            }
        };

        match result {
            Ok(body) => {
                metrics::record_api_action(action, "success");
                debug!(action, "Configuration action complete");
                ApiResponse::ok(body)
            }
            Err(err) => {
                metrics::record_api_action(action, "error");
                warn!(action, code = %err.code, message = %err.message, "Configuration action failed");
                err.into()
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DOMAINS
    // ═══════════════════════════════════════════════════════════════════════

    /// Domain named by `DomainName`. Its name is validated, its existence is not.
    async fn named_domain(&self, params: &Params) -> std::result::Result<Arc<Domain>, ApiError> {
        Ok(self.registry.open(required(params, "DomainName")?).await?)
    }

    async fn require_exists(domain: &Domain) -> std::result::Result<(), ApiError> {
        if domain.exists().await? {
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("Domain not found: {}", domain.name())).into())
        }
    }

    async fn domain_status(&self, domain: &Domain) -> std::result::Result<Value, GatewayError> {
        let created = domain.exists().await?;
        Ok(json!({
            "DomainId": format!("{}/{}", domain.id(), domain.name()),
            "DomainName": domain.name(),
            "Created": created,
            "Deleted": false,
            "Processing": false,
            "DocService": { "Endpoint": domain.doc_endpoint(&self.config) },
            "SearchService": { "Endpoint": domain.search_endpoint(&self.config) },
            "NumSearchableDocs": domain.searchable_documents_count().await?,
            "RequiresIndexDocuments": created && domain.requires_index_documents().await?,
        }))
    }

    async fn create_domain(&self, params: &Params) -> ActionResult {
        let domain = self.registry.create(required(params, "DomainName")?).await?;
        Ok(json!({ "DomainStatus": self.domain_status(&domain).await? }))
    }

    async fn delete_domain(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        if !domain.exists().await? {
            return Ok(json!({}));
        }
        let mut status = self.domain_status(&domain).await?;
        domain.delete().await?;
        self.registry.forget(domain.name());
        status["Deleted"] = json!(true);
        status["NumSearchableDocs"] = json!(0);
        Ok(json!({ "DomainStatus": status }))
    }

    async fn describe_domains(&self, params: &Params) -> ActionResult {
        let names = members(params, "DomainNames");
        let domains = if names.is_empty() {
            self.registry.list_all().await?
        } else {
            let mut found = Vec::with_capacity(names.len());
            for name in &names {
                let domain = self.registry.open(name).await?;
                if domain.exists().await? {
                    found.push(domain);
                }
            }
            found
        };

        let mut statuses = Vec::with_capacity(domains.len());
        for domain in &domains {
            statuses.push(self.domain_status(domain).await?);
        }
        Ok(json!({ "DomainStatusList": statuses }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INDEX FIELDS
    // ═══════════════════════════════════════════════════════════════════════

    async fn option_state(domain: &Domain) -> std::result::Result<OptionState, GatewayError> {
        Ok(OptionState::from_requires_index(domain.requires_index_documents().await?))
    }

    async fn define_index_field(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        let name = required(params, "IndexField.IndexFieldName")?;
        let type_name = required(params, "IndexField.IndexFieldType")?;
        let field_type: FieldType = type_name.parse().map_err(GatewayError::Validation)?;
        validate_field_name(name).map_err(GatewayError::Validation)?;

        // Options are checked in full before anything is written.
        let prefix = options_prefix(field_type);
        let provided: BTreeMap<FieldOption, Value> = FieldOption::ALL
            .into_iter()
            .filter_map(|option| {
                let value = params.get(&format!("{}{}", prefix, option.api_name()))?;
                Some((option, Value::String(value.clone())))
            })
            .collect();
        let requested = FieldOptions::from_values(name, field_type, &provided)?;
        Self::require_exists(&domain).await?;

        let mut field = match domain.get_index_field(name).await {
            Ok(mut field) => {
                if field.field_type() != field_type {
                    field.change_type(field_type).await?;
                }
                field
            }
            Err(GatewayError::NotFound(_)) => {
                let field = domain.index_field(name, field_type);
                field.create().await?;
                field
            }
            Err(e) => return Err(e.into()),
        };

        let persisted = field.persisted_options().await?;
        for option in FieldOption::ALL {
            if matches!(field_type.option_rule(option), Some(OptionRule::Fixed(_))) {
                continue;
            }
            match (provided.contains_key(&option), persisted.get(&option)) {
                (true, current) => {
                    let value = requested.get(option);
                    if current != Some(&value) {
                        field.set_option(option, value);
                    }
                }
                (false, Some(_)) => field.unset_option(option),
                (false, None) => {}
            }
        }
        field.save().await?;

        let definition = field.definition().await?;
        let state = Self::option_state(&domain).await?;
        info!(domain = %domain.name(), field = %name, field_type = %field_type, "Index field defined");
        Ok(json!({ "IndexField": definition.to_api_json(state.as_str()) }))
    }

    async fn delete_index_field(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        let name = required(params, "IndexFieldName")?;
        domain.get_index_field(name).await?.delete().await?;
        Ok(json!({}))
    }

    async fn describe_index_fields(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        let names = members(params, "FieldNames");
        let state = Self::option_state(&domain).await?;

        let mut fields = Vec::new();
        for field in domain.index_fields().await? {
            if !names.is_empty() && !names.iter().any(|n| n == field.name()) {
                continue;
            }
            fields.push(field.definition().await?.to_api_json(state.as_str()));
        }
        Ok(json!({ "IndexFields": fields }))
    }

    async fn index_documents(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        Ok(json!({ "FieldNames": domain.index_documents().await? }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SYNONYMS & DEFAULT SEARCH FIELD
    // ═══════════════════════════════════════════════════════════════════════

    async fn synonym_options(domain: &Domain) -> ActionResult {
        let options = json!({ "synonyms": domain.synonyms().await? });
        let state = Self::option_state(domain).await?;
        Ok(json!({
            "Synonyms": {
                "Options": options.to_string(),
                "Status": { "State": state.as_str() },
            }
        }))
    }

    async fn update_synonym_options(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        let raw = required(params, "Synonyms")?;
        let options: SynonymOptions =
            serde_json::from_str(raw).map_err(|_| ApiError::invalid_parameter("Synonyms", raw))?;
        domain.update_synonyms(&options.synonyms).await?;
        domain.set_requires_index_documents(true).await?;
        Self::synonym_options(&domain).await
    }

    async fn describe_synonym_options(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        Self::synonym_options(&domain).await
    }

    async fn default_search_field_options(domain: &Domain) -> ActionResult {
        let name = domain.default_search_field().await?.map(|f| f.name().to_string());
        let state = Self::option_state(domain).await?;
        Ok(json!({
            "DefaultSearchField": {
                "Options": name.unwrap_or_default(),
                "Status": { "State": state.as_str() },
            }
        }))
    }

    async fn update_default_search_field(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        let name = params.get("DefaultSearchField").map(String::as_str);
        domain.set_default_search_field(name).await?;
        Self::default_search_field_options(&domain).await
    }

    async fn describe_default_search_field(&self, params: &Params) -> ActionResult {
        let domain = self.named_domain(params).await?;
        Self::require_exists(&domain).await?;
        Self::default_search_field_options(&domain).await
    }
}

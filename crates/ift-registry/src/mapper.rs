//! Audit record → registry certificate mapping.
//!
//! Source records are opaque JSON documents; the mapper reads a fixed set of
//! dotted paths from them and fails with [`RegistryError::Mapping`] when a
//! mandatory one is absent. Inputs are never mutated.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::error::{RegistryError, RegistryResult};
use crate::record::{CertificateRecord, CertificationStatus};
use crate::types::{RegistryConfig, LOCATION_URN_NAMESPACE};

/// Separator between scope description and product names.
pub const SCOPE_SEPARATOR: &str = " || ";

const AUDIT_ID: &str = "_id";
const FSMS_OBSERVED_START: &str = "conditions_during_audit.FSMS_observed_date.start";
const OPERATION_OBSERVED_START: &str = "conditions_during_audit.operation_observed_date.start";
const AUDITOR_NAME: &str = "certifying_body.auditor.name";
const CERTIFICATION_ID: &str = "certificationid.id";
const SCHEME_NAME: &str = "scheme.name";
const SCOPE: &str = "scope";
const ORGANIZATION_LOCATION: &str = "organization.gln";

/// Maps source audit/certificate pairs into [`CertificateRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    location_prefix: String,
    forced_location_id: Option<String>,
}

impl Default for RecordMapper {
    fn default() -> Self {
        Self::new(LOCATION_URN_NAMESPACE)
    }
}

impl RecordMapper {
    /// Create a mapper prepending `location_prefix` to every location id.
    pub fn new(location_prefix: impl Into<String>) -> Self {
        Self {
            location_prefix: location_prefix.into(),
            forced_location_id: None,
        }
    }

    /// Mapper for a company prefix: `urn:ibm:ift:location:loc:<prefix>.gln`.
    pub fn for_company(company_prefix: &str) -> Self {
        Self::new(format!("{}{}.gln", LOCATION_URN_NAMESPACE, company_prefix))
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        let mapper = Self {
            location_prefix: config.location_prefix.clone(),
            forced_location_id: config.forced_location_id.clone(),
        };
        if !mapper.has_company_prefix() {
            warn!(
                location_prefix = %mapper.location_prefix,
                "location prefix has no company segment; set IFT_LOCATION_PREFIX or --company-prefix"
            );
        }
        mapper
    }

    /// Ignore the source location ids and use `location_id` instead.
    pub fn with_forced_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.forced_location_id = Some(location_id.into());
        self
    }

    pub fn location_prefix(&self) -> &str {
        &self.location_prefix
    }

    /// Whether the prefix goes beyond the bare location namespace, i.e.
    /// carries the `<company>.gln` segment production locations need.
    pub fn has_company_prefix(&self) -> bool {
        self.location_prefix != LOCATION_URN_NAMESPACE
    }

    /// Build the registry document for an audit and its certificate.
    ///
    /// `analytics_url`, when given, replaces the value of the first custom
    /// field of the template.
    pub fn map_to_registry_format(
        &self,
        audit: &Value,
        certificate: &Value,
        analytics_url: Option<&str>,
    ) -> RegistryResult<CertificateRecord> {
        let mut record = CertificateRecord::template();

        record.set_addendums_comments(required_str(audit, AUDIT_ID)?)?;
        record.audit_start_date = audit_start_date(
            required_str(audit, FSMS_OBSERVED_START)?,
            required_str(audit, OPERATION_OBSERVED_START)?,
        )?;
        record.set_audited_by(required_str(audit, AUDITOR_NAME)?)?;
        record.set_certificate_reference_number(required_str(audit, CERTIFICATION_ID)?)?;
        record.certification_status = CertificationStatus::Valid;
        record.set_scheme(required_str(audit, SCHEME_NAME)?)?;

        let scope = lookup(audit, SCOPE)
            .ok_or_else(|| RegistryError::mapping(SCOPE, "required field is missing"))?;
        record.set_scope(scope_description(scope)?)?;

        let location_id = self.location_id(audit, certificate)?;
        record.set_locations(vec![format!("{}{}", self.location_prefix, location_id)])?;

        if let Some(url) = analytics_url {
            record.set_analytics_url(url)?;
        }

        Ok(record)
    }

    /// Certificate organization first, then the audit organization.
    fn location_id<'a>(&'a self, audit: &'a Value, certificate: &'a Value) -> RegistryResult<&'a str> {
        if let Some(forced) = self.forced_location_id.as_deref() {
            return Ok(forced);
        }
        optional_str(certificate, ORGANIZATION_LOCATION)
            .or_else(|| optional_str(audit, ORGANIZATION_LOCATION))
            .ok_or_else(|| {
                RegistryError::mapping(
                    ORGANIZATION_LOCATION,
                    "neither certificate nor audit carries an organization location id",
                )
            })
    }
}

/// Earlier of two ISO-8601 dates or datetimes, at calendar-date precision.
pub fn audit_start_date(first: &str, second: &str) -> RegistryResult<NaiveDate> {
    let first = calendar_date(FSMS_OBSERVED_START, first)?;
    let second = calendar_date(OPERATION_OBSERVED_START, second)?;
    Ok(first.min(second))
}

/// `<description> || <product> || <product> || `
pub fn scope_description(scope: &Value) -> RegistryResult<String> {
    let description = required_str(scope, "description")
        .map_err(|_| RegistryError::mapping("scope.description", "required field is missing"))?;

    let mut summary = format!("{}{}", description, SCOPE_SEPARATOR);

    // Either a list or an object keyed by product id.
    let products: Vec<(String, &Value)> = match scope.get("products_observed") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(products)) => products
            .iter()
            .enumerate()
            .map(|(index, product)| (index.to_string(), product))
            .collect(),
        Some(Value::Object(products)) => products
            .iter()
            .map(|(key, product)| (key.clone(), product))
            .collect(),
        Some(_) => {
            return Err(RegistryError::mapping(
                "scope.products_observed",
                "expected a list or an object",
            ))
        }
    };

    for (key, product) in products {
        let name = product
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RegistryError::mapping(
                    format!("scope.products_observed[{}].name", key),
                    "required field is missing",
                )
            })?;
        summary.push_str(name);
        summary.push_str(SCOPE_SEPARATOR);
    }

    Ok(summary)
}

fn calendar_date(path: &str, raw: &str) -> RegistryResult<NaiveDate> {
    let prefix = raw
        .get(..10)
        .ok_or_else(|| RegistryError::mapping(path, format!("not an ISO-8601 date: {:?}", raw)))?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .map_err(|e| RegistryError::mapping(path, format!("invalid date {:?}: {}", raw, e)))
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

fn optional_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    lookup(value, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(value: &'a Value, path: &str) -> RegistryResult<&'a str> {
    match lookup(value, path) {
        None | Some(Value::Null) => Err(RegistryError::mapping(path, "required field is missing")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(RegistryError::mapping(path, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RegistryError::mapping(
            path,
            format!("expected a string, found {}", other),
        )),
    }
}

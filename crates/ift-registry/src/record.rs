//! Registry certificate document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Certification status. The mapper only ever produces [`Valid`](Self::Valid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationStatus {
    #[default]
    Valid,
    Suspended,
    Expired,
}

/// Custom key/value/type annotation (e.g. an analytics URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub label: String,
    pub value: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Certificate document in the registry's schema.
///
/// Field names serialize in the registry's camelCase form. Dates serialize
/// as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub addendums_comments: String,
    pub announced: String,
    pub audit_rating: String,
    pub audit_reference_number: String,
    pub audit_score: String,
    pub audit_start_date: NaiveDate,
    pub audit_type: String,
    pub audited_by: String,
    pub certificate_reference_number: String,
    pub certification_status: CertificationStatus,
    pub comments: String,
    pub expiry_date: NaiveDate,
    pub issue_date: NaiveDate,
    #[serde(rename = "locationGLNList")]
    pub location_gln_list: Vec<String>,
    pub product_handling_included: String,
    pub scheme: String,
    pub scheme_owner: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_field_list: Vec<CustomField>,
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

impl CertificateRecord {
    /// Base document every mapped certificate starts from.
    pub fn template() -> Self {
        Self {
            addendums_comments: "trellis-certification".into(),
            announced: "Announced".into(),
            audit_rating: "Grade A".into(),
            audit_reference_number: "NA".into(),
            audit_score: "NA".into(),
            audit_start_date: date(2018, 7, 1),
            audit_type: "NA".into(),
            audited_by: "trellis".into(),
            certificate_reference_number: "NA".into(),
            certification_status: CertificationStatus::Valid,
            comments: "trellis comment".into(),
            expiry_date: date(2019, 1, 1),
            issue_date: date(2018, 8, 16),
            location_gln_list: Vec::new(),
            product_handling_included: "false".into(),
            scheme: "BRC Global Standard for Food Safety".into(),
            scheme_owner: "BRC".into(),
            scope: "Agents and Brokers: 01 – Raw milk and prepared foods".into(),
            custom_field_list: vec![CustomField {
                label: "NA".into(),
                value: "NA".into(),
                field_type: "url".into(),
            }],
        }
    }

    pub fn set_addendums_comments(&mut self, value: impl Into<String>) -> RegistryResult<()> {
        self.addendums_comments = required("addendumsComments", value)?;
        Ok(())
    }

    pub fn set_audited_by(&mut self, value: impl Into<String>) -> RegistryResult<()> {
        self.audited_by = required("auditedBy", value)?;
        Ok(())
    }

    pub fn set_certificate_reference_number(
        &mut self,
        value: impl Into<String>,
    ) -> RegistryResult<()> {
        self.certificate_reference_number = required("certificateReferenceNumber", value)?;
        Ok(())
    }

    /// Set both scheme and scheme owner.
    pub fn set_scheme(&mut self, value: impl Into<String>) -> RegistryResult<()> {
        let scheme = required("scheme", value)?;
        self.scheme_owner = scheme.clone();
        self.scheme = scheme;
        Ok(())
    }

    pub fn set_scope(&mut self, value: impl Into<String>) -> RegistryResult<()> {
        self.scope = required("scope", value)?;
        Ok(())
    }

    pub fn set_locations(&mut self, locations: Vec<String>) -> RegistryResult<()> {
        if locations.is_empty() || locations.iter().any(String::is_empty) {
            return Err(RegistryError::mapping(
                "locationGLNList",
                "at least one non-empty location is required",
            ));
        }
        self.location_gln_list = locations;
        Ok(())
    }

    /// Replace the value of the first custom field, adding one if there is none.
    pub fn set_analytics_url(&mut self, url: impl Into<String>) -> RegistryResult<()> {
        let url = required("customFieldList[0].value", url)?;
        match self.custom_field_list.first_mut() {
            Some(field) => field.value = url,
            None => self.custom_field_list.push(CustomField {
                label: "NA".into(),
                value: url,
                field_type: "url".into(),
            }),
        }
        Ok(())
    }

    /// Check every field the registry treats as mandatory.
    pub fn validate(&self) -> RegistryResult<()> {
        let mandatory = [
            ("addendumsComments", &self.addendums_comments),
            ("auditedBy", &self.audited_by),
            ("certificateReferenceNumber", &self.certificate_reference_number),
            ("scheme", &self.scheme),
            ("schemeOwner", &self.scheme_owner),
            ("scope", &self.scope),
        ];
        for (field, value) in mandatory {
            if value.trim().is_empty() {
                return Err(RegistryError::mapping(field, "must not be empty"));
            }
        }
        if self.location_gln_list.is_empty() {
            return Err(RegistryError::mapping(
                "locationGLNList",
                "at least one location is required",
            ));
        }
        Ok(())
    }
}

fn required(field: &str, value: impl Into<String>) -> RegistryResult<String> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(RegistryError::mapping(field, "must not be empty"));
    }
    Ok(value)
}

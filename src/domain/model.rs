use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TENANT_ID_HEADER: &str = "X-FHIR-TENANT-ID";
pub const DEFAULT_DATASOURCE_ID_HEADER: &str = "X-FHIR-DSID";

/// Connection details for a FHIR server, forwarded to the cohort service which
/// does the actual FHIR calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirServerConfig {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, alias = "tenant_id", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, alias = "tenant_id_header", skip_serializing_if = "Option::is_none")]
    pub tenant_id_header: Option<String>,
    #[serde(default, alias = "data_source_id", skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default, alias = "data_source_id_header", skip_serializing_if = "Option::is_none")]
    pub data_source_id_header: Option<String>,
}

impl FhirServerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            user: None,
            password: None,
            token: None,
            tenant_id: None,
            tenant_id_header: None,
            data_source_id: None,
            data_source_id_header: None,
        }
    }

    /// Fills blank tenant/datasource header names with the IBM FHIR defaults.
    pub fn with_default_headers(mut self) -> Self {
        if self.tenant_id_header.as_deref().map_or(true, |h| h.trim().is_empty()) {
            self.tenant_id_header = Some(DEFAULT_TENANT_ID_HEADER.to_string());
        }
        if self
            .data_source_id_header
            .as_deref()
            .map_or(true, |h| h.trim().is_empty())
        {
            self.data_source_id_header = Some(DEFAULT_DATASOURCE_ID_HEADER.to_string());
        }
        self
    }
}

/// A typed CQL parameter value, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Parameter {
    Integer {
        value: i64,
    },
    Decimal {
        value: String,
    },
    String {
        value: String,
    },
    Boolean {
        value: bool,
    },
    Date {
        value: NaiveDate,
    },
    #[serde(rename = "datetime")]
    DateTime {
        #[serde(with = "cql_datetime")]
        value: NaiveDateTime,
    },
    Code {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<String>,
    },
    Interval {
        start: Box<Parameter>,
        end: Box<Parameter>,
        #[serde(rename = "startInclusive", default = "inclusive")]
        start_inclusive: bool,
        #[serde(rename = "endInclusive", default = "inclusive")]
        end_inclusive: bool,
    },
}

fn inclusive() -> bool {
    true
}

/// CQL datetime literals carry a leading `@`.
mod cql_datetime {
    use chrono::{NaiveDateTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        let mut text = format!("@{}", value.format(FORMAT));
        if value.nanosecond() == 0 {
            text.push_str(".0");
        }
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        let trimmed = raw.trim_start_matches('@');
        NaiveDateTime::parse_from_str(trimmed, FORMAT).map_err(serde::de::Error::custom)
    }
}

impl Parameter {
    /// Parses the CLI form `type:value`, e.g. `integer:10` or
    /// `interval:date:2020-01-01,date:2020-12-31`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, value) = raw.split_once(':')?;
        match kind.to_ascii_lowercase().as_str() {
            "integer" => value.parse().ok().map(|value| Parameter::Integer { value }),
            "decimal" => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|_| Parameter::Decimal {
                    value: value.to_string(),
                }),
            "string" => Some(Parameter::String {
                value: value.to_string(),
            }),
            "boolean" => value.parse().ok().map(|value| Parameter::Boolean { value }),
            "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|value| Parameter::Date { value }),
            "datetime" => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|value| Parameter::DateTime { value }),
            "code" => Some(Parameter::Code {
                value: value.to_string(),
                system: None,
                display: None,
            }),
            "interval" => {
                let (start, end) = value.split_once(',')?;
                let start = Parameter::parse(start)?;
                let end = Parameter::parse(end)?;
                if matches!(start, Parameter::Interval { .. }) || matches!(end, Parameter::Interval { .. }) {
                    return None;
                }
                Some(Parameter::Interval {
                    start: Box::new(start),
                    end: Box::new(end),
                    start_inclusive: true,
                    end_inclusive: true,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoggingLevel {
    #[default]
    #[serde(rename = "NA")]
    Na,
    Coverage,
    Trace,
}

/// JSON part of a cohort evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortEvaluation {
    pub data_server_config: FhirServerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminology_server_config: Option<FhirServerConfig>,
    pub entrypoint: String,
    pub define_to_run: String,
    #[serde(with = "comma_list")]
    pub patient_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub logging_level: LoggingLevel,
}

/// Patient ids travel as one comma separated string.
mod comma_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ids: &[String], s: S) -> Result<S::Ok, S::Error> {
        let joined = ids.iter().map(|id| id.trim()).collect::<Vec<_>>().join(",");
        s.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// A cohort evaluation request: the JSON part plus the zipped CQL libraries.
#[derive(Debug, Clone)]
pub struct CohortEvaluationRequest {
    pub evaluation: CohortEvaluation,
    pub cql_bundle: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortResult {
    pub id: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureParameterInfo {
    pub name: String,
    #[serde(default, rename = "use")]
    pub use_: Option<String>,
    #[serde(default)]
    pub min: Option<i32>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MeasureParameterInfoList {
    #[serde(default)]
    pub parameter_info_list: Vec<MeasureParameterInfo>,
}

/// How to find the measure whose parameters are wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasureSelector {
    Id(String),
    Identifier {
        value: String,
        system: Option<String>,
        version: Option<String>,
    },
}

impl MeasureSelector {
    pub fn identifier(value: impl Into<String>) -> Self {
        MeasureSelector::Identifier {
            value: value.into(),
            system: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueSetUpload {
    pub file_name: String,
    pub spreadsheet: Vec<u8>,
    pub update_if_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueSetCreated {
    pub id: String,
    pub outcome: UpsertOutcome,
}

/// Business identifier of a measure, used instead of its resource id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureIdentifier {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// Which measure to evaluate and the parameter overrides to apply.
/// Exactly one of `measure_id` and `identifier` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<MeasureIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl MeasureContext {
    pub fn from_selector(selector: MeasureSelector, parameters: BTreeMap<String, Parameter>) -> Self {
        match selector {
            MeasureSelector::Id(id) => Self {
                measure_id: Some(id),
                parameters,
                identifier: None,
                version: None,
            },
            MeasureSelector::Identifier {
                value,
                system,
                version,
            } => Self {
                measure_id: None,
                parameters,
                identifier: Some(MeasureIdentifier { value, system }),
                version,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefineReturnOption {
    #[default]
    None,
    All,
    Boolean,
}

/// Controls the evidence attached to the returned MeasureReport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MeasureEvidenceOptions {
    #[serde(default)]
    pub include_evaluated_resources: bool,
    #[serde(default)]
    pub define_return_option: DefineReturnOption,
}

/// JSON part of a single patient measure evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureEvaluation {
    pub data_server_config: FhirServerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminology_server_config: Option<FhirServerConfig>,
    pub patient_id: String,
    pub measure_context: MeasureContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_options: Option<MeasureEvidenceOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand_value_sets: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_page_size: Option<u32>,
}

/// JSON part of a measure evaluation over several patients. Unlike cohort
/// evaluation, the ids travel as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientListMeasureEvaluation {
    pub data_server_config: FhirServerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminology_server_config: Option<FhirServerConfig>,
    pub patient_ids: Vec<String>,
    pub measure_context: MeasureContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_options: Option<MeasureEvidenceOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand_value_sets: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_page_size: Option<u32>,
}

/// A measure evaluation plus the zipped measure and library resources
/// sent as the `measure` part.
#[derive(Debug, Clone)]
pub struct MeasureEvaluationRequest<E> {
    pub evaluation: E,
    pub measure_artifacts: Vec<u8>,
}

/// FHIR MeasureReport as returned by the service. Kept as raw JSON.
pub type MeasureReport = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Error body returned by the cohort service on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceErrorList {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error_source: Option<String>,
    #[serde(default)]
    pub errors: Vec<ServiceError>,
}

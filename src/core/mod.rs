pub mod client;
pub mod cohort_evaluation_api;
pub mod cql_bundle;
pub mod engine;
pub mod fhir_measures_api;
pub mod measure_evaluation_api;
pub mod value_set_api;

pub use crate::domain::model::{
    CohortEvaluation, CohortEvaluationRequest, CohortResult, FhirServerConfig, MeasureContext,
    MeasureEvaluation, MeasureEvaluationRequest, MeasureEvidenceOptions, MeasureParameterInfoList,
    MeasureReport, MeasureSelector, PatientListMeasureEvaluation, ValueSetCreated, ValueSetUpload,
};
pub use crate::domain::ports::{CohortEngineApi, ConfigProvider, Credentials, Storage};
pub use crate::utils::error::Result;

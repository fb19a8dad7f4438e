pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::ClientConfig};

pub use core::{
    client::CohortEngineClient,
    cql_bundle::CqlBundle,
    engine::{CohortEngine, CohortQuery, MeasureQuery},
};
pub use domain::model::{
    CohortEvaluation, CohortEvaluationRequest, CohortResult, DefineReturnOption,
    FhirServerConfig, LoggingLevel, MeasureContext, MeasureEvaluation, MeasureEvaluationRequest,
    MeasureEvidenceOptions, MeasureIdentifier, MeasureParameterInfo, MeasureParameterInfoList,
    MeasureReport, MeasureSelector, Parameter, PatientListMeasureEvaluation, UpsertOutcome,
    ValueSetCreated, ValueSetUpload,
};
pub use domain::ports::{CohortEngineApi, ConfigProvider, Credentials, Storage};
pub use utils::error::{CohortError, Result};

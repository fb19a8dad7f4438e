use crate::domain::model::{
    CohortEvaluationRequest, CohortResult, FhirServerConfig, MeasureEvaluation,
    MeasureEvaluationRequest, MeasureParameterInfoList, MeasureReport, MeasureSelector,
    PatientListMeasureEvaluation, ValueSetCreated, ValueSetUpload,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Credentials forwarded to the service, which reads the FHIR login from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { user: String, password: String },
    Bearer(String),
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn api_version(&self) -> &str;
    fn timeout(&self) -> Duration;
    fn credentials(&self) -> Option<Credentials>;
    fn data_server(&self) -> &FhirServerConfig;
    fn terminology_server(&self) -> Option<&FhirServerConfig>;
}

/// Endpoints of the cohort engine REST API.
#[async_trait]
pub trait CohortEngineApi: Send + Sync {
    /// Evaluates one define of a CQL library for a set of patients.
    async fn evaluate_cohort(&self, request: CohortEvaluationRequest) -> Result<Vec<CohortResult>>;

    /// Evaluates a quality measure for one patient.
    async fn evaluate_measure(
        &self,
        request: MeasureEvaluationRequest<MeasureEvaluation>,
    ) -> Result<MeasureReport>;

    /// Evaluates a quality measure over a list of patients.
    async fn evaluate_patient_list_measure(
        &self,
        request: MeasureEvaluationRequest<PatientListMeasureEvaluation>,
    ) -> Result<MeasureReport>;

    /// Parameter metadata for a quality measure.
    async fn get_measure_parameters(
        &self,
        server: &FhirServerConfig,
        selector: &MeasureSelector,
    ) -> Result<MeasureParameterInfoList>;

    async fn get_measure_parameters_by_id(
        &self,
        server: &FhirServerConfig,
        measure_id: &str,
    ) -> Result<MeasureParameterInfoList> {
        self.get_measure_parameters(server, &MeasureSelector::Id(measure_id.to_string()))
            .await
    }

    /// Inserts a value set on the FHIR server, or updates it in place when
    /// `update_if_exists` is set.
    async fn create_value_set(
        &self,
        server: &FhirServerConfig,
        value_set: ValueSetUpload,
    ) -> Result<ValueSetCreated>;
}

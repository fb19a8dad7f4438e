use crate::core::{
    cohort_evaluation_api, fhir_measures_api, measure_evaluation_api, value_set_api,
};
use crate::domain::model::{
    CohortEvaluationRequest, CohortResult, FhirServerConfig, MeasureEvaluation,
    MeasureEvaluationRequest, MeasureParameterInfoList, MeasureReport, MeasureSelector,
    PatientListMeasureEvaluation, ServiceErrorList, ValueSetCreated, ValueSetUpload,
};
use crate::domain::ports::{CohortEngineApi, ConfigProvider, Credentials};
use crate::utils::error::{CohortError, Result};
use async_trait::async_trait;
use reqwest::multipart::Part;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Date-version the service expects on every call.
pub const DEFAULT_API_VERSION: &str = "2021-07-22";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const PATH_VERSION: &str = "v1";

/// reqwest backed implementation of [`CohortEngineApi`].
#[derive(Debug, Clone)]
pub struct CohortEngineClient {
    client: Client,
    base_url: Url,
    api_version: String,
    credentials: Option<Credentials>,
}

impl CohortEngineClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::build(base_url, DEFAULT_TIMEOUT)
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let client = Self::build(config.base_url(), config.timeout())?
            .with_api_version(config.api_version());
        Ok(match config.credentials() {
            Some(credentials) => client.with_credentials(credentials),
            None => client,
        })
    }

    fn build(base_url: &str, timeout: Duration) -> Result<Self> {
        crate::utils::validation::validate_url("service.base_url", base_url)?;
        let base_url = Url::parse(base_url).map_err(|e| CohortError::InvalidConfigValueError {
            field: "service.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            api_version: DEFAULT_API_VERSION.to_string(),
            credentials: None,
        })
    }

    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Builds `{base}/v1/{segments..}`, percent-encoding each segment.
    /// `.` and `..` are rejected since the URL parser would resolve them away.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        if let Some(segment) = segments.iter().find(|s| matches!(s.trim(), "." | "..")) {
            return Err(CohortError::validation(format!(
                "'{}' is not a valid path segment",
                segment
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CohortError::InvalidConfigValueError {
                field: "service.base_url".to_string(),
                value: self.base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .push(PATH_VERSION)
            .extend(segments);
        Ok(url)
    }

    /// POST with the headers and query every operation shares.
    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        let request = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .query(&[("version", self.api_version.as_str())]);

        match &self.credentials {
            Some(Credentials::Basic { user, password }) => request.basic_auth(user, Some(password)),
            Some(Credentials::Bearer(token)) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request and turns any non-2xx status into an error.
    pub(crate) async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        tracing::debug!(operation, "Sending request to cohort service");
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(operation, %status, "Cohort service responded");

        if status.is_success() {
            Ok(response)
        } else {
            let err = error_from_response(response).await;
            tracing::warn!(operation, %status, "Cohort service request failed: {}", err);
            Err(err)
        }
    }
}

/// Decodes a success body. A body of the wrong shape is a serialization error.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn json_part<T: Serialize>(value: &T) -> Result<Part> {
    let body = serde_json::to_string(value)?;
    Ok(Part::text(body).mime_str("application/json")?)
}

/// Reads the service's error body, falling back to the raw text.
pub(crate) async fn error_from_response(response: Response) -> CohortError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let parsed: ServiceErrorList = serde_json::from_str(&body).unwrap_or_default();
    let message = parsed
        .errors
        .iter()
        .find_map(|e| e.message.clone())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    CohortError::Api {
        status: status.as_u16(),
        message,
        errors: parsed.errors,
    }
}

#[async_trait]
impl CohortEngineApi for CohortEngineClient {
    async fn evaluate_cohort(&self, request: CohortEvaluationRequest) -> Result<Vec<CohortResult>> {
        cohort_evaluation_api::evaluate_cohort(self, request).await
    }

    async fn evaluate_measure(
        &self,
        request: MeasureEvaluationRequest<MeasureEvaluation>,
    ) -> Result<MeasureReport> {
        measure_evaluation_api::evaluate_measure(self, request).await
    }

    async fn evaluate_patient_list_measure(
        &self,
        request: MeasureEvaluationRequest<PatientListMeasureEvaluation>,
    ) -> Result<MeasureReport> {
        measure_evaluation_api::evaluate_patient_list_measure(self, request).await
    }

    async fn get_measure_parameters(
        &self,
        server: &FhirServerConfig,
        selector: &MeasureSelector,
    ) -> Result<MeasureParameterInfoList> {
        fhir_measures_api::get_measure_parameters(self, server, selector).await
    }

    async fn create_value_set(
        &self,
        server: &FhirServerConfig,
        value_set: ValueSetUpload,
    ) -> Result<ValueSetCreated> {
        value_set_api::create_value_set(self, server, value_set).await
    }
}

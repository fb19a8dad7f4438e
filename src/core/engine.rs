use crate::core::cql_bundle::CqlBundle;
use crate::core::{
    CohortEngineApi, CohortEvaluation, CohortEvaluationRequest, CohortResult, ConfigProvider,
    FhirServerConfig, MeasureContext, MeasureEvaluation, MeasureEvaluationRequest,
    MeasureEvidenceOptions, MeasureParameterInfoList, MeasureReport, MeasureSelector,
    PatientListMeasureEvaluation, Storage, ValueSetCreated, ValueSetUpload,
};
use crate::domain::model::{LoggingLevel, Parameter};
use crate::utils::error::{CohortError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// What to evaluate; the server configs come from the engine.
#[derive(Debug, Clone)]
pub struct CohortQuery {
    pub entrypoint: String,
    pub define_to_run: String,
    pub patient_ids: Vec<String>,
    pub parameters: BTreeMap<String, Parameter>,
    pub logging_level: LoggingLevel,
}

/// A measure to evaluate for one or more patients.
#[derive(Debug, Clone)]
pub struct MeasureQuery {
    pub patient_ids: Vec<String>,
    pub context: MeasureContext,
    pub evidence_options: Option<MeasureEvidenceOptions>,
    pub expand_value_sets: Option<bool>,
    pub search_page_size: Option<u32>,
}

/// Binds an API implementation to the FHIR servers named in the configuration.
pub struct CohortEngine<A: CohortEngineApi> {
    api: A,
    data_server: FhirServerConfig,
    terminology_server: Option<FhirServerConfig>,
}

impl<A: CohortEngineApi> CohortEngine<A> {
    pub fn new(api: A, data_server: FhirServerConfig) -> Self {
        Self {
            api,
            data_server: data_server.with_default_headers(),
            terminology_server: None,
        }
    }

    pub fn from_config<C: ConfigProvider>(api: A, config: &C) -> Self {
        let engine = Self::new(api, config.data_server().clone());
        match config.terminology_server() {
            Some(terminology) => engine.with_terminology_server(terminology.clone()),
            None => engine,
        }
    }

    pub fn with_terminology_server(mut self, server: FhirServerConfig) -> Self {
        self.terminology_server = Some(server.with_default_headers());
        self
    }

    pub async fn evaluate_cohort(
        &self,
        query: CohortQuery,
        bundle: CqlBundle,
    ) -> Result<Vec<CohortResult>> {
        if !bundle
            .entries()
            .iter()
            .any(|entry| entry.rsplit('/').next() == Some(query.entrypoint.as_str()))
        {
            return Err(CohortError::validation(format!(
                "entrypoint {} is not among the packed CQL libraries",
                query.entrypoint
            )));
        }

        let evaluation = CohortEvaluation {
            data_server_config: self.data_server.clone(),
            terminology_server_config: Some(self.terminology_server()),
            entrypoint: query.entrypoint,
            define_to_run: query.define_to_run,
            patient_ids: query.patient_ids,
            parameters: query.parameters,
            logging_level: query.logging_level,
        };

        self.api
            .evaluate_cohort(CohortEvaluationRequest {
                evaluation,
                cql_bundle: bundle.into_bytes(),
            })
            .await
    }

    pub async fn evaluate_cohort_dir<P: AsRef<Path>>(
        &self,
        query: CohortQuery,
        cql_dir: P,
    ) -> Result<Vec<CohortResult>> {
        let bundle = CqlBundle::from_dir(cql_dir)?;
        self.evaluate_cohort(query, bundle).await
    }

    fn terminology_server(&self) -> FhirServerConfig {
        self.terminology_server
            .clone()
            .unwrap_or_else(|| self.data_server.clone())
    }

    /// A single patient goes to the per-patient endpoint, several to the
    /// patient list endpoint.
    pub async fn evaluate_measure(
        &self,
        query: MeasureQuery,
        measure_artifacts: Vec<u8>,
    ) -> Result<MeasureReport> {
        let MeasureQuery {
            mut patient_ids,
            context,
            evidence_options,
            expand_value_sets,
            search_page_size,
        } = query;

        match patient_ids.len() {
            0 => Err(CohortError::validation("at least one patient id is required")),
            1 => {
                let patient_id = patient_ids.remove(0);
                self.api
                    .evaluate_measure(MeasureEvaluationRequest {
                        evaluation: MeasureEvaluation {
                            data_server_config: self.data_server.clone(),
                            terminology_server_config: Some(self.terminology_server()),
                            patient_id,
                            measure_context: context,
                            evidence_options,
                            expand_value_sets,
                            search_page_size,
                        },
                        measure_artifacts,
                    })
                    .await
            }
            _ => {
                self.api
                    .evaluate_patient_list_measure(MeasureEvaluationRequest {
                        evaluation: PatientListMeasureEvaluation {
                            data_server_config: self.data_server.clone(),
                            terminology_server_config: Some(self.terminology_server()),
                            patient_ids,
                            measure_context: context,
                            evidence_options,
                            expand_value_sets,
                            search_page_size,
                        },
                        measure_artifacts,
                    })
                    .await
            }
        }
    }

    /// Reads the measure archive through `storage` before evaluating.
    pub async fn evaluate_measure_file<S: Storage>(
        &self,
        storage: &S,
        query: MeasureQuery,
        archive_path: &str,
    ) -> Result<MeasureReport> {
        let measure_artifacts = storage.read_file(archive_path).await?;
        self.evaluate_measure(query, measure_artifacts).await
    }

    pub async fn measure_parameters(
        &self,
        selector: &MeasureSelector,
    ) -> Result<MeasureParameterInfoList> {
        self.api
            .get_measure_parameters(&self.data_server, selector)
            .await
    }

    /// Reads the spreadsheet through `storage` and uploads it.
    pub async fn upload_value_set<S: Storage>(
        &self,
        storage: &S,
        spreadsheet_path: &str,
        update_if_exists: bool,
    ) -> Result<ValueSetCreated> {
        let spreadsheet = storage.read_file(spreadsheet_path).await?;
        let file_name = Path::new(spreadsheet_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(spreadsheet_path)
            .to_string();

        self.api
            .create_value_set(
                &self.data_server,
                ValueSetUpload {
                    file_name,
                    spreadsheet,
                    update_if_exists,
                },
            )
            .await
    }
}

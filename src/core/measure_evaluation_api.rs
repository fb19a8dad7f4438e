use crate::core::client::{json_part, read_json, CohortEngineClient};
use crate::core::cohort_evaluation_api::REQUEST_DATA_PART;
use crate::domain::model::{
    FhirServerConfig, MeasureContext, MeasureEvaluation, MeasureEvaluationRequest, MeasureReport,
    PatientListMeasureEvaluation,
};
use crate::utils::error::{CohortError, Result};
use reqwest::multipart::{Form, Part};
use serde::Serialize;

pub const MEASURE_PART: &str = "measure";

fn validate_context(context: &MeasureContext) -> Result<()> {
    let has_id = context
        .measure_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    let has_identifier = context
        .identifier
        .as_ref()
        .is_some_and(|identifier| !identifier.value.trim().is_empty());

    match (has_id, has_identifier) {
        (true, true) => Err(CohortError::validation(
            "measure context takes a measure id or an identifier, not both",
        )),
        (false, false) => Err(CohortError::validation(
            "measure context needs a measure id or an identifier",
        )),
        _ => Ok(()),
    }
}

fn validate_common(
    data_server: &FhirServerConfig,
    context: &MeasureContext,
    measure_artifacts: &[u8],
) -> Result<()> {
    validate_context(context)?;
    if measure_artifacts.is_empty() {
        return Err(CohortError::validation("measure archive is empty"));
    }
    crate::utils::validation::validate_url("data_server.endpoint", &data_server.endpoint)
}

pub fn validate_measure_request(request: &MeasureEvaluationRequest<MeasureEvaluation>) -> Result<()> {
    let evaluation = &request.evaluation;
    if evaluation.patient_id.trim().is_empty() {
        return Err(CohortError::validation("patient id cannot be empty"));
    }
    validate_common(
        &evaluation.data_server_config,
        &evaluation.measure_context,
        &request.measure_artifacts,
    )
}

pub fn validate_patient_list_request(
    request: &MeasureEvaluationRequest<PatientListMeasureEvaluation>,
) -> Result<()> {
    let evaluation = &request.evaluation;
    if evaluation.patient_ids.is_empty() {
        return Err(CohortError::validation("at least one patient id is required"));
    }
    if evaluation.patient_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(CohortError::validation("patient ids cannot be blank"));
    }
    validate_common(
        &evaluation.data_server_config,
        &evaluation.measure_context,
        &request.measure_artifacts,
    )
}

async fn post_measure<E: Serialize>(
    client: &CohortEngineClient,
    operation: &str,
    path: &str,
    evaluation: &E,
    measure_artifacts: Vec<u8>,
) -> Result<MeasureReport> {
    let form = Form::new()
        .part(REQUEST_DATA_PART, json_part(evaluation)?)
        .part(
            MEASURE_PART,
            Part::bytes(measure_artifacts)
                .file_name("measure.zip")
                .mime_str("application/zip")?,
        );

    let url = client.endpoint(&[path])?;
    let response = client
        .send(operation, client.post(url).multipart(form))
        .await?;
    read_json(response).await
}

pub(crate) async fn evaluate_measure(
    client: &CohortEngineClient,
    request: MeasureEvaluationRequest<MeasureEvaluation>,
) -> Result<MeasureReport> {
    validate_measure_request(&request)?;
    tracing::info!(
        "Evaluating measure {:?} for patient {}",
        request.evaluation.measure_context.measure_id,
        request.evaluation.patient_id
    );

    post_measure(
        client,
        "evaluate_measure",
        "evaluation",
        &request.evaluation,
        request.measure_artifacts,
    )
    .await
}

pub(crate) async fn evaluate_patient_list_measure(
    client: &CohortEngineClient,
    request: MeasureEvaluationRequest<PatientListMeasureEvaluation>,
) -> Result<MeasureReport> {
    validate_patient_list_request(&request)?;
    tracing::info!(
        "Evaluating measure {:?} for {} patient(s)",
        request.evaluation.measure_context.measure_id,
        request.evaluation.patient_ids.len()
    );

    post_measure(
        client,
        "evaluate_patient_list_measure",
        "evaluation-patient-list",
        &request.evaluation,
        request.measure_artifacts,
    )
    .await
}

use crate::core::client::{json_part, read_json, CohortEngineClient};
use crate::domain::model::{CohortEvaluationRequest, CohortResult};
use crate::utils::error::{CohortError, Result};
use reqwest::multipart::{Form, Part};

pub const REQUEST_DATA_PART: &str = "request_data";
pub const CQL_DEFINITION_PART: &str = "cql_definition";

/// Checks a request before anything goes on the wire.
pub fn validate_request(request: &CohortEvaluationRequest) -> Result<()> {
    let evaluation = &request.evaluation;
    if evaluation.entrypoint.trim().is_empty() {
        return Err(CohortError::validation("entrypoint must name a CQL library file"));
    }
    if evaluation.define_to_run.trim().is_empty() {
        return Err(CohortError::validation("define_to_run cannot be empty"));
    }
    if evaluation.patient_ids.is_empty() {
        return Err(CohortError::validation("at least one patient id is required"));
    }
    if evaluation.patient_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(CohortError::validation("patient ids cannot be blank"));
    }
    if let Some(id) = evaluation.patient_ids.iter().find(|id| id.contains(',')) {
        return Err(CohortError::validation(format!(
            "patient id '{}' cannot contain a comma",
            id
        )));
    }
    if request.cql_bundle.is_empty() {
        return Err(CohortError::validation("CQL definition archive is empty"));
    }
    crate::utils::validation::validate_url(
        "data_server.endpoint",
        &evaluation.data_server_config.endpoint,
    )?;
    Ok(())
}

pub(crate) async fn evaluate_cohort(
    client: &CohortEngineClient,
    request: CohortEvaluationRequest,
) -> Result<Vec<CohortResult>> {
    validate_request(&request)?;

    let CohortEvaluationRequest {
        evaluation,
        cql_bundle,
    } = request;

    tracing::info!(
        "Evaluating define '{}' in {} for {} patient(s)",
        evaluation.define_to_run,
        evaluation.entrypoint,
        evaluation.patient_ids.len()
    );

    let form = Form::new()
        .part(REQUEST_DATA_PART, json_part(&evaluation)?)
        .part(
            CQL_DEFINITION_PART,
            Part::bytes(cql_bundle)
                .file_name("cql_definition.zip")
                .mime_str("application/zip")?,
        );

    let url = client.endpoint(&["cohort-evaluation"])?;
    let response = client
        .send("evaluate_cohort", client.post(url).multipart(form))
        .await?;

    let results: Vec<CohortResult> = read_json(response).await?;
    tracing::info!("Cohort evaluation returned {} result(s)", results.len());
    Ok(results)
}

use crate::core::client::{json_part, read_json, CohortEngineClient};
use crate::domain::model::{FhirServerConfig, MeasureParameterInfoList, MeasureSelector};
use crate::utils::error::{CohortError, Result};
use reqwest::multipart::Form;

pub const FHIR_DATA_SERVER_CONFIG_PART: &str = "fhir_data_server_config";

pub(crate) async fn get_measure_parameters(
    client: &CohortEngineClient,
    server: &FhirServerConfig,
    selector: &MeasureSelector,
) -> Result<MeasureParameterInfoList> {
    crate::utils::validation::validate_url("data_server.endpoint", &server.endpoint)?;

    let (url, query) = match selector {
        MeasureSelector::Id(id) => {
            if id.trim().is_empty() {
                return Err(CohortError::validation("measure id cannot be empty"));
            }
            tracing::info!("Fetching parameters for measure id {}", id);
            (
                client.endpoint(&["fhir", "measure", id.as_str(), "parameters"])?,
                Vec::new(),
            )
        }
        MeasureSelector::Identifier {
            value,
            system,
            version,
        } => {
            if value.trim().is_empty() {
                return Err(CohortError::validation(
                    "measure identifier value cannot be empty",
                ));
            }
            tracing::info!(
                "Fetching parameters for measure identifier {} (system: {:?}, version: {:?})",
                value,
                system,
                version
            );
            let mut query = Vec::new();
            if let Some(system) = system {
                query.push(("measure_identifier_system", system.as_str()));
            }
            if let Some(version) = version {
                query.push(("measure_version", version.as_str()));
            }
            (
                client.endpoint(&["fhir", "measure", "identifier", value.as_str(), "parameters"])?,
                query,
            )
        }
    };

    let form = Form::new().part(FHIR_DATA_SERVER_CONFIG_PART, json_part(server)?);
    let request = client.post(url).query(&query).multipart(form);

    let response = client.send("get_measure_parameters", request).await?;
    let parameters: MeasureParameterInfoList = read_json(response).await?;

    tracing::debug!(
        "Measure has {} parameter(s)",
        parameters.parameter_info_list.len()
    );
    Ok(parameters)
}

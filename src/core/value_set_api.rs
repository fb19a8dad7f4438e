use crate::core::client::{json_part, CohortEngineClient};
use crate::core::fhir_measures_api::FHIR_DATA_SERVER_CONFIG_PART;
use crate::domain::model::{FhirServerConfig, UpsertOutcome, ValueSetCreated, ValueSetUpload};
use crate::utils::error::{CohortError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

pub const VALUE_SET_PART: &str = "value_set";

pub(crate) async fn create_value_set(
    client: &CohortEngineClient,
    server: &FhirServerConfig,
    value_set: ValueSetUpload,
) -> Result<ValueSetCreated> {
    crate::utils::validation::validate_url("data_server.endpoint", &server.endpoint)?;
    if value_set.spreadsheet.is_empty() {
        return Err(CohortError::validation(format!(
            "value set spreadsheet '{}' is empty",
            value_set.file_name
        )));
    }

    tracing::info!(
        "Uploading value set {} ({} bytes, update_if_exists={})",
        value_set.file_name,
        value_set.spreadsheet.len(),
        value_set.update_if_exists
    );

    let form = Form::new()
        .part(FHIR_DATA_SERVER_CONFIG_PART, json_part(server)?)
        .part(
            VALUE_SET_PART,
            Part::bytes(value_set.spreadsheet)
                .file_name(value_set.file_name)
                .mime_str("application/octet-stream")?,
        );

    let update_if_exists = if value_set.update_if_exists { "true" } else { "false" };
    let url = client.endpoint(&["valueset", ""])?;
    let request = client
        .post(url)
        .query(&[("update_if_exists", update_if_exists)])
        .multipart(form);

    let response = match client.send("create_value_set", request).await {
        Ok(response) => response,
        Err(CohortError::Api {
            status: 409,
            message,
            ..
        }) => return Err(CohortError::Conflict { message }),
        Err(e) => return Err(e),
    };

    let outcome = if response.status() == StatusCode::CREATED {
        UpsertOutcome::Created
    } else {
        UpsertOutcome::Updated
    };
    let id = parse_resource_id(&response.text().await?);

    tracing::info!("Value set {} {:?}", id, outcome);
    Ok(ValueSetCreated { id, outcome })
}

/// The id comes back as plain text, a JSON string, or an object with an id field.
fn parse_resource_id(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(serde_json::Value::String(id)) => id,
        Ok(serde_json::Value::Object(map)) => ["valueSetId", "id"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .unwrap_or_default()
            .to_string(),
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_id_forms() {
        assert_eq!(parse_resource_id("vs-123\n"), "vs-123");
        assert_eq!(parse_resource_id("\"vs-123\""), "vs-123");
        assert_eq!(parse_resource_id(r#"{"valueSetId":"vs-1"}"#), "vs-1");
        assert_eq!(parse_resource_id(r#"{"id":"vs-2"}"#), "vs-2");
        assert_eq!(parse_resource_id(""), "");
    }
}

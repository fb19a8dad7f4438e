use cohort_client::{
    CohortEngineApi, CohortEngineClient, CohortError, Credentials, DefineReturnOption,
    FhirServerConfig, MeasureContext, MeasureEvaluation, MeasureEvaluationRequest,
    MeasureEvidenceOptions, MeasureSelector, Parameter, PatientListMeasureEvaluation,
};
use httpmock::prelude::*;
use std::collections::BTreeMap;

fn measure_context() -> MeasureContext {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "Measurement Period".to_string(),
        Parameter::parse("interval:date:2019-07-04,date:2020-07-04").unwrap(),
    );
    MeasureContext::from_selector(MeasureSelector::Id("measure-1".to_string()), parameters)
}

fn measure_request() -> MeasureEvaluationRequest<MeasureEvaluation> {
    MeasureEvaluationRequest {
        evaluation: MeasureEvaluation {
            data_server_config: FhirServerConfig::new("http://fhir.local/fhir-server/api/v4"),
            terminology_server_config: None,
            patient_id: "patientId".to_string(),
            measure_context: measure_context(),
            evidence_options: Some(MeasureEvidenceOptions {
                include_evaluated_resources: false,
                define_return_option: DefineReturnOption::All,
            }),
            expand_value_sets: Some(true),
            search_page_size: Some(500),
        },
        // ASCII stand-in for the zip so the multipart body can be matched as text
        measure_artifacts: b"PK-measure-archive".to_vec(),
    }
}

fn patient_list_request(patient_ids: &[&str]) -> MeasureEvaluationRequest<PatientListMeasureEvaluation> {
    MeasureEvaluationRequest {
        evaluation: PatientListMeasureEvaluation {
            data_server_config: FhirServerConfig::new("http://fhir.local/fhir-server/api/v4"),
            terminology_server_config: None,
            patient_ids: patient_ids.iter().map(|id| id.to_string()).collect(),
            measure_context: measure_context(),
            evidence_options: None,
            expand_value_sets: None,
            search_page_size: None,
        },
        measure_artifacts: b"PK-measure-archive".to_vec(),
    }
}

#[tokio::test]
async fn test_evaluate_measure_builds_multipart_request() {
    let server = MockServer::start();

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/evaluation")
            .query_param("version", "2021-07-22")
            .header("authorization", "Bearer fhir-token")
            .body_contains("name=\"request_data\"")
            .body_contains("name=\"measure\"")
            .body_contains("\"patientId\":\"patientId\"")
            .body_contains("\"measureId\":\"measure-1\"")
            .body_contains("\"defineReturnOption\":\"ALL\"")
            .body_contains("\"searchPageSize\":500")
            .body_contains("PK-measure-archive");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "resourceType": "MeasureReport",
                "status": "complete",
                "subject": {"reference": "Patient/patientId"}
            }));
    });

    let client = CohortEngineClient::new(&server.base_url())
        .unwrap()
        .with_credentials(Credentials::Bearer("fhir-token".to_string()));

    let report = client.evaluate_measure(measure_request()).await.unwrap();

    api_mock.assert();
    assert_eq!(report["resourceType"], "MeasureReport");
    assert_eq!(report["subject"]["reference"], "Patient/patientId");
}

#[tokio::test]
async fn test_evaluate_patient_list_measure_sends_id_array() {
    let server = MockServer::start();

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/evaluation-patient-list")
            .query_param("version", "2021-07-22")
            .body_contains("\"patientIds\":[\"patientId1\",\"patientId2\"]")
            .body_contains("name=\"measure\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({"resourceType": "MeasureReport", "type": "subject-list"}));
    });

    let client = CohortEngineClient::new(&server.base_url()).unwrap();
    let report = client
        .evaluate_patient_list_measure(patient_list_request(&["patientId1", "patientId2"]))
        .await
        .unwrap();

    api_mock.assert();
    assert_eq!(report["type"], "subject-list");
}

#[tokio::test]
async fn test_evaluate_measure_unknown_measure_is_api_error() {
    let server = MockServer::start();

    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/evaluation");
        then.status(400)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "statusCode": 400,
                "errors": [{"code": 400, "message": "Failed to resolve Measure resource 'unknown'"}]
            }));
    });

    let client = CohortEngineClient::new(&server.base_url()).unwrap();
    let mut request = measure_request();
    request.evaluation.measure_context.measure_id = Some("unknown".to_string());
    let err = client.evaluate_measure(request).await.unwrap_err();

    api_mock.assert();
    assert_eq!(err.status(), Some(400));
    assert!(err
        .user_friendly_message()
        .contains("Failed to resolve Measure resource 'unknown'"));
}

#[tokio::test]
async fn test_evaluate_measure_with_id_and_identifier_is_not_sent() {
    let server = MockServer::start();

    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/evaluation");
        then.status(200).json_body(serde_json::json!({}));
    });

    let mut request = measure_request();
    request.evaluation.measure_context.identifier = Some(cohort_client::MeasureIdentifier {
        value: "identifier".to_string(),
        system: None,
    });

    let client = CohortEngineClient::new(&server.base_url()).unwrap();
    let result = client.evaluate_measure(request).await;

    assert!(matches!(result, Err(CohortError::ValidationError { .. })));
    assert_eq!(api_mock.hits(), 0);
}

#[tokio::test]
async fn test_evaluate_patient_list_with_blank_id_is_not_sent() {
    let server = MockServer::start();

    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/evaluation-patient-list");
        then.status(200).json_body(serde_json::json!({}));
    });

    let client = CohortEngineClient::new(&server.base_url()).unwrap();
    let result = client
        .evaluate_patient_list_measure(patient_list_request(&["patientId1", ""]))
        .await;

    assert!(matches!(result, Err(CohortError::ValidationError { .. })));
    assert_eq!(api_mock.hits(), 0);
}

#[tokio::test]
async fn test_evaluate_measure_non_json_success_body_is_serialization_error() {
    let server = MockServer::start();

    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/evaluation");
        then.status(200).body("<html>maintenance</html>");
    });

    let client = CohortEngineClient::new(&server.base_url()).unwrap();
    let result = client.evaluate_measure(measure_request()).await;

    api_mock.assert();
    assert!(matches!(result, Err(CohortError::SerializationError(_))));
}

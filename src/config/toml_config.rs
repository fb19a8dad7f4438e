use crate::core::client::{DEFAULT_API_VERSION, DEFAULT_TIMEOUT};
use crate::domain::model::FhirServerConfig;
use crate::domain::ports::{ConfigProvider, Credentials};
use crate::utils::error::{CohortError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const MAX_TIMEOUT_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    pub data_server: FhirServerConfig,
    pub terminology_server: Option<FhirServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub version: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CohortError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CohortError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CohortError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("service.base_url", &self.service.base_url)?;
        validation::validate_url("data_server.endpoint", &self.data_server.endpoint)?;
        if let Some(terminology) = &self.terminology_server {
            validation::validate_url("terminology_server.endpoint", &terminology.endpoint)?;
        }

        if let Some(version) = &self.service.version {
            validation::validate_non_empty_string("service.version", version)?;
        }

        if let Some(timeout) = self.service.timeout_seconds {
            validation::validate_range("service.timeout_seconds", timeout, 1, MAX_TIMEOUT_SECONDS)?;
        }

        if let Some(auth) = &self.service.auth {
            match (&auth.user, &auth.token) {
                (Some(_), Some(_)) => {
                    return Err(CohortError::ConfigValidationError {
                        field: "service.auth".to_string(),
                        message: "set either user/password or token, not both".to_string(),
                    })
                }
                (None, None) => {
                    return Err(CohortError::ConfigValidationError {
                        field: "service.auth".to_string(),
                        message: "auth section needs a user or a token".to_string(),
                    })
                }
                (Some(user), None) => {
                    validation::validate_non_empty_string("service.auth.user", user)?;
                    validation::validate_required_field("service.auth.password", &auth.password)?;
                }
                (None, Some(token)) => {
                    validation::validate_non_empty_string("service.auth.token", token)?
                }
            }
        }

        Ok(())
    }
}

impl ConfigProvider for ClientConfig {
    fn base_url(&self) -> &str {
        &self.service.base_url
    }

    fn api_version(&self) -> &str {
        self.service.version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    fn timeout(&self) -> Duration {
        self.service
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    fn credentials(&self) -> Option<Credentials> {
        let auth = self.service.auth.as_ref()?;
        if let Some(token) = &auth.token {
            return Some(Credentials::Bearer(token.clone()));
        }
        auth.user.as_ref().map(|user| Credentials::Basic {
            user: user.clone(),
            password: auth.password.clone().unwrap_or_default(),
        })
    }

    fn data_server(&self) -> &FhirServerConfig {
        &self.data_server
    }

    fn terminology_server(&self) -> Option<&FhirServerConfig> {
        self.terminology_server.as_ref()
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[service]
base_url = "http://localhost:9080/services/cohort/api"

[data_server]
endpoint = "https://fhir.example.com/fhir-server/api/v4"
tenant_id = "default"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = ClientConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.base_url(), "http://localhost:9080/services/cohort/api");
        assert_eq!(config.api_version(), DEFAULT_API_VERSION);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.data_server().tenant_id.as_deref(), Some("default"));
        assert!(config.terminology_server().is_none());
        assert!(config.credentials().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COHORT_TEST_FHIR_PASSWORD", "change-password");

        let toml_content = r#"
[service]
base_url = "http://localhost:9080/services/cohort/api"
version = "2021-07-22"
timeout_seconds = 30

[service.auth]
user = "fhiruser"
password = "${COHORT_TEST_FHIR_PASSWORD}"

[data_server]
endpoint = "https://fhir.example.com/fhir-server/api/v4"
"#;

        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.credentials(),
            Some(Credentials::Basic {
                user: "fhiruser".to_string(),
                password: "change-password".to_string()
            })
        );
        assert_eq!(config.timeout(), Duration::from_secs(30));

        std::env::remove_var("COHORT_TEST_FHIR_PASSWORD");
    }

    #[test]
    fn test_unknown_env_var_is_left_verbatim() {
        let toml_content = r#"
[service]
base_url = "http://localhost:9080"

[service.auth]
token = "${COHORT_TEST_UNSET_TOKEN_VARIABLE}"

[data_server]
endpoint = "https://fhir.example.com"
"#;
        let config = ClientConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.credentials(),
            Some(Credentials::Bearer("${COHORT_TEST_UNSET_TOKEN_VARIABLE}".to_string()))
        );
    }

    #[test]
    fn test_config_validation() {
        let invalid_url = BASIC.replace("https://fhir.example.com/fhir-server/api/v4", "fhir-server");
        let config = ClientConfig::from_toml_str(&invalid_url).unwrap();
        assert!(config.validate().is_err());

        let zero_timeout = BASIC.replace("[data_server]", "timeout_seconds = 0\n\n[data_server]");
        let config = ClientConfig::from_toml_str(&zero_timeout).unwrap();
        assert!(config.validate().is_err());

        let both_auth = BASIC.replace(
            "[data_server]",
            "[service.auth]\nuser = \"u\"\ntoken = \"t\"\n\n[data_server]",
        );
        let config = ClientConfig::from_toml_str(&both_auth).unwrap();
        assert!(matches!(
            config.validate(),
            Err(CohortError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_basic_auth_requires_password() {
        let user_only = BASIC.replace(
            "[data_server]",
            "[service.auth]\nuser = \"fhiruser\"\n\n[data_server]",
        );
        let config = ClientConfig::from_toml_str(&user_only).unwrap();
        match config.validate() {
            Err(CohortError::MissingConfigError { field }) => {
                assert_eq!(field, "service.auth.password")
            }
            other => panic!("expected missing password, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let result = ClientConfig::from_toml_str("[service]\nbase_url = \"http://x\"\n");
        assert!(matches!(
            result,
            Err(CohortError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = ClientConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.data_server.endpoint, "https://fhir.example.com/fhir-server/api/v4");
    }
}

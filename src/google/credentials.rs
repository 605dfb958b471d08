//! Per-request credential resolution for both backends.
//!
//! Nothing here is cached: every call builds a fresh `ClientContext`, so two
//! requests never share a token or project binding.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::transport::Credential;
use crate::config::GoogleConfig;
use crate::error::ConfigError;
use crate::models::Backend;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolved credentials and target for a single request.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub backend: Backend,
    pub credential: Credential,
    pub project_id: Option<String>,
    pub region: String,
    pub base_url: String,
}

impl ClientContext {
    pub fn new(backend: Backend, credential: Credential, base_url: impl Into<String>) -> Self {
        Self {
            backend,
            credential,
            project_id: None,
            region: crate::config::DEFAULT_REGION.to_string(),
            base_url: base_url.into(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

/// The subset of a service-account key file needed for the JWT grant.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    pub client_email: String,
    #[serde(deserialize_with = "secret_string")]
    pub private_key: SecretString,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parses the key blob. Error messages carry only the position of the
    /// problem, never the blob's contents.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| {
            ConfigError::InvalidCredentials(format!(
                "{:?} error at line {} column {}",
                e.classify(),
                e.line(),
                e.column()
            ))
        })
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
pub struct CredentialResolver {
    config: Arc<GoogleConfig>,
    http: Client,
}

impl CredentialResolver {
    pub fn new(config: GoogleConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub async fn resolve(&self, backend: Backend) -> Result<ClientContext, ConfigError> {
        match backend {
            Backend::Studio => self.resolve_studio(),
            Backend::Vertex => self.resolve_vertex().await,
        }
    }

    fn resolve_studio(&self) -> Result<ClientContext, ConfigError> {
        let key = self.config.api_key.clone().ok_or(ConfigError::MissingKey)?;
        Ok(ClientContext::new(
            Backend::Studio,
            Credential::ApiKey(key),
            self.config.studio_base_url.clone(),
        )
        .with_region(self.config.region.clone()))
    }

    async fn resolve_vertex(&self) -> Result<ClientContext, ConfigError> {
        let (token, project_id) = match &self.config.vertex_credentials {
            Some(blob) => {
                let key = ServiceAccountKey::from_json(blob.expose_secret()).map_err(|e| {
                    log::error!("Vertex credentials are unusable: {}", e);
                    e
                })?;
                let token = self.exchange_service_account(&key).await?;
                let project = key.project_id.clone().or_else(|| self.config.project_id.clone());
                (token, project)
            }
            None => (self.ambient_token().await?, self.config.project_id.clone()),
        };
        let project_id = project_id.ok_or(ConfigError::MissingProject)?;

        Ok(ClientContext::new(
            Backend::Vertex,
            Credential::Bearer(token),
            self.config.vertex_base_url.clone(),
        )
        .with_project(project_id)
        .with_region(self.config.region.clone()))
    }

    /// OAuth 2.0 JWT-bearer grant with the service account's RSA key.
    async fn exchange_service_account(
        &self,
        key: &ServiceAccountKey,
    ) -> Result<SecretString, ConfigError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: key.token_uri(),
            iat: now,
            exp: now + 3600,
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|_| ConfigError::InvalidCredentials("private_key is not a valid RSA PEM".into()))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| ConfigError::TokenUnavailable(format!("failed to sign JWT: {}", e)))?;

        let response = self
            .http
            .post(key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ConfigError::TokenUnavailable(format!("token endpoint unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(ConfigError::TokenUnavailable(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConfigError::TokenUnavailable(format!("unreadable token response: {}", e)))?;

        log::debug!("Obtained Vertex access token for {}", key.client_email);
        Ok(SecretString::from(token.access_token))
    }

    /// Token from the environment, else from the GCE metadata server.
    async fn ambient_token(&self) -> Result<SecretString, ConfigError> {
        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }

        log::debug!("No Vertex credentials configured, asking the metadata server");
        let response = self
            .http
            .get(&self.config.metadata_token_url)
            .header("Metadata-Flavor", "Google")
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                ConfigError::MissingCredentials(format!("metadata server unreachable: {}", e))
            })?;
        if !response.status().is_success() {
            return Err(ConfigError::MissingCredentials(format!(
                "metadata server returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await.map_err(|e| {
            ConfigError::MissingCredentials(format!("unreadable metadata token: {}", e))
        })?;
        Ok(SecretString::from(token.access_token))
    }
}

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STUDIO_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_VERTEX_BASE_URL: &str = "https://{region}-aiplatform.googleapis.com";
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash";

/// Credentials and endpoints for the two Google backends.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Option<SecretString>,
    pub vertex_credentials: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub project_id: Option<String>,
    pub region: String,
    pub studio_base_url: String,
    pub vertex_base_url: String,
    pub metadata_token_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        GoogleConfig {
            api_key: None,
            vertex_credentials: None,
            access_token: None,
            project_id: None,
            region: DEFAULT_REGION.to_string(),
            studio_base_url: DEFAULT_STUDIO_BASE_URL.to_string(),
            vertex_base_url: DEFAULT_VERTEX_BASE_URL.to_string(),
            metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
        }
    }
}

impl GoogleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        GoogleConfig {
            api_key: non_empty_var("GOOGLE_API_KEY").map(SecretString::from),
            vertex_credentials: non_empty_var("VERTEX_CREDENTIALS").map(SecretString::from),
            access_token: non_empty_var("GOOGLE_OAUTH_ACCESS_TOKEN").map(SecretString::from),
            project_id: non_empty_var("GCP_PROJECT_ID"),
            region: non_empty_var("GCP_REGION").unwrap_or(defaults.region),
            studio_base_url: non_empty_var("STUDIO_BASE_URL").unwrap_or(defaults.studio_base_url),
            vertex_base_url: non_empty_var("VERTEX_BASE_URL").unwrap_or(defaults.vertex_base_url),
            metadata_token_url: non_empty_var("METADATA_TOKEN_URL")
                .unwrap_or(defaults.metadata_token_url),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_vertex_credentials(mut self, credentials_json: impl Into<String>) -> Self {
        self.vertex_credentials = Some(SecretString::from(credentials_json.into()));
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Points both backends at other hosts, e.g. a mock server.
    pub fn with_base_urls(mut self, studio: impl Into<String>, vertex: impl Into<String>) -> Self {
        self.studio_base_url = studio.into();
        self.vertex_base_url = vertex.into();
        self
    }

    pub fn with_metadata_token_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_token_url = url.into();
        self
    }
}

/// Cadence of the long-running operation poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_secs(2),
            max_attempts: 20,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: Option<u16>,
    pub google: GoogleConfig,
    pub poll: PollConfig,
    pub request_timeout: Duration,
    pub max_reference_images: usize,
    /// `None` keeps the routing table's fallback, `Some("")` disables fallback.
    pub fallback_model: Option<String>,
    pub routing_table_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: None,
            google: GoogleConfig::default(),
            poll: PollConfig::default(),
            request_timeout: Duration::from_secs(30),
            max_reference_images: 3,
            fallback_model: None,
            routing_table_path: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());
        let interval = env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll.interval);
        let max_attempts = env::var("POLL_MAX_ATTEMPTS")
            .ok()
            .and_then(|n| n.parse().ok())
            .unwrap_or(defaults.poll.max_attempts);
        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let max_reference_images = env::var("MAX_REFERENCE_IMAGES")
            .ok()
            .and_then(|n| n.parse().ok())
            .unwrap_or(defaults.max_reference_images);

        Config {
            port,
            google: GoogleConfig::from_env(),
            poll: PollConfig::new(interval, max_attempts),
            request_timeout,
            max_reference_images,
            fallback_model: env::var("FALLBACK_MODEL").ok(),
            routing_table_path: non_empty_var("ROUTING_TABLE").map(PathBuf::from),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_google(mut self, config: GoogleConfig) -> Self {
        self.google = config;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_reference_images(mut self, max: usize) -> Self {
        self.max_reference_images = max;
        self
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback_model = Some(String::new());
        self
    }

    pub fn with_routing_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.routing_table_path = Some(path.into());
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

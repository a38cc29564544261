//! Configuration manager for emodiary.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:8888";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening socket address.
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to JsonWebToken configuration.
    #[serde(default, skip_serializing)]
    pub token: Token,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to the translation service.
    #[serde(skip_serializing)]
    pub translator: Option<Translator>,
    /// Related to the emotion model server.
    #[serde(skip_serializing)]
    pub classifier: Option<Classifier>,
    /// Related to "Sign in with Google".
    #[serde(skip_serializing)]
    pub google: Option<Google>,
    /// Outbound HTTP calls retry policy.
    #[serde(default, skip_serializing)]
    pub retry: Retry,
    /// Accounts created on startup.
    #[serde(default, skip_serializing)]
    pub seed: Vec<SeedAccount>,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_owned()
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// HMAC secret for access tokens.
    pub access_secret: String,
    /// HMAC secret for refresh tokens.
    pub refresh_secret: String,
    /// One of `HS256`, `HS384` or `HS512`.
    pub algorithm: String,
    pub access_ttl_minutes: u64,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            access_secret: String::default(),
            refresh_secret: String::default(),
            algorithm: "HS256".into(),
            access_ttl_minutes: 60,
        }
    }
}

/// Google Translate configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Translator {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

fn default_target_language() -> String {
    "en".into()
}

/// TensorFlow Serving configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Classifier {
    /// Base URL of the model server, e.g. `http://localhost:8501`.
    pub endpoint: String,
    pub model: String,
    /// Keras tokenizer exported with `tokenizer.to_json()`.
    pub tokenizer_path: PathBuf,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// `pre` or `post`.
    #[serde(default)]
    pub padding: Option<String>,
    /// Output order of the model.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

fn default_max_length() -> usize {
    100
}

/// Google identity configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Google {
    pub client_id: String,
    #[serde(default = "default_tokeninfo")]
    pub tokeninfo_endpoint: String,
}

fn default_tokeninfo() -> String {
    "https://oauth2.googleapis.com/tokeninfo".into()
}

/// Retry policy for upstream services.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    /// Total attempts, first call included.
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff_ms: 250,
        }
    }
}

/// Account created on startup when missing.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.as_str().trim_end_matches('/').to_owned())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file)
            {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();

        // normalize URLs.
        if let Some(translator) = config.translator.as_mut() {
            translator.endpoint = self.normalize_url(&translator.endpoint)?;
        }
        if let Some(classifier) = config.classifier.as_mut() {
            classifier.endpoint = self.normalize_url(&classifier.endpoint)?;
        }
        if let Some(google) = config.google.as_mut() {
            google.tokeninfo_endpoint =
                self.normalize_url(&google.tokeninfo_endpoint)?;
        }

        config.apply_env(|key| std::env::var(key).ok());

        Ok(Arc::new(config))
    }

    /// Secrets set in the environment win over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = var("ACCESS_TOKEN_SECRET") {
            self.token.access_secret = secret;
        }
        if let Some(secret) = var("REFRESH_TOKEN_SECRET") {
            self.token.refresh_secret = secret;
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            address: default_address(),
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}

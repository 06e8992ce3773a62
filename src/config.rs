//! Configuration and secrets.
//!
//! Settings come from a JSON file (default `config.json`) with `CRM_`-prefixed environment
//! variables layered on top; nested keys use `__`, e.g. `CRM_DYNAMODB__TABLE_NAME=contacts`.
//!
//! ```json
//! {
//!   "aws": { "region": "us-east-1" },
//!   "dynamodb": { "table_name": "crm_contacts", "primary_key_column": "EmailId" },
//!   "api": { "host": "0.0.0.0", "port": 5000 }
//! }
//! ```
//!
//! Secrets are never read from the file. They come from the process environment (which the
//! binaries populate from `.env` first): `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
//! `API_AUTH_TOKEN`.

use std::path::Path;

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::store::dynamodb::DynamoSettings;

/// Config file read when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "CRM_";

const SECRET_NAMES: [&str; 3] = ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "API_AUTH_TOKEN"];

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// AWS connection.
    pub aws: AwsConfig,
    /// Target table.
    pub dynamodb: TableConfig,
    /// Read API listener.
    #[serde(default)]
    pub api: ApiConfig,
}

/// AWS connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region, e.g. `us-east-1`.
    pub region: String,
    /// Endpoint override for local DynamoDB.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Remote table settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name.
    pub table_name: String,
    /// Column used as the hash key.
    pub primary_key_column: String,
}

/// Read API listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// The layered sources: `path`, then `CRM_*` environment variables.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Json::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load settings from `path` and the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(path).extract()?)
    }

    /// DynamoDB connection settings for these credentials.
    pub fn dynamo_settings(&self, credentials: &AwsCredentials) -> DynamoSettings {
        DynamoSettings {
            region: self.aws.region.clone(),
            endpoint_url: self.aws.endpoint_url.clone(),
            access_key_id: credentials.access_key_id.clone(),
            secret_access_key: credentials.secret_access_key.clone(),
        }
    }
}

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Default, Deserialize)]
struct RawSecrets {
    #[serde(default, deserialize_with = "scalar_text")]
    aws_access_key_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    aws_secret_access_key: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    api_auth_token: Option<String>,
}

// Env values are parsed, so an all-digit token arrives as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

fn scalar_text<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Int(i) => i.to_string(),
        Scalar::UInt(u) => u.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

/// Secrets read from the environment. Empty values count as missing.
#[derive(Default)]
pub struct Secrets {
    raw: RawSecrets,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("aws_access_key_id", &self.raw.aws_access_key_id.is_some())
            .field("aws_secret_access_key", &self.raw.aws_secret_access_key.is_some())
            .field("api_auth_token", &self.raw.api_auth_token.is_some())
            .finish()
    }
}

fn require(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingSecret { name })
}

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = Figment::from(Env::raw().only(&SECRET_NAMES)).extract()?;
        Ok(Self { raw })
    }

    /// `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`; both are required.
    pub fn aws_credentials(&self) -> Result<AwsCredentials, ConfigError> {
        Ok(AwsCredentials {
            access_key_id: require(&self.raw.aws_access_key_id, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: require(&self.raw.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY")?,
        })
    }

    /// `API_AUTH_TOKEN`.
    pub fn api_token(&self) -> Result<String, ConfigError> {
        require(&self.raw.api_auth_token, "API_AUTH_TOKEN")
    }
}

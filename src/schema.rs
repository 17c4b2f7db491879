use std::fmt;
use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use jsonschema::Validator;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::info;

use crate::error::DumpError;

pub trait SchemaFetcher {
    fn fetch(&self, url: &str) -> Result<String, DumpError>;
}

#[derive(Clone)]
pub struct SchemaHttpClient {
    client: Client,
}

impl SchemaHttpClient {
    pub fn new() -> Result<Self, DumpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ipr-ebisearch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DumpError::SchemaHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| DumpError::SchemaHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl SchemaFetcher for SchemaHttpClient {
    fn fetch(&self, url: &str) -> Result<String, DumpError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| DumpError::SchemaHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "schema request failed".to_string());
            return Err(DumpError::SchemaStatus { status, message });
        }
        response
            .text()
            .map_err(|err| DumpError::SchemaHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.message)
    }
}

pub struct SchemaStore {
    validator: Validator,
}

impl fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaStore").finish_non_exhaustive()
    }
}

impl SchemaStore {
    pub fn from_value(schema: Value) -> Result<Self, DumpError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| DumpError::SchemaParse(err.to_string()))?;
        Ok(Self { validator })
    }

    pub fn load(
        file: Option<&Utf8Path>,
        url: Option<&str>,
        fetcher: &dyn SchemaFetcher,
    ) -> Result<Self, DumpError> {
        let text = match (file, url) {
            (Some(file), _) if file.as_std_path().is_file() => fs::read_to_string(file)
                .map_err(|err| DumpError::Filesystem(format!("read {file}: {err}")))?,
            (file, Some(url)) => {
                let text = fetcher.fetch(url)?;
                if let Some(file) = file {
                    if let Some(parent) = file.parent().filter(|p| !p.as_str().is_empty()) {
                        fs::create_dir_all(parent)
                            .map_err(|err| DumpError::Filesystem(err.to_string()))?;
                    }
                    fs::write(file, &text)
                        .map_err(|err| DumpError::Filesystem(format!("write {file}: {err}")))?;
                    info!(path = %file, url, "cached schema document");
                }
                text
            }
            _ => return Err(DumpError::MissingSchema),
        };
        let schema = serde_json::from_str(&text).map_err(|err| DumpError::SchemaParse(err.to_string()))?;
        Self::from_value(schema)
    }

    pub fn validate(&self, instance: &Value) -> Vec<SchemaViolation> {
        self.validator
            .iter_errors(instance)
            .map(|err| SchemaViolation {
                path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect()
    }
}

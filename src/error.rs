use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DumpError {
    #[error("missing config file ipr-ebisearch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("record {accession} is missing required field `{field}`")]
    MissingField {
        accession: String,
        field: &'static str,
    },

    #[error("record {accession}: malformed `{field}` document: {message}")]
    EmbeddedJson {
        accession: String,
        field: &'static str,
        message: String,
    },

    #[error("record {accession}: invalid entry_date `{value}`")]
    InvalidDate { accession: String, value: String },

    #[error("record {accession}: hierarchy node without accession")]
    HierarchyNode { accession: String },

    #[error("record {accession}: hierarchy deeper than {limit} levels")]
    HierarchyTooDeep { accession: String, limit: usize },

    #[error("record {accession}: hierarchy cycle through {repeated}")]
    HierarchyCycle { accession: String, repeated: String },

    #[error("failed to read record source: {0}")]
    SourceRead(String),

    #[error("search request failed: {0}")]
    SearchHttp(String),

    #[error("search service returned status {status}: {message}")]
    SearchStatus { status: u16, message: String },

    #[error("annotation REST request failed: {0}")]
    RestHttp(String),

    #[error("annotation REST service returned status {status}: {message}")]
    RestStatus { status: u16, message: String },

    #[error("schema request failed: {0}")]
    SchemaHttp(String),

    #[error("schema service returned status {status}: {message}")]
    SchemaStatus { status: u16, message: String },

    #[error("failed to parse schema document: {0}")]
    SchemaParse(String),

    #[error("no schema available: configure a schema file or url")]
    MissingSchema,

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DumpError {
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            DumpError::EmbeddedJson { .. }
                | DumpError::InvalidDate { .. }
                | DumpError::HierarchyNode { .. }
                | DumpError::HierarchyTooDeep { .. }
                | DumpError::HierarchyCycle { .. }
        )
    }
}

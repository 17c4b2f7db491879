use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::annotation::{DEFAULT_PAGE_SIZE, Pagination};
use crate::assemble::ReleaseInfo;
use crate::error::DumpError;

pub const DEFAULT_CONFIG_FILE: &str = "ipr-ebisearch.json";
pub const DEFAULT_LOG_FILE: &str = "interpro7-ebisearch.log";
pub const DEFAULT_RECORDS_PER_FILE: usize = 500;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub release: Option<ReleaseSection>,
    pub source: SourceSection,
    #[serde(default)]
    pub schema: Option<SchemaSection>,
    #[serde(default)]
    pub records_per_file: Option<usize>,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub annotation: Option<AnnotationSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReleaseSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SourceSection {
    #[serde(default)]
    pub dump_file: Option<String>,
    #[serde(default)]
    pub cache_file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SchemaSection {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum AnnotationSection {
    Search {
        base_url: String,
        #[serde(default)]
        page_size: Option<usize>,
        #[serde(default)]
        pagination: Option<Pagination>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    Rest {
        base_url: String,
        segment: String,
        #[serde(default)]
        dbname: Option<String>,
        #[serde(default)]
        page_size: Option<usize>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationBackend {
    Search {
        base_url: String,
        page_size: usize,
        pagination: Pagination,
        timeout: Duration,
    },
    Rest {
        base_url: String,
        segment: String,
        dbname: Option<String>,
        page_size: usize,
        timeout: Duration,
    },
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub release: ReleaseInfo,
    pub dump_file: Option<Utf8PathBuf>,
    pub cache_file: Option<Utf8PathBuf>,
    pub schema_file: Option<Utf8PathBuf>,
    pub schema_url: Option<String>,
    pub records_per_file: usize,
    pub log_file: Utf8PathBuf,
    pub annotation: Option<AnnotationBackend>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DumpError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(DumpError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DumpError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DumpError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DumpError> {
        let release = config.release.unwrap_or_default();
        let release = ReleaseInfo {
            name: release.name.unwrap_or_else(|| "InterPro 7".to_string()),
            version: release.version.unwrap_or_else(|| "1".to_string()),
        };

        let records_per_file = config.records_per_file.unwrap_or(DEFAULT_RECORDS_PER_FILE);
        if records_per_file == 0 {
            return Err(DumpError::InvalidConfig(
                "records_per_file must be greater than 0".to_string(),
            ));
        }

        let dump_file = config.source.dump_file.map(Utf8PathBuf::from);
        let cache_file = config.source.cache_file.map(Utf8PathBuf::from);
        if dump_file.is_none() && cache_file.is_none() {
            return Err(DumpError::InvalidConfig(
                "source needs a dump_file or a cache_file".to_string(),
            ));
        }

        let schema = config.schema.unwrap_or_default();
        let annotation = config.annotation.map(resolve_annotation).transpose()?;

        Ok(ResolvedConfig {
            release,
            dump_file,
            cache_file,
            schema_file: schema.file.map(Utf8PathBuf::from),
            schema_url: schema.url,
            records_per_file,
            log_file: Utf8PathBuf::from(
                config
                    .log_file
                    .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            ),
            annotation,
        })
    }
}

fn resolve_annotation(section: AnnotationSection) -> Result<AnnotationBackend, DumpError> {
    let backend = match section {
        AnnotationSection::Search {
            base_url,
            page_size,
            pagination,
            timeout_secs,
        } => AnnotationBackend::Search {
            base_url,
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            pagination: pagination.unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs.unwrap_or(30)),
        },
        AnnotationSection::Rest {
            base_url,
            segment,
            dbname,
            page_size,
            timeout_secs,
        } => AnnotationBackend::Rest {
            base_url,
            segment,
            dbname,
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            timeout: Duration::from_secs(timeout_secs.unwrap_or(30)),
        },
    };
    let page_size = match &backend {
        AnnotationBackend::Search { page_size, .. } | AnnotationBackend::Rest { page_size, .. } => {
            *page_size
        }
    };
    if page_size == 0 {
        return Err(DumpError::InvalidConfig(
            "annotation page_size must be greater than 0".to_string(),
        ));
    }
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_release_and_batching() {
        let config = Config {
            source: SourceSection {
                dump_file: Some("entries.json".to_string()),
                cache_file: None,
            },
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.release.name, "InterPro 7");
        assert_eq!(resolved.release.version, "1");
        assert_eq!(resolved.records_per_file, DEFAULT_RECORDS_PER_FILE);
        assert_eq!(resolved.log_file, Utf8PathBuf::from(DEFAULT_LOG_FILE));
        assert!(resolved.annotation.is_none());
    }
}

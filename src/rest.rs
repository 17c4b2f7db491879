use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::annotation::{EnrichOutcome, Enricher};
use crate::domain::{CrossRef, EntryKey, OutputDocument, create_cross_ref};
use crate::error::DumpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestQuery {
    pub segment: String,
    pub source_database: String,
    pub accession: String,
    pub page: u32,
    pub page_size: usize,
}

impl RestQuery {
    pub fn path(&self) -> String {
        format!(
            "{}/entry/{}/{}",
            self.segment,
            self.source_database.to_lowercase(),
            self.accession
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestPage {
    pub count: u64,
    #[serde(default)]
    pub results: Vec<RestResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestResult {
    pub metadata: RestMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestMetadata {
    pub accession: String,
    #[serde(default)]
    pub source_database: Option<String>,
}

pub trait RestClient: Send + Sync {
    fn fetch_page(&self, query: &RestQuery) -> Result<RestPage, DumpError>;
}

#[derive(Clone)]
pub struct RestHttpClient {
    client: Client,
    base_url: String,
}

impl RestHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DumpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ipr-ebisearch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DumpError::RestHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| DumpError::RestHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl RestClient for RestHttpClient {
    fn fetch_page(&self, query: &RestQuery) -> Result<RestPage, DumpError> {
        let url = format!("{}/{}", self.base_url, query.path());
        let page = query.page.to_string();
        let page_size = query.page_size.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("page", page.as_str()), ("page_size", page_size.as_str())])
            .send()
            .map_err(|err| DumpError::RestHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "annotation REST request failed".to_string());
            return Err(DumpError::RestStatus { status, message });
        }
        response
            .json()
            .map_err(|err| DumpError::RestHttp(err.to_string()))
    }
}

pub struct RestEnricher<C: RestClient> {
    client: C,
    segment: String,
    page_size: usize,
    dbname: Option<String>,
}

impl<C: RestClient> RestEnricher<C> {
    pub fn new(client: C, segment: &str, page_size: usize, dbname: Option<String>) -> Self {
        Self {
            client,
            segment: segment.trim_matches('/').to_string(),
            page_size,
            dbname,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn dbname_for(&self, metadata: &RestMetadata) -> Option<String> {
        self.dbname
            .clone()
            .or_else(|| metadata.source_database.clone())
            .map(|name| name.to_uppercase())
            .filter(|name| !name.trim().is_empty())
    }
}

impl<C: RestClient> Enricher for RestEnricher<C> {
    fn enrich(&self, key: &EntryKey, document: &mut OutputDocument) -> EnrichOutcome {
        let mut outcome = EnrichOutcome::default();
        let mut seen: HashSet<CrossRef> = HashSet::new();
        let mut yielded: u64 = 0;
        let mut count: u64 = 1;
        let mut page: u32 = 1;

        while yielded < count {
            let query = RestQuery {
                segment: self.segment.clone(),
                source_database: key.source_database.clone(),
                accession: key.accession.clone(),
                page,
                page_size: self.page_size,
            };
            let response = match self.client.fetch_page(&query) {
                Ok(response) => response,
                Err(err) => {
                    error!(
                        accession = %key.accession,
                        path = %query.path(),
                        page = query.page,
                        error = %err,
                        "annotation REST request failed, enrichment stopped for this entry"
                    );
                    outcome.failed = true;
                    break;
                }
            };
            outcome.pages += 1;
            count = response.count;

            if response.results.is_empty() {
                if yielded < count {
                    warn!(
                        accession = %key.accession,
                        page,
                        yielded,
                        count,
                        "annotation REST page empty before reported count was reached"
                    );
                }
                break;
            }

            for result in &response.results {
                yielded += 1;
                let Some(dbname) = self.dbname_for(&result.metadata) else {
                    continue;
                };
                let xref = create_cross_ref(&dbname, result.metadata.accession.trim());
                if seen.insert(xref.clone()) {
                    document.cross_references.push(xref);
                    outcome.added += 1;
                }
            }
            page += 1;
        }

        debug!(
            accession = %key.accession,
            pages = outcome.pages,
            added = outcome.added,
            "annotation REST walk done"
        );
        outcome
    }
}

use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::domain::{CrossRef, EntryKey, OutputDocument, create_cross_ref};
use crate::error::DumpError;

pub const DEFAULT_PAGE_SIZE: usize = 20;

// PageCount advances one unit per page fetched against the hit total; HitCount advances by hits received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pagination {
    #[default]
    PageCount,
    HitCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichOutcome {
    pub pages: usize,
    pub added: usize,
    pub failed: bool,
}

pub trait Enricher {
    fn enrich(&self, key: &EntryKey, document: &mut OutputDocument) -> EnrichOutcome;
}

impl<E: Enricher + ?Sized> Enricher for Box<E> {
    fn enrich(&self, key: &EntryKey, document: &mut OutputDocument) -> EnrichOutcome {
        (**self).enrich(key, document)
    }
}

impl<E: Enricher + ?Sized> Enricher for &E {
    fn enrich(&self, key: &EntryKey, document: &mut OutputDocument) -> EnrichOutcome {
        (**self).enrich(key, document)
    }
}

pub struct NoEnrichment;

impl Enricher for NoEnrichment {
    fn enrich(&self, _key: &EntryKey, _document: &mut OutputDocument) -> EnrichOutcome {
        EnrichOutcome::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub accession: String,
    pub source_database: String,
    pub offset: u64,
    pub size: usize,
}

impl SearchQuery {
    pub fn new(key: &EntryKey, offset: u64, size: usize) -> Self {
        Self {
            accession: escape_term(&key.accession),
            source_database: key.source_database.to_lowercase(),
            offset,
            size,
        }
    }

    pub fn query_string(&self) -> String {
        format!(
            "entry_acc:{} AND entry_db:{}",
            self.accession, self.source_database
        )
    }
}

pub fn escape_term(value: &str) -> String {
    value.to_lowercase().replace(':', "\\:")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    pub hits: SearchHits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHits {
    pub total: HitTotal,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum HitTotal {
    Count(u64),
    Object { value: u64 },
}

impl HitTotal {
    pub fn value(self) -> u64 {
        match self {
            HitTotal::Count(value) | HitTotal::Object { value } => value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_source", default)]
    pub source: HitSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitSource {
    #[serde(default)]
    pub protein_acc: Option<String>,
    #[serde(default)]
    pub structure_acc: Option<String>,
    #[serde(default)]
    pub set_acc: Option<OneOrMany>,
    #[serde(default)]
    pub set_db: Option<OneOrMany>,
    #[serde(default, alias = "proteome_acc")]
    pub proteomes: Option<OneOrMany>,
    #[serde(default, alias = "tax_lineage")]
    pub lineage: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

pub fn extract_cross_refs(source: &HitSource) -> Vec<CrossRef> {
    let mut output = Vec::new();

    if let Some(acc) = non_empty(source.protein_acc.as_deref()) {
        output.push(create_cross_ref("UNIPROT", acc));
    }
    if let Some(acc) = non_empty(source.structure_acc.as_deref()) {
        output.push(create_cross_ref("PDBE", acc));
    }

    if let Some(sets) = &source.set_acc {
        let dbs = source.set_db.as_ref().map(OneOrMany::to_vec).unwrap_or_default();
        for (idx, acc) in sets.to_vec().iter().enumerate() {
            let db = dbs.get(idx).or_else(|| dbs.last());
            if let (Some(acc), Some(db)) =
                (non_empty(Some(acc.as_str())), non_empty(db.map(String::as_str)))
            {
                output.push(create_cross_ref(&db.to_uppercase(), acc));
            }
        }
    }

    if let Some(proteomes) = &source.proteomes {
        for acc in proteomes.to_vec() {
            if let Some(acc) = non_empty(Some(acc.as_str())) {
                output.push(create_cross_ref("PROTEOME", acc));
            }
        }
    }

    if let Some(lineage) = &source.lineage {
        let last = match lineage {
            OneOrMany::One(value) => value.split_whitespace().last().map(str::to_string),
            OneOrMany::Many(values) => values.last().cloned(),
        };
        if let Some(taxon) = non_empty(last.as_deref()) {
            output.push(create_cross_ref("TAXONOMY", taxon));
        }
    }

    output
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub trait SearchClient: Send + Sync {
    fn search(&self, query: &SearchQuery) -> Result<SearchPage, DumpError>;
}

#[derive(Clone)]
pub struct SearchHttpClient {
    client: Client,
    base_url: String,
}

impl SearchHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DumpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ipr-ebisearch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DumpError::SearchHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| DumpError::SearchHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/_search", self.base_url)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, DumpError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "search request failed".to_string());
        Err(DumpError::SearchStatus { status, message })
    }
}

impl SearchClient for SearchHttpClient {
    fn search(&self, query: &SearchQuery) -> Result<SearchPage, DumpError> {
        let q = query.query_string();
        let from = query.offset.to_string();
        let size = query.size.to_string();
        let response = self
            .client
            .get(self.search_url())
            .query(&[("q", q.as_str()), ("from", from.as_str()), ("size", size.as_str())])
            .send()
            .map_err(|err| DumpError::SearchHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| DumpError::SearchHttp(err.to_string()))
    }
}

pub struct SearchEnricher<C: SearchClient> {
    client: C,
    page_size: usize,
    pagination: Pagination,
}

impl<C: SearchClient> SearchEnricher<C> {
    pub fn new(client: C, page_size: usize, pagination: Pagination) -> Self {
        Self {
            client,
            page_size,
            pagination,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: SearchClient> Enricher for SearchEnricher<C> {
    fn enrich(&self, key: &EntryKey, document: &mut OutputDocument) -> EnrichOutcome {
        let mut outcome = EnrichOutcome::default();
        let mut seen: HashSet<CrossRef> = HashSet::new();
        let mut processed: u64 = 0;
        let mut hit_count: u64 = 1;

        while processed < hit_count {
            let query = SearchQuery::new(key, processed, self.page_size);
            let page = match self.client.search(&query) {
                Ok(page) => page,
                Err(err) => {
                    error!(
                        accession = %key.accession,
                        query = %query.query_string(),
                        offset = query.offset,
                        error = %err,
                        "annotation search failed, enrichment stopped for this entry"
                    );
                    outcome.failed = true;
                    break;
                }
            };
            outcome.pages += 1;

            for hit in &page.hits.hits {
                for xref in extract_cross_refs(&hit.source) {
                    if seen.insert(xref.clone()) {
                        document.cross_references.push(xref);
                        outcome.added += 1;
                    }
                }
            }

            hit_count = page.hits.total.value();
            match self.pagination {
                Pagination::PageCount => processed += 1,
                Pagination::HitCount => {
                    if page.hits.hits.is_empty() {
                        break;
                    }
                    processed += page.hits.hits.len() as u64;
                }
            }
        }

        debug!(
            accession = %key.accession,
            pages = outcome.pages,
            added = outcome.added,
            "annotation search done"
        );
        outcome
    }
}

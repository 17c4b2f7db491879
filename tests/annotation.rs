use std::fs;
use std::sync::Mutex;

use interpro_ebisearch::annotation::{
    Enricher, Pagination, SearchClient, SearchEnricher, SearchPage, SearchQuery,
    extract_cross_refs,
};
use interpro_ebisearch::domain::{EntryKey, OutputDocument, create_cross_ref};
use interpro_ebisearch::error::DumpError;

/// Replays the same page for every request and records the offsets asked for.
struct ReplayClient {
    page: String,
    offsets: Mutex<Vec<u64>>,
    fail_from: Option<usize>,
}

impl ReplayClient {
    fn new(page: &str) -> Self {
        Self {
            page: page.to_string(),
            offsets: Mutex::new(Vec::new()),
            fail_from: None,
        }
    }

    fn failing_from(mut self, request: usize) -> Self {
        self.fail_from = Some(request);
        self
    }

    fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }
}

impl SearchClient for ReplayClient {
    fn search(&self, query: &SearchQuery) -> Result<SearchPage, DumpError> {
        let mut guard = self.offsets.lock().unwrap();
        if self.fail_from.is_some_and(|n| guard.len() >= n) {
            return Err(DumpError::SearchHttp("connection reset".to_string()));
        }
        guard.push(query.offset);
        Ok(serde_json::from_str(&self.page).unwrap())
    }
}

fn key() -> EntryKey {
    EntryKey {
        accession: "PF00051".to_string(),
        source_database: "PFAM".to_string(),
    }
}

fn fixture_page() -> String {
    fs::read_to_string("tests/fixtures/search_page.json").unwrap()
}

fn page_with_total(total: u64, proteins: &[&str]) -> String {
    let hits: Vec<_> = proteins
        .iter()
        .map(|acc| serde_json::json!({ "_source": { "protein_acc": acc } }))
        .collect();
    serde_json::json!({ "hits": { "total": total, "hits": hits } }).to_string()
}

#[test]
fn duplicate_hits_collapse_to_one_cross_reference() {
    let client = ReplayClient::new(&fixture_page());
    let enricher = SearchEnricher::new(client, 20, Pagination::PageCount);
    let mut document = OutputDocument::default();

    let outcome = enricher.enrich(&key(), &mut document);

    // Two pages are fetched (total = 2) and both carry the same identifiers.
    assert_eq!(outcome.pages, 2);
    assert!(!outcome.failed);
    assert_eq!(
        document.cross_references,
        vec![
            create_cross_ref("UNIPROT", "P08519"),
            create_cross_ref("PDBE", "1kiv"),
            create_cross_ref("PFAM", "CL0168"),
            create_cross_ref("PROTEOME", "UP000005640"),
            create_cross_ref("TAXONOMY", "9606"),
        ]
    );
    assert_eq!(outcome.added, 5);
}

#[test]
fn page_count_mode_requests_one_page_per_reported_hit() {
    let client = ReplayClient::new(&page_with_total(3, &["P1", "P2", "P3"]));
    let enricher = SearchEnricher::new(client, 20, Pagination::PageCount);
    let mut document = OutputDocument::default();

    let outcome = enricher.enrich(&key(), &mut document);

    // The processed counter moves by one page while it is compared against
    // the hit total, so three hits cost three overlapping requests.
    assert_eq!(outcome.pages, 3);
    assert_eq!(enricher_offsets(&enricher), vec![0, 1, 2]);
    assert_eq!(document.cross_references.len(), 3);
}

#[test]
fn hit_count_mode_advances_by_hits_received() {
    let client = ReplayClient::new(&page_with_total(3, &["P1", "P2", "P3"]));
    let enricher = SearchEnricher::new(client, 20, Pagination::HitCount);
    let mut document = OutputDocument::default();

    let outcome = enricher.enrich(&key(), &mut document);

    assert_eq!(outcome.pages, 1);
    assert_eq!(enricher_offsets(&enricher), vec![0]);
    assert_eq!(document.cross_references.len(), 3);
}

#[test]
fn hit_count_mode_stops_on_empty_page() {
    let client = ReplayClient::new(&page_with_total(50, &[]));
    let enricher = SearchEnricher::new(client, 20, Pagination::HitCount);
    let mut document = OutputDocument::default();

    let outcome = enricher.enrich(&key(), &mut document);

    assert_eq!(outcome.pages, 1);
    assert!(document.cross_references.is_empty());
}

#[test]
fn zero_hits_still_issues_the_first_request() {
    let client = ReplayClient::new(&page_with_total(0, &[]));
    let enricher = SearchEnricher::new(client, 20, Pagination::PageCount);
    let mut document = OutputDocument::default();

    let outcome = enricher.enrich(&key(), &mut document);

    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.added, 0);
}

#[test]
fn transport_failure_keeps_what_was_already_added() {
    let client = ReplayClient::new(&page_with_total(4, &["P1"])).failing_from(2);
    let enricher = SearchEnricher::new(client, 20, Pagination::PageCount);
    let mut document = OutputDocument::default();
    document.push_cross_ref("GO", "GO:0001");

    let outcome = enricher.enrich(&key(), &mut document);

    assert!(outcome.failed);
    assert_eq!(outcome.pages, 2);
    assert_eq!(
        document.cross_references,
        vec![
            create_cross_ref("GO", "GO:0001"),
            create_cross_ref("UNIPROT", "P1"),
        ]
    );
}

#[test]
fn single_string_lineage_contributes_its_last_taxon() {
    let source = serde_json::from_value(serde_json::json!({
        "tax_lineage": " 1 131567 2759 9606 ",
        "proteome_acc": "UP000005640"
    }))
    .unwrap();
    assert_eq!(
        extract_cross_refs(&source),
        vec![
            create_cross_ref("PROTEOME", "UP000005640"),
            create_cross_ref("TAXONOMY", "9606"),
        ]
    );
}

fn enricher_offsets(enricher: &SearchEnricher<ReplayClient>) -> Vec<u64> {
    enricher.client().offsets()
}

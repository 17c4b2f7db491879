use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use chrono::NaiveDate;

use interpro_ebisearch::annotation::{EnrichOutcome, Enricher, NoEnrichment};
use interpro_ebisearch::app::{App, ProgressEvent, ProgressSink, RunOptions};
use interpro_ebisearch::assemble::{ReleaseInfo, Window};
use interpro_ebisearch::cache::{DumpFileSource, RecordCache, RecordOrigin};
use interpro_ebisearch::domain::{DocumentSet, EntryKey, OutputDocument, RawRecord};
use interpro_ebisearch::error::DumpError;
use interpro_ebisearch::schema::SchemaStore;

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

/// Adds one taxonomy reference to every document and counts calls.
#[derive(Default)]
struct TaxonEnricher {
    calls: Mutex<usize>,
}

impl Enricher for TaxonEnricher {
    fn enrich(&self, _key: &EntryKey, document: &mut OutputDocument) -> EnrichOutcome {
        *self.calls.lock().unwrap() += 1;
        document.push_cross_ref("TAXONOMY", "9606");
        EnrichOutcome {
            pages: 1,
            added: 1,
            failed: false,
        }
    }
}

fn release() -> ReleaseInfo {
    ReleaseInfo {
        name: "InterPro 7".to_string(),
        version: "1".to_string(),
    }
}

fn options(prefix: &Utf8PathBuf, limit: Option<usize>) -> RunOptions {
    RunOptions {
        output_prefix: prefix.to_string(),
        limit,
        no_cache: false,
        release_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    }
}

fn schema() -> SchemaStore {
    let raw = fs::read_to_string("tests/fixtures/schema.json").unwrap();
    SchemaStore::from_value(serde_json::from_str(&raw).unwrap()).unwrap()
}

fn read_set(path: &str) -> DocumentSet {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn run_writes_one_file_per_window() {
    let temp = tempfile::tempdir().unwrap();
    let prefix = Utf8PathBuf::from_path_buf(temp.path().join("out/ebisearch")).unwrap();
    let cache = Utf8PathBuf::from_path_buf(temp.path().join("records.cache.json")).unwrap();
    let app = App::new(
        RecordCache::new(Some(cache.clone())),
        DumpFileSource::new("tests/fixtures/records.json"),
        TaxonEnricher::default(),
        release(),
        2,
    );
    let sink = RecordingSink::default();
    let schema = schema();

    let result = app.run(&options(&prefix, None), Some(&schema), &sink).unwrap();

    assert_eq!(result.origin, RecordOrigin::Source);
    assert_eq!(result.records_available, 3);
    assert_eq!(result.records_processed, 3);
    assert_eq!(result.files.len(), 2);
    assert!(cache.as_std_path().is_file());

    let first = &result.files[0];
    assert_eq!(first.path, format!("{prefix}_0_2.json"));
    assert_eq!(first.entry_count, 2);
    assert_eq!(first.enrichment_pages, 2);
    assert_eq!(first.validation_errors, 0);

    // The last window keeps its nominal end and loses the malformed record.
    let last = &result.files[1];
    assert_eq!(last.path, format!("{prefix}_2_4.json"));
    assert_eq!(last.entry_count, 0);
    assert_eq!(last.skipped, 1);

    let set = read_set(&first.path);
    assert_eq!(set.release_date, "2024-05-01");
    assert_eq!(set.entry_count, set.entries.len());
    assert_eq!(set.entries[0].field_value("creation_date"), Some("2011-03-15"));
    assert!(
        set.entries[1]
            .cross_references
            .iter()
            .any(|xref| xref.dbname == "TAXONOMY")
    );

    let messages = sink.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.starts_with("phase=Store")));
}

#[test]
fn test_limit_truncates_before_batching() {
    let temp = tempfile::tempdir().unwrap();
    let prefix = Utf8PathBuf::from_path_buf(temp.path().join("ebisearch")).unwrap();
    let enricher = TaxonEnricher::default();
    let app = App::new(
        RecordCache::new(None),
        DumpFileSource::new("tests/fixtures/records.json"),
        &enricher,
        release(),
        500,
    );

    let result = app
        .run(&options(&prefix, Some(1)), None, &RecordingSink::default())
        .unwrap();

    assert_eq!(result.records_processed, 1);
    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].path, format!("{prefix}_0_500.json"));
    assert_eq!(result.files[0].entry_count, 1);
    assert_eq!(*enricher.calls.lock().unwrap(), 1);
}

#[test]
fn missing_join_key_aborts_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let dump = temp.path().join("dump.json");
    fs::write(&dump, r#"[{"accession":"IPR000001"}]"#).unwrap();
    let prefix = Utf8PathBuf::from_path_buf(temp.path().join("ebisearch")).unwrap();
    let app = App::new(
        RecordCache::new(None),
        DumpFileSource::new(Utf8PathBuf::from_path_buf(dump).unwrap()),
        NoEnrichment,
        release(),
        500,
    );

    let result = app.run(&options(&prefix, None), None, &RecordingSink::default());
    assert_matches!(result, Err(DumpError::MissingField { field: "source_database", .. }));
    assert!(!temp.path().join("ebisearch_0_500.json").exists());
}

#[test]
fn validation_failures_do_not_block_output() {
    let temp = tempfile::tempdir().unwrap();
    let prefix = Utf8PathBuf::from_path_buf(temp.path().join("ebisearch")).unwrap();
    let app = App::new(
        RecordCache::new(None),
        DumpFileSource::new("tests/fixtures/records.json"),
        NoEnrichment,
        ReleaseInfo {
            name: String::new(),
            version: "1".to_string(),
        },
        500,
    );
    let schema = schema();

    let result = app
        .run(&options(&prefix, None), Some(&schema), &RecordingSink::default())
        .unwrap();

    assert_eq!(result.files[0].validation_errors, 1);
    assert!(temp.path().join("ebisearch_0_500.json").is_file());
}

#[test]
fn build_window_counts_skips() {
    let records: Vec<RawRecord> =
        serde_json::from_str(&fs::read_to_string("tests/fixtures/records.json").unwrap()).unwrap();
    let app = App::new(
        RecordCache::new(None),
        DumpFileSource::new("unused.json"),
        NoEnrichment,
        release(),
        500,
    );

    let built = app
        .build_window(
            &records,
            Window::new(1, 3),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
        .unwrap();

    assert_eq!(built.set.entry_count, 1);
    assert_eq!(built.skipped, 1);
    assert_eq!(built.enrichment_failures, 0);
}

use std::time::{Duration, Instant};

use camino::Utf8Path;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::annotation::Enricher;
use crate::assemble::{ReleaseInfo, Window, assemble_document_set, select_window};
use crate::cache::{RecordCache, RecordOrigin, RecordSource};
use crate::domain::{DocumentSet, RawRecord};
use crate::error::DumpError;
use crate::output::{batch_file_name, write_document_set};
use crate::schema::SchemaStore;
use crate::transform::EntryTransformer;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_prefix: String,
    pub limit: Option<usize>,
    pub no_cache: bool,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub origin: RecordOrigin,
    pub records_available: usize,
    pub records_processed: usize,
    pub skipped_at_ingestion: usize,
    pub files: Vec<BatchResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub path: String,
    pub start: usize,
    pub end: usize,
    pub entry_count: usize,
    pub skipped: usize,
    pub enrichment_pages: usize,
    pub enrichment_failures: usize,
    pub validation_errors: usize,
}

#[derive(Debug, Clone)]
pub struct BuiltSet {
    pub set: DocumentSet,
    pub skipped: usize,
    pub enrichment_pages: usize,
    pub enrichment_failures: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub struct App<S: RecordSource, E: Enricher> {
    cache: RecordCache,
    source: S,
    transformer: EntryTransformer<E>,
    release: ReleaseInfo,
    records_per_file: usize,
}

impl<S: RecordSource, E: Enricher> App<S, E> {
    pub fn new(
        cache: RecordCache,
        source: S,
        enricher: E,
        release: ReleaseInfo,
        records_per_file: usize,
    ) -> Self {
        Self {
            cache,
            source,
            transformer: EntryTransformer::new(enricher),
            release,
            records_per_file: records_per_file.max(1),
        }
    }

    pub fn run(
        &self,
        options: &RunOptions,
        schema: Option<&SchemaStore>,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, DumpError> {
        sink.event(ProgressEvent {
            message: "phase=Resolve; loading records".to_string(),
            elapsed: None,
        });
        let loaded = self.cache.fetch_or_compute(&self.source, options.no_cache)?;
        let available = loaded.records.len();
        let limit = options
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(available)
            .min(available);

        let mut files = Vec::new();
        for start in (0..limit).step_by(self.records_per_file) {
            let end = start + self.records_per_file;
            let path = batch_file_name(&options.output_prefix, start, end);
            let window = Window::new(start, end).with_limit(limit);

            let started = Instant::now();
            let built = self.build_window(&loaded.records, window, options.release_date)?;
            sink.event(ProgressEvent {
                message: format!("phase=Transform; records {start}..{end}"),
                elapsed: Some(started.elapsed()),
            });

            let validation_errors = match schema {
                Some(schema) => validate_set(schema, &built.set, &path),
                None => 0,
            };

            info!(start, end, limit, path = %path, "writing document set");
            write_document_set(&path, &built.set)?;
            sink.event(ProgressEvent {
                message: format!("phase=Store; wrote {path}"),
                elapsed: None,
            });

            files.push(BatchResult {
                path: path.to_string(),
                start,
                end,
                entry_count: built.set.entry_count,
                skipped: built.skipped,
                enrichment_pages: built.enrichment_pages,
                enrichment_failures: built.enrichment_failures,
                validation_errors,
            });
        }

        Ok(RunResult {
            origin: loaded.origin,
            records_available: available,
            records_processed: limit,
            skipped_at_ingestion: loaded.skipped,
            files,
        })
    }

    pub fn build_window(
        &self,
        records: &[RawRecord],
        window: Window,
        release_date: NaiveDate,
    ) -> Result<BuiltSet, DumpError> {
        let mut entries = Vec::new();
        let mut skipped = 0;
        let mut enrichment_pages = 0;
        let mut enrichment_failures = 0;

        for record in select_window(records, window) {
            match self.transformer.transform(record) {
                Ok(transformed) => {
                    enrichment_pages += transformed.enrichment.pages;
                    if transformed.enrichment.failed {
                        enrichment_failures += 1;
                    }
                    entries.push(transformed.document);
                }
                Err(err) if err.is_record_level() => {
                    warn!(accession = record.label(), error = %err, "skipping record");
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(BuiltSet {
            set: assemble_document_set(&self.release, entries, release_date),
            skipped,
            enrichment_pages,
            enrichment_failures,
        })
    }
}

fn validate_set(schema: &SchemaStore, set: &DocumentSet, path: &Utf8Path) -> usize {
    let instance = match serde_json::to_value(set) {
        Ok(instance) => instance,
        Err(err) => {
            error!(path = %path, error = %err, "could not serialize document set for validation");
            return 1;
        }
    };
    let violations = schema.validate(&instance);
    for violation in &violations {
        error!(path = %path, violation = %violation, "schema validation failed");
    }
    violations.len()
}

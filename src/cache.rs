use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{RawRecord, ingest_record};
use crate::error::DumpError;
use crate::output::write_json_atomic;

pub trait RecordSource {
    fn fetch_records(&self) -> Result<Vec<RawRecord>, DumpError>;
}

#[derive(Debug, Clone)]
pub struct DumpFileSource {
    path: Utf8PathBuf,
}

impl DumpFileSource {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for DumpFileSource {
    fn fetch_records(&self) -> Result<Vec<RawRecord>, DumpError> {
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| DumpError::SourceRead(format!("{}: {err}", self.path)))?;
        serde_json::from_str(&content)
            .map_err(|err| DumpError::SourceRead(format!("{}: {err}", self.path)))
    }
}

impl<S: RecordSource> RecordSource for Option<S> {
    fn fetch_records(&self) -> Result<Vec<RawRecord>, DumpError> {
        match self {
            Some(source) => source.fetch_records(),
            None => Err(DumpError::SourceRead(
                "no dump_file configured and no record cache present".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrigin {
    Cache,
    Source,
}

#[derive(Debug, Clone)]
pub struct LoadedRecords {
    pub records: Vec<RawRecord>,
    pub origin: RecordOrigin,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordCache {
    path: Option<Utf8PathBuf>,
}

impl RecordCache {
    pub fn new(path: Option<Utf8PathBuf>) -> Self {
        Self { path }
    }

    pub fn fetch_or_compute(
        &self,
        source: &dyn RecordSource,
        no_cache: bool,
    ) -> Result<LoadedRecords, DumpError> {
        if let Some(path) = &self.path {
            if !no_cache && path.as_std_path().is_file() {
                let records = read_cache(path)?;
                info!(path = %path, records = records.len(), "loaded records from cache");
                return Ok(LoadedRecords {
                    records,
                    origin: RecordOrigin::Cache,
                    skipped: 0,
                });
            }
        }

        let rows = source.fetch_records()?;
        let (records, skipped) = ingest_rows(rows)?;
        if let Some(path) = &self.path {
            write_json_atomic(path, &records)?;
            info!(path = %path, records = records.len(), "wrote record cache");
        }
        Ok(LoadedRecords {
            records,
            origin: RecordOrigin::Source,
            skipped,
        })
    }
}

fn read_cache(path: &Utf8Path) -> Result<Vec<RawRecord>, DumpError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| DumpError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content)
        .map_err(|err| DumpError::Filesystem(format!("parse cache {path}: {err}")))
}

fn ingest_rows(rows: Vec<RawRecord>) -> Result<(Vec<RawRecord>, usize), DumpError> {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        match ingest_record(row) {
            Ok(record) => records.push(record),
            Err(err) if err.is_record_level() => {
                warn!(error = %err, "skipping record at ingestion");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok((records, skipped))
}

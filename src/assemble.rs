use chrono::{Local, NaiveDate};

use crate::domain::{DocumentSet, OutputDocument, RawRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: Option<usize>,
    pub limit: Option<usize>,
}

impl Window {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub fn select_window(records: &[RawRecord], window: Window) -> &[RawRecord] {
    let limited = match window.limit {
        Some(limit) => &records[..limit.min(records.len())],
        None => records,
    };
    let end = window
        .end
        .unwrap_or(limited.len())
        .min(limited.len());
    let start = window.start.min(end);
    &limited[start..end]
}

pub fn assemble_document_set(
    release: &ReleaseInfo,
    entries: Vec<OutputDocument>,
    release_date: NaiveDate,
) -> DocumentSet {
    let entry_count = entries.len();
    DocumentSet {
        name: release.name.clone(),
        release: release.version.clone(),
        release_date: release_date.format("%Y-%m-%d").to_string(),
        entries,
        entry_count,
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

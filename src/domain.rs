use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DumpError;

pub const INTERPRO_DB: &str = "INTERPRO";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default, rename = "type")]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub source_database: Option<String>,
    #[serde(default)]
    pub integrated_id: Option<String>,
    #[serde(default)]
    pub description: Option<Embedded>,
    #[serde(default)]
    pub literature: Option<Embedded>,
    #[serde(default)]
    pub go_terms: Option<Embedded>,
    #[serde(default)]
    pub member_databases: Option<Embedded>,
    #[serde(default)]
    pub cross_references: Option<Embedded>,
    #[serde(default)]
    pub hierarchy: Option<Embedded>,
    #[serde(default)]
    pub entry_date: Option<String>,
}

impl RawRecord {
    pub fn label(&self) -> &str {
        self.accession
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("<unknown>")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedded {
    Text(String),
    Json(Value),
}

impl Embedded {
    pub fn is_blank(&self) -> bool {
        match self {
            Embedded::Text(text) => text.trim().is_empty(),
            Embedded::Json(value) => value.is_null(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Embedded::Text(text) => serde_json::from_str(text),
            Embedded::Json(value) => T::deserialize(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiteratureEntry {
    #[serde(default, rename = "PMID")]
    pub pmid: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoTerm {
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Accessions {
    List(Vec<Value>),
    Keyed(BTreeMap<String, Value>),
}

impl Accessions {
    pub fn values(&self) -> Vec<String> {
        match self {
            Accessions::List(items) => items.iter().filter_map(scalar_to_string).collect(),
            Accessions::Keyed(map) => match map.get("accessions").and_then(|v| v.as_array()) {
                Some(items) => items.iter().filter_map(scalar_to_string).collect(),
                None => map.keys().cloned().collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyNode {
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<HierarchyNode>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossRef {
    pub dbname: String,
    pub dbkey: String,
}

impl fmt::Display for CrossRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dbname, self.dbkey)
    }
}

pub fn create_field(name: &str, value: impl ToString) -> Field {
    Field {
        name: name.to_string(),
        value: value.to_string(),
    }
}

pub fn create_cross_ref(dbname: &str, dbkey: impl ToString) -> CrossRef {
    CrossRef {
        dbname: dbname.to_string(),
        dbkey: dbkey.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub fields: Vec<Field>,
    pub cross_references: Vec<CrossRef>,
}

impl OutputDocument {
    pub fn push_field(&mut self, name: &str, value: impl ToString) {
        self.fields.push(create_field(name, value));
    }

    pub fn push_cross_ref(&mut self, dbname: &str, dbkey: impl ToString) {
        self.cross_references.push(create_cross_ref(dbname, dbkey));
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSet {
    pub name: String,
    pub release: String,
    pub release_date: String,
    pub entries: Vec<OutputDocument>,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub accession: String,
    pub source_database: String,
}

pub fn normalize_entry_date(value: &str) -> Option<String> {
    let day = value
        .trim()
        .split(|ch: char| ch == ' ' || ch == 'T')
        .next()
        .unwrap_or("");
    let mut date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    if date.year() > 0 && date.year() < 19 {
        date = date.with_year(date.year() + 2000)?;
    }
    Some(date.format("%Y-%m-%d").to_string())
}

pub fn ingest_record(mut record: RawRecord) -> Result<RawRecord, DumpError> {
    if let Some(raw) = record.entry_date.take() {
        if raw.trim().is_empty() {
            return Ok(record);
        }
        let normalized = normalize_entry_date(&raw).ok_or_else(|| DumpError::InvalidDate {
            accession: record.label().to_string(),
            value: raw.clone(),
        })?;
        record.entry_date = Some(normalized);
    }
    Ok(record)
}

pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

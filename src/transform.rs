use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::annotation::{EnrichOutcome, Enricher};
use crate::domain::{
    Accessions, Embedded, EntryKey, GoTerm, HierarchyNode, INTERPRO_DB, LiteratureEntry,
    OutputDocument, RawRecord, scalar_to_string,
};
use crate::error::DumpError;
use crate::hierarchy::flatten_hierarchy;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("bracket pattern"));
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("line break pattern"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("space pattern"));

#[derive(Debug, Clone)]
pub struct Transformed {
    pub document: OutputDocument,
    pub enrichment: EnrichOutcome,
}

pub struct EntryTransformer<E: Enricher> {
    enricher: E,
}

impl<E: Enricher> EntryTransformer<E> {
    pub fn new(enricher: E) -> Self {
        Self { enricher }
    }

    pub fn transform(&self, record: &RawRecord) -> Result<Transformed, DumpError> {
        let (mut document, key) = build_document(record)?;
        let enrichment = self.enricher.enrich(&key, &mut document);
        Ok(Transformed {
            document,
            enrichment,
        })
    }
}

pub fn build_document(record: &RawRecord) -> Result<(OutputDocument, EntryKey), DumpError> {
    let accession = required(record, "accession", record.accession.as_deref())?;
    let source_database = required(
        record,
        "source_database",
        record.source_database.as_deref(),
    )?;

    let mut document = OutputDocument::default();
    document.push_field("id", accession);
    document.push_field("source_database", source_database);

    if let Some(name) = non_empty(record.name.as_deref()) {
        document.push_field("name", name);
    }
    if let Some(short_name) = non_empty(record.short_name.as_deref()) {
        document.push_field("short_name", short_name);
    }
    if let Some(entry_type) = non_empty(record.entry_type.as_deref()) {
        document.push_field("type", entry_type);
    }

    if let Some(paragraphs) = description_paragraphs(accession, record.description.as_ref())? {
        let description = clean_description(&paragraphs);
        if !description.is_empty() {
            document.push_field("description", description);
        }
    }

    if let Some(date) = non_empty(record.entry_date.as_deref()) {
        document.push_field("creation_date", date);
    }

    let literature: Option<BTreeMap<String, LiteratureEntry>> =
        decode(accession, "literature", record.literature.as_ref())?;
    for paper in literature.unwrap_or_default().values() {
        if let Some(pmid) = paper.pmid.as_ref().and_then(scalar_to_string) {
            document.push_cross_ref("PUBMED", pmid);
        }
    }

    let go_terms: Option<Vec<GoTerm>> = decode(accession, "go_terms", record.go_terms.as_ref())?;
    for term in go_terms.unwrap_or_default() {
        if let Some(identifier) = non_empty(Some(term.identifier.as_str())) {
            document.push_cross_ref("GO", identifier);
        }
    }

    let members: Option<BTreeMap<String, Accessions>> =
        decode(accession, "member_databases", record.member_databases.as_ref())?;
    for (db, accessions) in members.unwrap_or_default() {
        document.push_field("contributing_database", &db);
        for member in accessions.values() {
            document.push_cross_ref(&db, member);
        }
    }

    let xrefs: Option<BTreeMap<String, Accessions>> =
        decode(accession, "cross_references", record.cross_references.as_ref())?;
    for (label, accessions) in xrefs.unwrap_or_default() {
        let Some(dbname) = label.split_whitespace().next().map(str::to_uppercase) else {
            continue;
        };
        for value in accessions.values() {
            document.push_cross_ref(&dbname, value);
        }
    }

    let hierarchy: Option<HierarchyNode> =
        decode(accession, "hierarchy", record.hierarchy.as_ref())?;
    if let Some(root) = hierarchy {
        document
            .cross_references
            .extend(flatten_hierarchy(accession, &root)?);
    }

    if let Some(integrated) = non_empty(record.integrated_id.as_deref()) {
        document.push_cross_ref(INTERPRO_DB, integrated);
    }

    let key = EntryKey {
        accession: accession.to_string(),
        source_database: source_database.to_string(),
    };
    Ok((document, key))
}

pub fn clean_description(paragraphs: &[String]) -> String {
    let mut text = paragraphs.join(" ");
    loop {
        let stripped = BRACKETED.replace_all(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }
    let text = TAGS.replace_all(&text, "");
    let text = LINE_BREAKS.replace_all(&text, "");
    let text = SPACES.replace_all(&text, " ");
    text.trim().to_string()
}

fn description_paragraphs(
    accession: &str,
    value: Option<&Embedded>,
) -> Result<Option<Vec<String>>, DumpError> {
    let Some(value) = value.filter(|value| !value.is_blank()) else {
        return Ok(None);
    };
    if let Embedded::Text(text) = value {
        if !text.trim_start().starts_with('[') {
            return Ok(Some(vec![text.clone()]));
        }
    }
    let items: Option<Vec<Value>> = decode(accession, "description", Some(value))?;
    let paragraphs = items
        .unwrap_or_default()
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Object(map) => map.get("text").and_then(|v| v.as_str()).map(str::to_string),
            _ => None,
        })
        .collect();
    Ok(Some(paragraphs))
}

fn decode<T: DeserializeOwned>(
    accession: &str,
    field: &'static str,
    value: Option<&Embedded>,
) -> Result<Option<T>, DumpError> {
    let Some(value) = value.filter(|value| !value.is_blank()) else {
        return Ok(None);
    };
    value
        .decode::<Option<T>>()
        .map_err(|err| DumpError::EmbeddedJson {
            accession: accession.to_string(),
            field,
            message: err.to_string(),
        })
}

fn required<'a>(
    record: &RawRecord,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, DumpError> {
    non_empty(value).ok_or_else(|| DumpError::MissingField {
        accession: record.label().to_string(),
        field,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_drops_citations_markup_and_newlines() {
        let paragraphs = vec![
            "<p>This domain binds <b>ATP</b> [[cite:PUB00000001]].</p>".to_string(),
            "<p>It is found\nin kinases.</p>".to_string(),
        ];
        assert_eq!(
            clean_description(&paragraphs),
            "This domain binds ATP . It is foundin kinases."
        );
    }

    #[test]
    fn nested_brackets_are_removed_with_their_text() {
        let paragraphs = vec!["See [ref [1] here] end".to_string()];
        assert_eq!(clean_description(&paragraphs), "See end");

        let paragraphs = vec!["Binds [[cite:PUB1], [cite:PUB2]] zinc.".to_string()];
        assert_eq!(clean_description(&paragraphs), "Binds zinc.");
    }

    #[test]
    fn emitted_values_keep_source_whitespace() {
        let record = RawRecord {
            accession: Some("IPR000001".to_string()),
            source_database: Some("INTERPRO".to_string()),
            name: Some(" Test ".to_string()),
            short_name: Some("  ".to_string()),
            ..RawRecord::default()
        };
        let (document, _) = build_document(&record).unwrap();
        assert_eq!(document.field_value("name"), Some(" Test "));
        assert_eq!(document.field_value("short_name"), None);
    }

    #[test]
    fn plain_text_description_is_one_paragraph() {
        let paragraphs =
            description_paragraphs("IPR1", Some(&Embedded::Text("Plain text".to_string())))
                .unwrap();
        assert_eq!(paragraphs, Some(vec!["Plain text".to_string()]));
    }
}

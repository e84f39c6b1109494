//! Field projection
//!
//! Turns a loosely-typed [`Record`] into the partial document sent to the
//! destination. Absent fields are reported and omitted; nothing is ever
//! defaulted or nulled.

use crate::record::{BusinessKey, Record, RecordLocation};
use crate::reporter::{Reporter, SyncEvent};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedDocument {
    business_key: Option<BusinessKey>,
    fields: Map<String, Value>,
    location: Option<RecordLocation>,
}

impl ProjectedDocument {
    pub fn new(business_key: Option<BusinessKey>, fields: Map<String, Value>) -> Self {
        Self {
            business_key,
            fields,
            location: None,
        }
    }

    /// Remember where the source record came from
    pub fn with_location(mut self, location: Option<RecordLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn location(&self) -> Option<RecordLocation> {
        self.location
    }

    pub fn business_key(&self) -> Option<&BusinessKey> {
        self.business_key.as_ref()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Documents for one batch plus how many requested fields were absent
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub documents: Vec<ProjectedDocument>,
    pub missing_fields: usize,
}

/// Copy the requested `fields` present on `record`
///
/// Keys keep the spelling given in `fields`.
pub fn project(
    record: &Record,
    key_field: &str,
    fields: &[String],
    reporter: &dyn Reporter,
) -> ProjectedDocument {
    project_counting(record, key_field, fields, reporter).0
}

pub fn project_batch(
    records: &[Record],
    key_field: &str,
    fields: &[String],
    reporter: &dyn Reporter,
) -> Projection {
    let mut projection = Projection {
        documents: Vec::with_capacity(records.len()),
        missing_fields: 0,
    };

    for record in records {
        let (document, missing) = project_counting(record, key_field, fields, reporter);
        projection.missing_fields += missing;
        projection.documents.push(document);
    }

    projection
}

fn project_counting(
    record: &Record,
    key_field: &str,
    fields: &[String],
    reporter: &dyn Reporter,
) -> (ProjectedDocument, usize) {
    let business_key = record.business_key(key_field);
    let mut doc = Map::new();
    let mut missing = 0;

    for field in fields {
        match record.get(field) {
            Some(value) => {
                doc.insert(field.clone(), value.clone());
            },
            None => {
                missing += 1;
                reporter.report(SyncEvent::FieldMissing {
                    order_id: business_key.as_ref().map(|k| k.to_string()),
                    field: field.clone(),
                });
            },
        }
    }

    let document = ProjectedDocument::new(business_key, doc).with_location(record.location());
    (document, missing)
}

//! Wire types for the search-index REST API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// `GET /{index}/_mapping` response, keyed by concrete index name
///
/// An alias can resolve to several concrete indexes, hence the map.
pub type MappingResponse = BTreeMap<String, IndexMapping>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMapping {
    #[serde(default)]
    pub mappings: TypeMapping,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeMapping {
    #[serde(default)]
    pub properties: BTreeMap<String, FieldMapping>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    /// Sub-fields of `object` and `nested` fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldMapping>,
}

/// One partial update in a bulk request
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdate {
    pub index: String,
    pub id: String,
    pub doc: Map<String, Value>,
}

impl BulkUpdate {
    /// Append the action and source lines for this update
    ///
    /// `doc_as_upsert` is always false: a document missing at the
    /// destination fails instead of being created.
    pub fn write_ndjson(&self, out: &mut String) -> serde_json::Result<()> {
        let action = serde_json::json!({
            "update": { "_index": self.index, "_id": self.id }
        });
        let source = serde_json::json!({
            "doc": self.doc,
            "doc_as_upsert": false,
        });
        out.push_str(&serde_json::to_string(&action)?);
        out.push('\n');
        out.push_str(&serde_json::to_string(&source)?);
        out.push('\n');
        Ok(())
    }
}

/// Render a whole bulk body; the API requires a trailing newline
pub fn render_bulk_body(updates: &[BulkUpdate]) -> serde_json::Result<String> {
    let mut body = String::new();
    for update in updates {
        update.write_ndjson(&mut body)?;
    }
    Ok(body)
}

/// `POST /_bulk` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkResponseItem>,
}

/// One entry of `items`, keyed by the action name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponseItem {
    #[serde(alias = "index", alias = "create", alias = "delete")]
    pub update: BulkItemResult,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkItemError {
    pub fn describe(&self) -> String {
        match (&self.reason, self.error_type.is_empty()) {
            (Some(reason), false) => format!("{}: {}", self.error_type, reason),
            (Some(reason), true) => reason.clone(),
            (None, false) => self.error_type.clone(),
            (None, true) => "unknown error".to_string(),
        }
    }
}

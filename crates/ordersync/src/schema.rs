//! Destination schema discovery
//!
//! The canonical field set is read once per run from the destination
//! mapping. Nested and object fields are flattened into dotted paths
//! (`Customer.Address.City`); only leaf fields are syncable.

use crate::destination::{Destination, FieldMapping, MappingResponse};
use crate::error::{Result, SyncError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Field names known to the destination, immutable for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalFieldSet {
    fields: BTreeSet<String>,
    by_lowercase: HashMap<String, String>,
}

impl CanonicalFieldSet {
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Canonical spelling of `field`, matched without regard to ASCII case
    pub fn resolve_ignore_case(&self, field: &str) -> Option<&str> {
        if let Some(exact) = self.fields.get(field) {
            return Some(exact.as_str());
        }
        self.by_lowercase
            .get(&field.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Fields known to both sets
    pub fn intersection(&self, other: &CanonicalFieldSet) -> CanonicalFieldSet {
        self.fields
            .intersection(&other.fields)
            .cloned()
            .collect()
    }
}

impl FromIterator<String> for CanonicalFieldSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let fields: BTreeSet<String> = iter.into_iter().collect();
        let mut by_lowercase = HashMap::with_capacity(fields.len());
        // BTreeSet order keeps the first spelling stable when two fields differ only by case
        for field in &fields {
            by_lowercase
                .entry(field.to_ascii_lowercase())
                .or_insert_with(|| field.clone());
        }
        Self {
            fields,
            by_lowercase,
        }
    }
}

/// Flatten the properties of every index in a mapping response
pub fn flatten_mapping(mapping: &MappingResponse) -> CanonicalFieldSet {
    let mut fields = Vec::new();
    for index_mapping in mapping.values() {
        collect_paths(&index_mapping.mappings.properties, "", &mut fields);
    }
    fields.into_iter().collect()
}

fn collect_paths(properties: &BTreeMap<String, FieldMapping>, prefix: &str, out: &mut Vec<String>) {
    for (name, field) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        if field.properties.is_empty() {
            out.push(path);
        } else {
            collect_paths(&field.properties, &path, out);
        }
    }
}

/// Read and flatten the schema of one index
pub async fn discover(destination: &dyn Destination, index: &str) -> Result<CanonicalFieldSet> {
    let mapping = destination
        .get_mapping(index)
        .await
        .map_err(|e| SyncError::schema_unavailable(index, e))?;

    let fields = flatten_mapping(&mapping);
    if fields.is_empty() {
        return Err(SyncError::schema_unavailable(index, "mapping defines no fields"));
    }

    debug!(index = %index, fields = fields.len(), "Index schema discovered");
    Ok(fields)
}

/// Discover every index and keep the fields all of them know
///
/// A field missing on any destination cannot be updated everywhere, so it
/// is not part of the run's canonical set.
pub async fn discover_all(
    destination: &dyn Destination,
    indexes: &[String],
) -> Result<CanonicalFieldSet> {
    let mut canonical: Option<CanonicalFieldSet> = None;

    for index in indexes {
        let fields = discover(destination, index).await?;
        canonical = Some(match canonical {
            Some(existing) => existing.intersection(&fields),
            None => fields,
        });
    }

    let canonical = canonical.unwrap_or_default();
    if canonical.is_empty() {
        return Err(SyncError::schema_unavailable(
            indexes.join(","),
            "configured indexes share no fields",
        ));
    }

    info!(indexes = %indexes.join(","), fields = canonical.len(), "Canonical field set ready");
    Ok(canonical)
}

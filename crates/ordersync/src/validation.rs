//! CSV header validation
//!
//! A file may only touch fields the destination knows. Validation is all or
//! nothing per file: one unknown header rejects the whole file.

use crate::error::{Result, SyncError};
use crate::schema::CanonicalFieldSet;
use std::path::Path;

/// Map every header to its canonical spelling
///
/// Fails with [`SyncError::SchemaMismatch`] naming every header the schema
/// does not contain. Blank headers never match. Headers that resolve to the
/// same canonical field (`Status` and `status`) yield it once; the record
/// lookup reads the first such column.
pub fn validate_headers(
    file: &Path,
    headers: &[String],
    canonical: &CanonicalFieldSet,
) -> Result<Vec<String>> {
    let mut resolved = Vec::with_capacity(headers.len());
    let mut unknown = Vec::new();

    for header in headers {
        match canonical.resolve_ignore_case(header.trim()) {
            Some(name) => {
                if !resolved.iter().any(|r| r == name) {
                    resolved.push(name.to_string());
                }
            },
            None => unknown.push(header.clone()),
        }
    }

    if !unknown.is_empty() {
        return Err(SyncError::SchemaMismatch {
            file: file.to_path_buf(),
            fields: unknown,
        });
    }

    Ok(resolved)
}

//! Loosely-typed source records
//!
//! A [`Record`] is one SQL row or one CSV line. Both shapes answer the same
//! question, "what is the value of field X", so the rest of the pipeline
//! never needs to know where a record came from.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Field holding the business identifier when none is configured
pub const DEFAULT_BUSINESS_KEY_FIELD: &str = "OrderId";

/// Destination document identifier, taken from the business key field
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessKey(String);

impl BusinessKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Render a field value as a key
    ///
    /// Null, empty or whitespace-only strings, arrays and objects carry no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
            },
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a record came from, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLocation {
    /// Zero-based position in the ordered SQL result
    Row(u64),
    /// Line in the CSV file
    Line(u64),
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLocation::Row(row) => write!(f, "row {row}"),
            RecordLocation::Line(line) => write!(f, "line {line}"),
        }
    }
}

/// One row returned by the relational source, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRecord {
    columns: BTreeMap<String, Value>,
    row: Option<u64>,
}

impl SqlRecord {
    pub fn new(columns: BTreeMap<String, Value>) -> Self {
        Self { columns, row: None }
    }

    /// Tag the record with its position in the ordered result
    pub fn with_row(mut self, row: u64) -> Self {
        self.row = Some(row);
        self
    }

    pub fn row(&self) -> Option<u64> {
        self.row
    }

    /// Exact column name first, then a case-insensitive match
    ///
    /// PostgreSQL folds unquoted identifiers to lower case, so `OrderStatus`
    /// in a query usually comes back as `orderstatus`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.columns.get(field).or_else(|| {
            self.columns
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(field))
                .map(|(_, value)| value)
        })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for SqlRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
            row: None,
        }
    }
}

/// One CSV line; header lookups ignore ASCII case
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecord {
    headers: Arc<[String]>,
    values: Vec<Value>,
    line: Option<u64>,
}

impl CsvRecord {
    /// Rows may be shorter or longer than the header; missing cells read as
    /// absent fields and surplus cells are unreachable.
    pub fn new(headers: Arc<[String]>, values: Vec<String>, line: Option<u64>) -> Self {
        Self {
            headers,
            values: values.into_iter().map(Value::String).collect(),
            line,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(field))
            .and_then(|idx| self.values.get(idx))
    }

    /// Line number in the source file, when the parser knows it
    pub fn line(&self) -> Option<u64> {
        self.line
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Sql(SqlRecord),
    Csv(CsvRecord),
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Record::Sql(record) => record.get(field),
            Record::Csv(record) => record.get(field),
        }
    }

    pub fn business_key(&self, key_field: &str) -> Option<BusinessKey> {
        self.get(key_field).and_then(BusinessKey::from_value)
    }

    pub fn location(&self) -> Option<RecordLocation> {
        match self {
            Record::Sql(record) => record.row().map(RecordLocation::Row),
            Record::Csv(record) => record.line().map(RecordLocation::Line),
        }
    }
}

impl From<SqlRecord> for Record {
    fn from(record: SqlRecord) -> Self {
        Record::Sql(record)
    }
}

impl From<CsvRecord> for Record {
    fn from(record: CsvRecord) -> Self {
        Record::Csv(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|s| s.to_string()).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_business_key_from_value() {
        assert_eq!(BusinessKey::from_value(&json!("A-100")).unwrap().as_str(), "A-100");
        assert_eq!(BusinessKey::from_value(&json!(42)).unwrap().as_str(), "42");
        assert_eq!(BusinessKey::from_value(&json!("  7 ")).unwrap().as_str(), "7");
        assert!(BusinessKey::from_value(&json!("")).is_none());
        assert!(BusinessKey::from_value(&Value::Null).is_none());
        assert!(BusinessKey::from_value(&json!({"id": 1})).is_none());
    }

    #[test]
    fn test_csv_lookup_ignores_case() {
        let record = CsvRecord::new(
            headers(&["orderid", "Status"]),
            vec!["1".to_string(), "shipped".to_string()],
            Some(2),
        );
        assert_eq!(record.get("OrderId"), Some(&json!("1")));
        assert_eq!(record.get("STATUS"), Some(&json!("shipped")));
        assert_eq!(record.line(), Some(2));
    }

    #[test]
    fn test_short_csv_row_reports_absent_field() {
        let record = CsvRecord::new(headers(&["OrderId", "Status"]), vec!["1".to_string()], None);
        assert!(record.get("Status").is_none());
        assert_eq!(Record::from(record).business_key("orderid").unwrap().as_str(), "1");
    }

    #[test]
    fn test_sql_lookup_prefers_exact_name() {
        let record: SqlRecord = [
            ("status".to_string(), json!("lower")),
            ("Status".to_string(), json!("exact")),
            ("orderid".to_string(), json!(9)),
        ]
        .into_iter()
        .collect();

        assert_eq!(record.get("Status"), Some(&json!("exact")));
        assert_eq!(record.get("OrderId"), Some(&json!(9)));
        assert!(record.get("Total").is_none());
    }

    #[test]
    fn test_location_names_row_or_line() {
        let sql: Record = SqlRecord::default().with_row(250).into();
        assert_eq!(sql.location(), Some(RecordLocation::Row(250)));
        assert_eq!(sql.location().unwrap().to_string(), "row 250");

        let csv: Record = CsvRecord::new(headers(&["OrderId"]), vec![], Some(7)).into();
        assert_eq!(csv.location().unwrap().to_string(), "line 7");
    }
}

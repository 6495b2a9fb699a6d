use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A row as read from the source: column name → raw text, in header order.
pub type RawRecord = IndexMap<String, String>;

/// One full load of the source, in row order.
pub type Roster = Vec<Record>;

/// A normalized field value.
///
/// Serialized untagged, so numbers become JSON numbers and text stays a JSON
/// string. Deserializing a cached roster yields the same variants back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(Number),
    Text(String),
}

impl FieldValue {
    pub fn is_number(&self) -> bool {
        matches!(self, FieldValue::Number(_))
    }

    /// Text view of the value. Numbers render in their canonical JSON form.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<Number> for FieldValue {
    fn from(value: Number) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

/// A normalized roster entry with field order preserved from the source header.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an all-text record, the shape the row parser produces.
    pub fn from_raw_text(raw: RawRecord) -> Self {
        raw.into_iter()
            .map(|(column, value)| (column, FieldValue::Text(value)))
            .collect()
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    /// Text view of a column, if present.
    pub fn text(&self, column: &str) -> Option<Cow<'_, str>> {
        self.0.get(column).map(FieldValue::as_text)
    }

    /// Insert or replace a field. Replacing keeps the column's position.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut record = Record::new();
        record.insert("name", "Ana");
        record.insert("age", 30_i64);
        record.insert("score", Number::from_f64(4.5).unwrap());
        record
    }

    #[test]
    fn serializes_numbers_and_text_in_column_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"name":"Ana","age":30,"score":4.5}"#);
    }

    #[test]
    fn cached_form_deserializes_to_same_variants() {
        let json = serde_json::to_vec(&vec![sample()]).unwrap();
        let roster: Roster = serde_json::from_slice(&json).unwrap();
        assert_eq!(roster, vec![sample()]);
        assert!(roster[0].get("age").unwrap().is_number());
        assert!(!roster[0].get("name").unwrap().is_number());
        assert_eq!(serde_json::to_vec(&roster).unwrap(), json);
    }

    #[test]
    fn replacing_a_field_keeps_its_position() {
        let mut record = sample();
        record.insert("name", "Bea");
        let columns: Vec<_> = record.columns().collect();
        assert_eq!(columns, ["name", "age", "score"]);
        assert_eq!(record.text("name").as_deref(), Some("Bea"));
        assert_eq!(record.text("age").as_deref(), Some("30"));
    }

    #[test]
    fn raw_rows_become_text_fields() {
        let raw: RawRecord = [("age".to_string(), "30".to_string())].into_iter().collect();
        let record = Record::from_raw_text(raw);
        assert_eq!(record.get("age"), Some(&FieldValue::Text("30".into())));
        assert_eq!(record.len(), 1);
        assert!(!record.is_empty());
    }
}

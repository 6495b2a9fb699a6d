//! Record normalization: numeric coercion and phone formatting.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Number;

use crate::phone::{PhoneOutcome, format_e164};
use crate::record::{FieldValue, RawRecord, Record};

/// A full numeric literal: optional sign, integer or decimal digits.
static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$").expect("numeric literal regex")
});

/// Parse a raw value that is numeric in full.
///
/// Integers that fit `i64`/`u64` stay integral, and so do decimals with a zero
/// fraction (`"4.0"` is `4`). Everything else becomes a finite `f64`. Empty,
/// partial or non-finite values are not numbers.
pub fn coerce_numeric(raw: &str) -> Option<Number> {
    if !NUMERIC_LITERAL.is_match(raw) {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n.into());
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n.into());
    }
    let n = raw.parse::<f64>().ok()?;
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        return Some((n as i64).into());
    }
    Number::from_f64(n)
}

fn coerce_field(raw: &str) -> FieldValue {
    coerce_numeric(raw).map_or_else(|| FieldValue::Text(raw.to_owned()), FieldValue::Number)
}

/// Turns raw rows into typed records.
///
/// Coercion is applied to every column regardless of its name. Phone
/// formatting reads the raw `phone` and `country` text captured before
/// coercion, so numeric-looking phones keep their leading zeros.
#[derive(Debug, Clone)]
pub struct Normalizer {
    phone_column: String,
    country_column: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            phone_column: "phone".into(),
            country_column: "country".into(),
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(phone: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            phone_column: phone.into(),
            country_column: country.into(),
        }
    }

    pub fn normalize(&self, raw: RawRecord) -> Record {
        let mut record: Record = raw
            .iter()
            .map(|(column, value)| (column.clone(), coerce_field(value)))
            .collect();

        if let (Some(phone), Some(country)) =
            (raw.get(&self.phone_column), raw.get(&self.country_column))
        {
            if let PhoneOutcome::Formatted(e164) = format_e164(phone, country) {
                record.insert(self.phone_column.as_str(), e164);
            }
        }

        record
    }

    pub fn normalize_all(&self, rows: impl IntoIterator<Item = RawRecord>) -> Vec<Record> {
        rows.into_iter().map(|row| self.normalize(row)).collect()
    }
}

//! Wire types for metric ingestion.
//!
//! Collectors post a device guid and a batch of metric submissions. Field
//! order matters: the first time a metric sees a field name, that name is
//! given the next index. The canonical form therefore carries fields as an
//! ordered list of `[name, value]` pairs:
//!
//! ```json
//! {"device_guid": "…", "metrics": [
//!     {"name": "Memory Usage", "fields": [["percentage", 42.5]]}
//! ]}
//! ```
//!
//! The older object form (`"fields": {"percentage": 42.5}`) is still
//! accepted and read in document order.

use std::fmt;

use db::models::metric_field::FieldType;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::SubmissionError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
}

struct FieldValueVisitor;

impl Visitor<'_> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, string or boolean field value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(FieldValue::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v))
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

impl FieldValue {
    /// The text stored for this value.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn inferred_type(&self) -> FieldType {
        match self {
            FieldValue::Number(_) => FieldType::Numeric,
            FieldValue::Text(_) => FieldType::Text,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Number(v.into())
    }
}

impl From<f64> for FieldValue {
    /// Non-finite floats have no JSON number form and are kept as text.
    fn from(v: f64) -> Self {
        match serde_json::Number::from_f64(v) {
            Some(n) => FieldValue::Number(n),
            None => FieldValue::Text(v.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// Ordered `(name, value)` pairs of one submission.
///
/// A name that appears twice keeps its first position and takes the later
/// value, so every name occurs at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldList(Vec<(String, FieldValue)>);

impl FieldList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = FieldList::new();
        for (name, value) in iter {
            list.push(name, value);
        }
        list
    }
}

impl Serialize for FieldList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for pair in &self.0 {
            seq.serialize_element(pair)?;
        }
        seq.end()
    }
}

struct FieldListVisitor;

impl<'de> Visitor<'de> for FieldListVisitor {
    type Value = FieldList;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list of [name, value] pairs or an object of name: value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldList, E> {
        Ok(FieldList::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FieldList, A::Error> {
        let mut list = FieldList::new();
        while let Some((name, value)) = seq.next_element::<(String, FieldValue)>()? {
            list.push(name, value);
        }
        Ok(list)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldList, A::Error> {
        let mut list = FieldList::new();
        while let Some((name, value)) = map.next_entry::<String, FieldValue>()? {
            list.push(name, value);
        }
        Ok(list)
    }
}

impl<'de> Deserialize<'de> for FieldList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldListVisitor)
    }
}

/// One named metric reading as submitted by a collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: FieldList,
}

impl MetricSubmission {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            fields: FieldList::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push(name, value);
        self
    }

    /// Decodes one item of a batch on its own, so a bad item costs only itself.
    ///
    /// # Errors
    /// `Malformed` when the item is not a submission object or holds a value
    /// of an unsupported type.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SubmissionError> {
        serde_json::from_value(value).map_err(|e| SubmissionError::Malformed(e.to_string()))
    }

    /// The metric name, if the submission is well formed.
    ///
    /// # Errors
    /// `MissingName` for an absent or empty name, `EmptyFields` when no field
    /// is supplied.
    pub fn validate(&self) -> Result<&str, SubmissionError> {
        let name = match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(SubmissionError::MissingName),
        };
        if self.fields.is_empty() {
            return Err(SubmissionError::EmptyFields(name.to_owned()));
        }
        Ok(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestPayload {
    pub device_guid: String,
    #[serde(default)]
    pub metrics: Vec<MetricSubmission>,
}

/// A request body whose metric items have not been decoded yet.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIngestPayload {
    pub device_guid: String,
    #[serde(default)]
    pub metrics: Vec<serde_json::Value>,
}

impl RawIngestPayload {
    pub fn into_items(self) -> Vec<Result<MetricSubmission, SubmissionError>> {
        self.metrics.into_iter().map(MetricSubmission::from_value).collect()
    }
}

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Type tag of a header leaf value, as reported in value statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Null,
    Array,
    Object,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Null => "null",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }

    /// Scalars are counted into the top-values list; arrays and records are not
    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueKind::Array | ValueKind::Object)
    }
}

/// A single frontmatter value after YAML parsing
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Array(Vec<HeaderValue>),
    Record(Header),
}

impl HeaderValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            HeaderValue::String(_) => ValueKind::String,
            HeaderValue::Number(_) => ValueKind::Number,
            HeaderValue::Boolean(_) => ValueKind::Boolean,
            HeaderValue::Null => ValueKind::Null,
            HeaderValue::Array(_) => ValueKind::Array,
            HeaderValue::Record(_) => ValueKind::Object,
        }
    }

    /// Canonical string form used to group equal values.
    /// Whole numbers render without a fractional part ("3", not "3.0").
    pub fn render(&self) -> String {
        match self {
            HeaderValue::String(s) => s.clone(),
            HeaderValue::Number(n) => render_number(*n),
            HeaderValue::Boolean(b) => b.to_string(),
            HeaderValue::Null => "null".to_string(),
            HeaderValue::Array(items) => items
                .iter()
                .map(|item| item.render())
                .collect::<Vec<_>>()
                .join(","),
            HeaderValue::Record(_) => "[object]".to_string(),
        }
    }
}

fn render_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<Value> for HeaderValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HeaderValue::Null,
            Value::Bool(b) => HeaderValue::Boolean(b),
            Value::Number(n) => HeaderValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => HeaderValue::String(s),
            Value::Sequence(seq) => {
                HeaderValue::Array(seq.into_iter().map(HeaderValue::from).collect())
            }
            Value::Mapping(mapping) => HeaderValue::Record(Header::from_mapping(mapping)),
            // Custom tags like `!date 2024-01-01` keep only the tagged value
            Value::Tagged(tagged) => HeaderValue::from(tagged.value),
        }
    }
}

/// Parsed frontmatter record.
/// Keys keep the order they were written in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    entries: Vec<(String, HeaderValue)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(mapping: serde_yaml::Mapping) -> Self {
        let mut header = Header::new();
        for (key, value) in mapping {
            header.insert(render_key(&key), HeaderValue::from(value));
        }
        header
    }

    /// Insert a value, replacing an existing key in place
    pub fn insert(&mut self, key: impl Into<String>, value: HeaderValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// YAML allows non-string mapping keys (`2024: done`, `true: x`)
fn render_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => render_key(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

//! Minimal record model.
//!
//! An [`Event`] is a JSON object. Field names are either plain keys
//! (`message`) or bracketed paths into nested objects (`[http][status]`).
//! Values read for matching are classified as a [`FieldValue`], and captures
//! are written back with [`Event::set`] (overwrite) or [`Event::merge`].

use serde_json::{Map, Value};

/// Name of the field holding event tags.
pub const TAGS_FIELD: &str = "tags";

/// Shape of a field value at merge time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Absent,
    Scalar(Value),
    Array(Vec<Value>),
}

impl FieldValue {
    /// Classify a stored value. A stored `null` counts as absent.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => FieldValue::Absent,
            Some(Value::Array(values)) => FieldValue::Array(values.clone()),
            Some(value) => FieldValue::Scalar(value.clone()),
        }
    }

    /// Combine with a newly captured value.
    ///
    /// Absent becomes the new value, an array gets the value appended, and a
    /// scalar is promoted to `[existing, new]`.
    pub fn merge(self, new: Value) -> Value {
        match self {
            FieldValue::Absent => new,
            FieldValue::Array(mut values) => {
                values.push(new);
                Value::Array(values)
            }
            FieldValue::Scalar(existing) => Value::Array(vec![existing, new]),
        }
    }
}

/// A record flowing through the engine.
///
/// # Examples
///
/// ```rust
/// use grok_engine::Event;
/// use serde_json::json;
///
/// let mut event = Event::from_json(json!({"message": "hello"})).unwrap();
/// event.merge("word", json!("a"));
/// event.merge("word", json!("b"));
/// event.set("[http][status]", json!(200));
///
/// assert_eq!(event.get("word"), Some(&json!(["a", "b"])));
/// assert_eq!(event.get("[http][status]"), Some(&json!(200)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. Returns `None` unless it is an object.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        let mut event = Self::new();
        event.set("message", Value::String(message.into()));
        event
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let path = field_path(name);
        let (last, parents) = path.split_last()?;
        let mut current = &self.fields;
        for key in parents {
            current = current.get(*key)?.as_object()?;
        }
        current.get(*last)
    }

    pub fn get_field(&self, name: &str) -> FieldValue {
        FieldValue::from_value(self.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name` to `value`, replacing any existing value. Intermediate
    /// objects of a bracketed path are created as needed.
    pub fn set(&mut self, name: &str, value: Value) {
        let path = field_path(name);
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut current = &mut self.fields;
        for key in parents {
            let slot = current
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else {
                return;
            };
            current = next;
        }
        current.insert(last.to_string(), value);
    }

    /// Merge `value` into `name` following [`FieldValue::merge`].
    pub fn merge(&mut self, name: &str, value: Value) {
        let merged = self.get_field(name).merge(value);
        self.set(name, merged);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let path = field_path(name);
        let (last, parents) = path.split_last()?;
        let mut current = &mut self.fields;
        for key in parents {
            current = current.get_mut(*key)?.as_object_mut()?;
        }
        current.remove(*last)
    }

    /// Add `tag` to the `tags` array unless already present.
    pub fn tag(&mut self, tag: &str) {
        if self.has_tag(tag) {
            return;
        }
        let mut tags = match self.fields.remove(TAGS_FIELD) {
            None => Vec::new(),
            Some(Value::Array(values)) => values,
            Some(other) => vec![other],
        };
        tags.push(Value::String(tag.to_string()));
        self.fields.insert(TAGS_FIELD.to_string(), Value::Array(tags));
    }

    pub fn tags(&self) -> Vec<&str> {
        match self.fields.get(TAGS_FIELD) {
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(tag)) => vec![tag.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Split a field reference into object keys. `[a][b]` is a path, anything
/// else is a single top-level key.
fn field_path(name: &str) -> Vec<&str> {
    let is_path = name.len() > 2 && name.starts_with('[') && name.ends_with(']');
    if !is_path {
        return vec![name];
    }
    name[1..name.len() - 1]
        .split("][")
        .filter(|key| !key.is_empty())
        .collect()
}

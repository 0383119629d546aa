//! Dynamic values and option records.
//!
//! Every piece of per-class configuration and every instance field is a [`Value`]. Option records
//! ([`Options`]) are merged by [`Options::merge`], which implements the inheritance rules for
//! configuration:
//!
//! - a nested `Options` entry is merged key by key, recursively;
//! - a `Method` entry overriding another `Method` keeps the overridden one reachable through
//!   [`Super`](crate::Super);
//! - anything else is overwritten.

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::manifest::Factory;
use crate::method::Method;
use crate::source::Source;
use core::fmt;
use std::collections::BTreeMap;

/// A plain record. Unlike [`Options`], records are replaced wholesale when merged.
pub type Record = BTreeMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record(Record),
    /// A mergeable options record.
    Options(Options),
    Method(Method),
    Instance(Instance),
    /// A zero-argument instance factory.
    Factory(Factory),
    /// Render output.
    Source(Source),
}

impl Value {
    /// A short name for the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Options(_) => "options",
            Value::Method(_) => "method",
            Value::Instance(_) => "instance",
            Value::Factory(_) => "factory",
            Value::Source(_) => "source",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Loose truthiness: null, false, zero and the empty string are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_options(&self) -> Option<&Options> {
        match self {
            Value::Options(options) => Some(options),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&Method> {
        match self {
            Value::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_source(&self) -> Option<&Source> {
        match self {
            Value::Source(source) => Some(source),
            _ => None,
        }
    }

    /// Returns the instance or fails with `InvalidArgument` naming `what`.
    pub(crate) fn expect_instance(&self, what: &str) -> Result<&Instance> {
        self.as_instance()
            .ok_or_else(|| Error::invalid(format!("{} must be an instance, got {}", what, self.kind())))
    }

    /// Returns the source or fails with `InvalidArgument` naming `what`.
    pub(crate) fn expect_source(&self, what: &str) -> Result<&Source> {
        self.as_source()
            .ok_or_else(|| Error::invalid(format!("{} must be a source, got {}", what, self.kind())))
    }

    /// Exports a plain data value as JSON.
    ///
    /// Options and records become objects. Methods, instances, factories and sources have no
    /// JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as Json;
        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| Error::invalid(format!("{} has no JSON form", f)))?,
            Value::Str(s) => Json::String(s.clone()),
            Value::List(list) => Json::Array(list.iter().map(Value::to_json).collect::<Result<_>>()?),
            Value::Record(record) => Json::Object(
                record
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Options(options) => Json::Object(
                options
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_>>()?,
            ),
            other => {
                return Err(Error::invalid(format!("cannot export {} as JSON", other.kind())));
            }
        })
    }
}

impl PartialEq for Value {
    /// Data compares structurally; instances, methods, factories and sources by identity.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Options(a), Value::Options(b)) => a == b,
            (Value::Method(a), Value::Method(b)) => a.ptr_eq(b),
            (Value::Instance(a), Value::Instance(b)) => a.ptr_eq(b),
            (Value::Factory(a), Value::Factory(b)) => a.ptr_eq(b),
            (Value::Source(a), Value::Source(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(list) => Value::List(list.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Record(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Value {
                    Value::$variant(value.into())
                }
            }
        )+
    }
}
impl_from!(
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
    Vec<Value> => List,
    Record => Record,
    Options => Options,
    Method => Method,
    Instance => Instance,
    Factory => Factory,
    Source => Source,
);

impl From<usize> for Value {
    fn from(value: usize) -> Value {
        Value::Int(value as i64)
    }
}

impl From<&Instance> for Value {
    fn from(instance: &Instance) -> Value {
        Value::Instance(instance.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Value {
        value.map_or(Value::Null, Into::into)
    }
}

/// A mergeable, ordered record of named values.
#[derive(Clone, Default, PartialEq)]
pub struct Options {
    entries: BTreeMap<String, Value>,
}

/// Builds an [`Options`] record.
///
/// ```
/// let options = brew::options! { "a" => 1, "b" => "two" };
/// assert_eq!(options.len(), 2);
/// ```
#[macro_export]
macro_rules! options {
    () => {
        $crate::Options::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut options = $crate::Options::new();
        $(options.insert($key, $value);)+
        options
    }};
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Options {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn into_record(self) -> Record {
        self.entries
    }

    /// Merges `overrides` into this record.
    ///
    /// Fails if an override would replace a nested options record with a non-null scalar; the
    /// record is left partially merged in that case.
    pub fn merge(&mut self, overrides: &Options) -> Result<()> {
        for (key, incoming) in overrides.iter() {
            let merged = merge_entry(key, self.entries.get(key), incoming)?;
            self.entries.insert(key.clone(), merged);
        }
        Ok(())
    }

    /// Returns a merged copy.
    pub fn merged(&self, overrides: &Options) -> Result<Options> {
        let mut options = self.clone();
        options.merge(overrides)?;
        Ok(options)
    }

    /// Parses a JSON object into an options record.
    ///
    /// Nested objects become plain records (e.g. widget descriptors with a `type` field).
    pub fn from_json(text: &str) -> Result<Options> {
        let value: Value = serde_json::from_str::<serde_json::Value>(text)?.into();
        match value {
            Value::Record(record) => Ok(record.into()),
            other => Err(Error::invalid(format!(
                "options must be a JSON object, got {}",
                other.kind()
            ))),
        }
    }
}

fn merge_entry(key: &str, current: Option<&Value>, incoming: &Value) -> Result<Value> {
    Ok(match (current, incoming) {
        (Some(Value::Method(base)), Value::Method(method)) => Value::Method(method.overriding(base)),
        (Some(Value::Options(base)), Value::Options(options)) => Value::Options(base.merged(options)?),
        (Some(Value::Options(base)), Value::Record(record)) => {
            Value::Options(base.merged(&record.clone().into())?)
        }
        (Some(Value::Options(_)), Value::Null) => Value::Null,
        (Some(Value::Options(_)), other) => {
            return Err(Error::invalid(format!(
                "option `{}` is a nested options record and cannot be replaced by a {}",
                key,
                other.kind()
            )));
        }
        (_, incoming) => incoming.clone(),
    })
}

impl From<Record> for Options {
    fn from(entries: Record) -> Options {
        Options { entries }
    }
}

impl FromIterator<(String, Value)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Options {
        Options {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Options {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

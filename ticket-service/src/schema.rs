//! Entity schemas
//!
//! An [`EntitySchema`] describes the field set of one resource type. The
//! document store uses it to validate and coerce writes and to cast filter
//! values to the stored representation; the query pipeline uses its field
//! names as the filter allow-list.
//!
//! # Example
//!
//! ```rust
//! use ticket_service::schema::{EntitySchema, FieldSpec};
//!
//! let schema = EntitySchema::new("books")
//!     .field(FieldSpec::text("title").required("A book must have a title").trimmed())
//!     .field(FieldSpec::number("price"))
//!     .field(FieldSpec::timestamp("createdAt").default_now());
//!
//! assert!(schema.is_queryable("price"));
//! assert!(!schema.is_queryable("password"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// A stored record: field name to JSON value
pub type Document = Map<String, Value>;

/// Per-field validation messages, keyed by field name
pub type FieldErrors = BTreeMap<String, String>;

/// Identifier field present on every stored document
pub const ID_FIELD: &str = "id";

/// Internal version field, hidden from list reads by default
pub const VERSION_FIELD: &str = "_version";

/// Storage type of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text
    Text,
    /// JSON number (integer or float)
    Number,
    /// Boolean flag
    Boolean,
    /// UTC instant, stored as an RFC 3339 string with millisecond precision
    Timestamp,
    /// Text restricted to a fixed set of values
    Choice(Vec<String>),
    /// Identifier of a document in another collection
    Reference(String),
}

impl FieldKind {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text | Self::Choice(_) => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Timestamp => "Date",
            Self::Reference(_) => "ObjectId",
        }
    }
}

/// Value assigned to a field missing from a new document
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    /// A fixed value
    Value(Value),
    /// The current instant, for timestamp fields
    Now,
}

impl FieldDefault {
    fn produce(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Now => Value::String(format_timestamp(&Utc::now())),
        }
    }
}

/// A value could not be converted to the field's storage type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastFailure {
    /// Field being cast
    pub path: String,
    /// Offending value, rendered as text
    pub value: String,
    /// Target type name
    pub kind: &'static str,
}

impl fmt::Display for CastFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cast to {} failed for value \"{}\" at path \"{}\"",
            self.kind, self.value, self.path
        )
    }
}

/// Declaration of a single field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name as it appears in documents and query strings
    pub name: String,
    /// Storage type
    pub kind: FieldKind,
    /// Message reported when the field is missing or blank
    pub required: Option<String>,
    /// Strip surrounding whitespace from text values
    pub trim: bool,
    /// Enforce a unique index on the field
    pub unique: bool,
    /// Value assigned on insert when the payload omits the field
    pub default: Option<FieldDefault>,
}

impl FieldSpec {
    /// Create an optional field of the given kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: None,
            trim: false,
            unique: false,
            default: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    pub fn choice<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Choice(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn reference(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Reference(collection.into()))
    }

    /// Mark the field as required, reporting `message` when it is missing
    #[must_use]
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    #[must_use]
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::Now);
        self
    }

    /// Convert a value to this field's storage representation
    ///
    /// Casting checks the type only; choice membership and `required` are
    /// enforced by [`FieldSpec::check`] on writes. Filter values go through
    /// casting alone, so `status[ne]=ARCHIVED` is a valid (empty) filter.
    pub fn cast(&self, value: &Value) -> Result<Value, CastFailure> {
        let cast = match (&self.kind, value) {
            (FieldKind::Text | FieldKind::Choice(_), Value::String(text)) => {
                Some(Value::String(if self.trim {
                    text.trim().to_string()
                } else {
                    text.clone()
                }))
            }
            (FieldKind::Text | FieldKind::Choice(_), Value::Number(n)) => {
                Some(Value::String(n.to_string()))
            }
            (FieldKind::Text | FieldKind::Choice(_), Value::Bool(b)) => {
                Some(Value::String(b.to_string()))
            }
            (FieldKind::Number, Value::Number(_)) => Some(value.clone()),
            (FieldKind::Number, Value::String(text)) => parse_number(text.trim()),
            (FieldKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (FieldKind::Boolean, Value::String(text)) => match text.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (FieldKind::Timestamp, Value::String(text)) => {
                parse_timestamp(text.trim()).map(|at| Value::String(format_timestamp(&at)))
            }
            (FieldKind::Timestamp, Value::Number(n)) => n
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .map(|at| Value::String(format_timestamp(&at))),
            (FieldKind::Reference(_), Value::String(text)) => Uuid::parse_str(text.trim())
                .ok()
                .map(|id| Value::String(id.to_string())),
            _ => None,
        };

        cast.ok_or_else(|| CastFailure {
            path: self.name.clone(),
            value: display_value(value),
            kind: self.kind.type_name(),
        })
    }

    /// Run write validators against an already-cast value
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if let Some(message) = &self.required {
            if is_blank(value) {
                return Err(message.clone());
            }
        }
        if let (FieldKind::Choice(allowed), Value::String(text)) = (&self.kind, value) {
            if !allowed.iter().any(|candidate| candidate == text) {
                return Err(format!(
                    "`{text}` is not a valid enum value for path `{}`.",
                    self.name
                ));
            }
        }
        Ok(())
    }
}

/// Field set of one resource type, bound to a collection name
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    collection: String,
    fields: Vec<FieldSpec>,
}

impl EntitySchema {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field declaration
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.retain(|existing| existing.name != spec.name);
        self.fields.push(spec);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Field names clients may filter, sort and project on
    pub fn allow_list(&self) -> Vec<&str> {
        std::iter::once(ID_FIELD)
            .chain(self.fields.iter().map(|spec| spec.name.as_str()))
            .collect()
    }

    pub fn is_queryable(&self, name: &str) -> bool {
        name == ID_FIELD || self.field_spec(name).is_some()
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|spec| spec.unique)
    }

    /// Cast a filter operand for `field` to its stored representation
    pub fn cast_filter_value(&self, field: &str, value: &Value) -> Result<Value, CastFailure> {
        if field == ID_FIELD {
            return cast_identifier(value);
        }
        match self.field_spec(field) {
            Some(spec) => spec.cast(value),
            None => Ok(value.clone()),
        }
    }

    /// Validate and coerce a payload for insertion
    ///
    /// Unknown keys are dropped. Missing fields take their default; missing
    /// required fields without a default are reported. Every violated field is
    /// collected before failing.
    pub fn prepare_insert(&self, payload: &Document) -> Result<Document, FieldErrors> {
        let mut document = Document::new();
        let mut errors = FieldErrors::new();

        for spec in &self.fields {
            match payload.get(&spec.name).filter(|value| !value.is_null()) {
                Some(raw) => match self.coerce(spec, raw) {
                    Ok(value) => {
                        document.insert(spec.name.clone(), value);
                    }
                    Err(message) => {
                        errors.insert(spec.name.clone(), message);
                    }
                },
                None => {
                    if let Some(default) = &spec.default {
                        document.insert(spec.name.clone(), default.produce());
                    } else if let Some(message) = &spec.required {
                        errors.insert(spec.name.clone(), message.clone());
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(document)
        } else {
            Err(errors)
        }
    }

    /// Validate and coerce a partial update
    ///
    /// Only declared fields present in the patch are checked. A `null` value
    /// unsets an optional field and is a violation for a required one.
    pub fn prepare_update(&self, patch: &Document) -> Result<Document, FieldErrors> {
        let mut changes = Document::new();
        let mut errors = FieldErrors::new();

        for (key, raw) in patch {
            let Some(spec) = self.field_spec(key) else {
                continue;
            };
            if raw.is_null() {
                match &spec.required {
                    Some(message) => {
                        errors.insert(key.clone(), message.clone());
                    }
                    None => {
                        changes.insert(key.clone(), Value::Null);
                    }
                }
                continue;
            }
            match self.coerce(spec, raw) {
                Ok(value) => {
                    changes.insert(key.clone(), value);
                }
                Err(message) => {
                    errors.insert(key.clone(), message);
                }
            }
        }

        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }

    fn coerce(&self, spec: &FieldSpec, raw: &Value) -> Result<Value, String> {
        let value = spec.cast(raw).map_err(|failure| failure.to_string())?;
        spec.check(&value)?;
        Ok(value)
    }
}

/// Render an instant in the canonical stored form
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 instant or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn cast_identifier(value: &Value) -> Result<Value, CastFailure> {
    value
        .as_str()
        .and_then(|text| Uuid::parse_str(text.trim()).ok())
        .map(|id| Value::String(id.to_string()))
        .ok_or_else(|| CastFailure {
            path: ID_FIELD.to_string(),
            value: display_value(value),
            kind: "ObjectId",
        })
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Render a JSON value the way it appears in error messages
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

//! Node output schemas with uniquified field names

use rv_core::Type;
use serde::{Deserialize, Serialize};

/// A single output field of a plan node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Unique synthetic name (e.g. `e.id_0`)
    pub name: String,
    /// Field type
    pub ty: Type,
}

impl SchemaField {
    /// Create a new schema field
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered output fields plus the optional event-time field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered fields; names are unique within one schema
    pub fields: Vec<SchemaField>,
    /// Name of the field carrying event time, used for watermarks
    pub time_field: Option<String>,
}

impl Schema {
    /// Create a schema from fields and an optional time field
    pub fn new(fields: Vec<SchemaField>, time_field: Option<String>) -> Self {
        Self { fields, time_field }
    }

    /// Create an empty schema
    pub fn empty() -> Self {
        Self::default()
    }

    /// Find a field by exact name
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether any of the given unique variable names is a field of this schema.
    ///
    /// Physical variables always carry unique names, so only exact matches count.
    pub fn uses_any<S: AsRef<str>>(&self, variables: &[S]) -> bool {
        variables
            .iter()
            .any(|variable| self.field(variable.as_ref()).is_some())
    }

    /// Concatenate two schemas, e.g. for join output. The time field is dropped.
    pub fn concat(left: &Schema, right: &Schema) -> Self {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Self {
            fields,
            time_field: None,
        }
    }
}

/// Whether a variable reference names the given field.
///
/// An exact match always counts. An unqualified variable also matches a
/// qualified field by the part after the first `.`, so `id` matches `e.id`.
pub fn variable_name_matches_field(variable: &str, field: &str) -> bool {
    if variable == field {
        return true;
    }
    if variable.contains('.') {
        return false;
    }
    match field.split_once('.') {
        Some((_, suffix)) => suffix == variable,
        None => false,
    }
}

//! Physical plan IR: typed nodes and expressions with uniquified schemas

pub mod expr;
pub mod node;
pub mod schema;

use crate::registry::Catalog;
use rv_core::{StreamingConfig, TriggerSpec};
use schema::{Schema, SchemaField};
use std::collections::BTreeMap;
use std::sync::Arc;

/// User-facing name to unique synthetic name (or the reverse)
pub type NameMapping = BTreeMap<String, String>;

/// Flip a mapping, e.g. to go from unique names back to user-facing ones
pub fn reverse_mapping(mapping: &NameMapping) -> NameMapping {
    mapping
        .iter()
        .map(|(original, unique)| (unique.clone(), original.clone()))
        .collect()
}

/// One frame of the record-schema stack seen by expression typechecking
#[derive(Debug)]
pub struct VariableContext {
    /// Enclosing record scope
    pub parent: Option<Arc<VariableContext>>,
    /// Fields bound by this scope
    pub fields: Vec<SchemaField>,
}

/// Typecheck-time environment: registries and the record-schema stack.
#[derive(Clone)]
pub struct Environment {
    /// Datasource, function, and aggregate registries
    pub catalog: Arc<Catalog>,
    /// Triggers a GROUP BY gets when it names none
    pub default_triggers: Arc<Vec<TriggerSpec>>,
    /// Innermost record scope
    pub variable_context: Option<Arc<VariableContext>>,
}

impl Environment {
    /// Environment with no record scope and the default streaming settings
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            default_triggers: Arc::new(StreamingConfig::default().default_triggers),
            variable_context: None,
        }
    }

    /// Use the trigger defaults from a streaming configuration
    pub fn with_streaming_config(mut self, config: &StreamingConfig) -> Self {
        self.default_triggers = Arc::new(config.default_triggers.clone());
        self
    }

    /// Extend the record-schema stack with a new innermost frame
    pub fn with_record_schema(&self, schema: &Schema) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            default_triggers: Arc::clone(&self.default_triggers),
            variable_context: Some(Arc::new(VariableContext {
                parent: self.variable_context.clone(),
                fields: schema.fields.clone(),
            })),
        }
    }

    /// Find a field by unique name, innermost frame first.
    ///
    /// Returns the field and whether the innermost frame bound it.
    pub fn lookup_field(&self, unique_name: &str) -> Option<(&SchemaField, bool)> {
        let mut is_level0 = true;
        let mut frame = self.variable_context.as_deref();
        while let Some(context) = frame {
            if let Some(field) = context.fields.iter().find(|f| f.name == unique_name) {
                return Some((field, is_level0));
            }
            is_level0 = false;
            frame = context.parent.as_deref();
        }
        None
    }
}

/// Rename a plan's output schema back to user-facing names.
///
/// Fields missing from `reverse` keep their unique name.
pub fn describe_schema(schema: &Schema, reverse: &NameMapping) -> Schema {
    let rename = |name: &str| reverse.get(name).cloned().unwrap_or_else(|| name.to_string());
    Schema {
        fields: schema
            .fields
            .iter()
            .map(|field| SchemaField::new(rename(&field.name), field.ty.clone()))
            .collect(),
        time_field: schema.time_field.as_deref().map(rename),
    }
}

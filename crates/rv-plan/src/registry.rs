//! Collaborator registries consulted by the typechecker
//!
//! Datasources, scalar functions, aggregates, and table valued functions are
//! all looked up by name. Concrete datasource adapters live outside this
//! crate and plug in through [`DatasourceRepository`].

use crate::error::{PlanError, PlanResult};
use crate::physical::expr::Expression;
use crate::physical::node::TableValuedFunctionArgument;
use crate::physical::schema::{Schema, SchemaField};
use rv_core::Type;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handle to a datasource adapter
pub trait DatasourceImplementation: std::fmt::Debug + Send + Sync {
    /// Decide which predicates the adapter evaluates itself.
    ///
    /// `candidates` are conjuncts of a filter directly above the scan and
    /// `already_pushed` those accepted earlier. Returns `(remaining, pushed,
    /// changed)`, where `pushed` is the complete new predicate set and
    /// `changed` is false when nothing new was accepted.
    fn push_down_predicates(
        &self,
        candidates: &[Expression],
        already_pushed: &[Expression],
    ) -> (Vec<Expression>, Vec<Expression>, bool);
}

/// Datasource lookup by name
pub trait DatasourceRepository: Send + Sync {
    /// Resolve a datasource and its schema. Field names are unqualified.
    fn get_datasource(&self, name: &str)
        -> PlanResult<(Arc<dyn DatasourceImplementation>, Schema)>;
}

/// In-process datasource registry
#[derive(Debug, Default)]
pub struct DatasourceRegistry {
    datasources: BTreeMap<String, (Arc<dyn DatasourceImplementation>, Schema)>,
}

impl DatasourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a datasource under `name`, replacing any previous entry
    pub fn register(
        &mut self,
        name: impl Into<String>,
        implementation: Arc<dyn DatasourceImplementation>,
        schema: Schema,
    ) {
        self.datasources
            .insert(name.into(), (implementation, schema));
    }

    /// Registered datasource names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.datasources.keys().map(String::as_str).collect()
    }
}

impl DatasourceRepository for DatasourceRegistry {
    fn get_datasource(
        &self,
        name: &str,
    ) -> PlanResult<(Arc<dyn DatasourceImplementation>, Schema)> {
        self.datasources
            .get(name)
            .map(|(implementation, schema)| (Arc::clone(implementation), schema.clone()))
            .ok_or_else(|| PlanError::UnknownDatasource {
                name: name.to_string(),
                message: format!(
                    "no datasource registered under this name (available: {})",
                    self.names().join(", ")
                ),
            })
    }
}

/// One overload of a scalar function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    /// Declared argument types
    pub argument_types: Vec<Type>,
    /// Declared output type
    pub output_type: Type,
    /// NULL in any argument yields NULL without calling the function
    pub strict: bool,
}

impl FunctionDescriptor {
    /// Strict overload (NULL in, NULL out)
    pub fn strict(argument_types: Vec<Type>, output_type: Type) -> Self {
        Self {
            argument_types,
            output_type,
            strict: true,
        }
    }

    /// Overload that receives NULL arguments itself
    pub fn non_strict(argument_types: Vec<Type>, output_type: Type) -> Self {
        Self {
            argument_types,
            output_type,
            strict: false,
        }
    }
}

/// One overload of an aggregate. NULL inputs are skipped, so the argument
/// may always be nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateDescriptor {
    /// Declared argument type
    pub argument_type: Type,
    /// Declared output type
    pub output_type: Type,
}

/// Global registries shared by every typecheck of a session
pub struct Catalog {
    /// Datasource lookup
    pub datasources: Arc<dyn DatasourceRepository>,
    /// Scalar function overloads by name
    pub functions: BTreeMap<String, Vec<FunctionDescriptor>>,
    /// Aggregate overloads by name
    pub aggregates: BTreeMap<String, Vec<AggregateDescriptor>>,
}

impl Catalog {
    /// Catalog with no functions or aggregates
    pub fn new(datasources: Arc<dyn DatasourceRepository>) -> Self {
        Self {
            datasources,
            functions: BTreeMap::new(),
            aggregates: BTreeMap::new(),
        }
    }

    /// Catalog with the built-in functions and aggregates registered
    pub fn with_builtins(datasources: Arc<dyn DatasourceRepository>) -> Self {
        let mut catalog = Self::new(datasources);
        register_builtin_functions(&mut catalog);
        register_builtin_aggregates(&mut catalog);
        catalog
    }

    /// Add an overload for a scalar function
    pub fn register_function(&mut self, name: &str, descriptor: FunctionDescriptor) {
        self.functions
            .entry(name.to_string())
            .or_default()
            .push(descriptor);
    }

    /// Add an overload for an aggregate
    pub fn register_aggregate(&mut self, name: &str, descriptor: AggregateDescriptor) {
        self.aggregates
            .entry(name.to_string())
            .or_default()
            .push(descriptor);
    }
}

fn register_builtin_functions(catalog: &mut Catalog) {
    let comparable = [
        Type::Int,
        Type::Float,
        Type::String,
        Type::Time,
        Type::Duration,
        Type::Boolean,
    ];
    for op in ["=", "!=", "<", "<=", ">", ">="] {
        for ty in &comparable {
            catalog.register_function(
                op,
                FunctionDescriptor::strict(vec![ty.clone(), ty.clone()], Type::Boolean),
            );
        }
    }

    for op in ["+", "-", "*", "/"] {
        for ty in [Type::Int, Type::Float] {
            catalog.register_function(
                op,
                FunctionDescriptor::strict(vec![ty.clone(), ty.clone()], ty),
            );
        }
    }
    for op in ["+", "-"] {
        catalog.register_function(
            op,
            FunctionDescriptor::strict(vec![Type::Time, Type::Duration], Type::Time),
        );
        catalog.register_function(
            op,
            FunctionDescriptor::strict(vec![Type::Duration, Type::Duration], Type::Duration),
        );
    }
    catalog.register_function(
        "-",
        FunctionDescriptor::strict(vec![Type::Time, Type::Time], Type::Duration),
    );
    catalog.register_function(
        "%",
        FunctionDescriptor::strict(vec![Type::Int, Type::Int], Type::Int),
    );
    for ty in [Type::Int, Type::Float] {
        catalog.register_function("neg", FunctionDescriptor::strict(vec![ty.clone()], ty));
    }

    catalog.register_function(
        "not",
        FunctionDescriptor::strict(vec![Type::Boolean], Type::Boolean),
    );
    for name in ["is_null", "is_not_null"] {
        catalog.register_function(
            name,
            FunctionDescriptor::non_strict(vec![Type::Any], Type::Boolean),
        );
    }

    catalog.register_function(
        "||",
        FunctionDescriptor::strict(vec![Type::String, Type::String], Type::String),
    );
    for name in ["lower", "upper"] {
        catalog.register_function(
            name,
            FunctionDescriptor::strict(vec![Type::String], Type::String),
        );
    }
    catalog.register_function(
        "length",
        FunctionDescriptor::strict(vec![Type::String], Type::Int),
    );
    catalog.register_function("now", FunctionDescriptor::non_strict(vec![], Type::Time));
}

fn register_builtin_aggregates(catalog: &mut Catalog) {
    catalog.register_aggregate(
        "count",
        AggregateDescriptor {
            argument_type: Type::Any,
            output_type: Type::Int,
        },
    );
    for ty in [Type::Int, Type::Float] {
        catalog.register_aggregate(
            "sum",
            AggregateDescriptor {
                argument_type: ty.clone(),
                output_type: ty.clone(),
            },
        );
        catalog.register_aggregate(
            "avg",
            AggregateDescriptor {
                argument_type: ty,
                output_type: Type::Float,
            },
        );
    }
    for name in ["min", "max"] {
        for ty in [Type::Int, Type::Float, Type::String, Type::Time, Type::Duration] {
            catalog.register_aggregate(
                name,
                AggregateDescriptor {
                    argument_type: ty.clone(),
                    output_type: ty,
                },
            );
        }
    }
}

/// What a table valued function parameter accepts
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// Scalar expression of the given type
    Expression(Type),
    /// Sub-table
    Table,
    /// Field of the function's `source` table
    Descriptor,
}

/// A declared table valued function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct TableValuedFunctionParameter {
    /// Argument name used in `name => value`
    pub name: &'static str,
    /// Accepted argument kind
    pub kind: ParameterKind,
    /// Whether the call must supply it
    pub required: bool,
}

/// Output shape of a table valued function
#[derive(Debug, Clone, PartialEq)]
pub struct TableValuedFunctionOutput {
    /// Table argument whose fields (and name mapping) pass through unchanged
    pub passthrough: Option<&'static str>,
    /// Fields added by the function, named by their user-facing names
    pub added_fields: Vec<SchemaField>,
    /// User-facing name of the added field that carries event time, if any
    pub time_field: Option<String>,
}

/// Table valued function signature
pub trait TableValuedFunctionDescriptor: std::fmt::Debug + Send + Sync {
    /// Declared parameters
    fn parameters(&self) -> Vec<TableValuedFunctionParameter>;

    /// Compute the output shape from typechecked arguments.
    ///
    /// Arguments have already been matched against [`Self::parameters`].
    fn output(
        &self,
        arguments: &BTreeMap<String, TableValuedFunctionArgument>,
    ) -> PlanResult<TableValuedFunctionOutput>;
}

/// Table valued functions by name
pub type TableValuedFunctionRegistry = BTreeMap<String, Arc<dyn TableValuedFunctionDescriptor>>;

/// Registry with `tumble` and `range`
pub fn builtin_table_valued_functions() -> TableValuedFunctionRegistry {
    let mut registry: TableValuedFunctionRegistry = BTreeMap::new();
    registry.insert("tumble".to_string(), Arc::new(Tumble));
    registry.insert("range".to_string(), Arc::new(Range));
    registry
}

/// Fixed-size, non-overlapping event-time windows over `source`
#[derive(Debug)]
pub struct Tumble;

impl TableValuedFunctionDescriptor for Tumble {
    fn parameters(&self) -> Vec<TableValuedFunctionParameter> {
        vec![
            TableValuedFunctionParameter {
                name: "source",
                kind: ParameterKind::Table,
                required: true,
            },
            TableValuedFunctionParameter {
                name: "time_field",
                kind: ParameterKind::Descriptor,
                required: true,
            },
            TableValuedFunctionParameter {
                name: "window_length",
                kind: ParameterKind::Expression(Type::Duration),
                required: true,
            },
            TableValuedFunctionParameter {
                name: "offset",
                kind: ParameterKind::Expression(Type::Duration),
                required: false,
            },
        ]
    }

    fn output(
        &self,
        arguments: &BTreeMap<String, TableValuedFunctionArgument>,
    ) -> PlanResult<TableValuedFunctionOutput> {
        let (
            Some(TableValuedFunctionArgument::Table(source)),
            Some(TableValuedFunctionArgument::Descriptor(field)),
        ) = (arguments.get("source"), arguments.get("time_field"))
        else {
            return Err(PlanError::MalformedArgument {
                function: "tumble".to_string(),
                message: "expected source => TABLE(...) and time_field => DESCRIPTOR(...)"
                    .to_string(),
            });
        };

        let time_type = source
            .schema()
            .field(field)
            .map(|f| f.ty.clone())
            .unwrap_or(Type::Null);
        if time_type.is(&Type::Time) != rv_core::TypeRelation::Is {
            return Err(PlanError::MalformedArgument {
                function: "tumble".to_string(),
                message: format!("time_field must be of type Time, got {time_type}"),
            });
        }

        Ok(TableValuedFunctionOutput {
            passthrough: Some("source"),
            added_fields: vec![
                SchemaField::new("window_start", Type::Time),
                SchemaField::new("window_end", Type::Time),
            ],
            time_field: Some("window_end".to_string()),
        })
    }
}

/// Integers in `[start, end)` as field `i`
#[derive(Debug)]
pub struct Range;

impl TableValuedFunctionDescriptor for Range {
    fn parameters(&self) -> Vec<TableValuedFunctionParameter> {
        vec![
            TableValuedFunctionParameter {
                name: "start",
                kind: ParameterKind::Expression(Type::Int),
                required: true,
            },
            TableValuedFunctionParameter {
                name: "end",
                kind: ParameterKind::Expression(Type::Int),
                required: true,
            },
        ]
    }

    fn output(
        &self,
        _arguments: &BTreeMap<String, TableValuedFunctionArgument>,
    ) -> PlanResult<TableValuedFunctionOutput> {
        Ok(TableValuedFunctionOutput {
            passthrough: None,
            added_fields: vec![SchemaField::new("i", Type::Int)],
            time_field: None,
        })
    }
}

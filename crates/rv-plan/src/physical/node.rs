//! Physical plan nodes

use super::expr::Expression;
use super::schema::Schema;
use super::NameMapping;
use crate::registry::DatasourceImplementation;
use rv_core::{TriggerSpec, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A datasource scan with the predicates already pushed into its adapter
#[derive(Debug, Clone)]
pub struct Datasource {
    /// Registry name
    pub name: String,
    /// Alias the fields were qualified with
    pub alias: String,
    /// Adapter handle
    pub implementation: Arc<dyn DatasourceImplementation>,
    /// Predicates the adapter evaluates itself
    pub predicates: Vec<Expression>,
    /// `alias.field` to unique name
    pub variable_mapping: NameMapping,
}

impl Datasource {
    /// Ask the adapter which of `candidates` it can absorb on top of `already_pushed`.
    ///
    /// Returns `(remaining, pushed, changed)`.
    pub fn push_down_predicates(
        &self,
        candidates: &[Expression],
        already_pushed: &[Expression],
    ) -> (Vec<Expression>, Vec<Expression>, bool) {
        self.implementation
            .push_down_predicates(candidates, already_pushed)
    }

    /// Copy of this datasource with its pushed predicate set replaced
    pub fn with_predicates(&self, predicates: Vec<Expression>) -> Self {
        Self {
            predicates,
            ..self.clone()
        }
    }
}

impl PartialEq for Datasource {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.alias == other.alias
            && std::ptr::addr_eq(
                Arc::as_ptr(&self.implementation),
                Arc::as_ptr(&other.implementation),
            )
            && self.predicates == other.predicates
            && self.variable_mapping == other.variable_mapping
    }
}

/// One aggregate computed by a GroupBy
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    /// Aggregate name (e.g. `count`)
    pub name: String,
    /// Argument expression, already checked against the chosen overload
    pub argument: Expression,
    /// Output type of the chosen overload
    pub output_type: Type,
}

/// An argument passed to a table valued function
#[derive(Debug, Clone, PartialEq)]
pub enum TableValuedFunctionArgument {
    /// Scalar expression
    Expression(Expression),
    /// Sub-table, as in `TABLE(events)`
    Table(Arc<Node>),
    /// Field reference resolved to its unique name, as in `DESCRIPTOR(ts)`
    Descriptor(String),
}

/// How a Shuffle assigns records to partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShuffleStrategy {
    /// Every record goes to the same partition
    Constant { partition: usize },
}

/// Physical plan node.
///
/// Each variant carries the `schema` of its output. Children are shared, so
/// rewrites build new nodes around untouched subtrees.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Datasource scan
    Datasource { datasource: Datasource, schema: Schema },

    /// Row filter
    Filter {
        source: Arc<Node>,
        predicate: Expression,
        schema: Schema,
    },

    /// Projection
    Map {
        source: Arc<Node>,
        expressions: Vec<Expression>,
        schema: Schema,
    },

    /// Keyed aggregation, emitted according to `triggers`
    GroupBy {
        source: Arc<Node>,
        key: Vec<Expression>,
        aggregates: Vec<AggregateCall>,
        triggers: Vec<TriggerSpec>,
        schema: Schema,
    },

    /// Streaming equi-join on `left_key[i] = right_key[i]`
    StreamJoin {
        left: Arc<Node>,
        right: Arc<Node>,
        left_key: Vec<Expression>,
        right_key: Vec<Expression>,
        schema: Schema,
    },

    /// Row limit over a single partition
    Limit {
        source: Arc<Node>,
        limit: Expression,
        schema: Schema,
    },

    /// Table valued function call with named arguments
    TableValuedFunction {
        name: String,
        arguments: BTreeMap<String, TableValuedFunctionArgument>,
        schema: Schema,
    },

    /// Repartitioning
    Shuffle {
        source: Arc<Node>,
        partitions: usize,
        strategy: ShuffleStrategy,
        schema: Schema,
    },
}

impl Node {
    /// Output schema of this node
    pub fn schema(&self) -> &Schema {
        match self {
            Node::Datasource { schema, .. }
            | Node::Filter { schema, .. }
            | Node::Map { schema, .. }
            | Node::GroupBy { schema, .. }
            | Node::StreamJoin { schema, .. }
            | Node::Limit { schema, .. }
            | Node::TableValuedFunction { schema, .. }
            | Node::Shuffle { schema, .. } => schema,
        }
    }

    /// Filter over `source`, keeping its schema
    pub fn filter(source: Arc<Node>, predicate: Expression) -> Node {
        let schema = source.schema().clone();
        Node::Filter {
            source,
            predicate,
            schema,
        }
    }

    /// Short variant name, used in logs and plan descriptions
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Datasource { .. } => "Datasource",
            Node::Filter { .. } => "Filter",
            Node::Map { .. } => "Map",
            Node::GroupBy { .. } => "GroupBy",
            Node::StreamJoin { .. } => "StreamJoin",
            Node::Limit { .. } => "Limit",
            Node::TableValuedFunction { .. } => "TableValuedFunction",
            Node::Shuffle { .. } => "Shuffle",
        }
    }

    /// Names of every variable referenced anywhere in this subtree
    pub fn variables_used(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    pub(crate) fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Node::Datasource { datasource, .. } => {
                for predicate in &datasource.predicates {
                    predicate.collect_variables(out);
                }
            }
            Node::Filter {
                source, predicate, ..
            } => {
                predicate.collect_variables(out);
                source.collect_variables(out);
            }
            Node::Map {
                source,
                expressions,
                ..
            } => {
                for expression in expressions {
                    expression.collect_variables(out);
                }
                source.collect_variables(out);
            }
            Node::GroupBy {
                source,
                key,
                aggregates,
                ..
            } => {
                for expression in key {
                    expression.collect_variables(out);
                }
                for aggregate in aggregates {
                    aggregate.argument.collect_variables(out);
                }
                source.collect_variables(out);
            }
            Node::StreamJoin {
                left,
                right,
                left_key,
                right_key,
                ..
            } => {
                for expression in left_key.iter().chain(right_key) {
                    expression.collect_variables(out);
                }
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Node::Limit { source, limit, .. } => {
                limit.collect_variables(out);
                source.collect_variables(out);
            }
            Node::TableValuedFunction { arguments, .. } => {
                for argument in arguments.values() {
                    match argument {
                        TableValuedFunctionArgument::Expression(expression) => {
                            expression.collect_variables(out)
                        }
                        TableValuedFunctionArgument::Table(node) => node.collect_variables(out),
                        TableValuedFunctionArgument::Descriptor(_) => {}
                    }
                }
            }
            Node::Shuffle { source, .. } => source.collect_variables(out),
        }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Node::Datasource { datasource, .. } => {
                write!(f, "{pad}Datasource {} AS {}", datasource.name, datasource.alias)?;
                if !datasource.predicates.is_empty() {
                    let predicates: Vec<String> =
                        datasource.predicates.iter().map(ToString::to_string).collect();
                    write!(f, " [pushed: {}]", predicates.join(", "))?;
                }
                writeln!(f)
            }
            Node::Filter {
                source, predicate, ..
            } => {
                writeln!(f, "{pad}Filter {predicate}")?;
                source.fmt_indented(f, depth + 1)
            }
            Node::Map {
                source, schema, ..
            } => {
                let names: Vec<&str> =
                    schema.fields.iter().map(|field| field.name.as_str()).collect();
                writeln!(f, "{pad}Map [{}]", names.join(", "))?;
                source.fmt_indented(f, depth + 1)
            }
            Node::GroupBy {
                source,
                key,
                aggregates,
                triggers,
                ..
            } => {
                let key: Vec<String> = key.iter().map(ToString::to_string).collect();
                let aggregates: Vec<String> = aggregates
                    .iter()
                    .map(|a| format!("{}({})", a.name, a.argument))
                    .collect();
                let triggers: Vec<String> = triggers.iter().map(ToString::to_string).collect();
                writeln!(
                    f,
                    "{pad}GroupBy key=[{}] aggregates=[{}] triggers=[{}]",
                    key.join(", "),
                    aggregates.join(", "),
                    triggers.join(", ")
                )?;
                source.fmt_indented(f, depth + 1)
            }
            Node::StreamJoin {
                left,
                right,
                left_key,
                right_key,
                ..
            } => {
                let keys: Vec<String> = left_key
                    .iter()
                    .zip(right_key)
                    .map(|(l, r)| format!("{l} = {r}"))
                    .collect();
                writeln!(f, "{pad}StreamJoin on [{}]", keys.join(", "))?;
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)
            }
            Node::Limit { source, limit, .. } => {
                writeln!(f, "{pad}Limit {limit}")?;
                source.fmt_indented(f, depth + 1)
            }
            Node::TableValuedFunction {
                name, arguments, ..
            } => {
                writeln!(f, "{pad}TableValuedFunction {name}")?;
                for (arg_name, argument) in arguments {
                    match argument {
                        TableValuedFunctionArgument::Expression(expression) => {
                            writeln!(f, "{pad}  {arg_name} => {expression}")?
                        }
                        TableValuedFunctionArgument::Descriptor(field) => {
                            writeln!(f, "{pad}  {arg_name} => DESCRIPTOR({field})")?
                        }
                        TableValuedFunctionArgument::Table(node) => {
                            writeln!(f, "{pad}  {arg_name} =>")?;
                            node.fmt_indented(f, depth + 2)?
                        }
                    }
                }
                Ok(())
            }
            Node::Shuffle {
                source,
                partitions,
                strategy,
                ..
            } => {
                writeln!(f, "{pad}Shuffle partitions={partitions} strategy={strategy:?}")?;
                source.fmt_indented(f, depth + 1)
            }
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

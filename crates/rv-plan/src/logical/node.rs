//! Logical plan nodes and their typechecking

use super::expr::{typecheck_expression, LogicalExpr};
use super::{group_by, join, tvf, CommonTableExpr, LogicalEnvironment};
use crate::error::PlanResult;
use crate::physical::expr::Expression;
use crate::physical::node::{Datasource, Node, ShuffleStrategy};
use crate::physical::schema::{Schema, SchemaField};
use crate::physical::{reverse_mapping, Environment, NameMapping};
use rv_core::{type_sum, Type};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One item of a projection
#[derive(Debug, Clone, PartialEq)]
pub enum MapItem {
    /// `expr [AS alias]`
    Expression {
        expression: LogicalExpr,
        alias: Option<String>,
    },
    /// `*` or `q.*`
    Star { qualifier: Option<String> },
}

/// One grouping key of a GroupBy
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    /// Key expression
    pub expression: LogicalExpr,
    /// Output name; a plain variable key keeps its own name when `None`
    pub name: Option<String>,
}

/// One aggregate of a GroupBy
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateItem {
    /// Aggregate name (`count`, `sum`, …)
    pub aggregate: String,
    /// Aggregated expression
    pub argument: LogicalExpr,
    /// Output name
    pub name: String,
}

/// Trigger clause of a GroupBy before typechecking
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalTrigger {
    /// `COUNTING n`
    Counting(u64),
    /// `DELAY expr`; the expression must be a constant Duration
    Delay(LogicalExpr),
    /// `ON WATERMARK`
    Watermark,
    /// `ON END OF STREAM`
    EndOfStream,
}

/// Argument of a table valued function call
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalTvfArgument {
    /// Scalar expression
    Expression(LogicalExpr),
    /// Sub-table
    Table(Box<LogicalNode>),
    /// Field descriptor
    Descriptor(String),
}

/// Logical plan node as produced by the SQL frontend
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalNode {
    /// Registry datasource or CTE reference; alias defaults to the name
    DataSource { name: String, alias: Option<String> },
    /// Row filter
    Filter {
        predicate: LogicalExpr,
        source: Box<LogicalNode>,
    },
    /// Projection
    Map {
        items: Vec<MapItem>,
        source: Box<LogicalNode>,
    },
    /// Re-qualify every output name with a new table qualifier
    Requalifier {
        qualifier: String,
        source: Box<LogicalNode>,
    },
    /// Inner join; equality conjuncts across both sides become join keys
    Join {
        left: Box<LogicalNode>,
        right: Box<LogicalNode>,
        predicate: Option<LogicalExpr>,
    },
    /// Keyed aggregation; empty `triggers` means the configured defaults
    GroupBy {
        source: Box<LogicalNode>,
        key: Vec<GroupKey>,
        aggregates: Vec<AggregateItem>,
        triggers: Vec<LogicalTrigger>,
    },
    /// Row limit
    Limit {
        source: Box<LogicalNode>,
        limit: LogicalExpr,
    },
    /// Table valued function call
    TableValuedFunction {
        name: String,
        arguments: BTreeMap<String, LogicalTvfArgument>,
    },
    /// Common table expressions in declaration order, then the body
    With {
        ctes: Vec<(String, LogicalNode)>,
        source: Box<LogicalNode>,
    },
}

impl LogicalNode {
    /// Datasource reference
    pub fn datasource(name: impl Into<String>, alias: Option<&str>) -> Self {
        LogicalNode::DataSource {
            name: name.into(),
            alias: alias.map(str::to_string),
        }
    }

    /// Typecheck into a physical node and its name mapping
    pub fn typecheck(
        &self,
        env: &Environment,
        logical_env: &LogicalEnvironment,
    ) -> PlanResult<(Node, NameMapping)> {
        match self {
            LogicalNode::DataSource { name, alias } => {
                typecheck_datasource(env, logical_env, name, alias.as_deref())
            }
            LogicalNode::Filter { predicate, source } => {
                let (source, mapping) = source.typecheck(env, logical_env)?;
                let predicate = typecheck_expression(
                    &env.with_record_schema(source.schema()),
                    &logical_env.with_record_unique_variable_names(mapping.clone()),
                    &type_sum(Type::Boolean, Type::Null),
                    predicate,
                )?;
                Ok((Node::filter(Arc::new(source), predicate), mapping))
            }
            LogicalNode::Map { items, source } => typecheck_map(env, logical_env, items, source),
            LogicalNode::Requalifier { qualifier, source } => {
                let (source, mapping) = source.typecheck(env, logical_env)?;
                Ok((source, requalify(&mapping, qualifier)))
            }
            LogicalNode::Join {
                left,
                right,
                predicate,
            } => join::typecheck_join(env, logical_env, left, right, predicate.as_ref()),
            LogicalNode::GroupBy {
                source,
                key,
                aggregates,
                triggers,
            } => group_by::typecheck_group_by(env, logical_env, source, key, aggregates, triggers),
            LogicalNode::Limit { source, limit } => {
                let (source, mapping) = source.typecheck(env, logical_env)?;
                let limit = typecheck_expression(env, logical_env, &Type::Int, limit)?;
                let schema = source.schema().clone();
                let shuffled = Node::Shuffle {
                    source: Arc::new(source),
                    partitions: 1,
                    strategy: ShuffleStrategy::Constant { partition: 0 },
                    schema: schema.clone(),
                };
                Ok((
                    Node::Limit {
                        source: Arc::new(shuffled),
                        limit,
                        schema,
                    },
                    mapping,
                ))
            }
            LogicalNode::TableValuedFunction { name, arguments } => {
                tvf::typecheck_table_valued_function(env, logical_env, name, arguments)
            }
            LogicalNode::With { ctes, source } => {
                let mut visible = (*logical_env.common_table_exprs).clone();
                for (name, cte) in ctes {
                    let (node, mapping) =
                        cte.typecheck(env, &logical_env.with_common_table_exprs(visible.clone()))?;
                    log::debug!("Registered CTE '{}' with {} fields", name, mapping.len());
                    visible.insert(
                        name.clone(),
                        CommonTableExpr {
                            node: Arc::new(node),
                            mapping,
                        },
                    );
                }
                source.typecheck(env, &logical_env.with_common_table_exprs(visible))
            }
        }
    }
}

fn typecheck_datasource(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    name: &str,
    alias: Option<&str>,
) -> PlanResult<(Node, NameMapping)> {
    let alias = alias.unwrap_or(name);

    if let Some(cte) = logical_env.common_table_exprs.get(name) {
        return Ok((cte.node.as_ref().clone(), requalify(&cte.mapping, alias)));
    }

    let (implementation, schema) = env.catalog.datasources.get_datasource(name)?;

    let mut mapping = NameMapping::new();
    let mut fields = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let qualified = format!("{alias}.{}", field.name);
        let unique = logical_env.get_unique(&qualified);
        mapping.insert(qualified, unique.clone());
        fields.push(SchemaField::new(unique, field.ty.clone()));
    }
    let time_field = schema
        .time_field
        .as_ref()
        .and_then(|time_field| mapping.get(&format!("{alias}.{time_field}")).cloned());

    log::debug!(
        "Registered datasource '{}' as '{}' with {} fields",
        name,
        alias,
        fields.len()
    );

    let node = Node::Datasource {
        datasource: Datasource {
            name: name.to_string(),
            alias: alias.to_string(),
            implementation,
            predicates: Vec::new(),
            variable_mapping: mapping.clone(),
        },
        schema: Schema::new(fields, time_field),
    };
    Ok((node, mapping))
}

fn typecheck_map(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    items: &[MapItem],
    source: &LogicalNode,
) -> PlanResult<(Node, NameMapping)> {
    let (source, source_mapping) = source.typecheck(env, logical_env)?;
    let record_env = env.with_record_schema(source.schema());
    let record_logical_env = logical_env.with_record_unique_variable_names(source_mapping.clone());
    let reverse = reverse_mapping(&source_mapping);

    let mut expressions = Vec::new();
    let mut names = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item {
            MapItem::Star { qualifier } => {
                for field in &source.schema().fields {
                    let original = reverse
                        .get(&field.name)
                        .cloned()
                        .unwrap_or_else(|| field.name.clone());
                    if let Some(qualifier) = qualifier {
                        let matches = original
                            .split_once('.')
                            .is_some_and(|(prefix, _)| prefix == qualifier);
                        if !matches {
                            continue;
                        }
                    }
                    expressions.push(Expression::variable(
                        field.name.clone(),
                        true,
                        field.ty.clone(),
                    ));
                    names.push(original);
                }
            }
            MapItem::Expression { expression, alias } => {
                let name = match (alias, expression.field_name()) {
                    (Some(alias), _) => alias.clone(),
                    (None, Some(field_name)) => field_name.to_string(),
                    (None, None) => format!("col_{index}"),
                };
                expressions.push(expression.typecheck(&record_env, &record_logical_env)?);
                names.push(name);
            }
        }
    }

    let mut mapping = NameMapping::new();
    let mut fields = Vec::with_capacity(expressions.len());
    let mut time_field = None;
    for (expression, name) in expressions.iter().zip(names) {
        let unique = logical_env.get_unique(&name);
        if let (Some(variable), Some(source_time_field)) =
            (expression.as_variable(), &source.schema().time_field)
        {
            if &variable.name == source_time_field && time_field.is_none() {
                time_field = Some(unique.clone());
            }
        }
        fields.push(SchemaField::new(unique.clone(), expression.ty.clone()));
        mapping.insert(name, unique);
    }

    let node = Node::Map {
        source: Arc::new(source),
        expressions,
        schema: Schema::new(fields, time_field),
    };
    Ok((node, mapping))
}

/// Re-prefix every user-facing name with `qualifier`, replacing any existing
/// table qualifier.
pub(crate) fn requalify(mapping: &NameMapping, qualifier: &str) -> NameMapping {
    mapping
        .iter()
        .map(|(original, unique)| {
            let field = original
                .split_once('.')
                .map_or(original.as_str(), |(_, field)| field);
            (format!("{qualifier}.{field}"), unique.clone())
        })
        .collect()
}

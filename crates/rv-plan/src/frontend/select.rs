//! SELECT building: FROM → WHERE → GROUP BY → projection

use super::expr::{function_name, ExprBuilder};
use super::query::{build_query, unsupported};
use crate::error::{PlanError, PlanResult};
use crate::logical::{GroupKey, LogicalExpr, LogicalNode, LogicalTvfArgument, MapItem};
use crate::registry::Catalog;
use sqlparser::ast::{
    visit_expressions, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Join,
    JoinConstraint, JoinOperator, Select, SelectItem, SelectItemQualifiedWildcardKind,
    TableFactor, TableFunctionArgs,
};
use std::collections::BTreeMap;
use std::ops::ControlFlow;

/// Build a SELECT into a logical plan
pub(crate) fn build_select(select: &Select, catalog: &Catalog) -> PlanResult<LogicalNode> {
    if select.distinct.is_some() {
        return Err(unsupported("DISTINCT"));
    }
    if select.having.is_some() {
        return Err(unsupported("HAVING"));
    }

    // 1. FROM
    let mut plan = match select.from.as_slice() {
        [] => return Err(unsupported("SELECT without FROM")),
        [from] => {
            let mut plan = build_table_factor(&from.relation, catalog)?;
            for join in &from.joins {
                plan = build_join(plan, join, catalog)?;
            }
            plan
        }
        _ => return Err(unsupported("comma-separated FROM items")),
    };

    // 2. WHERE
    if let Some(selection) = &select.selection {
        plan = LogicalNode::Filter {
            predicate: ExprBuilder::new(catalog).build(selection)?,
            source: Box::new(plan),
        };
    }

    // 3. GROUP BY
    let keys = match &select.group_by {
        GroupByExpr::Expressions(exprs, modifiers) => {
            if !modifiers.is_empty() {
                return Err(unsupported("GROUP BY modifiers"));
            }
            exprs.as_slice()
        }
        GroupByExpr::All(_) => return Err(unsupported("GROUP BY ALL")),
    };
    let has_aggregates = select.projection.iter().any(|item| {
        let probe = ExprBuilder::new(catalog);
        visit_expressions(item, |expr| {
            if probe.is_aggregate(expr) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_break()
    });
    if !keys.is_empty() || has_aggregates {
        return build_grouped(select, keys, plan, catalog);
    }

    // 4. Projection
    let mut builder = ExprBuilder::new(catalog);
    let items = select
        .projection
        .iter()
        .map(|item| build_map_item(item, &mut builder))
        .collect::<PlanResult<Vec<_>>>()?;
    Ok(LogicalNode::Map {
        items,
        source: Box::new(plan),
    })
}

fn build_grouped(
    select: &Select,
    keys: &[Expr],
    source: LogicalNode,
    catalog: &Catalog,
) -> PlanResult<LogicalNode> {
    let mut group_keys = Vec::with_capacity(keys.len());
    let mut references = Vec::with_capacity(keys.len());
    for (index, key) in keys.iter().enumerate() {
        let expression = ExprBuilder::new(catalog).build(key)?;
        match &expression {
            LogicalExpr::Variable(name) => {
                references.push((key.clone(), name.clone()));
                group_keys.push(GroupKey {
                    expression,
                    name: None,
                });
            }
            _ => {
                let name = projection_alias(&select.projection, key)
                    .unwrap_or_else(|| format!("key_{index}"));
                references.push((key.clone(), name.clone()));
                group_keys.push(GroupKey {
                    expression,
                    name: Some(name),
                });
            }
        }
    }

    let mut builder = ExprBuilder::grouped(catalog, references);
    let items = select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {
                Err(unsupported("'*' in a grouped SELECT"))
            }
            other => build_map_item(other, &mut builder),
        })
        .collect::<PlanResult<Vec<_>>>()?;

    let group_by = LogicalNode::GroupBy {
        source: Box::new(source),
        key: group_keys,
        aggregates: builder.into_aggregates(),
        triggers: Vec::new(),
    };
    Ok(LogicalNode::Map {
        items,
        source: Box::new(group_by),
    })
}

/// Alias of the projection item that is exactly `key`, if any
fn projection_alias(projection: &[SelectItem], key: &Expr) -> Option<String> {
    projection.iter().find_map(|item| match item {
        SelectItem::ExprWithAlias { expr, alias } if expr == key => Some(alias.value.clone()),
        _ => None,
    })
}

fn build_map_item(item: &SelectItem, builder: &mut ExprBuilder<'_>) -> PlanResult<MapItem> {
    match item {
        SelectItem::UnnamedExpr(expr) => Ok(MapItem::Expression {
            expression: builder.build_named(expr, None)?,
            alias: None,
        }),
        SelectItem::ExprWithAlias { expr, alias } => Ok(MapItem::Expression {
            expression: builder.build_named(expr, Some(&alias.value))?,
            alias: Some(alias.value.clone()),
        }),
        SelectItem::Wildcard(_) => Ok(MapItem::Star { qualifier: None }),
        SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::ObjectName(name), _) => {
            Ok(MapItem::Star {
                qualifier: Some(name.to_string()),
            })
        }
        SelectItem::QualifiedWildcard(..) => Err(unsupported("expression wildcard")),
    }
}

fn requalified(plan: LogicalNode, alias: Option<String>) -> LogicalNode {
    match alias {
        Some(qualifier) => LogicalNode::Requalifier {
            qualifier,
            source: Box::new(plan),
        },
        None => plan,
    }
}

fn build_table_factor(factor: &TableFactor, catalog: &Catalog) -> PlanResult<LogicalNode> {
    match factor {
        TableFactor::Table {
            name,
            alias,
            args: None,
            ..
        } => Ok(LogicalNode::DataSource {
            name: name.to_string(),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        TableFactor::Table {
            name,
            alias,
            args: Some(args),
            ..
        } => {
            let plan =
                build_table_valued_function(&name.to_string().to_lowercase(), args, catalog)?;
            Ok(requalified(plan, alias.as_ref().map(|a| a.name.value.clone())))
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            let plan = build_query(subquery, catalog)?;
            Ok(requalified(plan, alias.as_ref().map(|a| a.name.value.clone())))
        }
        TableFactor::NestedJoin {
            table_with_joins,
            alias,
        } => {
            let mut plan = build_table_factor(&table_with_joins.relation, catalog)?;
            for join in &table_with_joins.joins {
                plan = build_join(plan, join, catalog)?;
            }
            Ok(requalified(plan, alias.as_ref().map(|a| a.name.value.clone())))
        }
        other => Err(unsupported(&format!("table factor '{other}'"))),
    }
}

fn build_join(left: LogicalNode, join: &Join, catalog: &Catalog) -> PlanResult<LogicalNode> {
    let right = build_table_factor(&join.relation, catalog)?;
    let predicate = match &join.join_operator {
        JoinOperator::Join(constraint) | JoinOperator::Inner(constraint) => match constraint {
            JoinConstraint::On(expr) => Some(ExprBuilder::new(catalog).build(expr)?),
            JoinConstraint::None => None,
            JoinConstraint::Using(_) => return Err(unsupported("JOIN ... USING")),
            JoinConstraint::Natural => return Err(unsupported("NATURAL JOIN")),
        },
        JoinOperator::CrossJoin(_) => None,
        other => return Err(unsupported(&format!("join operator {other:?}"))),
    };
    Ok(LogicalNode::Join {
        left: Box::new(left),
        right: Box::new(right),
        predicate,
    })
}

/// `name(arg => value, ...)` in FROM.
///
/// `TABLE(t)` and subqueries become table arguments and `DESCRIPTOR(f)` a
/// field descriptor; anything else is a scalar expression.
fn build_table_valued_function(
    name: &str,
    args: &TableFunctionArgs,
    catalog: &Catalog,
) -> PlanResult<LogicalNode> {
    let mut arguments = BTreeMap::new();
    for arg in &args.args {
        let (arg_name, value) = match arg {
            FunctionArg::Named { name, arg, .. } => (name.value.to_lowercase(), arg),
            FunctionArg::ExprNamed {
                name: Expr::Identifier(name),
                arg,
                ..
            } => (name.value.to_lowercase(), arg),
            _ => {
                return Err(PlanError::MalformedArgument {
                    function: name.to_string(),
                    message: "table valued function arguments must be named (arg => value)"
                        .to_string(),
                })
            }
        };
        let FunctionArgExpr::Expr(expr) = value else {
            return Err(PlanError::MalformedArgument {
                function: name.to_string(),
                message: format!("argument '{arg_name}' must be an expression"),
            });
        };
        let argument = build_tvf_argument(name, &arg_name, expr, catalog)?;
        if arguments.insert(arg_name.clone(), argument).is_some() {
            return Err(PlanError::MalformedArgument {
                function: name.to_string(),
                message: format!("argument '{arg_name}' given twice"),
            });
        }
    }
    Ok(LogicalNode::TableValuedFunction {
        name: name.to_string(),
        arguments,
    })
}

fn build_tvf_argument(
    function: &str,
    arg_name: &str,
    expr: &Expr,
    catalog: &Catalog,
) -> PlanResult<LogicalTvfArgument> {
    let malformed = |message: &str| PlanError::MalformedArgument {
        function: function.to_string(),
        message: format!("argument '{arg_name}': {message}"),
    };

    match expr {
        Expr::Subquery(query) => Ok(LogicalTvfArgument::Table(Box::new(build_query(
            query, catalog,
        )?))),
        Expr::Function(func) if matches!(function_name(func).as_str(), "table" | "descriptor") => {
            let FunctionArguments::List(list) = &func.args else {
                return Err(malformed("expected a single argument"));
            };
            let [FunctionArg::Unnamed(FunctionArgExpr::Expr(inner))] = list.args.as_slice() else {
                return Err(malformed("expected a single argument"));
            };
            let LogicalExpr::Variable(target) = ExprBuilder::new(catalog).build(inner)? else {
                return Err(malformed("expected a name"));
            };
            if function_name(func) == "table" {
                Ok(LogicalTvfArgument::Table(Box::new(LogicalNode::DataSource {
                    name: target,
                    alias: None,
                })))
            } else {
                Ok(LogicalTvfArgument::Descriptor(target))
            }
        }
        other => Ok(LogicalTvfArgument::Expression(
            ExprBuilder::new(catalog).build(other)?,
        )),
    }
}

//! Query-level building: WITH → body → LIMIT

use super::expr::ExprBuilder;
use super::select::build_select;
use crate::error::{PlanError, PlanResult};
use crate::logical::LogicalNode;
use crate::registry::Catalog;
use sqlparser::ast::{LimitClause, Query, SetExpr};

/// Build a Query AST node into a logical plan
pub(crate) fn build_query(query: &Query, catalog: &Catalog) -> PlanResult<LogicalNode> {
    if query.order_by.is_some() {
        return Err(unsupported("ORDER BY"));
    }

    let mut plan = build_set_expr(&query.body, catalog)?;

    if let Some(limit_clause) = &query.limit_clause {
        let limit = match limit_clause {
            LimitClause::LimitOffset {
                limit,
                offset,
                limit_by,
            } => {
                if offset.is_some() {
                    return Err(unsupported("OFFSET"));
                }
                if !limit_by.is_empty() {
                    return Err(unsupported("LIMIT BY"));
                }
                limit.as_ref()
            }
            LimitClause::OffsetCommaLimit { .. } => return Err(unsupported("OFFSET")),
        };
        if let Some(limit) = limit {
            let limit = ExprBuilder::new(catalog).build(limit)?;
            plan = LogicalNode::Limit {
                source: Box::new(plan),
                limit,
            };
        }
    }

    if let Some(with) = &query.with {
        if with.recursive {
            return Err(unsupported("WITH RECURSIVE"));
        }
        let ctes = with
            .cte_tables
            .iter()
            .map(|cte| Ok((cte.alias.name.value.clone(), build_query(&cte.query, catalog)?)))
            .collect::<PlanResult<Vec<_>>>()?;
        plan = LogicalNode::With {
            ctes,
            source: Box::new(plan),
        };
    }

    Ok(plan)
}

fn build_set_expr(set_expr: &SetExpr, catalog: &Catalog) -> PlanResult<LogicalNode> {
    match set_expr {
        SetExpr::Select(select) => build_select(select, catalog),
        SetExpr::Query(query) => build_query(query, catalog),
        SetExpr::SetOperation { op, .. } => Err(unsupported(&format!("set operation {op}"))),
        SetExpr::Values(_) => Err(unsupported("VALUES")),
        _ => Err(unsupported("query body")),
    }
}

pub(super) fn unsupported(construct: &str) -> PlanError {
    PlanError::UnsupportedConstruct {
        construct: construct.to_string(),
    }
}

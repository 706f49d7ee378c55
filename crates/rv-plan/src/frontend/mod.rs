//! SQL frontend: sqlparser AST → logical plan
//!
//! Covers the streaming subset of SELECT: CTEs, a single FROM item (table,
//! subquery, join chain, or table valued function), WHERE, GROUP BY with
//! aggregates in the projection, LIMIT, and a `TRIGGER` clause on the
//! outermost grouped query.

mod expr;
mod query;
mod select;
mod trigger;

use crate::error::{PlanError, PlanResult};
use crate::logical::LogicalNode;
use crate::registry::Catalog;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Tokenizer;
use trigger::{attach_triggers, build_triggers, split_trigger_clause};

pub use expr::{parse_interval, parse_type_name};

/// Parse a single SQL query into a logical plan.
///
/// The catalog is only consulted to tell aggregate calls from scalar ones.
/// A grouped query without a `TRIGGER` clause gets the configured default
/// triggers at typecheck time.
pub fn plan_sql(sql: &str, catalog: &Catalog) -> PlanResult<LogicalNode> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| PlanError::SqlParse(e.to_string()))?;
    let split = split_trigger_clause(tokens);
    let statements = Parser::new(&dialect)
        .with_tokens(split.tokens)
        .parse_statements()
        .map_err(|e| PlanError::SqlParse(e.to_string()))?;
    match statements.as_slice() {
        [statement] => {
            let plan = build_statement(statement, catalog)?;
            match split.triggers {
                Some(items) => attach_triggers(plan, build_triggers(items, &dialect, catalog)?),
                None => Ok(plan),
            }
        }
        [] => Err(PlanError::SqlParse("no statement found".to_string())),
        _ => Err(PlanError::UnsupportedConstruct {
            construct: format!("{} statements in one query", statements.len()),
        }),
    }
}

/// Build a logical plan from one parsed statement
///
/// Only `Statement::Query` is supported.
pub fn build_statement(statement: &Statement, catalog: &Catalog) -> PlanResult<LogicalNode> {
    match statement {
        Statement::Query(query) => query::build_query(query, catalog),
        other => Err(PlanError::UnsupportedConstruct {
            construct: format!("{} statement", statement_kind(other)),
        }),
    }
}

fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::Query(_) => "SELECT",
        Statement::Insert(_) => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::CreateTable(_) => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        _ => "non-query",
    }
}

#[cfg(test)]
#[path = "frontend_test.rs"]
mod tests;

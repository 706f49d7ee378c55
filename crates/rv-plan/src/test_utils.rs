//! Shared test utilities for rv-plan

use crate::error::PlanResult;
use crate::frontend::plan_sql;
use crate::logical::{typecheck_query, LogicalNode};
use crate::physical::expr::{Expression, ExpressionKind};
use crate::physical::node::Node;
use crate::physical::schema::{Schema, SchemaField};
use crate::physical::{Environment, NameMapping};
use crate::registry::{
    builtin_table_valued_functions, Catalog, DatasourceImplementation, DatasourceRegistry,
    TableValuedFunctionRegistry,
};
use rv_core::Type;
use std::sync::Arc;

/// Datasource adapter that absorbs `variable = constant` comparisons
#[derive(Debug, Default)]
pub struct MockDatasource;

impl DatasourceImplementation for MockDatasource {
    fn push_down_predicates(
        &self,
        candidates: &[Expression],
        already_pushed: &[Expression],
    ) -> (Vec<Expression>, Vec<Expression>, bool) {
        let mut remaining = Vec::new();
        let mut pushed = already_pushed.to_vec();
        let mut changed = false;
        for candidate in candidates {
            if is_variable_equals_constant(candidate) && !pushed.contains(candidate) {
                pushed.push(candidate.clone());
                changed = true;
            } else if !pushed.contains(candidate) {
                remaining.push(candidate.clone());
            }
        }
        (remaining, pushed, changed)
    }
}

fn is_variable_equals_constant(expression: &Expression) -> bool {
    let ExpressionKind::FunctionCall { name, arguments } = &expression.kind else {
        return false;
    };
    if name != "=" {
        return false;
    }
    matches!(
        arguments.as_slice(),
        [
            Expression {
                kind: ExpressionKind::Variable(_),
                ..
            },
            Expression {
                kind: ExpressionKind::Constant(_),
                ..
            }
        ]
    )
}

/// Schema of the `events` test datasource
pub fn events_schema() -> Schema {
    Schema::new(
        vec![
            SchemaField::new("id", Type::Int),
            SchemaField::new("customer", Type::String),
            SchemaField::new("amount", Type::Float.nullable()),
            SchemaField::new("ts", Type::Time),
        ],
        Some("ts".to_string()),
    )
}

/// Schema of the `users` test datasource
pub fn users_schema() -> Schema {
    Schema::new(
        vec![
            SchemaField::new("id", Type::Int),
            SchemaField::new("name", Type::String),
            SchemaField::new("age", Type::Int.nullable()),
        ],
        None,
    )
}

/// Catalog with builtins plus the `events` and `users` datasources
pub fn test_catalog() -> Catalog {
    let mut registry = DatasourceRegistry::new();
    registry.register("events", Arc::new(MockDatasource), events_schema());
    registry.register("users", Arc::new(MockDatasource), users_schema());
    Catalog::with_builtins(Arc::new(registry))
}

/// Environment over [`test_catalog`]
pub fn test_env() -> Environment {
    Environment::new(Arc::new(test_catalog()))
}

/// Built-in table valued functions, shared
pub fn test_tvfs() -> Arc<TableValuedFunctionRegistry> {
    Arc::new(builtin_table_valued_functions())
}

/// Typecheck a logical plan against the test catalog
pub fn typecheck(node: &LogicalNode) -> PlanResult<(Arc<Node>, NameMapping)> {
    typecheck_query(&test_env(), test_tvfs(), node)
}

/// Parse and typecheck SQL against the test catalog
pub fn typecheck_sql(sql: &str) -> PlanResult<(Arc<Node>, NameMapping)> {
    let env = test_env();
    let logical = plan_sql(sql, &env.catalog)?;
    typecheck_query(&env, test_tvfs(), &logical)
}

/// Unique name of the first field whose user-facing name is `name`
pub fn unique_name(reverse: &NameMapping, name: &str) -> Option<String> {
    reverse
        .iter()
        .find(|(_, original)| original.as_str() == name)
        .map(|(unique, _)| unique.clone())
}

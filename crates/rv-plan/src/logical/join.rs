//! Join typechecking: equi-join key extraction into a StreamJoin

use super::expr::{typecheck_expression, LogicalExpr};
use super::node::LogicalNode;
use super::LogicalEnvironment;
use crate::error::PlanResult;
use crate::physical::expr::{Expression, ExpressionKind};
use crate::physical::node::Node;
use crate::physical::schema::Schema;
use crate::physical::{Environment, NameMapping};
use rv_core::{type_sum, Type};
use std::sync::Arc;

/// Typecheck `left JOIN right ON predicate`.
///
/// Top-level `a = b` conjuncts where `a` only reads one side and `b` only
/// the other become join keys. Everything else is filtered above the join.
pub(super) fn typecheck_join(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    left: &LogicalNode,
    right: &LogicalNode,
    predicate: Option<&LogicalExpr>,
) -> PlanResult<(Node, NameMapping)> {
    let (left, left_mapping) = left.typecheck(env, logical_env)?;
    let (right, right_mapping) = right.typecheck(env, logical_env)?;

    let mut mapping = left_mapping;
    mapping.extend(right_mapping);
    let schema = Schema::concat(left.schema(), right.schema());

    let mut left_key = Vec::new();
    let mut right_key = Vec::new();
    let mut remaining = Vec::new();
    if let Some(predicate) = predicate {
        let predicate = typecheck_expression(
            &env.with_record_schema(&schema),
            &logical_env.with_record_unique_variable_names(mapping.clone()),
            &type_sum(Type::Boolean, Type::Null),
            predicate,
        )?;
        for conjunct in predicate.split_by_and() {
            match split_equality(&conjunct, left.schema(), right.schema()) {
                Some((l, r)) => {
                    left_key.push(l);
                    right_key.push(r);
                }
                None => remaining.push(conjunct),
            }
        }
    }

    let join = Node::StreamJoin {
        left: Arc::new(left),
        right: Arc::new(right),
        left_key,
        right_key,
        schema,
    };
    if remaining.is_empty() {
        Ok((join, mapping))
    } else {
        Ok((Node::filter(Arc::new(join), Expression::and_of(remaining)), mapping))
    }
}

/// Split `a = b` into (left side, right side) if it is a cross-side equality.
fn split_equality(
    conjunct: &Expression,
    left: &Schema,
    right: &Schema,
) -> Option<(Expression, Expression)> {
    let ExpressionKind::FunctionCall { name, arguments } = &conjunct.kind else {
        return None;
    };
    let [a, b] = arguments.as_slice() else {
        return None;
    };
    if name != "=" {
        return None;
    }

    let only_reads = |expression: &Expression, side: &Schema, other: &Schema| {
        let variables = expression.variables_used();
        !variables.is_empty() && side.uses_any(&variables) && !other.uses_any(&variables)
    };
    if only_reads(a, left, right) && only_reads(b, right, left) {
        Some((a.clone(), b.clone()))
    } else if only_reads(a, right, left) && only_reads(b, left, right) {
        Some((b.clone(), a.clone()))
    } else {
        None
    }
}

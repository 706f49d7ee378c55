//! Route filter conjuncts above a stream join into its branches

use super::datasource_pushdown::wrap_in_filter;
use super::OptimizerRule;
use crate::physical::expr::{Expression, ExpressionKind};
use crate::physical::node::Node;
use std::sync::Arc;

/// Pushes each conjunct of a filter over a StreamJoin into the branch that
/// binds all of its variables. A conjunct that uses neither branch goes into
/// both.
///
/// A conjunct whose first argument is a join key is also copied to the other
/// branch with the key replaced by its counterpart, since both keys are equal
/// in every joined record.
pub struct PushDownFilterIntoStreamJoinBranch;

impl OptimizerRule for PushDownFilterIntoStreamJoinBranch {
    fn name(&self) -> &'static str {
        "push_down_filter_into_stream_join_branch"
    }

    fn description(&self) -> &'static str {
        "Pushes filter conjuncts below a stream join, mirroring them across join keys"
    }

    fn rewrite(&self, node: &Node) -> Option<Node> {
        let Node::Filter {
            source, predicate, ..
        } = node
        else {
            return None;
        };
        let Node::StreamJoin {
            left,
            right,
            left_key,
            right_key,
            schema,
        } = source.as_ref()
        else {
            return None;
        };

        let predicates = predicate.split_by_and();
        let mut push_left = Vec::new();
        let mut push_right = Vec::new();
        let mut stayed = Vec::new();

        for conjunct in &predicates {
            let variables = conjunct.variables_used();
            let uses_left = left.schema().uses_any(&variables);
            let uses_right = right.schema().uses_any(&variables);
            if !uses_left {
                push_right.push(conjunct.clone());
            }
            if !uses_right {
                push_left.push(conjunct.clone());
            }
            if uses_left && uses_right {
                stayed.push(conjunct.clone());
            }

            if let Some((to_left, mirrored)) = mirror_across_keys(conjunct, left_key, right_key) {
                if to_left {
                    push_left.push(mirrored);
                } else {
                    push_right.push(mirrored);
                }
            }
        }

        if stayed.len() == predicates.len() {
            return None;
        }

        let join = Node::StreamJoin {
            left: push_into(left, push_left),
            right: push_into(right, push_right),
            left_key: left_key.clone(),
            right_key: right_key.clone(),
            schema: schema.clone(),
        };
        Some(wrap_in_filter(join, stayed))
    }
}

/// Copy of `conjunct` with its first argument swapped for the matching key on
/// the other side, plus whether the copy belongs to the left branch.
///
/// The first matching key pair wins.
fn mirror_across_keys(
    conjunct: &Expression,
    left_key: &[Expression],
    right_key: &[Expression],
) -> Option<(bool, Expression)> {
    let ExpressionKind::FunctionCall { name, arguments } = &conjunct.kind else {
        return None;
    };
    let first = arguments.first()?.as_variable()?;

    for (left, right) in left_key.iter().zip(right_key) {
        let (replacement, to_left) = if left.as_variable() == Some(first) {
            (right, false)
        } else if right.as_variable() == Some(first) {
            (left, true)
        } else {
            continue;
        };
        let mut mirrored_arguments = arguments.clone();
        mirrored_arguments[0] = replacement.clone();
        let mirrored = Expression {
            ty: conjunct.ty.clone(),
            kind: ExpressionKind::FunctionCall {
                name: name.clone(),
                arguments: mirrored_arguments,
            },
        };
        return Some((to_left, mirrored));
    }
    None
}

fn push_into(branch: &Arc<Node>, predicates: Vec<Expression>) -> Arc<Node> {
    if predicates.is_empty() {
        Arc::clone(branch)
    } else {
        Arc::new(Node::filter(
            Arc::clone(branch),
            Expression::and_of(predicates),
        ))
    }
}

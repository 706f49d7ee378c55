//! Rule-based physical plan optimizer
//!
//! Each rule rewrites single nodes; [`transform_up`] applies it bottom-up
//! across the whole tree, including table arguments of table valued functions
//! and subqueries nested in expressions. [`Optimizer`] runs the rules to a
//! fixpoint.

mod datasource_pushdown;
mod merge_filters;
mod stream_join_pushdown;
mod tvf_pushdown;

pub use datasource_pushdown::PushDownFilterIntoDatasource;
pub use merge_filters::MergeFilters;
pub use stream_join_pushdown::PushDownFilterIntoStreamJoinBranch;
pub use tvf_pushdown::PushDownFilterIntoTableValuedFunction;

use crate::physical::expr::{Expression, ExpressionKind};
use crate::physical::node::{Node, TableValuedFunctionArgument};
use rv_core::OptimizerConfig;
use std::sync::Arc;

/// A local plan rewrite
pub trait OptimizerRule: Send + Sync {
    /// Rule name (used in logs)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Rewrite one node whose children have already been visited.
    ///
    /// Returns `None` when the rule does not apply.
    fn rewrite(&self, node: &Node) -> Option<Node>;

    /// Apply the rule everywhere in the tree.
    ///
    /// Returns the rewritten plan and whether anything changed; an unchanged
    /// plan is returned as the same `Arc`.
    fn apply(&self, node: &Arc<Node>) -> (Arc<Node>, bool) {
        match transform_up(node, &mut |n| self.rewrite(n)) {
            Some(rewritten) => (rewritten, true),
            None => (Arc::clone(node), false),
        }
    }
}

/// Rewrite a tree bottom-up.
///
/// Children are visited first, then `rewrite` sees the (possibly rebuilt)
/// node. Returns `None` when no site changed.
pub fn transform_up(
    node: &Arc<Node>,
    rewrite: &mut dyn FnMut(&Node) -> Option<Node>,
) -> Option<Arc<Node>> {
    let rebuilt = rebuild_children(node, rewrite);
    let current = rebuilt.as_ref().unwrap_or(node.as_ref());
    match rewrite(current) {
        Some(rewritten) => Some(Arc::new(rewritten)),
        None => rebuilt.map(Arc::new),
    }
}

fn child(
    node: &Arc<Node>,
    rewrite: &mut dyn FnMut(&Node) -> Option<Node>,
    changed: &mut bool,
) -> Arc<Node> {
    match transform_up(node, rewrite) {
        Some(rewritten) => {
            *changed = true;
            rewritten
        }
        None => Arc::clone(node),
    }
}

fn expressions(
    expressions: &[Expression],
    rewrite: &mut dyn FnMut(&Node) -> Option<Node>,
    changed: &mut bool,
) -> Vec<Expression> {
    expressions
        .iter()
        .map(|e| expression(e, rewrite, changed))
        .collect()
}

/// Rebuild an expression with every nested query rewritten
fn expression(
    expr: &Expression,
    rewrite: &mut dyn FnMut(&Node) -> Option<Node>,
    changed: &mut bool,
) -> Expression {
    let kind = match &expr.kind {
        ExpressionKind::Variable(_) | ExpressionKind::Constant(_) => return expr.clone(),
        ExpressionKind::FunctionCall { name, arguments } => ExpressionKind::FunctionCall {
            name: name.clone(),
            arguments: expressions(arguments, rewrite, changed),
        },
        ExpressionKind::And(arguments) => {
            ExpressionKind::And(expressions(arguments, rewrite, changed))
        }
        ExpressionKind::Or(arguments) => {
            ExpressionKind::Or(expressions(arguments, rewrite, changed))
        }
        ExpressionKind::Coalesce(arguments) => {
            ExpressionKind::Coalesce(expressions(arguments, rewrite, changed))
        }
        ExpressionKind::Tuple(arguments) => {
            ExpressionKind::Tuple(expressions(arguments, rewrite, changed))
        }
        ExpressionKind::TypeAssertion { expression: inner, target } => {
            ExpressionKind::TypeAssertion {
                expression: Box::new(expression(inner, rewrite, changed)),
                target: target.clone(),
            }
        }
        ExpressionKind::Cast { expression: inner, target } => ExpressionKind::Cast {
            expression: Box::new(expression(inner, rewrite, changed)),
            target: target.clone(),
        },
        ExpressionKind::QueryExpression(node) => {
            ExpressionKind::QueryExpression(child(node, rewrite, changed))
        }
    };
    Expression {
        ty: expr.ty.clone(),
        kind,
    }
}

/// The node with every child rewritten, or `None` if no child changed
fn rebuild_children(node: &Node, rewrite: &mut dyn FnMut(&Node) -> Option<Node>) -> Option<Node> {
    let mut changed = false;
    let rebuilt = match node {
        Node::Datasource { datasource, schema } => {
            let predicates = expressions(&datasource.predicates, rewrite, &mut changed);
            Node::Datasource {
                datasource: datasource.with_predicates(predicates),
                schema: schema.clone(),
            }
        }
        Node::Filter {
            source,
            predicate,
            schema,
        } => Node::Filter {
            source: child(source, rewrite, &mut changed),
            predicate: expression(predicate, rewrite, &mut changed),
            schema: schema.clone(),
        },
        Node::Map {
            source,
            expressions: projections,
            schema,
        } => Node::Map {
            source: child(source, rewrite, &mut changed),
            expressions: expressions(projections, rewrite, &mut changed),
            schema: schema.clone(),
        },
        Node::GroupBy {
            source,
            key,
            aggregates,
            triggers,
            schema,
        } => {
            let source = child(source, rewrite, &mut changed);
            let key = expressions(key, rewrite, &mut changed);
            let aggregates = aggregates
                .iter()
                .map(|aggregate| {
                    let mut aggregate = aggregate.clone();
                    aggregate.argument = expression(&aggregate.argument, rewrite, &mut changed);
                    aggregate
                })
                .collect();
            Node::GroupBy {
                source,
                key,
                aggregates,
                triggers: triggers.clone(),
                schema: schema.clone(),
            }
        }
        Node::StreamJoin {
            left,
            right,
            left_key,
            right_key,
            schema,
        } => Node::StreamJoin {
            left: child(left, rewrite, &mut changed),
            right: child(right, rewrite, &mut changed),
            left_key: expressions(left_key, rewrite, &mut changed),
            right_key: expressions(right_key, rewrite, &mut changed),
            schema: schema.clone(),
        },
        Node::Limit {
            source,
            limit,
            schema,
        } => Node::Limit {
            source: child(source, rewrite, &mut changed),
            limit: expression(limit, rewrite, &mut changed),
            schema: schema.clone(),
        },
        Node::TableValuedFunction {
            name,
            arguments,
            schema,
        } => {
            let arguments = arguments
                .iter()
                .map(|(arg_name, argument)| {
                    let argument = match argument {
                        TableValuedFunctionArgument::Expression(e) => {
                            TableValuedFunctionArgument::Expression(expression(
                                e,
                                rewrite,
                                &mut changed,
                            ))
                        }
                        TableValuedFunctionArgument::Table(table) => {
                            TableValuedFunctionArgument::Table(child(table, rewrite, &mut changed))
                        }
                        TableValuedFunctionArgument::Descriptor(field) => {
                            TableValuedFunctionArgument::Descriptor(field.clone())
                        }
                    };
                    (arg_name.clone(), argument)
                })
                .collect();
            Node::TableValuedFunction {
                name: name.clone(),
                arguments,
                schema: schema.clone(),
            }
        }
        Node::Shuffle {
            source,
            partitions,
            strategy,
            schema,
        } => Node::Shuffle {
            source: child(source, rewrite, &mut changed),
            partitions: *partitions,
            strategy: *strategy,
            schema: schema.clone(),
        },
    };
    changed.then_some(rebuilt)
}

/// Runs rewrite rules to a fixpoint
pub struct Optimizer {
    rules: Vec<Box<dyn OptimizerRule>>,
    max_iterations: usize,
}

impl Optimizer {
    /// Optimizer with every built-in rule
    pub fn with_defaults() -> Self {
        Self {
            rules: vec![
                Box::new(MergeFilters),
                Box::new(PushDownFilterIntoStreamJoinBranch),
                Box::new(PushDownFilterIntoDatasource),
                Box::new(PushDownFilterIntoTableValuedFunction),
            ],
            max_iterations: OptimizerConfig::default().max_iterations,
        }
    }

    /// Optimizer configured from `optimizer:` settings; disabled means no rules
    pub fn from_config(config: &OptimizerConfig) -> Self {
        let mut optimizer = if config.enabled {
            Self::with_defaults()
        } else {
            Self {
                rules: Vec::new(),
                max_iterations: config.max_iterations,
            }
        };
        optimizer.max_iterations = config.max_iterations;
        optimizer
    }

    /// Optimizer running exactly the given rules, in order
    pub fn with_rules(rules: Vec<Box<dyn OptimizerRule>>, max_iterations: usize) -> Self {
        Self {
            rules,
            max_iterations,
        }
    }

    /// Rewrite `node` until no rule applies or the iteration bound is hit.
    ///
    /// Returns the plan and whether any rule changed it.
    pub fn optimize(&self, node: Arc<Node>) -> (Arc<Node>, bool) {
        let mut plan = node;
        let mut changed_any = false;
        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for rule in &self.rules {
                let (rewritten, rule_changed) = rule.apply(&plan);
                if rule_changed {
                    log::debug!("Optimizer rule '{}' rewrote the plan", rule.name());
                    plan = rewritten;
                    changed = true;
                }
            }
            if !changed {
                log::debug!("Optimizer reached a fixpoint after {} iteration(s)", iteration + 1);
                return (plan, changed_any);
            }
            changed_any = true;
        }
        log::warn!(
            "Optimizer stopped after {} iterations without reaching a fixpoint",
            self.max_iterations
        );
        (plan, changed_any)
    }

    /// Names of the registered rules, in application order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
#[path = "optimizer_test.rs"]
mod tests;

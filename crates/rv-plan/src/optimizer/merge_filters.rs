//! Collapse stacked filters into one

use super::OptimizerRule;
use crate::physical::expr::Expression;
use crate::physical::node::Node;

/// `Filter(p1, Filter(p2, x))` becomes `Filter(p1 AND p2, x)`
pub struct MergeFilters;

impl OptimizerRule for MergeFilters {
    fn name(&self) -> &'static str {
        "merge_filters"
    }

    fn description(&self) -> &'static str {
        "Merges directly nested filters into a single conjunction"
    }

    fn rewrite(&self, node: &Node) -> Option<Node> {
        let Node::Filter {
            source, predicate, ..
        } = node
        else {
            return None;
        };
        let Node::Filter {
            source: inner_source,
            predicate: inner_predicate,
            ..
        } = source.as_ref()
        else {
            return None;
        };

        let mut conjuncts = predicate.split_by_and();
        conjuncts.extend(inner_predicate.split_by_and());
        Some(Node::filter(
            inner_source.clone(),
            Expression::and_of(conjuncts),
        ))
    }
}

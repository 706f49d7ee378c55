//! Push filters straight into the datasource adapter

use super::OptimizerRule;
use crate::physical::expr::Expression;
use crate::physical::node::Node;
use std::sync::Arc;

/// `Filter(p, Datasource)` hands the conjuncts of `p` to the adapter
pub struct PushDownFilterIntoDatasource;

impl OptimizerRule for PushDownFilterIntoDatasource {
    fn name(&self) -> &'static str {
        "push_down_filter_into_datasource"
    }

    fn description(&self) -> &'static str {
        "Lets a datasource absorb the filter conjuncts it can evaluate itself"
    }

    fn rewrite(&self, node: &Node) -> Option<Node> {
        let Node::Filter {
            source, predicate, ..
        } = node
        else {
            return None;
        };
        let Node::Datasource { datasource, schema } = source.as_ref() else {
            return None;
        };

        let (remaining, pushed, changed) =
            datasource.push_down_predicates(&predicate.split_by_and(), &datasource.predicates);
        if !changed {
            return None;
        }

        let scan = Node::Datasource {
            datasource: datasource.with_predicates(pushed),
            schema: schema.clone(),
        };
        Some(wrap_in_filter(scan, remaining))
    }
}

/// `node` under a filter of `remaining`, or bare if nothing remains
pub(super) fn wrap_in_filter(node: Node, remaining: Vec<Expression>) -> Node {
    if remaining.is_empty() {
        node
    } else {
        Node::filter(Arc::new(node), Expression::and_of(remaining))
    }
}

//! Push filters through a table valued function into its source datasource

use super::datasource_pushdown::wrap_in_filter;
use super::OptimizerRule;
use crate::physical::expr::Expression;
use crate::physical::node::{Node, TableValuedFunctionArgument};
use std::sync::Arc;

/// Name of the table argument filters are pushed into
const SOURCE_ARGUMENT: &str = "source";

/// `Filter(p, TVF(source => Datasource, ...))` offers the conjuncts of `p`
/// that only read datasource fields to the adapter.
///
/// Conjuncts over fields the function adds stay in the filter: the
/// datasource never produces those fields, so it could not evaluate them.
pub struct PushDownFilterIntoTableValuedFunction;

impl OptimizerRule for PushDownFilterIntoTableValuedFunction {
    fn name(&self) -> &'static str {
        "push_down_filter_into_table_valued_function"
    }

    fn description(&self) -> &'static str {
        "Pushes filters on passthrough fields into the datasource feeding a table valued function"
    }

    fn rewrite(&self, node: &Node) -> Option<Node> {
        let Node::Filter {
            source, predicate, ..
        } = node
        else {
            return None;
        };
        let Node::TableValuedFunction {
            name,
            arguments,
            schema: tvf_schema,
        } = source.as_ref()
        else {
            return None;
        };
        let Some(TableValuedFunctionArgument::Table(table)) = arguments.get(SOURCE_ARGUMENT)
        else {
            return None;
        };
        let Node::Datasource {
            datasource,
            schema: datasource_schema,
        } = table.as_ref()
        else {
            return None;
        };

        let (candidates, mut remaining): (Vec<Expression>, Vec<Expression>) =
            predicate.split_by_and().into_iter().partition(|conjunct| {
                conjunct
                    .variables_used()
                    .iter()
                    .all(|variable| datasource_schema.field(variable).is_some())
            });
        if candidates.is_empty() {
            return None;
        }

        let (rejected, pushed, changed) =
            datasource.push_down_predicates(&candidates, &datasource.predicates);
        if !changed {
            return None;
        }
        log::trace!(
            "Pushed {} predicate(s) through '{}' into datasource '{}'",
            candidates.len().saturating_sub(rejected.len()),
            name,
            datasource.name
        );
        remaining.extend(rejected);

        let scan = Node::Datasource {
            datasource: datasource.with_predicates(pushed),
            schema: datasource_schema.clone(),
        };
        let mut arguments = arguments.clone();
        arguments.insert(
            SOURCE_ARGUMENT.to_string(),
            TableValuedFunctionArgument::Table(Arc::new(scan)),
        );
        let tvf = Node::TableValuedFunction {
            name: name.clone(),
            arguments,
            schema: tvf_schema.clone(),
        };
        Some(wrap_in_filter(tvf, remaining))
    }
}

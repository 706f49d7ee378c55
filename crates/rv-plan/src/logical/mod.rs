//! Logical plan and the logical → physical typechecking pass
//!
//! Every field a query touches is renamed to a session-unique synthetic name
//! (`e.id` becomes `e.id_0`), so shadowing, self-joins, and nested scopes
//! can't collide. The typecheck of a node returns the physical node together
//! with the mapping from user-facing names to those unique names.

pub mod expr;
mod group_by;
mod join;
pub mod node;
mod tvf;

pub use expr::{typecheck_expression, LogicalExpr};
pub use node::{
    AggregateItem, GroupKey, LogicalNode, LogicalTrigger, LogicalTvfArgument, MapItem,
};

use crate::error::{PlanError, PlanResult};
use crate::physical::node::Node;
use crate::physical::schema::variable_name_matches_field;
use crate::physical::{reverse_mapping, Environment, NameMapping};
use crate::registry::TableValuedFunctionRegistry;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

/// Per-session generator of unique names.
///
/// Each base name has its own counter, so `get_unique("a")` yields `a_0`,
/// `a_1`, … independently of other bases.
#[derive(Debug, Default)]
pub struct UniqueNameGenerator {
    counters: RefCell<HashMap<String, usize>>,
}

impl UniqueNameGenerator {
    /// Create a generator with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique name for `base`
    pub fn get_unique(&self, base: &str) -> String {
        let mut counters = self.counters.borrow_mut();
        let index = counters.entry(base.to_string()).or_insert(0);
        let unique = format!("{base}_{index}");
        *index += 1;
        unique
    }
}

/// One frame of the scope chain, mapping user-facing names to unique names
#[derive(Debug)]
pub struct VariableMapping {
    /// Enclosing scope
    pub parent: Option<Arc<VariableMapping>>,
    /// Names bound by this scope
    pub mapping: NameMapping,
}

impl VariableMapping {
    /// Resolve `name`, innermost frame first.
    ///
    /// Within one frame an exact match wins over suffix matches; several
    /// suffix matches are ambiguous.
    pub fn get_unique_name(&self, name: &str) -> PlanResult<Option<String>> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(unique) = current.mapping.get(name) {
                return Ok(Some(unique.clone()));
            }
            let matches: Vec<(&String, &String)> = current
                .mapping
                .iter()
                .filter(|(original, _)| variable_name_matches_field(name, original))
                .collect();
            match matches.as_slice() {
                [] => frame = current.parent.as_deref(),
                [(_, unique)] => return Ok(Some((*unique).clone())),
                many => {
                    let candidates: Vec<&str> =
                        many.iter().map(|(original, _)| original.as_str()).collect();
                    return Err(PlanError::AmbiguousVariable {
                        name: name.to_string(),
                        candidates: candidates.join(", "),
                    });
                }
            }
        }
        Ok(None)
    }
}

/// A typechecked common table expression
#[derive(Debug, Clone)]
pub struct CommonTableExpr {
    /// Physical plan of the CTE body
    pub node: Arc<Node>,
    /// User-facing names of its output fields
    pub mapping: NameMapping,
}

/// Logical-side typecheck state: CTEs in scope, table valued functions, the
/// scope chain, and the shared uniquifier.
#[derive(Clone)]
pub struct LogicalEnvironment {
    /// CTEs visible at this point
    pub common_table_exprs: Rc<BTreeMap<String, CommonTableExpr>>,
    /// Table valued functions by name
    pub table_valued_functions: Arc<TableValuedFunctionRegistry>,
    /// Innermost scope frame
    pub unique_variable_names: Option<Arc<VariableMapping>>,
    /// Uniquifier shared by every extension of this environment
    pub unique_name_generator: Rc<UniqueNameGenerator>,
}

impl LogicalEnvironment {
    /// Fresh environment for one top-level query
    pub fn new(table_valued_functions: Arc<TableValuedFunctionRegistry>) -> Self {
        Self {
            common_table_exprs: Rc::new(BTreeMap::new()),
            table_valued_functions,
            unique_variable_names: None,
            unique_name_generator: Rc::new(UniqueNameGenerator::new()),
        }
    }

    /// Next unique name for `base`
    pub fn get_unique(&self, base: &str) -> String {
        self.unique_name_generator.get_unique(base)
    }

    /// Extend the scope chain with the names bound by one record
    pub fn with_record_unique_variable_names(&self, mapping: NameMapping) -> Self {
        Self {
            unique_variable_names: Some(Arc::new(VariableMapping {
                parent: self.unique_variable_names.clone(),
                mapping,
            })),
            ..self.clone()
        }
    }

    /// Replace the visible CTEs
    pub fn with_common_table_exprs(&self, ctes: BTreeMap<String, CommonTableExpr>) -> Self {
        Self {
            common_table_exprs: Rc::new(ctes),
            ..self.clone()
        }
    }

    /// Resolve a user-facing variable name to its unique name
    pub fn resolve_variable(&self, name: &str) -> PlanResult<String> {
        let resolved = match &self.unique_variable_names {
            Some(mapping) => mapping.get_unique_name(name)?,
            None => None,
        };
        resolved.ok_or_else(|| PlanError::UnresolvedVariable {
            name: name.to_string(),
        })
    }
}

/// Typecheck a whole query.
///
/// Returns the physical plan and the reverse mapping from unique output
/// names to user-facing names; that pair is what execution consumes.
pub fn typecheck_query(
    env: &Environment,
    table_valued_functions: Arc<TableValuedFunctionRegistry>,
    node: &LogicalNode,
) -> PlanResult<(Arc<Node>, NameMapping)> {
    let logical_env = LogicalEnvironment::new(table_valued_functions);
    let (physical, mapping) = node.typecheck(env, &logical_env)?;
    log::debug!(
        "Typechecked {} into {} output fields",
        physical.kind(),
        physical.schema().fields.len()
    );
    Ok((Arc::new(physical), reverse_mapping(&mapping)))
}

#[cfg(test)]
#[path = "logical_test.rs"]
mod tests;

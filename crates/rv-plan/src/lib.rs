//! rv-plan: query planning for Rivulet
//!
//! SQL is parsed into a logical plan, typechecked into a physical plan whose
//! fields carry session-unique names, and rewritten to a fixpoint by a
//! rule-based optimizer.

pub mod error;
pub mod frontend;
pub mod logical;
pub mod optimizer;
pub mod physical;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use error::{PlanError, PlanResult};
pub use frontend::{build_statement, plan_sql};
pub use logical::{typecheck_query, LogicalEnvironment, LogicalExpr, LogicalNode};
pub use optimizer::{Optimizer, OptimizerRule};
pub use physical::expr::{Expression, ExpressionKind, Variable};
pub use physical::node::{Datasource, Node};
pub use physical::schema::{Schema, SchemaField};
pub use physical::{describe_schema, Environment, NameMapping};
pub use registry::{
    builtin_table_valued_functions, Catalog, DatasourceImplementation, DatasourceRegistry,
    DatasourceRepository,
};

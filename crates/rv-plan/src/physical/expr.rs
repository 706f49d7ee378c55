//! Typed physical expressions

use super::node::Node;
use rv_core::{type_sum, Type, Value};
use std::sync::Arc;

/// A resolved variable reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    /// Unique synthetic name of the referenced field
    pub name: String,
    /// True when the innermost record scope binds the variable,
    /// false for a correlated reference to an outer scope
    pub is_level0: bool,
}

/// An expression together with its resolved type
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Resolved output type
    pub ty: Type,
    /// Expression variant
    pub kind: ExpressionKind,
}

/// Expression variants
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// Field reference
    Variable(Variable),
    /// Literal value
    Constant(Value),
    /// Call of a scalar function overload
    FunctionCall {
        name: String,
        arguments: Vec<Expression>,
    },
    /// Three-valued conjunction
    And(Vec<Expression>),
    /// Three-valued disjunction
    Or(Vec<Expression>),
    /// Per-row check that the value belongs to `target`; fails the row otherwise
    TypeAssertion {
        expression: Box<Expression>,
        target: Type,
    },
    /// Conversion to `target`, yielding NULL when the value doesn't convert
    Cast {
        expression: Box<Expression>,
        target: Type,
    },
    /// First non-null argument
    Coalesce(Vec<Expression>),
    /// Tuple construction
    Tuple(Vec<Expression>),
    /// Nested query evaluated to a list of rows
    QueryExpression(Arc<Node>),
}

impl Expression {
    /// Variable reference
    pub fn variable(name: impl Into<String>, is_level0: bool, ty: Type) -> Self {
        Self {
            ty,
            kind: ExpressionKind::Variable(Variable {
                name: name.into(),
                is_level0,
            }),
        }
    }

    /// Constant; the type is taken from the value
    pub fn constant(value: Value) -> Self {
        Self {
            ty: value.ty(),
            kind: ExpressionKind::Constant(value),
        }
    }

    /// Function call with an already-resolved output type
    pub fn function_call(name: impl Into<String>, arguments: Vec<Expression>, ty: Type) -> Self {
        Self {
            ty,
            kind: ExpressionKind::FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    /// Conjunction of the given predicates.
    ///
    /// A single predicate is returned as is. The result admits NULL when any
    /// operand does.
    pub fn and_of(mut predicates: Vec<Expression>) -> Self {
        if predicates.len() == 1 {
            if let Some(only) = predicates.pop() {
                return only;
            }
        }
        let ty = if predicates.iter().any(|p| p.ty.admits_null()) {
            type_sum(Type::Boolean, Type::Null)
        } else {
            Type::Boolean
        };
        Self {
            ty,
            kind: ExpressionKind::And(predicates),
        }
    }

    /// The variable this expression is, if any
    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            ExpressionKind::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    /// Split a predicate into its top-level conjuncts, flattening nested ANDs.
    pub fn split_by_and(&self) -> Vec<Expression> {
        match &self.kind {
            ExpressionKind::And(arguments) => {
                arguments.iter().flat_map(Expression::split_by_and).collect()
            }
            _ => vec![self.clone()],
        }
    }

    /// Names of all variables referenced, including those inside nested queries.
    pub fn variables_used(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    pub(crate) fn collect_variables(&self, out: &mut Vec<String>) {
        match &self.kind {
            ExpressionKind::Variable(variable) => {
                if !out.contains(&variable.name) {
                    out.push(variable.name.clone());
                }
            }
            ExpressionKind::Constant(_) => {}
            ExpressionKind::FunctionCall { arguments, .. }
            | ExpressionKind::And(arguments)
            | ExpressionKind::Or(arguments)
            | ExpressionKind::Coalesce(arguments)
            | ExpressionKind::Tuple(arguments) => {
                for argument in arguments {
                    argument.collect_variables(out);
                }
            }
            ExpressionKind::TypeAssertion { expression, .. }
            | ExpressionKind::Cast { expression, .. } => expression.collect_variables(out),
            ExpressionKind::QueryExpression(node) => node.collect_variables(out),
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn join(arguments: &[Expression], separator: &str) -> String {
            arguments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(separator)
        }

        match &self.kind {
            ExpressionKind::Variable(variable) => {
                if variable.is_level0 {
                    write!(f, "{}", variable.name)
                } else {
                    write!(f, "outer({})", variable.name)
                }
            }
            ExpressionKind::Constant(value) => write!(f, "{value}"),
            ExpressionKind::FunctionCall { name, arguments } => {
                write!(f, "{name}({})", join(arguments, ", "))
            }
            ExpressionKind::And(arguments) => write!(f, "({})", join(arguments, " AND ")),
            ExpressionKind::Or(arguments) => write!(f, "({})", join(arguments, " OR ")),
            ExpressionKind::TypeAssertion { expression, target } => {
                write!(f, "assert({expression} :: {target})")
            }
            ExpressionKind::Cast { expression, target } => {
                write!(f, "CAST({expression} AS {target})")
            }
            ExpressionKind::Coalesce(arguments) => write!(f, "COALESCE({})", join(arguments, ", ")),
            ExpressionKind::Tuple(arguments) => write!(f, "({})", join(arguments, ", ")),
            ExpressionKind::QueryExpression(_) => write!(f, "(subquery)"),
        }
    }
}

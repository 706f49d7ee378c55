//! Logical expressions and their typechecking

use super::node::LogicalNode;
use super::LogicalEnvironment;
use crate::error::{PlanError, PlanResult};
use crate::physical::expr::{Expression, ExpressionKind};
use crate::physical::{reverse_mapping, Environment};
use crate::registry::FunctionDescriptor;
use rv_core::{type_intersection, type_sum, StructField, Type, TypeRelation, Value};
use std::sync::Arc;

/// Untyped expression as produced by the SQL frontend
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalExpr {
    /// Field reference, possibly qualified (`e.id`)
    Variable(String),
    /// Literal
    Constant(Value),
    /// Tuple construction
    Tuple(Vec<LogicalExpr>),
    /// Conjunction
    And(Box<LogicalExpr>, Box<LogicalExpr>),
    /// Disjunction
    Or(Box<LogicalExpr>, Box<LogicalExpr>),
    /// Scalar function call; the overload is picked during typecheck
    FunctionCall {
        name: String,
        arguments: Vec<LogicalExpr>,
    },
    /// Scalar subquery
    QueryExpression(Box<LogicalNode>),
    /// First non-null argument
    Coalesce(Vec<LogicalExpr>),
    /// Narrowing conversion
    Cast {
        expression: Box<LogicalExpr>,
        target: Type,
    },
}

impl LogicalExpr {
    /// Variable reference
    pub fn variable(name: impl Into<String>) -> Self {
        LogicalExpr::Variable(name.into())
    }

    /// Function call
    pub fn call(name: impl Into<String>, arguments: Vec<LogicalExpr>) -> Self {
        LogicalExpr::FunctionCall {
            name: name.into(),
            arguments,
        }
    }

    /// Conjunction of two expressions
    pub fn and(left: LogicalExpr, right: LogicalExpr) -> Self {
        LogicalExpr::And(Box::new(left), Box::new(right))
    }

    /// Default output name for the expression, if it has a natural one
    pub fn field_name(&self) -> Option<&str> {
        match self {
            LogicalExpr::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Resolve names and types
    pub fn typecheck(
        &self,
        env: &Environment,
        logical_env: &LogicalEnvironment,
    ) -> PlanResult<Expression> {
        match self {
            LogicalExpr::Variable(name) => {
                let unique = logical_env.resolve_variable(name)?;
                match env.lookup_field(&unique) {
                    Some((field, is_level0)) => {
                        Ok(Expression::variable(unique, is_level0, field.ty.clone()))
                    }
                    None => Err(PlanError::UnresolvedVariable { name: unique }),
                }
            }
            LogicalExpr::Constant(value) => Ok(Expression::constant(value.clone())),
            LogicalExpr::Tuple(elements) => {
                let arguments = elements
                    .iter()
                    .map(|element| element.typecheck(env, logical_env))
                    .collect::<PlanResult<Vec<_>>>()?;
                Ok(Expression {
                    ty: Type::Tuple(arguments.iter().map(|a| a.ty.clone()).collect()),
                    kind: ExpressionKind::Tuple(arguments),
                })
            }
            LogicalExpr::And(left, right) => {
                let (left, right, ty) = typecheck_logical_operands(env, logical_env, left, right)?;
                Ok(Expression {
                    ty,
                    kind: ExpressionKind::And(vec![left, right]),
                })
            }
            LogicalExpr::Or(left, right) => {
                let (left, right, ty) = typecheck_logical_operands(env, logical_env, left, right)?;
                Ok(Expression {
                    ty,
                    kind: ExpressionKind::Or(vec![left, right]),
                })
            }
            LogicalExpr::FunctionCall { name, arguments } => {
                typecheck_function_call(env, logical_env, name, arguments)
            }
            LogicalExpr::QueryExpression(node) => {
                let (source, mapping) = node.typecheck(env, logical_env)?;
                let reverse = reverse_mapping(&mapping);
                let fields = &source.schema().fields;
                let element = match fields.as_slice() {
                    [only] => only.ty.clone(),
                    _ => Type::Struct(
                        fields
                            .iter()
                            .map(|field| {
                                let name = reverse
                                    .get(&field.name)
                                    .cloned()
                                    .unwrap_or_else(|| field.name.clone());
                                StructField::new(name, field.ty.clone())
                            })
                            .collect(),
                    ),
                };
                Ok(Expression {
                    ty: Type::List(Box::new(element)),
                    kind: ExpressionKind::QueryExpression(Arc::new(source)),
                })
            }
            LogicalExpr::Coalesce(arguments) => {
                if arguments.is_empty() {
                    return Err(PlanError::MalformedArgument {
                        function: "COALESCE".to_string(),
                        message: "must be provided at least 1 argument".to_string(),
                    });
                }
                let arguments = arguments
                    .iter()
                    .map(|argument| argument.typecheck(env, logical_env))
                    .collect::<PlanResult<Vec<_>>>()?;
                let ty = Type::sum_of(arguments.iter().map(|a| a.ty.clone())).unwrap_or(Type::Null);
                Ok(Expression {
                    ty,
                    kind: ExpressionKind::Coalesce(arguments),
                })
            }
            LogicalExpr::Cast { expression, target } => {
                let expression = expression.typecheck(env, logical_env)?;
                if target.is(&expression.ty) != TypeRelation::Is {
                    return Err(PlanError::TypeMismatch {
                        context: format!("CAST to {target}"),
                        expected: format!("a type containing {target}"),
                        actual: expression.ty.to_string(),
                    });
                }
                Ok(Expression {
                    ty: type_sum(target.clone(), Type::Null),
                    kind: ExpressionKind::Cast {
                        expression: Box::new(expression),
                        target: target.clone(),
                    },
                })
            }
        }
    }
}

/// Typecheck `expression` and make it conform to `expected`.
///
/// A `Maybe` relation wraps the expression in a per-row type assertion
/// narrowed to the intersection of both types; `Isnt` fails.
pub fn typecheck_expression(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    expected: &Type,
    expression: &LogicalExpr,
) -> PlanResult<Expression> {
    let expression = expression.typecheck(env, logical_env)?;
    assert_type(expected, expression, "expression")
}

pub(crate) fn assert_type(
    expected: &Type,
    expression: Expression,
    context: &str,
) -> PlanResult<Expression> {
    match expression.ty.is(expected) {
        TypeRelation::Is => Ok(expression),
        TypeRelation::Maybe => {
            let ty =
                type_intersection(expected, &expression.ty).unwrap_or_else(|| expected.clone());
            Ok(Expression {
                ty,
                kind: ExpressionKind::TypeAssertion {
                    expression: Box::new(expression),
                    target: expected.clone(),
                },
            })
        }
        TypeRelation::Isnt => Err(PlanError::TypeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: expression.ty.to_string(),
        }),
    }
}

fn typecheck_logical_operands(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    left: &LogicalExpr,
    right: &LogicalExpr,
) -> PlanResult<(Expression, Expression, Type)> {
    let boolean_or_null = type_sum(Type::Boolean, Type::Null);
    let left = typecheck_expression(env, logical_env, &boolean_or_null, left)?;
    let right = typecheck_expression(env, logical_env, &boolean_or_null, right)?;
    let ty = if left.ty.admits_null() || right.ty.admits_null() {
        boolean_or_null
    } else {
        Type::Boolean
    };
    Ok((left, right, ty))
}

fn parameter_type(descriptor: &FunctionDescriptor, declared: &Type) -> Type {
    if descriptor.strict {
        declared.clone().nullable()
    } else {
        declared.clone()
    }
}

fn typecheck_function_call(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    name: &str,
    arguments: &[LogicalExpr],
) -> PlanResult<Expression> {
    let overloads = env
        .catalog
        .functions
        .get(name)
        .ok_or_else(|| PlanError::UnknownFunction {
            name: name.to_string(),
        })?;
    let arguments = arguments
        .iter()
        .map(|argument| argument.typecheck(env, logical_env))
        .collect::<PlanResult<Vec<_>>>()?;

    let relations = |descriptor: &FunctionDescriptor| -> Option<Vec<TypeRelation>> {
        if descriptor.argument_types.len() != arguments.len() {
            return None;
        }
        Some(
            arguments
                .iter()
                .zip(&descriptor.argument_types)
                .map(|(argument, declared)| argument.ty.is(&parameter_type(descriptor, declared)))
                .collect(),
        )
    };

    let exact = overloads.iter().find(|descriptor| {
        relations(*descriptor).is_some_and(|rels| rels.iter().all(|r| *r == TypeRelation::Is))
    });
    let chosen = match exact {
        Some(descriptor) => Some(descriptor),
        None => overloads.iter().find(|descriptor| {
            relations(*descriptor)
                .is_some_and(|rels| rels.iter().all(|r| *r != TypeRelation::Isnt))
        }),
    };

    let Some(descriptor) = chosen else {
        let expected: Vec<String> = overloads
            .iter()
            .map(|descriptor| {
                let types: Vec<String> =
                    descriptor.argument_types.iter().map(ToString::to_string).collect();
                format!("({})", types.join(", "))
            })
            .collect();
        let actual: Vec<String> = arguments.iter().map(|a| a.ty.to_string()).collect();
        return Err(PlanError::TypeMismatch {
            context: format!("call to '{name}'"),
            expected: expected.join(" or "),
            actual: format!("({})", actual.join(", ")),
        });
    };

    let arguments = arguments
        .into_iter()
        .zip(&descriptor.argument_types)
        .map(|(argument, declared)| {
            assert_type(&parameter_type(descriptor, declared), argument, name)
        })
        .collect::<PlanResult<Vec<_>>>()?;

    let ty = if descriptor.strict && arguments.iter().any(|a| a.ty.admits_null()) {
        descriptor.output_type.clone().nullable()
    } else {
        descriptor.output_type.clone()
    };
    Ok(Expression::function_call(name, arguments, ty))
}

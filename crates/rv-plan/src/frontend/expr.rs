//! Expression building: sqlparser `Expr` → `LogicalExpr`

use super::query::{build_query, unsupported};
use crate::error::{PlanError, PlanResult};
use crate::logical::{AggregateItem, LogicalExpr};
use crate::registry::Catalog;
use rv_core::{Type, Value};
use sqlparser::ast::{
    BinaryOperator, DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, Interval, UnaryOperator, Value as SqlValue,
};
use std::time::Duration;

/// Aggregation scope of a grouped SELECT
struct Grouping {
    /// Key expressions as written, with the name the projection refers to them by
    keys: Vec<(Expr, String)>,
    aggregates: Vec<AggregateItem>,
}

/// Builds logical expressions.
///
/// A grouped builder replaces key expressions and aggregate calls with
/// references to the GroupBy output, collecting the aggregates on the way.
pub(crate) struct ExprBuilder<'a> {
    catalog: &'a Catalog,
    grouping: Option<Grouping>,
}

impl<'a> ExprBuilder<'a> {
    /// Builder for expressions evaluated per input row
    pub(crate) fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            grouping: None,
        }
    }

    /// Builder for expressions evaluated over the output of a GroupBy
    pub(crate) fn grouped(catalog: &'a Catalog, keys: Vec<(Expr, String)>) -> Self {
        Self {
            catalog,
            grouping: Some(Grouping {
                keys,
                aggregates: Vec::new(),
            }),
        }
    }

    /// Aggregates collected so far
    pub(crate) fn into_aggregates(self) -> Vec<AggregateItem> {
        self.grouping
            .map(|grouping| grouping.aggregates)
            .unwrap_or_default()
    }

    pub(crate) fn is_aggregate(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Function(func) => self
                .catalog
                .aggregates
                .contains_key(&function_name(func)),
            _ => false,
        }
    }

    /// Build a projection item; a bare aggregate takes `alias` as its output name.
    pub(crate) fn build_named(
        &mut self,
        expr: &Expr,
        alias: Option<&str>,
    ) -> PlanResult<LogicalExpr> {
        match expr {
            Expr::Function(func) if self.grouping.is_some() && self.is_aggregate(expr) => {
                let name = self.register_aggregate(func, alias)?;
                Ok(LogicalExpr::Variable(name))
            }
            _ => self.build(expr),
        }
    }

    /// Build an expression
    pub(crate) fn build(&mut self, expr: &Expr) -> PlanResult<LogicalExpr> {
        if let Some(grouping) = &self.grouping {
            if let Some((_, name)) = grouping.keys.iter().find(|(key, _)| key == expr) {
                return Ok(LogicalExpr::Variable(name.clone()));
            }
        }

        match expr {
            Expr::Identifier(ident) => Ok(LogicalExpr::Variable(ident.value.clone())),
            Expr::CompoundIdentifier(idents) => {
                let parts: Vec<&str> = idents.iter().map(|ident| ident.value.as_str()).collect();
                Ok(LogicalExpr::Variable(parts.join(".")))
            }
            Expr::Value(value) => Ok(LogicalExpr::Constant(build_value(&value.value)?)),
            Expr::Nested(inner) => self.build(inner),
            Expr::BinaryOp { left, op, right } => {
                let left = self.build(left)?;
                let right = self.build(right)?;
                match op {
                    BinaryOperator::And => Ok(LogicalExpr::And(Box::new(left), Box::new(right))),
                    BinaryOperator::Or => Ok(LogicalExpr::Or(Box::new(left), Box::new(right))),
                    other => Ok(LogicalExpr::call(binary_function(other)?, vec![left, right])),
                }
            }
            Expr::UnaryOp { op, expr: inner } => {
                let inner = self.build(inner)?;
                match op {
                    UnaryOperator::Not => Ok(LogicalExpr::call("not", vec![inner])),
                    UnaryOperator::Minus => Ok(match inner {
                        LogicalExpr::Constant(Value::Int(value)) => {
                            LogicalExpr::Constant(Value::Int(-value))
                        }
                        LogicalExpr::Constant(Value::Float(value)) => {
                            LogicalExpr::Constant(Value::Float(-value))
                        }
                        other => LogicalExpr::call("neg", vec![other]),
                    }),
                    UnaryOperator::Plus => Ok(inner),
                    other => Err(unsupported(&format!("unary operator {other}"))),
                }
            }
            Expr::IsNull(inner) => Ok(LogicalExpr::call("is_null", vec![self.build(inner)?])),
            Expr::IsNotNull(inner) => {
                Ok(LogicalExpr::call("is_not_null", vec![self.build(inner)?]))
            }
            Expr::Cast {
                expr: inner,
                data_type,
                ..
            } => Ok(LogicalExpr::Cast {
                expression: Box::new(self.build(inner)?),
                target: parse_type_name(&data_type.to_string())?,
            }),
            Expr::Tuple(elements) => Ok(LogicalExpr::Tuple(
                elements
                    .iter()
                    .map(|element| self.build(element))
                    .collect::<PlanResult<Vec<_>>>()?,
            )),
            Expr::Subquery(query) => Ok(LogicalExpr::QueryExpression(Box::new(build_query(
                query,
                self.catalog,
            )?))),
            Expr::Interval(interval) => Ok(LogicalExpr::Constant(Value::Duration(
                build_interval(interval)?,
            ))),
            Expr::Function(func) => self.build_function(func),
            other => Err(unsupported(&format!("expression '{other}'"))),
        }
    }

    fn build_function(&mut self, func: &Function) -> PlanResult<LogicalExpr> {
        let name = function_name(func);
        if func.over.is_some() {
            return Err(unsupported(&format!("window function '{name}'")));
        }

        if self.catalog.aggregates.contains_key(&name) {
            if self.grouping.is_none() {
                return Err(unsupported(&format!(
                    "aggregate '{name}' outside of a grouped SELECT list"
                )));
            }
            let output = self.register_aggregate(func, None)?;
            return Ok(LogicalExpr::Variable(output));
        }

        let arguments = function_arguments(func)?
            .into_iter()
            .map(|argument| match argument {
                Some(expr) => self.build(expr),
                None => Err(unsupported(&format!("'*' argument to '{name}'"))),
            })
            .collect::<PlanResult<Vec<_>>>()?;

        if name == "coalesce" {
            return Ok(LogicalExpr::Coalesce(arguments));
        }
        Ok(LogicalExpr::FunctionCall { name, arguments })
    }

    /// Record an aggregate call and return the output name it is referenced by.
    fn register_aggregate(&mut self, func: &Function, alias: Option<&str>) -> PlanResult<String> {
        let aggregate = function_name(func);
        if let FunctionArguments::List(list) = &func.args {
            if list.duplicate_treatment == Some(DuplicateTreatment::Distinct) {
                return Err(unsupported(&format!("{aggregate}(DISTINCT ...)")));
            }
        }

        let argument = match function_arguments(func)?.as_slice() {
            [Some(expr)] => ExprBuilder::new(self.catalog).build(expr)?,
            [None] if aggregate == "count" => LogicalExpr::Constant(Value::Boolean(true)),
            _ => {
                return Err(PlanError::MalformedArgument {
                    function: aggregate,
                    message: "aggregates take exactly one argument".to_string(),
                })
            }
        };

        let Some(grouping) = self.grouping.as_mut() else {
            return Err(unsupported(&format!("aggregate '{aggregate}' here")));
        };
        let base = alias.unwrap_or(&aggregate).to_string();
        let taken = |candidate: &str| grouping.aggregates.iter().any(|a| a.name == candidate);
        let mut name = base.clone();
        let mut suffix = 1;
        while taken(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }

        grouping.aggregates.push(AggregateItem {
            aggregate,
            argument,
            name: name.clone(),
        });
        Ok(name)
    }
}

pub(super) fn function_name(func: &Function) -> String {
    func.name.to_string().to_lowercase()
}

/// Positional arguments of a call; `None` stands for `*`.
fn function_arguments(func: &Function) -> PlanResult<Vec<Option<&Expr>>> {
    match &func.args {
        FunctionArguments::None => Ok(Vec::new()),
        FunctionArguments::Subquery(_) => Err(unsupported("subquery as function argument")),
        FunctionArguments::List(list) => list
            .args
            .iter()
            .map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Ok(Some(expr)),
                FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => Ok(None),
                other => Err(unsupported(&format!("function argument '{other}'"))),
            })
            .collect(),
    }
}

fn binary_function(op: &BinaryOperator) -> PlanResult<&'static str> {
    Ok(match op {
        BinaryOperator::Eq => "=",
        BinaryOperator::NotEq => "!=",
        BinaryOperator::Lt => "<",
        BinaryOperator::LtEq => "<=",
        BinaryOperator::Gt => ">",
        BinaryOperator::GtEq => ">=",
        BinaryOperator::Plus => "+",
        BinaryOperator::Minus => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Modulo => "%",
        BinaryOperator::StringConcat => "||",
        other => return Err(unsupported(&format!("binary operator {other}"))),
    })
}

fn build_value(value: &SqlValue) -> PlanResult<Value> {
    match value {
        SqlValue::Number(number, _) => {
            if let Ok(int) = number.parse::<i64>() {
                Ok(Value::Int(int))
            } else if let Ok(float) = number.parse::<f64>() {
                Ok(Value::Float(float))
            } else {
                Err(PlanError::SqlParse(format!("invalid number literal '{number}'")))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
            Ok(Value::String(s.clone()))
        }
        SqlValue::Boolean(b) => Ok(Value::Boolean(*b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(unsupported(&format!("literal {other}"))),
    }
}

fn build_interval(interval: &Interval) -> PlanResult<Duration> {
    let text = match interval.value.as_ref() {
        Expr::Value(value) => match &value.value {
            SqlValue::SingleQuotedString(s) | SqlValue::Number(s, _) => s.clone(),
            other => return Err(unsupported(&format!("interval value {other}"))),
        },
        other => return Err(unsupported(&format!("interval value '{other}'"))),
    };
    match &interval.leading_field {
        Some(field) => parse_interval(&format!("{text} {field}")),
        None => parse_interval(&text),
    }
}

/// Parse an interval such as `10 seconds` or `1.5 HOUR`.
pub fn parse_interval(text: &str) -> PlanResult<Duration> {
    let invalid = || PlanError::SqlParse(format!("invalid interval '{text}'"));
    let mut parts = text.split_whitespace();
    let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let amount: f64 = amount.parse().map_err(|_| invalid())?;
    let unit = unit.to_lowercase();
    let unit_millis = match unit.trim_end_matches('s') {
        "m" if unit == "ms" => 1.0,
        "millisecond" => 1.0,
        "" | "second" | "sec" => 1_000.0,
        "m" | "minute" | "min" => 60_000.0,
        "h" | "hour" => 3_600_000.0,
        "d" | "day" => 86_400_000.0,
        _ => return Err(invalid()),
    };
    let millis = amount * unit_millis;
    if !millis.is_finite() || millis < 0.0 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(millis.round() as u64))
}

/// Map a SQL type name to a planner type, e.g. for CAST targets.
pub fn parse_type_name(name: &str) -> PlanResult<Type> {
    let upper = name.to_uppercase();
    let base = upper.split('(').next().unwrap_or_default().trim();
    match base {
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" => Ok(Type::Int),
        "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" | "DECIMAL" | "NUMERIC" => {
            Ok(Type::Float)
        }
        "VARCHAR" | "TEXT" | "STRING" | "CHAR" => Ok(Type::String),
        "BOOLEAN" | "BOOL" => Ok(Type::Boolean),
        "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" | "TIME" => Ok(Type::Time),
        "INTERVAL" => Ok(Type::Duration),
        _ => Err(unsupported(&format!("type {name}"))),
    }
}

//! Table valued function typechecking

use super::expr::typecheck_expression;
use super::node::LogicalTvfArgument;
use super::{LogicalEnvironment, VariableMapping};
use crate::error::{PlanError, PlanResult};
use crate::physical::node::{Node, TableValuedFunctionArgument};
use crate::physical::schema::{Schema, SchemaField};
use crate::physical::{Environment, NameMapping};
use crate::registry::{ParameterKind, TableValuedFunctionParameter};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(super) fn typecheck_table_valued_function(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    name: &str,
    arguments: &BTreeMap<String, LogicalTvfArgument>,
) -> PlanResult<(Node, NameMapping)> {
    let descriptor = logical_env
        .table_valued_functions
        .get(name)
        .cloned()
        .ok_or_else(|| PlanError::UnknownTableValuedFunction {
            name: name.to_string(),
        })?;
    let parameters = descriptor.parameters();
    check_arguments(name, &parameters, arguments)?;

    // Tables first: descriptors resolve against their names.
    let mut typed = BTreeMap::new();
    let mut table_mappings: BTreeMap<String, NameMapping> = BTreeMap::new();
    for (argument_name, argument) in arguments {
        if let LogicalTvfArgument::Table(source) = argument {
            let (node, mapping) = source.typecheck(env, logical_env)?;
            typed.insert(
                argument_name.clone(),
                TableValuedFunctionArgument::Table(Arc::new(node)),
            );
            table_mappings.insert(argument_name.clone(), mapping);
        }
    }

    let descriptor_scope = VariableMapping {
        parent: None,
        mapping: table_mappings.values().flatten().map(|(k, v)| (k.clone(), v.clone())).collect(),
    };
    for parameter in &parameters {
        let Some(argument) = arguments.get(parameter.name) else {
            continue;
        };
        match (argument, &parameter.kind) {
            (LogicalTvfArgument::Descriptor(field), ParameterKind::Descriptor) => {
                let unique = descriptor_scope.get_unique_name(field)?.ok_or_else(|| {
                    PlanError::MalformedArgument {
                        function: name.to_string(),
                        message: format!(
                            "descriptor '{field}' does not name a field of a table argument"
                        ),
                    }
                })?;
                typed.insert(
                    parameter.name.to_string(),
                    TableValuedFunctionArgument::Descriptor(unique),
                );
            }
            (LogicalTvfArgument::Expression(expression), ParameterKind::Expression(ty)) => {
                let expression = typecheck_expression(env, logical_env, ty, expression)?;
                typed.insert(
                    parameter.name.to_string(),
                    TableValuedFunctionArgument::Expression(expression),
                );
            }
            _ => {}
        }
    }

    let output = descriptor.output(&typed)?;

    let mut fields = Vec::new();
    let mut mapping = NameMapping::new();
    let mut time_field = None;
    if let Some(passthrough) = output.passthrough {
        if let Some(TableValuedFunctionArgument::Table(table)) = typed.get(passthrough) {
            fields.extend(table.schema().fields.iter().cloned());
            time_field = table.schema().time_field.clone();
        }
        if let Some(table_mapping) = table_mappings.get(passthrough) {
            mapping.extend(table_mapping.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    for field in &output.added_fields {
        let unique = logical_env.get_unique(&field.name);
        if output.time_field.as_deref() == Some(field.name.as_str()) {
            time_field = Some(unique.clone());
        }
        fields.push(SchemaField::new(unique.clone(), field.ty.clone()));
        mapping.insert(field.name.clone(), unique);
    }

    log::debug!(
        "Typechecked table valued function '{}' with {} output fields",
        name,
        fields.len()
    );

    let node = Node::TableValuedFunction {
        name: name.to_string(),
        arguments: typed,
        schema: Schema::new(fields, time_field),
    };
    Ok((node, mapping))
}

fn check_arguments(
    name: &str,
    parameters: &[TableValuedFunctionParameter],
    arguments: &BTreeMap<String, LogicalTvfArgument>,
) -> PlanResult<()> {
    let malformed = |message: String| PlanError::MalformedArgument {
        function: name.to_string(),
        message,
    };

    for argument_name in arguments.keys() {
        if !parameters.iter().any(|p| p.name == argument_name.as_str()) {
            return Err(malformed(format!("unknown argument '{argument_name}'")));
        }
    }
    for parameter in parameters {
        match (arguments.get(parameter.name), &parameter.kind) {
            (None, _) if parameter.required => {
                return Err(malformed(format!(
                    "missing required argument '{}'",
                    parameter.name
                )));
            }
            (None, _)
            | (Some(LogicalTvfArgument::Table(_)), ParameterKind::Table)
            | (Some(LogicalTvfArgument::Descriptor(_)), ParameterKind::Descriptor)
            | (Some(LogicalTvfArgument::Expression(_)), ParameterKind::Expression(_)) => {}
            (Some(_), kind) => {
                let expected = match kind {
                    ParameterKind::Table => "a TABLE(...) argument".to_string(),
                    ParameterKind::Descriptor => "a DESCRIPTOR(...) argument".to_string(),
                    ParameterKind::Expression(ty) => format!("an expression of type {ty}"),
                };
                return Err(malformed(format!(
                    "argument '{}' must be {expected}",
                    parameter.name
                )));
            }
        }
    }
    Ok(())
}

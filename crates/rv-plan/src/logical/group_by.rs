//! GroupBy typechecking: keys, aggregate overload selection, triggers

use super::expr::assert_type;
use super::node::{AggregateItem, GroupKey, LogicalNode, LogicalTrigger};
use super::LogicalEnvironment;
use crate::error::{PlanError, PlanResult};
use crate::physical::node::{AggregateCall, Node};
use crate::physical::schema::{Schema, SchemaField};
use crate::physical::{reverse_mapping, Environment, NameMapping};
use crate::registry::AggregateDescriptor;
use crate::physical::expr::ExpressionKind;
use rv_core::{TriggerSpec, Type, TypeRelation, Value};
use std::sync::Arc;

pub(super) fn typecheck_group_by(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    source: &LogicalNode,
    key: &[GroupKey],
    aggregates: &[AggregateItem],
    triggers: &[LogicalTrigger],
) -> PlanResult<(Node, NameMapping)> {
    let (source, source_mapping) = source.typecheck(env, logical_env)?;
    let record_env = env.with_record_schema(source.schema());
    let record_logical_env =
        logical_env.with_record_unique_variable_names(source_mapping.clone());
    let reverse = reverse_mapping(&source_mapping);

    let mut mapping = NameMapping::new();
    let mut fields = Vec::new();
    let mut time_field = None;

    let mut key_expressions = Vec::with_capacity(key.len());
    for (index, group_key) in key.iter().enumerate() {
        let expression = group_key
            .expression
            .typecheck(&record_env, &record_logical_env)?;
        let name = match (&group_key.name, expression.as_variable()) {
            (Some(name), _) => name.clone(),
            (None, Some(variable)) => reverse
                .get(&variable.name)
                .cloned()
                .unwrap_or_else(|| variable.name.clone()),
            (None, None) => format!("key_{index}"),
        };
        let unique = logical_env.get_unique(&name);
        if let (Some(variable), Some(source_time_field)) =
            (expression.as_variable(), &source.schema().time_field)
        {
            if &variable.name == source_time_field && time_field.is_none() {
                time_field = Some(unique.clone());
            }
        }
        fields.push(SchemaField::new(unique.clone(), expression.ty.clone()));
        mapping.insert(name, unique);
        key_expressions.push(expression);
    }

    let mut aggregate_calls = Vec::with_capacity(aggregates.len());
    for item in aggregates {
        let overloads =
            env.catalog
                .aggregates
                .get(&item.aggregate)
                .ok_or_else(|| PlanError::UnknownAggregate {
                    name: item.aggregate.clone(),
                })?;
        let argument = item.argument.typecheck(&record_env, &record_logical_env)?;

        let relation = |descriptor: &&AggregateDescriptor| {
            argument.ty.is(&descriptor.argument_type.clone().nullable())
        };
        let chosen = overloads
            .iter()
            .find(|descriptor| relation(descriptor) == TypeRelation::Is)
            .or_else(|| {
                overloads
                    .iter()
                    .find(|descriptor| relation(descriptor) == TypeRelation::Maybe)
            })
            .ok_or_else(|| PlanError::MalformedArgument {
                function: item.aggregate.clone(),
                message: format!("no overload accepts an argument of type {}", argument.ty),
            })?;

        let argument = assert_type(
            &chosen.argument_type.clone().nullable(),
            argument,
            &item.aggregate,
        )?;
        let unique = logical_env.get_unique(&item.name);
        fields.push(SchemaField::new(unique.clone(), chosen.output_type.clone()));
        mapping.insert(item.name.clone(), unique);
        aggregate_calls.push(AggregateCall {
            name: item.aggregate.clone(),
            argument,
            output_type: chosen.output_type.clone(),
        });
    }

    let triggers = if triggers.is_empty() {
        env.default_triggers.as_ref().clone()
    } else {
        triggers
            .iter()
            .map(|trigger| typecheck_trigger(env, logical_env, trigger))
            .collect::<PlanResult<Vec<_>>>()?
    };

    let node = Node::GroupBy {
        source: Arc::new(source),
        key: key_expressions,
        aggregates: aggregate_calls,
        triggers,
        schema: Schema::new(fields, time_field),
    };
    Ok((node, mapping))
}

/// Resolve one trigger clause item.
///
/// The delay is evaluated in the scope enclosing the GroupBy, not per record.
fn typecheck_trigger(
    env: &Environment,
    logical_env: &LogicalEnvironment,
    trigger: &LogicalTrigger,
) -> PlanResult<TriggerSpec> {
    match trigger {
        LogicalTrigger::Counting(0) => Err(PlanError::MalformedArgument {
            function: "COUNTING".to_string(),
            message: "count must be positive".to_string(),
        }),
        LogicalTrigger::Counting(count) => Ok(TriggerSpec::Counting { count: *count }),
        LogicalTrigger::Delay(delay) => {
            let delay = delay.typecheck(env, logical_env)?;
            if delay.ty.is(&Type::Duration) != TypeRelation::Is {
                return Err(PlanError::TypeMismatch {
                    context: "DELAY trigger".to_string(),
                    expected: Type::Duration.to_string(),
                    actual: delay.ty.to_string(),
                });
            }
            match &delay.kind {
                ExpressionKind::Constant(Value::Duration(duration)) => {
                    Ok(TriggerSpec::delay(*duration))
                }
                _ => Err(PlanError::MalformedArgument {
                    function: "DELAY".to_string(),
                    message: "delay must be a constant interval".to_string(),
                }),
            }
        }
        LogicalTrigger::Watermark => Ok(TriggerSpec::Watermark),
        LogicalTrigger::EndOfStream => Ok(TriggerSpec::EndOfStream),
    }
}

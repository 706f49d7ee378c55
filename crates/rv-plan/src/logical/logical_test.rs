use super::*;
use crate::error::{PlanError, PlanResult};
use crate::physical::expr::ExpressionKind;
use crate::physical::node::{ShuffleStrategy, TableValuedFunctionArgument};
use crate::test_utils::*;
use rv_core::{TriggerSpec, Type, Value};

fn events(alias: &str) -> LogicalNode {
    LogicalNode::datasource("events", Some(alias))
}

fn users(alias: &str) -> LogicalNode {
    LogicalNode::datasource("users", Some(alias))
}

fn filter(source: LogicalNode, predicate: LogicalExpr) -> LogicalNode {
    LogicalNode::Filter {
        predicate,
        source: Box::new(source),
    }
}

fn project(source: LogicalNode, items: Vec<MapItem>) -> LogicalNode {
    LogicalNode::Map {
        items,
        source: Box::new(source),
    }
}

fn item(name: &str) -> MapItem {
    MapItem::Expression {
        expression: LogicalExpr::variable(name),
        alias: None,
    }
}

fn int(value: i64) -> LogicalExpr {
    LogicalExpr::Constant(Value::Int(value))
}

#[test]
fn test_unique_name_generator_counts_per_base() {
    let generator = UniqueNameGenerator::new();
    assert_eq!(generator.get_unique("a"), "a_0");
    assert_eq!(generator.get_unique("a"), "a_1");
    assert_eq!(generator.get_unique("b"), "b_0");
    assert_eq!(generator.get_unique("a"), "a_2");
}

#[test]
fn test_variable_mapping_prefers_exact_then_suffix_then_parent() {
    let parent = Arc::new(VariableMapping {
        parent: None,
        mapping: [("o.id".to_string(), "o.id_0".to_string())].into(),
    });
    let child = VariableMapping {
        parent: Some(parent),
        mapping: [
            ("e.id".to_string(), "e.id_0".to_string()),
            ("u.id".to_string(), "u.id_0".to_string()),
            ("e.ts".to_string(), "e.ts_0".to_string()),
        ]
        .into(),
    };

    assert_eq!(child.get_unique_name("e.id").unwrap().as_deref(), Some("e.id_0"));
    assert_eq!(child.get_unique_name("ts").unwrap().as_deref(), Some("e.ts_0"));
    assert_eq!(child.get_unique_name("o.id").unwrap().as_deref(), Some("o.id_0"));
    assert_eq!(child.get_unique_name("missing").unwrap(), None);
    assert!(matches!(child.get_unique_name("id"), Err(PlanError::AmbiguousVariable { .. })));
}

#[test]
fn test_datasource_fields_are_uniquified() {
    let (node, reverse) = typecheck(&events("e")).unwrap();

    let names: Vec<&str> = node.schema().fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["e.id_0", "e.customer_0", "e.amount_0", "e.ts_0"]);
    assert_eq!(node.schema().time_field.as_deref(), Some("e.ts_0"));
    assert_eq!(reverse.get("e.id_0").map(String::as_str), Some("e.id"));
    assert_eq!(node.schema().fields[2].ty, Type::Float.nullable());
}

#[test]
fn test_datasource_alias_defaults_to_name() {
    let (node, reverse) = typecheck(&LogicalNode::datasource("users", None)).unwrap();
    assert_eq!(node.schema().fields[0].name, "users.id_0");
    assert_eq!(reverse.get("users.name_0").map(String::as_str), Some("users.name"));
}

#[test]
fn test_unknown_datasource() {
    let err = typecheck(&LogicalNode::datasource("nope", None)).unwrap_err();
    assert!(matches!(err, PlanError::UnknownDatasource { ref name, .. } if name == "nope"));
    assert!(err.to_string().contains("events"));
}

#[test]
fn test_filter_predicate_is_typechecked() {
    let plan = filter(
        events("e"),
        LogicalExpr::call(
            ">",
            vec![
                LogicalExpr::variable("amount"),
                LogicalExpr::Constant(Value::Float(1.5)),
            ],
        ),
    );
    let (node, _) = typecheck(&plan).unwrap();
    let Node::Filter { predicate, .. } = node.as_ref() else {
        panic!("expected Filter, got {}", node.kind());
    };
    assert_eq!(predicate.ty, Type::Boolean.nullable());
    let ExpressionKind::FunctionCall { arguments, .. } = &predicate.kind else {
        panic!("expected a function call");
    };
    let variable = arguments[0].as_variable().unwrap();
    assert_eq!(variable.name, "e.amount_0");
    assert!(variable.is_level0);
}

#[test]
fn test_non_boolean_filter_is_rejected() {
    let err = typecheck(&filter(events("e"), LogicalExpr::variable("e.id"))).unwrap_err();
    assert!(matches!(err, PlanError::TypeMismatch { .. }));
}

#[test]
fn test_unresolved_variable() {
    let err = typecheck(&filter(
        events("e"),
        LogicalExpr::call("=", vec![LogicalExpr::variable("e.nope"), int(1)]),
    ))
    .unwrap_err();
    assert!(matches!(err, PlanError::UnresolvedVariable { ref name } if name == "e.nope"));
}

#[test]
fn test_unknown_function() {
    let err = typecheck(&filter(
        events("e"),
        LogicalExpr::call("frobnicate", vec![int(1)]),
    ))
    .unwrap_err();
    assert!(matches!(err, PlanError::UnknownFunction { .. }));
}

#[test]
fn test_no_matching_overload() {
    let err = typecheck(&filter(
        events("e"),
        LogicalExpr::call("=", vec![LogicalExpr::variable("e.customer"), int(1)]),
    ))
    .unwrap_err();
    assert!(matches!(err, PlanError::TypeMismatch { .. }));
}

#[test]
fn test_map_names_and_time_field() {
    let plan = project(
        events("e"),
        vec![
            item("e.id"),
            MapItem::Expression {
                expression: LogicalExpr::variable("ts"),
                alias: Some("event_time".to_string()),
            },
            MapItem::Expression {
                expression: LogicalExpr::call("+", vec![LogicalExpr::variable("id"), int(1)]),
                alias: None,
            },
        ],
    );
    let (node, reverse) = typecheck(&plan).unwrap();

    let originals: Vec<&str> = node
        .schema()
        .fields
        .iter()
        .map(|f| reverse[&f.name].as_str())
        .collect();
    assert_eq!(originals, vec!["e.id", "event_time", "col_2"]);
    assert_eq!(node.schema().time_field.as_deref(), Some("event_time_0"));
    assert_eq!(node.schema().fields[2].ty, Type::Int);
}

#[test]
fn test_map_star_with_qualifier() {
    let plan = project(
        LogicalNode::Join {
            left: Box::new(events("e")),
            right: Box::new(users("u")),
            predicate: None,
        },
        vec![MapItem::Star {
            qualifier: Some("u".to_string()),
        }],
    );
    let (node, reverse) = typecheck(&plan).unwrap();
    let originals: Vec<&str> = node
        .schema()
        .fields
        .iter()
        .map(|f| reverse[&f.name].as_str())
        .collect();
    assert_eq!(originals, vec!["u.id", "u.name", "u.age"]);
}

#[test]
fn test_ambiguous_variable_in_join() {
    let plan = project(
        LogicalNode::Join {
            left: Box::new(events("e")),
            right: Box::new(users("u")),
            predicate: None,
        },
        vec![item("id")],
    );
    let err = typecheck(&plan).unwrap_err();
    assert!(matches!(err, PlanError::AmbiguousVariable { ref name, .. } if name == "id"));
}

#[test]
fn test_self_join_keeps_sides_apart() {
    let plan = LogicalNode::Join {
        left: Box::new(events("a")),
        right: Box::new(events("b")),
        predicate: Some(LogicalExpr::call(
            "=",
            vec![LogicalExpr::variable("a.id"), LogicalExpr::variable("b.id")],
        )),
    };
    let (node, _) = typecheck(&plan).unwrap();
    let Node::StreamJoin {
        left_key,
        right_key,
        schema,
        ..
    } = node.as_ref()
    else {
        panic!("expected StreamJoin, got {}", node.kind());
    };
    assert_eq!(left_key[0].as_variable().unwrap().name, "a.id_0");
    assert_eq!(right_key[0].as_variable().unwrap().name, "b.id_0");
    assert_eq!(schema.fields.len(), 8);
    assert!(schema.time_field.is_none());
}

#[test]
fn test_join_extracts_keys_and_filters_the_rest() {
    // Written right-to-left to check that sides are swapped into place.
    let plan = LogicalNode::Join {
        left: Box::new(events("e")),
        right: Box::new(users("u")),
        predicate: Some(LogicalExpr::and(
            LogicalExpr::call(
                "=",
                vec![LogicalExpr::variable("u.id"), LogicalExpr::variable("e.id")],
            ),
            LogicalExpr::call(">", vec![LogicalExpr::variable("u.age"), int(18)]),
        )),
    };
    let (node, _) = typecheck(&plan).unwrap();
    let Node::Filter {
        source, predicate, ..
    } = node.as_ref()
    else {
        panic!("expected Filter, got {}", node.kind());
    };
    assert_eq!(predicate.variables_used(), vec!["u.age_0".to_string()]);
    let Node::StreamJoin {
        left_key,
        right_key,
        ..
    } = source.as_ref()
    else {
        panic!("expected StreamJoin");
    };
    assert_eq!(left_key[0].as_variable().unwrap().name, "e.id_0");
    assert_eq!(right_key[0].as_variable().unwrap().name, "u.id_0");
}

#[test]
fn test_group_by_schema_and_default_triggers() {
    let plan = LogicalNode::GroupBy {
        source: Box::new(events("e")),
        key: vec![GroupKey {
            expression: LogicalExpr::variable("e.customer"),
            name: None,
        }],
        aggregates: vec![
            AggregateItem {
                aggregate: "count".to_string(),
                argument: LogicalExpr::Constant(Value::Boolean(true)),
                name: "cnt".to_string(),
            },
            AggregateItem {
                aggregate: "sum".to_string(),
                argument: LogicalExpr::variable("amount"),
                name: "total".to_string(),
            },
        ],
        triggers: vec![],
    };
    let (node, reverse) = typecheck(&plan).unwrap();
    let Node::GroupBy {
        triggers, schema, ..
    } = node.as_ref()
    else {
        panic!("expected GroupBy, got {}", node.kind());
    };
    assert_eq!(triggers, &vec![TriggerSpec::EndOfStream]);

    let described: Vec<(&str, &Type)> = schema
        .fields
        .iter()
        .map(|f| (reverse[&f.name].as_str(), &f.ty))
        .collect();
    assert_eq!(
        described,
        vec![
            ("e.customer", &Type::String),
            ("cnt", &Type::Int),
            ("total", &Type::Float)
        ]
    );
    assert!(schema.time_field.is_none());
}

#[test]
fn test_group_by_keeps_time_field_key_and_explicit_triggers() {
    let plan = LogicalNode::GroupBy {
        source: Box::new(events("e")),
        key: vec![GroupKey {
            expression: LogicalExpr::variable("e.ts"),
            name: Some("window".to_string()),
        }],
        aggregates: vec![],
        triggers: vec![LogicalTrigger::Counting(10)],
    };
    let (node, _) = typecheck(&plan).unwrap();
    let Node::GroupBy {
        triggers, schema, ..
    } = node.as_ref()
    else {
        panic!("expected GroupBy");
    };
    assert_eq!(triggers, &vec![TriggerSpec::Counting { count: 10 }]);
    assert_eq!(schema.time_field.as_deref(), Some("window_0"));
}

#[test]
fn test_unknown_aggregate() {
    let plan = LogicalNode::GroupBy {
        source: Box::new(events("e")),
        key: vec![],
        aggregates: vec![AggregateItem {
            aggregate: "median".to_string(),
            argument: LogicalExpr::variable("amount"),
            name: "m".to_string(),
        }],
        triggers: vec![],
    };
    assert!(matches!(typecheck(&plan).unwrap_err(), PlanError::UnknownAggregate { .. }));
}

#[test]
fn test_aggregate_argument_mismatch() {
    let plan = LogicalNode::GroupBy {
        source: Box::new(events("e")),
        key: vec![],
        aggregates: vec![AggregateItem {
            aggregate: "sum".to_string(),
            argument: LogicalExpr::variable("customer"),
            name: "s".to_string(),
        }],
        triggers: vec![],
    };
    assert!(matches!(typecheck(&plan).unwrap_err(), PlanError::MalformedArgument { .. }));
}

#[test]
fn test_limit_runs_on_a_single_partition() {
    let plan = LogicalNode::Limit {
        source: Box::new(events("e")),
        limit: int(10),
    };
    let (node, _) = typecheck(&plan).unwrap();
    let Node::Limit { source, limit, .. } = node.as_ref() else {
        panic!("expected Limit");
    };
    assert_eq!(limit.kind, ExpressionKind::Constant(Value::Int(10)));
    assert!(matches!(
        source.as_ref(),
        Node::Shuffle {
            partitions: 1,
            strategy: ShuffleStrategy::Constant { partition: 0 },
            ..
        }
    ));
}

#[test]
fn test_limit_must_be_int() {
    let plan = LogicalNode::Limit {
        source: Box::new(events("e")),
        limit: LogicalExpr::Constant(Value::String("ten".to_string())),
    };
    assert!(matches!(typecheck(&plan).unwrap_err(), PlanError::TypeMismatch { .. }));
}

#[test]
fn test_with_ctes_see_earlier_ctes() {
    let plan = LogicalNode::With {
        ctes: vec![
            (
                "big".to_string(),
                filter(
                    events("e"),
                    LogicalExpr::call(">", vec![LogicalExpr::variable("e.id"), int(100)]),
                ),
            ),
            (
                "bigger".to_string(),
                filter(
                    LogicalNode::datasource("big", Some("b")),
                    LogicalExpr::call(">", vec![LogicalExpr::variable("b.id"), int(1000)]),
                ),
            ),
        ],
        source: Box::new(project(
            LogicalNode::datasource("bigger", None),
            vec![item("bigger.id")],
        )),
    };
    let (node, reverse) = typecheck(&plan).unwrap();
    assert_eq!(node.schema().fields.len(), 1);
    assert_eq!(reverse[&node.schema().fields[0].name], "bigger.id");
}

#[test]
fn test_with_later_cte_does_not_leak_into_earlier_one() {
    let forward_reference = LogicalNode::With {
        ctes: vec![
            ("first".to_string(), LogicalNode::datasource("second", None)),
            ("second".to_string(), events("e")),
        ],
        source: Box::new(LogicalNode::datasource("first", None)),
    };
    assert!(matches!(
        typecheck(&forward_reference).unwrap_err(),
        PlanError::UnknownDatasource { ref name, .. } if name == "second"
    ));

    let siblings = LogicalNode::With {
        ctes: vec![
            ("base".to_string(), events("e")),
            ("base_users".to_string(), users("e")),
        ],
        source: Box::new(project(
            LogicalNode::datasource("base", None),
            vec![item("base.customer")],
        )),
    };
    let (node, reverse) = typecheck(&siblings).unwrap();
    let field = &node.schema().fields[0];
    assert_eq!(reverse[&field.name], "base.customer");
    assert_eq!(field.ty, Type::String);
    let Node::Map { expressions, .. } = node.as_ref() else {
        panic!("expected Map");
    };
    assert_eq!(expressions[0].as_variable().unwrap().name, "e.customer_0");
}

#[test]
fn test_requalifier_renames_qualifier() {
    let plan = project(
        LogicalNode::Requalifier {
            qualifier: "sub".to_string(),
            source: Box::new(events("e")),
        },
        vec![item("sub.customer")],
    );
    let (node, _) = typecheck(&plan).unwrap();
    let Node::Map { expressions, .. } = node.as_ref() else {
        panic!("expected Map");
    };
    assert_eq!(expressions[0].as_variable().unwrap().name, "e.customer_0");
}

#[test]
fn test_tumble_adds_window_fields() {
    let plan = LogicalNode::TableValuedFunction {
        name: "tumble".to_string(),
        arguments: [
            ("source".to_string(), LogicalTvfArgument::Table(Box::new(events("e")))),
            ("time_field".to_string(), LogicalTvfArgument::Descriptor("ts".to_string())),
            (
                "window_length".to_string(),
                LogicalTvfArgument::Expression(LogicalExpr::Constant(Value::Duration(
                    std::time::Duration::from_secs(60),
                ))),
            ),
        ]
        .into(),
    };
    let (node, reverse) = typecheck(&plan).unwrap();
    let Node::TableValuedFunction {
        arguments, schema, ..
    } = node.as_ref()
    else {
        panic!("expected TableValuedFunction");
    };
    assert_eq!(
        arguments.get("time_field"),
        Some(&TableValuedFunctionArgument::Descriptor("e.ts_0".to_string()))
    );
    assert_eq!(schema.fields.len(), 6);
    assert_eq!(schema.time_field.as_deref(), Some("window_end_0"));
    assert_eq!(reverse["window_start_0"], "window_start");
    assert_eq!(reverse["e.id_0"], "e.id");
}

#[test]
fn test_tumble_argument_errors() {
    let missing = LogicalNode::TableValuedFunction {
        name: "tumble".to_string(),
        arguments: [(
            "source".to_string(),
            LogicalTvfArgument::Table(Box::new(events("e"))),
        )]
        .into(),
    };
    assert!(matches!(typecheck(&missing).unwrap_err(), PlanError::MalformedArgument { .. }));

    let not_time = LogicalNode::TableValuedFunction {
        name: "tumble".to_string(),
        arguments: [
            ("source".to_string(), LogicalTvfArgument::Table(Box::new(events("e")))),
            ("time_field".to_string(), LogicalTvfArgument::Descriptor("customer".to_string())),
            (
                "window_length".to_string(),
                LogicalTvfArgument::Expression(LogicalExpr::Constant(Value::Duration(
                    std::time::Duration::from_secs(60),
                ))),
            ),
        ]
        .into(),
    };
    assert!(matches!(typecheck(&not_time).unwrap_err(), PlanError::MalformedArgument { .. }));

    let unknown = LogicalNode::TableValuedFunction {
        name: "hop".to_string(),
        arguments: BTreeMap::new(),
    };
    assert!(matches!(
        typecheck(&unknown).unwrap_err(),
        PlanError::UnknownTableValuedFunction { .. }
    ));
}

#[test]
fn test_range_has_integer_field() {
    let plan = LogicalNode::TableValuedFunction {
        name: "range".to_string(),
        arguments: [
            ("start".to_string(), LogicalTvfArgument::Expression(int(0))),
            ("end".to_string(), LogicalTvfArgument::Expression(int(10))),
        ]
        .into(),
    };
    let (node, reverse) = typecheck(&plan).unwrap();
    assert_eq!(node.schema().fields[0].ty, Type::Int);
    assert_eq!(reverse["i_0"], "i");
}

fn typed(expression: LogicalExpr) -> PlanResult<Type> {
    let plan = project(
        events("e"),
        vec![MapItem::Expression {
            expression,
            alias: Some("p".to_string()),
        }],
    );
    let (node, _) = typecheck(&plan)?;
    Ok(node.schema().fields[0].ty.clone())
}

fn compare(op: &str, field: &str, value: Value) -> LogicalExpr {
    LogicalExpr::call(op, vec![LogicalExpr::variable(field), LogicalExpr::Constant(value)])
}

#[test]
fn test_and_of_booleans_is_boolean() {
    let both = LogicalExpr::and(
        compare(">", "id", Value::Int(1)),
        compare("<", "id", Value::Int(10)),
    );
    assert_eq!(typed(both).unwrap(), Type::Boolean);
}

#[test]
fn test_or_with_nullable_operand_is_nullable() {
    let either = LogicalExpr::Or(
        Box::new(compare(">", "id", Value::Int(1))),
        Box::new(compare(">", "amount", Value::Float(1.5))),
    );
    assert_eq!(typed(either).unwrap(), Type::Boolean.nullable());
}

#[test]
fn test_logical_operand_must_be_boolean() {
    let err = typed(LogicalExpr::and(
        LogicalExpr::variable("id"),
        compare(">", "id", Value::Int(1)),
    ))
    .unwrap_err();
    assert!(matches!(err, PlanError::TypeMismatch { .. }));

    let err = typed(LogicalExpr::Or(
        Box::new(compare(">", "id", Value::Int(1))),
        Box::new(LogicalExpr::variable("customer")),
    ))
    .unwrap_err();
    assert!(matches!(err, PlanError::TypeMismatch { .. }));
}

#[test]
fn test_empty_coalesce_is_rejected() {
    assert!(matches!(
        typed(LogicalExpr::Coalesce(vec![])).unwrap_err(),
        PlanError::MalformedArgument { ref function, .. } if function == "COALESCE"
    ));
}

#[test]
fn test_cast_and_coalesce() {
    let cast = project(
        events("e"),
        vec![MapItem::Expression {
            expression: LogicalExpr::Cast {
                expression: Box::new(LogicalExpr::variable("amount")),
                target: Type::Float,
            },
            alias: Some("a".to_string()),
        }],
    );
    let (node, _) = typecheck(&cast).unwrap();
    assert_eq!(node.schema().fields[0].ty, Type::Float.nullable());

    let bad_cast = project(
        events("e"),
        vec![MapItem::Expression {
            expression: LogicalExpr::Cast {
                expression: Box::new(LogicalExpr::variable("id")),
                target: Type::String,
            },
            alias: None,
        }],
    );
    assert!(matches!(typecheck(&bad_cast).unwrap_err(), PlanError::TypeMismatch { .. }));

    let coalesce = project(
        events("e"),
        vec![MapItem::Expression {
            expression: LogicalExpr::Coalesce(vec![
                LogicalExpr::variable("amount"),
                LogicalExpr::Constant(Value::Float(0.0)),
            ]),
            alias: Some("amount".to_string()),
        }],
    );
    let (node, _) = typecheck(&coalesce).unwrap();
    assert_eq!(node.schema().fields[0].ty, Type::Float.nullable());

    let empty = project(
        events("e"),
        vec![MapItem::Expression {
            expression: LogicalExpr::Coalesce(vec![]),
            alias: None,
        }],
    );
    assert!(matches!(typecheck(&empty).unwrap_err(), PlanError::MalformedArgument { .. }));
}

#[test]
fn test_strict_functions_propagate_null() {
    let plan = filter(
        users("u"),
        LogicalExpr::call("is_null", vec![LogicalExpr::variable("age")]),
    );
    let (node, _) = typecheck(&plan).unwrap();
    let Node::Filter { predicate, .. } = node.as_ref() else {
        panic!("expected Filter");
    };
    assert_eq!(predicate.ty, Type::Boolean);

    let plan = project(
        users("u"),
        vec![MapItem::Expression {
            expression: LogicalExpr::call("+", vec![LogicalExpr::variable("age"), int(1)]),
            alias: Some("next".to_string()),
        }],
    );
    let (node, _) = typecheck(&plan).unwrap();
    assert_eq!(node.schema().fields[0].ty, Type::Int.nullable());
}

#[test]
fn test_maybe_argument_gets_type_assertion() {
    // Int | String only partially fits Int, so the argument is checked per row.
    let plan = project(
        users("u"),
        vec![MapItem::Expression {
            expression: LogicalExpr::call(
                "+",
                vec![
                    LogicalExpr::Coalesce(vec![
                        LogicalExpr::variable("id"),
                        LogicalExpr::variable("name"),
                    ]),
                    int(1),
                ],
            ),
            alias: Some("x".to_string()),
        }],
    );
    let (node, _) = typecheck(&plan).unwrap();
    let Node::Map { expressions, .. } = node.as_ref() else {
        panic!("expected Map");
    };
    let ExpressionKind::FunctionCall { arguments, .. } = &expressions[0].kind else {
        panic!("expected function call");
    };
    assert!(matches!(arguments[0].kind, ExpressionKind::TypeAssertion { .. }));
    assert_eq!(arguments[0].ty, Type::Int);
    assert_eq!(expressions[0].ty, Type::Int);
}

#[test]
fn test_correlated_subquery_is_not_level0() {
    let subquery = project(
        filter(
            users("u"),
            LogicalExpr::call(
                "=",
                vec![LogicalExpr::variable("u.id"), LogicalExpr::variable("e.id")],
            ),
        ),
        vec![item("u.name")],
    );
    let plan = project(
        events("e"),
        vec![MapItem::Expression {
            expression: LogicalExpr::QueryExpression(Box::new(subquery)),
            alias: Some("names".to_string()),
        }],
    );
    let (node, _) = typecheck(&plan).unwrap();
    assert_eq!(
        node.schema().fields[0].ty,
        Type::List(Box::new(Type::String))
    );

    let Node::Map { expressions, .. } = node.as_ref() else {
        panic!("expected Map");
    };
    let ExpressionKind::QueryExpression(inner) = &expressions[0].kind else {
        panic!("expected QueryExpression");
    };
    let Node::Map { source, .. } = inner.as_ref() else {
        panic!("expected inner Map");
    };
    let Node::Filter { predicate, .. } = source.as_ref() else {
        panic!("expected inner Filter");
    };
    let ExpressionKind::FunctionCall { arguments, .. } = &predicate.kind else {
        panic!("expected comparison");
    };
    assert!(arguments[0].as_variable().unwrap().is_level0);
    let outer = arguments[1].as_variable().unwrap();
    assert_eq!(outer.name, "e.id_0");
    assert!(!outer.is_level0);
}

#[test]
fn test_streaming_config_overrides_default_triggers() {
    let env = test_env().with_streaming_config(&rv_core::StreamingConfig {
        default_triggers: vec![TriggerSpec::Watermark],
    });
    let plan = LogicalNode::GroupBy {
        source: Box::new(events("e")),
        key: vec![GroupKey {
            expression: LogicalExpr::variable("customer"),
            name: None,
        }],
        aggregates: vec![],
        triggers: vec![],
    };
    let (node, _) = typecheck_query(&env, test_tvfs(), &plan).unwrap();
    let Node::GroupBy { triggers, .. } = node.as_ref() else {
        panic!("expected GroupBy");
    };
    assert_eq!(triggers, &vec![TriggerSpec::Watermark]);
}

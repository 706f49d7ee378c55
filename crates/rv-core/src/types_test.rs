use super::*;

fn sample_types() -> Vec<Type> {
    vec![
        Type::Null,
        Type::Boolean,
        Type::Int,
        Type::Float,
        Type::String,
        Type::Time,
        Type::Duration,
        Type::Any,
        Type::List(Box::new(Type::Int)),
        Type::Tuple(vec![Type::Int, Type::String]),
        Type::Struct(vec![
            StructField::new("id", Type::Int),
            StructField::new("name", Type::String.nullable()),
        ]),
        type_sum(Type::Int, Type::Null),
        Type::List(Box::new(type_sum(Type::Boolean, Type::Float))),
    ]
}

#[test]
fn test_is_reflexive() {
    for ty in sample_types() {
        assert_eq!(ty.is(&ty), TypeRelation::Is, "{ty} should be itself");
    }
}

#[test]
fn test_no_numeric_widening() {
    assert_eq!(Type::Int.is(&Type::Float), TypeRelation::Isnt);
    assert_eq!(Type::Float.is(&Type::Int), TypeRelation::Isnt);
}

#[test]
fn test_member_of_sum_is_sum() {
    let target = Type::sum_of([Type::Int, Type::String, Type::Null]).unwrap();
    assert_eq!(Type::Int.is(&target), TypeRelation::Is);
    assert_eq!(type_sum(Type::Int, Type::Null).is(&target), TypeRelation::Is);
}

#[test]
fn test_partial_sum_is_maybe() {
    let nullable_int = type_sum(Type::Int, Type::Null);
    assert_eq!(nullable_int.is(&Type::Int), TypeRelation::Maybe);
    assert_eq!(
        type_sum(Type::Boolean, Type::String).is(&type_sum(Type::Boolean, Type::Null)),
        TypeRelation::Maybe
    );
}

#[test]
fn test_disjoint_sum_isnt() {
    let sum = type_sum(Type::Int, Type::Float);
    assert_eq!(sum.is(&Type::String), TypeRelation::Isnt);
    assert_eq!(Type::Boolean.is(&sum), TypeRelation::Isnt);
}

#[test]
fn test_any() {
    assert_eq!(Type::String.is(&Type::Any), TypeRelation::Is);
    assert_eq!(Type::Any.is(&Type::String), TypeRelation::Maybe);
}

#[test]
fn test_struct_names_must_match() {
    let a = Type::Struct(vec![StructField::new("a", Type::Int)]);
    let b = Type::Struct(vec![StructField::new("b", Type::Int)]);
    assert_eq!(a.is(&b), TypeRelation::Isnt);
}

#[test]
fn test_composites_take_weakest_component() {
    let maybe_list = Type::List(Box::new(type_sum(Type::Int, Type::Null)));
    assert_eq!(
        maybe_list.is(&Type::List(Box::new(Type::Int))),
        TypeRelation::Maybe
    );

    let tuple = Type::Tuple(vec![Type::Int, type_sum(Type::Int, Type::String)]);
    assert_eq!(
        tuple.is(&Type::Tuple(vec![Type::Int, Type::Int])),
        TypeRelation::Maybe
    );
    assert_eq!(
        tuple.is(&Type::Tuple(vec![Type::Int])),
        TypeRelation::Isnt
    );
}

#[test]
fn test_sum_is_flattened_and_deduplicated() {
    let nested = type_sum(type_sum(Type::Int, Type::Null), type_sum(Type::Null, Type::Int));
    assert_eq!(nested, Type::Sum(vec![Type::Int, Type::Null]));
    assert_eq!(type_sum(Type::Int, Type::Int), Type::Int);
    assert_eq!(Type::sum_of(Vec::new()), None);
}

#[test]
fn test_intersection_narrows_sum() {
    let expected = type_sum(Type::Boolean, Type::Null);
    let actual = Type::sum_of([Type::Boolean, Type::Int, Type::Null]).unwrap();
    assert_eq!(type_intersection(&expected, &actual), Some(expected.clone()));

    let actual = type_sum(Type::Boolean, Type::Int);
    assert_eq!(type_intersection(&expected, &actual), Some(Type::Boolean));

    assert_eq!(type_intersection(&Type::Int, &Type::String), None);
}

#[test]
fn test_admits_null() {
    assert!(Type::Null.admits_null());
    assert!(Type::Int.nullable().admits_null());
    assert!(!Type::Int.admits_null());
}

#[test]
fn test_display() {
    assert_eq!(Type::Int.nullable().to_string(), "Int | NULL");
    assert_eq!(
        Type::Struct(vec![
            StructField::new("id", Type::Int),
            StructField::new("tags", Type::List(Box::new(Type::String))),
        ])
        .to_string(),
        "{id: Int, tags: [String]}"
    );
    assert_eq!(
        Type::Tuple(vec![Type::Int, Type::Time]).to_string(),
        "(Int, Time)"
    );
}

//! Algebraic type system with a three-valued subtype relation

use serde::{Deserialize, Serialize};

/// Result of asking whether every value of one type is accepted as another.
///
/// Ordered `Isnt < Maybe < Is` so that composite checks can take the weakest
/// component with `min` and union targets the strongest with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeRelation {
    /// No value of the source type is accepted
    Isnt,
    /// Some values are accepted; needs a per-row check
    Maybe,
    /// Every value is accepted
    Is,
}

/// A named field of a struct type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: Type,
}

impl StructField {
    /// Create a new struct field
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Value type of an expression or schema field.
///
/// `Sum` values are always flattened and deduplicated; build them with
/// [`type_sum`] or [`Type::sum_of`] rather than constructing the variant directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// The null type (only the NULL value)
    Null,
    /// Boolean
    Boolean,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// UTF-8 string
    String,
    /// Point in time (UTC)
    Time,
    /// Time interval
    Duration,
    /// Ordered named fields
    Struct(Vec<StructField>),
    /// Homogeneous list
    List(Box<Type>),
    /// Fixed-arity heterogeneous tuple
    Tuple(Vec<Type>),
    /// Union of alternatives
    Sum(Vec<Type>),
    /// Accepts every type; used by function signatures
    Any,
}

impl Type {
    /// Check whether every value of `self` is accepted where `other` is expected.
    pub fn is(&self, other: &Type) -> TypeRelation {
        if let Type::Sum(alternatives) = self {
            let mut all = true;
            let mut any = false;
            for alternative in alternatives {
                let rel = alternative.is(other);
                if rel != TypeRelation::Is {
                    all = false;
                }
                if rel != TypeRelation::Isnt {
                    any = true;
                }
            }
            return if all {
                TypeRelation::Is
            } else if any {
                TypeRelation::Maybe
            } else {
                TypeRelation::Isnt
            };
        }

        if matches!(other, Type::Any) {
            return TypeRelation::Is;
        }

        if let Type::Sum(alternatives) = other {
            return alternatives
                .iter()
                .map(|alternative| self.is(alternative))
                .max()
                .unwrap_or(TypeRelation::Isnt);
        }

        if matches!(self, Type::Any) {
            return TypeRelation::Maybe;
        }

        match (self, other) {
            (Type::List(element), Type::List(other_element)) => element.is(other_element),
            (Type::Struct(fields), Type::Struct(other_fields)) => {
                if fields.len() != other_fields.len() {
                    return TypeRelation::Isnt;
                }
                let mut rel = TypeRelation::Is;
                for (field, other_field) in fields.iter().zip(other_fields) {
                    if field.name != other_field.name {
                        return TypeRelation::Isnt;
                    }
                    rel = rel.min(field.ty.is(&other_field.ty));
                }
                rel
            }
            (Type::Tuple(elements), Type::Tuple(other_elements)) => {
                if elements.len() != other_elements.len() {
                    return TypeRelation::Isnt;
                }
                elements
                    .iter()
                    .zip(other_elements)
                    .map(|(element, other_element)| element.is(other_element))
                    .min()
                    .unwrap_or(TypeRelation::Is)
            }
            (Type::Null, Type::Null)
            | (Type::Boolean, Type::Boolean)
            | (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::String, Type::String)
            | (Type::Time, Type::Time)
            | (Type::Duration, Type::Duration) => TypeRelation::Is,
            _ => TypeRelation::Isnt,
        }
    }

    /// Build a flattened, deduplicated union from any number of types.
    ///
    /// Returns `None` for an empty input.
    pub fn sum_of(types: impl IntoIterator<Item = Type>) -> Option<Type> {
        let mut alternatives = Vec::new();
        for ty in types {
            push_flattened(&mut alternatives, ty);
        }
        match alternatives.len() {
            0 => None,
            1 => alternatives.pop(),
            _ => Some(Type::Sum(alternatives)),
        }
    }

    /// This type unioned with `Null`
    pub fn nullable(self) -> Type {
        type_sum(self, Type::Null)
    }

    /// Whether NULL is a possible value of this type
    pub fn admits_null(&self) -> bool {
        Type::Null.is(self) == TypeRelation::Is
    }

    /// Human-readable display name
    pub fn display_name(&self) -> String {
        match self {
            Type::Null => "NULL".into(),
            Type::Boolean => "Boolean".into(),
            Type::Int => "Int".into(),
            Type::Float => "Float".into(),
            Type::String => "String".into(),
            Type::Time => "Time".into(),
            Type::Duration => "Duration".into(),
            Type::Any => "Any".into(),
            Type::List(element) => format!("[{}]", element.display_name()),
            Type::Struct(fields) => {
                let field_strs: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.ty.display_name()))
                    .collect();
                format!("{{{}}}", field_strs.join(", "))
            }
            Type::Tuple(elements) => {
                let element_strs: Vec<String> =
                    elements.iter().map(Type::display_name).collect();
                format!("({})", element_strs.join(", "))
            }
            Type::Sum(alternatives) => {
                let alternative_strs: Vec<String> =
                    alternatives.iter().map(Type::display_name).collect();
                alternative_strs.join(" | ")
            }
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn push_flattened(out: &mut Vec<Type>, ty: Type) {
    match ty {
        Type::Sum(alternatives) => {
            for alternative in alternatives {
                push_flattened(out, alternative);
            }
        }
        other => {
            if !out.contains(&other) {
                out.push(other);
            }
        }
    }
}

/// Union of two types, flattened and deduplicated.
pub fn type_sum(left: Type, right: Type) -> Type {
    let mut alternatives = Vec::new();
    push_flattened(&mut alternatives, left);
    push_flattened(&mut alternatives, right);
    if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        Type::Sum(alternatives)
    }
}

/// Narrow two types to the values accepted by both.
///
/// Returns `None` when no value belongs to both.
pub fn type_intersection(left: &Type, right: &Type) -> Option<Type> {
    if left.is(right) == TypeRelation::Is {
        return Some(left.clone());
    }
    if right.is(left) == TypeRelation::Is {
        return Some(right.clone());
    }
    if let Type::Sum(alternatives) = left {
        return Type::sum_of(
            alternatives
                .iter()
                .filter_map(|alternative| type_intersection(alternative, right)),
        );
    }
    if let Type::Sum(alternatives) = right {
        return Type::sum_of(
            alternatives
                .iter()
                .filter_map(|alternative| type_intersection(left, alternative)),
        );
    }
    None
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

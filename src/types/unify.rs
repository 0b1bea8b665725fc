//! Common-type unification and compatibility

use crate::types::{PrimitiveType, Type};

/// Least type both `a` and `b` can be used as, if any.
///
/// A reference unifies to mutable only if both sides are mutable.
pub fn common_type(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        (Type::Error, _) | (_, Type::Error) => Some(Type::Error),
        (Type::Never, other) | (other, Type::Never) => Some(other.clone()),

        (Type::Ambiguous(x), Type::Ambiguous(y)) => {
            common_type(x, y).map(|t| Type::Ambiguous(Box::new(t)))
        }
        (Type::Ambiguous(_), Type::Unit) | (Type::Unit, Type::Ambiguous(_)) => Some(Type::Unit),
        (Type::Ambiguous(x), other) | (other, Type::Ambiguous(x)) => common_type(x, other),

        (Type::Primitive(PrimitiveType::Int), Type::Primitive(p))
        | (Type::Primitive(p), Type::Primitive(PrimitiveType::Int))
            if p.is_integer() =>
        {
            Some(Type::Primitive(*p))
        }

        (
            Type::Reference {
                inner: x,
                mutable: mx,
            },
            Type::Reference {
                inner: y,
                mutable: my,
            },
        ) => common_type(x, y).map(|inner| Type::reference(inner, *mx && *my)),

        (Type::Array { elem: x, size: sx }, Type::Array { elem: y, size: sy }) if sx == sy => {
            common_type(x, y).map(|elem| Type::array(elem, *sx))
        }

        (x, y) if x == y => Some(x.clone()),
        _ => None,
    }
}

/// Whether a value of type `actual` may be used where `expected` is required
pub fn is_compatible(actual: &Type, expected: &Type) -> bool {
    match (actual, expected) {
        (Type::Error, _) | (_, Type::Error) => true,
        (Type::Never, _) => true,

        (Type::Ambiguous(_), Type::Unit) => true,
        (Type::Ambiguous(value), _) => is_compatible(value, expected),
        (_, Type::Ambiguous(value)) => matches!(actual, Type::Unit) || is_compatible(actual, value),

        (Type::Primitive(PrimitiveType::Int), Type::Primitive(p))
        | (Type::Primitive(p), Type::Primitive(PrimitiveType::Int)) => p.is_integer(),

        (
            Type::Reference {
                inner: x,
                mutable: mx,
            },
            Type::Reference {
                inner: y,
                mutable: my,
            },
        ) => (*mx || !*my) && is_compatible(x, y),

        (Type::Array { elem: x, size: sx }, Type::Array { elem: y, size: sy }) => {
            sx == sy && is_compatible(x, y)
        }

        (x, y) => x == y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::symbol::SymbolId;

    fn samples() -> Vec<Type> {
        vec![
            Type::I32,
            Type::U32,
            Type::INT,
            Type::BOOL,
            Type::STRING,
            Type::Unit,
            Type::Never,
            Type::reference(Type::I32, true),
            Type::reference(Type::INT, false),
            Type::array(Type::I32, 3),
            Type::array(Type::Never, 0),
            Type::ambiguous(Type::BOOL),
            Type::ambiguous(Type::INT),
            Type::Struct {
                name: "P".to_string(),
                symbol: SymbolId(7),
            },
        ]
    }

    #[test]
    fn test_common_type_is_reflexive() {
        for ty in samples() {
            assert_eq!(common_type(&ty, &ty), Some(ty.clone()), "{}", ty);
        }
    }

    #[test]
    fn test_never_is_identity() {
        for ty in samples() {
            assert_eq!(common_type(&Type::Never, &ty), Some(ty.clone()), "{}", ty);
        }
    }

    #[test]
    fn test_common_type_is_commutative() {
        let types = samples();
        for a in &types {
            for b in &types {
                assert_eq!(common_type(a, b), common_type(b, a), "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_integer_resolution() {
        assert_eq!(common_type(&Type::INT, &Type::U32), Some(Type::U32));
        assert_eq!(common_type(&Type::I32, &Type::U32), None);
        assert_eq!(common_type(&Type::INT, &Type::BOOL), None);
    }

    #[test]
    fn test_reference_mutability_is_conjunction() {
        let m = Type::reference(Type::I32, true);
        let s = Type::reference(Type::I32, false);
        assert_eq!(common_type(&m, &s), Some(s.clone()));
        assert_eq!(common_type(&m, &m), Some(m));
    }

    #[test]
    fn test_arrays_need_equal_size() {
        assert_eq!(common_type(&Type::array(Type::I32, 2), &Type::array(Type::I32, 3)), None);
        assert_eq!(
            common_type(&Type::array(Type::INT, 0), &Type::array(Type::Never, 0)),
            Some(Type::array(Type::INT, 0))
        );
    }

    #[test]
    fn test_ambiguous_against_unit_and_value() {
        let amb = Type::ambiguous(Type::I32);
        assert_eq!(common_type(&amb, &Type::Unit), Some(Type::Unit));
        assert_eq!(common_type(&amb, &Type::INT), Some(Type::I32));
        assert_eq!(common_type(&Type::ambiguous(Type::INT), &Type::ambiguous(Type::BOOL)), None);
    }

    #[test]
    fn test_compatibility() {
        let amb = Type::ambiguous(Type::Unit);
        assert!(is_compatible(&amb, &Type::Unit));
        assert!(is_compatible(&Type::ambiguous(Type::BOOL), &Type::Unit));
        assert!(is_compatible(&Type::ambiguous(Type::BOOL), &Type::BOOL));
        assert!(!is_compatible(&Type::ambiguous(Type::I32), &Type::BOOL));
        assert!(is_compatible(&Type::Never, &Type::STRING));
        assert!(is_compatible(&Type::reference(Type::I32, true), &Type::reference(Type::I32, false)));
        assert!(!is_compatible(&Type::reference(Type::I32, false), &Type::reference(Type::I32, true)));
        assert!(is_compatible(&Type::INT, &Type::USIZE));
        assert!(!is_compatible(&Type::I32, &Type::USIZE));
    }
}
